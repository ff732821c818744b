use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;

mod cli;
mod commands;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();

    load_env_file(&args.env_file)?;

    match args.get_command() {
        cli::Commands::Start => {
            commands::start::execute().await?;
        }
        cli::Commands::Test => {
            commands::test::execute()?;
        }
        cli::Commands::Config { action } => match action {
            cli::ConfigCommands::Show => commands::config::show()?,
        },
        cli::Commands::Version => {
            println!("service-scaffold v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}

/// Load variables from a dotenv file without overriding the real environment.
///
/// A missing file is not an error; a malformed one is.
fn load_env_file(path: &Path) -> Result<()> {
    match dotenvy::from_path(path) {
        Ok(()) => Ok(()),
        Err(dotenvy::Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            eprintln!("No env file at {}, using the process environment", path.display());
            Ok(())
        }
        Err(e) => Err(e).with_context(|| format!("failed to load env file {}", path.display())),
    }
}
