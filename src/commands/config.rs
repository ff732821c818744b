use anyhow::Result;
use colored::Colorize;
use service_scaffold::config::Config;

/// Execute the config show command
///
/// Displays the effective configuration with secrets masked
pub fn show() -> Result<()> {
    let cfg = Config::from_env()?;

    println!("{}", "Current Configuration:".green().bold());
    println!();
    println!("{}", cfg);

    Ok(())
}
