pub mod config;
pub mod error;
pub mod handlers;
pub mod logger;
pub mod middleware;
pub mod repository;
pub mod router;
pub mod server;
pub mod signals;

pub use config::Config;
pub use error::{AppError, Error, Result};
pub use logger::Logger;
