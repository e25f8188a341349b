pub mod config;
pub mod database;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod services;

pub use config::Config;
pub use errors::{GatewayError, Result};
pub use services::CommandService;
