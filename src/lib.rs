pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod realtime;
pub mod routes;
pub mod utils;

#[cfg(test)]
mod test_support;

use sea_orm::DatabaseConnection;

pub use config::Config;
pub use error::{AppError, AppResult};

use realtime::ChangeFeed;

/// Shared application context, built once in `main` and handed to the router
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub config: Config,
    pub feed: ChangeFeed,
}
