use std::env;

use crate::utils::fare::RateScaling;
use crate::utils::lifecycle::{CancellationAnchor, CancellationPolicy};

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_expiration_hours: i64,
    pub server_host: String,
    pub server_port: u16,
    pub admin_email: String,
    pub admin_password: String,
    pub fare_rate_scaling: RateScaling,
    pub cancellation: CancellationPolicy,
    /// Radius used for driver matching and the driver's pending-ride feed
    pub match_radius_km: f64,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            database_url: env::var("DATABASE_URL")
                .expect("DATABASE_URL must be set"),
            jwt_secret: env::var("JWT_SECRET")
                .expect("JWT_SECRET must be set"),
            jwt_expiration_hours: env::var("JWT_EXPIRATION_HOURS")
                .unwrap_or_else(|_| "24".to_string())
                .parse()
                .expect("JWT_EXPIRATION_HOURS must be a number"),
            server_host: env::var("SERVER_HOST")
                .unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .expect("SERVER_PORT must be a number"),
            admin_email: env::var("ADMIN_EMAIL")
                .unwrap_or_else(|_| "admin@ridehailing.local".to_string()),
            admin_password: env::var("ADMIN_PASSWORD")
                .unwrap_or_else(|_| "admin123".to_string()),
            fare_rate_scaling: env::var("FARE_RATE_SCALING")
                .unwrap_or_else(|_| "flat".to_string())
                .parse()
                .expect("FARE_RATE_SCALING must be 'flat' or 'capacity'"),
            cancellation: CancellationPolicy {
                window_minutes: env::var("CANCELLATION_WINDOW_MINUTES")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()
                    .expect("CANCELLATION_WINDOW_MINUTES must be a number"),
                anchor: env::var("CANCELLATION_ANCHOR")
                    .unwrap_or_else(|_| "created".to_string())
                    .parse::<CancellationAnchor>()
                    .expect("CANCELLATION_ANCHOR must be 'created' or 'accepted'"),
            },
            match_radius_km: env::var("MATCH_RADIUS_KM")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .expect("MATCH_RADIUS_KM must be a number"),
        }
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}
