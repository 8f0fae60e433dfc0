//! Fixtures for handler tests backed by sea-orm's mock connection.

use chrono::{DateTime, Duration, Utc};
use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase, MockExecResult};
use serde_json::json;
use uuid::Uuid;

use crate::config::Config;
use crate::entities::car_rental::{self, DurationType, RentalStatus};
use crate::entities::ride::{self, PaymentMethod, RideStatus};
use crate::entities::user::{self, UserRole};
use crate::entities::{car_category, rental_car};
use crate::realtime::ChangeFeed;
use crate::utils::fare::RateScaling;
use crate::utils::jwt::Claims;
use crate::utils::lifecycle::CancellationPolicy;
use crate::AppState;

pub const SECRET: &str = "test-secret";

pub fn config() -> Config {
    Config {
        database_url: String::new(),
        jwt_secret: SECRET.to_string(),
        jwt_expiration_hours: 1,
        server_host: "127.0.0.1".to_string(),
        server_port: 0,
        admin_email: "admin@test".to_string(),
        admin_password: "admin123".to_string(),
        fare_rate_scaling: RateScaling::Flat,
        cancellation: CancellationPolicy::default(),
        match_radius_km: 10.0,
    }
}

pub fn state(db: DatabaseConnection) -> AppState {
    AppState {
        db,
        config: config(),
        feed: ChangeFeed::new(),
    }
}

pub fn postgres() -> MockDatabase {
    MockDatabase::new(DatabaseBackend::Postgres)
}

pub fn rows_affected(rows: u64) -> MockExecResult {
    MockExecResult {
        last_insert_id: 0,
        rows_affected: rows,
    }
}

pub fn claims(user_id: Uuid, role: UserRole) -> Claims {
    Claims::new(user_id, "user@test", role, 1)
}

pub fn user(id: Uuid, role: UserRole) -> user::Model {
    user::Model {
        id,
        email: "user@test".to_string(),
        password_hash: String::new(),
        name: "Test User".to_string(),
        phone: None,
        role,
        created_at: Utc::now().into(),
    }
}

pub fn category() -> car_category::Model {
    car_category::Model {
        id: 2,
        name: "Standard".to_string(),
        description: None,
        base_fare: 2.5,
        price_per_km: 1.2,
        minimum_fare: 5.0,
        capacity: 4,
        is_active: true,
    }
}

pub fn ride(
    passenger_id: Uuid,
    driver_id: Option<Uuid>,
    status: RideStatus,
    created_at: DateTime<Utc>,
) -> ride::Model {
    ride::Model {
        id: Uuid::new_v4(),
        passenger_id,
        driver_id,
        category_id: 2,
        pickup_lat: -1.9441,
        pickup_lng: 30.0619,
        pickup_address: "Kimihurura".to_string(),
        dropoff_lat: -1.95,
        dropoff_lng: 30.07,
        dropoff_address: "Kacyiru".to_string(),
        distance_km: 1.11,
        status,
        estimated_fare: 5.0,
        final_fare: None,
        payment_method: PaymentMethod::Cash,
        rating: None,
        feedback: None,
        created_at: created_at.into(),
        accepted_at: driver_id.map(|_| (created_at + Duration::minutes(1)).into()),
        started_at: None,
        completed_at: None,
        cancelled_at: None,
    }
}

pub fn rental_car() -> rental_car::Model {
    rental_car::Model {
        id: Uuid::new_v4(),
        make: "Toyota".to_string(),
        model: "RAV4".to_string(),
        year: 2022,
        seats: 5,
        transmission: "automatic".to_string(),
        fuel_type: "petrol".to_string(),
        features: json!(["AC", "Bluetooth"]),
        image_url: None,
        price_per_hour: 12.0,
        price_per_day: 80.0,
        location: "Kigali Airport".to_string(),
        is_available: true,
        created_at: Utc::now().into(),
    }
}

pub fn rental(
    car_id: Uuid,
    status: RentalStatus,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> car_rental::Model {
    car_rental::Model {
        id: Uuid::new_v4(),
        car_id,
        renter_id: Uuid::new_v4(),
        start_time: start.into(),
        end_time: end.into(),
        duration_type: DurationType::Hourly,
        duration_value: 1,
        total_price: 12.0,
        status,
        pickup_location: "Kigali Airport".to_string(),
        return_location: "Kigali Airport".to_string(),
        created_at: Utc::now().into(),
    }
}
