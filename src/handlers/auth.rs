use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{extract::State, Json};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::user::{self, UserRole};
use crate::entities::{car_category, driver};
use crate::error::{AppError, AppResult};
use crate::utils::jwt::Claims;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterDriverRequest {
    #[serde(flatten)]
    pub account: RegisterRequest,
    pub category_id: i32,
    pub vehicle_make: String,
    pub vehicle_model: String,
    pub vehicle_plate: String,
    pub vehicle_color: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserInfo,
}

#[derive(Debug, Serialize)]
pub struct UserInfo {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
    pub role: UserRole,
}

impl From<user::Model> for UserInfo {
    fn from(u: user::Model) -> Self {
        Self {
            id: u.id,
            email: u.email,
            name: u.name,
            phone: u.phone,
            role: u.role,
        }
    }
}

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))
}

fn validate_account(payload: &RegisterRequest) -> AppResult<String> {
    let email = payload.email.trim().to_lowercase();
    if !email.contains('@') {
        return Err(AppError::BadRequest("Invalid email address".to_string()));
    }
    if payload.password.len() < 6 {
        return Err(AppError::BadRequest(
            "Password must be at least 6 characters".to_string(),
        ));
    }
    if payload.name.trim().is_empty() {
        return Err(AppError::BadRequest("Name is required".to_string()));
    }
    Ok(email)
}

async fn ensure_email_free(state: &AppState, email: &str) -> AppResult<()> {
    let existing = user::Entity::find()
        .filter(user::Column::Email.eq(email))
        .one(&state.db)
        .await?;

    if existing.is_some() {
        return Err(AppError::Conflict("Email already registered".to_string()));
    }
    Ok(())
}

fn auth_response(state: &AppState, user: user::Model) -> AppResult<Json<AuthResponse>> {
    let token = Claims::new(user.id, &user.email, user.role, state.config.jwt_expiration_hours)
        .encode(&state.config.jwt_secret)?;

    Ok(Json(AuthResponse {
        token,
        user: user.into(),
    }))
}

/// Register a new passenger account
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<Json<AuthResponse>> {
    let email = validate_account(&payload)?;
    ensure_email_free(&state, &email).await?;

    let new_user = user::ActiveModel {
        id: Set(Uuid::new_v4()),
        email: Set(email),
        password_hash: Set(hash_password(&payload.password)?),
        name: Set(payload.name.trim().to_string()),
        phone: Set(payload.phone),
        role: Set(UserRole::Passenger),
        ..Default::default()
    };

    let user = new_user.insert(&state.db).await?;
    tracing::info!(user_id = %user.id, "Passenger registered");

    auth_response(&state, user)
}

/// Register a driver account together with its vehicle profile
pub async fn register_driver(
    State(state): State<AppState>,
    Json(payload): Json<RegisterDriverRequest>,
) -> AppResult<Json<AuthResponse>> {
    let email = validate_account(&payload.account)?;
    if payload.vehicle_plate.trim().is_empty() {
        return Err(AppError::BadRequest("Vehicle plate is required".to_string()));
    }
    ensure_email_free(&state, &email).await?;

    let plate = payload.vehicle_plate.trim().to_uppercase();
    let plate_taken = driver::Entity::find()
        .filter(driver::Column::VehiclePlate.eq(plate.as_str()))
        .one(&state.db)
        .await?;
    if plate_taken.is_some() {
        return Err(AppError::Conflict("Vehicle already registered".to_string()));
    }

    car_category::Entity::find_by_id(payload.category_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::BadRequest("Invalid car category".to_string()))?;

    let password_hash = hash_password(&payload.account.password)?;
    let user_id = Uuid::new_v4();
    let now = Utc::now();

    let txn = state.db.begin().await?;

    let user = user::ActiveModel {
        id: Set(user_id),
        email: Set(email),
        password_hash: Set(password_hash),
        name: Set(payload.account.name.trim().to_string()),
        phone: Set(payload.account.phone),
        role: Set(UserRole::Driver),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    driver::ActiveModel {
        id: Set(user_id),
        category_id: Set(payload.category_id),
        vehicle_make: Set(payload.vehicle_make),
        vehicle_model: Set(payload.vehicle_model),
        vehicle_plate: Set(plate),
        vehicle_color: Set(payload.vehicle_color),
        is_available: Set(false),
        current_lat: Set(None),
        current_lng: Set(None),
        rating: Set(5.0),
        total_ratings: Set(0),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;
    tracing::info!(user_id = %user.id, "Driver registered");

    auth_response(&state, user)
}

/// Login with email and password
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let user = user::Entity::find()
        .filter(user::Column::Email.eq(payload.email.trim().to_lowercase()))
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid email or password".to_string()))?;

    let parsed_hash = PasswordHash::new(&user.password_hash)
        .map_err(|e| AppError::Internal(format!("Failed to parse password hash: {}", e)))?;

    Argon2::default()
        .verify_password(payload.password.as_bytes(), &parsed_hash)
        .map_err(|_| AppError::Unauthorized("Invalid email or password".to_string()))?;

    auth_response(&state, user)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(email: &str, password: &str, name: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.to_string(),
            password: password.to_string(),
            name: name.to_string(),
            phone: None,
        }
    }

    #[test]
    fn normalizes_email() {
        let email = validate_account(&request(" Rider@Example.COM ", "secret1", "Ana")).unwrap();
        assert_eq!(email, "rider@example.com");
    }

    #[test]
    fn rejects_weak_or_incomplete_accounts() {
        assert!(validate_account(&request("nope", "secret1", "Ana")).is_err());
        assert!(validate_account(&request("a@b.c", "123", "Ana")).is_err());
        assert!(validate_account(&request("a@b.c", "secret1", "  ")).is_err());
    }

    #[test]
    fn hashed_password_verifies() {
        let hash = hash_password("secret1").unwrap();
        let parsed = PasswordHash::new(&hash).unwrap();
        assert!(Argon2::default()
            .verify_password(b"secret1", &parsed)
            .is_ok());
        assert!(Argon2::default().verify_password(b"wrong", &parsed).is_err());
    }
}
