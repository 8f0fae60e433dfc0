use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::user::UserRole;
use crate::error::{AppError, AppResult};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: Uuid, // user id
    pub email: String,
    pub role: UserRole,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(user_id: Uuid, email: &str, role: UserRole, expiration_hours: i64) -> Self {
        let now = Utc::now();
        Self {
            sub: user_id,
            email: email.to_string(),
            role,
            exp: (now + Duration::hours(expiration_hours)).timestamp(),
            iat: now.timestamp(),
        }
    }

    pub fn encode(&self, secret: &str) -> AppResult<String> {
        encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))
    }
}

pub fn verify_token(token: &str, secret: &str) -> AppResult<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| AppError::Unauthorized(format!("Invalid token: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trips_identity_and_role() {
        let id = Uuid::new_v4();
        let token = Claims::new(id, "rider@example.com", UserRole::Passenger, 1)
            .encode("secret")
            .unwrap();

        let claims = verify_token(&token, "secret").unwrap();
        assert_eq!(claims.sub, id);
        assert_eq!(claims.role, UserRole::Passenger);
    }

    #[test]
    fn wrong_secret_is_unauthorized() {
        let token = Claims::new(Uuid::new_v4(), "d@example.com", UserRole::Driver, 1)
            .encode("secret")
            .unwrap();

        assert!(matches!(
            verify_token(&token, "other"),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = Claims::new(Uuid::new_v4(), "a@example.com", UserRole::Admin, -2)
            .encode("secret")
            .unwrap();

        assert!(verify_token(&token, "secret").is_err());
    }
}
