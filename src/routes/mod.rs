use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use crate::handlers::{admin, auth, catalog, driver, passenger, realtime, rental};
use crate::middleware::auth::{auth_middleware, require_admin, require_driver, require_passenger};
use crate::middleware::rate_limit::create_public_governor;
use crate::middleware::role_rate_limit::{create_role_governor, RateLimitedRole};
use crate::AppState;

pub fn create_router(state: AppState) -> Router {
    let driver_governor = create_role_governor(RateLimitedRole::Driver);
    let passenger_governor = create_role_governor(RateLimitedRole::Passenger);
    let public_governor = create_public_governor();

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/register-driver", post(auth::register_driver))
        .route("/login", post(auth::login))
        .layer(public_governor.clone());

    // Catalogue and price estimates need no account
    let public_routes = Router::new()
        .route("/categories", get(catalog::list_categories))
        .route("/fare/estimate", post(catalog::estimate_fare))
        .route("/rental-cars", get(catalog::list_rental_cars))
        .route("/rental-cars/{id}", get(catalog::get_rental_car))
        .route("/rentals/quote", post(catalog::rental_quote))
        .layer(public_governor);

    let ride_routes = Router::new()
        .route("/", post(passenger::create_ride).get(passenger::my_rides))
        .route("/nearest-driver", get(passenger::nearest_driver))
        .route("/{id}", get(passenger::get_ride))
        .route("/{id}/cancel", post(passenger::cancel_ride))
        .route("/{id}/rate", post(passenger::rate_ride))
        .layer(passenger_governor.clone())
        .layer(middleware::from_fn(require_passenger))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let rental_routes = Router::new()
        .route("/", post(rental::create_rental).get(rental::my_rentals))
        .route("/{id}/cancel", post(rental::cancel_rental))
        .layer(passenger_governor)
        .layer(middleware::from_fn(require_passenger))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let driver_routes = Router::new()
        .route("/profile", get(driver::profile))
        .route("/availability", put(driver::set_availability))
        .route("/location", put(driver::update_location))
        .route("/rides", get(driver::my_rides))
        .route("/rides/pending", get(driver::pending_rides))
        .route("/rides/{id}/accept", post(driver::accept_ride))
        .route("/rides/{id}/start", post(driver::start_ride))
        .route("/rides/{id}/complete", post(driver::complete_ride))
        .route("/earnings", get(driver::earnings))
        .layer(driver_governor)
        .layer(middleware::from_fn(require_driver))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    // Admin routes are only limited by the global per-IP governor
    let admin_routes = Router::new()
        .route("/categories", get(admin::list_categories).post(admin::create_category))
        .route(
            "/categories/{id}",
            put(admin::update_category).delete(admin::deactivate_category),
        )
        .route(
            "/rental-cars",
            get(admin::list_rental_cars).post(admin::create_rental_car),
        )
        .route(
            "/rental-cars/{id}",
            put(admin::update_rental_car).delete(admin::delete_rental_car),
        )
        .route("/rides", get(admin::list_rides))
        .route("/drivers", get(admin::list_drivers))
        .route("/users", get(admin::list_users))
        .route("/rentals", get(admin::list_rentals))
        .route("/rentals/{id}/confirm", post(admin::confirm_rental))
        .route("/rentals/{id}/activate", post(admin::activate_rental))
        .route("/rentals/{id}/complete", post(admin::complete_rental))
        .route("/rentals/{id}/cancel", post(admin::cancel_rental))
        .route("/stats", get(admin::stats))
        .route("/realtime/rides", get(realtime::watch_all_rides))
        .layer(middleware::from_fn(require_admin))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    // Any signed-in user; ownership is checked per stream
    let realtime_routes = Router::new()
        .route("/rides/{id}", get(realtime::watch_ride))
        .route("/rentals/{id}", get(realtime::watch_rental))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api", public_routes)
        .nest("/api/rides", ride_routes)
        .nest("/api/rentals", rental_routes)
        .nest("/api/driver", driver_routes)
        .nest("/api/admin", admin_routes)
        .nest("/api/realtime", realtime_routes)
        .route("/health", get(|| async { "ok" }))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
    };
    use sea_orm::DatabaseConnection;
    use tower::ServiceExt;
    use uuid::Uuid;

    use crate::entities::user::UserRole;
    use crate::test_support::{self, SECRET};
    use crate::utils::jwt::Claims;

    fn state() -> AppState {
        test_support::state(DatabaseConnection::Disconnected)
    }

    fn token(role: UserRole) -> String {
        Claims::new(Uuid::new_v4(), "user@test", role, 1)
            .encode(SECRET)
            .unwrap()
    }

    async fn get(uri: &str, bearer: Option<&str>) -> (StatusCode, String) {
        let mut request = Request::builder().uri(uri);
        if let Some(token) = bearer {
            request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }

        let response = create_router(state())
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8_lossy(&body).into_owned())
    }

    #[tokio::test]
    async fn health_check() {
        let (status, body) = get("/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");
    }

    #[tokio::test]
    async fn missing_token_is_rejected() {
        let (status, _) = get("/api/rides", None).await;
        assert!(status.is_client_error());
    }

    #[tokio::test]
    async fn invalid_token_is_unauthorized() {
        let (status, body) = get("/api/rides", Some("not-a-jwt")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.contains("Invalid token"));
    }

    #[tokio::test]
    async fn passenger_cannot_use_driver_routes() {
        let (status, body) = get("/api/driver/profile", Some(&token(UserRole::Passenger))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(body.contains("Driver access required"));
    }

    #[tokio::test]
    async fn driver_cannot_use_admin_routes() {
        let (status, _) = get("/api/admin/realtime/rides", Some(&token(UserRole::Driver))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = get("/api/admin/stats", Some(&token(UserRole::Passenger))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn driver_cannot_book_rentals() {
        let (status, body) = get("/api/rentals", Some(&token(UserRole::Driver))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(body.contains("Passenger access required"));
    }
}
