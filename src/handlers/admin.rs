use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::car_rental::{self, RentalStatus};
use crate::entities::ride::{self, RideStatus};
use crate::entities::user::{self, UserRole};
use crate::entities::{car_category, driver, rental_car};
use crate::error::{AppError, AppResult};
use crate::handlers::catalog::{CategoryInfo, RentalCarInfo};
use crate::handlers::common::{
    find_rental_car, publish_rental, rental_responses, ride_responses, transition_rental,
    DriverInfo, RentalResponse, RideResponse,
};
use crate::realtime::ChangeKind;
use crate::utils::earnings::earned_fare;
use crate::utils::fare::round_currency;
use crate::AppState;

// ============ Car Categories ============

#[derive(Debug, Deserialize)]
pub struct CategoryRequest {
    pub name: String,
    pub description: Option<String>,
    pub base_fare: f64,
    pub price_per_km: f64,
    pub minimum_fare: f64,
    pub capacity: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

impl CategoryRequest {
    fn validate(&self) -> AppResult<()> {
        if self.name.trim().is_empty() {
            return Err(AppError::BadRequest("Category name is required".to_string()));
        }
        let amounts = [self.base_fare, self.price_per_km, self.minimum_fare];
        if amounts.iter().any(|a| !a.is_finite() || *a < 0.0) {
            return Err(AppError::BadRequest(
                "Fares must be non-negative amounts".to_string(),
            ));
        }
        if self.capacity <= 0 {
            return Err(AppError::BadRequest("Capacity must be positive".to_string()));
        }
        Ok(())
    }
}

/// List all categories, including inactive ones
pub async fn list_categories(State(state): State<AppState>) -> AppResult<Json<Vec<car_category::Model>>> {
    let categories = car_category::Entity::find()
        .order_by_asc(car_category::Column::Id)
        .all(&state.db)
        .await?;
    Ok(Json(categories))
}

pub async fn create_category(
    State(state): State<AppState>,
    Json(payload): Json<CategoryRequest>,
) -> AppResult<Json<CategoryInfo>> {
    payload.validate()?;

    let existing = car_category::Entity::find()
        .filter(car_category::Column::Name.eq(payload.name.trim()))
        .one(&state.db)
        .await?;
    if existing.is_some() {
        return Err(AppError::Conflict("Category name already exists".to_string()));
    }

    let category = car_category::ActiveModel {
        name: Set(payload.name.trim().to_string()),
        description: Set(payload.description),
        base_fare: Set(payload.base_fare),
        price_per_km: Set(payload.price_per_km),
        minimum_fare: Set(payload.minimum_fare),
        capacity: Set(payload.capacity),
        is_active: Set(payload.is_active),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;

    tracing::info!(category_id = category.id, name = %category.name, "Category created");
    Ok(Json(category.into()))
}

pub async fn update_category(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(payload): Json<CategoryRequest>,
) -> AppResult<Json<CategoryInfo>> {
    payload.validate()?;

    let category = car_category::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Category not found".to_string()))?;

    let mut active: car_category::ActiveModel = category.into();
    active.name = Set(payload.name.trim().to_string());
    active.description = Set(payload.description);
    active.base_fare = Set(payload.base_fare);
    active.price_per_km = Set(payload.price_per_km);
    active.minimum_fare = Set(payload.minimum_fare);
    active.capacity = Set(payload.capacity);
    active.is_active = Set(payload.is_active);

    let updated = active.update(&state.db).await?;
    Ok(Json(updated.into()))
}

/// Deactivate a category; rides keep referencing it
pub async fn deactivate_category(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<serde_json::Value>> {
    let category = car_category::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Category not found".to_string()))?;

    let mut active: car_category::ActiveModel = category.into();
    active.is_active = Set(false);
    active.update(&state.db).await?;

    Ok(Json(serde_json::json!({ "message": "Category deactivated" })))
}

// ============ Rental Cars ============

#[derive(Debug, Deserialize)]
pub struct RentalCarRequest {
    pub make: String,
    pub model: String,
    pub year: i32,
    pub seats: i32,
    pub transmission: String,
    pub fuel_type: String,
    #[serde(default)]
    pub features: Vec<String>,
    pub image_url: Option<String>,
    pub price_per_hour: f64,
    pub price_per_day: f64,
    pub location: String,
    #[serde(default = "default_true")]
    pub is_available: bool,
}

impl RentalCarRequest {
    fn validate(&self) -> AppResult<()> {
        if self.make.trim().is_empty() || self.model.trim().is_empty() {
            return Err(AppError::BadRequest("Make and model are required".to_string()));
        }
        let rates = [self.price_per_hour, self.price_per_day];
        if rates.iter().any(|r| !r.is_finite() || *r <= 0.0) {
            return Err(AppError::BadRequest("Rates must be positive".to_string()));
        }
        if self.seats <= 0 {
            return Err(AppError::BadRequest("Seats must be positive".to_string()));
        }
        Ok(())
    }

    fn features_json(&self) -> serde_json::Value {
        serde_json::Value::from(
            self.features
                .iter()
                .map(|f| f.trim().to_string())
                .filter(|f| !f.is_empty())
                .collect::<Vec<_>>(),
        )
    }
}

pub async fn list_rental_cars(State(state): State<AppState>) -> AppResult<Json<Vec<RentalCarInfo>>> {
    let cars = rental_car::Entity::find()
        .order_by_desc(rental_car::Column::CreatedAt)
        .all(&state.db)
        .await?;
    Ok(Json(cars.into_iter().map(RentalCarInfo::from).collect()))
}

pub async fn create_rental_car(
    State(state): State<AppState>,
    Json(payload): Json<RentalCarRequest>,
) -> AppResult<Json<RentalCarInfo>> {
    payload.validate()?;

    let car = rental_car::ActiveModel {
        id: Set(Uuid::new_v4()),
        features: Set(payload.features_json()),
        make: Set(payload.make),
        model: Set(payload.model),
        year: Set(payload.year),
        seats: Set(payload.seats),
        transmission: Set(payload.transmission),
        fuel_type: Set(payload.fuel_type),
        image_url: Set(payload.image_url),
        price_per_hour: Set(payload.price_per_hour),
        price_per_day: Set(payload.price_per_day),
        location: Set(payload.location),
        is_available: Set(payload.is_available),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;

    Ok(Json(car.into()))
}

pub async fn update_rental_car(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RentalCarRequest>,
) -> AppResult<Json<RentalCarInfo>> {
    payload.validate()?;
    let car = find_rental_car(&state.db, id).await?;

    let mut active: rental_car::ActiveModel = car.into();
    active.features = Set(payload.features_json());
    active.make = Set(payload.make);
    active.model = Set(payload.model);
    active.year = Set(payload.year);
    active.seats = Set(payload.seats);
    active.transmission = Set(payload.transmission);
    active.fuel_type = Set(payload.fuel_type);
    active.image_url = Set(payload.image_url);
    active.price_per_hour = Set(payload.price_per_hour);
    active.price_per_day = Set(payload.price_per_day);
    active.location = Set(payload.location);
    active.is_available = Set(payload.is_available);

    let updated = active.update(&state.db).await?;
    Ok(Json(updated.into()))
}

pub async fn delete_rental_car(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<serde_json::Value>> {
    // Same row lock as booking, so no rental can slip in before the delete
    let txn = state.db.begin().await?;
    rental_car::Entity::find_by_id(id)
        .lock_exclusive()
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::NotFound("Rental car not found".to_string()))?;

    let rentals = car_rental::Entity::find()
        .filter(car_rental::Column::CarId.eq(id))
        .all(&txn)
        .await?;
    if rentals.iter().any(|r| r.status.blocks_car()) {
        return Err(AppError::Conflict(
            "Car has pending, confirmed or active rentals".to_string(),
        ));
    }

    rental_car::Entity::delete_by_id(id).exec(&txn).await?;
    txn.commit().await?;

    // Finished and cancelled bookings go with the car
    for rental in &rentals {
        publish_rental(&state, ChangeKind::Delete, rental);
    }
    tracing::info!(car_id = %id, removed_rentals = rentals.len(), "Rental car deleted");

    Ok(Json(serde_json::json!({ "message": "Rental car deleted" })))
}

// ============ Rides, Drivers & Users ============

#[derive(Debug, Deserialize)]
pub struct RideFilter {
    pub status: Option<RideStatus>,
}

pub async fn list_rides(
    State(state): State<AppState>,
    Query(filter): Query<RideFilter>,
) -> AppResult<Json<Vec<RideResponse>>> {
    let mut query = ride::Entity::find().order_by_desc(ride::Column::CreatedAt);
    if let Some(status) = filter.status {
        query = query.filter(ride::Column::Status.eq(status));
    }
    let rides = query.all(&state.db).await?;

    Ok(Json(ride_responses(&state, rides).await?))
}

#[derive(Debug, Serialize)]
pub struct DriverListItem {
    #[serde(flatten)]
    pub driver: DriverInfo,
    pub email: String,
    pub category_id: i32,
    pub is_available: bool,
    pub total_ratings: i32,
}

pub async fn list_drivers(State(state): State<AppState>) -> AppResult<Json<Vec<DriverListItem>>> {
    let drivers = driver::Entity::find().all(&state.db).await?;
    let accounts = user::Entity::find()
        .filter(user::Column::Role.eq(UserRole::Driver))
        .all(&state.db)
        .await?;

    let items = drivers
        .iter()
        .map(|d| {
            let account = accounts.iter().find(|u| u.id == d.id);
            DriverListItem {
                driver: DriverInfo::new(d, account),
                email: account.map(|u| u.email.clone()).unwrap_or_default(),
                category_id: d.category_id,
                is_available: d.is_available,
                total_ratings: d.total_ratings,
            }
        })
        .collect();

    Ok(Json(items))
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
}

pub async fn list_users(State(state): State<AppState>) -> AppResult<Json<Vec<UserResponse>>> {
    let users = user::Entity::find()
        .order_by_desc(user::Column::CreatedAt)
        .all(&state.db)
        .await?;

    Ok(Json(
        users
            .into_iter()
            .map(|u| UserResponse {
                id: u.id,
                email: u.email,
                name: u.name,
                phone: u.phone,
                role: u.role,
                created_at: u.created_at.with_timezone(&Utc),
            })
            .collect(),
    ))
}

// ============ Rentals ============

pub async fn list_rentals(State(state): State<AppState>) -> AppResult<Json<Vec<RentalResponse>>> {
    let rentals = car_rental::Entity::find()
        .order_by_desc(car_rental::Column::CreatedAt)
        .all(&state.db)
        .await?;
    Ok(Json(rental_responses(&state, rentals).await?))
}

async fn move_rental(state: &AppState, id: Uuid, next: RentalStatus) -> AppResult<Json<RentalResponse>> {
    let rental = car_rental::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Rental not found".to_string()))?;

    let updated = transition_rental(state, &rental, next).await?;
    let car = find_rental_car(&state.db, updated.car_id).await.ok();
    Ok(Json(RentalResponse::new(updated, car.as_ref())))
}

pub async fn confirm_rental(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<RentalResponse>> {
    move_rental(&state, id, RentalStatus::Confirmed).await
}

pub async fn activate_rental(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<RentalResponse>> {
    move_rental(&state, id, RentalStatus::Active).await
}

pub async fn complete_rental(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<RentalResponse>> {
    move_rental(&state, id, RentalStatus::Completed).await
}

pub async fn cancel_rental(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<RentalResponse>> {
    move_rental(&state, id, RentalStatus::Cancelled).await
}

// ============ Stats ============

#[derive(Debug, Default, Serialize)]
pub struct RideCounts {
    pub pending: u64,
    pub accepted: u64,
    pub in_progress: u64,
    pub completed: u64,
    pub cancelled: u64,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub rides: RideCounts,
    pub ride_revenue: f64,
    pub rental_revenue: f64,
    pub passengers: u64,
    pub drivers: u64,
    pub available_drivers: u64,
}

pub fn count_rides(rides: &[ride::Model]) -> RideCounts {
    let mut counts = RideCounts::default();
    for r in rides {
        let slot = match r.status {
            RideStatus::Pending => &mut counts.pending,
            RideStatus::Accepted => &mut counts.accepted,
            RideStatus::InProgress => &mut counts.in_progress,
            RideStatus::Completed => &mut counts.completed,
            RideStatus::Cancelled => &mut counts.cancelled,
        };
        *slot += 1;
    }
    counts
}

pub async fn stats(State(state): State<AppState>) -> AppResult<Json<StatsResponse>> {
    let rides = ride::Entity::find().all(&state.db).await?;
    let ride_revenue = rides
        .iter()
        .filter(|r| r.status == RideStatus::Completed)
        .map(earned_fare)
        .sum::<f64>();

    let rental_revenue = car_rental::Entity::find()
        .filter(car_rental::Column::Status.eq(RentalStatus::Completed))
        .all(&state.db)
        .await?
        .iter()
        .map(|r| r.total_price)
        .sum::<f64>();

    let passengers = user::Entity::find()
        .filter(user::Column::Role.eq(UserRole::Passenger))
        .count(&state.db)
        .await?;
    let drivers = driver::Entity::find().count(&state.db).await?;
    let available_drivers = driver::Entity::find()
        .filter(driver::Column::IsAvailable.eq(true))
        .count(&state.db)
        .await?;

    Ok(Json(StatsResponse {
        rides: count_rides(&rides),
        ride_revenue: round_currency(ride_revenue),
        rental_revenue: round_currency(rental_revenue),
        passengers,
        drivers,
        available_drivers,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    use crate::realtime::{ChangeFilter, Table};
    use crate::test_support::{self, postgres, rows_affected};

    #[tokio::test]
    async fn car_with_a_pending_booking_is_not_deleted() {
        let car_id = Uuid::new_v4();
        let start = Utc::now() + Duration::days(1);
        let pending = test_support::rental(
            car_id,
            RentalStatus::Pending,
            start,
            start + Duration::hours(2),
        );
        let mut car = test_support::rental_car();
        car.id = car_id;
        let db = postgres()
            .append_query_results([vec![car]])
            .append_query_results([vec![pending]])
            .into_connection();

        let result = delete_rental_car(State(test_support::state(db)), Path(car_id)).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn deleting_a_car_announces_its_past_bookings() {
        let car_id = Uuid::new_v4();
        let start = Utc::now() - Duration::days(3);
        let finished = test_support::rental(
            car_id,
            RentalStatus::Completed,
            start,
            start + Duration::hours(2),
        );
        let mut car = test_support::rental_car();
        car.id = car_id;
        let db = postgres()
            .append_query_results([vec![car]])
            .append_query_results([vec![finished.clone()]])
            .append_exec_results([rows_affected(1)])
            .into_connection();
        let state = test_support::state(db);
        let mut watcher = state
            .feed
            .subscribe(ChangeFilter::row(Table::CarRentals, finished.id));

        delete_rental_car(State(state.clone()), Path(car_id))
            .await
            .unwrap();

        let event = watcher.next().await.unwrap();
        assert_eq!(event.kind, ChangeKind::Delete);
    }

    #[tokio::test]
    async fn deleting_a_missing_car_is_not_found() {
        let db = postgres()
            .append_query_results([Vec::<rental_car::Model>::new()])
            .into_connection();

        let result = delete_rental_car(State(test_support::state(db)), Path(Uuid::new_v4())).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[test]
    fn counts_rides_per_status() {
        let now = Utc::now();
        let rides = vec![
            test_support::ride(Uuid::new_v4(), None, RideStatus::Pending, now),
            test_support::ride(Uuid::new_v4(), None, RideStatus::Pending, now),
            test_support::ride(Uuid::new_v4(), Some(Uuid::new_v4()), RideStatus::Completed, now),
        ];

        let counts = count_rides(&rides);
        assert_eq!(counts.pending, 2);
        assert_eq!(counts.completed, 1);
        assert_eq!(counts.cancelled, 0);
    }
}
