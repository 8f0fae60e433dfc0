//! Lookups, DTOs and status-transition helpers shared by the ride and rental handlers.

use chrono::{DateTime, Utc};
use sea_orm::{ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::car_rental::{self, DurationType, RentalStatus};
use crate::entities::ride::{self, PaymentMethod, RideStatus};
use crate::entities::{car_category, driver, rental_car, user};
use crate::error::{AppError, AppResult};
use crate::realtime::{ChangeEvent, ChangeKind, Table};
use crate::utils::geo::GeoPoint;
use crate::utils::lifecycle::CancellationPolicy;
use crate::AppState;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
    #[serde(default)]
    pub address: String,
}

impl Location {
    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.lat, self.lng)
    }

    /// Reject coordinates outside the valid latitude/longitude ranges
    pub fn validate(&self, label: &str) -> AppResult<()> {
        let valid = self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng);

        if valid {
            Ok(())
        } else {
            Err(AppError::BadRequest(format!("Invalid {} coordinates", label)))
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DriverInfo {
    pub id: Uuid,
    pub name: String,
    pub phone: Option<String>,
    pub vehicle_make: String,
    pub vehicle_model: String,
    pub vehicle_plate: String,
    pub vehicle_color: Option<String>,
    pub rating: f64,
    pub location: Option<GeoPoint>,
}

impl DriverInfo {
    pub fn new(profile: &driver::Model, account: Option<&user::Model>) -> Self {
        Self {
            id: profile.id,
            name: account.map(|u| u.name.clone()).unwrap_or_default(),
            phone: account.and_then(|u| u.phone.clone()),
            vehicle_make: profile.vehicle_make.clone(),
            vehicle_model: profile.vehicle_model.clone(),
            vehicle_plate: profile.vehicle_plate.clone(),
            vehicle_color: profile.vehicle_color.clone(),
            rating: profile.rating,
            location: profile.location(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RideResponse {
    pub id: Uuid,
    pub passenger_id: Uuid,
    pub status: RideStatus,
    pub category: String,
    pub pickup: Location,
    pub dropoff: Location,
    pub distance_km: f64,
    pub estimated_fare: f64,
    pub final_fare: Option<f64>,
    pub payment_method: PaymentMethod,
    pub rating: Option<i32>,
    pub feedback: Option<String>,
    pub driver: Option<DriverInfo>,
    pub can_cancel: bool,
    pub created_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl RideResponse {
    pub fn new(
        ride: ride::Model,
        category: Option<&car_category::Model>,
        driver: Option<DriverInfo>,
        policy: &CancellationPolicy,
        now: DateTime<Utc>,
    ) -> Self {
        let can_cancel = policy.can_cancel_ride(&ride, now);
        let utc = |t: sea_orm::prelude::DateTimeWithTimeZone| t.with_timezone(&Utc);

        Self {
            id: ride.id,
            passenger_id: ride.passenger_id,
            status: ride.status,
            category: category.map(|c| c.name.clone()).unwrap_or_default(),
            pickup: Location {
                lat: ride.pickup_lat,
                lng: ride.pickup_lng,
                address: ride.pickup_address,
            },
            dropoff: Location {
                lat: ride.dropoff_lat,
                lng: ride.dropoff_lng,
                address: ride.dropoff_address,
            },
            distance_km: ride.distance_km,
            estimated_fare: ride.estimated_fare,
            final_fare: ride.final_fare,
            payment_method: ride.payment_method,
            rating: ride.rating,
            feedback: ride.feedback,
            driver,
            can_cancel,
            created_at: utc(ride.created_at),
            accepted_at: ride.accepted_at.map(utc),
            started_at: ride.started_at.map(utc),
            completed_at: ride.completed_at.map(utc),
            cancelled_at: ride.cancelled_at.map(utc),
        }
    }
}

/// Build responses for a batch of rides with one query per related table
pub async fn ride_responses(
    state: &AppState,
    rides: Vec<ride::Model>,
) -> AppResult<Vec<RideResponse>> {
    let categories = car_category::Entity::find().all(&state.db).await?;

    let driver_ids: Vec<Uuid> = rides.iter().filter_map(|r| r.driver_id).collect();
    let (drivers, accounts) = if driver_ids.is_empty() {
        (Vec::new(), Vec::new())
    } else {
        let drivers = driver::Entity::find()
            .filter(driver::Column::Id.is_in(driver_ids.clone()))
            .all(&state.db)
            .await?;
        let accounts = user::Entity::find()
            .filter(user::Column::Id.is_in(driver_ids))
            .all(&state.db)
            .await?;
        (drivers, accounts)
    };

    let now = Utc::now();
    let responses = rides
        .into_iter()
        .map(|r| {
            let category = categories.iter().find(|c| c.id == r.category_id);
            let driver = r.driver_id.and_then(|id| {
                let profile = drivers.iter().find(|d| d.id == id)?;
                Some(DriverInfo::new(profile, accounts.iter().find(|u| u.id == id)))
            });
            RideResponse::new(r, category, driver, &state.config.cancellation, now)
        })
        .collect();

    Ok(responses)
}

pub async fn ride_response(state: &AppState, ride: ride::Model) -> AppResult<RideResponse> {
    ride_responses(state, vec![ride])
        .await?
        .pop()
        .ok_or_else(|| AppError::Internal("Ride response missing".to_string()))
}

pub async fn find_ride<C: ConnectionTrait>(db: &C, ride_id: Uuid) -> AppResult<ride::Model> {
    ride::Entity::find_by_id(ride_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Ride not found".to_string()))
}

pub async fn find_active_category(
    db: &DatabaseConnection,
    category_id: i32,
) -> AppResult<car_category::Model> {
    car_category::Entity::find_by_id(category_id)
        .one(db)
        .await?
        .filter(|c| c.is_active)
        .ok_or_else(|| AppError::BadRequest("Invalid car category".to_string()))
}

pub async fn find_rental_car(db: &DatabaseConnection, car_id: Uuid) -> AppResult<rental_car::Model> {
    rental_car::Entity::find_by_id(car_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Rental car not found".to_string()))
}

/// Apply `changes` only if the ride is still in `current.status`.
///
/// The status check and the write are one statement, so two drivers racing
/// to accept the same ride cannot both succeed. Nothing is published; callers
/// running inside a transaction publish after commit.
pub async fn update_ride_status<C: ConnectionTrait>(
    db: &C,
    current: &ride::Model,
    next: RideStatus,
    mut changes: ride::ActiveModel,
) -> AppResult<ride::Model> {
    if current.status.is_terminal() {
        return Err(AppError::BadRequest(format!(
            "Ride is already {:?}",
            current.status
        )));
    }
    if !current.status.can_transition_to(next) {
        return Err(AppError::BadRequest(format!(
            "Cannot move ride from {:?} to {:?}",
            current.status, next
        )));
    }

    changes.status = sea_orm::Set(next);
    let result = ride::Entity::update_many()
        .set(changes)
        .filter(ride::Column::Id.eq(current.id))
        .filter(ride::Column::Status.eq(current.status))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        return Err(AppError::Conflict(
            "Ride was updated by someone else, refresh and retry".to_string(),
        ));
    }

    let updated = find_ride(db, current.id).await?;
    tracing::info!(
        ride_id = %updated.id,
        from = ?current.status,
        to = ?updated.status,
        "Ride status changed"
    );

    Ok(updated)
}

pub async fn transition_ride(
    state: &AppState,
    current: &ride::Model,
    next: RideStatus,
    changes: ride::ActiveModel,
) -> AppResult<ride::Model> {
    let updated = update_ride_status(&state.db, current, next, changes).await?;
    publish_ride(state, ChangeKind::Update, &updated);
    Ok(updated)
}

/// Same guarded update for rentals
pub async fn transition_rental(
    state: &AppState,
    current: &car_rental::Model,
    next: RentalStatus,
) -> AppResult<car_rental::Model> {
    if !current.status.can_transition_to(next) {
        return Err(AppError::BadRequest(format!(
            "Cannot move rental from {:?} to {:?}",
            current.status, next
        )));
    }

    let changes = car_rental::ActiveModel {
        status: sea_orm::Set(next),
        ..Default::default()
    };
    let result = car_rental::Entity::update_many()
        .set(changes)
        .filter(car_rental::Column::Id.eq(current.id))
        .filter(car_rental::Column::Status.eq(current.status))
        .exec(&state.db)
        .await?;

    if result.rows_affected == 0 {
        return Err(AppError::Conflict(
            "Rental was updated by someone else, refresh and retry".to_string(),
        ));
    }

    let updated = car_rental::Entity::find_by_id(current.id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Rental not found".to_string()))?;

    tracing::info!(
        rental_id = %updated.id,
        from = ?current.status,
        to = ?updated.status,
        "Rental status changed"
    );
    publish_rental(state, ChangeKind::Update, &updated);

    Ok(updated)
}

pub fn publish_ride(state: &AppState, kind: ChangeKind, ride: &ride::Model) {
    state
        .feed
        .publish(ChangeEvent::new(Table::Rides, kind, ride.id, ride));
}

pub fn publish_rental(state: &AppState, kind: ChangeKind, rental: &car_rental::Model) {
    state
        .feed
        .publish(ChangeEvent::new(Table::CarRentals, kind, rental.id, rental));
}

#[derive(Debug, Serialize)]
pub struct RentalResponse {
    pub id: Uuid,
    pub car_id: Uuid,
    pub car: String,
    pub renter_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_type: DurationType,
    pub duration_value: i32,
    pub total_price: f64,
    pub status: RentalStatus,
    pub pickup_location: String,
    pub return_location: String,
    pub created_at: DateTime<Utc>,
}

impl RentalResponse {
    pub fn new(rental: car_rental::Model, car: Option<&rental_car::Model>) -> Self {
        Self {
            id: rental.id,
            car_id: rental.car_id,
            car: car
                .map(|c| format!("{} {} ({})", c.make, c.model, c.year))
                .unwrap_or_default(),
            renter_id: rental.renter_id,
            start_time: rental.start_time.with_timezone(&Utc),
            end_time: rental.end_time.with_timezone(&Utc),
            duration_type: rental.duration_type,
            duration_value: rental.duration_value,
            total_price: rental.total_price,
            status: rental.status,
            pickup_location: rental.pickup_location,
            return_location: rental.return_location,
            created_at: rental.created_at.with_timezone(&Utc),
        }
    }
}

pub async fn rental_responses(
    state: &AppState,
    rentals: Vec<car_rental::Model>,
) -> AppResult<Vec<RentalResponse>> {
    let cars = rental_car::Entity::find().all(&state.db).await?;

    Ok(rentals
        .into_iter()
        .map(|r| {
            let car = cars.iter().find(|c| c.id == r.car_id);
            RentalResponse::new(r, car)
        })
        .collect())
}
