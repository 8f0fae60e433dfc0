use axum::{
    extract::{Path, State},
    Extension, Json,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::ride::{self, RideStatus};
use crate::entities::{driver, user};
use crate::error::{AppError, AppResult};
use crate::handlers::common::{
    find_ride, publish_ride, ride_response, ride_responses, transition_ride, update_ride_status,
    DriverInfo, RideResponse,
};
use crate::realtime::{ChangeEvent, ChangeKind, Table};
use crate::utils::earnings::{summarize_earnings, EarningsSummary};
use crate::utils::fare::round_currency;
use crate::utils::geo::{eta_minutes, GeoPoint};
use crate::utils::jwt::Claims;
use crate::AppState;

async fn my_profile(state: &AppState, claims: &Claims) -> AppResult<driver::Model> {
    driver::Entity::find_by_id(claims.sub)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Driver profile not found".to_string()))
}

async fn save_profile(state: &AppState, active: driver::ActiveModel) -> AppResult<driver::Model> {
    let updated = active.update(&state.db).await?;
    state.feed.publish(ChangeEvent::new(
        Table::Drivers,
        ChangeKind::Update,
        updated.id,
        &updated,
    ));
    Ok(updated)
}

pub async fn profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<DriverInfo>> {
    let profile = my_profile(&state, &claims).await?;
    let account = user::Entity::find_by_id(claims.sub).one(&state.db).await?;
    Ok(Json(DriverInfo::new(&profile, account.as_ref())))
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityRequest {
    pub is_available: bool,
}

#[derive(Debug, Serialize)]
pub struct AvailabilityResponse {
    pub is_available: bool,
    pub location: Option<GeoPoint>,
}

/// Go online or offline
pub async fn set_availability(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<AvailabilityRequest>,
) -> AppResult<Json<AvailabilityResponse>> {
    let profile = my_profile(&state, &claims).await?;

    let mut active: driver::ActiveModel = profile.into();
    active.is_available = Set(payload.is_available);
    active.updated_at = Set(Utc::now().into());
    let updated = save_profile(&state, active).await?;

    tracing::info!(driver_id = %updated.id, is_available = updated.is_available, "Driver availability changed");

    Ok(Json(AvailabilityResponse {
        is_available: updated.is_available,
        location: updated.location(),
    }))
}

/// Report the driver's current position
pub async fn update_location(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<GeoPoint>,
) -> AppResult<Json<AvailabilityResponse>> {
    crate::handlers::common::Location {
        lat: payload.lat,
        lng: payload.lng,
        address: String::new(),
    }
    .validate("driver")?;

    let profile = my_profile(&state, &claims).await?;

    let mut active: driver::ActiveModel = profile.into();
    active.current_lat = Set(Some(payload.lat));
    active.current_lng = Set(Some(payload.lng));
    active.updated_at = Set(Utc::now().into());
    let updated = save_profile(&state, active).await?;

    Ok(Json(AvailabilityResponse {
        is_available: updated.is_available,
        location: updated.location(),
    }))
}

#[derive(Debug, Serialize)]
pub struct PendingRide {
    #[serde(flatten)]
    pub ride: RideResponse,
    /// Distance from the driver to the pickup, when the driver's position is known
    pub pickup_distance_km: Option<f64>,
    pub pickup_eta_minutes: Option<i64>,
}

/// Pending ride requests, nearest pickup first. When the driver has reported a
/// position, requests beyond the match radius are left out.
pub async fn pending_rides(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<Vec<PendingRide>>> {
    let profile = my_profile(&state, &claims).await?;
    let position = profile.location();

    let rides = ride::Entity::find()
        .filter(ride::Column::Status.eq(RideStatus::Pending))
        .order_by_asc(ride::Column::CreatedAt)
        .all(&state.db)
        .await?;

    let mut ranked: Vec<(ride::Model, Option<f64>)> = rides
        .into_iter()
        .map(|r| {
            let distance = position
                .map(|p| p.distance_to(&GeoPoint::new(r.pickup_lat, r.pickup_lng)));
            (r, distance)
        })
        .filter(|(_, d)| d.is_none_or(|d| d <= state.config.match_radius_km))
        .collect();
    ranked.sort_by(|a, b| match (a.1, b.1) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        _ => std::cmp::Ordering::Equal,
    });

    let distances: Vec<Option<f64>> = ranked.iter().map(|(_, d)| *d).collect();
    let responses = ride_responses(&state, ranked.into_iter().map(|(r, _)| r).collect()).await?;

    Ok(Json(
        responses
            .into_iter()
            .zip(distances)
            .map(|(ride, distance)| PendingRide {
                ride,
                pickup_distance_km: distance.map(round_currency),
                pickup_eta_minutes: distance.map(eta_minutes),
            })
            .collect(),
    ))
}

/// Rides assigned to the driver, newest first
pub async fn my_rides(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<Vec<RideResponse>>> {
    let rides = ride::Entity::find()
        .filter(ride::Column::DriverId.eq(claims.sub))
        .order_by_desc(ride::Column::CreatedAt)
        .all(&state.db)
        .await?;

    Ok(Json(ride_responses(&state, rides).await?))
}

async fn assigned_ride(state: &AppState, claims: &Claims, ride_id: Uuid) -> AppResult<ride::Model> {
    let ride = find_ride(&state.db, ride_id).await?;
    if ride.driver_id != Some(claims.sub) {
        return Err(AppError::Forbidden(
            "You are not assigned to this ride".to_string(),
        ));
    }
    Ok(ride)
}

async fn set_available(state: &AppState, driver_id: Uuid, available: bool) -> AppResult<()> {
    if let Some(profile) = driver::Entity::find_by_id(driver_id).one(&state.db).await? {
        let mut active: driver::ActiveModel = profile.into();
        active.is_available = Set(available);
        active.updated_at = Set(Utc::now().into());
        save_profile(state, active).await?;
    }
    Ok(())
}

/// Accept a pending ride
pub async fn accept_ride(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(ride_id): Path<Uuid>,
) -> AppResult<Json<RideResponse>> {
    let profile = my_profile(&state, &claims).await?;
    let ride = find_ride(&state.db, ride_id).await?;

    // One accept at a time per driver; the busy-driver unique index backs this up
    let txn = state.db.begin().await?;
    driver::Entity::find_by_id(profile.id)
        .lock_exclusive()
        .one(&txn)
        .await?;

    let busy = ride::Entity::find()
        .filter(ride::Column::DriverId.eq(profile.id))
        .filter(ride::Column::Status.is_in([RideStatus::Accepted, RideStatus::InProgress]))
        .one(&txn)
        .await?;
    if busy.is_some() {
        return Err(AppError::Conflict(
            "Finish your current ride before accepting another".to_string(),
        ));
    }

    let changes = ride::ActiveModel {
        driver_id: Set(Some(profile.id)),
        accepted_at: Set(Some(Utc::now().into())),
        ..Default::default()
    };
    let updated = update_ride_status(&txn, &ride, RideStatus::Accepted, changes).await?;
    txn.commit().await?;
    publish_ride(&state, ChangeKind::Update, &updated);
    set_available(&state, profile.id, false).await?;

    Ok(Json(ride_response(&state, updated).await?))
}

/// Passenger picked up
pub async fn start_ride(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(ride_id): Path<Uuid>,
) -> AppResult<Json<RideResponse>> {
    let ride = assigned_ride(&state, &claims, ride_id).await?;

    let changes = ride::ActiveModel {
        started_at: Set(Some(Utc::now().into())),
        ..Default::default()
    };
    let updated = transition_ride(&state, &ride, RideStatus::InProgress, changes).await?;

    Ok(Json(ride_response(&state, updated).await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct CompleteRideRequest {
    /// Defaults to the estimated fare
    pub final_fare: Option<f64>,
}

/// Drop-off: settle the fare and free the driver
pub async fn complete_ride(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(ride_id): Path<Uuid>,
    payload: Option<Json<CompleteRideRequest>>,
) -> AppResult<Json<RideResponse>> {
    let ride = assigned_ride(&state, &claims, ride_id).await?;
    let payload = payload.map(|Json(p)| p).unwrap_or_default();

    let final_fare = match payload.final_fare {
        Some(fare) if !fare.is_finite() || fare < 0.0 => {
            return Err(AppError::BadRequest(
                "Final fare must be a non-negative amount".to_string(),
            ));
        }
        Some(fare) => round_currency(fare),
        None => ride.estimated_fare,
    };

    let changes = ride::ActiveModel {
        final_fare: Set(Some(final_fare)),
        completed_at: Set(Some(Utc::now().into())),
        ..Default::default()
    };
    let updated = transition_ride(&state, &ride, RideStatus::Completed, changes).await?;
    set_available(&state, claims.sub, true).await?;

    Ok(Json(ride_response(&state, updated).await?))
}

/// Earnings over the driver's completed rides
pub async fn earnings(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<EarningsSummary>> {
    let rides = ride::Entity::find()
        .filter(ride::Column::DriverId.eq(claims.sub))
        .filter(ride::Column::Status.eq(RideStatus::Completed))
        .all(&state.db)
        .await?;

    Ok(Json(summarize_earnings(&rides, Utc::now())))
}
