use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::ride::{self, PaymentMethod, RideStatus};
use crate::entities::{driver, user};
use crate::error::{AppError, AppResult};
use crate::handlers::common::{
    find_active_category, find_ride, publish_ride, ride_response, ride_responses,
    transition_ride, DriverInfo, Location, RideResponse,
};
use crate::realtime::ChangeKind;
use crate::utils::fare::{round_currency, Tariff};
use crate::utils::geo::{find_nearest_driver, DriverCandidate, DriverMatch, GeoPoint};
use crate::utils::jwt::Claims;
use crate::AppState;

const OPEN_STATUSES: [RideStatus; 3] = [
    RideStatus::Pending,
    RideStatus::Accepted,
    RideStatus::InProgress,
];

#[derive(Debug, Deserialize)]
pub struct CreateRideRequest {
    pub pickup: Location,
    pub dropoff: Location,
    pub category_id: i32,
    #[serde(default)]
    pub payment_method: PaymentMethod,
}

/// Request a ride. Distance and fare are computed here from the stored tariff.
pub async fn create_ride(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateRideRequest>,
) -> AppResult<Json<RideResponse>> {
    payload.pickup.validate("pickup")?;
    payload.dropoff.validate("dropoff")?;

    let category = find_active_category(&state.db, payload.category_id).await?;

    // A second click on "confirm" must not create a second trip. Requests of
    // one passenger queue on the account row; the partial unique index on
    // open rides catches anything that slips past.
    let txn = state.db.begin().await?;
    user::Entity::find_by_id(claims.sub)
        .lock_exclusive()
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Account no longer exists".to_string()))?;

    let open = ride::Entity::find()
        .filter(ride::Column::PassengerId.eq(claims.sub))
        .filter(ride::Column::Status.is_in(OPEN_STATUSES))
        .one(&txn)
        .await?;
    if open.is_some() {
        return Err(AppError::Conflict(
            "You already have a ride in progress".to_string(),
        ));
    }

    let distance = payload.pickup.point().distance_to(&payload.dropoff.point());
    let fare = Tariff::from(&category).fare(distance, state.config.fare_rate_scaling);

    let new_ride = ride::ActiveModel {
        id: Set(Uuid::new_v4()),
        passenger_id: Set(claims.sub),
        driver_id: Set(None),
        category_id: Set(category.id),
        pickup_lat: Set(payload.pickup.lat),
        pickup_lng: Set(payload.pickup.lng),
        pickup_address: Set(payload.pickup.address),
        dropoff_lat: Set(payload.dropoff.lat),
        dropoff_lng: Set(payload.dropoff.lng),
        dropoff_address: Set(payload.dropoff.address),
        distance_km: Set(round_currency(distance)),
        status: Set(RideStatus::Pending),
        estimated_fare: Set(round_currency(fare)),
        final_fare: Set(None),
        payment_method: Set(payload.payment_method),
        rating: Set(None),
        feedback: Set(None),
        ..Default::default()
    };

    let ride = new_ride.insert(&txn).await?;
    txn.commit().await?;
    tracing::info!(
        ride_id = %ride.id,
        passenger_id = %claims.sub,
        distance_km = ride.distance_km,
        fare = ride.estimated_fare,
        "Ride requested"
    );
    publish_ride(&state, ChangeKind::Insert, &ride);

    Ok(Json(ride_response(&state, ride).await?))
}

/// List the passenger's rides, newest first
pub async fn my_rides(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<Vec<RideResponse>>> {
    let rides = ride::Entity::find()
        .filter(ride::Column::PassengerId.eq(claims.sub))
        .order_by_desc(ride::Column::CreatedAt)
        .all(&state.db)
        .await?;

    Ok(Json(ride_responses(&state, rides).await?))
}

async fn own_ride(state: &AppState, claims: &Claims, ride_id: Uuid) -> AppResult<ride::Model> {
    let ride = find_ride(&state.db, ride_id).await?;
    if ride.passenger_id != claims.sub {
        return Err(AppError::Forbidden(
            "You can only access your own rides".to_string(),
        ));
    }
    Ok(ride)
}

pub async fn get_ride(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(ride_id): Path<Uuid>,
) -> AppResult<Json<RideResponse>> {
    let ride = own_ride(&state, &claims, ride_id).await?;
    Ok(Json(ride_response(&state, ride).await?))
}

/// Cancel a pending ride, or an accepted one while the grace window is open
pub async fn cancel_ride(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(ride_id): Path<Uuid>,
) -> AppResult<Json<RideResponse>> {
    let ride = own_ride(&state, &claims, ride_id).await?;
    let now = Utc::now();

    if !state.config.cancellation.can_cancel_ride(&ride, now) {
        return Err(AppError::BadRequest(match ride.status {
            RideStatus::Accepted => format!(
                "Accepted rides can only be cancelled within {} minutes",
                state.config.cancellation.window_minutes
            ),
            _ => "This ride can no longer be cancelled".to_string(),
        }));
    }

    let changes = ride::ActiveModel {
        cancelled_at: Set(Some(now.into())),
        ..Default::default()
    };
    let updated = transition_ride(&state, &ride, RideStatus::Cancelled, changes).await?;

    Ok(Json(ride_response(&state, updated).await?))
}

#[derive(Debug, Deserialize)]
pub struct RateRideRequest {
    pub rating: i32,
    pub feedback: Option<String>,
}

/// Rate a completed ride once; the driver's average follows
pub async fn rate_ride(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(ride_id): Path<Uuid>,
    Json(payload): Json<RateRideRequest>,
) -> AppResult<Json<RideResponse>> {
    if !(1..=5).contains(&payload.rating) {
        return Err(AppError::BadRequest(
            "Rating must be between 1 and 5".to_string(),
        ));
    }

    let ride = own_ride(&state, &claims, ride_id).await?;
    if ride.status != RideStatus::Completed {
        return Err(AppError::BadRequest(
            "Only completed rides can be rated".to_string(),
        ));
    }

    let changes = ride::ActiveModel {
        rating: Set(Some(payload.rating)),
        feedback: Set(payload.feedback.filter(|f| !f.trim().is_empty())),
        ..Default::default()
    };

    let txn = state.db.begin().await?;
    let result = ride::Entity::update_many()
        .set(changes)
        .filter(ride::Column::Id.eq(ride.id))
        .filter(ride::Column::Rating.is_null())
        .exec(&txn)
        .await?;
    if result.rows_affected == 0 {
        return Err(AppError::Conflict("Ride has already been rated".to_string()));
    }

    // Both SET expressions read the pre-update row
    if let Some(driver_id) = ride.driver_id {
        driver::Entity::update_many()
            .col_expr(
                driver::Column::Rating,
                Expr::cust_with_values(
                    "(rating * total_ratings + ?) / (total_ratings + 1)",
                    [f64::from(payload.rating)],
                ),
            )
            .col_expr(
                driver::Column::TotalRatings,
                Expr::col(driver::Column::TotalRatings).add(1),
            )
            .col_expr(driver::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(driver::Column::Id.eq(driver_id))
            .exec(&txn)
            .await?;
    }
    txn.commit().await?;

    let updated = find_ride(&state.db, ride.id).await?;
    publish_ride(&state, ChangeKind::Update, &updated);

    Ok(Json(ride_response(&state, updated).await?))
}

#[derive(Debug, Deserialize)]
pub struct NearestDriverQuery {
    pub lat: f64,
    pub lng: f64,
    pub category_id: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct NearestDriverResponse {
    #[serde(flatten)]
    pub matched: DriverMatch,
    pub driver: DriverInfo,
}

/// Closest available driver to a pickup point, if any is within the match radius
pub async fn nearest_driver(
    State(state): State<AppState>,
    Query(query): Query<NearestDriverQuery>,
) -> AppResult<Json<Option<NearestDriverResponse>>> {
    Location {
        lat: query.lat,
        lng: query.lng,
        address: String::new(),
    }
    .validate("pickup")?;

    let mut find = driver::Entity::find()
        .filter(driver::Column::IsAvailable.eq(true))
        .filter(driver::Column::CurrentLat.is_not_null())
        .filter(driver::Column::CurrentLng.is_not_null());
    if let Some(category_id) = query.category_id {
        find = find.filter(driver::Column::CategoryId.eq(category_id));
    }
    let drivers = find.all(&state.db).await?;

    let candidates: Vec<DriverCandidate> = drivers
        .iter()
        .map(|d| DriverCandidate {
            driver_id: d.id,
            location: d.location(),
        })
        .collect();

    let pickup = GeoPoint::new(query.lat, query.lng);
    let Some(matched) = find_nearest_driver(pickup, &candidates, state.config.match_radius_km)
    else {
        tracing::debug!(lat = query.lat, lng = query.lng, "No driver in range");
        return Ok(Json(None));
    };

    let profile = drivers
        .iter()
        .find(|d| d.id == matched.driver_id)
        .ok_or_else(|| AppError::Internal("Matched driver missing".to_string()))?;
    let account = user::Entity::find_by_id(profile.id).one(&state.db).await?;

    Ok(Json(Some(NearestDriverResponse {
        driver: DriverInfo::new(profile, account.as_ref()),
        matched,
    })))
}
