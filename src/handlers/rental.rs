use axum::{
    extract::{Path, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    TransactionTrait,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::entities::car_rental::{self, DurationType, RentalStatus};
use crate::entities::rental_car;
use crate::error::{AppError, AppResult};
use crate::handlers::catalog::quote_rental;
use crate::handlers::common::{
    find_rental_car, publish_rental, rental_responses, transition_rental, RentalResponse,
};
use crate::realtime::ChangeKind;
use crate::utils::jwt::Claims;
use crate::utils::rental::windows_overlap;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateRentalRequest {
    pub car_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_type: DurationType,
    pub pickup_location: String,
    pub return_location: Option<String>,
}

/// Book a rental car; the price is computed from the car's stored rates
pub async fn create_rental(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateRentalRequest>,
) -> AppResult<Json<RentalResponse>> {
    let car = find_rental_car(&state.db, payload.car_id).await?;
    if !car.is_available {
        return Err(AppError::BadRequest(
            "This car is not available for rent".to_string(),
        ));
    }

    if payload.start_time < Utc::now() {
        return Err(AppError::BadRequest(
            "Rental cannot start in the past".to_string(),
        ));
    }

    let quote = quote_rental(&car, payload.start_time, payload.end_time, payload.duration_type)?;

    let duration_value = i32::try_from(quote.duration_value)
        .map_err(|_| AppError::BadRequest("Rental period is too long".to_string()))?;

    // Bookings of one car queue on its row; the overlap exclusion constraint
    // rejects anything that slips past
    let txn = state.db.begin().await?;
    rental_car::Entity::find_by_id(car.id)
        .lock_exclusive()
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::NotFound("Rental car not found".to_string()))?;

    let bookings = car_rental::Entity::find()
        .filter(car_rental::Column::CarId.eq(car.id))
        .filter(car_rental::Column::Status.is_in(RentalStatus::holding_statuses()))
        .all(&txn)
        .await?;
    let clash = bookings.iter().any(|b| {
        windows_overlap(
            payload.start_time,
            payload.end_time,
            b.start_time.with_timezone(&Utc),
            b.end_time.with_timezone(&Utc),
        )
    });
    if clash {
        return Err(AppError::Conflict(
            "Car is already booked for part of this period".to_string(),
        ));
    }

    let pickup_location = payload.pickup_location.trim().to_string();
    let return_location = payload
        .return_location
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .unwrap_or_else(|| pickup_location.clone());

    let rental = car_rental::ActiveModel {
        id: Set(Uuid::new_v4()),
        car_id: Set(car.id),
        renter_id: Set(claims.sub),
        start_time: Set(payload.start_time.into()),
        end_time: Set(payload.end_time.into()),
        duration_type: Set(quote.duration_type),
        duration_value: Set(duration_value),
        total_price: Set(quote.total_price),
        status: Set(RentalStatus::Pending),
        pickup_location: Set(pickup_location),
        return_location: Set(return_location),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    txn.commit().await?;

    tracing::info!(
        rental_id = %rental.id,
        car_id = %car.id,
        renter_id = %claims.sub,
        total_price = rental.total_price,
        "Rental booked"
    );
    publish_rental(&state, ChangeKind::Insert, &rental);

    Ok(Json(RentalResponse::new(rental, Some(&car))))
}

pub async fn my_rentals(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<Vec<RentalResponse>>> {
    let rentals = car_rental::Entity::find()
        .filter(car_rental::Column::RenterId.eq(claims.sub))
        .order_by_desc(car_rental::Column::StartTime)
        .all(&state.db)
        .await?;

    Ok(Json(rental_responses(&state, rentals).await?))
}

/// Cancel a rental that has not started yet
pub async fn cancel_rental(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(rental_id): Path<Uuid>,
) -> AppResult<Json<RentalResponse>> {
    let rental = car_rental::Entity::find_by_id(rental_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Rental not found".to_string()))?;

    if rental.renter_id != claims.sub {
        return Err(AppError::Forbidden(
            "You can only cancel your own rentals".to_string(),
        ));
    }

    let updated = transition_rental(&state, &rental, RentalStatus::Cancelled).await?;
    let car = find_rental_car(&state.db, updated.car_id).await.ok();

    Ok(Json(RentalResponse::new(updated, car.as_ref())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    use crate::entities::user::UserRole;
    use crate::test_support::{self, postgres};

    fn booking(car_id: Uuid, start: DateTime<Utc>, end: DateTime<Utc>) -> CreateRentalRequest {
        CreateRentalRequest {
            car_id,
            start_time: start,
            end_time: end,
            duration_type: DurationType::Hourly,
            pickup_location: "Kigali Airport".to_string(),
            return_location: None,
        }
    }

    #[tokio::test]
    async fn overlapping_booking_conflicts() {
        let car = test_support::rental_car();
        let start = Utc::now() + Duration::days(2);
        let held = test_support::rental(
            car.id,
            RentalStatus::Pending,
            start + Duration::hours(1),
            start + Duration::hours(5),
        );
        let db = postgres()
            .append_query_results([vec![car.clone()]])
            .append_query_results([vec![car.clone()]])
            .append_query_results([vec![held]])
            .into_connection();
        let state = test_support::state(db);

        let result = create_rental(
            State(state.clone()),
            Extension(test_support::claims(Uuid::new_v4(), UserRole::Passenger)),
            Json(booking(car.id, start, start + Duration::hours(3))),
        )
        .await;
        assert!(matches!(result, Err(AppError::Conflict(_))));

        let log = format!("{:?}", state.db.into_transaction_log());
        assert!(log.contains("FOR UPDATE"));
    }

    #[tokio::test]
    async fn zero_length_booking_is_rejected() {
        let car = test_support::rental_car();
        let start = Utc::now() + Duration::days(2);
        let db = postgres()
            .append_query_results([vec![car.clone()]])
            .into_connection();

        let result = create_rental(
            State(test_support::state(db)),
            Extension(test_support::claims(Uuid::new_v4(), UserRole::Passenger)),
            Json(booking(car.id, start, start)),
        )
        .await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn booking_in_the_past_is_rejected() {
        let car = test_support::rental_car();
        let start = Utc::now() - Duration::hours(2);
        let db = postgres()
            .append_query_results([vec![car.clone()]])
            .into_connection();

        let result = create_rental(
            State(test_support::state(db)),
            Extension(test_support::claims(Uuid::new_v4(), UserRole::Passenger)),
            Json(booking(car.id, start, start + Duration::hours(4))),
        )
        .await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }
}
