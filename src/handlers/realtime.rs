use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    Extension,
};
use futures::stream::{self, Stream};
use sea_orm::EntityTrait;
use uuid::Uuid;

use crate::entities::car_rental;
use crate::entities::ride::RideStatus;
use crate::entities::user::UserRole;
use crate::error::{AppError, AppResult};
use crate::handlers::common::find_ride;
use crate::realtime::{ChangeFilter, Subscription, Table};
use crate::utils::jwt::Claims;
use crate::AppState;

fn into_sse(subscription: Subscription) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let events = stream::unfold(subscription, |mut sub| async move {
        let change = sub.next().await?;
        let event = Event::default()
            .event("change")
            .id(change.record_id.to_string())
            .json_data(&change);
        Some((event, sub))
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}

/// Stream changes of one ride to its passenger, its driver, or an admin
pub async fn watch_ride(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(ride_id): Path<Uuid>,
) -> AppResult<Sse<impl Stream<Item = Result<Event, axum::Error>>>> {
    let ride = find_ride(&state.db, ride_id).await?;

    let allowed = claims.role == UserRole::Admin
        || ride.passenger_id == claims.sub
        || ride.driver_id == Some(claims.sub)
        // drivers may watch open requests they could accept
        || (claims.role == UserRole::Driver
            && ride.driver_id.is_none()
            && ride.status == RideStatus::Pending);
    if !allowed {
        return Err(AppError::Forbidden(
            "You cannot watch this ride".to_string(),
        ));
    }

    tracing::debug!(ride_id = %ride_id, user_id = %claims.sub, "Ride subscription opened");
    Ok(into_sse(
        state.feed.subscribe(ChangeFilter::row(Table::Rides, ride_id)),
    ))
}

/// Stream changes of one rental to its renter or an admin
pub async fn watch_rental(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(rental_id): Path<Uuid>,
) -> AppResult<Sse<impl Stream<Item = Result<Event, axum::Error>>>> {
    let rental = car_rental::Entity::find_by_id(rental_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Rental not found".to_string()))?;

    if claims.role != UserRole::Admin && rental.renter_id != claims.sub {
        return Err(AppError::Forbidden(
            "You cannot watch this rental".to_string(),
        ));
    }

    Ok(into_sse(
        state.feed.subscribe(ChangeFilter::row(Table::CarRentals, rental_id)),
    ))
}

/// Every ride change (admin dashboards)
pub async fn watch_all_rides(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    into_sse(state.feed.subscribe(ChangeFilter::table(Table::Rides)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::test_support::{self, postgres};

    async fn driver_watch(status: RideStatus) -> AppResult<()> {
        let ride = test_support::ride(Uuid::new_v4(), None, status, Utc::now());
        let ride_id = ride.id;
        let db = postgres().append_query_results([vec![ride]]).into_connection();

        watch_ride(
            State(test_support::state(db)),
            Extension(test_support::claims(Uuid::new_v4(), UserRole::Driver)),
            Path(ride_id),
        )
        .await
        .map(|_| ())
    }

    #[tokio::test]
    async fn drivers_may_watch_open_requests() {
        assert!(driver_watch(RideStatus::Pending).await.is_ok());
    }

    #[tokio::test]
    async fn drivers_cannot_watch_closed_unassigned_rides() {
        assert!(matches!(
            driver_watch(RideStatus::Cancelled).await,
            Err(AppError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn strangers_cannot_watch_a_rental() {
        let start = Utc::now();
        let rental = test_support::rental(
            Uuid::new_v4(),
            car_rental::RentalStatus::Confirmed,
            start,
            start + chrono::Duration::hours(2),
        );
        let rental_id = rental.id;
        let db = postgres().append_query_results([vec![rental]]).into_connection();

        let result = watch_rental(
            State(test_support::state(db)),
            Extension(test_support::claims(Uuid::new_v4(), UserRole::Passenger)),
            Path(rental_id),
        )
        .await
        .map(|_| ());
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }
}
