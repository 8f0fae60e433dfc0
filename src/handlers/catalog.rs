use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::car_rental::DurationType;
use crate::entities::{car_category, rental_car};
use crate::error::{AppError, AppResult};
use crate::handlers::common::{find_rental_car, Location};
use crate::utils::fare::{round_currency, RateScaling, Tariff};
use crate::utils::rental::{rental_duration, rental_price};
use crate::AppState;

// ============ Ride categories & fares ============

#[derive(Debug, Serialize)]
pub struct CategoryInfo {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub base_fare: f64,
    pub price_per_km: f64,
    pub minimum_fare: f64,
    pub capacity: i32,
}

impl From<car_category::Model> for CategoryInfo {
    fn from(c: car_category::Model) -> Self {
        Self {
            id: c.id,
            name: c.name,
            description: c.description,
            base_fare: c.base_fare,
            price_per_km: c.price_per_km,
            minimum_fare: c.minimum_fare,
            capacity: c.capacity,
        }
    }
}

/// List bookable ride categories
pub async fn list_categories(State(state): State<AppState>) -> AppResult<Json<Vec<CategoryInfo>>> {
    let categories = car_category::Entity::find()
        .filter(car_category::Column::IsActive.eq(true))
        .order_by_asc(car_category::Column::BaseFare)
        .all(&state.db)
        .await?;

    Ok(Json(categories.into_iter().map(CategoryInfo::from).collect()))
}

#[derive(Debug, Deserialize)]
pub struct FareEstimateRequest {
    pub pickup: Location,
    pub dropoff: Location,
    /// Estimate a single category; all active categories when omitted
    pub category_id: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct CategoryFare {
    pub category_id: i32,
    pub category: String,
    pub capacity: i32,
    pub fare: f64,
}

#[derive(Debug, Serialize)]
pub struct FareEstimateResponse {
    pub distance_km: f64,
    pub rate_scaling: RateScaling,
    pub estimates: Vec<CategoryFare>,
}

pub fn estimate_for(
    category: &car_category::Model,
    distance_km: f64,
    scaling: RateScaling,
) -> CategoryFare {
    CategoryFare {
        category_id: category.id,
        category: category.name.clone(),
        capacity: category.capacity,
        fare: round_currency(Tariff::from(category).fare(distance_km, scaling)),
    }
}

/// Estimate the fare of a trip
pub async fn estimate_fare(
    State(state): State<AppState>,
    Json(payload): Json<FareEstimateRequest>,
) -> AppResult<Json<FareEstimateResponse>> {
    payload.pickup.validate("pickup")?;
    payload.dropoff.validate("dropoff")?;

    let distance = payload.pickup.point().distance_to(&payload.dropoff.point());
    let scaling = state.config.fare_rate_scaling;

    let mut query = car_category::Entity::find()
        .filter(car_category::Column::IsActive.eq(true))
        .order_by_asc(car_category::Column::BaseFare);
    if let Some(category_id) = payload.category_id {
        query = query.filter(car_category::Column::Id.eq(category_id));
    }
    let categories = query.all(&state.db).await?;

    if payload.category_id.is_some() && categories.is_empty() {
        return Err(AppError::BadRequest("Invalid car category".to_string()));
    }

    Ok(Json(FareEstimateResponse {
        distance_km: round_currency(distance),
        rate_scaling: scaling,
        estimates: categories
            .iter()
            .map(|c| estimate_for(c, distance, scaling))
            .collect(),
    }))
}

// ============ Rental cars ============

#[derive(Debug, Serialize)]
pub struct RentalCarInfo {
    pub id: Uuid,
    pub make: String,
    pub model: String,
    pub year: i32,
    pub seats: i32,
    pub transmission: String,
    pub fuel_type: String,
    pub features: Vec<String>,
    pub image_url: Option<String>,
    pub price_per_hour: f64,
    pub price_per_day: f64,
    pub location: String,
    pub is_available: bool,
}

impl From<rental_car::Model> for RentalCarInfo {
    fn from(car: rental_car::Model) -> Self {
        let features = car.feature_list();
        Self {
            id: car.id,
            make: car.make,
            model: car.model,
            year: car.year,
            seats: car.seats,
            transmission: car.transmission,
            fuel_type: car.fuel_type,
            features,
            image_url: car.image_url,
            price_per_hour: car.price_per_hour,
            price_per_day: car.price_per_day,
            location: car.location,
            is_available: car.is_available,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RentalCarFilter {
    pub location: Option<String>,
    pub min_seats: Option<i32>,
}

/// List available rental cars
pub async fn list_rental_cars(
    State(state): State<AppState>,
    Query(filter): Query<RentalCarFilter>,
) -> AppResult<Json<Vec<RentalCarInfo>>> {
    let mut query = rental_car::Entity::find()
        .filter(rental_car::Column::IsAvailable.eq(true))
        .order_by_asc(rental_car::Column::PricePerDay);

    if let Some(location) = filter.location.filter(|l| !l.trim().is_empty()) {
        query = query.filter(rental_car::Column::Location.contains(location.trim()));
    }
    if let Some(seats) = filter.min_seats {
        query = query.filter(rental_car::Column::Seats.gte(seats));
    }

    let cars = query.all(&state.db).await?;
    Ok(Json(cars.into_iter().map(RentalCarInfo::from).collect()))
}

pub async fn get_rental_car(
    State(state): State<AppState>,
    Path(car_id): Path<Uuid>,
) -> AppResult<Json<RentalCarInfo>> {
    let car = find_rental_car(&state.db, car_id).await?;
    Ok(Json(car.into()))
}

#[derive(Debug, Deserialize)]
pub struct RentalQuoteRequest {
    pub car_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_type: DurationType,
}

#[derive(Debug, Serialize)]
pub struct RentalQuote {
    pub car_id: Uuid,
    pub duration_type: DurationType,
    pub duration_value: i64,
    pub unit_rate: f64,
    pub total_price: f64,
}

/// Price a rental window for a car; zero-length windows are rejected
pub fn quote_rental(
    car: &rental_car::Model,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    kind: DurationType,
) -> AppResult<RentalQuote> {
    let duration = rental_duration(start, end, kind);
    if duration == 0 {
        return Err(AppError::BadRequest(
            "End time must be after start time".to_string(),
        ));
    }

    let unit_rate = car.unit_rate(kind);
    Ok(RentalQuote {
        car_id: car.id,
        duration_type: kind,
        duration_value: duration,
        unit_rate,
        total_price: rental_price(unit_rate, duration),
    })
}

pub async fn rental_quote(
    State(state): State<AppState>,
    Json(payload): Json<RentalQuoteRequest>,
) -> AppResult<Json<RentalQuote>> {
    let car = find_rental_car(&state.db, payload.car_id).await?;
    let quote = quote_rental(&car, payload.start_time, payload.end_time, payload.duration_type)?;
    Ok(Json(quote))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn car() -> rental_car::Model {
        rental_car::Model {
            id: Uuid::new_v4(),
            make: "Toyota".to_string(),
            model: "RAV4".to_string(),
            year: 2021,
            seats: 5,
            transmission: "automatic".to_string(),
            fuel_type: "petrol".to_string(),
            features: json!(["AC"]),
            image_url: None,
            price_per_hour: 8.5,
            price_per_day: 60.0,
            location: "Kigali".to_string(),
            is_available: true,
            created_at: Utc::now().into(),
        }
    }

    fn category() -> car_category::Model {
        car_category::Model {
            id: 1,
            name: "Standard".to_string(),
            description: None,
            base_fare: 2.5,
            price_per_km: 1.2,
            minimum_fare: 5.0,
            capacity: 4,
            is_active: true,
        }
    }

    #[test]
    fn quote_uses_rate_for_duration_type() {
        let start = Utc.with_ymd_and_hms(2024, 7, 1, 10, 0, 0).unwrap();

        let hourly = quote_rental(&car(), start, start + Duration::minutes(150), DurationType::Hourly).unwrap();
        assert_eq!(hourly.duration_value, 3);
        // 8.5 * 3 = 25.5 rounds to 26
        assert_eq!(hourly.total_price, 26.0);

        let daily = quote_rental(&car(), start, start + Duration::hours(25), DurationType::Daily).unwrap();
        assert_eq!(daily.duration_value, 2);
        assert_eq!(daily.total_price, 120.0);
    }

    #[test]
    fn empty_window_is_rejected() {
        let start = Utc.with_ymd_and_hms(2024, 7, 1, 10, 0, 0).unwrap();
        assert!(matches!(
            quote_rental(&car(), start, start, DurationType::Daily),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn category_estimate_rounds_to_cents() {
        let estimate = estimate_for(&category(), 7.333, RateScaling::Flat);
        assert_eq!(estimate.fare, 11.3);
        assert_eq!(estimate.category, "Standard");
    }
}
