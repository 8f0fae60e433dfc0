use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::entities::ride::{self, RideStatus};
use crate::utils::fare::round_currency;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EarningsSummary {
    pub total_rides: u64,
    pub total_earnings: f64,
    pub today_earnings: f64,
    pub week_earnings: f64,
    pub average_fare: f64,
    pub average_rating: Option<f64>,
}

/// Fare a completed ride actually earned
pub fn earned_fare(ride: &ride::Model) -> f64 {
    ride.final_fare.unwrap_or(ride.estimated_fare)
}

/// Aggregate a driver's completed rides. Rides in any other status are ignored.
/// "Today" is the UTC calendar day of `now`; the week is the trailing seven days.
pub fn summarize_earnings(rides: &[ride::Model], now: DateTime<Utc>) -> EarningsSummary {
    let today = now.date_naive();
    let week_start = now - Duration::days(7);

    let mut total_rides = 0u64;
    let mut total = 0.0;
    let mut today_total = 0.0;
    let mut week_total = 0.0;
    let mut rating_sum = 0i64;
    let mut rated = 0i64;

    for ride in rides.iter().filter(|r| r.status == RideStatus::Completed) {
        let fare = earned_fare(ride);
        total_rides += 1;
        total += fare;

        let finished = ride
            .completed_at
            .unwrap_or(ride.created_at)
            .with_timezone(&Utc);
        if finished.date_naive() == today {
            today_total += fare;
        }
        if finished >= week_start {
            week_total += fare;
        }

        if let Some(rating) = ride.rating {
            rating_sum += i64::from(rating);
            rated += 1;
        }
    }

    let average_fare = if total_rides > 0 {
        round_currency(total / total_rides as f64)
    } else {
        0.0
    };

    EarningsSummary {
        total_rides,
        total_earnings: round_currency(total),
        today_earnings: round_currency(today_total),
        week_earnings: round_currency(week_total),
        average_fare,
        average_rating: (rated > 0).then(|| rating_sum as f64 / rated as f64),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::ride::PaymentMethod;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn ride_at(
        status: RideStatus,
        completed_at: DateTime<Utc>,
        estimated: f64,
        final_fare: Option<f64>,
        rating: Option<i32>,
    ) -> ride::Model {
        ride::Model {
            id: Uuid::new_v4(),
            passenger_id: Uuid::new_v4(),
            driver_id: Some(Uuid::new_v4()),
            category_id: 1,
            pickup_lat: 0.0,
            pickup_lng: 0.0,
            pickup_address: String::new(),
            dropoff_lat: 0.0,
            dropoff_lng: 0.0,
            dropoff_address: String::new(),
            distance_km: 1.0,
            status,
            estimated_fare: estimated,
            final_fare,
            payment_method: PaymentMethod::Cash,
            rating,
            feedback: None,
            created_at: (completed_at - Duration::minutes(30)).into(),
            accepted_at: None,
            started_at: None,
            completed_at: (status == RideStatus::Completed).then(|| completed_at.into()),
            cancelled_at: None,
        }
    }

    #[test]
    fn empty_history() {
        let summary = summarize_earnings(&[], Utc::now());
        assert_eq!(summary.total_rides, 0);
        assert_eq!(summary.total_earnings, 0.0);
        assert_eq!(summary.average_fare, 0.0);
        assert_eq!(summary.average_rating, None);
    }

    #[test]
    fn buckets_completed_rides_by_day_and_week() {
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 18, 0, 0).unwrap();
        let rides = vec![
            ride_at(RideStatus::Completed, now - Duration::hours(2), 10.0, Some(12.0), Some(5)),
            ride_at(RideStatus::Completed, now - Duration::days(3), 8.0, None, Some(3)),
            ride_at(RideStatus::Completed, now - Duration::days(20), 20.0, None, None),
            ride_at(RideStatus::Cancelled, now - Duration::hours(1), 99.0, None, None),
        ];

        let summary = summarize_earnings(&rides, now);
        assert_eq!(summary.total_rides, 3);
        assert_eq!(summary.total_earnings, 40.0);
        assert_eq!(summary.today_earnings, 12.0);
        assert_eq!(summary.week_earnings, 20.0);
        assert_eq!(summary.average_fare, 13.33);
        assert_eq!(summary.average_rating, Some(4.0));
    }
}
