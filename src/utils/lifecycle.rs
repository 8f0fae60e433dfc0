//! Ride and rental status transitions.

use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use sea_orm::Iterable;
use serde::Serialize;

use crate::entities::car_rental::RentalStatus;
use crate::entities::ride::{self, RideStatus};

/// Which timestamp the cancellation window of an accepted ride is measured from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CancellationAnchor {
    #[default]
    CreatedAt,
    AcceptedAt,
}

impl FromStr for CancellationAnchor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "created" | "created_at" => Ok(CancellationAnchor::CreatedAt),
            "accepted" | "accepted_at" => Ok(CancellationAnchor::AcceptedAt),
            other => Err(format!("unknown cancellation anchor '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CancellationPolicy {
    pub window_minutes: i64,
    pub anchor: CancellationAnchor,
}

impl Default for CancellationPolicy {
    fn default() -> Self {
        Self {
            window_minutes: 5,
            anchor: CancellationAnchor::CreatedAt,
        }
    }
}

impl CancellationPolicy {
    /// Pending rides can always be cancelled; accepted rides only while the
    /// window since the anchor timestamp is still open.
    pub fn can_cancel(
        &self,
        status: RideStatus,
        created_at: DateTime<Utc>,
        accepted_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> bool {
        match status {
            RideStatus::Pending => true,
            RideStatus::Accepted => {
                let anchor = match self.anchor {
                    CancellationAnchor::CreatedAt => created_at,
                    // An accepted ride without an acceptance time falls back to creation
                    CancellationAnchor::AcceptedAt => accepted_at.unwrap_or(created_at),
                };
                now - anchor < Duration::minutes(self.window_minutes)
            }
            _ => false,
        }
    }

    pub fn can_cancel_ride(&self, ride: &ride::Model, now: DateTime<Utc>) -> bool {
        self.can_cancel(
            ride.status,
            ride.created_at.with_timezone(&Utc),
            ride.accepted_at.map(|t| t.with_timezone(&Utc)),
            now,
        )
    }
}

impl RideStatus {
    pub fn can_transition_to(self, next: RideStatus) -> bool {
        use RideStatus::*;

        matches!(
            (self, next),
            (Pending, Accepted)
                | (Accepted, InProgress)
                | (InProgress, Completed)
                | (Pending, Cancelled)
                | (Accepted, Cancelled)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RideStatus::Completed | RideStatus::Cancelled)
    }
}

impl RentalStatus {
    pub fn can_transition_to(self, next: RentalStatus) -> bool {
        use RentalStatus::*;

        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Confirmed, Active)
                | (Active, Completed)
                | (Pending, Cancelled)
                | (Confirmed, Cancelled)
        )
    }

    /// Statuses that hold the car for their time window
    pub fn blocks_car(self) -> bool {
        matches!(
            self,
            RentalStatus::Pending | RentalStatus::Confirmed | RentalStatus::Active
        )
    }

    pub fn holding_statuses() -> Vec<RentalStatus> {
        RentalStatus::iter().filter(|s| s.blocks_car()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn created() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 10, 8, 0, 0).unwrap()
    }

    #[test]
    fn ride_happy_path() {
        assert!(RideStatus::Pending.can_transition_to(RideStatus::Accepted));
        assert!(RideStatus::Accepted.can_transition_to(RideStatus::InProgress));
        assert!(RideStatus::InProgress.can_transition_to(RideStatus::Completed));
    }

    #[test]
    fn ride_rejects_skips_and_reopening() {
        assert!(!RideStatus::Pending.can_transition_to(RideStatus::InProgress));
        assert!(!RideStatus::Pending.can_transition_to(RideStatus::Completed));
        assert!(!RideStatus::InProgress.can_transition_to(RideStatus::Cancelled));
        assert!(!RideStatus::Completed.can_transition_to(RideStatus::Pending));
        assert!(!RideStatus::Cancelled.can_transition_to(RideStatus::Accepted));
        assert!(RideStatus::Completed.is_terminal());
        assert!(RideStatus::Cancelled.is_terminal());
    }

    #[test]
    fn pending_ride_is_always_cancellable() {
        let policy = CancellationPolicy::default();
        let much_later = created() + Duration::hours(3);
        assert!(policy.can_cancel(RideStatus::Pending, created(), None, much_later));
    }

    #[test]
    fn accepted_ride_window_counts_from_creation() {
        let policy = CancellationPolicy::default();
        // Accepted four minutes after creation; only one minute of grace remains
        let accepted = created() + Duration::minutes(4);

        assert!(policy.can_cancel(
            RideStatus::Accepted,
            created(),
            Some(accepted),
            created() + Duration::seconds(299)
        ));
        assert!(!policy.can_cancel(
            RideStatus::Accepted,
            created(),
            Some(accepted),
            created() + Duration::minutes(5)
        ));
    }

    #[test]
    fn accepted_ride_window_can_count_from_acceptance() {
        let policy = CancellationPolicy {
            window_minutes: 5,
            anchor: CancellationAnchor::AcceptedAt,
        };
        let accepted = created() + Duration::minutes(4);

        assert!(policy.can_cancel(
            RideStatus::Accepted,
            created(),
            Some(accepted),
            created() + Duration::minutes(8)
        ));
        assert!(!policy.can_cancel(
            RideStatus::Accepted,
            created(),
            Some(accepted),
            created() + Duration::minutes(9)
        ));
    }

    #[test]
    fn started_or_finished_rides_cannot_be_cancelled() {
        let policy = CancellationPolicy::default();
        for status in [
            RideStatus::InProgress,
            RideStatus::Completed,
            RideStatus::Cancelled,
        ] {
            assert!(!policy.can_cancel(status, created(), None, created()));
        }
    }

    #[test]
    fn rental_transitions() {
        assert!(RentalStatus::Pending.can_transition_to(RentalStatus::Confirmed));
        assert!(RentalStatus::Confirmed.can_transition_to(RentalStatus::Active));
        assert!(RentalStatus::Active.can_transition_to(RentalStatus::Completed));
        assert!(RentalStatus::Confirmed.can_transition_to(RentalStatus::Cancelled));
        assert!(!RentalStatus::Active.can_transition_to(RentalStatus::Cancelled));
        assert!(!RentalStatus::Pending.can_transition_to(RentalStatus::Active));
        assert!(!RentalStatus::Cancelled.blocks_car());
        assert!(RentalStatus::Active.blocks_car());
    }

    #[test]
    fn pending_bookings_hold_the_car() {
        assert_eq!(
            RentalStatus::holding_statuses(),
            vec![
                RentalStatus::Pending,
                RentalStatus::Confirmed,
                RentalStatus::Active
            ]
        );
    }

    #[test]
    fn parses_anchor_names() {
        assert_eq!(
            "accepted".parse::<CancellationAnchor>().unwrap(),
            CancellationAnchor::AcceptedAt
        );
        assert!("whenever".parse::<CancellationAnchor>().is_err());
    }
}
