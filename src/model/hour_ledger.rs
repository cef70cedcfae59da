use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// An (hours, minutes) pair normalized so that `minutes < 60`.
///
/// Used for ledger rows, the check-out response duration, and report totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct HoursMinutes {
    #[schema(example = 3)]
    pub hours: u32,
    #[schema(example = 30)]
    pub minutes: u32,
}

impl HoursMinutes {
    pub fn from_minutes(total: u32) -> Self {
        HoursMinutes {
            hours: total / 60,
            minutes: total % 60,
        }
    }

    /// Carries overflowing minutes into hours, e.g. (1, 75) becomes (2, 15).
    pub fn normalize(hours: u32, minutes: u32) -> Self {
        Self::from_minutes(hours * 60 + minutes)
    }

    pub fn total_minutes(&self) -> u32 {
        self.hours * 60 + self.minutes
    }
}

/// One row of the hour ledger: either a manual ad-hoc entry logged by a
/// volunteer, or the entry derived exactly once when an attendance record is
/// closed (`attendance_id` set). Immutable after creation except for the
/// approval fields, which only an administrative actor touches.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 11,
        "volunteer_id": 3,
        "group_id": null,
        "attendance_id": 42,
        "hours": 3,
        "minutes": 30,
        "description": "Worked shift: Food bank sorting",
        "entry_date": "2026-03-01",
        "approved": false,
        "approved_by": null,
        "approved_at": null,
        "created_at": "2026-03-01T12:30:00Z"
    })
)]
pub struct HourLedgerEntry {
    #[schema(example = 11)]
    pub id: u64,

    #[schema(example = 3)]
    pub volunteer_id: u64,

    #[schema(example = 5, nullable = true)]
    pub group_id: Option<u64>,

    /// Present when this entry was derived from a check-out.
    #[schema(example = 42, nullable = true)]
    pub attendance_id: Option<u64>,

    #[schema(example = 3)]
    pub hours: u32,

    #[schema(example = 30, maximum = 59)]
    pub minutes: u32,

    #[schema(example = "Worked shift: Food bank sorting")]
    pub description: String,

    /// The day the activity occurred; for derived entries, the check-in day.
    #[schema(example = "2026-03-01", value_type = String, format = "date")]
    pub entry_date: NaiveDate,

    #[schema(example = false)]
    pub approved: bool,

    #[schema(example = 1, nullable = true)]
    pub approved_by: Option<u64>,

    #[schema(example = "2026-03-02T08:00:00Z", value_type = String, format = "date-time", nullable = true)]
    pub approved_at: Option<DateTime<Utc>>,

    #[schema(example = "2026-03-01T12:30:00Z", value_type = String, format = "date-time")]
    pub created_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_minutes_splits_whole_hours() {
        // the 210-minute shift from check-in 09:00 to check-out 12:30
        let hm = HoursMinutes::from_minutes(210);
        assert_eq!(hm, HoursMinutes { hours: 3, minutes: 30 });
    }

    #[test]
    fn test_minutes_stay_below_sixty() {
        for total in [0, 1, 59, 60, 61, 119, 120, 599, 1440] {
            let hm = HoursMinutes::from_minutes(total);
            assert!(hm.minutes < 60, "minutes {} not normalized", hm.minutes);
            assert_eq!(hm.total_minutes(), total);
        }
    }

    #[test]
    fn test_normalize_carries_overflow() {
        assert_eq!(
            HoursMinutes::normalize(1, 75),
            HoursMinutes { hours: 2, minutes: 15 }
        );
        assert_eq!(
            HoursMinutes::normalize(0, 0),
            HoursMinutes { hours: 0, minutes: 0 }
        );
        assert_eq!(
            HoursMinutes::normalize(2, 59),
            HoursMinutes { hours: 2, minutes: 59 }
        );
    }

    #[test]
    fn test_sum_of_entries_normalizes() {
        // {2h00, 1h45, 0h30} must aggregate to 4h15
        let entries = [
            HoursMinutes { hours: 2, minutes: 0 },
            HoursMinutes { hours: 1, minutes: 45 },
            HoursMinutes { hours: 0, minutes: 30 },
        ];
        let total: u32 = entries.iter().map(HoursMinutes::total_minutes).sum();
        assert_eq!(
            HoursMinutes::from_minutes(total),
            HoursMinutes { hours: 4, minutes: 15 }
        );
    }
}
