use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use utoipa::ToSchema;

/// `Open` shifts accept sign-ups and check-ins. A shift becomes `Completed`
/// as a side effect of the last check-out after its end time has passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum ShiftStatus {
    Open,
    Completed,
    Cancelled,
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 7,
        "title": "Food bank sorting",
        "description": "Sort and shelve donations",
        "location": "Main warehouse",
        "starts_at": "2026-03-01T09:00:00",
        "ends_at": "2026-03-01T13:00:00",
        "capacity": 8,
        "status": "open",
        "created_at": "2026-02-01T00:00:00Z"
    })
)]
pub struct Shift {
    #[schema(example = 7)]
    pub id: u64,

    #[schema(example = "Food bank sorting")]
    pub title: String,

    #[schema(example = "Sort and shelve donations", nullable = true)]
    pub description: Option<String>,

    #[schema(example = "Main warehouse", nullable = true)]
    pub location: Option<String>,

    #[schema(example = "2026-03-01T09:00:00", value_type = String, format = "date-time")]
    pub starts_at: NaiveDateTime,

    #[schema(example = "2026-03-01T13:00:00", value_type = String, format = "date-time")]
    pub ends_at: NaiveDateTime,

    #[schema(example = 8)]
    pub capacity: u32,

    #[schema(example = "open")]
    pub status: String,

    #[schema(example = "2026-02-01T00:00:00Z", value_type = String, format = "date-time")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Shift {
    pub fn is_open(&self) -> bool {
        self.status == ShiftStatus::Open.to_string()
    }

    /// True once the scheduled window is behind `now`; used by the
    /// check-out side effect that completes a shift.
    pub fn has_ended(&self, now: NaiveDateTime) -> bool {
        self.ends_at <= now
    }
}

/// Roster row: one volunteer assigned to one shift.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct ShiftAssignment {
    pub id: u64,
    pub shift_id: u64,
    pub volunteer_id: u64,
    #[schema(value_type = String, format = "date-time")]
    pub assigned_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn shift_ending(ends_at: NaiveDateTime) -> Shift {
        Shift {
            id: 1,
            title: "t".into(),
            description: None,
            location: None,
            starts_at: ends_at - chrono::Duration::hours(4),
            ends_at,
            capacity: 5,
            status: "open".into(),
            created_at: None,
        }
    }

    #[test]
    fn test_has_ended() {
        let end = NaiveDate::from_ymd_opt(2026, 3, 1)
            .unwrap()
            .and_hms_opt(13, 0, 0)
            .unwrap();
        let s = shift_ending(end);
        assert!(!s.has_ended(end - chrono::Duration::minutes(1)));
        assert!(s.has_ended(end));
        assert!(s.has_ended(end + chrono::Duration::minutes(1)));
    }

    #[test]
    fn test_status_parse() {
        use std::str::FromStr;
        assert_eq!(ShiftStatus::from_str("open").unwrap(), ShiftStatus::Open);
        assert_eq!(
            ShiftStatus::from_str("cancelled").unwrap(),
            ShiftStatus::Cancelled
        );
        assert!(ShiftStatus::from_str("paused").is_err());
    }
}
