use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One check-in/check-out bracket for a volunteer on a shift.
///
/// A record is *open* while `check_out_time` is NULL. Per (volunteer, shift)
/// pair at most one record may be open at a time. A record is closed exactly
/// once by check-out, which fixes `duration_minutes` and derives one hour
/// ledger entry; it is never reopened and never deleted by normal flow.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 42,
        "volunteer_id": 3,
        "shift_id": 7,
        "check_in_time": "2026-03-01T09:00:00",
        "check_out_time": "2026-03-01T12:30:00",
        "duration_minutes": 210,
        "notes": "front desk"
    })
)]
pub struct AttendanceRecord {
    #[schema(example = 42)]
    pub id: u64,

    #[schema(example = 3)]
    pub volunteer_id: u64,

    #[schema(example = 7)]
    pub shift_id: u64,

    #[schema(example = "2026-03-01T09:00:00", value_type = String, format = "date-time")]
    pub check_in_time: NaiveDateTime,

    /// Absent while the record is open.
    #[schema(example = "2026-03-01T12:30:00", value_type = String, format = "date-time", nullable = true)]
    pub check_out_time: Option<NaiveDateTime>,

    /// Whole minutes of presence, fixed at check-out.
    #[schema(example = 210, nullable = true)]
    pub duration_minutes: Option<u32>,

    #[schema(example = "front desk", nullable = true)]
    pub notes: Option<String>,
}

impl AttendanceRecord {
    pub fn is_open(&self) -> bool {
        self.check_out_time.is_none()
    }
}

/// Whole minutes between check-in and check-out, floored, clamped to zero.
///
/// A negative raw delta means the wall clock moved backwards between the two
/// requests; the record gets 0 minutes and a warning rather than a negative
/// ledger entry.
pub fn duration_minutes(check_in: NaiveDateTime, check_out: NaiveDateTime) -> u32 {
    let seconds = check_out.signed_duration_since(check_in).num_seconds();
    if seconds < 0 {
        tracing::warn!(
            %check_in,
            %check_out,
            "check-out earlier than check-in, clamping duration to 0"
        );
        return 0;
    }
    (seconds / 60) as u32
}

/// Check-out notes are appended to whatever was written at check-in, never
/// overwriting it. Blank additions leave the existing notes untouched.
pub fn append_notes(existing: Option<&str>, addition: Option<&str>) -> Option<String> {
    let addition = addition.map(str::trim).filter(|s| !s.is_empty());
    match (existing, addition) {
        (Some(old), Some(new)) => Some(format!("{}\n{}", old, new)),
        (Some(old), None) => Some(old.to_string()),
        (None, Some(new)) => Some(new.to_string()),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 1)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn test_duration_three_and_a_half_hours() {
        // 09:00:00 -> 12:30:00 is exactly 210 minutes
        assert_eq!(duration_minutes(at(9, 0, 0), at(12, 30, 0)), 210);
    }

    #[test]
    fn test_duration_floors_partial_minutes() {
        assert_eq!(duration_minutes(at(9, 0, 0), at(9, 0, 59)), 0);
        assert_eq!(duration_minutes(at(9, 0, 0), at(9, 1, 59)), 1);
    }

    #[test]
    fn test_duration_never_negative() {
        // clock skew: check-out before check-in clamps to zero
        assert_eq!(duration_minutes(at(12, 0, 0), at(9, 0, 0)), 0);
        assert_eq!(duration_minutes(at(9, 0, 0), at(9, 0, 0)), 0);
    }

    #[test]
    fn test_duration_across_midnight() {
        let check_in = NaiveDate::from_ymd_opt(2026, 3, 1)
            .unwrap()
            .and_hms_opt(23, 0, 0)
            .unwrap();
        let check_out = NaiveDate::from_ymd_opt(2026, 3, 2)
            .unwrap()
            .and_hms_opt(1, 30, 0)
            .unwrap();
        assert_eq!(duration_minutes(check_in, check_out), 150);
    }

    #[test]
    fn test_notes_append_keeps_existing() {
        assert_eq!(
            append_notes(Some("front desk"), Some("restocked shelves")),
            Some("front desk\nrestocked shelves".to_string())
        );
        assert_eq!(
            append_notes(Some("front desk"), None),
            Some("front desk".to_string())
        );
        assert_eq!(
            append_notes(Some("front desk"), Some("   ")),
            Some("front desk".to_string())
        );
        assert_eq!(append_notes(None, Some("late start")), Some("late start".to_string()));
        assert_eq!(append_notes(None, None), None);
    }

    #[test]
    fn test_open_state() {
        let mut rec = AttendanceRecord {
            id: 1,
            volunteer_id: 2,
            shift_id: 3,
            check_in_time: at(9, 0, 0),
            check_out_time: None,
            duration_minutes: None,
            notes: None,
        };
        assert!(rec.is_open());
        rec.check_out_time = Some(at(12, 30, 0));
        assert!(!rec.is_open());
    }
}
