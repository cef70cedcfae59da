use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use utoipa::ToSchema;

/// Registration creates a `Pending` profile; an admin or coordinator moves it
/// to `Active`. Only active volunteers may log in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum VolunteerStatus {
    Pending,
    Active,
    Inactive,
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 1,
        "first_name": "Jane",
        "last_name": "Doe",
        "email": "jane.doe@example.org",
        "phone": "+15551234567",
        "status": "active",
        "joined_at": "2026-01-01T00:00:00Z"
    })
)]
pub struct Volunteer {
    #[schema(example = 1)]
    pub id: u64,

    #[schema(example = "Jane")]
    pub first_name: String,

    #[schema(example = "Doe")]
    pub last_name: String,

    #[schema(example = "jane.doe@example.org")]
    pub email: String,

    #[schema(example = "+15551234567", nullable = true)]
    pub phone: Option<String>,

    #[schema(example = "active")]
    pub status: String,

    #[schema(example = "2026-01-01T00:00:00Z", value_type = String, format = "date-time")]
    pub joined_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_status_round_trip() {
        assert_eq!(VolunteerStatus::Pending.to_string(), "pending");
        assert_eq!(
            VolunteerStatus::from_str("active").unwrap(),
            VolunteerStatus::Active
        );
        assert!(VolunteerStatus::from_str("banned").is_err());
    }
}
