use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 5,
        "name": "Kitchen crew",
        "description": "Meal prep and service",
        "created_at": "2026-01-15T00:00:00Z"
    })
)]
pub struct Group {
    #[schema(example = 5)]
    pub id: u64,

    #[schema(example = "Kitchen crew")]
    pub name: String,

    #[schema(example = "Meal prep and service", nullable = true)]
    pub description: Option<String>,

    #[schema(example = "2026-01-15T00:00:00Z", value_type = String, format = "date-time")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Membership row. `is_admin` marks a group-admin: a volunteer who may
/// manage this group's membership and approve hours logged against it.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct GroupMember {
    pub id: u64,
    pub group_id: u64,
    pub volunteer_id: u64,
    pub is_admin: bool,
    #[schema(value_type = String, format = "date-time")]
    pub joined_at: Option<DateTime<Utc>>,
}

/// Ids of the groups this volunteer administers. Fetched once per request by
/// handlers that feed the capability check.
pub async fn admin_group_ids(pool: &MySqlPool, volunteer_id: u64) -> Result<Vec<u64>, sqlx::Error> {
    sqlx::query_scalar::<_, u64>(
        "SELECT group_id FROM group_members WHERE volunteer_id = ? AND is_admin = TRUE",
    )
    .bind(volunteer_id)
    .fetch_all(pool)
    .await
}

/// True when the volunteer belongs to the group at all (admin or not).
pub async fn is_member(
    pool: &MySqlPool,
    group_id: u64,
    volunteer_id: u64,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM group_members WHERE group_id = ? AND volunteer_id = ? LIMIT 1)",
    )
    .bind(group_id)
    .bind(volunteer_id)
    .fetch_one(pool)
    .await
}
