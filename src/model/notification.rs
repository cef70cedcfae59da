use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use utoipa::ToSchema;

/// In-app notification row. Delivery is best-effort: writers fire-and-forget
/// and the main operation never waits on or fails with the dispatch.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 9,
        "volunteer_id": 3,
        "message": "Checked out of Food bank sorting: 3h 30m recorded",
        "created_at": "2026-03-01T12:30:00Z",
        "read_at": null
    })
)]
pub struct Notification {
    #[schema(example = 9)]
    pub id: u64,

    #[schema(example = 3)]
    pub volunteer_id: u64,

    #[schema(example = "Checked out of Food bank sorting: 3h 30m recorded")]
    pub message: String,

    #[schema(example = "2026-03-01T12:30:00Z", value_type = String, format = "date-time")]
    pub created_at: Option<DateTime<Utc>>,

    #[schema(example = json!(null), value_type = Option<String>, format = "date-time", nullable = true)]
    pub read_at: Option<DateTime<Utc>>,
}

/// Write a notification on a detached task. Errors are logged, never
/// surfaced: dispatch must not block or fail the operation that triggered it.
pub fn dispatch(pool: MySqlPool, volunteer_id: u64, message: String) {
    actix_web::rt::spawn(async move {
        let result = sqlx::query("INSERT INTO notifications (volunteer_id, message) VALUES (?, ?)")
            .bind(volunteer_id)
            .bind(&message)
            .execute(&pool)
            .await;

        if let Err(e) = result {
            tracing::warn!(error = %e, volunteer_id, "notification dispatch failed");
        }
    });
}
