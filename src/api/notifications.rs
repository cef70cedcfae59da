use crate::auth::auth::AuthUser;
use crate::errors::ApiError;
use crate::model::notification::Notification;
use actix_web::{HttpResponse, web};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct NotificationQuery {
    #[schema(example = 1)]
    /// Pagination page number (start with 1)
    pub page: Option<u64>,
    #[schema(example = 10)]
    /// Pagination per page number
    pub per_page: Option<u64>,
}

#[derive(Serialize, ToSchema)]
pub struct NotificationListResponse {
    pub data: Vec<Notification>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 10)]
    pub per_page: u32,
    #[schema(example = 1)]
    pub total: i64,
}

/* =========================
List own notifications
========================= */
/// Swagger doc for notification_list endpoint
#[utoipa::path(
    get,
    path = "/api/v1/notifications",
    params(NotificationQuery),
    responses(
        (status = 200, description = "Own notifications, newest first", body = NotificationListResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "No volunteer profile")
    ),
    security(("bearer_auth" = [])),
    tag = "Notifications"
)]
pub async fn notification_list(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<NotificationQuery>,
) -> Result<HttpResponse, ApiError> {
    let volunteer_id = auth.require_volunteer()?;

    let per_page = query.per_page.unwrap_or(10).clamp(1, 100);
    let page = query.page.unwrap_or(1).max(1);
    let offset = (page - 1) * per_page;

    let total = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM notifications WHERE volunteer_id = ?",
    )
    .bind(volunteer_id)
    .fetch_one(pool.get_ref())
    .await?;

    let notifications = sqlx::query_as::<_, Notification>(
        r#"
        SELECT id, volunteer_id, message, created_at, read_at
        FROM notifications
        WHERE volunteer_id = ?
        ORDER BY created_at DESC, id DESC
        LIMIT ? OFFSET ?
        "#,
    )
    .bind(volunteer_id)
    .bind(per_page)
    .bind(offset)
    .fetch_all(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(NotificationListResponse {
        data: notifications,
        page: page as u32,
        per_page: per_page as u32,
        total,
    }))
}

/* =========================
Mark one as read
========================= */
/// Swagger doc for mark_read endpoint
#[utoipa::path(
    put,
    path = "/api/v1/notifications/{notification_id}/read",
    params(
        ("notification_id" = u64, Path, description = "ID of the notification")
    ),
    responses(
        (status = 200, description = "The notification, read", body = Notification),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "No volunteer profile"),
        (status = 404, description = "Notification not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Notifications"
)]
pub async fn mark_read(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    let volunteer_id = auth.require_volunteer()?;
    let notification_id = path.into_inner();

    let existing = sqlx::query_as::<_, Notification>(
        r#"
        SELECT id, volunteer_id, message, created_at, read_at
        FROM notifications
        WHERE id = ? AND volunteer_id = ?
        "#,
    )
    .bind(notification_id)
    .bind(volunteer_id)
    .fetch_optional(pool.get_ref())
    .await?
    .ok_or_else(|| ApiError::not_found("Notification not found"))?;

    // Idempotent: a second read keeps the first timestamp
    if existing.read_at.is_none() {
        sqlx::query("UPDATE notifications SET read_at = ? WHERE id = ? AND read_at IS NULL")
            .bind(Utc::now())
            .bind(notification_id)
            .execute(pool.get_ref())
            .await?;
    }

    let notification = sqlx::query_as::<_, Notification>(
        r#"
        SELECT id, volunteer_id, message, created_at, read_at
        FROM notifications
        WHERE id = ?
        "#,
    )
    .bind(notification_id)
    .fetch_one(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(notification))
}
