use crate::auth::auth::AuthUser;
use crate::auth::capability::{Action, Resource, authorize};
use crate::errors::{ApiError, is_duplicate_key};
use crate::model::shift::{Shift, ShiftAssignment, ShiftStatus};
use crate::utils::db_utils::{build_update_sql, execute_update};
use actix_web::{HttpResponse, web};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::MySqlPool;
use std::str::FromStr;
use utoipa::{IntoParams, ToSchema};

/// Columns a PUT may touch. Status is owned by the lifecycle endpoints
/// (cancel, and the completion sweep at check-out).
const SHIFT_UPDATE_COLUMNS: &[&str] = &[
    "title",
    "description",
    "location",
    "starts_at",
    "ends_at",
    "capacity",
];

#[derive(Deserialize, ToSchema)]
pub struct CreateShiftReq {
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
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct ShiftFilter {
    #[schema(example = "open")]
    /// Filter by status (open, completed, cancelled)
    pub status: Option<String>,
    #[schema(example = "2026-03-01", value_type = String, format = "date")]
    /// Earliest start day (inclusive)
    pub from: Option<NaiveDate>,
    #[schema(example = "2026-03-31", value_type = String, format = "date")]
    /// Latest start day (inclusive)
    pub to: Option<NaiveDate>,
    #[schema(example = 1)]
    /// Pagination page number (start with 1)
    pub page: Option<u64>,
    #[schema(example = 10)]
    /// Pagination per page number
    pub per_page: Option<u64>,
}

#[derive(Serialize, ToSchema)]
pub struct ShiftListResponse {
    pub data: Vec<Shift>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 10)]
    pub per_page: u32,
    #[schema(example = 1)]
    pub total: i64,
}

/// One rostered volunteer on the shift detail view.
#[derive(Serialize, sqlx::FromRow, ToSchema)]
pub struct RosterEntry {
    #[schema(example = 3)]
    pub volunteer_id: u64,
    #[schema(example = "Jane")]
    pub first_name: String,
    #[schema(example = "Doe")]
    pub last_name: String,
    #[schema(value_type = String, format = "date-time")]
    pub assigned_at: Option<DateTime<Utc>>,
}

#[derive(Serialize, ToSchema)]
pub struct ShiftDetailResponse {
    pub shift: Shift,
    pub roster: Vec<RosterEntry>,
}

// Helper enum for typed SQLx binding
enum FilterValue<'a> {
    Str(&'a str),
    Date(NaiveDate),
}

fn validate_shift_window(
    starts_at: NaiveDateTime,
    ends_at: NaiveDateTime,
    capacity: u32,
) -> Result<(), ApiError> {
    if starts_at >= ends_at {
        return Err(ApiError::validation("starts_at must be before ends_at"));
    }
    if capacity < 1 {
        return Err(ApiError::validation("capacity must be at least 1"));
    }
    Ok(())
}

fn parse_datetime(value: &Value) -> Option<NaiveDateTime> {
    let s = value.as_str()?;
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S"))
        .ok()
}

/// The window and capacity a partial update would leave behind. Updates may
/// touch either bound alone, so the other side comes from the current row.
fn merged_window(current: &Shift, payload: &Value) -> Result<(), ApiError> {
    let starts_at = match payload.get("starts_at") {
        Some(v) => {
            parse_datetime(v).ok_or_else(|| ApiError::validation("starts_at must be a date-time"))?
        }
        None => current.starts_at,
    };
    let ends_at = match payload.get("ends_at") {
        Some(v) => {
            parse_datetime(v).ok_or_else(|| ApiError::validation("ends_at must be a date-time"))?
        }
        None => current.ends_at,
    };
    let capacity = match payload.get("capacity") {
        Some(v) => v
            .as_u64()
            .map(|c| c as u32)
            .ok_or_else(|| ApiError::validation("capacity must be a positive integer"))?,
        None => current.capacity,
    };
    validate_shift_window(starts_at, ends_at, capacity)
}

/* =========================
Create a shift
========================= */
/// Swagger doc for create_shift endpoint
#[utoipa::path(
    post,
    path = "/api/v1/shifts",
    request_body = CreateShiftReq,
    responses(
        (status = 201, description = "Shift created", body = Shift),
        (status = 400, description = "Invalid window or capacity"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Shifts"
)]
pub async fn create_shift(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateShiftReq>,
) -> Result<HttpResponse, ApiError> {
    authorize(&auth, &Resource::Shift, Action::Create, &[])?;

    if payload.title.trim().is_empty() {
        return Err(ApiError::validation("title is required"));
    }
    validate_shift_window(payload.starts_at, payload.ends_at, payload.capacity)?;

    let result = sqlx::query(
        r#"
        INSERT INTO shifts (title, description, location, starts_at, ends_at, capacity)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(payload.title.trim())
    .bind(payload.description.as_deref())
    .bind(payload.location.as_deref())
    .bind(payload.starts_at)
    .bind(payload.ends_at)
    .bind(payload.capacity)
    .execute(pool.get_ref())
    .await?;

    let shift = fetch_shift(pool.get_ref(), result.last_insert_id())
        .await?
        .ok_or(ApiError::Database)?;

    Ok(HttpResponse::Created().json(shift))
}

async fn fetch_shift(pool: &MySqlPool, shift_id: u64) -> Result<Option<Shift>, sqlx::Error> {
    sqlx::query_as::<_, Shift>(
        r#"
        SELECT id, title, description, location, starts_at, ends_at, capacity, status, created_at
        FROM shifts
        WHERE id = ?
        "#,
    )
    .bind(shift_id)
    .fetch_optional(pool)
    .await
}

/* =========================
List shifts
========================= */
/// Swagger doc for shift_list endpoint
#[utoipa::path(
    get,
    path = "/api/v1/shifts",
    params(ShiftFilter),
    responses(
        (status = 200, description = "Paginated shift list", body = ShiftListResponse),
        (status = 400, description = "Unknown status filter"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Shifts"
)]
pub async fn shift_list(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<ShiftFilter>,
) -> Result<HttpResponse, ApiError> {
    authorize(&auth, &Resource::Shift, Action::Read, &[])?;

    // -------------------------
    // Pagination
    // -------------------------
    let per_page = query.per_page.unwrap_or(10).clamp(1, 100);
    let page = query.page.unwrap_or(1).max(1);
    let offset = (page - 1) * per_page;

    // -------------------------
    // WHERE clause
    // -------------------------
    let mut where_sql = String::from(" WHERE 1=1");
    let mut args: Vec<FilterValue> = Vec::new();

    if let Some(status) = query.status.as_deref() {
        // strum guards the filter against arbitrary strings
        ShiftStatus::from_str(status)
            .map_err(|_| ApiError::validation("Unknown shift status"))?;
        where_sql.push_str(" AND status = ?");
        args.push(FilterValue::Str(status));
    }

    if let Some(from) = query.from {
        where_sql.push_str(" AND DATE(starts_at) >= ?");
        args.push(FilterValue::Date(from));
    }

    if let Some(to) = query.to {
        where_sql.push_str(" AND DATE(starts_at) <= ?");
        args.push(FilterValue::Date(to));
    }

    // -------------------------
    // COUNT query
    // -------------------------
    let count_sql = format!("SELECT COUNT(*) FROM shifts{}", where_sql);

    let mut count_q = sqlx::query_scalar::<_, i64>(&count_sql);
    for arg in &args {
        count_q = match arg {
            FilterValue::Str(s) => count_q.bind(*s),
            FilterValue::Date(d) => count_q.bind(*d),
        };
    }

    let total = count_q.fetch_one(pool.get_ref()).await?;

    // -------------------------
    // DATA query
    // -------------------------
    let data_sql = format!(
        r#"
        SELECT id, title, description, location, starts_at, ends_at, capacity, status, created_at
        FROM shifts
        {}
        ORDER BY starts_at ASC
        LIMIT ? OFFSET ?
        "#,
        where_sql
    );

    let mut data_q = sqlx::query_as::<_, Shift>(&data_sql);
    for arg in args {
        data_q = match arg {
            FilterValue::Str(s) => data_q.bind(s),
            FilterValue::Date(d) => data_q.bind(d),
        };
    }

    let shifts = data_q
        .bind(per_page)
        .bind(offset)
        .fetch_all(pool.get_ref())
        .await?;

    // -------------------------
    // Response
    // -------------------------
    let response = ShiftListResponse {
        data: shifts,
        page: page as u32,
        per_page: per_page as u32,
        total,
    };

    Ok(HttpResponse::Ok().json(response))
}

/* =========================
Shift detail with roster
========================= */
/// Swagger doc for get_shift endpoint
#[utoipa::path(
    get,
    path = "/api/v1/shifts/{shift_id}",
    params(
        ("shift_id" = u64, Path, description = "ID of the shift to fetch")
    ),
    responses(
        (status = 200, description = "Shift with its roster", body = ShiftDetailResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Shift not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Shifts"
)]
pub async fn get_shift(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    authorize(&auth, &Resource::Shift, Action::Read, &[])?;

    let shift_id = path.into_inner();
    let shift = fetch_shift(pool.get_ref(), shift_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Shift not found"))?;

    let roster = sqlx::query_as::<_, RosterEntry>(
        r#"
        SELECT sa.volunteer_id, v.first_name, v.last_name, sa.assigned_at
        FROM shift_assignments sa
        JOIN volunteers v ON v.id = sa.volunteer_id
        WHERE sa.shift_id = ?
        ORDER BY sa.assigned_at ASC
        "#,
    )
    .bind(shift_id)
    .fetch_all(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(ShiftDetailResponse { shift, roster }))
}

/* =========================
Update a shift
========================= */
/// Swagger doc for update_shift endpoint
#[utoipa::path(
    put,
    path = "/api/v1/shifts/{shift_id}",
    params(
        ("shift_id" = u64, Path, description = "ID of the shift to update")
    ),
    request_body(
        content = Object,
        description = "Subset of title, description, location, starts_at, ends_at, capacity",
        content_type = "application/json"
    ),
    responses(
        (status = 200, description = "Updated shift", body = Shift),
        (status = 400, description = "Unknown column or invalid window"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Shift not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Shifts"
)]
pub async fn update_shift(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<Value>,
) -> Result<HttpResponse, ApiError> {
    authorize(&auth, &Resource::Shift, Action::Update, &[])?;

    let shift_id = path.into_inner();
    let current = fetch_shift(pool.get_ref(), shift_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Shift not found"))?;

    // The window the update would leave must still be valid
    merged_window(&current, &payload)?;

    let update = build_update_sql(
        "shifts",
        &payload,
        SHIFT_UPDATE_COLUMNS,
        "id",
        shift_id as i64,
    )?;
    execute_update(pool.get_ref(), update).await?;

    let shift = fetch_shift(pool.get_ref(), shift_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Shift not found"))?;

    Ok(HttpResponse::Ok().json(shift))
}

/* =========================
Sign up for a shift
========================= */
/// Swagger doc for signup_shift endpoint
#[utoipa::path(
    post,
    path = "/api/v1/shifts/{shift_id}/signup",
    params(
        ("shift_id" = u64, Path, description = "ID of the shift to join")
    ),
    responses(
        (status = 201, description = "Added to the roster", body = ShiftAssignment),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "No volunteer profile"),
        (status = 404, description = "Shift not found"),
        (status = 409, description = "Full, not open, or already signed up")
    ),
    security(("bearer_auth" = [])),
    tag = "Shifts"
)]
pub async fn signup_shift(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    let volunteer_id = auth.require_volunteer()?;

    let shift_id = path.into_inner();

    // 1. Shift must exist and be open
    let shift = fetch_shift(pool.get_ref(), shift_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Shift not found"))?;

    if !shift.is_open() {
        return Err(ApiError::conflict("Shift is not open for sign-up"));
    }

    // 2. Capacity check
    let taken = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM shift_assignments WHERE shift_id = ?",
    )
    .bind(shift_id)
    .fetch_one(pool.get_ref())
    .await?;

    if taken >= shift.capacity as i64 {
        return Err(ApiError::conflict("Shift is full"));
    }

    // 3. Join the roster; the unique key turns a duplicate into a conflict
    let result = sqlx::query(
        "INSERT INTO shift_assignments (shift_id, volunteer_id) VALUES (?, ?)",
    )
    .bind(shift_id)
    .bind(volunteer_id)
    .execute(pool.get_ref())
    .await;

    let result = match result {
        Ok(r) => r,
        Err(e) if is_duplicate_key(&e) => {
            return Err(ApiError::conflict("Already signed up for this shift"));
        }
        Err(e) => return Err(e.into()),
    };

    let assignment = sqlx::query_as::<_, ShiftAssignment>(
        "SELECT id, shift_id, volunteer_id, assigned_at FROM shift_assignments WHERE id = ?",
    )
    .bind(result.last_insert_id())
    .fetch_one(pool.get_ref())
    .await?;

    Ok(HttpResponse::Created().json(assignment))
}

/* =========================
Withdraw from a shift
========================= */
/// Swagger doc for withdraw_shift endpoint
#[utoipa::path(
    delete,
    path = "/api/v1/shifts/{shift_id}/signup",
    params(
        ("shift_id" = u64, Path, description = "ID of the shift to leave")
    ),
    responses(
        (status = 204, description = "Removed from the roster"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "No volunteer profile"),
        (status = 404, description = "Not signed up for this shift"),
        (status = 409, description = "An open check-in exists")
    ),
    security(("bearer_auth" = [])),
    tag = "Shifts"
)]
pub async fn withdraw_shift(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    let volunteer_id = auth.require_volunteer()?;

    let shift_id = path.into_inner();

    // 1. No withdrawing while checked in
    let open = sqlx::query_scalar::<_, bool>(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM attendance_records
            WHERE shift_id = ? AND volunteer_id = ? AND check_out_time IS NULL
        )
        "#,
    )
    .bind(shift_id)
    .bind(volunteer_id)
    .fetch_one(pool.get_ref())
    .await?;

    if open {
        return Err(ApiError::conflict("Cannot withdraw while checked in"));
    }

    // 2. Drop the roster row
    let deleted = sqlx::query(
        "DELETE FROM shift_assignments WHERE shift_id = ? AND volunteer_id = ?",
    )
    .bind(shift_id)
    .bind(volunteer_id)
    .execute(pool.get_ref())
    .await?;

    if deleted.rows_affected() == 0 {
        return Err(ApiError::not_found("Not signed up for this shift"));
    }

    Ok(HttpResponse::NoContent().finish())
}

/* =========================
Cancel a shift
========================= */
/// Swagger doc for cancel_shift endpoint
#[utoipa::path(
    put,
    path = "/api/v1/shifts/{shift_id}/cancel",
    params(
        ("shift_id" = u64, Path, description = "ID of the shift to cancel")
    ),
    responses(
        (status = 200, description = "Cancelled shift", body = Shift),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Shift not found"),
        (status = 409, description = "Attendance already recorded, or not open")
    ),
    security(("bearer_auth" = [])),
    tag = "Shifts"
)]
pub async fn cancel_shift(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    authorize(&auth, &Resource::Shift, Action::Manage, &[])?;

    let shift_id = path.into_inner();
    fetch_shift(pool.get_ref(), shift_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Shift not found"))?;

    // 1. A shift with attendance on it is history, not cancellable
    let attended = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM attendance_records WHERE shift_id = ?)",
    )
    .bind(shift_id)
    .fetch_one(pool.get_ref())
    .await?;

    if attended {
        return Err(ApiError::conflict(
            "Attendance already recorded for this shift",
        ));
    }

    // 2. Conditional flip from open
    let updated = sqlx::query("UPDATE shifts SET status = 'cancelled' WHERE id = ? AND status = 'open'")
        .bind(shift_id)
        .execute(pool.get_ref())
        .await?;

    if updated.rows_affected() == 0 {
        return Err(ApiError::conflict("Shift is not open"));
    }

    let shift = fetch_shift(pool.get_ref(), shift_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Shift not found"))?;

    Ok(HttpResponse::Ok().json(shift))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").unwrap()
    }

    fn sample_shift() -> Shift {
        Shift {
            id: 7,
            title: "Food bank sorting".into(),
            description: None,
            location: None,
            starts_at: dt("2026-03-01T09:00:00"),
            ends_at: dt("2026-03-01T13:00:00"),
            capacity: 8,
            status: "open".into(),
            created_at: None,
        }
    }

    #[test]
    fn test_window_must_be_forward_with_capacity() {
        assert!(validate_shift_window(dt("2026-03-01T09:00:00"), dt("2026-03-01T13:00:00"), 1).is_ok());
        assert!(validate_shift_window(dt("2026-03-01T13:00:00"), dt("2026-03-01T09:00:00"), 1).is_err());
        assert!(validate_shift_window(dt("2026-03-01T09:00:00"), dt("2026-03-01T09:00:00"), 1).is_err());
        assert!(validate_shift_window(dt("2026-03-01T09:00:00"), dt("2026-03-01T13:00:00"), 0).is_err());
    }

    #[test]
    fn test_partial_update_keeps_window_valid() {
        let current = sample_shift();
        // moving only the end before the current start must fail
        let payload = json!({ "ends_at": "2026-03-01T08:00:00" });
        assert!(merged_window(&current, &payload).is_err());
        // moving it later is fine
        let payload = json!({ "ends_at": "2026-03-01T15:00:00" });
        assert!(merged_window(&current, &payload).is_ok());
        // both bounds replaced together
        let payload = json!({
            "starts_at": "2026-04-01T10:00:00",
            "ends_at": "2026-04-01T12:00:00"
        });
        assert!(merged_window(&current, &payload).is_ok());
    }

    #[test]
    fn test_update_rejects_malformed_fields() {
        let current = sample_shift();
        assert!(merged_window(&current, &json!({ "starts_at": "yesterday" })).is_err());
        assert!(merged_window(&current, &json!({ "capacity": "lots" })).is_err());
        assert!(merged_window(&current, &json!({ "capacity": 0 })).is_err());
    }

    #[test]
    fn test_datetime_accepts_both_separators() {
        assert!(parse_datetime(&json!("2026-03-01T09:00:00")).is_some());
        assert!(parse_datetime(&json!("2026-03-01 09:00:00")).is_some());
        assert!(parse_datetime(&json!("not a date")).is_none());
        assert!(parse_datetime(&json!(42)).is_none());
    }
}
