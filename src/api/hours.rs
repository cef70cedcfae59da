use crate::auth::auth::AuthUser;
use crate::auth::capability::{Action, Resource, authorize};
use crate::errors::ApiError;
use crate::model::group;
use crate::model::hour_ledger::{HourLedgerEntry, HoursMinutes};
use crate::model::notification;
use actix_web::{HttpResponse, web};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, ToSchema)]
pub struct LogHoursReq {
    #[schema(example = 1)]
    pub hours: i32,
    /// May exceed 59; overflow carries into hours.
    #[schema(example = 75)]
    pub minutes: i32,
    #[schema(example = "Sorted donation boxes")]
    pub description: String,
    #[schema(example = "2026-03-01", value_type = String, format = "date")]
    pub entry_date: NaiveDate,
    /// Log against a group the volunteer belongs to.
    #[schema(example = 5, nullable = true)]
    pub group_id: Option<u64>,
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct HoursFilter {
    #[schema(example = 3)]
    /// Filter by volunteer ID
    pub volunteer_id: Option<u64>,
    #[schema(example = 5)]
    /// Filter by group ID
    pub group_id: Option<u64>,
    #[schema(example = false)]
    /// Filter by approval state
    pub approved: Option<bool>,
    #[schema(example = 1)]
    /// Pagination page number (start with 1)
    pub page: Option<u64>,
    #[schema(example = 10)]
    /// Pagination per page number
    pub per_page: Option<u64>,
}

#[derive(Serialize, ToSchema)]
pub struct HoursListResponse {
    pub data: Vec<HourLedgerEntry>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 10)]
    pub per_page: u32,
    #[schema(example = 1)]
    pub total: i64,
}

// Helper enum for typed SQLx binding
enum FilterValue {
    U64(u64),
    Bool(bool),
}

/// Validate a manual entry and normalize it so minutes land below 60.
fn validate_log_hours(hours: i32, minutes: i32, description: &str) -> Result<HoursMinutes, ApiError> {
    if hours < 0 || minutes < 0 {
        return Err(ApiError::validation("hours and minutes must be non-negative"));
    }
    if description.trim().is_empty() {
        return Err(ApiError::validation("description is required"));
    }
    let normalized = HoursMinutes::normalize(hours as u32, minutes as u32);
    if normalized.total_minutes() == 0 {
        return Err(ApiError::validation("logged time must be greater than zero"));
    }
    Ok(normalized)
}

/* =========================
Log ad-hoc hours
========================= */
/// Swagger doc for log_hours endpoint
#[utoipa::path(
    post,
    path = "/api/v1/hours",
    request_body(
        content = LogHoursReq,
        description = "Manual hour entry, owned by the session volunteer",
        content_type = "application/json"
    ),
    responses(
        (status = 201, description = "Ledger entry created", body = HourLedgerEntry),
        (status = 400, description = "Invalid hours, minutes, or description"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not a member of the given group"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Hours"
)]
pub async fn log_hours(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<LogHoursReq>,
) -> Result<HttpResponse, ApiError> {
    let volunteer_id = auth.require_volunteer()?;
    authorize(
        &auth,
        &Resource::Ledger {
            owner: volunteer_id,
            group_id: payload.group_id,
        },
        Action::Create,
        &[],
    )?;

    // 1. Validate and normalize the reported time
    let normalized = validate_log_hours(payload.hours, payload.minutes, &payload.description)?;

    // 2. A group entry requires membership in that group
    if let Some(group_id) = payload.group_id {
        if !group::is_member(pool.get_ref(), group_id, volunteer_id).await? {
            return Err(ApiError::not_authorized("Not a member of the given group"));
        }
    }

    // 3. Insert the entry, unapproved until a staff or group-admin review
    let result = sqlx::query(
        r#"
        INSERT INTO hour_ledger
            (volunteer_id, group_id, hours, minutes, description, entry_date)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(volunteer_id)
    .bind(payload.group_id)
    .bind(normalized.hours)
    .bind(normalized.minutes)
    .bind(payload.description.trim())
    .bind(payload.entry_date)
    .execute(pool.get_ref())
    .await?;

    let entry = sqlx::query_as::<_, HourLedgerEntry>(
        r#"
        SELECT id, volunteer_id, group_id, attendance_id, hours, minutes, description,
               entry_date, approved, approved_by, approved_at, created_at
        FROM hour_ledger
        WHERE id = ?
        "#,
    )
    .bind(result.last_insert_id())
    .fetch_one(pool.get_ref())
    .await?;

    Ok(HttpResponse::Created().json(entry))
}

/* =========================
List ledger entries
========================= */
/// Swagger doc for hours_list endpoint
#[utoipa::path(
    get,
    path = "/api/v1/hours",
    params(HoursFilter),
    responses(
        (status = 200, description = "Paginated ledger entries", body = HoursListResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Hours"
)]
pub async fn hours_list(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<HoursFilter>,
) -> Result<HttpResponse, ApiError> {
    let group_admin_of = match auth.volunteer_id {
        Some(vid) => group::admin_group_ids(pool.get_ref(), vid).await?,
        None => Vec::new(),
    };

    // Volunteers see their own entries; staff see anyone's; a group-admin
    // may scope to their group without a volunteer filter.
    let volunteer_filter = match query.volunteer_id {
        Some(id) => {
            authorize(
                &auth,
                &Resource::Ledger {
                    owner: id,
                    group_id: query.group_id,
                },
                Action::Read,
                &group_admin_of,
            )?;
            Some(id)
        }
        None if auth.role.is_staff() => None,
        None if query.group_id.is_some_and(|g| group_admin_of.contains(&g)) => None,
        None => Some(auth.require_volunteer()?),
    };

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

    if let Some(vid) = volunteer_filter {
        where_sql.push_str(" AND volunteer_id = ?");
        args.push(FilterValue::U64(vid));
    }

    if let Some(gid) = query.group_id {
        where_sql.push_str(" AND group_id = ?");
        args.push(FilterValue::U64(gid));
    }

    if let Some(approved) = query.approved {
        where_sql.push_str(" AND approved = ?");
        args.push(FilterValue::Bool(approved));
    }

    // -------------------------
    // COUNT query
    // -------------------------
    let count_sql = format!("SELECT COUNT(*) FROM hour_ledger{}", where_sql);

    let mut count_q = sqlx::query_scalar::<_, i64>(&count_sql);
    for arg in &args {
        count_q = match arg {
            FilterValue::U64(v) => count_q.bind(*v),
            FilterValue::Bool(b) => count_q.bind(*b),
        };
    }

    let total = count_q.fetch_one(pool.get_ref()).await?;

    // -------------------------
    // DATA query
    // -------------------------
    let data_sql = format!(
        r#"
        SELECT id, volunteer_id, group_id, attendance_id, hours, minutes, description,
               entry_date, approved, approved_by, approved_at, created_at
        FROM hour_ledger
        {}
        ORDER BY entry_date DESC, id DESC
        LIMIT ? OFFSET ?
        "#,
        where_sql
    );

    let mut data_q = sqlx::query_as::<_, HourLedgerEntry>(&data_sql);
    for arg in args {
        data_q = match arg {
            FilterValue::U64(v) => data_q.bind(v),
            FilterValue::Bool(b) => data_q.bind(b),
        };
    }

    let entries = data_q
        .bind(per_page)
        .bind(offset)
        .fetch_all(pool.get_ref())
        .await?;

    // -------------------------
    // Response
    // -------------------------
    let response = HoursListResponse {
        data: entries,
        page: page as u32,
        per_page: per_page as u32,
        total,
    };

    Ok(HttpResponse::Ok().json(response))
}

/* =========================
Approve an entry
========================= */
/// Swagger doc for approve_hours endpoint
#[utoipa::path(
    put,
    path = "/api/v1/hours/{entry_id}/approve",
    params(
        ("entry_id" = u64, Path, description = "ID of the ledger entry to approve")
    ),
    responses(
        (status = 200, description = "Entry approved", body = HourLedgerEntry),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Hour entry not found"),
        (status = 409, description = "Entry already approved", body = Object, example = json!({
            "code": "CONFLICT",
            "error": "Entry already approved"
        })),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Hours"
)]
pub async fn approve_hours(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    let entry_id = path.into_inner();

    // 1. Load the entry
    let entry = sqlx::query_as::<_, HourLedgerEntry>(
        r#"
        SELECT id, volunteer_id, group_id, attendance_id, hours, minutes, description,
               entry_date, approved, approved_by, approved_at, created_at
        FROM hour_ledger
        WHERE id = ?
        "#,
    )
    .bind(entry_id)
    .fetch_optional(pool.get_ref())
    .await?
    .ok_or_else(|| ApiError::not_found("Hour entry not found"))?;

    // 2. Staff, or a group-admin of the entry's group
    let group_admin_of = match auth.volunteer_id {
        Some(vid) if !auth.role.is_staff() => group::admin_group_ids(pool.get_ref(), vid).await?,
        _ => Vec::new(),
    };
    authorize(
        &auth,
        &Resource::Ledger {
            owner: entry.volunteer_id,
            group_id: entry.group_id,
        },
        Action::Approve,
        &group_admin_of,
    )?;

    // 3. Conditional flip; a processed entry stays as its first approver left it
    let updated = sqlx::query(
        r#"
        UPDATE hour_ledger
        SET approved = TRUE, approved_by = ?, approved_at = ?
        WHERE id = ?
        AND approved = FALSE
        "#,
    )
    .bind(auth.user_id)
    .bind(Utc::now())
    .bind(entry_id)
    .execute(pool.get_ref())
    .await?;

    if updated.rows_affected() == 0 {
        return Err(ApiError::conflict("Entry already approved"));
    }

    let approved = sqlx::query_as::<_, HourLedgerEntry>(
        r#"
        SELECT id, volunteer_id, group_id, attendance_id, hours, minutes, description,
               entry_date, approved, approved_by, approved_at, created_at
        FROM hour_ledger
        WHERE id = ?
        "#,
    )
    .bind(entry_id)
    .fetch_one(pool.get_ref())
    .await?;

    // 4. Tell the volunteer, fire-and-forget
    notification::dispatch(
        pool.get_ref().clone(),
        approved.volunteer_id,
        format!(
            "Your hour entry was approved: {} ({}h {:02}m)",
            approved.description, approved.hours, approved.minutes
        ),
    );

    Ok(HttpResponse::Ok().json(approved))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_hours_normalizes_overflow() {
        // 1h 75m carries to 2h 15m
        let hm = validate_log_hours(1, 75, "inventory").unwrap();
        assert_eq!(hm, HoursMinutes { hours: 2, minutes: 15 });
    }

    #[test]
    fn test_log_hours_rejects_negative() {
        assert!(validate_log_hours(-1, 10, "x").is_err());
        assert!(validate_log_hours(1, -10, "x").is_err());
    }

    #[test]
    fn test_log_hours_rejects_zero_total() {
        assert!(validate_log_hours(0, 0, "x").is_err());
    }

    #[test]
    fn test_log_hours_requires_description() {
        assert!(validate_log_hours(1, 0, "").is_err());
        assert!(validate_log_hours(1, 0, "   ").is_err());
        assert!(validate_log_hours(1, 0, "meal prep").is_ok());
    }
}
