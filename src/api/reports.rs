use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use utoipa::{IntoParams, ToSchema};

use crate::auth::auth::AuthUser;
use crate::auth::capability::{Action, Resource, authorize};
use crate::errors::ApiError;
use crate::model::group;
use crate::model::hour_ledger::HoursMinutes;

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct HoursReportQuery {
    #[schema(example = 3)]
    /// Restrict to one volunteer
    pub volunteer_id: Option<u64>,

    #[schema(example = 5)]
    /// Restrict to one group
    pub group_id: Option<u64>,

    #[schema(example = "2026-03-01", value_type = String, format = "date")]
    /// First entry_date included
    pub from: NaiveDate,

    #[schema(example = "2026-03-31", value_type = String, format = "date")]
    /// Last entry_date included
    pub to: NaiveDate,
}

#[derive(Serialize, ToSchema)]
#[schema(example = json!({
    "volunteer_id": 3,
    "group_id": null,
    "from": "2026-03-01",
    "to": "2026-03-31",
    "approved": { "hours": 4, "minutes": 15 },
    "pending": { "hours": 1, "minutes": 30 }
}))]
pub struct HoursReportResponse {
    pub volunteer_id: Option<u64>,
    pub group_id: Option<u64>,

    #[schema(value_type = String, format = "date")]
    pub from: NaiveDate,

    #[schema(value_type = String, format = "date")]
    pub to: NaiveDate,

    /// The official total: approved entries only.
    pub approved: HoursMinutes,

    /// Entries still awaiting review, shown separately.
    pub pending: HoursMinutes,
}

/// Minute sums straight out of SQL, split back into display pairs.
fn split_buckets(approved_minutes: i64, pending_minutes: i64) -> (HoursMinutes, HoursMinutes) {
    (
        HoursMinutes::from_minutes(approved_minutes.max(0) as u32),
        HoursMinutes::from_minutes(pending_minutes.max(0) as u32),
    )
}

/* =========================
Aggregate hours report
========================= */
/// Swagger doc for hours_report endpoint
#[utoipa::path(
    get,
    path = "/api/v1/reports/hours",
    params(HoursReportQuery),
    responses(
        (status = 200, description = "Approved and pending totals over the window", body = HoursReportResponse),
        (status = 400, description = "Invalid date window"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Reports"
)]
pub async fn hours_report(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<HoursReportQuery>,
) -> Result<HttpResponse, ApiError> {
    if query.from > query.to {
        return Err(ApiError::validation("'from' must not be after 'to'"));
    }

    // Staff aggregate anything; volunteers their own id; group-admins their group
    let group_admin_of = match auth.volunteer_id {
        Some(vid) if !auth.role.is_staff() => group::admin_group_ids(pool.get_ref(), vid).await?,
        _ => Vec::new(),
    };
    authorize(
        &auth,
        &Resource::Report {
            volunteer_id: query.volunteer_id,
            group_id: query.group_id,
        },
        Action::Read,
        &group_admin_of,
    )?;

    // -------------------------
    // WHERE clause
    // -------------------------
    let mut where_sql = String::from(" WHERE entry_date BETWEEN ? AND ?");
    let mut args: Vec<u64> = Vec::new();

    if let Some(vid) = query.volunteer_id {
        where_sql.push_str(" AND volunteer_id = ?");
        args.push(vid);
    }

    if let Some(gid) = query.group_id {
        where_sql.push_str(" AND group_id = ?");
        args.push(gid);
    }

    // -------------------------
    // SUM query
    // -------------------------
    // Each bucket is summed in minutes; CAST keeps MySQL from handing back
    // a DECIMAL for the SUM.
    let sum_sql = format!(
        r#"
        SELECT
            CAST(COALESCE(SUM(CASE WHEN approved = TRUE  THEN hours * 60 + minutes ELSE 0 END), 0) AS SIGNED),
            CAST(COALESCE(SUM(CASE WHEN approved = FALSE THEN hours * 60 + minutes ELSE 0 END), 0) AS SIGNED)
        FROM hour_ledger
        {}
        "#,
        where_sql
    );

    let mut sum_q = sqlx::query_as::<_, (i64, i64)>(&sum_sql)
        .bind(query.from)
        .bind(query.to);
    for arg in &args {
        sum_q = sum_q.bind(*arg);
    }

    let (approved_minutes, pending_minutes) = sum_q.fetch_one(pool.get_ref()).await?;
    let (approved, pending) = split_buckets(approved_minutes, pending_minutes);

    Ok(HttpResponse::Ok().json(HoursReportResponse {
        volunteer_id: query.volunteer_id,
        group_id: query.group_id,
        from: query.from,
        to: query.to,
        approved,
        pending,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buckets_normalize_to_display_pairs() {
        // {2h00, 1h45, 0h30} approved sums to 255 minutes => 4h 15m
        let (approved, pending) = split_buckets(255, 90);
        assert_eq!(approved, HoursMinutes { hours: 4, minutes: 15 });
        assert_eq!(pending, HoursMinutes { hours: 1, minutes: 30 });
    }

    #[test]
    fn test_empty_window_is_zero() {
        let (approved, pending) = split_buckets(0, 0);
        assert_eq!(approved, HoursMinutes { hours: 0, minutes: 0 });
        assert_eq!(pending, HoursMinutes { hours: 0, minutes: 0 });
    }

    #[test]
    fn test_garbage_sums_clamp_to_zero() {
        let (approved, _) = split_buckets(-5, 0);
        assert_eq!(approved, HoursMinutes { hours: 0, minutes: 0 });
    }
}
