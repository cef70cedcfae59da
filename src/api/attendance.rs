use crate::auth::auth::AuthUser;
use crate::auth::capability::{Action, Resource, authorize};
use crate::errors::ApiError;
use crate::model::attendance_record::{self, AttendanceRecord};
use crate::model::hour_ledger::{HourLedgerEntry, HoursMinutes};
use crate::model::notification;
use crate::model::shift::Shift;
use actix_web::{HttpResponse, web};
use chrono::{NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, ToSchema)]
pub struct CheckInReq {
    #[schema(example = 7)]
    pub shift_id: u64,
    #[schema(example = "front desk", nullable = true)]
    pub notes: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct CheckOutReq {
    /// Id of the open attendance record returned by check-in.
    #[schema(example = 42)]
    pub check_in_id: u64,
    #[schema(example = "restocked shelves", nullable = true)]
    pub notes: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct CheckOutResponse {
    pub attendance_record: AttendanceRecord,
    pub ledger_entry: HourLedgerEntry,
    /// Time recorded by this check-out, split for display.
    pub duration: HoursMinutes,
}

/// Open record joined with its shift title, for "you are checked in to X".
#[derive(Serialize, sqlx::FromRow, ToSchema)]
pub struct ActiveCheckIn {
    #[schema(example = 42)]
    pub id: u64,
    #[schema(example = 7)]
    pub shift_id: u64,
    #[schema(example = "Food bank sorting")]
    pub shift_title: String,
    #[schema(example = "2026-03-01T09:00:00", value_type = String, format = "date-time")]
    pub check_in_time: NaiveDateTime,
}

#[derive(Deserialize, IntoParams)]
pub struct ActiveFilter {
    /// Volunteer to query; defaults to the caller's own profile.
    pub volunteer_id: Option<u64>,
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct AttendanceFilter {
    #[schema(example = 3)]
    /// Filter by volunteer ID
    pub volunteer_id: Option<u64>,
    #[schema(example = 7)]
    /// Filter by shift ID
    pub shift_id: Option<u64>,
    #[schema(example = "2026-03-01", value_type = String, format = "date")]
    /// Earliest check-in day (inclusive)
    pub from: Option<NaiveDate>,
    #[schema(example = "2026-03-31", value_type = String, format = "date")]
    /// Latest check-in day (inclusive)
    pub to: Option<NaiveDate>,
    #[schema(example = 1)]
    /// Pagination page number (start with 1)
    pub page: Option<u64>,
    #[schema(example = 10)]
    /// Pagination per page number
    pub per_page: Option<u64>,
}

#[derive(Serialize, ToSchema)]
pub struct AttendanceListResponse {
    pub data: Vec<AttendanceRecord>,
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
    Date(NaiveDate),
}

/// A second check-in for the same (volunteer, shift) pair while one is still
/// open must point the caller at the open record.
fn reject_open_record(existing: Option<u64>) -> Result<(), ApiError> {
    match existing {
        Some(attendance_id) => Err(ApiError::AlreadyCheckedIn { attendance_id }),
        None => Ok(()),
    }
}

/// Outcome of the conditional close. Zero affected rows means another
/// check-out won the race (or the record was already closed).
fn close_outcome(rows_affected: u64) -> Result<(), ApiError> {
    if rows_affected == 0 {
        Err(ApiError::AlreadyCheckedOut)
    } else {
        Ok(())
    }
}

/* =========================
Check in to a shift
========================= */
/// Swagger doc for check_in endpoint
#[utoipa::path(
    post,
    path = "/api/v1/attendance/check-in",
    request_body(
        content = CheckInReq,
        description = "Shift to check in to, with optional notes",
        content_type = "application/json"
    ),
    responses(
        (status = 201, description = "Open attendance record created", body = AttendanceRecord),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not signed up for this shift"),
        (status = 404, description = "Shift not found"),
        (status = 409, description = "An open record already exists", body = Object, example = json!({
            "code": "ALREADY_CHECKED_IN",
            "error": "Already checked in to this shift",
            "attendance_id": 42
        })),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn check_in(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CheckInReq>,
) -> Result<HttpResponse, ApiError> {
    let volunteer_id = auth.require_volunteer()?;
    authorize(
        &auth,
        &Resource::Attendance { owner: volunteer_id },
        Action::Create,
        &[],
    )?;

    // 1. Shift must exist and be open
    let shift = sqlx::query_as::<_, Shift>(
        r#"
        SELECT id, title, description, location, starts_at, ends_at, capacity, status, created_at
        FROM shifts
        WHERE id = ?
        "#,
    )
    .bind(payload.shift_id)
    .fetch_optional(pool.get_ref())
    .await?
    .ok_or_else(|| ApiError::not_found("Shift not found"))?;

    if !shift.is_open() {
        return Err(ApiError::conflict("Shift is not open for attendance"));
    }

    // 2. Only rostered volunteers may check in
    let on_roster = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM shift_assignments WHERE shift_id = ? AND volunteer_id = ?)",
    )
    .bind(shift.id)
    .bind(volunteer_id)
    .fetch_one(pool.get_ref())
    .await?;

    if !on_roster {
        return Err(ApiError::not_authorized("Not signed up for this shift"));
    }

    // 3. At most one open record per (volunteer, shift)
    let open = sqlx::query_scalar::<_, u64>(
        r#"
        SELECT id FROM attendance_records
        WHERE volunteer_id = ? AND shift_id = ? AND check_out_time IS NULL
        "#,
    )
    .bind(volunteer_id)
    .bind(shift.id)
    .fetch_optional(pool.get_ref())
    .await?;

    reject_open_record(open)?;

    // 4. Open the record
    let now = Utc::now().naive_utc();
    let result = sqlx::query(
        r#"
        INSERT INTO attendance_records (volunteer_id, shift_id, check_in_time, notes)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(volunteer_id)
    .bind(shift.id)
    .bind(now)
    .bind(payload.notes.as_deref())
    .execute(pool.get_ref())
    .await?;

    let record = sqlx::query_as::<_, AttendanceRecord>(
        r#"
        SELECT id, volunteer_id, shift_id, check_in_time, check_out_time, duration_minutes, notes
        FROM attendance_records
        WHERE id = ?
        "#,
    )
    .bind(result.last_insert_id())
    .fetch_one(pool.get_ref())
    .await?;

    Ok(HttpResponse::Created().json(record))
}

/* =========================
Check out of a shift
========================= */
/// Swagger doc for check_out endpoint
#[utoipa::path(
    post,
    path = "/api/v1/attendance/check-out",
    request_body(
        content = CheckOutReq,
        description = "Open record to close, with optional notes to append",
        content_type = "application/json"
    ),
    responses(
        (status = 200, description = "Record closed, ledger entry derived", body = CheckOutResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Caller neither owns the record nor is staff"),
        (status = 404, description = "Attendance record not found"),
        (status = 409, description = "Record already closed", body = Object, example = json!({
            "code": "ALREADY_CHECKED_OUT",
            "error": "Already checked out"
        })),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn check_out(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CheckOutReq>,
) -> Result<HttpResponse, ApiError> {
    // 1. Load the record
    let record = sqlx::query_as::<_, AttendanceRecord>(
        r#"
        SELECT id, volunteer_id, shift_id, check_in_time, check_out_time, duration_minutes, notes
        FROM attendance_records
        WHERE id = ?
        "#,
    )
    .bind(payload.check_in_id)
    .fetch_optional(pool.get_ref())
    .await?
    .ok_or_else(|| ApiError::not_found("Attendance record not found"))?;

    // 2. Owner, or staff closing on the volunteer's behalf
    authorize(
        &auth,
        &Resource::Attendance {
            owner: record.volunteer_id,
        },
        Action::Update,
        &[],
    )?;

    if !record.is_open() {
        return Err(ApiError::AlreadyCheckedOut);
    }

    let shift = sqlx::query_as::<_, Shift>(
        r#"
        SELECT id, title, description, location, starts_at, ends_at, capacity, status, created_at
        FROM shifts
        WHERE id = ?
        "#,
    )
    .bind(record.shift_id)
    .fetch_optional(pool.get_ref())
    .await?;

    // 3. Close the record and derive the ledger entry, atomically.
    //    The conditional UPDATE is the idempotency guard: a concurrent
    //    duplicate loses the race, gets AlreadyCheckedOut, and no second
    //    ledger entry is written.
    let now = Utc::now().naive_utc();
    let minutes = attendance_record::duration_minutes(record.check_in_time, now);
    let duration = HoursMinutes::from_minutes(minutes);
    let notes = attendance_record::append_notes(record.notes.as_deref(), payload.notes.as_deref());
    let description = match &shift {
        Some(s) => format!("Worked shift: {}", s.title),
        None => "Worked shift".to_string(),
    };

    let mut tx = pool.begin().await?;

    let closed = sqlx::query(
        r#"
        UPDATE attendance_records
        SET check_out_time = ?, duration_minutes = ?, notes = ?
        WHERE id = ?
        AND check_out_time IS NULL
        "#,
    )
    .bind(now)
    .bind(minutes)
    .bind(notes.as_deref())
    .bind(record.id)
    .execute(&mut *tx)
    .await?;

    close_outcome(closed.rows_affected())?;

    let inserted = sqlx::query(
        r#"
        INSERT INTO hour_ledger
            (volunteer_id, attendance_id, hours, minutes, description, entry_date)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(record.volunteer_id)
    .bind(record.id)
    .bind(duration.hours)
    .bind(duration.minutes)
    .bind(&description)
    .bind(record.check_in_time.date())
    .execute(&mut *tx)
    .await?;

    let attendance_record = sqlx::query_as::<_, AttendanceRecord>(
        r#"
        SELECT id, volunteer_id, shift_id, check_in_time, check_out_time, duration_minutes, notes
        FROM attendance_records
        WHERE id = ?
        "#,
    )
    .bind(record.id)
    .fetch_one(&mut *tx)
    .await?;

    let ledger_entry = sqlx::query_as::<_, HourLedgerEntry>(
        r#"
        SELECT id, volunteer_id, group_id, attendance_id, hours, minutes, description,
               entry_date, approved, approved_by, approved_at, created_at
        FROM hour_ledger
        WHERE id = ?
        "#,
    )
    .bind(inserted.last_insert_id())
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    // 4. Shift completion sweep, outside the transaction and never surfaced
    if let Some(shift) = &shift {
        if shift.is_open() && shift.has_ended(now) {
            maybe_complete_shift(pool.get_ref(), shift.id).await;
        }
    }

    // 5. Notify the volunteer, fire-and-forget
    let shift_title = shift.map(|s| s.title).unwrap_or_else(|| "shift".to_string());
    notification::dispatch(
        pool.get_ref().clone(),
        record.volunteer_id,
        format!(
            "Checked out of {}: {}h {:02}m recorded",
            shift_title, duration.hours, duration.minutes
        ),
    );

    Ok(HttpResponse::Ok().json(CheckOutResponse {
        attendance_record,
        ledger_entry,
        duration,
    }))
}

/// Mark the shift completed once its window has passed and the last open
/// record is gone. Failures are logged only.
async fn maybe_complete_shift(pool: &MySqlPool, shift_id: u64) {
    let open_left = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM attendance_records WHERE shift_id = ? AND check_out_time IS NULL)",
    )
    .bind(shift_id)
    .fetch_one(pool)
    .await;

    match open_left {
        Ok(true) => {}
        Ok(false) => {
            let done =
                sqlx::query("UPDATE shifts SET status = 'completed' WHERE id = ? AND status = 'open'")
                    .bind(shift_id)
                    .execute(pool)
                    .await;
            if let Err(e) = done {
                tracing::warn!(error = %e, shift_id, "failed to mark shift completed");
            }
        }
        Err(e) => tracing::warn!(error = %e, shift_id, "open-record sweep failed"),
    }
}

/* =========================
Active check-ins
========================= */
/// Swagger doc for active_check_ins endpoint
#[utoipa::path(
    get,
    path = "/api/v1/attendance/active",
    params(ActiveFilter),
    responses(
        (status = 200, description = "Open records with shift titles", body = [ActiveCheckIn]),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn active_check_ins(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<ActiveFilter>,
) -> Result<HttpResponse, ApiError> {
    let target = match query.volunteer_id {
        Some(id) => id,
        None => auth.require_volunteer()?,
    };
    authorize(
        &auth,
        &Resource::Attendance { owner: target },
        Action::Read,
        &[],
    )?;

    let open = sqlx::query_as::<_, ActiveCheckIn>(
        r#"
        SELECT a.id, a.shift_id, s.title AS shift_title, a.check_in_time
        FROM attendance_records a
        JOIN shifts s ON s.id = a.shift_id
        WHERE a.volunteer_id = ? AND a.check_out_time IS NULL
        ORDER BY a.check_in_time DESC
        "#,
    )
    .bind(target)
    .fetch_all(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(open))
}

/* =========================
Attendance history
========================= */
/// Swagger doc for attendance_list endpoint
#[utoipa::path(
    get,
    path = "/api/v1/attendance",
    params(AttendanceFilter),
    responses(
        (status = 200, description = "Paginated attendance history", body = AttendanceListResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn attendance_list(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<AttendanceFilter>,
) -> Result<HttpResponse, ApiError> {
    // Volunteers see their own history; staff may scope to anyone or no one
    let volunteer_filter = match query.volunteer_id {
        Some(id) => {
            authorize(&auth, &Resource::Attendance { owner: id }, Action::Read, &[])?;
            Some(id)
        }
        None if auth.role.is_staff() => None,
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

    if let Some(sid) = query.shift_id {
        where_sql.push_str(" AND shift_id = ?");
        args.push(FilterValue::U64(sid));
    }

    if let Some(from) = query.from {
        where_sql.push_str(" AND DATE(check_in_time) >= ?");
        args.push(FilterValue::Date(from));
    }

    if let Some(to) = query.to {
        where_sql.push_str(" AND DATE(check_in_time) <= ?");
        args.push(FilterValue::Date(to));
    }

    // -------------------------
    // COUNT query
    // -------------------------
    let count_sql = format!("SELECT COUNT(*) FROM attendance_records{}", where_sql);

    let mut count_q = sqlx::query_scalar::<_, i64>(&count_sql);
    for arg in &args {
        count_q = match arg {
            FilterValue::U64(v) => count_q.bind(*v),
            FilterValue::Date(d) => count_q.bind(*d),
        };
    }

    let total = count_q.fetch_one(pool.get_ref()).await?;

    // -------------------------
    // DATA query
    // -------------------------
    let data_sql = format!(
        r#"
        SELECT id, volunteer_id, shift_id, check_in_time, check_out_time, duration_minutes, notes
        FROM attendance_records
        {}
        ORDER BY check_in_time DESC
        LIMIT ? OFFSET ?
        "#,
        where_sql
    );

    let mut data_q = sqlx::query_as::<_, AttendanceRecord>(&data_sql);
    for arg in args {
        data_q = match arg {
            FilterValue::U64(v) => data_q.bind(v),
            FilterValue::Date(d) => data_q.bind(d),
        };
    }

    let records = data_q
        .bind(per_page)
        .bind(offset)
        .fetch_all(pool.get_ref())
        .await?;

    // -------------------------
    // Response
    // -------------------------
    let response = AttendanceListResponse {
        data: records,
        page: page as u32,
        per_page: per_page as u32,
        total,
    };

    Ok(HttpResponse::Ok().json(response))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_check_in_points_at_open_record() {
        let err = reject_open_record(Some(42)).unwrap_err();
        match err {
            ApiError::AlreadyCheckedIn { attendance_id } => assert_eq!(attendance_id, 42),
            other => panic!("expected AlreadyCheckedIn, got {:?}", other),
        }
        assert!(reject_open_record(None).is_ok());
    }

    #[test]
    fn test_lost_close_race_is_already_checked_out() {
        assert!(matches!(close_outcome(0), Err(ApiError::AlreadyCheckedOut)));
        assert!(close_outcome(1).is_ok());
    }

    #[test]
    fn test_checkout_derivation_scenario() {
        // check-in 09:00, check-out 12:30 is 210 minutes, split 3h 30m
        let check_in = chrono::NaiveDate::from_ymd_opt(2026, 3, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        let check_out = chrono::NaiveDate::from_ymd_opt(2026, 3, 1)
            .unwrap()
            .and_hms_opt(12, 30, 0)
            .unwrap();

        let minutes = attendance_record::duration_minutes(check_in, check_out);
        let split = HoursMinutes::from_minutes(minutes);
        assert_eq!(minutes, 210);
        assert_eq!(split, HoursMinutes { hours: 3, minutes: 30 });
        // derived entries are dated on the check-in day
        assert_eq!(check_in.date().to_string(), "2026-03-01");
    }
}
