use crate::auth::auth::AuthUser;
use crate::auth::capability::{Action, Resource, authorize};
use crate::errors::{ApiError, is_duplicate_key};
use crate::model::notification;
use crate::model::volunteer::{Volunteer, VolunteerStatus};
use crate::utils::db_utils::{build_update_sql, execute_update};
use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::MySqlPool;
use std::str::FromStr;
use tracing::debug;
use utoipa::ToSchema;

/// Columns a profile PUT may touch. Status belongs to the approval and
/// deactivation endpoints.
const VOLUNTEER_UPDATE_COLUMNS: &[&str] = &["first_name", "last_name", "email", "phone"];

#[derive(Debug, Deserialize, ToSchema)]
pub struct VolunteerQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub status: Option<String>,
    pub search: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct VolunteerListResponse {
    #[schema(
    example = json!([{
        "id": 3,
        "first_name": "Jane",
        "last_name": "Doe",
        "email": "jane.doe@example.org",
        "phone": "+15550100",
        "status": "active",
        "joined_at": "2026-01-15T00:00:00Z"
    }])
)]
    pub data: Vec<Volunteer>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 20)]
    pub per_page: u32,
    #[schema(example = 10)]
    pub total: i64,
}

// -------------------- Handlers --------------------

#[utoipa::path(
    get,
    path = "/api/v1/volunteers",
    params(
        ("page", Query, description = "Page number"),
        ("per_page", Query, description = "Items per page"),
        ("status", Query, description = "Filter by status (pending, active, inactive)"),
        ("search", Query, description = "Search by name or email")
    ),
    responses(
        (status = 200, description = "Paginated volunteer list", body = VolunteerListResponse),
        (status = 400, description = "Unknown status filter"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    tag = "Volunteers",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn volunteer_list(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<VolunteerQuery>,
) -> Result<HttpResponse, ApiError> {
    // The roster of people is staff-only
    if !auth.role.is_staff() {
        return Err(ApiError::not_authorized("not allowed"));
    }

    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(20).clamp(1, 100);
    let offset = (page - 1) * per_page;

    // ---------- build WHERE clause dynamically ----------
    let mut conditions = Vec::new();
    let mut bindings: Vec<sqlx::types::JsonValue> = Vec::new();

    if let Some(status) = &query.status {
        VolunteerStatus::from_str(status)
            .map_err(|_| ApiError::validation("Unknown volunteer status"))?;
        conditions.push("status = ?");
        bindings.push(status.clone().into());
    }

    if let Some(search) = &query.search {
        conditions.push("(first_name LIKE ? OR last_name LIKE ? OR email LIKE ?)");
        let like = format!("%{}%", search);
        bindings.push(like.clone().into());
        bindings.push(like.clone().into());
        bindings.push(like.into());
    }

    let where_clause = if conditions.is_empty() {
        "".to_string()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    // ---------- total count ----------
    let count_sql = format!("SELECT COUNT(*) as total FROM volunteers {}", where_clause);
    debug!(sql = %count_sql, bindings = ?bindings, "Counting volunteers");

    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    for b in &bindings {
        count_query = count_query.bind(b);
    }

    let total = count_query.fetch_one(pool.get_ref()).await?;

    // ---------- data query ----------
    let data_sql = format!(
        "SELECT * FROM volunteers {} ORDER BY id DESC LIMIT ? OFFSET ?",
        where_clause
    );
    debug!(sql = %data_sql, bindings = ?bindings, page, per_page, offset, "Fetching volunteers");

    let mut data_query = sqlx::query_as::<_, Volunteer>(&data_sql);
    for b in &bindings {
        data_query = data_query.bind(b);
    }
    data_query = data_query.bind(per_page as i64).bind(offset as i64);

    let volunteers = data_query.fetch_all(pool.get_ref()).await?;

    Ok(HttpResponse::Ok().json(VolunteerListResponse {
        data: volunteers,
        page,
        per_page,
        total,
    }))
}

/// Get volunteer by ID
#[utoipa::path(
    get,
    path = "/api/v1/volunteers/{volunteer_id}",
    params(
        ("volunteer_id", Path, description = "Volunteer ID")
    ),
    responses(
        (status = 200, description = "Volunteer found", body = Volunteer),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Volunteer not found")
    ),
    tag = "Volunteers",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_volunteer(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    let volunteer_id = path.into_inner();
    authorize(
        &auth,
        &Resource::Volunteer { id: volunteer_id },
        Action::Read,
        &[],
    )?;

    let volunteer = fetch_volunteer(pool.get_ref(), volunteer_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Volunteer not found"))?;

    Ok(HttpResponse::Ok().json(volunteer))
}

async fn fetch_volunteer(pool: &MySqlPool, id: u64) -> Result<Option<Volunteer>, sqlx::Error> {
    sqlx::query_as::<_, Volunteer>(
        "SELECT id, first_name, last_name, email, phone, status, joined_at FROM volunteers WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Update volunteer profile
#[utoipa::path(
    put,
    path = "/api/v1/volunteers/{volunteer_id}",
    params(
        ("volunteer_id", Path, description = "Volunteer ID")
    ),
    request_body(
        content = Object,
        description = "Subset of first_name, last_name, email, phone",
        content_type = "application/json"
    ),
    responses(
        (status = 200, description = "Updated volunteer", body = Volunteer),
        (status = 400, description = "Unknown column"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Volunteer not found"),
        (status = 409, description = "Email already in use")
    ),
    tag = "Volunteers",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_volunteer(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> Result<HttpResponse, ApiError> {
    let volunteer_id = path.into_inner();
    authorize(
        &auth,
        &Resource::Volunteer { id: volunteer_id },
        Action::Update,
        &[],
    )?;

    let update = build_update_sql(
        "volunteers",
        &body,
        VOLUNTEER_UPDATE_COLUMNS,
        "id",
        volunteer_id as i64,
    )?;

    let affected = match execute_update(pool.get_ref(), update).await {
        Ok(n) => n,
        Err(e) if is_duplicate_key(&e) => {
            return Err(ApiError::conflict("Email already in use"));
        }
        Err(e) => return Err(e.into()),
    };

    if affected == 0 {
        return Err(ApiError::not_found("Volunteer not found"));
    }

    let volunteer = fetch_volunteer(pool.get_ref(), volunteer_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Volunteer not found"))?;

    Ok(HttpResponse::Ok().json(volunteer))
}

/// Approve a pending registration
#[utoipa::path(
    put,
    path = "/api/v1/volunteers/{volunteer_id}/approve",
    params(
        ("volunteer_id", Path, description = "Volunteer ID")
    ),
    responses(
        (status = 200, description = "Activated volunteer", body = Volunteer),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Volunteer not found"),
        (status = 409, description = "Registration already processed")
    ),
    tag = "Volunteers",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn approve_volunteer(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    let volunteer_id = path.into_inner();
    authorize(
        &auth,
        &Resource::Volunteer { id: volunteer_id },
        Action::Approve,
        &[],
    )?;

    fetch_volunteer(pool.get_ref(), volunteer_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Volunteer not found"))?;

    // Conditional flip: only a pending registration can be approved
    let updated = sqlx::query("UPDATE volunteers SET status = 'active' WHERE id = ? AND status = 'pending'")
        .bind(volunteer_id)
        .execute(pool.get_ref())
        .await?;

    if updated.rows_affected() == 0 {
        return Err(ApiError::conflict("Registration already processed"));
    }

    let volunteer = fetch_volunteer(pool.get_ref(), volunteer_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Volunteer not found"))?;

    notification::dispatch(
        pool.get_ref().clone(),
        volunteer_id,
        "Your registration has been approved. Welcome aboard!".to_string(),
    );

    Ok(HttpResponse::Ok().json(volunteer))
}

/// Deactivate a volunteer (admin only)
#[utoipa::path(
    put,
    path = "/api/v1/volunteers/{volunteer_id}/deactivate",
    params(
        ("volunteer_id", Path, description = "Volunteer ID")
    ),
    responses(
        (status = 200, description = "Deactivated volunteer", body = Volunteer),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Volunteer not found"),
        (status = 409, description = "Volunteer is not active")
    ),
    tag = "Volunteers",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn deactivate_volunteer(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    let volunteer_id = path.into_inner();
    authorize(
        &auth,
        &Resource::Volunteer { id: volunteer_id },
        Action::Manage,
        &[],
    )?;

    fetch_volunteer(pool.get_ref(), volunteer_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Volunteer not found"))?;

    let updated = sqlx::query("UPDATE volunteers SET status = 'inactive' WHERE id = ? AND status = 'active'")
        .bind(volunteer_id)
        .execute(pool.get_ref())
        .await?;

    if updated.rows_affected() == 0 {
        return Err(ApiError::conflict("Volunteer is not active"));
    }

    let volunteer = fetch_volunteer(pool.get_ref(), volunteer_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Volunteer not found"))?;

    Ok(HttpResponse::Ok().json(volunteer))
}
