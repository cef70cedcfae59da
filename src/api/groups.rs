use crate::auth::auth::AuthUser;
use crate::auth::capability::{Action, Resource, authorize};
use crate::errors::{ApiError, is_duplicate_key};
use crate::model::group::{self, Group, GroupMember};
use actix_web::{HttpResponse, web};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct CreateGroupReq {
    #[schema(example = "Kitchen crew")]
    pub name: String,
    #[schema(example = "Meal prep and service", nullable = true)]
    pub description: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct AddMemberReq {
    #[schema(example = 3)]
    pub volunteer_id: u64,
    /// Makes the volunteer a group-admin: they may manage membership and
    /// approve hours logged against this group.
    #[schema(example = false)]
    pub is_admin: Option<bool>,
}

/// List row: the group plus how many volunteers are in it.
#[derive(Serialize, sqlx::FromRow, ToSchema)]
pub struct GroupSummary {
    #[schema(example = 5)]
    pub id: u64,
    #[schema(example = "Kitchen crew")]
    pub name: String,
    #[schema(example = "Meal prep and service", nullable = true)]
    pub description: Option<String>,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: Option<DateTime<Utc>>,
    #[schema(example = 12)]
    pub member_count: i64,
}

/// Detail-view member with the volunteer's name attached.
#[derive(Serialize, sqlx::FromRow, ToSchema)]
pub struct MemberEntry {
    #[schema(example = 3)]
    pub volunteer_id: u64,
    #[schema(example = "Jane")]
    pub first_name: String,
    #[schema(example = "Doe")]
    pub last_name: String,
    #[schema(example = false)]
    pub is_admin: bool,
    #[schema(value_type = String, format = "date-time")]
    pub joined_at: Option<DateTime<Utc>>,
}

#[derive(Serialize, ToSchema)]
pub struct GroupDetailResponse {
    pub group: Group,
    pub members: Vec<MemberEntry>,
}

async fn fetch_group(pool: &MySqlPool, group_id: u64) -> Result<Option<Group>, sqlx::Error> {
    sqlx::query_as::<_, Group>(
        "SELECT id, name, description, created_at FROM `groups` WHERE id = ?",
    )
    .bind(group_id)
    .fetch_optional(pool)
    .await
}

/* =========================
Create a group
========================= */
/// Swagger doc for create_group endpoint
#[utoipa::path(
    post,
    path = "/api/v1/groups",
    request_body = CreateGroupReq,
    responses(
        (status = 201, description = "Group created", body = Group),
        (status = 400, description = "Name is required"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 409, description = "Group name already exists")
    ),
    security(("bearer_auth" = [])),
    tag = "Groups"
)]
pub async fn create_group(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateGroupReq>,
) -> Result<HttpResponse, ApiError> {
    authorize(&auth, &Resource::Group { id: None }, Action::Manage, &[])?;

    if payload.name.trim().is_empty() {
        return Err(ApiError::validation("name is required"));
    }

    let result = sqlx::query("INSERT INTO `groups` (name, description) VALUES (?, ?)")
        .bind(payload.name.trim())
        .bind(payload.description.as_deref())
        .execute(pool.get_ref())
        .await;

    let result = match result {
        Ok(r) => r,
        Err(e) if is_duplicate_key(&e) => {
            return Err(ApiError::conflict("Group name already exists"));
        }
        Err(e) => return Err(e.into()),
    };

    let created = fetch_group(pool.get_ref(), result.last_insert_id())
        .await?
        .ok_or(ApiError::Database)?;

    Ok(HttpResponse::Created().json(created))
}

/* =========================
List groups
========================= */
/// Swagger doc for group_list endpoint
#[utoipa::path(
    get,
    path = "/api/v1/groups",
    responses(
        (status = 200, description = "All groups with member counts", body = [GroupSummary]),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Groups"
)]
pub async fn group_list(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> Result<HttpResponse, ApiError> {
    authorize(&auth, &Resource::Group { id: None }, Action::Read, &[])?;

    let groups = sqlx::query_as::<_, GroupSummary>(
        r#"
        SELECT g.id, g.name, g.description, g.created_at, COUNT(gm.id) AS member_count
        FROM `groups` g
        LEFT JOIN group_members gm ON gm.group_id = g.id
        GROUP BY g.id, g.name, g.description, g.created_at
        ORDER BY g.name ASC
        "#,
    )
    .fetch_all(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(groups))
}

/* =========================
Group detail with members
========================= */
/// Swagger doc for get_group endpoint
#[utoipa::path(
    get,
    path = "/api/v1/groups/{group_id}",
    params(
        ("group_id" = u64, Path, description = "ID of the group to fetch")
    ),
    responses(
        (status = 200, description = "Group with its members", body = GroupDetailResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Group not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Groups"
)]
pub async fn get_group(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    let group_id = path.into_inner();
    authorize(
        &auth,
        &Resource::Group { id: Some(group_id) },
        Action::Read,
        &[],
    )?;

    let group = fetch_group(pool.get_ref(), group_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Group not found"))?;

    let members = sqlx::query_as::<_, MemberEntry>(
        r#"
        SELECT gm.volunteer_id, v.first_name, v.last_name, gm.is_admin, gm.joined_at
        FROM group_members gm
        JOIN volunteers v ON v.id = gm.volunteer_id
        WHERE gm.group_id = ?
        ORDER BY gm.joined_at ASC
        "#,
    )
    .bind(group_id)
    .fetch_all(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(GroupDetailResponse { group, members }))
}

/* =========================
Add a member
========================= */
/// Swagger doc for add_member endpoint
#[utoipa::path(
    post,
    path = "/api/v1/groups/{group_id}/members",
    params(
        ("group_id" = u64, Path, description = "ID of the group")
    ),
    request_body = AddMemberReq,
    responses(
        (status = 201, description = "Membership created", body = GroupMember),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Group or volunteer not found"),
        (status = 409, description = "Already a member")
    ),
    security(("bearer_auth" = [])),
    tag = "Groups"
)]
pub async fn add_member(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<AddMemberReq>,
) -> Result<HttpResponse, ApiError> {
    let group_id = path.into_inner();

    // Staff, or a group-admin of this group
    let group_admin_of = match auth.volunteer_id {
        Some(vid) if !auth.role.is_staff() => group::admin_group_ids(pool.get_ref(), vid).await?,
        _ => Vec::new(),
    };
    authorize(
        &auth,
        &Resource::Group { id: Some(group_id) },
        Action::Manage,
        &group_admin_of,
    )?;

    fetch_group(pool.get_ref(), group_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Group not found"))?;

    let volunteer_exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM volunteers WHERE id = ?)",
    )
    .bind(payload.volunteer_id)
    .fetch_one(pool.get_ref())
    .await?;

    if !volunteer_exists {
        return Err(ApiError::not_found("Volunteer not found"));
    }

    let result = sqlx::query(
        "INSERT INTO group_members (group_id, volunteer_id, is_admin) VALUES (?, ?, ?)",
    )
    .bind(group_id)
    .bind(payload.volunteer_id)
    .bind(payload.is_admin.unwrap_or(false))
    .execute(pool.get_ref())
    .await;

    let result = match result {
        Ok(r) => r,
        Err(e) if is_duplicate_key(&e) => {
            return Err(ApiError::conflict("Already a member of this group"));
        }
        Err(e) => return Err(e.into()),
    };

    let member = sqlx::query_as::<_, GroupMember>(
        "SELECT id, group_id, volunteer_id, is_admin, joined_at FROM group_members WHERE id = ?",
    )
    .bind(result.last_insert_id())
    .fetch_one(pool.get_ref())
    .await?;

    Ok(HttpResponse::Created().json(member))
}

/* =========================
Remove a member
========================= */
/// Swagger doc for remove_member endpoint
#[utoipa::path(
    delete,
    path = "/api/v1/groups/{group_id}/members/{volunteer_id}",
    params(
        ("group_id" = u64, Path, description = "ID of the group"),
        ("volunteer_id" = u64, Path, description = "ID of the volunteer to remove")
    ),
    responses(
        (status = 204, description = "Membership removed"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not a member of this group")
    ),
    security(("bearer_auth" = [])),
    tag = "Groups"
)]
pub async fn remove_member(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<(u64, u64)>,
) -> Result<HttpResponse, ApiError> {
    let (group_id, volunteer_id) = path.into_inner();

    let group_admin_of = match auth.volunteer_id {
        Some(vid) if !auth.role.is_staff() => group::admin_group_ids(pool.get_ref(), vid).await?,
        _ => Vec::new(),
    };
    authorize(
        &auth,
        &Resource::Group { id: Some(group_id) },
        Action::Manage,
        &group_admin_of,
    )?;

    let deleted = sqlx::query("DELETE FROM group_members WHERE group_id = ? AND volunteer_id = ?")
        .bind(group_id)
        .bind(volunteer_id)
        .execute(pool.get_ref())
        .await?;

    if deleted.rows_affected() == 0 {
        return Err(ApiError::not_found("Not a member of this group"));
    }

    Ok(HttpResponse::NoContent().finish())
}
