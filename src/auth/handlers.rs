use crate::{
    auth::{
        jwt::{generate_access_token, generate_refresh_token, verify_token},
        password::{hash_password, verify_password},
    },
    config::Config,
    errors::{ApiError, is_duplicate_key},
    model::volunteer::VolunteerStatus,
    models::{LoginReqDto, RegisterReq, TokenType, UserSql},
};
use actix_web::{HttpRequest, HttpResponse, Responder, web};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use std::str::FromStr;
use tracing::{debug, error, info, instrument};

use crate::utils::availability;

// auth end points

/// Creates the volunteer profile and its login account in one transaction.
/// New accounts always get the volunteer role; staff roles are assigned out
/// of band. Returns the new volunteer id.
async fn insert_registration(req: &RegisterReq, pool: &MySqlPool) -> Result<u64, ApiError> {
    let hashed = hash_password(&req.password);

    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        r#"INSERT INTO volunteers (first_name, last_name, email, phone) VALUES (?, ?, ?, ?)"#,
    )
    .bind(req.first_name.trim())
    .bind(req.last_name.trim())
    .bind(req.email.trim().to_lowercase())
    .bind(&req.phone)
    .execute(&mut *tx)
    .await;

    let volunteer_id = match result {
        Ok(res) => res.last_insert_id(),
        Err(e) if is_duplicate_key(&e) => {
            return Err(ApiError::conflict("Email already registered"));
        }
        Err(e) => return Err(e.into()),
    };

    let result = sqlx::query(
        r#"INSERT INTO users (username, password, role_id, volunteer_id) VALUES (?, ?, 3, ?)"#,
    )
    .bind(req.username.trim().to_lowercase())
    .bind(&hashed)
    .bind(volunteer_id)
    .execute(&mut *tx)
    .await;

    match result {
        Ok(_) => {}
        Err(e) if is_duplicate_key(&e) => {
            return Err(ApiError::conflict("Username already exists"));
        }
        Err(e) => return Err(e.into()),
    }

    tx.commit().await?;

    // keep the availability filter and cache in step with the insert
    availability::mark_username_taken(&req.username).await;
    availability::mark_email_taken(&req.email).await;

    Ok(volunteer_id)
}

/// User registration handler. The profile starts in `pending` status and
/// stays unusable until an admin or coordinator approves it.
pub async fn register(
    req: web::Json<RegisterReq>,
    pool: web::Data<MySqlPool>,
) -> Result<HttpResponse, ApiError> {
    let username = req.username.trim();

    if username.is_empty()
        || req.first_name.trim().is_empty()
        || req.last_name.trim().is_empty()
        || req.email.trim().is_empty()
    {
        return Err(ApiError::validation(
            "username, first_name, last_name and email are required",
        ));
    }
    if req.password.len() < 8 {
        return Err(ApiError::validation(
            "password must be at least 8 characters",
        ));
    }

    if !availability::is_username_available(username, pool.get_ref()).await {
        return Err(ApiError::conflict("Username already taken"));
    }
    if !availability::is_email_available(&req.email, pool.get_ref()).await {
        return Err(ApiError::conflict("Email already registered"));
    }

    // Safe to insert after the availability checks; unique keys still back
    // us up against races.
    let volunteer_id = insert_registration(&req, pool.get_ref()).await?;

    info!(volunteer_id, "volunteer registered, awaiting approval");

    Ok(HttpResponse::Created().json(json!({
        "message": "Registration received; an organizer will approve your account",
        "volunteer_id": volunteer_id,
        "status": "pending"
    })))
}

#[derive(Serialize, Deserialize)]
struct LoginResponse {
    access_token: String,
    refresh_token: String,
}

#[instrument(
    name = "auth_login",
    skip(pool, config, user),
    fields(username = %user.username)
)]
pub async fn login(
    user: web::Json<LoginReqDto>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> impl Responder {
    info!("Login request received");

    // 1. Basic validation
    if user.username.trim().is_empty() || user.password.is_empty() {
        info!("Validation failed: empty username or password");
        return HttpResponse::BadRequest().body("Username or password required");
    }

    debug!("Fetching user from database");

    // 2. Fetch user
    let db_user = match sqlx::query_as::<_, UserSql>(
        r#"
        SELECT id, username, password, role_id, volunteer_id
        FROM users
        WHERE username = ?
        "#,
    )
    .bind(user.username.trim().to_lowercase())
    .fetch_optional(pool.get_ref())
    .await
    {
        Ok(Some(user)) => {
            debug!(user_id = user.id, "User found");
            user
        }
        Ok(None) => {
            info!("Invalid credentials: user not found");
            return HttpResponse::Unauthorized().body("Invalid credentials");
        }
        Err(e) => {
            error!(error = %e, "Database error while fetching user");
            return HttpResponse::InternalServerError().finish();
        }
    };

    // 3. Verify password
    if let Err(e) = verify_password(&user.password, &db_user.password) {
        info!(error = %e, "Invalid credentials: password mismatch");
        return HttpResponse::Unauthorized().body("Invalid credentials");
    }

    // 4. Approval gate: pending/inactive profiles may not log in
    if let Some(volunteer_id) = db_user.volunteer_id {
        let status = match sqlx::query_scalar::<_, String>(
            "SELECT status FROM volunteers WHERE id = ?",
        )
        .bind(volunteer_id)
        .fetch_one(pool.get_ref())
        .await
        {
            Ok(s) => s,
            Err(e) => {
                error!(error = %e, volunteer_id, "Failed to fetch volunteer status");
                return HttpResponse::InternalServerError().finish();
            }
        };

        match VolunteerStatus::from_str(&status) {
            Ok(VolunteerStatus::Active) => {}
            Ok(VolunteerStatus::Pending) => {
                info!(volunteer_id, "Login rejected: account awaiting approval");
                return HttpResponse::Forbidden().json(json!({
                    "error": "Account awaiting approval"
                }));
            }
            _ => {
                info!(volunteer_id, "Login rejected: account inactive");
                return HttpResponse::Forbidden().json(json!({
                    "error": "Account is inactive"
                }));
            }
        }
    }

    // 5. Generate tokens
    debug!("Generating tokens");

    let access_token = generate_access_token(
        db_user.id,
        db_user.username.clone(),
        db_user.role_id,
        db_user.volunteer_id,
        &config.jwt_secret,
        config.access_token_ttl,
    );

    let (refresh_token, refresh_claims) = generate_refresh_token(
        db_user.id,
        db_user.username.clone(),
        db_user.role_id,
        db_user.volunteer_id,
        &config.jwt_secret,
        config.refresh_token_ttl,
    );

    // 6. Store refresh token
    debug!(
        user_id = db_user.id,
        jti = %refresh_claims.jti,
        "Storing refresh token"
    );

    if let Err(e) = sqlx::query(
        r#"
        INSERT INTO refresh_tokens (user_id, jti, expires_at)
        VALUES (?, ?, FROM_UNIXTIME(?))
        "#,
    )
    .bind(db_user.id)
    .bind(&refresh_claims.jti)
    .bind(refresh_claims.exp as i64)
    .execute(pool.get_ref())
    .await
    {
        error!(error = %e, "Failed to store refresh token");
        return HttpResponse::InternalServerError().finish();
    }

    // 7. Update last_login_at (non-fatal)
    if let Err(e) = sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = ?")
        .bind(db_user.id)
        .execute(pool.get_ref())
        .await
    {
        error!(error = %e, "Failed to update last_login_at");
        // intentionally not failing login
    }

    info!("Login successful");

    HttpResponse::Ok().json(LoginResponse {
        access_token,
        refresh_token,
    })
}

#[derive(sqlx::FromRow)]
struct RefreshTokenRow {
    id: u64,
    user_id: u64,
    revoked: bool,
}

pub async fn refresh_token(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, ApiError> {
    let header = match req.headers().get("Authorization") {
        Some(h) => h.to_str().unwrap_or(""),
        None => return Ok(HttpResponse::Unauthorized().body("No token")),
    };

    let token = match header.strip_prefix("Bearer ") {
        Some(t) => t,
        None => return Ok(HttpResponse::Unauthorized().body("Invalid token")),
    };

    let claims = match verify_token(token, &config.jwt_secret) {
        Ok(c) => c,
        Err(_) => return Ok(HttpResponse::Unauthorized().finish()),
    };

    if claims.token_type != TokenType::Refresh {
        return Ok(HttpResponse::Unauthorized().finish());
    }

    // 1. Find the refresh token and make sure it has not been revoked
    let record = sqlx::query_as::<_, RefreshTokenRow>(
        r#"
        SELECT id, user_id, revoked
        FROM refresh_tokens
        WHERE jti = ?
        "#,
    )
    .bind(&claims.jti)
    .fetch_optional(pool.get_ref())
    .await?;

    let record = match record {
        Some(r) if !r.revoked => r,
        _ => return Ok(HttpResponse::Unauthorized().finish()),
    };

    // 2. Rotate: revoke the old refresh token
    sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE id = ?")
        .bind(record.id)
        .execute(pool.get_ref())
        .await?;

    // 3. Issue and store a new refresh token
    let (new_refresh_token, new_claims) = generate_refresh_token(
        claims.user_id,
        claims.sub.clone(),
        claims.role,
        claims.volunteer_id,
        &config.jwt_secret,
        config.refresh_token_ttl,
    );

    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (user_id, jti, expires_at)
        VALUES (?, ?, FROM_UNIXTIME(?))
        "#,
    )
    .bind(record.user_id)
    .bind(&new_claims.jti)
    .bind(new_claims.exp as i64)
    .execute(pool.get_ref())
    .await?;

    // 4. New access token
    let access_token = generate_access_token(
        claims.user_id,
        claims.sub.clone(),
        claims.role,
        claims.volunteer_id,
        &config.jwt_secret,
        config.access_token_ttl,
    );

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "access_token": access_token,
        "refresh_token": new_refresh_token
    })))
}

pub async fn logout(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> impl Responder {
    // 1. Extract Authorization header
    let header = match req.headers().get("Authorization") {
        Some(h) => h.to_str().unwrap_or(""),
        None => return HttpResponse::NoContent().finish(),
    };

    let token = match header.strip_prefix("Bearer ") {
        Some(t) => t,
        None => return HttpResponse::NoContent().finish(),
    };

    // 2. Verify JWT
    let claims = match verify_token(token, &config.jwt_secret) {
        Ok(c) => c,
        Err(_) => return HttpResponse::NoContent().finish(),
    };

    // 3. Only refresh tokens can logout
    if claims.token_type != TokenType::Refresh {
        return HttpResponse::NoContent().finish();
    }

    // 4. Revoke refresh token (idempotent)
    let _ = sqlx::query(
        r#"
        UPDATE refresh_tokens
        SET revoked = TRUE
        WHERE jti = ?
        "#,
    )
    .bind(&claims.jti)
    .execute(pool.get_ref())
    .await;

    // 5. Success (even if token didn't exist)
    HttpResponse::NoContent().finish()
}
