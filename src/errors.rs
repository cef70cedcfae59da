use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use derive_more::Display;
use serde_json::json;

/// Request-boundary error taxonomy. Every handler failure is mapped into one
/// of these and surfaced as a structured JSON response; nothing propagates as
/// an unhandled fault.
#[derive(Debug, Display)]
pub enum ApiError {
    #[display(fmt = "{}", _0)]
    NotAuthorized(String),

    #[display(fmt = "{}", _0)]
    NotFound(String),

    /// An open attendance record already exists for this volunteer+shift
    /// pair. Carries the open record's id so the client can offer check-out
    /// instead of erroring blindly.
    #[display(fmt = "already checked in to this shift")]
    AlreadyCheckedIn { attendance_id: u64 },

    /// Idempotency guard: the record was closed by an earlier check-out.
    #[display(fmt = "attendance record is already checked out")]
    AlreadyCheckedOut,

    #[display(fmt = "{}", _0)]
    Validation(String),

    #[display(fmt = "{}", _0)]
    Conflict(String),

    #[display(fmt = "internal server error")]
    Database,
}

impl ApiError {
    pub fn not_authorized(msg: impl Into<String>) -> Self {
        ApiError::NotAuthorized(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        ApiError::NotFound(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        ApiError::Validation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        ApiError::Conflict(msg.into())
    }

    /// Stable machine-readable code carried in every error body.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::NotAuthorized(_) => "NOT_AUTHORIZED",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::AlreadyCheckedIn { .. } => "ALREADY_CHECKED_IN",
            ApiError::AlreadyCheckedOut => "ALREADY_CHECKED_OUT",
            ApiError::Validation(_) => "VALIDATION",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::Database => "INTERNAL",
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotAuthorized(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::AlreadyCheckedIn { .. } => StatusCode::CONFLICT,
            ApiError::AlreadyCheckedOut => StatusCode::CONFLICT,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Database => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut body = json!({
            "code": self.code(),
            "error": self.to_string(),
        });
        if let ApiError::AlreadyCheckedIn { attendance_id } = self {
            body["attendance_id"] = json!(attendance_id);
        }
        HttpResponse::build(self.status_code()).json(body)
    }
}

/// Details are logged here; clients get a generic message. Duplicate-key
/// conflicts are handled at the call sites that expect them.
impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        tracing::error!(error = %e, "database error");
        ApiError::Database
    }
}

/// True when the error is a MySQL duplicate-key violation (SQLSTATE 23000).
pub fn is_duplicate_key(e: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = e {
        return db_err.code().as_deref() == Some("23000");
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ApiError::not_authorized("x").status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(ApiError::not_found("x").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::AlreadyCheckedIn { attendance_id: 1 }.status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::AlreadyCheckedOut.status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::validation("x").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Database.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[actix_web::test]
    async fn test_already_checked_in_body_carries_record_id() {
        let resp = ApiError::AlreadyCheckedIn { attendance_id: 42 }.error_response();
        let bytes = actix_web::body::to_bytes(resp.into_body()).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["code"], "ALREADY_CHECKED_IN");
        assert_eq!(body["attendance_id"], 42);
    }

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(ApiError::AlreadyCheckedOut.code(), "ALREADY_CHECKED_OUT");
        assert_eq!(ApiError::conflict("x").code(), "CONFLICT");
        assert_eq!(ApiError::Database.code(), "INTERNAL");
    }
}
