use crate::errors::ApiError;
use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value;
use sqlx::MySqlPool;

/// ===============================
/// SQL bindable value enum
/// ===============================
#[derive(Debug)]
pub enum SqlValue {
    String(String),
    I64(i64),
    F64(f64),
    Bool(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Null,
}

/// ===============================
/// SQL update container
/// ===============================
#[derive(Debug)]
pub struct SqlUpdate {
    pub sql: String,
    pub values: Vec<SqlValue>,
}

/// ===============================
/// Build dynamic UPDATE SQL
/// ===============================
/// Only columns listed in `allowed` may appear in the payload; anything
/// else is rejected before the SQL string is assembled.
pub fn build_update_sql(
    table: &str,
    payload: &Value,
    allowed: &[&str],
    id_column: &str,
    id_value: i64,
) -> Result<SqlUpdate, ApiError> {
    let obj = payload
        .as_object()
        .ok_or_else(|| ApiError::validation("Payload must be a JSON object"))?;

    if obj.is_empty() {
        return Err(ApiError::validation("No fields provided for update"));
    }

    for key in obj.keys() {
        if !allowed.contains(&key.as_str()) {
            return Err(ApiError::validation(format!(
                "Field '{}' cannot be updated",
                key
            )));
        }
    }

    // Build SET clause
    let set_clause = obj
        .keys()
        .map(|k| format!("{} = ?", k))
        .collect::<Vec<_>>()
        .join(", ");

    let sql = format!("UPDATE {} SET {} WHERE {} = ?", table, set_clause, id_column);

    let mut values = Vec::with_capacity(obj.len() + 1);

    // Convert JSON values → SqlValue
    for value in obj.values() {
        match value {
            Value::String(s) => {
                if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                    values.push(SqlValue::Date(d));
                } else if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
                    values.push(SqlValue::DateTime(dt));
                } else if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
                    values.push(SqlValue::DateTime(dt));
                } else {
                    values.push(SqlValue::String(s.clone()));
                }
            }
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    values.push(SqlValue::I64(i));
                } else if let Some(f) = n.as_f64() {
                    values.push(SqlValue::F64(f));
                }
            }
            Value::Bool(b) => values.push(SqlValue::Bool(*b)),
            Value::Null => values.push(SqlValue::Null),
            _ => return Err(ApiError::validation("Unsupported JSON value type")),
        }
    }

    // WHERE id = ?
    values.push(SqlValue::I64(id_value));

    Ok(SqlUpdate { sql, values })
}

/// ===============================
/// Execute the update
/// ===============================
pub async fn execute_update(pool: &MySqlPool, update: SqlUpdate) -> Result<u64, sqlx::Error> {
    let mut query = sqlx::query(&update.sql);

    for value in update.values {
        query = match value {
            SqlValue::String(v) => query.bind(v),
            SqlValue::I64(v) => query.bind(v),
            SqlValue::F64(v) => query.bind(v),
            SqlValue::Bool(v) => query.bind(v),
            SqlValue::Date(v) => query.bind(v),
            SqlValue::DateTime(v) => query.bind(v),
            SqlValue::Null => query.bind(None::<String>),
        };
    }

    let result = query.execute(pool).await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SHIFT_COLUMNS: &[&str] = &["title", "capacity", "starts_at"];

    #[test]
    fn test_build_update_sql_whitelisted_fields() {
        let payload = json!({ "capacity": 12, "title": "Evening desk" });
        let update = build_update_sql("shifts", &payload, SHIFT_COLUMNS, "id", 7).unwrap();

        assert_eq!(
            update.sql,
            "UPDATE shifts SET capacity = ?, title = ? WHERE id = ?"
        );
        assert_eq!(update.values.len(), 3);
        assert!(matches!(update.values[0], SqlValue::I64(12)));
        assert!(matches!(update.values[2], SqlValue::I64(7)));
    }

    #[test]
    fn test_build_update_sql_rejects_unknown_column() {
        let payload = json!({ "status": "completed" });
        let err = build_update_sql("shifts", &payload, SHIFT_COLUMNS, "id", 1).unwrap_err();
        assert!(err.to_string().contains("cannot be updated"));
    }

    #[test]
    fn test_build_update_sql_rejects_empty_payload() {
        let payload = json!({});
        assert!(build_update_sql("shifts", &payload, SHIFT_COLUMNS, "id", 1).is_err());
    }

    #[test]
    fn test_build_update_sql_rejects_non_object() {
        let payload = json!([1, 2, 3]);
        assert!(build_update_sql("shifts", &payload, SHIFT_COLUMNS, "id", 1).is_err());
    }

    #[test]
    fn test_date_and_datetime_strings_are_coerced() {
        let payload = json!({ "starts_at": "2025-03-01T09:00:00" });
        let update = build_update_sql("shifts", &payload, SHIFT_COLUMNS, "id", 1).unwrap();
        assert!(matches!(update.values[0], SqlValue::DateTime(_)));

        let payload = json!({ "starts_at": "2025-03-01" });
        let update = build_update_sql("shifts", &payload, SHIFT_COLUMNS, "id", 1).unwrap();
        assert!(matches!(update.values[0], SqlValue::Date(_)));
    }
}
