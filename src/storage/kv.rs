use serde::Serialize;
use serde_json::Value;

use super::schema::Database;
use super::types::{DatabaseError, DecodedIds};

impl Database {
    // ========================================================================
    // Key-Value Operations
    // ========================================================================

    /// Get the raw stored text for a key, or `None` if not set.
    pub async fn get_value(&self, key: &str) -> Result<Option<String>, DatabaseError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM kv_store WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|(value,)| value))
    }

    /// Set a value (UPSERT).
    ///
    /// Inserts the key if it doesn't exist, or replaces the value and
    /// timestamp if it does. The whole value is written in one statement.
    pub async fn set_value(&self, key: &str, value: &str) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO kv_store (key, value, updated_at)
            VALUES (?, ?, datetime('now'))
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
        "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Serialize `value` as JSON and store it under `key`.
    pub async fn set_json<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
    ) -> Result<(), DatabaseError> {
        let encoded = serde_json::to_string(value).map_err(|source| DatabaseError::Encode {
            key: key.to_string(),
            source,
        })?;
        self.set_value(key, &encoded).await
    }

    /// Delete a key. Returns true if a row was removed.
    pub async fn remove_value(&self, key: &str) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM kv_store WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// Decode a stored id list leniently.
///
/// Numbers and numeric strings are coerced to integer ids (integral floats
/// such as `12.0` are accepted); anything else is dropped. Duplicates keep
/// their first position. A value that is not a JSON array decodes as empty
/// with `unreadable` set.
pub fn decode_id_list(raw: &str) -> DecodedIds {
    let parsed: Value = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(_) => {
            return DecodedIds {
                unreadable: true,
                ..DecodedIds::default()
            }
        }
    };

    let Value::Array(entries) = parsed else {
        return DecodedIds {
            unreadable: true,
            ..DecodedIds::default()
        };
    };

    let mut decoded = DecodedIds::default();
    for entry in entries {
        match coerce_id(&entry) {
            Some(id) if !decoded.ids.contains(&id) => decoded.ids.push(id),
            Some(_) => {}
            None => decoded.dropped += 1,
        }
    }
    decoded
}

fn coerce_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(integral)),
        Value::String(s) => {
            let trimmed = s.trim();
            trimmed
                .parse::<i64>()
                .ok()
                .or_else(|| trimmed.parse::<f64>().ok().and_then(integral))
        }
        _ => None,
    }
}

fn integral(f: f64) -> Option<i64> {
    if f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;

    async fn test_db() -> Database {
        Database::open(":memory:").await.unwrap()
    }

    #[tokio::test]
    async fn test_get_value_missing() {
        let db = test_db().await;
        let value = db.get_value("nonexistent").await.unwrap();
        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn test_set_value_upsert() {
        let db = test_db().await;
        db.set_value("user", "\"alice\"").await.unwrap();
        db.set_value("user", "\"bob\"").await.unwrap();

        let value = db.get_value("user").await.unwrap();
        assert_eq!(value, Some("\"bob\"".to_string()));
    }

    #[tokio::test]
    async fn test_set_json_round_trip() {
        let db = test_db().await;
        db.set_json("favorites_alice", &[3_i64, 1, 2]).await.unwrap();

        let raw = db.get_value("favorites_alice").await.unwrap().unwrap();
        assert_eq!(raw, "[3,1,2]");
        assert_eq!(decode_id_list(&raw).ids, vec![3, 1, 2]);
    }

    #[tokio::test]
    async fn test_remove_value() {
        let db = test_db().await;
        db.set_value("user", "\"alice\"").await.unwrap();

        assert!(db.remove_value("user").await.unwrap());
        assert!(!db.remove_value("user").await.unwrap());
        assert_eq!(db.get_value("user").await.unwrap(), None);
    }

    #[test]
    fn test_decode_coerces_strings_and_floats() {
        let decoded = decode_id_list(r#"[1, "2", " 3 ", 4.0, "5.0"]"#);
        assert_eq!(decoded.ids, vec![1, 2, 3, 4, 5]);
        assert_eq!(decoded.dropped, 0);
        assert!(!decoded.unreadable);
    }

    #[test]
    fn test_decode_drops_uncoercible_entries() {
        let decoded = decode_id_list(r#"[1, "abc", null, {"id": 2}, 2.5, true, 3]"#);
        assert_eq!(decoded.ids, vec![1, 3]);
        assert_eq!(decoded.dropped, 5);
    }

    #[test]
    fn test_decode_collapses_duplicates_keeping_first() {
        let decoded = decode_id_list(r#"[7, 3, "7", 3, 9]"#);
        assert_eq!(decoded.ids, vec![7, 3, 9]);
        assert_eq!(decoded.dropped, 0);
    }

    #[test]
    fn test_decode_non_array_is_unreadable() {
        for raw in [r#"{"a": 1}"#, "42", "\"text\"", "not json at all"] {
            let decoded = decode_id_list(raw);
            assert!(decoded.ids.is_empty(), "{raw}");
            assert!(decoded.unreadable, "{raw}");
        }
    }
}
