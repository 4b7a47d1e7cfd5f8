//! Database helper functions for safe type conversions.

use rusqlite::types::Type;

/// Parse a UUID string from database, returning a rusqlite error on failure.
pub fn parse_uuid(s: &str) -> rusqlite::Result<uuid::Uuid> {
    uuid::Uuid::parse_str(s)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))
}

/// Decode a JSON string-array column, treating garbage as empty.
pub fn parse_string_list(s: &str) -> Vec<String> {
    serde_json::from_str(s).unwrap_or_else(|e| {
        log::warn!("Discarding malformed list column: {e}");
        Vec::new()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_uuid_rejects_garbage() {
        assert!(parse_uuid("not-a-uuid").is_err());
    }

    #[test]
    fn test_parse_string_list_malformed() {
        assert!(parse_string_list("{oops").is_empty());
        assert_eq!(parse_string_list(r#"["a","b"]"#), vec!["a", "b"]);
    }
}
