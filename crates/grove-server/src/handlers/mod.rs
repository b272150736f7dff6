//! HTTP handlers, grouped the way the router mounts them.

pub mod attachments;
pub mod auth;
pub mod events;
pub mod forest;
pub mod logs;
pub mod settings;
pub mod tracking;

use chrono::{DateTime, Utc};

use grove_types::ForestError;

/// Parse an optional RFC 3339 timestamp out of a request field.
pub(crate) fn parse_rfc3339_opt(
    field: &str,
    value: Option<&str>,
) -> Result<Option<DateTime<Utc>>, ForestError> {
    match value {
        None | Some("") => Ok(None),
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|t| Some(t.with_timezone(&Utc)))
            .map_err(|_| ForestError::InvalidArgument(format!("invalid {field} format"))),
    }
}

/// Parse a required RFC 3339 timestamp out of a request field.
pub(crate) fn parse_rfc3339(field: &str, value: &str) -> Result<DateTime<Utc>, ForestError> {
    parse_rfc3339_opt(field, Some(value))?
        .ok_or_else(|| ForestError::InvalidArgument(format!("invalid {field} format")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rfc3339_parsing_accepts_and_rejects() {
        assert!(parse_rfc3339("start_time", "2024-03-01T10:00:00Z").is_ok());
        assert!(parse_rfc3339_opt("start_time", None).unwrap().is_none());
        assert!(parse_rfc3339_opt("start_time", Some("")).unwrap().is_none());
        assert!(matches!(
            parse_rfc3339("start_time", "yesterday"),
            Err(ForestError::InvalidArgument(_))
        ));
    }
}
