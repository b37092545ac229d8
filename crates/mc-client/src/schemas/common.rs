//! Shared schema pieces: links, paging, sort direction, RFC 7807 problem
//! documents and the parameter validation helpers used by every resource.

use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::SchemaError;

pub const MAX_COUNT: u32 = 1000;
pub const MAX_OFFSET: u32 = 1_000_000;

/// Declares a closed set of string values sent to or received from Mailchimp.
macro_rules! wire_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $wire:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        pub enum $name {
            $(#[serde(rename = $wire)] $variant,)+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $wire,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::error::SchemaError;

            fn from_str(raw: &str) -> Result<Self, Self::Err> {
                let raw = raw.trim();
                $name::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str().eq_ignore_ascii_case(raw))
                    .ok_or_else(|| {
                        let allowed: Vec<&str> = $name::ALL.iter().map(|v| v.as_str()).collect();
                        $crate::error::SchemaError::new(
                            stringify!($name),
                            format!("'{}' is not one of: {}", raw, allowed.join(", ")),
                        )
                    })
            }
        }
    };
}
pub(crate) use wire_enum;

wire_enum!(
    /// Sort direction accepted by every Mailchimp collection endpoint
    SortDir {
        Asc => "ASC",
        Desc => "DESC",
    }
);

/// Parse a wire enum, attributing failures to `field`
pub fn parse_enum<T>(field: &str, raw: &str) -> Result<T, SchemaError>
where
    T: std::str::FromStr<Err = SchemaError>,
{
    raw.parse::<T>().map_err(|e| SchemaError::new(field, e.message))
}

/// HATEOAS link attached to most Mailchimp resources
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Link {
    #[serde(default)]
    pub rel: String,
    #[serde(default)]
    pub href: String,
    #[serde(default)]
    pub method: String,
}

/// RFC 7807 error document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProblemDetail {
    #[serde(rename = "type")]
    pub problem_type: Option<String>,
    pub title: Option<String>,
    pub status: Option<u16>,
    pub detail: Option<String>,
    pub instance: Option<String>,
    #[serde(default)]
    pub errors: Vec<ProblemFieldError>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProblemFieldError {
    #[serde(default)]
    pub field: String,
    #[serde(default)]
    pub message: String,
}

impl ProblemDetail {
    /// `detail`, falling back to `title`; field errors are appended
    pub fn message(&self) -> Option<String> {
        let base = self
            .detail
            .as_deref()
            .filter(|d| !d.trim().is_empty())
            .or_else(|| self.title.as_deref().filter(|t| !t.trim().is_empty()))?;

        if self.errors.is_empty() {
            return Some(base.to_string());
        }

        let fields: Vec<String> = self
            .errors
            .iter()
            .map(|e| {
                if e.field.is_empty() {
                    e.message.clone()
                } else {
                    format!("{}: {}", e.field, e.message)
                }
            })
            .collect();
        Some(format!("{} ({})", base, fields.join("; ")))
    }
}

// ============================================================================
// Query building
// ============================================================================

/// Ordered query-string pairs. Built explicitly so comma-joined lists and
/// optional values never depend on urlencoded serializer quirks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryPairs(Vec<(&'static str, String)>);

impl QueryPairs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: &'static str, value: impl ToString) -> &mut Self {
        self.0.push((key, value.to_string()));
        self
    }

    pub fn push_opt<V: ToString>(&mut self, key: &'static str, value: Option<V>) -> &mut Self {
        if let Some(value) = value {
            self.push(key, value);
        }
        self
    }

    pub fn push_list(&mut self, key: &'static str, values: &[String]) -> &mut Self {
        if !values.is_empty() {
            self.push(key, values.join(","));
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.iter().find(|(k, _)| *k == key).map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_vec(self) -> Vec<(&'static str, String)> {
        self.0
    }
}

/// Request parameters that are checked locally and then sent as a query string
pub trait MailchimpQuery {
    fn validate(&self) -> Result<(), SchemaError>;

    fn write_query(&self, pairs: &mut QueryPairs);

    fn to_query(&self) -> QueryPairs {
        let mut pairs = QueryPairs::new();
        self.write_query(&mut pairs);
        pairs
    }
}

/// Paging and projection parameters shared by collection endpoints
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageParams {
    pub count: Option<u32>,
    pub offset: Option<u32>,
    pub fields: Vec<String>,
    pub exclude_fields: Vec<String>,
}

impl PageParams {
    pub fn new(count: u32, offset: u32) -> Self {
        Self {
            count: Some(count),
            offset: Some(offset),
            ..Default::default()
        }
    }
}

impl MailchimpQuery for PageParams {
    fn validate(&self) -> Result<(), SchemaError> {
        if let Some(count) = self.count {
            if count == 0 || count > MAX_COUNT {
                return Err(SchemaError::new(
                    "count",
                    format!("must be between 1 and {}", MAX_COUNT),
                ));
            }
        }
        if let Some(offset) = self.offset {
            if offset > MAX_OFFSET {
                return Err(SchemaError::new(
                    "offset",
                    format!("must not exceed {}", MAX_OFFSET),
                ));
            }
        }
        validate_field_list("fields", &self.fields)?;
        validate_field_list("exclude_fields", &self.exclude_fields)
    }

    fn write_query(&self, pairs: &mut QueryPairs) {
        pairs
            .push_opt("count", self.count)
            .push_opt("offset", self.offset)
            .push_list("fields", &self.fields)
            .push_list("exclude_fields", &self.exclude_fields);
    }
}

// ============================================================================
// Validation helpers
// ============================================================================

fn id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]{1,64}$").expect("static regex"))
}

fn field_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_.]+$").expect("static regex"))
}

/// Resource ids end up in the URL path, so only a safe alphabet is accepted
pub fn validate_id(field: &str, id: &str) -> Result<(), SchemaError> {
    if id_pattern().is_match(id) {
        Ok(())
    } else {
        Err(SchemaError::new(
            field,
            "must be 1-64 characters of letters, digits, '-' or '_'",
        ))
    }
}

pub fn validate_field_list(field: &str, values: &[String]) -> Result<(), SchemaError> {
    match values.iter().find(|v| !field_pattern().is_match(v)) {
        Some(bad) => Err(SchemaError::new(field, format!("invalid field name '{}'", bad))),
        None => Ok(()),
    }
}

/// Accepts RFC 3339 timestamps and plain `YYYY-MM-DD` dates
pub fn validate_datetime(field: &str, value: Option<&str>) -> Result<(), SchemaError> {
    let Some(value) = value else {
        return Ok(());
    };
    if parse_instant(value).is_some() {
        Ok(())
    } else {
        Err(SchemaError::new(
            field,
            format!("'{}' is not an ISO 8601 date or timestamp", value),
        ))
    }
}

/// A plain date is read as midnight UTC
fn parse_instant(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Both bounds valid and `since` not after `before`
pub fn validate_window(
    since_field: &str,
    since: Option<&str>,
    before_field: &str,
    before: Option<&str>,
) -> Result<(), SchemaError> {
    validate_datetime(since_field, since)?;
    validate_datetime(before_field, before)?;

    if let (Some(since), Some(before)) = (since, before) {
        if let (Some(since), Some(before)) = (parse_instant(since), parse_instant(before)) {
            if since > before {
                return Err(SchemaError::new(
                    since_field,
                    format!("must not be later than {}", before_field),
                ));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_dir_parsing() {
        assert_eq!("asc".parse::<SortDir>().unwrap(), SortDir::Asc);
        assert_eq!("DESC".parse::<SortDir>().unwrap(), SortDir::Desc);
        let err = parse_enum::<SortDir>("sort_dir", "sideways").unwrap_err();
        assert_eq!(err.field, "sort_dir");
        assert!(err.message.contains("ASC, DESC"));
    }

    #[test]
    fn test_page_params_validation() {
        assert!(PageParams::new(10, 0).validate().is_ok());
        assert!(PageParams::new(1000, 1_000_000).validate().is_ok());
        assert_eq!(PageParams::new(0, 0).validate().unwrap_err().field, "count");
        assert_eq!(PageParams::new(1001, 0).validate().unwrap_err().field, "count");
        assert_eq!(PageParams::new(10, 1_000_001).validate().unwrap_err().field, "offset");

        let params = PageParams {
            fields: vec!["lists.id".to_string(), "bad field".to_string()],
            ..Default::default()
        };
        assert_eq!(params.validate().unwrap_err().field, "fields");
    }

    #[test]
    fn test_page_params_query() {
        let params = PageParams {
            count: Some(20),
            offset: Some(40),
            fields: vec!["lists.id".to_string(), "lists.name".to_string()],
            exclude_fields: vec![],
        };
        let query = params.to_query();
        assert_eq!(query.get("count"), Some("20"));
        assert_eq!(query.get("offset"), Some("40"));
        assert_eq!(query.get("fields"), Some("lists.id,lists.name"));
        assert_eq!(query.get("exclude_fields"), None);
    }

    #[test]
    fn test_validate_id() {
        assert!(validate_id("list_id", "a1b2c3d4e5").is_ok());
        assert!(validate_id("list_id", "with-dash_and_underscore").is_ok());
        assert!(validate_id("list_id", "").is_err());
        assert!(validate_id("list_id", "../admin").is_err());
        assert!(validate_id("list_id", &"x".repeat(65)).is_err());
    }

    #[test]
    fn test_validate_window() {
        assert!(validate_window("since", Some("2024-01-01T00:00:00Z"), "before", Some("2024-02-01T00:00:00+00:00")).is_ok());
        assert!(validate_window("since", Some("2024-01-01"), "before", None).is_ok());
        assert_eq!(
            validate_window("since", Some("yesterday"), "before", None).unwrap_err().field,
            "since"
        );
        assert_eq!(
            validate_window("since", Some("2024-03-01T00:00:00Z"), "before", Some("2024-02-01T00:00:00Z"))
                .unwrap_err()
                .field,
            "since"
        );
        assert!(validate_window("since", Some("2024-01-01"), "before", Some("2024-01-01")).is_ok());
        assert_eq!(
            validate_window("since", Some("2024-03-01"), "before", Some("2024-02-01"))
                .unwrap_err()
                .field,
            "since"
        );
        assert!(validate_window("since", Some("2024-03-02"), "before", Some("2024-03-01T12:00:00Z")).is_err());
    }

    #[test]
    fn test_problem_detail_message() {
        let problem: ProblemDetail = serde_json::from_str(
            r#"{"type":"x","title":"Invalid Resource","status":400,"detail":"The resource submitted could not be validated.","errors":[{"field":"email_address","message":"This value should not be blank."}]}"#,
        )
        .unwrap();
        assert_eq!(
            problem.message().unwrap(),
            "The resource submitted could not be validated. (email_address: This value should not be blank.)"
        );

        let title_only = ProblemDetail {
            title: Some("Forbidden".to_string()),
            ..Default::default()
        };
        assert_eq!(title_only.message().as_deref(), Some("Forbidden"));
        assert!(ProblemDetail::default().message().is_none());
    }
}
