//! Audience members and subscriber-hash handling

use std::collections::HashMap;

use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};

use super::common::{validate_window, wire_enum, MailchimpQuery, PageParams, QueryPairs, SortDir};
use crate::error::SchemaError;

wire_enum!(
    MemberStatus {
        Subscribed => "subscribed",
        Unsubscribed => "unsubscribed",
        Cleaned => "cleaned",
        Pending => "pending",
        Transactional => "transactional",
        Archived => "archived",
    }
);

wire_enum!(
    MemberSortField {
        TimestampOpt => "timestamp_opt",
        TimestampSignup => "timestamp_signup",
        LastChanged => "last_changed",
    }
);

/// Mailchimp addresses members by the MD5 of the lowercased email
pub fn subscriber_hash(email: &str) -> String {
    hex::encode(Md5::digest(email.trim().to_lowercase().as_bytes()))
}

/// Accept either a subscriber hash or an email address and return the hash
pub fn resolve_subscriber_id(raw: &str) -> Result<String, SchemaError> {
    let raw = raw.trim();
    if raw.len() == 32 && raw.chars().all(|c| c.is_ascii_hexdigit()) {
        return Ok(raw.to_lowercase());
    }
    if raw.contains('@') && !raw.starts_with('@') && !raw.ends_with('@') {
        return Ok(subscriber_hash(raw));
    }
    Err(SchemaError::new(
        "subscriber",
        "must be an email address or a 32 character MD5 subscriber hash",
    ))
}

/// `GET /lists/{list_id}/members`
#[derive(Debug, Clone, Default)]
pub struct MembersQuery {
    pub page: PageParams,
    pub status: Option<MemberStatus>,
    pub since_last_changed: Option<String>,
    pub before_last_changed: Option<String>,
    pub since_timestamp_opt: Option<String>,
    pub before_timestamp_opt: Option<String>,
    pub vip_only: Option<bool>,
    pub sort_field: Option<MemberSortField>,
    pub sort_dir: Option<SortDir>,
}

impl MailchimpQuery for MembersQuery {
    fn validate(&self) -> Result<(), SchemaError> {
        self.page.validate()?;
        validate_window(
            "since_last_changed",
            self.since_last_changed.as_deref(),
            "before_last_changed",
            self.before_last_changed.as_deref(),
        )?;
        validate_window(
            "since_timestamp_opt",
            self.since_timestamp_opt.as_deref(),
            "before_timestamp_opt",
            self.before_timestamp_opt.as_deref(),
        )
    }

    fn write_query(&self, pairs: &mut QueryPairs) {
        self.page.write_query(pairs);
        pairs
            .push_opt("status", self.status)
            .push_opt("since_last_changed", self.since_last_changed.as_ref())
            .push_opt("before_last_changed", self.before_last_changed.as_ref())
            .push_opt("since_timestamp_opt", self.since_timestamp_opt.as_ref())
            .push_opt("before_timestamp_opt", self.before_timestamp_opt.as_ref())
            .push_opt("vip_only", self.vip_only)
            .push_opt("sort_field", self.sort_field)
            .push_opt("sort_dir", self.sort_dir);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    pub id: String,
    pub email_address: String,
    pub status: String,
    pub unique_email_id: Option<String>,
    pub contact_id: Option<String>,
    pub full_name: Option<String>,
    pub web_id: Option<u64>,
    pub email_type: Option<String>,
    pub unsubscribe_reason: Option<String>,
    #[serde(default)]
    pub merge_fields: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub stats: MemberStats,
    pub ip_signup: Option<String>,
    pub timestamp_signup: Option<String>,
    pub ip_opt: Option<String>,
    pub timestamp_opt: Option<String>,
    pub member_rating: Option<u8>,
    pub last_changed: Option<String>,
    pub language: Option<String>,
    pub vip: Option<bool>,
    pub email_client: Option<String>,
    pub location: Option<MemberLocation>,
    pub source: Option<String>,
    pub tags_count: Option<u32>,
    #[serde(default)]
    pub tags: Vec<MemberTag>,
    pub list_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MemberStats {
    pub avg_open_rate: f64,
    pub avg_click_rate: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemberLocation {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub gmtoff: Option<i32>,
    pub dstoff: Option<i32>,
    pub country_code: Option<String>,
    pub timezone: Option<String>,
    pub region: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberTag {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MembersResponse {
    #[serde(default)]
    pub members: Vec<Member>,
    pub list_id: Option<String>,
    pub total_items: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscriber_hash() {
        // md5("urist.mcvankab@freddiesjokes.com"), as documented by Mailchimp
        assert_eq!(
            subscriber_hash("Urist.McVankab@freddiesjokes.com"),
            "62eeb292278cc15f5817cb78f7790b08"
        );
    }

    #[test]
    fn test_resolve_subscriber_id() {
        assert_eq!(
            resolve_subscriber_id("62EEB292278CC15F5817CB78F7790B08").unwrap(),
            "62eeb292278cc15f5817cb78f7790b08"
        );
        assert_eq!(
            resolve_subscriber_id("urist.mcvankab@freddiesjokes.com").unwrap(),
            "62eeb292278cc15f5817cb78f7790b08"
        );
        assert!(resolve_subscriber_id("nobody").is_err());
        assert!(resolve_subscriber_id("@example.com").is_err());
    }

    #[test]
    fn test_members_query() {
        let query = MembersQuery {
            status: Some("SUBSCRIBED".parse().unwrap()),
            vip_only: Some(true),
            ..Default::default()
        };
        assert!(query.validate().is_ok());
        let pairs = query.to_query();
        assert_eq!(pairs.get("status"), Some("subscribed"));
        assert_eq!(pairs.get("vip_only"), Some("true"));
    }

    #[test]
    fn test_member_tolerates_sparse_payload() {
        let member: Member = serde_json::from_str(
            r#"{"id":"62eeb292278cc15f5817cb78f7790b08","email_address":"a@b.com","status":"subscribed","merge_fields":{"FNAME":"Urist","AGE":42}}"#,
        )
        .unwrap();
        assert_eq!(member.merge_fields["FNAME"], "Urist");
        assert!(member.tags.is_empty());
    }
}
