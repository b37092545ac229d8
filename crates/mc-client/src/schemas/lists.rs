//! Audiences (lists), their stats, growth history and daily activity

use serde::{Deserialize, Serialize};

use super::common::{
    validate_field_list, validate_window, wire_enum, MailchimpQuery, PageParams, QueryPairs,
    SortDir,
};
use crate::error::SchemaError;

wire_enum!(
    ListSortField {
        DateCreated => "date_created",
    }
);

wire_enum!(
    GrowthHistorySortField {
        Month => "month",
    }
);

/// `GET /lists`
#[derive(Debug, Clone, Default)]
pub struct ListsQuery {
    pub page: PageParams,
    pub since_date_created: Option<String>,
    pub before_date_created: Option<String>,
    pub since_campaign_last_sent: Option<String>,
    pub before_campaign_last_sent: Option<String>,
    /// Restrict to audiences containing this address
    pub email: Option<String>,
    pub sort_field: Option<ListSortField>,
    pub sort_dir: Option<SortDir>,
}

impl MailchimpQuery for ListsQuery {
    fn validate(&self) -> Result<(), SchemaError> {
        self.page.validate()?;
        validate_window(
            "since_date_created",
            self.since_date_created.as_deref(),
            "before_date_created",
            self.before_date_created.as_deref(),
        )?;
        validate_window(
            "since_campaign_last_sent",
            self.since_campaign_last_sent.as_deref(),
            "before_campaign_last_sent",
            self.before_campaign_last_sent.as_deref(),
        )?;
        if let Some(email) = &self.email {
            if !email.contains('@') {
                return Err(SchemaError::new("email", "must be an email address"));
            }
        }
        Ok(())
    }

    fn write_query(&self, pairs: &mut QueryPairs) {
        self.page.write_query(pairs);
        pairs
            .push_opt("since_date_created", self.since_date_created.as_ref())
            .push_opt("before_date_created", self.before_date_created.as_ref())
            .push_opt("since_campaign_last_sent", self.since_campaign_last_sent.as_ref())
            .push_opt("before_campaign_last_sent", self.before_campaign_last_sent.as_ref())
            .push_opt("email", self.email.as_ref())
            .push_opt("sort_field", self.sort_field)
            .push_opt("sort_dir", self.sort_dir);
    }
}

/// `GET /lists/{list_id}/growth-history`
#[derive(Debug, Clone, Default)]
pub struct GrowthHistoryQuery {
    pub page: PageParams,
    pub sort_field: Option<GrowthHistorySortField>,
    pub sort_dir: Option<SortDir>,
}

impl MailchimpQuery for GrowthHistoryQuery {
    fn validate(&self) -> Result<(), SchemaError> {
        self.page.validate()
    }

    fn write_query(&self, pairs: &mut QueryPairs) {
        self.page.write_query(pairs);
        pairs
            .push_opt("sort_field", self.sort_field)
            .push_opt("sort_dir", self.sort_dir);
    }
}

/// Projection-only parameters for single-resource reads
#[derive(Debug, Clone, Default)]
pub struct FieldsQuery {
    pub fields: Vec<String>,
    pub exclude_fields: Vec<String>,
}

impl MailchimpQuery for FieldsQuery {
    fn validate(&self) -> Result<(), SchemaError> {
        validate_field_list("fields", &self.fields)?;
        validate_field_list("exclude_fields", &self.exclude_fields)
    }

    fn write_query(&self, pairs: &mut QueryPairs) {
        pairs
            .push_list("fields", &self.fields)
            .push_list("exclude_fields", &self.exclude_fields);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct List {
    pub id: String,
    pub name: String,
    pub web_id: Option<u64>,
    pub contact: Option<ListContact>,
    pub permission_reminder: Option<String>,
    pub campaign_defaults: Option<CampaignDefaults>,
    pub date_created: Option<String>,
    pub list_rating: Option<u8>,
    pub email_type_option: Option<bool>,
    pub subscribe_url_short: Option<String>,
    pub subscribe_url_long: Option<String>,
    pub visibility: Option<String>,
    pub double_optin: Option<bool>,
    #[serde(default)]
    pub stats: ListStats,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListContact {
    pub company: Option<String>,
    pub address1: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CampaignDefaults {
    pub from_name: Option<String>,
    pub from_email: Option<String>,
    pub subject: Option<String>,
    pub language: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ListStats {
    pub member_count: u64,
    pub total_contacts: u64,
    pub unsubscribe_count: u64,
    pub cleaned_count: u64,
    pub member_count_since_send: u64,
    pub unsubscribe_count_since_send: u64,
    pub cleaned_count_since_send: u64,
    pub campaign_count: u64,
    pub campaign_last_sent: Option<String>,
    pub merge_field_count: u64,
    pub avg_sub_rate: f64,
    pub avg_unsub_rate: f64,
    pub target_sub_rate: f64,
    pub open_rate: f64,
    pub click_rate: f64,
    pub last_sub_date: Option<String>,
    pub last_unsub_date: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListsResponse {
    #[serde(default)]
    pub lists: Vec<List>,
    pub total_items: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GrowthHistoryEntry {
    pub list_id: Option<String>,
    pub month: String,
    pub existing: u64,
    pub imports: u64,
    pub optins: u64,
    pub subscribed: u64,
    pub unsubscribed: u64,
    pub reconfirm: u64,
    pub cleaned: u64,
    pub pending: u64,
    pub deleted: u64,
    pub transactional: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrowthHistoryResponse {
    #[serde(default)]
    pub history: Vec<GrowthHistoryEntry>,
    pub list_id: Option<String>,
    pub total_items: u64,
}

/// One day of audience activity
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ListActivity {
    pub day: String,
    pub emails_sent: u64,
    pub unique_opens: u64,
    pub recipient_clicks: u64,
    pub hard_bounce: u64,
    pub soft_bounce: u64,
    pub subs: u64,
    pub unsubs: u64,
    pub other_adds: u64,
    pub other_removes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListActivityResponse {
    #[serde(default)]
    pub activity: Vec<ListActivity>,
    pub list_id: Option<String>,
    #[serde(default)]
    pub total_items: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lists_query() {
        let query = ListsQuery {
            page: PageParams::new(10, 20),
            sort_field: Some(ListSortField::DateCreated),
            sort_dir: Some(SortDir::Desc),
            ..Default::default()
        };
        assert!(query.validate().is_ok());
        let pairs = query.to_query();
        assert_eq!(pairs.get("sort_field"), Some("date_created"));
        assert_eq!(pairs.get("sort_dir"), Some("DESC"));
        assert_eq!(pairs.get("offset"), Some("20"));
        assert_eq!(pairs.get("email"), None);
    }

    #[test]
    fn test_lists_query_rejects_bad_email_and_dates() {
        let query = ListsQuery {
            email: Some("not-an-email".to_string()),
            ..Default::default()
        };
        assert_eq!(query.validate().unwrap_err().field, "email");

        let query = ListsQuery {
            since_date_created: Some("last week".to_string()),
            ..Default::default()
        };
        assert_eq!(query.validate().unwrap_err().field, "since_date_created");
    }

    #[test]
    fn test_list_defaults_missing_stats() {
        let list: List = serde_json::from_str(r#"{"id":"abc","name":"Newsletter"}"#).unwrap();
        assert_eq!(list.stats.member_count, 0);

        let response: ListsResponse = serde_json::from_str(
            r#"{"lists":[{"id":"abc","name":"Newsletter","stats":{"member_count":42,"open_rate":21.5}}],"total_items":1}"#,
        )
        .unwrap();
        assert_eq!(response.lists[0].stats.member_count, 42);
        assert_eq!(response.lists[0].stats.open_rate, 21.5);
    }
}
