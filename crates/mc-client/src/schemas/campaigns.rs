//! Campaigns, their settings and rendered content

use serde::{Deserialize, Serialize};

use super::common::{validate_id, validate_window, wire_enum, MailchimpQuery, PageParams, QueryPairs, SortDir};
use crate::error::SchemaError;

wire_enum!(
    CampaignType {
        Regular => "regular",
        Plaintext => "plaintext",
        Absplit => "absplit",
        Rss => "rss",
        Variate => "variate",
    }
);

wire_enum!(
    CampaignStatus {
        Save => "save",
        Paused => "paused",
        Schedule => "schedule",
        Sending => "sending",
        Sent => "sent",
    }
);

wire_enum!(
    CampaignSortField {
        CreateTime => "create_time",
        SendTime => "send_time",
    }
);

/// `GET /campaigns`
#[derive(Debug, Clone, Default)]
pub struct CampaignsQuery {
    pub page: PageParams,
    pub campaign_type: Option<CampaignType>,
    pub status: Option<CampaignStatus>,
    pub since_send_time: Option<String>,
    pub before_send_time: Option<String>,
    pub since_create_time: Option<String>,
    pub before_create_time: Option<String>,
    pub list_id: Option<String>,
    pub folder_id: Option<String>,
    pub sort_field: Option<CampaignSortField>,
    pub sort_dir: Option<SortDir>,
}

impl MailchimpQuery for CampaignsQuery {
    fn validate(&self) -> Result<(), SchemaError> {
        self.page.validate()?;
        validate_window(
            "since_send_time",
            self.since_send_time.as_deref(),
            "before_send_time",
            self.before_send_time.as_deref(),
        )?;
        validate_window(
            "since_create_time",
            self.since_create_time.as_deref(),
            "before_create_time",
            self.before_create_time.as_deref(),
        )?;
        if let Some(list_id) = &self.list_id {
            validate_id("list_id", list_id)?;
        }
        if let Some(folder_id) = &self.folder_id {
            validate_id("folder_id", folder_id)?;
        }
        Ok(())
    }

    fn write_query(&self, pairs: &mut QueryPairs) {
        self.page.write_query(pairs);
        pairs
            .push_opt("type", self.campaign_type)
            .push_opt("status", self.status)
            .push_opt("since_send_time", self.since_send_time.as_ref())
            .push_opt("before_send_time", self.before_send_time.as_ref())
            .push_opt("since_create_time", self.since_create_time.as_ref())
            .push_opt("before_create_time", self.before_create_time.as_ref())
            .push_opt("list_id", self.list_id.as_ref())
            .push_opt("folder_id", self.folder_id.as_ref())
            .push_opt("sort_field", self.sort_field)
            .push_opt("sort_dir", self.sort_dir);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub id: String,
    #[serde(rename = "type")]
    pub campaign_type: String,
    pub status: String,
    pub web_id: Option<u64>,
    pub create_time: Option<String>,
    pub archive_url: Option<String>,
    pub long_archive_url: Option<String>,
    #[serde(default)]
    pub emails_sent: u64,
    pub send_time: Option<String>,
    pub content_type: Option<String>,
    pub needs_block_refresh: Option<bool>,
    pub resendable: Option<bool>,
    pub recipients: Option<CampaignRecipients>,
    pub settings: Option<CampaignSettings>,
    pub tracking: Option<CampaignTracking>,
    pub report_summary: Option<ReportSummary>,
}

impl Campaign {
    /// Human label for tables: title, then subject line, then id
    pub fn display_name(&self) -> &str {
        self.settings
            .as_ref()
            .and_then(|s| s.title.as_deref().filter(|t| !t.is_empty()).or(s.subject_line.as_deref()))
            .filter(|t| !t.is_empty())
            .unwrap_or(&self.id)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CampaignRecipients {
    pub list_id: Option<String>,
    pub list_is_active: Option<bool>,
    pub list_name: Option<String>,
    pub segment_text: Option<String>,
    pub recipient_count: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CampaignSettings {
    pub subject_line: Option<String>,
    pub preview_text: Option<String>,
    pub title: Option<String>,
    pub from_name: Option<String>,
    pub reply_to: Option<String>,
    pub use_conversation: Option<bool>,
    pub to_name: Option<String>,
    pub folder_id: Option<String>,
    pub authenticate: Option<bool>,
    pub auto_footer: Option<bool>,
    pub inline_css: Option<bool>,
    pub template_id: Option<u64>,
    pub drag_and_drop: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CampaignTracking {
    pub opens: Option<bool>,
    pub html_clicks: Option<bool>,
    pub text_clicks: Option<bool>,
    pub goal_tracking: Option<bool>,
    pub ecomm360: Option<bool>,
    pub google_analytics: Option<String>,
    pub clicktale: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportSummary {
    pub opens: u64,
    pub unique_opens: u64,
    pub open_rate: f64,
    pub clicks: u64,
    pub subscriber_clicks: u64,
    pub click_rate: f64,
    pub ecommerce: Option<EcommerceSummary>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EcommerceSummary {
    pub total_orders: u64,
    pub total_spent: f64,
    pub total_revenue: f64,
    pub currency_code: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignsResponse {
    #[serde(default)]
    pub campaigns: Vec<Campaign>,
    pub total_items: u64,
}

/// `GET /campaigns/{campaign_id}/content`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CampaignContent {
    pub plain_text: Option<String>,
    pub html: Option<String>,
    pub archive_html: Option<String>,
    #[serde(default)]
    pub variate_contents: Vec<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_campaigns_query() {
        let query = CampaignsQuery {
            campaign_type: Some(CampaignType::Regular),
            status: Some(CampaignStatus::Sent),
            since_send_time: Some("2024-01-01T00:00:00Z".to_string()),
            sort_field: Some(CampaignSortField::SendTime),
            sort_dir: Some(SortDir::Desc),
            ..Default::default()
        };
        assert!(query.validate().is_ok());
        let pairs = query.to_query();
        assert_eq!(pairs.get("type"), Some("regular"));
        assert_eq!(pairs.get("status"), Some("sent"));
        assert_eq!(pairs.get("sort_field"), Some("send_time"));
    }

    #[test]
    fn test_campaigns_query_rejects_bad_list_id() {
        let query = CampaignsQuery {
            list_id: Some("abc/../def".to_string()),
            ..Default::default()
        };
        assert_eq!(query.validate().unwrap_err().field, "list_id");
    }

    #[test]
    fn test_unknown_status_parse_fails() {
        assert!("archived".parse::<CampaignStatus>().is_err());
    }

    #[test]
    fn test_display_name() {
        let campaign: Campaign = serde_json::from_str(
            r#"{"id":"c1","type":"regular","status":"sent","settings":{"title":"","subject_line":"Hello"}}"#,
        )
        .unwrap();
        assert_eq!(campaign.display_name(), "Hello");

        let bare: Campaign =
            serde_json::from_str(r#"{"id":"c2","type":"regular","status":"save"}"#).unwrap();
        assert_eq!(bare.display_name(), "c2");
    }
}
