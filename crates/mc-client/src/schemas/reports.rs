//! Campaign reports and their drill-down collections

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::campaigns::{CampaignType, EcommerceSummary};
use super::common::{validate_datetime, validate_window, wire_enum, MailchimpQuery, PageParams, QueryPairs};
use crate::error::SchemaError;

wire_enum!(
    SentToStatus {
        Sent => "sent",
        Hard => "hard",
        Soft => "soft",
    }
);

/// `GET /reports`
#[derive(Debug, Clone, Default)]
pub struct ReportsQuery {
    pub page: PageParams,
    pub campaign_type: Option<CampaignType>,
    pub since_send_time: Option<String>,
    pub before_send_time: Option<String>,
}

impl MailchimpQuery for ReportsQuery {
    fn validate(&self) -> Result<(), SchemaError> {
        self.page.validate()?;
        validate_window(
            "since_send_time",
            self.since_send_time.as_deref(),
            "before_send_time",
            self.before_send_time.as_deref(),
        )
    }

    fn write_query(&self, pairs: &mut QueryPairs) {
        self.page.write_query(pairs);
        pairs
            .push_opt("type", self.campaign_type)
            .push_opt("since_send_time", self.since_send_time.as_ref())
            .push_opt("before_send_time", self.before_send_time.as_ref());
    }
}

/// Paging plus a `since` cutoff, for open-details and email-activity
#[derive(Debug, Clone, Default)]
pub struct ActivitySinceQuery {
    pub page: PageParams,
    pub since: Option<String>,
}

impl MailchimpQuery for ActivitySinceQuery {
    fn validate(&self) -> Result<(), SchemaError> {
        self.page.validate()?;
        validate_datetime("since", self.since.as_deref())
    }

    fn write_query(&self, pairs: &mut QueryPairs) {
        self.page.write_query(pairs);
        pairs.push_opt("since", self.since.as_ref());
    }
}

/// `GET /reports/{campaign_id}/sent-to`
#[derive(Debug, Clone, Default)]
pub struct SentToQuery {
    pub page: PageParams,
    pub status: Option<SentToStatus>,
}

impl MailchimpQuery for SentToQuery {
    fn validate(&self) -> Result<(), SchemaError> {
        self.page.validate()
    }

    fn write_query(&self, pairs: &mut QueryPairs) {
        self.page.write_query(pairs);
        pairs.push_opt("status", self.status);
    }
}

// ============================================================================
// Campaign report
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignReport {
    pub id: String,
    pub campaign_title: Option<String>,
    #[serde(rename = "type")]
    pub campaign_type: Option<String>,
    pub list_id: Option<String>,
    pub list_is_active: Option<bool>,
    pub list_name: Option<String>,
    pub subject_line: Option<String>,
    pub preview_text: Option<String>,
    #[serde(default)]
    pub emails_sent: u64,
    #[serde(default)]
    pub abuse_reports: u64,
    #[serde(default)]
    pub unsubscribed: u64,
    pub send_time: Option<String>,
    pub rss_last_send: Option<String>,
    #[serde(default)]
    pub bounces: Bounces,
    #[serde(default)]
    pub forwards: Forwards,
    #[serde(default)]
    pub opens: Opens,
    #[serde(default)]
    pub clicks: Clicks,
    pub industry_stats: Option<ReportIndustryStats>,
    pub list_stats: Option<ReportListStats>,
    #[serde(default)]
    pub timeseries: Vec<TimeseriesPoint>,
    pub ecommerce: Option<EcommerceSummary>,
    pub delivery_status: Option<DeliveryStatus>,
}

impl CampaignReport {
    pub fn total_bounces(&self) -> u64 {
        self.bounces.hard_bounces + self.bounces.soft_bounces + self.bounces.syntax_errors
    }

    /// Delivered = sent minus bounces, never negative
    pub fn delivered(&self) -> u64 {
        self.emails_sent.saturating_sub(self.total_bounces())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Bounces {
    pub hard_bounces: u64,
    pub soft_bounces: u64,
    pub syntax_errors: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Forwards {
    pub forwards_count: u64,
    pub forwards_opens: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Opens {
    pub opens_total: u64,
    pub unique_opens: u64,
    pub open_rate: f64,
    pub last_open: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Clicks {
    pub clicks_total: u64,
    pub unique_clicks: u64,
    pub unique_subscriber_clicks: u64,
    pub click_rate: f64,
    pub last_click: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportIndustryStats {
    #[serde(rename = "type")]
    pub industry: Option<String>,
    pub open_rate: f64,
    pub click_rate: f64,
    pub bounce_rate: f64,
    pub unopen_rate: f64,
    pub unsub_rate: f64,
    pub abuse_rate: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportListStats {
    pub sub_rate: f64,
    pub unsub_rate: f64,
    pub open_rate: f64,
    pub click_rate: f64,
}

/// Hourly engagement for the first 24 hours after send
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeseriesPoint {
    pub timestamp: String,
    pub emails_sent: u64,
    pub unique_opens: u64,
    pub recipients_clicks: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeliveryStatus {
    #[serde(default)]
    pub enabled: bool,
    pub can_cancel: Option<bool>,
    pub status: Option<String>,
    pub emails_sent: Option<u64>,
    pub emails_canceled: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportsResponse {
    #[serde(default)]
    pub reports: Vec<CampaignReport>,
    pub total_items: u64,
}

// ============================================================================
// Drill-down collections
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenDetailsResponse {
    #[serde(default)]
    pub members: Vec<OpenMember>,
    pub campaign_id: Option<String>,
    #[serde(default)]
    pub total_opens: u64,
    pub total_items: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenMember {
    pub email_address: String,
    pub email_id: Option<String>,
    pub campaign_id: Option<String>,
    pub list_id: Option<String>,
    pub list_is_active: Option<bool>,
    pub contact_status: Option<String>,
    #[serde(default)]
    pub merge_fields: HashMap<String, serde_json::Value>,
    pub vip: Option<bool>,
    #[serde(default)]
    pub opens_count: u64,
    #[serde(default)]
    pub opens: Vec<OpenEvent>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenEvent {
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClickDetailsResponse {
    #[serde(default)]
    pub urls_clicked: Vec<UrlClick>,
    pub campaign_id: Option<String>,
    pub total_items: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlClick {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub total_clicks: u64,
    #[serde(default)]
    pub click_percentage: f64,
    #[serde(default)]
    pub unique_clicks: u64,
    #[serde(default)]
    pub unique_click_percentage: f64,
    pub last_click: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailActivityResponse {
    #[serde(default)]
    pub emails: Vec<EmailActivity>,
    pub campaign_id: Option<String>,
    pub total_items: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailActivity {
    pub email_address: String,
    pub email_id: Option<String>,
    pub campaign_id: Option<String>,
    pub list_id: Option<String>,
    pub list_is_active: Option<bool>,
    #[serde(default)]
    pub activity: Vec<ActivityEvent>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub action: String,
    #[serde(rename = "type")]
    pub activity_type: Option<String>,
    pub timestamp: String,
    pub url: Option<String>,
    pub ip: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnsubscribesResponse {
    #[serde(default)]
    pub unsubscribes: Vec<Unsubscribe>,
    pub campaign_id: Option<String>,
    pub total_items: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Unsubscribe {
    pub email_address: String,
    pub email_id: Option<String>,
    #[serde(default)]
    pub merge_fields: HashMap<String, serde_json::Value>,
    pub vip: Option<bool>,
    pub timestamp: Option<String>,
    pub reason: Option<String>,
    pub campaign_id: Option<String>,
    pub list_id: Option<String>,
    pub list_is_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainPerformanceResponse {
    #[serde(default)]
    pub domains: Vec<DomainPerformance>,
    #[serde(default)]
    pub total_sent: u64,
    pub campaign_id: Option<String>,
    #[serde(default)]
    pub total_items: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DomainPerformance {
    pub domain: String,
    pub emails_sent: u64,
    pub bounces: u64,
    pub opens: u64,
    pub clicks: u64,
    pub unsubs: u64,
    pub delivered: u64,
    pub emails_pct: f64,
    pub bounces_pct: f64,
    pub opens_pct: f64,
    pub clicks_pct: f64,
    pub unsubs_pct: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationsResponse {
    #[serde(default)]
    pub locations: Vec<OpenLocation>,
    pub campaign_id: Option<String>,
    pub total_items: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenLocation {
    pub country_code: String,
    pub region: Option<String>,
    pub region_name: Option<String>,
    pub opens: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentToResponse {
    #[serde(default)]
    pub sent_to: Vec<SentToRecipient>,
    pub campaign_id: Option<String>,
    pub total_items: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentToRecipient {
    pub email_address: String,
    pub status: String,
    pub email_id: Option<String>,
    #[serde(default)]
    pub merge_fields: HashMap<String, serde_json::Value>,
    pub vip: Option<bool>,
    #[serde(default)]
    pub open_count: u64,
    pub last_open: Option<String>,
    pub absplit_group: Option<String>,
    pub gmt_offset: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbuseReportsResponse {
    #[serde(default)]
    pub abuse_reports: Vec<AbuseReport>,
    pub campaign_id: Option<String>,
    pub total_items: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbuseReport {
    pub id: u64,
    pub email_address: String,
    pub campaign_id: Option<String>,
    pub list_id: Option<String>,
    pub email_id: Option<String>,
    #[serde(default)]
    pub merge_fields: HashMap<String, serde_json::Value>,
    pub vip: Option<bool>,
    pub date: Option<String>,
}
