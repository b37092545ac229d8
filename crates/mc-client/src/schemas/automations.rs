use serde::{Deserialize, Serialize};

use super::campaigns::{CampaignTracking, ReportSummary};
use super::common::{validate_window, wire_enum, MailchimpQuery, PageParams, QueryPairs};
use crate::error::SchemaError;

wire_enum!(
    AutomationStatus {
        Save => "save",
        Paused => "paused",
        Sending => "sending",
    }
);

/// `GET /automations`
#[derive(Debug, Clone, Default)]
pub struct AutomationsQuery {
    pub page: PageParams,
    pub status: Option<AutomationStatus>,
    pub since_create_time: Option<String>,
    pub before_create_time: Option<String>,
    pub since_start_time: Option<String>,
    pub before_start_time: Option<String>,
}

impl MailchimpQuery for AutomationsQuery {
    fn validate(&self) -> Result<(), SchemaError> {
        self.page.validate()?;
        validate_window(
            "since_create_time",
            self.since_create_time.as_deref(),
            "before_create_time",
            self.before_create_time.as_deref(),
        )?;
        validate_window(
            "since_start_time",
            self.since_start_time.as_deref(),
            "before_start_time",
            self.before_start_time.as_deref(),
        )
    }

    fn write_query(&self, pairs: &mut QueryPairs) {
        self.page.write_query(pairs);
        pairs
            .push_opt("status", self.status)
            .push_opt("since_create_time", self.since_create_time.as_ref())
            .push_opt("before_create_time", self.before_create_time.as_ref())
            .push_opt("since_start_time", self.since_start_time.as_ref())
            .push_opt("before_start_time", self.before_start_time.as_ref());
    }
}

/// Classic automation workflow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Automation {
    pub id: String,
    pub status: String,
    pub create_time: Option<String>,
    pub start_time: Option<String>,
    #[serde(default)]
    pub emails_sent: u64,
    pub recipients: Option<AutomationRecipients>,
    pub settings: Option<AutomationSettings>,
    pub tracking: Option<CampaignTracking>,
    pub report_summary: Option<ReportSummary>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AutomationRecipients {
    pub list_id: Option<String>,
    pub list_is_active: Option<bool>,
    pub list_name: Option<String>,
    pub store_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AutomationSettings {
    pub title: Option<String>,
    pub from_name: Option<String>,
    pub reply_to: Option<String>,
    pub use_conversation: Option<bool>,
    pub to_name: Option<String>,
    pub authenticate: Option<bool>,
    pub auto_footer: Option<bool>,
    pub inline_css: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationsResponse {
    #[serde(default)]
    pub automations: Vec<Automation>,
    pub total_items: u64,
}

/// One email in an automation workflow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationEmail {
    pub id: String,
    pub status: String,
    pub workflow_id: Option<String>,
    pub position: Option<u32>,
    pub delay: Option<AutomationDelay>,
    pub create_time: Option<String>,
    pub start_time: Option<String>,
    pub archive_url: Option<String>,
    #[serde(default)]
    pub emails_sent: u64,
    pub send_time: Option<String>,
    pub content_type: Option<String>,
    pub settings: Option<AutomationEmailSettings>,
    pub tracking: Option<CampaignTracking>,
    pub report_summary: Option<ReportSummary>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AutomationDelay {
    pub amount: Option<u32>,
    #[serde(rename = "type")]
    pub delay_type: Option<String>,
    pub direction: Option<String>,
    pub action: Option<String>,
    pub action_description: Option<String>,
    pub full_description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AutomationEmailSettings {
    pub subject_line: Option<String>,
    pub preview_text: Option<String>,
    pub title: Option<String>,
    pub from_name: Option<String>,
    pub reply_to: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationEmailsResponse {
    #[serde(default)]
    pub emails: Vec<AutomationEmail>,
    #[serde(default)]
    pub total_items: u64,
}
