//! Landing pages and `/reporting/landing-pages` reports

use serde::{Deserialize, Serialize};

use super::common::{wire_enum, MailchimpQuery, PageParams, QueryPairs, SortDir};
use crate::error::SchemaError;

wire_enum!(
    LandingPageStatus {
        Published => "published",
        Unpublished => "unpublished",
        Draft => "draft",
    }
);

wire_enum!(
    LandingPageSortField {
        CreatedAt => "created_at",
        UpdatedAt => "updated_at",
    }
);

/// `GET /landing-pages`
#[derive(Debug, Clone, Default)]
pub struct LandingPagesQuery {
    pub page: PageParams,
    pub status: Option<LandingPageStatus>,
    pub sort_field: Option<LandingPageSortField>,
    pub sort_dir: Option<SortDir>,
}

impl MailchimpQuery for LandingPagesQuery {
    fn validate(&self) -> Result<(), SchemaError> {
        self.page.validate()
    }

    fn write_query(&self, pairs: &mut QueryPairs) {
        self.page.write_query(pairs);
        pairs
            .push_opt("status", self.status)
            .push_opt("sort_field", self.sort_field)
            .push_opt("sort_dir", self.sort_dir);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LandingPage {
    pub id: String,
    pub status: String,
    pub name: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub template_id: Option<u64>,
    pub list_id: Option<String>,
    pub store_id: Option<String>,
    pub web_id: Option<u64>,
    pub created_at: Option<String>,
    pub published_at: Option<String>,
    pub unpublished_at: Option<String>,
    pub updated_at: Option<String>,
    pub url: Option<String>,
    pub tracking: Option<LandingPageTracking>,
}

impl LandingPage {
    pub fn has_status(&self, status: LandingPageStatus) -> bool {
        self.status.eq_ignore_ascii_case(status.as_str())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LandingPageTracking {
    pub track_with_mailchimp: Option<bool>,
    pub enable_restricted_data_processing: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LandingPagesResponse {
    #[serde(default)]
    pub landing_pages: Vec<LandingPage>,
    pub total_items: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LandingPageReport {
    pub id: String,
    pub name: Option<String>,
    pub title: Option<String>,
    pub url: Option<String>,
    pub status: Option<String>,
    pub published_at: Option<String>,
    pub unpublished_at: Option<String>,
    pub list_id: Option<String>,
    pub list_name: Option<String>,
    pub web_id: Option<u64>,
    #[serde(default)]
    pub visits: u64,
    #[serde(default)]
    pub unique_visits: u64,
    #[serde(default)]
    pub subscribes: u64,
    #[serde(default)]
    pub clicks: u64,
    #[serde(default)]
    pub conversion_rate: f64,
    pub timeseries: Option<LandingPageTimeseries>,
    pub ecommerce: Option<LandingPageEcommerce>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LandingPageTimeseries {
    pub daily_stats: Option<LandingPageStats>,
    pub weekly_stats: Option<LandingPageStats>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LandingPageStats {
    pub clicks: Vec<DatedValue>,
    pub visits: Vec<DatedValue>,
    pub unique_visits: Vec<DatedValue>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatedValue {
    pub val: u64,
    pub date: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LandingPageEcommerce {
    pub total_revenue: f64,
    pub currency_code: Option<String>,
    pub total_orders: u64,
    pub average_order_revenue: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LandingPageReportsResponse {
    #[serde(default)]
    pub landing_pages: Vec<LandingPageReport>,
    pub total_items: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_landing_page_status_filter() {
        let page: LandingPage =
            serde_json::from_str(r#"{"id":"lp1","status":"PUBLISHED","name":"Spring"}"#).unwrap();
        assert!(page.has_status(LandingPageStatus::Published));
        assert!(!page.has_status(LandingPageStatus::Draft));
    }

    #[test]
    fn test_report_timeseries() {
        let report: LandingPageReport = serde_json::from_str(
            r#"{"id":"lp1","visits":10,"conversion_rate":0.2,"timeseries":{"daily_stats":{"visits":[{"val":4,"date":"2024-05-01"},{"val":6,"date":"2024-05-02"}]}}}"#,
        )
        .unwrap();
        let daily = report.timeseries.unwrap().daily_stats.unwrap();
        assert_eq!(daily.visits.len(), 2);
        assert!(daily.clicks.is_empty());
    }
}
