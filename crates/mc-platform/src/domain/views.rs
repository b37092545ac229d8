//! Dashboard view models
//!
//! Cards, chart series and summary numbers computed from Mailchimp payloads,
//! ready for any front end to render.

use mc_client::schemas::{CampaignReport, CampaignsResponse, ListsResponse, ReportsResponse};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChartPoint {
    pub label: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChartSeries {
    pub name: String,
    pub points: Vec<ChartPoint>,
}

impl ChartSeries {
    fn new(name: &str, points: impl IntoIterator<Item = (String, f64)>) -> Self {
        Self {
            name: name.to_string(),
            points: points
                .into_iter()
                .map(|(label, value)| ChartPoint { label, value })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OverviewStats {
    pub total_audiences: u64,
    /// Sum over the audiences fetched for the overview
    pub total_subscribers: u64,
    /// Campaigns with status `sent`
    pub sent_campaigns: u64,
    /// Mean over the recent reports, as fractions (0.0..=1.0)
    pub average_open_rate: f64,
    pub average_click_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CampaignCard {
    pub id: String,
    pub name: String,
    pub status: String,
    pub send_time: Option<String>,
    pub emails_sent: u64,
    pub open_rate: Option<f64>,
    pub click_rate: Option<f64>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DashboardOverview {
    pub stats: OverviewStats,
    pub recent_campaigns: Vec<CampaignCard>,
    /// Open and click rate per recently sent campaign
    pub performance: Vec<ChartSeries>,
    pub audience_sizes: ChartSeries,
}

pub fn build_overview(
    lists: &ListsResponse,
    campaigns: &CampaignsResponse,
    reports: &ReportsResponse,
) -> DashboardOverview {
    let total_subscribers = lists.lists.iter().map(|l| l.stats.member_count).sum();

    let stats = OverviewStats {
        total_audiences: lists.total_items,
        total_subscribers,
        sent_campaigns: campaigns.total_items,
        average_open_rate: mean(reports.reports.iter().map(|r| r.opens.open_rate)),
        average_click_rate: mean(reports.reports.iter().map(|r| r.clicks.click_rate)),
    };

    let recent_campaigns = campaigns
        .campaigns
        .iter()
        .map(|c| CampaignCard {
            id: c.id.clone(),
            name: c.display_name().to_string(),
            status: c.status.clone(),
            send_time: c.send_time.clone(),
            emails_sent: c.emails_sent,
            open_rate: c.report_summary.as_ref().map(|r| r.open_rate),
            click_rate: c.report_summary.as_ref().map(|r| r.click_rate),
        })
        .collect();

    let label = |r: &CampaignReport| r.campaign_title.clone().unwrap_or_else(|| r.id.clone());
    let performance = vec![
        ChartSeries::new("Open rate", reports.reports.iter().map(|r| (label(r), r.opens.open_rate))),
        ChartSeries::new("Click rate", reports.reports.iter().map(|r| (label(r), r.clicks.click_rate))),
    ];

    let audience_sizes = ChartSeries::new(
        "Subscribers",
        lists
            .lists
            .iter()
            .map(|l| (l.name.clone(), l.stats.member_count as f64)),
    );

    DashboardOverview {
        stats,
        recent_campaigns,
        performance,
        audience_sizes,
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0u32), |(s, n), v| (s + v, n + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReportCharts {
    /// Delivered, opened, clicked, bounced, unsubscribed
    pub funnel: ChartSeries,
    /// Hourly sends, opens and clicks after the send
    pub timeline: Vec<ChartSeries>,
    /// Campaign against industry averages, when Mailchimp has them
    #[serde(skip_serializing_if = "Option::is_none")]
    pub benchmark: Option<Vec<ChartSeries>>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReportView {
    #[schema(value_type = Object)]
    pub report: CampaignReport,
    pub delivered: u64,
    pub total_bounces: u64,
    pub charts: ReportCharts,
}

pub fn build_report_view(report: CampaignReport) -> ReportView {
    let delivered = report.delivered();
    let total_bounces = report.total_bounces();

    let funnel = ChartSeries::new(
        "Engagement",
        [
            ("Delivered".to_string(), delivered as f64),
            ("Opened".to_string(), report.opens.unique_opens as f64),
            ("Clicked".to_string(), report.clicks.unique_subscriber_clicks as f64),
            ("Bounced".to_string(), total_bounces as f64),
            ("Unsubscribed".to_string(), report.unsubscribed as f64),
        ],
    );

    let series = |name: &str, value: fn(&mc_client::schemas::TimeseriesPoint) -> u64| {
        ChartSeries::new(
            name,
            report
                .timeseries
                .iter()
                .map(|p| (p.timestamp.clone(), value(p) as f64)),
        )
    };
    let timeline = vec![
        series("Emails sent", |p| p.emails_sent),
        series("Unique opens", |p| p.unique_opens),
        series("Recipient clicks", |p| p.recipients_clicks),
    ];

    let benchmark = report.industry_stats.as_ref().map(|industry| {
        vec![
            ChartSeries::new(
                "Open rate",
                [
                    ("Campaign".to_string(), report.opens.open_rate),
                    ("Industry".to_string(), industry.open_rate),
                ],
            ),
            ChartSeries::new(
                "Click rate",
                [
                    ("Campaign".to_string(), report.clicks.click_rate),
                    ("Industry".to_string(), industry.click_rate),
                ],
            ),
        ]
    });

    ReportView {
        delivered,
        total_bounces,
        charts: ReportCharts {
            funnel,
            timeline,
            benchmark,
        },
        report,
    }
}
