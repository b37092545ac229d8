//! Domain Model

pub mod connection;
pub mod user;
pub mod views;

pub use connection::{ConnectionStatus, MailchimpConnection, NewConnection};
pub use user::{AuthenticatedUser, UserClaims};
pub use views::{
    build_overview, build_report_view, CampaignCard, ChartPoint, ChartSeries, DashboardOverview,
    OverviewStats, ReportCharts, ReportView,
};
