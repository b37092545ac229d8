//! OpenAPI Documentation

use utoipa::OpenApi;

/// Dashboard API OpenAPI Documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Mailchimp Dashboard API",
        version = "1.0.0",
        description = "Session login, Mailchimp account connection and read-only analytics"
    ),
    servers(
        (url = "http://localhost:3000", description = "Local development")
    ),
    tags(
        (name = "auth", description = "Dashboard login and session"),
        (name = "mailchimp-connection", description = "Connecting a Mailchimp account"),
        (name = "mailchimp", description = "Mailchimp analytics proxy"),
        (name = "health", description = "Health and readiness")
    ),
    paths(
        // Session
        super::auth::login,
        super::auth::callback,
        super::auth::logout,
        super::auth::me,
        // Mailchimp connection
        super::mailchimp_oauth::authorize,
        super::mailchimp_oauth::callback,
        super::mailchimp_oauth::status,
        super::mailchimp_oauth::disconnect,
        // Account & dashboard
        super::mailchimp::get_account,
        super::mailchimp::get_dashboard,
        // Audiences
        super::mailchimp::list_lists,
        super::mailchimp::get_list,
        super::mailchimp::list_members,
        super::mailchimp::get_member,
        super::mailchimp::list_growth_history,
        super::mailchimp::get_list_activity,
        // Campaigns
        super::mailchimp::list_campaigns,
        super::mailchimp::get_campaign,
        super::mailchimp::get_campaign_content,
        // Reports
        super::mailchimp::list_reports,
        super::mailchimp::get_report,
        super::mailchimp::list_report_opens,
        super::mailchimp::list_report_clicks,
        super::mailchimp::list_report_activity,
        super::mailchimp::list_report_unsubscribes,
        super::mailchimp::get_report_domains,
        super::mailchimp::list_report_locations,
        super::mailchimp::list_report_sent_to,
        super::mailchimp::get_report_abuse,
        // Automations
        super::mailchimp::list_automations,
        super::mailchimp::get_automation,
        super::mailchimp::get_automation_emails,
        // Landing pages
        super::mailchimp::list_landing_pages,
        super::mailchimp::get_landing_page,
        super::mailchimp::get_landing_page_report,
        super::mailchimp::list_landing_page_reports,
        // Health
        super::health::health,
        super::health::live,
        super::health::ready,
        super::health::auth_health,
        super::health::mailchimp_health,
    ),
    components(
        schemas(
            // Session & connection
            crate::domain::AuthenticatedUser,
            crate::domain::ConnectionStatus,
            super::mailchimp_oauth::DisconnectResponse,
            // Dashboard views
            crate::domain::DashboardOverview,
            crate::domain::OverviewStats,
            crate::domain::CampaignCard,
            crate::domain::ChartSeries,
            crate::domain::ChartPoint,
            crate::domain::ReportView,
            crate::domain::ReportCharts,
            // Health
            super::health::BasicHealth,
            mc_common::HealthReport,
            mc_common::HealthCheck,
            mc_common::HealthStatus,
            // Common
            mc_common::ApiFailure,
            mc_common::ErrorCode,
            mc_common::RateLimitInfo,
            mc_common::PaginationMeta,
        )
    )
)]
pub struct DashboardApiDoc;
