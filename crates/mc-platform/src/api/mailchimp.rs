//! Mailchimp proxy API
//!
//! Read-only views over the signed-in user's Mailchimp account. Every route
//! needs a session and an active connection (`Connected`); query strings are
//! parsed and validated here so malformed input never reaches the DAL.

use axum::{
    extract::{Path, Query},
    routing::get,
    Json, Router,
};
use mc_client::schemas::{
    AbuseReportsResponse, AccountInfo, ActivitySinceQuery, Automation, AutomationEmailsResponse,
    AutomationStatus, AutomationsQuery, Campaign, CampaignContent, CampaignReport,
    CampaignSortField, CampaignStatus, CampaignType, CampaignsQuery, DomainPerformanceResponse,
    EmailActivity, GrowthHistoryEntry, GrowthHistoryQuery, GrowthHistorySortField, LandingPage,
    LandingPageReport, LandingPageSortField, LandingPageStatus, LandingPagesQuery, List,
    ListActivityResponse, ListSortField, ListsQuery, Member, MemberSortField, MemberStatus,
    MembersQuery, OpenLocation, OpenMember, PageParams, ReportsQuery, SentToQuery,
    SentToRecipient, SentToStatus, SortDir, Unsubscribe, UrlClick,
};
use mc_common::{ApiResponse, Paginated, RateLimitInfo};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::api::common::{envelope, non_empty, page_params, paginate, parse_filter, ApiResult, PageQuery};
use crate::api::middleware::{AppState, Connected};
use crate::domain::{build_overview, build_report_view, DashboardOverview, ReportView};
use crate::error::{PlatformError, Result};

/// Audiences sampled for the dashboard totals
const DASHBOARD_LIST_COUNT: u32 = 100;
/// Sent campaigns shown on the dashboard
const DASHBOARD_RECENT_CAMPAIGNS: u32 = 5;
/// Reports averaged for the dashboard rates
const DASHBOARD_REPORT_COUNT: u32 = 10;

// ==================== Query Filters ====================

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListFilters {
    pub since_date_created: Option<String>,
    pub before_date_created: Option<String>,
    pub since_campaign_last_sent: Option<String>,
    pub before_campaign_last_sent: Option<String>,
    /// Only audiences containing this subscriber
    pub email: Option<String>,
    /// `date_created`
    pub sort_field: Option<String>,
    /// `ASC` or `DESC`
    pub sort_dir: Option<String>,
}

impl ListFilters {
    pub fn to_query(&self, page: PageParams) -> Result<ListsQuery> {
        Ok(ListsQuery {
            page,
            since_date_created: non_empty(&self.since_date_created),
            before_date_created: non_empty(&self.before_date_created),
            since_campaign_last_sent: non_empty(&self.since_campaign_last_sent),
            before_campaign_last_sent: non_empty(&self.before_campaign_last_sent),
            email: non_empty(&self.email),
            sort_field: parse_filter::<ListSortField>("sortField", self.sort_field.as_deref())?,
            sort_dir: parse_filter::<SortDir>("sortDir", self.sort_dir.as_deref())?,
        })
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct MemberFilters {
    /// subscribed, unsubscribed, cleaned, pending, transactional or archived
    pub status: Option<String>,
    pub since_last_changed: Option<String>,
    pub before_last_changed: Option<String>,
    pub since_timestamp_opt: Option<String>,
    pub before_timestamp_opt: Option<String>,
    pub vip_only: Option<String>,
    pub sort_field: Option<String>,
    pub sort_dir: Option<String>,
}

impl MemberFilters {
    pub fn to_query(&self, page: PageParams) -> Result<MembersQuery> {
        Ok(MembersQuery {
            page,
            status: parse_filter::<MemberStatus>("status", self.status.as_deref())?,
            since_last_changed: non_empty(&self.since_last_changed),
            before_last_changed: non_empty(&self.before_last_changed),
            since_timestamp_opt: non_empty(&self.since_timestamp_opt),
            before_timestamp_opt: non_empty(&self.before_timestamp_opt),
            vip_only: parse_flag("vipOnly", self.vip_only.as_deref())?,
            sort_field: parse_filter::<MemberSortField>("sortField", self.sort_field.as_deref())?,
            sort_dir: parse_filter::<SortDir>("sortDir", self.sort_dir.as_deref())?,
        })
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct GrowthHistoryFilters {
    pub sort_field: Option<String>,
    pub sort_dir: Option<String>,
}

impl GrowthHistoryFilters {
    pub fn to_query(&self, page: PageParams) -> Result<GrowthHistoryQuery> {
        Ok(GrowthHistoryQuery {
            page,
            sort_field: parse_filter::<GrowthHistorySortField>("sortField", self.sort_field.as_deref())?,
            sort_dir: parse_filter::<SortDir>("sortDir", self.sort_dir.as_deref())?,
        })
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct CampaignFilters {
    /// regular, plaintext, absplit, rss or variate
    #[serde(rename = "type")]
    pub campaign_type: Option<String>,
    /// save, paused, schedule, sending or sent
    pub status: Option<String>,
    pub since_send_time: Option<String>,
    pub before_send_time: Option<String>,
    pub since_create_time: Option<String>,
    pub before_create_time: Option<String>,
    pub list_id: Option<String>,
    pub folder_id: Option<String>,
    /// `create_time` or `send_time`
    pub sort_field: Option<String>,
    pub sort_dir: Option<String>,
}

impl CampaignFilters {
    pub fn to_query(&self, page: PageParams) -> Result<CampaignsQuery> {
        Ok(CampaignsQuery {
            page,
            campaign_type: parse_filter::<CampaignType>("type", self.campaign_type.as_deref())?,
            status: parse_filter::<CampaignStatus>("status", self.status.as_deref())?,
            since_send_time: non_empty(&self.since_send_time),
            before_send_time: non_empty(&self.before_send_time),
            since_create_time: non_empty(&self.since_create_time),
            before_create_time: non_empty(&self.before_create_time),
            list_id: non_empty(&self.list_id),
            folder_id: non_empty(&self.folder_id),
            sort_field: parse_filter::<CampaignSortField>("sortField", self.sort_field.as_deref())?,
            sort_dir: parse_filter::<SortDir>("sortDir", self.sort_dir.as_deref())?,
        })
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ReportFilters {
    #[serde(rename = "type")]
    pub campaign_type: Option<String>,
    pub since_send_time: Option<String>,
    pub before_send_time: Option<String>,
}

impl ReportFilters {
    pub fn to_query(&self, page: PageParams) -> Result<ReportsQuery> {
        Ok(ReportsQuery {
            page,
            campaign_type: parse_filter::<CampaignType>("type", self.campaign_type.as_deref())?,
            since_send_time: non_empty(&self.since_send_time),
            before_send_time: non_empty(&self.before_send_time),
        })
    }
}

/// Activity feeds narrowed to events after a timestamp
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SinceFilter {
    /// ISO 8601 timestamp
    pub since: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SentToFilter {
    /// sent, hard or soft
    pub status: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct AutomationFilters {
    /// save, paused or sending
    pub status: Option<String>,
    pub since_create_time: Option<String>,
    pub before_create_time: Option<String>,
    pub since_start_time: Option<String>,
    pub before_start_time: Option<String>,
}

impl AutomationFilters {
    pub fn to_query(&self, page: PageParams) -> Result<AutomationsQuery> {
        Ok(AutomationsQuery {
            page,
            status: parse_filter::<AutomationStatus>("status", self.status.as_deref())?,
            since_create_time: non_empty(&self.since_create_time),
            before_create_time: non_empty(&self.before_create_time),
            since_start_time: non_empty(&self.since_start_time),
            before_start_time: non_empty(&self.before_start_time),
        })
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct LandingPageFilters {
    /// published, unpublished or draft
    pub status: Option<String>,
    /// `created_at` or `updated_at`
    pub sort_field: Option<String>,
    pub sort_dir: Option<String>,
}

impl LandingPageFilters {
    pub fn to_query(&self, page: PageParams) -> Result<LandingPagesQuery> {
        Ok(LandingPagesQuery {
            page,
            status: parse_filter::<LandingPageStatus>("status", self.status.as_deref())?,
            sort_field: parse_filter::<LandingPageSortField>("sortField", self.sort_field.as_deref())?,
            sort_dir: parse_filter::<SortDir>("sortDir", self.sort_dir.as_deref())?,
        })
    }
}

fn parse_flag(field: &str, raw: Option<&str>) -> Result<Option<bool>> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(v) if v.eq_ignore_ascii_case("true") => Ok(Some(true)),
        Some(v) if v.eq_ignore_ascii_case("false") => Ok(Some(false)),
        Some(_) => Err(PlatformError::validation(format!("{} must be true or false", field))),
    }
}

/// The quota closest to exhaustion across several upstream calls
fn tightest_rate_limit<'a>(
    limits: impl IntoIterator<Item = &'a Option<RateLimitInfo>>,
) -> Option<RateLimitInfo> {
    limits
        .into_iter()
        .flatten()
        .min_by_key(|r| r.remaining.unwrap_or(u32::MAX))
        .cloned()
}

// ==================== Account & Dashboard ====================

/// Account details for the connected Mailchimp login
#[utoipa::path(
    get,
    path = "/api/mailchimp/account",
    tag = "mailchimp",
    responses(
        (status = 200, description = "Account info"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "No Mailchimp connection")
    )
)]
pub async fn get_account(Connected { dal, .. }: Connected) -> ApiResult<AccountInfo> {
    Ok(envelope(dal.get_account_info().await?))
}

/// Overview cards and chart data, fetched concurrently
#[utoipa::path(
    get,
    path = "/api/mailchimp/dashboard",
    tag = "mailchimp",
    responses(
        (status = 200, description = "Dashboard overview", body = DashboardOverview),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "No Mailchimp connection")
    )
)]
pub async fn get_dashboard(Connected { dal, .. }: Connected) -> ApiResult<DashboardOverview> {
    let lists_query = ListsQuery {
        page: PageParams::new(DASHBOARD_LIST_COUNT, 0),
        ..Default::default()
    };
    let campaigns_query = CampaignsQuery {
        page: PageParams::new(DASHBOARD_RECENT_CAMPAIGNS, 0),
        status: Some(CampaignStatus::Sent),
        sort_field: Some(CampaignSortField::SendTime),
        sort_dir: Some(SortDir::Desc),
        ..Default::default()
    };
    let reports_query = ReportsQuery {
        page: PageParams::new(DASHBOARD_REPORT_COUNT, 0),
        ..Default::default()
    };

    let (lists, campaigns, reports) = tokio::join!(
        dal.get_lists(&lists_query),
        dal.get_campaigns(&campaigns_query),
        dal.get_campaign_reports(&reports_query),
    );
    let (lists, campaigns, reports) = (lists?, campaigns?, reports?);

    let rate_limit = tightest_rate_limit([&lists.rate_limit, &campaigns.rate_limit, &reports.rate_limit]);
    let overview = build_overview(&lists.data, &campaigns.data, &reports.data);
    Ok(Json(ApiResponse::ok(overview).with_rate_limit(rate_limit)))
}

// ==================== Audiences ====================

#[utoipa::path(
    get,
    path = "/api/mailchimp/lists",
    tag = "mailchimp",
    params(PageQuery, ListFilters),
    responses(
        (status = 200, description = "Paginated audiences"),
        (status = 400, description = "Invalid query parameters")
    )
)]
pub async fn list_lists(
    Connected { dal, .. }: Connected,
    Query(page): Query<PageQuery>,
    Query(filters): Query<ListFilters>,
) -> ApiResult<Paginated<List>> {
    let request = page.to_request()?;
    let query = filters.to_query(page_params(&request))?;
    let response = dal.get_lists(&query).await?;
    Ok(paginate(response, request, |r| (r.lists, r.total_items)))
}

#[utoipa::path(
    get,
    path = "/api/mailchimp/lists/{id}",
    tag = "mailchimp",
    params(("id" = String, Path, description = "Audience ID")),
    responses(
        (status = 200, description = "Audience"),
        (status = 404, description = "Audience not found")
    )
)]
pub async fn get_list(Connected { dal, .. }: Connected, Path(id): Path<String>) -> ApiResult<List> {
    Ok(envelope(dal.get_list(&id).await?))
}

#[utoipa::path(
    get,
    path = "/api/mailchimp/lists/{id}/members",
    tag = "mailchimp",
    params(("id" = String, Path, description = "Audience ID"), PageQuery, MemberFilters),
    responses(
        (status = 200, description = "Paginated members"),
        (status = 400, description = "Invalid query parameters")
    )
)]
pub async fn list_members(
    Connected { dal, .. }: Connected,
    Path(id): Path<String>,
    Query(page): Query<PageQuery>,
    Query(filters): Query<MemberFilters>,
) -> ApiResult<Paginated<Member>> {
    let request = page.to_request()?;
    let query = filters.to_query(page_params(&request))?;
    let response = dal.get_list_members(&id, &query).await?;
    Ok(paginate(response, request, |r| (r.members, r.total_items)))
}

/// `subscriber` is an email address or its MD5 subscriber hash
#[utoipa::path(
    get,
    path = "/api/mailchimp/lists/{id}/members/{subscriber}",
    tag = "mailchimp",
    params(
        ("id" = String, Path, description = "Audience ID"),
        ("subscriber" = String, Path, description = "Email address or subscriber hash")
    ),
    responses(
        (status = 200, description = "Member"),
        (status = 404, description = "Member not found")
    )
)]
pub async fn get_member(
    Connected { dal, .. }: Connected,
    Path((id, subscriber)): Path<(String, String)>,
) -> ApiResult<Member> {
    Ok(envelope(dal.get_member(&id, &subscriber).await?))
}

#[utoipa::path(
    get,
    path = "/api/mailchimp/lists/{id}/growth-history",
    tag = "mailchimp",
    params(("id" = String, Path, description = "Audience ID"), PageQuery, GrowthHistoryFilters),
    responses((status = 200, description = "Paginated monthly growth"))
)]
pub async fn list_growth_history(
    Connected { dal, .. }: Connected,
    Path(id): Path<String>,
    Query(page): Query<PageQuery>,
    Query(filters): Query<GrowthHistoryFilters>,
) -> ApiResult<Paginated<GrowthHistoryEntry>> {
    let request = page.to_request()?;
    let query = filters.to_query(page_params(&request))?;
    let response = dal.get_list_growth_history(&id, &query).await?;
    Ok(paginate(response, request, |r| (r.history, r.total_items)))
}

#[utoipa::path(
    get,
    path = "/api/mailchimp/lists/{id}/activity",
    tag = "mailchimp",
    params(("id" = String, Path, description = "Audience ID")),
    responses((status = 200, description = "Daily audience activity"))
)]
pub async fn get_list_activity(
    Connected { dal, .. }: Connected,
    Path(id): Path<String>,
) -> ApiResult<ListActivityResponse> {
    Ok(envelope(dal.get_list_activity(&id).await?))
}

// ==================== Campaigns ====================

#[utoipa::path(
    get,
    path = "/api/mailchimp/campaigns",
    tag = "mailchimp",
    params(PageQuery, CampaignFilters),
    responses(
        (status = 200, description = "Paginated campaigns"),
        (status = 400, description = "Invalid query parameters")
    )
)]
pub async fn list_campaigns(
    Connected { dal, .. }: Connected,
    Query(page): Query<PageQuery>,
    Query(filters): Query<CampaignFilters>,
) -> ApiResult<Paginated<Campaign>> {
    let request = page.to_request()?;
    let query = filters.to_query(page_params(&request))?;
    let response = dal.get_campaigns(&query).await?;
    Ok(paginate(response, request, |r| (r.campaigns, r.total_items)))
}

#[utoipa::path(
    get,
    path = "/api/mailchimp/campaigns/{id}",
    tag = "mailchimp",
    params(("id" = String, Path, description = "Campaign ID")),
    responses(
        (status = 200, description = "Campaign"),
        (status = 404, description = "Campaign not found")
    )
)]
pub async fn get_campaign(Connected { dal, .. }: Connected, Path(id): Path<String>) -> ApiResult<Campaign> {
    Ok(envelope(dal.get_campaign(&id).await?))
}

#[utoipa::path(
    get,
    path = "/api/mailchimp/campaigns/{id}/content",
    tag = "mailchimp",
    params(("id" = String, Path, description = "Campaign ID")),
    responses((status = 200, description = "Campaign HTML and plain-text content"))
)]
pub async fn get_campaign_content(
    Connected { dal, .. }: Connected,
    Path(id): Path<String>,
) -> ApiResult<CampaignContent> {
    Ok(envelope(dal.get_campaign_content(&id).await?))
}

// ==================== Reports ====================

#[utoipa::path(
    get,
    path = "/api/mailchimp/reports",
    tag = "mailchimp",
    params(PageQuery, ReportFilters),
    responses(
        (status = 200, description = "Paginated campaign reports"),
        (status = 400, description = "Invalid query parameters")
    )
)]
pub async fn list_reports(
    Connected { dal, .. }: Connected,
    Query(page): Query<PageQuery>,
    Query(filters): Query<ReportFilters>,
) -> ApiResult<Paginated<CampaignReport>> {
    let request = page.to_request()?;
    let query = filters.to_query(page_params(&request))?;
    let response = dal.get_campaign_reports(&query).await?;
    Ok(paginate(response, request, |r| (r.reports, r.total_items)))
}

/// Report plus the chart series the report page renders
#[utoipa::path(
    get,
    path = "/api/mailchimp/reports/{id}",
    tag = "mailchimp",
    params(("id" = String, Path, description = "Campaign ID")),
    responses(
        (status = 200, description = "Campaign report with charts", body = ReportView),
        (status = 404, description = "Report not found")
    )
)]
pub async fn get_report(Connected { dal, .. }: Connected, Path(id): Path<String>) -> ApiResult<ReportView> {
    let response = dal.get_campaign_report(&id).await?;
    Ok(envelope(response.map(build_report_view)))
}

#[utoipa::path(
    get,
    path = "/api/mailchimp/reports/{id}/opens",
    tag = "mailchimp",
    params(("id" = String, Path, description = "Campaign ID"), PageQuery, SinceFilter),
    responses((status = 200, description = "Paginated openers"))
)]
pub async fn list_report_opens(
    Connected { dal, .. }: Connected,
    Path(id): Path<String>,
    Query(page): Query<PageQuery>,
    Query(filter): Query<SinceFilter>,
) -> ApiResult<Paginated<OpenMember>> {
    let request = page.to_request()?;
    let query = ActivitySinceQuery {
        page: page_params(&request),
        since: non_empty(&filter.since),
    };
    let response = dal.get_report_open_details(&id, &query).await?;
    Ok(paginate(response, request, |r| (r.members, r.total_items)))
}

#[utoipa::path(
    get,
    path = "/api/mailchimp/reports/{id}/clicks",
    tag = "mailchimp",
    params(("id" = String, Path, description = "Campaign ID"), PageQuery),
    responses((status = 200, description = "Paginated clicked URLs"))
)]
pub async fn list_report_clicks(
    Connected { dal, .. }: Connected,
    Path(id): Path<String>,
    Query(page): Query<PageQuery>,
) -> ApiResult<Paginated<UrlClick>> {
    let request = page.to_request()?;
    let response = dal.get_report_click_details(&id, &page_params(&request)).await?;
    Ok(paginate(response, request, |r| (r.urls_clicked, r.total_items)))
}

#[utoipa::path(
    get,
    path = "/api/mailchimp/reports/{id}/activity",
    tag = "mailchimp",
    params(("id" = String, Path, description = "Campaign ID"), PageQuery, SinceFilter),
    responses((status = 200, description = "Paginated per-recipient activity"))
)]
pub async fn list_report_activity(
    Connected { dal, .. }: Connected,
    Path(id): Path<String>,
    Query(page): Query<PageQuery>,
    Query(filter): Query<SinceFilter>,
) -> ApiResult<Paginated<EmailActivity>> {
    let request = page.to_request()?;
    let query = ActivitySinceQuery {
        page: page_params(&request),
        since: non_empty(&filter.since),
    };
    let response = dal.get_report_email_activity(&id, &query).await?;
    Ok(paginate(response, request, |r| (r.emails, r.total_items)))
}

#[utoipa::path(
    get,
    path = "/api/mailchimp/reports/{id}/unsubscribes",
    tag = "mailchimp",
    params(("id" = String, Path, description = "Campaign ID"), PageQuery),
    responses((status = 200, description = "Paginated unsubscribes"))
)]
pub async fn list_report_unsubscribes(
    Connected { dal, .. }: Connected,
    Path(id): Path<String>,
    Query(page): Query<PageQuery>,
) -> ApiResult<Paginated<Unsubscribe>> {
    let request = page.to_request()?;
    let response = dal.get_report_unsubscribes(&id, &page_params(&request)).await?;
    Ok(paginate(response, request, |r| (r.unsubscribes, r.total_items)))
}

#[utoipa::path(
    get,
    path = "/api/mailchimp/reports/{id}/domains",
    tag = "mailchimp",
    params(("id" = String, Path, description = "Campaign ID")),
    responses((status = 200, description = "Performance by email domain"))
)]
pub async fn get_report_domains(
    Connected { dal, .. }: Connected,
    Path(id): Path<String>,
) -> ApiResult<DomainPerformanceResponse> {
    Ok(envelope(dal.get_report_domain_performance(&id).await?))
}

#[utoipa::path(
    get,
    path = "/api/mailchimp/reports/{id}/locations",
    tag = "mailchimp",
    params(("id" = String, Path, description = "Campaign ID"), PageQuery),
    responses((status = 200, description = "Paginated open locations"))
)]
pub async fn list_report_locations(
    Connected { dal, .. }: Connected,
    Path(id): Path<String>,
    Query(page): Query<PageQuery>,
) -> ApiResult<Paginated<OpenLocation>> {
    let request = page.to_request()?;
    let response = dal.get_report_locations(&id, &page_params(&request)).await?;
    Ok(paginate(response, request, |r| (r.locations, r.total_items)))
}

#[utoipa::path(
    get,
    path = "/api/mailchimp/reports/{id}/sent-to",
    tag = "mailchimp",
    params(("id" = String, Path, description = "Campaign ID"), PageQuery, SentToFilter),
    responses((status = 200, description = "Paginated recipients"))
)]
pub async fn list_report_sent_to(
    Connected { dal, .. }: Connected,
    Path(id): Path<String>,
    Query(page): Query<PageQuery>,
    Query(filter): Query<SentToFilter>,
) -> ApiResult<Paginated<SentToRecipient>> {
    let request = page.to_request()?;
    let query = SentToQuery {
        page: page_params(&request),
        status: parse_filter::<SentToStatus>("status", filter.status.as_deref())?,
    };
    let response = dal.get_report_sent_to(&id, &query).await?;
    Ok(paginate(response, request, |r| (r.sent_to, r.total_items)))
}

#[utoipa::path(
    get,
    path = "/api/mailchimp/reports/{id}/abuse",
    tag = "mailchimp",
    params(("id" = String, Path, description = "Campaign ID")),
    responses((status = 200, description = "Abuse complaints"))
)]
pub async fn get_report_abuse(
    Connected { dal, .. }: Connected,
    Path(id): Path<String>,
) -> ApiResult<AbuseReportsResponse> {
    Ok(envelope(dal.get_report_abuse_reports(&id).await?))
}

// ==================== Automations ====================

#[utoipa::path(
    get,
    path = "/api/mailchimp/automations",
    tag = "mailchimp",
    params(PageQuery, AutomationFilters),
    responses(
        (status = 200, description = "Paginated automations"),
        (status = 400, description = "Invalid query parameters")
    )
)]
pub async fn list_automations(
    Connected { dal, .. }: Connected,
    Query(page): Query<PageQuery>,
    Query(filters): Query<AutomationFilters>,
) -> ApiResult<Paginated<Automation>> {
    let request = page.to_request()?;
    let query = filters.to_query(page_params(&request))?;
    let response = dal.get_automations(&query).await?;
    Ok(paginate(response, request, |r| (r.automations, r.total_items)))
}

#[utoipa::path(
    get,
    path = "/api/mailchimp/automations/{id}",
    tag = "mailchimp",
    params(("id" = String, Path, description = "Workflow ID")),
    responses(
        (status = 200, description = "Automation"),
        (status = 404, description = "Automation not found")
    )
)]
pub async fn get_automation(
    Connected { dal, .. }: Connected,
    Path(id): Path<String>,
) -> ApiResult<Automation> {
    Ok(envelope(dal.get_automation(&id).await?))
}

#[utoipa::path(
    get,
    path = "/api/mailchimp/automations/{id}/emails",
    tag = "mailchimp",
    params(("id" = String, Path, description = "Workflow ID")),
    responses((status = 200, description = "Emails in the workflow"))
)]
pub async fn get_automation_emails(
    Connected { dal, .. }: Connected,
    Path(id): Path<String>,
) -> ApiResult<AutomationEmailsResponse> {
    Ok(envelope(dal.get_automation_emails(&id).await?))
}

// ==================== Landing Pages ====================

#[utoipa::path(
    get,
    path = "/api/mailchimp/landing-pages",
    tag = "mailchimp",
    params(PageQuery, LandingPageFilters),
    responses(
        (status = 200, description = "Paginated landing pages"),
        (status = 400, description = "Invalid query parameters")
    )
)]
pub async fn list_landing_pages(
    Connected { dal, .. }: Connected,
    Query(page): Query<PageQuery>,
    Query(filters): Query<LandingPageFilters>,
) -> ApiResult<Paginated<LandingPage>> {
    let request = page.to_request()?;
    let query = filters.to_query(page_params(&request))?;
    let response = dal.get_landing_pages(&query).await?;
    Ok(paginate(response, request, |r| (r.landing_pages, r.total_items)))
}

#[utoipa::path(
    get,
    path = "/api/mailchimp/landing-pages/{id}",
    tag = "mailchimp",
    params(("id" = String, Path, description = "Landing page ID")),
    responses(
        (status = 200, description = "Landing page"),
        (status = 404, description = "Landing page not found")
    )
)]
pub async fn get_landing_page(
    Connected { dal, .. }: Connected,
    Path(id): Path<String>,
) -> ApiResult<LandingPage> {
    Ok(envelope(dal.get_landing_page(&id).await?))
}

#[utoipa::path(
    get,
    path = "/api/mailchimp/landing-pages/{id}/report",
    tag = "mailchimp",
    params(("id" = String, Path, description = "Landing page ID")),
    responses((status = 200, description = "Visits, clicks and conversions"))
)]
pub async fn get_landing_page_report(
    Connected { dal, .. }: Connected,
    Path(id): Path<String>,
) -> ApiResult<LandingPageReport> {
    Ok(envelope(dal.get_landing_page_report(&id).await?))
}

#[utoipa::path(
    get,
    path = "/api/mailchimp/landing-page-reports",
    tag = "mailchimp",
    params(PageQuery),
    responses((status = 200, description = "Paginated landing page reports"))
)]
pub async fn list_landing_page_reports(
    Connected { dal, .. }: Connected,
    Query(page): Query<PageQuery>,
) -> ApiResult<Paginated<LandingPageReport>> {
    let request = page.to_request()?;
    let response = dal.get_landing_page_reports(&page_params(&request)).await?;
    Ok(paginate(response, request, |r| (r.landing_pages, r.total_items)))
}

/// Routes nested under `/api/mailchimp`
pub fn mailchimp_router() -> Router<AppState> {
    Router::new()
        .route("/account", get(get_account))
        .route("/dashboard", get(get_dashboard))
        .route("/lists", get(list_lists))
        .route("/lists/:id", get(get_list))
        .route("/lists/:id/members", get(list_members))
        .route("/lists/:id/members/:subscriber", get(get_member))
        .route("/lists/:id/growth-history", get(list_growth_history))
        .route("/lists/:id/activity", get(get_list_activity))
        .route("/campaigns", get(list_campaigns))
        .route("/campaigns/:id", get(get_campaign))
        .route("/campaigns/:id/content", get(get_campaign_content))
        .route("/reports", get(list_reports))
        .route("/reports/:id", get(get_report))
        .route("/reports/:id/opens", get(list_report_opens))
        .route("/reports/:id/clicks", get(list_report_clicks))
        .route("/reports/:id/activity", get(list_report_activity))
        .route("/reports/:id/unsubscribes", get(list_report_unsubscribes))
        .route("/reports/:id/domains", get(get_report_domains))
        .route("/reports/:id/locations", get(list_report_locations))
        .route("/reports/:id/sent-to", get(list_report_sent_to))
        .route("/reports/:id/abuse", get(get_report_abuse))
        .route("/automations", get(list_automations))
        .route("/automations/:id", get(get_automation))
        .route("/automations/:id/emails", get(get_automation_emails))
        .route("/landing-pages", get(list_landing_pages))
        .route("/landing-pages/:id", get(get_landing_page))
        .route("/landing-pages/:id/report", get(get_landing_page_report))
        .route("/landing-page-reports", get(list_landing_page_reports))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_campaign_filters_parse() {
        let filters = CampaignFilters {
            campaign_type: Some("Regular".to_string()),
            status: Some("sent".to_string()),
            list_id: Some("  ".to_string()),
            sort_field: Some("send_time".to_string()),
            sort_dir: Some("desc".to_string()),
            ..Default::default()
        };
        let query = filters.to_query(PageParams::new(20, 40)).unwrap();
        assert_eq!(query.campaign_type, Some(CampaignType::Regular));
        assert_eq!(query.status, Some(CampaignStatus::Sent));
        assert_eq!(query.list_id, None);
        assert_eq!(query.sort_field, Some(CampaignSortField::SendTime));
        assert_eq!(query.sort_dir, Some(SortDir::Desc));
        assert_eq!(query.page.count, Some(20));
    }

    #[test]
    fn test_unknown_filter_value_is_validation_error() {
        let filters = MemberFilters {
            status: Some("deleted".to_string()),
            ..Default::default()
        };
        let err = filters.to_query(PageParams::default()).unwrap_err();
        assert_eq!(err.status().as_u16(), 400);
        assert!(err.to_string().contains("status"));
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("vipOnly", Some("TRUE")).unwrap(), Some(true));
        assert_eq!(parse_flag("vipOnly", Some("false")).unwrap(), Some(false));
        assert_eq!(parse_flag("vipOnly", None).unwrap(), None);
        assert!(parse_flag("vipOnly", Some("yes")).is_err());
    }

    #[test]
    fn test_tightest_rate_limit() {
        let wide = Some(RateLimitInfo {
            limit: Some(10),
            remaining: Some(9),
            ..Default::default()
        });
        let tight = Some(RateLimitInfo {
            limit: Some(10),
            remaining: Some(2),
            ..Default::default()
        });
        let picked = tightest_rate_limit([&wide, &None, &tight]).unwrap();
        assert_eq!(picked.remaining, Some(2));
        assert!(tightest_rate_limit([&None, &None]).is_none());
    }
}
