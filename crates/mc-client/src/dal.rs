//! Mailchimp Data Access Layer
//!
//! One typed method per upstream endpoint. Every method validates ids and
//! query parameters before touching the network, so a `SchemaError` never
//! costs a request against the account's rate limit.

use serde::de::DeserializeOwned;

use crate::client::{MailchimpFetchClient, MailchimpResponse};
use crate::error::Result;
use crate::schemas::common::{validate_id, MailchimpQuery, PageParams};
use crate::schemas::*;

fn report_path(campaign_id: &str, resource: &str) -> Result<String> {
    validate_id("campaign_id", campaign_id)?;
    Ok(format!("/reports/{}/{}", campaign_id, resource))
}

#[derive(Debug)]
pub struct MailchimpDal {
    client: MailchimpFetchClient,
}

impl MailchimpDal {
    pub fn new(client: MailchimpFetchClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &MailchimpFetchClient {
        &self.client
    }

    async fn fetch<T: DeserializeOwned>(&self, path: &str) -> Result<MailchimpResponse<T>> {
        self.client.get::<T, ()>(path, None).await
    }

    async fn fetch_with<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &(dyn MailchimpQuery + Sync),
    ) -> Result<MailchimpResponse<T>> {
        query.validate()?;
        let pairs = query.to_query();
        if pairs.is_empty() {
            return self.fetch(path).await;
        }
        let pairs = pairs.into_vec();
        self.client.get(path, Some(pairs.as_slice())).await
    }

    // ========================================================================
    // Account
    // ========================================================================

    pub async fn get_account_info(&self) -> Result<MailchimpResponse<AccountInfo>> {
        self.fetch("/").await
    }

    /// Cheap credential check
    pub async fn ping(&self) -> Result<MailchimpResponse<PingResponse>> {
        self.fetch("/ping").await
    }

    // ========================================================================
    // Audiences
    // ========================================================================

    pub async fn get_lists(&self, params: &ListsQuery) -> Result<MailchimpResponse<ListsResponse>> {
        self.fetch_with("/lists", params).await
    }

    pub async fn get_list(&self, list_id: &str) -> Result<MailchimpResponse<List>> {
        validate_id("list_id", list_id)?;
        self.fetch(&format!("/lists/{}", list_id)).await
    }

    pub async fn get_list_members(
        &self,
        list_id: &str,
        params: &MembersQuery,
    ) -> Result<MailchimpResponse<MembersResponse>> {
        validate_id("list_id", list_id)?;
        self.fetch_with(&format!("/lists/{}/members", list_id), params).await
    }

    /// `subscriber` may be an email address or its MD5 hash
    pub async fn get_member(
        &self,
        list_id: &str,
        subscriber: &str,
    ) -> Result<MailchimpResponse<Member>> {
        validate_id("list_id", list_id)?;
        let hash = resolve_subscriber_id(subscriber)?;
        self.fetch(&format!("/lists/{}/members/{}", list_id, hash)).await
    }

    pub async fn get_list_growth_history(
        &self,
        list_id: &str,
        params: &GrowthHistoryQuery,
    ) -> Result<MailchimpResponse<GrowthHistoryResponse>> {
        validate_id("list_id", list_id)?;
        self.fetch_with(&format!("/lists/{}/growth-history", list_id), params).await
    }

    pub async fn get_list_activity(
        &self,
        list_id: &str,
    ) -> Result<MailchimpResponse<ListActivityResponse>> {
        validate_id("list_id", list_id)?;
        self.fetch(&format!("/lists/{}/activity", list_id)).await
    }

    // ========================================================================
    // Campaigns
    // ========================================================================

    pub async fn get_campaigns(
        &self,
        params: &CampaignsQuery,
    ) -> Result<MailchimpResponse<CampaignsResponse>> {
        self.fetch_with("/campaigns", params).await
    }

    pub async fn get_campaign(&self, campaign_id: &str) -> Result<MailchimpResponse<Campaign>> {
        validate_id("campaign_id", campaign_id)?;
        self.fetch(&format!("/campaigns/{}", campaign_id)).await
    }

    pub async fn get_campaign_content(
        &self,
        campaign_id: &str,
    ) -> Result<MailchimpResponse<CampaignContent>> {
        validate_id("campaign_id", campaign_id)?;
        self.fetch(&format!("/campaigns/{}/content", campaign_id)).await
    }

    // ========================================================================
    // Reports
    // ========================================================================

    pub async fn get_campaign_reports(
        &self,
        params: &ReportsQuery,
    ) -> Result<MailchimpResponse<ReportsResponse>> {
        self.fetch_with("/reports", params).await
    }

    pub async fn get_campaign_report(
        &self,
        campaign_id: &str,
    ) -> Result<MailchimpResponse<CampaignReport>> {
        validate_id("campaign_id", campaign_id)?;
        self.fetch(&format!("/reports/{}", campaign_id)).await
    }

    pub async fn get_report_open_details(
        &self,
        campaign_id: &str,
        params: &ActivitySinceQuery,
    ) -> Result<MailchimpResponse<OpenDetailsResponse>> {
        self.fetch_with(&report_path(campaign_id, "open-details")?, params).await
    }

    pub async fn get_report_click_details(
        &self,
        campaign_id: &str,
        params: &PageParams,
    ) -> Result<MailchimpResponse<ClickDetailsResponse>> {
        self.fetch_with(&report_path(campaign_id, "click-details")?, params).await
    }

    pub async fn get_report_email_activity(
        &self,
        campaign_id: &str,
        params: &ActivitySinceQuery,
    ) -> Result<MailchimpResponse<EmailActivityResponse>> {
        self.fetch_with(&report_path(campaign_id, "email-activity")?, params).await
    }

    pub async fn get_report_unsubscribes(
        &self,
        campaign_id: &str,
        params: &PageParams,
    ) -> Result<MailchimpResponse<UnsubscribesResponse>> {
        self.fetch_with(&report_path(campaign_id, "unsubscribed")?, params).await
    }

    pub async fn get_report_domain_performance(
        &self,
        campaign_id: &str,
    ) -> Result<MailchimpResponse<DomainPerformanceResponse>> {
        self.fetch(&report_path(campaign_id, "domain-performance")?).await
    }

    pub async fn get_report_locations(
        &self,
        campaign_id: &str,
        params: &PageParams,
    ) -> Result<MailchimpResponse<LocationsResponse>> {
        self.fetch_with(&report_path(campaign_id, "locations")?, params).await
    }

    pub async fn get_report_sent_to(
        &self,
        campaign_id: &str,
        params: &SentToQuery,
    ) -> Result<MailchimpResponse<SentToResponse>> {
        self.fetch_with(&report_path(campaign_id, "sent-to")?, params).await
    }

    pub async fn get_report_abuse_reports(
        &self,
        campaign_id: &str,
    ) -> Result<MailchimpResponse<AbuseReportsResponse>> {
        self.fetch(&report_path(campaign_id, "abuse-reports")?).await
    }

    // ========================================================================
    // Automations
    // ========================================================================

    pub async fn get_automations(
        &self,
        params: &AutomationsQuery,
    ) -> Result<MailchimpResponse<AutomationsResponse>> {
        self.fetch_with("/automations", params).await
    }

    pub async fn get_automation(&self, workflow_id: &str) -> Result<MailchimpResponse<Automation>> {
        validate_id("workflow_id", workflow_id)?;
        self.fetch(&format!("/automations/{}", workflow_id)).await
    }

    pub async fn get_automation_emails(
        &self,
        workflow_id: &str,
    ) -> Result<MailchimpResponse<AutomationEmailsResponse>> {
        validate_id("workflow_id", workflow_id)?;
        self.fetch(&format!("/automations/{}/emails", workflow_id)).await
    }

    // ========================================================================
    // Landing pages
    // ========================================================================

    pub async fn get_landing_pages(
        &self,
        params: &LandingPagesQuery,
    ) -> Result<MailchimpResponse<LandingPagesResponse>> {
        self.fetch_with("/landing-pages", params).await
    }

    pub async fn get_landing_page(&self, page_id: &str) -> Result<MailchimpResponse<LandingPage>> {
        validate_id("page_id", page_id)?;
        self.fetch(&format!("/landing-pages/{}", page_id)).await
    }

    pub async fn get_landing_page_reports(
        &self,
        params: &PageParams,
    ) -> Result<MailchimpResponse<LandingPageReportsResponse>> {
        self.fetch_with("/reporting/landing-pages", params).await
    }

    pub async fn get_landing_page_report(
        &self,
        page_id: &str,
    ) -> Result<MailchimpResponse<LandingPageReport>> {
        validate_id("page_id", page_id)?;
        self.fetch(&format!("/reporting/landing-pages/{}", page_id)).await
    }
}
