//! DAL tests against a mocked Mailchimp API

use std::time::Duration;

use mc_client::schemas::{
    ActivitySinceQuery, CampaignStatus, CampaignsQuery, ListsQuery, PageParams, SortDir,
};
use mc_client::{MailchimpClientConfig, MailchimpDal, MailchimpError, MailchimpFetchClient};
use mc_common::ErrorCode;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN: &str = "test-access-token";

fn create_dal(mock_server: &MockServer) -> MailchimpDal {
    create_dal_with_timeout(mock_server, Duration::from_secs(5))
}

fn create_dal_with_timeout(mock_server: &MockServer, timeout: Duration) -> MailchimpDal {
    let config = MailchimpClientConfig {
        api_base_url: Some(format!("{}/3.0", mock_server.uri())),
        timeout,
        ..Default::default()
    };
    let client = MailchimpFetchClient::new(&config, TOKEN, "us6").unwrap();
    MailchimpDal::new(client)
}

#[tokio::test]
async fn test_get_lists_sends_auth_and_paging() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/3.0/lists"))
        .and(header("Authorization", "Bearer test-access-token"))
        .and(query_param("count", "20"))
        .and(query_param("offset", "40"))
        .and(query_param("sort_dir", "DESC"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("X-RateLimit-Limit", "10")
                .insert_header("X-RateLimit-Remaining", "9")
                .set_body_json(serde_json::json!({
                    "lists": [
                        {"id": "a1", "name": "Newsletter", "stats": {"member_count": 120, "open_rate": 31.2}},
                        {"id": "b2", "name": "Customers"}
                    ],
                    "total_items": 42
                })),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let dal = create_dal(&mock_server);
    let query = ListsQuery {
        page: PageParams::new(20, 40),
        sort_dir: Some(SortDir::Desc),
        ..Default::default()
    };
    let response = dal.get_lists(&query).await.unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.data.total_items, 42);
    assert_eq!(response.data.lists.len(), 2);
    assert_eq!(response.data.lists[0].stats.member_count, 120);
    let rate_limit = response.rate_limit.unwrap();
    assert_eq!(rate_limit.limit, Some(10));
    assert_eq!(rate_limit.remaining, Some(9));
}

#[tokio::test]
async fn test_invalid_params_never_reach_upstream() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let dal = create_dal(&mock_server);

    let err = dal.get_lists(&ListsQuery { page: PageParams::new(5000, 0), ..Default::default() })
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 400);
    assert_eq!(err.error_code(), ErrorCode::ValidationError);

    let err = dal.get_list("../../admin").await.unwrap_err();
    assert!(matches!(err, MailchimpError::InvalidRequest(_)));

    let err = dal.get_member("a1", "not-a-subscriber").await.unwrap_err();
    assert!(matches!(err, MailchimpError::InvalidRequest(_)));
}

#[tokio::test]
async fn test_get_member_hashes_email() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/3.0/lists/a1/members/62eeb292278cc15f5817cb78f7790b08"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "62eeb292278cc15f5817cb78f7790b08",
            "email_address": "urist.mcvankab@freddiesjokes.com",
            "status": "subscribed"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dal = create_dal(&mock_server);
    let member = dal
        .get_member("a1", "Urist.McVankab@FreddiesJokes.com")
        .await
        .unwrap();
    assert_eq!(member.data.status, "subscribed");
}

#[tokio::test]
async fn test_campaign_filters_are_forwarded() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/3.0/campaigns"))
        .and(query_param("status", "sent"))
        .and(query_param("fields", "campaigns.id,campaigns.status,total_items"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "campaigns": [{"id": "c1", "type": "regular", "status": "sent", "emails_sent": 900}],
            "total_items": 1
        })))
        .mount(&mock_server)
        .await;

    let dal = create_dal(&mock_server);
    let query = CampaignsQuery {
        page: PageParams {
            fields: vec![
                "campaigns.id".to_string(),
                "campaigns.status".to_string(),
                "total_items".to_string(),
            ],
            ..Default::default()
        },
        status: Some(CampaignStatus::Sent),
        ..Default::default()
    };
    let response = dal.get_campaigns(&query).await.unwrap();
    assert_eq!(response.data.campaigns[0].emails_sent, 900);
}

#[tokio::test]
async fn test_report_open_details_path() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/3.0/reports/c1/open-details"))
        .and(query_param("since", "2024-05-01T00:00:00Z"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "members": [{"email_address": "a@b.com", "opens_count": 3, "opens": [{"timestamp": "2024-05-02T10:00:00+00:00"}]}],
            "campaign_id": "c1",
            "total_opens": 3,
            "total_items": 1
        })))
        .mount(&mock_server)
        .await;

    let dal = create_dal(&mock_server);
    let query = ActivitySinceQuery {
        since: Some("2024-05-01T00:00:00Z".to_string()),
        ..Default::default()
    };
    let response = dal.get_report_open_details("c1", &query).await.unwrap();
    assert_eq!(response.data.total_opens, 3);
    assert_eq!(response.data.members[0].opens.len(), 1);
}

#[tokio::test]
async fn test_unauthorized_maps_to_auth_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/3.0/ping"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "type": "https://mailchimp.com/developer/marketing/docs/errors/",
            "title": "API Key Invalid",
            "status": 401,
            "detail": "Your API key may be invalid, or you've attempted to access the wrong datacenter.",
            "instance": "4a5d1f2e"
        })))
        .mount(&mock_server)
        .await;

    let dal = create_dal(&mock_server);
    let err = dal.ping().await.unwrap_err();

    assert!(err.is_auth());
    assert_eq!(err.status_code(), 401);
    assert!(err.to_string().starts_with("Your API key may be invalid"));
    assert!(!err.to_string().contains(TOKEN));
}

#[tokio::test]
async fn test_rate_limit_carries_retry_after() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/3.0/lists"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("Retry-After", "12")
                .insert_header("X-RateLimit-Remaining", "0")
                .set_body_json(serde_json::json!({
                    "title": "Too Many Requests",
                    "status": 429,
                    "detail": "You have exceeded the limit of 10 simultaneous connections."
                })),
        )
        .mount(&mock_server)
        .await;

    let dal = create_dal(&mock_server);
    let err = dal.get_lists(&ListsQuery::default()).await.unwrap_err();

    assert_eq!(err.status_code(), 429);
    assert_eq!(err.error_code(), ErrorCode::RateLimited);
    let rate_limit = err.rate_limit().unwrap();
    assert_eq!(rate_limit.retry_after_secs, Some(12));
    assert_eq!(rate_limit.remaining, Some(0));
}

#[tokio::test]
async fn test_not_found_is_detected() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/3.0/campaigns/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
            "title": "Resource Not Found",
            "status": 404,
            "detail": "The requested resource could not be found."
        })))
        .mount(&mock_server)
        .await;

    let dal = create_dal(&mock_server);
    let err = dal.get_campaign("missing").await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.error_code(), ErrorCode::NotFound);
}

#[tokio::test]
async fn test_schema_mismatch_is_invalid_response() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/3.0/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "unexpected": true
        })))
        .mount(&mock_server)
        .await;

    let dal = create_dal(&mock_server);
    let err = dal.get_account_info().await.unwrap_err();
    assert_eq!(err.error_code(), ErrorCode::InvalidResponse);
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_timeout_is_distinguished() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/3.0/ping"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(500))
                .set_body_json(serde_json::json!({"health_status": "Everything's Chimpy!"})),
        )
        .mount(&mock_server)
        .await;

    let dal = create_dal_with_timeout(&mock_server, Duration::from_millis(50));
    let err = dal.ping().await.unwrap_err();
    assert_eq!(err.error_code(), ErrorCode::Timeout);
    assert_eq!(err.status_code(), 504);
}

#[tokio::test]
async fn test_server_error_is_retryable_fetch() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/3.0/automations"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
        .mount(&mock_server)
        .await;

    let dal = create_dal(&mock_server);
    let err = dal
        .get_automations(&Default::default())
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 503);
    assert_eq!(err.error_code(), ErrorCode::UpstreamError);
    assert!(err.is_retryable());
}
