use serde::{Deserialize, Serialize};

/// `GET /` (API root)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountInfo {
    pub account_id: String,
    pub account_name: String,
    pub login_id: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub avatar_url: Option<String>,
    pub role: Option<String>,
    pub member_since: Option<String>,
    pub pricing_plan_type: Option<String>,
    pub first_payment: Option<String>,
    pub account_timezone: Option<String>,
    pub account_industry: Option<String>,
    pub contact: Option<AccountContact>,
    pub pro_enabled: Option<bool>,
    pub last_login: Option<String>,
    pub total_subscribers: Option<u64>,
    pub industry_stats: Option<AccountIndustryStats>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountContact {
    pub company: Option<String>,
    pub addr1: Option<String>,
    pub addr2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountIndustryStats {
    pub open_rate: Option<f64>,
    pub bounce_rate: Option<f64>,
    pub click_rate: Option<f64>,
}

/// `GET /ping`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PingResponse {
    pub health_status: String,
}
