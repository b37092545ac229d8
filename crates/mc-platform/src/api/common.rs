//! Common API types and utilities

use axum::Json;
use mc_client::schemas::{parse_enum, PageParams};
use mc_client::MailchimpResponse;
use mc_common::{ApiResponse, PageRequest, Paginated, DEFAULT_PAGE_SIZE};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::error::{PlatformError, Result};

/// Handler result: tagged envelope on success, `PlatformError` otherwise
pub type ApiResult<T> = Result<Json<ApiResponse<T>>>;

/// Wrap an upstream response, surfacing its rate-limit headers
pub fn envelope<T>(response: MailchimpResponse<T>) -> Json<ApiResponse<T>> {
    Json(ApiResponse::ok(response.data).with_rate_limit(response.rate_limit))
}

pub fn ok<T>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse::ok(data))
}

/// Turn an upstream list into a UI page
pub fn paginate<T, U>(
    response: MailchimpResponse<T>,
    request: PageRequest,
    extract: impl FnOnce(T) -> (Vec<U>, u64),
) -> Json<ApiResponse<Paginated<U>>> {
    let rate_limit = response.rate_limit;
    let (items, total_items) = extract(response.data);
    Json(ApiResponse::ok(Paginated::new(items, request, total_items)).with_rate_limit(rate_limit))
}

/// Table pagination controls (`?page=&perPage=`)
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    /// 1-based page number, default 1
    pub page: Option<String>,
    /// One of 10, 20, 50, 100; default 10
    pub per_page: Option<String>,
}

impl PageQuery {
    pub fn to_request(&self) -> Result<PageRequest> {
        parse_page(self.page.as_deref(), self.per_page.as_deref())
    }
}

/// Parse `?page=&perPage=` strictly; malformed numbers are validation errors
pub fn parse_page(page: Option<&str>, per_page: Option<&str>) -> Result<PageRequest> {
    let page = parse_number("page", page)?.unwrap_or(1);
    let per_page = parse_number("perPage", per_page)?.unwrap_or(DEFAULT_PAGE_SIZE);
    Ok(PageRequest::new(page, per_page)?)
}

fn parse_number(name: &str, raw: Option<&str>) -> Result<Option<u32>> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(value) => value
            .parse::<u32>()
            .map(Some)
            .map_err(|_| PlatformError::validation(format!("{} must be a positive integer", name))),
    }
}

/// Upstream `count`/`offset` for a UI page
pub fn page_params(request: &PageRequest) -> PageParams {
    PageParams::new(request.count(), request.offset())
}

/// Parse an optional enum filter from the query string
pub fn parse_filter<T>(field: &str, raw: Option<&str>) -> Result<Option<T>>
where
    T: std::str::FromStr<Err = mc_client::SchemaError>,
{
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(value) => Ok(Some(parse_enum::<T>(field, value)?)),
    }
}

/// Blank query values count as absent
pub fn non_empty(raw: &Option<String>) -> Option<String> {
    raw.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}
