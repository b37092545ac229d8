//! Serde mirrors of the Mailchimp Marketing API v3 payloads.
//!
//! Request parameter types implement [`MailchimpQuery`] and are validated
//! locally before any network call. Response types keep required fields
//! non-optional and ignore anything they do not model.

pub mod account;
pub mod automations;
pub mod campaigns;
pub mod common;
pub mod landing_pages;
pub mod lists;
pub mod members;
pub mod reports;

pub use account::*;
pub use automations::*;
pub use campaigns::*;
pub use common::{
    parse_enum, validate_id, Link, MailchimpQuery, PageParams, ProblemDetail, QueryPairs, SortDir,
    MAX_COUNT, MAX_OFFSET,
};
pub use landing_pages::*;
pub use lists::*;
pub use members::*;
pub use reports::*;
