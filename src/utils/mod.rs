// SPDX-License-Identifier: GPL-3.0-only
pub mod path_sanitizer;
pub mod rate_limit;
pub mod url_validator;

pub use path_sanitizer::cache_file_name;
pub use rate_limit::FixedWindowRateLimiter;
pub use url_validator::validate_http_url;
