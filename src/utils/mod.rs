pub mod constants;
pub mod url_utils;

pub use constants::*;
pub use url_utils::{extract_host, has_binary_extension, is_valid_url, url_pattern};
