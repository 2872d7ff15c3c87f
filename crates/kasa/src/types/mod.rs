//! Validated value types.

mod amount;
mod api_url;

pub use amount::Amount;
pub use api_url::{ApiUrl, DEFAULT_API_URL};
