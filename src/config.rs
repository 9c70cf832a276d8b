//! Configuration constants for the FuelTrack kiosk and dashboard.

use once_cell::sync::Lazy;
use url::Url;

/// Base URL for HTTP API calls when nothing else is configured
pub const DEFAULT_API_BASE: &str = "http://localhost:5000/api/";

/// Environment variable that overrides the API base URL
pub const API_BASE_ENV: &str = "FUELTRACK_API_BASE";

/// Seconds the confirmation screen stays up before the kiosk resets
pub const CONFIRMATION_COUNTDOWN_SECS: u32 = 30;

/// Countdown tick period in milliseconds
pub const COUNTDOWN_TICK_MS: u64 = 1000;

/// Error message display duration in milliseconds
pub const ERROR_DISPLAY_DURATION_MS: u64 = 5000;

/// Rows per page in the transaction listing
pub const TRANSACTION_PAGE_SIZE: u32 = 10;

/// Days covered by the dashboard summary when no range is given
pub const DEFAULT_SUMMARY_DAYS: i64 = 7;

/// Fuel level below this fraction of capacity counts as low
pub const LOW_FUEL_RATIO: f64 = 0.2;

/// Prefix of locally generated transaction ids
pub const TRANSACTION_ID_PREFIX: &str = "SIM-";

static API_BASE: Lazy<String> = Lazy::new(|| {
    std::env::var(API_BASE_ENV).unwrap_or_else(|_| {
        log::debug!("{} not set, using {}", API_BASE_ENV, DEFAULT_API_BASE);
        DEFAULT_API_BASE.to_string()
    })
});

/// API base URL, read once from the environment
pub fn api_base() -> &'static str {
    API_BASE.as_str()
}

/// Parse an API base, making sure relative endpoints join under it
pub fn parse_api_base(raw: &str) -> Result<Url, url::ParseError> {
    if raw.ends_with('/') {
        Url::parse(raw)
    } else {
        Url::parse(&format!("{}/", raw))
    }
}

/// Build the drivers URL
pub fn drivers_url(base: &Url) -> Result<Url, url::ParseError> {
    base.join("drivers")
}

/// Build the vehicles URL
pub fn vehicles_url(base: &Url) -> Result<Url, url::ParseError> {
    base.join("vehicles")
}

/// Build the bowsers URL
pub fn bowsers_url(base: &Url) -> Result<Url, url::ParseError> {
    base.join("bowsers")
}

/// Build the transaction listing URL
pub fn transactions_url(base: &Url) -> Result<Url, url::ParseError> {
    base.join("transactions")
}

/// Build the URL of a single transaction, escaping the id as one path segment
pub fn transaction_url(base: &Url, transaction_id: &str) -> Result<Url, url::ParseError> {
    let mut url = base.join("transactions/")?;
    url.path_segments_mut()
        .map_err(|_| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
        .pop_if_empty()
        .push(transaction_id);
    Ok(url)
}

/// Build the dashboard summary URL
pub fn dashboard_summary_url(base: &Url) -> Result<Url, url::ParseError> {
    base.join("dashboard/summary")
}

/// Build the refresh-data URL
pub fn refresh_data_url(base: &Url) -> Result<Url, url::ParseError> {
    base.join("refresh-data")
}

/// Build the simulate-transaction URL
pub fn simulate_transaction_url(base: &Url) -> Result<Url, url::ParseError> {
    base.join("simulate/transaction")
}

/// Build the system status URL
pub fn status_url(base: &Url) -> Result<Url, url::ParseError> {
    base.join("status")
}
