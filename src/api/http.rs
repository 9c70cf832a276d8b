//! HTTP API client for the FuelTrack backend.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use thiserror::Error;
use url::Url;

use super::types::*;
use super::ReferenceDataSource;
use crate::config;
use crate::dashboard::{DateRange, TransactionFilter};

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Server error: {0}")]
    Server(String),
}

/// HTTP client for the FuelTrack API
#[derive(Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base: Url,
}

impl ApiClient {
    /// Client for the configured API base
    pub fn new() -> Result<Self, ApiError> {
        Self::with_base_url(config::api_base())
    }

    pub fn with_base_url(base: &str) -> Result<Self, ApiError> {
        Ok(Self {
            client: reqwest::Client::new(),
            base: config::parse_api_base(base)?,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ApiError> {
        log::debug!("GET {}", url);
        let response = self.client.get(url.clone()).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound(url.path().to_string()));
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Server(format!("{}: {}", status, body)));
        }

        Ok(response.json().await?)
    }

    async fn post_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ApiError> {
        log::debug!("POST {}", url);
        let response = self
            .client
            .post(url)
            .json(&serde_json::json!({}))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Server(format!("{}: {}", status, body)));
        }

        Ok(response.json().await?)
    }

    /// Fetch the backend status
    pub async fn status(&self) -> Result<SystemStatus, ApiError> {
        self.get_json(config::status_url(&self.base)?).await
    }

    /// Fetch the active drivers
    pub async fn drivers(&self) -> Result<Vec<Driver>, ApiError> {
        let drivers: Vec<Driver> = self.get_json(config::drivers_url(&self.base)?).await?;
        log::info!("Loaded {} drivers", drivers.len());
        Ok(drivers)
    }

    /// Fetch the active vehicles with their latest status
    pub async fn vehicles(&self) -> Result<Vec<Vehicle>, ApiError> {
        let vehicles: Vec<Vehicle> = self.get_json(config::vehicles_url(&self.base)?).await?;
        log::info!("Loaded {} vehicles", vehicles.len());
        Ok(vehicles)
    }

    /// Fetch the active bowsers with their latest status
    pub async fn bowsers(&self) -> Result<Vec<Bowser>, ApiError> {
        let bowsers: Vec<Bowser> = self.get_json(config::bowsers_url(&self.base)?).await?;
        log::info!("Loaded {} bowsers", bowsers.len());
        Ok(bowsers)
    }

    /// Fetch summary metrics for a date range
    pub async fn dashboard_summary(&self, range: &DateRange) -> Result<DashboardSummary, ApiError> {
        let mut url = config::dashboard_summary_url(&self.base)?;
        range.append_to(&mut url);
        log::info!("Loading dashboard summary for {}", range);
        self.get_json(url).await
    }

    /// Fetch one page of transactions matching a filter
    pub async fn transactions(&self, filter: &TransactionFilter) -> Result<TransactionPage, ApiError> {
        let mut url = config::transactions_url(&self.base)?;
        filter.append_to(&mut url);
        let page: TransactionPage = self.get_json(url).await?;
        log::info!(
            "Loaded {} of {} transactions (offset {})",
            page.transactions.len(),
            page.total,
            page.offset
        );
        Ok(page)
    }

    /// Fetch a transaction with its odometer readings and fuel events
    pub async fn transaction(&self, transaction_id: &str) -> Result<TransactionDetail, ApiError> {
        let url = config::transaction_url(&self.base, transaction_id)?;
        log::info!("Loading transaction {}", transaction_id);
        self.get_json(url).await.map_err(|e| match e {
            ApiError::NotFound(_) => ApiError::NotFound(format!("transaction {}", transaction_id)),
            other => other,
        })
    }

    /// Ask the backend to pull fresh telemetry and reprocess it
    pub async fn refresh_data(&self) -> Result<RefreshOutcome, ApiError> {
        log::info!("Requesting data refresh");
        let outcome: RefreshOutcome = self.post_json(config::refresh_data_url(&self.base)?).await?;
        log::info!("Refresh finished: {:?}", outcome.success);
        Ok(outcome)
    }

    /// Have the backend simulate a complete fuel transaction
    pub async fn simulate_transaction(&self) -> Result<SimulationOutcome, ApiError> {
        log::info!("Requesting simulated transaction");
        self.post_json(config::simulate_transaction_url(&self.base)?).await
    }
}

#[async_trait]
impl ReferenceDataSource for ApiClient {
    async fn list_drivers(&self) -> Result<Vec<Driver>, ApiError> {
        self.drivers().await
    }

    async fn list_vehicles(&self) -> Result<Vec<Vehicle>, ApiError> {
        self.vehicles().await
    }

    async fn list_bowsers(&self) -> Result<Vec<Bowser>, ApiError> {
        self.bowsers().await
    }
}
