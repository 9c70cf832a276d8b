//! API client for FuelTrack backend communication.

use async_trait::async_trait;

pub mod http;
pub mod types;

#[cfg(test)]
mod tests;

pub use http::{ApiClient, ApiError};
pub use types::{Bowser, Driver, Vehicle};

/// Source of the reference data a kiosk session authenticates against
#[async_trait]
pub trait ReferenceDataSource: Send + Sync {
    async fn list_drivers(&self) -> Result<Vec<Driver>, ApiError>;
    async fn list_vehicles(&self) -> Result<Vec<Vehicle>, ApiError>;
    async fn list_bowsers(&self) -> Result<Vec<Bowser>, ApiError>;
}
