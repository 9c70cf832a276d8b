//! Records returned by the FuelTrack backend.
//!
//! The backend serializes SQL decimals as strings and missing joins as
//! `null`, so every numeric field goes through [`opt_number`].

use std::fmt;

use serde::{de, Deserialize, Deserializer, Serialize};

/// Accept a JSON number, a numeric string or `null`
fn opt_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Number(n)) => Ok(Some(n)),
        Some(Raw::Text(s)) if s.trim().is_empty() => Ok(None),
        Some(Raw::Text(s)) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|e| de::Error::custom(format!("invalid number {:?}: {}", s, e))),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Driver {
    pub driver_id: String,
    pub name: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub ibutton_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub vehicle_id: String,
    pub name: String,
    #[serde(default)]
    pub registration: Option<String>,
    /// Last known odometer reading in km
    #[serde(default, deserialize_with = "opt_number")]
    pub odometer: Option<f64>,
    #[serde(default, deserialize_with = "opt_number")]
    pub fuel_level: Option<f64>,
    #[serde(default, deserialize_with = "opt_number")]
    pub fuel_capacity: Option<f64>,
    /// L/100km
    #[serde(default, deserialize_with = "opt_number")]
    pub standard_burn_rate: Option<f64>,
    #[serde(default)]
    pub last_updated: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bowser {
    pub bowser_id: String,
    pub name: String,
    #[serde(default, deserialize_with = "opt_number")]
    pub capacity: Option<f64>,
    #[serde(default, deserialize_with = "opt_number")]
    pub critical_level: Option<f64>,
    #[serde(default, deserialize_with = "opt_number")]
    pub fuel_level: Option<f64>,
    #[serde(default, deserialize_with = "opt_number")]
    pub total_dispensed: Option<f64>,
    #[serde(default)]
    pub last_updated: Option<String>,
}

/// Lifecycle of a fuel transaction as computed by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Discrepancy,
    TimedOut,
    #[serde(other)]
    #[value(skip)]
    Unknown,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Discrepancy => "discrepancy",
            TransactionStatus::TimedOut => "timed_out",
            TransactionStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub transaction_id: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    pub status: TransactionStatus,
    #[serde(default)]
    pub driver_id: Option<String>,
    #[serde(default)]
    pub vehicle_id: Option<String>,
    #[serde(default)]
    pub bowser_id: Option<String>,
    #[serde(default)]
    pub driver_name: String,
    #[serde(default)]
    pub vehicle_name: String,
    #[serde(default)]
    pub vehicle_registration: Option<String>,
    #[serde(default)]
    pub bowser_name: String,
    #[serde(default, deserialize_with = "opt_number")]
    pub dispensed_amount: Option<f64>,
    #[serde(default, deserialize_with = "opt_number")]
    pub received_amount: Option<f64>,
    /// Dispensed minus received, as stored by the backend
    #[serde(default, deserialize_with = "opt_number")]
    pub discrepancy: Option<f64>,
    #[serde(default, deserialize_with = "opt_number")]
    pub discrepancy_percentage: Option<f64>,
    #[serde(default, deserialize_with = "opt_number")]
    pub odometer_before: Option<f64>,
    #[serde(default, deserialize_with = "opt_number")]
    pub odometer_after: Option<f64>,
    #[serde(default, deserialize_with = "opt_number")]
    pub odo_distance: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionPage {
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    pub total: u64,
    pub limit: u32,
    pub offset: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OdometerReading {
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default, deserialize_with = "opt_number")]
    pub reading: Option<f64>,
    #[serde(default)]
    pub input_method: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuelEvent {
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub event_type: String,
    #[serde(default, deserialize_with = "opt_number")]
    pub amount: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionDetail {
    pub transaction: Transaction,
    #[serde(default)]
    pub odometer_readings: Vec<OdometerReading>,
    #[serde(default)]
    pub fuel_events: Vec<FuelEvent>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransactionSummary {
    pub total_transactions: u64,
    #[serde(deserialize_with = "opt_number")]
    pub total_fuel_dispensed: Option<f64>,
    #[serde(deserialize_with = "opt_number")]
    pub total_fuel_received: Option<f64>,
    pub completed_transactions: u64,
    pub discrepancy_transactions: u64,
    pub pending_transactions: u64,
    pub timed_out_transactions: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleSummary {
    pub total_vehicles: u64,
    pub low_fuel_vehicles: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BowserSummary {
    pub total_bowsers: u64,
    pub low_fuel_bowsers: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSummary {
    #[serde(default)]
    pub transaction_summary: TransactionSummary,
    #[serde(default)]
    pub vehicle_summary: VehicleSummary,
    #[serde(default)]
    pub bowser_summary: BowserSummary,
    #[serde(default)]
    pub recent_transactions: Vec<Transaction>,
}

impl DashboardSummary {
    /// Vehicles and bowsers currently below the low-fuel threshold
    pub fn low_fuel_alerts(&self) -> u64 {
        self.vehicle_summary.low_fuel_vehicles + self.bowser_summary.low_fuel_bowsers
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemStatus {
    pub status: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
}

/// Reply to a data refresh request. `success` is `None` while the backend
/// is still collecting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshOutcome {
    pub success: Option<bool>,
    pub message: Option<String>,
    pub request_id: Option<serde_json::Value>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatedTransaction {
    pub transaction_id: String,
    #[serde(default)]
    pub vehicle: String,
    #[serde(default)]
    pub driver: String,
    #[serde(default)]
    pub bowser: String,
    #[serde(default, deserialize_with = "opt_number")]
    pub fuel_amount: Option<f64>,
    #[serde(default, deserialize_with = "opt_number")]
    pub received_amount: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationOutcome {
    pub success: bool,
    pub transaction: Option<SimulatedTransaction>,
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_vehicle_numbers_from_strings_and_nulls() {
        let vehicle: Vehicle = serde_json::from_value(json!({
            "vehicle_id": "V1",
            "name": "Truck 1",
            "registration": null,
            "odometer": "1000.5",
            "fuel_level": 120,
            "fuel_capacity": null
        }))
        .unwrap();

        assert_eq!(vehicle.odometer, Some(1000.5));
        assert_eq!(vehicle.fuel_level, Some(120.0));
        assert_eq!(vehicle.fuel_capacity, None);
        assert_eq!(vehicle.standard_burn_rate, None);
        assert!(vehicle.registration.is_none());
    }

    #[test]
    fn test_bad_numeric_string_is_an_error() {
        let result: Result<Bowser, _> = serde_json::from_value(json!({
            "bowser_id": "B1",
            "name": "Bowser 1",
            "capacity": "lots"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_status_does_not_fail() {
        let tx: Transaction = serde_json::from_value(json!({
            "transaction_id": "T1",
            "status": "archived"
        }))
        .unwrap();
        assert_eq!(tx.status, TransactionStatus::Unknown);

        let tx: Transaction = serde_json::from_value(json!({
            "transaction_id": "T2",
            "status": "timed_out"
        }))
        .unwrap();
        assert_eq!(tx.status, TransactionStatus::TimedOut);
    }

    #[test]
    fn test_backend_discrepancy_is_preferred() {
        let tx: Transaction = serde_json::from_value(json!({
            "transaction_id": "T1",
            "status": "discrepancy",
            "dispensed_amount": "60.00",
            "received_amount": "58.50",
            "discrepancy": "1.25"
        }))
        .unwrap();
        assert_eq!(tx.discrepancy, Some(1.25));
        assert_eq!(tx.discrepancy(), Some(1.25));

        let tx: Transaction = serde_json::from_value(json!({
            "transaction_id": "T2",
            "status": "completed",
            "dispensed_amount": 60,
            "received_amount": 58.5,
            "discrepancy": null
        }))
        .unwrap();
        assert_eq!(tx.discrepancy(), Some(1.5));
    }

    #[test]
    fn test_summary_low_fuel_alerts() {
        let summary: DashboardSummary = serde_json::from_value(json!({
            "transaction_summary": {
                "total_transactions": 4,
                "total_fuel_dispensed": "812.40",
                "total_fuel_received": null,
                "completed_transactions": 3,
                "discrepancy_transactions": 1
            },
            "vehicle_summary": { "total_vehicles": 5, "low_fuel_vehicles": 2 },
            "bowser_summary": { "total_bowsers": 2, "low_fuel_bowsers": 1 },
            "recent_transactions": []
        }))
        .unwrap();

        assert_eq!(summary.transaction_summary.total_fuel_dispensed, Some(812.4));
        assert_eq!(summary.transaction_summary.pending_transactions, 0);
        assert_eq!(summary.low_fuel_alerts(), 3);
    }
}
