//! Driver authentication.
//!
//! The kiosk currently treats picking a driver, vehicle and bowser from the
//! backend's lists as authentication. [`CredentialVerifier`] is the seam
//! where an iButton or PIN check plugs in instead.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::api::{Bowser, Driver, ReferenceDataSource, Vehicle};
use crate::state::SessionError;

/// Kind of reference record a lookup failed on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Driver,
    Vehicle,
    Bowser,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RecordKind::Driver => "driver",
            RecordKind::Vehicle => "vehicle",
            RecordKind::Bowser => "bowser",
        })
    }
}

/// Identifiers selected at the kiosk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialRequest {
    pub driver_id: String,
    pub vehicle_id: String,
    pub bowser_id: String,
}

impl CredentialRequest {
    pub fn new(
        driver_id: impl Into<String>,
        vehicle_id: impl Into<String>,
        bowser_id: impl Into<String>,
    ) -> Self {
        Self {
            driver_id: driver_id.into().trim().to_string(),
            vehicle_id: vehicle_id.into().trim().to_string(),
            bowser_id: bowser_id.into().trim().to_string(),
        }
    }

    /// All three identifiers must be selected
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.driver_id.is_empty() || self.vehicle_id.is_empty() || self.bowser_id.is_empty() {
            return Err(SessionError::IncompleteSelection);
        }
        Ok(())
    }
}

/// Driver, vehicle and bowser bound together by a successful verification
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedIdentity {
    pub driver: Driver,
    pub vehicle: Vehicle,
    pub bowser: Bowser,
}

#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    async fn verify(&self, request: &CredentialRequest) -> Result<VerifiedIdentity, SessionError>;
}

/// Accepts any selection that matches the backend's current reference data
pub struct SelectionVerifier {
    source: Arc<dyn ReferenceDataSource>,
}

impl SelectionVerifier {
    pub fn new(source: Arc<dyn ReferenceDataSource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl CredentialVerifier for SelectionVerifier {
    async fn verify(&self, request: &CredentialRequest) -> Result<VerifiedIdentity, SessionError> {
        request.validate()?;

        let (drivers, vehicles, bowsers) = futures_util::try_join!(
            self.source.list_drivers(),
            self.source.list_vehicles(),
            self.source.list_bowsers(),
        )
        .map_err(|e| SessionError::ReferenceDataUnavailable(e.to_string()))?;

        resolve(request, drivers, vehicles, bowsers)
    }
}

/// Match a request against reference lists; the first missing id wins
pub fn resolve(
    request: &CredentialRequest,
    drivers: Vec<Driver>,
    vehicles: Vec<Vehicle>,
    bowsers: Vec<Bowser>,
) -> Result<VerifiedIdentity, SessionError> {
    let driver = drivers
        .into_iter()
        .find(|d| d.driver_id == request.driver_id)
        .ok_or_else(|| SessionError::lookup(RecordKind::Driver, &request.driver_id))?;
    let vehicle = vehicles
        .into_iter()
        .find(|v| v.vehicle_id == request.vehicle_id)
        .ok_or_else(|| SessionError::lookup(RecordKind::Vehicle, &request.vehicle_id))?;
    let bowser = bowsers
        .into_iter()
        .find(|b| b.bowser_id == request.bowser_id)
        .ok_or_else(|| SessionError::lookup(RecordKind::Bowser, &request.bowser_id))?;

    log::info!(
        "Verified {} with {} at {}",
        driver.name,
        vehicle.name,
        bowser.name
    );
    Ok(VerifiedIdentity {
        driver,
        vehicle,
        bowser,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::api::ApiError;

    pub(crate) fn driver(id: &str) -> Driver {
        Driver {
            driver_id: id.into(),
            name: format!("Driver {}", id),
            role: None,
            ibutton_code: None,
        }
    }

    pub(crate) fn vehicle(id: &str, odometer: Option<f64>) -> Vehicle {
        Vehicle {
            vehicle_id: id.into(),
            name: format!("Truck {}", id),
            registration: Some(format!("KAA {}", id)),
            odometer,
            fuel_level: None,
            fuel_capacity: None,
            standard_burn_rate: None,
            last_updated: None,
        }
    }

    pub(crate) fn bowser(id: &str) -> Bowser {
        Bowser {
            bowser_id: id.into(),
            name: format!("Bowser {}", id),
            capacity: None,
            critical_level: None,
            fuel_level: None,
            total_dispensed: None,
            last_updated: None,
        }
    }

    /// In-memory reference data; `offline` makes every call fail
    pub(crate) struct FakeSource {
        pub drivers: Vec<Driver>,
        pub vehicles: Vec<Vehicle>,
        pub bowsers: Vec<Bowser>,
        pub offline: bool,
    }

    impl FakeSource {
        pub(crate) fn fleet() -> Self {
            Self {
                drivers: vec![driver("D1"), driver("D2")],
                vehicles: vec![vehicle("V1", Some(1000.0)), vehicle("V2", None)],
                bowsers: vec![bowser("B1")],
                offline: false,
            }
        }

        fn check(&self) -> Result<(), ApiError> {
            if self.offline {
                Err(ApiError::Server("503 Service Unavailable: ".into()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl ReferenceDataSource for FakeSource {
        async fn list_drivers(&self) -> Result<Vec<Driver>, ApiError> {
            self.check()?;
            Ok(self.drivers.clone())
        }

        async fn list_vehicles(&self) -> Result<Vec<Vehicle>, ApiError> {
            self.check()?;
            Ok(self.vehicles.clone())
        }

        async fn list_bowsers(&self) -> Result<Vec<Bowser>, ApiError> {
            self.check()?;
            Ok(self.bowsers.clone())
        }
    }

    #[tokio::test]
    async fn test_known_selection_binds_all_three() {
        let verifier = SelectionVerifier::new(Arc::new(FakeSource::fleet()));
        let identity = verifier
            .verify(&CredentialRequest::new("D1", "V1", "B1"))
            .await
            .unwrap();

        assert_eq!(identity.driver.driver_id, "D1");
        assert_eq!(identity.vehicle.odometer, Some(1000.0));
        assert_eq!(identity.bowser.bowser_id, "B1");
    }

    #[tokio::test]
    async fn test_each_unknown_id_is_a_lookup_failure() {
        let verifier = SelectionVerifier::new(Arc::new(FakeSource::fleet()));
        let cases = [
            (CredentialRequest::new("D9", "V1", "B1"), RecordKind::Driver, "D9"),
            (CredentialRequest::new("D1", "V9", "B1"), RecordKind::Vehicle, "V9"),
            (CredentialRequest::new("D1", "V1", "B9"), RecordKind::Bowser, "B9"),
        ];

        for (request, expected_kind, expected_id) in cases {
            match verifier.verify(&request).await {
                Err(SessionError::Lookup { kind, id }) => {
                    assert_eq!(kind, expected_kind);
                    assert_eq!(id, expected_id);
                }
                other => panic!("expected lookup failure, got {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_blank_selection_rejected_before_fetching() {
        let source = FakeSource {
            offline: true,
            ..FakeSource::fleet()
        };
        let verifier = SelectionVerifier::new(Arc::new(source));
        let result = verifier.verify(&CredentialRequest::new("D1", "  ", "B1")).await;
        assert!(matches!(result, Err(SessionError::IncompleteSelection)));
    }

    #[tokio::test]
    async fn test_offline_backend_is_unavailable() {
        let source = FakeSource {
            offline: true,
            ..FakeSource::fleet()
        };
        let verifier = SelectionVerifier::new(Arc::new(source));
        let result = verifier.verify(&CredentialRequest::new("D1", "V1", "B1")).await;
        assert!(matches!(
            result,
            Err(SessionError::ReferenceDataUnavailable(_))
        ));
    }
}
