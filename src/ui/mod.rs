//! Presentation layer.
//!
//! The kiosk hands a [`KioskViewState`] snapshot to a [`KioskView`] after
//! every event that asked for a UI update. The dashboard renders records
//! as plain-text tables.

pub mod console;
pub mod tables;

use crate::state::{KioskState, KioskStateMachine, SelectionLists, SessionError};

pub use console::ConsoleView;

/// Which kiosk card is showing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KioskScreen {
    Authentication,
    OdometerEntry,
    Confirmation,
}

/// Everything a view needs to draw the kiosk
#[derive(Debug, Clone, PartialEq)]
pub struct KioskViewState {
    pub screen: KioskScreen,
    pub selections: Option<SelectionLists>,
    /// "Driver: <name>"
    pub driver_badge: Option<String>,
    pub vehicle_name: Option<String>,
    pub vehicle_registration: Option<String>,
    pub odometer_prefill: Option<f64>,
    /// Last known reading; lower entries need confirmation
    pub odometer_min: Option<f64>,
    pub photo_attached: bool,
    pub transaction_id: Option<String>,
    pub countdown: Option<u32>,
    pub loading: bool,
    pub error: Option<String>,
    pub confirmation_prompt: Option<String>,
}

impl From<&KioskStateMachine> for KioskViewState {
    fn from(sm: &KioskStateMachine) -> Self {
        let screen = match sm.state {
            KioskState::Idle => KioskScreen::Authentication,
            KioskState::Authenticated => KioskScreen::OdometerEntry,
            KioskState::Confirming => KioskScreen::Confirmation,
        };
        let session = sm.session.as_ref();

        Self {
            screen,
            selections: sm.selections.clone(),
            driver_badge: session.map(|s| format!("Driver: {}", s.driver.name)),
            vehicle_name: session.map(|s| s.vehicle.name.clone()),
            vehicle_registration: session.map(|s| {
                s.vehicle
                    .registration
                    .clone()
                    .filter(|r| !r.is_empty())
                    .unwrap_or_else(|| "N/A".to_string())
            }),
            odometer_prefill: session.and_then(|s| s.odometer_reading),
            odometer_min: session.and_then(|s| s.vehicle.odometer.filter(|o| *o > 0.0)),
            photo_attached: session.is_some_and(|s| s.photo_attached),
            transaction_id: session.and_then(|s| s.transaction_id.clone()),
            countdown: sm.countdown_value,
            loading: sm.is_loading,
            error: sm.error.as_ref().map(ToString::to_string),
            confirmation_prompt: sm.pending_decrease.map(|d| {
                SessionError::RequiresConfirmation {
                    entered: d.entered,
                    previous: d.previous,
                }
                .to_string()
            }),
        }
    }
}

/// Receives kiosk state snapshots
pub trait KioskView: Send {
    fn render(&mut self, view: &KioskViewState);
}
