//! Kiosk session state machine.
//!
//! Pure Rust, no I/O: user actions, backend replies and countdown ticks come
//! in as [`KioskEvent`]s, and the machine answers with [`KioskCommand`]s for
//! the app layer to execute. Every operation is also exposed as a method
//! returning `Result` so the transitions can be driven directly.
//!
//! Asynchronous results carry the `generation` they were issued under. The
//! generation moves on every reset and every entry into `Confirming`, so a
//! credential reply or countdown tick that outlived its session is dropped.

use rand::Rng;
use thiserror::Error;

use crate::api::{Bowser, Driver, Vehicle};
use crate::auth::{CredentialRequest, RecordKind, VerifiedIdentity};
use crate::config;

/// Wizard states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KioskState {
    /// Selection screen, nobody authenticated
    Idle,
    /// Identities bound, waiting for the odometer reading
    Authenticated,
    /// Reading accepted, countdown to reset running
    Confirming,
}

/// Broad class of a session failure, for user-facing messaging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Lookup,
    Validation,
    RequiresConfirmation,
    Unavailable,
    Rejected,
}

/// Recoverable failures surfaced to the person at the kiosk.
/// None of them change the session state.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error("Please select a driver, vehicle, and bowser.")]
    IncompleteSelection,
    #[error("No {kind} with id {id} was found. Please select again.")]
    Lookup { kind: RecordKind, id: String },
    #[error("Please enter a valid odometer reading.")]
    InvalidOdometer { input: String },
    #[error("The entered reading ({entered} km) is less than the previous reading ({previous} km). Continue anyway?")]
    RequiresConfirmation { entered: f64, previous: f64 },
    #[error("Could not load fuel records: {0}")]
    ReferenceDataUnavailable(String),
    #[error("Authentication is already in progress")]
    AuthenticationPending,
    #[error("Not available while {0:?}")]
    InvalidState(KioskState),
}

impl SessionError {
    pub fn lookup(kind: RecordKind, id: &str) -> Self {
        SessionError::Lookup {
            kind,
            id: id.to_string(),
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            SessionError::Lookup { .. } => FailureKind::Lookup,
            SessionError::IncompleteSelection | SessionError::InvalidOdometer { .. } => {
                FailureKind::Validation
            }
            SessionError::RequiresConfirmation { .. } => FailureKind::RequiresConfirmation,
            SessionError::ReferenceDataUnavailable(_) => FailureKind::Unavailable,
            SessionError::AuthenticationPending | SessionError::InvalidState(_) => {
                FailureKind::Rejected
            }
        }
    }
}

/// Identities and entries of the authenticated session.
///
/// Driver, vehicle and bowser live in one value so a half-authenticated
/// session cannot be represented.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionData {
    pub driver: Driver,
    pub vehicle: Vehicle,
    pub bowser: Bowser,
    pub odometer_reading: Option<f64>,
    pub photo_attached: bool,
    pub transaction_id: Option<String>,
}

/// Lists offered on the selection screen
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionLists {
    pub drivers: Vec<Driver>,
    pub vehicles: Vec<Vehicle>,
    pub bowsers: Vec<Bowser>,
}

/// A reading below the vehicle's last known value, waiting for the driver
/// to confirm or cancel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OdometerDecrease {
    pub entered: f64,
    pub previous: f64,
}

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum KioskEvent {
    // User actions
    LoadSelections,
    Authenticate {
        driver_id: String,
        vehicle_id: String,
        bowser_id: String,
    },
    AttachPhoto,
    DetachPhoto,
    SubmitOdometer { input: String },
    ConfirmDecrease,
    CancelDecrease,
    Reset,

    // Backend responses
    SelectionsLoaded(SelectionLists),
    SelectionsFailed { error: String },
    CredentialsVerified {
        identity: VerifiedIdentity,
        generation: u64,
    },
    CredentialsRejected {
        error: SessionError,
        generation: u64,
    },

    // Countdown
    CountdownTick { generation: u64 },

    // Internal
    /// Clear the error raised as number `seq`, if it is still showing
    ClearError { seq: u64 },
}

/// Commands emitted by the state machine for the app layer to execute
#[derive(Debug, Clone, PartialEq)]
pub enum KioskCommand {
    /// Load the driver, vehicle and bowser lists
    FetchSelections,
    /// Run the credential verifier
    VerifyCredentials {
        request: CredentialRequest,
        generation: u64,
    },
    /// Start the confirmation countdown, replacing any running one
    StartCountdown { seconds: u32, generation: u64 },
    /// Stop the countdown if one is running
    CancelCountdown,
    /// Schedule clearing error `seq` after the display timeout
    ScheduleErrorClear { seq: u64 },
    /// Update UI to reflect new state
    UpdateUI,
}

/// Result of applying one countdown tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Stale tick or not confirming
    Ignored,
    Remaining(u32),
    /// Countdown reached zero and the session was reset
    Expired,
}

/// The kiosk state machine
#[derive(Debug)]
pub struct KioskStateMachine {
    pub state: KioskState,
    pub session: Option<SessionData>,
    pub countdown_value: Option<u32>,
    pub pending_decrease: Option<OdometerDecrease>,
    pub selections: Option<SelectionLists>,
    pub error: Option<SessionError>,
    pub is_loading: bool,
    generation: u64,
    /// Bumped for every surfaced error
    error_seq: u64,
}

impl Default for KioskStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl KioskStateMachine {
    pub fn new() -> Self {
        Self {
            state: KioskState::Idle,
            session: None,
            countdown_value: None,
            pending_decrease: None,
            selections: None,
            error: None,
            is_loading: false,
            generation: 0,
            error_seq: 0,
        }
    }

    /// Start authenticating; returns the generation the reply must carry
    pub fn begin_authentication(&mut self, request: &CredentialRequest) -> Result<u64, SessionError> {
        if self.state != KioskState::Idle {
            return Err(SessionError::InvalidState(self.state));
        }
        if self.is_loading {
            return Err(SessionError::AuthenticationPending);
        }
        request.validate()?;

        self.is_loading = true;
        self.error = None;
        Ok(self.generation)
    }

    /// Bind a verified driver, vehicle and bowser and move to `Authenticated`
    pub fn bind_identity(&mut self, identity: VerifiedIdentity) -> Result<(), SessionError> {
        if self.state != KioskState::Idle {
            return Err(SessionError::InvalidState(self.state));
        }

        let VerifiedIdentity {
            driver,
            vehicle,
            bowser,
        } = identity;
        let odometer_reading = vehicle.odometer.filter(|reading| *reading > 0.0);

        log::info!("Session started for {} on {}", driver.name, vehicle.name);
        self.session = Some(SessionData {
            driver,
            vehicle,
            bowser,
            odometer_reading,
            photo_attached: false,
            transaction_id: None,
        });
        self.state = KioskState::Authenticated;
        self.is_loading = false;
        self.error = None;
        self.pending_decrease = None;
        Ok(())
    }

    fn authenticated_session(&mut self) -> Result<&mut SessionData, SessionError> {
        let state = self.state;
        match (state, self.session.as_mut()) {
            (KioskState::Authenticated, Some(session)) => Ok(session),
            _ => Err(SessionError::InvalidState(state)),
        }
    }

    pub fn attach_photo(&mut self) -> Result<(), SessionError> {
        self.authenticated_session()?.photo_attached = true;
        Ok(())
    }

    pub fn detach_photo(&mut self) -> Result<(), SessionError> {
        self.authenticated_session()?.photo_attached = false;
        Ok(())
    }

    /// Validate and record an odometer reading typed at the kiosk.
    ///
    /// A reading below the vehicle's last known value is refused with
    /// `RequiresConfirmation` unless `accept_decrease` is set. On success
    /// the session moves to `Confirming` and the new transaction id is
    /// returned.
    pub fn submit_odometer_reading(
        &mut self,
        input: &str,
        accept_decrease: bool,
    ) -> Result<String, SessionError> {
        self.authenticated_session()?;
        let value = parse_odometer(input)?;
        self.record_reading(value, accept_decrease)
    }

    fn record_reading(&mut self, value: f64, accept_decrease: bool) -> Result<String, SessionError> {
        let session = self.authenticated_session()?;

        if !accept_decrease {
            if let Some(previous) = session.vehicle.odometer.filter(|p| *p > 0.0) {
                if value < previous {
                    return Err(SessionError::RequiresConfirmation {
                        entered: value,
                        previous,
                    });
                }
            }
        }

        let transaction_id = simulated_transaction_id();
        session.odometer_reading = Some(value);
        session.transaction_id = Some(transaction_id.clone());
        log::info!(
            "Recorded {} km for {}, transaction {}",
            value,
            session.vehicle.name,
            transaction_id
        );

        self.generation += 1;
        self.state = KioskState::Confirming;
        self.countdown_value = Some(config::CONFIRMATION_COUNTDOWN_SECS);
        self.pending_decrease = None;
        self.error = None;
        Ok(transaction_id)
    }

    /// Apply one countdown tick issued under `generation`
    pub fn tick(&mut self, generation: u64) -> TickOutcome {
        if self.state != KioskState::Confirming || generation != self.generation {
            log::debug!(
                "Ignoring countdown tick (state {:?}, generation {} vs {})",
                self.state,
                generation,
                self.generation
            );
            return TickOutcome::Ignored;
        }

        let remaining = self.countdown_value.unwrap_or(0).saturating_sub(1);
        if remaining == 0 {
            log::info!("Confirmation countdown finished");
            self.reset();
            TickOutcome::Expired
        } else {
            self.countdown_value = Some(remaining);
            TickOutcome::Remaining(remaining)
        }
    }

    /// Return to `Idle` and forget everything about the session
    pub fn reset(&mut self) {
        if self.state != KioskState::Idle {
            log::info!("Resetting kiosk session from {:?}", self.state);
        }
        self.state = KioskState::Idle;
        self.session = None;
        self.countdown_value = None;
        self.pending_decrease = None;
        self.error = None;
        self.is_loading = false;
        self.generation += 1;
    }

    fn fail(&mut self, error: SessionError, commands: &mut Vec<KioskCommand>) {
        match error.kind() {
            FailureKind::Unavailable => log::error!("{}", error),
            FailureKind::Rejected => log::debug!("{}", error),
            _ => log::warn!("{}", error),
        }
        self.error_seq += 1;
        self.error = Some(error);
        commands.push(KioskCommand::ScheduleErrorClear {
            seq: self.error_seq,
        });
        commands.push(KioskCommand::UpdateUI);
    }

    fn handle_reading(&mut self, result: Result<String, SessionError>, commands: &mut Vec<KioskCommand>) {
        match result {
            Ok(_) => {
                commands.push(KioskCommand::StartCountdown {
                    seconds: config::CONFIRMATION_COUNTDOWN_SECS,
                    generation: self.generation,
                });
                commands.push(KioskCommand::UpdateUI);
            }
            Err(SessionError::RequiresConfirmation { entered, previous }) => {
                self.pending_decrease = Some(OdometerDecrease { entered, previous });
                commands.push(KioskCommand::UpdateUI);
            }
            Err(e) => self.fail(e, commands),
        }
    }

    /// Process an event and return commands to execute
    pub fn process(&mut self, event: KioskEvent) -> Vec<KioskCommand> {
        let mut commands = Vec::new();

        match event {
            KioskEvent::LoadSelections => {
                commands.push(KioskCommand::FetchSelections);
            }

            KioskEvent::SelectionsLoaded(lists) => {
                self.selections = Some(lists);
                commands.push(KioskCommand::UpdateUI);
            }

            KioskEvent::SelectionsFailed { error } => {
                self.fail(SessionError::ReferenceDataUnavailable(error), &mut commands);
            }

            KioskEvent::Authenticate {
                driver_id,
                vehicle_id,
                bowser_id,
            } => {
                let request = CredentialRequest::new(driver_id, vehicle_id, bowser_id);
                match self.begin_authentication(&request) {
                    Ok(generation) => {
                        commands.push(KioskCommand::VerifyCredentials { request, generation });
                        commands.push(KioskCommand::UpdateUI);
                    }
                    Err(e) => self.fail(e, &mut commands),
                }
            }

            KioskEvent::CredentialsVerified {
                identity,
                generation,
            } => {
                if generation != self.generation || !self.is_loading {
                    log::debug!("Dropping stale credential reply");
                } else {
                    match self.bind_identity(identity) {
                        Ok(()) => commands.push(KioskCommand::UpdateUI),
                        Err(e) => self.fail(e, &mut commands),
                    }
                }
            }

            KioskEvent::CredentialsRejected { error, generation } => {
                if generation != self.generation || !self.is_loading {
                    log::debug!("Dropping stale credential rejection");
                } else {
                    self.is_loading = false;
                    self.fail(error, &mut commands);
                }
            }

            KioskEvent::AttachPhoto => match self.attach_photo() {
                Ok(()) => commands.push(KioskCommand::UpdateUI),
                Err(e) => self.fail(e, &mut commands),
            },

            KioskEvent::DetachPhoto => match self.detach_photo() {
                Ok(()) => commands.push(KioskCommand::UpdateUI),
                Err(e) => self.fail(e, &mut commands),
            },

            KioskEvent::SubmitOdometer { input } => {
                // A new entry replaces any reading still awaiting confirmation
                self.pending_decrease = None;
                let result = self.submit_odometer_reading(&input, false);
                self.handle_reading(result, &mut commands);
            }

            KioskEvent::ConfirmDecrease => {
                if let Some(decrease) = self.pending_decrease {
                    let result = self.record_reading(decrease.entered, true);
                    self.handle_reading(result, &mut commands);
                }
            }

            KioskEvent::CancelDecrease => {
                if self.pending_decrease.take().is_some() {
                    commands.push(KioskCommand::UpdateUI);
                }
            }

            KioskEvent::Reset => {
                self.reset();
                commands.push(KioskCommand::CancelCountdown);
                commands.push(KioskCommand::UpdateUI);
            }

            KioskEvent::CountdownTick { generation } => match self.tick(generation) {
                TickOutcome::Ignored => {}
                TickOutcome::Remaining(_) => commands.push(KioskCommand::UpdateUI),
                TickOutcome::Expired => {
                    commands.push(KioskCommand::CancelCountdown);
                    commands.push(KioskCommand::UpdateUI);
                }
            },

            KioskEvent::ClearError { seq } => {
                if seq == self.error_seq && self.error.take().is_some() {
                    commands.push(KioskCommand::UpdateUI);
                }
            }
        }

        commands
    }
}

#[cfg(test)]
impl KioskStateMachine {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Parse a typed odometer value; it must be a finite number above zero
pub fn parse_odometer(input: &str) -> Result<f64, SessionError> {
    input
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite() && *value > 0.0)
        .ok_or_else(|| SessionError::InvalidOdometer {
            input: input.to_string(),
        })
}

/// Local stand-in for a server-issued transaction id
fn simulated_transaction_id() -> String {
    let number: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{}{:06}", config::TRANSACTION_ID_PREFIX, number)
}
