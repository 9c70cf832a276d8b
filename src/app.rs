//! Application context - bridges the I/O-free state machine with the backend,
//! the countdown timer and the kiosk view.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::api::ReferenceDataSource;
use crate::auth::CredentialVerifier;
use crate::config;
use crate::countdown::CountdownTimer;
use crate::state::{KioskCommand, KioskEvent, KioskStateMachine, SelectionLists};
use crate::ui::{KioskView, KioskViewState};

/// Messages sent from async tasks and the input reader to the run loop
#[derive(Debug, Clone)]
pub enum AppMessage {
    /// Process a kiosk event through the state machine
    Event(KioskEvent),
    /// Stop the run loop
    Shutdown,
}

/// Sender that can dispatch messages to the run loop from any task
#[derive(Clone)]
pub struct MessageSender {
    tx: mpsc::UnboundedSender<AppMessage>,
}

impl MessageSender {
    pub fn send(&self, msg: AppMessage) {
        // The receiver only goes away once the kiosk has stopped
        let _ = self.tx.send(msg);
    }

    pub fn send_event(&self, event: KioskEvent) {
        self.send(AppMessage::Event(event));
    }

    pub fn shutdown(&self) {
        self.send(AppMessage::Shutdown);
    }
}

/// Application context - owns the state machine and executes its commands
pub struct AppContext {
    state_machine: KioskStateMachine,
    source: Arc<dyn ReferenceDataSource>,
    verifier: Arc<dyn CredentialVerifier>,
    timer: CountdownTimer,
    view: Box<dyn KioskView>,
    message_tx: MessageSender,
}

impl AppContext {
    pub fn new(
        source: Arc<dyn ReferenceDataSource>,
        verifier: Arc<dyn CredentialVerifier>,
        view: Box<dyn KioskView>,
    ) -> (Self, mpsc::UnboundedReceiver<AppMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();

        let ctx = Self {
            state_machine: KioskStateMachine::new(),
            source,
            verifier,
            timer: CountdownTimer::new(),
            view,
            message_tx: MessageSender { tx },
        };

        (ctx, rx)
    }

    pub fn sender(&self) -> MessageSender {
        self.message_tx.clone()
    }

    fn render(&mut self) {
        let snapshot = KioskViewState::from(&self.state_machine);
        self.view.render(&snapshot);
    }

    /// Process an event and execute resulting commands.
    /// Must be called from within the tokio runtime.
    pub fn process_event(&mut self, event: KioskEvent) -> Vec<KioskCommand> {
        let commands = self.state_machine.process(event);

        for cmd in &commands {
            self.execute_command(cmd.clone());
        }

        commands
    }

    /// Execute a command from the state machine
    fn execute_command(&mut self, cmd: KioskCommand) {
        match cmd {
            KioskCommand::FetchSelections => {
                let tx = self.message_tx.clone();
                let source = self.source.clone();

                tokio::spawn(async move {
                    let result = futures_util::try_join!(
                        source.list_drivers(),
                        source.list_vehicles(),
                        source.list_bowsers(),
                    );
                    match result {
                        Ok((drivers, vehicles, bowsers)) => {
                            tx.send_event(KioskEvent::SelectionsLoaded(SelectionLists {
                                drivers,
                                vehicles,
                                bowsers,
                            }));
                        }
                        Err(e) => {
                            log::error!("Failed to load selection lists: {}", e);
                            tx.send_event(KioskEvent::SelectionsFailed {
                                error: e.to_string(),
                            });
                        }
                    }
                });
            }

            KioskCommand::VerifyCredentials {
                request,
                generation,
            } => {
                let tx = self.message_tx.clone();
                let verifier = self.verifier.clone();

                tokio::spawn(async move {
                    match verifier.verify(&request).await {
                        Ok(identity) => {
                            tx.send_event(KioskEvent::CredentialsVerified {
                                identity,
                                generation,
                            });
                        }
                        Err(error) => {
                            tx.send_event(KioskEvent::CredentialsRejected { error, generation });
                        }
                    }
                });
            }

            KioskCommand::StartCountdown {
                seconds,
                generation,
            } => {
                let tx = self.message_tx.clone();
                self.timer.start(seconds, generation, move |generation| {
                    tx.send_event(KioskEvent::CountdownTick { generation });
                });
            }

            KioskCommand::CancelCountdown => {
                self.timer.cancel();
            }

            KioskCommand::ScheduleErrorClear { seq } => {
                let tx = self.message_tx.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_millis(config::ERROR_DISPLAY_DURATION_MS))
                        .await;
                    tx.send_event(KioskEvent::ClearError { seq });
                });
            }

            KioskCommand::UpdateUI => self.render(),
        }
    }

    /// Drive the kiosk until a shutdown message arrives
    pub async fn run(mut self, mut rx: mpsc::UnboundedReceiver<AppMessage>) {
        log::info!("Kiosk ready");
        self.render();
        self.process_event(KioskEvent::LoadSelections);

        while let Some(msg) = rx.recv().await {
            match msg {
                AppMessage::Event(event) => {
                    self.process_event(event);
                }
                AppMessage::Shutdown => break,
            }
        }

        self.timer.cancel();
        log::info!("Kiosk stopped");
    }
}

#[cfg(test)]
impl AppContext {
    pub fn state_machine(&self) -> &KioskStateMachine {
        &self.state_machine
    }

    pub fn countdown_running(&self) -> bool {
        self.timer.is_running()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::tests::FakeSource;
    use crate::auth::SelectionVerifier;
    use crate::state::{KioskState, SessionError};
    use crate::ui::KioskScreen;
    use std::sync::Mutex;
    use tokio::time::Instant;

    #[derive(Clone, Default)]
    struct RecordingView {
        frames: Arc<Mutex<Vec<KioskViewState>>>,
    }

    impl RecordingView {
        fn last(&self) -> Option<KioskViewState> {
            self.frames.lock().unwrap().last().cloned()
        }
    }

    impl KioskView for RecordingView {
        fn render(&mut self, view: &KioskViewState) {
            self.frames.lock().unwrap().push(view.clone());
        }
    }

    fn context(
        source: FakeSource,
    ) -> (AppContext, mpsc::UnboundedReceiver<AppMessage>, RecordingView) {
        let source: Arc<dyn ReferenceDataSource> = Arc::new(source);
        let verifier = Arc::new(SelectionVerifier::new(source.clone()));
        let view = RecordingView::default();
        let (ctx, rx) = AppContext::new(source, verifier, Box::new(view.clone()));
        (ctx, rx, view)
    }

    /// Wait for the next message and feed it through the context
    async fn pump(ctx: &mut AppContext, rx: &mut mpsc::UnboundedReceiver<AppMessage>) {
        match rx.recv().await {
            Some(AppMessage::Event(event)) => {
                ctx.process_event(event);
            }
            other => panic!("unexpected message {:?}", other),
        }
    }

    fn login(driver: &str, vehicle: &str, bowser: &str) -> KioskEvent {
        KioskEvent::Authenticate {
            driver_id: driver.into(),
            vehicle_id: vehicle.into(),
            bowser_id: bowser.into(),
        }
    }

    async fn authenticated() -> (AppContext, mpsc::UnboundedReceiver<AppMessage>, RecordingView) {
        let (mut ctx, mut rx, view) = context(FakeSource::fleet());
        ctx.process_event(login("D1", "V1", "B1"));
        pump(&mut ctx, &mut rx).await;
        assert_eq!(ctx.state_machine().state, KioskState::Authenticated);
        (ctx, rx, view)
    }

    #[tokio::test]
    async fn test_selections_are_loaded() {
        let (mut ctx, mut rx, view) = context(FakeSource::fleet());

        ctx.process_event(KioskEvent::LoadSelections);
        pump(&mut ctx, &mut rx).await;

        let lists = ctx.state_machine().selections.as_ref().unwrap();
        assert_eq!(lists.drivers.len(), 2);
        assert_eq!(lists.vehicles.len(), 2);
        assert!(view.last().unwrap().selections.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_offline_backend_error_clears() {
        let (mut ctx, mut rx, view) = context(FakeSource {
            offline: true,
            ..FakeSource::fleet()
        });

        ctx.process_event(KioskEvent::LoadSelections);
        pump(&mut ctx, &mut rx).await;
        assert!(matches!(
            ctx.state_machine().error,
            Some(SessionError::ReferenceDataUnavailable(_))
        ));
        assert!(view.last().unwrap().error.is_some());

        let started = Instant::now();
        pump(&mut ctx, &mut rx).await;
        assert!(ctx.state_machine().error.is_none());
        assert_eq!(
            started.elapsed(),
            Duration::from_millis(config::ERROR_DISPLAY_DURATION_MS)
        );
        assert!(view.last().unwrap().error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_error_stays_for_full_duration() {
        let (mut ctx, mut rx, _view) = context(FakeSource::fleet());
        let display = Duration::from_millis(config::ERROR_DISPLAY_DURATION_MS);

        // Photo outside a session is refused
        ctx.process_event(KioskEvent::AttachPhoto);
        tokio::time::sleep(Duration::from_secs(4)).await;

        ctx.process_event(login("", "", ""));
        let raised = Instant::now();
        assert_eq!(
            ctx.state_machine().error,
            Some(SessionError::IncompleteSelection)
        );

        // The first error's timer fires a second later and must not clear this one
        pump(&mut ctx, &mut rx).await;
        assert_eq!(raised.elapsed(), Duration::from_secs(1));
        assert_eq!(
            ctx.state_machine().error,
            Some(SessionError::IncompleteSelection)
        );

        pump(&mut ctx, &mut rx).await;
        assert_eq!(raised.elapsed(), display);
        assert!(ctx.state_machine().error.is_none());
    }

    #[tokio::test]
    async fn test_login_reaches_odometer_entry() {
        let (ctx, _rx, view) = authenticated().await;

        let session = ctx.state_machine().session.as_ref().unwrap();
        assert_eq!(session.vehicle.vehicle_id, "V1");
        let frame = view.last().unwrap();
        assert_eq!(frame.screen, KioskScreen::OdometerEntry);
        assert_eq!(frame.odometer_prefill, Some(1000.0));
    }

    #[tokio::test]
    async fn test_unknown_vehicle_stays_idle() {
        let (mut ctx, mut rx, view) = context(FakeSource::fleet());

        ctx.process_event(login("D1", "V7", "B1"));
        assert!(view.last().unwrap().loading);
        pump(&mut ctx, &mut rx).await;

        assert_eq!(ctx.state_machine().state, KioskState::Idle);
        assert!(matches!(
            ctx.state_machine().error,
            Some(SessionError::Lookup { .. })
        ));
        let frame = view.last().unwrap();
        assert!(!frame.loading);
        assert_eq!(
            frame.error.as_deref(),
            Some("No vehicle with id V7 was found. Please select again.")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_countdown_returns_to_idle() {
        let (mut ctx, mut rx, view) = authenticated().await;

        ctx.process_event(KioskEvent::SubmitOdometer {
            input: "1050".into(),
        });
        assert_eq!(ctx.state_machine().state, KioskState::Confirming);
        assert!(ctx.countdown_running());

        let started = Instant::now();
        while ctx.state_machine().state == KioskState::Confirming {
            pump(&mut ctx, &mut rx).await;
        }

        assert_eq!(started.elapsed(), Duration::from_secs(30));
        assert!(ctx.state_machine().session.is_none());
        assert!(!ctx.countdown_running());
        assert_eq!(view.last().unwrap().screen, KioskScreen::Authentication);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_stops_countdown() {
        let (mut ctx, mut rx, _view) = authenticated().await;

        ctx.process_event(KioskEvent::SubmitOdometer {
            input: "1050".into(),
        });
        pump(&mut ctx, &mut rx).await;
        assert_eq!(ctx.state_machine().countdown_value, Some(29));

        ctx.process_event(KioskEvent::Reset);
        assert!(!ctx.countdown_running());
        assert_eq!(ctx.state_machine().state, KioskState::Idle);

        // No tick arrives once the countdown is cancelled
        let next = tokio::time::timeout(Duration::from_secs(60), rx.recv()).await;
        assert!(next.is_err());
    }

    #[tokio::test]
    async fn test_shutdown_stops_run_loop() {
        let (ctx, rx, view) = context(FakeSource::fleet());
        let sender = ctx.sender();

        sender.send_event(login("D1", "V1", "B1"));
        let handle = tokio::spawn(ctx.run(rx));
        sender.shutdown();
        handle.await.unwrap();

        assert!(!view.frames.lock().unwrap().is_empty());
    }
}
