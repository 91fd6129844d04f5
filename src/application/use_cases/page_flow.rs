//! Cooperative driver around the page state machine.
//!
//! One task owns every piece of mutable state (controller, history, the
//! active session handle, the latest grab) and interleaves three sources:
//! commands from the UI, events produced by controller effects, and events
//! from the running translation session. Effects execute strictly after the
//! transition that produced them, and follow-up events go through a queue,
//! so transitions never nest.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, warn};

use crate::application::use_cases::history::HistoryStore;
use crate::application::use_cases::page::{Effect, Page, PageController, PageEvent};
use crate::application::use_cases::session::{SessionEvent, SessionHandle, TranslationSession};
use crate::domain::error::{AppError, Result};
use crate::domain::genai_config::GenAiConfig;
use crate::domain::translation::{HistoryEntry, PartialTranslationResult};
use crate::infrastructure::capture::{CaptureSurface, Screenshot};
use crate::infrastructure::llm_clients::CompletionProvider;
use crate::infrastructure::storage::{ConfigStore, HistoryPersistence};
use crate::infrastructure::update::UpdateChecker;

const UI_CHANNEL_CAPACITY: usize = 64;

/// Commands the UI layer feeds into the driver.
#[derive(Debug, Clone, PartialEq)]
pub enum FlowCommand {
    Event(PageEvent),
    /// Freeze the whole virtual screen for the selection overlay.
    Grab,
    /// Crop the frozen grab and translate the region. A zero-size selection
    /// is a silent no-op (an aborted drag).
    CaptureSelection { origin: (i32, i32), size: (u32, u32) },
    SaveConfig(GenAiConfig),
    HistoryPrev,
    HistoryNext,
    HistorySetCursor(usize),
}

/// Everything the UI observes.
#[derive(Debug, Clone, PartialEq)]
pub enum UiUpdate {
    Page(Page),
    Grabbed(Screenshot),
    Partial(PartialTranslationResult),
    History {
        cursor: usize,
        entry: Option<HistoryEntry>,
    },
    Error(AppError),
}

pub struct PageFlow {
    controller: PageController,
    history: HistoryStore,
    session: TranslationSession,
    capture: Arc<dyn CaptureSurface>,
    config_store: Arc<dyn ConfigStore>,
    updates: Arc<dyn UpdateChecker>,
    current_version: String,
    ui_tx: mpsc::Sender<UiUpdate>,
    config: Option<GenAiConfig>,
    latest_grab: Option<Screenshot>,
    active: Option<SessionHandle>,
    initial_effects: Vec<Effect>,
}

impl PageFlow {
    pub async fn new(
        provider: Arc<dyn CompletionProvider>,
        capture: Arc<dyn CaptureSurface>,
        config_store: Arc<dyn ConfigStore>,
        history_persistence: Arc<dyn HistoryPersistence>,
        updates: Arc<dyn UpdateChecker>,
        current_version: String,
    ) -> Result<(Self, mpsc::Receiver<UiUpdate>)> {
        let history = HistoryStore::load(history_persistence).await?;
        let (controller, initial_effects) = PageController::new();
        let (ui_tx, ui_rx) = mpsc::channel(UI_CHANNEL_CAPACITY);
        Ok((
            Self {
                controller,
                history,
                session: TranslationSession::new(provider),
                capture,
                config_store,
                updates,
                current_version,
                ui_tx,
                config: None,
                latest_grab: None,
                active: None,
                initial_effects,
            },
            ui_rx,
        ))
    }

    pub fn page(&self) -> &Page {
        self.controller.page()
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    /// Runs until the command channel closes.
    pub async fn run(&mut self, mut inbox: mpsc::Receiver<FlowCommand>) {
        let initial = std::mem::take(&mut self.initial_effects);
        self.run_effects(initial).await;

        enum Arm {
            Command(Option<FlowCommand>),
            Session(Option<SessionEvent>),
        }

        loop {
            let arm = match self.active.as_mut() {
                Some(handle) => tokio::select! {
                    command = inbox.recv() => Arm::Command(command),
                    event = handle.recv() => Arm::Session(event),
                },
                None => Arm::Command(inbox.recv().await),
            };
            match arm {
                Arm::Command(None) => break,
                Arm::Command(Some(command)) => self.handle_command(command).await,
                Arm::Session(Some(event)) => self.handle_session_event(event).await,
                // Closed without a terminal event: the session was cancelled,
                // nothing else happens.
                Arm::Session(None) => self.active = None,
            }
        }
    }

    pub async fn handle_command(&mut self, command: FlowCommand) {
        match command {
            FlowCommand::Event(event) => self.dispatch(event).await,
            FlowCommand::Grab => self.grab().await,
            FlowCommand::CaptureSelection { origin, size } => {
                self.capture_selection(origin, size).await
            }
            FlowCommand::SaveConfig(config) => self.save_config(config).await,
            FlowCommand::HistoryPrev => {
                self.history.prev();
                self.publish_history().await;
            }
            FlowCommand::HistoryNext => {
                self.history.next();
                self.publish_history().await;
            }
            FlowCommand::HistorySetCursor(index) => {
                self.history.set_cursor(index);
                self.publish_history().await;
            }
        }
    }

    /// Feeds one event through the machine, then executes effects; events
    /// produced by effects queue behind the current one.
    pub async fn dispatch(&mut self, event: PageEvent) {
        let mut pending = VecDeque::from([event]);
        while let Some(event) = pending.pop_front() {
            let effects = self.controller.send(event);
            let _ = self
                .ui_tx
                .send(UiUpdate::Page(self.controller.page().clone()))
                .await;
            for effect in effects {
                self.run_effect(effect, &mut pending).await;
            }
        }
    }

    async fn run_effects(&mut self, effects: Vec<Effect>) {
        let mut pending = VecDeque::new();
        for effect in effects {
            self.run_effect(effect, &mut pending).await;
        }
        while let Some(event) = pending.pop_front() {
            self.dispatch(event).await;
        }
    }

    async fn run_effect(&mut self, effect: Effect, pending: &mut VecDeque<PageEvent>) {
        match effect {
            Effect::CheckForUpdate => {
                match self.updates.check(&self.current_version).await {
                    Ok(Some(info)) => pending.push_back(PageEvent::UpdateAvailable(info)),
                    Ok(None) => pending.push_back(PageEvent::UpToDate),
                    Err(e) => {
                        // A failed probe never blocks startup.
                        warn!(error = %e, "update check failed");
                        pending.push_back(PageEvent::UpToDate);
                    }
                }
            }
            Effect::LoadConfig => match self.config_store.load().await {
                Ok(Some(config)) => {
                    self.config = Some(config);
                    pending.push_back(PageEvent::ConfigFound);
                }
                Ok(None) => pending.push_back(PageEvent::ConfigMissing),
                Err(e) => {
                    warn!(error = %e, "config load failed");
                    pending.push_back(PageEvent::ConfigMissing);
                }
            },
            Effect::CancelTranslation => {
                if let Some(handle) = self.active.take() {
                    handle.cancel();
                }
            }
            Effect::StartTranslation(capture) => match &self.config {
                Some(config) => {
                    self.active = Some(
                        self.session
                            .start(config.clone(), capture.image_png),
                    );
                }
                None => pending.push_back(PageEvent::TranslationFailed(
                    AppError::CredentialMissing,
                )),
            },
            Effect::AppendHistory(result) => {
                if let Err(e) = self.history.push(HistoryEntry::new(result)).await {
                    error!(error = %e, "failed to persist history");
                    let _ = self.ui_tx.send(UiUpdate::Error(e)).await;
                }
                self.publish_history().await;
            }
        }
    }

    async fn handle_session_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Partial(partial) => {
                let _ = self.ui_tx.send(UiUpdate::Partial(partial)).await;
            }
            SessionEvent::Finalized(result) => {
                self.active = None;
                self.dispatch(PageEvent::Finalized(result)).await;
            }
            SessionEvent::Failed(e) => {
                self.active = None;
                let _ = self.ui_tx.send(UiUpdate::Error(e.clone())).await;
                self.dispatch(PageEvent::TranslationFailed(e)).await;
            }
        }
    }

    async fn grab(&mut self) {
        if !matches!(self.controller.page(), Page::Capture) {
            return;
        }
        match self.capture.capture_screen_region().await {
            Ok(shot) => {
                self.latest_grab = Some(shot.clone());
                let _ = self.ui_tx.send(UiUpdate::Grabbed(shot)).await;
            }
            Err(e) => {
                error!(error = %e, "screen grab failed");
                let _ = self.ui_tx.send(UiUpdate::Error(e)).await;
            }
        }
    }

    async fn capture_selection(&mut self, origin: (i32, i32), size: (u32, u32)) {
        if !matches!(self.controller.page(), Page::Capture) {
            return;
        }
        // Aborted drag: stay put, say nothing.
        if size.0 == 0 || size.1 == 0 {
            return;
        }
        let Some(grab) = &self.latest_grab else {
            let _ = self
                .ui_tx
                .send(UiUpdate::Error(AppError::CaptureFailed(
                    "no grab to crop".to_string(),
                )))
                .await;
            return;
        };
        match self.capture.crop_image(grab, origin, size) {
            Ok(cropped) => self.dispatch(PageEvent::Captured(cropped)).await,
            Err(e) => {
                error!(error = %e, "crop failed");
                let _ = self.ui_tx.send(UiUpdate::Error(e)).await;
            }
        }
    }

    async fn save_config(&mut self, config: GenAiConfig) {
        match self.config_store.save(&config).await {
            Ok(()) => {
                self.config = Some(config);
                self.dispatch(PageEvent::ConfigSaved).await;
            }
            Err(e) => {
                let _ = self.ui_tx.send(UiUpdate::Error(e)).await;
            }
        }
    }

    async fn publish_history(&self) {
        let _ = self
            .ui_tx
            .send(UiUpdate::History {
                cursor: self.history.cursor(),
                entry: self.history.current().cloned(),
            })
            .await;
    }
}
