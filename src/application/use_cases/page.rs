//! Application lifecycle state machine.
//!
//! Each state carries exactly the context it needs, so there is no shared
//! mutable bag of nullable fields: the capture under translation lives in
//! `Translating`, the finished result in `Viewing`, and so on. Transitions
//! are synchronous and pure; side effects are returned as `Effect` values
//! for the driver to execute, and events the current state does not declare
//! are ignored so late or duplicate UI events are harmless.

use tracing::debug;

use crate::domain::error::AppError;
use crate::domain::translation::TranslationResult;
use crate::infrastructure::capture::Screenshot;
use crate::infrastructure::update::UpdateInfo;

#[derive(Debug, Clone, PartialEq)]
pub enum Page {
    CheckUpdate,
    SelectUpdate { info: UpdateInfo },
    CheckConfig,
    EnterConfig,
    Capture,
    Translating { capture: Screenshot },
    TranslatingFailed { capture: Screenshot, error: AppError },
    Viewing { result: TranslationResult },
}

impl Page {
    pub fn name(&self) -> &'static str {
        match self {
            Page::CheckUpdate => "CheckUpdate",
            Page::SelectUpdate { .. } => "SelectUpdate",
            Page::CheckConfig => "CheckConfig",
            Page::EnterConfig => "EnterConfig",
            Page::Capture => "Capture",
            Page::Translating { .. } => "Translating",
            Page::TranslatingFailed { .. } => "TranslatingFailed",
            Page::Viewing { .. } => "Viewing",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PageEvent {
    UpdateAvailable(UpdateInfo),
    UpToDate,
    SkipUpdate,
    ConfigFound,
    ConfigMissing,
    ConfigSaved,
    Captured(Screenshot),
    Finalized(TranslationResult),
    TranslationFailed(AppError),
    Retry,
    Back,
    Restart,
}

/// Work the driver performs after a transition. The machine itself never
/// touches collaborators.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    CheckForUpdate,
    LoadConfig,
    CancelTranslation,
    StartTranslation(Screenshot),
    AppendHistory(TranslationResult),
}

pub struct PageController {
    page: Page,
}

impl PageController {
    /// Starts in `CheckUpdate`; the returned entry effect kicks off the
    /// update probe.
    pub fn new() -> (Self, Vec<Effect>) {
        (
            Self {
                page: Page::CheckUpdate,
            },
            vec![Effect::CheckForUpdate],
        )
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    /// Applies one event. Effects are returned in execution order; the driver
    /// feeds any resulting events back in one at a time, which keeps
    /// transitions from nesting.
    pub fn send(&mut self, event: PageEvent) -> Vec<Effect> {
        match reduce(&self.page, event) {
            Some((next, effects)) => {
                debug!(from = self.page.name(), to = next.name(), "page transition");
                self.page = next;
                effects
            }
            None => {
                debug!(state = self.page.name(), "event has no transition here, ignored");
                Vec::new()
            }
        }
    }
}

fn reduce(page: &Page, event: PageEvent) -> Option<(Page, Vec<Effect>)> {
    match (page, event) {
        (Page::CheckUpdate, PageEvent::UpdateAvailable(info)) => {
            Some((Page::SelectUpdate { info }, vec![]))
        }
        (Page::CheckUpdate, PageEvent::UpToDate) => {
            Some((Page::CheckConfig, vec![Effect::LoadConfig]))
        }
        (Page::SelectUpdate { .. }, PageEvent::SkipUpdate) => {
            Some((Page::CheckConfig, vec![Effect::LoadConfig]))
        }
        (Page::CheckConfig, PageEvent::ConfigFound) => Some((Page::Capture, vec![])),
        (Page::CheckConfig, PageEvent::ConfigMissing) => Some((Page::EnterConfig, vec![])),
        (Page::EnterConfig, PageEvent::ConfigSaved) => Some((Page::Capture, vec![])),
        (Page::Capture, PageEvent::Captured(capture)) => Some((
            Page::Translating {
                capture: capture.clone(),
            },
            vec![Effect::CancelTranslation, Effect::StartTranslation(capture)],
        )),
        (Page::Translating { .. }, PageEvent::Finalized(result)) => Some((
            Page::Viewing {
                result: result.clone(),
            },
            vec![Effect::AppendHistory(result)],
        )),
        // A missing credential is not a retryable translation failure; it
        // routes straight back to config entry.
        (Page::Translating { .. }, PageEvent::TranslationFailed(AppError::CredentialMissing)) => {
            Some((Page::EnterConfig, vec![Effect::CancelTranslation]))
        }
        (Page::Translating { capture }, PageEvent::TranslationFailed(error)) => Some((
            Page::TranslatingFailed {
                capture: capture.clone(),
                error,
            },
            vec![Effect::CancelTranslation],
        )),
        (Page::TranslatingFailed { capture, .. }, PageEvent::Retry) => Some((
            Page::Translating {
                capture: capture.clone(),
            },
            vec![
                Effect::CancelTranslation,
                Effect::StartTranslation(capture.clone()),
            ],
        )),
        (Page::TranslatingFailed { .. }, PageEvent::Back) => Some((Page::Capture, vec![])),
        (Page::Viewing { .. }, PageEvent::Restart) => Some((Page::Capture, vec![])),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::translation::Language;

    fn shot() -> Screenshot {
        Screenshot {
            image_png: vec![1, 2, 3],
            origin: (0, 0),
            size: (10, 10),
        }
    }

    fn result() -> TranslationResult {
        TranslationResult {
            detected_language: Language::Ja,
            ja: "犬".to_string(),
            en: "dog".to_string(),
        }
    }

    #[test]
    fn test_happy_path_to_viewing_and_back() {
        let (mut controller, effects) = PageController::new();
        assert_eq!(effects, vec![Effect::CheckForUpdate]);

        assert_eq!(
            controller.send(PageEvent::UpToDate),
            vec![Effect::LoadConfig]
        );
        assert_eq!(controller.send(PageEvent::ConfigFound), vec![]);
        assert_eq!(controller.page(), &Page::Capture);

        let effects = controller.send(PageEvent::Captured(shot()));
        assert_eq!(
            effects,
            vec![
                Effect::CancelTranslation,
                Effect::StartTranslation(shot())
            ]
        );
        assert_eq!(controller.page().name(), "Translating");

        let effects = controller.send(PageEvent::Finalized(result()));
        assert_eq!(effects, vec![Effect::AppendHistory(result())]);
        assert_eq!(
            controller.page(),
            &Page::Viewing { result: result() }
        );

        assert_eq!(controller.send(PageEvent::Restart), vec![]);
        assert_eq!(controller.page(), &Page::Capture);
    }

    #[test]
    fn test_update_available_waits_for_skip() {
        let info = UpdateInfo {
            version: "9.9.9".to_string(),
            notes: None,
            url: None,
        };
        let (mut controller, _) = PageController::new();
        controller.send(PageEvent::UpdateAvailable(info.clone()));
        assert_eq!(controller.page(), &Page::SelectUpdate { info });

        assert_eq!(
            controller.send(PageEvent::SkipUpdate),
            vec![Effect::LoadConfig]
        );
        assert_eq!(controller.page(), &Page::CheckConfig);
    }

    #[test]
    fn test_missing_config_routes_through_entry() {
        let (mut controller, _) = PageController::new();
        controller.send(PageEvent::UpToDate);
        controller.send(PageEvent::ConfigMissing);
        assert_eq!(controller.page(), &Page::EnterConfig);
        controller.send(PageEvent::ConfigSaved);
        assert_eq!(controller.page(), &Page::Capture);
    }

    #[test]
    fn test_failure_is_explicit_and_retryable() {
        let (mut controller, _) = PageController::new();
        controller.send(PageEvent::UpToDate);
        controller.send(PageEvent::ConfigFound);
        controller.send(PageEvent::Captured(shot()));

        let error = AppError::InvalidFinalPayload("fr".to_string());
        let effects = controller.send(PageEvent::TranslationFailed(error.clone()));
        assert_eq!(effects, vec![Effect::CancelTranslation]);
        assert_eq!(
            controller.page(),
            &Page::TranslatingFailed {
                capture: shot(),
                error
            }
        );

        let effects = controller.send(PageEvent::Retry);
        assert!(effects.contains(&Effect::StartTranslation(shot())));
        assert_eq!(controller.page().name(), "Translating");
    }

    #[test]
    fn test_failure_back_returns_to_capture() {
        let (mut controller, _) = PageController::new();
        controller.send(PageEvent::UpToDate);
        controller.send(PageEvent::ConfigFound);
        controller.send(PageEvent::Captured(shot()));
        controller.send(PageEvent::TranslationFailed(AppError::CompletionFailed(
            "boom".to_string(),
        )));
        controller.send(PageEvent::Back);
        assert_eq!(controller.page(), &Page::Capture);
    }

    #[test]
    fn test_credential_missing_routes_to_config_entry() {
        let (mut controller, _) = PageController::new();
        controller.send(PageEvent::UpToDate);
        controller.send(PageEvent::ConfigFound);
        controller.send(PageEvent::Captured(shot()));
        controller.send(PageEvent::TranslationFailed(AppError::CredentialMissing));
        assert_eq!(controller.page(), &Page::EnterConfig);
    }

    #[test]
    fn test_undeclared_events_are_ignored() {
        let (mut controller, _) = PageController::new();
        controller.send(PageEvent::UpToDate);
        controller.send(PageEvent::ConfigFound);
        controller.send(PageEvent::Captured(shot()));
        controller.send(PageEvent::Finalized(result()));
        let viewing = controller.page().clone();

        // A late capture event while viewing changes nothing.
        assert_eq!(controller.send(PageEvent::Captured(shot())), vec![]);
        assert_eq!(controller.page(), &viewing);

        // Duplicate finalization is equally harmless.
        assert_eq!(controller.send(PageEvent::Finalized(result())), vec![]);
        assert_eq!(controller.page(), &viewing);
    }

    #[test]
    fn test_skip_update_ignored_outside_select_update() {
        let (mut controller, _) = PageController::new();
        controller.send(PageEvent::UpToDate);
        assert_eq!(controller.send(PageEvent::SkipUpdate), vec![]);
        assert_eq!(controller.page(), &Page::CheckConfig);
    }
}
