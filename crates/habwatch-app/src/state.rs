// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::{CertificateDecision, Page, PageId, UntrustedCertificate, Widget};

const DEFAULT_TITLE: &str = "openHAB";

/// A modal prompt: hidden, or shown with its description.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Prompt {
    #[default]
    Hidden,
    Shown(String),
}

impl Prompt {
    pub fn is_shown(&self) -> bool {
        matches!(self, Self::Shown(_))
    }

    pub fn description(&self) -> Option<&str> {
        match self {
            Self::Hidden => None,
            Self::Shown(description) => Some(description),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlertState {
    pub error: Prompt,
    pub certificate: Prompt,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppState {
    pub sitemap: String,
    pub title: String,
    pub current_page: PageId,
    pub history: Vec<PageId>,
    pub widgets: Vec<Widget>,
    pub selected: usize,
    pub alerts: AlertState,
    pub status_line: Option<String>,
}

impl AppState {
    pub fn new(sitemap: &str) -> Self {
        Self {
            sitemap: sitemap.to_owned(),
            title: DEFAULT_TITLE.to_owned(),
            current_page: PageId::new(sitemap),
            history: Vec::new(),
            widgets: Vec::new(),
            selected: 0,
            alerts: AlertState::default(),
            status_line: None,
        }
    }

    pub fn selected_widget(&self) -> Option<&Widget> {
        self.widgets.get(self.selected)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AppCommand {
    PageLoaded(Page),
    ShowError(String),
    DismissError,
    ShowCertificatePrompt(String),
    ResolveCertificate(CertificateDecision),
    OpenPage(PageId),
    Back,
    SelectNext,
    SelectPrev,
    Refresh,
    SetStatus(String),
    ClearStatus,
}

/// How a failed page load surfaces to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadFailure {
    Certificate(UntrustedCertificate),
    Other(String),
}

impl LoadFailure {
    pub fn classify(error: &anyhow::Error) -> Self {
        match error.downcast_ref::<UntrustedCertificate>() {
            Some(untrusted) => Self::Certificate(untrusted.clone()),
            None => Self::Other(format!("{error:#}")),
        }
    }

    pub fn into_command(self) -> AppCommand {
        match self {
            Self::Certificate(untrusted) => {
                AppCommand::ShowCertificatePrompt(untrusted.to_string())
            }
            Self::Other(description) => AppCommand::ShowError(description),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    WidgetsReplaced(usize),
    TitleChanged(String),
    ErrorShown,
    ErrorDismissed,
    CertificatePromptShown,
    CertificateResolved(CertificateDecision),
    PageChanged(PageId),
    SelectionChanged(usize),
    RefreshRequested,
    StatusUpdated(String),
    StatusCleared,
}

impl AppState {
    pub fn dispatch(&mut self, command: AppCommand) -> Vec<AppEvent> {
        match command {
            AppCommand::PageLoaded(page) => self.replace_page(page),
            AppCommand::ShowError(description) => {
                self.alerts.error = Prompt::Shown(description);
                vec![AppEvent::ErrorShown]
            }
            AppCommand::DismissError => {
                if !self.alerts.error.is_shown() {
                    return Vec::new();
                }
                self.alerts.error = Prompt::Hidden;
                vec![AppEvent::ErrorDismissed, AppEvent::RefreshRequested]
            }
            AppCommand::ShowCertificatePrompt(description) => {
                self.alerts.certificate = Prompt::Shown(description);
                vec![AppEvent::CertificatePromptShown]
            }
            AppCommand::ResolveCertificate(decision) => {
                if !self.alerts.certificate.is_shown() {
                    return Vec::new();
                }
                self.alerts.certificate = Prompt::Hidden;
                let mut events = vec![AppEvent::CertificateResolved(decision)];
                if decision.permits() {
                    events.push(AppEvent::RefreshRequested);
                } else {
                    events.push(self.set_status("certificate rejected"));
                }
                events
            }
            AppCommand::OpenPage(page) => {
                if page == self.current_page {
                    return Vec::new();
                }
                let previous = std::mem::replace(&mut self.current_page, page);
                self.history.push(previous);
                self.selected = 0;
                vec![
                    AppEvent::PageChanged(self.current_page.clone()),
                    AppEvent::RefreshRequested,
                ]
            }
            AppCommand::Back => {
                let Some(previous) = self.history.pop() else {
                    return Vec::new();
                };
                self.current_page = previous;
                self.selected = 0;
                vec![
                    AppEvent::PageChanged(self.current_page.clone()),
                    AppEvent::RefreshRequested,
                ]
            }
            AppCommand::SelectNext => self.move_selection(1),
            AppCommand::SelectPrev => self.move_selection(-1),
            AppCommand::Refresh => vec![AppEvent::RefreshRequested],
            AppCommand::SetStatus(message) => vec![self.set_status(&message)],
            AppCommand::ClearStatus => {
                self.status_line = None;
                vec![AppEvent::StatusCleared]
            }
        }
    }

    fn replace_page(&mut self, page: Page) -> Vec<AppEvent> {
        let mut events = Vec::new();
        let title = if page.title.trim().is_empty() {
            DEFAULT_TITLE.to_owned()
        } else {
            page.title.trim().to_owned()
        };
        if title != self.title {
            self.title = title.clone();
            events.push(AppEvent::TitleChanged(title));
        }

        self.widgets = page.flattened_widgets();
        self.selected = self.selected.min(self.widgets.len().saturating_sub(1));
        events.push(AppEvent::WidgetsReplaced(self.widgets.len()));
        events
    }

    fn move_selection(&mut self, delta: isize) -> Vec<AppEvent> {
        if self.widgets.is_empty() {
            return Vec::new();
        }
        let last = self.widgets.len() - 1;
        let next = self.selected.saturating_add_signed(delta).min(last);
        if next == self.selected {
            return Vec::new();
        }
        self.selected = next;
        vec![AppEvent::SelectionChanged(next)]
    }

    fn set_status(&mut self, message: &str) -> AppEvent {
        self.status_line = Some(message.to_owned());
        AppEvent::StatusUpdated(message.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::{AppCommand, AppEvent, AppState, LoadFailure, Prompt};
    use crate::{CertificateDecision, Page, PageId, UntrustedCertificate, Widget};
    use anyhow::{Context, anyhow};

    fn page(title: &str, widget_count: usize) -> Page {
        Page {
            id: PageId::new("demo"),
            title: title.to_owned(),
            leaf: false,
            widgets: (0..widget_count)
                .map(|index| Widget::new(format!("{index:02}"), "Text", "row"))
                .collect(),
        }
    }

    #[test]
    fn error_alert_shows_and_dismisses_with_one_refresh() {
        let mut state = AppState::new("demo");

        let shown = state.dispatch(AppCommand::ShowError("timed out".to_owned()));
        assert_eq!(shown, vec![AppEvent::ErrorShown]);
        assert_eq!(state.alerts.error.description(), Some("timed out"));

        let dismissed = state.dispatch(AppCommand::DismissError);
        assert_eq!(
            dismissed,
            vec![AppEvent::ErrorDismissed, AppEvent::RefreshRequested]
        );
        assert_eq!(state.alerts.error, Prompt::Hidden);

        assert!(state.dispatch(AppCommand::DismissError).is_empty());
    }

    #[test]
    fn certificate_prompt_records_one_choice_per_occurrence() {
        let mut state = AppState::new("demo");
        state.dispatch(AppCommand::ShowCertificatePrompt("self-signed".to_owned()));
        assert!(state.alerts.certificate.is_shown());

        let resolved = state.dispatch(AppCommand::ResolveCertificate(
            CertificateDecision::PermitOnce,
        ));
        assert_eq!(
            resolved,
            vec![
                AppEvent::CertificateResolved(CertificateDecision::PermitOnce),
                AppEvent::RefreshRequested,
            ]
        );
        assert!(!state.alerts.certificate.is_shown());

        let again = state.dispatch(AppCommand::ResolveCertificate(CertificateDecision::Deny));
        assert!(again.is_empty());
    }

    #[test]
    fn denying_certificate_does_not_refresh() {
        let mut state = AppState::new("demo");
        state.dispatch(AppCommand::ShowCertificatePrompt("expired".to_owned()));
        let resolved = state.dispatch(AppCommand::ResolveCertificate(CertificateDecision::Deny));
        assert!(!resolved.contains(&AppEvent::RefreshRequested));
        assert_eq!(state.status_line.as_deref(), Some("certificate rejected"));
    }

    #[test]
    fn page_load_replaces_widgets_and_clamps_selection() {
        let mut state = AppState::new("demo");
        state.dispatch(AppCommand::PageLoaded(page("Ground floor", 5)));
        state.selected = 4;

        let events = state.dispatch(AppCommand::PageLoaded(page("Ground floor", 2)));
        assert_eq!(events, vec![AppEvent::WidgetsReplaced(2)]);
        assert_eq!(state.selected, 1);
        assert_eq!(state.title, "Ground floor");

        state.dispatch(AppCommand::PageLoaded(page("  ", 0)));
        assert_eq!(state.title, "openHAB");
        assert_eq!(state.selected, 0);
        assert!(state.selected_widget().is_none());
    }

    #[test]
    fn selection_stops_at_edges() {
        let mut state = AppState::new("demo");
        state.dispatch(AppCommand::PageLoaded(page("Home", 2)));

        assert!(state.dispatch(AppCommand::SelectPrev).is_empty());
        assert_eq!(
            state.dispatch(AppCommand::SelectNext),
            vec![AppEvent::SelectionChanged(1)]
        );
        assert!(state.dispatch(AppCommand::SelectNext).is_empty());
    }

    #[test]
    fn open_page_and_back_walk_history() {
        let mut state = AppState::new("demo");
        let opened = state.dispatch(AppCommand::OpenPage(PageId::new("0100")));
        assert_eq!(
            opened,
            vec![
                AppEvent::PageChanged(PageId::new("0100")),
                AppEvent::RefreshRequested,
            ]
        );
        assert_eq!(state.history, vec![PageId::new("demo")]);

        let back = state.dispatch(AppCommand::Back);
        assert_eq!(back[0], AppEvent::PageChanged(PageId::new("demo")));
        assert!(state.dispatch(AppCommand::Back).is_empty());
    }

    #[test]
    fn load_failures_route_to_the_right_prompt() {
        let untrusted = UntrustedCertificate {
            host: "openhab.local".to_owned(),
            detail: "UnknownIssuer".to_owned(),
        };
        let wrapped = Err::<(), _>(anyhow::Error::new(untrusted.clone()))
            .context("load page demo")
            .expect_err("error expected");
        let failure = LoadFailure::classify(&wrapped);
        assert_eq!(failure, LoadFailure::Certificate(untrusted));

        let mut state = AppState::new("demo");
        state.dispatch(failure.into_command());
        assert!(state.alerts.certificate.is_shown());
        assert!(!state.alerts.error.is_shown());

        let other = LoadFailure::classify(&anyhow!("connection refused"));
        state.dispatch(other.into_command());
        assert_eq!(state.alerts.error.description(), Some("connection refused"));
    }
}
