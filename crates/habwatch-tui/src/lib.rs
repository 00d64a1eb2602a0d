// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod rows;

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use habwatch_app::{
    AppCommand, AppEvent, AppState, CertificateDecision, CertificatePolicy, CommandRequest,
    CommandSink, LoadFailure, Page, PageId, RowAction, RowView, Settings, press, rows_for,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;
use time::OffsetDateTime;
use time::macros::format_description;

const POLL_INTERVAL: Duration = Duration::from_millis(120);
const STATUS_CLEAR_AFTER: Duration = Duration::from_secs(4);

/// Everything the UI needs from the outside world.
pub trait AppRuntime {
    fn settings(&self) -> &Settings;
    fn load_page(&mut self, page: &PageId) -> Result<Page>;
    fn send_command(&mut self, request: &CommandRequest) -> Result<()>;
    /// Delivers a command and reports the outcome on `tx`. Runtimes backed by
    /// a network override this to send from a worker thread.
    fn spawn_command(&mut self, request: CommandRequest, tx: Sender<InternalEvent>) -> Result<()> {
        let event = match self.send_command(&request) {
            Ok(()) => InternalEvent::CommandSent { request },
            Err(error) => InternalEvent::CommandFailed {
                request,
                error: format!("{error:#}"),
            },
        };
        tx.send(event)
            .map_err(|_| anyhow::anyhow!("command event channel closed"))?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InternalEvent {
    ClearStatus { token: u64 },
    Refresh,
    CommandSent { request: CommandRequest },
    CommandFailed { request: CommandRequest, error: String },
}

#[derive(Debug, Clone, PartialEq, Default)]
struct ViewData {
    rows: Vec<RowView>,
    certificate_cursor: usize,
    help_visible: bool,
    status_token: u64,
    last_refresh: Option<OffsetDateTime>,
}

/// Adapts the runtime to the fire-and-forget sink widgets send through.
struct RuntimeSink<'a, R: AppRuntime> {
    runtime: &'a mut R,
    tx: &'a Sender<InternalEvent>,
}

impl<R: AppRuntime> CommandSink for RuntimeSink<'_, R> {
    fn send_command(&mut self, request: CommandRequest) {
        if let Err(error) = self.runtime.spawn_command(request, self.tx.clone()) {
            tracing::warn!("dispatch command: {error:#}");
        }
    }
}

pub fn run_app<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    certificates: CertificatePolicy,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen).context("enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;

    let mut view_data = ViewData::default();
    let (internal_tx, internal_rx) = mpsc::channel();

    refresh_page(state, runtime, &mut view_data);

    let mut result = Ok(());
    loop {
        process_internal_events(state, runtime, &mut view_data, &internal_tx, &internal_rx);

        if let Err(error) = terminal.draw(|frame| render(frame, state, &view_data)) {
            result = Err(error).context("draw frame");
            break;
        }

        let has_event = match event::poll(POLL_INTERVAL).context("poll event") {
            Ok(has_event) => has_event,
            Err(error) => {
                result = Err(error);
                break;
            }
        };
        if has_event {
            match event::read().context("read event") {
                Ok(Event::Key(key)) => {
                    if handle_key_event(
                        state,
                        runtime,
                        &mut view_data,
                        &certificates,
                        &internal_tx,
                        key,
                    ) {
                        break;
                    }
                }
                Ok(_) => {}
                Err(error) => {
                    result = Err(error);
                    break;
                }
            }
        }
    }

    disable_raw_mode().context("disable raw mode")?;
    execute!(io::stdout(), terminal::LeaveAlternateScreen).context("leave alternate screen")?;
    result
}

fn process_internal_events<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    rx: &Receiver<InternalEvent>,
) {
    while let Ok(event) = rx.try_recv() {
        match event {
            InternalEvent::ClearStatus { token } if token == view_data.status_token => {
                state.dispatch(AppCommand::ClearStatus);
            }
            InternalEvent::ClearStatus { .. } => {}
            InternalEvent::Refresh => refresh_page(state, runtime, view_data),
            InternalEvent::CommandSent { request } => {
                tracing::debug!(item = %request.item, command = %request.command, "command delivered");
                refresh_page(state, runtime, view_data);
            }
            InternalEvent::CommandFailed { request, error } => {
                tracing::warn!(item = %request.item, command = %request.command, "command failed: {error}");
                emit_status(
                    state,
                    view_data,
                    tx,
                    format!("{} not sent to {}", request.command, request.item),
                );
            }
        }
    }
}

fn schedule_status_clear(internal_tx: &Sender<InternalEvent>, token: u64) {
    let sender = internal_tx.clone();
    thread::spawn(move || {
        thread::sleep(STATUS_CLEAR_AFTER);
        let _ = sender.send(InternalEvent::ClearStatus { token });
    });
}

fn emit_status(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    message: impl Into<String>,
) {
    state.dispatch(AppCommand::SetStatus(message.into()));
    view_data.status_token = view_data.status_token.saturating_add(1);
    schedule_status_clear(internal_tx, view_data.status_token);
}

/// Dispatches `command` and turns the resulting events into follow-up work.
fn dispatch_and_follow(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    command: AppCommand,
) {
    for event in state.dispatch(command) {
        match event {
            AppEvent::RefreshRequested => {
                let _ = internal_tx.send(InternalEvent::Refresh);
            }
            AppEvent::StatusUpdated(_) => {
                view_data.status_token = view_data.status_token.saturating_add(1);
                schedule_status_clear(internal_tx, view_data.status_token);
            }
            AppEvent::PageChanged(page) => {
                tracing::debug!(%page, "page changed");
            }
            _ => {}
        }
    }
}

fn refresh_page<R: AppRuntime>(state: &mut AppState, runtime: &mut R, view_data: &mut ViewData) {
    let page = state.current_page.clone();
    match runtime.load_page(&page) {
        Ok(page) => {
            state.dispatch(AppCommand::PageLoaded(page));
            view_data.rows = rows_for(&state.widgets, runtime.settings());
            view_data.last_refresh = Some(OffsetDateTime::now_utc());
        }
        Err(error) => report_load_failure(state, &page, error),
    }
}

fn report_load_failure(state: &mut AppState, page: &PageId, error: anyhow::Error) {
    let failure = LoadFailure::classify(&error);
    match &failure {
        LoadFailure::Certificate(untrusted) => {
            tracing::warn!(host = %untrusted.host, "untrusted certificate: {}", untrusted.detail);
        }
        LoadFailure::Other(description) => {
            tracing::warn!(%page, "page load failed: {description}");
        }
    }
    state.dispatch(failure.into_command());
}

fn handle_key_event<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    certificates: &CertificatePolicy,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    if key.kind == KeyEventKind::Release {
        return false;
    }
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return true;
    }

    if state.alerts.certificate.is_shown() {
        handle_certificate_key(state, view_data, certificates, internal_tx, key);
        return false;
    }

    if state.alerts.error.is_shown() {
        if matches!(
            key.code,
            KeyCode::Enter | KeyCode::Esc | KeyCode::Char('r')
        ) {
            tracing::info!("reload after alert");
            dispatch_and_follow(state, view_data, internal_tx, AppCommand::DismissError);
        }
        return false;
    }

    if view_data.help_visible {
        if matches!(key.code, KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q')) {
            view_data.help_visible = false;
        }
        return false;
    }

    match key.code {
        KeyCode::Char('q') => return true,
        KeyCode::Up | KeyCode::Char('k') => {
            dispatch_and_follow(state, view_data, internal_tx, AppCommand::SelectPrev);
        }
        KeyCode::Down | KeyCode::Char('j') => {
            dispatch_and_follow(state, view_data, internal_tx, AppCommand::SelectNext);
        }
        KeyCode::Enter | KeyCode::Char(' ') => {
            activate_selected(state, runtime, view_data, internal_tx);
        }
        KeyCode::Right | KeyCode::Char('l') | KeyCode::Char('+') => {
            press_selected(state, runtime, internal_tx, RowAction::Increase);
        }
        KeyCode::Left | KeyCode::Char('h') | KeyCode::Char('-') => {
            press_selected(state, runtime, internal_tx, RowAction::Decrease);
        }
        KeyCode::Char('u') => {
            press_selected(state, runtime, internal_tx, RowAction::Up);
        }
        KeyCode::Char('s') => {
            press_selected(state, runtime, internal_tx, RowAction::Stop);
        }
        KeyCode::Char('d') => {
            press_selected(state, runtime, internal_tx, RowAction::Down);
        }
        KeyCode::Char('r') => {
            dispatch_and_follow(state, view_data, internal_tx, AppCommand::Refresh);
        }
        KeyCode::Esc | KeyCode::Backspace => {
            dispatch_and_follow(state, view_data, internal_tx, AppCommand::Back);
        }
        KeyCode::Char('?') => view_data.help_visible = true,
        _ => {}
    }
    false
}

fn press_selected<R: AppRuntime>(
    state: &AppState,
    runtime: &mut R,
    internal_tx: &Sender<InternalEvent>,
    action: RowAction,
) -> bool {
    let Some(widget) = state.selected_widget() else {
        return false;
    };
    let mut sink = RuntimeSink {
        runtime,
        tx: internal_tx,
    };
    press(widget, action, &mut sink)
}

fn activate_selected<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    if press_selected(state, runtime, internal_tx, RowAction::Activate) {
        return;
    }
    let linked = state
        .selected_widget()
        .and_then(|widget| widget.linked_page.as_ref())
        .map(|linked| linked.id.clone());
    if let Some(page) = linked {
        dispatch_and_follow(state, view_data, internal_tx, AppCommand::OpenPage(page));
    }
}

fn handle_certificate_key(
    state: &mut AppState,
    view_data: &mut ViewData,
    certificates: &CertificatePolicy,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let choices = CertificateDecision::ALL.len();
    match key.code {
        KeyCode::Left | KeyCode::Up | KeyCode::BackTab | KeyCode::Char('h') => {
            view_data.certificate_cursor = (view_data.certificate_cursor + choices - 1) % choices;
        }
        KeyCode::Right | KeyCode::Down | KeyCode::Tab | KeyCode::Char('l') => {
            view_data.certificate_cursor = (view_data.certificate_cursor + 1) % choices;
        }
        KeyCode::Char(digit @ '1'..='3') => {
            let index = digit as usize - '1' as usize;
            resolve_certificate(
                state,
                view_data,
                certificates,
                internal_tx,
                CertificateDecision::ALL[index],
            );
        }
        KeyCode::Enter => {
            let decision = CertificateDecision::ALL[view_data.certificate_cursor % choices];
            resolve_certificate(state, view_data, certificates, internal_tx, decision);
        }
        _ => {}
    }
}

fn resolve_certificate(
    state: &mut AppState,
    view_data: &mut ViewData,
    certificates: &CertificatePolicy,
    internal_tx: &Sender<InternalEvent>,
    decision: CertificateDecision,
) {
    if let Err(error) = certificates.record(decision) {
        tracing::warn!("record certificate decision: {error:#}");
        emit_status(state, view_data, internal_tx, "could not save trusted host");
    }
    tracing::info!(decision = decision.as_str(), "certificate prompt answered");
    dispatch_and_follow(
        state,
        view_data,
        internal_tx,
        AppCommand::ResolveCertificate(decision),
    );
    view_data.certificate_cursor = 0;
}

fn render(frame: &mut ratatui::Frame<'_>, state: &AppState, view_data: &ViewData) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(3),
        ])
        .split(frame.area());

    let breadcrumb = Paragraph::new(breadcrumb_text(state))
        .style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .block(Block::default().title("habwatch").borders(Borders::ALL));
    frame.render_widget(breadcrumb, layout[0]);

    render_rows(frame, layout[1], state, view_data);

    let status = Paragraph::new(status_text(state, view_data))
        .style(Style::default().fg(Color::Yellow))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(status, layout[2]);

    if view_data.help_visible {
        let area = centered_rect(60, 70, frame.area());
        frame.render_widget(Clear, area);
        let help = Paragraph::new(help_overlay_text())
            .block(Block::default().title("help").borders(Borders::ALL));
        frame.render_widget(help, area);
    }

    if let Some(description) = state.alerts.error.description() {
        let area = centered_rect(70, 30, frame.area());
        frame.render_widget(Clear, area);
        let alert = Paragraph::new(format!("{description}\n\n[enter] reload"))
            .style(Style::default().fg(Color::Red))
            .wrap(Wrap { trim: true })
            .block(Block::default().title("error").borders(Borders::ALL));
        frame.render_widget(alert, area);
    }

    if let Some(description) = state.alerts.certificate.description() {
        let area = centered_rect(70, 35, frame.area());
        frame.render_widget(Clear, area);
        let prompt = Paragraph::new(certificate_prompt_lines(
            description,
            view_data.certificate_cursor,
        ))
        .wrap(Wrap { trim: true })
        .block(
            Block::default()
                .title("untrusted certificate")
                .borders(Borders::ALL),
        );
        frame.render_widget(prompt, area);
    }
}

fn render_rows(frame: &mut ratatui::Frame<'_>, area: Rect, state: &AppState, view_data: &ViewData) {
    let mut lines = Vec::new();
    let mut selected_span = (0usize, 0usize);
    for (index, (widget, row)) in state.widgets.iter().zip(&view_data.rows).enumerate() {
        let selected = index == state.selected;
        let row_lines = rows::row_lines(widget, row, selected);
        if selected {
            selected_span = (lines.len(), lines.len() + row_lines.len());
        }
        lines.extend(row_lines);
    }
    if lines.is_empty() {
        lines.push(Line::from("  (empty page)"));
    }

    let visible = usize::from(area.height.saturating_sub(2));
    let offset = scroll_offset(selected_span, visible);
    let body = Paragraph::new(lines)
        .scroll((u16::try_from(offset).unwrap_or(u16::MAX), 0))
        .block(Block::default().borders(Borders::ALL).title(state.title.clone()));
    frame.render_widget(body, area);
}

/// First visible line so the selected row stays on screen.
fn scroll_offset((start, end): (usize, usize), visible: usize) -> usize {
    if visible == 0 || end <= visible {
        return 0;
    }
    end.saturating_sub(visible).min(start)
}

fn breadcrumb_text(state: &AppState) -> String {
    let mut crumbs = vec![state.sitemap.clone()];
    crumbs.extend(
        state
            .history
            .iter()
            .chain(std::iter::once(&state.current_page))
            .filter(|page| page.as_str() != state.sitemap)
            .map(|page| page.to_string()),
    );
    format!("{}  ›  {}", crumbs.join(" / "), state.title)
}

fn status_text(state: &AppState, view_data: &ViewData) -> String {
    if let Some(status) = &state.status_line {
        return status.clone();
    }
    let updated = view_data
        .last_refresh
        .and_then(|at| {
            at.format(format_description!("[hour]:[minute]:[second]"))
                .ok()
        })
        .map(|at| format!("updated {at} UTC  "))
        .unwrap_or_default();
    format!("{updated}↑↓ move  enter act  ←→ adjust  u/s/d shutter  r reload  ? help  q quit")
}

fn certificate_prompt_lines(description: &str, cursor: usize) -> Vec<Line<'static>> {
    let buttons = CertificateDecision::ALL
        .iter()
        .enumerate()
        .flat_map(|(index, decision)| {
            let label = format!(" {} {} ", index + 1, decision.label());
            let style = if index == cursor {
                Style::default()
                    .fg(Color::Black)
                    .bg(Color::Yellow)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::Yellow)
            };
            [Span::styled(label, style), Span::raw("  ")]
        })
        .collect::<Vec<_>>();

    vec![
        Line::from(description.to_owned()),
        Line::from(""),
        Line::from("Trust this server anyway?"),
        Line::from(""),
        Line::from(buttons),
    ]
}

fn help_overlay_text() -> String {
    [
        "↑/k ↓/j      move selection",
        "enter/space  toggle, cycle, or open linked page",
        "→/l/+        increase",
        "←/h/-        decrease",
        "u s d        rollershutter up, stop, down",
        "r            reload page",
        "esc/bksp     previous page",
        "?            close help",
        "q            quit",
    ]
    .join("\n")
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
