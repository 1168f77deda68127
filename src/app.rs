//! Application state and core logic.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::text::Line;
use ratatui::widgets::{Paragraph, Wrap};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::client::{Backend, BackendError};
use crate::config::ConfigLoadStatus;
use crate::form::{ApplyOutcome, FormField, FormState};
use crate::models::{GenerateResponse, HealthStatus};

/// Reachability of the backend as last observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendHealth {
    Unknown,
    Online(String),
    Offline(String),
}

/// Work finished on the runtime, delivered back to the UI thread.
#[derive(Debug)]
pub enum Completion {
    Generate {
        token: u64,
        outcome: Result<GenerateResponse, BackendError>,
    },
    Health(Result<HealthStatus, BackendError>),
}

/// Facts about this run shown in the status panel.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub session_id: Option<String>,
    pub log_directory: Option<PathBuf>,
    pub logging_error: Option<String>,
    pub config_path: PathBuf,
    pub config_status: ConfigLoadStatus,
}

/// Main application state.
pub struct App {
    pub form: FormState,
    backend: Arc<dyn Backend>,
    runtime: Handle,
    completion_tx: Sender<Completion>,
    completion_rx: Receiver<Completion>,
    /// Task for the latest submission, aborted when a newer one starts.
    in_flight: Option<JoinHandle<()>>,
    pub health: BackendHealth,
    pub session: SessionInfo,
    /// Scroll offset of the elaborated prompt region.
    pub result_scroll: u16,
    /// Inner size of the elaborated prompt region, set while drawing.
    pub result_pane_height: u16,
    pub result_pane_width: u16,
    pub should_quit: bool,
}

impl App {
    pub fn new(
        form: FormState,
        backend: Arc<dyn Backend>,
        runtime: Handle,
        session: SessionInfo,
    ) -> Self {
        let (completion_tx, completion_rx) = mpsc::channel();
        Self {
            form,
            backend,
            runtime,
            completion_tx,
            completion_rx,
            in_flight: None,
            health: BackendHealth::Unknown,
            session,
            result_scroll: 0,
            result_pane_height: 0,
            result_pane_width: 0,
            should_quit: false,
        }
    }

    pub fn backend_label(&self) -> String {
        self.backend.describe()
    }

    /// Probe the backend in the background; the answer arrives via polling.
    pub fn check_health(&self) {
        let backend = Arc::clone(&self.backend);
        let tx = self.completion_tx.clone();
        self.runtime.spawn(async move {
            let outcome = backend.health().await;
            let _ = tx.send(Completion::Health(outcome));
        });
    }

    /// Validate the form and, if valid, send exactly one request.
    pub fn submit(&mut self) {
        let Some(submission) = self.form.submit() else {
            return;
        };

        if let Some(previous) = self.in_flight.take() {
            previous.abort();
            debug!(token = submission.token, "previous_request_aborted");
        }
        self.result_scroll = 0;

        let backend = Arc::clone(&self.backend);
        let tx = self.completion_tx.clone();
        let handle = self.runtime.spawn(async move {
            let outcome = backend.generate(&submission.request).await;
            let _ = tx.send(Completion::Generate {
                token: submission.token,
                outcome,
            });
        });
        self.in_flight = Some(handle);
    }

    /// Drain finished work and fold it into the form.
    pub fn poll_completions(&mut self) {
        let mut completions = Vec::new();
        loop {
            match self.completion_rx.try_recv() {
                Ok(c) => completions.push(c),
                // The app holds a sender itself, so the channel never disconnects.
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }

        for completion in completions {
            match completion {
                Completion::Generate { token, outcome } => {
                    if self.form.apply(token, outcome) == ApplyOutcome::Applied {
                        self.in_flight = None;
                        self.result_scroll = 0;
                    }
                }
                Completion::Health(Ok(status)) => {
                    info!(message = %status.message, "backend_online");
                    self.health = BackendHealth::Online(status.message);
                }
                Completion::Health(Err(e)) => {
                    warn!(error = %e, "backend_offline");
                    self.health = BackendHealth::Offline(e.to_string());
                }
            }
        }
    }

    /// Abort outstanding work before exit.
    pub fn shutdown(&mut self) {
        if let Some(handle) = self.in_flight.take() {
            handle.abort();
            info!("request_aborted_on_exit");
        }
    }

    pub fn visual_line_count(&self) -> u16 {
        if self.result_pane_width == 0 {
            return 0;
        }
        let Some(result) = self.form.result() else {
            return 0;
        };
        let content: Vec<Line> = result.elaborated_prompt.split('\n').map(Line::raw).collect();
        let paragraph = Paragraph::new(content).wrap(Wrap { trim: false });
        paragraph.line_count(self.result_pane_width) as u16
    }

    pub fn max_scroll(&self) -> u16 {
        self.visual_line_count()
            .saturating_sub(self.result_pane_height)
    }

    pub fn scroll_up(&mut self, amount: u16) {
        self.result_scroll = self.result_scroll.saturating_sub(amount);
    }

    pub fn scroll_down(&mut self, amount: u16) {
        let max = self.max_scroll();
        self.result_scroll = (self.result_scroll + amount).min(max);
    }

    /// Handle a key press.
    pub fn handle_key(&mut self, key: KeyEvent) {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

        match key.code {
            KeyCode::Char('c') | KeyCode::Char('q') if ctrl => {
                self.should_quit = true;
                return;
            }
            KeyCode::Char('s') if ctrl => {
                self.submit();
                return;
            }
            KeyCode::Esc => {
                self.form.dismiss_error();
                return;
            }
            KeyCode::Tab => {
                if key.modifiers.contains(KeyModifiers::SHIFT) {
                    self.form.focus_prev();
                } else {
                    self.form.focus_next();
                }
                return;
            }
            KeyCode::BackTab => {
                self.form.focus_prev();
                return;
            }
            KeyCode::PageUp => {
                self.scroll_up(self.result_pane_height.max(1));
                return;
            }
            KeyCode::PageDown => {
                self.scroll_down(self.result_pane_height.max(1));
                return;
            }
            _ => {}
        }

        match self.form.focus {
            FormField::Prompt | FormField::Persona => self.handle_text_key(key),
            FormField::Tone | FormField::Format => match key.code {
                KeyCode::Left | KeyCode::Up => self.form.cycle_selector(false),
                KeyCode::Right | KeyCode::Down => self.form.cycle_selector(true),
                KeyCode::Enter => self.form.focus_next(),
                _ => {}
            },
            FormField::SubmitButton => match key.code {
                KeyCode::Enter => self.submit(),
                KeyCode::Up => self.form.focus_prev(),
                KeyCode::Down => self.form.focus_next(),
                _ => {}
            },
        }
    }

    fn handle_text_key(&mut self, key: KeyEvent) {
        let multiline = self.form.focus == FormField::Prompt;
        if key.code == KeyCode::Enter && !multiline {
            self.form.focus_next();
            return;
        }

        let Some(input) = self.form.focused_input() else {
            return;
        };
        match key.code {
            KeyCode::Enter => input.insert_char('\n'),
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                input.insert_char(c)
            }
            KeyCode::Backspace => input.delete_char_before(),
            KeyCode::Delete => input.delete_char_at(),
            KeyCode::Left => input.cursor_left(),
            KeyCode::Right => input.cursor_right(),
            KeyCode::Home => input.cursor_home(),
            KeyCode::End => input.cursor_end(),
            _ => {}
        }
    }
}
