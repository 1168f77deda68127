//! Prompt submission form: editable fields plus the submit/apply state machine.

use tracing::{debug, info, warn};

use crate::client::BackendError;
use crate::models::{Format, GenerateRequest, GenerateResponse, Tone};

/// Shown when the prompt is empty or whitespace-only.
pub const VALIDATION_ERROR_MESSAGE: &str = "Please enter a valid prompt.";

/// Shown for every failed exchange with the backend.
pub const BACKEND_ERROR_MESSAGE: &str = "Failed to connect to backend.";

pub const DEFAULT_PERSONA: &str = "a helpful assistant";

/// Which field has keyboard focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FormField {
    #[default]
    Prompt,
    Tone,
    Format,
    Persona,
    SubmitButton,
}

impl FormField {
    pub fn next(self) -> Self {
        match self {
            Self::Prompt => Self::Tone,
            Self::Tone => Self::Format,
            Self::Format => Self::Persona,
            Self::Persona => Self::SubmitButton,
            Self::SubmitButton => Self::Prompt,
        }
    }

    pub fn prev(self) -> Self {
        match self {
            Self::Prompt => Self::SubmitButton,
            Self::Tone => Self::Prompt,
            Self::Format => Self::Tone,
            Self::Persona => Self::Format,
            Self::SubmitButton => Self::Persona,
        }
    }
}

/// A text buffer with a cursor measured in characters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextInput {
    value: String,
    cursor: usize,
}

impl TextInput {
    /// Create an input holding `value` with the cursor at the end.
    pub fn new(value: &str) -> Self {
        Self {
            value: value.to_string(),
            cursor: value.chars().count(),
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// Cursor position in characters.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    fn char_len(&self) -> usize {
        self.value.chars().count()
    }

    fn byte_index(&self, char_idx: usize) -> usize {
        self.value
            .char_indices()
            .nth(char_idx)
            .map(|(i, _)| i)
            .unwrap_or(self.value.len())
    }

    pub fn insert_char(&mut self, c: char) {
        let idx = self.byte_index(self.cursor);
        self.value.insert(idx, c);
        self.cursor += 1;
    }

    /// Backspace.
    pub fn delete_char_before(&mut self) {
        if self.cursor == 0 {
            return;
        }
        let idx = self.byte_index(self.cursor - 1);
        self.value.remove(idx);
        self.cursor -= 1;
    }

    /// Delete key.
    pub fn delete_char_at(&mut self) {
        if self.cursor < self.char_len() {
            let idx = self.byte_index(self.cursor);
            self.value.remove(idx);
        }
    }

    pub fn cursor_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn cursor_right(&mut self) {
        if self.cursor < self.char_len() {
            self.cursor += 1;
        }
    }

    pub fn cursor_home(&mut self) {
        self.cursor = 0;
    }

    pub fn cursor_end(&mut self) {
        self.cursor = self.char_len();
    }

    /// Text before and after the cursor, for rendering.
    pub fn split_at_cursor(&self) -> (&str, &str) {
        self.value.split_at(self.byte_index(self.cursor))
    }
}

/// What went wrong with a submission, as far as the user is concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormErrorKind {
    Validation,
    Unreachable,
    Status(u16),
    Decode,
    Rejected(String),
}

/// An error overlay: a structured kind plus the message the user sees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormError {
    pub kind: FormErrorKind,
    pub message: String,
}

impl FormError {
    pub fn validation() -> Self {
        Self {
            kind: FormErrorKind::Validation,
            message: VALIDATION_ERROR_MESSAGE.to_string(),
        }
    }

    /// Secondary line distinguishing failure causes. None for validation.
    pub fn detail(&self) -> Option<String> {
        match &self.kind {
            FormErrorKind::Validation => None,
            FormErrorKind::Unreachable => Some("The backend did not answer.".to_string()),
            FormErrorKind::Status(code) => Some(format!("The backend answered HTTP {}.", code)),
            FormErrorKind::Decode => Some("The backend reply was not understood.".to_string()),
            FormErrorKind::Rejected(msg) => Some(format!("The backend reported: {}", msg)),
        }
    }
}

impl From<BackendError> for FormError {
    fn from(err: BackendError) -> Self {
        let kind = match err {
            BackendError::Unreachable { .. } => FormErrorKind::Unreachable,
            BackendError::Status { status } => FormErrorKind::Status(status),
            BackendError::Decode { .. } => FormErrorKind::Decode,
            BackendError::Rejected { message } => FormErrorKind::Rejected(message),
        };
        Self {
            kind,
            message: BACKEND_ERROR_MESSAGE.to_string(),
        }
    }
}

/// A validated request ready to be sent, tagged with its token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub token: u64,
    pub request: GenerateRequest,
}

/// Whether a completed exchange changed the form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    Stale,
}

/// Transient state of the prompt form.
#[derive(Debug, Clone)]
pub struct FormState {
    pub focus: FormField,
    pub prompt: TextInput,
    pub tone: Tone,
    pub format: Format,
    pub persona: TextInput,
    loading: bool,
    result: Option<GenerateResponse>,
    error: Option<FormError>,
    /// Token of the most recent valid submission. Zero means none yet.
    latest_token: u64,
}

impl Default for FormState {
    fn default() -> Self {
        Self::new(Tone::default(), Format::default(), DEFAULT_PERSONA)
    }
}

impl FormState {
    pub fn new(tone: Tone, format: Format, persona: &str) -> Self {
        Self {
            focus: FormField::default(),
            prompt: TextInput::default(),
            tone,
            format,
            persona: TextInput::new(persona),
            loading: false,
            result: None,
            error: None,
            latest_token: 0,
        }
    }

    pub fn loading(&self) -> bool {
        self.loading
    }

    pub fn result(&self) -> Option<&GenerateResponse> {
        self.result.as_ref()
    }

    pub fn error(&self) -> Option<&FormError> {
        self.error.as_ref()
    }

    pub fn latest_token(&self) -> u64 {
        self.latest_token
    }

    pub fn dismiss_error(&mut self) {
        self.error = None;
    }

    /// The text input under focus, if any.
    pub fn focused_input(&mut self) -> Option<&mut TextInput> {
        match self.focus {
            FormField::Prompt => Some(&mut self.prompt),
            FormField::Persona => Some(&mut self.persona),
            _ => None,
        }
    }

    pub fn focus_next(&mut self) {
        self.focus = self.focus.next();
    }

    pub fn focus_prev(&mut self) {
        self.focus = self.focus.prev();
    }

    /// Step the focused selector forward (`forward = true`) or back.
    pub fn cycle_selector(&mut self, forward: bool) {
        match (self.focus, forward) {
            (FormField::Tone, true) => self.tone = self.tone.next(),
            (FormField::Tone, false) => self.tone = self.tone.prev(),
            (FormField::Format, true) => self.format = self.format.next(),
            (FormField::Format, false) => self.format = self.format.prev(),
            _ => {}
        }
    }

    /// Validate the current fields and start a submission.
    ///
    /// Returns `None` when the prompt is blank; the validation error is set
    /// and nothing should be sent. Otherwise prior result and error are
    /// cleared, `loading` is raised, and a fresh token is issued.
    pub fn submit(&mut self) -> Option<Submission> {
        if self.prompt.value().trim().is_empty() {
            debug!("submit_rejected_empty_prompt");
            self.error = Some(FormError::validation());
            return None;
        }

        self.error = None;
        self.result = None;
        self.loading = true;
        self.latest_token += 1;

        let request = GenerateRequest::new(
            self.prompt.value(),
            self.tone,
            self.format,
            self.persona.value(),
        );
        info!(
            token = self.latest_token,
            tone = %request.tone,
            format = %request.format,
            "submit_dispatched"
        );

        Some(Submission {
            token: self.latest_token,
            request,
        })
    }

    /// Record the outcome of the exchange started with `token`.
    ///
    /// Outcomes for anything but the latest token are dropped.
    pub fn apply(
        &mut self,
        token: u64,
        outcome: Result<GenerateResponse, BackendError>,
    ) -> ApplyOutcome {
        if token != self.latest_token {
            debug!(token, latest = self.latest_token, "stale_response_dropped");
            return ApplyOutcome::Stale;
        }

        self.loading = false;
        match outcome {
            Ok(response) => {
                info!(token, token_count = response.token_count, "response_applied");
                // A blank resubmit while loading may have raised a validation error.
                self.error = None;
                self.result = Some(response);
            }
            Err(err) => {
                warn!(token, error = %err, "response_failed");
                self.error = Some(err.into());
            }
        }
        ApplyOutcome::Applied
    }
}
