//! Wire types exchanged with the generation backend.
//!
//! The backend accepts a JSON body on `POST /generate` and answers with the
//! elaborated prompt. Tone and format are closed sets on our side; the backend
//! only ever sees their lower-cased labels.

use serde::{Deserialize, Serialize};

/// Tone the elaborated prompt should be written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tone {
    #[default]
    Neutral,
    Professional,
    Casual,
    Humorous,
}

impl Tone {
    pub const ALL: [Tone; 4] = [
        Tone::Neutral,
        Tone::Professional,
        Tone::Casual,
        Tone::Humorous,
    ];

    /// Label shown in the selector.
    pub fn label(self) -> &'static str {
        match self {
            Tone::Neutral => "Neutral",
            Tone::Professional => "Professional",
            Tone::Casual => "Casual",
            Tone::Humorous => "Humorous",
        }
    }

    /// Value sent over the wire.
    pub fn wire_value(self) -> String {
        self.label().to_lowercase()
    }

    /// Parse a label case-insensitively (config files, CLI flags).
    pub fn from_label(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.label().eq_ignore_ascii_case(s.trim()))
    }

    pub fn next(self) -> Self {
        cycle(&Self::ALL, self, 1)
    }

    pub fn prev(self) -> Self {
        cycle(&Self::ALL, self, Self::ALL.len() - 1)
    }
}

/// Output format requested from the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    #[default]
    Text,
    Markdown,
    BulletedList,
    Json,
}

impl Format {
    pub const ALL: [Format; 4] = [
        Format::Text,
        Format::Markdown,
        Format::BulletedList,
        Format::Json,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Format::Text => "Text",
            Format::Markdown => "Markdown",
            Format::BulletedList => "Bulleted List",
            Format::Json => "JSON",
        }
    }

    pub fn wire_value(self) -> String {
        self.label().to_lowercase()
    }

    pub fn from_label(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|f| f.label().eq_ignore_ascii_case(s.trim()))
    }

    pub fn next(self) -> Self {
        cycle(&Self::ALL, self, 1)
    }

    pub fn prev(self) -> Self {
        cycle(&Self::ALL, self, Self::ALL.len() - 1)
    }
}

fn cycle<T: Copy + PartialEq>(all: &[T], current: T, step: usize) -> T {
    let idx = all.iter().position(|v| *v == current).unwrap_or(0);
    all[(idx + step) % all.len()]
}

/// Body of `POST /generate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerateRequest {
    pub user_prompt: String,
    pub tone: String,
    pub format: String,
    pub persona: String,
}

impl GenerateRequest {
    pub fn new(user_prompt: &str, tone: Tone, format: Format, persona: &str) -> Self {
        Self {
            user_prompt: user_prompt.to_string(),
            tone: tone.wire_value(),
            format: format.wire_value(),
            persona: persona.to_string(),
        }
    }
}

/// Body returned by `POST /generate`.
///
/// Extra fields such as `status` are ignored. A backend that fails replies
/// with `{"status": "error", "message": ...}` under HTTP 200; the client
/// checks for that shape with [`ResponseEnvelope`] first.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GenerateResponse {
    pub original_prompt: String,
    pub elaborated_prompt: String,
    pub token_count: u64,
}

/// Loose view of a response body used to spot backend-declared errors before
/// committing to [`GenerateResponse`].
#[derive(Debug, Deserialize)]
pub(crate) struct ResponseEnvelope {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Body returned by `GET /`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HealthStatus {
    pub message: String,
}
