mod app;
mod client;
mod config;
mod form;
mod logging;
mod models;
mod ui;

use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use clap::Parser;
use crossterm::event::{
    DisableMouseCapture, EnableMouseCapture, Event, KeyEventKind, MouseEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::{DefaultTerminal, Terminal};
use tracing::{debug, info};

use crate::app::{App, SessionInfo};
use crate::client::{Backend, HttpBackend};
use crate::config::CliOverrides;
use crate::form::{FormState, TextInput};
use crate::models::{Format, Tone};

/// Turn a short prompt into a detailed one using a generation backend.
#[derive(Debug, Parser)]
#[command(name = "prompt-optimizer", version, about)]
struct Cli {
    /// Backend origin, e.g. http://127.0.0.1:8000
    #[arg(long, value_name = "URL")]
    backend_url: Option<String>,

    /// Initial tone: Neutral, Professional, Casual or Humorous
    #[arg(long, value_parser = parse_tone)]
    tone: Option<String>,

    /// Initial format: Text, Markdown, "Bulleted List" or JSON
    #[arg(long, value_parser = parse_format)]
    format: Option<String>,

    /// Initial AI persona
    #[arg(long, value_name = "TEXT")]
    persona: Option<String>,

    /// Submit this prompt once, print the result, and exit
    #[arg(long, value_name = "TEXT", conflicts_with = "check")]
    prompt: Option<String>,

    /// Check that the backend is reachable and exit
    #[arg(long)]
    check: bool,
}

impl Cli {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            backend_url: self.backend_url.clone(),
            tone: self.tone.clone(),
            format: self.format.clone(),
            persona: self.persona.clone(),
        }
    }
}

fn parse_tone(s: &str) -> Result<String, String> {
    Tone::from_label(s)
        .map(|t| t.label().to_string())
        .ok_or_else(|| format!("unknown tone '{}'", s))
}

fn parse_format(s: &str) -> Result<String, String> {
    Format::from_label(s)
        .map(|f| f.label().to_string())
        .ok_or_else(|| format!("unknown format '{}'", s))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let start_time = Instant::now();

    let loaded_config = config::load_config();
    let config = loaded_config.config.clone().with_cli_overrides(&cli.overrides());

    // Initialize logging before anything talks to the network
    let (session_id, log_directory, logging_error, _guard) =
        match logging::init(&config.logging.level) {
            Ok(ctx) => (
                Some(ctx.session_id),
                Some(ctx.log_directory),
                None,
                Some(ctx._guard),
            ),
            Err(e) => {
                eprintln!("Warning: Failed to initialize logging: {}", e);
                (None, None, Some(e.message), None)
            }
        };
    if let Some(ref dir) = log_directory {
        logging::cleanup_old_logs(dir);
    }

    debug!(
        config_path = %loaded_config.config_path.display(),
        status = ?loaded_config.status,
        backend_url = %config.backend.url,
        "config_loaded"
    );

    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    let backend: Arc<dyn Backend> = Arc::new(HttpBackend::new(&config.backend.url));
    let form = FormState::new(config.form.tone(), config.form.format(), &config.form.persona);

    if cli.check {
        return runtime.block_on(run_check(backend.as_ref()));
    }
    if let Some(prompt) = cli.prompt {
        return runtime.block_on(run_once(backend.as_ref(), form, &prompt));
    }

    let session = SessionInfo {
        session_id: session_id.clone(),
        log_directory,
        logging_error,
        config_path: loaded_config.config_path,
        config_status: loaded_config.status,
    };
    let app = App::new(form, backend, runtime.handle().clone(), session);

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let terminal = Terminal::new(ratatui::backend::CrosstermBackend::new(stdout))?;

    let result = run_app(terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(io::stdout(), LeaveAlternateScreen, DisableMouseCapture)?;

    if let Some(sid) = session_id {
        info!(
            session_id = %sid,
            duration_secs = start_time.elapsed().as_secs_f64(),
            "session_end"
        );
    }

    result
}

/// Probe `GET /` on the backend and report.
async fn run_check(backend: &dyn Backend) -> Result<()> {
    let status = backend
        .health()
        .await
        .with_context(|| format!("backend at {} is not reachable", backend.describe()))?;
    println!("{}: {}", backend.describe(), status.message);
    Ok(())
}

/// Submit one prompt through the same form state the TUI uses.
async fn run_once(backend: &dyn Backend, mut form: FormState, prompt: &str) -> Result<()> {
    form.prompt = TextInput::new(prompt);
    let Some(submission) = form.submit() else {
        bail!(form::VALIDATION_ERROR_MESSAGE);
    };

    let outcome = backend.generate(&submission.request).await;
    form.apply(submission.token, outcome);

    if let Some(err) = form.error() {
        match err.detail() {
            Some(detail) => bail!("{} {}", err.message, detail),
            None => bail!("{}", err.message),
        }
    }

    if let Some(result) = form.result() {
        println!("Original Prompt:\n{}\n", result.original_prompt);
        println!("Elaborated Prompt:\n{}\n", result.elaborated_prompt);
        println!("Token Count: {}", ui::format_with_thousands(result.token_count));
    }
    Ok(())
}

fn run_app(mut terminal: DefaultTerminal, mut app: App) -> Result<()> {
    app.check_health();

    loop {
        app.poll_completions();

        terminal.draw(|f| ui::draw_ui(f, &mut app))?;

        // Short poll timeout so completed requests show up promptly
        if crossterm::event::poll(Duration::from_millis(50))? {
            match crossterm::event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => app.handle_key(key),
                Event::Mouse(mouse) => match mouse.kind {
                    MouseEventKind::ScrollUp => app.scroll_up(3),
                    MouseEventKind::ScrollDown => app.scroll_down(3),
                    _ => {}
                },
                _ => {}
            }
        }

        if app.should_quit {
            app.shutdown();
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::BackendError;
    use crate::models::{GenerateRequest, GenerateResponse, HealthStatus};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct OneReply {
        reply: Result<GenerateResponse, BackendError>,
        calls: Mutex<Vec<GenerateRequest>>,
    }

    #[async_trait]
    impl Backend for OneReply {
        fn describe(&self) -> String {
            "http://test".to_string()
        }

        async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, BackendError> {
            self.calls.lock().unwrap().push(request.clone());
            self.reply.clone()
        }

        async fn health(&self) -> Result<HealthStatus, BackendError> {
            Err(BackendError::Unreachable {
                url: "http://test/".to_string(),
                message: "connection refused".to_string(),
            })
        }
    }

    fn backend(reply: Result<GenerateResponse, BackendError>) -> OneReply {
        OneReply {
            reply,
            calls: Mutex::new(Vec::new()),
        }
    }

    #[test]
    fn test_cli_parses_overrides() {
        let cli = Cli::try_parse_from([
            "prompt-optimizer",
            "--backend-url",
            "http://example:9",
            "--tone",
            "humorous",
            "--format",
            "bulleted list",
            "--persona",
            "a pirate",
        ])
        .unwrap();
        let overrides = cli.overrides();
        assert_eq!(overrides.backend_url.as_deref(), Some("http://example:9"));
        assert_eq!(overrides.tone.as_deref(), Some("Humorous"));
        assert_eq!(overrides.format.as_deref(), Some("Bulleted List"));
        assert_eq!(overrides.persona.as_deref(), Some("a pirate"));
    }

    #[test]
    fn test_cli_rejects_unknown_tone() {
        assert!(Cli::try_parse_from(["prompt-optimizer", "--tone", "angry"]).is_err());
    }

    #[test]
    fn test_cli_prompt_conflicts_with_check() {
        assert!(Cli::try_parse_from(["prompt-optimizer", "--prompt", "x", "--check"]).is_err());
    }

    #[tokio::test]
    async fn test_run_once_blank_prompt_fails_without_request() {
        let b = backend(Err(BackendError::Status { status: 500 }));
        let err = run_once(&b, FormState::default(), "  ").await.unwrap_err();
        assert_eq!(err.to_string(), form::VALIDATION_ERROR_MESSAGE);
        assert!(b.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_run_once_success() {
        let b = backend(Ok(GenerateResponse {
            original_prompt: "hi".to_string(),
            elaborated_prompt: "Say hi politely.".to_string(),
            token_count: 4,
        }));
        let form = FormState::new(Tone::Professional, Format::Json, "an editor");
        run_once(&b, form, "hi").await.unwrap();

        let calls = b.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].tone, "professional");
        assert_eq!(calls[0].format, "json");
        assert_eq!(calls[0].persona, "an editor");
    }

    #[tokio::test]
    async fn test_run_once_reports_generic_error() {
        let b = backend(Err(BackendError::Status { status: 500 }));
        let err = run_once(&b, FormState::default(), "hi").await.unwrap_err();
        assert!(err.to_string().starts_with(form::BACKEND_ERROR_MESSAGE));
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn test_run_check_unreachable() {
        let b = backend(Err(BackendError::Status { status: 500 }));
        let err = run_check(&b).await.unwrap_err();
        assert!(err.to_string().contains("http://test"));
    }
}
