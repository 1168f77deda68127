use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::form::DEFAULT_PERSONA;
use crate::models::{Format, Tone};

/// Status of config file loading
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigLoadStatus {
    /// Config loaded successfully from existing file
    Loaded,
    /// Created default config file (first run)
    Created,
    /// Error occurred during loading, using defaults.
    Error(String),
}

/// Backend connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub url: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8000".to_string(),
        }
    }
}

/// Initial values for the form selectors and persona
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FormConfig {
    pub tone: String,
    pub format: String,
    pub persona: String,
}

impl Default for FormConfig {
    fn default() -> Self {
        Self {
            tone: Tone::default().label().to_string(),
            format: Format::default().label().to_string(),
            persona: DEFAULT_PERSONA.to_string(),
        }
    }
}

impl FormConfig {
    /// Configured tone, falling back to the default for unknown names.
    pub fn tone(&self) -> Tone {
        Tone::from_label(&self.tone).unwrap_or_else(|| {
            warn!(tone = %self.tone, "unknown_tone_in_config");
            Tone::default()
        })
    }

    /// Configured format, falling back to the default for unknown names.
    pub fn format(&self) -> Format {
        Format::from_label(&self.format).unwrap_or_else(|| {
            warn!(format = %self.format, "unknown_format_in_config");
            Format::default()
        })
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub form: FormConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Values given on the command line. `None` leaves the loaded value alone.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub backend_url: Option<String>,
    pub tone: Option<String>,
    pub format: Option<String>,
    pub persona: Option<String>,
}

impl Config {
    /// Apply command-line overrides, the last layer of precedence.
    pub fn with_cli_overrides(mut self, overrides: &CliOverrides) -> Self {
        if let Some(url) = &overrides.backend_url {
            self.backend.url = url.clone();
        }
        if let Some(tone) = &overrides.tone {
            self.form.tone = tone.clone();
        }
        if let Some(format) = &overrides.format {
            self.form.format = format.clone();
        }
        if let Some(persona) = &overrides.persona {
            self.form.persona = persona.clone();
        }
        self
    }
}

/// Loaded configuration with metadata
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: Config,
    pub config_path: PathBuf,
    pub status: ConfigLoadStatus,
}

/// Get the platform-appropriate config directory
fn get_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("dev", "prompt-optimizer", "prompt-optimizer")
        .map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the full path to the config file
pub fn get_config_path() -> Option<PathBuf> {
    get_config_dir().map(|dir| dir.join("config.toml"))
}

/// Load configuration from file, environment, and defaults
pub fn load_config() -> LoadedConfig {
    let config_path = match get_config_path() {
        Some(path) => path,
        None => {
            warn!("Could not determine config directory, using defaults");
            return LoadedConfig {
                config: apply_env_overrides(Config::default()),
                config_path: PathBuf::from("config.toml"),
                status: ConfigLoadStatus::Error("Could not determine config directory".to_string()),
            };
        }
    };

    load_config_from(&config_path)
}

/// Load configuration rooted at an explicit path.
pub fn load_config_from(config_path: &Path) -> LoadedConfig {
    debug!("Config path: {:?}", config_path);

    let (config, status) = load_or_create_config(config_path);
    let config = apply_env_overrides(config);

    LoadedConfig {
        config,
        config_path: config_path.to_path_buf(),
        status,
    }
}

/// Load config from file, or create default if not exists
fn load_or_create_config(config_path: &Path) -> (Config, ConfigLoadStatus) {
    match fs::read_to_string(config_path) {
        Ok(contents) => match toml::from_str::<Config>(&contents) {
            Ok(config) => {
                info!("Loaded config from {:?}", config_path);
                (config, ConfigLoadStatus::Loaded)
            }
            Err(e) => {
                warn!(
                    "Config file malformed at {:?}: {}. Using defaults.",
                    config_path, e
                );
                (
                    Config::default(),
                    ConfigLoadStatus::Error(format!("Malformed TOML: {}", e)),
                )
            }
        },
        Err(e) if e.kind() == io::ErrorKind::NotFound => create_default_config(config_path),
        Err(e) => {
            warn!(
                "Error reading config at {:?}: {}. Using defaults.",
                config_path, e
            );
            (
                Config::default(),
                ConfigLoadStatus::Error(format!("Read error: {}", e)),
            )
        }
    }
}

/// Create the default config file
fn create_default_config(config_path: &Path) -> (Config, ConfigLoadStatus) {
    let config = Config::default();

    if let Some(parent) = config_path.parent()
        && let Err(e) = fs::create_dir_all(parent)
    {
        warn!(
            "Could not create config directory {:?}: {}. Continuing without file.",
            parent, e
        );
        return (
            config,
            ConfigLoadStatus::Error(format!("Could not create config directory: {}", e)),
        );
    }

    let toml_content = match toml::to_string_pretty(&config) {
        Ok(s) => s,
        Err(e) => {
            warn!("Could not serialize default config: {}", e);
            return (
                config,
                ConfigLoadStatus::Error(format!("Serialization error: {}", e)),
            );
        }
    };

    match fs::write(config_path, &toml_content) {
        Ok(()) => {
            info!("Created default config at {:?}", config_path);
            (config, ConfigLoadStatus::Created)
        }
        Err(e) => {
            warn!(
                "Could not write default config to {:?}: {}. Continuing without file.",
                config_path, e
            );
            (
                config,
                ConfigLoadStatus::Error(format!("Write error: {}", e)),
            )
        }
    }
}

/// Apply environment variable overrides to config
fn apply_env_overrides(mut config: Config) -> Config {
    if let Ok(url) = env::var("PROMPT_OPTIMIZER_BACKEND_URL") {
        debug!("Overriding backend.url from PROMPT_OPTIMIZER_BACKEND_URL");
        config.backend.url = url;
    }

    if let Ok(level) = env::var("PROMPT_OPTIMIZER_LOG") {
        debug!("Overriding logging.level from PROMPT_OPTIMIZER_LOG");
        config.logging.level = level;
    }

    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.backend.url, "http://127.0.0.1:8000");
        assert_eq!(config.form.tone, "Neutral");
        assert_eq!(config.form.format, "Text");
        assert_eq!(config.form.persona, "a helpful assistant");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_config_deserialization() {
        let toml_str = r#"
[backend]
url = "https://optimizer.internal:9000"

[form]
tone = "casual"
format = "Bulleted List"
persona = "a patient tutor"

[logging]
level = "debug"
"#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.backend.url, "https://optimizer.internal:9000");
        assert_eq!(config.form.tone(), Tone::Casual);
        assert_eq!(config.form.format(), Format::BulletedList);
        assert_eq!(config.form.persona, "a patient tutor");
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_config_partial_deserialization() {
        let toml_str = r#"
[backend]
url = "http://localhost:1234"
"#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.backend.url, "http://localhost:1234");
        assert_eq!(config.form.persona, "a helpful assistant");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let toml_str = r#"
[backend]
url = "http://localhost:1234"
unknown_key = "should be ignored"

[unknown_section]
foo = "bar"
"#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.backend.url, "http://localhost:1234");
    }

    #[test]
    fn test_unknown_selector_names_fall_back() {
        let toml_str = r#"
[form]
tone = "sarcastic"
format = "yaml"
"#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.form.tone(), Tone::Neutral);
        assert_eq!(config.form.format(), Format::Text);
    }

    #[test]
    fn test_cli_overrides_win() {
        let overrides = CliOverrides {
            backend_url: Some("http://cli:1".to_string()),
            tone: Some("Humorous".to_string()),
            format: None,
            persona: Some("a pirate".to_string()),
        };
        let config = Config::default().with_cli_overrides(&overrides);
        assert_eq!(config.backend.url, "http://cli:1");
        assert_eq!(config.form.tone(), Tone::Humorous);
        assert_eq!(config.form.format(), Format::Text);
        assert_eq!(config.form.persona, "a pirate");
    }

    #[test]
    fn test_missing_file_is_created_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let (config, status) = load_or_create_config(&path);
        assert_eq!(status, ConfigLoadStatus::Created);
        assert_eq!(config.backend.url, "http://127.0.0.1:8000");

        let written = fs::read_to_string(&path).unwrap();
        let reparsed: Config = toml::from_str(&written).unwrap();
        assert_eq!(reparsed.backend.url, config.backend.url);

        let (_, status) = load_or_create_config(&path);
        assert_eq!(status, ConfigLoadStatus::Loaded);
    }

    #[test]
    fn test_malformed_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[backend\nurl = ").unwrap();

        let (config, status) = load_or_create_config(&path);
        assert!(matches!(status, ConfigLoadStatus::Error(ref msg) if msg.starts_with("Malformed TOML")));
        assert_eq!(config.backend.url, "http://127.0.0.1:8000");
    }

    #[test]
    fn test_env_overrides_beat_file_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "[backend]\nurl = \"http://from-file:1\"\n\n[logging]\nlevel = \"warn\"\n",
        )
        .unwrap();

        // SAFETY: no other test reads these variables.
        unsafe {
            env::set_var("PROMPT_OPTIMIZER_BACKEND_URL", "http://from-env:2");
            env::set_var("PROMPT_OPTIMIZER_LOG", "trace");
        }
        let loaded = load_config_from(&path);
        unsafe {
            env::remove_var("PROMPT_OPTIMIZER_BACKEND_URL");
            env::remove_var("PROMPT_OPTIMIZER_LOG");
        }

        assert_eq!(loaded.status, ConfigLoadStatus::Loaded);
        assert_eq!(loaded.config.backend.url, "http://from-env:2");
        assert_eq!(loaded.config.logging.level, "trace");
        assert_eq!(loaded.config_path, path);
    }
}
