use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::warn;

fn default_endpoint() -> String {
    "http://localhost:5000/api/chat".to_string()
}

fn default_request_field() -> String {
    "message".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

fn default_stt_endpoint() -> Option<String> {
    Some("http://localhost:8080/v1/audio/transcriptions".to_string())
}

fn default_stt_model() -> String {
    "whisper-1".to_string()
}

fn default_language() -> String {
    "pt".to_string()
}

fn default_max_seconds() -> u64 {
    15
}

fn default_silence_ms() -> u64 {
    1200
}

fn default_energy_threshold() -> f32 {
    0.01
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub voice: VoiceConfig,
    #[serde(default)]
    pub window: WindowConfig,
    #[serde(default)]
    pub text: TextConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// JSON key the user's text is sent under.
    #[serde(default = "default_request_field")]
    pub request_field: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VoiceConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Submit the transcript straight away instead of leaving it in the input.
    #[serde(default = "default_true")]
    pub auto_submit: bool,
    #[serde(default = "default_stt_endpoint")]
    pub stt_endpoint: Option<String>,
    #[serde(default = "default_stt_model")]
    pub stt_model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_language")]
    pub language: String,
    /// Input device name; the system default when unset.
    #[serde(default)]
    pub device: Option<String>,
    #[serde(default = "default_max_seconds")]
    pub max_seconds: u64,
    #[serde(default = "default_silence_ms")]
    pub silence_ms: u64,
    #[serde(default = "default_energy_threshold")]
    pub energy_threshold: f32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WindowConfig {
    pub width: u32,
    pub height: u32,
    pub min_width: u32,
    pub min_height: u32,
}

/// User-facing strings. Overridable so the widget can be localised.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TextConfig {
    pub greeting: String,
    pub input_hint: String,
    pub listening_hint: String,
    pub voice_error_hint: String,
    pub thinking: String,
    pub connection_error: String,
    pub server_error: String,
    pub stopped: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig {
            endpoint: default_endpoint(),
            request_field: default_request_field(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for VoiceConfig {
    fn default() -> Self {
        VoiceConfig {
            enabled: true,
            auto_submit: true,
            stt_endpoint: default_stt_endpoint(),
            stt_model: default_stt_model(),
            api_key: None,
            language: default_language(),
            device: None,
            max_seconds: default_max_seconds(),
            silence_ms: default_silence_ms(),
            energy_threshold: default_energy_threshold(),
        }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        WindowConfig {
            width: 480,
            height: 720,
            min_width: 360,
            min_height: 420,
        }
    }
}

impl Default for TextConfig {
    fn default() -> Self {
        TextConfig {
            greeting: "Hello! I'm Hope. How can I help you today?".to_string(),
            input_hint: "Ask Hope...".to_string(),
            listening_hint: "Listening... speak now.".to_string(),
            voice_error_hint: "Microphone error. Try typing.".to_string(),
            thinking: "Typing...".to_string(),
            connection_error: "Sorry, there was a problem connecting to the server.".to_string(),
            server_error: "Sorry, the server could not answer right now. Please try again.".to_string(),
            stopped: "Okay, I stopped waiting for that answer.".to_string(),
        }
    }
}

impl Config {
    pub fn load() -> Self {
        let config_path = Self::get_config_path();

        let mut config = if config_path.exists() {
            match fs::read_to_string(&config_path) {
                Ok(contents) => Self::parse(&contents).unwrap_or_else(|e| {
                    warn!(path = %config_path.display(), "Error parsing config.toml: {}. Using defaults.", e);
                    Config::default()
                }),
                Err(e) => {
                    warn!(path = %config_path.display(), "Error reading config.toml: {}. Using defaults.", e);
                    Config::default()
                }
            }
        } else {
            Config::default()
        };

        config.apply_env();
        config
    }

    pub fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    fn apply_env(&mut self) {
        if let Ok(endpoint) = std::env::var("HOPE_CHAT_ENDPOINT") {
            self.backend.endpoint = endpoint;
        }
        if let Ok(key) = std::env::var("HOPE_CHAT_STT_KEY") {
            self.voice.api_key = Some(key);
        }
    }

    pub fn get_config_path() -> PathBuf {
        Self::get_config_dir().join("config.toml")
    }

    pub fn get_config_dir() -> PathBuf {
        if let Some(home) = std::env::var_os("HOME") {
            PathBuf::from(home).join(".config/hope-chat")
        } else {
            PathBuf::from(".")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.backend.endpoint, "http://localhost:5000/api/chat");
        assert_eq!(config.backend.request_field, "message");
        assert!(config.voice.enabled);
        assert!(config.voice.auto_submit);
        assert_eq!(config.text.input_hint, "Ask Hope...");
    }

    #[test]
    fn test_partial_sections() {
        let config = Config::parse(
            r#"
            [backend]
            endpoint = "https://hope.example/api/chat"
            request_field = "pergunta"

            [voice]
            auto_submit = false
            language = "en"

            [text]
            stopped = "Stopped."
            "#,
        )
        .unwrap();

        assert_eq!(config.backend.endpoint, "https://hope.example/api/chat");
        assert_eq!(config.backend.request_field, "pergunta");
        assert_eq!(config.backend.timeout_secs, 60);
        assert!(!config.voice.auto_submit);
        assert!(config.voice.enabled);
        assert_eq!(config.voice.language, "en");
        assert_eq!(config.text.stopped, "Stopped.");
        assert_eq!(config.text.thinking, "Typing...");
        assert_eq!(config.window.width, 480);
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        assert!(Config::parse("[backend\nendpoint = 1").is_err());
    }
}
