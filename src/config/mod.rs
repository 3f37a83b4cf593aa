//! Configuration module for the voice control client
//!
//! Configuration comes from .env files, environment variables and an optional
//! YAML file. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `merge`: Applying YAML overrides on top of the environment
//! - `validation`: Configuration validation logic
//!
//! # Example
//! ```rust,no_run
//! use waav_voice_control::config::ClientConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ClientConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config = ClientConfig::from_file(&PathBuf::from("voice.yaml"))?;
//!
//! println!("Controlling the {} domain", config.domain.kind);
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;

mod env;
mod merge;
mod validation;
mod yaml;

pub use yaml::YamlConfig;

use crate::core::realtime::openai::{
    DEFAULT_TOKEN_URL, DEFAULT_TOOL_CHOICE, NegotiationEndpoints, OAI_EVENTS_CHANNEL,
    OPENAI_REALTIME_URL, OpenAIRealtimeModel,
};
use crate::core::tools::SessionOptions;
use crate::domain::{CartItem, DomainKind, Track};

/// Realtime endpoint and session settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RealtimeSettings {
    /// Local endpoint issuing ephemeral client secrets
    pub token_url: String,
    /// SDP negotiation endpoint (without the `model` query)
    pub url: String,
    pub model: String,
    /// Label of the event data channel
    pub channel_label: String,
    pub voice: Option<String>,
    pub instructions: Option<String>,
}

impl Default for RealtimeSettings {
    fn default() -> Self {
        Self {
            token_url: DEFAULT_TOKEN_URL.to_string(),
            url: OPENAI_REALTIME_URL.to_string(),
            model: OpenAIRealtimeModel::default().as_str().to_string(),
            channel_label: OAI_EVENTS_CHANNEL.to_string(),
            voice: None,
            instructions: None,
        }
    }
}

/// Which domain to control and its seed state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DomainConfig {
    pub kind: DomainKind,
    /// Seed playlist; `None` means the built-in demo track
    pub tracks: Option<Vec<Track>>,
    /// Seed cart; `None` means empty
    pub items: Option<Vec<CartItem>>,
}

/// Audio devices used by the live transport. `None` selects the system default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AudioSettings {
    pub input_device: Option<String>,
    pub output_device: Option<String>,
}

/// Client configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub realtime: RealtimeSettings,
    pub domain: DomainConfig,
    pub audio: AudioSettings,
    /// Fallback log filter when `RUST_LOG` is not set
    pub log_level: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            realtime: RealtimeSettings::default(),
            domain: DomainConfig::default(),
            audio: AudioSettings::default(),
            log_level: "info".to_string(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables
    ///
    /// Unset variables fall back to defaults. The result is validated.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let config = env::load_from_env()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a YAML file with environment variable support
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    ///
    /// # Errors
    /// Returns an error if:
    /// - The YAML file cannot be read or is malformed
    /// - Environment variables have invalid formats
    /// - Configuration validation fails
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        // .env is loaded in main.rs before this runs
        let yaml_config = yaml::YamlConfig::from_file(path)?;
        let config = merge::merge_config(Some(yaml_config))?;
        validation::validate(&config)?;
        Ok(config)
    }

    pub fn negotiation_endpoints(&self) -> NegotiationEndpoints {
        NegotiationEndpoints {
            token_url: self.realtime.token_url.clone(),
            realtime_url: self.realtime.url.clone(),
            model: self.realtime.model.clone(),
        }
    }

    /// Non-fatal configuration findings (unknown model or voice names).
    pub fn advisories(&self) -> Vec<String> {
        validation::advisories(self)
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            tool_choice: DEFAULT_TOOL_CHOICE.to_string(),
            voice: self.realtime.voice.clone(),
            instructions: self.realtime.instructions.clone(),
        }
    }
}
