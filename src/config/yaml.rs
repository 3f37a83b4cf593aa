use serde::Deserialize;
use std::path::PathBuf;

use crate::domain::{CartItem, DomainKind, Track};

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration. Values present
/// here override environment variables.
///
/// # Example YAML structure
/// ```yaml
/// realtime:
///   token_url: "http://localhost:3000/token"
///   url: "https://api.openai.com/v1/realtime"
///   model: "gpt-4o-realtime-preview-2024-12-17"
///   channel_label: "oai-events"
///   voice: "verse"
///   instructions: "You are a friendly DJ."
///
/// domain:
///   kind: playlist
///   tracks:
///     - id: "0"
///       title: "SoundHelix Song 1"
///       artist: "Test Artist"
///       url: "https://www.soundhelix.com/examples/mp3/SoundHelix-Song-1.mp3"
///
/// audio:
///   input_device: "MacBook Pro Microphone"
///   output_device: "External Headphones"
///
/// logging:
///   level: "debug"
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub realtime: Option<RealtimeYaml>,
    pub domain: Option<DomainYaml>,
    pub audio: Option<AudioYaml>,
    pub logging: Option<LoggingYaml>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RealtimeYaml {
    pub token_url: Option<String>,
    pub url: Option<String>,
    pub model: Option<String>,
    pub channel_label: Option<String>,
    pub voice: Option<String>,
    pub instructions: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct DomainYaml {
    pub kind: Option<DomainKind>,
    pub tracks: Option<Vec<Track>>,
    pub items: Option<Vec<CartItem>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AudioYaml {
    pub input_device: Option<String>,
    pub output_device: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct LoggingYaml {
    pub level: Option<String>,
}

impl YamlConfig {
    /// Load YAML configuration from a file
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {e}", path.display()))?;

        let config: YamlConfig = serde_yaml::from_str(&contents)
            .map_err(|e| format!("Failed to parse YAML config: {e}"))?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_yaml_config_full() {
        let yaml = r#"
realtime:
  token_url: "http://localhost:4000/token"
  url: "https://api.openai.com/v1/realtime"
  model: "gpt-4o-realtime-preview"
  channel_label: "events"
  voice: "sage"
  instructions: "Be brief."

domain:
  kind: playlist
  tracks:
    - id: "1"
      title: "Intro"
      artist: "Band"
      url: "https://example.com/1.mp3"

audio:
  input_device: "Mic"
  output_device: "Speakers"

logging:
  level: "trace"
"#;

        let config: YamlConfig = serde_yaml::from_str(yaml).unwrap();

        let realtime = config.realtime.as_ref().unwrap();
        assert_eq!(
            realtime.token_url.as_deref(),
            Some("http://localhost:4000/token")
        );
        assert_eq!(realtime.channel_label.as_deref(), Some("events"));
        assert_eq!(realtime.voice.as_deref(), Some("sage"));

        let domain = config.domain.as_ref().unwrap();
        assert_eq!(domain.kind, Some(DomainKind::Playlist));
        assert_eq!(domain.tracks.as_ref().unwrap()[0].title, "Intro");
        assert!(domain.items.is_none());

        let audio = config.audio.as_ref().unwrap();
        assert_eq!(audio.output_device.as_deref(), Some("Speakers"));
        assert_eq!(config.logging.unwrap().level.as_deref(), Some("trace"));
    }

    #[test]
    fn test_yaml_config_partial() {
        let config: YamlConfig = serde_yaml::from_str("domain:\n  kind: cart\n").unwrap();
        assert!(config.realtime.is_none());
        assert_eq!(config.domain.unwrap().kind, Some(DomainKind::Cart));
    }

    #[test]
    fn test_yaml_config_rejects_unknown_domain() {
        let result: Result<YamlConfig, _> = serde_yaml::from_str("domain:\n  kind: garage\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_yaml_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.yaml");
        fs::write(&path, "logging:\n  level: debug\n").unwrap();

        let config = YamlConfig::from_file(&path).unwrap();
        assert_eq!(config.logging.unwrap().level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_yaml_from_file_malformed() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.yaml");
        fs::write(&path, "realtime: [unclosed").unwrap();

        let err = YamlConfig::from_file(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse YAML config"));
    }
}
