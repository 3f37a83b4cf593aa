use std::env;

use super::{AudioSettings, ClientConfig, DomainConfig, RealtimeSettings};
use crate::domain::DomainKind;

/// Every variable this module reads.
pub(super) const ENV_KEYS: &[&str] = &[
    "TOKEN_URL",
    "REALTIME_URL",
    "REALTIME_MODEL",
    "REALTIME_CHANNEL_LABEL",
    "REALTIME_VOICE",
    "REALTIME_INSTRUCTIONS",
    "VOICE_DOMAIN",
    "AUDIO_INPUT_DEVICE",
    "AUDIO_OUTPUT_DEVICE",
    "LOG_LEVEL",
];

/// Read a variable, treating empty values as unset.
fn var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Build a configuration from environment variables over defaults.
pub fn load_from_env() -> Result<ClientConfig, Box<dyn std::error::Error>> {
    let defaults = ClientConfig::default();

    let kind = match var("VOICE_DOMAIN") {
        Some(value) => value
            .parse::<DomainKind>()
            .map_err(|e| format!("Invalid VOICE_DOMAIN: {e}"))?,
        None => DomainKind::default(),
    };

    Ok(ClientConfig {
        realtime: RealtimeSettings {
            token_url: var("TOKEN_URL").unwrap_or(defaults.realtime.token_url),
            url: var("REALTIME_URL").unwrap_or(defaults.realtime.url),
            model: var("REALTIME_MODEL").unwrap_or(defaults.realtime.model),
            channel_label: var("REALTIME_CHANNEL_LABEL")
                .unwrap_or(defaults.realtime.channel_label),
            voice: var("REALTIME_VOICE"),
            instructions: var("REALTIME_INSTRUCTIONS"),
        },
        domain: DomainConfig {
            kind,
            tracks: None,
            items: None,
        },
        audio: AudioSettings {
            input_device: var("AUDIO_INPUT_DEVICE"),
            output_device: var("AUDIO_OUTPUT_DEVICE"),
        },
        log_level: var("LOG_LEVEL").unwrap_or(defaults.log_level),
    })
}
