use std::collections::HashSet;

use super::ClientConfig;
use crate::core::realtime::openai::{OpenAIRealtimeModel, OpenAIRealtimeVoice};
use crate::utils::validate_endpoint_url;

/// Validate a merged configuration.
///
/// - The token URL must be an http(s) URL
/// - The negotiation URL must be HTTPS unless its host is loopback, since it
///   carries the bearer credential
/// - Seed ids must be unique, prices non-negative and quantities >= 1
///
/// Unknown model or voice names are not errors; see [`advisories`].
pub fn validate(config: &ClientConfig) -> Result<(), Box<dyn std::error::Error>> {
    validate_endpoint_url(&config.realtime.token_url, false)
        .map_err(|e| format!("Invalid token URL '{}': {e}", config.realtime.token_url))?;
    validate_endpoint_url(&config.realtime.url, true)
        .map_err(|e| format!("Invalid realtime URL '{}': {e}", config.realtime.url))?;

    if config.realtime.channel_label.trim().is_empty() {
        return Err("Realtime channel label must not be empty".into());
    }

    validate_seeds(config)
}

/// Non-fatal findings about a valid configuration, for logging once the
/// subscriber is up.
pub fn advisories(config: &ClientConfig) -> Vec<String> {
    let mut notes = Vec::new();
    if OpenAIRealtimeModel::parse(&config.realtime.model).is_none() {
        notes.push(format!(
            "Unrecognised realtime model '{}', using as-is",
            config.realtime.model
        ));
    }
    if let Some(voice) = &config.realtime.voice
        && OpenAIRealtimeVoice::parse(voice).is_none()
    {
        notes.push(format!("Unrecognised voice '{voice}', using as-is"));
    }
    notes
}

fn validate_seeds(config: &ClientConfig) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(tracks) = &config.domain.tracks {
        check_unique(tracks.iter().map(|t| t.id.as_str()), "track")?;
    }

    if let Some(items) = &config.domain.items {
        check_unique(items.iter().map(|i| i.id.as_str()), "item")?;
        for item in items {
            if item.price.is_nan() || item.price < 0.0 {
                return Err(format!(
                    "Item '{}' has invalid price {}; prices must be >= 0",
                    item.id, item.price
                )
                .into());
            }
            if item.quantity < 1 {
                return Err(format!("Item '{}' must have a quantity of at least 1", item.id).into());
            }
        }
    }
    Ok(())
}

fn check_unique<'a>(
    ids: impl Iterator<Item = &'a str>,
    what: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(format!("Duplicate {what} id '{id}' in domain seed").into());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CartItem, Track};

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate(&ClientConfig::default()).is_ok());
    }

    #[test]
    fn test_negative_price_rejected() {
        let mut config = ClientConfig::default();
        config.domain.items = Some(vec![CartItem::new("a", "A", -1.0)]);
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("price"));
    }

    #[test]
    fn test_zero_quantity_rejected() {
        let mut config = ClientConfig::default();
        let mut item = CartItem::new("a", "A", 1.0);
        item.quantity = 0;
        config.domain.items = Some(vec![item]);
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_duplicate_track_ids_rejected() {
        let track = Track {
            id: "1".into(),
            title: "T".into(),
            artist: "A".into(),
            url: "https://x/1.mp3".into(),
        };
        let mut config = ClientConfig::default();
        config.domain.tracks = Some(vec![track.clone(), track]);
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("Duplicate track id '1'"));
    }

    #[test]
    fn test_empty_channel_label_rejected() {
        let mut config = ClientConfig::default();
        config.realtime.channel_label = "  ".into();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_unknown_model_and_voice_are_advisories() {
        let mut config = ClientConfig::default();
        assert!(advisories(&config).is_empty());

        config.realtime.model = "gpt-9-realtime".into();
        config.realtime.voice = Some("robot".into());
        assert!(validate(&config).is_ok());
        let notes = advisories(&config);
        assert_eq!(notes.len(), 2);
        assert!(notes[0].contains("gpt-9-realtime"));
        assert!(notes[1].contains("robot"));
    }

    #[test]
    fn test_loopback_negotiation_url_allowed() {
        let mut config = ClientConfig::default();
        config.realtime.url = "http://127.0.0.1:8080/v1/realtime".into();
        assert!(validate(&config).is_ok());
    }
}
