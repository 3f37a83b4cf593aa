use super::env::load_from_env;
use super::yaml::YamlConfig;
use super::ClientConfig;

/// Environment configuration with YAML values layered on top.
pub fn merge_config(
    yaml: Option<YamlConfig>,
) -> Result<ClientConfig, Box<dyn std::error::Error>> {
    let mut config = load_from_env()?;
    let Some(yaml) = yaml else {
        return Ok(config);
    };

    if let Some(realtime) = yaml.realtime {
        let target = &mut config.realtime;
        if let Some(token_url) = realtime.token_url {
            target.token_url = token_url;
        }
        if let Some(url) = realtime.url {
            target.url = url;
        }
        if let Some(model) = realtime.model {
            target.model = model;
        }
        if let Some(channel_label) = realtime.channel_label {
            target.channel_label = channel_label;
        }
        if realtime.voice.is_some() {
            target.voice = realtime.voice;
        }
        if realtime.instructions.is_some() {
            target.instructions = realtime.instructions;
        }
    }

    if let Some(domain) = yaml.domain {
        if let Some(kind) = domain.kind {
            config.domain.kind = kind;
        }
        config.domain.tracks = domain.tracks;
        config.domain.items = domain.items;
    }

    if let Some(audio) = yaml.audio {
        if audio.input_device.is_some() {
            config.audio.input_device = audio.input_device;
        }
        if audio.output_device.is_some() {
            config.audio.output_device = audio.output_device;
        }
    }

    if let Some(level) = yaml.logging.and_then(|logging| logging.level) {
        config.log_level = level;
    }

    Ok(config)
}
