//! Playlist domain: a queue of tracks with a now-playing selection.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use super::player::TrackPlayer;
use super::{Collection, DomainKind, DomainModule, Entity, parse_args};
use crate::config::DomainConfig;
use crate::core::dispatch::ToolCall;
use crate::core::handler::Reply;
use crate::core::tools::{CallError, ParamSpec, ToolRegistry, ToolSpec};

/// Demo track every fresh playlist starts with.
pub fn demo_track() -> Track {
    Track {
        id: "0".to_string(),
        title: "SoundHelix Song 1".to_string(),
        artist: "Test Artist".to_string(),
        url: "https://www.soundhelix.com/examples/mp3/SoundHelix-Song-1.mp3".to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub url: String,
}

impl Entity for Track {
    fn id(&self) -> &str {
        &self.id
    }

    /// First writer wins.
    fn merge_on_add(&mut self, _incoming: Self) -> bool {
        false
    }
}

#[derive(Debug, Deserialize)]
struct AddTrackArgs {
    track_id: String,
    title: String,
    artist: String,
    url: String,
}

#[derive(Debug, Deserialize)]
struct RemoveTrackArgs {
    track_id: String,
}

#[derive(Debug, Deserialize)]
struct PlayTrackArgs {
    #[serde(default)]
    track_id: Option<String>,
}

/// Console actions on the playlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaylistAction {
    /// Play a track by id, or resume the selection when `None`
    Play(Option<String>),
    Pause,
    Remove(String),
}

/// Read-only view of the playlist.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaylistSnapshot {
    pub tracks: Vec<Track>,
    pub now_playing: Option<String>,
    pub playing: bool,
}

/// Tracks plus the current selection. `playing` implies a selection.
///
/// With a [`TrackPlayer`] attached, selection changes are made audible.
#[derive(Debug, Clone, Default)]
pub struct Playlist {
    tracks: Collection<Track>,
    current: Option<String>,
    playing: bool,
    player: Option<Arc<dyn TrackPlayer>>,
}

impl Playlist {
    pub fn new(tracks: impl IntoIterator<Item = Track>) -> Self {
        Self {
            tracks: Collection::from_entries(tracks),
            current: None,
            playing: false,
            player: None,
        }
    }

    pub fn with_player(mut self, player: Arc<dyn TrackPlayer>) -> Self {
        self.player = Some(player);
        self
    }

    pub fn tracks(&self) -> &Collection<Track> {
        &self.tracks
    }

    pub fn now_playing(&self) -> Option<&Track> {
        self.current.as_deref().and_then(|id| self.tracks.get(id))
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Insert if absent. Returns true if the track was new.
    pub fn add(&mut self, track: Track) -> bool {
        self.tracks.add(track) == super::Added::Inserted
    }

    /// Remove by id. Removing the selected track clears the selection.
    pub fn remove(&mut self, id: &str) -> Option<Track> {
        let removed = self.tracks.remove(id)?;
        if self.current.as_deref() == Some(id) {
            self.current = None;
            self.playing = false;
            if let Some(player) = &self.player {
                player.stop();
            }
        }
        Some(removed)
    }

    /// Select and play `id`, or resume the selection when `id` is `None`.
    /// Returns false (and logs) when there is nothing to play.
    pub fn play(&mut self, id: Option<&str>) -> bool {
        match id {
            Some(id) => {
                if !self.tracks.contains(id) {
                    warn!(track_id = %id, "Track not found in playlist");
                    return false;
                }
                self.current = Some(id.to_string());
                self.playing = true;
                if let (Some(player), Some(track)) = (&self.player, self.tracks.get(id)) {
                    player.load(track);
                }
            }
            None => {
                if self.current.is_none() {
                    warn!("No track to play");
                    return false;
                }
                self.playing = true;
                if let Some(player) = &self.player {
                    player.resume();
                }
            }
        }
        if let Some(track) = self.now_playing() {
            info!(track_id = %track.id, title = %track.title, "Playing track");
        }
        true
    }

    pub fn pause(&mut self) {
        self.playing = false;
        if let Some(player) = &self.player {
            player.pause();
        }
    }
}

impl DomainModule for Playlist {
    type Action = PlaylistAction;
    type Snapshot = PlaylistSnapshot;

    const KIND: DomainKind = DomainKind::Playlist;
    const PLAYS_TRACKS: bool = true;

    fn from_config(config: &DomainConfig) -> Self {
        match &config.tracks {
            Some(tracks) => Playlist::new(tracks.iter().cloned()),
            None => Playlist::new([demo_track()]),
        }
    }

    fn attach_player(&mut self, player: Arc<dyn TrackPlayer>) {
        self.player = Some(player);
    }

    fn registry() -> ToolRegistry {
        ToolRegistry::new(vec![
            ToolSpec::new("add_track", "Add a track to the playlist")
                .param(ParamSpec::string("track_id", "Unique ID of the track").required())
                .param(ParamSpec::string("title", "Track title").required())
                .param(ParamSpec::string("artist", "Track artist or creator").required())
                .param(ParamSpec::string("url", "URL to stream the track audio from").required()),
            ToolSpec::new("remove_track", "Remove a track from the playlist by its ID").param(
                ParamSpec::string("track_id", "Unique ID of the track to remove").required(),
            ),
            ToolSpec::new(
                "play_track",
                "Play a specific track or resume the currently selected one",
            )
            .param(ParamSpec::string(
                "track_id",
                "Track ID to play (optional; plays the current track if omitted)",
            )),
            ToolSpec::new("pause_track", "Pause the track that is currently playing"),
        ])
    }

    fn apply_call(&mut self, call: &ToolCall) -> Result<Reply, CallError> {
        match call.name.as_str() {
            "add_track" => {
                let args: AddTrackArgs = parse_args(call)?;
                let narration = format!(
                    "Track \"{}\" by {} was added to the playlist.",
                    args.title, args.artist
                );
                self.add(Track {
                    id: args.track_id,
                    title: args.title,
                    artist: args.artist,
                    url: args.url,
                });
                Ok(Reply::Narrate(narration))
            }
            "remove_track" => {
                let args: RemoveTrackArgs = parse_args(call)?;
                self.remove(&args.track_id);
                Ok(Reply::Narrate(
                    "Track was removed from the playlist.".to_string(),
                ))
            }
            "play_track" => {
                let args: PlayTrackArgs = parse_args(call)?;
                self.play(args.track_id.as_deref());
                Ok(Reply::Silent)
            }
            "pause_track" => {
                self.pause();
                Ok(Reply::Silent)
            }
            other => Err(CallError::UnknownTool(other.to_string())),
        }
    }

    fn apply_action(&mut self, action: PlaylistAction) {
        match action {
            PlaylistAction::Play(id) => {
                self.play(id.as_deref());
            }
            PlaylistAction::Pause => self.pause(),
            PlaylistAction::Remove(id) => {
                if self.remove(&id).is_none() {
                    warn!(track_id = %id, "Track not found in playlist");
                }
            }
        }
    }

    fn parse_action(verb: &str, args: &[&str]) -> Option<Result<PlaylistAction, String>> {
        let action = match verb {
            "play" => Ok(PlaylistAction::Play(args.first().map(|id| id.to_string()))),
            "pause" => Ok(PlaylistAction::Pause),
            "remove" => match args.first() {
                Some(id) => Ok(PlaylistAction::Remove(id.to_string())),
                None => Err("usage: remove <track_id>".to_string()),
            },
            _ => return None,
        };
        Some(action)
    }

    fn action_help() -> &'static [&'static str] {
        &[
            "play [id]     play a track, or resume the current one",
            "pause         pause playback",
            "remove <id>   remove a track from the queue",
        ]
    }

    fn snapshot(&self) -> PlaylistSnapshot {
        PlaylistSnapshot {
            tracks: self.tracks.to_vec(),
            now_playing: self.current.clone(),
            playing: self.playing,
        }
    }

    fn render(snapshot: &PlaylistSnapshot) -> String {
        if snapshot.tracks.is_empty() {
            return "No songs in queue. Add a song to start listening!".to_string();
        }

        let mut out = String::from("Playback Queue\n");
        for track in &snapshot.tracks {
            let is_current = snapshot.now_playing.as_deref() == Some(track.id.as_str());
            let marker = match (is_current, snapshot.playing) {
                (true, true) => "▶",
                (true, false) => "⏸",
                _ => " ",
            };
            out.push_str(&format!(
                "{marker} [{}] {} - {}\n",
                track.id, track.title, track.artist
            ));
        }
        out.push_str(&format!("Total Tracks: {}", snapshot.tracks.len()));
        out
    }
}
