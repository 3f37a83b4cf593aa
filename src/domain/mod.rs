//! Domain modules: the stateful UI a voice session controls.
//!
//! A [`DomainModule`] bundles the entity collection, the tool table announced
//! to the model, how tool calls and direct console actions mutate state, and
//! how a snapshot is rendered. The orchestration core is generic over it.

pub mod cart;
pub mod player;
pub mod playlist;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::config::DomainConfig;
use crate::core::dispatch::ToolCall;
use crate::core::handler::Reply;
use crate::core::tools::{CallError, ToolRegistry};

pub use cart::{Cart, CartAction, CartItem, CartSnapshot};
pub use player::{TrackPlayer, default_track_player};
pub use playlist::{Playlist, PlaylistAction, PlaylistSnapshot, Track};

/// Which domain a client controls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DomainKind {
    #[default]
    Playlist,
    Cart,
}

impl DomainKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DomainKind::Playlist => "playlist",
            DomainKind::Cart => "cart",
        }
    }
}

impl fmt::Display for DomainKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DomainKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "playlist" | "music" => Ok(DomainKind::Playlist),
            "cart" | "shop" => Ok(DomainKind::Cart),
            other => Err(format!(
                "Unknown domain '{other}'. Supported domains: playlist, cart"
            )),
        }
    }
}

/// An item with a stable string identity.
pub trait Entity: Clone + fmt::Debug + Send + Sync + 'static {
    fn id(&self) -> &str;

    /// Called when an entity with an existing id is added again. Returns true
    /// if the stored entity changed.
    fn merge_on_add(&mut self, incoming: Self) -> bool;
}

/// Result of [`Collection::add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Added {
    Inserted,
    Merged,
    Unchanged,
}

/// Insertion-ordered sequence unique by id.
#[derive(Debug, Clone, PartialEq)]
pub struct Collection<E> {
    entries: Vec<E>,
}

impl<E> Default for Collection<E> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<E: Entity> Collection<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from entries in order, merging repeated ids.
    pub fn from_entries(entries: impl IntoIterator<Item = E>) -> Self {
        let mut collection = Self::new();
        for entry in entries {
            collection.add(entry);
        }
        collection
    }

    pub fn add(&mut self, entity: E) -> Added {
        match self.get_mut(entity.id()) {
            Some(existing) => {
                if existing.merge_on_add(entity) {
                    Added::Merged
                } else {
                    Added::Unchanged
                }
            }
            None => {
                self.entries.push(entity);
                Added::Inserted
            }
        }
    }

    /// Remove by id, preserving the order of the rest.
    pub fn remove(&mut self, id: &str) -> Option<E> {
        let index = self.entries.iter().position(|e| e.id() == id)?;
        Some(self.entries.remove(index))
    }

    pub fn get(&self, id: &str) -> Option<&E> {
        self.entries.iter().find(|e| e.id() == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut E> {
        self.entries.iter_mut().find(|e| e.id() == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> std::slice::Iter<'_, E> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_vec(&self) -> Vec<E> {
        self.entries.clone()
    }
}

/// A controllable domain.
pub trait DomainModule: Send + 'static {
    /// Direct console action applied without the model.
    type Action: fmt::Debug + Send + 'static;
    /// Read-only view published to the UI.
    type Snapshot: Clone + PartialEq + fmt::Debug + Send + Sync + 'static;

    const KIND: DomainKind;

    /// Whether this domain plays tracks and wants a [`TrackPlayer`].
    const PLAYS_TRACKS: bool = false;

    /// Seeded state for this domain.
    fn from_config(config: &DomainConfig) -> Self;

    fn attach_player(&mut self, _player: Arc<dyn TrackPlayer>) {}

    fn registry() -> ToolRegistry;

    /// Apply a validated tool call.
    fn apply_call(&mut self, call: &ToolCall) -> Result<Reply, CallError>;

    fn apply_action(&mut self, action: Self::Action);

    /// Parse a console verb into an action. `None` if the verb is not a
    /// domain verb.
    fn parse_action(verb: &str, args: &[&str]) -> Option<Result<Self::Action, String>>;

    /// Console help lines for domain verbs.
    fn action_help() -> &'static [&'static str];

    fn snapshot(&self) -> Self::Snapshot;

    fn render(snapshot: &Self::Snapshot) -> String;
}

/// Deserialize a call's arguments into its typed form.
pub(crate) fn parse_args<T: DeserializeOwned>(call: &ToolCall) -> Result<T, CallError> {
    serde_json::from_value(call.arguments.clone())
        .map_err(|e| CallError::malformed(call.name.as_str(), e.to_string()))
}
