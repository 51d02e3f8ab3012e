//! Checkpointing and image pruning for in-flight agent runs.
//!
//! The agent loop writes an [`AgentCheckpoint`] after every turn and reads
//! it once at start-up. Screenshots dominate the checkpoint size, so only
//! the newest image in the history is kept; everything older is replaced
//! with [`PRUNED_IMAGE_MARKER`].

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use stylepilot_store::StateStore;

use crate::error::{AgentError, Result};
use crate::llm::types::{ContentPart, Message, MessageContent};

/// Text that stands in for a pruned screenshot.
pub const PRUNED_IMAGE_MARKER: &str = "[earlier screenshot removed to save space]";

/// Checkpoints older than this are discarded instead of resumed.
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(30 * 60);

const KEY_PREFIX: &str = "stylepilot:checkpoint:";

/// Snapshot of an agent run between turns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentCheckpoint {
    /// Number of turns completed so far.
    pub turn_number: u32,
    /// Full conversation history, in order.
    pub messages: Vec<Message>,
    /// CSS from the most recent successful `apply_css`.
    pub current_css: Option<String>,
    /// Binds the checkpoint to one generation against one document.
    pub session_key: String,
    pub timestamp: DateTime<Utc>,
}

impl AgentCheckpoint {
    pub fn new(
        turn_number: u32,
        messages: Vec<Message>,
        current_css: Option<String>,
        session_key: impl Into<String>,
    ) -> Self {
        Self {
            turn_number,
            messages,
            current_css,
            session_key: session_key.into(),
            timestamp: Utc::now(),
        }
    }

    fn age(&self) -> Duration {
        (Utc::now() - self.timestamp).to_std().unwrap_or_default()
    }
}

/// The store key for one session's checkpoint.
///
/// Sessions on the same target never share a slot.
pub fn checkpoint_key(session_key: &str) -> String {
    format!("{KEY_PREFIX}{session_key}")
}

/// Persists checkpoints in a [`StateStore`], one entry per session key.
///
/// Store failures never abort a run: saves and clears log a warning, and a
/// failed load is treated as "no checkpoint".
#[derive(Clone)]
pub struct CheckpointStore {
    store: Arc<dyn StateStore>,
    /// `None` until set explicitly or by [`CheckpointStore::or_max_age`].
    max_age: Option<Duration>,
}

impl CheckpointStore {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self {
            store,
            max_age: None,
        }
    }

    /// Discard checkpoints older than `max_age` instead of resuming them.
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    /// Use `max_age` unless one was already set with
    /// [`CheckpointStore::with_max_age`].
    pub fn or_max_age(mut self, max_age: Duration) -> Self {
        self.max_age.get_or_insert(max_age);
        self
    }

    /// The age limit in effect.
    pub fn max_age(&self) -> Duration {
        self.max_age.unwrap_or(DEFAULT_MAX_AGE)
    }

    /// Load the checkpoint of `session_key` if it is still fresh. A stale or
    /// unreadable entry is removed; entries of other sessions are untouched.
    pub async fn load(&self, session_key: &str) -> Option<AgentCheckpoint> {
        let key = checkpoint_key(session_key);
        let checkpoint = match self.read(&key).await {
            Ok(Some(checkpoint)) => checkpoint,
            Ok(None) => return None,
            Err(AgentError::Json(e)) => {
                warn!(error = %e, %key, "discarding unreadable checkpoint");
                self.clear(session_key).await;
                return None;
            }
            Err(e) => {
                warn!(error = %e, %key, "failed to read checkpoint; starting fresh");
                return None;
            }
        };

        if checkpoint.session_key != session_key {
            info!(
                %key,
                stored = %checkpoint.session_key,
                "discarding checkpoint filed under the wrong session"
            );
            self.clear(session_key).await;
            return None;
        }

        let age = checkpoint.age();
        if age > self.max_age() {
            info!(%key, age_secs = age.as_secs(), "discarding stale checkpoint");
            self.clear(session_key).await;
            return None;
        }

        debug!(%key, turn = checkpoint.turn_number, "checkpoint loaded");
        Some(checkpoint)
    }

    /// Store `checkpoint` under its own session key.
    pub async fn save(&self, checkpoint: &AgentCheckpoint) {
        let key = checkpoint_key(&checkpoint.session_key);
        match self.write(&key, checkpoint).await {
            Ok(()) => debug!(%key, turn = checkpoint.turn_number, "checkpoint saved"),
            Err(e) => warn!(error = %e, %key, "failed to save checkpoint"),
        }
    }

    pub async fn clear(&self, session_key: &str) {
        let key = checkpoint_key(session_key);
        match self.store.remove(&key).await.map_err(AgentError::from) {
            Ok(removed) => debug!(%key, removed, "checkpoint cleared"),
            Err(e) => warn!(error = %e, %key, "failed to clear checkpoint"),
        }
    }

    async fn read(&self, key: &str) -> Result<Option<AgentCheckpoint>> {
        match self.store.get(key).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    async fn write(&self, key: &str, checkpoint: &AgentCheckpoint) -> Result<()> {
        let value = serde_json::to_value(checkpoint)?;
        self.store.set(key, value).await?;
        Ok(())
    }
}

/// Replace every image part except the newest with [`PRUNED_IMAGE_MARKER`].
///
/// Returns the number of images pruned.
pub fn prune_images(messages: &mut [Message]) -> usize {
    let newest = messages.iter().enumerate().rev().find_map(|(mi, msg)| match &msg.content {
        MessageContent::Parts(parts) => parts
            .iter()
            .rposition(|p| matches!(p, ContentPart::Image { .. }))
            .map(|pi| (mi, pi)),
        MessageContent::Text(_) => None,
    });
    let Some(newest) = newest else {
        return 0;
    };

    let mut pruned = 0;
    for (mi, msg) in messages.iter_mut().enumerate() {
        let MessageContent::Parts(parts) = &mut msg.content else {
            continue;
        };
        for (pi, part) in parts.iter_mut().enumerate() {
            if matches!(part, ContentPart::Image { .. }) && (mi, pi) != newest {
                *part = ContentPart::text(PRUNED_IMAGE_MARKER);
                pruned += 1;
            }
        }
    }
    pruned
}

/// Number of image parts still present.
pub fn image_count(messages: &[Message]) -> usize {
    messages.iter().map(|m| m.content.images().len()).sum()
}
