use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;

use super::aggregate::{ContributionSummary, RecentCommit};

/// Default capacity of the in-process broadcast channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// A message pushed to a project topic, tagged by `event`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum BroadcastMessage {
    CommitsList {
        commits: Vec<RecentCommit>,
    },
    Stats {
        total_commits: u64,
        total_additions: i64,
        total_deletions: i64,
        updated_at: DateTime<Utc>,
    },
    Contributions {
        contributors: Vec<ContributionSummary>,
        updated_at: DateTime<Utc>,
    },
}

impl BroadcastMessage {
    pub fn event(&self) -> &'static str {
        match self {
            BroadcastMessage::CommitsList { .. } => "commits-list",
            BroadcastMessage::Stats { .. } => "stats",
            BroadcastMessage::Contributions { .. } => "contributions",
        }
    }
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("No subscribers")]
    NoSubscribers,

    #[error("Transport error: {0}")]
    Transport(String),
}

/// Sink for topic messages.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, topic: &str, message: &BroadcastMessage) -> Result<(), PublishError>;
}

/// A message with its topic, as delivered to channel subscribers.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub topic: String,
    pub message: BroadcastMessage,
}

/// In-process publisher over a tokio broadcast channel.
#[derive(Clone)]
pub struct ChannelPublisher {
    tx: broadcast::Sender<Envelope>,
}

impl ChannelPublisher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Receive every envelope published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Envelope> {
        self.tx.subscribe()
    }
}

impl Default for ChannelPublisher {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

#[async_trait]
impl Publisher for ChannelPublisher {
    async fn publish(&self, topic: &str, message: &BroadcastMessage) -> Result<(), PublishError> {
        self.tx
            .send(Envelope {
                topic: topic.to_string(),
                message: message.clone(),
            })
            .map(|_| ())
            .map_err(|_| PublishError::NoSubscribers)
    }
}
