//! Project update broadcasting.
//!
//! After commits of a project change, its aggregate view is recomputed and
//! pushed as three messages on the project's topic (`project:{id}:commits`).
//! Delivery is best effort: failures are logged and never reach the caller.

mod aggregate;
mod publisher;

pub use aggregate::{
    AuthorView, ContributionSummary, ProjectAggregate, RecentCommit, compute_aggregate,
};
pub use publisher::{BroadcastMessage, ChannelPublisher, Envelope, PublishError, Publisher};

use sea_orm::DatabaseConnection;
use uuid::Uuid;

use crate::entity::project::topic_for;

/// Default number of recent commits carried by `commits-list`.
pub const DEFAULT_RECENT_LIMIT: u64 = 20;

#[derive(Debug, Clone, Copy)]
pub struct BroadcastConfig {
    pub recent_limit: u64,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            recent_limit: DEFAULT_RECENT_LIMIT,
        }
    }
}

/// Recompute a project's aggregate and publish it.
///
/// # Returns
/// The number of messages handed to the publisher (0 to 3).
pub async fn publish_project_update(
    db: &DatabaseConnection,
    publisher: &dyn Publisher,
    project_id: Uuid,
    recent_limit: u64,
) -> usize {
    let aggregate = match compute_aggregate(db, project_id, recent_limit).await {
        Ok(aggregate) => aggregate,
        Err(e) => {
            tracing::warn!(%project_id, error = %e, "Failed to compute project aggregate");
            return 0;
        }
    };

    let topic = topic_for(project_id);
    let mut published = 0;
    for message in aggregate.into_messages() {
        match publisher.publish(&topic, &message).await {
            Ok(()) => published += 1,
            Err(PublishError::NoSubscribers) => {
                tracing::debug!(%topic, event = message.event(), "No subscribers");
            }
            Err(e) => {
                tracing::warn!(%topic, event = message.event(), error = %e, "Publish failed");
            }
        }
    }
    published
}
