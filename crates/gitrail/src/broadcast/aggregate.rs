//! Aggregate view of a project's commits.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entity::{contributor::Contributor, user};
use crate::repository::{self, commits, links, users};

use super::publisher::BroadcastMessage;

/// How an author is shown to subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorView {
    pub contributor: Contributor,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentCommit {
    pub id: Uuid,
    pub sha: String,
    pub message: String,
    pub committed_at: DateTime<Utc>,
    /// `None` only for rows that violate the one-author rule.
    pub author: Option<AuthorView>,
    pub lines_added: Option<i32>,
    pub lines_removed: Option<i32>,
    pub branches: Vec<String>,
}

/// Per-contributor rollup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributionSummary {
    pub contributor: Contributor,
    pub display_name: String,
    pub commits: u64,
    pub additions: i64,
    pub deletions: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectAggregate {
    pub project_id: Uuid,
    pub total_commits: u64,
    pub total_additions: i64,
    pub total_deletions: i64,
    pub recent: Vec<RecentCommit>,
    /// Most commits first.
    pub contributions: Vec<ContributionSummary>,
    pub computed_at: DateTime<Utc>,
}

impl ProjectAggregate {
    /// The `commits-list`, `stats` and `contributions` messages, in that order.
    pub fn into_messages(self) -> [BroadcastMessage; 3] {
        [
            BroadcastMessage::CommitsList {
                commits: self.recent,
            },
            BroadcastMessage::Stats {
                total_commits: self.total_commits,
                total_additions: self.total_additions,
                total_deletions: self.total_deletions,
                updated_at: self.computed_at,
            },
            BroadcastMessage::Contributions {
                contributors: self.contributions,
                updated_at: self.computed_at,
            },
        ]
    }
}

fn display_name(contributor: &Contributor, users: &HashMap<Uuid, user::Model>) -> String {
    match contributor {
        Contributor::Registered(id) => users
            .get(id)
            .map(|u| u.full_name.clone())
            .unwrap_or_else(|| id.to_string()),
        Contributor::Unregistered(name) => name.clone(),
    }
}

/// Key the grouped totals by contributor. Rows without a valid author are
/// skipped.
fn by_contributor(
    rows: Vec<commits::AuthorTotals>,
) -> BTreeMap<Contributor, commits::LineTotals> {
    let mut tallies: BTreeMap<Contributor, commits::LineTotals> = BTreeMap::new();
    for row in rows {
        let Some(contributor) = Contributor::from_columns(row.user_id, row.unregistered_author)
        else {
            continue;
        };
        let tally = tallies.entry(contributor).or_default();
        tally.commits += row.totals.commits;
        tally.additions += row.totals.additions;
        tally.deletions += row.totals.deletions;
    }
    tallies
}

/// Compute the aggregate view of a project.
pub async fn compute_aggregate(
    db: &DatabaseConnection,
    project_id: Uuid,
    recent_limit: u64,
) -> repository::Result<ProjectAggregate> {
    let totals = commits::project_totals(db, project_id).await?;
    let tallies = by_contributor(commits::author_totals(db, project_id).await?);

    let recent_rows = commits::find_recent(db, project_id, recent_limit).await?;
    let recent_ids: Vec<Uuid> = recent_rows.iter().map(|c| c.id).collect();
    let mut branch_names = links::branch_names_for_commits(db, &recent_ids).await?;

    let user_ids: Vec<Uuid> = tallies.keys().filter_map(Contributor::user_id).collect();
    let users: HashMap<Uuid, user::Model> = users::find_many(db, &user_ids)
        .await?
        .into_iter()
        .map(|u| (u.id, u))
        .collect();

    let recent = recent_rows
        .into_iter()
        .map(|commit| {
            let author = commit.contributor().map(|contributor| AuthorView {
                display_name: display_name(&contributor, &users),
                avatar_url: contributor
                    .user_id()
                    .and_then(|id| users.get(&id))
                    .and_then(|u| u.avatar_url.clone()),
                contributor,
            });
            RecentCommit {
                branches: branch_names.remove(&commit.id).unwrap_or_default(),
                id: commit.id,
                sha: commit.sha,
                message: commit.message,
                committed_at: commit.committed_at.with_timezone(&Utc),
                author,
                lines_added: commit.lines_added,
                lines_removed: commit.lines_removed,
            }
        })
        .collect();

    let mut contributions: Vec<ContributionSummary> = tallies
        .into_iter()
        .map(|(contributor, tally)| ContributionSummary {
            display_name: display_name(&contributor, &users),
            contributor,
            commits: tally.commits,
            additions: tally.additions,
            deletions: tally.deletions,
        })
        .collect();
    contributions.sort_by(|a, b| {
        b.commits
            .cmp(&a.commits)
            .then_with(|| a.display_name.cmp(&b.display_name))
    });

    Ok(ProjectAggregate {
        project_id,
        total_commits: totals.commits,
        total_additions: totals.additions,
        total_deletions: totals.deletions,
        recent,
        contributions,
        computed_at: Utc::now(),
    })
}
