//! Integration tests for the sync pipeline: ingestion, polling, enrichment
//! and discovery against in-memory SQLite and a fake code host.

#![cfg(all(feature = "sqlite", feature = "migrate"))]

mod common;

use std::sync::atomic::Ordering;
use std::time::Duration as StdDuration;

use chrono::{Duration, TimeZone, Utc};
use gitrail::broadcast::{BroadcastMessage, Envelope};
use gitrail::entity::agreement_status::AgreementStatus;
use gitrail::entity::prelude::{BranchCommit, Commit};
use gitrail::entity::project::topic_for;
use gitrail::entity::{branch, commit as commit_entity, project, user};
use gitrail::lock::JobLock;
use gitrail::platform::{RateLimitInfo, UnavailableKind};
use gitrail::queue::{IngestMode, Job, JobHandler};
use gitrail::repository::{branches, commits, projects};
use gitrail::sync::{
    EnrichConfig, EnrichOutcome, POLLER_LOCK_KEY, PollerConfig, RescheduleReason, SyncConfig,
    enrich_chain_key,
};
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use tokio::sync::broadcast::error::TryRecvError;

use common::{
    Harness, commit, harness, insert_agreement, insert_branch, insert_project, insert_user,
};

fn drain(rx: &mut tokio::sync::broadcast::Receiver<Envelope>) -> Vec<Envelope> {
    let mut received = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(envelope) => received.push(envelope),
            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            Err(TryRecvError::Lagged(_)) => continue,
        }
    }
    received
}

fn blocked_quota(reset_in: Duration) -> RateLimitInfo {
    RateLimitInfo {
        limit: 5000,
        remaining: 100,
        reset_at: Utc::now() + reset_in,
    }
}

/// Owner `alice` with a credential, and project `acme/app` with branch `main`.
async fn seeded(h: &Harness) -> (user::Model, project::Model, branch::Model) {
    let owner = insert_user(h.db.as_ref(), "alice@example.com", Some("alice"), Some("ghp_alice")).await;
    let project = insert_project(h.db.as_ref(), &owner, Some("acme/app"), None).await;
    let main = insert_branch(h.db.as_ref(), &project, "main", 0).await;
    (owner, project, main)
}

// ─── Ingestion Tests ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_ingest_keeps_known_authors_and_publishes() {
    let h = harness(SyncConfig::default()).await;
    let (owner, project, main) = seeded(&h).await;
    h.client.push_commit("main", commit("sha1", Some("alice"), "alice@example.com", "Alice", 1), 10, 2);
    h.client.push_commit("main", commit("sha2", Some("stranger"), "who@example.com", "Who", 2), 5, 5);

    let mut rx = h.publisher.subscribe();
    let report = h
        .ctx
        .runner()
        .ingest(project.id, main.id, IngestMode::Full)
        .await
        .unwrap();

    assert_eq!(report.fetched, 2);
    assert_eq!(report.skipped_unresolved, 1);
    assert_eq!(report.linked, 1);
    assert!(!report.enrichment_enqueued);

    let stored = Commit::find().all(h.db.as_ref()).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].sha, "sha1");
    assert_eq!(stored[0].user_id, Some(owner.id));
    assert_eq!(stored[0].lines_added, Some(10));
    assert_eq!(BranchCommit::find().count(h.db.as_ref()).await.unwrap(), 1);

    let envelopes = drain(&mut rx);
    let events: Vec<&str> = envelopes.iter().map(|e| e.message.event()).collect();
    assert_eq!(events, vec!["commits-list", "stats", "contributions"]);
    assert!(envelopes.iter().all(|e| e.topic == topic_for(project.id)));
    match &envelopes[1].message {
        BroadcastMessage::Stats {
            total_commits,
            total_additions,
            ..
        } => {
            assert_eq!(*total_commits, 1);
            assert_eq!(*total_additions, 10);
        }
        other => panic!("unexpected message: {other:?}"),
    }
}

#[tokio::test]
async fn test_login_takes_precedence_over_email() {
    let h = harness(SyncConfig::default()).await;
    let (_owner, project, main) = seeded(&h).await;
    let bob = insert_user(h.db.as_ref(), "bob@example.com", Some("bob123"), None).await;
    let carol = insert_user(h.db.as_ref(), "carol@example.com", Some("carol"), None).await;
    let bob_agreement = insert_agreement(h.db.as_ref(), &project, &bob, AgreementStatus::Active).await;
    insert_agreement(h.db.as_ref(), &project, &carol, AgreementStatus::Active).await;

    h.client.push_commit("main", commit("sha1", Some("bob123"), "carol@example.com", "Carol", 1), 1, 0);

    h.ctx
        .runner()
        .ingest(project.id, main.id, IngestMode::Fast)
        .await
        .unwrap();

    let stored = Commit::find().one(h.db.as_ref()).await.unwrap().unwrap();
    assert_eq!(stored.user_id, Some(bob.id));
    assert_eq!(stored.agreement_id, Some(bob_agreement.id));
}

#[tokio::test]
async fn test_ingest_is_idempotent() {
    let h = harness(SyncConfig::default()).await;
    let (_owner, project, main) = seeded(&h).await;
    for (i, sha) in ["a1", "a2", "a3"].iter().enumerate() {
        h.client.push_commit("main", commit(sha, Some("alice"), "alice@example.com", "Alice", i as u32), 1, 1);
    }
    // Listings may repeat entries across pages.
    h.client.push_commit("main", commit("a1", Some("alice"), "alice@example.com", "Alice", 0), 1, 1);

    let runner = h.ctx.runner();
    for _ in 0..2 {
        runner
            .ingest(project.id, main.id, IngestMode::Fast)
            .await
            .unwrap();
    }

    assert_eq!(commits::count_by_project(h.db.as_ref(), project.id).await.unwrap(), 3);
    assert_eq!(BranchCommit::find().count(h.db.as_ref()).await.unwrap(), 3);
}

#[tokio::test]
async fn test_fast_ingest_enqueues_enrichment() {
    let h = harness(SyncConfig::default()).await;
    let (_owner, project, main) = seeded(&h).await;
    h.client.push_commit("main", commit("sha1", Some("alice"), "alice@example.com", "Alice", 1), 3, 1);

    let report = h
        .ctx
        .runner()
        .ingest(project.id, main.id, IngestMode::Fast)
        .await
        .unwrap();

    assert!(report.enrichment_enqueued);
    assert_eq!(h.client.get_commit_calls.load(Ordering::SeqCst), 0);
    let stored = Commit::find().one(h.db.as_ref()).await.unwrap().unwrap();
    assert_eq!(stored.lines_added, None);

    let jobs = h.queue.jobs();
    assert_eq!(jobs.len(), 1);
    assert_eq!(
        jobs[0].job,
        Job::EnrichStats {
            project_id: project.id,
            attempt: 0
        }
    );
    assert_eq!(jobs[0].delay, None);
}

#[tokio::test]
async fn test_fast_reingest_preserves_stats() {
    let h = harness(SyncConfig::default()).await;
    let (_owner, project, main) = seeded(&h).await;
    h.client.push_commit("main", commit("sha1", Some("alice"), "alice@example.com", "Alice", 1), 8, 4);

    let runner = h.ctx.runner();
    runner.ingest(project.id, main.id, IngestMode::Full).await.unwrap();
    let report = runner.ingest(project.id, main.id, IngestMode::Fast).await.unwrap();

    let stored = Commit::find().one(h.db.as_ref()).await.unwrap().unwrap();
    assert_eq!(stored.lines_added, Some(8));
    assert_eq!(stored.lines_removed, Some(4));
    // Nothing lacks stats, so no enrichment is started.
    assert!(!report.enrichment_enqueued);
    assert!(h.queue.jobs().is_empty());
}

#[tokio::test]
async fn test_unchanged_fast_reingest_starts_one_enrichment_chain() {
    let h = harness(SyncConfig::default()).await;
    let (_owner, project, main) = seeded(&h).await;
    h.client.push_commit("main", commit("sha1", Some("alice"), "alice@example.com", "Alice", 1), 3, 1);

    let runner = h.ctx.runner();
    let mut enqueued = Vec::new();
    for _ in 0..3 {
        let report = runner.ingest(project.id, main.id, IngestMode::Fast).await.unwrap();
        assert_eq!(report.persisted, 1);
        enqueued.push(report.enrichment_enqueued);
    }

    assert_eq!(enqueued, vec![true, false, false]);
    assert_eq!(h.queue.jobs().len(), 1);
}

#[tokio::test]
async fn test_finished_chain_lets_new_commits_start_another() {
    let h = harness(SyncConfig::default()).await;
    let (_owner, project, main) = seeded(&h).await;
    h.client.push_commit("main", commit("sha1", Some("alice"), "alice@example.com", "Alice", 1), 3, 1);

    let runner = h.ctx.runner();
    runner.ingest(project.id, main.id, IngestMode::Fast).await.unwrap();
    assert_eq!(h.queue.take().len(), 1);

    let outcome = h.ctx.enricher().run(project.id, 0).await.unwrap();
    assert_eq!(outcome, EnrichOutcome::Done { enriched: 1 });

    h.client.push_commit("main", commit("sha2", Some("alice"), "alice@example.com", "Alice", 2), 2, 2);
    let report = runner.ingest(project.id, main.id, IngestMode::Fast).await.unwrap();
    assert!(report.enrichment_enqueued);
    assert_eq!(h.queue.take().len(), 1);
}

#[tokio::test]
async fn test_large_branch_is_persisted_in_chunks() {
    let h = harness(SyncConfig::default()).await;
    let (_owner, project, main) = seeded(&h).await;
    for i in 0..3000u32 {
        h.client.push_commit(
            "main",
            commit(&format!("sha{i:04}"), Some("alice"), "alice@example.com", "Alice", i),
            1,
            0,
        );
    }

    let report = h
        .ctx
        .runner()
        .ingest(project.id, main.id, IngestMode::Fast)
        .await
        .unwrap();

    assert_eq!(report.fetched, 3000);
    assert_eq!(report.persisted, 3000);
    assert_eq!(report.linked, 3000);
    assert_eq!(commits::count_by_project(h.db.as_ref(), project.id).await.unwrap(), 3000);
    assert_eq!(BranchCommit::find().count(h.db.as_ref()).await.unwrap(), 3000);
}

#[tokio::test]
async fn test_unavailable_host_leaves_storage_untouched() {
    let h = harness(SyncConfig::default()).await;
    let (_owner, project, main) = seeded(&h).await;
    h.client.push_commit("main", commit("sha1", Some("alice"), "alice@example.com", "Alice", 1), 1, 1);
    h.client.fail_with(UnavailableKind::Transport);

    let report = h
        .ctx
        .runner()
        .ingest(project.id, main.id, IngestMode::Fast)
        .await
        .unwrap();

    assert_eq!(report.persisted, 0);
    assert_eq!(Commit::find().count(h.db.as_ref()).await.unwrap(), 0);
    assert!(h.queue.jobs().is_empty());
}

// ─── Poller Tests ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_poller_enqueues_oldest_branches() {
    let h = harness(SyncConfig::default()).await;
    let owner = insert_user(h.db.as_ref(), "alice@example.com", Some("alice"), Some("ghp_alice")).await;
    let project = insert_project(h.db.as_ref(), &owner, Some("acme/app"), None).await;

    let mut created = Vec::new();
    for i in (0..10).rev() {
        created.push(insert_branch(h.db.as_ref(), &project, &format!("branch-{i}"), i).await);
    }
    created.sort_by_key(|b| b.created_at);

    let report = h.ctx.poller().run_cycle(Utc::now()).await.unwrap();
    assert_eq!(report.eligible_projects, 1);
    assert_eq!(report.jobs_enqueued, 3);

    let queued: Vec<Job> = h.queue.take().into_iter().map(|s| s.job).collect();
    let expected: Vec<Job> = created[..3]
        .iter()
        .map(|b| Job::IngestBranch {
            project_id: project.id,
            branch_id: b.id,
            mode: IngestMode::Fast,
        })
        .collect();
    assert_eq!(queued, expected);
}

#[tokio::test]
async fn test_poller_respects_safety_window() {
    let h = harness(SyncConfig::default()).await;
    let (_owner, project, _main) = seeded(&h).await;
    let now = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();

    let first = h.ctx.poller().run_cycle(now).await.unwrap();
    assert_eq!(first.projects_polled, 1);

    let stored = projects::find_by_id(h.db.as_ref(), project.id).await.unwrap().unwrap();
    assert_eq!(stored.github_last_polled_at, Some(now.fixed_offset()));

    let soon = h.ctx.poller().run_cycle(now + Duration::seconds(10)).await.unwrap();
    assert_eq!(soon.eligible_projects, 0);

    let later = h.ctx.poller().run_cycle(now + Duration::seconds(60)).await.unwrap();
    assert_eq!(later.projects_polled, 1);
    assert_eq!(h.queue.jobs().len(), 2);
}

#[tokio::test]
async fn test_poller_skips_ineligible_projects() {
    let h = harness(SyncConfig::default()).await;
    let owner = insert_user(h.db.as_ref(), "alice@example.com", Some("alice"), Some("ghp_alice")).await;
    let tokenless = insert_user(h.db.as_ref(), "ted@example.com", Some("ted"), None).await;

    let unlinked = insert_project(h.db.as_ref(), &owner, None, None).await;
    insert_branch(h.db.as_ref(), &unlinked, "main", 0).await;
    let no_token = insert_project(h.db.as_ref(), &tokenless, Some("acme/ted"), None).await;
    insert_branch(h.db.as_ref(), &no_token, "main", 0).await;
    insert_project(h.db.as_ref(), &owner, Some("acme/empty"), None).await;

    let report = h.ctx.poller().run_cycle(Utc::now()).await.unwrap();
    assert_eq!(report.eligible_projects, 0);
    assert!(h.queue.jobs().is_empty());
}

#[tokio::test]
async fn test_poller_skips_cycle_when_locked() {
    let h = harness(SyncConfig::default()).await;
    seeded(&h).await;

    let held = h
        .lock
        .acquire(POLLER_LOCK_KEY, StdDuration::from_secs(50))
        .await
        .unwrap()
        .unwrap();

    let report = h.ctx.poller().run_cycle(Utc::now()).await.unwrap();
    assert!(report.skipped_locked);
    assert!(h.queue.jobs().is_empty());

    h.lock.release(&held).await.unwrap();
    let report = h.ctx.poller().run_cycle(Utc::now()).await.unwrap();
    assert!(!report.skipped_locked);
    assert_eq!(report.jobs_enqueued, 1);
}

#[tokio::test]
async fn test_poller_honours_ingest_mode_setting() {
    let config = SyncConfig {
        poller: PollerConfig {
            ingest_mode: IngestMode::Full,
            ..Default::default()
        },
        ..Default::default()
    };
    let h = harness(config).await;
    let (_owner, project, main) = seeded(&h).await;

    h.ctx.poller().run_cycle(Utc::now()).await.unwrap();
    assert_eq!(
        h.queue.jobs()[0].job,
        Job::IngestBranch {
            project_id: project.id,
            branch_id: main.id,
            mode: IngestMode::Full,
        }
    );
}

// ─── Enrichment Tests ────────────────────────────────────────────────────────

async fn seeded_with_pending(h: &Harness, shas: &[&str]) -> project::Model {
    let (_owner, project, main) = seeded(h).await;
    for (i, sha) in shas.iter().enumerate() {
        h.client.push_commit("main", commit(sha, Some("alice"), "alice@example.com", "Alice", i as u32), 10, 1);
    }
    h.ctx
        .runner()
        .ingest(project.id, main.id, IngestMode::Fast)
        .await
        .unwrap();
    h.queue.take();
    project
}

#[tokio::test]
async fn test_enrich_fills_stats_and_finishes() {
    let h = harness(SyncConfig::default()).await;
    let project = seeded_with_pending(&h, &["a1", "a2"]).await;

    let outcome = h.ctx.enricher().run(project.id, 0).await.unwrap();
    assert_eq!(outcome, EnrichOutcome::Done { enriched: 2 });
    assert_eq!(commits::count_missing_stats(h.db.as_ref(), project.id).await.unwrap(), 0);
    assert!(h.queue.jobs().is_empty());
}

#[tokio::test]
async fn test_enrich_never_refetches_enriched_commits() {
    let h = harness(SyncConfig::default()).await;
    let project = seeded_with_pending(&h, &["a1", "a2"]).await;

    let a1 = Commit::find()
        .filter(commit_entity::Column::Sha.eq("a1"))
        .one(h.db.as_ref())
        .await
        .unwrap()
        .unwrap();
    commits::record_stats(h.db.as_ref(), a1.id, 1, 1, &[]).await.unwrap();

    let outcome = h.ctx.enricher().run(project.id, 0).await.unwrap();
    assert_eq!(outcome, EnrichOutcome::Done { enriched: 1 });
    assert_eq!(h.client.get_commit_calls.load(Ordering::SeqCst), 1);

    let a1 = Commit::find_by_id(a1.id).one(h.db.as_ref()).await.unwrap().unwrap();
    assert_eq!(a1.lines_added, Some(1));
}

#[tokio::test]
async fn test_enrich_defers_when_quota_is_nearly_spent() {
    let h = harness(SyncConfig::default()).await;
    let project = seeded_with_pending(&h, &["a1"]).await;
    h.client.set_rate_limit(blocked_quota(Duration::minutes(1)));

    let outcome = h.ctx.enricher().run(project.id, 0).await.unwrap();
    assert_eq!(h.client.get_commit_calls.load(Ordering::SeqCst), 0);

    let jobs = h.queue.jobs();
    assert_eq!(jobs.len(), 1);
    assert_eq!(
        jobs[0].job,
        Job::EnrichStats {
            project_id: project.id,
            attempt: 1
        }
    );
    // The reset is sooner than the minimum wait, so the minimum applies.
    assert_eq!(jobs[0].delay, Some(StdDuration::from_secs(5 * 60)));
    assert!(matches!(
        outcome,
        EnrichOutcome::Rescheduled {
            reason: RescheduleReason::RateLimited,
            attempt: 1,
            ..
        }
    ));
}

#[tokio::test]
async fn test_enrich_waits_for_distant_reset() {
    let h = harness(SyncConfig::default()).await;
    let project = seeded_with_pending(&h, &["a1"]).await;
    h.client.set_rate_limit(blocked_quota(Duration::minutes(20)));

    h.ctx.enricher().run(project.id, 3).await.unwrap();

    let delay = h.queue.jobs()[0].delay.unwrap();
    assert!(delay > StdDuration::from_secs(19 * 60), "{delay:?}");
    assert!(delay <= StdDuration::from_secs(20 * 60), "{delay:?}");
}

#[tokio::test]
async fn test_enrich_abandons_after_retry_budget() {
    let h = harness(SyncConfig::default()).await;
    let project = seeded_with_pending(&h, &["a1", "a2"]).await;
    h.client.set_rate_limit(blocked_quota(Duration::minutes(1)));

    let outcome = h.ctx.enricher().run(project.id, 10).await.unwrap();
    assert_eq!(
        outcome,
        EnrichOutcome::Abandoned {
            attempt: 10,
            remaining: 2
        }
    );
    assert!(h.queue.jobs().is_empty());
}

#[tokio::test]
async fn test_enrich_stops_batch_on_rate_limit() {
    let h = harness(SyncConfig::default()).await;
    let project = seeded_with_pending(&h, &["a1", "a2", "a3"]).await;
    h.client.rate_limit_after(1);

    let outcome = h.ctx.enricher().run(project.id, 0).await.unwrap();
    assert_eq!(
        outcome,
        EnrichOutcome::Rescheduled {
            delay: StdDuration::from_secs(5 * 60),
            attempt: 1,
            reason: RescheduleReason::RateLimited,
            enriched: 1,
        }
    );
    assert_eq!(h.client.get_commit_calls.load(Ordering::SeqCst), 2);
    assert_eq!(commits::count_missing_stats(h.db.as_ref(), project.id).await.unwrap(), 2);
}

#[tokio::test]
async fn test_enrich_continues_in_batches() {
    let config = SyncConfig {
        enrich: EnrichConfig {
            batch_size: 1,
            ..Default::default()
        },
        ..Default::default()
    };
    let h = harness(config).await;
    let project = seeded_with_pending(&h, &["a1", "a2"]).await;

    let outcome = h.ctx.enricher().run(project.id, 0).await.unwrap();
    assert_eq!(
        outcome,
        EnrichOutcome::Rescheduled {
            delay: StdDuration::from_secs(30),
            attempt: 1,
            reason: RescheduleReason::MoreRemaining,
            enriched: 1,
        }
    );
}

#[tokio::test]
async fn test_rescheduled_chain_keeps_ingest_from_starting_another() {
    let config = SyncConfig {
        enrich: EnrichConfig {
            batch_size: 1,
            ..Default::default()
        },
        ..Default::default()
    };
    let h = harness(config).await;
    let project = seeded_with_pending(&h, &["a1", "a2"]).await;

    let outcome = h.ctx.enricher().run(project.id, 0).await.unwrap();
    assert!(matches!(outcome, EnrichOutcome::Rescheduled { .. }));
    assert_eq!(h.queue.take().len(), 1);

    let main = branches::find_oldest(h.db.as_ref(), project.id, 1).await.unwrap().remove(0);
    h.client.push_commit("main", commit("a3", Some("alice"), "alice@example.com", "Alice", 3), 1, 1);
    let report = h
        .ctx
        .runner()
        .ingest(project.id, main.id, IngestMode::Fast)
        .await
        .unwrap();

    assert!(!report.enrichment_enqueued);
    assert!(h.queue.jobs().is_empty());
    assert!(
        h.lock
            .acquire(&enrich_chain_key(project.id), StdDuration::from_secs(1))
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_enrich_drops_missing_project() {
    let h = harness(SyncConfig::default()).await;
    let outcome = h.ctx.enricher().run(uuid::Uuid::new_v4(), 0).await.unwrap();
    assert_eq!(outcome, EnrichOutcome::ProjectMissing);
}

// ─── Discovery Tests ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_discover_adds_new_valid_branches() {
    let h = harness(SyncConfig::default()).await;
    let (_owner, project, main) = seeded(&h).await;
    for name in ["main", "feature/login", "bad..name", "release-1.0"] {
        h.client.add_branch(name);
    }

    let report = h.ctx.runner().discover(project.id).await.unwrap();
    assert_eq!(report.listed, 4);
    assert_eq!(report.invalid, 1);
    assert_eq!(report.created, 2);

    let all = branches::find_oldest(h.db.as_ref(), project.id, 10).await.unwrap();
    let names: Vec<&str> = all.iter().map(|b| b.name.as_str()).collect();
    assert_eq!(names, vec!["main", "feature/login", "release-1.0"]);
    assert_eq!(all[0].id, main.id);
}

#[tokio::test]
async fn test_discover_creates_default_branch_first() {
    let h = harness(SyncConfig::default()).await;
    let owner = insert_user(h.db.as_ref(), "alice@example.com", Some("alice"), Some("ghp_alice")).await;
    let project = insert_project(h.db.as_ref(), &owner, Some("acme/app"), None).await;
    for name in ["alpha", "beta", "gamma", "trunk"] {
        h.client.add_branch(name);
    }
    h.client.set_default_branch("trunk");

    let report = h.ctx.runner().discover(project.id).await.unwrap();
    assert_eq!(report.created, 4);

    h.ctx.poller().run_cycle(Utc::now()).await.unwrap();
    let polled = branches::find_oldest(h.db.as_ref(), project.id, 3).await.unwrap();
    let names: Vec<&str> = polled.iter().map(|b| b.name.as_str()).collect();
    assert_eq!(names, vec!["trunk", "alpha", "beta"]);

    let first = h.queue.jobs().remove(0).job;
    assert_eq!(
        first,
        Job::IngestBranch {
            project_id: project.id,
            branch_id: polled[0].id,
            mode: IngestMode::Fast,
        }
    );
}

// ─── Pipeline Tests ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_poll_ingest_enrich_pipeline() {
    let h = harness(SyncConfig::default()).await;
    let (_owner, project, _main) = seeded(&h).await;
    h.client.push_commit("main", commit("sha1", Some("alice"), "alice@example.com", "Alice", 1), 6, 2);
    h.client.push_commit("main", commit("sha2", None, "alice@example.com", "Alice", 2), 4, 0);

    h.ctx.poller().run_cycle(Utc::now()).await.unwrap();

    let runner = h.ctx.runner();
    let mut handled = 0;
    loop {
        let pending = h.queue.take();
        if pending.is_empty() {
            break;
        }
        for scheduled in pending {
            runner.handle(&scheduled.job).await.unwrap();
            handled += 1;
        }
    }

    // Ingest, then one enrichment run.
    assert_eq!(handled, 2);
    assert_eq!(commits::count_by_project(h.db.as_ref(), project.id).await.unwrap(), 2);
    assert_eq!(commits::count_missing_stats(h.db.as_ref(), project.id).await.unwrap(), 0);
}
