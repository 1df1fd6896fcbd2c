use std::sync::Arc;

use dns_inventory::repository::SyncRunRepository;
use dns_inventory::services::{LockManager, MAX_STALE_AGE};
use dns_inventory::types::{ServiceType, SyncStats, SyncStatus, TriggerType};
use futures::future::join_all;
use sqlx::PgPool;

use crate::common::*;

struct LockHarness {
    pool: PgPool,
    repo: SyncRunRepository,
    locks: Arc<LockManager>,
}

async fn harness() -> LockHarness {
    let pool = fresh_test_db().await;
    let repo = SyncRunRepository::new(pool.clone());
    let locks = Arc::new(LockManager::new(repo.clone()));
    LockHarness { pool, repo, locks }
}

fn stats(found: i64, added: i64) -> SyncStats {
    SyncStats {
        found,
        added,
        updated: 0,
        removed: 0,
    }
}

#[tokio::test]
async fn acquire_creates_running_row_and_release_completes_it() {
    let h = harness().await;

    let lock = h
        .locks
        .try_acquire("godaddy_dns", ServiceType::DnsRecords, TriggerType::Manual)
        .await
        .unwrap()
        .expect("first acquire should win");
    assert!(h.repo.has_running("godaddy_dns").await.unwrap());
    assert!(h.locks.is_held_locally("godaddy_dns"));

    h.locks.release(lock, stats(5, 3), None).await.unwrap();

    let run = h.repo.latest_for("godaddy_dns").await.unwrap().unwrap();
    assert_eq!(run.status, SyncStatus::Completed);
    assert_eq!(run.trigger_type, TriggerType::Manual);
    assert_eq!(run.records_found, 5);
    assert_eq!(run.records_added, 3);
    assert!(run.completed_at.is_some());
    assert!(!h.locks.is_held_locally("godaddy_dns"));
}

#[tokio::test]
async fn second_acquire_is_refused_until_release() {
    let h = harness().await;

    let lock = h
        .locks
        .try_acquire("godaddy_dns", ServiceType::DnsRecords, TriggerType::Scheduled)
        .await
        .unwrap()
        .expect("first acquire should win");

    let contended = h
        .locks
        .try_acquire("godaddy_dns", ServiceType::DnsRecords, TriggerType::Scheduled)
        .await
        .unwrap();
    assert!(contended.is_none(), "second acquire must be refused");

    // A different collector is unaffected.
    let other = h
        .locks
        .try_acquire("cloudflare_dns", ServiceType::DnsRecords, TriggerType::Scheduled)
        .await
        .unwrap()
        .expect("different collectors lock independently");
    h.locks.release(other, SyncStats::default(), None).await.unwrap();

    h.locks.release(lock, SyncStats::default(), None).await.unwrap();

    let reacquired = h
        .locks
        .try_acquire("godaddy_dns", ServiceType::DnsRecords, TriggerType::Scheduled)
        .await
        .unwrap();
    assert!(reacquired.is_some(), "lock is free again after release");
    h.locks
        .release(reacquired.unwrap(), SyncStats::default(), None)
        .await
        .unwrap();
}

#[tokio::test]
async fn cross_process_contention_via_the_running_row() {
    let h = harness().await;
    // A second manager over the same database models another process.
    let other_process = LockManager::new(h.repo.clone());

    let lock = h
        .locks
        .try_acquire("godaddy_dns", ServiceType::DnsRecords, TriggerType::Scheduled)
        .await
        .unwrap()
        .expect("first process wins");

    let contended = other_process
        .try_acquire("godaddy_dns", ServiceType::DnsRecords, TriggerType::Manual)
        .await
        .unwrap();
    assert!(contended.is_none(), "the running row blocks other processes");
    assert!(!other_process.is_held_locally("godaddy_dns"));

    h.locks.release(lock, SyncStats::default(), None).await.unwrap();
}

#[tokio::test]
async fn concurrent_acquires_have_exactly_one_winner() {
    let h = harness().await;

    let attempts = (0..8).map(|_| {
        let locks = h.locks.clone();
        tokio::spawn(async move {
            locks
                .try_acquire("godaddy_dns", ServiceType::DnsRecords, TriggerType::Manual)
                .await
                .unwrap()
        })
    });

    let outcomes: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    let winners: Vec<_> = outcomes.into_iter().flatten().collect();
    assert_eq!(winners.len(), 1, "exactly one task may hold the lock");

    let runs = h.repo.latest_per_collector().await.unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status, SyncStatus::Running);

    for lock in winners {
        h.locks.release(lock, SyncStats::default(), None).await.unwrap();
    }
}

#[tokio::test]
async fn release_with_error_marks_the_run_failed() {
    let h = harness().await;

    let lock = h
        .locks
        .try_acquire("godaddy_dns", ServiceType::DnsRecords, TriggerType::Scheduled)
        .await
        .unwrap()
        .unwrap();

    h.locks
        .release(lock, SyncStats::default(), Some("upstream exploded"))
        .await
        .unwrap();

    let run = h.repo.latest_for("godaddy_dns").await.unwrap().unwrap();
    assert_eq!(run.status, SyncStatus::Failed);
    assert_eq!(run.error_message.as_deref(), Some("upstream exploded"));
}

#[tokio::test]
async fn stale_locks_are_failed_at_startup_only_when_old() {
    let h = harness().await;

    // An abandoned lock from a crashed predecessor, three hours old.
    let stale = h
        .repo
        .insert_running("godaddy_dns", ServiceType::DnsRecords, TriggerType::Scheduled)
        .await
        .unwrap();
    backdate_sync_run(&h.pool, stale.id, 3).await;

    // A legitimately running sweep, started just now.
    let fresh = h
        .repo
        .insert_running("cloudflare_dns", ServiceType::DnsRecords, TriggerType::Scheduled)
        .await
        .unwrap();

    let recovered = h.locks.recover_stale(MAX_STALE_AGE).await.unwrap();
    assert_eq!(recovered, 1);

    let stale_run = h.repo.latest_for("godaddy_dns").await.unwrap().unwrap();
    assert_eq!(stale_run.status, SyncStatus::Failed);
    assert_eq!(
        stale_run.error_message.as_deref(),
        Some("Process terminated unexpectedly")
    );

    let fresh_run = h.repo.latest_for("cloudflare_dns").await.unwrap().unwrap();
    assert_eq!(fresh_run.status, SyncStatus::Running, "young locks are untouched");
    assert_eq!(fresh_run.id, fresh.id);
}
