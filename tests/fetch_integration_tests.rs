//! Integration Tests for the Fetch Coordinator
//!
//! Drives the coordinator with the real HTTP fetcher and the persistent
//! backend against a local origin server.

mod common;

use std::sync::Arc;
use std::time::Duration;

use audio_cache::cache::ArtifactLocation;
use audio_cache::config::BackendKind;
use audio_cache::error::CacheError;
use audio_cache::{CacheMode, Config, FetchCoordinator};
use tempfile::TempDir;

use common::{spawn_origin, test_config, PAYLOAD_SIZE};

// == Helper Functions ==

async fn persistent_coordinator(config: &Config) -> FetchCoordinator {
    let coordinator = FetchCoordinator::from_config(config).unwrap();
    assert_eq!(coordinator.initialize().await, CacheMode::Cached);
    coordinator
}

/// Names of everything in `dir`, hidden partial files included.
fn dir_listing(dir: &std::path::Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

// == Obtain Tests ==

#[tokio::test]
async fn test_obtain_writes_artifact_file() {
    let origin = spawn_origin().await;
    let dir = TempDir::new().unwrap();
    let coordinator =
        persistent_coordinator(&test_config(dir.path(), BackendKind::Persistent)).await;

    let obtained = coordinator
        .obtain("dQw4w9WgXcQ", &origin.url("dQw4w9WgXcQ"))
        .await
        .unwrap();

    let expected = dir.path().join("dQw4w9WgXcQ.m4a");
    assert_eq!(obtained.handle, ArtifactLocation::File(expected.clone()));
    assert!(!obtained.from_cache);
    assert_eq!(obtained.size_bytes, Some(PAYLOAD_SIZE as u64));
    assert_eq!(std::fs::read(&expected).unwrap().len(), PAYLOAD_SIZE);
    assert_eq!(dir_listing(dir.path()), vec!["dQw4w9WgXcQ.m4a".to_string()]);

    let again = coordinator
        .obtain("dQw4w9WgXcQ", &origin.url("dQw4w9WgXcQ"))
        .await
        .unwrap();
    assert!(again.from_cache);
    assert_eq!(origin.gets(), 1);
    assert_eq!(origin.heads(), 1);
}

#[tokio::test]
async fn test_identifier_is_sanitized() {
    let origin = spawn_origin().await;
    let dir = TempDir::new().unwrap();
    let coordinator =
        persistent_coordinator(&test_config(dir.path(), BackendKind::Persistent)).await;

    let obtained = coordinator
        .obtain("a/b?c", &origin.url("song"))
        .await
        .unwrap();

    assert_eq!(obtained.key.to_string(), "a_b_c.m4a");
    assert_eq!(dir_listing(dir.path()), vec!["a_b_c.m4a".to_string()]);
}

#[tokio::test]
async fn test_probe_failure_skips_transfer() {
    let origin = spawn_origin().await;
    let dir = TempDir::new().unwrap();
    let coordinator =
        persistent_coordinator(&test_config(dir.path(), BackendKind::Persistent)).await;

    let result = coordinator.obtain("abc", &origin.url("missing")).await;

    assert!(matches!(result, Err(CacheError::SourceUnreachable(_))));
    assert_eq!(origin.gets(), 0);
    assert!(dir_listing(dir.path()).is_empty());
}

#[tokio::test]
async fn test_failed_transfer_leaves_no_entry() {
    let origin = spawn_origin().await;
    let dir = TempDir::new().unwrap();
    let coordinator =
        persistent_coordinator(&test_config(dir.path(), BackendKind::Persistent)).await;

    let result = coordinator.obtain("abc", &origin.url("broken")).await;

    assert!(matches!(result, Err(CacheError::FetchFailed(_))));
    assert!(dir_listing(dir.path()).is_empty());
    assert!(!coordinator.lookup("abc").await.unwrap().is_found());
}

#[tokio::test]
async fn test_probe_can_be_disabled() {
    let origin = spawn_origin().await;
    let dir = TempDir::new().unwrap();
    let config = Config {
        probe_before_fetch: false,
        ..test_config(dir.path(), BackendKind::Persistent)
    };
    let coordinator = persistent_coordinator(&config).await;

    coordinator.obtain("abc", &origin.url("abc")).await.unwrap();

    assert_eq!(origin.heads(), 0);
    assert_eq!(origin.gets(), 1);
}

#[tokio::test]
async fn test_stalled_transfer_times_out() {
    let origin = spawn_origin().await;
    let dir = TempDir::new().unwrap();
    let config = Config {
        fetch_timeout_secs: 1,
        ..test_config(dir.path(), BackendKind::Persistent)
    };
    let coordinator = persistent_coordinator(&config).await;

    let result = coordinator.obtain("abc", &origin.url("stalled")).await;

    assert!(matches!(result, Err(CacheError::FetchFailed(_))));
    assert!(dir_listing(dir.path()).is_empty());
    assert!(!coordinator.lookup("abc").await.unwrap().is_found());
}

#[tokio::test]
async fn test_stalled_probe_times_out() {
    let origin = spawn_origin().await;
    let dir = TempDir::new().unwrap();
    let config = Config {
        probe_timeout_secs: 1,
        ..test_config(dir.path(), BackendKind::Persistent)
    };
    let coordinator = persistent_coordinator(&config).await;

    let result = coordinator.obtain("abc", &origin.url("unresponsive")).await;

    assert!(matches!(result, Err(CacheError::SourceUnreachable(_))));
    assert_eq!(origin.gets(), 0);
    assert!(dir_listing(dir.path()).is_empty());
}

#[tokio::test]
async fn test_abandoned_obtain_registers_nothing() {
    let origin = spawn_origin().await;
    let dir = TempDir::new().unwrap();
    let coordinator =
        persistent_coordinator(&test_config(dir.path(), BackendKind::Persistent)).await;

    let abandoned = tokio::time::timeout(
        Duration::from_millis(500),
        coordinator.obtain("abc", &origin.url("stalled")),
    )
    .await;
    assert!(abandoned.is_err(), "Transfer should still be stalled");

    // The partial file goes with the dropped future
    assert!(dir_listing(dir.path()).is_empty());
    assert!(!coordinator.lookup("abc").await.unwrap().is_found());

    // The key is free again for a fresh transfer
    let obtained = coordinator.obtain("abc", &origin.url("abc")).await.unwrap();
    assert!(!obtained.from_cache);
}

// == Concurrency Tests ==

#[tokio::test]
async fn test_concurrent_obtains_transfer_once() {
    let origin = spawn_origin().await;
    let dir = TempDir::new().unwrap();
    let coordinator = Arc::new(
        persistent_coordinator(&test_config(dir.path(), BackendKind::Persistent)).await,
    );
    let url = origin.url("slow");

    let mut handles = Vec::new();
    for _ in 0..5 {
        let coordinator = coordinator.clone();
        let url = url.clone();
        handles.push(tokio::spawn(async move {
            coordinator.obtain("slow", &url).await.unwrap()
        }));
    }

    let mut locations = Vec::new();
    for handle in handles {
        locations.push(handle.await.unwrap().handle);
    }

    assert_eq!(origin.gets(), 1);
    assert!(locations.windows(2).all(|pair| pair[0] == pair[1]));
    assert_eq!(dir_listing(dir.path()), vec!["slow.m4a".to_string()]);
}

// == Eviction Tests ==

#[tokio::test]
async fn test_insert_triggers_size_eviction() {
    let origin = spawn_origin().await;
    let dir = TempDir::new().unwrap();
    let config = Config {
        // Room for two payloads; the target after eviction is 2000 bytes
        max_size_bytes: (PAYLOAD_SIZE * 5 / 2) as u64,
        target_fill_ratio: 0.8,
        ..test_config(dir.path(), BackendKind::Persistent)
    };
    let coordinator = persistent_coordinator(&config).await;

    for id in ["a", "b", "c"] {
        coordinator.obtain(id, &origin.url(id)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    assert_eq!(
        dir_listing(dir.path()),
        vec!["b.m4a".to_string(), "c.m4a".to_string()]
    );

    let stats = coordinator.stats().await;
    assert_eq!(stats.evictions, 1);
    assert_eq!(stats.total_size_bytes, (PAYLOAD_SIZE * 2) as u64);
}

#[tokio::test]
async fn test_oversized_artifact_is_kept() {
    let origin = spawn_origin().await;
    let dir = TempDir::new().unwrap();
    let config = Config {
        max_size_bytes: (PAYLOAD_SIZE / 2) as u64,
        ..test_config(dir.path(), BackendKind::Persistent)
    };
    let coordinator = persistent_coordinator(&config).await;

    let obtained = coordinator.obtain("big", &origin.url("big")).await.unwrap();

    assert!(obtained.handle.is_local());
    assert!(coordinator.lookup("big").await.unwrap().is_found());
}

#[tokio::test]
async fn test_expired_entry_is_fetched_again() {
    let origin = spawn_origin().await;
    let dir = TempDir::new().unwrap();
    let config = Config {
        max_age_secs: 1,
        ..test_config(dir.path(), BackendKind::Persistent)
    };
    let coordinator = persistent_coordinator(&config).await;

    coordinator.obtain("abc", &origin.url("abc")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(1100)).await;

    let obtained = coordinator.obtain("abc", &origin.url("abc")).await.unwrap();
    assert!(!obtained.from_cache);
    assert_eq!(origin.gets(), 2);
    assert_eq!(coordinator.stats().await.expirations, 1);
}

#[tokio::test]
async fn test_files_with_other_extensions_are_left_alone() {
    let origin = spawn_origin().await;
    let dir = TempDir::new().unwrap();
    let config = Config {
        max_size_bytes: PAYLOAD_SIZE as u64,
        ..test_config(dir.path(), BackendKind::Persistent)
    };
    let coordinator = persistent_coordinator(&config).await;
    let legacy = dir.path().join("legacy.mp3");
    std::fs::write(&legacy, vec![0u8; PAYLOAD_SIZE * 5]).unwrap();

    let stats = coordinator.stats().await;
    assert_eq!(stats.entry_count, 0);
    assert_eq!(stats.total_size_bytes, 0);

    let report = coordinator.evict().await.unwrap();
    assert_eq!(report.evicted, 0);
    assert!(legacy.exists());

    coordinator.obtain("abc", &origin.url("abc")).await.unwrap();
    assert!(legacy.exists());
    assert_eq!(coordinator.stats().await.entry_count, 1);
}

// == Lifecycle Tests ==

#[tokio::test]
async fn test_entries_survive_restart() {
    let origin = spawn_origin().await;
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path(), BackendKind::Persistent);

    {
        let coordinator = persistent_coordinator(&config).await;
        coordinator.obtain("abc", &origin.url("abc")).await.unwrap();
        coordinator.dispose();
    }

    let coordinator = persistent_coordinator(&config).await;
    let obtained = coordinator.obtain("abc", &origin.url("abc")).await.unwrap();

    assert!(obtained.from_cache);
    assert_eq!(obtained.size_bytes, Some(PAYLOAD_SIZE as u64));
    assert_eq!(origin.gets(), 1);
}

#[tokio::test]
async fn test_unusable_storage_degrades_to_pass_through() {
    let origin = spawn_origin().await;
    let blocker = tempfile::NamedTempFile::new().unwrap();
    let config = test_config(&blocker.path().join("cache"), BackendKind::Persistent);

    let coordinator = FetchCoordinator::from_config(&config).unwrap();
    assert_eq!(coordinator.initialize().await, CacheMode::Degraded);

    let url = origin.url("abc");
    let obtained = coordinator.obtain("abc", &url).await.unwrap();

    assert_eq!(obtained.handle, ArtifactLocation::Remote(url));
    assert!(!obtained.from_cache);
    assert_eq!(origin.gets(), 0);
    assert_eq!(origin.heads(), 0);

    // Invalid locators are still rejected in pass-through mode
    let result = coordinator.obtain("abc", "not a url").await;
    assert!(matches!(result, Err(CacheError::InvalidSource(_))));
}

#[tokio::test]
async fn test_clear_recovers_from_degraded_mode() {
    let origin = spawn_origin().await;
    let dir = TempDir::new().unwrap();
    let cache_dir = dir.path().join("cache");
    std::fs::write(&cache_dir, b"not a directory").unwrap();

    let coordinator =
        FetchCoordinator::from_config(&test_config(&cache_dir, BackendKind::Persistent)).unwrap();
    assert_eq!(coordinator.initialize().await, CacheMode::Degraded);

    std::fs::remove_file(&cache_dir).unwrap();
    coordinator.clear().await.unwrap();
    assert_eq!(coordinator.mode(), CacheMode::Cached);

    let obtained = coordinator.obtain("abc", &origin.url("abc")).await.unwrap();
    assert!(obtained.handle.is_local());
}

#[tokio::test]
async fn test_reference_backend_records_locator() {
    let origin = spawn_origin().await;
    let dir = TempDir::new().unwrap();
    let coordinator =
        persistent_coordinator(&test_config(dir.path(), BackendKind::EphemeralReference)).await;

    let url = origin.url("abc");
    let first = coordinator.obtain("abc", &url).await.unwrap();
    let second = coordinator.obtain("abc", &url).await.unwrap();

    assert_eq!(first.handle, ArtifactLocation::Remote(url));
    assert!(second.from_cache);
    assert_eq!(origin.gets(), 0);

    let stats = coordinator.stats().await;
    assert_eq!(stats.unknown_size_entries, 1);
    assert_eq!(stats.total_size_bytes, 0);
}
