//! Concurrent requests share one pipeline and never share scratch space

mod mocks;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use tempfile::TempDir;

use mocks::{candidate, leftover_entries, test_settings, MockProvider, MockTranscoder, RecordingTransport};
use tunefetch::core::types::{DeliveryStatus, SongRequest};
use tunefetch::download::Pipeline;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_identical_requests_get_separate_scratch_dirs() {
    let root = TempDir::new().unwrap();
    let provider = Arc::new(
        MockProvider::new(vec![candidate("Tarkan - Kuzu Kuzu", Some(210))]).with_fetch_delay(Duration::from_millis(30)),
    );
    let mut settings = test_settings(root.path());
    settings.max_concurrent_jobs = 2;
    let pipeline = Arc::new(Pipeline::new(
        provider.clone(),
        Arc::new(MockTranscoder::new()),
        settings,
    ));

    let mut tasks = Vec::new();
    for requester in 0..8 {
        let pipeline = Arc::clone(&pipeline);
        tasks.push(tokio::spawn(async move {
            let transport = RecordingTransport::new();
            let outcome = pipeline
                .handle(&SongRequest::new("tarkan kuzu kuzu", requester), &transport)
                .await;
            (outcome, transport.terminal_count())
        }));
    }

    for task in tasks {
        let (outcome, terminal) = task.await.unwrap();
        assert_eq!(outcome.status, DeliveryStatus::Sent);
        assert_eq!(terminal, 1);
    }

    let dirs: HashSet<_> = provider.output_dirs().into_iter().collect();
    assert_eq!(dirs.len(), 8);
    assert!(provider.max_in_flight() <= 2);
    assert!(leftover_entries(root.path()).is_empty());
    assert_eq!(pipeline.pool().available(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_slow_request_does_not_block_others_beyond_capacity() {
    let root = TempDir::new().unwrap();
    let slow = Arc::new(
        MockProvider::new(vec![candidate("Slow", Some(200))]).with_fetch_delay(Duration::from_millis(300)),
    );
    let mut settings = test_settings(root.path());
    settings.max_concurrent_jobs = 3;
    let pipeline = Arc::new(Pipeline::new(slow, Arc::new(MockTranscoder::new()), settings));

    let started = std::time::Instant::now();
    let handles: Vec<_> = (0..3)
        .map(|i| {
            let pipeline = Arc::clone(&pipeline);
            tokio::spawn(async move {
                let transport = RecordingTransport::new();
                pipeline.handle(&SongRequest::new("slow", i), &transport).await
            })
        })
        .collect();

    for handle in handles {
        assert!(handle.await.unwrap().is_sent());
    }
    // Three slots, three jobs: they ran side by side, not one after another
    assert!(started.elapsed() < Duration::from_millis(850));
    assert!(leftover_entries(root.path()).is_empty());
}

#[tokio::test]
async fn test_cancelled_request_releases_its_slot() {
    let root = TempDir::new().unwrap();
    let provider = Arc::new(
        MockProvider::new(vec![candidate("Slow", Some(200))]).with_fetch_delay(Duration::from_millis(500)),
    );
    let mut settings = test_settings(root.path());
    settings.max_concurrent_jobs = 1;
    let pipeline = Arc::new(Pipeline::new(
        provider.clone(),
        Arc::new(MockTranscoder::new()),
        settings,
    ));

    let request = {
        let pipeline = Arc::clone(&pipeline);
        tokio::spawn(async move {
            let transport = RecordingTransport::new();
            pipeline.handle(&SongRequest::new("slow", 1), &transport).await
        })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(pipeline.pool().available(), 0);

    request.abort();
    assert!(request.await.unwrap_err().is_cancelled());
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(pipeline.pool().available(), pipeline.pool().capacity());
    assert!(leftover_entries(root.path()).is_empty());

    // The fetch was cancelled with its caller, not left running detached
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(provider.completed_fetches(), 0);
    assert!(leftover_entries(root.path()).is_empty());
}
