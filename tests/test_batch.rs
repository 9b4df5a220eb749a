//! Batch orchestrator behavior: event sequence, ordering, failure isolation and validation.

mod common;

use std::sync::Mutex;

use futures_util::StreamExt;
use image_reducer::batch::{BatchOrchestrator, ProgressEvent};
use image_reducer::config::TargetSize;
use image_reducer::format::format_bytes;
use image_reducer::results::ResultSummary;

use common::mock_compressor::ScriptedCompressor;
use common::test_images::{padded_png, source, sources};

const TARGET_100_KB: u64 = 100 * 1024;

#[tokio::test]
async fn test_one_start_event_per_image_then_final_100() {
    for n in 1..=10 {
        let mut mock = ScriptedCompressor::new();
        // fail every third image
        for i in (0..n).step_by(3) {
            mock = mock.failing_on(&format!("img-{}.png", i));
        }
        let orchestrator = BatchOrchestrator::new(mock);
        let events: Vec<ProgressEvent> = orchestrator
            .submit(sources(n), TARGET_100_KB, false)
            .unwrap()
            .collect()
            .await;

        let starts: Vec<(usize, u8)> = events
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::ItemStarted { index, percent, .. } => Some((*index, *percent)),
                _ => None,
            })
            .collect();
        let expected: Vec<(usize, u8)> = (0..n).map(|i| (i, (i * 100 / n) as u8)).collect();
        assert_eq!(starts, expected, "batch of {}", n);

        let tail = &events[events.len() - 2..];
        assert_eq!(tail[0], ProgressEvent::Finalizing { percent: 100 });
        match &tail[1] {
            ProgressEvent::Completed(outcome) => {
                assert_eq!(outcome.total, n);
                assert_eq!(outcome.results.len() + outcome.skipped.len(), n);
            }
            other => panic!("expected Completed, got {:?}", other),
        }
    }
}

#[tokio::test]
async fn test_all_success_keeps_input_order() {
    let mock = ScriptedCompressor::new();
    let orchestrator = BatchOrchestrator::new(mock.clone());
    let outcome = orchestrator
        .submit(sources(5), TARGET_100_KB, false)
        .unwrap()
        .drive(&|_: &ProgressEvent| {})
        .await;

    let names: Vec<&str> = outcome.results.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, ["img-0.png", "img-1.png", "img-2.png", "img-3.png", "img-4.png"]);
    assert!(outcome.skipped.is_empty());
    assert_eq!(mock.call_names(), names);
    assert_eq!(mock.max_in_flight(), 1);
}

#[tokio::test]
async fn test_failure_skips_image_and_batch_completes() {
    let mock = ScriptedCompressor::new().failing_on("img-1.png");
    let orchestrator = BatchOrchestrator::new(mock.clone());
    let events: Vec<ProgressEvent> = orchestrator
        .submit(sources(3), TARGET_100_KB, false)
        .unwrap()
        .collect()
        .await;

    let statuses: Vec<String> = events.iter().map(|e| e.status()).collect();
    assert_eq!(statuses[0], "Compressing 1 of 3: img-0.png");
    assert_eq!(statuses[1], "Compressing 2 of 3: img-1.png");
    assert!(matches!(
        &events[2],
        ProgressEvent::ItemSkipped { index: 1, name, .. } if name == "img-1.png"
    ));
    assert_eq!(statuses[3], "Compressing 3 of 3: img-2.png");
    assert_eq!(statuses[4], "Finalizing...");

    let ProgressEvent::Completed(outcome) = &events[5] else {
        panic!("expected Completed, got {:?}", events[5]);
    };
    assert_eq!(events.len(), 6);
    let names: Vec<&str> = outcome.results.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, ["img-0.png", "img-2.png"]);
    assert_eq!(outcome.skipped.len(), 1);
    assert!(outcome.skipped[0].reason.contains("scripted failure"));
    // the failure did not stop later images
    assert_eq!(mock.call_names().len(), 3);
}

#[tokio::test]
async fn test_every_image_failing_still_completes() {
    let mock = ScriptedCompressor::new()
        .failing_on("img-0.png")
        .failing_on("img-1.png");
    let outcome = BatchOrchestrator::new(mock)
        .submit(sources(2), TARGET_100_KB, false)
        .unwrap()
        .drive(&|_: &ProgressEvent| {})
        .await;
    assert!(outcome.results.is_empty());
    assert_eq!(outcome.skipped.len(), 2);
    assert_eq!(outcome.total, 2);
}

#[tokio::test]
async fn test_nothing_runs_until_polled() {
    let mock = ScriptedCompressor::new();
    let orchestrator = BatchOrchestrator::new(mock.clone());
    let mut run = orchestrator.submit(sources(2), TARGET_100_KB, false).unwrap();
    assert!(mock.call_names().is_empty());

    // The first event announces the image before it is compressed
    let first = run.next().await.unwrap();
    assert!(matches!(first, ProgressEvent::ItemStarted { index: 0, .. }));
    assert!(mock.call_names().is_empty());

    let rest: Vec<ProgressEvent> = run.collect().await;
    assert_eq!(rest.len(), 3);
    assert_eq!(mock.call_names().len(), 2);
}

#[tokio::test]
async fn test_invalid_batches_are_refused() {
    let orchestrator = BatchOrchestrator::new(ScriptedCompressor::new());
    assert!(orchestrator.submit(Vec::new(), TARGET_100_KB, false).is_err());
    assert!(orchestrator.submit(sources(11), TARGET_100_KB, false).is_err());
    assert!(orchestrator.submit(sources(1), 9 * 1024, false).is_err());
    assert!(orchestrator.submit(sources(1), 2001 * 1024, false).is_err());
    assert!(
        orchestrator
            .submit(sources(1), TargetSize::from_kb(2000).unwrap().bytes(), false)
            .is_ok()
    );
}

#[tokio::test]
async fn test_constraints_forwarded_to_compressor() {
    let mock = ScriptedCompressor::new();
    let orchestrator = BatchOrchestrator::new(mock.clone()).with_max_iterations(7);
    let image = source(0, "wide.png", common::test_images::gradient_png(40, 10));
    orchestrator
        .submit(vec![image], TARGET_100_KB, true)
        .unwrap()
        .drive(&|_: &ProgressEvent| {})
        .await;

    let calls = mock.calls();
    assert_eq!(calls.len(), 1);
    let constraints = calls[0].1;
    assert_eq!(constraints.max_bytes, TARGET_100_KB);
    assert_eq!(constraints.max_dimension, 40);
    assert!(constraints.preserve_resolution);
    assert_eq!(constraints.max_iterations, 7);
}

#[tokio::test]
async fn test_two_image_scenario_reports_positive_savings() {
    let large = source(0, "large.png", padded_png(3 * 1024 * 1024));
    let small = source(1, "small.png", padded_png(50 * 1024));
    let seen = Mutex::new(Vec::new());
    let sink = |event: &ProgressEvent| seen.lock().unwrap().push(event.percent());

    let outcome = BatchOrchestrator::new(ScriptedCompressor::new())
        .submit(vec![large, small], TARGET_100_KB, false)
        .unwrap()
        .drive(&sink)
        .await;

    assert_eq!(outcome.results.len(), 2);
    assert_eq!(outcome.results[0].original_size, 3 * 1024 * 1024);
    assert_eq!(outcome.results[1].original_size, 50 * 1024);

    let summary = ResultSummary::of(&outcome.results);
    let expected = outcome.results.iter().map(|r| r.original_size).sum::<u64>() as i64
        - outcome.results.iter().map(|r| r.new_size).sum::<u64>() as i64;
    assert_eq!(summary.saved(), expected);
    assert!(summary.saved() > 0);
    assert_eq!(summary.savings_text(), format_bytes(expected, 2));
    assert_eq!(summary.savings_text(), "2.9 MB");

    assert_eq!(
        seen.into_inner().unwrap(),
        vec![Some(0), Some(50), Some(100), Some(100)]
    );
}
