mod common;

use std::{
    sync::{atomic::Ordering, Arc},
    time::Duration,
};

use common::{DelayLeaf, PanicLeaf, PanicRoot, RecordingAggregator, StuckLeaf};
use tokio_util::sync::CancellationToken;
use wfaas::{event_channel, Event, NodeError, RunState, StreamNode, TaskGraph, TaskNode};

fn messages(events: &[Event]) -> Vec<&str> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::Message(text) => Some(text.as_str()),
            _ => None,
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_aggregator_waits_for_slowest_leaf() {
    let fast = DelayLeaf::ok("fast", 10, "quick look");
    let slow = DelayLeaf::ok("slow", 5_000, "careful look");
    let aggregator = Arc::new(RecordingAggregator::default());

    let graph = TaskGraph::fan_out(
        vec![fast.clone() as Arc<dyn TaskNode>, slow.clone()],
        aggregator.clone() as Arc<dyn StreamNode>,
    );
    let state = Arc::new(RunState::new("meal.jpg"));
    let (sink, stream) = event_channel(16);

    let started = tokio::time::Instant::now();
    graph
        .execute(state.clone(), sink, CancellationToken::new())
        .await
        .unwrap();
    assert!(started.elapsed() >= Duration::from_millis(5_000));

    assert_eq!(aggregator.runs.load(Ordering::SeqCst), 1);
    assert_eq!(
        *aggregator.seen.lock(),
        vec![
            ("fast".to_string(), Some("quick look".to_string())),
            ("slow".to_string(), Some("careful look".to_string())),
        ]
    );
    assert_eq!(fast.runs.load(Ordering::SeqCst), 1);
    assert_eq!(slow.runs.load(Ordering::SeqCst), 1);

    let events = stream.collect_all().await;
    assert_eq!(
        messages(&events),
        vec!["fast=quick look; slow=careful look"]
    );
    assert_eq!(events.last(), Some(&Event::Message("fast=quick look; slow=careful look".into())));
}

#[tokio::test(start_paused = true)]
async fn test_failed_leaf_becomes_placeholder() {
    let good = DelayLeaf::ok("visual_analysis", 20, "crispy edges");
    let bad = DelayLeaf::failing("process_analysis", 5, "upstream timed out");
    let aggregator = Arc::new(RecordingAggregator::default());

    let graph = TaskGraph::fan_out(
        vec![good as Arc<dyn TaskNode>, bad],
        aggregator.clone() as Arc<dyn StreamNode>,
    );
    let (sink, stream) = event_channel(16);
    graph
        .execute(Arc::new(RunState::new("x.jpg")), sink, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(aggregator.runs.load(Ordering::SeqCst), 1);
    let events = stream.collect_all().await;
    let summary = messages(&events)[0];
    assert!(summary.contains("visual_analysis=crispy edges"));
    assert!(summary.contains(
        "process_analysis=process_analysis failed: model call failed: upstream timed out"
    ));
}

#[tokio::test]
async fn test_panicked_leaf_becomes_placeholder() {
    let aggregator = Arc::new(RecordingAggregator::default());
    let graph = TaskGraph::fan_out(
        vec![
            Arc::new(PanicLeaf) as Arc<dyn TaskNode>,
            DelayLeaf::ok("calm", 0, "fine"),
        ],
        aggregator.clone() as Arc<dyn StreamNode>,
    );
    let (sink, stream) = event_channel(16);
    graph
        .execute(Arc::new(RunState::new("x.jpg")), sink, CancellationToken::new())
        .await
        .unwrap();
    drop(stream);

    let seen = aggregator.seen.lock().clone();
    assert_eq!(
        seen[0],
        (
            "panicky".to_string(),
            Some("panicky failed: node panicked: leaf exploded".to_string())
        )
    );
    assert_eq!(seen[1].1.as_deref(), Some("fine"));
}

#[tokio::test]
async fn test_final_node_panic_publishes_error() {
    let graph = TaskGraph::single(Arc::new(PanicRoot));
    let (sink, stream) = event_channel(4);
    let err = graph
        .execute(Arc::new(RunState::new("x.jpg")), sink, CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, NodeError::Panicked(ref msg) if msg == "root exploded"));

    assert_eq!(
        stream.collect_all().await,
        vec![
            Event::Thought("working".into()),
            Event::Error("exploding_root failed: node panicked: root exploded".into()),
        ]
    );
}

#[tokio::test]
async fn test_single_node_graph() {
    let aggregator = Arc::new(RecordingAggregator::default());
    let graph = TaskGraph::single(aggregator.clone());
    assert!(graph.leaf_names().is_empty());
    assert_eq!(graph.root_name(), "aggregator");

    let (sink, stream) = event_channel(4);
    graph
        .execute(Arc::new(RunState::new("x.jpg")), sink, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(stream.collect_all().await, vec![Event::Message(String::new())]);
}

#[tokio::test]
async fn test_final_node_failure_publishes_one_error() {
    let aggregator = RecordingAggregator::failing("connection refused");
    let graph = TaskGraph::fan_out(
        vec![DelayLeaf::ok("leaf", 0, "text") as Arc<dyn TaskNode>],
        aggregator as Arc<dyn StreamNode>,
    );

    let (sink, stream) = event_channel(16);
    let err = graph
        .execute(Arc::new(RunState::new("x.jpg")), sink, CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, NodeError::ModelCall(_)));

    let events = stream.collect_all().await;
    let errors: Vec<_> = events
        .iter()
        .filter(|e| matches!(e, Event::Error(_)))
        .collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(
        events.last(),
        Some(&Event::Error(
            "aggregator failed: model call failed: connection refused".into()
        ))
    );
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_skips_aggregator() {
    let aggregator = Arc::new(RecordingAggregator::default());
    let graph = TaskGraph::fan_out(
        vec![Arc::new(StuckLeaf) as Arc<dyn TaskNode>],
        aggregator.clone() as Arc<dyn StreamNode>,
    );
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        trigger.cancel();
    });

    let (sink, _stream) = event_channel(4);
    let err = graph
        .execute(Arc::new(RunState::new("x.jpg")), sink, cancel)
        .await
        .unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(aggregator.runs.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_dropped_consumer_cancels_run() {
    let (sink, stream) = event_channel(1);
    drop(stream);
    let cancel = CancellationToken::new();
    let ctx = wfaas::NodeContext::new(Arc::new(RunState::new("x.jpg")), sink, cancel.clone());

    assert!(!ctx.emit(Event::Thought("hello?".into())).await);
    assert!(cancel.is_cancelled());
}
