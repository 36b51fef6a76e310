mod common;
use crate::common::{RecordingSink, init_tracing, with_timeout};

use std::error::Error;

use bytes::Bytes;
use tokio::sync::mpsc;

use installd::broadcast::{ChannelSink, Frame, FrameSink, OutputRegistry, SinkError};
use installd::types::StreamTag;

type TestResult = Result<(), Box<dyn Error>>;

#[test]
fn output_is_buffered_and_fanned_out_in_order() {
    init_tracing();
    let registry = OutputRegistry::new();
    let (a, handle_a) = RecordingSink::boxed();
    let (b, handle_b) = RecordingSink::boxed();
    let _sub_a = registry.subscribe(a);
    let _sub_b = registry.subscribe(b);

    for chunk in ["one\n", "two\n", "three\n"] {
        registry.publish_output(chunk);
    }

    assert_eq!(registry.output(), Bytes::from_static(b"one\ntwo\nthree\n"));
    for handle in [&handle_a, &handle_b] {
        let frames = handle.frames();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0], Frame::output("one\n"));
        assert_eq!(frames[2], Frame::output("three\n"));
    }
}

#[test]
fn progress_is_delivered_but_not_buffered() {
    let registry = OutputRegistry::new();
    let (sink, handle) = RecordingSink::boxed();
    let _sub = registry.subscribe(sink);

    registry.publish_output("log line\n");
    registry.publish_progress("50%");

    assert_eq!(registry.output(), Bytes::from_static(b"log line\n"));
    assert_eq!(handle.progress_lines(), vec!["50%".to_string()]);
    assert_eq!(handle.frames()[1].tag, StreamTag::Progress);
}

#[test]
fn empty_chunks_are_ignored() {
    let registry = OutputRegistry::new();
    let (sink, handle) = RecordingSink::boxed();
    let _sub = registry.subscribe(sink);

    registry.publish_output(Bytes::new());
    registry.publish_progress("");

    assert!(handle.frames().is_empty());
    assert_eq!(registry.output_len(), 0);
}

#[test]
fn late_subscriber_gets_replay_then_live_tail() {
    let registry = OutputRegistry::new();
    registry.publish_output("a");
    registry.publish_output("b");

    let (sink, handle) = RecordingSink::boxed();
    let _sub = registry.subscribe(sink);
    registry.publish_output("c");

    let frames = handle.frames();
    assert_eq!(frames, vec![Frame::output("ab"), Frame::output("c")]);
    assert_eq!(handle.output(), registry.output());
}

#[test]
fn subscriber_on_empty_buffer_gets_no_replay_frame() {
    let registry = OutputRegistry::new();
    let (sink, handle) = RecordingSink::boxed();
    let _sub = registry.subscribe(sink);
    assert!(handle.frames().is_empty());
    assert_eq!(registry.subscriber_count(), 1);
}

#[tokio::test]
async fn failing_subscriber_is_removed_without_affecting_others() -> TestResult {
    init_tracing();
    let registry = OutputRegistry::new();
    let (bad, bad_handle) = RecordingSink::boxed();
    let (good, good_handle) = RecordingSink::boxed();
    let bad_sub = registry.subscribe(bad);
    let _good_sub = registry.subscribe(good);

    registry.publish_output("first");
    bad_handle.fail_with(SinkError::Closed);
    registry.publish_output("second");
    registry.publish_output("third");

    assert_eq!(registry.subscriber_count(), 1);
    assert!(bad_handle.is_dropped());
    assert_eq!(bad_handle.output(), Bytes::from_static(b"first"));
    assert_eq!(good_handle.output(), Bytes::from_static(b"firstsecondthird"));

    let id = bad_sub.id().clone();
    let released = with_timeout(bad_sub.closed()).await;
    assert_eq!(released, id);
    Ok(())
}

#[test]
fn failed_replay_never_registers_the_subscriber() {
    let registry = OutputRegistry::new();
    registry.publish_output("history");

    let (sink, handle) = RecordingSink::boxed();
    handle.fail_with(SinkError::Lagging { queued: 1 });
    let mut sub = registry.subscribe(sink);

    assert!(sub.is_closed());
    assert!(handle.is_dropped());
    assert_eq!(registry.subscriber_count(), 0);
}

#[test]
fn close_all_releases_every_subscriber() {
    let registry = OutputRegistry::new();
    let (a, handle_a) = RecordingSink::boxed();
    let (b, handle_b) = RecordingSink::boxed();
    let mut sub_a = registry.subscribe(a);
    let mut sub_b = registry.subscribe(b);
    assert!(!sub_a.is_closed());

    assert_eq!(registry.close_all(), 2);
    assert_eq!(registry.subscriber_count(), 0);
    assert!(sub_a.is_closed());
    assert!(sub_b.is_closed());
    assert!(handle_a.is_dropped() && handle_b.is_dropped());

    // Nothing left to close; output is untouched.
    registry.publish_output("after");
    assert_eq!(registry.close_all(), 0);
    assert_eq!(registry.output(), Bytes::from_static(b"after"));
}

#[tokio::test]
async fn closed_resolves_after_is_closed_saw_the_release() {
    let registry = OutputRegistry::new();
    let (sink, _handle) = RecordingSink::boxed();
    let mut sub = registry.subscribe(sink);
    let id = sub.id().clone();

    registry.close_all();
    assert!(sub.is_closed());
    assert!(sub.is_closed());

    assert_eq!(with_timeout(sub.closed()).await, id);
}

#[test]
fn unsubscribe_is_idempotent() {
    let registry = OutputRegistry::new();
    let (sink, handle) = RecordingSink::boxed();
    let sub = registry.subscribe(sink);

    assert!(registry.unsubscribe(sub.id()));
    assert!(!registry.unsubscribe(sub.id()));
    assert!(handle.is_dropped());
}

#[test]
fn replay_and_close_delivers_history_and_ends() {
    let registry = OutputRegistry::new();
    registry.publish_output("done\n");

    let (sink, handle) = RecordingSink::boxed();
    let mut sub = registry.replay_and_close(sink);

    assert!(sub.is_closed());
    assert_eq!(handle.frames(), vec![Frame::output("done\n")]);
    assert_eq!(registry.subscriber_count(), 0);
}

#[test]
fn clear_output_empties_the_buffer_only() {
    let registry = OutputRegistry::new();
    let (sink, _handle) = RecordingSink::boxed();
    let _sub = registry.subscribe(sink);
    registry.publish_output("something");

    registry.clear_output();

    assert_eq!(registry.output_len(), 0);
    assert_eq!(registry.subscriber_count(), 1);
}

#[tokio::test]
async fn channel_sink_reports_lagging_when_full() -> TestResult {
    let (tx, mut rx) = mpsc::channel(1);
    let mut sink = ChannelSink::new(tx);

    sink.try_write(&Frame::output("a"))?;
    let err = sink.try_write(&Frame::output("b")).unwrap_err();
    assert_eq!(err, SinkError::Lagging { queued: 1 });

    assert_eq!(rx.recv().await, Some(Frame::output("a")));
    drop(rx);
    assert_eq!(sink.try_write(&Frame::output("c")), Err(SinkError::Closed));
    Ok(())
}

#[tokio::test]
async fn slow_channel_subscriber_is_dropped() -> TestResult {
    let registry = OutputRegistry::new();
    let (tx, mut rx) = mpsc::channel(2);
    let sub = registry.subscribe(Box::new(ChannelSink::new(tx)));

    for chunk in ["1", "2", "3"] {
        registry.publish_output(chunk);
    }
    assert_eq!(registry.subscriber_count(), 0);
    with_timeout(sub.closed()).await;

    // The queued frames are still readable, then the stream ends.
    assert_eq!(rx.recv().await, Some(Frame::output("1")));
    assert_eq!(rx.recv().await, Some(Frame::output("2")));
    assert_eq!(rx.recv().await, None);
    Ok(())
}

#[test]
fn frames_serialise_as_tagged_json() -> TestResult {
    let output = Frame::output("hello\n").to_json()?;
    assert_eq!(output, r#"{"tag":"cmdOutput","data":"hello\n"}"#);

    let progress = Frame::progress("50%").to_json()?;
    assert_eq!(progress, r#"{"tag":"progress","data":"50%"}"#);
    Ok(())
}
