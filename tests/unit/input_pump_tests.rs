//! Unit tests for the input pump.

use std::io;
use std::time::Duration;

use axum::extract::ws::{close_code, CloseFrame, Message as Frame};
use futures::stream;
use sockd::mode::MalformedFramePolicy;
use sockd::pump::input::{run_input_pump, InputExit, InputSettings};

fn settings(malformed_frames: MalformedFramePolicy) -> InputSettings {
    InputSettings {
        idle_timeout: Duration::from_secs(5),
        malformed_frames,
    }
}

fn text(json: &str) -> io::Result<Frame> {
    Ok(Frame::text(json.to_owned()))
}

async fn pump(frames: Vec<io::Result<Frame>>, policy: MalformedFramePolicy) -> (InputExit, String) {
    let mut stdin = Vec::new();
    let exit = run_input_pump(stream::iter(frames), &mut stdin, settings(policy)).await;
    (exit, String::from_utf8(stdin).expect("utf-8 stdin"))
}

#[tokio::test]
async fn stdin_messages_are_written_with_newline_in_order() {
    let (exit, stdin) = pump(
        vec![
            text(r#"{"type":"stdin","arg":"first"}"#),
            text(r#"{"type":"stdin","arg":"second"}"#),
        ],
        MalformedFramePolicy::Skip,
    )
    .await;
    assert_eq!(exit, InputExit::PeerClosed);
    assert_eq!(stdin, "first\nsecond\n");
}

#[tokio::test]
async fn empty_arg_writes_bare_newline() {
    let (_, stdin) = pump(vec![text(r#"{"type":"stdin","arg":""}"#)], MalformedFramePolicy::Skip).await;
    assert_eq!(stdin, "\n");
}

#[tokio::test]
async fn other_types_never_reach_stdin() {
    let (exit, stdin) = pump(
        vec![
            text(r#"{"type":"stdout","arg":"spoofed"}"#),
            text(r#"{"type":"stderr","arg":"spoofed"}"#),
            text(r#"{"type":"none","arg":"spoofed"}"#),
            text(r#"{"type":"resize","arg":"spoofed"}"#),
            text(r#"{"arg":"untyped"}"#),
            text(r#"{"type":"stdin","arg":"real"}"#),
        ],
        MalformedFramePolicy::Skip,
    )
    .await;
    assert_eq!(exit, InputExit::PeerClosed);
    assert_eq!(stdin, "real\n");
}

#[tokio::test]
async fn malformed_frame_is_skipped_by_default() {
    let (exit, stdin) = pump(
        vec![
            text("definitely not json"),
            text(r#"{"type":"stdin","arg":"after"}"#),
        ],
        MalformedFramePolicy::Skip,
    )
    .await;
    assert_eq!(exit, InputExit::PeerClosed);
    assert_eq!(stdin, "after\n");
}

#[tokio::test]
async fn malformed_frame_ends_pump_under_close_policy() {
    let (exit, stdin) = pump(
        vec![
            text("definitely not json"),
            text(r#"{"type":"stdin","arg":"after"}"#),
        ],
        MalformedFramePolicy::Close,
    )
    .await;
    assert!(matches!(exit, InputExit::MalformedFrame(_)), "got {exit:?}");
    assert!(stdin.is_empty());
}

#[tokio::test]
async fn binary_frames_carry_messages_too() {
    let frame = Frame::Binary(br#"{"type":"stdin","arg":"bin"}"#.to_vec().into());
    let (_, stdin) = pump(vec![Ok(frame)], MalformedFramePolicy::Skip).await;
    assert_eq!(stdin, "bin\n");
}

#[tokio::test]
async fn ping_and_pong_are_ignored() {
    let (exit, stdin) = pump(
        vec![
            Ok(Frame::Ping(vec![1u8, 2].into())),
            Ok(Frame::Pong(vec![3u8].into())),
            text(r#"{"type":"stdin","arg":"still here"}"#),
        ],
        MalformedFramePolicy::Skip,
    )
    .await;
    assert_eq!(exit, InputExit::PeerClosed);
    assert_eq!(stdin, "still here\n");
}

#[tokio::test]
async fn close_frame_stops_before_later_frames() {
    let (exit, stdin) = pump(
        vec![
            Ok(Frame::Close(Some(CloseFrame {
                code: close_code::AWAY,
                reason: "bye".into(),
            }))),
            text(r#"{"type":"stdin","arg":"too late"}"#),
        ],
        MalformedFramePolicy::Skip,
    )
    .await;
    assert_eq!(exit, InputExit::PeerClosed);
    assert!(stdin.is_empty());
}

#[tokio::test]
async fn reset_read_counts_as_peer_closed() {
    let (exit, _) = pump(
        vec![Err(io::Error::from(io::ErrorKind::ConnectionReset))],
        MalformedFramePolicy::Skip,
    )
    .await;
    assert_eq!(exit, InputExit::PeerClosed);
}

#[tokio::test]
async fn other_read_errors_are_reported() {
    let (exit, _) = pump(
        vec![Err(io::Error::other("tls alert"))],
        MalformedFramePolicy::Skip,
    )
    .await;
    assert!(matches!(exit, InputExit::ReadFailed(ref msg) if msg.contains("tls alert")), "got {exit:?}");
}

#[tokio::test]
async fn silent_client_hits_idle_timeout() {
    let mut stdin = Vec::new();
    let frames = stream::pending::<io::Result<Frame>>();
    let settings = InputSettings {
        idle_timeout: Duration::from_millis(50),
        malformed_frames: MalformedFramePolicy::Skip,
    };
    let exit = run_input_pump(frames, &mut stdin, settings).await;
    assert_eq!(exit, InputExit::IdleTimeout);
}

#[tokio::test]
async fn failed_stdin_write_does_not_end_pump() {
    let (closed_writer, reader) = tokio::io::duplex(8);
    drop(reader);
    let frames = stream::iter(vec![
        text(r#"{"type":"stdin","arg":"lost"}"#),
        text(r#"{"type":"stdin","arg":"also lost"}"#),
    ]);
    let exit = run_input_pump(frames, closed_writer, settings(MalformedFramePolicy::Skip)).await;
    assert_eq!(exit, InputExit::PeerClosed);
}
