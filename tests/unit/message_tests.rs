//! Unit tests for the wire message format.

use regex::Regex;
use sockd::message::{
    decode_frame, encode_frame, is_valid_timestamp_format, Message, StreamType,
    DEFAULT_TIMESTAMP_FORMAT,
};
use sockd::AppError;

#[test]
fn stdin_message_decodes() {
    let msg = decode_frame(br#"{"type":"stdin","arg":"ls -la"}"#).expect("valid frame");
    assert_eq!(msg, Message::new(StreamType::Stdin, "ls -la"));
}

#[test]
fn unknown_type_decodes_as_unknown() {
    let msg = decode_frame(br#"{"type":"resize","arg":"80x24"}"#).expect("valid frame");
    assert_eq!(msg.kind, StreamType::Unknown);
    assert_eq!(msg.arg, "80x24");
}

#[test]
fn missing_fields_take_defaults() {
    let msg = decode_frame(br#"{"arg":"hello"}"#).expect("valid frame");
    assert_eq!(msg.kind, StreamType::None);

    let msg = decode_frame(br#"{"type":"stdin"}"#).expect("valid frame");
    assert_eq!(msg, Message::new(StreamType::Stdin, ""));
}

#[test]
fn extra_fields_are_ignored() {
    let msg = decode_frame(br#"{"type":"stdin","arg":"x","seq":7}"#).expect("valid frame");
    assert_eq!(msg, Message::new(StreamType::Stdin, "x"));
}

#[test]
fn non_json_is_a_protocol_error() {
    let err = decode_frame(b"hello there").unwrap_err();
    assert!(matches!(err, AppError::Protocol(_)), "got {err:?}");
}

#[test]
fn non_object_json_is_a_protocol_error() {
    let err = decode_frame(b"[1,2,3]").unwrap_err();
    assert!(matches!(err, AppError::Protocol(_)), "got {err:?}");
}

#[test]
fn non_string_arg_is_a_protocol_error() {
    let err = decode_frame(br#"{"type":"stdin","arg":42}"#).unwrap_err();
    assert!(matches!(err, AppError::Protocol(_)), "got {err:?}");
}

#[test]
fn encode_uses_type_and_arg_keys() {
    let json = encode_frame(&Message::new(StreamType::Stdout, "x\n"));
    assert_eq!(json, r#"{"type":"stdout","arg":"x\n"}"#);
}

#[test]
fn encoded_frame_decodes_to_same_message() {
    let original = Message::new(StreamType::Stderr, "quote \" and unicode ✓");
    let decoded = decode_frame(encode_frame(&original).as_bytes()).expect("valid frame");
    assert_eq!(decoded, original);
}

#[test]
fn stamped_line_uses_default_layout() {
    let msg = Message::stamped(StreamType::Stdout, "hello", DEFAULT_TIMESTAMP_FORMAT);
    let pattern = Regex::new(
        r"^\[[A-Z][a-z]+day, \d{2}-[A-Z][a-z]{2}-\d{2} \d{2}:\d{2}:\d{2} \S+\] hello\n$",
    )
    .unwrap();
    assert_eq!(msg.kind, StreamType::Stdout);
    assert!(pattern.is_match(&msg.arg), "unexpected stamp: {:?}", msg.arg);
}

#[test]
fn stamped_line_honors_custom_layout() {
    let msg = Message::stamped(StreamType::Stderr, "oops", "%Y");
    let pattern = Regex::new(r"^\[\d{4}\] oops\n$").unwrap();
    assert!(pattern.is_match(&msg.arg), "unexpected stamp: {:?}", msg.arg);
}

#[test]
fn stamped_empty_line_keeps_prefix() {
    let msg = Message::stamped(StreamType::Stdout, "", "%Y");
    assert!(msg.arg.ends_with("] \n"), "got {:?}", msg.arg);
}

#[test]
fn timestamp_format_validation() {
    assert!(is_valid_timestamp_format(DEFAULT_TIMESTAMP_FORMAT));
    assert!(is_valid_timestamp_format("%Y-%m-%dT%H:%M:%S%.3f"));
    assert!(is_valid_timestamp_format("no specifiers at all"));
    assert!(!is_valid_timestamp_format("%Q"));
}
