//! Unit tests for socket failure classification.

use std::error::Error;
use std::fmt;
use std::io;

use axum::extract::ws::{close_code, CloseFrame};
use sockd::pump::closure::{is_expected_close_frame, is_expected_closure};

#[derive(Debug)]
struct Wrapped {
    inner: io::Error,
}

impl fmt::Display for Wrapped {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("websocket write failed")
    }
}

impl Error for Wrapped {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.inner)
    }
}

#[test]
fn broken_pipe_is_expected() {
    let err = io::Error::from(io::ErrorKind::BrokenPipe);
    assert!(is_expected_closure(&err));
}

#[test]
fn connection_reset_is_expected() {
    let err = io::Error::from(io::ErrorKind::ConnectionReset);
    assert!(is_expected_closure(&err));
}

#[test]
fn permission_denied_is_not_expected() {
    let err = io::Error::from(io::ErrorKind::PermissionDenied);
    assert!(!is_expected_closure(&err));
}

#[test]
fn closure_found_in_source_chain() {
    let err = Wrapped {
        inner: io::Error::from(io::ErrorKind::UnexpectedEof),
    };
    assert!(is_expected_closure(&err));
}

#[test]
fn wrapper_without_closure_cause_is_not_expected() {
    let err = Wrapped {
        inner: io::Error::other("disk on fire"),
    };
    assert!(!is_expected_closure(&err));
}

#[test]
fn closed_message_text_is_recognized_case_insensitively() {
    let err = io::Error::other("Trying to work with closed connection");
    assert!(is_expected_closure(&err));
}

#[test]
fn normal_and_abnormal_codes_are_expected() {
    for code in [close_code::NORMAL, close_code::ABNORMAL] {
        let frame = CloseFrame {
            code,
            reason: "".into(),
        };
        assert!(is_expected_close_frame(Some(&frame)), "code {code}");
    }
}

#[test]
fn internal_error_code_is_unexpected() {
    let frame = CloseFrame {
        code: close_code::ERROR,
        reason: "boom".into(),
    };
    assert!(!is_expected_close_frame(Some(&frame)));
}
