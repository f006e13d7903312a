//! Unit tests for `AppError` display format and conversions.

use sockd::AppError;

#[test]
fn every_variant_prefixes_its_kind() {
    let cases = [
        (AppError::Config("x".into()), "config: x"),
        (AppError::Spawn("x".into()), "spawn: x"),
        (AppError::Process("x".into()), "process: x"),
        (AppError::Protocol("x".into()), "protocol: x"),
        (AppError::Socket("x".into()), "socket: x"),
        (AppError::Io("x".into()), "io: x"),
    ];
    for (err, expected) in cases {
        assert_eq!(err.to_string(), expected);
    }
}

#[test]
fn spawn_error_is_distinct_from_process_error() {
    let spawn = AppError::Spawn("no such file".into());
    let process = AppError::Process("no such file".into());
    assert_ne!(spawn.to_string(), process.to_string());
}

#[test]
fn json_error_converts_to_protocol() {
    let json_err = serde_json::from_str::<serde_json::Value>("{{").unwrap_err();
    let err: AppError = json_err.into();
    assert!(
        matches!(err, AppError::Protocol(ref msg) if msg.starts_with("malformed json")),
        "got {err:?}"
    );
}

#[test]
fn toml_error_converts_to_config() {
    let toml_err = toml::from_str::<toml::Value>("port = ").unwrap_err();
    let err: AppError = toml_err.into();
    assert!(matches!(err, AppError::Config(_)), "got {err:?}");
}

#[test]
fn io_error_converts_to_io() {
    let err: AppError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
    assert_eq!(err.to_string(), "io: gone");
}

#[test]
fn app_error_implements_std_error_trait() {
    let err: Box<dyn std::error::Error> = Box::new(AppError::Socket("reset".into()));
    assert_eq!(err.to_string(), "socket: reset");
}
