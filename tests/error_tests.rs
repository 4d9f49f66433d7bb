//! Tests for error types.
//!
//! Validates display formatting and the short form used outside verbose
//! mode.

use kitt::Error;
use std::path::PathBuf;

// =============================================================================
// Configuration Errors
// =============================================================================

#[test]
fn test_config_errors_carry_path() {
    let err = Error::ConfigNotFound {
        path: PathBuf::from("/home/me/kitt.toml"),
    };
    assert!(err.to_string().contains("/home/me/kitt.toml"));

    let err = Error::ConfigParse {
        path: PathBuf::from("/home/me/kitt.toml"),
        reason: "expected `=`".to_string(),
    };
    let msg = err.to_string();
    assert!(msg.contains("/home/me/kitt.toml"), "should include path");
    assert!(msg.contains("expected `=`"), "should include reason");
}

#[test]
fn test_settings_exist_suggests_force() {
    let err = Error::SettingsExist {
        path: PathBuf::from("/home/me/.config/kitt/config.json"),
    };
    assert!(err.to_string().contains("--force"));
}

// =============================================================================
// Volume / Image Errors
// =============================================================================

#[test]
fn test_volume_mode_display() {
    let err = Error::InvalidVolumeMode {
        volume: "/a:/b:bogus".to_string(),
        mode: "bogus".to_string(),
    };
    let msg = err.to_string();
    assert!(msg.contains("bogus"));
    assert!(msg.contains("/a:/b:bogus"));
}

#[test]
fn test_image_errors_display() {
    assert_eq!(
        Error::ImageNotFound("kitt:dev".to_string()).to_string(),
        "image kitt:dev not found"
    );
    assert!(
        Error::NotKittImage("kitt:dev".to_string())
            .to_string()
            .contains("not a kitt image")
    );
}

// =============================================================================
// Engine Errors
// =============================================================================

#[test]
fn test_engine_command_short_message_hides_stderr() {
    let err = Error::EngineCommand {
        operation: "build".to_string(),
        reason: "failed to solve: process \"/bin/sh -c apt-get\" did not complete".to_string(),
    };

    assert!(err.to_string().contains("failed to solve"));
    let short = err.short_message();
    assert!(short.starts_with("build failed"));
    assert!(!short.contains("failed to solve"));
}

#[test]
fn test_engine_unavailable_short_message() {
    let err = Error::EngineUnavailable {
        engine: "podman".to_string(),
        reason: "No such file or directory (os error 2)".to_string(),
    };
    assert!(err.short_message().contains("podman"));
    assert!(!err.short_message().contains("os error"));
}

#[test]
fn test_other_errors_short_message_is_display() {
    let err = Error::UserNotFound("ghost".to_string());
    assert_eq!(err.short_message(), err.to_string());
}

// =============================================================================
// Conversions
// =============================================================================

#[test]
fn test_io_error_conversion() {
    let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
    let err: Error = io.into();
    assert!(matches!(err, Error::Io(_)));
}

#[test]
fn test_serde_json_error_conversion() {
    let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    let err: Error = json_err.into();
    assert!(matches!(err, Error::Serialization(_)));
}
