use oauth2_orchestrator::audit::{AuditLogger, EventType};
use oauth2_orchestrator::config::AuditConfig;
use std::fs;

fn file_config(path: std::path::PathBuf) -> AuditConfig {
    AuditConfig {
        enabled: true,
        file: Some(path),
        stdout: false,
    }
}

#[test]
fn logged_entries_round_trip_through_the_file() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("audit.log");

    let logger = AuditLogger::new(&file_config(path.clone())).unwrap();
    logger.log_login_accepted("web");
    logger.log_token_exchanged("S1", "web");
    logger.log_token_revoked("S1");

    let content = fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 3);

    let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(first["event_type"], "login_accepted");
    assert_eq!(first["client_id"], "web");

    let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
    assert_eq!(second["event_type"], "token_exchanged");
    assert_eq!(second["session_id"], "S1");

    let third: serde_json::Value = serde_json::from_str(lines[2]).unwrap();
    assert_eq!(third["event_type"], "token_revoked");
}

#[test]
fn disabled_entries_never_reach_the_file() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("audit.log");

    let mut config = file_config(path.clone());
    config.enabled = false;
    let logger = AuditLogger::new(&config).unwrap();
    logger.log_error("should not be written");

    // `new` still creates the (empty) file handle; nothing should have
    // been appended to it.
    let content = fs::read_to_string(&path).unwrap_or_default();
    assert!(content.is_empty());
}

#[test]
fn rate_limited_entries_carry_email_and_failure() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("audit.log");

    let logger = AuditLogger::new(&file_config(path.clone())).unwrap();
    logger.log_rate_limited("blocked@example.com");

    let content = fs::read_to_string(&path).unwrap();
    let entry: serde_json::Value = serde_json::from_str(content.trim()).unwrap();
    assert_eq!(entry["event_type"], "rate_limited");
    assert_eq!(entry["email"], "blocked@example.com");
    assert_eq!(entry["success"], false);
}

#[test]
fn appends_across_logger_instances() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("audit.log");

    AuditLogger::new(&file_config(path.clone()))
        .unwrap()
        .log_token_introspected("S1", true);
    AuditLogger::new(&file_config(path.clone()))
        .unwrap()
        .log_token_introspected("S1", false);

    let content = fs::read_to_string(&path).unwrap();
    assert_eq!(content.lines().count(), 2);
}

#[test]
fn event_type_enum_round_trips_as_snake_case() {
    // Sanity check: every `EventType` variant used by `log_*` convenience
    // methods serializes to the snake_case the audit sink expects.
    let pairs = [
        (EventType::LoginAccepted, "login_accepted"),
        (EventType::ConsentAccepted, "consent_accepted"),
        (EventType::TokenExchanged, "token_exchanged"),
        (EventType::TokenIntrospected, "token_introspected"),
        (EventType::TokenRotated, "token_rotated"),
        (EventType::VerificationTokenIssued, "verification_token_issued"),
        (EventType::RateLimited, "rate_limited"),
        (EventType::TokenRevoked, "token_revoked"),
        (EventType::Error, "error"),
    ];

    for (variant, expected) in pairs {
        let json = serde_json::to_string(&variant).unwrap();
        assert_eq!(json, format!("\"{expected}\""));
    }
}
