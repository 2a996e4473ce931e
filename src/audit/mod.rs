//! Audit logging for the orchestration engine.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

/// Audit event types, one per orchestrator operation plus the ambient
/// rate-limit and error paths.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    LoginAccepted,
    ConsentAccepted,
    TokenExchanged,
    TokenIntrospected,
    TokenRotated,
    VerificationTokenIssued,
    RateLimited,
    TokenRevoked,
    Error,
}

/// Audit log entry
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub event_type: EventType,
    pub session_id: Option<String>,
    pub client_id: Option<String>,
    pub email: Option<String>,
    pub success: bool,
    pub message: Option<String>,
    pub duration_ms: Option<u64>,
}

impl AuditEntry {
    pub fn new(event_type: EventType) -> Self {
        Self {
            timestamp: Utc::now(),
            event_type,
            session_id: None,
            client_id: None,
            email: None,
            success: true,
            message: None,
            duration_ms: None,
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_client(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_success(mut self, success: bool) -> Self {
        self.success = success;
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }
}

/// Audit logger
pub struct AuditLogger {
    enabled: bool,
    stdout: bool,
    file: Option<Mutex<std::fs::File>>,
}

impl AuditLogger {
    /// Create a new audit logger from configuration
    pub fn new(config: &crate::config::AuditConfig) -> std::io::Result<Self> {
        let file = if let Some(path) = &config.file {
            Some(Mutex::new(
                OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)?,
            ))
        } else {
            None
        };

        Ok(Self {
            enabled: config.enabled,
            stdout: config.stdout,
            file,
        })
    }

    /// Create a disabled audit logger
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            stdout: false,
            file: None,
        }
    }

    /// Log an audit entry
    pub fn log(&self, entry: &AuditEntry) {
        if !self.enabled {
            return;
        }

        let json = match serde_json::to_string(entry) {
            Ok(j) => j,
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize audit entry");
                return;
            }
        };

        if self.stdout {
            println!("{}", json);
        }

        if let Some(file) = &self.file {
            if let Ok(mut f) = file.lock() {
                let _ = writeln!(f, "{}", json);
            }
        }
    }

    pub fn log_login_accepted(&self, client_id: &str) {
        self.log(&AuditEntry::new(EventType::LoginAccepted).with_client(client_id));
    }

    pub fn log_consent_accepted(&self) {
        self.log(&AuditEntry::new(EventType::ConsentAccepted));
    }

    pub fn log_token_exchanged(&self, session_id: &str, client_id: &str) {
        self.log(
            &AuditEntry::new(EventType::TokenExchanged)
                .with_session(session_id)
                .with_client(client_id),
        );
    }

    pub fn log_token_introspected(&self, session_id: &str, active: bool) {
        self.log(
            &AuditEntry::new(EventType::TokenIntrospected)
                .with_session(session_id)
                .with_success(active),
        );
    }

    pub fn log_token_rotated(&self, session_id: &str) {
        self.log(&AuditEntry::new(EventType::TokenRotated).with_session(session_id));
    }

    pub fn log_verification_token_issued(&self, email: &str, client_id: &str) {
        self.log(
            &AuditEntry::new(EventType::VerificationTokenIssued)
                .with_email(email)
                .with_client(client_id),
        );
    }

    pub fn log_rate_limited(&self, email: &str) {
        self.log(
            &AuditEntry::new(EventType::RateLimited)
                .with_email(email)
                .with_success(false),
        );
    }

    pub fn log_token_revoked(&self, session_id: &str) {
        self.log(&AuditEntry::new(EventType::TokenRevoked).with_session(session_id));
    }

    pub fn log_error(&self, message: &str) {
        self.log(
            &AuditEntry::new(EventType::Error)
                .with_success(false)
                .with_message(message),
        );
    }
}

impl Default for AuditLogger {
    fn default() -> Self {
        Self::disabled()
    }
}

/// Create a file path for audit logs
pub fn default_audit_path() -> PathBuf {
    PathBuf::from("oauth2-orchestrator-audit.log")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_logger_is_a_no_op() {
        let logger = AuditLogger::disabled();
        logger.log_token_revoked("S");
    }

    #[test]
    fn entry_builder_sets_expected_fields() {
        let entry = AuditEntry::new(EventType::TokenExchanged)
            .with_session("S")
            .with_client("web")
            .with_success(true);
        assert_eq!(entry.session_id.as_deref(), Some("S"));
        assert_eq!(entry.client_id.as_deref(), Some("web"));
        assert!(entry.success);
    }
}
