//! Structured audit logging for the kernel. Every gate evaluation, SCRAM
//! activation, and settlement transition goes through `tracing`; this
//! module wires the subscriber.
//!
//! DESIGN PRINCIPLES:
//! - Non-blocking I/O (logging never blocks gate evaluation)
//! - JSON format (machine-readable for downstream audit tooling)
//! - Daily rotation (prevents disk exhaustion)

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Configuration for the audit logging system
pub struct AuditConfig {
    /// Directory for log files
    pub log_dir: String,
    /// Base filename for logs (will have date appended)
    pub log_prefix: String,
    /// Enable console output (pretty-printed for humans)
    pub console_output: bool,
    /// Log level filter (e.g., "info", "debug", "warn")
    pub level_filter: String,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            log_dir: "logs".to_string(),
            log_prefix: "chainbridge".to_string(),
            console_output: true,
            level_filter: "info".to_string(),
        }
    }
}

/// Initialize the global tracing subscriber with structured JSON logging.
///
/// Returns a `WorkerGuard` that MUST be held for the lifetime of the application.
/// Dropping the guard will flush and close the log file.
///
/// # Architecture
///
/// ```text
/// ┌─────────────────┐
/// │  Application    │
/// │   (async)       │
/// └────────┬────────┘
///          │ info!(), warn!(), error!()
///          ▼
/// ┌─────────────────┐
/// │  Non-Blocking   │◄── Returns immediately (no latency hit)
/// │    Channel      │
/// └────────┬────────┘
///          │ (background thread)
///          ▼
/// ┌─────────────────┐
/// │  Rolling File   │──► logs/chainbridge.2026-01-09.log
/// │    Appender     │
/// └─────────────────┘
/// ```
pub fn init_tracing(config: AuditConfig) -> WorkerGuard {
    // Daily rolling file appender
    // Files: logs/chainbridge.2026-01-09.log, logs/chainbridge.2026-01-10.log, etc.
    let file_appender = RollingFileAppender::new(
        Rotation::DAILY,
        &config.log_dir,
        &config.log_prefix,
    );

    // Non-blocking wrapper - writes happen in a background thread so
    // logging never blocks a gate evaluation or a SCRAM activation.
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // Environment filter for log levels
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.level_filter));

    // JSON layer for file output (machine-readable)
    let json_layer = fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_span_events(FmtSpan::CLOSE)
        .with_current_span(true)
        .with_target(true)
        .with_file(false)
        .with_line_number(false);

    if config.console_output {
        // Dual output: JSON to file, Pretty to console
        let console_layer = fmt::layer()
            .pretty()
            .with_writer(std::io::stdout)
            .with_target(true);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(json_layer)
            .with(console_layer)
            .init();
    } else {
        // JSON only (production mode)
        tracing_subscriber::registry()
            .with(env_filter)
            .with(json_layer)
            .init();
    }

    // CRITICAL: Return the guard. If dropped, logging stops.
    guard
}

/// Initialize tracing with default configuration.
/// Convenience function for quick setup.
pub fn init_tracing_default() -> WorkerGuard {
    init_tracing(AuditConfig::default())
}

/// Audit event types for structured logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditEvent {
    /// Kernel startup
    KernelIgnite,
    /// A PDO was minted and registered
    PdoMinted,
    /// A gate evaluation passed
    GateOk,
    /// A gate evaluation blocked
    GateBlocked,
    /// SCRAM activated
    ScramActivated,
    /// Consensus round achieved
    ConsensusAchieved,
    /// Consensus round failed
    ConsensusFailed,
}

impl std::fmt::Display for AuditEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuditEvent::KernelIgnite => write!(f, "kernel_ignite"),
            AuditEvent::PdoMinted => write!(f, "pdo_minted"),
            AuditEvent::GateOk => write!(f, "gate_ok"),
            AuditEvent::GateBlocked => write!(f, "gate_blocked"),
            AuditEvent::ScramActivated => write!(f, "scram_activated"),
            AuditEvent::ConsensusAchieved => write!(f, "consensus_achieved"),
            AuditEvent::ConsensusFailed => write!(f, "consensus_failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_config_default() {
        let config = AuditConfig::default();
        assert_eq!(config.log_dir, "logs");
        assert_eq!(config.log_prefix, "chainbridge");
        assert!(config.console_output);
        assert_eq!(config.level_filter, "info");
    }

    #[test]
    fn test_audit_event_display() {
        assert_eq!(AuditEvent::KernelIgnite.to_string(), "kernel_ignite");
        assert_eq!(AuditEvent::PdoMinted.to_string(), "pdo_minted");
        assert_eq!(AuditEvent::GateOk.to_string(), "gate_ok");
        assert_eq!(AuditEvent::GateBlocked.to_string(), "gate_blocked");
        assert_eq!(AuditEvent::ScramActivated.to_string(), "scram_activated");
        assert_eq!(AuditEvent::ConsensusAchieved.to_string(), "consensus_achieved");
        assert_eq!(AuditEvent::ConsensusFailed.to_string(), "consensus_failed");
    }
}
