//! Operator shell hooks run around the lock session

use std::fmt;

use tokio::process::Command;
use tracing::{debug, warn, Span};

/// When a hook runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    PreLock,
    PostLock,
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookKind::PreLock => write!(f, "pre-lock"),
            HookKind::PostLock => write!(f, "post-lock"),
        }
    }
}

/// Run `sh -c <command>` and wait for it.
///
/// Empty commands are skipped. Failures are logged and never propagated.
/// Returns whether the command ran and exited successfully.
pub async fn run_hook(kind: HookKind, command: &str, span: &Span) -> bool {
    let command = command.trim();
    if command.is_empty() {
        return false;
    }

    debug!(parent: span, "Running {} command: {}", kind, command);

    match Command::new("sh").arg("-c").arg(command).status().await {
        Ok(status) if status.success() => true,
        Ok(status) => {
            warn!(parent: span, "{} command exited with {}", kind, status);
            false
        }
        Err(e) => {
            warn!(parent: span, "Failed to run {} command: {}", kind, e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_log;
    use tempfile::TempDir;
    use tracing::info_span;

    #[tokio::test]
    async fn test_empty_hook_skipped() {
        assert!(!run_hook(HookKind::PreLock, "   ", &Span::none()).await);
    }

    #[tokio::test]
    async fn test_hook_runs_through_shell() {
        let dir = TempDir::new().unwrap();
        let marker = dir.path().join("ran");

        let command = format!("  touch {}  ", marker.display());
        assert!(run_hook(HookKind::PostLock, &command, &Span::none()).await);
        assert!(marker.exists());
    }

    #[tokio::test]
    async fn test_failing_hook_is_not_fatal() {
        assert!(!run_hook(HookKind::PreLock, "exit 3", &Span::none()).await);
    }

    #[tokio::test]
    async fn test_hook_logs_under_session_span() {
        let (captured, _guard) = test_log::capture();
        let span = info_span!("session");

        assert!(!run_hook(HookKind::PostLock, "exit 4", &span).await);

        let logs = captured.text();
        for message in ["Running post-lock command", "post-lock command exited"] {
            let line = logs.lines().find(|line| line.contains(message));
            assert!(line.is_some_and(|line| line.contains("session")), "{}", logs);
        }
    }
}
