//! Process session lifecycle and exit classification.
//!
//! `Idle → Running → {Completed | Failed | Cancelled}`, with an optional
//! `Running → CancelRequested → {Cancelled | Completed | Failed}` detour.
//! A cancel request does not guarantee a `Cancelled` outcome: the process
//! may finish cleanly before it honors the signal.
//!
//! Pure state machine; the IO layer owns one instance per run and is the
//! only thing that mutates it.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::task::WorkingContext;

/// Raw exit codes produced by interrupt/terminate/kill. Negative values are
/// `-signo` for a child killed directly by the signal; the positive ones are
/// the `128 + signo` convention used by shells and wrapper scripts.
pub const SIGNAL_EXIT_CODES: [i32; 6] = [-2, -9, -15, 130, 137, 143];

// ─── SessionState ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Running,
    CancelRequested,
    Completed,
    Failed,
    Cancelled,
}

impl SessionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::CancelRequested => "cancel_requested",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// A process exists (or is being spawned) for this state.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Running | Self::CancelRequested)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map a raw exit code to a terminal state.
///
/// Signal codes count as `Cancelled` only when a cancel was requested; an
/// unrelated kill is reported as a failure.
pub fn classify_exit(code: i32, cancel_requested: bool) -> SessionState {
    if code == 0 {
        SessionState::Completed
    } else if cancel_requested && SIGNAL_EXIT_CODES.contains(&code) {
        SessionState::Cancelled
    } else {
        SessionState::Failed
    }
}

// ─── Outcome ────────────────────────────────────────────────────────

/// Why a session ended in `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum FailureReason {
    /// The process ran and exited non-zero.
    ExitCode { code: i32 },
    /// The executable could not be located.
    NotFound { command: String },
    /// Spawning failed for any other reason.
    Spawn { command: String, detail: String },
    /// Reading the merged output stream failed.
    StreamRead { detail: String },
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExitCode { code } => write!(f, "exited with code {code}"),
            Self::NotFound { command } => write!(
                f,
                "'{command}' not found; ensure it is installed and on your PATH"
            ),
            Self::Spawn { command, detail } => write!(f, "failed to start '{command}': {detail}"),
            Self::StreamRead { detail } => write!(f, "failed reading process output: {detail}"),
        }
    }
}

/// Terminal result of one session, delivered exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionOutcome {
    pub state: SessionState,
    pub exit_code: Option<i32>,
    pub failure: Option<FailureReason>,
}

impl SessionOutcome {
    /// Human-readable detail for failed sessions.
    pub fn error_detail(&self) -> Option<String> {
        self.failure.as_ref().map(ToString::to_string)
    }

    pub fn is_success(&self) -> bool {
        self.state == SessionState::Completed
    }
}

// ─── ProcessSession ─────────────────────────────────────────────────

/// One supervised run of an external command.
#[derive(Debug, Clone)]
pub struct ProcessSession {
    command: String,
    arguments: Vec<String>,
    context: WorkingContext,
    state: SessionState,
    exit_code: Option<i32>,
    failure: Option<FailureReason>,
}

impl ProcessSession {
    pub fn new(command: impl Into<String>, arguments: Vec<String>, context: WorkingContext) -> Self {
        Self {
            command: command.into(),
            arguments,
            context,
            state: SessionState::Idle,
            exit_code: None,
            failure: None,
        }
    }

    /// `Idle → Running` once the process has been spawned. Returns `false`
    /// from any other state.
    pub fn mark_running(&mut self) -> bool {
        if self.state != SessionState::Idle {
            return false;
        }
        self.state = SessionState::Running;
        true
    }

    /// `Running → CancelRequested`. Returns `true` only on that transition;
    /// repeated requests and requests in any other state are no-ops, and the
    /// caller should send a signal only when this returns `true`.
    pub fn request_cancel(&mut self) -> bool {
        if self.state != SessionState::Running {
            return false;
        }
        self.state = SessionState::CancelRequested;
        true
    }

    /// Record the process exit. Terminal states are sticky: a second call
    /// returns the already-recorded outcome.
    pub fn finish(&mut self, code: i32) -> SessionOutcome {
        if !self.state.is_terminal() {
            let state = classify_exit(code, self.state == SessionState::CancelRequested);
            self.exit_code = Some(code);
            if state == SessionState::Failed {
                self.failure = Some(FailureReason::ExitCode { code });
            }
            self.state = state;
        }
        self.current_outcome()
    }

    /// Record a failure that did not come from the exit status (spawn or
    /// stream errors). `exit_code` is kept when the process did exit.
    pub fn fail(&mut self, reason: FailureReason, exit_code: Option<i32>) -> SessionOutcome {
        if !self.state.is_terminal() {
            self.state = SessionState::Failed;
            self.exit_code = exit_code;
            self.failure = Some(reason);
        }
        self.current_outcome()
    }

    /// The outcome, once terminal.
    pub fn outcome(&self) -> Option<SessionOutcome> {
        self.state.is_terminal().then(|| self.current_outcome())
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }

    pub fn context(&self) -> &WorkingContext {
        &self.context
    }

    /// Command line for logs, with arguments containing spaces quoted.
    pub fn display_command(&self) -> String {
        std::iter::once(self.command.as_str())
            .chain(self.arguments.iter().map(String::as_str))
            .map(|part| {
                if part.contains(char::is_whitespace) {
                    format!("\"{part}\"")
                } else {
                    part.to_owned()
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn current_outcome(&self) -> SessionOutcome {
        SessionOutcome {
            state: self.state,
            exit_code: self.exit_code,
            failure: self.failure.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn session() -> ProcessSession {
        ProcessSession::new(
            "vhs-decode",
            vec!["--pal".into(), "/caps/my tape.flac".into()],
            WorkingContext {
                input: PathBuf::from("/caps/my tape.flac"),
                output: Some(PathBuf::from("/caps/my tape-Decoded")),
            },
        )
    }

    fn running() -> ProcessSession {
        let mut s = session();
        assert!(s.mark_running());
        s
    }

    // ── Exit classification ─────────────────────────────────────

    #[test]
    fn zero_is_completed_even_after_cancel() {
        assert_eq!(classify_exit(0, false), SessionState::Completed);
        assert_eq!(classify_exit(0, true), SessionState::Completed);
    }

    #[test]
    fn signal_codes_cancel_only_when_requested() {
        for code in SIGNAL_EXIT_CODES {
            assert_eq!(classify_exit(code, true), SessionState::Cancelled, "code {code}");
            assert_eq!(classify_exit(code, false), SessionState::Failed, "code {code}");
        }
    }

    #[test]
    fn other_codes_fail_regardless_of_cancel() {
        assert_eq!(classify_exit(1, true), SessionState::Failed);
        assert_eq!(classify_exit(-11, true), SessionState::Failed);
    }

    // ── Transitions ─────────────────────────────────────────────

    #[test]
    fn new_session_is_idle() {
        let s = session();
        assert_eq!(s.state(), SessionState::Idle);
        assert_eq!(s.exit_code(), None);
        assert_eq!(s.outcome(), None);
    }

    #[test]
    fn mark_running_only_from_idle() {
        let mut s = running();
        assert!(!s.mark_running());
        assert_eq!(s.state(), SessionState::Running);
    }

    #[test]
    fn cancel_is_idempotent() {
        let mut s = running();
        assert!(s.request_cancel());
        assert!(!s.request_cancel());
        assert_eq!(s.state(), SessionState::CancelRequested);
    }

    #[test]
    fn cancel_from_idle_is_noop() {
        let mut s = session();
        assert!(!s.request_cancel());
        assert_eq!(s.state(), SessionState::Idle);
    }

    #[test]
    fn clean_exit_completes() {
        let outcome = running().finish(0);
        assert_eq!(outcome.state, SessionState::Completed);
        assert_eq!(outcome.exit_code, Some(0));
        assert!(outcome.is_success());
        assert_eq!(outcome.error_detail(), None);
    }

    #[test]
    fn requested_cancel_with_sigterm_is_cancelled() {
        let mut s = running();
        s.request_cancel();
        let outcome = s.finish(-15);
        assert_eq!(outcome.state, SessionState::Cancelled);
        assert_eq!(outcome.exit_code, Some(-15));
        assert_eq!(outcome.failure, None);
    }

    #[test]
    fn unrequested_kill_is_failure() {
        let outcome = running().finish(-9);
        assert_eq!(outcome.state, SessionState::Failed);
        assert_eq!(outcome.failure, Some(FailureReason::ExitCode { code: -9 }));
    }

    #[test]
    fn cancel_after_terminal_changes_nothing() {
        let mut s = running();
        s.finish(3);
        assert!(!s.request_cancel());
        assert_eq!(s.state(), SessionState::Failed);
        assert_eq!(s.exit_code(), Some(3));
    }

    #[test]
    fn terminal_state_is_sticky() {
        let mut s = running();
        let first = s.finish(0);
        assert_eq!(s.finish(1), first);
        assert_eq!(
            s.fail(FailureReason::StreamRead { detail: "x".into() }, None),
            first
        );
    }

    #[test]
    fn spawn_failure_from_idle() {
        let mut s = session();
        let outcome = s.fail(
            FailureReason::NotFound {
                command: "vhs-decode".into(),
            },
            None,
        );
        assert_eq!(outcome.state, SessionState::Failed);
        assert_eq!(outcome.exit_code, None);
        assert_eq!(
            outcome.error_detail().as_deref(),
            Some("'vhs-decode' not found; ensure it is installed and on your PATH")
        );
    }

    #[test]
    fn display_command_quotes_spaced_arguments() {
        assert_eq!(
            session().display_command(),
            "vhs-decode --pal \"/caps/my tape.flac\""
        );
    }

    #[test]
    fn outcome_serializes_tagged_failure() {
        let outcome = running().finish(2);
        let json = serde_json::to_value(&outcome).expect("serialize");
        assert_eq!(json["state"], "failed");
        assert_eq!(json["exit_code"], 2);
        assert_eq!(json["failure"]["reason"], "exit_code");
        assert_eq!(json["failure"]["code"], 2);
    }
}
