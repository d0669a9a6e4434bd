//! Cancel signal delivery and exit status normalisation.

use std::process::ExitStatus;

use tokio::process::Child;
use vhsmon_core::TaskKind;

/// Signal sent to ask a supervised process to stop. Never SIGKILL: the
/// process is expected to clean up and exit on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelSignal {
    /// SIGINT, what the export tool treats as Ctrl-C.
    Interrupt,
    /// SIGTERM.
    Terminate,
}

impl CancelSignal {
    pub fn for_task(kind: TaskKind) -> Self {
        match kind {
            TaskKind::Export => Self::Interrupt,
            TaskKind::Decode | TaskKind::Analyse | TaskKind::Align => Self::Terminate,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Interrupt => "SIGINT",
            Self::Terminate => "SIGTERM",
        }
    }

    #[cfg(unix)]
    fn signo(self) -> libc::c_int {
        match self {
            Self::Interrupt => libc::SIGINT,
            Self::Terminate => libc::SIGTERM,
        }
    }
}

/// Send `signal` to the process group `child` leads, so helpers it forked
/// stop with it. A group that is already gone is not an error.
#[cfg(unix)]
pub fn deliver(child: &mut Child, signal: CancelSignal) -> std::io::Result<()> {
    let Some(pid) = child.id() else {
        return Ok(());
    };
    let pid = libc::pid_t::try_from(pid)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
    // SAFETY: kill(2) takes plain integers and has no memory effects. The
    // child was spawned with process_group(0) and is not yet reaped, so its
    // pid is also the id of a group only it and its descendants are in.
    let rc = unsafe { libc::kill(-pid, signal.signo()) };
    if rc == 0 {
        return Ok(());
    }
    let err = std::io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::ESRCH) {
        Ok(())
    } else {
        Err(err)
    }
}

/// Without POSIX signals the only request available is termination.
#[cfg(not(unix))]
pub fn deliver(child: &mut Child, _signal: CancelSignal) -> std::io::Result<()> {
    child.start_kill()
}

/// Raw exit code: the process's own code, or `-signo` when it was killed by
/// a signal.
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signo) = status.signal() {
            return -signo;
        }
    }
    -1
}
