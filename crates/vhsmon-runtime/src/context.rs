//! Resolving CLI options into a launchable task.

use std::path::Path;

use anyhow::bail;
use vhsmon_core::{TaskKind, WorkingContext, split_arguments};
use vhsmon_process::discover_align_inputs;

use crate::cli;

/// Everything needed to launch one task.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskRequest {
    pub kind: TaskKind,
    pub command: String,
    pub arguments: Vec<String>,
    pub context: WorkingContext,
}

impl TaskRequest {
    /// Build the request for `kind` from the selected capture file.
    ///
    /// Decode refuses a capture that does not exist. Align looks up its
    /// inputs next to the capture and fails when either is missing. The
    /// other tasks leave missing-file reporting to the tool itself.
    pub fn new(
        kind: TaskKind,
        capture: &Path,
        user_args: &str,
        command: Option<String>,
    ) -> anyhow::Result<Self> {
        if kind == TaskKind::Decode && !capture.is_file() {
            bail!("input file not found: {}", capture.display());
        }
        let context = match kind {
            TaskKind::Align => discover_align_inputs(capture)?,
            _ => WorkingContext::for_task(kind, capture),
        };
        let arguments = kind.build_arguments(&split_arguments(user_args), &context);
        Ok(Self {
            kind,
            command: command.unwrap_or_else(|| kind.default_command().to_string()),
            arguments,
            context,
        })
    }

    pub fn from_command(command: cli::Command) -> anyhow::Result<Self> {
        match command {
            cli::Command::Decode(opts) => {
                Self::new(TaskKind::Decode, &opts.input, &opts.args, opts.command)
            }
            cli::Command::Export(opts) => {
                Self::new(TaskKind::Export, &opts.input, &opts.args, opts.command)
            }
            cli::Command::Analyse(opts) => {
                Self::new(TaskKind::Analyse, &opts.input, "", opts.command)
            }
            cli::Command::Align(opts) => Self::new(TaskKind::Align, &opts.input, "", opts.command),
        }
    }
}

/// Resolve `--color` against whether stdout is a terminal.
pub fn resolve_color(color: &str) -> bool {
    use std::io::IsTerminal;
    match color {
        "always" => true,
        "never" => false,
        _ => std::io::stdout().is_terminal(),
    }
}
