//! vhsmon: runs a vhs-decode toolchain command under supervision and
//! renders its progress.

use std::time::Duration;

use clap::Parser;

mod cli;
mod context;
mod render;
mod run;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    // Logs go to stderr; stdout carries the rendered process output.
    let filter = std::env::var("VHSMON_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    let request = context::TaskRequest::from_command(args.command)?;
    let settings = run::Settings {
        frame_rate: args.frame_rate,
        shutdown_grace: Duration::from_millis(args.shutdown_grace_ms),
    };
    let use_color = context::resolve_color(&args.color);
    let mut renderer = render::Renderer::new(std::io::stdout(), use_color, args.json);

    let mut interrupts = run::listen_for_interrupts()?;
    let state = run::run_task(request, &settings, &mut renderer, &mut interrupts).await?;
    let exit_code = run::exit_status(state);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }

    Ok(())
}
