//! CLI definition using clap derive.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use vhsmon_core::DEFAULT_FRAME_RATE;

#[derive(Parser)]
#[command(name = "vhsmon", version, about = "Run vhs-decode tools and follow their progress")]
pub struct Cli {
    /// Frame rate used for timecodes (25 for PAL, 29.97 for NTSC)
    #[arg(long, global = true, env = "VHSMON_FRAME_RATE", default_value_t = DEFAULT_FRAME_RATE)]
    pub frame_rate: f64,

    /// Color output: auto, always, never
    #[arg(long, global = true, default_value = "auto", value_parser = ["auto", "always", "never"])]
    pub color: String,

    /// Emit one JSON object per event instead of text
    #[arg(long, global = true)]
    pub json: bool,

    /// How long to wait for the process after a forced shutdown
    #[arg(long, global = true, default_value = "500")]
    pub shutdown_grace_ms: u64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Decode a raw RF capture into a TBC
    Decode(DecodeOpts),
    /// Export a decoded TBC to video
    Export(ExportOpts),
    /// Open a decoded TBC in ld-analyse
    Analyse(AnalyseOpts),
    /// Align the linear audio track with the decoded video
    Align(AlignOpts),
}

#[derive(clap::Args)]
pub struct DecodeOpts {
    /// Raw capture file (.flac, .lds, .u8, ...)
    pub input: PathBuf,

    /// Extra arguments for the decoder, split on whitespace
    #[arg(long, env = "VHSMON_DECODE_ARGS", default_value = "", allow_hyphen_values = true)]
    pub args: String,

    /// Decoder executable
    #[arg(long)]
    pub command: Option<String>,
}

#[derive(clap::Args)]
pub struct ExportOpts {
    /// Capture file the TBC was decoded from
    pub input: PathBuf,

    /// Extra arguments for the exporter, split on whitespace
    #[arg(long, env = "VHSMON_EXPORT_ARGS", default_value = "", allow_hyphen_values = true)]
    pub args: String,

    /// Exporter executable
    #[arg(long)]
    pub command: Option<String>,
}

#[derive(clap::Args)]
pub struct AnalyseOpts {
    /// Capture file the TBC was decoded from
    pub input: PathBuf,

    /// Viewer executable
    #[arg(long)]
    pub command: Option<String>,
}

#[derive(clap::Args)]
pub struct AlignOpts {
    /// Capture file; its directory is searched for the audio and TBC metadata
    pub input: PathBuf,

    /// Alignment script
    #[arg(long)]
    pub command: Option<String>,
}
