use clap::{Args as ClapArgs, Parser, Subcommand};

use crate::media::CaptureMode;

#[derive(Parser, Debug)]
#[command(name = "interview-recorder")]
#[command(about = "Record microphone and system audio, optionally with the screen", long_about = None)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<CliCommand>,
}

#[derive(Subcommand, Debug)]
pub enum CliCommand {
    /// Run the recording service with its HTTP trigger API (default)
    Serve,
    /// Record one session in the foreground, stopping on Ctrl-C
    Record(RecordArgs),
    /// Print version information
    Version,
}

#[derive(ClapArgs, Debug)]
pub struct RecordArgs {
    /// What to capture alongside the microphone and system audio
    #[arg(short, long, value_enum, default_value_t = CaptureMode::Audio)]
    pub mode: CaptureMode,
    /// Write the recording here instead of the configured output directory
    #[arg(short, long)]
    pub output: Option<std::path::PathBuf>,
}
