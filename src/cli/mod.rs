pub mod args;

pub use args::{Cli, CliCommand, RecordArgs};

use anyhow::Result;

use crate::app;
use crate::config::Config;

pub async fn handle_record_command(args: RecordArgs) -> Result<()> {
    let mut config = Config::load()?;
    if let Some(output) = args.output {
        config.output.directory = Some(output);
    }
    app::run_record(&config, args.mode).await
}
