use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};
use recordpipe_pipeline::{Pacing, RandomRecords};

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod local;
pub mod send;
pub mod serve;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run producer and consumer in-process around a bounded buffer.
    Local(LocalArgs),
    /// Accept framed records over TCP and report them.
    Serve(ServeArgs),
    /// Generate records and send them to a server.
    Send(SendArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Local(args) => local::run(args, format),
        Command::Serve(args) => serve::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct LocalArgs {
    /// Records to produce.
    #[arg(long, env = "RECORDPIPE_COUNT", default_value_t = 10)]
    pub count: u64,
    /// Buffer slots.
    #[arg(long, env = "RECORDPIPE_CAPACITY", default_value_t = 10)]
    pub capacity: usize,
    /// Directory for staged record bodies.
    #[arg(long, value_name = "DIR", env = "RECORDPIPE_STAGE_DIR", default_value = "xml_files")]
    pub stage_dir: PathBuf,
    #[command(flatten)]
    pub generation: GenerationArgs,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to listen on.
    #[arg(long, env = "RECORDPIPE_HOST", default_value = "0.0.0.0")]
    pub host: String,
    /// Port to listen on.
    #[arg(long, short = 'p', env = "RECORDPIPE_PORT", default_value_t = 5000)]
    pub port: u16,
    /// Records to read per connection before closing it (0 = until the peer closes).
    #[arg(long, env = "RECORDPIPE_COUNT", default_value_t = 10)]
    pub count: u64,
    /// Directory for staged record bodies.
    #[arg(long, value_name = "DIR", env = "RECORDPIPE_STAGE_DIR", default_value = "xml_files")]
    pub stage_dir: PathBuf,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Server address.
    #[arg(long, env = "RECORDPIPE_HOST", default_value = "127.0.0.1")]
    pub host: String,
    /// Server port.
    #[arg(long, short = 'p', env = "RECORDPIPE_PORT", default_value_t = 5000)]
    pub port: u16,
    /// Records to send.
    #[arg(long, env = "RECORDPIPE_COUNT", default_value_t = 10)]
    pub count: u64,
    /// Identifier prefix; records are named `<prefix><n>.xml`.
    #[arg(long, default_value = "student")]
    pub prefix: String,
    #[command(flatten)]
    pub generation: GenerationArgs,
}

/// Record synthesis and pacing shared by the producing commands.
#[derive(Args, Debug)]
pub struct GenerationArgs {
    /// Seed for reproducible records.
    #[arg(long)]
    pub seed: Option<u64>,
    /// Shortest pause after each record (e.g. 0, 250ms, 1s).
    #[arg(long, default_value = "0")]
    pub min_delay: String,
    /// Longest pause after each record.
    #[arg(long, default_value = "0")]
    pub max_delay: String,
}

impl GenerationArgs {
    pub fn source(&self) -> RandomRecords {
        match self.seed {
            Some(seed) => RandomRecords::seeded(seed),
            None => RandomRecords::new(),
        }
    }

    pub fn pacing(&self) -> CliResult<Pacing> {
        let min = parse_duration(&self.min_delay)?;
        let max = parse_duration(&self.max_delay)?;
        if min > max {
            return Err(CliError::new(
                USAGE,
                format!("--min-delay ({}) exceeds --max-delay ({})", self.min_delay, self.max_delay),
            ));
        }
        Ok(Pacing::between(min, max))
    }
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Parse `250ms`, `2s` or a bare number of seconds. Zero is allowed.
pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if millis {
        Ok(Duration::from_millis(value))
    } else {
        Ok(Duration::from_secs(value))
    }
}
