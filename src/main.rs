//! sxargs - build and run a command from items read on standard input.

use std::path::PathBuf;
use std::process::ExitStatus;

use clap::{Parser, ValueEnum};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use stream_xargs::config::{ConfigError, ConfigLoader, SplitMode};
use stream_xargs::display;
use stream_xargs::source::{self, ItemStream};
use stream_xargs::xargs::{self, CommandLine, Signal, XargsChannel, XargsError};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SplitArg {
    Lines,
    Whitespace,
}

impl From<SplitArg> for SplitMode {
    fn from(arg: SplitArg) -> Self {
        match arg {
            SplitArg::Lines => SplitMode::Lines,
            SplitArg::Whitespace => SplitMode::Whitespace,
        }
    }
}

#[derive(Parser)]
#[command(
    name = "sxargs",
    about = "Build and run a command from items read on standard input",
    version
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Path to a config file.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Read arguments from FILE; standard input is passed to the command.
    #[arg(short = 'a', long, value_name = "FILE", conflicts_with = "spawn")]
    arg_file: Option<PathBuf>,

    /// Run the command immediately with standard input as its input.
    #[arg(long)]
    spawn: bool,

    /// How to split input into arguments (overrides the config file).
    #[arg(short, long, value_enum)]
    split: Option<SplitArg>,

    /// Command line given as one shell-style string.
    #[arg(short = 'c', long, value_name = "LINE", conflicts_with = "command")]
    command_line: Option<String>,

    /// Command and initial arguments (defaults to echo).
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Xargs(#[from] XargsError),
    #[error("Failed to open argument file {path}: {source}")]
    ArgFile {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl CliError {
    fn exit_code(&self) -> i32 {
        match self {
            Self::Xargs(e) => display::error_exit_code(e),
            _ => display::EXIT_USAGE,
        }
    }
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn split_items<R>(split: SplitMode, reader: R) -> ItemStream
where
    R: tokio::io::AsyncRead + Send + Unpin + 'static,
{
    match split {
        SplitMode::Lines => source::lines(reader),
        SplitMode::Whitespace => source::words(reader),
    }
}

async fn build_channel(cli: Cli) -> Result<XargsChannel, CliError> {
    let loader = cli
        .config
        .map_or_else(ConfigLoader::new, ConfigLoader::with_path);
    let config = loader.load()?;
    let split = cli.split.map_or(config.split, SplitMode::from);
    let options = config.to_options();

    let command = match cli.command_line {
        Some(line) => CommandLine::Line(line),
        None => CommandLine::Argv(cli.command),
    };
    let stdin = tokio::io::stdin();

    let channel = if cli.spawn {
        let channel = xargs::spawn(command, options)?;
        channel.pipe_from(source::chunks(stdin))?;
        channel
    } else if let Some(path) = cli.arg_file {
        let file = tokio::fs::File::open(&path)
            .await
            .map_err(|e| CliError::ArgFile { path, source: e })?;
        let channel = XargsChannel::new(command, options.external(split_items(split, file)))?;
        channel.pipe_from(source::chunks(stdin))?;
        channel
    } else {
        let channel = XargsChannel::new(command, options)?;
        channel.pipe_from(split_items(split, stdin))?;
        channel
    };

    Ok(channel)
}

async fn run(cli: Cli) -> Result<i32, CliError> {
    let mut channel = build_channel(cli).await?;
    let output = channel.pipe(tokio::io::stdout());

    let status: ExitStatus = loop {
        tokio::select! {
            result = channel.wait() => break result?,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, forwarding SIGINT");
                channel.kill(Signal::SIGINT)?;
            }
        }
    };

    if let Err(e) = output.await {
        tracing::warn!(error = %e, "Output was not fully forwarded");
    }

    if !status.success() {
        display::print_exit_status(channel.command(), status);
    }
    Ok(display::exit_code(status))
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            display::print_error(&e);
            e.exit_code()
        }
    };
    std::process::exit(code);
}
