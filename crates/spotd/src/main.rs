//! spotd — run the spot decision pipeline from the command line.
//!
//! # Usage
//!
//! ```text
//! spotd evaluate --config spotd.toml --request request.json
//! spotd evaluate --config spotd.toml --request request.json --mock catalog.json --signal rebalance
//! spotd check-config --config spotd.toml
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use spotd::{EvaluateArgs, SignalArg};

#[derive(Parser)]
#[command(name = "spotd", about = "Spot instance decision pipeline")]
struct Cli {
    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Evaluate one request and print the execution summary as JSON.
    Evaluate {
        /// Pipeline configuration (TOML). Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Evaluation request (JSON).
        #[arg(long)]
        request: PathBuf,

        /// Pool catalog (JSON) served by providers configured as `mock`.
        #[arg(long)]
        mock: Option<PathBuf>,

        /// Signal the mock signal provider reports for every instance.
        #[arg(long, value_enum)]
        signal: Option<SignalArg>,

        /// Print the whole evaluation trace instead of the summary.
        #[arg(long)]
        trace: bool,
    },
    /// Validate a configuration and print it with defaults filled in.
    CheckConfig {
        #[arg(long)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,spotd=debug,spotgrid=debug"));
    // Logs go to stderr; stdout carries the JSON result.
    match cli.log_format {
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
    }

    match cli.command {
        Command::Evaluate {
            config,
            request,
            mock,
            signal,
            trace,
        } => {
            let args = EvaluateArgs {
                config,
                request,
                mock,
                signal,
            };
            let output = spotd::evaluate(&args).await?;
            let json = if trace {
                serde_json::to_string_pretty(&output.report)?
            } else {
                serde_json::to_string_pretty(&output.summary)?
            };
            println!("{json}");
            Ok(())
        }
        Command::CheckConfig { config } => {
            println!("{}", spotd::check_config(&config)?);
            Ok(())
        }
    }
}
