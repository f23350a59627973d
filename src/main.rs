use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use wonfolio::cli::holdings::HoldingInput;
use wonfolio::core::log::init_logging;
use wonfolio::core::{AssetType, Currency};

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl Commands {
    /// The library command, or `None` for commands handled here.
    fn into_app_command(self) -> Option<wonfolio::AppCommand> {
        let command = match self {
            Commands::Setup => return None,
            Commands::Summary => wonfolio::AppCommand::Summary,
            Commands::Add {
                ticker,
                quantity,
                avg_cost,
                asset_type,
                currency,
                dividend_yield,
            } => wonfolio::AppCommand::Add(HoldingInput {
                ticker,
                quantity,
                avg_cost,
                asset_type,
                currency,
                dividend_yield,
            }),
            Commands::Remove { ticker } => wonfolio::AppCommand::Remove { ticker },
            Commands::History { limit } => wonfolio::AppCommand::History { limit },
            Commands::Goal {
                target,
                monthly,
                rate,
            } => wonfolio::AppCommand::Goal {
                target_value: target,
                monthly_contribution: monthly,
                annual_rate_pct: rate,
            },
            Commands::Market => wonfolio::AppCommand::Market,
        };
        Some(command)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Value the portfolio in KRW and record today's total
    Summary,
    /// Add a holding, replacing any existing one with the same ticker
    Add {
        ticker: String,
        quantity: f64,
        /// Average cost per unit, in the cost currency
        avg_cost: f64,
        /// Stock, ETF, Crypto or Cash
        #[arg(short = 't', long = "type", default_value = "Stock")]
        asset_type: AssetType,
        /// USD or KRW; defaults by market
        #[arg(long)]
        currency: Option<Currency>,
        /// Pin the annual dividend yield (%) instead of looking it up
        #[arg(long)]
        dividend_yield: Option<f64>,
    },
    /// Remove a holding
    Remove { ticker: String },
    /// Show the recorded daily values
    History {
        /// Number of most recent days to show
        #[arg(short, long, default_value_t = 30)]
        limit: usize,
    },
    /// Estimate the time to reach a target value
    Goal {
        /// Target value in KRW
        #[arg(long)]
        target: Option<f64>,
        /// Monthly contribution in KRW
        #[arg(long)]
        monthly: Option<f64>,
        /// Expected annual return (%)
        #[arg(long)]
        rate: Option<f64>,
    },
    /// Show benchmark indices and the USD/KRW rate
    Market,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(cmd) => match cmd.into_app_command() {
            Some(command) => wonfolio::run_command(command, cli.config_path.as_deref()).await,
            None => wonfolio::cli::setup::setup(),
        },
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
