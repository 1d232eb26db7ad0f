use anyhow::Result;
use clap::{Parser, Subcommand};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use triage::config::Config;
use triage::logging;
use triage::pipeline::RunMode;
use triage::triage::{Classifier, PlanTier, TriageRequest, TriageService};

#[derive(Parser)]
#[command(name = "triage")]
#[command(about = "Support-ticket triage pipeline")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Triage one request and create a ticket
    Run {
        /// Free-text description of the problem
        #[arg(long)]
        description: String,

        /// Customer account id
        #[arg(long)]
        customer_id: String,

        /// Subscription plan (free, pro, enterprise, ...)
        #[arg(long)]
        plan: String,

        /// Discard every result if any action fails
        #[arg(long)]
        all_or_nothing: bool,
    },

    /// Classify a description without creating a ticket
    Classify {
        /// Description to classify
        text: String,

        /// Subscription plan used for the fallback priority
        #[arg(long, default_value = "free")]
        plan: String,
    },

    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration first (needed for logging setup)
    let mut config = Config::load(cli.config.as_deref())?;
    let logging_handle = logging::init_logging(&config, cli.debug)?;

    let result = match cli.command {
        Commands::Run {
            description,
            customer_id,
            plan,
            all_or_nothing,
        } => {
            if all_or_nothing {
                config.pipeline.mode = RunMode::AllOrNothing;
            }
            cmd_run(&config, TriageRequest::new(description, customer_id, plan)).await
        }
        Commands::Classify { text, plan } => cmd_classify(&text, &plan),
        Commands::Config => cmd_config(&config),
    };

    if let Some(log_path) = logging_handle.log_file_path {
        if log_path.metadata().map(|m| m.len() > 0).unwrap_or(false) {
            eprintln!("Session log: {}", log_path.display());
        }
    }

    result
}

async fn cmd_run(config: &Config, request: TriageRequest) -> Result<()> {
    let service = TriageService::from_config(config)?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping after the current action");
            on_interrupt.cancel();
        }
    });

    let outcome = match service.triage(&request, &cancel).await {
        Ok(outcome) => outcome,
        Err(failure) => {
            let output = json!({
                "runId": failure.run.run_id,
                "error": failure.error.to_string(),
                "failedAction": failure.action(),
                "context": failure.run.context,
                "actions": failure.run.reports,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
            return Err(anyhow::Error::new(failure.error).context(format!(
                "Triage failed for customer '{}'",
                request.customer_id
            )));
        }
    };

    if !outcome.delivery.delivered {
        eprintln!(
            "Warning: ticket {} was created but not delivered ({})",
            outcome.ticket.ticket_id,
            outcome.delivery.cause.as_deref().unwrap_or("unknown cause")
        );
    }

    let output = json!({
        "runId": outcome.run.run_id,
        "ticket": outcome.ticket,
        "delivery": outcome.delivery,
        "context": outcome.run.context,
        "actions": outcome.run.reports,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}

fn cmd_classify(text: &str, plan: &str) -> Result<()> {
    let plan = PlanTier::from(plan);
    let priority = Classifier::default().classify(text, &plan);

    println!("Priority:  {}", priority);
    println!("Response:  {}", priority.estimated_response());
    println!("Assign to: {}", priority.assignee());

    Ok(())
}

fn cmd_config(config: &Config) -> Result<()> {
    print!("{}", config.to_toml()?);
    Ok(())
}
