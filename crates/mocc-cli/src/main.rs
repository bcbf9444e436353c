use std::net::SocketAddr;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use mocc_host::events::{self, Handler};
use mocc_host::scheduler::{self, Job};
use mocc_host::{AppContext, Settings, server};
use serde_json::json;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mocc")]
#[command(about = "MOCC backend: event handlers, HTTP endpoints and daily jobs", long_about = None)]
struct Cli {
    /// Default log filter when RUST_LOG is unset
    #[arg(long, env = "LOG_LEVEL", default_value = "info", global = true)]
    log_level: String,

    #[command(flatten)]
    settings: Settings,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the HTTP endpoints and run the daily jobs
    Serve {
        /// Address to listen on
        #[arg(long, env = "LISTEN", default_value = "0.0.0.0:7071")]
        listen: SocketAddr,
    },
    /// Run one daily job now
    Run {
        #[arg(value_enum)]
        job: JobArg,
    },
    /// Run one event handler on a blob URL
    Dispatch {
        /// Handler name, e.g. process-receipt-image
        handler: String,
        /// Blob URL carried by the event
        #[arg(long)]
        url: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum JobArg {
    ExpiryScan,
    DailyRecipes,
}

impl From<JobArg> for Job {
    fn from(arg: JobArg) -> Self {
        match arg {
            JobArg::ExpiryScan => Job::ExpiryScan,
            JobArg::DailyRecipes => Job::DailyRecipes,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .init();
    tracing::info!("mocc v{}", env!("CARGO_PKG_VERSION"));

    let ctx = AppContext::from_settings(&cli.settings).context("building application context")?;

    match cli.command {
        Commands::Serve { listen } => {
            let jobs = scheduler::spawn(ctx.clone());
            let result = server::serve(ctx, listen).await;
            for job in jobs {
                job.abort();
            }
            result.context("HTTP server failed")?;
        }
        Commands::Run { job } => {
            let job = Job::from(job);
            job.run(&ctx)
                .await
                .with_context(|| format!("job {job} failed"))?;
        }
        Commands::Dispatch { handler, url } => {
            let handler = Handler::from_name(&handler)
                .with_context(|| format!("unknown handler {handler}"))?;
            events::handle(&ctx, handler, &json!({ "url": url }))
                .await
                .with_context(|| format!("handler {handler} failed"))?;
        }
    }

    Ok(())
}
