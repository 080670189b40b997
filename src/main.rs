use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use a858_stats_bot::bot::{Bot, BotContext, Services};
use a858_stats_bot::config::{expand_path, Config};
use a858_stats_bot::constants::DEFAULT_RC_FILE;
use a858_stats_bot::mailer::SmtpRelay;
use a858_stats_bot::quote::HttpQuoteSource;
use a858_stats_bot::reddit::RedditClient;
use a858_stats_bot::stats::{fetch_latest, HttpDocumentSource};

#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Path to the rc file holding the bot configuration.
    #[arg(long, env = "A858_RC_FILE", default_value = DEFAULT_RC_FILE)]
    config: String,

    /// Run a single cycle and exit.
    #[arg(long)]
    once: bool,

    /// Print the statistics of the newest post and exit.
    #[arg(long, conflicts_with = "once")]
    print_stats: bool,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    init_tracing()?;

    let config_path = expand_path(&cli.config);
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path.display()))?;

    info!(username = %config.username, stats_url = %config.stats_url, "Configuration loaded");

    let source = HttpDocumentSource::new(&config.stats_url, &config.user_agent)
        .context("Failed to build HTTP client")?;

    if cli.print_stats {
        let stats = fetch_latest(&source)
            .await
            .context("Failed to read the newest post")?;
        println!("{stats}");
        return Ok(());
    }

    let services = Services {
        platform: Box::new(RedditClient::new(&config).context("Failed to build Reddit client")?),
        relay: Box::new(SmtpRelay::new(config.mail.clone())),
        quotes: Box::new(
            HttpQuoteSource::new(&config.quote_url, &config.user_agent)
                .context("Failed to build quote client")?,
        ),
        source: Box::new(source),
    };

    let stop = CancellationToken::new();
    let ctx = BotContext::open(config, stop.clone()).context("Failed to open dedup cache")?;
    let mut bot = Bot::new(ctx, services);

    if cli.once {
        let outcome = bot.run_cycle().await?;
        info!(?outcome, "Single cycle finished");
        return Ok(());
    }

    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown signal received, finishing current cycle");
        stop.cancel();
    });

    bot.run().await?;

    info!("Shutdown complete");

    Ok(())
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,a858_stats_bot=debug"));

    // Check if JSON logging is requested
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| matches!(v.to_lowercase().as_str(), "json" | "structured"))
        .unwrap_or(false);

    if use_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
