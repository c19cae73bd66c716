use anyhow::{Context, Result};
use clap::Parser;
use secrecy::SecretString;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use hubrelay::config::{RuntimeOptions, Settings, DEFAULT_CONFIG_PATH};
use hubrelay::dedup::DedupTracker;
use hubrelay::dispatcher::Dispatcher;
use hubrelay::feed::{FeedRouter, FixtureFeedSource, HttpFeedSource};
use hubrelay::schedule::{Clock, SystemClock, TriggerPlan};
use hubrelay::sink::{LogSink, OutboundSink, TelegramSink};
use hubrelay::trigger::Trigger;

/// How long a cycle in flight may keep running after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(15);

#[derive(Parser, Debug)]
#[command(
    name = "hubrelay",
    version,
    about = "Relay new RSSHub feed items to a Telegram chat"
)]
struct Args {
    /// Path to the TOML config file
    #[arg(long, value_name = "FILE", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Deliver every item on every cycle (no deduplication)
    #[arg(long, env = "DEBUG_MODE")]
    debug_mode: bool,

    /// Poll the fixture feed instead of the configured feeds
    #[arg(long, env = "USE_MOCK_DATA")]
    use_mock_data: bool,

    /// Log messages instead of sending them to Telegram
    #[arg(long, env = "SIMULATE_BOT_ONLY")]
    simulate_bot_only: bool,

    /// Do not run a cycle at startup
    #[arg(long, env = "SKIP_INITIAL_CHECK")]
    skip_initial_check: bool,

    /// Target Telegram chat
    #[arg(long, env = "CHAT_ID", hide_env_values = true)]
    chat_id: Option<String>,

    /// Telegram bot token
    #[arg(long, env = "TELEGRAM_BOT_TOKEN", hide_env_values = true)]
    bot_token: Option<String>,
}

impl Args {
    fn runtime_options(self) -> RuntimeOptions {
        RuntimeOptions {
            chat_id: self.chat_id,
            bot_token: self
                .bot_token
                .filter(|t| !t.trim().is_empty())
                .map(SecretString::from),
            debug_mode: self.debug_mode,
            use_mock_data: self.use_mock_data,
            simulate_bot_only: self.simulate_bot_only,
            skip_initial_check: self.skip_initial_check,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional; real environment variables win
    let dotenv = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("hubrelay=info")),
        )
        .init();

    if let Ok(path) = dotenv {
        tracing::debug!(path = %path.display(), "Loaded .env");
    }

    let args = Args::parse();
    let config_path = args.config.clone();
    let settings = Settings::load(&config_path, args.runtime_options())
        .with_context(|| format!("Failed to load configuration from {}", config_path.display()))?;
    tracing::debug!(settings = ?settings, "Effective settings");

    let dispatcher = Arc::new(build_dispatcher(&settings)?);

    let plan = TriggerPlan::from_config(
        &settings.schedule,
        settings.skip_initial_check,
        SystemClock.now(),
    );
    tracing::info!(
        plan = ?plan,
        debug_mode = settings.debug_mode,
        mock = settings.use_mock_data,
        simulate = settings.simulate_bot_only,
        "Starting hubrelay"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let trigger = Trigger::new(plan, settings.schedule.timezone);
    let mut task = tokio::spawn(trigger.run(Arc::clone(&dispatcher), shutdown_rx));

    tokio::select! {
        signal = shutdown_signal() => {
            signal.context("Failed to listen for shutdown signal")?;
            tracing::info!("Shutdown signal received");
        }
        joined = &mut task => {
            // Only reachable when the plan has no periodic part
            joined.context("Trigger task panicked")?;
            tracing::info!("No further checks scheduled, exiting");
            return Ok(());
        }
    }

    let _ = shutdown_tx.send(true);
    match tokio::time::timeout(SHUTDOWN_GRACE, &mut task).await {
        Ok(joined) => joined.context("Trigger task panicked")?,
        Err(_) => {
            tracing::warn!(
                grace_secs = SHUTDOWN_GRACE.as_secs(),
                "Cycle still running after grace period, aborting"
            );
            task.abort();
        }
    }

    tracing::info!("Goodbye");
    Ok(())
}

fn build_dispatcher(settings: &Settings) -> Result<Dispatcher> {
    let client = reqwest::Client::builder()
        .user_agent(concat!("hubrelay/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")?;

    let source = FeedRouter::new(
        HttpFeedSource::new(client.clone(), settings.rss_hub_url.clone()),
        FixtureFeedSource::new(settings.fixture_dir.clone()),
    );

    let sink: Arc<dyn OutboundSink> = match (&settings.bot_token, settings.simulate_bot_only) {
        (Some(token), false) => Arc::new(
            TelegramSink::new(client, token.clone()).with_api_base(&settings.telegram_api_base),
        ),
        _ => {
            tracing::warn!("Simulate mode: messages will be logged, not sent");
            Arc::new(LogSink)
        }
    };

    let tracker = if settings.debug_mode {
        tracing::warn!("Debug mode: deduplication disabled, every item is delivered each cycle");
        DedupTracker::bypassed()
    } else {
        DedupTracker::new()
    };

    Ok(Dispatcher::new(
        settings.feeds.clone(),
        settings.chat_id.clone(),
        Arc::new(source),
        sink,
    )
    .with_tracker(tracker)
    .with_max_items_per_feed(settings.max_items_per_feed))
}

async fn shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = signal(SignalKind::terminate())?;
        tokio::select! {
            res = tokio::signal::ctrl_c() => res,
            _ = term.recv() => Ok(()),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await
    }
}
