use anyhow::{bail, Context, Result};
use bridge_desktop::{ReqwestHttpClient, TokioFileSystem};
use bridge_traits::HttpClient;
use chrono::Local;
use clap::{Parser, Subcommand};
use core_auth::{AuthManager, OAuthConfig, TokenStore, TraktOAuthClient};
use core_runtime::config::AppConfig;
use core_runtime::events::{
    AuthEvent, CoreEvent, EventBus, EventSeverity, EventStream, RecvError, SyncEvent,
};
use core_runtime::logging::{init_logging, redact_if_sensitive, LogLevel};
use core_sync::{RunSummary, Schedule, ScheduledTask, SyncOrchestrator, SyncScheduler};
use provider_emby::EmbyConnector;
use provider_trakt::TraktConnector;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Parser, Debug)]
#[command(name = "trakt-emby-sync", about = "Mirror Trakt lists into Emby collections")]
struct CliArgs {
    /// Overrides LOG_LEVEL (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sync every configured list once and exit
    Run,
    /// Keep running and sync on the configured schedule
    Schedule {
        /// Also sync immediately on start
        #[arg(long)]
        run_now: bool,
    },
    /// Authorize this device with Trakt, or forget the stored token
    Auth {
        #[arg(long)]
        sign_out: bool,
    },
    /// Print when the next scheduled sync would start
    NextRun,
}

struct App {
    orchestrator: Arc<SyncOrchestrator>,
    auth: Arc<AuthManager>,
    event_bus: EventBus,
}

impl App {
    fn build(config: AppConfig) -> Result<Self> {
        let http: Arc<dyn HttpClient> =
            Arc::new(ReqwestHttpClient::new().context("Failed to create HTTP client")?);
        let event_bus = EventBus::default();

        let store = TokenStore::new(
            Arc::new(TokioFileSystem::new()),
            config.trakt.token_file.clone(),
        );
        let oauth = TraktOAuthClient::new(
            OAuthConfig::new(&config.trakt.client_id, &config.trakt.client_secret),
            Arc::clone(&http),
        );
        let auth = Arc::new(AuthManager::new(Arc::new(oauth), store, event_bus.clone()));

        let source = Arc::new(TraktConnector::new(
            Arc::clone(&http),
            config.trakt.client_id.clone(),
        ));
        let server = Arc::new(EmbyConnector::new(
            http,
            config.emby.server_url.clone(),
            config.emby.api_key.clone(),
        ));

        let orchestrator = Arc::new(
            SyncOrchestrator::new(config, source, server, auth.clone())
                .with_event_bus(event_bus.clone()),
        );

        Ok(Self {
            orchestrator,
            auth,
            event_bus,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    let mut config = AppConfig::from_env();
    if let Some(level) = cli_args.log_level.as_deref() {
        config.logging.level = level.parse::<LogLevel>()?;
    }
    init_logging(config.logging.clone()).context("Failed to initialize logging")?;

    if let Command::NextRun = cli_args.command {
        let schedule = Schedule::from_settings(&config.schedule);
        println!(
            "Next {} sync: {}",
            schedule.interval,
            schedule.next_occurrence(&Local::now()).format("%Y-%m-%d %H:%M %Z")
        );
        return Ok(());
    }

    info!(
        server = %config.emby.server_url,
        api_key = %redact_if_sensitive("api_key", &config.emby.api_key),
        lists = config.lists.len(),
        "Starting trakt-emby-sync"
    );
    let app = App::build(config)?;
    let shutdown = CancellationToken::new();
    let printer = spawn_event_printer(&app.event_bus, shutdown.child_token());

    let result = match cli_args.command {
        Command::Run => run_once(&app).await,
        Command::Schedule { run_now } => run_scheduler(&app, run_now, shutdown.clone()).await,
        Command::Auth { sign_out } => authorize(&app, sign_out).await,
        Command::NextRun => Ok(()),
    };

    shutdown.cancel();
    if let Err(err) = printer.await {
        warn!(error = %err, "Event printer stopped abnormally");
    }
    result
}

async fn run_once(app: &App) -> Result<()> {
    let summary = app
        .orchestrator
        .sync_all(&app.orchestrator.reporter(None))
        .await?;
    print_summary(&summary);
    if summary.lists_synced == 0 && summary.lists_failed > 0 {
        bail!("All {} lists failed to sync", summary.lists_failed);
    }
    Ok(())
}

async fn run_scheduler(app: &App, run_now: bool, shutdown: CancellationToken) -> Result<()> {
    let schedule = Schedule::from_settings(&app.orchestrator.config().schedule);
    let task: Arc<dyn ScheduledTask> = app.orchestrator.clone();
    let (scheduler, _handle) = SyncScheduler::new(schedule, task, shutdown.clone());
    let scheduler = scheduler.with_initial_run(run_now);

    println!("Next sync: {}", scheduler.next_run().format("%Y-%m-%d %H:%M %Z"));

    let ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, stopping scheduler");
        }
        ctrl_c.cancel();
    });

    let runs = scheduler.run().await;
    info!(runs, "Scheduler stopped");
    Ok(())
}

async fn authorize(app: &App, sign_out: bool) -> Result<()> {
    if sign_out {
        app.auth.sign_out().await?;
        println!("Stored Trakt token removed");
        return Ok(());
    }

    let trakt = &app.orchestrator.config().trakt;
    if trakt.client_id.is_empty() || trakt.client_secret.is_empty() {
        bail!("TRAKT_CLIENT_ID and TRAKT_CLIENT_SECRET must be set to authorize");
    }

    let tokens = app.auth.authorize_device().await?;
    let expires = tokens
        .expires_at_utc()
        .map(|at| at.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "unknown".to_string());
    println!(
        "Trakt authorized; token saved to {} (expires {})",
        trakt.token_file.display(),
        expires
    );
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    for report in &summary.reports {
        println!(
            "{}: {} movies, {} shows in collection {} ({} unmatched, {} failed)",
            report.list_name,
            report.counts.movies,
            report.counts.shows,
            report.collection_id,
            report.unmatched,
            report.failed
        );
        if report.created && report.added < report.requested {
            println!(
                "  only {} of {} items were added to the new collection",
                report.added, report.requested
            );
        }
    }
    println!(
        "Synced {} lists, {} failed",
        summary.lists_synced, summary.lists_failed
    );
}

/// Echoes device-code prompts and progress milestones to stdout.
fn spawn_event_printer(event_bus: &EventBus, shutdown: CancellationToken) -> JoinHandle<()> {
    let mut events = EventStream::new(event_bus.subscribe()).filter(|event| {
        event.severity() >= EventSeverity::Info
            || matches!(event, CoreEvent::Sync(SyncEvent::Progress { .. }))
    });
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                event = events.recv() => match event {
                    Ok(event) => print_event(&event),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Event printer lagged behind");
                    }
                    Err(RecvError::Closed) => break,
                },
                _ = shutdown.cancelled() => {
                    while let Some(Ok(event)) = events.try_recv() {
                        print_event(&event);
                    }
                    break;
                }
            }
        }
    })
}

fn print_event(event: &CoreEvent) {
    match event {
        CoreEvent::Auth(AuthEvent::DeviceCodeIssued {
            user_code,
            verification_url,
            expires_in,
        }) => {
            println!(
                "Visit {} and enter code {} (expires in {}s)",
                verification_url, user_code, expires_in
            );
        }
        CoreEvent::Auth(AuthEvent::AuthError { message, .. }) => {
            eprintln!("Authentication error: {}", message);
        }
        CoreEvent::Sync(SyncEvent::Progress {
            list_name,
            fraction,
            message,
            ..
        }) => {
            println!("[{:>3.0}%] {}: {}", fraction * 100.0, list_name, message);
        }
        CoreEvent::Sync(SyncEvent::ListFailed { list_name, message }) => {
            eprintln!("{} failed: {}", list_name, message);
        }
        other => debug!(event = other.description(), "Event"),
    }
}
