//! Counter Dashboard
//!
//! Staff-facing live order board for a food counter. Polls the order service
//! for the full order list, shows active orders by customer tab with running
//! stats, and lets staff place new orders and mark orders completed.

use std::sync::Arc;
use tracing::{info, warn, Subscriber};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub mod api;
pub mod commands;
pub mod diagnostics;
pub mod error;
pub mod filter;
pub mod lifecycle;
pub mod memory_service;
pub mod orders;
pub mod render;
pub mod stats;
pub mod storage;
pub mod store;
pub mod sync;

pub use api::{HttpOrderService, OrderService};
pub use error::{ApiError, DashboardError, ValidationError};
pub use filter::Tab;
pub use lifecycle::{OrderController, OrderDraft};
pub use memory_service::MemoryOrderService;
pub use orders::{Customer, CustomerKind, Order, OrderId, OrderStatus, OrderType};
pub use stats::OrderStats;
pub use storage::DashboardConfig;
pub use store::{OrderStore, Snapshot};
pub use sync::{SyncHandle, Synchronizer};

use commands::{StdinPrompter, ViewState};

/// Most severe level written to the terminal. The dashboard redraws over
/// stdout, so routine logs only go to the log file.
const CONSOLE_LOG_LEVEL: LevelFilter = LevelFilter::ERROR;

fn console_layer<S, W>(writer: W) -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    fmt::layer()
        .with_writer(writer)
        .with_target(true)
        .with_filter(CONSOLE_LOG_LEVEL)
}

fn file_layer<S, W>(writer: W, filter: EnvFilter) -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .with_filter(filter)
}

pub fn run() -> anyhow::Result<()> {
    // Initialize structured logging (console + rolling file)
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,counter_dashboard_lib=debug"));

    let log_dir = diagnostics::get_log_dir();
    diagnostics::prune_old_logs(&log_dir);
    std::fs::create_dir_all(&log_dir).ok();

    let file_appender = tracing_appender::rolling::daily(&log_dir, diagnostics::LOG_FILE_PREFIX);
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(console_layer(std::io::stderr))
        .with(file_layer(non_blocking, env_filter))
        .init();

    info!(
        "Starting Counter Dashboard v{} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("BUILD_GIT_SHA")
    );
    info!(about = %diagnostics::get_about_info(), "Build info");

    let config = storage::load_config()?;
    info!(
        service_url = %config.service_url,
        poll_interval_secs = config.poll_interval_secs,
        demo_mode = config.demo_mode,
        "Configuration loaded"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        if config.demo_mode {
            info!("Demo mode: using in-process order service");
            serve(MemoryOrderService::with_demo_members(), &config).await;
        } else {
            let service = HttpOrderService::new(&config.service_url, config.request_timeout())?;
            let probe = api::test_connectivity(service.base_url()).await;
            if probe.success {
                info!(latency_ms = ?probe.latency_ms, "Order service reachable");
            } else {
                warn!(
                    error = probe.error.as_deref().unwrap_or("unknown"),
                    "Order service not reachable yet; polling will keep retrying"
                );
            }
            serve(service, &config).await;
        }
        Ok::<(), anyhow::Error>(())
    })?;

    info!("Counter Dashboard stopped");
    Ok(())
}

async fn serve<S: OrderService>(service: S, config: &DashboardConfig) {
    let store = Arc::new(OrderStore::new());
    let sync = Synchronizer::new(Arc::new(service), store);
    let handle = sync.start(config.poll_interval());

    let controller = Arc::new(OrderController::new(sync));
    let view = ViewState::new();
    let renderer = commands::spawn_renderer(Arc::clone(&controller), view.clone());

    let mut prompter = StdinPrompter::new();
    commands::run_console(controller, view, &mut prompter).await;

    handle.stop().await;
    renderer.abort();
}
