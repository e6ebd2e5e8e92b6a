use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use folio_edge::analytics::AnalyticsClient;
use folio_edge::config::{Args, Command, ReportArgs, ServeArgs};
use folio_edge::render::DocumentShellRenderer;
use folio_edge::visitor::VisitorFilter;
use folio_edge::{logging, metrics, server, AppState};

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    logging::init(&args.default_log_level());

    let result = match args.command {
        Some(Command::Report(report_args)) => report(report_args).await,
        None => serve(args.serve).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err}");
            ExitCode::FAILURE
        }
    }
}

async fn serve(args: ServeArgs) -> Result<(), Box<dyn std::error::Error>> {
    // ── 1. Visitor classifier data ───────────────────────────────
    let filter = VisitorFilter::from_config(&args.load_filter()?)?;

    // ── 2. Build shared state ────────────────────────────────────
    let state = Arc::new(AppState::new(
        metrics::select(args.metrics_enabled),
        filter,
        Arc::new(DocumentShellRenderer),
        args.static_dir.clone(),
        args.index_path(),
    ));

    // ── 3. Build Axum router ─────────────────────────────────────
    let app = server::create_router(state);

    // ── 4. Bind & serve ──────────────────────────────────────────
    let addr = args.listen_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!(
        static_dir = %args.static_dir.display(),
        metrics = args.metrics_enabled,
        "edge server listening on http://{addr}"
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("edge server stopped");
    Ok(())
}

async fn report(args: ReportArgs) -> Result<(), Box<dyn std::error::Error>> {
    let client = AnalyticsClient::new(&args.url);
    let report = client.report().await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report.to_text());
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "cannot listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
