use std::net::SocketAddr;
use std::path::Path;

use axum::http::header;
use axum::middleware::map_response;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use axum_prometheus::PrometheusMetricLayer;
use buildscope_core::aggregator::Aggregator;
use buildscope_core::invoker::ResilientInvoker;
use buildscope_core::report::render_html;
use buildscope_core::tools::ToolRegistry;
use buildscope_core::types::AnalysisRun;
use clap::Parser;
use shadow_rs::shadow;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::propagate_header::PropagateHeaderLayer;
use tower_http::sensitive_headers::SetSensitiveHeadersLayer;
use tower_http::trace;
use tracing::{info, warn};

use crate::config::{Cli, Command, OutputFormat};
use crate::errors::AppError;

mod config;
pub mod errors;
pub mod logger;
mod routes;

shadow!(build);

pub const APP_VERSION: &str = shadow_rs::formatcp!(
    "{} ({} {}), build_env: {}, {}, {}",
    build::PKG_VERSION,
    build::SHORT_COMMIT,
    build::BUILD_TIME,
    build::RUST_VERSION,
    build::RUST_CHANNEL,
    build::CARGO_VERSION
);

async fn set_version_header<B>(mut res: Response<B>) -> Response<B> {
    match APP_VERSION.parse() {
        Ok(value) => {
            res.headers_mut().insert("x-version-id", value);
        }
        Err(err) => {
            warn!("Failed to parse x-version-id header value: {err}");
        }
    }
    res
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> errors::Result<()> {
    logger::setup(&["buildscope_app", "buildscope_core"], "info");

    let cli = Cli::parse();

    let invoker = ResilientInvoker::from_settings(&cli.llm.settings());
    let settings = cli.analysis.settings();
    info!(
        "PROJECT_ROOT: {}, unit deadline: {:?}",
        settings.project_root.display(),
        settings.unit_timeout
    );
    let aggregator = Aggregator::new(ToolRegistry::standard(), invoker, settings);

    if let Some(Command::Analyze { log, format }) = cli.command {
        return analyze_file(&aggregator, &log, format).await;
    }

    serve(aggregator).await
}

async fn analyze_file(
    aggregator: &Aggregator,
    path: &Path,
    format: OutputFormat,
) -> errors::Result<()> {
    let bytes = tokio::fs::read(path).await?;
    let log = routes::decode_lossy(bytes);
    let run = aggregator.analyze(&log).await;
    println!("{}", format_run(&run, format)?);
    Ok(())
}

fn format_run(run: &AnalysisRun, format: OutputFormat) -> errors::Result<String> {
    let output = match format {
        OutputFormat::Json => serde_json::to_string_pretty(&run.to_result_map())?,
        OutputFormat::Html => render_html(run),
        OutputFormat::Text => {
            let mut sections: Vec<String> = run
                .tool_results
                .iter()
                .map(|(name, output)| {
                    format!("== {name} ==\n{}", output.display_text().trim_end())
                })
                .collect();
            sections.push(format!(
                "== summary ({}) ==\n{}",
                run.summary.model_name, run.summary.text
            ));
            sections.push(format!("elapsed: {:.2}s", run.elapsed_secs()));
            sections.join("\n\n")
        }
    };
    Ok(output)
}

async fn serve(aggregator: Aggregator) -> errors::Result<()> {
    let token: CancellationToken = CancellationToken::new();

    let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();
    let route = Router::new()
        .merge(routes::create_route(aggregator))
        .route("/metrics", get(|| async move { metric_handle.render() }))
        .layer(prometheus_layer)
        .layer(map_response(set_version_header))
        // High level logging of requests and responses
        .layer(
            trace::TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new().include_headers(true))
                .on_request(trace::DefaultOnRequest::new().level(tracing::Level::DEBUG))
                .on_response(trace::DefaultOnResponse::new().level(tracing::Level::DEBUG)),
        )
        // Keep the `Authorization` request header out of logs.
        .layer(SetSensitiveHeadersLayer::new(std::iter::once(
            header::AUTHORIZATION,
        )))
        .layer(CompressionLayer::new())
        // Propagate `x-request-id`s from requests to responses
        .layer(PropagateHeaderLayer::new(header::HeaderName::from_static(
            "x-request-id",
        )))
        .layer(CorsLayer::permissive());

    let http_host = std::env::var("HTTP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let http_port = std::env::var("HTTP_PORT").unwrap_or_else(|_| "8080".to_string());
    let http_addr: SocketAddr = format!("{http_host}:{http_port}")
        .parse()
        .map_err(|err| {
            AppError::from(std::io::Error::new(std::io::ErrorKind::InvalidInput, err))
        })?;
    let svc = route.into_make_service_with_connect_info::<SocketAddr>();
    let http_listener = tokio::net::TcpListener::bind(http_addr).await?;
    let shutdown_token = token.clone();
    let f: tokio::task::JoinHandle<errors::Result<()>> = tokio::spawn(async move {
        axum::serve(http_listener, svc)
            .with_graceful_shutdown(shutdown_signal(shutdown_token))
            .await?;
        Ok(())
    });

    info!("BuildScope is running on http://{http_addr}, POST logs to http://{http_addr}/analyze/");

    f.await.map_err(|err| AppError::from(std::io::Error::other(err)))??;
    info!("Server shutdown");

    Ok(())
}

async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!("failed to install Ctrl+C handler: {err}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!("failed to install signal handler: {err}");
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            token.cancel()
        },
        _ = terminate => {
            token.cancel()
        },
    }

    info!("signal received, starting graceful shutdown");
}
