use bucket_bloom_rs::api::create_router;
use bucket_bloom_rs::common::bytes2hr;
use bucket_bloom_rs::types::AppState;
use bucket_bloom_rs::{CommandAdapter, KeyRegistry, ServerConfig, resp};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    // load configuration from environment variables
    let config = ServerConfig::from_env()?;
    let filter_config = config.filter_config()?;
    let params = filter_config.params()?;

    let registry = Arc::new(KeyRegistry::new(filter_config.clone())?);
    let adapter = CommandAdapter::new(registry);

    let state = Arc::new(AppState {
        adapter: adapter.clone(),
    });

    // Create router with logging middleware
    let app = create_router(state).layer(
        tower_http::trace::TraceLayer::new_for_http()
            .make_span_with(|request: &axum::http::Request<_>| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            })
            .on_response(
                |response: &axum::http::Response<_>,
                 latency: std::time::Duration,
                 _span: &tracing::Span| {
                    tracing::info!(
                        status = %response.status(),
                        latency = ?latency,
                        "response generated"
                    );
                },
            ),
    );

    let http_addr = config.http_addr();
    let resp_addr = config.resp_addr();
    let http_listener = tokio::net::TcpListener::bind(&http_addr).await?;
    let resp_listener = tokio::net::TcpListener::bind(&resp_addr).await?;

    info!(
        r#"
    Time-Bucketed Bloom Filter Server Starting

    Filter Configuration (per key):
       • Capacity per bucket: {:>10} items
       • False Positive Rate: {:>10.4}%
       • Buckets:             {:>10}
       • Bits per bucket:     {:>10}
       • Hash functions:      {:>10}
       • Memory per key:      {:>10}
       • Max item length:     {:>10} bytes

    Server Information:
       • RESP:          redis-cli -h {} -p {}
       • HTTP:          http://{}
       • Swagger UI:    http://{}/swagger-ui/

    Commands: BBF.ADD BBF.EXISTS BBF.INCTIME BBF.SETTIME BBF.CLRTIME BBF.INFO
    Performance Mode: {}
    "#,
        filter_config.capacity_per_bucket,
        filter_config.false_positive_rate * 100.0,
        filter_config.num_buckets,
        params.bits_per_block,
        params.num_hashes,
        bytes2hr(params.bytes_per_filter(filter_config.num_buckets)),
        filter_config.max_item_len,
        config.server_host,
        config.resp_port,
        http_addr,
        http_addr,
        if cfg!(debug_assertions) {
            "DEBUG"
        } else {
            "RELEASE"
        }
    );

    let resp_handle = tokio::spawn(resp::serve(resp_listener, adapter));
    let http_handle = tokio::spawn(async move {
        axum::serve(http_listener, app).await
    });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
        result = resp_handle => {
            error!(?result, "RESP listener stopped");
        }
        result = http_handle => {
            error!(?result, "HTTP server stopped");
        }
    }

    info!("Server stopped");
    Ok(())
}
