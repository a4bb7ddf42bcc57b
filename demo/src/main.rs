use std::time::Duration;

use azure_monitor_otel_distro::{DistroOptions, LoggingLevel, Protocol};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Optional first argument: a connection string or a bare OTLP endpoint
    let target = std::env::args().nth(1);

    let mut builder = DistroOptions::builder()
        .service_name("distro-demo")
        .service_namespace("demo")
        .service_instance_id("local-1")
        .protocol(Protocol::HttpProtobuf)
        .sampling_ratio(1.0)
        .tracing_export_interval(Duration::from_secs(5))
        .logging_export_interval(Duration::from_secs(5))
        .logging_level(LoggingLevel::Info)
        .instrumentations(["log", "panic", "django"]);

    match target {
        Some(ref t) if t.contains("InstrumentationKey=") => {
            builder = builder.connection_string(t.as_str());
        }
        Some(ref url) => builder = builder.endpoint(url.as_str()),
        None => {}
    }

    let guard = azure_monitor_otel_distro::configure_azure_monitor(Some(builder.build()))?;

    for (library, outcome) in guard.instrumentations().entries() {
        tracing::info!(library = %library, outcome = ?outcome, "instrumentation");
    }

    tracing::info!("Demo application started");

    fetch_user("user-42").await;
    process_order("order-123", 3).await;

    tracing::info!("Demo application finished");

    Ok(())
}

#[tracing::instrument]
async fn fetch_user(user_id: &str) {
    tracing::info!(user_id, "Fetching user from database");
    simulate_work(Duration::from_millis(50)).await;
    tracing::debug!(user_id, "User fetched successfully");
}

#[tracing::instrument]
async fn process_order(order_id: &str, item_count: u32) {
    tracing::info!(order_id, item_count, "Processing order");

    for i in 1..=item_count {
        process_item(order_id, i).await;
    }

    tracing::info!(order_id, "Order processed successfully");
}

#[tracing::instrument(skip(order_id))]
async fn process_item(order_id: &str, item_number: u32) {
    simulate_work(Duration::from_millis(30)).await;

    if item_number == 2 {
        tracing::warn!(order_id, item_number, "Item required retry");
        simulate_work(Duration::from_millis(20)).await;
    }
}

async fn simulate_work(duration: Duration) {
    tokio::time::sleep(duration).await;
}
