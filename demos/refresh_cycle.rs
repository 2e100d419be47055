//! Refresh cycle example demonstrating resilient ingestion.
//!
//! This example shows how to:
//! - Describe JSON list endpoints as sources
//! - Run them through an orchestrator with per-source breakers
//! - Watch a failing dependency trip its circuit across runs
//! - Serve a fallback while a circuit is open
//!
//! Everything runs offline against a scripted transport and a manual clock.
//!
//! Run with: RUST_LOG=info cargo run --example refresh_cycle

use ingestbridge::core::{IngestError, ManualClock};
use ingestbridge::fetch::MockTransport;
use ingestbridge::prelude::*;
use ingestbridge::store::OutcomeFilter;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const STATIONS: &str = "https://celestrak.example/gp.php?GROUP=stations&FORMAT=json";
const LAUNCHES: &str = "https://ll.example/2.2.0/launch/upcoming/";
const FILINGS: &str = "https://fcc.example/api/filings?band=ka";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    println!("=== Refresh Cycle Example ===\n");

    // Stations and launches answer; the filings API is down.
    let transport = MockTransport::new()
        .with_sticky(
            STATIONS,
            FetchResponse::json_body(
                200,
                &json!([
                    { "NORAD_CAT_ID": 25544, "OBJECT_NAME": "ISS (ZARYA)" },
                    { "NORAD_CAT_ID": 48274, "OBJECT_NAME": "CSS (TIANHE)" }
                ]),
            ),
        )
        .with_sticky(
            LAUNCHES,
            FetchResponse::json_body(
                200,
                &json!({ "results": [{ "id": "f9-starlink", "status": "Go" }] }),
            ),
        )
        .with_sticky(FILINGS, FetchResponse::new(503, "maintenance"));
    let transport = Arc::new(transport);

    let clock = Arc::new(ManualClock::new());
    let store = Arc::new(MemoryStore::new());
    let config = OrchestratorConfig::from_json_str(
        r#"{ "inter_source_delay_ms": 1500, "retry": { "max_attempts": 2 } }"#,
    )?;
    let context = IngestContext::new(transport.clone(), store.clone(), clock.clone())
        .with_config(&config);

    let orchestrator = Orchestrator::builder()
        .with_context(&context)
        .with_config(&config)
        .add_fetcher(
            context.fetcher(
                JsonApiSource::new("celestrak", "satellites")
                    .with_request(FetchRequest::get(STATIONS))
                    .with_key_field("NORAD_CAT_ID"),
            ),
        )
        .add_fetcher_then_wait(
            context.fetcher(
                JsonApiSource::new("fcc", "filings")
                    .with_request(FetchRequest::get(FILINGS))
                    .with_breaker_config(
                        CircuitBreakerConfig::new()
                            .with_failure_threshold(2)
                            .with_reset_timeout(Duration::from_secs(600)),
                    ),
            ),
            Duration::from_secs(3),
        )
        .add_fetcher(
            context.fetcher(
                JsonApiSource::new("launch-library", "launches")
                    .with_request(FetchRequest::get(LAUNCHES))
                    .with_items_at("/results"),
            ),
        )
        .build()?;

    for run in 1..=3 {
        let calls_before = transport.call_count();
        let summary = orchestrator.run().await;

        println!("Run #{}: {} records updated", run, summary.total_updated);
        for outcome in &summary.outcomes {
            println!(
                "  {:<15} {:<8} updated={} checked={} calls={}",
                outcome.source_name,
                outcome.outcome,
                outcome.items_updated,
                outcome.items_checked,
                outcome.api_calls_made
            );
        }
        println!("  HTTP calls this run: {}", transport.call_count() - calls_before);

        for status in context.registry.snapshot() {
            println!(
                "  breaker {:<15} {} (failures: {})",
                status.name, status.state, status.failures
            );
        }
        println!();
    }

    // Let the filings window elapse: the next call is the probe.
    clock.advance(Duration::from_secs(600));
    let fcc = context
        .registry
        .get("fcc")
        .ok_or_else(|| IngestError::internal("fcc breaker missing"))?;
    println!("After 10 minutes the fcc circuit is {}", fcc.state());

    // Consumers of the filings data get an empty list instead of an error.
    let fetch = context.retrying_fetch();
    let filings = fcc
        .execute(
            || async {
                let response = fetch.fetch("fcc", &FetchRequest::get(FILINGS)).await?;
                response
                    .json::<Vec<serde_json::Value>>()
                    .map_err(|e| IngestError::invalid_payload("fcc", e.to_string()))
            },
            Some(Vec::new()),
        )
        .await?;
    println!(
        "Probe failed, served {} cached filings; circuit is {}",
        filings.len(),
        fcc.state()
    );

    let history = store
        .outcomes(OutcomeFilter::new().with_source_name("fcc"))
        .await?;
    println!("\nRecorded {} fcc outcomes, {} satellites stored", history.len(), store.count("satellites").await?);
    println!("Simulated time slept: {:?}", clock.total_slept());

    println!("\n=== Example Complete ===");
    Ok(())
}
