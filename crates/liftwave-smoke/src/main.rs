//! Liftwave Smoke Harness
//!
//! Drives the offline cache coordinator through a scripted deployment:
//! install, activate, a mixed fetch workload, an offline window, background
//! sync replay, and control-plane queries. Prints a JSON pass/fail summary.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use liftwave_common::{init_logging, LogConfig};
use liftwave_net::{Fetch, Request, ScriptedFetcher};
use liftwave_sw::{
    CacheCoordinator, ControlReply, ControlRequest, MemoryQueue, SwConfig, WorkerState,
};
use serde_json::json;
use tracing::{error, info};
use url::Url;

/// Performance timing collector for tracking operation durations.
struct PerfTiming {
    timings: Mutex<HashMap<&'static str, Vec<Duration>>>,
}

impl PerfTiming {
    fn new() -> Self {
        Self {
            timings: Mutex::new(HashMap::new()),
        }
    }

    fn record(&self, operation: &'static str, duration: Duration) {
        self.timings
            .lock()
            .unwrap()
            .entry(operation)
            .or_default()
            .push(duration);
    }

    fn summary(&self) -> serde_json::Value {
        let timings = self.timings.lock().unwrap();
        let mut summary = serde_json::Map::new();

        for (op, durations) in timings.iter() {
            if durations.is_empty() {
                continue;
            }

            let count = durations.len();
            let total_ms: f64 = durations.iter().map(|d| d.as_secs_f64() * 1000.0).sum();
            let avg_ms = total_ms / count as f64;
            let min_ms = durations
                .iter()
                .map(|d| d.as_secs_f64() * 1000.0)
                .fold(f64::INFINITY, f64::min);
            let max_ms = durations
                .iter()
                .map(|d| d.as_secs_f64() * 1000.0)
                .fold(f64::NEG_INFINITY, f64::max);

            summary.insert(
                op.to_string(),
                json!({
                    "count": count,
                    "total_ms": (total_ms * 100.0).round() / 100.0,
                    "avg_ms": (avg_ms * 100.0).round() / 100.0,
                    "min_ms": (min_ms * 100.0).round() / 100.0,
                    "max_ms": (max_ms * 100.0).round() / 100.0,
                }),
            );
        }

        serde_json::Value::Object(summary)
    }
}

/// Parse command line arguments
struct Args {
    iterations: u32,
    api_ttl_ms: u64,
    perf_output: Option<String>,
}

impl Args {
    fn parse() -> Self {
        let mut args = std::env::args().skip(1);
        let mut iterations = 20u32;
        let mut api_ttl_ms = 200u64;
        let mut perf_output = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--iterations" => {
                    if let Some(val) = args.next() {
                        iterations = val.parse().unwrap_or(20);
                    }
                }
                "--api-ttl-ms" => {
                    if let Some(val) = args.next() {
                        api_ttl_ms = val.parse().unwrap_or(200);
                    }
                }
                "--perf-output" => {
                    perf_output = args.next();
                }
                _ => {}
            }
        }

        Self {
            iterations,
            api_ttl_ms,
            perf_output,
        }
    }
}

const SCOPE: &str = "https://muscle-rotation.app";
const API_URL: &str = "https://demo.supabase.co/rest/v1/workouts?select=*";

fn script_deployment(fetcher: &ScriptedFetcher, config: &SwConfig) {
    for path in &config.static_files {
        fetcher.respond(
            &format!("{SCOPE}{path}"),
            200,
            Some("text/html"),
            &format!("content of {path}"),
        );
    }
    for path in &config.image_files {
        fetcher.respond(&format!("{SCOPE}{path}"), 200, Some("image/png"), "png");
    }
    for path in &config.partial_files {
        fetcher.respond(&format!("{SCOPE}{path}"), 200, Some("text/html"), "<div/>");
    }
    fetcher.respond(API_URL, 200, Some("application/json"), r#"[{"id":1}]"#);
    fetcher.respond(&format!("{SCOPE}/api/sync-workouts"), 200, None, "{}");
}

fn get(url: &str) -> Request {
    Request::get(Url::parse(url).expect("valid smoke URL"))
}

fn fail(reason: &str, start: Instant) -> ! {
    let result = json!({
        "status": "fail",
        "reason": reason,
        "elapsed_ms": start.elapsed().as_millis()
    });
    println!("{result}");
    std::process::exit(1);
}

#[tokio::main]
async fn main() {
    init_logging(LogConfig::production().with_filter("liftwave=info"));

    let args = Args::parse();
    info!(
        iterations = args.iterations,
        api_ttl_ms = args.api_ttl_ms,
        "Starting Liftwave Smoke Harness"
    );

    let start = Instant::now();
    let perf = PerfTiming::new();

    let mut config = SwConfig::default();
    config.api_ttl = Duration::from_millis(args.api_ttl_ms);
    config.dynamic_cap = 10;
    let static_probe = format!("{SCOPE}{}", config.static_files[1]);

    let fetcher = Arc::new(ScriptedFetcher::new());
    script_deployment(&fetcher, &config);

    let coordinator = match CacheCoordinator::new(config, fetcher.clone() as Arc<dyn Fetch>) {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "Coordinator construction failed");
            fail("coordinator_init", start);
        }
    };

    // Lifecycle: install then activate
    let install_start = Instant::now();
    if let Err(e) = coordinator.install().await {
        error!(error = %e, "Install failed");
        fail("install", start);
    }
    perf.record("install", install_start.elapsed());

    let activate_start = Instant::now();
    if let Err(e) = coordinator.activate().await {
        error!(error = %e, "Activate failed");
        fail("activate", start);
    }
    perf.record("activate", activate_start.elapsed());

    if coordinator.state().await != WorkerState::Activated {
        fail("not_activated", start);
    }

    // Mixed online workload: shell hits, API reads, dynamic churn
    for i in 0..args.iterations {
        let fetch_start = Instant::now();
        let shell = coordinator.handle_fetch(get(&static_probe)).await;
        perf.record("fetch_static", fetch_start.elapsed());
        if !shell.ok() {
            fail("static_fetch", start);
        }

        let fetch_start = Instant::now();
        let api = coordinator.handle_fetch(get(API_URL)).await;
        perf.record("fetch_api", fetch_start.elapsed());
        if !api.ok() {
            fail("api_fetch", start);
        }

        let dynamic_url = format!("https://cdn.example.com/asset-{i}.woff2");
        fetcher.respond(&dynamic_url, 200, Some("font/woff2"), "glyphs");
        let fetch_start = Instant::now();
        coordinator.handle_fetch(get(&dynamic_url)).await;
        perf.record("fetch_dynamic", fetch_start.elapsed());
    }

    // Offline window: shell and fresh API data must still serve
    fetcher.set_offline(true);

    let offline_start = Instant::now();
    let shell = coordinator.handle_fetch(get(&static_probe)).await;
    perf.record("fetch_offline", offline_start.elapsed());
    if !shell.ok() {
        fail("offline_static", start);
    }

    let api = coordinator.handle_fetch(get(API_URL)).await;
    if !api.ok() {
        fail("offline_api_within_ttl", start);
    }

    let nav = coordinator
        .handle_fetch(Request::navigate(
            Url::parse(&format!("{SCOPE}/dashboard")).expect("valid smoke URL"),
        ))
        .await;
    if !nav.ok() {
        fail("offline_navigation", start);
    }

    // Background sync: queue a workout offline, replay when back online
    let queue = MemoryQueue::new();
    queue.queue_workout(json!({"exercise": "squat", "sets": 5})).await;
    fetcher.set_offline(false);

    let sync_start = Instant::now();
    if let Err(e) = coordinator.handle_sync("workout-sync", &queue).await {
        error!(error = %e, "Sync replay failed");
        fail("sync_replay", start);
    }
    perf.record("sync_replay", sync_start.elapsed());
    if queue.workout_count().await != 0 {
        fail("sync_queue_not_cleared", start);
    }

    // Control plane: eviction pass plus stats
    let reply = coordinator
        .handle_message(ControlRequest::OptimizeCaches)
        .await;
    if !matches!(reply, Some(ControlReply::Optimized { success: true, .. })) {
        fail("optimize_caches", start);
    }

    let Some(ControlReply::Stats { stats }) = coordinator
        .handle_message(ControlRequest::GetPerformanceStats)
        .await
    else {
        fail("stats_reply", start);
    };

    if let Some(ref perf_path) = args.perf_output {
        let perf_json = json!({
            "timings": perf.summary(),
            "total_elapsed_ms": start.elapsed().as_millis()
        });
        if let Err(e) = std::fs::write(perf_path, perf_json.to_string()) {
            error!(error = %e, "Failed to write perf output");
        } else {
            info!(perf_path, "Perf summary written");
        }
    }

    let result = json!({
        "status": "pass",
        "elapsed_ms": start.elapsed().as_millis(),
        "iterations": args.iterations,
        "network_calls": fetcher.total_calls(),
        "stats": stats,
        "perf": perf.summary()
    });
    println!("{result}");
}
