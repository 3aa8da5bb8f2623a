use clap::Parser;
use hostpulse::model::Sampled;
use hostpulse::Collector;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "hostpulse")]
#[command(version)]
struct Cli {
    /// Poll interval for CPU and memory samples.
    #[arg(long, default_value = "1s", value_parser = humantime::parse_duration)]
    fast_interval: Duration,
    /// Poll interval for identity and disk samples.
    #[arg(long, default_value = "5s", value_parser = humantime::parse_duration)]
    slow_interval: Duration,
    /// Take a single aggregate snapshot, print it and exit.
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();
    if cli.fast_interval.is_zero() || cli.slow_interval.is_zero() {
        error!("poll intervals must be greater than zero");
        std::process::exit(1);
    }

    let collector = Arc::new(Collector::new());

    if cli.once {
        let snapshot = collector.aggregate_snapshot().await;
        match serde_json::to_string_pretty(&snapshot) {
            Ok(text) => println!("{text}"),
            Err(err) => error!(error = %err, "cannot encode snapshot"),
        }
        return;
    }

    info!(
        fast_interval = %humantime::format_duration(cli.fast_interval),
        slow_interval = %humantime::format_duration(cli.slow_interval),
        "starting hostpulse poller"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let fast_task = {
        let collector = collector.clone();
        let mut shutdown = shutdown_rx.clone();
        let interval = cli.fast_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = ticker.tick() => {
                        let cpu = collector.cpu_metrics().await;
                        emit("cpu", &cpu);
                        let memory = collector.memory_metrics().await;
                        emit("memory", &memory);
                    }
                }
            }
        })
    };

    let slow_task = {
        let collector = collector.clone();
        let mut shutdown = shutdown_rx.clone();
        let interval = cli.slow_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = ticker.tick() => {
                        let identity = collector.system_identity().await;
                        emit("system", &identity);
                        let disk = collector.disk_metrics().await;
                        emit("disk", &disk);
                    }
                }
            }
        })
    };

    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "cannot wait for Ctrl+C");
    }
    info!("received Ctrl+C, stopping pollers");

    let _ = shutdown_tx.send(true);
    let _ = fast_task.await;
    let _ = slow_task.await;
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[derive(Serialize)]
struct SampleLine<'a, T> {
    kind: &'static str,
    #[serde(flatten)]
    sample: &'a Sampled<T>,
}

fn emit<T: Serialize>(kind: &'static str, sample: &Sampled<T>) {
    match serde_json::to_string(&SampleLine { kind, sample }) {
        Ok(line) => println!("{line}"),
        Err(err) => error!(kind, error = %err, "cannot encode sample"),
    }
}
