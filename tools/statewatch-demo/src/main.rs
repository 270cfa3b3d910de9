//! Demonstration of the state watcher on simulated system probes.
//!
//! Watches CPU, memory and temperature levels at different intervals and
//! hysteresis settings, forces the temperature item to critical partway
//! through the run, and prints statistics at the end.
//!
//! # Environment variables
//!
//! | Variable             | Default | Description                  |
//! |----------------------|---------|------------------------------|
//! | `STATEWATCH_BASE_MS` | `200`   | Base interval in milliseconds |
//! | `RUST_LOG`           | `info`  | Log filter                   |

mod sim;

use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use statewatch::{ItemId, Registry, WatchItemConfig};

use sim::{Level, Probe};

#[derive(Parser, Debug)]
#[command(name = "statewatch-demo", about = "Watch simulated system probes")]
struct Args {
    /// Base interval in milliseconds
    #[arg(long, env = "STATEWATCH_BASE_MS", default_value_t = 200)]
    base_ms: u64,

    /// Total run time in seconds
    #[arg(long, default_value_t = 10)]
    run_secs: u64,

    /// Seconds after start at which temperature is forced to critical
    #[arg(long, default_value_t = 3)]
    force_after_secs: u64,

    /// How long the forced state lasts, in seconds
    #[arg(long, default_value_t = 2)]
    force_secs: u64,
}

struct Items {
    cpu: ItemId,
    memory: ItemId,
    temperature: ItemId,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let base = Duration::from_millis(args.base_ms);

    let registry = Registry::<Level>::with_base_interval(base);
    let items = add_items(&registry)?;

    registry.start()?;

    let outcome = tokio::select! {
        result = scripted_run(&registry, &items, &args) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down");
            Ok(())
        }
    };

    registry.stop().await;
    outcome?;
    print_report(&registry, &items)?;
    registry.cleanup().await;

    Ok(())
}

fn add_items(registry: &Registry<Level>) -> Result<Items> {
    let base = registry.base_interval();

    let mut cpu_probe = Probe::cpu();
    let cpu = registry.add_item(
        WatchItemConfig::new(move || cpu_probe.sample())
            .name("cpu")
            .interval(base * 5)
            .hysteresis(2)
            .on_change(|old, new| report("cpu", old, new)),
    )?;

    let mut memory_probe = Probe::memory();
    let memory = registry.add_item(
        WatchItemConfig::new(move || memory_probe.sample())
            .name("memory")
            .interval(base * 10)
            .on_change(|old, new| report("memory", old, new)),
    )?;

    let mut temperature_probe = Probe::temperature();
    let temperature = registry.add_item(
        WatchItemConfig::new(move || temperature_probe.sample())
            .name("temperature")
            .interval(base * 5)
            .hysteresis(3)
            .on_change(|old, new| report("temperature", old, new)),
    )?;

    Ok(Items {
        cpu,
        memory,
        temperature,
    })
}

fn report(name: &str, old: Level, new: Level) {
    if new == Level::Critical {
        warn!(item = name, %old, %new, "Level critical");
    } else if new > old {
        info!(item = name, %old, %new, "Level rising");
    } else {
        info!(item = name, %old, %new, "Level falling");
    }
}

async fn scripted_run(registry: &Registry<Level>, items: &Items, args: &Args) -> Result<()> {
    let run = Duration::from_secs(args.run_secs);
    let force_after = Duration::from_secs(args.force_after_secs).min(run);

    tokio::time::sleep(force_after).await;

    registry.force_state(
        items.temperature,
        Level::Critical,
        Duration::from_secs(args.force_secs),
    )?;
    if let Some(remaining) = registry.is_forced(items.temperature) {
        info!(
            remaining_ms = remaining.as_millis() as u64,
            "Temperature forced to critical"
        );
    }

    tokio::time::sleep(run - force_after).await;
    Ok(())
}

fn print_report(registry: &Registry<Level>, items: &Items) -> Result<()> {
    let stats = registry.stats()?;

    println!("Base interval: {} ms", registry.base_interval().as_millis());
    println!("Items:         {}", stats.active_items);
    println!("Checks:        {}", stats.total_checks);
    println!("Actions:       {}", stats.total_actions);
    println!();

    for id in [items.cpu, items.memory, items.temperature] {
        let info = registry.item_info(id)?;
        let forced = match registry.is_forced(id) {
            Some(remaining) => format!(" (forced, {} ms left)", remaining.as_millis()),
            None => String::new(),
        };
        println!(
            "  - {:<12} every {:>5} ms, hysteresis {}: {}{} [{} checks, {} actions]",
            info.name,
            info.interval.as_millis(),
            info.hysteresis,
            info.current_state,
            forced,
            info.stats.check_count,
            info.stats.action_count,
        );
    }

    Ok(())
}
