//! `transport` – Transport Challenge command line runner.
//!
//! Runs the naive transport controller end to end:
//!
//! 1. Loads `~/.transport/config.toml` (defaults when absent) and the object
//!    catalog.
//! 2. Connects to the simulator at `simulator_url`, or runs the in-process
//!    world when no URL is configured.
//! 3. Populates the scene from `layout_path`, or spawns the fixed demo scene.
//! 4. Fetches a container, fills it, pours it out at the goal, and prints a
//!    report.
//!
//! `transport init-config` writes the default config file and exits.
//! **Ctrl-C** stops the controller after the current action.

mod config;
mod demo;

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use colored::Colorize;
use tracing::{info, warn};

use transport_challenge::{Catalog, FloorRegion, SceneLayout, Transport};
use transport_hal::{SimulatorClient, WsSimulatorClient};
use transport_types::{TransportError, Vector3};

use demo::{DemoController, DemoReport, DemoScene};

fn main() -> ExitCode {
    // ── Structured logging ────────────────────────────────────────────────
    // RUST_LOG selects the level (default "info"); TRANSPORT_LOG_FORMAT=json
    // switches to newline-delimited JSON.
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    if std::env::var("TRANSPORT_LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .compact()
            .init();
    }

    print_banner();

    if std::env::args().nth(1).as_deref() == Some("init-config") {
        return init_config();
    }

    // ── Shared shutdown flag ──────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!(
            "{}",
            "⚠  Ctrl-C received – stopping after the current action …"
                .yellow()
                .bold()
        );
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; the run cannot be interrupted");
    }

    // ── Configuration ─────────────────────────────────────────────────────
    let cfg = match config::load() {
        Ok(Some(cfg)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Ok(None) => {
            println!(
                "  No config found; using defaults.  Run `{}` to create one.",
                "transport init-config".bold()
            );
            let mut cfg = config::Config::default();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            let mut cfg = config::Config::default();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
    };

    let catalog = match cfg.catalog_path.as_deref() {
        Some(path) => Catalog::load(Path::new(path)),
        None => Catalog::builtin(),
    };
    let catalog = match catalog {
        Ok(c) => c,
        Err(e) => {
            println!("{}: {}", "Catalog error".red(), e);
            return ExitCode::FAILURE;
        }
    };

    // ── Simulator ─────────────────────────────────────────────────────────
    let result = if cfg.simulator_url.is_empty() {
        println!("  Simulator: {}", "in-process".green());
        let world = demo::headless_world(&catalog);
        run(world, &cfg, catalog, shutdown)
    } else {
        print!("  Simulator: {} … ", cfg.simulator_url.dimmed());
        match WsSimulatorClient::connect(&cfg.simulator_url) {
            Ok(client) => {
                println!("{}", "connected".green());
                run(client, &cfg, catalog, shutdown)
            }
            Err(e) => {
                println!("{}", "unreachable".red());
                Err(e)
            }
        }
    };

    match result {
        Ok(report) => {
            print_report(&report);
            if report.delivered.is_empty() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            println!("{}: {}", "Run failed".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn init_config() -> ExitCode {
    match config::save(&config::Config::default()) {
        Ok(()) => {
            println!(
                "\n  {} Config saved to {}\n",
                "✓".green().bold(),
                config::config_path().display().to_string().bold()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            println!("{}: {}", "Error saving config".red(), e);
            ExitCode::FAILURE
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Run
// ─────────────────────────────────────────────────────────────────────────────

fn run<C: SimulatorClient>(
    sim: C,
    cfg: &config::Config,
    catalog: Catalog,
    shutdown: Arc<AtomicBool>,
) -> Result<DemoReport, TransportError> {
    let mut transport = Transport::new(sim, cfg.transport.clone(), catalog)?;
    info!(seed = transport.seed(), "transport ready");

    let goal = match cfg.layout_path.as_deref() {
        Some(path) => {
            let layout = SceneLayout::load(Path::new(path))?;
            let goal = layout.room_region(cfg.goal_room).ok_or_else(|| {
                TransportError::Config(format!(
                    "layout `{}` has no room {}",
                    layout.name, cfg.goal_room
                ))
            })?;
            transport.init_scene(&layout, Vector3::ZERO)?;
            goal
        }
        None => {
            let scene = DemoScene::default();
            scene.spawn(&mut transport)?;
            scene.goal
        }
    };
    print_goal(&goal);

    DemoController::new(&mut transport, shutdown, cfg.max_container_attempts)
        .run(&goal, cfg.objects_to_collect)
}

// ─────────────────────────────────────────────────────────────────────────────
// Output
// ─────────────────────────────────────────────────────────────────────────────

fn print_goal(goal: &FloorRegion) {
    let c = goal.center();
    println!(
        "  Goal region centred at ({:.2}, {:.2})\n",
        c.x, c.z
    );
}

fn print_report(report: &DemoReport) {
    println!();
    for (action, status) in &report.steps {
        let mark = if status.is_success() {
            "✓".green()
        } else {
            "✗".red()
        };
        println!("  {} {:<28} {}", mark, action, status.to_string().dimmed());
    }
    println!();
    match report.container {
        Some(id) => println!("  Container:  {}", id.to_string().bold()),
        None => println!("  Container:  {}", "none".yellow()),
    }
    println!("  Loaded:     {}", report.loaded.len());
    let delivered = format!("{}", report.delivered.len());
    if report.delivered.is_empty() {
        println!("  Delivered:  {}", delivered.red().bold());
    } else {
        println!("  Delivered:  {}", delivered.green().bold());
    }
    if report.interrupted {
        println!("  {}", "Run interrupted by Ctrl-C.".yellow());
    }
    println!();
}

fn print_banner() {
    println!();
    println!("{}", "  ┌─────────────────────────────────────┐".bold().cyan());
    println!("{}", "  │   Transport Challenge  ·  runner    │".bold().cyan());
    println!("{}", "  └─────────────────────────────────────┘".bold().cyan());
    println!();
}
