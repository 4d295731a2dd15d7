//! `drivesafe` – DriveSafe command line interface
//!
//! This binary is the in-car entry point for the safety-mode controller.  It:
//!
//! 1. Checks for `~/.drivesafe/config.toml`; runs a **First-Run Wizard** that
//!    asks for the two PINs when the file is absent.
//! 2. Fetches a map token when `map_token_url` is configured.
//! 3. Starts a [`DriveSession`] fed by a GPS replay or the speed simulator.
//! 4. Drops the driver into an **interactive REPL** with slash-commands.
//! 5. Intercepts **Ctrl-C** to stop the session and exit safely.

mod config;
mod gauge;
mod map_token;
mod repl;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use colored::Colorize;
use drivesafe_hal::{GpsSpeedSource, RandomWalk, SimSpeedSource, SpeedSource, TelUriDialer};
use drivesafe_kernel::{PinCodes, PinVerifier, RateLimitedVerifier, StaticPinVerifier};
use drivesafe_middleware::EventBus;
use drivesafe_runtime::telemetry::init_tracing;
use drivesafe_runtime::{DriveSession, SessionParts};
use drivesafe_types::{Event, EventPayload};
use tracing::{info, warn};
use zeroize::Zeroizing;

fn main() {
    let _tracing = init_tracing("drivesafe");

    print_banner();

    // ── Shared shutdown flag ──────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();

    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – stopping the drive session …".yellow().bold());
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; graceful shutdown on Ctrl-C will not be available");
    }

    // ── First-Run Wizard ──────────────────────────────────────────────────
    match config::load() {
        Ok(None) => run_first_run_wizard(),
        Ok(Some(_)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
        }
    }
    let cfg = config::load_or_default();

    // ── Map token ─────────────────────────────────────────────────────────
    // Blocking HTTP must finish before the Tokio runtime exists.
    let bus = EventBus::default();
    let feeds = repl::Feeds::subscribe(&bus);
    if let Some(url) = &cfg.map_token_url {
        print!("\n  Fetching map token from {} … ", url.dimmed());
        match map_token::fetch_token(url) {
            Ok(token) => {
                info!(token_len = token.len(), "map token acquired");
                println!("{}", "ok".green());
            }
            Err(e) => {
                println!("{}", "unavailable".yellow());
                bus.publish(Event::new(
                    "drivesafe-cli",
                    EventPayload::Notice(map_token::unavailable_notice(&e)),
                ));
            }
        }
    }

    // ── Drive session ─────────────────────────────────────────────────────
    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("{}: {}", "Failed to start async runtime".red(), e);
            return;
        }
    };

    let parts = SessionParts {
        verifier: build_verifier(&cfg),
        source: build_source(&cfg),
        dialer: Box::new(TelUriDialer),
        bus,
    };
    info!(source = parts.source.name(), "starting drive session");
    println!(
        "  Speed source: {}   Auto-activation above {} km/h   Cooldown: {}",
        parts.source.name().bold(),
        cfg.activation_speed_kmh,
        cfg.cooldown_mode
    );

    let handle = {
        let _ctx = runtime.enter();
        DriveSession::spawn(cfg.session_config(), parts)
    };

    println!();
    println!(
        "  Type {} for a list of commands.\n",
        "/help".bold().cyan()
    );

    // ── Interactive REPL ──────────────────────────────────────────────────
    repl::run(&runtime, &handle, feeds, shutdown);

    runtime.block_on(handle.shutdown());
    println!("{}", "  ✓ Drive session stopped.".green());
}

fn build_verifier(cfg: &config::Config) -> Box<dyn PinVerifier> {
    let verifier = StaticPinVerifier::new(cfg.pins.clone());
    if cfg.pin_attempts_per_minute > 0 {
        Box::new(RateLimitedVerifier::new(verifier, cfg.pin_attempts_per_minute))
    } else {
        Box::new(verifier)
    }
}

fn build_source(cfg: &config::Config) -> Box<dyn SpeedSource> {
    if let Some(path) = &cfg.gps_replay {
        match GpsSpeedSource::from_replay_file(path) {
            Ok(source) => return Box::new(source.with_pace(cfg.sample_interval())),
            Err(e) => {
                warn!(error = %e, "GPS replay unavailable; falling back to the simulator");
                println!("  {} {}", "GPS replay unavailable:".yellow(), e);
            }
        }
    }
    Box::new(SimSpeedSource::new(
        RandomWalk::new(cfg.max_sim_speed_kmh),
        cfg.sample_interval(),
    ))
}

// ─────────────────────────────────────────────────────────────────────────────
// First-Run Wizard
// ─────────────────────────────────────────────────────────────────────────────

fn run_first_run_wizard() {
    println!();
    println!("{}", "  ╔══════════════════════════════════════╗".bold().cyan());
    println!("{}", "  ║      DriveSafe First-Run Wizard      ║".bold().cyan());
    println!("{}", "  ╚══════════════════════════════════════╝".bold().cyan());
    println!();
    println!("  No configuration found.  Let's set up DriveSafe.\n");

    let mut cfg = config::Config::default();

    println!("  Choose two PINs of 4 to 8 digits.  Leave blank to keep the default.");
    let activate = prompt_pin("  Activation PIN", &cfg.pins.activate);
    let deactivate = prompt_pin("  Deactivation PIN", &cfg.pins.deactivate);
    cfg.pins = PinCodes::new(activate.as_str(), deactivate.as_str());

    println!("  When should deactivation be locked?");
    println!("    1) After any activation  (default)");
    println!("    2) Only after an accident");
    println!("    3) Never");
    let choice = prompt_line("  Enter choice [1]: ", "1");
    cfg.cooldown_mode = match choice.trim() {
        "2" => config::CooldownMode::AccidentOnly,
        "3" => config::CooldownMode::Off,
        _ => config::CooldownMode::AnyActivation,
    };

    if cfg.cooldown_mode != config::CooldownMode::Off {
        let minutes = prompt_line(
            &format!("  Cooldown minutes [{}]: ", cfg.cooldown_secs / 60),
            &(cfg.cooldown_secs / 60).to_string(),
        );
        if let Ok(m) = minutes.trim().parse::<u64>() {
            cfg.cooldown_secs = m.saturating_mul(60);
        }
    }

    let number = prompt_line(
        &format!("  Emergency number [{}]: ", cfg.emergency_number),
        &cfg.emergency_number,
    );
    cfg.emergency_number = number;

    match config::save(&cfg) {
        Ok(()) => println!(
            "\n  {} Config saved to {}\n",
            "✓".green().bold(),
            config::config_path().display().to_string().bold()
        ),
        Err(e) => println!("{}: {}", "Error saving config".red(), e),
    }
}

/// Ask until a valid PIN (or nothing) is entered.
fn prompt_pin(label: &str, default: &str) -> Zeroizing<String> {
    loop {
        let pin = Zeroizing::new(prompt_line(&format!("{label}: "), default));
        if config::is_valid_pin(&pin) {
            return pin;
        }
        println!("  {}", "A PIN is 4 to 8 digits.".red());
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"   ___      _           ____       __     "#.bold().cyan());
    println!("{}", r#"  / _ \____(_)  _____  / __/__ _  / _/__   "#.bold().cyan());
    println!("{}", r#" / // / __/ / |/ / -_)_\ \/ _ `/ / _/ -_)  "#.bold().cyan());
    println!("{}", r#"/____/_/ /_/|___/\__/___/\_,_/ /_/ \__/   "#.bold().cyan());
    println!();
    println!("  {} {}",
        "DriveSafe".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Safety Mode Controller");
    println!();
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn prompt_line(msg: &str, default: &str) -> String {
    use std::io::{BufRead, Write};
    print!("{}", msg);
    std::io::stdout().flush().ok();
    let mut line = String::new();
    match std::io::stdin().lock().read_line(&mut line) {
        Ok(_) => {
            let t = line.trim().to_string();
            if t.is_empty() { default.to_string() } else { t }
        }
        Err(_) => default.to_string(),
    }
}
