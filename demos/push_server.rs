//! Push server example with heartbeat, telemetry and activity emitters
//!
//! Run with: cargo run --example push_server [BIND_ADDR]
//!
//! Examples:
//!   cargo run --example push_server                  # binds to 0.0.0.0:8787
//!   cargo run --example push_server localhost        # binds to 127.0.0.1:8787
//!   cargo run --example push_server 127.0.0.1:9000   # binds to 127.0.0.1:9000
//!
//! ## Watching the streams
//!
//!   curl -N http://localhost:8787/push
//!   curl -N "http://localhost:8787/logs?client=me&levels=error,warn"
//!
//! ## Changing a log filter
//!
//!   curl -H 'content-type: application/json' \
//!        -d '{"type":"filter:update","tag":"1","spec":{"kind":"keyword","keywords":["tick"]}}' \
//!        "http://localhost:8787/control?client=me"
//!
//! ## Signing
//!
//! Set `PUSHCAST_SIGNING_KEYS=kid:base64secret` (and optionally
//! `PUSHCAST_SIGNING_KID`, `PUSHCAST_SIGNING_ALG`) to wrap every push frame
//! in an HMAC envelope.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use pushcast::clock::system_clock;
use pushcast::emitter::{ActivityEmitter, EmitterRegistry, HeartbeatEmitter, TelemetryEmitter};
use pushcast::hub::{HubConfig, LogEvent, LogStreamHub};
use pushcast::orchestrator::{OrchestratorConfig, PushOrchestrator};
use pushcast::server::{PushServer, PushServerConfig};
use pushcast::signing::{FrameSigner, SigningConfig};
use pushcast::Clock;

const DEFAULT_PORT: u16 = 8787;

/// Parse bind address from command line argument
fn parse_bind_addr(arg: &str) -> Result<SocketAddr, String> {
    let normalized = arg.replace("localhost", "127.0.0.1");

    if let Ok(addr) = normalized.parse::<SocketAddr>() {
        return Ok(addr);
    }

    if let Ok(ip) = normalized.parse::<std::net::IpAddr>() {
        return Ok(SocketAddr::new(ip, DEFAULT_PORT));
    }

    Err(format!(
        "Invalid bind address: '{}'. Expected format: IP:PORT or IP or 'localhost'",
        arg
    ))
}

fn print_usage() {
    eprintln!("Usage: push_server [BIND_ADDR]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  BIND_ADDR    Address to bind to (default: 0.0.0.0:{})", DEFAULT_PORT);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let bind_addr = match args.get(1) {
        Some(addr_str) => match parse_bind_addr(addr_str) {
            Ok(addr) => addr,
            Err(e) => {
                eprintln!("Error: {}", e);
                eprintln!();
                print_usage();
                std::process::exit(1);
            }
        },
        None => SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
    };

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("pushcast=debug".parse()?)
                .add_directive("push_server=debug".parse()?),
        )
        .init();

    let clock = system_clock();

    let activity = Arc::new(ActivityEmitter::new("activity", 2_000));
    let mut registry = EmitterRegistry::new();
    registry.register(Arc::new(HeartbeatEmitter::new("heartbeat", 5_000)))?;
    registry.register(Arc::new(TelemetryEmitter::new("telemetry", 1_000)))?;
    registry.register(activity.clone())?;
    registry.seal();

    let mut orchestrator = PushOrchestrator::new(
        OrchestratorConfig::default(),
        Arc::new(registry),
        Arc::clone(&clock),
    )?;
    if let Some(signing) = SigningConfig::from_env()? {
        if let Some(signer) = FrameSigner::from_config(&signing, Arc::clone(&clock)) {
            tracing::info!(kid = signer.kid(), alg = %signer.algorithm(), "Signing push frames");
            orchestrator = orchestrator.with_signer(signer);
        }
    }
    let orchestrator = Arc::new(orchestrator);
    orchestrator.start();

    let hub = Arc::new(LogStreamHub::new(HubConfig::default(), Arc::clone(&clock)));

    // Synthetic activity and log traffic so the streams have something to show
    let demo_hub = Arc::clone(&hub);
    let demo_clock = Arc::clone(&clock);
    let traffic = tokio::spawn(async move {
        let levels = ["debug", "info", "warn", "error"];
        let mut ticker = tokio::time::interval(Duration::from_millis(750));
        let mut n: u64 = 0;
        loop {
            ticker.tick().await;
            n += 1;
            activity.record(if n % 3 == 0 { "click" } else { "scroll" });
            let level = levels[(n % levels.len() as u64) as usize];
            demo_hub
                .broadcast_log(LogEvent::new(
                    demo_clock.now_ms(),
                    level,
                    "demo",
                    format!("tick {}", n),
                ))
                .await;
        }
    });

    let config = PushServerConfig::with_addr(bind_addr);
    println!("Starting push server on {}", config.bind_addr);
    println!();
    println!("Push frames: curl -N http://{}/push", config.bind_addr);
    println!("Log stream:  curl -N http://{}/logs?client=me", config.bind_addr);
    println!();

    let server = PushServer::new(config, Arc::clone(&orchestrator), hub);
    server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    traffic.abort();
    orchestrator.stop().await;
    println!("{:?}", orchestrator.metrics());

    Ok(())
}
