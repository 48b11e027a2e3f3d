//! Operator console (A5): wires every component behind a `Gateway`, starts
//! the auto-sync scheduler, and serves a line-oriented admin command loop
//! over stdin. This is a development/operator console, not the HTTP/auth
//! layer a real host process would put in front of it (`spec.md` §1).

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use mto_status_gateway::config::GatewayConfig;
use mto_status_gateway::cx::{CallerId, Cx};
use mto_status_gateway::telemetry;
use mto_status_gateway::types::Mto;
use mto_status_gateway::upstream::mock::MockUpstream;
use mto_status_gateway::Gateway;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser, Debug)]
#[command(
    name = "mto-gateway",
    version,
    about = "MTO status gateway operator console"
)]
struct Cli {
    /// Path to a TOML configuration file. Missing file falls back to defaults.
    #[arg(long, default_value = "mto_gateway.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    telemetry::init();
    let cli = Cli::parse();

    let config = match load_config(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("failed to load config: {e}");
            return ExitCode::FAILURE;
        }
    };

    // The real upstream SDK binding is out of scope (`spec.md` §1); the
    // console runs against the in-process mock backend until one is wired in.
    let backend = Arc::new(MockUpstream::new());
    let gateway = match Gateway::new(config, backend) {
        Ok(g) => g,
        Err(e) => {
            eprintln!("failed to build gateway: {e}");
            return ExitCode::FAILURE;
        }
    };
    let _scheduler = gateway.spawn_scheduler();

    println!("mto-gateway ready. commands: status, related, sync, sync-status, history, cache-stats, cache-clear, cache-warm, cache-invalidate, quit");
    run_console(&gateway).await;
    ExitCode::SUCCESS
}

fn load_config(path: &str) -> mto_status_gateway::Result<GatewayConfig> {
    match std::fs::read_to_string(path) {
        Ok(raw) => GatewayConfig::from_toml_str(&raw),
        Err(_) => Ok(GatewayConfig::default()),
    }
}

async fn run_console(gateway: &Gateway) {
    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) | Err(_) => break,
        };
        let words: Vec<&str> = line.split_whitespace().collect();
        let Some((cmd, args)) = words.split_first() else {
            continue;
        };
        match *cmd {
            "quit" | "exit" => break,
            "status" => handle_status(gateway, args).await,
            "related" => handle_related(gateway, args).await,
            "sync" => handle_sync(gateway, args),
            "sync-status" => handle_sync_status(gateway),
            "history" => handle_history(gateway, args),
            "cache-stats" => println!("{:?}", gateway.cache_stats()),
            "cache-clear" => println!("cleared {} entries", gateway.cache_clear()),
            "cache-warm" => handle_cache_warm(gateway, args).await,
            "cache-invalidate" => handle_cache_invalidate(gateway, args),
            "" => {}
            other => println!("unknown command: {other}"),
        }
    }
}

async fn handle_status(gateway: &Gateway, args: &[&str]) {
    let Some(raw) = args.first() else {
        println!("usage: status <mto>");
        return;
    };
    let mto = match Mto::parse(*raw) {
        Ok(m) => m,
        Err(e) => {
            println!("invalid mto: {e}");
            return;
        }
    };
    let cx = Cx::background(CallerId::internal("cli"));
    match gateway.get_status(&cx, &mto, true).await {
        Ok(status) => println!("{status:#?}"),
        Err(e) => println!("error: {e}"),
    }
}

async fn handle_related(gateway: &Gateway, args: &[&str]) {
    let Some(raw) = args.first() else {
        println!("usage: related <mto>");
        return;
    };
    let mto = match Mto::parse(*raw) {
        Ok(m) => m,
        Err(e) => {
            println!("invalid mto: {e}");
            return;
        }
    };
    let cx = Cx::background(CallerId::internal("cli"));
    match gateway.get_related_orders(&cx, &mto).await {
        Ok(related) => println!("{related:#?}"),
        Err(e) => println!("error: {e}"),
    }
}

fn handle_sync(gateway: &Gateway, args: &[&str]) {
    let days_back = args.first().and_then(|s| s.parse::<u32>().ok());
    match gateway.trigger_sync(days_back) {
        Ok(()) => println!("sync triggered"),
        Err(e) => println!("error: {e}"),
    }
}

fn handle_sync_status(gateway: &Gateway) {
    println!("{:#?}", gateway.sync_status());
}

fn handle_history(gateway: &Gateway, args: &[&str]) {
    let limit = args.first().and_then(|s| s.parse::<u32>().ok()).unwrap_or(10);
    match gateway.sync_history(limit) {
        Ok(entries) => {
            for entry in entries {
                println!("{entry:?}");
            }
        }
        Err(e) => println!("error: {e}"),
    }
}

async fn handle_cache_warm(gateway: &Gateway, args: &[&str]) {
    let count = args.first().and_then(|s| s.parse::<usize>().ok()).unwrap_or(10);
    let use_hot = args.get(1).is_some_and(|s| *s == "hot");
    let cx = Cx::background(CallerId::internal("cli"));
    match gateway.cache_warm(&cx, count, use_hot).await {
        Ok(report) => println!("{report:?}"),
        Err(e) => println!("error: {e}"),
    }
}

fn handle_cache_invalidate(gateway: &Gateway, args: &[&str]) {
    let Some(mto) = args.first() else {
        println!("usage: cache-invalidate <mto>");
        return;
    };
    println!("invalidated: {}", gateway.cache_invalidate(mto));
}
