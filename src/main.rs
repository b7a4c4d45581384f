//! KVST - Sharded, Durable, TCP Key-Value Store
//! CLI entry point: parse `[port] [aol_path]` positionals, open the
//! server (map recovery + AOL writer + listening socket), wire SIGINT/
//! SIGTERM to a graceful shutdown, and block until it completes.

use std::process::ExitCode;
use std::sync::Arc;

use kvst::config::ServerConfig;
use kvst::server::Server;

const USAGE: &str = "usage: kvst [port] [aol_path]\n\n\
    port       TCP port to listen on (default: 7878)\n\
    aol_path   path to the append-only durability log (default: store.aol)\n\n\
    Set RUST_LOG to control log verbosity (see the `log`/`env_logger` crates).";

fn main() -> ExitCode {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|a| a == "-h" || a == "--help") {
        println!("{USAGE}");
        return ExitCode::SUCCESS;
    }

    let config = match parse_args(&args) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };

    log::info!(
        "starting kvst on port {} with aol at {:?}",
        config.port,
        config.aol_path
    );

    let server = match Server::open(config) {
        Ok(server) => Arc::new(server),
        Err(err) => {
            log::error!("failed to start server: {err}");
            return ExitCode::FAILURE;
        }
    };

    let stop_server = Arc::clone(&server);
    let result = ctrlc::set_handler(move || {
        log::info!("shutdown signal received");
        if let Err(err) = stop_server.stop() {
            log::error!("error during shutdown: {err}");
        }
    });
    if let Err(err) = result {
        log::warn!("failed to install signal handler: {err}");
    }

    let run_result = server.run();

    // `run()` can return because of a graceful `stop()` (already fully
    // drained) or because a connection's fatal AOL error only raised the
    // flag and unblocked the acceptor (§7, §9). Calling `stop()` again
    // here is idempotent and guarantees the pool is drained and the AOL
    // is flushed on every exit path.
    if let Err(err) = server.stop() {
        log::error!("error during final shutdown: {err}");
        return ExitCode::FAILURE;
    }

    log::info!("{}", server.metrics().report());

    match run_result {
        Ok(()) => {
            log::info!("server stopped cleanly");
            ExitCode::SUCCESS
        }
        Err(err) => {
            log::error!("server error: {err}");
            ExitCode::FAILURE
        }
    }
}

/// Parse `[port] [aol_path]` positionals, defaulting to 7878 and
/// `store.aol` (§6.3). Any other argument count or an unparseable port is
/// a fatal startup error.
fn parse_args(args: &[String]) -> Result<ServerConfig, String> {
    let mut config = ServerConfig::default();

    match args.len() {
        0 => {}
        1 => {
            config.port = args[0]
                .parse()
                .map_err(|_| format!("invalid port: {}", args[0]))?;
        }
        2 => {
            config.port = args[0]
                .parse()
                .map_err(|_| format!("invalid port: {}", args[0]))?;
            config.aol_path = args[1].clone().into();
        }
        _ => return Err(USAGE.to_string()),
    }

    Ok(config)
}
