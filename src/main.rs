//! modhost-cli entry point.
//!
//! `serve` hosts a loader core with the control server; the remaining
//! subcommands connect to a running instance and issue one control
//! request each.

use std::process::ExitCode;

use modhost_core::cli::{get_socket_path, run_mod_command, run_status};
use modhost_core::config;
use modhost_core::ipc::{server, ControlRequest};
use modhost_core::{Runtime, RuntimeConfig};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).unwrap_or("serve");
    let socket_path = get_socket_path();

    let code = match command {
        "serve" | "" => run_serve().await,
        "status" => run_status(&socket_path).await,
        "load" | "unload" | "suspend" | "resume" | "loaded" => {
            let Some(mod_id) = args.get(2).cloned() else {
                eprintln!("usage: modhost-cli {command} <mod-id>");
                return ExitCode::FAILURE;
            };
            let request = match command {
                "load" => ControlRequest::LoadMod { mod_id },
                "unload" => ControlRequest::UnloadMod { mod_id },
                "suspend" => ControlRequest::SuspendMod { mod_id },
                "resume" => ControlRequest::ResumeMod { mod_id },
                _ => ControlRequest::IsModLoaded { mod_id },
            };
            run_mod_command(&socket_path, request).await
        }
        other => {
            eprintln!("unknown command: {other}");
            eprintln!("usage: modhost-cli [serve|status|load|unload|suspend|resume|loaded]");
            1
        }
    };

    if code == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

async fn run_serve() -> i32 {
    let env = config::load();
    tracing::info!(config = ?env.effective_config(), "starting modhost runtime");
    let config = RuntimeConfig::from(env);
    let socket_path = config.socket_path.clone();
    let server_config = config.ipc_server.clone();
    let connections = config.connections.clone();
    let runtime = Runtime::new(config);

    if let Err(e) = runtime.loader.load_for_current_process() {
        tracing::error!(error = %e, "bootstrap failed");
        return 1;
    }

    let handler = runtime.handler;
    tokio::select! {
        result = server::run(&socket_path, handler, server_config, connections) => {
            match result {
                Ok(()) => 0,
                Err(e) => {
                    tracing::error!(error = %e, "control server failed");
                    1
                }
            }
        }
        _ = tokio::signal::ctrl_c() => {
            let resident = runtime.loader.loaded_count();
            tracing::info!(resident, "shutting down");
            0
        }
    }
}
