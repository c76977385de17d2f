//! Subcommand runners for `modhost-cli`.
//!
//! Each runner connects to the resident runtime, issues one control
//! request, prints the outcome, and returns a process exit code.

use crate::ipc::protocol::{ControlRequest, ControlResponse};

use super::client::{CliError, ControlClient};

/// Show the loaded mods and their states.
pub async fn run_status(socket_path: &str) -> i32 {
    match query(socket_path, ControlRequest::GetLoadedMods).await {
        Ok(ControlResponse::Mods { mods }) => {
            if mods.is_empty() {
                println!("no mods loaded");
            }
            for info in mods {
                println!("{}\t{:?}\t+{}ms", info.mod_id, info.state, info.loaded_at_ms);
            }
            0
        }
        Ok(other) => {
            eprintln!("unexpected response: {other:?}");
            1
        }
        Err(e) => {
            eprintln!("status failed: {e}");
            1
        }
    }
}

/// Run one mod lifecycle command (load/unload/suspend/resume/loaded).
pub async fn run_mod_command(socket_path: &str, request: ControlRequest) -> i32 {
    match query(socket_path, request).await {
        Ok(ControlResponse::Ack) => {
            println!("ok");
            0
        }
        Ok(ControlResponse::Loaded { loaded }) => {
            println!("{loaded}");
            0
        }
        Ok(ControlResponse::Mods { .. }) => 0,
        Ok(ControlResponse::Error { kind, detail }) => {
            eprintln!("error ({kind:?}): {detail}");
            1
        }
        Err(e) => {
            eprintln!("request failed: {e}");
            1
        }
    }
}

async fn query(socket_path: &str, request: ControlRequest) -> Result<ControlResponse, CliError> {
    let mut client = ControlClient::connect(socket_path).await?;
    client.request(&request).await
}
