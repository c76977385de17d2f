//! Request dispatch against the shared loader core.
//!
//! Requests execute strictly one at a time: the handler holds the loader
//! behind a mutex and every mutating operation runs to completion before
//! the next request is serviced. A hanging mod hook therefore hangs the
//! corresponding control request, by design of the scheduling model.

use std::sync::Arc;
use thiserror::Error;

use tokio::sync::Mutex;

use super::protocol::{
    decode_request, encode_response, ControlRequest, ControlResponse, ErrorKind, ModInfo,
    ProtocolError,
};
use crate::mods::LoaderCore;

#[derive(Error, Debug)]
pub enum HandlerError {
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

/// Executes control requests against the single per-process `LoaderCore`.
pub struct ControlHandler {
    loader: Arc<LoaderCore>,
    // Serializes request dispatch; the loader's own lock covers individual
    // operations, this one keeps whole requests ordered.
    dispatch: Mutex<()>,
}

impl ControlHandler {
    pub fn new(loader: Arc<LoaderCore>) -> Self {
        Self {
            loader,
            dispatch: Mutex::new(()),
        }
    }

    pub fn loader(&self) -> &Arc<LoaderCore> {
        &self.loader
    }

    /// Process one raw frame: decode, execute, encode.
    ///
    /// Malformed frames produce an encoded `Protocol` error response
    /// rather than tearing down the connection.
    pub async fn process(&self, bytes: &[u8]) -> Result<Vec<u8>, HandlerError> {
        let response = match decode_request(bytes) {
            Ok(request) => self.handle(request).await,
            Err(e) => ControlResponse::error(ErrorKind::Protocol, e.to_string()),
        };
        Ok(encode_response(&response)?)
    }

    /// Execute one decoded request.
    pub async fn handle(&self, request: ControlRequest) -> ControlResponse {
        let _guard = self.dispatch.lock().await;
        tracing::debug!(?request, "control request");

        match request {
            ControlRequest::LoadMod { mod_id } => self.ack(self.loader.load_mod(&mod_id)),
            ControlRequest::UnloadMod { mod_id } => self.ack(self.loader.unload_mod(&mod_id)),
            ControlRequest::SuspendMod { mod_id } => self.ack(self.loader.suspend_mod(&mod_id)),
            ControlRequest::ResumeMod { mod_id } => self.ack(self.loader.resume_mod(&mod_id)),
            ControlRequest::IsModLoaded { mod_id } => ControlResponse::Loaded {
                loaded: self.loader.is_mod_loaded(&mod_id),
            },
            ControlRequest::GetLoadedMods => {
                let started_at = self.loader.started_at();
                let mods = self
                    .loader
                    .loaded_mods()
                    .iter()
                    .map(|s| ModInfo::from_snapshot(s, started_at))
                    .collect();
                ControlResponse::Mods { mods }
            }
        }
    }

    fn ack(&self, result: Result<(), crate::mods::LoaderError>) -> ControlResponse {
        match result {
            Ok(()) => ControlResponse::Ack,
            Err(e) => {
                tracing::warn!(error = %e, "control request failed");
                ControlResponse::from(&e)
            }
        }
    }
}
