//! Wire format for the control protocol.
//!
//! Requests and responses are tagged JSON messages; the operation set is a
//! closed enum so the server handles every variant exhaustively. Message
//! size is checked before parsing.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::mods::loader::LoaderError;
use crate::mods::{InstanceError, ModSnapshot, ModState};

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("invalid message format: {0}")]
    InvalidFormat(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },
}

/// One command issued by the controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ControlRequest {
    LoadMod { mod_id: String },
    UnloadMod { mod_id: String },
    SuspendMod { mod_id: String },
    ResumeMod { mod_id: String },
    GetLoadedMods,
    IsModLoaded { mod_id: String },
}

impl ControlRequest {
    /// The mod id argument, where the operation carries one.
    pub fn mod_id(&self) -> Option<&str> {
        match self {
            ControlRequest::LoadMod { mod_id }
            | ControlRequest::UnloadMod { mod_id }
            | ControlRequest::SuspendMod { mod_id }
            | ControlRequest::ResumeMod { mod_id }
            | ControlRequest::IsModLoaded { mod_id } => Some(mod_id),
            ControlRequest::GetLoadedMods => None,
        }
    }
}

/// Failure categories reported over the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidModId,
    AlreadyLoaded,
    MissingDependency,
    CyclicDependency,
    UnsupportedOperation,
    ModHookFailed,
    /// The mod's own module file is missing or failed to load.
    ModuleLoadFailed,
    InjectionTimeout,
    /// A bootstrap component (stub or runtime module) is missing.
    ComponentNotFound,
    Protocol,
}

impl From<&LoaderError> for ErrorKind {
    fn from(err: &LoaderError) -> Self {
        use crate::inject::InjectError;
        use crate::mods::ResolveError;

        match err {
            LoaderError::InvalidModId(_) => ErrorKind::InvalidModId,
            LoaderError::AlreadyLoaded(_) => ErrorKind::AlreadyLoaded,
            LoaderError::Resolve(ResolveError::MissingDependency { .. }) => {
                ErrorKind::MissingDependency
            }
            LoaderError::Resolve(ResolveError::CyclicDependency { .. }) => {
                ErrorKind::CyclicDependency
            }
            LoaderError::Instance(InstanceError::Unsupported { .. }) => {
                ErrorKind::UnsupportedOperation
            }
            LoaderError::Instance(_) | LoaderError::LoadHookFailed { .. } => {
                ErrorKind::ModHookFailed
            }
            LoaderError::ModuleLoad { .. } => ErrorKind::ModuleLoadFailed,
            LoaderError::Inject(InjectError::InjectionTimeout(_)) => ErrorKind::InjectionTimeout,
            LoaderError::Inject(_) => ErrorKind::ComponentNotFound,
        }
    }
}

/// Serializable view of one loaded mod.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModInfo {
    pub mod_id: String,
    pub state: ModState,
    /// Milliseconds since the runtime started, from the monotonic load
    /// timestamp.
    pub loaded_at_ms: u64,
}

impl ModInfo {
    /// Convert a registry snapshot, anchoring timestamps at the runtime's
    /// start instant.
    pub fn from_snapshot(snapshot: &ModSnapshot, started_at: std::time::Instant) -> Self {
        Self {
            mod_id: snapshot.manifest.id.clone(),
            state: snapshot.state,
            loaded_at_ms: snapshot
                .load_timestamp
                .saturating_duration_since(started_at)
                .as_millis() as u64,
        }
    }
}

/// Outcome of one control request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlResponse {
    /// Operation completed with no payload.
    Ack,
    /// Answer to `IsModLoaded`.
    Loaded { loaded: bool },
    /// Answer to `GetLoadedMods`, in load order.
    Mods { mods: Vec<ModInfo> },
    /// Structured failure: closed kind plus human-readable detail.
    Error { kind: ErrorKind, detail: String },
}

impl ControlResponse {
    pub fn error(kind: ErrorKind, detail: impl Into<String>) -> Self {
        ControlResponse::Error {
            kind,
            detail: detail.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        !matches!(self, ControlResponse::Error { .. })
    }
}

impl From<&LoaderError> for ControlResponse {
    fn from(err: &LoaderError) -> Self {
        ControlResponse::Error {
            kind: ErrorKind::from(err),
            detail: err.to_string(),
        }
    }
}

/// Control frames stay small; anything bigger is a malformed or hostile
/// peer.
pub const MAX_MESSAGE_SIZE: usize = 1024 * 1024; // 1 MiB

/// Encode a request to JSON bytes with size limit enforcement.
pub fn encode_request(request: &ControlRequest) -> Result<Vec<u8>, ProtocolError> {
    check_size(serde_json::to_vec(request)?)
}

/// Encode a response to JSON bytes with size limit enforcement.
pub fn encode_response(response: &ControlResponse) -> Result<Vec<u8>, ProtocolError> {
    check_size(serde_json::to_vec(response)?)
}

/// Decode a request, checking size before parsing.
pub fn decode_request(bytes: &[u8]) -> Result<ControlRequest, ProtocolError> {
    check_incoming(bytes)?;
    Ok(serde_json::from_slice(bytes)?)
}

/// Decode a response, checking size before parsing.
pub fn decode_response(bytes: &[u8]) -> Result<ControlResponse, ProtocolError> {
    check_incoming(bytes)?;
    Ok(serde_json::from_slice(bytes)?)
}

fn check_size(bytes: Vec<u8>) -> Result<Vec<u8>, ProtocolError> {
    if bytes.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: bytes.len(),
            max: MAX_MESSAGE_SIZE,
        });
    }
    Ok(bytes)
}

fn check_incoming(bytes: &[u8]) -> Result<(), ProtocolError> {
    // Size check happens before parsing so an oversized frame cannot force
    // a large allocation.
    if bytes.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: bytes.len(),
            max: MAX_MESSAGE_SIZE,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_roundtrip() {
        let request = ControlRequest::LoadMod {
            mod_id: "hud".into(),
        };
        let encoded = encode_request(&request).unwrap();
        let decoded = decode_request(&encoded).unwrap();
        assert_eq!(decoded, request);
    }

    #[test]
    fn test_request_without_argument_roundtrip() {
        let encoded = encode_request(&ControlRequest::GetLoadedMods).unwrap();
        let decoded = decode_request(&encoded).unwrap();
        assert_eq!(decoded, ControlRequest::GetLoadedMods);
        assert!(decoded.mod_id().is_none());
    }

    #[test]
    fn test_response_roundtrip_with_mods() {
        let response = ControlResponse::Mods {
            mods: vec![ModInfo {
                mod_id: "base".into(),
                state: ModState::Running,
                loaded_at_ms: 12,
            }],
        };
        let encoded = encode_response(&response).unwrap();
        let decoded = decode_response(&encoded).unwrap();
        assert_eq!(decoded, response);
    }

    #[test]
    fn test_error_response_carries_kind_and_detail() {
        let response =
            ControlResponse::error(ErrorKind::AlreadyLoaded, "mod 'x' is already loaded");
        let encoded = encode_response(&response).unwrap();
        match decode_response(&encoded).unwrap() {
            ControlResponse::Error { kind, detail } => {
                assert_eq!(kind, ErrorKind::AlreadyLoaded);
                assert!(detail.contains('x'));
            }
            other => panic!("expected error response, got {other:?}"),
        }
        assert!(!response.is_success());
    }

    #[test]
    fn test_oversized_frame_rejected_before_parse() {
        let huge = vec![b'x'; MAX_MESSAGE_SIZE + 1];
        assert!(matches!(
            decode_request(&huge),
            Err(ProtocolError::MessageTooLarge { .. })
        ));
    }

    #[test]
    fn test_malformed_json_is_serialization_error() {
        assert!(decode_request(b"not json").is_err());
    }

    #[test]
    fn test_module_load_failure_has_its_own_kind() {
        use crate::mods::ModuleError;

        let err = LoaderError::ModuleLoad {
            id: "hud".into(),
            source: ModuleError::LoadFailed {
                path: "/mods/hud/hud.dll".into(),
                detail: "module file does not exist".into(),
            },
        };
        let response = ControlResponse::from(&err);
        match response {
            ControlResponse::Error { kind, detail } => {
                assert_eq!(kind, ErrorKind::ModuleLoadFailed);
                assert!(detail.contains("/mods/hud/hud.dll"));
            }
            other => panic!("expected error response, got {other:?}"),
        }
    }

    #[test]
    fn test_bootstrap_failure_keeps_component_not_found() {
        use crate::inject::InjectError;

        let err = LoaderError::Inject(InjectError::ComponentNotFound(
            "/opt/modhost/modhost_boot64.dll".into(),
        ));
        assert_eq!(ErrorKind::from(&err), ErrorKind::ComponentNotFound);
    }

    #[test]
    fn test_wire_tags_are_stable() {
        let encoded = encode_request(&ControlRequest::SuspendMod {
            mod_id: "physics".into(),
        })
        .unwrap();
        let text = String::from_utf8(encoded).unwrap();
        assert!(text.contains(r#""op":"suspend_mod""#));
        assert!(text.contains(r#""mod_id":"physics""#));
    }
}
