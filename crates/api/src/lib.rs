#![deny(unsafe_code)]

/// Wire contracts for the QA backend endpoints.
pub mod api;
/// HTTP client seam for the QA backend.
pub mod client;

pub use api::{
    CHUNK_COLLECTION, ChatAnswer, ChatRequest, ChatTurn, SourceData, SourcePayload, SourceRef,
    SourceSchemaError, TurnRole,
};
pub use client::{BackendConfig, BackendError, BackendResult, BoxFuture, HttpBackend, QaBackend};
