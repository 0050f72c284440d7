//! Streaming chat client for the brand strategy assistant backend.
//!
//! An exchange sends one user message and reads the assistant reply as a
//! stream of `data: <json>` lines. Lines are decoded incrementally, folded into
//! an [`AssembledMessage`], and reported to an [`ExchangeObserver`] so a front
//! end can render the reply as it grows.
//!
//! ```no_run
//! use brandchat_client::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), ClientError> {
//! let session = SessionContext::signed_in("token", None);
//! let client = ChatClient::new(ClientConfig::from_env()?, session)?;
//!
//! let reply = client
//!     .send(QueryRequest::new("¿Cuál es nuestra propuesta de valor?").conversation("12"))
//!     .await;
//! println!("{}: {}", reply.id, reply.text);
//! # Ok(())
//! # }
//! ```

/// Folding decoded events into one assistant message.
pub mod assembler;
/// HTTP client, exchange driver and cancellation.
pub mod client;
/// Client configuration.
pub mod config;
/// Incremental line decoding of response bodies.
pub mod decoder;
/// Error types and user-facing failure classification.
pub mod errors;
/// Stream events and the wire translation step.
pub mod event;
/// Logging initialisation.
pub mod observability;
/// Common imports for typical usage.
pub mod prelude;
/// Injectable authentication state.
pub mod session;

pub use assembler::{AssembledMessage, ExchangeObserver, ExchangeState, StreamAssembler};
pub use client::{
    AbortHandle, AbortSignal, ByteStream, ChatClient, Exchange, QueryRequest, abort_pair,
    run_exchange,
};
pub use config::ClientConfig;
pub use decoder::LineDecoder;
pub use errors::{ClientError, EMPTY_RESPONSE_FALLBACK, FailureCategory};
pub use event::{MessageId, StreamEvent, decode_line};
pub use session::{Credentials, SessionContext};
