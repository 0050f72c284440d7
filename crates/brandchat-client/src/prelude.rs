//! Common imports for typical client usage.
pub use crate::{
    AbortHandle, AssembledMessage, ChatClient, ClientConfig, ClientError, ExchangeObserver,
    ExchangeState, FailureCategory, MessageId, QueryRequest, SessionContext,
};
