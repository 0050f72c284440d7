use std::fmt;
use std::pin::Pin;

use futures::StreamExt as _;
use reqwest::StatusCode;
use reqwest::header::ACCEPT;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::assembler::{AssembledMessage, ExchangeObserver, StreamAssembler};
use crate::config::ClientConfig;
use crate::errors::ClientError;
use crate::event::MessageId;
use crate::session::SessionContext;

/// Response body as delivered by the HTTP client.
pub type ByteStream =
    Pin<Box<dyn futures::Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send + 'static>>;

/// Body of a streaming query request.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct QueryRequest {
    /// User message text.
    pub message: String,
    /// Conversation to continue; `None` lets the backend start a new one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    /// Project whose documents scope the answer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
}

impl QueryRequest {
    /// Creates a request for a new conversation.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            conversation_id: None,
            project_id: None,
        }
    }

    /// Targets an existing conversation.
    pub fn conversation(mut self, id: impl Into<String>) -> Self {
        self.conversation_id = Some(id.into());
        self
    }

    /// Scopes the query to a project.
    pub fn project(mut self, id: impl Into<String>) -> Self {
        self.project_id = Some(id.into());
        self
    }

    fn validate(&self) -> Result<(), ClientError> {
        if self.message.trim().is_empty() {
            return Err(ClientError::Validation("message must not be empty".into()));
        }
        Ok(())
    }
}

/// Handle used to abort a running exchange.
#[derive(Clone)]
pub struct AbortHandle {
    tx: watch::Sender<bool>,
}

impl AbortHandle {
    /// Requests cancellation. The exchange finalizes as `Cancelled` at its next
    /// suspension point.
    pub fn abort(&self) {
        let _ = self.tx.send(true);
    }
}

/// Receiving side of an `AbortHandle`.
pub struct AbortSignal {
    rx: watch::Receiver<bool>,
}

impl AbortSignal {
    /// Resolves once abort was requested. Never resolves if every handle is
    /// dropped without aborting.
    pub async fn aborted(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                futures::future::pending::<()>().await;
            }
        }
    }
}

/// Creates a connected abort handle and signal.
pub fn abort_pair() -> (AbortHandle, AbortSignal) {
    let (tx, rx) = watch::channel(false);
    (AbortHandle { tx }, AbortSignal { rx })
}

/// Client for the assistant's streaming query endpoint.
pub struct ChatClient {
    client: reqwest::Client,
    config: ClientConfig,
    session: SessionContext,
}

impl ChatClient {
    /// Creates a client bound to a session.
    pub fn new(config: ClientConfig, session: SessionContext) -> Result<Self, ClientError> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ClientError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            config,
            session,
        })
    }

    /// Issues the query and returns the response body stream.
    ///
    /// A 401 response invalidates the session before the error is returned.
    pub async fn open_stream(&self, request: &QueryRequest) -> Result<ByteStream, ClientError> {
        request.validate()?;
        let token = self.session.bearer_token()?;
        let url = self.config.stream_url();
        debug!(url = %url, conversation = ?request.conversation_id, "opening response stream");

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .header(ACCEPT, "text/event-stream")
            .json(request)
            .send()
            .await
            .map_err(|e| ClientError::transport(format!("request failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            if status == StatusCode::UNAUTHORIZED {
                self.session.invalidate();
            }
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(Box::pin(response.bytes_stream()))
    }

    /// Prepares an exchange that reports progress to `observer`.
    pub fn exchange<O: ExchangeObserver>(&self, request: QueryRequest, observer: O) -> Exchange<'_, O> {
        let (abort, signal) = abort_pair();
        Exchange {
            client: self,
            request,
            temporary_id: MessageId::temporary(),
            observer,
            abort,
            signal,
        }
    }

    /// Sends a message and waits for the finalized reply.
    pub async fn send(&self, request: QueryRequest) -> AssembledMessage {
        self.exchange(request, ()).run().await
    }
}

/// One request/response exchange, ready to run.
pub struct Exchange<'a, O> {
    client: &'a ChatClient,
    request: QueryRequest,
    temporary_id: MessageId,
    observer: O,
    abort: AbortHandle,
    signal: AbortSignal,
}

impl<O: ExchangeObserver> Exchange<'_, O> {
    /// Replaces the generated placeholder id with a caller-supplied one.
    pub fn with_temporary_id(mut self, id: MessageId) -> Self {
        self.temporary_id = id;
        self
    }

    /// Placeholder id the message is addressed by until the backend assigns one.
    pub fn temporary_id(&self) -> &MessageId {
        &self.temporary_id
    }

    /// Returns a handle that can abort the exchange.
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    /// Runs the exchange to a finalized message. Failures are folded into the
    /// message state and text.
    pub async fn run(self) -> AssembledMessage {
        let Self {
            client,
            request,
            temporary_id,
            observer,
            abort: _abort,
            mut signal,
        } = self;
        info!(temporary_id = %temporary_id, conversation = ?request.conversation_id, "exchange started");
        let assembler = StreamAssembler::with_observer(temporary_id, observer);

        let opened = tokio::select! {
            biased;
            _ = signal.aborted() => {
                info!(id = %assembler.message().id, "exchange aborted before response");
                return assembler.cancel();
            }
            opened = client.open_stream(&request) => opened,
        };
        match opened {
            Ok(stream) => run_exchange(stream, assembler, signal).await,
            Err(err) => assembler.fail(&err),
        }
    }
}

/// Drains a body stream into `assembler` until the sentinel, end of stream, a
/// read error, or an abort.
pub async fn run_exchange<S, B, E, O>(
    mut stream: S,
    mut assembler: StreamAssembler<O>,
    mut signal: AbortSignal,
) -> AssembledMessage
where
    S: futures::Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: fmt::Display,
    O: ExchangeObserver,
{
    let mut chunks = 0_u64;
    while !assembler.is_terminated() {
        tokio::select! {
            biased;
            _ = signal.aborted() => {
                info!(id = %assembler.message().id, chunks, "exchange aborted");
                return assembler.cancel();
            }
            next = stream.next() => match next {
                Some(Ok(chunk)) => {
                    chunks = chunks.saturating_add(1);
                    assembler.push_chunk(chunk.as_ref());
                }
                Some(Err(e)) => {
                    warn!(id = %assembler.message().id, chunks, "stream read failed: {e}");
                    return assembler.fail(&ClientError::transport(format!("stream read failed: {e}")));
                }
                None => break,
            }
        }
    }
    let message = assembler.finish();
    info!(
        id = %message.id,
        chunks,
        len = message.text.len(),
        discarded = message.discarded_frames,
        "exchange completed"
    );
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::ExchangeState;
    use crate::errors::{EMPTY_RESPONSE_FALLBACK, FailureCategory};
    use futures::stream;

    fn chunks(parts: &[&'static str]) -> Vec<Result<bytes::Bytes, String>> {
        parts
            .iter()
            .map(|p| Ok(bytes::Bytes::from_static(p.as_bytes())))
            .collect()
    }

    #[tokio::test]
    async fn drains_stream_into_message() {
        let (_abort, signal) = abort_pair();
        let body = stream::iter(chunks(&[
            "data: {\"type\":\"assistant_message_id\",\"message_id\":42}\n",
            "data: {\"content\":\"Hola\"}\n",
            "data: {\"content\":\" mundo\"}\n",
            "data: [DONE]\n",
        ]));
        let message =
            run_exchange(body, StreamAssembler::new(MessageId::new("tmp")), signal).await;
        assert_eq!(message.id, MessageId::new("42"));
        assert_eq!(message.text, "Hola mundo");
        assert_eq!(message.state, ExchangeState::Done);
    }

    #[tokio::test]
    async fn empty_body_yields_fallback() {
        let (_abort, signal) = abort_pair();
        let body = stream::iter(chunks(&[]));
        let message =
            run_exchange(body, StreamAssembler::new(MessageId::new("tmp")), signal).await;
        assert_eq!(message.text, EMPTY_RESPONSE_FALLBACK);
        assert!(message.is_complete);
    }

    #[tokio::test]
    async fn stops_reading_after_sentinel() {
        let (_abort, signal) = abort_pair();
        let body = stream::iter(chunks(&["data: {\"content\":\"a\"}\ndata: [DONE]\n"]))
            .chain(stream::pending());
        let message =
            run_exchange(body, StreamAssembler::new(MessageId::new("tmp")), signal).await;
        assert_eq!(message.text, "a");
        assert_eq!(message.state, ExchangeState::Done);
    }

    #[tokio::test]
    async fn read_error_mid_stream_keeps_partial_text() {
        let (_abort, signal) = abort_pair();
        let mut parts = chunks(&["data: {\"content\":\"medio\"}\n"]);
        parts.push(Err("connection reset".to_string()));
        let message = run_exchange(
            stream::iter(parts),
            StreamAssembler::new(MessageId::new("tmp")),
            signal,
        )
        .await;
        assert_eq!(message.text, "medio");
        assert_eq!(
            message.state,
            ExchangeState::Failed(FailureCategory::Connectivity)
        );
    }

    #[tokio::test]
    async fn read_error_before_content_uses_connectivity_text() {
        let (_abort, signal) = abort_pair();
        let parts: Vec<Result<bytes::Bytes, String>> = vec![Err("dns failure".to_string())];
        let message = run_exchange(
            stream::iter(parts),
            StreamAssembler::new(MessageId::new("tmp")),
            signal,
        )
        .await;
        assert_eq!(message.text, FailureCategory::Connectivity.fallback_text());
    }

    #[tokio::test]
    async fn abort_finalizes_a_pending_stream() {
        let (abort, signal) = abort_pair();
        let body = stream::iter(chunks(&["data: {\"content\":\"hi\"}\n"])).chain(stream::pending());
        let task = tokio::spawn(run_exchange(
            body,
            StreamAssembler::new(MessageId::new("tmp")),
            signal,
        ));
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        abort.abort();
        let message = task.await.expect("join");
        assert_eq!(message.state, ExchangeState::Cancelled);
        assert_eq!(message.text, "hi");
    }

    #[tokio::test]
    async fn dropped_handle_does_not_abort() {
        let (abort, signal) = abort_pair();
        drop(abort);
        let body = stream::iter(chunks(&["data: {\"content\":\"ok\"}\n"]));
        let message =
            run_exchange(body, StreamAssembler::new(MessageId::new("tmp")), signal).await;
        assert_eq!(message.state, ExchangeState::Done);
        assert_eq!(message.text, "ok");
    }

    #[test]
    fn query_request_serialization_skips_missing_ids() {
        let body = serde_json::to_value(QueryRequest::new("hola")).expect("json");
        assert_eq!(body, serde_json::json!({"message": "hola"}));
        let body =
            serde_json::to_value(QueryRequest::new("hola").conversation("c1").project("p1"))
                .expect("json");
        assert_eq!(
            body,
            serde_json::json!({"message": "hola", "conversation_id": "c1", "project_id": "p1"})
        );
    }

    #[test]
    fn blank_message_is_rejected() {
        assert!(matches!(
            QueryRequest::new("   ").validate(),
            Err(ClientError::Validation(_))
        ));
    }
}
