//! Folds a chunked event stream into a single assistant message.

use tracing::{debug, warn};

use crate::decoder::LineDecoder;
use crate::errors::{ClientError, EMPTY_RESPONSE_FALLBACK, FailureCategory};
use crate::event::{MessageId, StreamEvent, decode_line};

/// Lifecycle of one exchange.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExchangeState {
    /// Stream is still being read.
    Receiving,
    /// Stream ended normally (sentinel or end of body).
    Done,
    /// Request or stream failed.
    Failed(FailureCategory),
    /// Caller aborted the exchange.
    Cancelled,
}

impl ExchangeState {
    /// Returns true once no further events will be applied.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Receiving)
    }
}

/// The assistant message being built by one exchange.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AssembledMessage {
    /// Temporary id until the backend assigns one, then the backend id.
    pub id: MessageId,
    /// Concatenated content fragments, or a fallback text once finalized.
    pub text: String,
    /// False while the stream is being read.
    pub is_complete: bool,
    pub state: ExchangeState,
    /// Number of frames dropped because their payload could not be decoded.
    pub discarded_frames: u64,
}

/// Hooks invoked while an exchange is assembled.
pub trait ExchangeObserver {
    /// Called each time the message text grows. `id` is the id to target.
    fn on_text(&mut self, _id: &MessageId, _text: &str) {}

    /// Called once, when the backend id replaces the temporary one.
    fn on_id_assigned(&mut self, _temporary: &MessageId, _assigned: &MessageId) {}
}

impl ExchangeObserver for () {}

impl<O: ExchangeObserver + ?Sized> ExchangeObserver for &mut O {
    fn on_text(&mut self, id: &MessageId, text: &str) {
        (**self).on_text(id, text);
    }

    fn on_id_assigned(&mut self, temporary: &MessageId, assigned: &MessageId) {
        (**self).on_id_assigned(temporary, assigned);
    }
}

impl<O: ExchangeObserver + ?Sized> ExchangeObserver for Box<O> {
    fn on_text(&mut self, id: &MessageId, text: &str) {
        (**self).on_text(id, text);
    }

    fn on_id_assigned(&mut self, temporary: &MessageId, assigned: &MessageId) {
        (**self).on_id_assigned(temporary, assigned);
    }
}

/// Turns raw body chunks into stream events and applies them to one message.
pub struct StreamAssembler<O = ()> {
    decoder: LineDecoder,
    message: AssembledMessage,
    id_assigned: bool,
    saw_done: bool,
    observer: O,
}

impl StreamAssembler<()> {
    /// Starts an exchange addressed by `temporary_id`, without hooks.
    pub fn new(temporary_id: MessageId) -> Self {
        Self::with_observer(temporary_id, ())
    }
}

impl<O: ExchangeObserver> StreamAssembler<O> {
    /// Starts an exchange addressed by `temporary_id` and reports progress to
    /// `observer`.
    pub fn with_observer(temporary_id: MessageId, observer: O) -> Self {
        Self {
            decoder: LineDecoder::default(),
            message: AssembledMessage {
                id: temporary_id,
                text: String::new(),
                is_complete: false,
                state: ExchangeState::Receiving,
                discarded_frames: 0,
            },
            id_assigned: false,
            saw_done: false,
            observer,
        }
    }

    /// Current view of the message.
    pub fn message(&self) -> &AssembledMessage {
        &self.message
    }

    /// True after the `[DONE]` sentinel or a terminal transition.
    pub fn is_terminated(&self) -> bool {
        self.saw_done || self.message.state.is_terminal()
    }

    /// Decodes a body chunk and applies every event it completes.
    ///
    /// Returns the events that were applied, in order. Nothing is applied once
    /// the exchange is terminated.
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        if self.is_terminated() {
            return Vec::new();
        }
        let lines = self.decoder.push_chunk(chunk);
        self.apply_lines(lines)
    }

    fn apply_lines(&mut self, lines: Vec<String>) -> Vec<StreamEvent> {
        let mut applied = Vec::new();
        for line in lines {
            for event in decode_line(&line) {
                if self.is_terminated() {
                    return applied;
                }
                self.apply(event.clone());
                applied.push(event);
            }
        }
        applied
    }

    /// Applies a single decoded event.
    pub fn apply(&mut self, event: StreamEvent) {
        if self.is_terminated() {
            return;
        }
        match event {
            StreamEvent::ContentDelta(text) => {
                self.message.text.push_str(&text);
                debug!(id = %self.message.id, len = self.message.text.len(), "content delta");
                self.observer.on_text(&self.message.id, &self.message.text);
            }
            StreamEvent::AssistantIdAssigned(id) => {
                if self.id_assigned {
                    debug!(current = %self.message.id, ignored = %id, "duplicate assistant id ignored");
                    return;
                }
                self.id_assigned = true;
                let temporary = std::mem::replace(&mut self.message.id, id);
                debug!(temporary = %temporary, assigned = %self.message.id, "assistant id assigned");
                self.observer.on_id_assigned(&temporary, &self.message.id);
            }
            StreamEvent::Done => {
                self.saw_done = true;
            }
            StreamEvent::Malformed => {
                self.message.discarded_frames += 1;
                debug!(
                    id = %self.message.id,
                    discarded = self.message.discarded_frames,
                    "discarding undecodable frame"
                );
            }
        }
    }

    /// Finalizes the message after the body ended normally.
    pub fn finish(mut self) -> AssembledMessage {
        if !self.saw_done && !self.message.state.is_terminal() {
            let tail = self.decoder.finish().into_iter().collect();
            self.apply_lines(tail);
        }
        self.finalize(ExchangeState::Done, EMPTY_RESPONSE_FALLBACK)
    }

    /// Finalizes the message after the request or stream failed.
    ///
    /// Text already received is kept; otherwise the category fallback is used.
    pub fn fail(self, err: &ClientError) -> AssembledMessage {
        let category = FailureCategory::of(err);
        warn!(id = %self.message.id, ?category, error = %err, "exchange failed");
        self.finalize(ExchangeState::Failed(category), category.fallback_text())
    }

    /// Finalizes the message after the caller aborted the exchange.
    pub fn cancel(self) -> AssembledMessage {
        self.finalize(ExchangeState::Cancelled, EMPTY_RESPONSE_FALLBACK)
    }

    fn finalize(mut self, state: ExchangeState, fallback: &str) -> AssembledMessage {
        if self.message.text.is_empty() {
            self.message.text = fallback.to_string();
            self.observer.on_text(&self.message.id, &self.message.text);
        }
        self.message.state = state;
        self.message.is_complete = true;
        self.message
    }
}
