use std::io::Write;

use brandchat_client::{ExchangeObserver, MessageId};
use tracing::{info, warn};

/// Writes each new slice of the reply as it arrives.
pub struct TerminalRenderer<W> {
    out: W,
    printed: usize,
}

impl TerminalRenderer<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> TerminalRenderer<W> {
    pub fn new(out: W) -> Self {
        Self { out, printed: 0 }
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ExchangeObserver for TerminalRenderer<W> {
    fn on_text(&mut self, _id: &MessageId, text: &str) {
        // Text only grows, except for the fallback that replaces an empty reply.
        let Some(new) = text.get(self.printed..) else {
            return;
        };
        if let Err(e) = self.out.write_all(new.as_bytes()).and_then(|()| self.out.flush()) {
            warn!("failed to write reply: {e}");
            return;
        }
        self.printed = text.len();
    }

    fn on_id_assigned(&mut self, temporary: &MessageId, assigned: &MessageId) {
        info!(%temporary, %assigned, "assistant message persisted");
    }
}
