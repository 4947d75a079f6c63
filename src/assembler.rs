//! Applies decoded deltas to the in-progress assistant message.

use crate::error::{Error, Result};
use crate::message::{ChatMessage, MessageId};
use crate::types::ChatDelta;

/// Appends delta fragments to one placeholder, in the order they are applied.
///
/// No reordering or deduplication happens here.  Callers must apply deltas in arrival
/// order; the controller does so by draining a single [`FrameParser`](crate::FrameParser).
#[derive(Debug, Clone)]
pub struct DeltaAssembler {
    target: MessageId,
    frames_applied: u64,
    content_chars: usize,
}

impl DeltaAssembler {
    /// Creates an assembler bound to the placeholder with id `target`.
    pub fn new(target: MessageId) -> Self {
        Self {
            target,
            frames_applied: 0,
            content_chars: 0,
        }
    }

    /// The placeholder this assembler writes to.
    pub fn target(&self) -> MessageId {
        self.target
    }

    /// Number of deltas applied so far, including empty ones.
    pub fn frames_applied(&self) -> u64 {
        self.frames_applied
    }

    /// Characters appended so far.
    pub fn content_chars(&self) -> usize {
        self.content_chars
    }

    /// Appends the fragment of `delta` to the placeholder in `messages`.
    ///
    /// Returns the fragment that was appended.
    pub fn apply<'d>(
        &mut self,
        messages: &mut [ChatMessage],
        delta: &'d ChatDelta,
    ) -> Result<&'d str> {
        let target = self.target;
        let message = messages
            .iter_mut()
            .find(|message| message.id() == target)
            .ok_or_else(|| {
                Error::not_found(
                    "streaming placeholder is gone",
                    Some("message".to_string()),
                    Some(target.to_string()),
                )
            })?;
        let fragment = delta.fragment();
        if !fragment.is_empty() {
            message.append(fragment)?;
            self.content_chars += fragment.chars().count();
        }
        self.frames_applied += 1;
        Ok(fragment)
    }
}
