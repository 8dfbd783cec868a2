use crate::lowlevel::RequestId;

use std::collections::VecDeque;

/// A submitted request whose completion has not been observed yet.
#[derive(Debug, Copy, Clone)]
pub(crate) struct Token {
    pub(crate) id: RequestId,
    pub(crate) offset: u64,
    pub(crate) len: usize,
}

/// Bounded FIFO of outstanding requests.
///
/// Completions are only ever checked at the front, a token stays queued
/// until its completion is observed or it is abandoned.
#[derive(Debug)]
pub(crate) struct InFlight {
    tokens: VecDeque<Token>,
    capacity: usize,
    bytes: usize,
}

impl InFlight {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            tokens: VecDeque::with_capacity(capacity),
            capacity,
            bytes: 0,
        }
    }

    pub(crate) fn is_full(&self) -> bool {
        self.tokens.len() >= self.capacity
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Bytes covered by the outstanding requests.
    pub(crate) fn bytes(&self) -> usize {
        self.bytes
    }

    pub(crate) fn push(&mut self, token: Token) {
        debug_assert!(!self.is_full());

        self.bytes += token.len;
        self.tokens.push_back(token);
    }

    /// The oldest outstanding request.
    pub(crate) fn front(&self) -> Option<Token> {
        self.tokens.front().copied()
    }

    pub(crate) fn pop_front(&mut self) -> Option<Token> {
        let token = self.tokens.pop_front()?;
        self.bytes -= token.len;
        Some(token)
    }

    /// Remove every token, oldest first.
    pub(crate) fn drain(&mut self) -> impl Iterator<Item = Token> + '_ {
        self.bytes = 0;
        self.tokens.drain(..)
    }
}
