//! WPA 4-way handshake assembly.
//!
//! One [`Handshake`] per (access point, station) pair collects EAPOL-Key
//! frames in four slots. [`HandshakeAssembler`] applies the transition rules:
//!
//! | message | accepted when                                   |
//! |---------|-------------------------------------------------|
//! | 1       | slot 2 empty (a newer message 1 replaces the old) |
//! | 2       | slot 1 filled, slot 2 empty, within the window  |
//! | 3       | slot 2 filled, slot 3 empty                     |
//! | 4       | slot 3 filled, slot 4 empty                     |
//!
//! A handshake is complete once slot 2 is filled.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::config::DEFAULT_HANDSHAKE_WINDOW_MS;
use crate::frame::FrameRecord;

/// Position of an EAPOL-Key frame in the 4-way handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum HandshakeMessage {
    One,
    Two,
    Three,
    Four,
}

impl HandshakeMessage {
    pub const ALL: [HandshakeMessage; 4] = [
        HandshakeMessage::One,
        HandshakeMessage::Two,
        HandshakeMessage::Three,
        HandshakeMessage::Four,
    ];

    /// Classify an EAPOL-Key frame from its key-info flags.
    ///
    /// `ack + mic + install` is message 3, `ack` alone is message 1, `mic`
    /// alone is message 2 when key data is present and message 4 otherwise.
    /// Anything else is not a handshake message.
    pub fn from_key_info(ack: bool, mic: bool, install: bool, key_data_len: u64) -> Option<Self> {
        match (ack, mic, install) {
            (true, true, true) => Some(HandshakeMessage::Three),
            (true, _, _) => Some(HandshakeMessage::One),
            (false, true, _) if key_data_len > 0 => Some(HandshakeMessage::Two),
            (false, true, _) => Some(HandshakeMessage::Four),
            _ => None,
        }
    }

    /// Message number, 1 to 4.
    pub fn number(self) -> u8 {
        self.slot() as u8 + 1
    }

    /// Whether the frame is sent by the access point (messages 1 and 3).
    pub fn from_authenticator(self) -> bool {
        matches!(self, HandshakeMessage::One | HandshakeMessage::Three)
    }

    fn slot(self) -> usize {
        match self {
            HandshakeMessage::One => 0,
            HandshakeMessage::Two => 1,
            HandshakeMessage::Three => 2,
            HandshakeMessage::Four => 3,
        }
    }
}

impl fmt::Display for HandshakeMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "message {}", self.number())
    }
}

/// Why a message was not stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// The slot is already filled and is never overwritten.
    Duplicate,
    /// The message this one depends on has not been stored.
    OutOfOrder,
    /// Message 2 arrived too long after message 1.
    WindowExpired { elapsed_ms: u64 },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Duplicate => f.write_str("slot already filled"),
            Rejection::OutOfOrder => f.write_str("preceding message missing"),
            Rejection::WindowExpired { elapsed_ms } => {
                write!(f, "{elapsed_ms} ms after message 1")
            }
        }
    }
}

/// Outcome of feeding one message to a handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Accepted,
    Rejected(Rejection),
}

impl Transition {
    pub fn is_accepted(self) -> bool {
        matches!(self, Transition::Accepted)
    }
}

/// Collected handshake frames for one station.
#[derive(Debug, Clone, Serialize)]
pub struct Handshake {
    station: String,
    #[serde(skip)]
    slots: [Option<Arc<FrameRecord>>; 4],
    #[serde(skip)]
    first_message_ms: Option<u64>,
    last_update_ms: u64,
    complete: bool,
}

impl Handshake {
    /// Empty handshake for `station`.
    pub fn new(station: impl Into<String>, now_ms: u64) -> Self {
        Self {
            station: station.into(),
            slots: Default::default(),
            first_message_ms: None,
            last_update_ms: now_ms,
            complete: false,
        }
    }

    pub fn station(&self) -> &str {
        &self.station
    }

    /// Complete iff message 2 is stored.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Time of the last accepted message (or of creation).
    pub fn last_update_ms(&self) -> u64 {
        self.last_update_ms
    }

    pub fn has(&self, message: HandshakeMessage) -> bool {
        self.slots[message.slot()].is_some()
    }

    pub fn frame(&self, message: HandshakeMessage) -> Option<&Arc<FrameRecord>> {
        self.slots[message.slot()].as_ref()
    }

    /// Stored message numbers in order.
    pub fn messages(&self) -> Vec<HandshakeMessage> {
        HandshakeMessage::ALL
            .into_iter()
            .filter(|m| self.has(*m))
            .collect()
    }

    /// Stored frames in message order.
    pub fn frames(&self) -> impl Iterator<Item = &Arc<FrameRecord>> {
        self.slots.iter().flatten()
    }
}

/// Transition rules for [`Handshake`]s.
#[derive(Debug, Clone, Copy)]
pub struct HandshakeAssembler {
    window_ms: u64,
}

impl Default for HandshakeAssembler {
    fn default() -> Self {
        Self::new(DEFAULT_HANDSHAKE_WINDOW_MS)
    }
}

impl HandshakeAssembler {
    /// Assembler accepting message 2 up to `window_ms` after message 1.
    pub fn new(window_ms: u64) -> Self {
        Self { window_ms }
    }

    pub fn window_ms(&self) -> u64 {
        self.window_ms
    }

    /// Apply one message to `handshake`.
    pub fn apply(
        &self,
        handshake: &mut Handshake,
        message: HandshakeMessage,
        frame: Arc<FrameRecord>,
        now_ms: u64,
    ) -> Transition {
        let verdict = match message {
            HandshakeMessage::One if handshake.has(HandshakeMessage::Two) => {
                Err(Rejection::Duplicate)
            }
            HandshakeMessage::One => Ok(()),
            HandshakeMessage::Two => self.check_second(handshake, now_ms),
            HandshakeMessage::Three => requires(handshake, HandshakeMessage::Two, message),
            HandshakeMessage::Four => requires(handshake, HandshakeMessage::Three, message),
        };

        if let Err(rejection) = verdict {
            return Transition::Rejected(rejection);
        }

        handshake.slots[message.slot()] = Some(frame);
        handshake.last_update_ms = now_ms;
        match message {
            HandshakeMessage::One => handshake.first_message_ms = Some(now_ms),
            HandshakeMessage::Two => handshake.complete = true,
            _ => {}
        }
        Transition::Accepted
    }

    fn check_second(&self, handshake: &Handshake, now_ms: u64) -> Result<(), Rejection> {
        if handshake.has(HandshakeMessage::Two) {
            return Err(Rejection::Duplicate);
        }
        let first = match (handshake.has(HandshakeMessage::One), handshake.first_message_ms) {
            (true, Some(first)) => first,
            _ => return Err(Rejection::OutOfOrder),
        };
        let elapsed_ms = now_ms.saturating_sub(first);
        if elapsed_ms > self.window_ms {
            return Err(Rejection::WindowExpired { elapsed_ms });
        }
        Ok(())
    }
}

fn requires(
    handshake: &Handshake,
    previous: HandshakeMessage,
    message: HandshakeMessage,
) -> Result<(), Rejection> {
    if !handshake.has(previous) {
        Err(Rejection::OutOfOrder)
    } else if handshake.has(message) {
        Err(Rejection::Duplicate)
    } else {
        Ok(())
    }
}
