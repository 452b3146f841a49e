//! Append-only store of encrypted ballots and voting tokens.
pub mod board;
pub mod snapshot;
pub mod tokens;

use crate::crypto::CryptoError;

quick_error! {
    #[derive(Debug)]
    pub enum BBError {
        InvalidToken {
            display("invalid token")
        }
        MalformedBallot(message: String) {
            display("malformed ballot: {}", message)
        }
        Corrupt(message: String) {
            display("corrupt snapshot: {}", message)
        }
        IOError(err: std::io::Error) {
            from()
            display("io error: {}", err)
        }
        Json(err: serde_json::Error) {
            from()
            display("json error: {}", err)
        }
        Crypto(err: CryptoError) {
            from()
            display("{}", err)
        }
        Msg(message: String) {
            from()
            display("{}", message)
        }
    }
}

impl BBError {
    /// True for errors where the durable state could not be read or written,
    /// as opposed to a rejected request.
    pub fn is_storage(&self) -> bool {
        matches!(
            self,
            BBError::Corrupt(_) | BBError::IOError(_) | BBError::Json(_) | BBError::Msg(_)
        )
    }
}

/// One ciphertext per candidate, accepted or rejected as a unit.
#[derive(Clone, Debug, PartialEq)]
pub struct Ballot<C> {
    slots: Vec<C>,
}

impl<C> Ballot<C> {
    pub fn new(slots: Vec<C>) -> Ballot<C> {
        Ballot { slots }
    }
    pub fn slots(&self) -> &[C] {
        &self.slots
    }
    pub fn len(&self) -> usize {
        self.slots.len()
    }
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
