//! Request/response surface of an election, independent of any transport.
pub mod service;
pub mod tally;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{AsRefStr, Display};

use crate::bulletinboard::BBError;
use crate::clock::Phase;
use crate::crypto::{CryptoError, PublicKeyInfo};

#[derive(Serialize, Display, AsRefStr, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    InvalidToken,
    ElectionNotOver,
    MalformedBallot,
    PersistenceFailure,
    KeyLoadFailure,
    DecryptionFailure,
}

quick_error! {
    #[derive(Debug)]
    pub enum ElectionError {
        InvalidToken {
            display("invalid token")
        }
        ElectionNotOver {
            display("the election is not over")
        }
        MalformedBallot(message: String) {
            display("malformed ballot: {}", message)
        }
        PersistenceFailure(err: BBError) {
            display("persistence failure: {}", err)
        }
        KeyLoadFailure(err: CryptoError) {
            display("key load failure: {}", err)
        }
        DecryptionFailure(err: CryptoError) {
            display("decryption failure: {}", err)
        }
    }
}

impl From<BBError> for ElectionError {
    fn from(err: BBError) -> ElectionError {
        match err {
            BBError::InvalidToken => ElectionError::InvalidToken,
            BBError::MalformedBallot(message) => ElectionError::MalformedBallot(message),
            other => ElectionError::PersistenceFailure(other),
        }
    }
}

impl ElectionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ElectionError::InvalidToken => ErrorKind::InvalidToken,
            ElectionError::ElectionNotOver => ErrorKind::ElectionNotOver,
            ElectionError::MalformedBallot(_) => ErrorKind::MalformedBallot,
            ElectionError::PersistenceFailure(_) => ErrorKind::PersistenceFailure,
            ElectionError::KeyLoadFailure(_) => ErrorKind::KeyLoadFailure,
            ElectionError::DecryptionFailure(_) => ErrorKind::DecryptionFailure,
        }
    }

    /// A request that was refused, as opposed to a system that is degraded.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::InvalidToken | ErrorKind::ElectionNotOver | ErrorKind::MalformedBallot
        )
    }
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ElectionMetadata {
    pub public_key: PublicKeyInfo,
    pub end_time: f64,
    pub about: String,
    pub candidates: Vec<String>,
}

/// Operator view of an election: metadata, phase and ballots received.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct ElectionStatus {
    pub election: ElectionMetadata,
    pub phase: Phase,
    pub ballots: usize,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct TokenStatus {
    pub valid: bool,
}

/// A ciphertext as sent by a client: decimal string or plain json integer.
/// Integers keep all their digits, ciphertexts run to thousands of bits.
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum CiphertextValue {
    Text(String),
    Number(serde_json::Number),
}

// untagged deserialization buffers numbers as f64/u64, so go through Value
impl<'de> Deserialize<'de> for CiphertextValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<CiphertextValue, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::String(s) => Ok(CiphertextValue::Text(s)),
            Value::Number(n) => Ok(CiphertextValue::Number(n)),
            other => Err(de::Error::custom(format!(
                "expected a decimal string or an integer, found {}",
                other
            ))),
        }
    }
}

impl CiphertextValue {
    pub fn to_decimal(&self) -> String {
        match self {
            CiphertextValue::Text(s) => s.clone(),
            CiphertextValue::Number(n) => n.to_string(),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct VoteRequest {
    pub token: String,
    pub value: Vec<CiphertextValue>,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct VoteResponse {
    pub ok: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,
}

impl VoteResponse {
    pub fn from_result(result: Result<(), ElectionError>) -> VoteResponse {
        match result {
            Ok(()) => VoteResponse {
                ok: true,
                message: "vote recorded".to_string(),
                error: None,
            },
            Err(e) => VoteResponse {
                ok: false,
                message: e.to_string(),
                error: Some(e.kind()),
            },
        }
    }
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct ResultResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Vec<i64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,
}

impl ResultResponse {
    /// Pending results are `{ ok: false }` without an error kind.
    pub fn from_result(result: Result<Vec<i64>, ElectionError>) -> ResultResponse {
        match result {
            Ok(counts) => ResultResponse {
                ok: true,
                result: Some(counts),
                error: None,
            },
            Err(ElectionError::ElectionNotOver) => ResultResponse {
                ok: false,
                result: None,
                error: None,
            },
            Err(e) => ResultResponse {
                ok: false,
                result: None,
                error: Some(e.kind()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::bulletinboard::BBError;
    use crate::election::*;

    #[test]
    fn test_error_kinds() {
        let e: ElectionError = BBError::InvalidToken.into();
        assert_eq!(e.kind(), ErrorKind::InvalidToken);
        assert!(e.is_rejection());

        let e: ElectionError = BBError::Msg("disk full".to_string()).into();
        assert_eq!(e.kind(), ErrorKind::PersistenceFailure);
        assert!(!e.is_rejection());
        assert_eq!(ErrorKind::PersistenceFailure.to_string(), "persistence_failure");
    }

    #[test]
    fn test_response_shapes() {
        let pending = ResultResponse::from_result(Err(ElectionError::ElectionNotOver));
        assert_eq!(serde_json::to_string(&pending).unwrap(), r#"{"ok":false}"#);

        let done = ResultResponse::from_result(Ok(vec![1, 1]));
        assert_eq!(
            serde_json::to_string(&done).unwrap(),
            r#"{"ok":true,"result":[1,1]}"#
        );

        let rejected = VoteResponse::from_result(Err(ElectionError::InvalidToken));
        let value = serde_json::to_value(&rejected).unwrap();
        assert_eq!(value["ok"], false);
        assert_eq!(value["error"], "invalid_token");
    }

    #[test]
    fn test_vote_request() {
        let request: VoteRequest =
            serde_json::from_str(r#"{ "token": "ab", "value": ["123", 45] }"#).unwrap();
        let values: Vec<String> = request.value.iter().map(|v| v.to_decimal()).collect();
        assert_eq!(values, vec!["123", "45"]);
    }

    #[test]
    fn test_vote_request_big_integer() {
        let digits = "1".repeat(600);
        let json = format!(r#"{{ "token": "ab", "value": [{}, 1] }}"#, digits);
        let request: VoteRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(request.value[0].to_decimal(), digits);
        assert_eq!(request.value[1].to_decimal(), "1");

        let back = serde_json::to_string(&request).unwrap();
        assert!(back.contains(&digits));
        assert!(!back.contains(&format!("\"{}\"", digits)));
    }

    #[test]
    fn test_vote_request_rejects_other_values() {
        let result = serde_json::from_str::<VoteRequest>(r#"{ "token": "ab", "value": [[1], 2] }"#);
        assert!(result.is_err());
    }
}
