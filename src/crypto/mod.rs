//! Additively homomorphic encryption behind a narrow capability interface.
//!
//! The bulletin board and the tally only ever see an [`EncryptionKey`]:
//! they can add ciphertexts, build the additive identity and move ciphertexts
//! to and from their decimal wire form. Decryption lives on [`DecryptionKey`],
//! which is held exclusively by the [`authority::KeyAuthority`].
use std::fmt::Debug;

use rug::Integer;
use serde::{Deserialize, Serialize};

pub mod authority;
pub mod backend;

quick_error! {
    #[derive(Debug)]
    pub enum CryptoError {
        Decode(message: String) {
            display("could not decode ciphertext: {}", message)
        }
        KeySize(bits: u32, min: u32) {
            display("modulus of {} bits is below the minimum of {} bits", bits, min)
        }
        KeyLoad(message: String) {
            display("invalid key material: {}", message)
        }
        IOError(err: std::io::Error) {
            from()
            display("io error: {}", err)
        }
        Json(err: serde_json::Error) {
            from()
            display("json error: {}", err)
        }
        Msg(message: String) {
            from()
            display("{}", message)
        }
    }
}

/// Public parameters handed out to voters, decimal encoded.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PublicKeyInfo {
    pub n: String,
    pub g: String,
}

/// Stored form of a keypair: the public modulus and its factorization.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct KeyMaterial {
    pub n: String,
    pub p: String,
    pub q: String,
}

impl KeyMaterial {
    pub fn parse(value: &str, field: &str) -> Result<Integer, CryptoError> {
        Integer::from_str_radix(value.trim(), 10)
            .map_err(|e| CryptoError::KeyLoad(format!("field '{}': {}", field, e)))
    }
}

/// The public half of a scheme. Everything the server may do with a ballot
/// before the election closes goes through this trait.
pub trait EncryptionKey: Clone + Debug + Send + Sync {
    type Ciphertext: Clone + Debug + PartialEq + Send + Sync;

    fn encrypt(&self, plaintext: &Integer) -> Result<Self::Ciphertext, CryptoError>;
    /// Must satisfy `decrypt(add(a, b)) == decrypt(a) + decrypt(b)`.
    fn add(&self, a: &Self::Ciphertext, b: &Self::Ciphertext) -> Self::Ciphertext;
    /// A fixed encryption of zero, the identity of `add`.
    fn zero(&self) -> Self::Ciphertext;

    fn encode(&self, ciphertext: &Self::Ciphertext) -> String;
    /// Parses a ciphertext and checks that it is well formed under this key.
    fn decode(&self, value: &str) -> Result<Self::Ciphertext, CryptoError>;

    fn info(&self) -> PublicKeyInfo;
}

/// The private half of a scheme.
pub trait DecryptionKey: Sized + Send + Sync {
    type Public: EncryptionKey;

    const MIN_MODULUS_BITS: u32;

    fn generate(bits: u32) -> Result<Self, CryptoError>;
    fn public(&self) -> &Self::Public;
    fn decrypt(
        &self,
        ciphertext: &<Self::Public as EncryptionKey>::Ciphertext,
    ) -> Result<Integer, CryptoError>;

    fn to_material(&self) -> KeyMaterial;
    fn from_material(material: &KeyMaterial) -> Result<Self, CryptoError>;
}

/// Ciphertext type of the public half of `D`.
pub type CiphertextOf<D> = <<D as DecryptionKey>::Public as EncryptionKey>::Ciphertext;
