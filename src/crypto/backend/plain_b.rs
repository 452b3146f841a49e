//! Plaintext stand-in for the additive scheme.
//!
//! Ciphertexts are the plaintexts themselves, reduced modulo a public bound.
//! It satisfies the same additive law as Paillier and lets the board and
//! tally logic be exercised without big-integer key generation. Testing only:
//! it offers no confidentiality whatsoever.
use rug::Integer;

use crate::crypto::*;

#[derive(Clone, Debug, PartialEq)]
pub struct PlainCiphertext(Integer);

#[derive(Clone, Debug, PartialEq)]
pub struct PlainKey {
    bound: Integer,
}

impl PlainKey {
    pub fn new(bits: u32) -> PlainKey {
        PlainKey {
            bound: Integer::from(Integer::u_pow_u(2, bits)),
        }
    }
}

impl EncryptionKey for PlainKey {
    type Ciphertext = PlainCiphertext;

    fn encrypt(&self, plaintext: &Integer) -> Result<PlainCiphertext, CryptoError> {
        let mut m = Integer::from(plaintext % &self.bound);
        if m < 0 {
            m += &self.bound;
        }
        Ok(PlainCiphertext(m))
    }

    fn add(&self, a: &PlainCiphertext, b: &PlainCiphertext) -> PlainCiphertext {
        PlainCiphertext(Integer::from(&a.0 + &b.0) % &self.bound)
    }

    fn zero(&self) -> PlainCiphertext {
        PlainCiphertext(Integer::new())
    }

    fn encode(&self, ciphertext: &PlainCiphertext) -> String {
        ciphertext.0.to_string()
    }

    fn decode(&self, value: &str) -> Result<PlainCiphertext, CryptoError> {
        let c = Integer::from_str_radix(value.trim(), 10)
            .map_err(|e| CryptoError::Decode(e.to_string()))?;
        if c < 0 || c >= self.bound {
            return Err(CryptoError::Decode(
                "ciphertext outside of [0, bound)".to_string(),
            ));
        }
        Ok(PlainCiphertext(c))
    }

    fn info(&self) -> PublicKeyInfo {
        PublicKeyInfo {
            n: self.bound.to_string(),
            g: "1".to_string(),
        }
    }
}

pub struct PlainPrivateKey {
    public: PlainKey,
}

impl DecryptionKey for PlainPrivateKey {
    type Public = PlainKey;

    const MIN_MODULUS_BITS: u32 = 32;

    fn generate(bits: u32) -> Result<PlainPrivateKey, CryptoError> {
        if bits < Self::MIN_MODULUS_BITS {
            return Err(CryptoError::KeySize(bits, Self::MIN_MODULUS_BITS));
        }
        Ok(PlainPrivateKey {
            public: PlainKey::new(bits),
        })
    }

    fn public(&self) -> &PlainKey {
        &self.public
    }

    fn decrypt(&self, ciphertext: &PlainCiphertext) -> Result<Integer, CryptoError> {
        let bound = &self.public.bound;
        if ciphertext.0 < 0 || ciphertext.0 >= *bound {
            return Err(CryptoError::Decode(
                "ciphertext outside of [0, bound)".to_string(),
            ));
        }
        let half = Integer::from(bound >> 1u32);
        if ciphertext.0 > half {
            Ok(Integer::from(&ciphertext.0 - bound))
        } else {
            Ok(ciphertext.0.clone())
        }
    }

    // the bound is stored as n = p * q with p = 1
    fn to_material(&self) -> KeyMaterial {
        KeyMaterial {
            n: self.public.bound.to_string(),
            p: "1".to_string(),
            q: self.public.bound.to_string(),
        }
    }

    fn from_material(material: &KeyMaterial) -> Result<PlainPrivateKey, CryptoError> {
        let n = KeyMaterial::parse(&material.n, "n")?;
        let p = KeyMaterial::parse(&material.p, "p")?;
        let q = KeyMaterial::parse(&material.q, "q")?;
        if Integer::from(&p * &q) != n {
            return Err(CryptoError::KeyLoad("n != p * q".to_string()));
        }
        let bits = n.significant_bits().saturating_sub(1);
        if Integer::from(Integer::u_pow_u(2, bits)) != n {
            return Err(CryptoError::KeyLoad("bound is not a power of two".to_string()));
        }
        if bits < Self::MIN_MODULUS_BITS {
            return Err(CryptoError::KeySize(bits, Self::MIN_MODULUS_BITS));
        }
        Ok(PlainPrivateKey {
            public: PlainKey { bound: n },
        })
    }
}

#[cfg(test)]
mod tests {
    use rug::Integer;

    use crate::crypto::backend::plain_b::*;
    use crate::crypto::*;

    #[test]
    fn test_plain_additive_law() {
        let sk = PlainPrivateKey::generate(64).unwrap();
        let pk = sk.public();
        let a = pk.encrypt(&Integer::from(3)).unwrap();
        let b = pk.encrypt(&Integer::from(-5)).unwrap();
        assert_eq!(sk.decrypt(&pk.add(&a, &b)).unwrap(), -2);
        assert_eq!(sk.decrypt(&pk.zero()).unwrap(), 0);
    }

    #[test]
    fn test_plain_material() {
        let sk = PlainPrivateKey::generate(64).unwrap();
        let back = PlainPrivateKey::from_material(&sk.to_material()).unwrap();
        assert_eq!(back.public(), sk.public());

        let mut bad = sk.to_material();
        bad.n = "12".to_string();
        assert!(PlainPrivateKey::from_material(&bad).is_err());
    }
}
