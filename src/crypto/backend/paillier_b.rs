use log::info;
use rand::rngs::OsRng;
use rand::RngCore;
use rug::integer::{IsPrime, Order};
use rug::rand::RandState;
use rug::Integer;

use crate::crypto::*;

const PRIMALITY_REPS: u32 = 40;

#[derive(Clone, Debug, PartialEq)]
pub struct PaillierCiphertext(Integer);

impl PaillierCiphertext {
    pub fn value(&self) -> &Integer {
        &self.0
    }
}

/// Paillier public key with generator `g = n + 1`.
#[derive(Clone, Debug, PartialEq)]
pub struct PaillierPublicKey {
    n: Integer,
    g: Integer,
    n_squared: Integer,
}

impl PaillierPublicKey {
    pub fn new(n: Integer) -> PaillierPublicKey {
        let g = Integer::from(&n + 1u32);
        let n_squared = Integer::from(&n * &n);

        PaillierPublicKey { n, g, n_squared }
    }

    pub fn modulus(&self) -> &Integer {
        &self.n
    }

    pub fn bits(&self) -> u32 {
        self.n.significant_bits()
    }

    // a valid ciphertext is a unit of Z*_{n^2}
    fn check(&self, c: &Integer) -> Result<(), CryptoError> {
        if *c <= 0 || *c >= self.n_squared {
            return Err(CryptoError::Decode(
                "ciphertext outside of [1, n^2)".to_string(),
            ));
        }
        if Integer::from(c.gcd_ref(&self.n)) != 1 {
            return Err(CryptoError::Decode(
                "ciphertext is not invertible modulo n".to_string(),
            ));
        }
        Ok(())
    }

    fn random_unit(&self, rng: &mut RandState<'_>) -> Integer {
        loop {
            let r = self.n.clone().random_below(rng);
            if r != 0 && Integer::from(r.gcd_ref(&self.n)) == 1 {
                return r;
            }
        }
    }
}

impl EncryptionKey for PaillierPublicKey {
    type Ciphertext = PaillierCiphertext;

    fn encrypt(&self, plaintext: &Integer) -> Result<PaillierCiphertext, CryptoError> {
        let mut rng = rand_state();
        let mut m = Integer::from(plaintext % &self.n);
        if m < 0 {
            m += &self.n;
        }
        // g^m = 1 + m * n (mod n^2) when g = n + 1
        let gm = (Integer::from(&m * &self.n) + 1u32) % &self.n_squared;
        let r = self.random_unit(&mut rng);
        let rn = pow_mod(r, &self.n, &self.n_squared)?;

        Ok(PaillierCiphertext((gm * rn) % &self.n_squared))
    }

    fn add(&self, a: &PaillierCiphertext, b: &PaillierCiphertext) -> PaillierCiphertext {
        PaillierCiphertext(Integer::from(&a.0 * &b.0) % &self.n_squared)
    }

    fn zero(&self) -> PaillierCiphertext {
        PaillierCiphertext(Integer::from(1))
    }

    fn encode(&self, ciphertext: &PaillierCiphertext) -> String {
        ciphertext.0.to_string()
    }

    fn decode(&self, value: &str) -> Result<PaillierCiphertext, CryptoError> {
        let c = Integer::from_str_radix(value.trim(), 10)
            .map_err(|e| CryptoError::Decode(e.to_string()))?;
        self.check(&c)?;

        Ok(PaillierCiphertext(c))
    }

    fn info(&self) -> PublicKeyInfo {
        PublicKeyInfo {
            n: self.n.to_string(),
            g: self.g.to_string(),
        }
    }
}

pub struct PaillierPrivateKey {
    public: PaillierPublicKey,
    p: Integer,
    q: Integer,
    lambda: Integer,
    mu: Integer,
}

impl PaillierPrivateKey {
    fn from_primes(p: Integer, q: Integer) -> Result<PaillierPrivateKey, CryptoError> {
        let n = Integer::from(&p * &q);
        let lambda = Integer::from(&p - 1u32).lcm(&Integer::from(&q - 1u32));
        // with g = n + 1, L(g^lambda mod n^2) = lambda mod n
        let mu = lambda
            .clone()
            .invert(&n)
            .map_err(|_| CryptoError::KeyLoad("lambda is not invertible modulo n".to_string()))?;

        Ok(PaillierPrivateKey {
            public: PaillierPublicKey::new(n),
            p,
            q,
            lambda,
            mu,
        })
    }
}

impl DecryptionKey for PaillierPrivateKey {
    type Public = PaillierPublicKey;

    const MIN_MODULUS_BITS: u32 = 2048;

    fn generate(bits: u32) -> Result<PaillierPrivateKey, CryptoError> {
        if bits < Self::MIN_MODULUS_BITS {
            return Err(CryptoError::KeySize(bits, Self::MIN_MODULUS_BITS));
        }
        let now = std::time::Instant::now();
        let mut rng = rand_state();
        let p_bits = bits / 2;
        let q_bits = bits - p_bits;

        loop {
            let p = random_prime(p_bits, &mut rng);
            let q = random_prime(q_bits, &mut rng);
            if p == q || Integer::from(&p * &q).significant_bits() != bits {
                continue;
            }
            let key = PaillierPrivateKey::from_primes(p, q)?;
            info!(
                "Paillier: generated {}-bit modulus [{}ms]",
                bits,
                now.elapsed().as_millis()
            );
            return Ok(key);
        }
    }

    fn public(&self) -> &PaillierPublicKey {
        &self.public
    }

    fn decrypt(&self, ciphertext: &PaillierCiphertext) -> Result<Integer, CryptoError> {
        let n = &self.public.n;
        self.public.check(&ciphertext.0)?;

        let u = pow_mod(ciphertext.0.clone(), &self.lambda, &self.public.n_squared)?;
        let l = (u - 1u32) / n;
        let m = (l * &self.mu) % n;

        // the upper half of Z_n encodes negative values
        let half = Integer::from(n >> 1u32);
        if m > half {
            Ok(m - n)
        } else {
            Ok(m)
        }
    }

    fn to_material(&self) -> KeyMaterial {
        KeyMaterial {
            n: self.public.n.to_string(),
            p: self.p.to_string(),
            q: self.q.to_string(),
        }
    }

    fn from_material(material: &KeyMaterial) -> Result<PaillierPrivateKey, CryptoError> {
        let n = KeyMaterial::parse(&material.n, "n")?;
        let p = KeyMaterial::parse(&material.p, "p")?;
        let q = KeyMaterial::parse(&material.q, "q")?;

        if Integer::from(&p * &q) != n {
            return Err(CryptoError::KeyLoad("n != p * q".to_string()));
        }
        if p == q
            || p.is_probably_prime(PRIMALITY_REPS) == IsPrime::No
            || q.is_probably_prime(PRIMALITY_REPS) == IsPrime::No
        {
            return Err(CryptoError::KeyLoad(
                "factors are not distinct primes".to_string(),
            ));
        }
        let bits = n.significant_bits();
        if bits < Self::MIN_MODULUS_BITS {
            return Err(CryptoError::KeySize(bits, Self::MIN_MODULUS_BITS));
        }

        PaillierPrivateKey::from_primes(p, q)
    }
}

fn rand_state() -> RandState<'static> {
    let mut seed = [0u8; 32];
    OsRng.fill_bytes(&mut seed);
    let mut state = RandState::new();
    state.seed(&Integer::from_digits(&seed, Order::Lsf));

    state
}

fn random_prime(bits: u32, rng: &mut RandState<'_>) -> Integer {
    loop {
        let mut candidate = Integer::from(Integer::random_bits(bits, rng));
        // top two bits set so that the product has the full width
        candidate.set_bit(bits - 1, true);
        candidate.set_bit(bits - 2, true);
        let prime = candidate.next_prime();
        if prime.significant_bits() == bits {
            return prime;
        }
    }
}

fn pow_mod(base: Integer, exponent: &Integer, modulus: &Integer) -> Result<Integer, CryptoError> {
    base.pow_mod(exponent, modulus)
        .map_err(|_| CryptoError::Msg("modular exponentiation failed".to_string()))
}

#[cfg(test)]
mod tests {
    use rug::Integer;

    use crate::crypto::backend::paillier_b::*;
    use crate::crypto::*;

    // small factors, unit tests only
    fn test_key() -> PaillierPrivateKey {
        let p = Integer::from(1_000_000_007u64);
        let q = Integer::from(998_244_353u64);
        PaillierPrivateKey::from_primes(p, q).unwrap()
    }

    #[test]
    fn test_encrypt_decrypt() {
        let sk = test_key();
        let pk = sk.public();
        for value in &[0i64, 1, 2, 17, 123_456] {
            let c = pk.encrypt(&Integer::from(*value)).unwrap();
            assert_eq!(sk.decrypt(&c).unwrap(), *value);
        }
    }

    #[test]
    fn test_encryption_is_randomized() {
        let sk = test_key();
        let pk = sk.public();
        let a = pk.encrypt(&Integer::from(1)).unwrap();
        let b = pk.encrypt(&Integer::from(1)).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_additive_law() {
        let sk = test_key();
        let pk = sk.public();
        let a = pk.encrypt(&Integer::from(20)).unwrap();
        let b = pk.encrypt(&Integer::from(22)).unwrap();
        let sum = pk.add(&a, &b);
        assert_eq!(sk.decrypt(&sum).unwrap(), 42);

        let same = pk.add(&sum, &pk.zero());
        assert_eq!(sk.decrypt(&same).unwrap(), 42);
        assert_eq!(sk.decrypt(&pk.zero()).unwrap(), 0);
    }

    #[test]
    fn test_negative_plaintext() {
        let sk = test_key();
        let pk = sk.public();
        let a = pk.encrypt(&Integer::from(-5)).unwrap();
        let b = pk.encrypt(&Integer::from(3)).unwrap();
        assert_eq!(sk.decrypt(&pk.add(&a, &b)).unwrap(), -2);
    }

    #[test]
    fn test_decode() {
        let sk = test_key();
        let pk = sk.public();
        let c = pk.encrypt(&Integer::from(7)).unwrap();
        let back = pk.decode(&pk.encode(&c)).unwrap();
        assert_eq!(c, back);

        assert!(pk.decode("not a number").is_err());
        assert!(pk.decode("0").is_err());
        assert!(pk.decode("-3").is_err());
        let n_squared = Integer::from(pk.modulus() * pk.modulus());
        assert!(pk.decode(&n_squared.to_string()).is_err());
        // shares a factor with n
        assert!(pk.decode(&pk.modulus().to_string()).is_err());
    }

    #[test]
    fn test_decrypt_out_of_range() {
        let sk = test_key();
        let n_squared = Integer::from(sk.public().modulus() * sk.public().modulus());
        let c = PaillierCiphertext(n_squared + 5u32);
        assert!(matches!(sk.decrypt(&c), Err(CryptoError::Decode(_))));
    }

    #[test]
    fn test_material() {
        let sk = test_key();
        let material = sk.to_material();
        assert_eq!(material.n, sk.public().modulus().to_string());

        // below the minimum modulus size
        let result = PaillierPrivateKey::from_material(&material);
        assert!(matches!(result, Err(CryptoError::KeySize(_, 2048))));

        let mut bad = material.clone();
        bad.q = "12".to_string();
        assert!(matches!(
            PaillierPrivateKey::from_material(&bad),
            Err(CryptoError::KeyLoad(_))
        ));
    }

    #[test]
    fn test_generate_min_bits() {
        let result = PaillierPrivateKey::generate(1024);
        assert!(matches!(result, Err(CryptoError::KeySize(1024, 2048))));
    }
}
