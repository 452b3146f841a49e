use std::path::Path;

use log::{info, warn};
use rug::Integer;

use crate::crypto::*;
use crate::util;

/// Holder of the private key. The only place where decryption happens.
pub struct KeyAuthority<D> {
    key: D,
}

impl<D: DecryptionKey> KeyAuthority<D> {
    pub fn generate(bits: u32) -> Result<KeyAuthority<D>, CryptoError> {
        if bits < D::MIN_MODULUS_BITS {
            return Err(CryptoError::KeySize(bits, D::MIN_MODULUS_BITS));
        }
        let key = D::generate(bits)?;

        Ok(KeyAuthority { key })
    }

    /// Loads the key store at `path`, or generates a new keypair and writes
    /// it to `path` before returning. A store that exists but cannot be read
    /// back is an error, never a reason to generate a replacement.
    pub fn load_or_create(path: &Path, bits: u32) -> Result<KeyAuthority<D>, CryptoError> {
        if path.exists() {
            let bytes = util::read_file_bytes(path)?;
            let material: KeyMaterial = serde_json::from_slice(&bytes)
                .map_err(|e| CryptoError::KeyLoad(format!("{}: {}", path.display(), e)))?;
            let key = D::from_material(&material)?;
            info!("KeyAuthority: loaded key from {}", path.display());

            Ok(KeyAuthority { key })
        } else {
            info!(
                "KeyAuthority: no key at {}, generating {} bits..",
                path.display(),
                bits
            );
            let authority: KeyAuthority<D> = KeyAuthority::generate(bits)?;
            let bytes = serde_json::to_vec_pretty(&authority.key.to_material())?;
            util::write_file_private(path, &bytes)?;
            info!("KeyAuthority: key written to {}", path.display());

            Ok(authority)
        }
    }

    pub fn public(&self) -> &D::Public {
        self.key.public()
    }

    /// Decrypts the per-candidate aggregates. Kept crate-private: the only
    /// caller is the result path, after the election has closed.
    pub(crate) fn reveal(&self, aggregates: &[CiphertextOf<D>]) -> Result<Vec<Integer>, CryptoError> {
        let ret: Result<Vec<Integer>, CryptoError> =
            aggregates.iter().map(|c| self.key.decrypt(c)).collect();
        if let Err(e) = &ret {
            warn!("KeyAuthority: reveal failed: {}", e);
        }

        ret
    }
}

impl<D: DecryptionKey> From<D> for KeyAuthority<D> {
    fn from(key: D) -> KeyAuthority<D> {
        KeyAuthority { key }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use rug::Integer;
    use tempfile::tempdir;

    use crate::crypto::authority::*;
    use crate::crypto::backend::plain_b::*;
    use crate::crypto::*;

    #[test]
    fn test_load_or_create() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("key.json");

        let first = KeyAuthority::<PlainPrivateKey>::load_or_create(&path, 64).unwrap();
        assert!(path.exists());
        let second = KeyAuthority::<PlainPrivateKey>::load_or_create(&path, 64).unwrap();
        assert_eq!(first.public(), second.public());

        let c = first.public().encrypt(&Integer::from(9)).unwrap();
        assert_eq!(second.reveal(&[c]).unwrap(), vec![Integer::from(9)]);
    }

    #[test]
    fn test_corrupt_store_is_not_replaced() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("key.json");
        fs::write(&path, b"{ \"n\": \"garbage\" }").unwrap();

        let result = KeyAuthority::<PlainPrivateKey>::load_or_create(&path, 64);
        assert!(matches!(result, Err(CryptoError::KeyLoad(_))));
        // the stored bytes are untouched
        assert_eq!(fs::read(&path).unwrap(), b"{ \"n\": \"garbage\" }".to_vec());
    }

    #[test]
    fn test_min_bits() {
        let result = KeyAuthority::<PlainPrivateKey>::generate(16);
        assert!(matches!(result, Err(CryptoError::KeySize(16, 32))));
    }

    #[test]
    fn test_reveal_decode_error() {
        let authority = KeyAuthority::<PlainPrivateKey>::generate(64).unwrap();
        let other = PlainPrivateKey::generate(128).unwrap();
        let big = other.public().decode(&"9".repeat(30)).unwrap();
        let result = authority.reveal(&[big]);
        assert!(matches!(result, Err(CryptoError::Decode(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_key_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("key.json");
        KeyAuthority::<PlainPrivateKey>::load_or_create(&path, 64).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
