use std::collections::BTreeMap;

use log::warn;
use rand::rngs::OsRng;
use rand::RngCore;

/// Token width in bytes, 256 bits of entropy.
pub const TOKEN_BYTES: usize = 32;

/// Single use voting tokens. Each maps to its spent flag; entries are
/// never removed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TokenRegistry {
    tokens: BTreeMap<String, bool>,
}

impl TokenRegistry {
    pub fn new() -> TokenRegistry {
        TokenRegistry::default()
    }

    pub fn from_map(tokens: BTreeMap<String, bool>) -> TokenRegistry {
        TokenRegistry { tokens }
    }

    /// Generates `n` new unspent tokens and returns them.
    pub fn issue(&mut self, n: usize) -> Vec<String> {
        self.issue_with(n, &mut OsRng)
    }

    /// As [`TokenRegistry::issue`], drawing token bytes from `rng`. A token
    /// that already exists is drawn again, so exactly `n` new ones come back.
    pub fn issue_with<R: RngCore>(&mut self, n: usize, rng: &mut R) -> Vec<String> {
        let mut issued = Vec::with_capacity(n);
        while issued.len() < n {
            let mut bytes = [0u8; TOKEN_BYTES];
            rng.fill_bytes(&mut bytes);
            let token = hex::encode(bytes);
            if self.tokens.contains_key(&token) {
                warn!("TokenRegistry: token collision, regenerating");
                continue;
            }
            self.tokens.insert(token.clone(), false);
            issued.push(token);
        }

        issued
    }

    /// Marks `token` spent iff it exists, is unspent and `open` holds.
    /// Unknown and spent tokens take the same path and give the same answer.
    /// Callers hold the board lock, which makes check and mark one step.
    pub fn check_and_consume(&mut self, token: &str, open: bool) -> bool {
        match self.tokens.get_mut(token) {
            Some(spent) if open && !*spent => {
                *spent = true;
                true
            }
            _ => false,
        }
    }

    pub fn is_valid(&self, token: &str) -> bool {
        matches!(self.tokens.get(token), Some(false))
    }

    /// Undoes a consume whose ballot could not be persisted.
    pub(crate) fn restore(&mut self, token: &str) {
        if let Some(spent) = self.tokens.get_mut(token) {
            *spent = false;
        }
    }

    pub fn unspent(&self) -> Vec<&str> {
        self.tokens
            .iter()
            .filter(|(_, spent)| !**spent)
            .map(|(token, _)| token.as_str())
            .collect()
    }

    pub fn spent_count(&self) -> usize {
        self.tokens.values().filter(|spent| **spent).count()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn as_map(&self) -> &BTreeMap<String, bool> {
        &self.tokens
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rand::RngCore;

    use crate::bulletinboard::tokens::*;

    // fills every token with one repeated byte, taken in turn from `bytes`
    struct Replay {
        bytes: Vec<u8>,
        next: usize,
    }

    impl RngCore for Replay {
        fn next_u32(&mut self) -> u32 {
            self.next_u64() as u32
        }
        fn next_u64(&mut self) -> u64 {
            let mut buf = [0u8; 8];
            self.fill_bytes(&mut buf);
            u64::from_le_bytes(buf)
        }
        fn fill_bytes(&mut self, dest: &mut [u8]) {
            let byte = self.bytes[self.next % self.bytes.len()];
            self.next += 1;
            for b in dest.iter_mut() {
                *b = byte;
            }
        }
        fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
            self.fill_bytes(dest);
            Ok(())
        }
    }

    #[test]
    fn test_issue_distinct() {
        let mut registry = TokenRegistry::new();
        let issued = registry.issue(500);
        assert_eq!(issued.len(), 500);
        assert_eq!(registry.len(), 500);

        let distinct: HashSet<&String> = issued.iter().collect();
        assert_eq!(distinct.len(), 500);
        assert!(issued.iter().all(|t| t.len() == 2 * TOKEN_BYTES));
        assert_eq!(registry.unspent().len(), 500);
    }

    #[test]
    fn test_collision_is_regenerated() {
        let mut registry = TokenRegistry::new();
        let mut rng = Replay {
            bytes: vec![7, 7, 7, 8, 9],
            next: 0,
        };
        let issued = registry.issue_with(3, &mut rng);
        assert_eq!(issued.len(), 3);
        assert_eq!(registry.len(), 3);
        assert_eq!(rng.next, 5);
        assert_eq!(issued[0], "07".repeat(TOKEN_BYTES));
        assert_eq!(issued[1], "08".repeat(TOKEN_BYTES));
        assert_eq!(issued[2], "09".repeat(TOKEN_BYTES));

        // collides with tokens issued earlier, not just within one call
        let mut rng = Replay {
            bytes: vec![8, 9, 10],
            next: 0,
        };
        let more = registry.issue_with(1, &mut rng);
        assert_eq!(more, vec!["0a".repeat(TOKEN_BYTES)]);
        assert_eq!(registry.len(), 4);
    }

    #[test]
    fn test_issue_twice_keeps_existing() {
        let mut registry = TokenRegistry::new();
        let first = registry.issue(3);
        registry.issue(2);
        assert_eq!(registry.len(), 5);
        assert!(first.iter().all(|t| registry.is_valid(t)));
    }

    #[test]
    fn test_consume_once() {
        let mut registry = TokenRegistry::new();
        let token = registry.issue(1).remove(0);

        assert!(registry.is_valid(&token));
        assert!(registry.check_and_consume(&token, true));
        assert!(!registry.is_valid(&token));
        for _ in 0..3 {
            assert!(!registry.check_and_consume(&token, true));
        }
        assert_eq!(registry.spent_count(), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_consume_closed_or_unknown() {
        let mut registry = TokenRegistry::new();
        let token = registry.issue(1).remove(0);

        assert!(!registry.check_and_consume(&token, false));
        assert!(registry.is_valid(&token));
        assert!(!registry.check_and_consume("deadbeef", true));
        assert!(!registry.is_valid("deadbeef"));
        assert_eq!(registry.spent_count(), 0);
    }

    #[test]
    fn test_restore() {
        let mut registry = TokenRegistry::new();
        let token = registry.issue(1).remove(0);
        assert!(registry.check_and_consume(&token, true));
        registry.restore(&token);
        assert!(registry.is_valid(&token));

        // restoring unknown tokens does not create them
        registry.restore("unknown");
        assert_eq!(registry.len(), 1);
    }
}
