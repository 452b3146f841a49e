use rayon::prelude::*;

use crate::bulletinboard::Ballot;
use crate::crypto::EncryptionKey;

/// Per-candidate homomorphic sums over a set of ballots.
#[derive(Clone, Debug, PartialEq)]
pub struct Tally<C> {
    pub aggregates: Vec<C>,
    pub ballots: usize,
}

impl<C> Tally<C> {
    pub fn is_empty(&self) -> bool {
        self.ballots == 0
    }
}

/// Adds up slot `i` of every ballot for each candidate `i`. With no ballots
/// every aggregate is the scheme's zero and no addition takes place.
///
/// Every ballot must have exactly `candidates` slots, which the board checks
/// before accepting one.
pub(crate) fn tally<K: EncryptionKey>(
    key: &K,
    ballots: &[Ballot<K::Ciphertext>],
    candidates: usize,
) -> Tally<K::Ciphertext> {
    debug_assert!(
        ballots.iter().all(|b| b.len() == candidates),
        "ballot arity differs from the candidate count"
    );
    let aggregates = match ballots.split_first() {
        None => vec![key.zero(); candidates],
        Some((first, rest)) => (0..candidates)
            .into_par_iter()
            .map(|i| {
                rest.iter()
                    .fold(first.slots()[i].clone(), |acc, b| key.add(&acc, &b.slots()[i]))
            })
            .collect(),
    };

    Tally {
        aggregates,
        ballots: ballots.len(),
    }
}
