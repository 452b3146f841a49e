use std::sync::{Mutex, MutexGuard};

use log::{error, info, warn};
use rand::Rng;

use crate::bulletinboard::snapshot::{Snapshot, SnapshotStore};
use crate::bulletinboard::tokens::TokenRegistry;
use crate::bulletinboard::{BBError, Ballot};
use crate::clock::ElectionClock;
use crate::crypto::EncryptionKey;

/// Parameters for a board created from scratch.
#[derive(Clone, Debug)]
pub struct BoardParams {
    pub candidates: usize,
    pub tokens: usize,
    pub start_time: f64,
    pub duration: f64,
}

struct BoardState<C> {
    tokens: TokenRegistry,
    ballots: Vec<Ballot<C>>,
}

/// The encrypted bulletin board.
///
/// All mutation happens in [`BulletinBoard::submit`], which holds one lock
/// across the token check, the ballot insert and the snapshot write. A vote
/// is acknowledged only after its snapshot is durable; if the write fails
/// the in-memory change is undone.
///
/// Ballots are inserted at a random position. This only decouples storage
/// order from arrival order; anyone who can observe requests can still link
/// request metadata to ballots. It is not an anonymity guarantee.
pub struct BulletinBoard<K: EncryptionKey, S> {
    key: K,
    store: S,
    candidates: usize,
    start_time: f64,
    duration: f64,
    state: Mutex<BoardState<K::Ciphertext>>,
}

impl<K: EncryptionKey, S: SnapshotStore> BulletinBoard<K, S> {
    /// Restores the board from `store`, or creates it with fresh tokens and
    /// persists it before returning, so tokens are issued only once.
    pub fn load_or_init(
        store: S,
        key: K,
        params: &BoardParams,
    ) -> Result<BulletinBoard<K, S>, BBError> {
        if let Some(snapshot) = store.load()? {
            return BulletinBoard::restore(store, key, params.candidates, snapshot);
        }

        let mut tokens = TokenRegistry::new();
        tokens.issue(params.tokens);
        let board = BulletinBoard {
            key,
            store,
            candidates: params.candidates,
            start_time: params.start_time,
            duration: params.duration,
            state: Mutex::new(BoardState {
                tokens,
                ballots: vec![],
            }),
        };
        {
            let state = board.lock()?;
            board.persist(&state)?;
        }
        info!(
            "BulletinBoard: initialized with {} tokens, {} candidates",
            params.tokens, params.candidates
        );

        Ok(board)
    }

    // the snapshot must name the current key, and every stored ciphertext
    // is decoded against it
    fn restore(
        store: S,
        key: K,
        candidates: usize,
        snapshot: Snapshot,
    ) -> Result<BulletinBoard<K, S>, BBError> {
        match &snapshot.modulus {
            Some(modulus) if *modulus != key.info().n => {
                return Err(BBError::Corrupt(
                    "snapshot was written under a different key".to_string(),
                ));
            }
            Some(_) => {}
            None => warn!("BulletinBoard: snapshot does not name its key, cannot check it"),
        }
        let mut ballots = Vec::with_capacity(snapshot.votes.len());
        for (i, vote) in snapshot.votes.iter().enumerate() {
            if vote.len() != candidates {
                return Err(BBError::Corrupt(format!(
                    "ballot {} has {} slots, expected {}",
                    i,
                    vote.len(),
                    candidates
                )));
            }
            let slots = vote
                .iter()
                .map(|c| key.decode(c))
                .collect::<Result<Vec<K::Ciphertext>, _>>()
                .map_err(|e| BBError::Corrupt(format!("ballot {}: {}", i, e)))?;
            ballots.push(Ballot::new(slots));
        }

        let tokens = TokenRegistry::from_map(snapshot.tokens);
        if tokens.spent_count() < ballots.len() {
            return Err(BBError::Corrupt(format!(
                "{} ballots but only {} spent tokens",
                ballots.len(),
                tokens.spent_count()
            )));
        }
        info!(
            "BulletinBoard: restored {} ballots, {}/{} tokens spent",
            ballots.len(),
            tokens.spent_count(),
            tokens.len()
        );

        Ok(BulletinBoard {
            key,
            store,
            candidates,
            start_time: snapshot.start_time,
            duration: snapshot.duration,
            state: Mutex::new(BoardState { tokens, ballots }),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, BoardState<K::Ciphertext>>, BBError> {
        self.state
            .lock()
            .map_err(|_| BBError::Msg("board lock poisoned".to_string()))
    }

    fn persist(&self, state: &BoardState<K::Ciphertext>) -> Result<(), BBError> {
        let snapshot = Snapshot {
            start_time: self.start_time,
            duration: self.duration,
            tokens: state.tokens.as_map().clone(),
            votes: state
                .ballots
                .iter()
                .map(|b| b.slots().iter().map(|c| self.key.encode(c)).collect())
                .collect(),
            modulus: Some(self.key.info().n),
        };
        self.store.store(&snapshot)
    }

    /// Parses a submitted ballot, one decimal ciphertext per candidate.
    pub fn decode_ballot<T: AsRef<str>>(&self, values: &[T]) -> Result<Ballot<K::Ciphertext>, BBError> {
        if values.len() != self.candidates {
            return Err(BBError::MalformedBallot(format!(
                "{} slots, expected {}",
                values.len(),
                self.candidates
            )));
        }
        let slots = values
            .iter()
            .map(|v| self.key.decode(v.as_ref()))
            .collect::<Result<Vec<K::Ciphertext>, _>>()
            .map_err(|e| BBError::MalformedBallot(e.to_string()))?;

        Ok(Ballot::new(slots))
    }

    /// Spends `token` and records `ballot`, or changes nothing.
    pub fn submit(
        &self,
        token: &str,
        ballot: Ballot<K::Ciphertext>,
        clock: &ElectionClock,
    ) -> Result<(), BBError> {
        if ballot.len() != self.candidates {
            return Err(BBError::MalformedBallot(format!(
                "{} slots, expected {}",
                ballot.len(),
                self.candidates
            )));
        }

        let mut state = self.lock()?;
        if !state.tokens.check_and_consume(token, clock.is_open()) {
            return Err(BBError::InvalidToken);
        }
        let position = rand::thread_rng().gen_range(0, state.ballots.len() + 1);
        state.ballots.insert(position, ballot);

        if let Err(e) = self.persist(&state) {
            state.ballots.remove(position);
            state.tokens.restore(token);
            error!("BulletinBoard: persist failed, vote rolled back: {}", e);
            return Err(e);
        }
        info!("BulletinBoard: ballot accepted ({} total)", state.ballots.len());

        Ok(())
    }

    pub fn is_valid_token(&self, token: &str) -> bool {
        match self.lock() {
            Ok(state) => state.tokens.is_valid(token),
            Err(e) => {
                warn!("BulletinBoard: {}", e);
                false
            }
        }
    }

    /// A copy of the stored ballots, in storage order.
    pub fn ballots(&self) -> Result<Vec<Ballot<K::Ciphertext>>, BBError> {
        Ok(self.lock()?.ballots.clone())
    }

    pub fn ballot_count(&self) -> Result<usize, BBError> {
        Ok(self.lock()?.ballots.len())
    }

    pub fn unspent_tokens(&self) -> Result<Vec<String>, BBError> {
        let state = self.lock()?;
        Ok(state.tokens.unspent().into_iter().map(String::from).collect())
    }

    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn candidates(&self) -> usize {
        self.candidates
    }

    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }
}
