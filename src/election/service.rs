use std::path::Path;
use std::sync::Arc;

use log::{error, info, warn};

use crate::bulletinboard::board::{BoardParams, BulletinBoard};
use crate::bulletinboard::snapshot::{FileStore, SnapshotStore};
use crate::bulletinboard::BBError;
use crate::clock::{ElectionClock, Phase, SystemTimeSource, TimeSource};
use crate::config::ElectionConfig;
use crate::crypto::authority::KeyAuthority;
use crate::crypto::backend::paillier_b::PaillierPrivateKey;
use crate::crypto::{CryptoError, DecryptionKey, EncryptionKey};
use crate::election::tally;
use crate::election::*;
use crate::util;

/// Everything a request handler needs: the key authority, the board and the
/// clock for one election. Share it behind an `Arc`; the board does its own
/// locking.
pub struct ElectionService<D: DecryptionKey, S> {
    about: String,
    candidates: Vec<String>,
    authority: KeyAuthority<D>,
    board: BulletinBoard<D::Public, S>,
    clock: ElectionClock,
}

impl ElectionService<PaillierPrivateKey, FileStore> {
    /// Opens the election described by `config` on the local filesystem,
    /// creating key and board on first use.
    pub fn open(config: &ElectionConfig) -> Result<Self, ElectionError> {
        let authority = KeyAuthority::load_or_create(&config.key_path, config.key_bits)
            .map_err(ElectionError::KeyLoadFailure)?;
        let store = FileStore::new(&config.board_path);

        ElectionService::new(config, authority, store, Arc::new(SystemTimeSource))
    }
}

impl<D: DecryptionKey, S: SnapshotStore> ElectionService<D, S> {
    pub fn new(
        config: &ElectionConfig,
        authority: KeyAuthority<D>,
        store: S,
        time: Arc<dyn TimeSource>,
    ) -> Result<Self, ElectionError> {
        let params = BoardParams {
            candidates: config.candidates.len(),
            tokens: config.tokens,
            start_time: config.start_time.unwrap_or_else(|| time.now()),
            duration: config.duration,
        };
        let board = BulletinBoard::load_or_init(store, authority.public().clone(), &params)?;
        if board.duration() != config.duration {
            warn!(
                "ElectionService: configured duration {} ignored, board has {}",
                config.duration,
                board.duration()
            );
        }
        let clock = ElectionClock::new(board.start_time(), board.duration(), time);
        info!(
            "ElectionService: {} candidates, phase {}",
            config.candidates.len(),
            clock.phase()
        );

        Ok(ElectionService {
            about: config.about.clone(),
            candidates: config.candidates.clone(),
            authority,
            board,
            clock,
        })
    }

    pub fn metadata(&self) -> ElectionMetadata {
        ElectionMetadata {
            public_key: self.authority.public().info(),
            end_time: self.clock.end_time(),
            about: self.about.clone(),
            candidates: self.candidates.clone(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.clock.phase()
    }

    pub fn status(&self) -> Result<ElectionStatus, ElectionError> {
        Ok(ElectionStatus {
            election: self.metadata(),
            phase: self.phase(),
            ballots: self.ballot_count()?,
        })
    }

    pub fn check_token(&self, token: &str) -> TokenStatus {
        TokenStatus {
            valid: self.board.is_valid_token(token),
        }
    }

    pub fn submit_vote(&self, request: &VoteRequest) -> Result<(), ElectionError> {
        let values: Vec<String> = request.value.iter().map(|v| v.to_decimal()).collect();
        let result = self
            .board
            .decode_ballot(&values)
            .and_then(|ballot| self.board.submit(&request.token, ballot, &self.clock))
            .map_err(ElectionError::from);

        match &result {
            Ok(()) => info!("ElectionService: vote recorded"),
            Err(e) if e.is_rejection() => info!("ElectionService: vote rejected ({})", e.kind()),
            Err(e) => error!("ElectionService: vote failed: {}", e),
        }

        result
    }

    pub fn vote(&self, request: &VoteRequest) -> VoteResponse {
        VoteResponse::from_result(self.submit_vote(request))
    }

    /// Decrypted per-candidate totals, in candidate order. Fails with
    /// `ElectionNotOver` until the clock reports the election closed.
    pub fn result(&self) -> Result<Vec<i64>, ElectionError> {
        if !self.clock.is_closed() {
            return Err(ElectionError::ElectionNotOver);
        }
        let ballots = self.board.ballots()?;
        let tally = tally::tally(self.board.key(), &ballots, self.candidates.len());
        if tally.is_empty() {
            return Ok(vec![0; self.candidates.len()]);
        }

        let counts = self
            .authority
            .reveal(&tally.aggregates)
            .map_err(ElectionError::DecryptionFailure)?;
        info!("ElectionService: revealed totals over {} ballots", tally.ballots);

        counts
            .iter()
            .map(|c| {
                c.to_i64().ok_or_else(|| {
                    ElectionError::DecryptionFailure(CryptoError::Decode(
                        "total does not fit in 64 bits".to_string(),
                    ))
                })
            })
            .collect()
    }

    pub fn result_response(&self) -> ResultResponse {
        ResultResponse::from_result(self.result())
    }

    pub fn unspent_tokens(&self) -> Result<Vec<String>, ElectionError> {
        Ok(self.board.unspent_tokens()?)
    }

    /// Writes the unspent tokens, one per line, for out-of-band distribution.
    pub fn export_tokens(&self, path: &Path) -> Result<usize, ElectionError> {
        let tokens = self.unspent_tokens()?;
        let mut text = tokens.join("\n");
        if !text.is_empty() {
            text.push('\n');
        }
        util::write_file_private(path, text.as_bytes())
            .map_err(|e| ElectionError::PersistenceFailure(BBError::from(e)))?;
        info!("ElectionService: exported {} tokens to {}", tokens.len(), path.display());

        Ok(tokens.len())
    }

    pub fn ballot_count(&self) -> Result<usize, ElectionError> {
        Ok(self.board.ballot_count()?)
    }
}
