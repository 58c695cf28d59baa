//! Historized `(account_id, transaction_num) -> character` mapping
//! (spec §3, §4.2).
//!
//! The taxonomy never mutates a past snapshot in place — every `update`
//! appends a new one — so "frozen historical snapshots" (spec's
//! invariant) falls out of the API shape rather than needing a runtime
//! flag. `transaction_num` has no sentinel: the resolved Open Question
//! (see SPEC_FULL.md §3-4) tracks "no snapshot yet" as `None` rather
//! than seeding a `-1` marker snapshot.

use crate::character_set::is_valid_character;
use crate::error::TaxonomyError;
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

pub type AccountId = String;

/// Anything a reverse path is made of that the taxonomy can resolve to a
/// character. Kept decoupled from any concrete DAG node type — the path
/// enumerator's node type implements this.
pub trait HasAccountId {
    fn account_id(&self) -> Option<&AccountId>;
}

/// One immutable point-in-time mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaxonomySnapshot {
    pub transaction_num: i64,
    pub mappings: BTreeMap<AccountId, char>,
    pub timestamp_millis: u128,
}

impl TaxonomySnapshot {
    fn now(transaction_num: i64, mappings: BTreeMap<AccountId, char>) -> Self {
        let timestamp_millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        Self {
            transaction_num,
            mappings,
            timestamp_millis,
        }
    }
}

/// Append-only historized taxonomy.
#[derive(Debug, Clone, Default)]
pub struct AccountTaxonomy {
    /// Strictly increasing by `transaction_num`.
    history: Vec<TaxonomySnapshot>,
}

impl AccountTaxonomy {
    pub fn new() -> Self {
        Self { history: Vec::new() }
    }

    pub fn last_transaction_num(&self) -> Option<i64> {
        self.history.last().map(|s| s.transaction_num)
    }

    pub fn history(&self) -> &[TaxonomySnapshot] {
        &self.history
    }

    /// Appends a new snapshot derived from `requested` at
    /// `transaction_num`, returning the mappings restricted to the
    /// accounts the caller supplied. `None` values request
    /// auto-assignment/inheritance (spec §4.2 step 3).
    pub fn update(
        &mut self,
        requested: BTreeMap<AccountId, Option<char>>,
        transaction_num: i64,
    ) -> Result<BTreeMap<AccountId, char>, TaxonomyError> {
        if let Some(last) = self.last_transaction_num() {
            if transaction_num <= last {
                return Err(TaxonomyError::NonMonotonicTransactionNum {
                    new: transaction_num,
                    last,
                });
            }
        }

        // Validate explicit characters, and intra-update uniqueness.
        let mut requested_char_owner: BTreeMap<char, AccountId> = BTreeMap::new();
        for (account, maybe_char) in &requested {
            if let Some(c) = maybe_char {
                if !is_valid_character(*c) {
                    return Err(TaxonomyError::InvalidCharacter(*c));
                }
                if let Some(other) = requested_char_owner.get(c) {
                    if other != account {
                        return Err(TaxonomyError::IntraSnapshotCollision(
                            *c,
                            other.clone(),
                            account.clone(),
                        ));
                    }
                }
                requested_char_owner.insert(*c, account.clone());
            }
        }

        let previous = self.history.last().map(|s| s.mappings.clone()).unwrap_or_default();

        let mut all_historical_chars: std::collections::BTreeSet<char> = self
            .history
            .iter()
            .flat_map(|s| s.mappings.values().copied())
            .collect();

        let mut new_mappings: BTreeMap<AccountId, char> = BTreeMap::new();

        // Entries with explicit characters.
        for (account, maybe_char) in &requested {
            if let Some(c) = maybe_char {
                new_mappings.insert(account.clone(), *c);
                all_historical_chars.insert(*c);
            }
        }

        // Entries with no character: inherit or auto-assign.
        for (account, maybe_char) in &requested {
            if maybe_char.is_some() {
                continue;
            }
            if let Some(existing) = previous.get(account) {
                new_mappings.insert(account.clone(), *existing);
                all_historical_chars.insert(*existing);
            } else {
                let assigned = next_unused_character(&all_historical_chars)?;
                new_mappings.insert(account.clone(), assigned);
                all_historical_chars.insert(assigned);
            }
        }

        // Carry forward every previous account not mentioned here.
        for (account, c) in &previous {
            if !requested.contains_key(account) {
                new_mappings.insert(account.clone(), *c);
            }
        }

        let snapshot = TaxonomySnapshot::now(transaction_num, new_mappings);
        let insert_at = self
            .history
            .binary_search_by_key(&transaction_num, |s| s.transaction_num)
            .unwrap_or_else(|pos| pos);
        self.history.insert(insert_at, snapshot);

        let returned = requested
            .keys()
            .filter_map(|account| {
                self.history[insert_at]
                    .mappings
                    .get(account)
                    .map(|c| (account.clone(), *c))
            })
            .collect();
        Ok(returned)
    }

    /// Binary-searches the snapshot with the largest `transaction_num`
    /// not exceeding `transaction_num`, then walks backward until
    /// `account_id` appears in a snapshot's mappings.
    pub fn get(&self, account_id: &str, transaction_num: i64) -> Option<char> {
        let idx = self.snapshot_index_at(transaction_num)?;
        self.history[..=idx]
            .iter()
            .rev()
            .find_map(|s| s.mappings.get(account_id).copied())
    }

    fn snapshot_index_at(&self, transaction_num: i64) -> Option<usize> {
        match self
            .history
            .binary_search_by_key(&transaction_num, |s| s.transaction_num)
        {
            Ok(idx) => Some(idx),
            Err(0) => None,
            Err(pos) => Some(pos - 1),
        }
    }

    /// Maps each node's account id through [`Self::get`], concatenating
    /// the resulting characters into a word (spec §4.2).
    pub fn path_to_word<N: HasAccountId>(
        &self,
        path: &[N],
        transaction_num: i64,
    ) -> Result<String, TaxonomyError> {
        let mut word = String::with_capacity(path.len());
        for node in path {
            let account = node.account_id().ok_or(TaxonomyError::NodeMissingAccountId)?;
            let c = self
                .get(account, transaction_num)
                .ok_or_else(|| TaxonomyError::UnmappedAccount(account.clone(), transaction_num))?;
            word.push(c);
        }
        Ok(word)
    }

    /// Checks snapshot monotonicity and per-snapshot injectivity,
    /// returning every violation found (diagnostic, not fail-fast).
    pub fn validate_consistency(&self) -> Vec<TaxonomyError> {
        let mut errors = Vec::new();
        let mut prev_tx: Option<i64> = None;
        for snapshot in &self.history {
            if let Some(prev) = prev_tx {
                if snapshot.transaction_num <= prev {
                    errors.push(TaxonomyError::NonMonotonicTransactionNum {
                        new: snapshot.transaction_num,
                        last: prev,
                    });
                }
            }
            prev_tx = Some(snapshot.transaction_num);

            let mut seen: BTreeMap<char, &AccountId> = BTreeMap::new();
            for (account, c) in &snapshot.mappings {
                if let Some(other) = seen.get(c) {
                    if *other != account {
                        errors.push(TaxonomyError::IntraSnapshotCollision(
                            *c,
                            (*other).clone(),
                            account.clone(),
                        ));
                    }
                } else {
                    seen.insert(*c, account);
                }
            }
        }
        errors
    }
}

fn next_unused_character(used: &std::collections::BTreeSet<char>) -> Result<char, TaxonomyError> {
    (crate::character_set::ALPHABET_LOW..=crate::character_set::ALPHABET_HIGH)
        .filter_map(char::from_u32)
        .find(|c| !used.contains(c))
        .ok_or(TaxonomyError::ExhaustedAlphabet)
}
