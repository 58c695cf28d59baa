//! On-disk session state: a JSON-described command log that is replayed
//! through a fresh [`TransactionManager`] on every invocation.
//!
//! The core engine's live types (`Dag`, NFA states holding a compiled
//! `regex::Regex`) aren't serializable, so the session doesn't persist
//! them directly. Instead it records the sequence of calls that built
//! them — account registrations, committed transactions (each carrying
//! its own measure patterns) — and [`Session::load`] reconstructs
//! identical state by replaying that sequence from scratch. Replay is
//! deterministic: taxonomy character auto-assignment and sector
//! allocation both walk their pools in a fixed ascending order, so the
//! same log always reproduces the same mappings and the same DAG.

use anyhow::{Context, Result};
use icgs_core::character_set::CharacterSetManager;
use icgs_core::transaction::{Transaction, TransactionMeasure};
use icgs_core::{TransactionManager, ValidationConfig, ValidationOutcome};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AccountBatch {
    Auto { accounts: Vec<String> },
    BySector { sector: String, accounts: Vec<String> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeasureDef {
    pub measure_id: String,
    pub account_id: String,
    pub primary_pattern: String,
    pub primary_weight: Decimal,
    pub acceptable_value: Decimal,
    pub required_value: Decimal,
    pub secondary_patterns: Vec<(String, Decimal)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionDef {
    pub id: String,
    pub source_account: String,
    pub target_account: String,
    pub amount: Decimal,
    pub source_measures: Vec<MeasureDef>,
    pub target_measures: Vec<MeasureDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SessionFile {
    pub config: ValidationConfig,
    pub account_batches: Vec<AccountBatch>,
    pub transactions: Vec<TransactionDef>,
}

/// Live, runtime-reconstructed view of a [`SessionFile`].
pub struct Session {
    pub file: SessionFile,
    pub char_sets: CharacterSetManager,
    pub manager: TransactionManager,
}

impl Session {
    pub fn load(path: &Path, default_config: ValidationConfig) -> Result<Self> {
        let file = if path.exists() {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read session file: {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("failed to parse session file: {}", path.display()))?
        } else {
            SessionFile {
                config: default_config,
                ..SessionFile::default()
            }
        };
        Self::replay(file)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(&self.file).context("failed to serialize session")?;
        fs::write(path, text).with_context(|| format!("failed to write session file: {}", path.display()))
    }

    fn replay(file: SessionFile) -> Result<Self> {
        let char_sets = CharacterSetManager::with_default_sectors().context("default sectors rejected")?;
        let mut session = Self {
            manager: TransactionManager::new(file.config.clone()),
            char_sets,
            file: SessionFile {
                config: file.config.clone(),
                ..SessionFile::default()
            },
        };

        for batch in file.account_batches {
            session.apply_account_batch(batch)?;
        }
        for def in file.transactions {
            session.apply_committed_transaction(def)?;
        }
        Ok(session)
    }

    fn apply_account_batch(&mut self, batch: AccountBatch) -> Result<()> {
        match &batch {
            AccountBatch::Auto { accounts } => {
                self.manager
                    .add_accounts_auto(accounts.iter().cloned())
                    .context("account registration rejected")?;
            }
            AccountBatch::BySector { sector, accounts } => {
                let mut requested: BTreeMap<String, Option<char>> = BTreeMap::new();
                for account in accounts {
                    let c = self
                        .char_sets
                        .allocate(sector)
                        .with_context(|| format!("sector '{sector}' allocation exhausted for '{account}'"))?;
                    requested.insert(account.clone(), Some(c));
                }
                let tx_num = self.manager.next_explicit_tx_num();
                self.manager
                    .update_taxonomy_explicit(requested, tx_num)
                    .context("sector-based account registration rejected")?;
            }
        }
        self.file.account_batches.push(batch);
        Ok(())
    }

    pub fn configure_accounts(&mut self, accounts: Vec<String>) -> Result<BTreeMap<String, char>> {
        let mapping = self
            .manager
            .add_accounts_auto(accounts.iter().cloned())
            .context("account registration rejected")?;
        self.file.account_batches.push(AccountBatch::Auto { accounts });
        Ok(mapping)
    }

    pub fn configure_accounts_by_sector(
        &mut self,
        sector: String,
        accounts: Vec<String>,
    ) -> Result<BTreeMap<String, char>> {
        let mut requested: BTreeMap<String, Option<char>> = BTreeMap::new();
        for account in &accounts {
            let c = self
                .char_sets
                .allocate(&sector)
                .with_context(|| format!("sector '{sector}' allocation exhausted for '{account}'"))?;
            requested.insert(account.clone(), Some(c));
        }
        let tx_num = self.manager.next_explicit_tx_num();
        let mapping = self
            .manager
            .update_taxonomy_explicit(requested, tx_num)
            .context("sector-based account registration rejected")?;
        self.file.account_batches.push(AccountBatch::BySector { sector, accounts });
        Ok(mapping)
    }

    fn apply_committed_transaction(&mut self, def: TransactionDef) -> Result<()> {
        let tx = transaction_from_def(&def);
        let outcome = self
            .manager
            .add_transaction(&tx)
            .with_context(|| format!("replaying previously-committed transaction '{}' failed", def.id))?;
        if !matches!(outcome, ValidationOutcome::Committed(_)) {
            anyhow::bail!(
                "previously-committed transaction '{}' no longer validates on replay",
                def.id
            );
        }
        self.file.transactions.push(def);
        Ok(())
    }

    pub fn add_transaction(&mut self, def: TransactionDef) -> Result<ValidationOutcome> {
        let tx = transaction_from_def(&def);
        let outcome = self.manager.add_transaction(&tx).context("transaction validation failed")?;
        if matches!(outcome, ValidationOutcome::Committed(_)) {
            self.file.transactions.push(def);
        }
        Ok(outcome)
    }
}

fn measure_from_def(def: &MeasureDef) -> TransactionMeasure {
    let mut measure = TransactionMeasure::new(
        def.measure_id.clone(),
        def.account_id.clone(),
        def.primary_pattern.clone(),
        def.primary_weight,
    )
    .with_acceptable_value(def.acceptable_value)
    .with_required_value(def.required_value);
    measure.secondary_patterns = def.secondary_patterns.clone();
    measure
}

fn transaction_from_def(def: &TransactionDef) -> Transaction {
    let mut tx = Transaction::new(def.id.clone(), def.source_account.clone(), def.target_account.clone(), def.amount);
    for m in &def.source_measures {
        tx = tx.with_source_measure(measure_from_def(m));
    }
    for m in &def.target_measures {
        tx = tx.with_target_measure(measure_from_def(m));
    }
    tx
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn source_measure() -> MeasureDef {
        MeasureDef {
            measure_id: "agriculture".to_string(),
            account_id: "alice".to_string(),
            primary_pattern: ".*A.*".to_string(),
            primary_weight: Decimal::ONE,
            acceptable_value: Decimal::from(100),
            required_value: Decimal::ZERO,
            secondary_patterns: Vec::new(),
        }
    }

    #[test]
    fn round_trips_through_disk_and_reproduces_state() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.json");

        {
            let mut session = Session::load(&path, ValidationConfig::default()).unwrap();
            session.configure_accounts(vec!["alice".to_string(), "bob".to_string()]).unwrap();
            let outcome = session
                .add_transaction(TransactionDef {
                    id: "tx1".to_string(),
                    source_account: "alice".to_string(),
                    target_account: "bob".to_string(),
                    amount: Decimal::from(10),
                    source_measures: vec![source_measure()],
                    target_measures: vec![],
                })
                .unwrap();
            assert!(matches!(outcome, ValidationOutcome::Committed(_)));
            session.save(&path).unwrap();
        }

        let reloaded = Session::load(&path, ValidationConfig::default()).unwrap();
        assert_eq!(reloaded.manager.stats().transactions_added, 1);
        assert_eq!(reloaded.file.transactions.len(), 1);
    }

    #[test]
    fn rejected_transaction_is_not_persisted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.json");
        let mut session = Session::load(&path, ValidationConfig::default()).unwrap();
        session.configure_accounts(vec!["alice".to_string(), "bob".to_string()]).unwrap();

        let outcome = session
            .add_transaction(TransactionDef {
                id: "tx1".to_string(),
                source_account: "alice".to_string(),
                target_account: "bob".to_string(),
                amount: Decimal::from(10),
                source_measures: vec![],
                target_measures: vec![MeasureDef {
                    measure_id: "agriculture".to_string(),
                    account_id: "bob".to_string(),
                    primary_pattern: ".*.*".to_string(),
                    primary_weight: Decimal::ZERO,
                    acceptable_value: Decimal::ZERO,
                    required_value: Decimal::from(999),
                    secondary_patterns: Vec::new(),
                }],
            })
            .unwrap();
        assert!(matches!(outcome, ValidationOutcome::Rejected(_)));
        assert!(session.file.transactions.is_empty());
    }
}
