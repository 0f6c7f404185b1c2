//! # In-Memory Ledger
//!
//! Transactional snapshot surface over in-memory tables, behind a bounded
//! connection pool. Used for wiring and tests; supports fault injection
//! per query kind.
//!
//! | Table | Contents |
//! |-------|----------|
//! | units | MCI, stability, sequence, level, authors |
//! | definition changes | address, unit, target definition checksum |
//! | definitions | checksum → definition |
//! | outputs | owner, amount, spent flag |
//! | free units | units without children |

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use shared_types::{Address, Definition, Input, Joint, Output, ParentProps};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::algorithms::messages::apps;
use crate::domain::{DefinitionChange, LedgerError, SpendableOutput};
use crate::ports::{JointStore, LedgerStore, LedgerTransaction};

/// Default number of pooled connections.
pub const DEFAULT_POOL_SIZE: usize = 4;

/// Query kinds that can be made to fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum QueryKind {
    /// Opening a transaction.
    Begin,
    /// Reading free units and last stable ball.
    ParentProps,
    /// The unstable-predecessor check.
    UnstablePredecessors,
    /// Looking up a stable good unit by author.
    StableUnit,
    /// Looking up the latest definition change.
    DefinitionChange,
    /// Reading spendable outputs.
    SpendableOutputs,
    /// Commit.
    Commit,
    /// Rollback.
    Rollback,
    /// Saving a joint.
    Save,
}

impl QueryKind {
    fn name(&self) -> &'static str {
        match self {
            QueryKind::Begin => "begin",
            QueryKind::ParentProps => "parent_props",
            QueryKind::UnstablePredecessors => "unstable_predecessors",
            QueryKind::StableUnit => "stable_unit",
            QueryKind::DefinitionChange => "definition_change",
            QueryKind::SpendableOutputs => "spendable_outputs",
            QueryKind::Commit => "commit",
            QueryKind::Rollback => "rollback",
            QueryKind::Save => "save",
        }
    }
}

/// Sequence status of a unit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Sequence {
    /// Serial, valid.
    #[default]
    Good,
    /// Nonserial, may still become good.
    TempBad,
    /// Nonserial, final.
    FinalBad,
}

/// Author entry of a stored unit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnitAuthor {
    /// Authoring address.
    pub address: Address,
    /// Whether the unit disclosed the address definition.
    pub discloses_definition: bool,
}

/// Row of the units table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnitRecord {
    /// Unit hash.
    pub unit: String,
    /// Main-chain index, once known.
    pub mci: Option<u64>,
    /// Stability flag.
    pub is_stable: bool,
    /// Sequence status.
    pub sequence: Sequence,
    /// DAG level.
    pub level: u64,
    /// Authors.
    pub authors: Vec<UnitAuthor>,
}

impl UnitRecord {
    /// Stable good unit at `mci` (level = mci).
    pub fn stable(unit: impl Into<String>, mci: u64) -> Self {
        Self {
            unit: unit.into(),
            mci: Some(mci),
            is_stable: true,
            sequence: Sequence::Good,
            level: mci,
            authors: Vec::new(),
        }
    }

    /// Unit not yet on the main chain.
    pub fn unstable(unit: impl Into<String>) -> Self {
        Self {
            unit: unit.into(),
            mci: None,
            is_stable: false,
            sequence: Sequence::Good,
            level: 0,
            authors: Vec::new(),
        }
    }

    /// Add an author that did not disclose its definition.
    pub fn authored_by(mut self, address: Address) -> Self {
        self.authors.push(UnitAuthor {
            address,
            discloses_definition: false,
        });
        self
    }

    /// Add an author that disclosed its definition.
    pub fn authored_with_definition(mut self, address: Address) -> Self {
        self.authors.push(UnitAuthor {
            address,
            discloses_definition: true,
        });
        self
    }

    /// Override the sequence.
    pub fn with_sequence(mut self, sequence: Sequence) -> Self {
        self.sequence = sequence;
        self
    }

    /// Override the level.
    pub fn with_level(mut self, level: u64) -> Self {
        self.level = level;
        self
    }

    fn is_stable_good_at(&self, max_mci: u64) -> bool {
        self.is_stable
            && self.sequence == Sequence::Good
            && self.mci.is_some_and(|mci| mci <= max_mci)
    }

    fn is_above(&self, last_ball_mci: u64) -> bool {
        self.mci.map_or(true, |mci| mci > last_ball_mci)
    }

    fn has_author(&self, address: &Address) -> bool {
        self.authors.iter().any(|a| &a.address == address)
    }
}

#[derive(Clone, Debug)]
struct DefinitionChangeRecord {
    address: Address,
    unit: String,
    definition_chash: String,
}

#[derive(Clone, Debug)]
struct OutputRecord {
    input: Input,
    address: Address,
    amount: u64,
    is_spent: bool,
}

#[derive(Clone, Debug)]
struct LastStableBall {
    ball: String,
    unit: String,
    mci: u64,
}

#[derive(Default)]
struct LedgerTables {
    units: HashMap<String, UnitRecord>,
    definition_changes: Vec<DefinitionChangeRecord>,
    definitions: HashMap<String, Definition>,
    outputs: Vec<OutputRecord>,
    free_units: BTreeSet<String>,
    last_stable: Option<LastStableBall>,
    round_index: u64,
}

#[derive(Default)]
struct LedgerCounters {
    begun: AtomicU64,
    committed: AtomicU64,
    rolled_back: AtomicU64,
    saved: AtomicU64,
}

/// Transaction counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LedgerStats {
    /// Transactions opened.
    pub begun: u64,
    /// Transactions committed.
    pub committed: u64,
    /// Transactions rolled back (explicitly or by drop).
    pub rolled_back: u64,
    /// Joints saved.
    pub saved: u64,
}

/// In-memory ledger with a bounded connection pool.
#[derive(Clone)]
pub struct InMemoryLedger {
    tables: Arc<RwLock<LedgerTables>>,
    pool: Arc<Semaphore>,
    pool_size: usize,
    faults: Arc<Mutex<HashSet<QueryKind>>>,
    counters: Arc<LedgerCounters>,
}

impl InMemoryLedger {
    /// Ledger with `pool_size` connections.
    pub fn new(pool_size: usize) -> Self {
        Self {
            tables: Arc::new(RwLock::new(LedgerTables::default())),
            pool: Arc::new(Semaphore::new(pool_size)),
            pool_size,
            faults: Arc::new(Mutex::new(HashSet::new())),
            counters: Arc::new(LedgerCounters::default()),
        }
    }

    // -------------------------------------------------------------------------
    // Seeding
    // -------------------------------------------------------------------------

    /// Insert or replace a unit row.
    pub fn add_unit(&self, record: UnitRecord) {
        self.tables
            .write()
            .units
            .insert(record.unit.clone(), record);
    }

    /// Record a definition change of `address` carried by `unit`.
    pub fn add_definition_change(
        &self,
        address: Address,
        unit: impl Into<String>,
        definition_chash: impl Into<String>,
    ) {
        self.tables
            .write()
            .definition_changes
            .push(DefinitionChangeRecord {
                address,
                unit: unit.into(),
                definition_chash: definition_chash.into(),
            });
    }

    /// Persist a definition under its checksum.
    pub fn add_definition(&self, definition_chash: impl Into<String>, definition: Definition) {
        self.tables
            .write()
            .definitions
            .insert(definition_chash.into(), definition);
    }

    /// Add an unspent output created by `input.unit`.
    pub fn add_output(&self, input: Input, address: Address, amount: u64) {
        self.tables.write().outputs.push(OutputRecord {
            input,
            address,
            amount,
            is_spent: false,
        });
    }

    /// Mark a unit as childless.
    pub fn add_free_unit(&self, unit: impl Into<String>) {
        self.tables.write().free_units.insert(unit.into());
    }

    /// Set the last stable main-chain ball.
    pub fn set_last_stable_ball(&self, ball: impl Into<String>, unit: impl Into<String>, mci: u64) {
        self.tables.write().last_stable = Some(LastStableBall {
            ball: ball.into(),
            unit: unit.into(),
            mci,
        });
    }

    /// Set the current round index.
    pub fn set_round_index(&self, round_index: u64) {
        self.tables.write().round_index = round_index;
    }

    /// Put a unit on the main chain at `mci` and mark it stable.
    pub fn mark_stable(&self, unit: &str, mci: u64) -> bool {
        match self.tables.write().units.get_mut(unit) {
            Some(record) => {
                record.mci = Some(mci);
                record.is_stable = true;
                true
            }
            None => false,
        }
    }

    // -------------------------------------------------------------------------
    // Fault injection
    // -------------------------------------------------------------------------

    /// Make every subsequent `kind` query fail.
    pub fn fail_on(&self, kind: QueryKind) {
        self.faults.lock().insert(kind);
    }

    /// Remove all injected faults.
    pub fn clear_faults(&self) {
        self.faults.lock().clear();
    }

    // -------------------------------------------------------------------------
    // Inspection
    // -------------------------------------------------------------------------

    /// Stored unit row.
    pub fn unit(&self, unit: &str) -> Option<UnitRecord> {
        self.tables.read().units.get(unit).cloned()
    }

    /// Current free units.
    pub fn free_units(&self) -> Vec<String> {
        self.tables.read().free_units.iter().cloned().collect()
    }

    /// Whether the output at `input` is spent.
    pub fn is_spent(&self, input: &Input) -> Option<bool> {
        self.tables
            .read()
            .outputs
            .iter()
            .find(|o| &o.input == input)
            .map(|o| o.is_spent)
    }

    /// Connections currently free in the pool.
    pub fn available_connections(&self) -> usize {
        self.pool.available_permits()
    }

    /// Pool capacity.
    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Transaction counters.
    pub fn stats(&self) -> LedgerStats {
        LedgerStats {
            begun: self.counters.begun.load(Ordering::SeqCst),
            committed: self.counters.committed.load(Ordering::SeqCst),
            rolled_back: self.counters.rolled_back.load(Ordering::SeqCst),
            saved: self.counters.saved.load(Ordering::SeqCst),
        }
    }

    fn check_fault(faults: &Mutex<HashSet<QueryKind>>, kind: QueryKind) -> Result<(), LedgerError> {
        if faults.lock().contains(&kind) {
            return Err(LedgerError::Query {
                query: kind.name().to_string(),
                message: "injected fault".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_SIZE)
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedger {
    async fn begin(&self) -> Result<Box<dyn LedgerTransaction>, LedgerError> {
        Self::check_fault(&self.faults, QueryKind::Begin)?;
        let permit = Arc::clone(&self.pool)
            .acquire_owned()
            .await
            .map_err(|e| LedgerError::PoolUnavailable(e.to_string()))?;
        self.counters.begun.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(InMemoryTransaction {
            tables: Arc::clone(&self.tables),
            faults: Arc::clone(&self.faults),
            counters: Arc::clone(&self.counters),
            _permit: permit,
            finished: false,
        }))
    }
}

/// Open transaction holding one pooled connection.
struct InMemoryTransaction {
    tables: Arc<RwLock<LedgerTables>>,
    faults: Arc<Mutex<HashSet<QueryKind>>>,
    counters: Arc<LedgerCounters>,
    _permit: OwnedSemaphorePermit,
    finished: bool,
}

impl InMemoryTransaction {
    fn check(&self, kind: QueryKind) -> Result<(), LedgerError> {
        InMemoryLedger::check_fault(&self.faults, kind)
    }
}

#[async_trait]
impl LedgerTransaction for InMemoryTransaction {
    async fn read_parent_props(&mut self) -> Result<ParentProps, LedgerError> {
        self.check(QueryKind::ParentProps)?;
        let tables = self.tables.read();
        let last = tables.last_stable.clone().ok_or_else(|| LedgerError::Query {
            query: QueryKind::ParentProps.name().into(),
            message: "no last stable ball".into(),
        })?;
        if tables.free_units.is_empty() {
            return Err(LedgerError::Query {
                query: QueryKind::ParentProps.name().into(),
                message: "no free units".into(),
            });
        }
        Ok(ParentProps {
            parent_units: tables.free_units.iter().cloned().collect(),
            last_stable_mc_ball: last.ball,
            last_stable_mc_ball_unit: last.unit,
            last_stable_mc_ball_mci: last.mci,
            round_index: tables.round_index,
        })
    }

    async fn has_unstable_predecessors(
        &mut self,
        addresses: &[Address],
        last_ball_mci: u64,
    ) -> Result<bool, LedgerError> {
        self.check(QueryKind::UnstablePredecessors)?;
        let tables = self.tables.read();
        let wanted: HashSet<&Address> = addresses.iter().collect();

        let unstable_authored = tables.units.values().any(|unit| {
            unit.is_above(last_ball_mci)
                && unit.authors.iter().any(|author| {
                    wanted.contains(&author.address)
                        && (author.discloses_definition || unit.sequence != Sequence::Good)
                })
        });
        let unstable_change = tables.definition_changes.iter().any(|change| {
            wanted.contains(&change.address)
                && tables
                    .units
                    .get(&change.unit)
                    .map_or(true, |unit| unit.is_above(last_ball_mci))
        });
        Ok(unstable_authored || unstable_change)
    }

    async fn has_stable_good_unit(
        &mut self,
        address: &Address,
        max_mci: u64,
    ) -> Result<bool, LedgerError> {
        self.check(QueryKind::StableUnit)?;
        Ok(self
            .tables
            .read()
            .units
            .values()
            .any(|unit| unit.is_stable_good_at(max_mci) && unit.has_author(address)))
    }

    async fn latest_stable_definition_change(
        &mut self,
        address: &Address,
        max_mci: u64,
    ) -> Result<Option<DefinitionChange>, LedgerError> {
        self.check(QueryKind::DefinitionChange)?;
        let tables = self.tables.read();
        let latest = tables
            .definition_changes
            .iter()
            .filter(|change| &change.address == address)
            .filter_map(|change| {
                tables
                    .units
                    .get(&change.unit)
                    .filter(|unit| unit.is_stable_good_at(max_mci))
                    .map(|unit| (unit.level, change))
            })
            .max_by_key(|(level, _)| *level)
            .map(|(_, change)| DefinitionChange {
                unit: change.unit.clone(),
                definition_chash: change.definition_chash.clone(),
                definition: tables.definitions.get(&change.definition_chash).cloned(),
            });
        Ok(latest)
    }

    async fn read_spendable_outputs(
        &mut self,
        addresses: &[Address],
        max_mci: u64,
    ) -> Result<Vec<SpendableOutput>, LedgerError> {
        self.check(QueryKind::SpendableOutputs)?;
        let tables = self.tables.read();
        Ok(tables
            .outputs
            .iter()
            .filter(|output| !output.is_spent && addresses.contains(&output.address))
            .filter(|output| {
                tables
                    .units
                    .get(&output.input.unit)
                    .is_some_and(|unit| unit.is_stable_good_at(max_mci))
            })
            .map(|output| SpendableOutput {
                input: output.input.clone(),
                address: output.address.clone(),
                amount: output.amount,
            })
            .collect())
    }

    async fn commit(mut self: Box<Self>) -> Result<(), LedgerError> {
        self.finished = true;
        if let Err(e) = self.check(QueryKind::Commit) {
            self.counters.rolled_back.fetch_add(1, Ordering::SeqCst);
            return Err(LedgerError::Commit(e.to_string()));
        }
        self.counters.committed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(mut self: Box<Self>) -> Result<(), LedgerError> {
        self.finished = true;
        self.counters.rolled_back.fetch_add(1, Ordering::SeqCst);
        self.check(QueryKind::Rollback)
            .map_err(|e| LedgerError::Rollback(e.to_string()))
    }
}

impl Drop for InMemoryTransaction {
    fn drop(&mut self) {
        if !self.finished {
            self.counters.rolled_back.fetch_add(1, Ordering::SeqCst);
        }
    }
}

fn payment_rows(payload: &Value) -> Result<(Vec<Input>, Vec<Output>), LedgerError> {
    let inputs = serde_json::from_value(payload["inputs"].clone())
        .map_err(|e| LedgerError::Save(format!("bad payment inputs: {e}")))?;
    let outputs = serde_json::from_value(payload["outputs"].clone())
        .map_err(|e| LedgerError::Save(format!("bad payment outputs: {e}")))?;
    Ok((inputs, outputs))
}

#[async_trait]
impl JointStore for InMemoryLedger {
    async fn save_joint(&self, joint: &Joint) -> Result<(), LedgerError> {
        Self::check_fault(&self.faults, QueryKind::Save)?;
        let unit = &joint.unit;
        let id = joint
            .unit_hash()
            .ok_or_else(|| LedgerError::Save("joint has no unit hash".into()))?
            .to_string();

        let mut tables = self.tables.write();
        if tables.units.contains_key(&id) {
            return Err(LedgerError::Save(format!("unit {id} already saved")));
        }

        let parents = unit.parent_units.clone().unwrap_or_default();
        let level = parents
            .iter()
            .filter_map(|p| tables.units.get(p).map(|u| u.level + 1))
            .max()
            .unwrap_or(0);

        let mut new_outputs = Vec::new();
        let mut spent = Vec::new();
        for (message_index, message) in unit.messages.iter().enumerate() {
            if message.app != apps::PAYMENT {
                continue;
            }
            let (inputs, outputs) = payment_rows(&message.payload)?;
            spent.extend(inputs);
            for (output_index, output) in outputs.into_iter().enumerate() {
                new_outputs.push(OutputRecord {
                    input: Input {
                        unit: id.clone(),
                        message_index: message_index as u32,
                        output_index: output_index as u32,
                    },
                    address: output.address,
                    amount: output.amount,
                    is_spent: false,
                });
            }
        }

        for record in tables.outputs.iter_mut() {
            if spent.contains(&record.input) {
                record.is_spent = true;
            }
        }
        tables.outputs.extend(new_outputs);

        let authors = unit
            .authors
            .iter()
            .map(|author| UnitAuthor {
                address: author.address.clone(),
                discloses_definition: author.definition.is_some(),
            })
            .collect();
        tables.units.insert(
            id.clone(),
            UnitRecord {
                unit: id.clone(),
                mci: None,
                is_stable: false,
                sequence: Sequence::Good,
                level,
                authors,
            },
        );
        for parent in &parents {
            tables.free_units.remove(parent);
        }
        tables.free_units.insert(id.clone());
        self.counters.saved.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(unit = %id, level, "[composer] Joint saved");
        Ok(())
    }
}
