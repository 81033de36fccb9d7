//! Persistent competition store backed by redb.
//!
//! # Table design
//!
//! One database file per competition exercise, five tables:
//!
//! - `exercise`: singleton JSON record under the key `"exercise"`.
//! - `competitors`: competitor id → JSON record.
//! - `lanes`: lane id (u32) → JSON record; key order is lane order.
//! - `actions`: 24-byte composite key → JSON `ActionRecord`:
//!   ```text
//!   [ seq: u64 big-endian (8 bytes) | uuid: 16 bytes ]
//!   ```
//!   The commit sequence occupies the high bytes, so byte ordering equals
//!   commit ordering and "the most recent entry" is a reverse scan.
//! - `meta`: the commit sequence counter, bumped inside the same write
//!   transaction that appends an action record.
//!
//! # Transaction contract
//!
//! `with_write` runs a closure against live tables inside one write
//! transaction and commits only if the closure returns `Ok`. redb allows a
//! single writer at a time, so reads made through `WriteCtx` are
//! authoritative: engine operations validate their preconditions against
//! them, never against a caller's earlier snapshot.

use std::path::Path;

use chrono::Utc;
use redb::{Database, ReadableTable, TableDefinition, WriteTransaction};
use uuid::Uuid;

use crate::error::{HeatError, Result};
use crate::history::{ActionRecord, CompetitorPatch, LanePatch};
use crate::model::{Competitor, Exercise, Lane};
use crate::rules::RuleSet;
use crate::types::{ActionKind, Category, CompetitorStatus, ExerciseStatus, ExerciseType, LaneType};

const EXERCISE: TableDefinition<&str, &[u8]> = TableDefinition::new("exercise");
const COMPETITORS: TableDefinition<&str, &[u8]> = TableDefinition::new("competitors");
const LANES: TableDefinition<u32, &[u8]> = TableDefinition::new("lanes");
const ACTIONS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("actions");
const META: TableDefinition<&str, u64> = TableDefinition::new("meta");

const SEQ_KEY: &str = "commit_seq";

// ---------------------------------------------------------------------------
// Error plumbing
// ---------------------------------------------------------------------------

macro_rules! storage_from {
    ($($ty:ty),+ $(,)?) => {
        $(impl From<$ty> for HeatError {
            fn from(e: $ty) -> Self {
                HeatError::Storage(e.to_string())
            }
        })+
    };
}

storage_from!(
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
);

// ---------------------------------------------------------------------------
// Key helpers
// ---------------------------------------------------------------------------

fn action_key(seq: u64, id: Uuid) -> [u8; 24] {
    let mut key = [0u8; 24];
    key[..8].copy_from_slice(&seq.to_be_bytes());
    key[8..].copy_from_slice(id.as_bytes());
    key
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Point-in-time projection of the whole competition, read in one
/// transaction. Good enough for display and for planning candidate lists;
/// never good enough for precondition checks (see module docs).
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub exercise: Exercise,
    /// Ascending lane id.
    pub lanes: Vec<Lane>,
    pub competitors: Vec<Competitor>,
}

impl Snapshot {
    /// Waiting competitors, FIFO by `order_rank`.
    pub fn waiting(&self) -> Vec<&Competitor> {
        let mut out: Vec<&Competitor> = self
            .competitors
            .iter()
            .filter(|c| c.status == CompetitorStatus::Waiting)
            .collect();
        out.sort_by_key(|c| c.order_rank);
        out
    }

    /// Done competitors, most recent first.
    pub fn done(&self) -> Vec<&Competitor> {
        let mut out: Vec<&Competitor> = self
            .competitors
            .iter()
            .filter(|c| c.status == CompetitorStatus::Done)
            .collect();
        out.sort_by_key(|c| std::cmp::Reverse(c.done_order.unwrap_or(0)));
        out
    }

    pub fn competitor(&self, id: &str) -> Option<&Competitor> {
        self.competitors.iter().find(|c| c.id == id)
    }

    pub fn lane(&self, id: u32) -> Option<&Lane> {
        self.lanes.iter().find(|l| l.id == id)
    }
}

// ---------------------------------------------------------------------------
// CompetitionDb
// ---------------------------------------------------------------------------

pub struct CompetitionDb {
    db: Database,
}

impl CompetitionDb {
    /// Open or create the database at `path`, ensuring all tables exist.
    pub fn open(path: &Path) -> Result<Self> {
        let db = Database::create(path)?;
        let txn = db.begin_write()?;
        txn.open_table(EXERCISE)?;
        txn.open_table(COMPETITORS)?;
        txn.open_table(LANES)?;
        txn.open_table(ACTIONS)?;
        txn.open_table(META)?;
        txn.commit()?;
        Ok(Self { db })
    }

    /// Run `f` inside one write transaction. Commits on `Ok`; any `Err`
    /// aborts the transaction wholesale, leaving no partial writes.
    pub fn with_write<T>(&self, f: impl FnOnce(&mut WriteCtx) -> Result<T>) -> Result<T> {
        let txn = self.db.begin_write()?;
        let out = {
            let mut ctx = WriteCtx { txn: &txn };
            f(&mut ctx)
        };
        match out {
            Ok(value) => {
                txn.commit()?;
                Ok(value)
            }
            Err(e) => Err(e), // dropping txn aborts
        }
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub fn snapshot(&self) -> Result<Snapshot> {
        let txn = self.db.begin_read()?;

        let exercise = {
            let table = txn.open_table(EXERCISE)?;
            let raw = table.get("exercise")?.ok_or(HeatError::ExerciseMissing)?;
            serde_json::from_slice(raw.value())?
        };

        let mut lanes = Vec::new();
        {
            let table = txn.open_table(LANES)?;
            for entry in table.iter()? {
                let (_, v) = entry?;
                lanes.push(serde_json::from_slice(v.value())?);
            }
        }

        let mut competitors = Vec::new();
        {
            let table = txn.open_table(COMPETITORS)?;
            for entry in table.iter()? {
                let (_, v) = entry?;
                competitors.push(serde_json::from_slice(v.value())?);
            }
        }

        Ok(Snapshot {
            exercise,
            lanes,
            competitors,
        })
    }

    pub fn exercise(&self) -> Result<Exercise> {
        Ok(self.snapshot()?.exercise)
    }

    pub fn lane(&self, id: u32) -> Result<Option<Lane>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(LANES)?;
        match table.get(id)? {
            Some(raw) => Ok(Some(serde_json::from_slice(raw.value())?)),
            None => Ok(None),
        }
    }

    pub fn competitor(&self, id: &str) -> Result<Option<Competitor>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(COMPETITORS)?;
        match table.get(id)? {
            Some(raw) => Ok(Some(serde_json::from_slice(raw.value())?)),
            None => Ok(None),
        }
    }

    /// All journal entries, newest first.
    pub fn list_actions(&self) -> Result<Vec<ActionRecord>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(ACTIONS)?;
        let mut out = Vec::new();
        for entry in table.iter()?.rev() {
            let (_, v) = entry?;
            out.push(serde_json::from_slice(v.value())?);
        }
        Ok(out)
    }

    // -----------------------------------------------------------------------
    // Record lifecycle (no journal entries; only the six engine actions
    // are journaled)
    // -----------------------------------------------------------------------

    /// Create the exercise record plus `lane_count` lanes with types
    /// cycled from the rule table.
    pub fn create_exercise(
        &self,
        name: &str,
        exercise_type: ExerciseType,
        lane_count: u32,
        rules: &RuleSet,
    ) -> Result<Exercise> {
        self.with_write(|ctx| {
            {
                let table = ctx.txn.open_table(EXERCISE)?;
                if table.get("exercise")?.is_some() {
                    return Err(HeatError::ExerciseExists);
                }
            }
            let exercise = Exercise::new(name, exercise_type);
            {
                let mut table = ctx.txn.open_table(EXERCISE)?;
                table.insert("exercise", serde_json::to_vec(&exercise)?.as_slice())?;
            }
            for i in 0..lane_count {
                let lane = Lane::new(i + 1, rules.cycled_type(exercise_type, i as usize));
                ctx.put_lane(&lane)?;
            }
            Ok(exercise)
        })
    }

    pub fn set_exercise_status(&self, status: ExerciseStatus) -> Result<Exercise> {
        self.with_write(|ctx| {
            let mut exercise = ctx.exercise()?;
            exercise.status = status;
            let mut table = ctx.txn.open_table(EXERCISE)?;
            table.insert("exercise", serde_json::to_vec(&exercise)?.as_slice())?;
            Ok(exercise)
        })
    }

    /// Add a waiting competitor at the back of the queue.
    pub fn add_competitor(&self, name: &str, category: Category) -> Result<Competitor> {
        self.with_write(|ctx| {
            let max_rank = ctx
                .all_competitors()?
                .iter()
                .map(|c| c.order_rank)
                .max()
                .unwrap_or(0);
            let competitor = Competitor {
                id: Uuid::new_v4().to_string(),
                name: name.to_string(),
                category,
                status: CompetitorStatus::Waiting,
                order_rank: max_rank + 1,
                done_order: None,
            };
            ctx.put_competitor(&competitor)?;
            Ok(competitor)
        })
    }

    /// Explicit queue reordering — the only way `order_rank` changes.
    pub fn set_order_rank(&self, id: &str, rank: i64) -> Result<Competitor> {
        self.with_write(|ctx| {
            let mut competitor = ctx
                .competitor(id)?
                .ok_or_else(|| HeatError::CompetitorNotFound(id.to_string()))?;
            competitor.order_rank = rank;
            ctx.put_competitor(&competitor)?;
            Ok(competitor)
        })
    }

    /// Add one lane at the next free id; type auto-cycled when not given.
    pub fn add_lane(&self, lane_type: Option<LaneType>, rules: &RuleSet) -> Result<Lane> {
        self.with_write(|ctx| {
            let exercise = ctx.exercise()?;
            let next_id = ctx.lanes()?.iter().map(|l| l.id).max().unwrap_or(0) + 1;
            let lane_type = lane_type
                .or_else(|| rules.cycled_type(exercise.exercise_type, (next_id - 1) as usize));
            let lane = Lane::new(next_id, lane_type);
            ctx.put_lane(&lane)?;
            Ok(lane)
        })
    }

    /// Immediate retype of the "now" compatibility key.
    pub fn set_lane_type(&self, id: u32, lane_type: LaneType) -> Result<Lane> {
        self.with_write(|ctx| {
            let mut lane = ctx.lane(id)?.ok_or(HeatError::LaneNotFound(id))?;
            lane.lane_type = Some(lane_type);
            ctx.put_lane(&lane)?;
            Ok(lane)
        })
    }

    /// Stage (or clear) a retype that takes effect at the next round
    /// boundary.
    pub fn stage_lane_type(&self, id: u32, next: Option<LaneType>) -> Result<Lane> {
        self.with_write(|ctx| {
            let mut lane = ctx.lane(id)?.ok_or(HeatError::LaneNotFound(id))?;
            lane.next_lane_type = next;
            ctx.put_lane(&lane)?;
            Ok(lane)
        })
    }

    pub fn set_locked(&self, id: u32, locked: bool) -> Result<Lane> {
        self.with_write(|ctx| {
            let mut lane = ctx.lane(id)?.ok_or(HeatError::LaneNotFound(id))?;
            lane.locked = locked;
            ctx.put_lane(&lane)?;
            Ok(lane)
        })
    }

    /// Delete a lane. Refused while either slot is occupied or the lane
    /// is locked.
    pub fn delete_lane(&self, id: u32) -> Result<()> {
        self.with_write(|ctx| {
            let lane = ctx.lane(id)?.ok_or(HeatError::LaneNotFound(id))?;
            if lane.locked {
                return Err(HeatError::LaneLocked(id));
            }
            if !lane.is_empty() {
                return Err(HeatError::LaneOccupied(id));
            }
            let mut table = ctx.txn.open_table(LANES)?;
            table.remove(id)?;
            Ok(())
        })
    }
}

// ---------------------------------------------------------------------------
// WriteCtx
// ---------------------------------------------------------------------------

/// Live view of the store inside one write transaction. Reads reflect all
/// writes already made through the same context.
pub struct WriteCtx<'a> {
    txn: &'a WriteTransaction,
}

impl WriteCtx<'_> {
    pub fn exercise(&self) -> Result<Exercise> {
        let table = self.txn.open_table(EXERCISE)?;
        let raw = table.get("exercise")?.ok_or(HeatError::ExerciseMissing)?;
        Ok(serde_json::from_slice(raw.value())?)
    }

    pub fn lane(&self, id: u32) -> Result<Option<Lane>> {
        let table = self.txn.open_table(LANES)?;
        let raw = table.get(id)?;
        match raw {
            Some(raw) => Ok(Some(serde_json::from_slice(raw.value())?)),
            None => Ok(None),
        }
    }

    /// All lanes, ascending id.
    pub fn lanes(&self) -> Result<Vec<Lane>> {
        let table = self.txn.open_table(LANES)?;
        let mut out = Vec::new();
        for entry in table.iter()? {
            let (_, v) = entry?;
            out.push(serde_json::from_slice(v.value())?);
        }
        Ok(out)
    }

    pub fn competitor(&self, id: &str) -> Result<Option<Competitor>> {
        let table = self.txn.open_table(COMPETITORS)?;
        let raw = table.get(id)?;
        match raw {
            Some(raw) => Ok(Some(serde_json::from_slice(raw.value())?)),
            None => Ok(None),
        }
    }

    pub fn all_competitors(&self) -> Result<Vec<Competitor>> {
        let table = self.txn.open_table(COMPETITORS)?;
        let mut out = Vec::new();
        for entry in table.iter()? {
            let (_, v) = entry?;
            out.push(serde_json::from_slice(v.value())?);
        }
        Ok(out)
    }

    /// Waiting competitors, FIFO by `order_rank`.
    pub fn waiting(&self) -> Result<Vec<Competitor>> {
        let mut out: Vec<Competitor> = self
            .all_competitors()?
            .into_iter()
            .filter(|c| c.status == CompetitorStatus::Waiting)
            .collect();
        out.sort_by_key(|c| c.order_rank);
        Ok(out)
    }

    pub fn put_lane(&mut self, lane: &Lane) -> Result<()> {
        let mut table = self.txn.open_table(LANES)?;
        table.insert(lane.id, serde_json::to_vec(lane)?.as_slice())?;
        Ok(())
    }

    pub fn put_competitor(&mut self, competitor: &Competitor) -> Result<()> {
        let mut table = self.txn.open_table(COMPETITORS)?;
        table.insert(competitor.id.as_str(), serde_json::to_vec(competitor)?.as_slice())?;
        Ok(())
    }

    /// Append a journal entry, assigning the next commit sequence number
    /// atomically with everything else written through this context.
    pub fn append_action(
        &mut self,
        kind: ActionKind,
        lanes: Vec<LanePatch>,
        competitors: Vec<CompetitorPatch>,
    ) -> Result<ActionRecord> {
        let seq = {
            let mut meta = self.txn.open_table(META)?;
            let next = meta.get(SEQ_KEY)?.map(|v| v.value()).unwrap_or(0) + 1;
            meta.insert(SEQ_KEY, next)?;
            next
        };
        let record = ActionRecord::new(kind, seq, lanes, competitors);
        let mut table = self.txn.open_table(ACTIONS)?;
        table.insert(
            action_key(record.seq, record.id).as_slice(),
            serde_json::to_vec(&record)?.as_slice(),
        )?;
        Ok(record)
    }

    /// Newest journal entry that has not been undone, if any.
    pub fn latest_active_action(&self) -> Result<Option<ActionRecord>> {
        let table = self.txn.open_table(ACTIONS)?;
        for entry in table.iter()?.rev() {
            let (_, v) = entry?;
            let record: ActionRecord = serde_json::from_slice(v.value())?;
            if !record.undone {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    /// Flip a journal entry to undone. The record keeps its key.
    pub fn mark_undone(&mut self, record: &mut ActionRecord) -> Result<()> {
        record.undone = true;
        record.undone_at = Some(Utc::now());
        let mut table = self.txn.open_table(ACTIONS)?;
        table.insert(
            action_key(record.seq, record.id).as_slice(),
            serde_json::to_vec(&*record)?.as_slice(),
        )?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
