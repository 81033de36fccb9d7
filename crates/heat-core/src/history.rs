//! Journaled action records with reversible patch sets.
//!
//! Every mutating engine operation appends exactly one `ActionRecord`
//! alongside its writes, in the same transaction. Each record carries one
//! patch per mutated record — the pre- and post-image — so undoing never
//! needs to consult any other record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::SlotEntry;
use crate::types::{ActionKind, CompetitorStatus, LaneType};

// ---------------------------------------------------------------------------
// Patches
// ---------------------------------------------------------------------------

/// Snapshot of the mutable part of a lane. The type fields are included
/// so a round advance that applies a staged retype stays reversible.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaneSlots {
    pub competitor: Option<SlotEntry>,
    pub ready_up: Option<SlotEntry>,
    pub lane_type: Option<LaneType>,
    pub next_lane_type: Option<LaneType>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanePatch {
    pub lane_id: u32,
    pub before: LaneSlots,
    pub after: LaneSlots,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompetitorPatch {
    pub competitor_id: String,
    pub before_status: CompetitorStatus,
    pub after_status: CompetitorStatus,
}

// ---------------------------------------------------------------------------
// ActionRecord
// ---------------------------------------------------------------------------

/// One journal entry per engine operation.
///
/// `seq` is assigned by the store at commit time and is strictly monotonic
/// across commits; it is the only total order and selects "the most recent
/// action" for undo. `created_at` is display-only wall clock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRecord {
    pub id: Uuid,
    pub kind: ActionKind,
    pub seq: u64,
    pub created_at: DateTime<Utc>,
    pub lanes: Vec<LanePatch>,
    pub competitors: Vec<CompetitorPatch>,
    pub undone: bool,
    pub undone_at: Option<DateTime<Utc>>,
}

impl ActionRecord {
    pub fn new(
        kind: ActionKind,
        seq: u64,
        lanes: Vec<LanePatch>,
        competitors: Vec<CompetitorPatch>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            seq,
            created_at: Utc::now(),
            lanes,
            competitors,
            undone: false,
            undone_at: None,
        }
    }

    /// Total number of record patches in this entry.
    pub fn patch_count(&self) -> usize {
        self.lanes.len() + self.competitors.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
