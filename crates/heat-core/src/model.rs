//! Stored records: exercise, competitor, lane.
//!
//! `Lane` embeds a denormalized competitor snapshot (`SlotEntry`) per slot
//! rather than a reference. The copy is only refreshed when a competitor is
//! (re)placed, so it can drift from the authoritative competitor record
//! between writes; the competitor record always wins.

use serde::{Deserialize, Serialize};

use crate::types::{Category, CompetitorStatus, ExerciseStatus, ExerciseType, LaneType};

// ---------------------------------------------------------------------------
// Exercise
// ---------------------------------------------------------------------------

/// The singleton competition-exercise record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exercise {
    pub name: String,
    pub status: ExerciseStatus,
    #[serde(rename = "type")]
    pub exercise_type: ExerciseType,
}

impl Exercise {
    pub fn new(name: impl Into<String>, exercise_type: ExerciseType) -> Self {
        Self {
            name: name.into(),
            status: ExerciseStatus::Planned,
            exercise_type,
        }
    }
}

// ---------------------------------------------------------------------------
// Competitor
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Competitor {
    pub id: String,
    pub name: String,
    pub category: Category,
    pub status: CompetitorStatus,
    /// FIFO position while waiting; reassigned only by explicit reordering.
    pub order_rank: i64,
    /// Completion instant in epoch milliseconds; set whenever the
    /// competitor transitions to `Done`, read for most-recent-first display.
    #[serde(default)]
    pub done_order: Option<i64>,
}

impl Competitor {
    /// The denormalized snapshot embedded into lane slots.
    pub fn slot_entry(&self) -> SlotEntry {
        SlotEntry {
            id: self.id.clone(),
            name: self.name.clone(),
            category: self.category,
        }
    }
}

// ---------------------------------------------------------------------------
// Lane
// ---------------------------------------------------------------------------

/// Competitor snapshot held by a lane slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotEntry {
    pub id: String,
    pub name: String,
    pub category: Category,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lane {
    pub id: u32,
    pub lane_type: Option<LaneType>,
    /// Staged retype: takes effect at the next round boundary and governs
    /// ready-up compatibility until then.
    #[serde(default)]
    pub next_lane_type: Option<LaneType>,
    /// The "now" slot.
    pub competitor: Option<SlotEntry>,
    /// The on-deck slot. Non-empty only while `competitor` is occupied.
    pub ready_up: Option<SlotEntry>,
    pub locked: bool,
}

impl Lane {
    pub fn new(id: u32, lane_type: Option<LaneType>) -> Self {
        Self {
            id,
            lane_type,
            next_lane_type: None,
            competitor: None,
            ready_up: None,
            locked: false,
        }
    }

    /// Lane type governing the ready-up slot: the staged retype if one is
    /// pending, else the current type.
    pub fn effective_type(&self) -> Option<LaneType> {
        self.next_lane_type.or(self.lane_type)
    }

    pub fn is_empty(&self) -> bool {
        self.competitor.is_none() && self.ready_up.is_none()
    }

    /// True if a staged retype would change the lane's type at the next
    /// round boundary.
    pub fn has_pending_retype(&self) -> bool {
        match self.next_lane_type {
            Some(next) => self.lane_type != Some(next),
            None => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
