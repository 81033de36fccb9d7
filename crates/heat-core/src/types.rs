//! Closed enumerations for the competition domain.
//!
//! Every tag that the original data model stored as a free-form string
//! (exercise type, competitor category, lane type, statuses, action kinds)
//! is a closed enum here. Wire names match the stored document fields, so
//! rule tables referencing an unknown tag fail at parse time rather than
//! silently matching nothing.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::HeatError;

// ---------------------------------------------------------------------------
// ExerciseType
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExerciseType {
    Bench,
    Kettle,
    Airbike,
    Rowing,
}

impl ExerciseType {
    pub fn all() -> &'static [ExerciseType] {
        &[
            ExerciseType::Bench,
            ExerciseType::Kettle,
            ExerciseType::Airbike,
            ExerciseType::Rowing,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ExerciseType::Bench => "bench",
            ExerciseType::Kettle => "kettle",
            ExerciseType::Airbike => "airbike",
            ExerciseType::Rowing => "rowing",
        }
    }
}

impl fmt::Display for ExerciseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ExerciseType {
    type Err = HeatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bench" => Ok(ExerciseType::Bench),
            "kettle" => Ok(ExerciseType::Kettle),
            "airbike" => Ok(ExerciseType::Airbike),
            "rowing" => Ok(ExerciseType::Rowing),
            _ => Err(HeatError::InvalidExerciseType(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// ExerciseStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExerciseStatus {
    Planned,
    Ongoing,
    Finished,
}

impl ExerciseStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ExerciseStatus::Planned => "planned",
            ExerciseStatus::Ongoing => "ongoing",
            ExerciseStatus::Finished => "finished",
        }
    }
}

impl fmt::Display for ExerciseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ExerciseStatus {
    type Err = HeatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "planned" => Ok(ExerciseStatus::Planned),
            "ongoing" => Ok(ExerciseStatus::Ongoing),
            "finished" => Ok(ExerciseStatus::Finished),
            _ => Err(HeatError::InvalidExerciseStatus(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Category
// ---------------------------------------------------------------------------

/// Competitor category. Wire names follow the federation's short codes
/// ("n2.2", "h1", ...), which are not identifier-safe, hence the explicit
/// renames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "w1")]
    W1,
    #[serde(rename = "n2.2")]
    N22,
    #[serde(rename = "n2")]
    N2,
    #[serde(rename = "n1.1")]
    N11,
    #[serde(rename = "w0")]
    W0,
    #[serde(rename = "r1")]
    R1,
    #[serde(rename = "r2")]
    R2,
    #[serde(rename = "n1")]
    N1,
    #[serde(rename = "s1")]
    S1,
    #[serde(rename = "n0")]
    N0,
    #[serde(rename = "r0")]
    R0,
    #[serde(rename = "h2")]
    H2,
    #[serde(rename = "h1")]
    H1,
}

impl Category {
    pub fn all() -> &'static [Category] {
        &[
            Category::W1,
            Category::N22,
            Category::N2,
            Category::N11,
            Category::W0,
            Category::R1,
            Category::R2,
            Category::N1,
            Category::S1,
            Category::N0,
            Category::R0,
            Category::H2,
            Category::H1,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Category::W1 => "w1",
            Category::N22 => "n2.2",
            Category::N2 => "n2",
            Category::N11 => "n1.1",
            Category::W0 => "w0",
            Category::R1 => "r1",
            Category::R2 => "r2",
            Category::N1 => "n1",
            Category::S1 => "s1",
            Category::N0 => "n0",
            Category::R0 => "r0",
            Category::H2 => "h2",
            Category::H1 => "h1",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Category {
    type Err = HeatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::all()
            .iter()
            .find(|c| c.as_str() == s)
            .copied()
            .ok_or_else(|| HeatError::InvalidCategory(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// LaneType
// ---------------------------------------------------------------------------

/// Compatibility key for a lane's "now" slot. The set spans all exercise
/// types; which subset is valid for a given exercise is defined by the
/// rule tables, not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LaneType {
    // Bench press
    Paralympic,
    Kettle,
    DefaultBench,
    // Kettlebell jerk
    Bench,
    Jerk,
    DefaultKettle,
    // Air bike
    Chair,
    TwoLegs,
    OneLeg,
    OneHand,
    DefaultAirbike,
    // Rowing / ski erg
    SkiErg,
    Handle,
    DefaultRowing,
}

impl LaneType {
    pub fn all() -> &'static [LaneType] {
        &[
            LaneType::Paralympic,
            LaneType::Kettle,
            LaneType::DefaultBench,
            LaneType::Bench,
            LaneType::Jerk,
            LaneType::DefaultKettle,
            LaneType::Chair,
            LaneType::TwoLegs,
            LaneType::OneLeg,
            LaneType::OneHand,
            LaneType::DefaultAirbike,
            LaneType::SkiErg,
            LaneType::Handle,
            LaneType::DefaultRowing,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LaneType::Paralympic => "paralympic",
            LaneType::Kettle => "kettle",
            LaneType::DefaultBench => "defaultBench",
            LaneType::Bench => "bench",
            LaneType::Jerk => "jerk",
            LaneType::DefaultKettle => "defaultKettle",
            LaneType::Chair => "chair",
            LaneType::TwoLegs => "twoLegs",
            LaneType::OneLeg => "oneLeg",
            LaneType::OneHand => "oneHand",
            LaneType::DefaultAirbike => "defaultAirbike",
            LaneType::SkiErg => "skiErg",
            LaneType::Handle => "handle",
            LaneType::DefaultRowing => "defaultRowing",
        }
    }
}

impl fmt::Display for LaneType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LaneType {
    type Err = HeatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LaneType::all()
            .iter()
            .find(|t| t.as_str() == s)
            .copied()
            .ok_or_else(|| HeatError::InvalidLaneType(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// CompetitorStatus
// ---------------------------------------------------------------------------

/// Where a competitor currently is. Must stay consistent with lane slot
/// references: `Lane`/`Ready` imply exactly one lane points at them,
/// `Waiting`/`Done` imply none does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompetitorStatus {
    Waiting,
    Lane,
    Ready,
    Done,
}

impl CompetitorStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CompetitorStatus::Waiting => "waiting",
            CompetitorStatus::Lane => "lane",
            CompetitorStatus::Ready => "ready",
            CompetitorStatus::Done => "done",
        }
    }
}

impl fmt::Display for CompetitorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CompetitorStatus {
    type Err = HeatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waiting" => Ok(CompetitorStatus::Waiting),
            "lane" => Ok(CompetitorStatus::Lane),
            "ready" => Ok(CompetitorStatus::Ready),
            "done" => Ok(CompetitorStatus::Done),
            _ => Err(HeatError::InvalidCompetitorStatus(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// ActionKind
// ---------------------------------------------------------------------------

/// The six journaled engine operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionKind {
    Autofill,
    NextRound,
    RemoveCompetitor,
    ClearLane,
    FillLane,
    ReturnDone,
}

impl ActionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::Autofill => "autofill",
            ActionKind::NextRound => "nextRound",
            ActionKind::RemoveCompetitor => "removeCompetitor",
            ActionKind::ClearLane => "clearLane",
            ActionKind::FillLane => "fillLane",
            ActionKind::ReturnDone => "returnDone",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Slot
// ---------------------------------------------------------------------------

/// Which of a lane's two positions a placement targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Slot {
    Now,
    ReadyUp,
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Slot::Now => "now",
            Slot::ReadyUp => "readyUp",
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
