//! Category compatibility rules.
//!
//! One table per exercise type: lane type → priority-ordered list of
//! competitor categories allowed on that lane. The ordering is load-bearing:
//! bulk auto-fill satisfies earlier categories first for a given lane type.
//! Each exercise also carries the lane-type cycle used to assign types to
//! newly created lanes.
//!
//! The built-in tables reproduce the production rules. A YAML override can
//! replace them; the file is validated at load time and rejected if it
//! references unknown tags, duplicates a lane type, or leaves a cycle entry
//! without a rule.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{HeatError, Result};
use crate::types::{Category, ExerciseType, LaneType};

use Category::*;
use LaneType as Lt;

// ---------------------------------------------------------------------------
// RuleSet
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct ExerciseRules {
    /// Lane-type cycle for lane creation, in display order.
    cycle: Vec<LaneType>,
    /// Allowed categories per lane type, in priority order. The outer Vec
    /// preserves the table's declaration order.
    allowed: Vec<(LaneType, Vec<Category>)>,
}

/// Pure, total compatibility lookup. No state beyond the tables.
#[derive(Debug, Clone)]
pub struct RuleSet {
    exercises: BTreeMap<ExerciseType, ExerciseRules>,
}

impl Default for RuleSet {
    fn default() -> Self {
        RuleSet::builtin()
    }
}

impl RuleSet {
    /// The production tables.
    pub fn builtin() -> Self {
        let mut exercises = BTreeMap::new();

        exercises.insert(
            ExerciseType::Bench,
            ExerciseRules {
                cycle: vec![Lt::Paralympic, Lt::Kettle, Lt::DefaultBench],
                allowed: vec![
                    (Lt::Paralympic, vec![W1, N22, N2, N11, W0]),
                    (Lt::Kettle, vec![R1, R2]),
                    (Lt::DefaultBench, vec![N1, S1, N0, R0, H2, H1]),
                ],
            },
        );

        exercises.insert(
            ExerciseType::Kettle,
            ExerciseRules {
                cycle: vec![Lt::Bench, Lt::Jerk],
                allowed: vec![
                    (Lt::Bench, vec![W1, N22, N2, N11, W0]),
                    (Lt::Jerk, vec![N1, R1, R2, S1, N0, R0, H2, H1]),
                ],
            },
        );

        exercises.insert(
            ExerciseType::Airbike,
            ExerciseRules {
                cycle: vec![
                    Lt::Chair,
                    Lt::TwoLegs,
                    Lt::OneLeg,
                    Lt::OneHand,
                    Lt::DefaultAirbike,
                ],
                allowed: vec![
                    (Lt::Chair, vec![W1, N22]),
                    (Lt::TwoLegs, vec![N2, W0]),
                    (Lt::OneLeg, vec![N11]),
                    (Lt::OneHand, vec![R1, R2]),
                    (Lt::DefaultAirbike, vec![N1, S1, N0, R0, H2, H1]),
                ],
            },
        );

        exercises.insert(
            ExerciseType::Rowing,
            ExerciseRules {
                cycle: vec![Lt::SkiErg, Lt::Handle, Lt::Chair, Lt::DefaultRowing],
                allowed: vec![
                    (Lt::SkiErg, vec![W1, N22, W0]),
                    (Lt::Handle, vec![R1, R2]),
                    (Lt::Chair, vec![N2]),
                    (Lt::DefaultRowing, vec![N11, N1, S1, N0, R0, H2, H1]),
                ],
            },
        );

        RuleSet { exercises }
    }

    /// Load an override table from YAML, falling back to the built-in
    /// rules if the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(RuleSet::builtin());
        }
        let data = std::fs::read_to_string(path)?;
        RuleSet::from_yaml(&data)
    }

    pub fn from_yaml(data: &str) -> Result<Self> {
        let raw: BTreeMap<ExerciseType, RawExercise> = serde_yaml::from_str(data)?;
        let mut exercises = BTreeMap::new();
        for (exercise, raw) in raw {
            exercises.insert(exercise, raw.validate(exercise)?);
        }
        Ok(RuleSet { exercises })
    }

    /// Allowed categories for a lane's "now" slot, in auto-fill priority
    /// order. Empty if the lane type has no rule for this exercise.
    pub fn allowed_categories(&self, exercise: ExerciseType, lane_type: LaneType) -> &[Category] {
        self.exercises
            .get(&exercise)
            .and_then(|e| {
                e.allowed
                    .iter()
                    .find(|(lt, _)| *lt == lane_type)
                    .map(|(_, cats)| cats.as_slice())
            })
            .unwrap_or(&[])
    }

    pub fn is_allowed(
        &self,
        exercise: ExerciseType,
        lane_type: LaneType,
        category: Category,
    ) -> bool {
        self.allowed_categories(exercise, lane_type)
            .contains(&category)
    }

    /// Lane types valid for this exercise, in creation-cycle order.
    pub fn lane_type_cycle(&self, exercise: ExerciseType) -> &[LaneType] {
        self.exercises
            .get(&exercise)
            .map(|e| e.cycle.as_slice())
            .unwrap_or(&[])
    }

    /// Type for the `index`-th created lane: the cycle repeated.
    pub fn cycled_type(&self, exercise: ExerciseType, index: usize) -> Option<LaneType> {
        let cycle = self.lane_type_cycle(exercise);
        if cycle.is_empty() {
            None
        } else {
            Some(cycle[index % cycle.len()])
        }
    }
}

// ---------------------------------------------------------------------------
// YAML override format
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawExercise {
    cycle: Vec<LaneType>,
    lanes: Vec<RawLaneRule>,
}

#[derive(Debug, Deserialize)]
struct RawLaneRule {
    lane: LaneType,
    categories: Vec<Category>,
}

impl RawExercise {
    fn validate(self, exercise: ExerciseType) -> Result<ExerciseRules> {
        if self.cycle.is_empty() {
            return Err(HeatError::InvalidRules(format!(
                "{exercise}: empty lane-type cycle"
            )));
        }
        let mut allowed: Vec<(LaneType, Vec<Category>)> = Vec::with_capacity(self.lanes.len());
        for rule in self.lanes {
            if rule.categories.is_empty() {
                return Err(HeatError::InvalidRules(format!(
                    "{exercise}/{}: empty category list",
                    rule.lane
                )));
            }
            if allowed.iter().any(|(lt, _)| *lt == rule.lane) {
                return Err(HeatError::InvalidRules(format!(
                    "{exercise}/{}: duplicate lane type",
                    rule.lane
                )));
            }
            allowed.push((rule.lane, rule.categories));
        }
        for lt in &self.cycle {
            if !allowed.iter().any(|(rule_lt, _)| rule_lt == lt) {
                return Err(HeatError::InvalidRules(format!(
                    "{exercise}: cycle entry '{lt}' has no lane rule"
                )));
            }
        }
        Ok(ExerciseRules {
            cycle: self.cycle,
            allowed,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
