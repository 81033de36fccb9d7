//! Lane assignment engine.
//!
//! All six operator actions live here: single fill, bulk auto-fill, round
//! advance (one lane or all), return-from-done, waiting-list removal, and
//! undo. Every mutating action writes its record changes and one journal
//! entry through a single `CompetitionDb::with_write` call, so the whole
//! operation commits or aborts as a unit.
//!
//! Candidate selection may run against a snapshot, but every precondition
//! (slot empty, type still compatible, record still present) is re-checked
//! against live in-transaction reads before anything is written. Losing
//! that re-check aborts the operation with a retryable `Conflict` — except
//! in `return_done_competitor`, where it advances to the next candidate.

use std::collections::{BTreeMap, VecDeque};

use chrono::Utc;

use crate::error::{HeatError, Result};
use crate::history::{ActionRecord, CompetitorPatch, LanePatch, LaneSlots};
use crate::model::{Competitor, Lane};
use crate::rules::RuleSet;
use crate::store::{CompetitionDb, WriteCtx};
use crate::types::{ActionKind, Category, CompetitorStatus, ExerciseType, LaneType, Slot};

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Stateless facade over the store and rule tables. Holds no view of the
/// competition between invocations.
pub struct Engine<'a> {
    db: &'a CompetitionDb,
    rules: &'a RuleSet,
}

/// Outcome of a single placement.
#[derive(Debug, Clone)]
pub struct Placement {
    pub lane_id: u32,
    pub slot: Slot,
    pub record: ActionRecord,
}

impl<'a> Engine<'a> {
    pub fn new(db: &'a CompetitionDb, rules: &'a RuleSet) -> Self {
        Self { db, rules }
    }

    // -----------------------------------------------------------------------
    // Single assignment
    // -----------------------------------------------------------------------

    /// Place one waiting competitor into the first compatible slot:
    /// empty "now" slots first (current lane type, ascending id), then
    /// empty ready-up slots (effective lane type, ascending id).
    pub fn fill_lane(&self, competitor_id: &str) -> Result<Placement> {
        let snap = self.db.snapshot()?;
        let exercise = snap.exercise.exercise_type;
        let competitor = snap
            .competitor(competitor_id)
            .ok_or_else(|| HeatError::CompetitorNotFound(competitor_id.to_string()))?;

        let target = self
            .now_candidates(exercise, &snap.lanes, competitor.category)
            .first()
            .map(|id| (*id, Slot::Now))
            .or_else(|| {
                self.ready_candidates(exercise, &snap.lanes, competitor.category)
                    .first()
                    .map(|id| (*id, Slot::ReadyUp))
            });

        let Some((lane_id, slot)) = target else {
            return Err(HeatError::NoCompatibleSlot(
                competitor.category.to_string(),
            ));
        };

        let record = self.db.with_write(|ctx| {
            self.place(ctx, competitor_id, lane_id, slot, ActionKind::FillLane)
        })?;
        Ok(Placement {
            lane_id,
            slot,
            record,
        })
    }

    // -----------------------------------------------------------------------
    // Bulk assignment
    // -----------------------------------------------------------------------

    /// Fill every compatible empty slot from the waiting queue in one
    /// atomic operation.
    ///
    /// Two passes over the lane set as it stood when the operation began:
    /// empty "now" slots grouped by current lane type, then empty ready-up
    /// slots on lanes that already had a competitor, grouped by effective
    /// type. Both passes consume one shared per-category FIFO pool, so a
    /// competitor placed in pass one is gone for pass two. Categories are
    /// served in the rule table's priority order; lanes in ascending id.
    pub fn auto_fill(&self) -> Result<ActionRecord> {
        self.db.with_write(|ctx| {
            let exercise = ctx.exercise()?.exercise_type;
            let lanes = ctx.lanes()?;
            let waiting = ctx.waiting()?;
            if waiting.is_empty() {
                return Err(HeatError::NothingToFill);
            }

            let mut pool = WaitingPool::new(waiting);
            let mut plans: Vec<(u32, Slot, Competitor)> = Vec::new();

            let now_groups = group_lanes(
                &lanes,
                |l| !l.locked && l.competitor.is_none(),
                |l| l.lane_type,
            );
            self.plan_pass(exercise, now_groups, Slot::Now, &mut pool, &mut plans);

            let ready_groups = group_lanes(
                &lanes,
                |l| !l.locked && l.competitor.is_some() && l.ready_up.is_none(),
                Lane::effective_type,
            );
            self.plan_pass(exercise, ready_groups, Slot::ReadyUp, &mut pool, &mut plans);

            if plans.is_empty() {
                return Err(HeatError::NothingToFill);
            }

            let mut lane_patches = Vec::with_capacity(plans.len());
            let mut competitor_patches = Vec::with_capacity(plans.len());
            for (lane_id, slot, mut competitor) in plans {
                let mut lane = lanes
                    .iter()
                    .find(|l| l.id == lane_id)
                    .cloned()
                    .ok_or(HeatError::LaneNotFound(lane_id))?;
                let before = lane_slots(&lane);
                let after_status = match slot {
                    Slot::Now => {
                        lane.competitor = Some(competitor.slot_entry());
                        CompetitorStatus::Lane
                    }
                    Slot::ReadyUp => {
                        lane.ready_up = Some(competitor.slot_entry());
                        CompetitorStatus::Ready
                    }
                };
                ctx.put_lane(&lane)?;
                lane_patches.push(LanePatch {
                    lane_id,
                    before,
                    after: lane_slots(&lane),
                });

                competitor_patches.push(CompetitorPatch {
                    competitor_id: competitor.id.clone(),
                    before_status: competitor.status,
                    after_status,
                });
                competitor.status = after_status;
                ctx.put_competitor(&competitor)?;
            }

            ctx.append_action(ActionKind::Autofill, lane_patches, competitor_patches)
        })
    }

    // -----------------------------------------------------------------------
    // Round advance
    // -----------------------------------------------------------------------

    /// Advance one lane: "now" retires to done, ready-up moves to "now",
    /// and a staged retype takes effect.
    pub fn clear_lane(&self, lane_id: u32) -> Result<ActionRecord> {
        self.db.with_write(|ctx| {
            let lane = ctx.lane(lane_id)?.ok_or(HeatError::LaneNotFound(lane_id))?;
            if lane.locked {
                return Err(HeatError::LaneLocked(lane_id));
            }
            if lane.is_empty() && !lane.has_pending_retype() {
                return Err(HeatError::NothingToUpdate);
            }
            let stamp = Utc::now().timestamp_millis();
            let (lane_patch, competitor_patches) = advance_lane(ctx, &lane, stamp)?;
            ctx.append_action(ActionKind::ClearLane, vec![lane_patch], competitor_patches)
        })
    }

    /// Advance every unlocked lane whose state is non-empty (occupied
    /// slot, or a staged retype waiting for the round boundary). Locked
    /// lanes are skipped; zero targets is "nothing to update".
    pub fn next_round(&self) -> Result<ActionRecord> {
        self.db.with_write(|ctx| {
            let targets: Vec<Lane> = ctx
                .lanes()?
                .into_iter()
                .filter(|l| !l.locked && (!l.is_empty() || l.has_pending_retype()))
                .collect();
            if targets.is_empty() {
                return Err(HeatError::NothingToUpdate);
            }

            let stamp = Utc::now().timestamp_millis();
            let mut lane_patches = Vec::with_capacity(targets.len());
            let mut competitor_patches = Vec::new();
            for lane in &targets {
                let (lane_patch, mut patches) = advance_lane(ctx, lane, stamp)?;
                lane_patches.push(lane_patch);
                competitor_patches.append(&mut patches);
            }
            ctx.append_action(ActionKind::NextRound, lane_patches, competitor_patches)
        })
    }

    // -----------------------------------------------------------------------
    // Return from done
    // -----------------------------------------------------------------------

    /// Re-insert a done competitor. Candidates are tried in order — empty
    /// "now" slots first, then empty ready-up slots — each as its own
    /// atomic attempt. An attempt that loses its live re-validation is
    /// dropped silently and the next candidate is tried; the operation
    /// fails only once every candidate is exhausted.
    pub fn return_done_competitor(&self, competitor_id: &str) -> Result<Placement> {
        let snap = self.db.snapshot()?;
        let exercise = snap.exercise.exercise_type;
        let competitor = snap
            .competitor(competitor_id)
            .ok_or_else(|| HeatError::CompetitorNotFound(competitor_id.to_string()))?;
        let category = competitor.category;

        let mut attempts: Vec<(u32, Slot)> = Vec::new();
        for id in self.now_candidates(exercise, &snap.lanes, category) {
            attempts.push((id, Slot::Now));
        }
        for id in self.ready_candidates(exercise, &snap.lanes, category) {
            attempts.push((id, Slot::ReadyUp));
        }

        for (lane_id, slot) in attempts {
            let outcome = self.db.with_write(|ctx| {
                self.place(ctx, competitor_id, lane_id, slot, ActionKind::ReturnDone)
            });
            match outcome {
                Ok(record) => {
                    return Ok(Placement {
                        lane_id,
                        slot,
                        record,
                    })
                }
                Err(e) if e.is_retryable() => continue,
                Err(e) => return Err(e),
            }
        }

        Err(HeatError::NoCompatibleSlot(category.to_string()))
    }

    // -----------------------------------------------------------------------
    // Removal
    // -----------------------------------------------------------------------

    /// Retire a competitor from the waiting list straight to done. One
    /// competitor patch, no lane patch.
    pub fn remove_competitor(&self, competitor_id: &str) -> Result<ActionRecord> {
        self.db.with_write(|ctx| {
            let mut competitor = ctx
                .competitor(competitor_id)?
                .ok_or_else(|| HeatError::CompetitorNotFound(competitor_id.to_string()))?;
            let patch = CompetitorPatch {
                competitor_id: competitor.id.clone(),
                before_status: competitor.status,
                after_status: CompetitorStatus::Done,
            };
            competitor.status = CompetitorStatus::Done;
            competitor.done_order = Some(Utc::now().timestamp_millis());
            ctx.put_competitor(&competitor)?;
            ctx.append_action(ActionKind::RemoveCompetitor, vec![], vec![patch])
        })
    }

    // -----------------------------------------------------------------------
    // Undo
    // -----------------------------------------------------------------------

    /// Reverse the most recent not-yet-undone action by restoring every
    /// patched record's pre-image, then mark the entry undone.
    ///
    /// Best-effort by design: the current state is NOT compared against the
    /// entry's `after` image first, so an edit made between the action and
    /// the undo is silently overwritten. One atomic transaction.
    pub fn undo_last_action(&self) -> Result<ActionRecord> {
        self.db.with_write(|ctx| {
            let mut record = ctx
                .latest_active_action()?
                .ok_or(HeatError::NothingToUndo)?;

            for patch in &record.lanes {
                let mut lane = ctx.lane(patch.lane_id)?.ok_or_else(|| {
                    HeatError::Conflict(format!("lane {} disappeared", patch.lane_id))
                })?;
                lane.competitor = patch.before.competitor.clone();
                lane.ready_up = patch.before.ready_up.clone();
                lane.lane_type = patch.before.lane_type;
                lane.next_lane_type = patch.before.next_lane_type;
                ctx.put_lane(&lane)?;
            }
            for patch in &record.competitors {
                let mut competitor = ctx.competitor(&patch.competitor_id)?.ok_or_else(|| {
                    HeatError::Conflict(format!(
                        "competitor '{}' disappeared",
                        patch.competitor_id
                    ))
                })?;
                competitor.status = patch.before_status;
                ctx.put_competitor(&competitor)?;
            }

            ctx.mark_undone(&mut record)?;
            Ok(record)
        })
    }

    // -----------------------------------------------------------------------
    // Candidate selection & placement
    // -----------------------------------------------------------------------

    /// Unlocked lanes with an empty "now" slot whose current type admits
    /// the category, ascending id.
    fn now_candidates(
        &self,
        exercise: ExerciseType,
        lanes: &[Lane],
        category: Category,
    ) -> Vec<u32> {
        lanes
            .iter()
            .filter(|l| {
                !l.locked
                    && l.competitor.is_none()
                    && l.lane_type
                        .is_some_and(|lt| self.rules.is_allowed(exercise, lt, category))
            })
            .map(|l| l.id)
            .collect()
    }

    /// Unlocked occupied lanes with an empty ready-up slot whose effective
    /// type admits the category, ascending id.
    fn ready_candidates(
        &self,
        exercise: ExerciseType,
        lanes: &[Lane],
        category: Category,
    ) -> Vec<u32> {
        lanes
            .iter()
            .filter(|l| {
                !l.locked
                    && l.competitor.is_some()
                    && l.ready_up.is_none()
                    && l.effective_type()
                        .is_some_and(|lt| self.rules.is_allowed(exercise, lt, category))
            })
            .map(|l| l.id)
            .collect()
    }

    /// One auto-fill pass: for each lane-type group, serve categories in
    /// priority order, pairing the oldest waiting competitor with the
    /// lowest-id remaining lane until lanes or the category pool run dry.
    fn plan_pass(
        &self,
        exercise: ExerciseType,
        groups: Vec<(LaneType, Vec<u32>)>,
        slot: Slot,
        pool: &mut WaitingPool,
        plans: &mut Vec<(u32, Slot, Competitor)>,
    ) {
        for (lane_type, lane_ids) in groups {
            let priority = self.rules.allowed_categories(exercise, lane_type);
            if priority.is_empty() {
                continue;
            }
            let mut queue: VecDeque<u32> = lane_ids.into();
            'categories: for &category in priority {
                loop {
                    let Some(&lane_id) = queue.front() else {
                        break 'categories;
                    };
                    let Some(competitor) = pool.pop(category) else {
                        break;
                    };
                    queue.pop_front();
                    plans.push((lane_id, slot, competitor));
                }
            }
        }
    }

    /// Write one placement inside the caller's transaction, re-validating
    /// every precondition against live reads first.
    fn place(
        &self,
        ctx: &mut WriteCtx,
        competitor_id: &str,
        lane_id: u32,
        slot: Slot,
        kind: ActionKind,
    ) -> Result<ActionRecord> {
        let exercise = ctx.exercise()?.exercise_type;
        let mut lane = ctx
            .lane(lane_id)?
            .ok_or_else(|| HeatError::Conflict(format!("lane {lane_id} disappeared")))?;
        let mut competitor = ctx.competitor(competitor_id)?.ok_or_else(|| {
            HeatError::Conflict(format!("competitor '{competitor_id}' disappeared"))
        })?;

        if lane.locked {
            return Err(HeatError::Conflict(format!("lane {lane_id} is now locked")));
        }
        match slot {
            Slot::Now => {
                if lane.competitor.is_some() {
                    return Err(HeatError::Conflict(format!(
                        "lane {lane_id} now slot already taken"
                    )));
                }
                let compatible = lane
                    .lane_type
                    .is_some_and(|lt| self.rules.is_allowed(exercise, lt, competitor.category));
                if !compatible {
                    return Err(HeatError::Conflict(format!(
                        "category '{}' no longer allowed on lane {lane_id}",
                        competitor.category
                    )));
                }
            }
            Slot::ReadyUp => {
                if lane.ready_up.is_some() {
                    return Err(HeatError::Conflict(format!(
                        "lane {lane_id} ready-up slot already taken"
                    )));
                }
                if lane.competitor.is_none() {
                    return Err(HeatError::Conflict(format!(
                        "lane {lane_id} has no competitor to queue behind"
                    )));
                }
                let compatible = lane
                    .effective_type()
                    .is_some_and(|lt| self.rules.is_allowed(exercise, lt, competitor.category));
                if !compatible {
                    return Err(HeatError::Conflict(format!(
                        "category '{}' no longer allowed on lane {lane_id} ready-up",
                        competitor.category
                    )));
                }
            }
        }

        let before = lane_slots(&lane);
        let after_status = match slot {
            Slot::Now => {
                lane.competitor = Some(competitor.slot_entry());
                CompetitorStatus::Lane
            }
            Slot::ReadyUp => {
                lane.ready_up = Some(competitor.slot_entry());
                CompetitorStatus::Ready
            }
        };
        ctx.put_lane(&lane)?;

        let competitor_patch = CompetitorPatch {
            competitor_id: competitor.id.clone(),
            before_status: competitor.status,
            after_status,
        };
        competitor.status = after_status;
        ctx.put_competitor(&competitor)?;

        ctx.append_action(
            kind,
            vec![LanePatch {
                lane_id,
                before,
                after: lane_slots(&lane),
            }],
            vec![competitor_patch],
        )
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn lane_slots(lane: &Lane) -> LaneSlots {
    LaneSlots {
        competitor: lane.competitor.clone(),
        ready_up: lane.ready_up.clone(),
        lane_type: lane.lane_type,
        next_lane_type: lane.next_lane_type,
    }
}

/// Advance one lane inside the caller's transaction: "now" to done,
/// ready-up to "now", staged retype applied. Returns the lane patch and
/// the affected competitors' patches.
fn advance_lane(
    ctx: &mut WriteCtx,
    lane: &Lane,
    done_stamp: i64,
) -> Result<(LanePatch, Vec<CompetitorPatch>)> {
    let before = lane_slots(lane);
    let mut competitor_patches = Vec::new();

    if let Some(entry) = &lane.competitor {
        let mut competitor = ctx.competitor(&entry.id)?.ok_or_else(|| {
            HeatError::Conflict(format!("competitor '{}' disappeared", entry.id))
        })?;
        competitor_patches.push(CompetitorPatch {
            competitor_id: competitor.id.clone(),
            before_status: competitor.status,
            after_status: CompetitorStatus::Done,
        });
        competitor.status = CompetitorStatus::Done;
        competitor.done_order = Some(done_stamp);
        ctx.put_competitor(&competitor)?;
    }

    if let Some(entry) = &lane.ready_up {
        let mut competitor = ctx.competitor(&entry.id)?.ok_or_else(|| {
            HeatError::Conflict(format!("competitor '{}' disappeared", entry.id))
        })?;
        competitor_patches.push(CompetitorPatch {
            competitor_id: competitor.id.clone(),
            before_status: competitor.status,
            after_status: CompetitorStatus::Lane,
        });
        competitor.status = CompetitorStatus::Lane;
        ctx.put_competitor(&competitor)?;
    }

    let mut updated = lane.clone();
    updated.competitor = lane.ready_up.clone();
    updated.ready_up = None;
    if lane.has_pending_retype() {
        updated.lane_type = lane.next_lane_type;
        updated.next_lane_type = None;
    }
    ctx.put_lane(&updated)?;

    Ok((
        LanePatch {
            lane_id: lane.id,
            before,
            after: lane_slots(&updated),
        },
        competitor_patches,
    ))
}

/// Shared per-category FIFO pool over the waiting queue. Both auto-fill
/// passes draw from the same pool.
struct WaitingPool {
    by_category: BTreeMap<Category, VecDeque<Competitor>>,
}

impl WaitingPool {
    /// `waiting` must already be in FIFO (`order_rank`) order.
    fn new(waiting: Vec<Competitor>) -> Self {
        let mut by_category: BTreeMap<Category, VecDeque<Competitor>> = BTreeMap::new();
        for competitor in waiting {
            by_category
                .entry(competitor.category)
                .or_default()
                .push_back(competitor);
        }
        Self { by_category }
    }

    fn pop(&mut self, category: Category) -> Option<Competitor> {
        self.by_category.get_mut(&category)?.pop_front()
    }
}

/// Group lanes by a type key, preserving first-occurrence order of the
/// groups and ascending lane id within each (lanes arrive ascending).
fn group_lanes(
    lanes: &[Lane],
    pred: impl Fn(&Lane) -> bool,
    key: impl Fn(&Lane) -> Option<LaneType>,
) -> Vec<(LaneType, Vec<u32>)> {
    let mut groups: Vec<(LaneType, Vec<u32>)> = Vec::new();
    for lane in lanes {
        if !pred(lane) {
            continue;
        }
        let Some(k) = key(lane) else { continue };
        match groups.iter_mut().find(|(g, _)| *g == k) {
            Some((_, ids)) => ids.push(lane.id),
            None => groups.push((k, vec![lane.id])),
        }
    }
    groups
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup(
        exercise: ExerciseType,
        lane_types: &[LaneType],
    ) -> (TempDir, CompetitionDb, RuleSet) {
        let dir = TempDir::new().unwrap();
        let db = CompetitionDb::open(&dir.path().join("test.redb")).unwrap();
        let rules = RuleSet::builtin();
        db.create_exercise("test", exercise, 0, &rules).unwrap();
        for lt in lane_types {
            db.add_lane(Some(*lt), &rules).unwrap();
        }
        (dir, db, rules)
    }

    fn add(db: &CompetitionDb, name: &str, category: Category) -> String {
        db.add_competitor(name, category).unwrap().id
    }

    fn status_of(db: &CompetitionDb, id: &str) -> CompetitorStatus {
        db.competitor(id).unwrap().unwrap().status
    }

    // -- single fill --------------------------------------------------------

    #[test]
    fn fill_assigns_now_slot() {
        let (_dir, db, rules) = setup(ExerciseType::Bench, &[LaneType::DefaultBench]);
        let c1 = add(&db, "Ada", Category::H1);

        let engine = Engine::new(&db, &rules);
        let placement = engine.fill_lane(&c1).unwrap();
        assert_eq!(placement.lane_id, 1);
        assert_eq!(placement.slot, Slot::Now);

        let lane = db.lane(1).unwrap().unwrap();
        assert_eq!(lane.competitor.as_ref().unwrap().id, c1);
        assert_eq!(status_of(&db, &c1), CompetitorStatus::Lane);
        assert_eq!(placement.record.kind, ActionKind::FillLane);
        assert_eq!(placement.record.patch_count(), 2);
    }

    #[test]
    fn fill_prefers_lowest_id_now_slot() {
        let (_dir, db, rules) = setup(
            ExerciseType::Bench,
            &[LaneType::Kettle, LaneType::DefaultBench, LaneType::DefaultBench],
        );
        let c1 = add(&db, "Ada", Category::H1);

        let engine = Engine::new(&db, &rules);
        // Lane 1 is kettle (h1 not allowed); lane 2 is the first match.
        assert_eq!(engine.fill_lane(&c1).unwrap().lane_id, 2);
    }

    #[test]
    fn fill_falls_back_to_ready_up() {
        let (_dir, db, rules) = setup(ExerciseType::Bench, &[LaneType::DefaultBench]);
        let c1 = add(&db, "Ada", Category::H1);
        let c2 = add(&db, "Bo", Category::H2);

        let engine = Engine::new(&db, &rules);
        engine.fill_lane(&c1).unwrap();
        let placement = engine.fill_lane(&c2).unwrap();
        assert_eq!(placement.slot, Slot::ReadyUp);

        let lane = db.lane(1).unwrap().unwrap();
        assert_eq!(lane.ready_up.as_ref().unwrap().id, c2);
        assert_eq!(status_of(&db, &c2), CompetitorStatus::Ready);
    }

    #[test]
    fn fill_skips_locked_lanes() {
        let (_dir, db, rules) = setup(
            ExerciseType::Bench,
            &[LaneType::DefaultBench, LaneType::DefaultBench],
        );
        db.set_locked(1, true).unwrap();
        let c1 = add(&db, "Ada", Category::H1);

        let engine = Engine::new(&db, &rules);
        assert_eq!(engine.fill_lane(&c1).unwrap().lane_id, 2);
    }

    #[test]
    fn fill_without_compatible_slot_writes_nothing() {
        let (_dir, db, rules) = setup(ExerciseType::Bench, &[LaneType::Kettle]);
        let c1 = add(&db, "Ada", Category::H1);

        let engine = Engine::new(&db, &rules);
        assert!(matches!(
            engine.fill_lane(&c1),
            Err(HeatError::NoCompatibleSlot(_))
        ));
        assert_eq!(status_of(&db, &c1), CompetitorStatus::Waiting);
        assert!(db.lane(1).unwrap().unwrap().is_empty());
        assert!(db.list_actions().unwrap().is_empty());
    }

    #[test]
    fn ready_up_compatibility_uses_staged_type_exact_match() {
        // Lane is kettle with a staged retype to "bench". Category h1 is
        // allowed on defaultBench but not on the "bench" paralympic lane,
        // so the effective-type lookup must miss: exact key, no aliasing.
        let (_dir, db, rules) = setup(ExerciseType::Bench, &[LaneType::Kettle]);
        let r1 = add(&db, "Rea", Category::R1);
        let engine = Engine::new(&db, &rules);
        engine.fill_lane(&r1).unwrap();

        db.stage_lane_type(1, Some(LaneType::Bench)).unwrap();
        let h1 = add(&db, "Ada", Category::H1);
        assert!(matches!(
            engine.fill_lane(&h1),
            Err(HeatError::NoCompatibleSlot(_))
        ));

        // A category the staged type does admit gets the ready-up slot.
        let w1 = add(&db, "Wil", Category::W1);
        let placement = engine.fill_lane(&w1).unwrap();
        assert_eq!(placement.slot, Slot::ReadyUp);
    }

    // -- auto-fill ----------------------------------------------------------

    #[test]
    fn auto_fill_is_fifo_within_category() {
        let (_dir, db, rules) = setup(
            ExerciseType::Bench,
            &[LaneType::DefaultBench, LaneType::DefaultBench],
        );
        let c1 = add(&db, "First", Category::H1);
        let c2 = add(&db, "Second", Category::H1);

        let engine = Engine::new(&db, &rules);
        engine.auto_fill().unwrap();

        assert_eq!(db.lane(1).unwrap().unwrap().competitor.unwrap().id, c1);
        assert_eq!(db.lane(2).unwrap().unwrap().competitor.unwrap().id, c2);
    }

    #[test]
    fn auto_fill_serves_priority_categories_first() {
        // Paralympic priority list starts [w1, n2.2, n2, ...]; a w1 waiter
        // takes the first lane even if an n2 signed up earlier.
        let (_dir, db, rules) = setup(
            ExerciseType::Bench,
            &[LaneType::Paralympic, LaneType::Paralympic],
        );
        let n2 = add(&db, "Nia", Category::N2);
        let w1 = add(&db, "Wil", Category::W1);

        let engine = Engine::new(&db, &rules);
        engine.auto_fill().unwrap();

        assert_eq!(db.lane(1).unwrap().unwrap().competitor.unwrap().id, w1);
        assert_eq!(db.lane(2).unwrap().unwrap().competitor.unwrap().id, n2);
    }

    #[test]
    fn auto_fill_fills_ready_up_of_previously_occupied_lanes_only() {
        let (_dir, db, rules) = setup(ExerciseType::Bench, &[LaneType::DefaultBench]);
        let engine = Engine::new(&db, &rules);

        let c1 = add(&db, "Ada", Category::H1);
        let c2 = add(&db, "Bo", Category::H1);

        // Lane was empty when the operation began: pass one fills "now",
        // but the lane is not a ready-up target in the same operation.
        engine.auto_fill().unwrap();
        assert_eq!(status_of(&db, &c1), CompetitorStatus::Lane);
        assert_eq!(status_of(&db, &c2), CompetitorStatus::Waiting);

        // Next auto-fill sees an occupied lane and queues c2 on deck.
        engine.auto_fill().unwrap();
        assert_eq!(status_of(&db, &c2), CompetitorStatus::Ready);
        assert_eq!(db.lane(1).unwrap().unwrap().ready_up.unwrap().id, c2);
    }

    #[test]
    fn auto_fill_ready_pass_uses_effective_type() {
        let (_dir, db, rules) = setup(ExerciseType::Kettle, &[LaneType::Jerk]);
        let engine = Engine::new(&db, &rules);

        let h1 = add(&db, "Hana", Category::H1);
        engine.fill_lane(&h1).unwrap();
        db.stage_lane_type(1, Some(LaneType::Bench)).unwrap();

        // h2 fits the current jerk type but not the staged bench type;
        // w0 fits the staged type only. The staged type governs ready-up.
        let h2 = add(&db, "Hugo", Category::H2);
        let w0 = add(&db, "Wen", Category::W0);
        engine.auto_fill().unwrap();

        assert_eq!(status_of(&db, &h2), CompetitorStatus::Waiting);
        assert_eq!(status_of(&db, &w0), CompetitorStatus::Ready);
    }

    #[test]
    fn auto_fill_commits_one_record_for_all_patches() {
        let (_dir, db, rules) = setup(
            ExerciseType::Bench,
            &[LaneType::DefaultBench, LaneType::DefaultBench],
        );
        add(&db, "Ada", Category::H1);
        add(&db, "Bo", Category::H2);

        let engine = Engine::new(&db, &rules);
        let record = engine.auto_fill().unwrap();
        assert_eq!(record.lanes.len(), 2);
        assert_eq!(record.competitors.len(), 2);

        let actions = db.list_actions().unwrap();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].kind, ActionKind::Autofill);
    }

    #[test]
    fn auto_fill_with_no_waiting_fails() {
        let (_dir, db, rules) = setup(ExerciseType::Bench, &[LaneType::DefaultBench]);
        let engine = Engine::new(&db, &rules);
        assert!(matches!(engine.auto_fill(), Err(HeatError::NothingToFill)));
    }

    #[test]
    fn auto_fill_with_only_incompatible_waiters_fails_cleanly() {
        let (_dir, db, rules) = setup(ExerciseType::Bench, &[LaneType::Kettle]);
        let c1 = add(&db, "Ada", Category::H1);

        let engine = Engine::new(&db, &rules);
        assert!(matches!(engine.auto_fill(), Err(HeatError::NothingToFill)));
        assert_eq!(status_of(&db, &c1), CompetitorStatus::Waiting);
        assert!(db.list_actions().unwrap().is_empty());
    }

    #[test]
    fn auto_fill_skips_locked_lanes() {
        let (_dir, db, rules) = setup(
            ExerciseType::Bench,
            &[LaneType::DefaultBench, LaneType::DefaultBench],
        );
        db.set_locked(1, true).unwrap();
        add(&db, "Ada", Category::H1);

        let engine = Engine::new(&db, &rules);
        engine.auto_fill().unwrap();
        assert!(db.lane(1).unwrap().unwrap().is_empty());
        assert!(db.lane(2).unwrap().unwrap().competitor.is_some());
    }

    // -- round advance ------------------------------------------------------

    #[test]
    fn clear_lane_retires_now_and_promotes_ready_up() {
        let (_dir, db, rules) = setup(ExerciseType::Bench, &[LaneType::DefaultBench]);
        let engine = Engine::new(&db, &rules);
        let c5 = add(&db, "Eve", Category::H1);
        let c6 = add(&db, "Fin", Category::H2);
        engine.fill_lane(&c5).unwrap();
        engine.fill_lane(&c6).unwrap();

        engine.clear_lane(1).unwrap();

        let lane = db.lane(1).unwrap().unwrap();
        assert_eq!(lane.competitor.as_ref().unwrap().id, c6);
        assert!(lane.ready_up.is_none());
        assert_eq!(status_of(&db, &c5), CompetitorStatus::Done);
        assert_eq!(status_of(&db, &c6), CompetitorStatus::Lane);
        assert!(db.competitor(&c5).unwrap().unwrap().done_order.is_some());
    }

    #[test]
    fn clear_lane_applies_staged_retype() {
        let (_dir, db, rules) = setup(ExerciseType::Kettle, &[LaneType::Jerk]);
        let engine = Engine::new(&db, &rules);
        let c1 = add(&db, "Ada", Category::H1);
        engine.fill_lane(&c1).unwrap();
        db.stage_lane_type(1, Some(LaneType::Bench)).unwrap();

        engine.clear_lane(1).unwrap();

        let lane = db.lane(1).unwrap().unwrap();
        assert_eq!(lane.lane_type, Some(LaneType::Bench));
        assert!(lane.next_lane_type.is_none());
    }

    #[test]
    fn clear_lane_rejects_locked_and_empty() {
        let (_dir, db, rules) = setup(ExerciseType::Bench, &[LaneType::DefaultBench]);
        let engine = Engine::new(&db, &rules);

        assert!(matches!(
            engine.clear_lane(1),
            Err(HeatError::NothingToUpdate)
        ));
        assert!(matches!(
            engine.clear_lane(9),
            Err(HeatError::LaneNotFound(9))
        ));

        db.set_locked(1, true).unwrap();
        assert!(matches!(engine.clear_lane(1), Err(HeatError::LaneLocked(1))));
    }

    #[test]
    fn next_round_advances_all_unlocked_lanes() {
        let (_dir, db, rules) = setup(
            ExerciseType::Bench,
            &[LaneType::DefaultBench, LaneType::DefaultBench, LaneType::DefaultBench],
        );
        let engine = Engine::new(&db, &rules);
        let c1 = add(&db, "Ada", Category::H1);
        let c2 = add(&db, "Bo", Category::H2);
        let c3 = add(&db, "Cy", Category::N1);
        engine.fill_lane(&c1).unwrap();
        engine.fill_lane(&c2).unwrap();
        engine.fill_lane(&c3).unwrap();
        db.set_locked(3, true).unwrap();

        let record = engine.next_round().unwrap();
        assert_eq!(record.kind, ActionKind::NextRound);
        // Two unlocked occupied lanes advanced; the locked one kept its
        // competitor.
        assert_eq!(record.lanes.len(), 2);
        assert_eq!(status_of(&db, &c1), CompetitorStatus::Done);
        assert_eq!(status_of(&db, &c2), CompetitorStatus::Done);
        assert_eq!(status_of(&db, &c3), CompetitorStatus::Lane);
        assert!(db.lane(3).unwrap().unwrap().competitor.is_some());
    }

    #[test]
    fn next_round_applies_staged_retype_on_idle_lane() {
        let (_dir, db, rules) = setup(
            ExerciseType::Bench,
            &[LaneType::DefaultBench, LaneType::Kettle],
        );
        let engine = Engine::new(&db, &rules);
        let c1 = add(&db, "Ada", Category::H1);
        engine.fill_lane(&c1).unwrap();
        db.stage_lane_type(2, Some(LaneType::Paralympic)).unwrap();

        engine.next_round().unwrap();

        let lane2 = db.lane(2).unwrap().unwrap();
        assert_eq!(lane2.lane_type, Some(LaneType::Paralympic));
        assert!(lane2.next_lane_type.is_none());
    }

    #[test]
    fn next_round_with_nothing_to_do_fails() {
        let (_dir, db, rules) = setup(ExerciseType::Bench, &[LaneType::DefaultBench]);
        let engine = Engine::new(&db, &rules);
        assert!(matches!(
            engine.next_round(),
            Err(HeatError::NothingToUpdate)
        ));
    }

    // -- return from done ---------------------------------------------------

    #[test]
    fn return_done_prefers_now_then_ready_up() {
        let (_dir, db, rules) = setup(
            ExerciseType::Bench,
            &[LaneType::DefaultBench, LaneType::DefaultBench],
        );
        let engine = Engine::new(&db, &rules);
        let c1 = add(&db, "Ada", Category::H1);
        engine.fill_lane(&c1).unwrap();
        engine.clear_lane(1).unwrap(); // c1 done, lane 1 empty again

        let placement = engine.return_done_competitor(&c1).unwrap();
        assert_eq!(placement.slot, Slot::Now);
        assert_eq!(placement.lane_id, 1);
        assert_eq!(placement.record.kind, ActionKind::ReturnDone);
        assert_eq!(status_of(&db, &c1), CompetitorStatus::Lane);
    }

    #[test]
    fn return_done_lands_on_ready_up_when_now_slots_are_full() {
        let (_dir, db, rules) = setup(ExerciseType::Bench, &[LaneType::DefaultBench]);
        let engine = Engine::new(&db, &rules);
        let c1 = add(&db, "Ada", Category::H1);
        let c2 = add(&db, "Bo", Category::H2);
        engine.fill_lane(&c1).unwrap();
        engine.clear_lane(1).unwrap();
        engine.fill_lane(&c2).unwrap();

        let placement = engine.return_done_competitor(&c1).unwrap();
        assert_eq!(placement.slot, Slot::ReadyUp);
        assert_eq!(status_of(&db, &c1), CompetitorStatus::Ready);
    }

    #[test]
    fn return_done_with_no_candidates_fails() {
        let (_dir, db, rules) = setup(ExerciseType::Bench, &[LaneType::Kettle]);
        let engine = Engine::new(&db, &rules);
        let r1 = add(&db, "Rea", Category::R1);
        engine.fill_lane(&r1).unwrap();
        engine.clear_lane(1).unwrap();

        // The only lane is empty but r1 fits it — so occupy it with the
        // other kettle category, leaving ready-up effective-type fine but
        // make it full to exhaust candidates.
        let r2 = add(&db, "Rob", Category::R2);
        engine.fill_lane(&r2).unwrap();
        let r3 = add(&db, "Ria", Category::R1);
        engine.fill_lane(&r3).unwrap(); // takes ready-up

        assert!(matches!(
            engine.return_done_competitor(&r1),
            Err(HeatError::NoCompatibleSlot(_))
        ));
        assert_eq!(status_of(&db, &r1), CompetitorStatus::Done);
    }

    // -- removal ------------------------------------------------------------

    #[test]
    fn remove_competitor_retires_without_lane_patch() {
        let (_dir, db, rules) = setup(ExerciseType::Bench, &[LaneType::DefaultBench]);
        let engine = Engine::new(&db, &rules);
        let c1 = add(&db, "Ada", Category::H1);

        let record = engine.remove_competitor(&c1).unwrap();
        assert_eq!(record.kind, ActionKind::RemoveCompetitor);
        assert!(record.lanes.is_empty());
        assert_eq!(record.competitors.len(), 1);
        assert_eq!(status_of(&db, &c1), CompetitorStatus::Done);
    }

    // -- undo ---------------------------------------------------------------

    #[test]
    fn undo_restores_auto_fill_exactly() {
        let (_dir, db, rules) = setup(
            ExerciseType::Bench,
            &[LaneType::DefaultBench, LaneType::DefaultBench],
        );
        let engine = Engine::new(&db, &rules);
        let c1 = add(&db, "Ada", Category::H1);
        let c2 = add(&db, "Bo", Category::H2);
        engine.auto_fill().unwrap();

        let undone = engine.undo_last_action().unwrap();
        assert!(undone.undone);
        assert!(undone.undone_at.is_some());

        assert!(db.lane(1).unwrap().unwrap().is_empty());
        assert!(db.lane(2).unwrap().unwrap().is_empty());
        assert_eq!(status_of(&db, &c1), CompetitorStatus::Waiting);
        assert_eq!(status_of(&db, &c2), CompetitorStatus::Waiting);
    }

    #[test]
    fn undo_does_not_reundo_the_same_entry() {
        let (_dir, db, rules) = setup(ExerciseType::Bench, &[LaneType::DefaultBench]);
        let engine = Engine::new(&db, &rules);
        let c1 = add(&db, "Ada", Category::H1);
        engine.fill_lane(&c1).unwrap();

        engine.undo_last_action().unwrap();
        assert!(matches!(
            engine.undo_last_action(),
            Err(HeatError::NothingToUndo)
        ));
        assert_eq!(status_of(&db, &c1), CompetitorStatus::Waiting);
    }

    #[test]
    fn undo_walks_back_through_older_entries() {
        let (_dir, db, rules) = setup(ExerciseType::Bench, &[LaneType::DefaultBench]);
        let engine = Engine::new(&db, &rules);
        let c1 = add(&db, "Ada", Category::H1);
        engine.fill_lane(&c1).unwrap();
        engine.clear_lane(1).unwrap();

        // First undo reverses the clear, second reverses the fill.
        engine.undo_last_action().unwrap();
        assert_eq!(status_of(&db, &c1), CompetitorStatus::Lane);
        engine.undo_last_action().unwrap();
        assert_eq!(status_of(&db, &c1), CompetitorStatus::Waiting);
        assert!(db.lane(1).unwrap().unwrap().is_empty());
    }

    #[test]
    fn undo_restores_staged_retype_applied_by_round_advance() {
        let (_dir, db, rules) = setup(ExerciseType::Kettle, &[LaneType::Jerk]);
        let engine = Engine::new(&db, &rules);
        let c1 = add(&db, "Ada", Category::H1);
        engine.fill_lane(&c1).unwrap();
        db.stage_lane_type(1, Some(LaneType::Bench)).unwrap();
        engine.clear_lane(1).unwrap();
        assert_eq!(db.lane(1).unwrap().unwrap().lane_type, Some(LaneType::Bench));

        engine.undo_last_action().unwrap();
        let lane = db.lane(1).unwrap().unwrap();
        assert_eq!(lane.lane_type, Some(LaneType::Jerk));
        // The staged retype is back in place, still pending.
        assert_eq!(lane.next_lane_type, Some(LaneType::Bench));
        assert_eq!(lane.competitor.unwrap().id, c1);
        assert_eq!(status_of(&db, &c1), CompetitorStatus::Lane);
    }

    #[test]
    fn undo_overwrites_intervening_edits_best_effort() {
        // Documented trade-off: undo restores absolute pre-images without
        // checking that the records still match the action's after image.
        let (_dir, db, rules) = setup(ExerciseType::Bench, &[LaneType::DefaultBench]);
        let engine = Engine::new(&db, &rules);
        let c1 = add(&db, "Ada", Category::H1);
        engine.fill_lane(&c1).unwrap();

        // An operator retypes the lane after the fill.
        db.set_lane_type(1, LaneType::Paralympic).unwrap();

        engine.undo_last_action().unwrap();
        let lane = db.lane(1).unwrap().unwrap();
        // The retype is gone: the pre-fill image won.
        assert_eq!(lane.lane_type, Some(LaneType::DefaultBench));
        assert!(lane.competitor.is_none());
    }
}
