//! The journaled operator actions: fill, autofill, clear, next-round,
//! return, undo. Each is one engine call plus output formatting.

use crate::cmd::{load_rules, open_db};
use crate::output::print_json;
use anyhow::Context;
use heat_core::engine::Engine;
use heat_core::types::Slot;
use std::path::Path;

pub fn fill(
    db_path: &Path,
    rules_path: Option<&Path>,
    competitor_id: &str,
    json: bool,
) -> anyhow::Result<()> {
    let db = open_db(db_path)?;
    let rules = load_rules(rules_path)?;
    let placement = Engine::new(&db, &rules)
        .fill_lane(competitor_id)
        .with_context(|| format!("failed to place competitor '{competitor_id}'"))?;

    if json {
        print_json(&serde_json::json!({
            "competitor_id": competitor_id,
            "lane_id": placement.lane_id,
            "slot": placement.slot,
            "action_seq": placement.record.seq,
        }))?;
    } else {
        match placement.slot {
            Slot::Now => println!("Assigned to lane {}", placement.lane_id),
            Slot::ReadyUp => println!("Queued on deck at lane {}", placement.lane_id),
        }
    }
    Ok(())
}

pub fn autofill(db_path: &Path, rules_path: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let db = open_db(db_path)?;
    let rules = load_rules(rules_path)?;
    let record = Engine::new(&db, &rules)
        .auto_fill()
        .context("auto-fill failed")?;

    if json {
        print_json(&serde_json::json!({
            "action_seq": record.seq,
            "lanes_updated": record.lanes.len(),
            "competitors_placed": record.competitors.len(),
        }))?;
    } else {
        println!(
            "Auto-filled {} slot(s) (undo available)",
            record.lanes.len()
        );
    }
    Ok(())
}

pub fn clear(
    db_path: &Path,
    rules_path: Option<&Path>,
    lane_id: u32,
    json: bool,
) -> anyhow::Result<()> {
    let db = open_db(db_path)?;
    let rules = load_rules(rules_path)?;
    let record = Engine::new(&db, &rules)
        .clear_lane(lane_id)
        .with_context(|| format!("failed to clear lane {lane_id}"))?;

    if json {
        print_json(&serde_json::json!({ "lane_id": lane_id, "action_seq": record.seq }))?;
    } else {
        println!("Lane {lane_id} cleared (undo available)");
    }
    Ok(())
}

pub fn next_round(db_path: &Path, rules_path: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let db = open_db(db_path)?;
    let rules = load_rules(rules_path)?;
    let record = Engine::new(&db, &rules)
        .next_round()
        .context("failed to start next round")?;

    if json {
        print_json(&serde_json::json!({
            "action_seq": record.seq,
            "lanes_advanced": record.lanes.len(),
        }))?;
    } else {
        println!(
            "Next round: {} lane(s) advanced (undo available)",
            record.lanes.len()
        );
    }
    Ok(())
}

pub fn return_done(
    db_path: &Path,
    rules_path: Option<&Path>,
    competitor_id: &str,
    json: bool,
) -> anyhow::Result<()> {
    let db = open_db(db_path)?;
    let rules = load_rules(rules_path)?;
    let placement = Engine::new(&db, &rules)
        .return_done_competitor(competitor_id)
        .with_context(|| format!("failed to return competitor '{competitor_id}'"))?;

    if json {
        print_json(&serde_json::json!({
            "competitor_id": competitor_id,
            "lane_id": placement.lane_id,
            "slot": placement.slot,
            "action_seq": placement.record.seq,
        }))?;
    } else {
        match placement.slot {
            Slot::Now => println!("Returned to lane {}", placement.lane_id),
            Slot::ReadyUp => println!("Returned on deck at lane {}", placement.lane_id),
        }
    }
    Ok(())
}

pub fn undo(db_path: &Path, rules_path: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let db = open_db(db_path)?;
    let rules = load_rules(rules_path)?;
    let record = Engine::new(&db, &rules)
        .undo_last_action()
        .context("undo failed")?;

    if json {
        print_json(&serde_json::json!({
            "undone_action": record.kind,
            "action_seq": record.seq,
            "patches_restored": record.patch_count(),
        }))?;
    } else {
        println!(
            "Undid {} ({} record(s) restored)",
            record.kind,
            record.patch_count()
        );
    }
    Ok(())
}
