use crate::cmd::{load_rules, open_db};
use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use heat_core::model::Lane;
use heat_core::types::LaneType;
use std::path::Path;

#[derive(Subcommand)]
pub enum LaneSubcommand {
    /// List lanes in id order
    List,
    /// Add a lane at the next free id (type auto-cycled unless given)
    Add {
        #[arg(long = "type")]
        lane_type: Option<LaneType>,
    },
    /// Retype a lane immediately
    Retype { id: u32, lane_type: LaneType },
    /// Stage a retype for the next round boundary
    Stage { id: u32, lane_type: LaneType },
    /// Clear a staged retype
    Unstage { id: u32 },
    /// Lock a lane (excluded from assignment and round advance)
    Lock { id: u32 },
    /// Unlock a lane
    Unlock { id: u32 },
    /// Delete an empty, unlocked lane
    Delete { id: u32 },
}

pub fn run(
    db_path: &Path,
    rules_path: Option<&Path>,
    subcmd: LaneSubcommand,
    json: bool,
) -> anyhow::Result<()> {
    let db = open_db(db_path)?;
    match subcmd {
        LaneSubcommand::List => {
            let lanes = db.snapshot().context("failed to read competition")?.lanes;
            if json {
                print_json(&lanes)?;
                return Ok(());
            }
            if lanes.is_empty() {
                println!("No lanes.");
                return Ok(());
            }
            let rows: Vec<Vec<String>> = lanes.iter().map(lane_row).collect();
            print_table(&["ID", "TYPE", "NEXT", "NOW", "READY UP", "LOCKED"], &rows);
            Ok(())
        }
        LaneSubcommand::Add { lane_type } => {
            let rules = load_rules(rules_path)?;
            let lane = db.add_lane(lane_type, &rules).context("failed to add lane")?;
            report(&lane, json, &format!("Added lane {}", lane.id))
        }
        LaneSubcommand::Retype { id, lane_type } => {
            let lane = db
                .set_lane_type(id, lane_type)
                .with_context(|| format!("failed to retype lane {id}"))?;
            report(&lane, json, &format!("Lane {id} is now {lane_type}"))
        }
        LaneSubcommand::Stage { id, lane_type } => {
            let lane = db
                .stage_lane_type(id, Some(lane_type))
                .with_context(|| format!("failed to stage retype on lane {id}"))?;
            report(
                &lane,
                json,
                &format!("Lane {id} becomes {lane_type} at the next round"),
            )
        }
        LaneSubcommand::Unstage { id } => {
            let lane = db
                .stage_lane_type(id, None)
                .with_context(|| format!("failed to clear staged retype on lane {id}"))?;
            report(&lane, json, &format!("Cleared staged retype on lane {id}"))
        }
        LaneSubcommand::Lock { id } => {
            let lane = db
                .set_locked(id, true)
                .with_context(|| format!("failed to lock lane {id}"))?;
            report(&lane, json, &format!("Locked lane {id}"))
        }
        LaneSubcommand::Unlock { id } => {
            let lane = db
                .set_locked(id, false)
                .with_context(|| format!("failed to unlock lane {id}"))?;
            report(&lane, json, &format!("Unlocked lane {id}"))
        }
        LaneSubcommand::Delete { id } => {
            db.delete_lane(id)
                .with_context(|| format!("failed to delete lane {id}"))?;
            if json {
                print_json(&serde_json::json!({ "deleted": id }))?;
            } else {
                println!("Deleted lane {id}");
            }
            Ok(())
        }
    }
}

fn report(lane: &Lane, json: bool, message: &str) -> anyhow::Result<()> {
    if json {
        print_json(lane)?;
    } else {
        println!("{message}");
    }
    Ok(())
}

fn lane_row(lane: &Lane) -> Vec<String> {
    let slot = |entry: &Option<heat_core::model::SlotEntry>| match entry {
        Some(e) => format!("{} [{}]", e.name, e.category),
        None => "-".to_string(),
    };
    vec![
        lane.id.to_string(),
        lane.lane_type.map_or("-".into(), |t| t.to_string()),
        lane.next_lane_type.map_or("-".into(), |t| t.to_string()),
        slot(&lane.competitor),
        slot(&lane.ready_up),
        if lane.locked { "yes" } else { "" }.to_string(),
    ]
}
