use crate::cmd::open_db;
use crate::output::{print_json, print_table};
use anyhow::Context;
use std::path::Path;

const DEFAULT_LIMIT: usize = 20;

pub fn run(db_path: &Path, all: bool, json: bool) -> anyhow::Result<()> {
    let db = open_db(db_path)?;
    let mut records = db.list_actions().context("failed to read history")?;
    if !all {
        records.truncate(DEFAULT_LIMIT);
    }

    if json {
        print_json(&records)?;
        return Ok(());
    }

    if records.is_empty() {
        println!("No actions recorded.");
        return Ok(());
    }

    let rows: Vec<Vec<String>> = records
        .iter()
        .map(|r| {
            vec![
                r.seq.to_string(),
                r.kind.to_string(),
                r.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                format!("{}L/{}C", r.lanes.len(), r.competitors.len()),
                if r.undone { "undone" } else { "" }.to_string(),
            ]
        })
        .collect();
    print_table(&["SEQ", "ACTION", "AT", "PATCHES", ""], &rows);
    Ok(())
}
