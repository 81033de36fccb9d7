use crate::cmd::open_db;
use crate::output::print_json;
use anyhow::Context;
use clap::Subcommand;
use heat_core::types::ExerciseStatus;
use std::path::Path;

#[derive(Subcommand)]
pub enum ExerciseSubcommand {
    /// Show the exercise record
    Show,
    /// Set the exercise status
    Status {
        /// planned | ongoing | finished
        status: ExerciseStatus,
    },
}

pub fn run(db_path: &Path, subcmd: ExerciseSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ExerciseSubcommand::Show => show(db_path, json),
        ExerciseSubcommand::Status { status } => set_status(db_path, status, json),
    }
}

fn show(db_path: &Path, json: bool) -> anyhow::Result<()> {
    let db = open_db(db_path)?;
    let snap = db.snapshot().context("failed to read competition")?;

    if json {
        print_json(&serde_json::json!({
            "name": snap.exercise.name,
            "status": snap.exercise.status,
            "type": snap.exercise.exercise_type,
            "lanes": snap.lanes.len(),
            "waiting": snap.waiting().len(),
            "done": snap.done().len(),
        }))?;
        return Ok(());
    }

    println!("Exercise: {}", snap.exercise.name);
    println!("Type:     {}", snap.exercise.exercise_type);
    println!("Status:   {}", snap.exercise.status);
    println!(
        "Lanes:    {} ({} occupied)",
        snap.lanes.len(),
        snap.lanes.iter().filter(|l| l.competitor.is_some()).count()
    );
    println!("Waiting:  {}", snap.waiting().len());
    println!("Done:     {}", snap.done().len());
    Ok(())
}

fn set_status(db_path: &Path, status: ExerciseStatus, json: bool) -> anyhow::Result<()> {
    let db = open_db(db_path)?;
    let exercise = db
        .set_exercise_status(status)
        .context("failed to update exercise status")?;

    if json {
        print_json(&serde_json::json!({ "name": exercise.name, "status": exercise.status }))?;
    } else {
        println!("Exercise '{}' is now {}", exercise.name, exercise.status);
    }
    Ok(())
}
