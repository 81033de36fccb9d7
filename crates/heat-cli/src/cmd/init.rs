use crate::cmd::load_rules;
use crate::output::print_json;
use anyhow::Context;
use heat_core::store::CompetitionDb;
use heat_core::types::ExerciseType;
use std::path::Path;

pub fn run(
    db_path: &Path,
    rules_path: Option<&Path>,
    name: &str,
    exercise_type: ExerciseType,
    lanes: u32,
    json: bool,
) -> anyhow::Result<()> {
    let rules = load_rules(rules_path)?;
    let db = CompetitionDb::open(db_path)
        .with_context(|| format!("failed to create {}", db_path.display()))?;
    let exercise = db
        .create_exercise(name, exercise_type, lanes, &rules)
        .context("failed to initialize competition")?;

    if json {
        print_json(&serde_json::json!({
            "db": db_path,
            "name": exercise.name,
            "type": exercise.exercise_type,
            "lanes": lanes,
        }))?;
    } else {
        println!(
            "Initialized '{}' ({}) with {} lane(s) at {}",
            exercise.name,
            exercise.exercise_type,
            lanes,
            db_path.display()
        );
    }
    Ok(())
}
