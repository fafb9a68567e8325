use snoozed_core::Database;

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;
    let status = serde_json::json!({
        "snooze_counts": db.snooze_records()?,
        "pending_jobs": db.pending_jobs()?,
    });
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}
