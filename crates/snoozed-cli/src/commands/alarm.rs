use snoozed_core::{
    Action, AlarmEngine, Config, Database, DialogGateway, SystemActionExecutor,
};

pub fn parse_action(s: &str) -> Result<Action, String> {
    s.parse()
        .map_err(|e: snoozed_core::ConfigError| e.to_string())
}

/// Build an engine over fresh store handles, as every short-lived
/// invocation does.
fn engine() -> Result<AlarmEngine<DialogGateway, SystemActionExecutor>, Box<dyn std::error::Error>>
{
    let config = Config::load()?;
    let db = Database::open()?;
    let gateway = DialogGateway::new(config.notifications.warning_secs);
    Ok(AlarmEngine::new(db, config, gateway, SystemActionExecutor))
}

pub fn warn(alarm: &str, minutes: u32) -> Result<(), Box<dyn std::error::Error>> {
    engine()?.warn(alarm, minutes)?;
    Ok(())
}

pub fn execute(
    alarm: &str,
    action: Option<Action>,
    snoozed: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let engine = engine()?;
    let action = action.unwrap_or_else(|| engine.config().action_for(alarm));
    let outcome = engine.execute(alarm, action, snoozed)?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

pub fn snooze(alarm: &str, action: Option<Action>) -> Result<(), Box<dyn std::error::Error>> {
    let engine = engine()?;
    let action = action.unwrap_or_else(|| engine.config().action_for(alarm));
    let outcome = engine.snooze(alarm, action)?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

pub fn sleep_now(alarm: &str, action: Option<Action>) -> Result<(), Box<dyn std::error::Error>> {
    let engine = engine()?;
    let action = action.unwrap_or_else(|| engine.config().action_for(alarm));
    let outcome = engine.sleep_now(alarm, action)?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}
