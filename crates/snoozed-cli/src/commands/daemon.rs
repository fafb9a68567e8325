use snoozed_core::{CronInstaller, Daemon};

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let daemon = Daemon::new(CronInstaller::new());
    runtime.block_on(daemon.run())?;
    Ok(())
}
