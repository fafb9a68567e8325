use clap::Subcommand;
use snoozed_core::{compile, Config, CronInstaller, TriggerInstaller};

#[derive(Subcommand)]
pub enum TriggerAction {
    /// Compile the current configuration and install its triggers
    Install,
    /// Remove every managed trigger
    Remove,
    /// List the installed managed crontab lines
    List,
}

pub fn run(action: TriggerAction) -> Result<(), Box<dyn std::error::Error>> {
    let installer = CronInstaller::new();
    match action {
        TriggerAction::Install => {
            let config = Config::load()?;
            if !config.enabled {
                installer.remove_all()?;
                println!("alarms are globally disabled; removed managed triggers");
                return Ok(());
            }
            let specs = compile(&config);
            installer.replace_all(&specs)?;
            println!("installed {} trigger(s)", specs.len());
        }
        TriggerAction::Remove => {
            installer.remove_all()?;
            println!("removed all managed triggers");
        }
        TriggerAction::List => {
            for line in installer.installed()? {
                println!("{line}");
            }
        }
    }
    Ok(())
}
