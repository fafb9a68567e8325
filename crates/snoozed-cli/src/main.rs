use clap::{CommandFactory, Parser, Subcommand};
use snoozed_core::Action;

mod commands;

#[derive(Parser)]
#[command(
    name = "snoozed",
    version,
    about = "Recurring alarm daemon that enforces suspend/shutdown with bounded snoozing"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the long-lived daemon (config watch + deferred job scan)
    Daemon,
    /// Show a pre-alarm warning (invoked by installed triggers)
    Warn {
        #[arg(long)]
        alarm: String,
        /// Minutes before the alarm's action time
        #[arg(long)]
        minutes: u32,
    },
    /// Fire an alarm's final prompt and enforce its action
    Execute {
        #[arg(long)]
        alarm: String,
        /// Override the configured action
        #[arg(long, value_parser = commands::alarm::parse_action)]
        action: Option<Action>,
        /// Mark a deferred re-firing; keeps the stored snooze count
        #[arg(long)]
        snoozed: bool,
    },
    /// Defer an alarm once, bounded by the snooze policy
    Snooze {
        #[arg(long)]
        alarm: String,
        /// Override the configured action
        #[arg(long, value_parser = commands::alarm::parse_action)]
        action: Option<Action>,
    },
    /// Perform the action immediately, bypassing the final prompt
    SleepNow {
        #[arg(long)]
        alarm: String,
        /// Override the configured action
        #[arg(long, value_parser = commands::alarm::parse_action)]
        action: Option<Action>,
    },
    /// Print snooze counters and pending deferred jobs as JSON
    Status,
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Trigger management
    Trigger {
        #[command(subcommand)]
        action: commands::trigger::TriggerAction,
    },
    /// Generate shell completions
    Completions {
        shell: clap_complete::Shell,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Daemon => commands::daemon::run(),
        Commands::Warn { alarm, minutes } => commands::alarm::warn(&alarm, minutes),
        Commands::Execute {
            alarm,
            action,
            snoozed,
        } => commands::alarm::execute(&alarm, action, snoozed),
        Commands::Snooze { alarm, action } => commands::alarm::snooze(&alarm, action),
        Commands::SleepNow { alarm, action } => commands::alarm::sleep_now(&alarm, action),
        Commands::Status => commands::status::run(),
        Commands::Config { action } => commands::config::run(action),
        Commands::Trigger { action } => commands::trigger::run(action),
        Commands::Completions { shell } => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "snoozed",
                &mut std::io::stdout(),
            );
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn execute_parses_flags() {
        let cli = Cli::try_parse_from([
            "snoozed", "execute", "--alarm", "bedtime", "--action", "suspend", "--snoozed",
        ])
        .unwrap();
        match cli.command {
            Commands::Execute {
                alarm,
                action,
                snoozed,
            } => {
                assert_eq!(alarm, "bedtime");
                assert_eq!(action, Some(Action::Suspend));
                assert!(snoozed);
            }
            _ => panic!("expected execute"),
        }
    }

    #[test]
    fn execute_rejects_unknown_action() {
        assert!(Cli::try_parse_from([
            "snoozed", "execute", "--alarm", "bedtime", "--action", "reboot",
        ])
        .is_err());
    }

    #[test]
    fn warn_requires_minutes() {
        assert!(Cli::try_parse_from(["snoozed", "warn", "--alarm", "bedtime"]).is_err());
        let cli =
            Cli::try_parse_from(["snoozed", "warn", "--alarm", "bedtime", "--minutes", "10"])
                .unwrap();
        assert!(matches!(cli.command, Commands::Warn { minutes: 10, .. }));
    }

    #[test]
    fn config_set_takes_key_and_value() {
        let cli =
            Cli::try_parse_from(["snoozed", "config", "set", "snooze.max_snoozes", "5"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Config {
                action: commands::config::ConfigAction::Set { .. }
            }
        ));
    }
}
