use chrono::Utc;
use clap::Subcommand;
use focusnudge_core::{NtfySink, NudgeInputs, NudgeMode, ProjectSource, SettingsStore};
use serde_json::json;

use super::{print_json, CliResult, Context};

#[derive(Subcommand)]
pub enum NudgeAction {
    /// Show the current reminder level
    Level,
    /// Suggest the next project/task to pick up
    Recommend,
    /// Show or set the reminder mode
    Mode {
        /// automatic, remember, stay_on_target or lazy
        mode: Option<NudgeMode>,
    },
    /// Show or set the ntfy topic URL stored with the settings
    Ntfy {
        url: Option<String>,
        /// Remove the stored URL
        #[arg(long, conflicts_with = "url")]
        clear: bool,
    },
}

pub fn run(action: NudgeAction) -> CliResult {
    let ctx = Context::open()?;
    let now = Utc::now();

    match action {
        NudgeAction::Level => {
            let service = ctx.service()?;
            let inputs =
                NudgeInputs::from_projects(&ctx.db.list_projects()?, &ctx.db.list_tasks()?, now);
            print_json(&json!({
                "mode": ctx.db.read_nudge_mode()?,
                "level": service.current_level(now)?,
                "oldestAgeDays": inputs.oldest_age_days,
                "openProjects": inputs.open_count,
            }))?;
        }
        NudgeAction::Recommend => print_json(&ctx.service()?.recommend(now)?)?,
        NudgeAction::Mode { mode } => {
            if let Some(mode) = mode {
                ctx.db.write_nudge_mode(mode)?;
            }
            println!("{}", ctx.db.read_nudge_mode()?);
        }
        NudgeAction::Ntfy { url, clear } => {
            if clear {
                ctx.db.write_ntfy_url(None)?;
            } else if let Some(url) = url {
                NtfySink::new(&url)?;
                ctx.db.write_ntfy_url(Some(&url))?;
            }
            let settings = ctx.db.read_settings()?;
            println!("{}", settings.ntfy_url.as_deref().unwrap_or("(not set)"));
        }
    }
    Ok(())
}
