use chrono::{DateTime, Utc};
use clap::Subcommand;
use focusnudge_core::{FinishOptions, SessionTicker, SystemClock};
use serde_json::json;
use std::sync::Arc;

use super::{print_json, CliResult, Context};

#[derive(Subcommand)]
pub enum SessionAction {
    /// Start a work session on a task
    Start {
        /// Task ID
        task_id: String,
    },
    /// Extend the running work session to double length
    Double,
    /// Finish the active session (a work session hands over to a break)
    Finish {
        /// Do not start a break afterwards
        #[arg(long)]
        no_break: bool,
        /// Notes attached to the completion record
        #[arg(long)]
        notes: Option<String>,
    },
    /// Stop the active session without a break
    Stop {
        #[arg(long)]
        notes: Option<String>,
    },
    /// Print the active session and remaining time as JSON
    Status,
    /// Follow the countdown until the slot is empty
    Watch,
    /// Empty the session slot unconditionally
    Reset,
}

pub async fn run(action: SessionAction) -> CliResult {
    let ctx = Context::open()?;
    let ctl = &ctx.controller;
    let now = Utc::now();

    match action {
        SessionAction::Start { task_id } => {
            settle_expired(&ctx, now)?;
            print_json(&ctl.start(&task_id, now)?)?;
        }
        SessionAction::Double => {
            settle_expired(&ctx, now)?;
            print_json(&ctl.double(now)?)?;
        }
        SessionAction::Finish { no_break, notes } => {
            let mut options = if no_break {
                FinishOptions::without_break()
            } else {
                FinishOptions::default()
            };
            if let Some(notes) = notes {
                options = options.with_notes(notes);
            }
            print_json(&ctl.finish(now, options)?)?;
        }
        SessionAction::Stop { notes } => print_json(&ctl.stop(now, notes)?)?,
        SessionAction::Status => {
            // Apply a pending automatic finish before reporting.
            let events = ctl.tick(now)?;
            let session = ctl.active_session()?;
            print_json(&json!({
                "state": ctl.state()?,
                "remainingSecs": session.as_ref().map(|s| s.remaining_secs(now)),
                "session": session,
                "events": events,
            }))?;
        }
        SessionAction::Watch => watch(&ctx).await?,
        SessionAction::Reset => print_json(&ctl.clear(now)?)?,
    }
    Ok(())
}

/// Apply an automatic finish that no ticker has picked up yet.
///
/// Finish and stop act on an expired session directly, so only start and
/// double go through here.
fn settle_expired(ctx: &Context, now: DateTime<Utc>) -> CliResult {
    for event in ctx.controller.tick(now)? {
        tracing::info!(event = %serde_json::to_string(&event)?, "applied pending expiry");
    }
    Ok(())
}

async fn watch(ctx: &Context) -> CliResult {
    let mut ticker = SessionTicker::spawn(
        ctx.controller.clone(),
        Arc::new(SystemClock),
        ctx.config.timer.tick_interval(),
    );

    while let Some(update) = ticker.next().await {
        for event in &update.events {
            println!("{}", serde_json::to_string(event)?);
        }
        match (&update.session, update.remaining_secs) {
            (Some(session), Some(remaining)) => {
                println!(
                    "{} {:02}:{:02}",
                    session.session_type,
                    remaining / 60,
                    remaining % 60
                );
            }
            _ => {
                println!("idle");
                break;
            }
        }
    }

    ticker.shutdown().await;
    Ok(())
}
