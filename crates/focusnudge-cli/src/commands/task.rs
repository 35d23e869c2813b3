//! Task management commands for CLI.

use chrono::Utc;
use clap::Subcommand;
use focusnudge_core::{ProjectSource, Task};
use serde_json::json;
use uuid::Uuid;

use super::{print_json, CliResult, Context};

#[derive(Subcommand)]
pub enum TaskAction {
    /// Add a task to a project
    Add {
        /// Project ID
        project_id: String,
        /// Task title
        title: String,
        /// Tag (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
    /// List tasks
    List {
        /// Only tasks of this project
        #[arg(long)]
        project: Option<String>,
        /// Include completed tasks
        #[arg(long)]
        all: bool,
    },
    /// Mark a task complete and evaluate reminders
    Complete {
        /// Task ID
        task_id: String,
        /// Completion notes
        #[arg(long)]
        notes: Option<String>,
    },
}

pub async fn run(action: TaskAction) -> CliResult {
    let ctx = Context::open()?;

    match action {
        TaskAction::Add {
            project_id,
            title,
            tags,
        } => {
            let task = Task::new(Uuid::new_v4().to_string(), project_id, title, Utc::now())
                .with_tags(tags);
            ctx.db.add_task(&task)?;
            print_json(&task)?;
        }
        TaskAction::List { project, all } => {
            let tasks: Vec<Task> = ctx
                .db
                .list_tasks()?
                .into_iter()
                .filter(|t| all || !t.is_complete)
                .filter(|t| project.as_deref().map_or(true, |p| t.project_id == p))
                .collect();
            print_json(&tasks)?;
        }
        TaskAction::Complete { task_id, notes } => {
            let service = ctx.service()?;
            let outcome = service.complete_task(&task_id, notes.as_deref(), Utc::now())?;
            let decision = outcome.decision.as_ref();
            print_json(&json!({
                "taskId": task_id,
                "transitioned": outcome.transitioned(),
                "totalCompleted": outcome.total_completed,
                "level": decision.map(|d| d.level),
                "notified": outcome.notified(),
                "recommendation": outcome.recommendation,
                "events": outcome.events,
            }))?;

            // The process exits right after, so let deliveries finish first.
            for report in outcome.dispatch.wait().await {
                if let Some(error) = report.error {
                    eprintln!("warning: {} notification failed: {error}", report.sink);
                }
            }
        }
    }
    Ok(())
}
