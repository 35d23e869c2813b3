//! Project management commands for CLI.

use chrono::Utc;
use clap::Subcommand;
use focusnudge_core::{Project, ProjectSource, ProjectStatus};
use uuid::Uuid;

use super::{print_json, CliResult, Context};

#[derive(Subcommand)]
pub enum ProjectAction {
    /// Create a new project
    Add {
        /// Project name
        name: String,
        /// Priority from 1 (lowest) to 10 (highest)
        #[arg(long, default_value = "5")]
        priority: i64,
        #[arg(long)]
        owner: Option<String>,
        #[arg(long)]
        category: Option<String>,
    },
    /// List projects
    List {
        /// Include inactive and archived projects
        #[arg(long)]
        all: bool,
    },
    /// Archive a project
    Archive {
        /// Project ID
        id: String,
    },
    /// Make a project active again
    Activate {
        /// Project ID
        id: String,
    },
}

pub fn run(action: ProjectAction) -> CliResult {
    let ctx = Context::open()?;

    match action {
        ProjectAction::Add {
            name,
            priority,
            owner,
            category,
        } => {
            let mut project = Project::new(Uuid::new_v4().to_string(), name, priority, Utc::now())?;
            project.owner = owner.unwrap_or_default();
            project.category = category.unwrap_or_default();
            ctx.db.add_project(&project)?;
            print_json(&project)?;
        }
        ProjectAction::List { all } => {
            let projects: Vec<Project> = ctx
                .db
                .list_projects()?
                .into_iter()
                .filter(|p| all || p.is_active())
                .collect();
            print_json(&projects)?;
        }
        ProjectAction::Archive { id } => {
            print_json(&ctx.db.set_project_status(&id, ProjectStatus::Archived)?)?;
        }
        ProjectAction::Activate { id } => {
            print_json(&ctx.db.set_project_status(&id, ProjectStatus::Active)?)?;
        }
    }
    Ok(())
}
