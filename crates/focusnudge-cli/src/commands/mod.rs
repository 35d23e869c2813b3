pub mod config;
pub mod nudge;
pub mod project;
pub mod session;
pub mod task;

use focusnudge_core::{
    Config, Database, FocusService, NotificationDispatcher, NudgeLevelEngine, SessionController,
    SettingsStore,
};
use std::sync::Arc;

pub type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Store, config and controller wired the way every command needs them.
pub struct Context {
    pub db: Arc<Database>,
    pub config: Config,
    pub controller: Arc<SessionController>,
}

impl Context {
    pub fn open() -> Result<Self, Box<dyn std::error::Error>> {
        let config = Config::load()?;
        let db = Arc::new(Database::open()?);
        tracing::debug!(work_secs = config.timer.base_work_secs, "store opened");
        let controller = Arc::new(
            SessionController::new(db.clone(), db.clone())
                .with_durations(config.timer.durations())
                .with_auto_break(config.timer.auto_break),
        );
        Ok(Self {
            db,
            config,
            controller,
        })
    }

    /// Completion service with sinks from config; the stored ntfy URL wins.
    pub fn service(&self) -> Result<FocusService, Box<dyn std::error::Error>> {
        let settings = self.db.read_settings()?;
        let dispatcher = NotificationDispatcher::from_config(
            &self.config.notifications,
            settings.ntfy_url.as_deref(),
        );
        Ok(FocusService::new(
            self.controller.clone(),
            self.db.clone(),
            self.db.clone(),
            self.db.clone(),
        )
        .with_engine(NudgeLevelEngine::new(self.config.nudge.thresholds()))
        .with_dispatcher(dispatcher))
    }
}

pub fn print_json<T: serde::Serialize>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
