//! # Focusnudge Core Library
//!
//! Pomodoro sessions plus a reminder engine that keeps old projects from
//! being forgotten. Everything is available through the standalone
//! `focusnudge` CLI, which is a thin host over this crate.
//!
//! ## Architecture
//!
//! - **Session controller**: one shared active-session slot, written only
//!   through a conditional write. Remaining time is recomputed from the
//!   absolute start, so any client (or a restarted one) sees the same value.
//! - **Nudge engine**: staleness scoring, level derivation and a cadence
//!   gate. All three are pure functions of their inputs.
//! - **Storage**: collaborator traits with an in-memory store and a SQLite
//!   store, plus TOML configuration.
//! - **Notifications**: fire-and-forget fan-out to ntfy and local helpers.
//!
//! ## Key Components
//!
//! - [`SessionController`]: start / double / finish / stop state machine
//! - [`SessionTicker`]: periodic `tick` driver for automatic finish
//! - [`FocusService`]: task completion and reminder pipeline
//! - [`Database`] / [`MemoryStore`]: collaborator implementations
//! - [`Config`]: application configuration management

pub mod clock;
pub mod error;
pub mod events;
pub mod notify;
pub mod nudge;
pub mod project;
pub mod service;
pub mod settings;
pub mod storage;
pub mod task;
pub mod timer;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ConfigError, CoreError, NotificationError, Result, StoreError, ValidationError};
pub use events::Event;
pub use notify::{
    CommandSink, DeliveryReport, DispatchHandle, Notification, NotificationDispatcher,
    NotificationSink, NtfySink,
};
pub use nudge::{
    NotificationDecision, NotificationGate, NudgeInputs, NudgeLevel, NudgeLevelEngine,
    NudgeThresholds, Recommendation, StalenessScorer,
};
pub use project::{Project, ProjectStatus};
pub use service::{CompletionOutcome, FocusService};
pub use settings::{NudgeMode, Settings};
pub use storage::{
    data_dir, Config, Database, MemoryStore, ProjectSource, SessionStore, SessionWatch,
    SettingsStore, TaskRepository,
};
pub use task::{CompletionRecord, Task, TaskStatus};
pub use timer::{
    ControllerState, FinishOptions, Session, SessionController, SessionDurations, SessionTicker,
    SessionType, TickUpdate, TickerHandle,
};
