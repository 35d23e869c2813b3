//! Notification fan-out.
//!
//! Every sink implements [`NotificationSink`]. The dispatcher hands each
//! sink its own tokio task, so a slow or failing sink never delays the
//! others, and never delays the session operation that triggered it.
//! Failures end at this boundary as a `warn!` log line.

mod command;
mod ntfy;

pub use command::CommandSink;
pub use ntfy::NtfySink;
pub(crate) use ntfy::parse_topic_url as validate_ntfy_url;

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::NotificationError;
use crate::storage::NotificationsConfig;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
}

impl Notification {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }
}

pub type DeliveryFuture = Pin<Box<dyn Future<Output = Result<(), NotificationError>> + Send>>;

pub trait NotificationSink: Send + Sync {
    /// Short identifier used in logs (e.g. "ntfy", "desktop").
    fn name(&self) -> &str;

    /// Build the delivery future. The future owns everything it needs.
    fn deliver(&self, notification: &Notification) -> DeliveryFuture;
}

/// Outcome of one sink's delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    pub sink: String,
    pub error: Option<String>,
}

impl DeliveryReport {
    pub fn delivered(&self) -> bool {
        self.error.is_none()
    }
}

/// In-flight deliveries from one dispatch. Dropping it detaches the tasks.
#[derive(Debug, Default)]
pub struct DispatchHandle {
    tasks: Vec<(String, JoinHandle<Result<(), NotificationError>>)>,
}

impl DispatchHandle {
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Wait for every sink. Short-lived hosts call this before exiting.
    pub async fn wait(self) -> Vec<DeliveryReport> {
        let mut reports = Vec::with_capacity(self.tasks.len());
        for (sink, task) in self.tasks {
            let error = match task.await {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(e.to_string()),
                Err(join) => Some(format!("{sink}: delivery task aborted: {join}")),
            };
            reports.push(DeliveryReport { sink, error });
        }
        reports
    }
}

#[derive(Clone, Default)]
pub struct NotificationDispatcher {
    sinks: Vec<Arc<dyn NotificationSink>>,
}

impl NotificationDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the sink set described by the notifications config.
    ///
    /// A malformed ntfy URL disables that sink with a warning rather than
    /// failing the whole set.
    pub fn from_config(config: &NotificationsConfig, ntfy_override: Option<&str>) -> Self {
        let mut dispatcher = Self::new();
        if !config.enabled {
            return dispatcher;
        }

        let ntfy_url = ntfy_override
            .filter(|u| !u.is_empty())
            .or(config.ntfy_url.as_deref().filter(|u| !u.is_empty()));
        if let Some(url) = ntfy_url {
            match NtfySink::new(url) {
                Ok(sink) => dispatcher.add_sink(Arc::new(sink)),
                Err(e) => warn!(error = %e, "ntfy sink disabled"),
            }
        }

        if config.desktop {
            let sink = config
                .desktop_command
                .as_deref()
                .and_then(|cmd| CommandSink::from_command_line("desktop", cmd))
                .unwrap_or_else(CommandSink::desktop);
            dispatcher.add_sink(Arc::new(sink));
        }

        if config.speech {
            let sink = config
                .speech_command
                .as_deref()
                .and_then(|cmd| CommandSink::from_command_line("speech", cmd))
                .unwrap_or_else(CommandSink::speech);
            dispatcher.add_sink(Arc::new(sink));
        }

        dispatcher
    }

    pub fn with_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.add_sink(sink);
        self
    }

    pub fn add_sink(&mut self, sink: Arc<dyn NotificationSink>) {
        self.sinks.push(sink);
    }

    pub fn sink_names(&self) -> Vec<String> {
        self.sinks.iter().map(|s| s.name().to_string()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Fire-and-forget fan-out. Needs a tokio runtime; without one the
    /// notification is dropped with a warning.
    pub fn dispatch(&self, notification: &Notification) -> DispatchHandle {
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!(title = %notification.title, "no async runtime; notification dropped");
                return DispatchHandle::default();
            }
        };

        let tasks = self
            .sinks
            .iter()
            .map(|sink| {
                let name = sink.name().to_string();
                let delivery = sink.deliver(notification);
                let log_name = name.clone();
                let task = runtime.spawn(async move {
                    let result = delivery.await;
                    match &result {
                        Ok(()) => debug!(sink = %log_name, "notification delivered"),
                        Err(e) => warn!(sink = %log_name, error = %e, "notification delivery failed"),
                    }
                    result
                });
                (name, task)
            })
            .collect();

        DispatchHandle { tasks }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Sink that records what it was asked to deliver.
    #[derive(Default)]
    pub struct RecordingSink {
        pub delivered: Arc<Mutex<Vec<Notification>>>,
    }

    impl NotificationSink for RecordingSink {
        fn name(&self) -> &str {
            "recording"
        }

        fn deliver(&self, notification: &Notification) -> DeliveryFuture {
            let delivered = Arc::clone(&self.delivered);
            let notification = notification.clone();
            Box::pin(async move {
                delivered.lock().unwrap().push(notification);
                Ok(())
            })
        }
    }

    pub struct FailingSink;

    impl NotificationSink for FailingSink {
        fn name(&self) -> &str {
            "failing"
        }

        fn deliver(&self, _notification: &Notification) -> DeliveryFuture {
            Box::pin(async {
                Err(NotificationError::NotConfigured {
                    sink: "failing".into(),
                })
            })
        }
    }
}
