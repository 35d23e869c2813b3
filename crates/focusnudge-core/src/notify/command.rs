//! Local helper-program sinks: desktop toasts and text-to-speech.
//!
//! Arguments may contain `{title}` and `{body}` placeholders.

use tokio::process::Command;

use super::{DeliveryFuture, Notification, NotificationSink};
use crate::error::NotificationError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSink {
    name: String,
    program: String,
    args: Vec<String>,
}

impl CommandSink {
    pub fn new(name: impl Into<String>, program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            args,
        }
    }

    /// Parse a whitespace-separated command line, e.g. `notify-send {title} {body}`.
    pub fn from_command_line(name: &str, line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self::new(name, program, parts.collect()))
    }

    /// OS notification via the platform's helper.
    pub fn desktop() -> Self {
        if cfg!(target_os = "macos") {
            Self::new(
                "desktop",
                "osascript",
                vec![
                    "-e".into(),
                    "display notification \"{body}\" with title \"{title}\"".into(),
                ],
            )
        } else {
            Self::new("desktop", "notify-send", vec!["{title}".into(), "{body}".into()])
        }
    }

    /// Spoken reminder.
    pub fn speech() -> Self {
        if cfg!(target_os = "macos") {
            Self::new("speech", "say", vec!["{body}".into()])
        } else {
            Self::new("speech", "espeak", vec!["{body}".into()])
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn render_args(&self, notification: &Notification) -> Vec<String> {
        // Double quotes would break the osascript string literal.
        let title = notification.title.replace('"', "'");
        let body = notification.body.replace('"', "'");
        self.args
            .iter()
            .map(|arg| arg.replace("{title}", &title).replace("{body}", &body))
            .collect()
    }
}

impl NotificationSink for CommandSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn deliver(&self, notification: &Notification) -> DeliveryFuture {
        let name = self.name.clone();
        let program = self.program.clone();
        let args = self.render_args(notification);

        Box::pin(async move {
            let output = Command::new(&program)
                .args(&args)
                .output()
                .await
                .map_err(|e| NotificationError::Command {
                    sink: name.clone(),
                    message: format!("{program}: {e}"),
                })?;

            if output.status.success() {
                Ok(())
            } else {
                Err(NotificationError::Command {
                    sink: name,
                    message: format!(
                        "{program} exited with {}: {}",
                        output.status,
                        String::from_utf8_lossy(&output.stderr).trim()
                    ),
                })
            }
        })
    }
}
