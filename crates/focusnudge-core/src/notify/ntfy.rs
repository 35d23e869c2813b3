//! ntfy push sink -- posts the reminder to a topic URL.

use reqwest::Client;
use url::Url;

use super::{DeliveryFuture, Notification, NotificationSink};
use crate::error::{ConfigError, NotificationError};

const SINK: &str = "ntfy";

pub struct NtfySink {
    client: Client,
    url: Url,
}

impl NtfySink {
    /// Validate and wrap a topic URL such as `https://ntfy.sh/my-topic`.
    pub fn new(url: &str) -> Result<Self, ConfigError> {
        let url = parse_topic_url(url)?;
        Ok(Self {
            client: Client::new(),
            url,
        })
    }
}

/// Accept only http(s) URLs with a host.
pub(crate) fn parse_topic_url(raw: &str) -> Result<Url, ConfigError> {
    let invalid = |message: String| ConfigError::InvalidValue {
        key: "notifications.ntfy_url".into(),
        message,
    };
    let url = Url::parse(raw.trim()).map_err(|e| invalid(format!("'{raw}': {e}")))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(invalid(format!("'{raw}' is not an http(s) URL")));
    }
    Ok(url)
}

impl NotificationSink for NtfySink {
    fn name(&self) -> &str {
        SINK
    }

    fn deliver(&self, notification: &Notification) -> DeliveryFuture {
        let client = self.client.clone();
        let url = self.url.clone();
        let title = notification.title.clone();
        let body = notification.body.clone();

        Box::pin(async move {
            let resp = client
                .post(url)
                .header("Title", title)
                .body(body)
                .send()
                .await
                .map_err(|source| NotificationError::Http {
                    sink: SINK.into(),
                    source,
                })?;

            let status = resp.status();
            if status.is_success() {
                Ok(())
            } else {
                let text = resp.text().await.unwrap_or_default();
                Err(NotificationError::Rejected {
                    sink: SINK.into(),
                    status: status.as_u16(),
                    body: text,
                })
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_http_urls() {
        assert!(NtfySink::new("ftp://ntfy.sh/topic").is_err());
        assert!(NtfySink::new("ntfy.sh/topic").is_err());
        assert!(NtfySink::new("https://ntfy.sh/topic").is_ok());
    }

    #[tokio::test]
    async fn posts_title_header_and_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/focus")
            .match_header("title", "Stay on target")
            .match_body("Pick one back up.")
            .with_status(200)
            .create_async()
            .await;

        let sink = NtfySink::new(&format!("{}/focus", server.url())).unwrap();
        sink.deliver(&Notification::new("Stay on target", "Pick one back up."))
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn non_success_status_is_reported() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/focus")
            .with_status(429)
            .with_body("slow down")
            .create_async()
            .await;

        let sink = NtfySink::new(&format!("{}/focus", server.url())).unwrap();
        let err = sink
            .deliver(&Notification::new("t", "b"))
            .await
            .unwrap_err();
        assert!(matches!(err, NotificationError::Rejected { status: 429, .. }));
    }
}
