//! Down notifications
//!
//! A [`Notifier`] delivers one [`AlertMessage`] per down episode. The
//! deduplicator decides *when* to notify; this module only decides *how*.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use crate::config::{Alert, Webhook};
use crate::{LifecycleStatus, WorkloadSnapshot};

/// Path of the control endpoint that restarts a container
pub const RESTART_PATH: &str = "/monitor?containerid=";

/// Rendered subject and plain-text body of a down notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertMessage {
    pub subject: String,
    pub body: String,
}

impl AlertMessage {
    /// Render the notification for `snapshot`, the last running state of a
    /// workload observed down at `observed_at`.
    pub fn render(
        snapshot: &WorkloadSnapshot,
        observed_at: DateTime<Utc>,
        restart_base_url: &str,
    ) -> Self {
        let subject = format!("Attention: {} container down", snapshot.name);

        let body = format!(
            "Application {name} went down at {time} on {day} (UTC). Please investigate\n\n\
             DETAILS:\n\
             ContainerName: {name}\n\
             ContainerID: {id}\n\
             ContainerNetwork: {network}\n\
             Image: {image}\n\
             CurrentStatus: {status}\n\
             StartedAt: {started}\n\
             LinkToStartContainer: {link}",
            name = snapshot.name,
            time = observed_at.format("%H:%M:%S"),
            day = observed_at.format("%B %-d, %Y"),
            id = snapshot.id,
            network = snapshot.network,
            image = snapshot.image_name,
            status = LifecycleStatus::Stop,
            started = snapshot.runtime_status_text,
            link = restart_link(restart_base_url, &snapshot.id),
        );

        Self { subject, body }
    }
}

pub fn restart_link(restart_base_url: &str, container_id: &str) -> String {
    format!(
        "{}{RESTART_PATH}{container_id}",
        restart_base_url.trim_end_matches('/')
    )
}

/// Delivery channel for down notifications
///
/// Implementations must tolerate concurrent calls from several dedup tasks.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, snapshot: &WorkloadSnapshot, observed_at: DateTime<Utc>)
    -> anyhow::Result<()>;
}

/// Notifier used when no alert channel is configured: logs and succeeds
#[derive(Debug, Clone)]
pub struct LogNotifier {
    restart_base_url: String,
}

impl LogNotifier {
    pub fn new(restart_base_url: impl Into<String>) -> Self {
        Self {
            restart_base_url: restart_base_url.into(),
        }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(
        &self,
        snapshot: &WorkloadSnapshot,
        observed_at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let message = AlertMessage::render(snapshot, observed_at, &self.restart_base_url);
        warn!("{}: {}", message.subject, message.body);
        Ok(())
    }
}

/// Posts a JSON payload to a webhook
#[derive(Debug)]
pub struct WebhookNotifier {
    client: Client,
    webhook: Webhook,
    restart_base_url: String,
    lock: Mutex<()>,
}

impl WebhookNotifier {
    /// `timeout` bounds every request, so a hung endpoint fails the send.
    pub fn new(
        webhook: Webhook,
        restart_base_url: impl Into<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build webhook client")?;

        Ok(Self {
            client,
            webhook,
            restart_base_url: restart_base_url.into(),
            lock: Mutex::new(()),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    #[instrument(skip(self, snapshot), fields(container = %snapshot.name))]
    async fn send(
        &self,
        snapshot: &WorkloadSnapshot,
        observed_at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let message = AlertMessage::render(snapshot, observed_at, &self.restart_base_url);
        let payload = json!({
            "message": message.body,
            "subject": message.subject,
            "container": snapshot.name,
            "container_id": snapshot.id,
            "timestamp": observed_at.to_rfc3339()
        });

        let _guard = self.lock.lock().await;
        let response = self.client.post(&self.webhook.url).json(&payload).send().await?;

        if !response.status().is_success() {
            anyhow::bail!("webhook alert failed with status: {}", response.status());
        }

        info!("successfully sent webhook alert");
        Ok(())
    }
}

#[cfg(feature = "email")]
pub use email::EmailNotifier;

#[cfg(feature = "email")]
mod email {
    use std::time::Duration;

    use anyhow::Context;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use lettre::message::Mailbox;
    use lettre::message::header::ContentType;
    use lettre::transport::smtp::authentication::Credentials;
    use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
    use tokio::sync::Mutex;
    use tracing::{info, instrument};

    use super::{AlertMessage, Notifier};
    use crate::WorkloadSnapshot;
    use crate::config::Email;

    /// Sends notifications over SMTP (STARTTLS relay)
    pub struct EmailNotifier<T = AsyncSmtpTransport<Tokio1Executor>> {
        transport: T,
        from: Mailbox,
        to: Mailbox,
        restart_base_url: String,
        lock: Mutex<()>,
    }

    impl EmailNotifier {
        /// Connects lazily; `timeout` bounds each SMTP exchange.
        pub fn new(
            config: &Email,
            restart_base_url: impl Into<String>,
            timeout: Duration,
        ) -> anyhow::Result<Self> {
            let (host, port) = match config.smtp_server.rsplit_once(':') {
                Some((host, port)) => (
                    host,
                    Some(port.parse::<u16>().with_context(|| {
                        format!("invalid SMTP port in {}", config.smtp_server)
                    })?),
                ),
                None => (config.smtp_server.as_str(), None),
            };

            let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                .context("failed to set up SMTP relay")?
                .credentials(Credentials::new(
                    config.username.clone(),
                    config.password.clone(),
                ))
                .timeout(Some(timeout));
            if let Some(port) = port {
                builder = builder.port(port);
            }

            let from = config
                .from
                .as_deref()
                .unwrap_or(&config.username)
                .parse::<Mailbox>()
                .context("invalid sender address")?;
            let to = config
                .to
                .parse::<Mailbox>()
                .context("invalid recipient address")?;

            Ok(Self::with_transport(builder.build(), from, to, restart_base_url))
        }
    }

    impl<T> EmailNotifier<T> {
        pub fn with_transport(
            transport: T,
            from: Mailbox,
            to: Mailbox,
            restart_base_url: impl Into<String>,
        ) -> Self {
            Self {
                transport,
                from,
                to,
                restart_base_url: restart_base_url.into(),
                lock: Mutex::new(()),
            }
        }

        fn message(
            &self,
            snapshot: &WorkloadSnapshot,
            observed_at: DateTime<Utc>,
        ) -> anyhow::Result<Message> {
            let message = AlertMessage::render(snapshot, observed_at, &self.restart_base_url);
            Message::builder()
                .from(self.from.clone())
                .to(self.to.clone())
                .subject(message.subject)
                .header(ContentType::TEXT_PLAIN)
                .body(message.body)
                .context("failed to build email")
        }
    }

    #[async_trait]
    impl<T> Notifier for EmailNotifier<T>
    where
        T: AsyncTransport + Send + Sync,
        T::Error: std::error::Error + Send + Sync + 'static,
    {
        #[instrument(skip(self, snapshot), fields(container = %snapshot.name))]
        async fn send(
            &self,
            snapshot: &WorkloadSnapshot,
            observed_at: DateTime<Utc>,
        ) -> anyhow::Result<()> {
            let email = self.message(snapshot, observed_at)?;

            let _guard = self.lock.lock().await;
            self.transport
                .send(email)
                .await
                .context("failed to send email")?;

            info!("successfully sent email alert");
            Ok(())
        }
    }
}

/// Build the notifier for the configured alert channel.
///
/// `timeout` bounds a single delivery attempt of the transport.
pub fn build_notifier(
    alert: Option<&Alert>,
    restart_base_url: &str,
    timeout: Duration,
) -> anyhow::Result<Arc<dyn Notifier>> {
    match alert {
        None => Ok(Arc::new(LogNotifier::new(restart_base_url))),
        Some(Alert::Webhook(webhook)) => Ok(Arc::new(WebhookNotifier::new(
            webhook.clone(),
            restart_base_url,
            timeout,
        )?)),
        #[cfg(feature = "email")]
        Some(Alert::Email(email)) => Ok(Arc::new(EmailNotifier::new(
            email,
            restart_base_url,
            timeout,
        )?)),
        #[cfg(not(feature = "email"))]
        Some(Alert::Email(_)) => {
            anyhow::bail!("email alerts require the `email` feature")
        }
    }
}
