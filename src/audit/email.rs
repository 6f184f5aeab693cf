//! Outbound email abstraction and the new-device notification queue.
//!
//! Messages are handed to a bounded channel and delivered by a single
//! background worker. Enqueueing never waits: when the queue is full the
//! message is dropped with a warning. Delivery failures are logged only.

use crate::store::{AuditLog, User};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmailMessage {
    pub to_email: String,
    pub subject: String,
    pub body: String,
}

/// Email delivery abstraction used by the notification worker.
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<()>;
}

/// Logs the message instead of sending it.
#[derive(Clone, Debug)]
pub struct LogEmailSender;

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        info!(
            to_email = %message.to_email,
            subject = %message.subject,
            "email send stub"
        );
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct EmailQueue {
    tx: mpsc::Sender<EmailMessage>,
}

impl EmailQueue {
    /// Queue handle plus the receiving end for [`spawn_worker`].
    #[must_use]
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<EmailMessage>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Returns `false` when the message was dropped.
    pub fn enqueue(&self, message: EmailMessage) -> bool {
        match self.tx.try_send(message) {
            Ok(()) => true,
            Err(TrySendError::Full(message)) => {
                warn!(to_email = %message.to_email, "Email queue full, dropping message");
                false
            }
            Err(TrySendError::Closed(_)) => {
                warn!("Email worker stopped, dropping message");
                false
            }
        }
    }
}

/// Drain `rx` until every [`EmailQueue`] handle is dropped.
pub fn spawn_worker(
    mut rx: mpsc::Receiver<EmailMessage>,
    sender: Arc<dyn EmailSender>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if let Err(err) = sender.send(&message).await {
                error!(to_email = %message.to_email, "Failed to send email: {err:#}");
            }
        }
    })
}

#[must_use]
pub fn new_device_message(
    app_name: &str,
    user: &User,
    entry: &AuditLog,
    device: &str,
) -> EmailMessage {
    let location = match (&entry.city, &entry.country) {
        (Some(city), Some(country)) if city == country => city.clone(),
        (Some(city), Some(country)) => format!("{city}, {country}"),
        (None, Some(country)) => country.clone(),
        (Some(city), None) => city.clone(),
        (None, None) => "Unknown location".to_string(),
    };
    EmailMessage {
        to_email: user.email.clone(),
        subject: format!("New device login with {app_name}"),
        body: format!(
            "Hi {},\n\nYour {app_name} account was used to sign in from a new device.\n\n\
             Device: {device}\nLocation: {location}\nIP address: {}\nTime: {}\n\n\
             If this was not you, remove the passkey you do not recognize.",
            user.first_name,
            entry.ip_address,
            entry.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
        ),
    }
}
