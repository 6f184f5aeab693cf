//! Security event log.
//!
//! Recording is best-effort: a failed insert is logged and the event is
//! dropped, the triggering request never sees the error.

pub mod device;
pub mod email;
pub mod geo;

use crate::settings::AppSettings;
use crate::store::{AuditLog, AuditLogData, AuditLogEvent, AuditLogStore, UserStore};
use chrono::Utc;
use email::EmailQueue;
use geo::GeoLookup;
use std::sync::Arc;
use tracing::{debug, error, instrument};
use uuid::Uuid;

#[derive(Clone)]
pub struct AuditLogger {
    store: Arc<dyn AuditLogStore>,
    users: Arc<dyn UserStore>,
    geo: Arc<dyn GeoLookup>,
    settings: Arc<AppSettings>,
    emails: Option<EmailQueue>,
}

impl AuditLogger {
    #[must_use]
    pub fn new(
        store: Arc<dyn AuditLogStore>,
        users: Arc<dyn UserStore>,
        geo: Arc<dyn GeoLookup>,
        settings: Arc<AppSettings>,
    ) -> Self {
        Self {
            store,
            users,
            geo,
            settings,
            emails: None,
        }
    }

    #[must_use]
    pub fn with_email_queue(mut self, emails: EmailQueue) -> Self {
        self.emails = Some(emails);
        self
    }

    /// Persist one event. Returns the stored entry, or `None` if it was dropped.
    #[instrument(skip(self, user_agent, data), fields(event = event.as_str()))]
    pub async fn record(
        &self,
        event: AuditLogEvent,
        ip_address: &str,
        user_agent: &str,
        user_id: Uuid,
        data: AuditLogData,
    ) -> Option<AuditLog> {
        let location = geo::locate(self.geo.as_ref(), ip_address).await;
        let entry = AuditLog {
            id: Uuid::now_v7(),
            event,
            ip_address: ip_address.to_string(),
            user_agent: user_agent.to_string(),
            user_id,
            country: location.country,
            city: location.city,
            data,
            created_at: Utc::now(),
        };
        match self.store.create_audit_log(&entry).await {
            Ok(()) => Some(entry),
            Err(err) => {
                error!("Failed to create audit log: {err}");
                None
            }
        }
    }

    /// Record a sign-in and, when this device has not been seen before for
    /// the user, queue a new-device email.
    pub async fn record_sign_in_with_notification(
        &self,
        ip_address: &str,
        user_agent: &str,
        user_id: Uuid,
        data: AuditLogData,
    ) -> Option<AuditLog> {
        let entry = self
            .record(AuditLogEvent::SignIn, ip_address, user_agent, user_id, data)
            .await?;
        self.notify_new_device(&entry).await;
        Some(entry)
    }

    async fn notify_new_device(&self, entry: &AuditLog) {
        let Some(emails) = &self.emails else {
            return;
        };
        if !self.settings.email_login_notification() {
            return;
        }

        let count = match self
            .store
            .count_audit_logs(entry.user_id, &entry.ip_address, &entry.user_agent)
            .await
        {
            Ok(count) => count,
            Err(err) => {
                error!("Failed to count audit logs: {err}");
                return;
            }
        };
        if count > 1 {
            debug!("Known device, skipping notification");
            return;
        }

        let user = match self.users.get_user(entry.user_id).await {
            Ok(Some(user)) => user,
            Ok(None) => return,
            Err(err) => {
                error!("Failed to load user for notification: {err}");
                return;
            }
        };
        let device = device::describe(&entry.user_agent);
        emails.enqueue(email::new_device_message(
            &self.settings.app_name(),
            &user,
            entry,
            &device,
        ));
    }
}
