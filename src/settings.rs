//! Runtime-tunable application settings.
//!
//! Values here may change while the server runs, so consumers read them on
//! every use instead of caching a copy.

use std::sync::{PoisonError, RwLock};

pub const DEFAULT_APP_NAME: &str = "Portero";
pub const DEFAULT_SESSION_DURATION_MINUTES: u32 = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsValues {
    pub app_name: String,
    pub session_duration_minutes: u32,
    pub email_login_notification: bool,
    /// Value of the `email_verified` claim for every user.
    pub emails_verified: bool,
}

impl Default for SettingsValues {
    fn default() -> Self {
        Self {
            app_name: DEFAULT_APP_NAME.to_string(),
            session_duration_minutes: DEFAULT_SESSION_DURATION_MINUTES,
            email_login_notification: false,
            emails_verified: false,
        }
    }
}

#[derive(Debug, Default)]
pub struct AppSettings {
    values: RwLock<SettingsValues>,
}

impl AppSettings {
    #[must_use]
    pub fn new(values: SettingsValues) -> Self {
        Self {
            values: RwLock::new(values),
        }
    }

    #[must_use]
    pub fn session_duration_minutes(&self) -> u32 {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .session_duration_minutes
    }

    #[must_use]
    pub fn email_login_notification(&self) -> bool {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .email_login_notification
    }

    #[must_use]
    pub fn emails_verified(&self) -> bool {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .emails_verified
    }

    #[must_use]
    pub fn app_name(&self) -> String {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .app_name
            .clone()
    }

    /// Apply `update` to the current values.
    pub fn update(&self, update: impl FnOnce(&mut SettingsValues)) {
        let mut values = self.values.write().unwrap_or_else(PoisonError::into_inner);
        update(&mut values);
    }
}
