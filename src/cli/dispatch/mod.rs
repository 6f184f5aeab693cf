//! Map validated CLI arguments to the action to run.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{
    ARG_APP_NAME, ARG_APP_URL, ARG_DSN, ARG_EMAILS_VERIFIED, ARG_EMAIL_LOGIN_NOTIFICATION,
    ARG_GEO_URL, ARG_KEYS_PATH, ARG_PORT, ARG_SESSION_DURATION, ARG_TEST_MODE,
};
use crate::settings::{DEFAULT_APP_NAME, DEFAULT_SESSION_DURATION_MINUTES};
use anyhow::{Context, Result};
use std::path::PathBuf;
use url::Url;

/// # Errors
/// Returns an error if required arguments are missing.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let app_url = matches
        .get_one::<Url>(ARG_APP_URL)
        .cloned()
        .context("missing required argument: --app-url")?;

    Ok(Action::Server(Args {
        port: matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080),
        dsn: matches.get_one::<String>(ARG_DSN).cloned(),
        app_url,
        app_name: matches
            .get_one::<String>(ARG_APP_NAME)
            .cloned()
            .unwrap_or_else(|| DEFAULT_APP_NAME.to_string()),
        keys_path: matches
            .get_one::<PathBuf>(ARG_KEYS_PATH)
            .cloned()
            .unwrap_or_else(|| PathBuf::from("data/keys")),
        session_duration_minutes: matches
            .get_one::<u32>(ARG_SESSION_DURATION)
            .copied()
            .unwrap_or(DEFAULT_SESSION_DURATION_MINUTES),
        email_login_notification: matches.get_flag(ARG_EMAIL_LOGIN_NOTIFICATION),
        emails_verified: matches.get_flag(ARG_EMAILS_VERIFIED),
        geo_url: matches.get_one::<Url>(ARG_GEO_URL).cloned(),
        test_mode: matches.get_flag(ARG_TEST_MODE),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands;

    #[test]
    fn builds_server_action() -> Result<()> {
        let matches = commands::new().try_get_matches_from(vec![
            "portero",
            "--port",
            "9090",
            "--app-url",
            "https://id.example.com",
            "--keys-path",
            "/var/lib/portero/keys",
            "--test-mode",
            "--emails-verified",
        ])?;

        let Action::Server(args) = handler(&matches)?;
        assert_eq!(args.port, 9090);
        assert_eq!(args.app_url.as_str(), "https://id.example.com/");
        assert_eq!(args.keys_path, PathBuf::from("/var/lib/portero/keys"));
        assert!(args.test_mode);
        assert!(args.emails_verified);
        assert!(!args.email_login_notification);
        Ok(())
    }
}
