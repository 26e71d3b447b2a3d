//! CLI flag overrides on top of `botlink-config` profiles.
//!
//! Resolution order for every setting: command-line flag (or its
//! `BOTLINK_*` env var), then the selected profile, then `[defaults]`.

use std::time::Duration;

use botlink_config::{Config, Profile};
use botlink_core::SessionConfig;
use secrecy::SecretString;

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Profile named by `--profile`, else the config's default.
pub fn active_profile_name(global: &GlobalOpts, cfg: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| cfg.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

fn available_profiles(cfg: &Config) -> String {
    if cfg.profiles.is_empty() {
        return "(none)".into();
    }
    let mut names: Vec<&str> = cfg.profiles.keys().map(String::as_str).collect();
    names.sort_unstable();
    names.join(", ")
}

/// Build a `SessionConfig` from the config file, profile, and CLI overrides.
pub fn build_session_config(global: &GlobalOpts) -> Result<SessionConfig, CliError> {
    let cfg = botlink_config::load_config()?;
    resolve_session_config(&cfg, global)
}

pub fn resolve_session_config(cfg: &Config, global: &GlobalOpts) -> Result<SessionConfig, CliError> {
    let name = active_profile_name(global, cfg);

    let profile = match cfg.profiles.get(&name) {
        Some(profile) => profile.clone(),
        // An explicitly requested profile must exist.
        None if global.profile.is_some() => {
            return Err(CliError::ProfileNotFound {
                available: available_profiles(cfg),
                name,
            });
        }
        // No profile: build one from flags / env vars alone.
        None => Profile {
            url: global.url.clone().ok_or_else(|| CliError::NoConfig {
                path: botlink_config::config_path().display().to_string(),
            })?,
            ..Profile::default()
        },
    };

    let mut session = botlink_config::profile_to_session_config(&profile, &cfg.defaults)?;

    if let Some(ref url) = global.url {
        session.client.base_url = botlink_config::parse_url(url)?;
    }
    if let Some(ref token) = global.token {
        session.client.token = Some(SecretString::from(token.clone()));
    }
    if let Some(secs) = global.timeout {
        session.client.timeout = Duration::from_secs(secs);
    }
    if global.no_push {
        session.sync.push_enabled = false;
    }

    tracing::debug!(
        profile = %name,
        base_url = %session.client.base_url,
        push = session.sync.push_enabled,
        "resolved session config"
    );
    Ok(session)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use clap::Parser;
    use secrecy::ExposeSecret;

    use super::*;
    use crate::cli::Cli;

    fn global(args: &[&str]) -> GlobalOpts {
        let mut argv = vec!["botlink"];
        argv.extend_from_slice(args);
        argv.push("health");
        Cli::try_parse_from(argv).unwrap().global
    }

    fn with_lab() -> Config {
        let mut cfg = Config::default();
        cfg.profiles.insert(
            "lab".into(),
            Profile {
                url: "http://10.0.0.7:8000".into(),
                token: Some("lab-token".into()),
                ..Profile::default()
            },
        );
        cfg.default_profile = Some("lab".into());
        cfg
    }

    #[test]
    fn default_profile_is_used() {
        let session = resolve_session_config(&with_lab(), &global(&[])).unwrap();
        assert_eq!(session.client.base_url.as_str(), "http://10.0.0.7:8000/");
        assert_eq!(
            session.client.token.unwrap().expose_secret(),
            "lab-token"
        );
    }

    #[test]
    fn flags_override_profile() {
        let opts = global(&[
            "--url",
            "http://10.0.0.9:9000",
            "--token",
            "flag-token",
            "--timeout",
            "3",
            "--no-push",
        ]);
        let session = resolve_session_config(&with_lab(), &opts).unwrap();
        assert_eq!(session.client.base_url.as_str(), "http://10.0.0.9:9000/");
        assert_eq!(
            session.client.token.unwrap().expose_secret(),
            "flag-token"
        );
        assert_eq!(session.client.timeout, Duration::from_secs(3));
        assert!(!session.sync.push_enabled);
    }

    #[test]
    fn url_flag_alone_is_enough() {
        let opts = global(&["--url", "http://robot.local:8000"]);
        let session = resolve_session_config(&Config::default(), &opts).unwrap();
        assert_eq!(session.client.base_url.host_str(), Some("robot.local"));
        assert!(session.client.token.is_none());
    }

    #[test]
    fn missing_everything_is_no_config() {
        let err = resolve_session_config(&Config::default(), &global(&[])).unwrap_err();
        assert!(matches!(err, CliError::NoConfig { .. }));
    }

    #[test]
    fn unknown_explicit_profile_lists_available() {
        let err = resolve_session_config(&with_lab(), &global(&["-p", "garage"])).unwrap_err();
        match err {
            CliError::ProfileNotFound { name, available } => {
                assert_eq!(name, "garage");
                assert_eq!(available, "lab");
            }
            other => panic!("expected ProfileNotFound, got: {other:?}"),
        }
    }
}
