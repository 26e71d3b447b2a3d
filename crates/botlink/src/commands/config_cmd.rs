//! Config subcommand handlers.

use botlink_config::{Config, Profile};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

const REDACTED: &str = "********";

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Init {
            name,
            device_url,
            token_env,
            poll_only,
            set_default,
            force,
        } => {
            botlink_config::parse_url(&device_url)?;

            let mut cfg = botlink_config::load_config()?;
            if cfg.profiles.contains_key(&name) && !force {
                return Err(CliError::ProfileExists { name });
            }

            let first = cfg.profiles.is_empty();
            cfg.profiles.insert(
                name.clone(),
                Profile {
                    url: device_url,
                    token_env,
                    push: poll_only.then_some(false),
                    ..Profile::default()
                },
            );
            if set_default || first {
                cfg.default_profile = Some(name.clone());
            }

            let path = botlink_config::save_config(&cfg)?;
            if !global.quiet {
                eprintln!("Profile '{name}' written to {}", path.display());
            }
            Ok(())
        }

        ConfigCommand::Show => {
            let cfg = redacted(botlink_config::load_config()?);
            let rendered = match global.output {
                OutputFormat::Plain => toml::to_string_pretty(&cfg)?,
                OutputFormat::Json => serde_json::to_string_pretty(&cfg)?,
                OutputFormat::JsonCompact => serde_json::to_string(&cfg)?,
            };
            output::print_output(rendered.trim_end(), global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            output::print_output(
                &botlink_config::config_path().display().to_string(),
                global.quiet,
            );
            Ok(())
        }
    }
}

fn redacted(mut cfg: Config) -> Config {
    for profile in cfg.profiles.values_mut() {
        if profile.token.is_some() {
            profile.token = Some(REDACTED.into());
        }
    }
    cfg
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn show_never_prints_tokens() {
        let mut cfg = Config::default();
        cfg.profiles.insert(
            "lab".into(),
            Profile {
                url: "http://10.0.0.7:8000".into(),
                token: Some("s3cret".into()),
                ..Profile::default()
            },
        );
        let cfg = redacted(cfg);
        assert_eq!(cfg.profiles["lab"].token.as_deref(), Some(REDACTED));
    }
}
