//! The `pixvault config` command for configuration management.

use clap::{Args, Subcommand};
use pixvault_core::Config;

use super::Session;

/// Arguments for the `config` command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Subcommands for configuration management.
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Display current configuration
    Show,

    /// Show config file path
    Path,

    /// Initialize a new config file with defaults
    Init {
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
}

/// Execute the config command.
pub fn execute(session: &Session, args: ConfigArgs) -> anyhow::Result<()> {
    match args.command {
        ConfigCommand::Show => {
            let snapshot = session.store().get()?;
            let toml = snapshot.config.to_toml()?;
            println!("{}", toml);
        }

        ConfigCommand::Path => {
            println!("{}", session.config_path().display());
        }

        ConfigCommand::Init { force } => {
            let path = session.config_path();

            if path.exists() && !force {
                anyhow::bail!(
                    "Config file already exists at: {}\nUse --force to overwrite.",
                    path.display()
                );
            }

            let snapshot = session.store().write(&Config::default())?;
            tracing::debug!("Config snapshot v{} published", snapshot.version);
            println!("Configuration initialized at: {}", path.display());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pixvault_core::Role;
    use tempfile::TempDir;

    fn init(session: &Session, force: bool) -> anyhow::Result<()> {
        execute(
            session,
            ConfigArgs {
                command: ConfigCommand::Init { force },
            },
        )
    }

    #[test]
    fn test_init_writes_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let session = Session::new(path.to_str(), 1, Role::User);

        init(&session, false).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("[storage]"));
    }

    #[test]
    fn test_init_refuses_to_overwrite_without_force() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "# hand-edited\n").unwrap();
        let session = Session::new(path.to_str(), 1, Role::User);

        let err = init(&session, false).unwrap_err();
        assert!(err.to_string().contains("--force"), "unexpected error: {err}");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# hand-edited\n");

        init(&session, true).unwrap();
        assert_ne!(std::fs::read_to_string(&path).unwrap(), "# hand-edited\n");
    }
}
