//! Command handlers for the Pixvault CLI.

pub mod config;
pub mod edit;
pub mod images;
pub mod search;
pub mod upload;

use std::path::{Path, PathBuf};

use clap::ValueEnum;
use pixvault_core::{Config, ConfigStore, Library, Principal, Role};
use serde::Serialize;

/// Role accepted by `--role`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RoleArg {
    Pending,
    User,
    Admin,
}

impl From<RoleArg> for Role {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::Pending => Role::Pending,
            RoleArg::User => Role::User,
            RoleArg::Admin => Role::Admin,
        }
    }
}

/// The acting principal and where its configuration lives.
pub struct Session {
    store: ConfigStore,
    principal: Principal,
}

impl Session {
    pub fn new(config_path: Option<&str>, user_id: i64, role: Role) -> Self {
        let path = config_path
            .map(|p| PathBuf::from(shellexpand::tilde(p).into_owned()))
            .unwrap_or_else(Config::default_path);
        Self {
            store: ConfigStore::new(path),
            principal: Principal::new(user_id, role),
        }
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn config_path(&self) -> &Path {
        self.store.path()
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    /// Current configuration; a missing file yields defaults.
    pub fn config(&self) -> anyhow::Result<Config> {
        Ok(self.store.get()?.config.clone())
    }

    /// Open the library named by the current configuration.
    pub fn library(&self) -> anyhow::Result<Library> {
        Ok(Library::open(self.config()?)?)
    }
}

/// Print a value as pretty JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
