//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand};

/// Arguments shared by the commands that run components.
#[derive(Debug, Clone, Default, Args)]
pub struct RunCommand {
    /// Override the HTTP port
    #[arg(long, value_name = "PORT")]
    pub http_port: Option<u16>,

    /// Override the site root directory
    #[arg(long, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Override the persisted log directory
    #[arg(long, value_name = "DIR")]
    pub storage_dir: Option<PathBuf>,

    /// Disable echoing datagrams back to their sender
    #[arg(long)]
    pub no_echo: bool,
}

impl RunCommand {
    /// Apply the overrides to a loaded configuration.
    pub fn apply(&self, config: &mut crate::Config) {
        if let Some(port) = self.http_port {
            config.http.port = port;
        }
        if let Some(root) = &self.root {
            config.http.root.clone_from(root);
        }
        if let Some(dir) = &self.storage_dir {
            config.storage.dir.clone_from(dir);
        }
        if self.no_echo {
            config.collector.echo = false;
        }
    }
}

/// Persisted log commands.
#[derive(Debug, Subcommand)]
pub enum LogCommand {
    /// Print stored submissions
    Show {
        /// Only show the last N entries
        #[arg(short, long)]
        last: Option<usize>,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Summarize the persisted log
    Stats {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_command_apply() {
        let cmd = RunCommand {
            http_port: Some(8080),
            root: Some(PathBuf::from("/srv/site")),
            storage_dir: Some(PathBuf::from("/var/lib/formrelay")),
            no_echo: true,
        };
        let mut config = crate::Config::default();
        cmd.apply(&mut config);

        assert_eq!(config.http.port, 8080);
        assert_eq!(config.http.root, PathBuf::from("/srv/site"));
        assert_eq!(config.storage.dir, PathBuf::from("/var/lib/formrelay"));
        assert!(!config.collector.echo);
    }

    #[test]
    fn test_run_command_default_changes_nothing() {
        let mut config = crate::Config::default();
        RunCommand::default().apply(&mut config);
        assert_eq!(config, crate::Config::default());
    }

    #[test]
    fn test_log_command_debug() {
        let cmd = LogCommand::Show {
            last: Some(5),
            json: false,
        };
        let debug_str = format!("{cmd:?}");
        assert!(debug_str.contains("Show"));
        assert!(debug_str.contains("last"));
    }

    #[test]
    fn test_config_command_debug() {
        let cmd = ConfigCommand::Show { json: false };
        let debug_str = format!("{cmd:?}");
        assert!(debug_str.contains("Show"));
    }
}
