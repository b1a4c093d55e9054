//! CLI command definitions and handlers.

use std::fs::File;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr};
use copyfs_common::DriverConfig;

use crate::driver::{CopyDriver, Driver};

/// copyfs - copy-based container layer driver
#[derive(Parser, Debug)]
#[command(name = "copyfs")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Base directory for layers and bundles
    #[arg(long, global = true, env = "COPYFS_ROOT")]
    pub root: Option<PathBuf>,

    /// Configuration file (TOML)
    #[arg(long, global = true, env = "COPYFS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Driver commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Unpack a layer archive on top of its parent
    Unpack {
        /// Layer ID
        id: String,

        /// Parent layer ID
        #[arg(short, long)]
        parent: Option<String>,

        /// Layer archive (reads stdin when omitted)
        #[arg(short, long)]
        archive: Option<PathBuf>,
    },

    /// Assemble a container root filesystem and print its runtime spec
    Bundle {
        /// Container handle
        handle: String,

        /// Layer IDs, base layer first
        #[arg(required = true)]
        layers: Vec<String>,

        /// Keep the ownership recorded in the layers
        #[arg(long)]
        privileged: bool,
    },

    /// Exit successfully if a layer exists
    Exists {
        /// Layer ID
        id: String,
    },

    /// Delete a layer
    Delete {
        /// Layer ID
        id: String,
    },

    /// Delete a container root filesystem
    RemoveBundle {
        /// Container handle
        handle: String,
    },

    /// List layers
    List,
}

impl Cli {
    /// Resolve the driver configuration from `--config` and `--root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file cannot be loaded.
    pub fn driver_config(&self) -> Result<DriverConfig> {
        let mut config = match &self.config {
            Some(path) => DriverConfig::load(path)?,
            None => DriverConfig::new(),
        };

        if let Some(root) = &self.root {
            config = config.with_base_dir(root);
        }

        Ok(config)
    }

    /// Execute the CLI command.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver operation fails.
    pub fn execute(&self) -> Result<ExitCode> {
        let driver = CopyDriver::new(self.driver_config()?);

        match &self.command {
            Commands::Unpack {
                id,
                parent,
                archive,
            } => {
                let reader: Box<dyn Read> = match archive {
                    Some(path) => Box::new(
                        File::open(path)
                            .wrap_err_with(|| format!("opening {}", path.display()))?,
                    ),
                    None => Box::new(io::stdin().lock()),
                };
                driver.unpack(id, parent.as_deref(), reader)?;
            }
            Commands::Bundle {
                handle,
                layers,
                privileged,
            } => {
                let rootfs = driver.bundle(handle, layers, *privileged)?;
                println!("{}", rootfs.to_spec().to_json()?);
            }
            Commands::Exists { id } => {
                if !driver.exists(id) {
                    return Ok(ExitCode::FAILURE);
                }
            }
            Commands::Delete { id } => driver.delete(id)?,
            Commands::RemoveBundle { handle } => driver.remove_bundle(handle)?,
            Commands::List => {
                for id in driver.layers()? {
                    println!("{id}");
                }
            }
        }

        Ok(ExitCode::SUCCESS)
    }
}
