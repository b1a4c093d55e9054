//! # copyfs
//!
//! A copy-based filesystem layer driver for container images.
//!
//! Every layer is stored as a complete, flattened filesystem tree: unpacking
//! a layer copies its parent's tree and extracts the layer archive on top.
//! A container bundle is a private copy of the leaf layer of its chain, with
//! ownership remapped to an unprivileged identity unless the container is
//! privileged.
//!
//! ```text
//! <root>/
//! ├── volumes/
//! │   ├── base/      archive(base)
//! │   └── app/       copy(base) + archive(app)
//! └── diffs/
//!     └── web-1/     copy(app), chowned to 4294967294:4294967294
//! ```
//!
//! ## Usage
//!
//! ```no_run
//! use copyfs::{CopyDriver, Driver};
//! use copyfs_common::DriverConfig;
//!
//! # fn example() -> copyfs_common::CopyFsResult<()> {
//! let driver = CopyDriver::new(DriverConfig::new().with_base_dir("/var/lib/copyfs"));
//!
//! driver.unpack("base", None, std::fs::File::open("base.tar")?)?;
//! driver.unpack("app", Some("base"), std::fs::File::open("app.tar")?)?;
//!
//! let rootfs = driver.bundle("web-1", &["base", "app"], false)?;
//! println!("{}", rootfs.to_spec().to_json().unwrap_or_default());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod bundle;
pub mod cli;
pub mod compose;
pub mod driver;
pub mod filesystem;
pub mod store;

pub use bundle::RootFsDescriptor;
pub use driver::{CopyDriver, Driver};
pub use store::VolumeStore;
