//! Shared backend config root.
//!
//! Backends read their configuration from fixed locations under
//! `XDG_CONFIG_HOME`. Every attempt points that variable at the same
//! directory, so at most one attempt may hold it at a time. A lease clears
//! the directory when taken and again when dropped.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// Location of the shared config root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigRoot {
    path: PathBuf,
}

impl ConfigRoot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Takes the root for one attempt. Requires `&mut self` so two leases
    /// on the same root cannot coexist.
    pub fn acquire(&mut self) -> io::Result<ConfigLease<'_>> {
        clear(&self.path)?;
        fs::create_dir_all(&self.path)?;
        debug!("Acquired config root {}", self.path.display());
        Ok(ConfigLease { root: self })
    }
}

fn clear(path: &Path) -> io::Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Exclusive use of the config root; cleared on drop.
#[derive(Debug)]
pub struct ConfigLease<'a> {
    root: &'a mut ConfigRoot,
}

impl ConfigLease<'_> {
    pub fn path(&self) -> &Path {
        &self.root.path
    }
}

impl Drop for ConfigLease<'_> {
    fn drop(&mut self) {
        if let Err(e) = clear(&self.root.path) {
            warn!("Failed to clear config root {}: {}", self.root.path.display(), e);
        }
    }
}
