//! Staged writes into the local payload slot
//!
//! Content is written to a temp file beside the slot and renamed over it only
//! once complete, so readers see either the old payload or the new one.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;

/// Size and digest of an installed payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Installed {
    pub bytes: u64,
    pub sha256: String,
}

/// A payload being written, not yet visible at the slot path
pub struct StagedSlot {
    target: PathBuf,
    file: NamedTempFile,
    hasher: Sha256,
    written: u64,
}

impl StagedSlot {
    /// Create a staging file in the slot's directory
    pub fn new(target: &Path) -> io::Result<Self> {
        let dir = match target.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        let file = tempfile::Builder::new()
            .prefix(".payload-")
            .suffix(".partial")
            .tempfile_in(&dir)?;

        Ok(Self {
            target: target.to_path_buf(),
            file,
            hasher: Sha256::new(),
            written: 0,
        })
    }

    /// Append a chunk
    pub fn write_chunk(&mut self, chunk: &[u8]) -> io::Result<()> {
        self.file.as_file_mut().write_all(chunk)?;
        self.hasher.update(chunk);
        self.written += chunk.len() as u64;
        Ok(())
    }

    /// Bytes written so far
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Flush, sync and atomically move the staged file over the slot
    pub fn commit(self) -> io::Result<Installed> {
        let StagedSlot {
            target,
            mut file,
            hasher,
            written,
        } = self;

        file.as_file_mut().flush()?;
        file.as_file().sync_all()?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.as_file()
                .set_permissions(std::fs::Permissions::from_mode(0o644))?;
        }

        file.persist(&target).map_err(|e| e.error)?;

        Ok(Installed {
            bytes: written,
            sha256: format!("{:x}", hasher.finalize()),
        })
    }
}

/// Install a complete buffer into the slot in one step
pub fn install_bytes(target: &Path, contents: &[u8]) -> io::Result<Installed> {
    let mut staged = StagedSlot::new(target)?;
    staged.write_chunk(contents)?;
    staged.commit()
}
