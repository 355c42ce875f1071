//! Free-space probe for the monitored directory.

use std::io;
use std::path::{Path, PathBuf};

use crate::error::{GuardError, Result};

const BYTES_PER_GB: u64 = 1024 * 1024 * 1024;

/// Capacity of the filesystem holding the monitored path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskUsage {
    /// Space available to unprivileged users.
    pub available_bytes: u64,
    pub total_bytes: u64,
}

impl DiskUsage {
    pub fn from_gb(available_gb: u64, total_gb: u64) -> Self {
        Self {
            available_bytes: available_gb * BYTES_PER_GB,
            total_bytes: total_gb * BYTES_PER_GB,
        }
    }

    /// Whole gigabytes available, truncated.
    pub fn available_gb(&self) -> u64 {
        self.available_bytes / BYTES_PER_GB
    }

    /// Whole gigabytes total, truncated.
    pub fn total_gb(&self) -> u64 {
        self.total_bytes / BYTES_PER_GB
    }

    /// Share of the filesystem in use, floored to a whole percent.
    /// An empty (zero-sized) filesystem reports 0.
    pub fn percent_used(&self) -> u8 {
        if self.total_bytes == 0 {
            return 0;
        }
        let used = self.total_bytes.saturating_sub(self.available_bytes) as u128;
        (used * 100 / self.total_bytes as u128) as u8
    }
}

/// Something that can report free space. Queried once per polling cycle.
pub trait DiskSpaceSource: Send + Sync {
    fn usage(&self) -> Result<DiskUsage>;

    /// Path being reported on, for status output.
    fn path(&self) -> &Path;
}

/// Probe backed by `statvfs(2)`. Every call hits the filesystem; nothing is cached.
#[derive(Debug, Clone)]
pub struct StatvfsProbe {
    path: PathBuf,
}

impl StatvfsProbe {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl DiskSpaceSource for StatvfsProbe {
    fn usage(&self) -> Result<DiskUsage> {
        let usage = statvfs(&self.path).map_err(|source| GuardError::Io {
            path: self.path.clone(),
            source,
        })?;
        tracing::debug!(
            path = %self.path.display(),
            available_bytes = usage.available_bytes,
            total_bytes = usage.total_bytes,
            "disk usage sampled"
        );
        Ok(usage)
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(unix)]
#[allow(clippy::unnecessary_cast)]
fn statvfs(path: &Path) -> io::Result<DiskUsage> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let c_path = CString::new(path.as_os_str().as_bytes())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

    let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
    let ret = unsafe { libc::statvfs(c_path.as_ptr(), &mut stat) };
    if ret != 0 {
        return Err(io::Error::last_os_error());
    }

    let frsize = stat.f_frsize as u64;
    Ok(DiskUsage {
        available_bytes: (stat.f_bavail as u64).saturating_mul(frsize),
        total_bytes: (stat.f_blocks as u64).saturating_mul(frsize),
    })
}

#[cfg(not(unix))]
fn statvfs(_path: &Path) -> io::Result<DiskUsage> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "statvfs is only available on unix",
    ))
}
