//! Durable sync of the journal file
//!
//! `durable_sync` maps to the strongest flush each platform offers.
//! `SyncPoint` and `should_sync` decide when the writer calls it.

use std::fs::File;
use std::io;

use crate::config::SyncPolicy;

/// Moments at which the writer may sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPoint {
    /// A record was just appended
    Record,
    /// The journal is being closed
    Close,
}

/// Whether `policy` asks for a durable sync at `point`.
pub fn should_sync(policy: SyncPolicy, point: SyncPoint) -> bool {
    match (policy, point) {
        (SyncPolicy::Never, _) => false,
        (SyncPolicy::EveryRecord, _) => true,
        (SyncPolicy::OnClose, SyncPoint::Close) => true,
        (SyncPolicy::OnClose, SyncPoint::Record) => false,
    }
}

/// Push written bytes to persistent media before returning.
///
/// - Linux: fdatasync(), data without metadata
/// - macOS/iOS: fcntl(F_FULLFSYNC), plain fsync stops at the drive cache
/// - Windows: FlushFileBuffers()
/// - elsewhere: `File::sync_data`
///
/// Blocks for as long as the device takes. Callers must not hold the queue lock.
pub fn durable_sync(file: &File) -> io::Result<()> {
    #[cfg(target_os = "linux")]
    {
        use std::os::unix::io::AsRawFd;
        // SAFETY: the fd comes from a live `File`, so it is open for the call's duration.
        let result = unsafe { libc::fdatasync(file.as_raw_fd()) };
        if result == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }

    #[cfg(any(target_os = "macos", target_os = "ios"))]
    {
        use std::os::unix::io::AsRawFd;
        // SAFETY: the fd comes from a live `File`, so it is open for the call's duration.
        let result = unsafe { libc::fcntl(file.as_raw_fd(), libc::F_FULLFSYNC) };
        if result != -1 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }

    #[cfg(target_os = "windows")]
    {
        use std::os::windows::io::AsRawHandle;
        use winapi::um::fileapi::FlushFileBuffers;
        // SAFETY: the handle comes from a live `File`.
        let result = unsafe { FlushFileBuffers(file.as_raw_handle() as *mut _) };
        if result != 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }

    #[cfg(not(any(
        target_os = "linux",
        target_os = "macos",
        target_os = "ios",
        target_os = "windows"
    )))]
    {
        file.sync_data()
    }
}
