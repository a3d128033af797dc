//! Closing inherited file descriptors
//!
//! Everything except the standard streams and the descriptor designated
//! on the command line is closed before any other setup runs.

use log::debug;
use nix::errno::Errno;
use nix::unistd::close;
use nsbridge_core::{IsolationError, Result};
use std::fs;
use std::os::unix::io::RawFd;

/// Highest standard stream descriptor
const STDERR: RawFd = 2;

/// Find the descriptor designated with `--fd N`, `--fd=N`, `-F N` or
/// `-FN`. `args` excludes the program name. The last occurrence wins.
pub fn designated_fd<S: AsRef<str>>(args: &[S]) -> Result<Option<RawFd>> {
    let mut fd = None;
    let mut iter = args.iter().map(AsRef::as_ref);

    while let Some(arg) = iter.next() {
        let value = if arg == "--fd" || arg == "-F" {
            iter.next().ok_or_else(|| {
                IsolationError::InvalidConfig(format!("{} requires a descriptor number", arg))
            })?
        } else if let Some(value) = arg.strip_prefix("--fd=") {
            value
        } else if let Some(value) = arg.strip_prefix("-F") {
            value
        } else {
            continue;
        };

        fd = Some(parse_fd(value)?);
    }

    Ok(fd)
}

fn parse_fd(value: &str) -> Result<RawFd> {
    match value.parse::<RawFd>() {
        Ok(fd) if fd >= 0 => Ok(fd),
        _ => Err(IsolationError::InvalidConfig(format!(
            "Invalid --fd: {}",
            value
        ))),
    }
}

/// Descriptor ranges to close, leaving stdio and `keep` open
pub fn close_ranges(keep: Option<RawFd>) -> Vec<(u32, u32)> {
    match keep {
        Some(fd) if fd > STDERR => {
            let fd = fd as u32;
            let mut ranges = Vec::with_capacity(2);
            if fd > 3 {
                ranges.push((3, fd - 1));
            }
            ranges.push((fd + 1, u32::MAX));
            ranges
        }
        _ => vec![(3, u32::MAX)],
    }
}

fn close_range(first: u32, last: u32) -> nix::Result<()> {
    let ret = unsafe { libc::syscall(libc::SYS_close_range, first, last, 0u32) };
    Errno::result(ret).map(drop)
}

/// Close all inherited descriptors but stdio and `keep`
pub fn close_open_files(keep: Option<RawFd>) -> Result<()> {
    for (first, last) in close_ranges(keep) {
        match close_range(first, last) {
            Ok(()) => {}
            Err(Errno::ENOSYS) => {
                debug!("close_range() not available, walking /proc/self/fd");
                return close_listed(keep);
            }
            Err(e) => {
                return Err(IsolationError::syscall(
                    format!("Failed to close files from {}", first),
                    e,
                ));
            }
        }
    }
    Ok(())
}

/// Fallback for kernels without close_range(2)
fn close_listed(keep: Option<RawFd>) -> Result<()> {
    let fds: Vec<RawFd> = fs::read_dir("/proc/self/fd")?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().to_str()?.parse().ok())
        .filter(|&fd| fd > STDERR && Some(fd) != keep)
        .collect();

    for fd in fds {
        match close(fd) {
            // The directory stream's own descriptor is already gone
            Ok(()) | Err(Errno::EBADF) => {}
            Err(e) => {
                return Err(IsolationError::syscall(format!("Failed to close fd {}", fd), e));
            }
        }
    }
    Ok(())
}
