//! Per-process resource limits applied in the child before exec.
//!
//! Everything here runs between fork and exec, so it must stay
//! async-signal-safe: no allocation, no logging.

use crate::config::types::{OwnerId, ResourceLimits};
use std::io;

#[cfg(unix)]
fn apply_rlimit_value(resource: libc::__rlimit_resource_t, soft: u64, hard: u64) -> io::Result<()> {
    let limit = libc::rlimit {
        rlim_cur: soft as libc::rlim_t,
        rlim_max: hard as libc::rlim_t,
    };

    let rc = unsafe { libc::setrlimit(resource, &limit) };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

/// RLIMIT_CPU works in whole seconds; round up, never below one
pub fn cpu_seconds(time_limit_millis: u64) -> u64 {
    time_limit_millis.div_ceil(1000).max(1)
}

/// Address space ceiling under a memory limit.
///
/// Memory is judged on peak RSS by the supervisor; this only bounds runaway
/// reservations.
pub fn address_space_ceiling(memory_limit_bytes: u64) -> u64 {
    memory_limit_bytes
        .saturating_mul(4)
        .max(memory_limit_bytes.saturating_add(1 << 30))
}

/// Apply `limits` to the calling process.
///
/// The CPU soft limit raises SIGXCPU, the hard limit one second later kills.
/// Exceeding the output limit raises SIGXFSZ. RLIMIT_NPROC counts every process
/// of the real uid, so it is only set for a dedicated identity, one above the
/// limit so the supervisor observes the breach.
pub fn apply(limits: &ResourceLimits, dedicated_identity: bool) -> io::Result<()> {
    apply_rlimit_value(libc::RLIMIT_CORE, 0, 0)?;

    if let Some(millis) = limits.time_limit_millis {
        let seconds = cpu_seconds(millis);
        apply_rlimit_value(libc::RLIMIT_CPU, seconds, seconds + 1)?;
    }
    if let Some(bytes) = limits.memory_limit_bytes {
        let ceiling = address_space_ceiling(bytes);
        apply_rlimit_value(libc::RLIMIT_AS, ceiling, ceiling)?;
    }
    if let Some(bytes) = limits.output_limit_bytes {
        apply_rlimit_value(libc::RLIMIT_FSIZE, bytes, bytes)?;
    }
    if let (Some(count), true) = (limits.number_of_processes, dedicated_identity) {
        let count = count.saturating_add(1);
        apply_rlimit_value(libc::RLIMIT_NPROC, count, count)?;
    }
    Ok(())
}

/// Drop supplementary groups, then switch gid and uid, in that order
pub fn switch_identity(owner_id: OwnerId) -> io::Result<()> {
    unsafe {
        if libc::setgroups(0, std::ptr::null()) != 0 {
            return Err(io::Error::last_os_error());
        }
        if libc::setgid(owner_id.gid) != 0 {
            return Err(io::Error::last_os_error());
        }
        if libc::setuid(owner_id.uid) != 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}
