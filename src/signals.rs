// src/signals.rs
//! SIGINT and SIGTERM forwarded to the scheduler's stop flag.

use std::{
    io,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, OnceLock,
    },
};

use crate::error::{BandscopeError, Result};

static STOP: OnceLock<Arc<AtomicBool>> = OnceLock::new();

/// Set `stop` when the process receives SIGINT or SIGTERM.
///
/// Only one flag can be installed per process.
pub fn forward_termination(stop: Arc<AtomicBool>) -> Result<()> {
    STOP.set(stop).map_err(|_| {
        BandscopeError::Io(io::Error::new(
            io::ErrorKind::AlreadyExists,
            "termination handler already installed",
        ))
    })?;
    install()
}

#[cfg(unix)]
fn install() -> Result<()> {
    for signal in [libc::SIGINT, libc::SIGTERM] {
        // SAFETY: the handler only performs an atomic store
        let status = unsafe {
            let mut action: libc::sigaction = std::mem::zeroed();
            let handler: extern "C" fn(libc::c_int) = on_termination;
            action.sa_sigaction = handler as libc::sighandler_t;
            libc::sigemptyset(&mut action.sa_mask);
            libc::sigaction(signal, &action, std::ptr::null_mut())
        };
        if status != 0 {
            return Err(BandscopeError::Io(io::Error::last_os_error()));
        }
    }
    Ok(())
}

#[cfg(not(unix))]
fn install() -> Result<()> {
    Ok(())
}

#[cfg(unix)]
extern "C" fn on_termination(_: libc::c_int) {
    if let Some(stop) = STOP.get() {
        stop.store(true, Ordering::Release);
    }
}
