//! Finalizing sessions on SIGINT/SIGTERM
//!
//! One process-wide handler, installed on first use, runs the finalizer of
//! every session that opted in and then exits with status 130. Sessions are
//! held weakly so a dropped session is simply skipped.
//!
//! `std::process::exit` and `panic = "abort"` bypass both this handler and
//! `Drop`; nothing is written in those cases.

use crate::result::{CoverageError, CoverageResult};
use crate::session::WeakFinalizer;
use std::sync::{Mutex, OnceLock, PoisonError};

/// Exit status after a termination signal (128 + SIGINT)
pub const SIGNAL_EXIT_CODE: i32 = 130;

static REGISTERED: Mutex<Vec<WeakFinalizer>> = Mutex::new(Vec::new());
static HANDLER: OnceLock<Result<(), String>> = OnceLock::new();

/// Register `finalizer` to run on a termination signal, installing the
/// process handler if this is the first registration.
pub(crate) fn register(finalizer: WeakFinalizer) -> CoverageResult<()> {
    let installed = HANDLER.get_or_init(|| {
        ctrlc::set_handler(|| {
            let fired = fire_registered();
            tracing::warn!(sessions = fired, "terminated by signal; coverage finalized");
            std::process::exit(SIGNAL_EXIT_CODE);
        })
        .map_err(|e| e.to_string())
    });
    if let Err(message) = installed {
        return Err(CoverageError::SignalHandler {
            message: message.clone(),
        });
    }

    let mut registered = REGISTERED.lock().unwrap_or_else(PoisonError::into_inner);
    registered.retain(WeakFinalizer::is_alive);
    registered.push(finalizer);
    tracing::debug!(sessions = registered.len(), "termination handler armed");
    Ok(())
}

/// Run every registered finalizer that has not run yet. Returns how many ran.
pub(crate) fn fire_registered() -> usize {
    let finalizers: Vec<WeakFinalizer> = REGISTERED
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .drain(..)
        .collect();
    let mut fired = 0;
    for finalizer in finalizers {
        match finalizer.fire() {
            Ok(Some(_)) => fired += 1,
            Ok(None) => {}
            Err(e) => {
                tracing::error!(error = %e, "coverage finalization failed during shutdown");
            }
        }
    }
    fired
}
