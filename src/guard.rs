//! Guarded native actions.
//!
//! Every adapter-dependent command goes through [`run`]: the adapter must
//! exist and be enabled before the operation is attempted, and whatever
//! goes wrong is funnelled into a single error callback.

use tracing::{debug, warn};

use crate::ble::NativeAdapter;
use crate::error::{Error, Result};

/// Return the adapter if it exists and is enabled.
///
/// # Errors
///
/// [`Error::AdapterAbsent`] when there is no adapter, [`Error::AdapterDisabled`]
/// when it is switched off. Absence is checked first.
pub fn ensure_ready<A>(adapter: Option<&A>) -> Result<&A>
where
    A: NativeAdapter + ?Sized,
{
    let adapter = adapter.ok_or(Error::AdapterAbsent)?;
    if !adapter.is_enabled() {
        return Err(Error::AdapterDisabled);
    }
    Ok(adapter)
}

/// Run `operation` against a ready adapter.
///
/// Exactly one of the following happens: `operation` runs and succeeds, or
/// `on_error` is called once with the precondition or operation failure.
/// Success signalling is left to the operation itself.
pub fn run<A, F, E>(adapter: Option<&A>, operation: F, on_error: E)
where
    A: NativeAdapter + ?Sized,
    F: FnOnce(&A) -> Result<()>,
    E: FnOnce(Error),
{
    let result = ensure_ready(adapter).and_then(operation);

    if let Err(e) = result {
        if e.is_precondition() {
            debug!("Guarded action skipped: {}", e);
        } else {
            warn!("Guarded action failed: {}", e);
        }
        on_error(e);
    }
}
