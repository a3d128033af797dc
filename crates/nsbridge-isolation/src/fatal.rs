//! Terminating on isolation failure
//!
//! An isolation step that didn't take effect leaves the process in an
//! unknown privilege state. The host driver stops instead of carrying on.

use log::error;
use nsbridge_core::IsolationError;

/// Exit status after a fatal isolation error
pub const EXIT_FAILURE: i32 = 1;

/// Report `err` and terminate the process
pub fn die(err: &IsolationError) -> ! {
    error!("{}", err);
    if !log::log_enabled!(log::Level::Error) {
        eprintln!("{}", err);
    }
    std::process::exit(EXIT_FAILURE)
}

/// Terminate on error instead of returning it
pub trait OrDie<T> {
    fn or_die(self) -> T;
}

impl<T> OrDie<T> for nsbridge_core::Result<T> {
    fn or_die(self) -> T {
        match self {
            Ok(value) => value,
            Err(err) => die(&err),
        }
    }
}
