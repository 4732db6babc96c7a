//! CLI Exit Code Registry
//!
//! Single source of truth for `txrecon` exit codes. Scripts and schedulers
//! branch on these, so treat them as part of the interface.
//!
//! | Code | Meaning                                                   |
//! |------|-----------------------------------------------------------|
//! | 0    | Every transaction matched                                 |
//! | 1    | Mismatches or one-sided transactions found                |
//! | 2    | Usage error or invalid job config                         |
//! | 3    | Runtime failure (I/O, bad format, unexpected record type) |
//! | 4    | Cancelled or deadline exceeded                            |

use txrecon::ReconError;

/// Success - the two parties reconcile.
pub const EXIT_SUCCESS: u8 = 0;

/// Reconciliation finished but found differences.
/// Like `diff(1)`, exit 1 means "inputs differ."
pub const EXIT_RECON_MISMATCH: u8 = 1;

/// Bad arguments, unreadable or invalid config.
/// Matches clap's own exit code for argument errors.
pub const EXIT_USAGE: u8 = 2;

/// Reading, decoding or comparing failed mid-run.
pub const EXIT_RUNTIME: u8 = 3;

/// `--timeout-secs` elapsed before the run finished.
pub const EXIT_CANCELLED: u8 = 4;

pub fn exit_code_for(err: &ReconError) -> u8 {
    match err {
        ReconError::Config(_) | ReconError::ConfigParse(_) | ReconError::ConfigValidation(_) => EXIT_USAGE,
        ReconError::Cancelled => EXIT_CANCELLED,
        _ => EXIT_RUNTIME,
    }
}
