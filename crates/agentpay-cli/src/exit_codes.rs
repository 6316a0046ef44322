//! Process exit codes.
//!
//! Failed operations exit with the core error's own code
//! (`agentpay_core::Error::exit_code`, 1 to 5); the constants here cover the
//! outcomes that happen outside an operation.

pub const SUCCESS: i32 = 0;
pub const INVALID_INPUT: i32 = 1; // Request is not valid JSON for any operation
pub const CONFIG_ERROR: i32 = 2;
pub const DENIED: i32 = 6; // --strict: verification completed with a refusal
