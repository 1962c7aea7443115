//! # Delivery bridge communications interface crate.
//!
//! Provides the connection to the delivery bridge controller and the encoding of the commands
//! sent over it.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Command definitions and their wire encoding
pub mod cmd;

/// Network module
pub mod net;
