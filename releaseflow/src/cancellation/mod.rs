//! Run cancellation.
//!
//! An external abort (Ctrl-C, CI job cancellation) is delivered through a
//! [`CancellationToken`]. The runner treats it as an immediate terminal
//! failure of the stage in flight.

mod token;

pub use token::CancellationToken;
