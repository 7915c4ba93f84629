//! Native replacement functions
//!
//! Each replacement matches the exact ABI of the function it stands in for,
//! reaches the untouched implementation through the session's trampoline,
//! and contains any panic raised by overlay code.

mod detours;

pub use detours::replacements;
