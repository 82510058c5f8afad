//! Cooperative cancellation of retry waits.

mod token;

pub use token::CancellationToken;
