//! Retryable-outcome classification.

use crate::transport::ResponseMeta;

/// Lowest status code treated as a server-side failure.
pub const SERVER_ERROR_FLOOR: u16 = 500;

/// Decides whether an attempt should be made again.
///
/// Only the response matters; a transport error never changes the answer.
///
/// - no response: retry
/// - status 0 or >= 500: retry
/// - anything else (success, redirects, 4xx): final
#[must_use]
pub fn should_retry(response: Option<&ResponseMeta>) -> bool {
    match response {
        None => true,
        Some(response) => is_retryable_status(response.status),
    }
}

/// Returns true for statuses that indicate a transient failure.
///
/// Zero stands for an invalid or unset code; codes past the standard range
/// such as 999 count as server errors.
#[must_use]
pub const fn is_retryable_status(status: u16) -> bool {
    status == 0 || status >= SERVER_ERROR_FLOOR
}
