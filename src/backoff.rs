//! Reconnection delay policy.

/// Largest exponent that can be applied before `initial * 2^attempt` is guaranteed to exceed
/// any `u64` ceiling.
const MAX_EXPONENT: u32 = 63;

/// Delay in milliseconds before reconnect attempt number `attempt`.
///
/// Computes `min(initial * 2^attempt, max)`, where `attempt` is the number of consecutive
/// failures since the last successful open (0-based). Never overflows: the exponent is clamped
/// and the multiplication saturates, so the result is at most `max`.
#[must_use]
pub const fn delay(attempt: u32, initial: u64, max: u64) -> u64 {
    let exponent = if attempt > MAX_EXPONENT {
        MAX_EXPONENT
    } else {
        attempt
    };
    let scaled = initial.saturating_mul(1_u64 << exponent);

    if scaled > max { max } else { scaled }
}
