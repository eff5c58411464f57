use crate::types::Tick;

const HALF_RANGE: u32 = 1 << 31;

/// Returns whether tick `a` is at or after tick `b` on the 32-bit wrapping
/// timeline: `(a - b) mod 2^32 < 2^31`.
/// tick_is_after(2, 1) will return true
/// tick_is_after(1, 1) will return true
/// tick_is_after(0, u32::MAX) will return true
pub fn tick_is_after(a: Tick, b: Tick) -> bool {
    a.wrapping_sub(b) < HALF_RANGE
}

/// Returns whether a wrapping tick is strictly greater than another
/// tick_greater_than(2,1) will return true
/// tick_greater_than(1,2) will return false
/// tick_greater_than(1,1) will return false
pub fn tick_greater_than(a: Tick, b: Tick) -> bool {
    a != b && tick_is_after(a, b)
}

/// Returns whether a wrapping tick is strictly less than another
/// tick_less_than(1,2) will return true
/// tick_less_than(2,1) will return false
/// tick_less_than(1,1) will return false
pub fn tick_less_than(a: Tick, b: Tick) -> bool {
    tick_greater_than(b, a)
}

/// Retrieves the signed wrapping distance travelled going from `a` to `b`.
///
/// # Examples
/// ```
/// # use tether_shared::tick_diff;
/// assert_eq!(tick_diff(1, 2), 1);
/// assert_eq!(tick_diff(2, 1), -1);
/// assert_eq!(tick_diff(u32::MAX, 0), 1);
/// assert_eq!(tick_diff(0, u32::MAX), -1);
/// ```
pub fn tick_diff(a: Tick, b: Tick) -> i32 {
    // two's complement reinterpretation is exactly the wrapping distance
    b.wrapping_sub(a) as i32
}
