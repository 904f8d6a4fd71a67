/// Wrapping sequence number used by time pulses and lockstep frame orders.
pub type SequenceNumber = u16;

/// Returns whether a wrapping sequence number is greater than another.
/// sequence_greater_than(2,1) will return true
/// sequence_greater_than(1,2) will return false
/// sequence_greater_than(1,1) will return false
pub fn sequence_greater_than(s1: SequenceNumber, s2: SequenceNumber) -> bool {
    ((s1 > s2) && (s1 - s2 <= 32768)) || ((s1 < s2) && (s2 - s1 > 32768))
}

/// Returns whether a wrapping sequence number is less than another.
pub fn sequence_less_than(s1: SequenceNumber, s2: SequenceNumber) -> bool {
    sequence_greater_than(s2, s1)
}

/// Retrieves the wrapping difference `b - a` between two sequence numbers.
///
/// # Examples
/// ```
/// # use tern_shared::wrapping_diff;
/// assert_eq!(wrapping_diff(1, 2), 1);
/// assert_eq!(wrapping_diff(2, 1), -1);
/// assert_eq!(wrapping_diff(65535, 0), 1);
/// assert_eq!(wrapping_diff(0, 65535), -1);
/// ```
pub fn wrapping_diff(a: SequenceNumber, b: SequenceNumber) -> i16 {
    b.wrapping_sub(a) as i16
}
