//! Conversion between archive time stamps and Unix time
//!
//! Archive time stamps are Windows `FILETIME` values: 100-nanosecond
//! intervals since 1601-01-01. The value 0 means "no time recorded".

/// `FILETIME` of the Unix epoch
pub const EPOCH_OFFSET: u64 = 116_444_736_000_000_000;

/// `FILETIME` ticks per second
pub const TICKS_PER_SECOND: u64 = 10_000_000;

/// Convert Unix seconds into an archive time stamp.
///
/// `0` stays `0`. Times before the Unix epoch and times past the largest
/// representable `FILETIME` saturate into range.
pub fn to_archive_time(unix_seconds: i64) -> u64 {
    if unix_seconds == 0 {
        return 0;
    }

    let ticks = i128::from(unix_seconds) * i128::from(TICKS_PER_SECOND)
        + i128::from(EPOCH_OFFSET);
    ticks.clamp(0, i128::from(u64::MAX)) as u64
}

/// Convert an archive time stamp into Unix seconds.
///
/// Returns `None` for stamps before the Unix epoch (including the
/// "no time" value 0) and for stamps whose whole-second count does not fit
/// the host's signed time type.
pub fn from_archive_time(archive_time: u64) -> Option<i64> {
    let ticks = archive_time.checked_sub(EPOCH_OFFSET)?;
    i64::try_from(ticks / TICKS_PER_SECOND).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_zero_sentinel() {
        assert_eq!(to_archive_time(0), 0);
        assert_eq!(from_archive_time(0), None);
    }

    #[test]
    fn test_known_values() {
        assert_eq!(to_archive_time(1), EPOCH_OFFSET + TICKS_PER_SECOND);
        assert_eq!(from_archive_time(EPOCH_OFFSET), Some(0));
        // 2009-02-13 23:31:30 UTC
        assert_eq!(
            from_archive_time(128_790_414_900_000_000),
            Some(1_234_567_890)
        );
        assert_eq!(from_archive_time(EPOCH_OFFSET - 1), None);
    }

    #[test]
    fn test_sub_second_ticks_truncate() {
        assert_eq!(from_archive_time(EPOCH_OFFSET + 19_999_999), Some(1));
    }

    proptest! {
        #[test]
        fn roundtrip_for_representable_times(t in 1i64..=((u64::MAX - EPOCH_OFFSET) / TICKS_PER_SECOND) as i64) {
            prop_assert_eq!(from_archive_time(to_archive_time(t)), Some(t));
        }

        #[test]
        fn below_epoch_never_converts(stamp in 0u64..EPOCH_OFFSET) {
            prop_assert_eq!(from_archive_time(stamp), None);
        }
    }
}
