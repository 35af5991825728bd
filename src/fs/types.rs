use core::ops::{BitOr, BitOrAssign};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

///Generic result type for enumeration operations
pub type Result<T> = core::result::Result<T, crate::FindError>;

/// The attribute bitmask carried by every directory record.
///
/// The values are the native file attribute constants, the Unix backend
/// synthesises them from `st_mode` so callers see one vocabulary on every platform.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct FileAttributes(pub u32);

impl FileAttributes {
    /// The file is read-only.
    pub const READONLY: Self = Self(0x0000_0001);
    /// The file is hidden.
    pub const HIDDEN: Self = Self(0x0000_0002);
    /// The file is a system file.
    pub const SYSTEM: Self = Self(0x0000_0004);
    /// The entry is a directory.
    pub const DIRECTORY: Self = Self(0x0000_0010);
    /// The file is marked for archiving.
    pub const ARCHIVE: Self = Self(0x0000_0020);
    /// The entry is a device (block or character on Unix).
    pub const DEVICE: Self = Self(0x0000_0040);
    /// A file with no other attributes set.
    pub const NORMAL: Self = Self(0x0000_0080);
    /// The file is temporary.
    pub const TEMPORARY: Self = Self(0x0000_0100);
    pub const SPARSE_FILE: Self = Self(0x0000_0200);
    /// The entry redirects elsewhere (symlink or junction).
    pub const REPARSE_POINT: Self = Self(0x0000_0400);
    pub const COMPRESSED: Self = Self(0x0000_0800);
    pub const OFFLINE: Self = Self(0x0000_1000);
    pub const NOT_CONTENT_INDEXED: Self = Self(0x0000_2000);
    pub const ENCRYPTED: Self = Self(0x0000_4000);

    /// Returns the raw bitmask.
    #[inline]
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Returns true if every bit in `other` is also set in `self`.
    #[inline]
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns true if no bits are set.
    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Combines two sets of attributes.
    #[inline]
    #[must_use]
    pub const fn with(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    #[inline]
    #[must_use]
    pub const fn is_directory(self) -> bool {
        self.contains(Self::DIRECTORY)
    }

    #[inline]
    #[must_use]
    pub const fn is_reparse_point(self) -> bool {
        self.contains(Self::REPARSE_POINT)
    }

    #[inline]
    #[must_use]
    pub const fn is_hidden(self) -> bool {
        self.contains(Self::HIDDEN)
    }

    #[inline]
    #[must_use]
    pub const fn is_readonly(self) -> bool {
        self.contains(Self::READONLY)
    }
}

impl BitOr for FileAttributes {
    type Output = Self;

    #[inline]
    fn bitor(self, rhs: Self) -> Self {
        self.with(rhs)
    }
}

impl BitOrAssign for FileAttributes {
    #[inline]
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

const TICKS_PER_SECOND: i64 = 10_000_000;
const NANOS_PER_TICK: i64 = 100;
/// Ticks between 1601-01-01 and 1970-01-01
const UNIX_EPOCH_TICKS: i64 = 116_444_736_000_000_000;

/**
 A native timestamp: 100ns ticks since 1601-01-01 UTC.

 Records store timestamps this way on every platform; the conversions below
 are the only place that knows about the epoch difference.
*/
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct FileTime(i64);

impl FileTime {
    #[inline]
    #[must_use]
    pub const fn from_ticks(ticks: i64) -> Self {
        Self(ticks)
    }

    #[inline]
    #[must_use]
    pub const fn ticks(self) -> i64 {
        self.0
    }

    /// Builds a timestamp from Unix seconds and the nanosecond remainder (as found in `struct stat`).
    #[inline]
    #[must_use]
    pub const fn from_unix(seconds: i64, nanos: i64) -> Self {
        Self(
            seconds
                .saturating_mul(TICKS_PER_SECOND)
                .saturating_add(nanos / NANOS_PER_TICK)
                .saturating_add(UNIX_EPOCH_TICKS),
        )
    }

    /// Splits into Unix seconds and a sub-second nanosecond part (always non-negative).
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub const fn to_unix(self) -> (i64, u32) {
        let since_epoch = self.0.saturating_sub(UNIX_EPOCH_TICKS);
        let seconds = since_epoch.div_euclid(TICKS_PER_SECOND);
        let nanos = since_epoch.rem_euclid(TICKS_PER_SECOND) * NANOS_PER_TICK;
        (seconds, nanos as u32)
    }

    /// Converts into a [`SystemTime`], `None` if the value is out of range for the platform.
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub fn to_system_time(self) -> Option<SystemTime> {
        let (seconds, nanos) = self.to_unix();
        if seconds >= 0 {
            UNIX_EPOCH.checked_add(Duration::new(seconds as u64, nanos))
        } else {
            UNIX_EPOCH
                .checked_sub(Duration::from_secs(seconds.unsigned_abs()))?
                .checked_add(Duration::from_nanos(u64::from(nanos)))
        }
    }

    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub fn from_system_time(time: SystemTime) -> Self {
        match time.duration_since(UNIX_EPOCH) {
            Ok(after) => Self::from_unix(after.as_secs() as i64, i64::from(after.subsec_nanos())),
            Err(before) => {
                let before = before.duration();
                Self::from_unix(
                    -(before.as_secs() as i64),
                    -i64::from(before.subsec_nanos()),
                )
            }
        }
    }

    /// Converts into a UTC `chrono` timestamp for display.
    #[must_use]
    pub fn to_datetime(self) -> Option<chrono::DateTime<chrono::Utc>> {
        let (seconds, nanos) = self.to_unix();
        chrono::DateTime::from_timestamp(seconds, nanos)
    }
}
