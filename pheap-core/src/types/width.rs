//! Transfer widths for typed region access.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Size of a single typed load or store.
///
/// Each width selects a fixed-size signed integer: `Byte` is `i8`,
/// `Short` is `i16`, `Int` is `i32` and `Long` is `i64`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Width {
    /// 1 byte.
    Byte,
    /// 2 bytes.
    Short,
    /// 4 bytes.
    Int,
    /// 8 bytes.
    Long,
}

impl Width {
    /// All supported widths, narrowest first.
    pub const ALL: [Width; 4] = [Width::Byte, Width::Short, Width::Int, Width::Long];

    /// Number of bytes moved by a transfer of this width.
    #[must_use]
    pub const fn size(&self) -> u64 {
        match self {
            Self::Byte => 1,
            Self::Short => 2,
            Self::Int => 4,
            Self::Long => 8,
        }
    }

    /// Smallest value representable at this width.
    #[must_use]
    pub const fn min_value(&self) -> i64 {
        match self {
            Self::Byte => i8::MIN as i64,
            Self::Short => i16::MIN as i64,
            Self::Int => i32::MIN as i64,
            Self::Long => i64::MIN,
        }
    }

    /// Largest value representable at this width.
    #[must_use]
    pub const fn max_value(&self) -> i64 {
        match self {
            Self::Byte => i8::MAX as i64,
            Self::Short => i16::MAX as i64,
            Self::Int => i32::MAX as i64,
            Self::Long => i64::MAX,
        }
    }

    /// Keep the low-order bytes of `value` and sign-extend them back to `i64`.
    ///
    /// This is exactly what a store followed by a load at this width yields.
    #[must_use]
    pub const fn wrap(&self, value: i64) -> i64 {
        match self {
            Self::Byte => value as i8 as i64,
            Self::Short => value as i16 as i64,
            Self::Int => value as i32 as i64,
            Self::Long => value,
        }
    }
}

impl TryFrom<u32> for Width {
    /// The rejected size.
    type Error = u32;

    fn try_from(size: u32) -> Result<Self, Self::Error> {
        match size {
            1 => Ok(Self::Byte),
            2 => Ok(Self::Short),
            4 => Ok(Self::Int),
            8 => Ok(Self::Long),
            other => Err(other),
        }
    }
}

impl fmt::Display for Width {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}B", self.size())
    }
}
