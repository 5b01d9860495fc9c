//! Integer-backed percentage values.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// A percentage stored as hundredths of a percent.
///
/// Progress fractions read from the engine are floats, and comparing floats
/// across refreshes makes rows flicker: two reads of the same progress can
/// differ in the last bits. Converting to an integer at the boundary makes
/// equality, ordering, and the rendered text exact and stable under repeated
/// refresh.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Percents(i32);

impl Percents {
    /// Zero percent.
    pub const ZERO: Self = Self(0);
    /// One hundred percent.
    pub const FULL: Self = Self(10_000);

    /// Build from a fraction in `0.0..=1.0`; out-of-range input is clamped.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_fraction(fraction: f32) -> Self {
        Self((fraction.clamp(0.0, 1.0) * 10_000.0).round() as i32)
    }

    /// The raw value in hundredths of a percent.
    #[must_use]
    pub const fn raw(self) -> i32 {
        self.0
    }

    /// Round to a whole percent.
    #[must_use]
    pub const fn to_int(self) -> i32 {
        (self.0 + 50) / 100
    }
}

impl Display for Percents {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        if self.0 % 100 == 0 {
            write!(formatter, "{}", self.0 / 100)
        } else {
            let text = format!("{:.2}", f64::from(self.0) / 100.0);
            formatter.write_str(text.trim_end_matches('0').trim_end_matches('.'))
        }
    }
}
