use std::{fmt, ops};

use serde::{Deserialize, Serialize};
use time::Duration;

/// Seconds in a Kerbin day.
const DAY: i64 = 6 * 60 * 60;

/// Universal (simulated) time, measured from the start of the game.
#[derive(Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct UT(Duration);

impl UT {
    pub const ZERO: UT = UT(Duration::ZERO);

    /// Seconds since the epoch of the universe. Non-finite inputs
    /// saturate instead of panicking (`NaN` becomes zero).
    pub fn new_seconds(sec: f64) -> UT {
        UT(Duration::saturating_seconds_f64(sec))
    }

    pub fn as_seconds(self) -> f64 {
        self.0.as_seconds_f64()
    }

    /// Seconds elapsed between `earlier` and `self`. Computed in `f64`,
    /// so saturated times never overflow.
    pub fn seconds_since(self, earlier: UT) -> f64 {
        self.as_seconds() - earlier.as_seconds()
    }
}

impl ops::AddAssign<Duration> for UT {
    fn add_assign(&mut self, rhs: Duration) {
        self.0 += rhs;
    }
}

impl fmt::Display for UT {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0.whole_seconds();
        let sign = if whole < 0 { "-" } else { "" };
        let whole = whole.unsigned_abs();
        let day = DAY.unsigned_abs();
        write!(
            f,
            "UT({sign}{}d {:02}:{:02}:{:02})",
            whole / day,
            whole % day / 3600,
            whole % 3600 / 60,
            whole % 60
        )
    }
}

impl fmt::Debug for UT {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UT({}s)", self.0.as_seconds_f64())
    }
}

#[test]
fn seconds_round_trip() {
    let ut = UT::new_seconds(12_345.5);
    assert!((ut.as_seconds() - 12_345.5).abs() < 1e-9);
    assert!((UT::new_seconds(3.0).seconds_since(UT::new_seconds(2.5)) - 0.5).abs() < 1e-9);
}

#[test]
fn nan_saturates() {
    assert_eq!(UT::new_seconds(f64::NAN), UT::ZERO);
}

#[test]
fn distance_between_saturated_times() {
    let min = UT::new_seconds(f64::NEG_INFINITY);
    let max = UT::new_seconds(1e300);
    assert!(UT::ZERO.seconds_since(min) > 9e18);
    assert!(min.seconds_since(max).is_finite());
    assert!(min.seconds_since(max) < -1.8e19);
}

#[test]
fn displays_kerbin_days() {
    assert_eq!(UT::new_seconds(21_600.0 + 3_723.0).to_string(), "UT(1d 01:02:03)");
    assert_eq!(UT::new_seconds(-61.0).to_string(), "UT(-0d 00:01:01)");
}
