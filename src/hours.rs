//! Hour amounts are exact to the hundredth of an hour.
//!
//! The store keeps every amount as whole hundredths and sums them as integers, so a total
//! compared against a budget or a capacity carries no accumulated float error.

pub const HUNDREDTHS_PER_HOUR: f64 = 100.0;

/// Nearest whole number of hundredths.
pub fn to_hundredths(hours: f64) -> i64 {
    (hours * HUNDREDTHS_PER_HOUR).round() as i64
}

pub fn from_hundredths(hundredths: i64) -> f64 {
    hundredths as f64 / HUNDREDTHS_PER_HOUR
}

/// `hours` snapped to the nearest hundredth, as it reads back from storage.
pub fn quantize(hours: f64) -> f64 {
    from_hundredths(to_hundredths(hours))
}
