use chrono::{DateTime, TimeDelta, Utc};

use crate::Error;

/// Turns a period specifier such as `"24h"` or `"7d"` into the absolute
/// instant that far before `now`.
///
/// The amount must be a positive integer; the unit is `h` (hours) or `d`
/// (days), case-sensitive. Anything else is an `InvalidPeriod` error.
pub fn parse_period(period: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, Error> {
    let invalid = || Error::InvalidPeriod(period.to_string());

    let trimmed = period.trim();
    let (unit_idx, unit) = trimmed.char_indices().last().ok_or_else(invalid)?;
    let amount: i64 = trimmed[..unit_idx]
        .parse::<u32>()
        .map_err(|_| invalid())?
        .into();
    if amount == 0 {
        return Err(invalid());
    }

    let delta = match unit {
        'h' => TimeDelta::try_hours(amount),
        'd' => TimeDelta::try_days(amount),
        _ => None,
    }
    .ok_or_else(invalid)?;

    now.checked_sub_signed(delta).ok_or_else(invalid)
}
