use std::time::Duration;

use anyhow::{bail, ensure, Context, Result};

/// Parse a duration flag such as "2s", "1.5s", "500ms" or "250us".
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();
    let split = s
        .find(|c: char| c.is_alphabetic())
        .with_context(|| format!("missing unit in duration {:?} (use ns, us, ms or s)", s))?;
    let (value, unit) = s.split_at(split);

    let value: f64 = value
        .trim()
        .parse()
        .with_context(|| format!("invalid number in duration {:?}", s))?;
    ensure!(
        value.is_finite() && value >= 0.0,
        "duration must be a non-negative number: {:?}",
        s
    );

    let nanos_per_unit = match unit {
        "s" => 1e9,
        "ms" => 1e6,
        "us" | "µs" => 1e3,
        "ns" => 1.0,
        other => bail!("unknown duration unit {:?} (use ns, us, ms or s)", other),
    };

    Ok(Duration::from_nanos((value * nanos_per_unit).round() as u64))
}

/// Parse a repeat interval. Same syntax as [`parse_duration`], but zero is
/// rejected since a ticker cannot fire with a zero period.
pub fn parse_interval(s: &str) -> Result<Duration> {
    let interval = parse_duration(s)?;
    ensure!(!interval.is_zero(), "interval must be greater than zero: {:?}", s);
    Ok(interval)
}
