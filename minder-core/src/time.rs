//! Time utilities: timezone resolution and local-deadline parsing.

use anyhow::Result;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Common abbreviations users actually type, mapped to IANA names.
const TZ_ALIASES: &[(&str, &str)] = &[
    ("IST", "Asia/Kolkata"),
    ("EST", "America/New_York"),
    ("PST", "America/Los_Angeles"),
    ("CST", "America/Chicago"),
    ("GMT", "Europe/London"),
    ("AEST", "Australia/Sydney"),
];

/// Resolve an IANA timezone name or a common alias ("IST", "PST").
pub fn resolve_timezone(name: &str) -> Result<Tz> {
    let name = name.trim();
    let resolved = TZ_ALIASES
        .iter()
        .find(|(alias, _)| alias.eq_ignore_ascii_case(name))
        .map(|(_, iana)| *iana)
        .unwrap_or(name);
    resolved
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid timezone: {name}"))
}

/// Parse a local datetime like "2026-03-12T17:00:00" (ISO 8601, no offset) in
/// the given timezone, returning UTC. Offset-bearing strings pass through.
pub fn parse_local_deadline_to_utc(local: &str, tz: Tz) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(local) {
        return Ok(dt.with_timezone(&Utc));
    }

    let ndt = NaiveDateTime::parse_from_str(local, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(local, "%Y-%m-%dT%H:%M"))
        .or_else(|_| NaiveDateTime::parse_from_str(local, "%Y-%m-%d %H:%M"))
        .map_err(|e| anyhow::anyhow!("invalid local datetime '{local}': {e}"))?;

    let local_dt = tz
        .from_local_datetime(&ndt)
        .single()
        .ok_or_else(|| anyhow::anyhow!("ambiguous or invalid local time (DST?): {local} {tz}"))?;

    Ok(local_dt.with_timezone(&Utc))
}
