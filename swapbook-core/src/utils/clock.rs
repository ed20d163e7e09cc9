/// Current wall-clock time as unix seconds.
pub fn unix_now() -> i64 {
    time::OffsetDateTime::now_utc().unix_timestamp()
}

/// Unix timestamp `ttl` from `now`, saturating at the end of time.
pub fn expiry_after(now: i64, ttl: std::time::Duration) -> i64 {
    let secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
    now.saturating_add(secs)
}
