//! Conversion between local timestamps and the wire encoding.
//!
//! The wire carries integer nanoseconds since the Unix epoch, UTC, at
//! millisecond granularity: the value is always a whole number of
//! milliseconds scaled by 10^6.

use chrono::{DateTime, Local, TimeZone, Utc};

const NANOS_PER_MILLI: i64 = 1_000_000;

/// Encode a local timestamp as nanoseconds since the Unix epoch, floored to
/// millisecond precision.
pub(crate) fn to_wire(time: DateTime<Local>) -> i64 {
    time.timestamp_millis().saturating_mul(NANOS_PER_MILLI)
}

/// Decode a wire timestamp back into local time.
///
/// Sub-millisecond bytes are discarded; euclidean division keeps the floor
/// semantics for pre-epoch values. Out-of-range values clamp to the epoch,
/// which cannot occur for timestamps this client produced.
pub(crate) fn from_wire(ts: i64) -> DateTime<Local> {
    let millis = ts.div_euclid(NANOS_PER_MILLI);
    Utc.timestamp_millis_opt(millis)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
        .with_timezone(&Local)
}
