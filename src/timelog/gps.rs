// SPDX-License-Identifier: MIT
//! GPS timestamps and the resynchronizing time scan
//!
//! A TimeLog row starts with milliseconds since midnight (i32) followed by
//! days since 1980-01-01 (u16). Rows have no fixed length, so after a
//! corrupt or truncated row the next plausible timestamp is found by
//! scanning forward byte by byte.

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::binary::{ByteReader, Underrun};

/// Encoded size of a GPS timestamp
pub const GPS_TIME_SIZE: usize = 6;

const MS_PER_DAY: i64 = 86_400_000;

fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1980, 1, 1).unwrap_or_default()
}

/// Field order gives chronological ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GpsTime {
    pub days: u16,
    pub ms: i32,
}

impl GpsTime {
    pub fn new(ms: i32, days: u16) -> Self {
        Self { days, ms }
    }

    pub fn read(reader: &mut ByteReader<'_>) -> Result<Self, Underrun> {
        let ms = reader.read_i32()?;
        let days = reader.read_u16()?;
        Ok(Self { days, ms })
    }

    pub fn to_bytes(&self) -> [u8; GPS_TIME_SIZE] {
        let mut bytes = [0u8; GPS_TIME_SIZE];
        bytes[..4].copy_from_slice(&self.ms.to_le_bytes());
        bytes[4..].copy_from_slice(&self.days.to_le_bytes());
        bytes
    }

    /// Milliseconds since the GPS epoch
    pub fn total_ms(&self) -> i64 {
        i64::from(self.days) * MS_PER_DAY + i64::from(self.ms)
    }

    pub fn to_datetime(&self) -> DateTime<Utc> {
        let midnight = epoch().and_hms_opt(0, 0, 0).unwrap_or_default().and_utc();
        midnight + Duration::milliseconds(self.total_ms())
    }

    pub fn from_datetime(dt: &DateTime<Utc>) -> Option<Self> {
        let days = (dt.date_naive() - epoch()).num_days();
        let midnight = dt.date_naive().and_hms_opt(0, 0, 0)?.and_utc();
        let ms = (*dt - midnight).num_milliseconds();
        Some(Self {
            days: u16::try_from(days).ok()?,
            ms: i32::try_from(ms).ok()?,
        })
    }
}

/// Bounds a timestamp may move within from one row to the next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResyncWindow {
    pub max_days_ahead: u16,
    pub max_backstep_ms: i64,
}

impl Default for ResyncWindow {
    fn default() -> Self {
        Self {
            max_days_ahead: 3,
            max_backstep_ms: 3_600_000,
        }
    }
}

/// Read the next timestamp. Without a previous row the first six bytes are
/// taken as is; otherwise the next plausible position is searched and the
/// reader left just behind it. Returns the time and the bytes consumed.
pub fn find_next_valid_time(
    reader: &mut ByteReader<'_>,
    last: Option<GpsTime>,
    window: ResyncWindow,
) -> Result<(GpsTime, usize), Underrun> {
    let start = reader.position();
    let Some(last) = last else {
        let time = GpsTime::read(reader)?;
        return Ok((time, GPS_TIME_SIZE));
    };

    let max_days = u32::from(last.days) + u32::from(window.max_days_ahead);
    let limit = reader.len().saturating_sub(GPS_TIME_SIZE - 1);
    for index in start..limit {
        let days = reader.u16_at(index + 4)?;
        if days < last.days || u32::from(days) > max_days {
            continue;
        }
        let ms = reader.i32_at(index)?;
        if days == last.days && i64::from(ms) < i64::from(last.ms) - window.max_backstep_ms {
            continue;
        }
        reader.set_position(index + GPS_TIME_SIZE);
        return Ok((GpsTime { days, ms }, index + GPS_TIME_SIZE - start));
    }
    Err(Underrun)
}
