use chrono::{DateTime, Duration, Utc};

use crate::core::history::PersistentState;

/// Local clock shifted by the offset measured against the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ServerClock {
    offset_ms: i64,
}

impl ServerClock {
    pub fn new(state: PersistentState) -> Self {
        Self {
            offset_ms: state.server_time_offset_ms,
        }
    }

    pub fn offset_ms(&self) -> i64 {
        self.offset_ms
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.at(Utc::now())
    }

    pub fn at(&self, local: DateTime<Utc>) -> DateTime<Utc> {
        local + Duration::milliseconds(self.offset_ms)
    }

    /// Offset implied by a `Date` response header received at `local`.
    pub fn offset_from_date_header(date: &str, local: DateTime<Utc>) -> Option<i64> {
        match DateTime::parse_from_rfc2822(date) {
            Ok(server) => Some((server.with_timezone(&Utc) - local).num_milliseconds()),
            Err(err) => {
                log::warn!("unparsable Date header {date:?}: {err}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn offset_from_header() {
        let local = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let offset = ServerClock::offset_from_date_header("Fri, 01 Mar 2024 12:00:05 GMT", local);
        assert_eq!(offset, Some(5000));
        assert_eq!(ServerClock::offset_from_date_header("yesterday", local), None);
    }

    #[test]
    fn shifts_local_time() {
        let clock = ServerClock::new(PersistentState {
            server_time_offset_ms: -1500,
        });
        let local = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        assert_eq!(clock.at(local), local - Duration::milliseconds(1500));
    }
}
