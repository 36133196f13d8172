use chrono::{DateTime, Datelike, Duration, FixedOffset, Offset, SecondsFormat, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// Minutes between "now" and the earliest slot that may be offered.
pub const SLOT_LEAD_MINUTES: i64 = 5;
/// Length of the availability window, in days.
pub const SLOT_WINDOW_DAYS: i64 = 7;
/// How many slots are offered to the lead at most.
pub const MAX_OFFERED_SLOTS: usize = 3;
/// Display offset for slot times (UTC-03:00, Brasília time without DST).
pub const DISPLAY_OFFSET_SECS: i32 = 3 * 3600;

const MONTHS_PT_BR: [&str; 12] = [
    "janeiro",
    "fevereiro",
    "março",
    "abril",
    "maio",
    "junho",
    "julho",
    "agosto",
    "setembro",
    "outubro",
    "novembro",
    "dezembro",
];

/// A candidate meeting start time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Slot {
    pub start_time: DateTime<Utc>,
}

impl Slot {
    pub fn new(start_time: DateTime<Utc>) -> Self {
        Self { start_time }
    }

    /// Renders the slot as `30 de outubro às 11:00` in the display offset.
    pub fn display_pt_br(&self) -> String {
        let offset = FixedOffset::west_opt(DISPLAY_OFFSET_SECS).unwrap_or_else(|| Utc.fix());
        let local = self.start_time.with_timezone(&offset);
        let month = MONTHS_PT_BR[local.month0() as usize];
        format!("{:02} de {month} às {:02}:{:02}", local.day(), local.hour(), local.minute())
    }
}

/// Half-open availability query window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// The window the scheduling tool queries: starting a few minutes after
    /// `now` and spanning a week.
    pub fn upcoming(now: DateTime<Utc>) -> Self {
        let start = now + Duration::minutes(SLOT_LEAD_MINUTES);
        let end = start + Duration::days(SLOT_WINDOW_DAYS);
        Self { start, end }
    }

    pub fn start_param(&self) -> String {
        format_remote_timestamp(self.start)
    }

    pub fn end_param(&self) -> String {
        format_remote_timestamp(self.end)
    }
}

/// Millisecond-precision ISO-8601 in UTC with a trailing `Z`.
pub fn format_remote_timestamp(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookingLink(pub String);

/// What the assistant asked for when it requested a booking link.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRequest {
    #[serde(rename = "horario_escolhido")]
    pub chosen_slot: String,
    #[serde(rename = "nome")]
    pub name: String,
    pub email: String,
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{format_remote_timestamp, Slot, TimeWindow};

    #[test]
    fn window_starts_five_minutes_out_and_spans_seven_days() {
        let now = Utc.with_ymd_and_hms(2025, 10, 28, 12, 0, 0).single().expect("valid instant");
        let window = TimeWindow::upcoming(now);

        assert_eq!(window.start_param(), "2025-10-28T12:05:00.000Z");
        assert_eq!(window.end_param(), "2025-11-04T12:05:00.000Z");
    }

    #[test]
    fn remote_timestamp_keeps_milliseconds() {
        let instant = Utc
            .with_ymd_and_hms(2025, 1, 2, 3, 4, 5)
            .single()
            .expect("valid instant")
            + chrono::Duration::milliseconds(678);
        assert_eq!(format_remote_timestamp(instant), "2025-01-02T03:04:05.678Z");
    }

    #[test]
    fn slot_display_shifts_to_display_offset() {
        let start = Utc.with_ymd_and_hms(2025, 10, 30, 14, 0, 0).single().expect("valid instant");
        assert_eq!(Slot::new(start).display_pt_br(), "30 de outubro às 11:00");
    }

    #[test]
    fn slot_display_crosses_day_boundary() {
        let start = Utc.with_ymd_and_hms(2025, 3, 1, 1, 30, 0).single().expect("valid instant");
        assert_eq!(Slot::new(start).display_pt_br(), "28 de fevereiro às 22:30");
    }

    #[test]
    fn slot_display_keeps_accented_month_names() {
        let start = Utc.with_ymd_and_hms(2025, 3, 15, 15, 0, 0).single().expect("valid instant");
        assert_eq!(Slot::new(start).display_pt_br(), "15 de março às 12:00");
    }
}
