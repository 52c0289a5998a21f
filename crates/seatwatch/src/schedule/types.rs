/// Types produced by the schedule parser
use serde::{Deserialize, Serialize};
use std::fmt;

/// Day of the week a slot meets on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Weekday {
    Sunday,
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
}

impl Weekday {
    /// Parses a day name case-insensitively. Accepts full names ("MONDAY")
    /// and three-letter abbreviations ("Mon").
    pub fn parse(raw: &str) -> Option<Self> {
        let upper = raw.trim().to_ascii_uppercase();
        let day = match upper.as_str() {
            "SUNDAY" | "SUN" => Weekday::Sunday,
            "MONDAY" | "MON" => Weekday::Monday,
            "TUESDAY" | "TUE" => Weekday::Tuesday,
            "WEDNESDAY" | "WED" => Weekday::Wednesday,
            "THURSDAY" | "THU" => Weekday::Thursday,
            "FRIDAY" | "FRI" => Weekday::Friday,
            "SATURDAY" | "SAT" => Weekday::Saturday,
            _ => return None,
        };
        Some(day)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Weekday::Sunday => "SUNDAY",
            Weekday::Monday => "MONDAY",
            Weekday::Tuesday => "TUESDAY",
            Weekday::Wednesday => "WEDNESDAY",
            Weekday::Thursday => "THURSDAY",
            Weekday::Friday => "FRIDAY",
            Weekday::Saturday => "SATURDAY",
        }
    }
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a slot is a lecture or a lab meeting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SlotKind {
    Class,
    Lab,
}

impl SlotKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotKind::Class => "CLASS",
            SlotKind::Lab => "LAB",
        }
    }
}

impl fmt::Display for SlotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One normalized weekly meeting.
///
/// `start_time` and `end_time` are 24-hour clock values encoded as HHMM
/// (1430 is 2:30 PM), not minutes since midnight.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParsedSlot {
    pub day: Weekday,
    pub start_time: u16,
    pub end_time: u16,
    pub room: String,
    pub building: String,
    pub kind: SlotKind,
}
