//! Schedule parsing: turns the feed's two schedule representations into
//! normalized [`ParsedSlot`]s.
//!
//! Every section carries up to two renditions of its weekly meetings:
//! - a compact string, one `DAY(START-END-ROOM)` entry per line with
//!   12-hour clock times (`MONDAY(3:30 PM-4:50 PM-10A-04C)`)
//! - a structured array of `{day, startTime, endTime, roomNo}` with
//!   24-hour `HH:MM` times
//!
//! They are read as an ordered list of [`ScheduleSource`] strategies; the
//! first one producing any slot wins. Parsing never fails: entries that
//! do not match are dropped without affecting their siblings.

mod types;

pub use types::{ParsedSlot, SlotKind, Weekday};

use crate::feed::{FeedScheduleEntry, FeedSection};
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// Building code used when a room has no usable prefix.
pub const UNASSIGNED_BUILDING: &str = "UB";

/// Room used when the feed gives none.
pub const UNKNOWN_ROOM: &str = "TBA";

static ENTRY_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^([A-Z]+)\s*\(([^)]+)\)$").unwrap());
// The room group is greedy so that hyphenated rooms ("10A-04C") survive.
static TIMES_ROOM_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d{1,2}:\d{2}\s*[AP]M)\s*-\s*(\d{1,2}:\d{2}\s*[AP]M)\s*-\s*(.+)").unwrap()
});
static TIME_12H_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d{1,2}):(\d{2})\s*(AM|PM)").unwrap());

/// One way of reading a section's schedule.
#[derive(Debug, Clone, Copy)]
pub enum ScheduleSource<'a> {
    /// Newline separated `DAY(START-END-ROOM)` entries.
    Compact(&'a str),
    /// Structured entries; `fallback_room` applies to entries without a room.
    Structured {
        entries: &'a [FeedScheduleEntry],
        fallback_room: Option<&'a str>,
    },
}

impl ScheduleSource<'_> {
    fn parse(&self, kind: SlotKind) -> Vec<ParsedSlot> {
        match self {
            ScheduleSource::Compact(raw) => parse_compact_schedule(raw, kind),
            ScheduleSource::Structured {
                entries,
                fallback_room,
            } => parse_structured_schedule(entries, *fallback_room, kind),
        }
    }
}

/// Tries each source in order and returns the slots of the first one that
/// yields at least one slot.
pub fn resolve_slots(sources: &[ScheduleSource<'_>], kind: SlotKind) -> Vec<ParsedSlot> {
    sources
        .iter()
        .map(|source| source.parse(kind))
        .find(|slots| !slots.is_empty())
        .unwrap_or_default()
}

/// Class schedule strategies for a feed section, in priority order.
pub fn class_sources(section: &FeedSection) -> Vec<ScheduleSource<'_>> {
    let mut sources = Vec::with_capacity(2);
    if let Some(raw) = section.pre_reg_schedule.as_deref() {
        sources.push(ScheduleSource::Compact(raw));
    }
    sources.push(ScheduleSource::Structured {
        entries: section.class_schedules(),
        fallback_room: first_non_blank(&[
            section.room_number.as_deref(),
            section.room_name.as_deref(),
        ]),
    });
    sources
}

/// Lab schedule strategies for a feed section, in priority order.
pub fn lab_sources(section: &FeedSection) -> Vec<ScheduleSource<'_>> {
    let mut sources = Vec::with_capacity(2);
    if let Some(raw) = section.pre_reg_lab_schedule.as_deref() {
        sources.push(ScheduleSource::Compact(raw));
    }
    sources.push(ScheduleSource::Structured {
        entries: section.lab_schedules(),
        fallback_room: first_non_blank(&[
            section.lab_room_name.as_deref(),
            section.room_name.as_deref(),
        ]),
    });
    sources
}

/// All slots of a section, class slots first, deduplicated.
pub fn section_slots(section: &FeedSection) -> Vec<ParsedSlot> {
    let mut slots = resolve_slots(&class_sources(section), SlotKind::Class);
    slots.extend(resolve_slots(&lab_sources(section), SlotKind::Lab));
    dedup_slots(slots)
}

/// Removes slots sharing (day, start, end, room, kind), keeping the first.
pub fn dedup_slots(slots: Vec<ParsedSlot>) -> Vec<ParsedSlot> {
    let mut seen = HashSet::with_capacity(slots.len());
    let mut unique = Vec::with_capacity(slots.len());
    for slot in slots {
        let key = (
            slot.day,
            slot.start_time,
            slot.end_time,
            slot.room.clone(),
            slot.kind,
        );
        if seen.insert(key) {
            unique.push(slot);
        }
    }
    unique
}

/// Parses the compact `DAY(START-END-ROOM)` representation.
pub fn parse_compact_schedule(raw: &str, kind: SlotKind) -> Vec<ParsedSlot> {
    raw.split(['\r', '\n'])
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| parse_compact_entry(line, kind))
        .collect()
}

fn parse_compact_entry(line: &str, kind: SlotKind) -> Option<ParsedSlot> {
    let entry = ENTRY_REGEX.captures(line)?;
    let day = Weekday::parse(entry.get(1)?.as_str())?;

    let content = entry.get(2)?.as_str();
    let caps = TIMES_ROOM_REGEX.captures(content)?;
    let start_time = parse_time_12h(caps.get(1)?.as_str())?;
    let end_time = parse_time_12h(caps.get(2)?.as_str())?;
    let room = normalize_room(Some(caps.get(3)?.as_str()));

    Some(ParsedSlot {
        day,
        start_time,
        end_time,
        building: building_for_room(&room),
        room,
        kind,
    })
}

/// Parses the structured array representation.
pub fn parse_structured_schedule(
    entries: &[FeedScheduleEntry],
    fallback_room: Option<&str>,
    kind: SlotKind,
) -> Vec<ParsedSlot> {
    entries
        .iter()
        .filter_map(|entry| {
            let day = Weekday::parse(&entry.day)?;
            let start_time = parse_time_24h(&entry.start_time)?;
            let end_time = parse_time_24h(&entry.end_time)?;
            let room = normalize_room(first_non_blank(&[entry.room_no.as_deref(), fallback_room]));

            Some(ParsedSlot {
                day,
                start_time,
                end_time,
                building: building_for_room(&room),
                room,
                kind,
            })
        })
        .collect()
}

/// Converts a 12-hour clock string ("3:30 PM", "3:30PM") to HHMM.
///
/// 12 AM is hour 0 and 12 PM stays hour 12.
pub fn parse_time_12h(raw: &str) -> Option<u16> {
    let caps = TIME_12H_REGEX.captures(raw.trim())?;
    let hour: u16 = caps.get(1)?.as_str().parse().ok()?;
    let minute: u16 = caps.get(2)?.as_str().parse().ok()?;
    if !(1..=12).contains(&hour) || minute > 59 {
        return None;
    }

    let is_pm = caps.get(3)?.as_str().eq_ignore_ascii_case("PM");
    let hour = match (hour, is_pm) {
        (12, false) => 0,
        (12, true) => 12,
        (h, true) => h + 12,
        (h, false) => h,
    };
    Some(hour * 100 + minute)
}

/// Converts a 24-hour `HH:MM` (or `HH:MM:SS`) string to HHMM.
pub fn parse_time_24h(raw: &str) -> Option<u16> {
    let mut parts = raw.trim().split(':');
    let hour: u16 = parts.next()?.trim().parse().ok()?;
    let minute: u16 = parts.next()?.trim().parse().ok()?;
    if hour > 23 || minute > 59 {
        return None;
    }
    Some(hour * 100 + minute)
}

/// Building code of a room: the alphanumeric token before the first hyphen
/// ("10A-04C" is in building "10A"), else [`UNASSIGNED_BUILDING`].
pub fn building_for_room(room: &str) -> String {
    let prefix = room.split('-').next().unwrap_or_default().trim();
    if !prefix.is_empty() && prefix.chars().all(|c| c.is_ascii_alphanumeric()) {
        prefix.to_string()
    } else {
        UNASSIGNED_BUILDING.to_string()
    }
}

fn normalize_room(room: Option<&str>) -> String {
    match room.map(str::trim) {
        Some(r) if !r.is_empty() => r.to_string(),
        _ => UNKNOWN_ROOM.to_string(),
    }
}

fn first_non_blank<'a>(candidates: &[Option<&'a str>]) -> Option<&'a str> {
    candidates
        .iter()
        .flatten()
        .copied()
        .find(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::feed_section;

    fn entry(day: &str, start: &str, end: &str, room: Option<&str>) -> FeedScheduleEntry {
        FeedScheduleEntry {
            day: day.to_string(),
            start_time: start.to_string(),
            end_time: end.to_string(),
            room_no: room.map(str::to_string),
        }
    }

    #[test]
    fn test_parse_time_12h() {
        assert_eq!(parse_time_12h("3:30 PM"), Some(1530));
        assert_eq!(parse_time_12h("3:30PM"), Some(1530));
        assert_eq!(parse_time_12h("08:00 am"), Some(800));
        assert_eq!(parse_time_12h("12:15 AM"), Some(15));
        assert_eq!(parse_time_12h("12:45 PM"), Some(1245));
        assert_eq!(parse_time_12h("13:00 PM"), None);
        assert_eq!(parse_time_12h("noon"), None);
    }

    #[test]
    fn test_parse_time_24h() {
        assert_eq!(parse_time_24h("08:00"), Some(800));
        assert_eq!(parse_time_24h("15:30"), Some(1530));
        assert_eq!(parse_time_24h("9:05:00"), Some(905));
        assert_eq!(parse_time_24h("24:00"), None);
        assert_eq!(parse_time_24h("0800"), None);
        assert_eq!(parse_time_24h(""), None);
    }

    #[test]
    fn test_compact_entry_keeps_hyphenated_room() {
        let slots = parse_compact_schedule("MONDAY(3:30 PM-4:50 PM-10A-04C)", SlotKind::Class);
        assert_eq!(
            slots,
            vec![ParsedSlot {
                day: Weekday::Monday,
                start_time: 1530,
                end_time: 1650,
                room: "10A-04C".to_string(),
                building: "10A".to_string(),
                kind: SlotKind::Class,
            }]
        );
    }

    #[test]
    fn test_compact_day_is_case_insensitive() {
        let slots = parse_compact_schedule("wednesday(8:00 AM-9:20 AM-09B-12L)", SlotKind::Lab);
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].day, Weekday::Wednesday);
        assert_eq!(slots[0].kind, SlotKind::Lab);
        assert_eq!(slots[0].start_time, 800);
    }

    #[test]
    fn test_compact_skips_malformed_lines() {
        let raw = "MONDAY(garbage)\r\nNOTADAY(3:30 PM-4:50 PM-10A-04C)\n\nTUESDAY(11:00 AM-12:20 PM-UB-1002)\nrandom text";
        let slots = parse_compact_schedule(raw, SlotKind::Class);
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].day, Weekday::Tuesday);
        assert_eq!(slots[0].start_time, 1100);
        assert_eq!(slots[0].end_time, 1220);
        assert_eq!(slots[0].building, "UB");
    }

    #[test]
    fn test_compact_garbage_only_yields_nothing() {
        assert!(parse_compact_schedule("MONDAY(garbage)", SlotKind::Class).is_empty());
        assert!(parse_compact_schedule("", SlotKind::Class).is_empty());
    }

    #[test]
    fn test_parsing_is_idempotent() {
        let raw = "SUNDAY(9:30 AM-10:50 AM-07A-01C)\nTUESDAY(9:30 AM-10:50 AM-07A-01C)";
        let first = parse_compact_schedule(raw, SlotKind::Class);
        let second = parse_compact_schedule(raw, SlotKind::Class);
        assert_eq!(first.len(), 2);
        assert_eq!(first, second);
    }

    #[test]
    fn test_building_for_room() {
        assert_eq!(building_for_room("10A-04C"), "10A");
        assert_eq!(building_for_room("TBA"), "TBA");
        assert_eq!(building_for_room("-04C"), UNASSIGNED_BUILDING);
        assert_eq!(building_for_room("Room 5"), UNASSIGNED_BUILDING);
        assert_eq!(building_for_room(""), UNASSIGNED_BUILDING);
    }

    #[test]
    fn test_structured_used_only_when_compact_is_empty() {
        let mut section = feed_section("CSE110", 501, 40, 10);
        section.pre_reg_schedule = Some("MONDAY(3:30 PM-4:50 PM-10A-04C)".to_string());
        section.section_schedule = Some(crate::feed::FeedSectionSchedule {
            final_exam_detail: None,
            class_schedules: Some(vec![entry("THURSDAY", "08:00", "09:20", Some("09C-11L"))]),
        });

        let slots = resolve_slots(&class_sources(&section), SlotKind::Class);
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].day, Weekday::Monday);

        section.pre_reg_schedule = Some("MONDAY(garbage)".to_string());
        let slots = resolve_slots(&class_sources(&section), SlotKind::Class);
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].day, Weekday::Thursday);
        assert_eq!(slots[0].start_time, 800);
        assert_eq!(slots[0].room, "09C-11L");
        assert_eq!(slots[0].building, "09C");
    }

    #[test]
    fn test_structured_room_fallbacks() {
        let mut section = feed_section("CSE111", 502, 30, 30);
        section.lab_room_name = Some("12F-31L".to_string());
        section.lab_schedules = Some(vec![
            entry("SATURDAY", "14:00", "16:50", None),
            entry("BADDAY", "14:00", "16:50", None),
        ]);

        let labs = resolve_slots(&lab_sources(&section), SlotKind::Lab);
        assert_eq!(labs.len(), 1);
        assert_eq!(labs[0].room, "12F-31L");
        assert_eq!(labs[0].building, "12F");
        assert_eq!(labs[0].start_time, 1400);
        assert_eq!(labs[0].end_time, 1650);

        section.lab_room_name = None;
        let labs = resolve_slots(&lab_sources(&section), SlotKind::Lab);
        assert_eq!(labs[0].room, UNKNOWN_ROOM);
    }

    #[test]
    fn test_section_slots_dedups_and_orders_class_first() {
        let mut section = feed_section("MAT120", 600, 35, 20);
        section.pre_reg_schedule = Some(
            "MONDAY(3:30 PM-4:50 PM-10A-04C)\nMONDAY(3:30 PM-4:50 PM-10A-04C)\nWEDNESDAY(3:30 PM-4:50 PM-10A-04C)"
                .to_string(),
        );
        section.pre_reg_lab_schedule = Some("MONDAY(3:30 PM-4:50 PM-10A-04C)".to_string());

        let slots = section_slots(&section);
        assert_eq!(slots.len(), 3);
        assert_eq!(slots[0].kind, SlotKind::Class);
        assert_eq!(slots[1].kind, SlotKind::Class);
        assert_eq!(slots[2].kind, SlotKind::Lab);
    }
}
