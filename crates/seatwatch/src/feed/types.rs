/// Raw section records as published by the external feed
use serde::{Deserialize, Serialize};

/// One section entry of the feed array.
///
/// The feed is loosely structured: almost every field other than the
/// identifiers and seat counts may be missing or null, so those are
/// optional and default when absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedSection {
    pub course_code: String,

    #[serde(default)]
    pub academic_degree: Option<String>,

    pub section_id: u64,

    #[serde(default)]
    pub section_name: String,

    #[serde(default)]
    pub capacity: i64,

    #[serde(default)]
    pub consumed_seat: i64,

    #[serde(default)]
    pub faculties: Option<String>,

    #[serde(default)]
    pub lab_faculties: Option<String>,

    #[serde(default)]
    pub room_number: Option<String>,

    #[serde(default)]
    pub room_name: Option<String>,

    #[serde(default)]
    pub lab_room_name: Option<String>,

    #[serde(default)]
    pub prerequisite_courses: Option<String>,

    /// Compact class schedule, e.g. `MONDAY(3:30 PM-4:50 PM-10A-04C)`
    #[serde(default)]
    pub pre_reg_schedule: Option<String>,

    /// Compact lab schedule, same shape as `pre_reg_schedule`
    #[serde(default)]
    pub pre_reg_lab_schedule: Option<String>,

    #[serde(default)]
    pub section_schedule: Option<FeedSectionSchedule>,

    #[serde(default)]
    pub lab_schedules: Option<Vec<FeedScheduleEntry>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedSectionSchedule {
    #[serde(default)]
    pub final_exam_detail: Option<String>,

    #[serde(default)]
    pub class_schedules: Option<Vec<FeedScheduleEntry>>,
}

/// Structured schedule entry with 24-hour `HH:MM` times.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedScheduleEntry {
    #[serde(default)]
    pub day: String,

    #[serde(default)]
    pub start_time: String,

    #[serde(default)]
    pub end_time: String,

    #[serde(default)]
    pub room_no: Option<String>,
}

impl FeedSection {
    /// The feed identifier as the store's primary key.
    pub fn key(&self) -> String {
        self.section_id.to_string()
    }

    /// Seats left, never negative.
    pub fn available(&self) -> i64 {
        self.capacity.saturating_sub(self.consumed_seat).max(0)
    }

    pub fn exam_date(&self) -> Option<&str> {
        self.section_schedule
            .as_ref()
            .and_then(|s| s.final_exam_detail.as_deref())
    }

    pub fn class_schedules(&self) -> &[FeedScheduleEntry] {
        self.section_schedule
            .as_ref()
            .and_then(|s| s.class_schedules.as_deref())
            .unwrap_or_default()
    }

    pub fn lab_schedules(&self) -> &[FeedScheduleEntry] {
        self.lab_schedules.as_deref().unwrap_or_default()
    }
}
