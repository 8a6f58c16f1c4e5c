use serde::Serialize;

use crate::schedule::AugmentedRecord;

/// One row of the `schedule` array in the response. The system has no
/// separate subject concept, so the grade label doubles as the subject.
#[derive(Debug, Clone, Serialize)]
pub struct ScheduleRow {
    pub subject: String,
    pub grade: String,
    pub teacher: String,
    pub day: String,
    pub period: u32,
    pub time: String,
    pub timeslot: String,
    pub duration: u32,
}

/// Counters reported alongside a successful schedule.
#[derive(Debug, Clone, Serialize)]
pub struct Metadata {
    pub total_assignments: usize,
    pub homeroom_assignments: usize,
    pub processing_time_seconds: f64,
}

/// Shape the augmented schedule into response rows. Periods are unit-length,
/// and `time` is the start of the slot.
pub fn shape(augmented: &[AugmentedRecord]) -> Vec<ScheduleRow> {
    augmented
        .iter()
        .map(|r| ScheduleRow {
            subject: r.grade.clone(),
            grade: r.grade.clone(),
            teacher: r.teacher.clone(),
            day: r.day_name.clone(),
            period: r.hour,
            time: r.time_slot.split('-').next().unwrap_or_default().to_string(),
            timeslot: r.time_slot.clone(),
            duration: 1,
        })
        .collect()
}
