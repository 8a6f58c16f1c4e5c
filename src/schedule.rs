use std::collections::HashSet;

use itertools::Itertools;
use serde::Serialize;

use crate::params::ScheduleParams;

/// One solved teaching assignment, read back from an `x` variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeachingRecord {
    pub teacher: String,
    pub grade: String,
    pub day: u32,
    pub hour: u32,
    pub day_name: String,
    pub time_slot: String,
}

/// A homeroom relation read back from an `hr` variable. The PE teacher is
/// never reported here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HomeroomRecord {
    pub teacher: String,
    pub grade: String,
}

/// Teaching record extended with the homeroom flag. Synthetic presence rows
/// carry `is_homeroom = true` but were never decision variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AugmentedRecord {
    pub teacher: String,
    pub grade: String,
    pub day: u32,
    pub hour: u32,
    pub day_name: String,
    pub time_slot: String,
    pub is_homeroom: bool,
}

/// Rewrite the raw teaching schedule into the augmented view.
///
/// Anchor-hour rows taught by a homeroom teacher of the class are flagged;
/// for every homeroom pair and anchor slot without a real teaching row, a
/// synthetic presence row is inserted. The coverage constraint already put
/// some teacher in that slot, so the presence row coexists with a real row
/// for the same class. Rows come back sorted by (grade, day, hour) so the
/// views are deterministic.
pub fn augment(
    teaching: &[TeachingRecord],
    homeroom: &[HomeroomRecord],
    params: &ScheduleParams,
) -> Vec<AugmentedRecord> {
    let anchors = params.homeroom_mode.anchor_hours(params.n_hours);
    let homeroom_pairs: HashSet<(&str, &str)> = homeroom
        .iter()
        .map(|r| (r.teacher.as_str(), r.grade.as_str()))
        .collect();

    let mut rows: Vec<AugmentedRecord> = teaching
        .iter()
        .map(|r| AugmentedRecord {
            teacher: r.teacher.clone(),
            grade: r.grade.clone(),
            day: r.day,
            hour: r.hour,
            day_name: r.day_name.clone(),
            time_slot: r.time_slot.clone(),
            is_homeroom: anchors.contains(&r.hour)
                && homeroom_pairs.contains(&(r.teacher.as_str(), r.grade.as_str())),
        })
        .collect();

    let occupied: HashSet<(&str, &str, u32, u32)> = teaching
        .iter()
        .map(|r| (r.teacher.as_str(), r.grade.as_str(), r.day, r.hour))
        .collect();

    for pair in homeroom {
        for &day in &params.days {
            for &hour in &anchors {
                if occupied.contains(&(pair.teacher.as_str(), pair.grade.as_str(), day, hour)) {
                    continue;
                }
                rows.push(AugmentedRecord {
                    teacher: pair.teacher.clone(),
                    grade: pair.grade.clone(),
                    day,
                    hour,
                    day_name: params.day_name(day).to_string(),
                    time_slot: params.time_label(hour).to_string(),
                    is_homeroom: true,
                });
            }
        }
    }

    rows.into_iter()
        .sorted_by(|a, b| {
            (a.grade.as_str(), a.day, a.hour, a.teacher.as_str())
                .cmp(&(b.grade.as_str(), b.day, b.hour, b.teacher.as_str()))
        })
        .collect()
}
