use serde::{Deserialize, Serialize};

use crate::error::SchedulerError;

pub const MAX_TEACHERS: i64 = 50;
pub const MAX_GRADES: usize = 20;
pub const MAX_HOURS_PER_DAY: i64 = 12;
pub const MAX_DAYS_PER_WEEK: i64 = 7;

const DAY_NAMES: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

fn default_pe_teacher() -> String {
    "T13".to_string()
}

fn default_pe_grades() -> Vec<String> {
    ["P4", "P5", "P6", "M1", "M2", "M3"]
        .iter()
        .map(|g| g.to_string())
        .collect()
}

fn default_pe_day() -> i64 {
    3
}

fn default_n_pe_periods() -> i64 {
    6
}

fn default_start_hour() -> i64 {
    8
}

fn default_n_hours() -> i64 {
    8
}

fn default_lunch_hour() -> i64 {
    5
}

fn default_days_per_week() -> i64 {
    5
}

fn default_homeroom_mode() -> i64 {
    1
}

/// Options recognized by `POST /generate_schedule`. Fields left out of the
/// request body take the documented defaults, so serializing the request back
/// echoes the effective option set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleRequest {
    pub n_teachers: i64,
    pub grades: Vec<String>,
    #[serde(default = "default_pe_teacher")]
    pub pe_teacher: String,
    #[serde(default = "default_pe_grades")]
    pub pe_grades: Vec<String>,
    #[serde(default = "default_pe_day")]
    pub pe_day: i64,
    #[serde(default = "default_n_pe_periods")]
    pub n_pe_periods: i64,
    #[serde(default = "default_start_hour")]
    pub start_hour: i64,
    #[serde(default = "default_n_hours")]
    pub n_hours: i64,
    #[serde(default = "default_lunch_hour")]
    pub lunch_hour: i64,
    #[serde(default = "default_days_per_week")]
    pub days_per_week: i64,
    #[serde(default)]
    pub enable_pe_constraints: bool,
    #[serde(default = "default_homeroom_mode")]
    pub homeroom_mode: i64,
}

/// Homeroom anchoring policy. The model builder and the schedule augmenter
/// both read the anchor set from here, so the constraints and the synthetic
/// presence rows can never disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HomeroomMode {
    Disabled,
    LastPeriod,
    FirstAndLast,
}

impl HomeroomMode {
    fn from_flag(raw: i64) -> Option<Self> {
        match raw {
            0 => Some(HomeroomMode::Disabled),
            1 => Some(HomeroomMode::LastPeriod),
            2 => Some(HomeroomMode::FirstAndLast),
            _ => None,
        }
    }

    pub fn enabled(self) -> bool {
        self != HomeroomMode::Disabled
    }

    /// Periods at which homeroom presence is required.
    pub fn anchor_hours(self, n_hours: u32) -> Vec<u32> {
        match self {
            HomeroomMode::Disabled => vec![],
            HomeroomMode::LastPeriod => vec![n_hours],
            HomeroomMode::FirstAndLast => vec![1, n_hours],
        }
    }
}

/// Validated, immutable scheduling parameters with the derived index sets.
#[derive(Debug, Clone)]
pub struct ScheduleParams {
    pub teachers: Vec<String>,
    pub grades: Vec<String>,
    pub pe_teacher: String,
    pub pe_grades: Vec<String>,
    pub non_pe_grades: Vec<String>,
    pub pe_day: u32,
    pub n_pe_periods: u32,
    pub start_hour: u32,
    pub n_hours: u32,
    pub lunch_hour: u32,
    pub enable_pe_constraints: bool,
    pub homeroom_mode: HomeroomMode,
    /// 1-based day indices, `1..=days_per_week`.
    pub days: Vec<u32>,
    /// 1-based period indices, `1..=n_hours`.
    pub hours: Vec<u32>,
    /// `hours` with the lunch period removed.
    pub teaching_hours: Vec<u32>,
    /// `"HH:00-HH:00"` labels, indexed by period - 1.
    pub time_labels: Vec<String>,
}

impl ScheduleParams {
    pub fn day_name(&self, day: u32) -> &'static str {
        DAY_NAMES[(day - 1) as usize]
    }

    pub fn time_label(&self, hour: u32) -> &str {
        &self.time_labels[(hour - 1) as usize]
    }
}

impl ScheduleRequest {
    /// Check every rule in order and build the validated parameter object.
    /// The first failing rule is the one reported.
    pub fn validate(&self) -> Result<ScheduleParams, SchedulerError> {
        if self.n_teachers < 1 || self.n_teachers > MAX_TEACHERS {
            return Err(SchedulerError::invalid(format!(
                "n_teachers must be between 1 and {MAX_TEACHERS}"
            )));
        }
        if self.grades.is_empty() {
            return Err(SchedulerError::invalid("grades must be a non-empty list"));
        }
        if self.grades.len() > MAX_GRADES {
            return Err(SchedulerError::invalid(format!(
                "grades list cannot exceed {MAX_GRADES} items"
            )));
        }
        if let Some(grade) = self.grades.iter().find(|g| g.is_empty()) {
            return Err(SchedulerError::invalid(format!(
                "Invalid grade format: {grade}"
            )));
        }
        if self.pe_day < 1 || self.pe_day > MAX_DAYS_PER_WEEK {
            return Err(SchedulerError::invalid(format!(
                "pe_day must be between 1 and {MAX_DAYS_PER_WEEK}"
            )));
        }
        if self.n_pe_periods < 0 {
            return Err(SchedulerError::invalid("n_pe_periods must be non-negative"));
        }
        if self.start_hour < 0 || self.start_hour > 23 {
            return Err(SchedulerError::invalid(
                "start_hour must be between 0 and 23",
            ));
        }
        if self.n_hours < 1 || self.n_hours > MAX_HOURS_PER_DAY {
            return Err(SchedulerError::invalid(format!(
                "n_hours must be between 1 and {MAX_HOURS_PER_DAY}"
            )));
        }
        if self.days_per_week < 1 || self.days_per_week > MAX_DAYS_PER_WEEK {
            return Err(SchedulerError::invalid(format!(
                "days_per_week must be between 1 and {MAX_DAYS_PER_WEEK}"
            )));
        }
        if self.lunch_hour < 1 || self.lunch_hour > self.n_hours {
            return Err(SchedulerError::invalid(
                "lunch_hour must be between 1 and n_hours",
            ));
        }
        let homeroom_mode = HomeroomMode::from_flag(self.homeroom_mode)
            .ok_or_else(|| SchedulerError::invalid("homeroom_mode must be 0, 1, or 2"))?;
        if self.pe_day > self.days_per_week {
            return Err(SchedulerError::invalid("pe_day cannot exceed days_per_week"));
        }

        let teachers: Vec<String> = (1..=self.n_teachers).map(|i| format!("T{i}")).collect();
        if self.enable_pe_constraints {
            if !teachers.contains(&self.pe_teacher) {
                return Err(SchedulerError::invalid(format!(
                    "pe_teacher {} is not one of the synthesized teacher ids",
                    self.pe_teacher
                )));
            }
            if let Some(grade) = self.pe_grades.iter().find(|g| !self.grades.contains(g)) {
                return Err(SchedulerError::invalid(format!(
                    "pe_grades entry {grade} is not in grades"
                )));
            }
        }

        let n_hours = self.n_hours as u32;
        let lunch_hour = self.lunch_hour as u32;
        let start_hour = self.start_hour as u32;
        let hours: Vec<u32> = (1..=n_hours).collect();
        let teaching_hours: Vec<u32> = hours
            .iter()
            .copied()
            .filter(|&h| h != lunch_hour)
            .collect();
        let time_labels: Vec<String> = hours
            .iter()
            .map(|h| {
                let start = start_hour + h - 1;
                format!("{start:02}:00-{:02}:00", start + 1)
            })
            .collect();
        let non_pe_grades: Vec<String> = self
            .grades
            .iter()
            .filter(|g| !self.pe_grades.contains(g))
            .cloned()
            .collect();

        Ok(ScheduleParams {
            teachers,
            grades: self.grades.clone(),
            pe_teacher: self.pe_teacher.clone(),
            pe_grades: self.pe_grades.clone(),
            non_pe_grades,
            pe_day: self.pe_day as u32,
            n_pe_periods: self.n_pe_periods as u32,
            start_hour,
            n_hours,
            lunch_hour,
            enable_pe_constraints: self.enable_pe_constraints,
            homeroom_mode,
            days: (1..=self.days_per_week as u32).collect(),
            hours,
            teaching_hours,
            time_labels,
        })
    }
}
