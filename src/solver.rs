use std::collections::HashMap;
use std::time::Instant;

use good_lp::{
    Expression, ProblemVariables, ResolutionError, Solution, SolverModel, Variable, constraint,
    default_solver, variable,
};
use log::{debug, info};

use crate::error::SchedulerError;
use crate::params::ScheduleParams;
use crate::schedule::{HomeroomRecord, TeachingRecord};

/// Hard wall-clock budget for a single solve.
const SOLVE_TIME_LIMIT_SECONDS: f64 = 300.0;

/// The two raw tables read back from a solved model.
#[derive(Debug, Clone)]
pub struct RawSolution {
    pub teaching: Vec<TeachingRecord>,
    pub homeroom: Vec<HomeroomRecord>,
}

struct DecisionVars {
    /// x[(t, g, d, h)] = 1 iff teacher t teaches grade g on day d at hour h.
    /// No variable exists at the lunch hour.
    x: HashMap<(usize, usize, u32, u32), Variable>,
    /// hr[(t, g)] = 1 iff teacher t is a homeroom teacher of grade g.
    /// Empty unless homeroom anchoring is on.
    homeroom: HashMap<(usize, usize), Variable>,
}

fn create_decision_vars(problem: &mut ProblemVariables, p: &ScheduleParams) -> DecisionVars {
    let mut x = HashMap::new();
    for t in 0..p.teachers.len() {
        for g in 0..p.grades.len() {
            for &d in &p.days {
                for &h in &p.teaching_hours {
                    x.insert((t, g, d, h), problem.add(variable().binary()));
                }
            }
        }
    }

    let mut homeroom = HashMap::new();
    if p.homeroom_mode.enabled() {
        for t in 0..p.teachers.len() {
            for g in 0..p.grades.len() {
                homeroom.insert((t, g), problem.add(variable().binary()));
            }
        }
    }

    DecisionVars { x, homeroom }
}

/// Build the model, run the engine under the wall-clock budget, and read the
/// assignment back into the raw tables.
pub fn solve(p: &ScheduleParams) -> Result<RawSolution, SchedulerError> {
    let started = Instant::now();
    let n_teachers = p.teachers.len();
    let n_grades = p.grades.len();

    info!(
        "building model: {} teachers, {} grades, {} days, {} periods/day ({} teaching)",
        n_teachers,
        n_grades,
        p.days.len(),
        p.hours.len(),
        p.teaching_hours.len()
    );

    let mut problem = ProblemVariables::new();
    let vars = create_decision_vars(&mut problem, p);
    if vars.x.is_empty() {
        // n_hours = 1 with the lunch hour on it leaves no teaching slots.
        return Err(SchedulerError::no_solution(
            "no teaching hours remain once the lunch hour is removed",
        ));
    }
    debug!(
        "{} assignment variables, {} homeroom variables",
        vars.x.len(),
        vars.homeroom.len()
    );

    // Pure feasibility: any admissible assignment is acceptable.
    let mut model = problem
        .minimise(Expression::from(0.0))
        .using(default_solver)
        .set_option("time_limit", SOLVE_TIME_LIMIT_SECONDS);

    // Every class slot is covered by exactly one teacher.
    for g in 0..n_grades {
        for &d in &p.days {
            for &h in &p.teaching_hours {
                let covered: Expression = (0..n_teachers).map(|t| vars.x[&(t, g, d, h)]).sum();
                model.add_constraint(constraint!(covered == 1));
            }
        }
    }

    // A teacher stands in at most one classroom per slot.
    for t in 0..n_teachers {
        for &d in &p.days {
            for &h in &p.teaching_hours {
                let busy: Expression = (0..n_grades).map(|g| vars.x[&(t, g, d, h)]).sum();
                model.add_constraint(constraint!(busy <= 1));
            }
        }
    }

    // No teacher takes the same class two periods in a row. Pairs spanning
    // the lunch hour are not adjacent.
    for t in 0..n_teachers {
        for g in 0..n_grades {
            for &d in &p.days {
                for h in 1..p.n_hours {
                    if h != p.lunch_hour && h + 1 != p.lunch_hour {
                        let pair = vars.x[&(t, g, d, h)] + vars.x[&(t, g, d, h + 1)];
                        model.add_constraint(constraint!(pair <= 1));
                    }
                }
            }
        }
    }

    if p.homeroom_mode.enabled() {
        let anchors = p.homeroom_mode.anchor_hours(p.n_hours);

        for t in 0..n_teachers {
            let load: Expression = (0..n_grades).map(|g| vars.homeroom[&(t, g)]).sum();
            model.add_constraint(constraint!(load <= 1));
        }
        for g in 0..n_grades {
            let assigned: Expression = (0..n_teachers).map(|t| vars.homeroom[&(t, g)]).sum();
            model.add_constraint(constraint!(assigned >= 1));
        }

        // Anchor periods are taught by a homeroom teacher of the class, and
        // every anchor slot is covered. An anchor falling on the lunch hour
        // has no variables, which leaves the coverage sum empty and the
        // model infeasible.
        for t in 0..n_teachers {
            for g in 0..n_grades {
                let hr_var = vars.homeroom[&(t, g)];
                for &d in &p.days {
                    for &h in &anchors {
                        if let Some(&x_var) = vars.x.get(&(t, g, d, h)) {
                            model.add_constraint(constraint!(x_var <= hr_var));
                        }
                    }
                }
            }
        }
        for g in 0..n_grades {
            for &d in &p.days {
                for &h in &anchors {
                    let covered: Expression = (0..n_teachers)
                        .filter_map(|t| vars.x.get(&(t, g, d, h)))
                        .copied()
                        .sum();
                    model.add_constraint(constraint!(covered >= 1));
                }
            }
        }
    }

    if p.enable_pe_constraints {
        let pe = p
            .teachers
            .iter()
            .position(|t| *t == p.pe_teacher)
            .ok_or_else(|| SchedulerError::internal("validated pe_teacher missing from roster"))?;
        let pe_grade_set: Vec<usize> = (0..n_grades)
            .filter(|&g| p.pe_grades.contains(&p.grades[g]))
            .collect();

        if p.n_pe_periods > 0 {
            // Each PE class meets its teacher exactly once, on the PE day.
            for &g in &pe_grade_set {
                let on_pe_day: Expression = p
                    .teaching_hours
                    .iter()
                    .map(|&h| vars.x[&(pe, g, p.pe_day, h)])
                    .sum();
                model.add_constraint(constraint!(on_pe_day == 1));
            }
        }

        // The PE teacher never covers a non-PE class.
        for g in (0..n_grades).filter(|&g| p.non_pe_grades.contains(&p.grades[g])) {
            let excluded: Expression = p
                .days
                .iter()
                .flat_map(|&d| p.teaching_hours.iter().map(move |&h| (d, h)))
                .map(|(d, h)| vars.x[&(pe, g, d, h)])
                .sum();
            model.add_constraint(constraint!(excluded == 0));
        }

        // Weekly PE load is fixed.
        let weekly_load: Expression = (0..n_grades)
            .flat_map(|g| {
                p.days
                    .iter()
                    .flat_map(move |&d| p.teaching_hours.iter().map(move |&h| (g, d, h)))
            })
            .map(|(g, d, h)| vars.x[&(pe, g, d, h)])
            .sum();
        model.add_constraint(constraint!(weekly_load == p.n_pe_periods as i32));
    }

    info!("starting solve");
    let solution = match model.solve() {
        Ok(solution) => solution,
        Err(ResolutionError::Infeasible) => {
            return Err(SchedulerError::no_solution(
                "no feasible solution found for the given constraints",
            ));
        }
        Err(ResolutionError::Unbounded) => {
            return Err(SchedulerError::internal(
                "solver reported an unbounded model",
            ));
        }
        Err(err) => {
            return Err(SchedulerError::no_solution(format!(
                "solver stopped without a solution: {err}"
            )));
        }
    };
    info!("solve finished in {:.2?}", started.elapsed());

    let raw = extract(&solution, &vars, p);
    verify_coverage(&raw.teaching, p)?;
    Ok(raw)
}

fn extract(solution: &impl Solution, vars: &DecisionVars, p: &ScheduleParams) -> RawSolution {
    let mut teaching = Vec::new();
    for (t, teacher) in p.teachers.iter().enumerate() {
        for (g, grade) in p.grades.iter().enumerate() {
            for &d in &p.days {
                for &h in &p.teaching_hours {
                    if solution.value(vars.x[&(t, g, d, h)]) > 0.5 {
                        teaching.push(TeachingRecord {
                            teacher: teacher.clone(),
                            grade: grade.clone(),
                            day: d,
                            hour: h,
                            day_name: p.day_name(d).to_string(),
                            time_slot: p.time_label(h).to_string(),
                        });
                    }
                }
            }
        }
    }

    let mut homeroom = Vec::new();
    for (t, teacher) in p.teachers.iter().enumerate() {
        if *teacher == p.pe_teacher {
            // Never reported as homeroom, whatever the model assigned.
            continue;
        }
        for (g, grade) in p.grades.iter().enumerate() {
            if let Some(&var) = vars.homeroom.get(&(t, g)) {
                if solution.value(var) > 0.5 {
                    homeroom.push(HomeroomRecord {
                        teacher: teacher.clone(),
                        grade: grade.clone(),
                    });
                }
            }
        }
    }

    RawSolution { teaching, homeroom }
}

/// The driver's feasibility criterion: an engine that stops at the budget can
/// hand back a relaxed incumbent, so full coverage is re-checked before the
/// assignment is reported.
fn verify_coverage(teaching: &[TeachingRecord], p: &ScheduleParams) -> Result<(), SchedulerError> {
    let expected = p.grades.len() * p.days.len() * p.teaching_hours.len();
    let mut counts: HashMap<(&str, u32, u32), usize> = HashMap::new();
    for record in teaching {
        *counts
            .entry((record.grade.as_str(), record.day, record.hour))
            .or_insert(0) += 1;
    }

    let complete = teaching.len() == expected
        && p.grades.iter().all(|g| {
            p.days.iter().all(|&d| {
                p.teaching_hours
                    .iter()
                    .all(|&h| counts.get(&(g.as_str(), d, h)) == Some(&1))
            })
        });
    if !complete {
        return Err(SchedulerError::no_solution(
            "solver budget exhausted before a complete schedule was found",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ScheduleRequest;
    use serde_json::json;
    use std::collections::HashSet;

    fn params(body: serde_json::Value) -> ScheduleParams {
        let req: ScheduleRequest = serde_json::from_value(body).unwrap();
        req.validate().unwrap()
    }

    /// Structural invariants every accepted solution must satisfy: exactly
    /// one teacher per class slot, at most one class per teacher slot, no
    /// lunch-hour rows, no back-to-back same teacher/class pairs.
    fn assert_structural(raw: &RawSolution, p: &ScheduleParams) {
        let mut slot_counts: HashMap<(&str, u32, u32), usize> = HashMap::new();
        let mut teacher_slots: HashMap<(&str, u32, u32), usize> = HashMap::new();
        for r in &raw.teaching {
            assert_ne!(r.hour, p.lunch_hour, "teaching row at the lunch hour");
            *slot_counts
                .entry((r.grade.as_str(), r.day, r.hour))
                .or_insert(0) += 1;
            *teacher_slots
                .entry((r.teacher.as_str(), r.day, r.hour))
                .or_insert(0) += 1;
        }

        for g in &p.grades {
            for &d in &p.days {
                for &h in &p.teaching_hours {
                    assert_eq!(
                        slot_counts.get(&(g.as_str(), d, h)),
                        Some(&1),
                        "slot ({g}, {d}, {h}) not covered exactly once"
                    );
                }
            }
        }
        assert!(teacher_slots.values().all(|&n| n <= 1));

        let assigned: HashSet<(&str, &str, u32, u32)> = raw
            .teaching
            .iter()
            .map(|r| (r.teacher.as_str(), r.grade.as_str(), r.day, r.hour))
            .collect();
        for &(t, g, d, h) in &assigned {
            if h + 1 != p.lunch_hour {
                assert!(
                    !assigned.contains(&(t, g, d, h + 1)),
                    "{t} teaches {g} at both {h} and {} on day {d}",
                    h + 1
                );
            }
        }
    }

    fn homeroom_of<'a>(raw: &'a RawSolution, grade: &str) -> Vec<&'a str> {
        raw.homeroom
            .iter()
            .filter(|r| r.grade == grade)
            .map(|r| r.teacher.as_str())
            .collect()
    }

    #[test]
    fn minimal_feasible_schedule() {
        let p = params(json!({
            "n_teachers": 3,
            "grades": ["P1", "P2"],
            "n_hours": 4,
            "lunch_hour": 3,
            "days_per_week": 3,
            "homeroom_mode": 1,
        }));
        let raw = solve(&p).unwrap();

        assert_eq!(raw.teaching.len(), 2 * 3 * 3);
        assert_structural(&raw, &p);

        // Each grade has at least one homeroom teacher, each teacher at most
        // one grade, and the last period is always taught by one of them.
        assert!(raw.homeroom.len() >= 2);
        let mut per_teacher: HashMap<&str, usize> = HashMap::new();
        for r in &raw.homeroom {
            *per_teacher.entry(r.teacher.as_str()).or_insert(0) += 1;
        }
        assert!(per_teacher.values().all(|&n| n <= 1));

        for g in &p.grades {
            let anchors = homeroom_of(&raw, g);
            assert!(!anchors.is_empty());
            for &d in &p.days {
                let last = raw
                    .teaching
                    .iter()
                    .find(|r| r.grade == *g && r.day == d && r.hour == p.n_hours)
                    .unwrap();
                assert!(anchors.contains(&last.teacher.as_str()));
            }
        }
    }

    #[test]
    fn mode_two_anchors_both_ends_of_the_day() {
        let p = params(json!({
            "n_teachers": 3,
            "grades": ["P1", "P2"],
            "n_hours": 4,
            "lunch_hour": 3,
            "days_per_week": 3,
            "homeroom_mode": 2,
        }));
        let raw = solve(&p).unwrap();
        assert_structural(&raw, &p);

        for g in &p.grades {
            let anchors = homeroom_of(&raw, g);
            for &d in &p.days {
                for hour in [1, p.n_hours] {
                    let row = raw
                        .teaching
                        .iter()
                        .find(|r| r.grade == *g && r.day == d && r.hour == hour)
                        .unwrap();
                    assert!(
                        anchors.contains(&row.teacher.as_str()),
                        "anchor slot ({g}, {d}, {hour}) taught by {}",
                        row.teacher
                    );
                }
            }
        }
    }

    #[test]
    fn pe_load_is_concentrated_on_the_pe_day() {
        let p = params(json!({
            "n_teachers": 5,
            "grades": ["P1", "P2", "P3"],
            "pe_teacher": "T5",
            "pe_grades": ["P2", "P3"],
            "pe_day": 2,
            "n_pe_periods": 2,
            "n_hours": 4,
            "lunch_hour": 3,
            "days_per_week": 3,
            "enable_pe_constraints": true,
            "homeroom_mode": 0,
        }));
        let raw = solve(&p).unwrap();
        assert_structural(&raw, &p);

        let pe_rows: Vec<_> = raw.teaching.iter().filter(|r| r.teacher == "T5").collect();
        assert_eq!(pe_rows.len(), 2);
        assert!(pe_rows.iter().all(|r| r.day == 2));
        for grade in ["P2", "P3"] {
            assert_eq!(pe_rows.iter().filter(|r| r.grade == grade).count(), 1);
        }
        assert!(pe_rows.iter().all(|r| r.grade != "P1"));
    }

    #[test]
    fn pe_parameters_are_ignored_when_disabled() {
        // n_pe_periods stays at its default of 6, which could never fit this
        // grid; with PE off it must not constrain anything.
        let p = params(json!({
            "n_teachers": 3,
            "grades": ["P1", "P2"],
            "n_hours": 4,
            "lunch_hour": 3,
            "days_per_week": 2,
            "homeroom_mode": 0,
        }));
        let raw = solve(&p).unwrap();
        assert_structural(&raw, &p);
        assert!(raw.homeroom.is_empty());
    }

    #[test]
    fn one_teacher_cannot_cover_two_grades() {
        let p = params(json!({
            "n_teachers": 1,
            "grades": ["P1", "P2"],
            "homeroom_mode": 1,
        }));
        match solve(&p) {
            Err(SchedulerError::NoFeasibleSolution(_)) => {}
            other => panic!("expected no_feasible_solution, got {other:?}"),
        }
    }

    #[test]
    fn lunch_only_grid_is_infeasible() {
        let p = params(json!({
            "n_teachers": 2,
            "grades": ["P1"],
            "n_hours": 1,
            "lunch_hour": 1,
            "pe_day": 1,
            "days_per_week": 2,
            "homeroom_mode": 0,
        }));
        match solve(&p) {
            Err(SchedulerError::NoFeasibleSolution(_)) => {}
            other => panic!("expected no_feasible_solution, got {other:?}"),
        }
    }

    #[test]
    fn lunch_at_the_last_period_still_solves() {
        let p = params(json!({
            "n_teachers": 3,
            "grades": ["P1", "P2"],
            "n_hours": 4,
            "lunch_hour": 4,
            "days_per_week": 2,
            "homeroom_mode": 0,
        }));
        let raw = solve(&p).unwrap();
        assert_structural(&raw, &p);
        assert_eq!(raw.teaching.len(), 2 * 2 * 3);
    }
}
