use csv::WriterBuilder;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

use crate::model::{AssignmentLedger, ParkingInventory, ParkingSpace};
use crate::schedule::{format_day, DayOutcome, DayPlan, WindowReport};

/// Formats a space label with its location, e.g. `A01 (Level 1)`
pub fn format_space(space: &ParkingSpace) -> String {
    if space.location.is_empty() {
        space.name.clone()
    } else {
        format!("{} ({})", space.name, space.location)
    }
}

/// Writes one line per space in the inventory: the holder's id, or `[EMPTY]`.
pub fn write_day<W: Write>(out: &mut W, plan: &DayPlan, inventory: &ParkingInventory) -> io::Result<()> {
    writeln!(out, "** {} **", format_day(plan.date))?;

    if plan.weekend_closed {
        writeln!(out, "Closed (weekend)")?;
        return Ok(());
    }

    for space in inventory.iter() {
        let holder = plan
            .assignments
            .iter()
            .find(|(_, id)| **id == space.id)
            .map(|(user, _)| user.to_string());
        let tag = if space.reserved { " [R]" } else { "" };
        match holder {
            Some(user) => writeln!(out, "{}{} {}", format_space(space), tag, user)?,
            None => writeln!(out, "{}{} [EMPTY]", format_space(space), tag)?,
        }
    }

    Ok(())
}

/// Writes each committed day of `report` to `<dir>/<date>.txt`. Returns the number of files.
pub fn write_day_files(report: &WindowReport, inventory: &ParkingInventory, dir: &Path) -> io::Result<usize> {
    fs::create_dir_all(dir)?;
    let mut written = 0;
    for day in &report.days {
        if let DayOutcome::Committed { plan, .. } = day {
            let mut file = File::create(dir.join(format!("{}.txt", plan.date)))?;
            write_day(&mut file, plan, inventory)?;
            written += 1;
        }
    }
    Ok(written)
}

/// Prints a day plan in a readable format
pub fn print_day_plan(plan: &DayPlan, inventory: &ParkingInventory) {
    println!("\n=== {} ===", format_day(plan.date));
    if plan.weekend_closed {
        println!("Weekend parking disabled, nothing assigned.");
        return;
    }
    println!("Assigned: {} / {} spaces", plan.assignments.len(), inventory.len());

    if !plan.unassigned.is_empty() {
        println!("⚠️  No space left for ({}):", plan.unassigned.len());
        for user in &plan.unassigned {
            println!("  - {}", user);
        }
    }
    if !plan.rejected.is_empty() {
        println!("Not eligible ({}):", plan.rejected.len());
        for rejection in &plan.rejected {
            println!("  - {} ({:?})", rejection.user_id, rejection.reason);
        }
    }

    let mut stdout = io::stdout().lock();
    if let Err(e) = write_day(&mut stdout, plan, inventory) {
        eprintln!("Failed to print day plan: {}", e);
    }
}

/// Prints every day of a run, failures included
pub fn print_report(report: &WindowReport, inventory: &ParkingInventory) {
    for day in &report.days {
        match day {
            DayOutcome::Committed { plan, .. } => print_day_plan(plan, inventory),
            DayOutcome::Failed { date, error } => {
                println!("\n=== {} ===", format_day(*date));
                println!("❌ Allocation failed: {}", error);
            }
        }
    }
    println!(
        "\n{} day(s) committed, {} failed",
        report.committed_count(),
        report.failed_count()
    );
}

/// Exports assignments as `date,user_id,space_id` rows
pub fn write_assignments_csv<W: Write>(out: W, ledger: &AssignmentLedger) -> Result<(), csv::Error> {
    let mut writer = WriterBuilder::new().from_writer(out);
    writer.write_record(["date", "user_id", "space_id"])?;
    for (date, day) in ledger.iter() {
        for assignment in day.to_assignments(*date) {
            writer.write_record([
                assignment.date.format("%Y-%m-%d").to_string(),
                assignment.user_id.to_string(),
                assignment.space_id.to_string(),
            ])?;
        }
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DayAssignments, SpaceId, SpaceType, UserId};
    use chrono::NaiveDate;

    fn inventory() -> ParkingInventory {
        let mut inv = ParkingInventory::new();
        inv.add(ParkingSpace::new("A01", "Level 1", SpaceType::Standard)).unwrap();
        inv.add(ParkingSpace::new("A02", "", SpaceType::Compact)).unwrap();
        inv.add(
            ParkingSpace::new("R01", "Level 2", SpaceType::Electric)
                .reserved_for(Some(UserId::new("ceo"))),
        )
        .unwrap();
        inv
    }

    fn plan() -> DayPlan {
        let mut plan = DayPlan::new(NaiveDate::from_ymd_opt(2026, 10, 20).unwrap());
        plan.assignments.assign(UserId::new("alice"), SpaceId::new("A01"));
        plan.assignments.assign(UserId::new("ceo"), SpaceId::new("R01"));
        plan
    }

    #[test]
    fn test_write_day_lists_every_space() {
        let mut out = Vec::new();
        write_day(&mut out, &plan(), &inventory()).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "** 2026-10-20 (Tue) **",
                "A01 (Level 1) alice",
                "A02 [EMPTY]",
                "R01 (Level 2) [R] ceo",
            ]
        );
    }

    #[test]
    fn test_write_day_closed_weekend() {
        let closed = DayPlan::closed(NaiveDate::from_ymd_opt(2026, 10, 17).unwrap());
        let mut out = Vec::new();
        write_day(&mut out, &closed, &inventory()).unwrap();
        assert!(String::from_utf8(out).unwrap().contains("Closed"));
    }

    #[test]
    fn test_write_day_files_skips_failed_days() {
        let report = WindowReport {
            start: NaiveDate::from_ymd_opt(2026, 10, 20).unwrap(),
            days: vec![
                DayOutcome::Committed { plan: plan(), candidates: 1, revision: 1 },
                DayOutcome::Failed {
                    date: NaiveDate::from_ymd_opt(2026, 10, 21).unwrap(),
                    error: "conflict".to_string(),
                },
            ],
        };
        let dir = tempfile::tempdir().unwrap();
        let out_dir = dir.path().join("days");

        assert_eq!(write_day_files(&report, &inventory(), &out_dir).unwrap(), 1);
        let content = std::fs::read_to_string(out_dir.join("2026-10-20.txt")).unwrap();
        assert!(content.starts_with("** 2026-10-20"));
        assert!(!out_dir.join("2026-10-21.txt").exists());
    }

    #[test]
    fn test_assignments_csv() {
        let mut ledger = AssignmentLedger::new();
        let mut day = DayAssignments::new();
        day.assign(UserId::new("bob"), SpaceId::new("A02"));
        ledger.record(NaiveDate::from_ymd_opt(2026, 10, 21).unwrap(), day);
        ledger.record(NaiveDate::from_ymd_opt(2026, 10, 20).unwrap(), plan().assignments);

        let mut out = Vec::new();
        write_assignments_csv(&mut out, &ledger).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "date,user_id,space_id\n2026-10-20,alice,A01\n2026-10-20,ceo,R01\n2026-10-21,bob,A02\n"
        );
    }
}
