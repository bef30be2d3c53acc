use std::fmt;

use crate::core::{Caveat, MonthSnapshot, SimulationResult, SimulationStatus};

use super::Report;

/// `$1,234,567.89`, with a leading minus for negatives.
pub fn format_currency(amount: f64) -> String {
    if !amount.is_finite() {
        return amount.to_string();
    }
    let fixed = format!("{:.2}", amount.abs());
    let (dollars, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let mut grouped = String::with_capacity(dollars.len() + dollars.len() / 3);
    for (i, c) in dollars.chars().enumerate() {
        if i > 0 && (dollars.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    let sign = if amount < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("{sign}${grouped}.{cents}")
}

fn format_rate(rate: f64) -> String {
    format!("{:.4}%", rate * 100.0)
}

fn format_duration(months: u32) -> String {
    let (years, rest) = (months / 12, months % 12);
    match (years, rest) {
        (0, m) => format!("{m} months"),
        (y, 0) => format!("{y} years"),
        (y, m) => format!("{y} years {m} months"),
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let closed = &self.closed_form;
        writeln!(
            f,
            "Target: {} ({} months)",
            format_duration(closed.target_months),
            closed.target_months
        )?;
        writeln!(
            f,
            "Net monthly withdrawal today: {}",
            format_currency(closed.net_monthly_withdrawal)
        )?;
        writeln!(
            f,
            "Real monthly rate: {}",
            format_rate(closed.real_monthly_rate)
        )?;
        if closed.zero_balance_sufficient {
            writeln!(
                f,
                "Closed-form required balance: {} (income covers the plan)",
                format_currency(0.0)
            )?;
        } else {
            writeln!(
                f,
                "Closed-form required balance: {}",
                format_currency(closed.required_balance)
            )?;
        }

        if let Some(solver) = &self.solver {
            write!(
                f,
                "Solver-refined required balance: {} ({} iterations, within {})",
                format_currency(solver.required_balance),
                solver.iterations,
                format_currency(solver.achieved_tolerance)
            )?;
            if !solver.converged {
                f.write_str(" [iteration cap reached]")?;
            }
            writeln!(f)?;
            if solver.bracket_expansions > 0 {
                writeln!(
                    f,
                    "  search bracket widened {} times past the closed-form seed",
                    solver.bracket_expansions
                )?;
            }
        }

        if let (Some(balance), Some(run)) = (self.starting_balance, &self.longevity) {
            writeln!(f)?;
            write_longevity(f, balance, run, self.target_years)?;
            if self.show_table && !run.snapshots.is_empty() {
                writeln!(f)?;
                write_table(f, &run.snapshots)?;
            }
        }
        Ok(())
    }
}

fn write_longevity(
    f: &mut fmt::Formatter<'_>,
    balance: f64,
    run: &SimulationResult,
    target_years: f64,
) -> fmt::Result {
    writeln!(f, "Starting balance: {}", format_currency(balance))?;
    match run.status {
        SimulationStatus::RanOut => {
            writeln!(
                f,
                "Runs out after {} ({:.2} years)",
                format_duration(run.months_lasted),
                run.years_lasted()
            )?;
            let verdict = if run.years_lasted() >= target_years {
                "meets"
            } else {
                "falls short of"
            };
            writeln!(f, "This {verdict} the {target_years} year target")?;
        }
        SimulationStatus::LastedFullTerm => {
            writeln!(
                f,
                "Lasts the full term of {}",
                format_duration(run.months_lasted)
            )?;
        }
        SimulationStatus::LastsIndefinitely => writeln!(f, "Lasts indefinitely")?,
    }
    writeln!(
        f,
        "Balance after {}: {}",
        format_duration(run.months_simulated),
        format_currency(run.ending_balance)
    )?;
    if run.caveat == Some(Caveat::ComputationCapReached) {
        writeln!(
            f,
            "note: stopped at the {} month cap without running out",
            run.months_simulated
        )?;
    }
    Ok(())
}

const TABLE_HEADERS: [&str; 7] = [
    "Month",
    "Age",
    "Balance",
    "Monthly Wd",
    "Yearly Wd",
    "Income",
    "Monthly Return",
];

fn write_row<S: AsRef<str>>(
    f: &mut fmt::Formatter<'_>,
    widths: &[usize],
    cells: &[S],
) -> fmt::Result {
    f.write_str("|")?;
    for (i, (cell, &w)) in cells.iter().zip(widths).enumerate() {
        let cell = cell.as_ref();
        if i == 0 {
            write!(f, " {cell:<w$} |")?;
        } else {
            write!(f, " {cell:>w$} |")?;
        }
    }
    writeln!(f)
}

/// GitHub-flavoured markdown table, one row per simulated month.
fn write_table(f: &mut fmt::Formatter<'_>, snapshots: &[MonthSnapshot]) -> fmt::Result {
    let rows: Vec<[String; 7]> = snapshots
        .iter()
        .map(|s| {
            [
                s.month_index.to_string(),
                s.age.map_or_else(|| "-".to_string(), |age| format!("{age:.2}")),
                format_currency(s.balance),
                format_currency(s.monthly_withdrawal),
                format_currency(s.extra_withdrawal),
                format_currency(s.income),
                format_currency(s.investment_return),
            ]
        })
        .collect();

    let mut widths = TABLE_HEADERS.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    write_row(f, &widths, &TABLE_HEADERS)?;
    f.write_str("|")?;
    for (i, width) in widths.iter().enumerate() {
        let dashes = "-".repeat(width + 1);
        if i == 0 {
            write!(f, ":{dashes}|")?;
        } else {
            write!(f, "{dashes}:|")?;
        }
    }
    writeln!(f)?;
    for row in &rows {
        write_row(f, &widths, row)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{Cli, build_report};
    use clap::Parser;

    fn report_for(extra: &[&str]) -> Report {
        let mut args = vec![
            "runway",
            "--annual-return",
            "5",
            "--inflation-rate",
            "3",
            "--monthly-expenses",
            "3000",
            "--target-years",
            "30",
        ];
        args.extend_from_slice(extra);
        let cli = Cli::try_parse_from(args).expect("flags should parse");
        build_report(&cli).expect("valid report")
    }

    #[test]
    fn currency_groups_thousands() {
        assert_eq!(format_currency(0.0), "$0.00");
        assert_eq!(format_currency(999.994), "$999.99");
        assert_eq!(format_currency(999.996), "$1,000.00");
        assert_eq!(format_currency(1_234_567.891), "$1,234,567.89");
        assert_eq!(format_currency(-42_000.5), "-$42,000.50");
        assert_eq!(format_currency(-0.001), "$0.00");
    }

    #[test]
    fn currency_keeps_every_digit_of_huge_balances() {
        assert_eq!(
            format_currency(1e21),
            "$1,000,000,000,000,000,000,000.00"
        );
        assert_eq!(
            format_currency(-2.5e18),
            "-$2,500,000,000,000,000,000.00"
        );
        assert_eq!(format_currency(f64::INFINITY), "inf");
    }

    #[test]
    fn durations_read_naturally() {
        assert_eq!(format_duration(7), "7 months");
        assert_eq!(format_duration(360), "30 years");
        assert_eq!(format_duration(129), "10 years 9 months");
    }

    #[test]
    fn text_report_lists_closed_form_and_solver() {
        let text = report_for(&["--solve"]).to_string();
        assert!(text.contains("Target: 30 years (360 months)"));
        assert!(text.contains("Closed-form required balance: $"));
        assert!(text.contains("Solver-refined required balance: $"));
        assert!(!text.contains("Starting balance"));
    }

    #[test]
    fn text_report_flags_income_covering_the_plan() {
        let text = report_for(&["--monthly-income", "3500"]).to_string();
        assert!(text.contains("(income covers the plan)"));
    }

    #[test]
    fn text_report_describes_shortfall() {
        let text = report_for(&["--starting-balance", "350000"]).to_string();
        assert!(text.contains("Starting balance: $350,000.00"));
        assert!(text.contains("Runs out after 10 years"));
        assert!(text.contains("falls short of the 30 year target"));
    }

    #[test]
    fn text_report_notes_cap_caveat() {
        let text = report_for(&[
            "--monthly-income",
            "3000",
            "--starting-balance",
            "1000",
            "--month-cap",
            "600",
        ])
        .to_string();
        assert!(text.contains("Lasts indefinitely"));
        assert!(text.contains("month cap"));
    }

    #[test]
    fn text_report_prints_full_ending_balance_after_centuries_of_growth() {
        let cli = Cli::try_parse_from([
            "runway",
            "--annual-return",
            "20",
            "--inflation-rate",
            "25",
            "--monthly-income",
            "5000",
            "--monthly-expenses",
            "1000",
            "--target-years",
            "30",
            "--starting-balance",
            "1000000",
        ])
        .expect("flags should parse");
        let report = build_report(&cli).expect("valid report");
        let run = report.longevity.as_ref().expect("longevity requested");
        assert!(run.ending_balance > 1e29);

        let text = report.to_string();
        assert!(text.contains("Balance after 250 years: $1,"));
        assert!(!text.contains("184,467,440,737,095,516"));
    }

    #[test]
    fn table_has_header_rule_and_one_row_per_month() {
        let report = report_for(&[
            "--starting-balance",
            "10000",
            "--start-age",
            "65",
            "--table",
        ]);
        let run = report.longevity.as_ref().expect("longevity requested");
        let text = report.to_string();
        let table: Vec<&str> = text.lines().filter(|l| l.starts_with('|')).collect();
        assert_eq!(table.len(), run.months_simulated as usize + 2);
        assert!(table[0].contains("Monthly Return"));
        assert!(table[1].starts_with("|:-"));
        assert!(table[2].starts_with("| 1 "));
        assert!(table[2].contains("65.00"));
    }
}
