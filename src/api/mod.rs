use clap::{Parser, ValueEnum};
use serde::Serialize;
use tracing::info;

use crate::core::{
    AnnualExtra, Assumptions, ClosedFormEstimate, DEFAULT_MONTH_CAP, ModelError, Result,
    SimulationOptions, SimulationResult, SolverConfig, SolverResult, WithdrawalTiming,
    estimate_required_balance, simulate, solve_required_balance,
};

mod report;

pub use report::format_currency;

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliWithdrawalTiming {
    Start,
    End,
}

impl From<CliWithdrawalTiming> for WithdrawalTiming {
    fn from(value: CliWithdrawalTiming) -> Self {
        match value {
            CliWithdrawalTiming::Start => WithdrawalTiming::Start,
            CliWithdrawalTiming::End => WithdrawalTiming::End,
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "runway",
    about = "Deterministic retirement runway: how long savings last, and how much you need to start with"
)]
pub struct Cli {
    #[arg(
        long,
        allow_hyphen_values = true,
        help = "Expected nominal annual return in percent, e.g. 5"
    )]
    annual_return: f64,
    #[arg(
        long,
        default_value_t = 2.5,
        allow_hyphen_values = true,
        help = "Expected annual inflation in percent"
    )]
    inflation_rate: f64,
    #[arg(
        long,
        default_value_t = 0.0,
        allow_hyphen_values = true,
        help = "Monthly income in today's money"
    )]
    monthly_income: f64,
    #[arg(
        long,
        allow_hyphen_values = true,
        help = "Monthly expenses in today's money"
    )]
    monthly_expenses: f64,
    #[arg(
        long,
        allow_hyphen_values = true,
        help = "Years the savings must last"
    )]
    target_years: f64,
    #[arg(
        long = "extra",
        value_name = "YEAR:AMOUNT",
        value_parser = parse_extra,
        help = "One-off expense paid in January of YEAR (0 = first year), in today's money; repeatable"
    )]
    extras: Vec<AnnualExtra>,
    #[arg(
        long,
        default_value_t = 0.0,
        allow_hyphen_values = true,
        help = "Extra expense paid every January, in today's money"
    )]
    yearly_extra: f64,
    #[arg(long, value_enum, default_value_t = CliWithdrawalTiming::Start)]
    withdrawal_timing: CliWithdrawalTiming,
    #[arg(
        long,
        default_value_t = 0.0,
        help = "Flat tax on investment returns in percent"
    )]
    return_tax_rate: f64,
    #[arg(long, help = "Keep expenses and extras flat instead of inflating them")]
    fixed_expenses: bool,
    #[arg(long, help = "Keep income flat instead of inflating it")]
    fixed_income: bool,
    #[arg(long, help = "Age at the first simulated month, used to label the table")]
    start_age: Option<f64>,
    #[arg(
        long,
        allow_hyphen_values = true,
        help = "Simulate how long this balance lasts"
    )]
    starting_balance: Option<f64>,
    #[arg(long, help = "Refine the closed-form requirement with the bisection solver")]
    solve: bool,
    #[arg(long, help = "Print the month-by-month table for --starting-balance")]
    table: bool,
    #[arg(long, default_value_t = DEFAULT_MONTH_CAP, help = "Longest simulation in months")]
    month_cap: u32,
    #[arg(long, default_value_t = 1.0, help = "Solver tolerance in currency units")]
    tolerance: f64,
    #[arg(long, default_value_t = 60, help = "Solver iteration cap")]
    max_iterations: u32,
    #[arg(long, help = "Emit the report as JSON")]
    json: bool,
    #[arg(short, long, help = "Log solver progress to stderr")]
    pub verbose: bool,
}

fn parse_extra(raw: &str) -> std::result::Result<AnnualExtra, String> {
    let (year, amount) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected YEAR:AMOUNT, got `{raw}`"))?;
    let year = year
        .trim()
        .parse::<u32>()
        .map_err(|e| format!("invalid year `{year}`: {e}"))?;
    let amount = amount
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("invalid amount `{amount}`: {e}"))?;
    Ok(AnnualExtra { year, amount })
}

fn build_assumptions(cli: &Cli) -> Result<Assumptions> {
    let assumptions = Assumptions {
        annual_return: cli.annual_return / 100.0,
        annual_inflation: cli.inflation_rate / 100.0,
        monthly_income: cli.monthly_income,
        monthly_expenses: cli.monthly_expenses,
        annual_extras: cli.extras.clone(),
        recurring_annual_extra: cli.yearly_extra,
        target_years: cli.target_years,
        withdrawal_timing: cli.withdrawal_timing.into(),
        return_tax_rate: cli.return_tax_rate / 100.0,
        index_expenses: !cli.fixed_expenses,
        index_income: !cli.fixed_income,
        start_age: cli.start_age,
    };
    assumptions.validate(cli.month_cap)?;
    Ok(assumptions)
}

fn solver_config(cli: &Cli) -> SolverConfig {
    SolverConfig {
        tolerance: cli.tolerance,
        max_iterations: cli.max_iterations,
        month_cap: cli.month_cap,
        ..SolverConfig::default()
    }
}

/// Everything one invocation computes.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub target_years: f64,
    pub closed_form: ClosedFormEstimate,
    pub solver: Option<SolverResult>,
    pub starting_balance: Option<f64>,
    pub longevity: Option<SimulationResult>,
    #[serde(skip)]
    pub show_table: bool,
}

pub fn build_report(cli: &Cli) -> Result<Report> {
    let assumptions = build_assumptions(cli)?;
    let closed_form = estimate_required_balance(&assumptions)?;

    let solver = if cli.solve || assumptions.has_extras() {
        Some(solve_required_balance(&assumptions, solver_config(cli))?)
    } else {
        None
    };

    let longevity = match cli.starting_balance {
        Some(balance) => {
            let mut options = SimulationOptions {
                month_cap: cli.month_cap,
                ..SimulationOptions::longevity()
            };
            if cli.table {
                options = options.with_snapshots();
            }
            Some(simulate(balance, &assumptions, options)?)
        }
        None => None,
    };

    info!(
        required_balance = closed_form.required_balance,
        solved = solver.is_some(),
        simulated = longevity.is_some(),
        "report built"
    );

    Ok(Report {
        target_years: assumptions.target_years,
        closed_form,
        solver,
        starting_balance: cli.starting_balance,
        longevity,
        show_table: cli.table,
    })
}

/// Text or JSON report for already-parsed flags.
pub fn run(cli: &Cli) -> Result<String> {
    let report = build_report(cli)?;
    if cli.json {
        let mut json = serde_json::to_string_pretty(&report)
            .map_err(|e| ModelError::Render(e.to_string()))?;
        json.push('\n');
        Ok(json)
    } else {
        Ok(report.to_string())
    }
}
