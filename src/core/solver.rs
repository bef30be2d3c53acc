use tracing::{debug, info};

use super::closed_form::estimate_required_balance;
use super::engine::{SimulationOptions, run_simulation, validate_run};
use super::error::{ModelError, Result};
use super::types::{Assumptions, DEFAULT_MONTH_CAP, MAX_MONTH_CAP, SolveIteration, SolverResult};

#[derive(Debug, Clone, Copy)]
pub struct SolverConfig {
    pub tolerance: f64,
    pub max_iterations: u32,
    /// Largest upper bound tried before the plan is declared unsustainable.
    pub bracket_ceiling: f64,
    /// First upper bound is this multiple of the closed-form estimate.
    pub initial_bracket_multiple: f64,
    pub month_cap: u32,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            tolerance: 1.0,
            max_iterations: 60,
            bracket_ceiling: 1e12,
            initial_bracket_multiple: 2.0,
            month_cap: DEFAULT_MONTH_CAP,
        }
    }
}

/// Smallest starting balance that does not run out before the target term,
/// found by bisection over the month-by-month simulation.
///
/// The returned balance is the upper end of the final bracket, so it always
/// lasts the term; `achieved_tolerance` is the remaining bracket width.
pub fn solve_required_balance(
    assumptions: &Assumptions,
    config: SolverConfig,
) -> Result<SolverResult> {
    validate_config(config)?;
    let options = SimulationOptions {
        month_cap: config.month_cap,
        ..SimulationOptions::default()
    };
    validate_run(0.0, assumptions, options)?;

    let runs_out = |balance: f64| run_simulation(balance, assumptions, options).ran_out();
    let closed_form_seed = estimate_required_balance(assumptions)?.required_balance;

    if !runs_out(0.0) {
        info!("zero starting balance already lasts the term");
        return Ok(SolverResult {
            required_balance: 0.0,
            iterations: 0,
            achieved_tolerance: 0.0,
            converged: true,
            bracket_expansions: 0,
            closed_form_seed,
            trace: Vec::new(),
        });
    }

    let mut lo = 0.0;
    let mut hi = (closed_form_seed * config.initial_bracket_multiple)
        .max(1.0)
        .min(config.bracket_ceiling);
    let mut bracket_expansions = 0;
    while runs_out(hi) {
        if hi >= config.bracket_ceiling {
            return Err(ModelError::NoBracketFound {
                ceiling: config.bracket_ceiling,
            });
        }
        lo = hi;
        hi = (hi * 2.0).min(config.bracket_ceiling);
        bracket_expansions += 1;
        debug!(upper_bound = hi, "expanding search bracket");
    }

    let mut trace = Vec::with_capacity(config.max_iterations as usize);
    let mut converged = hi - lo <= config.tolerance;
    let mut it = 0;
    while !converged && it < config.max_iterations {
        it += 1;
        let mid = (lo + hi) * 0.5;
        let ran_out = runs_out(mid);
        trace.push(SolveIteration {
            iteration: it,
            lower_bound: lo,
            upper_bound: hi,
            candidate: mid,
            ran_out,
        });
        debug!(iteration = it, lo, hi, mid, ran_out, "bisection step");

        if ran_out {
            lo = mid;
        } else {
            hi = mid;
        }
        converged = hi - lo <= config.tolerance;
    }

    info!(
        required_balance = hi,
        iterations = it,
        converged,
        closed_form_seed,
        "solved required balance"
    );

    Ok(SolverResult {
        required_balance: hi,
        iterations: it,
        achieved_tolerance: hi - lo,
        converged,
        bracket_expansions,
        closed_form_seed,
        trace,
    })
}

fn validate_config(config: SolverConfig) -> Result<()> {
    if !config.tolerance.is_finite() || config.tolerance <= 0.0 {
        return Err(ModelError::InvalidSolverConfig(
            "tolerance must be > 0".to_string(),
        ));
    }
    if config.max_iterations == 0 {
        return Err(ModelError::InvalidSolverConfig(
            "max_iterations must be > 0".to_string(),
        ));
    }
    if !config.bracket_ceiling.is_finite() || config.bracket_ceiling < 1.0 {
        return Err(ModelError::InvalidSolverConfig(
            "bracket_ceiling must be finite and >= 1".to_string(),
        ));
    }
    if !config.initial_bracket_multiple.is_finite() || config.initial_bracket_multiple < 1.0 {
        return Err(ModelError::InvalidSolverConfig(
            "initial_bracket_multiple must be >= 1".to_string(),
        ));
    }
    if config.month_cap == 0 || config.month_cap > MAX_MONTH_CAP {
        return Err(ModelError::InvalidSolverConfig(format!(
            "month_cap must be within 1..={MAX_MONTH_CAP}"
        )));
    }
    Ok(())
}
