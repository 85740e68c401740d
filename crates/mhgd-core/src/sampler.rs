//! Chain Sampler
//!
//! One Metropolis-Hastings gradient-descent chain. Each iteration:
//!
//! ```text
//! z_grad  = x_hat + lr · P·(Hᴴ·r)              preconditioned gradient step
//! z_prop  = z_grad + step_size · v             v: next Nt perturbation samples
//! x_prop  = project(z_prop)                    nearest lattice point
//! r_prop  = y − H·x_prop
//! survivor ← x_prop   if ‖r_prop‖² < ‖r_survivor‖²
//! accept  iff exp(min(0, ‖r‖² − ‖r_prop‖²)) > u
//! ```
//!
//! The chain always runs its full iteration budget. On acceptance the
//! current point, residual and step size move to the proposal (and the
//! learning rate is refreshed under the exact policy); on rejection only the
//! uniform generator and perturbation cursor advance.

use num_complex::Complex64;
use tracing::trace;

use crate::config::LearningRatePolicy;
use crate::matrix::norm_sqr;
use crate::noise::{PerturbationCursor, PerturbationTable, UniformRng};
use crate::setup::SharedSetup;
use crate::types::{ChainSeed, MhgdError, MhgdResult};

/// Metropolis acceptance probability for moving from `r_norm` to `r_norm_prop`.
///
/// Exactly `1.0` when the proposal does not increase the residual norm. The
/// result is floored at the smallest positive normal `f64` so it stays in
/// `(0, 1]` even when the exponent underflows.
#[inline]
pub fn acceptance_probability(r_norm: f64, r_norm_prop: f64) -> f64 {
    let log_p = (r_norm - r_norm_prop).min(0.0);
    log_p.exp().max(f64::MIN_POSITIVE)
}

/// Mutable state owned by one chain.
#[derive(Debug, Clone)]
pub struct ChainState {
    pub x_hat: Vec<Complex64>,
    pub r: Vec<Complex64>,
    pub r_norm: f64,
    pub x_survivor: Vec<Complex64>,
    pub r_norm_survivor: f64,
    pub lr: f64,
    pub step_size: f64,
}

/// What happened during one iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepRecord {
    pub iteration: usize,
    pub p_acc: f64,
    pub uniform: f64,
    pub accepted: bool,
    /// Residual norm of the current point before this step
    pub r_norm: f64,
    pub r_norm_prop: f64,
    /// Survivor norm after this step
    pub r_norm_survivor: f64,
}

/// Result of a finished chain.
#[derive(Debug, Clone)]
pub struct ChainOutcome {
    pub chain_index: usize,
    pub x_survivor: Vec<Complex64>,
    pub r_norm_survivor: f64,
    pub accepted: usize,
    pub iterations: usize,
}

/// A single sampling chain borrowing the shared setup.
pub struct ChainSampler<'a> {
    setup: &'a SharedSetup,
    chain_index: usize,
    iterations: usize,
    rng: UniformRng,
    perturbation: PerturbationCursor<'a>,
    state: ChainState,
    iteration: usize,
    accepted: usize,
}

impl<'a> ChainSampler<'a> {
    /// Initialize a chain. The table must hold at least `Nt · iterations`
    /// samples.
    pub fn new(
        setup: &'a SharedSetup,
        chain_index: usize,
        iterations: usize,
        seed: ChainSeed,
        table: &'a PerturbationTable,
    ) -> MhgdResult<Self> {
        let nt = setup.num_antennas();
        let required = nt * iterations;
        if table.len() < required {
            return Err(MhgdError::NoiseTableTooShort {
                chain: chain_index,
                required,
                actual: table.len(),
            });
        }
        let perturbation = table.cursor(nt)?;
        let mut rng = UniformRng::new(seed);

        let x_hat = match &setup.mmse_start {
            Some(start) => start.clone(),
            None => {
                let constellation = &setup.constellation;
                (0..nt)
                    .map(|_| constellation.point(rng.next_index(constellation.len())))
                    .collect()
            }
        };
        let r = setup.residual(&x_hat);
        let r_norm = norm_sqr(&r);
        let lr = setup.learning_rate(&r, chain_index);
        let step_size = setup.step_size(r_norm);

        Ok(Self {
            setup,
            chain_index,
            iterations,
            rng,
            perturbation,
            state: ChainState {
                x_survivor: x_hat.clone(),
                r_norm_survivor: r_norm,
                x_hat,
                r,
                r_norm,
                lr,
                step_size,
            },
            iteration: 0,
            accepted: 0,
        })
    }

    pub fn chain_index(&self) -> usize {
        self.chain_index
    }

    pub fn state(&self) -> &ChainState {
        &self.state
    }

    pub fn is_done(&self) -> bool {
        self.iteration >= self.iterations
    }

    /// Run one iteration; `None` once the budget is spent.
    pub fn step(&mut self) -> Option<StepRecord> {
        if self.is_done() {
            return None;
        }
        let setup = self.setup;
        let state = &mut self.state;

        let gradient = setup.h.hermitian_mat_vec_mul(&state.r);
        let direction = setup.grad_preconditioner.mat_vec_mul(&gradient);
        let noise = self.perturbation.next_block();

        let x_prop: Vec<Complex64> = state
            .x_hat
            .iter()
            .zip(&direction)
            .zip(noise)
            .map(|((&x, &d), &v)| setup.constellation.project(x + d * state.lr + v * state.step_size))
            .collect();
        let r_prop = setup.residual(&x_prop);
        let r_norm_prop = norm_sqr(&r_prop);

        if r_norm_prop < state.r_norm_survivor {
            state.x_survivor.clone_from(&x_prop);
            state.r_norm_survivor = r_norm_prop;
        }

        let r_norm = state.r_norm;
        let p_acc = acceptance_probability(r_norm, r_norm_prop);
        let uniform = self.rng.next_f64();
        let accepted = p_acc > uniform;

        if accepted {
            state.x_hat = x_prop;
            state.r = r_prop;
            state.r_norm = r_norm_prop;
            if setup.lr_policy == LearningRatePolicy::Exact {
                state.lr = setup.learning_rate(&state.r, self.chain_index);
            }
            state.step_size = setup.step_size(r_norm_prop);
            self.accepted += 1;
        }

        let record = StepRecord {
            iteration: self.iteration,
            p_acc,
            uniform,
            accepted,
            r_norm,
            r_norm_prop,
            r_norm_survivor: state.r_norm_survivor,
        };
        trace!(
            chain = self.chain_index,
            iteration = self.iteration,
            p_acc,
            accepted,
            r_norm_prop,
            r_norm_survivor = state.r_norm_survivor,
            "sampler step"
        );

        self.iteration += 1;
        Some(record)
    }

    /// Run the remaining iterations.
    pub fn run(mut self) -> ChainOutcome {
        while self.step().is_some() {}
        self.finish()
    }

    /// Run the remaining iterations, keeping every step record.
    pub fn run_traced(mut self) -> (ChainOutcome, Vec<StepRecord>) {
        let mut records = Vec::with_capacity(self.iterations.saturating_sub(self.iteration));
        while let Some(record) = self.step() {
            records.push(record);
        }
        (self.finish(), records)
    }

    /// Consume the chain and report its survivor.
    pub fn finish(self) -> ChainOutcome {
        ChainOutcome {
            chain_index: self.chain_index,
            x_survivor: self.state.x_survivor,
            r_norm_survivor: self.state.r_norm_survivor,
            accepted: self.accepted,
            iterations: self.iteration,
        }
    }
}
