//! Arbitration across chains.
//!
//! Picks the chain whose survivor has the smallest residual norm. Ties go to
//! the lowest chain index. `NaN` norms lose to any number; if every norm is
//! `NaN` the first chain is returned.

use crate::sampler::ChainOutcome;

/// Position of the first minimum in `norms`, `None` when empty.
pub fn first_minimum<I>(norms: I) -> Option<usize>
where
    I: IntoIterator<Item = f64>,
{
    let mut best: Option<(usize, f64)> = None;
    for (idx, norm) in norms.into_iter().enumerate() {
        match best {
            None => best = Some((idx, norm)),
            Some((_, current)) => {
                if norm < current || (current.is_nan() && !norm.is_nan()) {
                    best = Some((idx, norm));
                }
            }
        }
    }
    best.map(|(idx, _)| idx)
}

/// Winning outcome among all chains.
pub fn select_best(outcomes: &[ChainOutcome]) -> Option<&ChainOutcome> {
    first_minimum(outcomes.iter().map(|o| o.r_norm_survivor)).map(|idx| &outcomes[idx])
}
