//! # MHGD Simulation Harness
//!
//! Monte-Carlo evaluation of the MHGD detector over flat Rayleigh MIMO
//! channels.
//!
//! - [`channel`]: seeded trial generation (`H`, bits, symbols, `y`, chain
//!   seeds and perturbation tables)
//! - [`ber`]: bit error counting and SNR sweeps
//!
//! ```text
//! bits → modulate → x → H·x + n → y → MhgdDetector → x̂ → demodulate → bitŝ
//!                                                          └─ BerCounter ─┘
//! ```

pub mod ber;
pub mod channel;

pub use ber::{BerCounter, BerHarness, BerPoint};
pub use channel::{noise_variance, Trial, TrialGenerator};
