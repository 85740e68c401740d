//! BER sweep of the MHGD detector over Rayleigh channels
//!
//! Reads the configuration from the usual search path (`MHGD_CONFIG`,
//! `./mhgd.yaml`, user and system config directories) and prints one row per
//! SNR point.
//!
//! Run with: cargo run --release --example ber_sweep -p mhgd-sim

use mhgd_core::observe::init_logging;
use mhgd_core::MhgdConfig;
use mhgd_sim::BerHarness;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = MhgdConfig::load()?;
    config.validate()?;
    init_logging(&config.logging);

    let detector = &config.detector;
    println!(
        "MHGD {}x{} {}, {} chains x {} iterations, {} trials per point\n",
        detector.num_antennas,
        detector.num_antennas,
        detector.modulation,
        detector.samplers,
        detector.iterations,
        config.sweep.trials
    );
    println!(
        "{:>8} {:>12} {:>10} {:>12} {:>10}",
        "SNR(dB)", "BER", "errors", "VER", "accept"
    );

    let mut harness = BerHarness::new(config.detector.clone(), config.sweep.clone())?;
    for point in harness.run_sweep()? {
        println!(
            "{:>8.1} {:>12.3e} {:>10} {:>12.3e} {:>10.3}",
            point.snr_db, point.ber, point.error_bits, point.vector_error_rate, point.acceptance_rate
        );
    }

    Ok(())
}
