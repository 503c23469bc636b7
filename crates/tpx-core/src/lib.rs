//! Core type aliases, constants, and runtime utilities for treeplex.
//!
//! This crate provides the foundational types and configuration parameters
//! used throughout the treeplex workspace.

// ============================================================================
// TYPE ALIASES
// ============================================================================
/// Expected values, regrets, and payoffs.
pub type Utility = f64;
/// Strategy weights, sampling distributions, and reach probabilities.
pub type Probability = f64;
/// Distance metrics, convergence thresholds, and smoothing terms.
pub type Energy = f64;
/// Index of a player seat. Seat 0 is the chance player; real players are 1-based.
pub type Player = usize;

/// The chance player's seat index.
pub const CHANCE: Player = 0;

// ============================================================================
// NUMERIC TOLERANCES
// ============================================================================
/// Threshold below which a probability or norm is treated as zero.
pub const EPS: Energy = 1e-9;
/// Sentinel for "worse than any measured value" comparisons.
pub const INF: Energy = 1e9;
/// Tolerance for validating that a declared chance distribution sums to 1.
pub const CHANCE_TOLERANCE: Energy = 1e-6;

// ============================================================================
// TRAINING DEFAULTS
// ============================================================================
/// Default exploration mixing rate for outcome-sampling behavior strategies.
pub const EXPLORE_DELTA: Probability = 0.1;
/// Interval (in iterations) between progress log messages during training.
pub const TRAINING_LOG_INTERVAL: usize = 1000;

// ============================================================================
// RUNTIME UTILITIES
// ============================================================================
/// Initialize dual logging (terminal + file) with timestamped log files.
/// Creates `logs/` directory and writes DEBUG level to file, INFO to terminal.
pub fn log() {
    std::fs::create_dir_all("logs").expect("create logs directory");
    let config = simplelog::ConfigBuilder::new()
        .set_location_level(log::LevelFilter::Off)
        .set_target_level(log::LevelFilter::Off)
        .set_thread_level(log::LevelFilter::Off)
        .build();
    let time = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("time moves slow")
        .as_secs();
    let file = simplelog::WriteLogger::new(
        log::LevelFilter::Debug,
        config.clone(),
        std::fs::File::create(format!("logs/{}.log", time)).expect("create log file"),
    );
    let term = simplelog::TermLogger::new(
        log::LevelFilter::Info,
        config.clone(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    );
    simplelog::CombinedLogger::init(vec![term, file]).expect("initialize logger");
}
