//! Error types for the tracking core

use thiserror::Error;

pub type Result<T> = std::result::Result<T, BeamError>;

#[derive(Debug, Error)]
pub enum BeamError {
    /// The profile window is empty, reversed, or not finite
    #[error("degenerate profile range: cut_left = {left}, cut_right = {right}")]
    DegenerateRange { left: f64, right: f64 },

    #[error("{0}")]
    UnknownSolver(String),

    #[error(
        "alpha_order {order} is invalid: it must be between 1 and 3 and at most the \
         {available} momentum compaction coefficient(s) supplied"
    )]
    InvalidAlphaOrder { order: usize, available: usize },

    #[error("inconsistent RF tables: {0}")]
    InconsistentRfTables(String),

    #[error("inconsistent ring parameters: {0}")]
    InconsistentRing(String),

    #[error("periodic tracking cannot be combined with interpolated RF kicks")]
    PeriodicityWithInterpolation,

    /// Periodic tracking starts from a bunch inside `[0, t_rev)`
    #[error("periodic tracking needs dt >= 0 on the first turn, particle {index} has dt = {dt:e} s")]
    NegativeArrivalTime { index: usize, dt: f64 },

    /// The induced-voltage engine was built for a different profile grid
    #[error(
        "induced voltage computed for {expected_slices} slices of width {expected_width:e} s, \
         profile now has {found_slices} slices of width {found_width:e} s; call reprocess first"
    )]
    StaleProfileGrid {
        expected_slices: usize,
        expected_width: f64,
        found_slices: usize,
        found_width: f64,
    },

    #[error("impedance source has no {0} table")]
    MissingTable(&'static str),

    #[error("turn {turn} is beyond the programmed {n_turns} turns")]
    TurnOutOfRange { turn: usize, n_turns: usize },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("fft failed: {0}")]
    Fft(#[from] realfft::FftError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degenerate_range_message() {
        let err = BeamError::DegenerateRange {
            left: 1.0,
            right: 1.0,
        };
        let message = err.to_string();
        assert!(message.contains("cut_left = 1"));
        assert!(message.contains("cut_right = 1"));
    }

    #[test]
    fn test_turn_out_of_range_message() {
        let err = BeamError::TurnOutOfRange {
            turn: 11,
            n_turns: 10,
        };
        assert_eq!(err.to_string(), "turn 11 is beyond the programmed 10 turns");
    }
}
