//! Bisection search for the alignment weight that reaches a target feature.
//!
//! The feature of the aligned field is assumed non-decreasing in λ. The
//! search brackets λ between a fixed lower bound and the feature of the
//! unaligned solve, then halves the step a fixed number of times. There is
//! no convergence test: the result is whatever λ the budget reaches.

use serde::{Deserialize, Serialize};

use crate::error::FieldError;
use crate::traits::FeatureProbe;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CalibrationSettings {
    pub iterations: usize,
    pub lower_bound: f64,
    /// Sample the bracket before searching and warn when the feature is
    /// not ordered.
    pub check_monotonicity: bool,
}

impl Default for CalibrationSettings {
    fn default() -> Self {
        Self {
            iterations: 30,
            lower_bound: -100000.0,
            check_monotonicity: false,
        }
    }
}

/// Bisection state between two feature evaluations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchState {
    pub low: f64,
    pub high: f64,
    pub lambda: f64,
    pub step_size: f64,
}

impl SearchState {
    pub fn new(low: f64, high: f64) -> Self {
        let step_size = (high - low) / 2.0;
        Self {
            low,
            high,
            lambda: high - step_size,
            step_size,
        }
    }

    /// Move towards `target` given the feature measured at `self.lambda`.
    pub fn advance(self, feature: f64, target: f64) -> Self {
        let step_size = self.step_size / 2.0;
        let lambda = if feature < target {
            self.lambda + step_size
        } else {
            self.lambda - step_size
        };
        Self {
            lambda,
            step_size,
            ..self
        }
    }

    /// Largest λ the search can visit within `iterations` steps.
    pub fn reachable_high(&self, iterations: usize) -> f64 {
        self.high - (self.high - self.low) / 2f64.powi(iterations as i32 + 1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationStep {
    pub lambda: f64,
    pub feature: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Calibration {
    /// Final alignment weight.
    pub lambda: f64,
    /// Feature evaluated at `lambda`.
    pub feature: f64,
    /// Feature of the unaligned solve, the top of the bracket.
    pub upper_bound: f64,
    pub iterations: usize,
    pub trace: Vec<CalibrationStep>,
}

/// Search λ so that `probe.feature_at(λ)` approaches `target`.
///
/// Probe failures abort the search; running out of iterations does not.
pub fn calibrate<P: FeatureProbe + ?Sized>(
    probe: &mut P,
    target: f64,
    settings: CalibrationSettings,
) -> Result<Calibration, FieldError> {
    let upper_bound = probe.upper_bound()?;
    let mut state = SearchState::new(settings.lower_bound, upper_bound);

    if settings.check_monotonicity {
        check_monotonicity(probe, &state, settings.iterations)?;
    }

    let mut trace = Vec::with_capacity(settings.iterations);
    for iteration in 0..settings.iterations {
        let feature = probe.feature_at(state.lambda)?;
        tracing::debug!(
            iteration,
            lambda = state.lambda,
            feature,
            target,
            upper_bound,
            "calibration step"
        );
        trace.push(CalibrationStep {
            lambda: state.lambda,
            feature,
        });
        state = state.advance(feature, target);
    }

    let feature = probe.feature_at(state.lambda)?;
    tracing::info!(lambda = state.lambda, feature, target, "calibration finished");
    Ok(Calibration {
        lambda: state.lambda,
        feature,
        upper_bound,
        iterations: settings.iterations,
        trace,
    })
}

/// Sample the bracket at its low end, its midpoint and the highest λ the
/// search can reach. Returns whether the samples are ordered; a violation
/// is logged but does not change the search.
pub fn check_monotonicity<P: FeatureProbe + ?Sized>(
    probe: &mut P,
    state: &SearchState,
    iterations: usize,
) -> Result<bool, FieldError> {
    let lambdas = [state.low, state.lambda, state.reachable_high(iterations)];
    let mut features = [0.0; 3];
    for (feature, &lambda) in features.iter_mut().zip(&lambdas) {
        *feature = probe.feature_at(lambda)?;
    }
    let ordered = features[0] <= features[1] && features[1] <= features[2];
    if !ordered {
        tracing::warn!(
            ?lambdas,
            ?features,
            "feature is not monotone in lambda; bisection result may be meaningless"
        );
    }
    Ok(ordered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{FieldSynthesizer, SolveSettings};
    use crate::fixtures;
    use nalgebra::Vector3;

    /// `feature(λ) = slope * λ`, counting evaluations.
    struct Linear {
        upper: f64,
        slope: f64,
        evaluations: usize,
    }

    impl FeatureProbe for Linear {
        fn upper_bound(&mut self) -> Result<f64, FieldError> {
            Ok(self.upper)
        }

        fn feature_at(&mut self, lambda: f64) -> Result<f64, FieldError> {
            self.evaluations += 1;
            Ok(self.slope * lambda)
        }
    }

    struct Failing;

    impl FeatureProbe for Failing {
        fn upper_bound(&mut self) -> Result<f64, FieldError> {
            Ok(1.0)
        }

        fn feature_at(&mut self, _lambda: f64) -> Result<f64, FieldError> {
            Err(FieldError::DegenerateReference)
        }
    }

    #[test]
    fn initial_state_starts_at_bracket_midpoint() {
        let state = SearchState::new(-100000.0, 2.0);
        assert_eq!(state.step_size, 50001.0);
        assert_eq!(state.lambda, -49999.0);
    }

    #[test]
    fn advance_halves_step_and_moves_towards_target() {
        let state = SearchState::new(0.0, 8.0);
        let up = state.advance(0.0, 1.0);
        assert_eq!(up.step_size, 2.0);
        assert_eq!(up.lambda, 6.0);
        let down = state.advance(1.0, 1.0);
        assert_eq!(down.lambda, 2.0);
        assert_eq!(down.low, 0.0);
        assert_eq!(down.high, 8.0);
    }

    #[test]
    fn bisection_lands_within_final_step() {
        let upper = 5.0;
        let target = 1.234;
        let mut probe = Linear {
            upper,
            slope: 1.0,
            evaluations: 0,
        };
        let result = calibrate(&mut probe, target, CalibrationSettings::default())
            .expect("linear probe never fails");

        let bound = (upper + 100000.0) / 2f64.powi(30);
        assert!((result.lambda - target).abs() <= bound);
        assert_eq!(result.iterations, 30);
        assert_eq!(result.trace.len(), 30);
        assert_eq!(result.feature, result.lambda);
        assert_eq!(result.upper_bound, upper);
        // 30 steps plus the final evaluation.
        assert_eq!(probe.evaluations, 31);
    }

    #[test]
    fn unreachable_target_saturates_at_bracket_top() {
        let mut probe = Linear {
            upper: 5.0,
            slope: 1.0,
            evaluations: 0,
        };
        let settings = CalibrationSettings::default();
        let result = calibrate(&mut probe, 1e9, settings).expect("linear probe never fails");
        let reachable = SearchState::new(settings.lower_bound, 5.0).reachable_high(settings.iterations);
        assert!((result.lambda - reachable).abs() < 1e-9);
        assert!(result.lambda < 5.0);
    }

    #[test]
    fn monotonicity_check_reports_violations() {
        let settings = CalibrationSettings {
            check_monotonicity: true,
            ..CalibrationSettings::default()
        };
        let state = SearchState::new(settings.lower_bound, 5.0);

        let mut increasing = Linear {
            upper: 5.0,
            slope: 1.0,
            evaluations: 0,
        };
        assert!(check_monotonicity(&mut increasing, &state, 30).expect("no failure"));

        let mut decreasing = Linear {
            upper: 5.0,
            slope: -1.0,
            evaluations: 0,
        };
        assert!(!check_monotonicity(&mut decreasing, &state, 30).expect("no failure"));
        // A violation only warns: the search still runs to completion.
        let result = calibrate(&mut decreasing, 0.0, settings).expect("search still runs");
        assert_eq!(result.trace.len(), 30);
    }

    #[test]
    fn probe_errors_propagate() {
        let err = calibrate(&mut Failing, 0.5, CalibrationSettings::default())
            .expect_err("probe fails");
        assert!(matches!(err, FieldError::DegenerateReference));
    }

    #[test]
    fn calibration_recovers_known_weight_on_curved_mesh() {
        let mesh = fixtures::ellipsoid(1, Vector3::new(1.0, 1.5, 3.0));
        let settings = SolveSettings {
            degree: 2,
            ..SolveSettings::default()
        };
        let mut synthesizer = FieldSynthesizer::new(&mesh, settings).expect("degree is valid");
        let target = synthesizer
            .smoothest_curvature_alignment(-5.0)
            .expect("aligned solve")
            .feature();

        let result = calibrate(
            &mut synthesizer,
            target,
            CalibrationSettings {
                check_monotonicity: true,
                ..CalibrationSettings::default()
            },
        )
        .expect("calibration runs");
        assert!((result.lambda + 5.0).abs() < 1e-3, "lambda = {}", result.lambda);
        assert!((result.feature - target).abs() < 1e-4);
        let last = synthesizer.solution().expect("solution is kept");
        assert_eq!(last.feature(), result.feature);
    }
}
