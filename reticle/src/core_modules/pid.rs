// THEORY:
// The `pid` module is the actuation half of the control loop. One `PidController`
// drives one axis; the aim loop owns two (yaw and pitch) that never talk to each
// other.
//
// Key architectural principles:
// 1.  **Raw Terms**: The controller stores the raw proportional, integral and
//     derivative terms and applies the gains only when combining them, so the
//     state can be inspected independently of tuning.
// 2.  **Pixel Units**: The error is whatever the caller passes in, which for the
//     aim loop is a pixel offset from the frame center. Gain presets are tuned
//     against that scale and there is no normalization anywhere.
// 3.  **Bounded State**: The integral is clamped after every step (anti-windup).
//     The derivative may be clamped too, which rejects the spike produced when
//     the tracked position jumps to a freshly acquired target.
// 4.  **Irregular Time**: `dt` is measured wall-clock time and differs every call.
//     A zero (or negative, or non-finite) `dt` is refused instead of producing
//     infinities.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Inclusive `[min, max]` clamp range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Limits {
    pub min: f64,
    pub max: f64,
}

impl Limits {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn clamp(&self, v: f64) -> f64 {
        v.max(self.min).min(self.max)
    }

    fn validate(&self, what: &str) -> Result<()> {
        if !(self.min <= self.max) {
            return Err(Error::config(format!(
                "{what} limits are inverted or NaN: [{}, {}]",
                self.min, self.max
            )));
        }
        Ok(())
    }
}

/// Gains and clamp ranges of one controller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PidParams {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    pub integral_limits: Limits,
    /// `None` disables derivative clamping.
    pub derivative_limits: Option<Limits>,
}

impl Default for PidParams {
    fn default() -> Self {
        Self {
            kp: 5.0,
            ki: 0.6,
            kd: 0.07,
            integral_limits: Limits::new(-30.0, 30.0),
            derivative_limits: Some(Limits::new(-50.0, 50.0)),
        }
    }
}

impl PidParams {
    pub fn validate(&self) -> Result<()> {
        self.integral_limits.validate("integral")?;
        if let Some(d) = &self.derivative_limits {
            d.validate("derivative")?;
        }
        Ok(())
    }
}

/// Single-axis PID controller.
#[derive(Debug, Clone)]
pub struct PidController {
    params: PidParams,
    p_term: f64,
    i_term: f64,
    d_term: f64,
    prev_error: f64,
}

impl PidController {
    pub fn new(params: PidParams) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            params,
            p_term: 0.0,
            i_term: 0.0,
            d_term: 0.0,
            prev_error: 0.0,
        })
    }

    /// Advances the controller by `dt` seconds and returns the correction.
    pub fn step(&mut self, dt: f64, current: f64, target: f64) -> Result<f64> {
        if !(dt > 0.0) || !dt.is_finite() {
            return Err(Error::InvalidTimeDelta(dt));
        }

        let error = target - current;
        self.p_term = error;

        self.i_term = self.params.integral_limits.clamp(self.i_term + error * dt);

        let raw_d = (error - self.prev_error) / dt;
        self.d_term = match &self.params.derivative_limits {
            Some(limits) => limits.clamp(raw_d),
            None => raw_d,
        };

        self.prev_error = error;

        Ok(self.params.kp * self.p_term + self.params.ki * self.i_term + self.params.kd * self.d_term)
    }

    /// Zeroes all accumulated state.
    pub fn reset(&mut self) {
        self.p_term = 0.0;
        self.i_term = 0.0;
        self.d_term = 0.0;
        self.prev_error = 0.0;
    }

    pub fn params(&self) -> &PidParams {
        &self.params
    }

    pub fn p_term(&self) -> f64 {
        self.p_term
    }

    pub fn i_term(&self) -> f64 {
        self.i_term
    }

    pub fn d_term(&self) -> f64 {
        self.d_term
    }

    pub fn prev_error(&self) -> f64 {
        self.prev_error
    }

    /// True when every state field is zero.
    pub fn is_at_rest(&self) -> bool {
        self.p_term == 0.0 && self.i_term == 0.0 && self.d_term == 0.0 && self.prev_error == 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn controller() -> PidController {
        PidController::new(PidParams::default()).unwrap()
    }

    #[test]
    fn zero_dt_is_rejected() {
        let mut pid = controller();
        for (current, target) in [(0.0, 0.0), (1.0, -4.0), (-300.0, 12.5)] {
            assert!(matches!(pid.step(0.0, current, target), Err(Error::InvalidTimeDelta(_))));
        }
        assert!(pid.step(-0.1, 0.0, 1.0).is_err());
        assert!(pid.step(f64::NAN, 0.0, 1.0).is_err());
        assert!(pid.step(f64::INFINITY, 0.0, 1.0).is_err());
    }

    #[test]
    fn first_step_combines_terms() {
        let params = PidParams {
            kp: 2.0,
            ki: 1.0,
            kd: 0.5,
            integral_limits: Limits::new(-100.0, 100.0),
            derivative_limits: None,
        };
        let mut pid = PidController::new(params).unwrap();
        let out = pid.step(0.5, 0.0, 10.0).unwrap();
        // p = 10, i = 5, d = 20
        assert_relative_eq!(out, 20.0 + 5.0 + 10.0, epsilon = 1e-12);
        assert_eq!(pid.p_term(), 10.0);
        assert_eq!(pid.i_term(), 5.0);
        assert_eq!(pid.d_term(), 20.0);
        assert_eq!(pid.prev_error(), 10.0);
    }

    #[test]
    fn integral_never_leaves_limits() {
        let mut pid = controller();
        for _ in 0..1000 {
            pid.step(0.25, 0.0, 5000.0).unwrap();
            assert!(pid.i_term() <= 30.0 && pid.i_term() >= -30.0);
        }
        assert_eq!(pid.i_term(), 30.0);
        for _ in 0..1000 {
            pid.step(0.25, 0.0, -5000.0).unwrap();
            assert!(pid.i_term() <= 30.0 && pid.i_term() >= -30.0);
        }
        assert_eq!(pid.i_term(), -30.0);
    }

    #[test]
    fn derivative_is_clamped_when_enabled() {
        let mut pid = controller();
        pid.step(0.01, 0.0, 400.0).unwrap();
        assert_eq!(pid.d_term(), 50.0);
        pid.step(0.01, 0.0, -400.0).unwrap();
        assert_eq!(pid.d_term(), -50.0);
    }

    #[test]
    fn derivative_is_raw_when_disabled() {
        let params = PidParams {
            derivative_limits: None,
            ..PidParams::default()
        };
        let mut pid = PidController::new(params).unwrap();
        pid.step(0.01, 0.0, 400.0).unwrap();
        assert_relative_eq!(pid.d_term(), 40_000.0, epsilon = 1e-6);
    }

    #[test]
    fn zero_error_converges_to_zero_output() {
        let params = PidParams {
            ki: 0.0,
            ..PidParams::default()
        };
        let mut pid = PidController::new(params).unwrap();
        pid.step(0.016, 0.0, 25.0).unwrap();
        pid.step(0.02, 0.0, 0.0).unwrap();
        let out = pid.step(0.03, 0.0, 0.0).unwrap();
        assert_eq!(out, 0.0);
    }

    #[test]
    fn zero_error_output_decays_to_integral_contribution() {
        let mut pid = controller();
        pid.step(0.016, 0.0, 25.0).unwrap();
        pid.step(0.016, 0.0, 0.0).unwrap();
        let out = pid.step(0.016, 0.0, 0.0).unwrap();
        assert_relative_eq!(out, 0.6 * pid.i_term(), epsilon = 1e-12);
    }

    #[test]
    fn reset_matches_fresh_controller() {
        let mut used = controller();
        for i in 0..20 {
            used.step(0.01 + i as f64 * 0.003, 0.0, 50.0 - i as f64 * 7.0).unwrap();
        }
        used.reset();
        assert!(used.is_at_rest());

        let mut fresh = controller();
        let a = used.step(0.033, 3.0, -17.0).unwrap();
        let b = fresh.step(0.033, 3.0, -17.0).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn inverted_limits_are_rejected() {
        let params = PidParams {
            integral_limits: Limits::new(10.0, -10.0),
            ..PidParams::default()
        };
        assert!(matches!(PidController::new(params), Err(Error::InvalidConfig(_))));
    }

    proptest! {
        #[test]
        fn prop_zero_dt_fails_for_any_input(current in -1e6..1e6f64, target in -1e6..1e6f64) {
            let mut pid = controller();
            prop_assert!(matches!(pid.step(0.0, current, target), Err(Error::InvalidTimeDelta(_))));
            prop_assert!(pid.is_at_rest());
        }

        #[test]
        fn prop_integral_stays_within_limits(
            dt in 0.001..0.2f64,
            targets in prop::collection::vec(-1e4..1e4f64, 1..300),
        ) {
            let mut pid = controller();
            let limits = PidParams::default().integral_limits;
            for target in targets {
                pid.step(dt, 0.0, target).unwrap();
                prop_assert!(pid.i_term() >= limits.min && pid.i_term() <= limits.max);
            }
        }

        #[test]
        fn prop_reset_then_step_matches_fresh(
            history in prop::collection::vec((0.001..0.1f64, -500.0..500.0f64), 0..50),
            dt in 0.001..0.1f64,
            current in -500.0..500.0f64,
            target in -500.0..500.0f64,
        ) {
            let mut used = controller();
            for (h_dt, h_target) in history {
                used.step(h_dt, 0.0, h_target).unwrap();
            }
            used.reset();
            let mut fresh = controller();
            prop_assert_eq!(used.step(dt, current, target).unwrap(), fresh.step(dt, current, target).unwrap());
            prop_assert_eq!(used.i_term(), fresh.i_term());
            prop_assert_eq!(used.prev_error(), fresh.prev_error());
        }
    }
}
