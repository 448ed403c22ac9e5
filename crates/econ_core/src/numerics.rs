//! Guarded evaluation, differentiation, integration and root finding for
//! scalar functions of one variable.
//!
//! Every function here is pure. Pathological inputs (NaN, overflow, a panic
//! inside the evaluated closure) resolve to clamped values or NaN instead of
//! propagating.

use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::debug;

/// Magnitude bound applied by [`safe`].
pub const CLAMP_LIMIT: f64 = 1_000_000.0;

/// Default search interval for [`find_root`] when a caller has no better one.
pub const DEFAULT_ROOT_BRACKET: (f64, f64) = (0.0, 1000.0);

pub const DEFAULT_DERIVATIVE_STEP: f64 = 1e-4;

pub const DEFAULT_INTEGRATION_STEPS: usize = 400;

/// Sample count used by [`find_all_roots`] when scanning for sign changes.
pub const DEFAULT_ROOT_SCAN_SAMPLES: usize = 400;

const MIN_INTEGRATION_RANGE: f64 = 1e-6;
const ROOT_AT_LOWER_BOUND_TOLERANCE: f64 = 1e-3;
const DUPLICATE_ROOT_DISTANCE: f64 = 1e-2;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RootSettings {
    /// A midpoint is accepted once `|f(mid)|` drops below this.
    pub tolerance: f64,
    pub max_iterations: usize,
    /// Points sampled when the initial interval does not bracket a root.
    pub scan_samples: usize,
}

impl Default for RootSettings {
    fn default() -> Self {
        Self {
            tolerance: 1e-4,
            max_iterations: 100,
            scan_samples: 400,
        }
    }
}

/// Maps NaN to 0 and clamps the value to `±CLAMP_LIMIT`.
pub fn safe(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(-CLAMP_LIMIT, CLAMP_LIMIT)
    }
}

/// Evaluates `f(x)` through [`safe`]. A panic inside `f` becomes NaN.
pub fn evaluate_safe<F: Fn(f64) -> f64>(f: &F, x: f64) -> f64 {
    match catch_unwind(AssertUnwindSafe(|| f(x))) {
        Ok(value) => safe(value),
        Err(_) => {
            debug!(target: "econ.numerics", x, "evaluation panicked");
            f64::NAN
        }
    }
}

/// Central difference derivative with the default step.
pub fn derivative<F: Fn(f64) -> f64>(f: F, x: f64) -> f64 {
    derivative_with_step(f, x, DEFAULT_DERIVATIVE_STEP)
}

pub fn derivative_with_step<F: Fn(f64) -> f64>(f: F, x: f64, h: f64) -> f64 {
    let forward = evaluate_safe(&f, x + h);
    let backward = evaluate_safe(&f, x - h);
    if forward.is_nan() || backward.is_nan() {
        return f64::NAN;
    }
    safe((forward - backward) / (2.0 * h))
}

/// Composite trapezoidal rule with the default number of steps.
pub fn integrate<F: Fn(f64) -> f64>(f: F, start: f64, end: f64) -> f64 {
    integrate_with_steps(f, start, end, DEFAULT_INTEGRATION_STEPS)
}

/// Composite trapezoidal rule over `steps` subintervals.
///
/// Subintervals with a NaN sample at either end are skipped rather than
/// poisoning the sum. A zero step count is treated as one.
pub fn integrate_with_steps<F: Fn(f64) -> f64>(f: F, start: f64, end: f64, steps: usize) -> f64 {
    let range = end - start;
    if range.abs() < MIN_INTEGRATION_RANGE {
        return 0.0;
    }

    let steps = steps.max(1);
    let step = range / steps as f64;
    let mut sum = 0.0;
    let mut previous = evaluate_safe(&f, start);
    for i in 1..=steps {
        let x = start + i as f64 * step;
        let current = evaluate_safe(&f, x);
        if !previous.is_nan() && !current.is_nan() {
            sum += (previous + current) * 0.5 * step;
        }
        previous = current;
    }

    safe(sum)
}

/// Finds a root of `f` in `[low, high]` with the default settings.
pub fn find_root<F: Fn(f64) -> f64>(f: F, low: f64, high: f64) -> f64 {
    find_root_with(f, low, high, &RootSettings::default())
}

/// Bisection with a sampling fallback.
///
/// When the endpoints do not bracket a sign change the interval is scanned
/// uniformly; the first bracketing pair is bisected, and if there is none the
/// sample with the smallest `|f|` is returned as is, however poor. NaN is only
/// returned when no usable sample exists.
pub fn find_root_with<F: Fn(f64) -> f64>(
    f: F,
    low: f64,
    high: f64,
    settings: &RootSettings,
) -> f64 {
    let mut a = low;
    let mut b = high;
    let mut fa = evaluate_safe(&f, a);
    let fb = evaluate_safe(&f, b);

    // A zero at either end counts as a sign change.
    let bracketed = !fa.is_nan() && !fb.is_nan() && sign(fa) != sign(fb);
    if !bracketed {
        let scan = scan_for_bracket(&f, low, high, settings.scan_samples);
        match scan.bracket {
            Some((bracket_low, bracket_high)) => {
                debug!(
                    target: "econ.numerics",
                    low,
                    high,
                    bracket_low,
                    bracket_high,
                    "root bracket found by sampling"
                );
                a = bracket_low;
                b = bracket_high;
                fa = evaluate_safe(&f, a);
            }
            None => {
                debug!(
                    target: "econ.numerics",
                    low,
                    high,
                    best = ?scan.best,
                    "no sign change found, using best sample"
                );
                return scan.best.map(safe).unwrap_or(f64::NAN);
            }
        }
    }

    let mut last_valid = None;
    for _ in 0..settings.max_iterations {
        let mid = 0.5 * (a + b);
        let fm = evaluate_safe(&f, mid);
        if fm.is_nan() {
            break;
        }
        if fm.abs() < settings.tolerance {
            return safe(mid);
        }
        if sign(fa) == sign(fm) {
            a = mid;
            fa = fm;
        } else {
            b = mid;
        }
        last_valid = Some(mid);
    }

    last_valid.map(safe).unwrap_or(f64::NAN)
}

/// Every root of `f` in `[low, high]`, sorted, with near-duplicates merged.
///
/// Each sign change between consecutive samples is bisected separately.
/// `low` itself is reported when `f(low)` is already close to zero.
pub fn find_all_roots<F: Fn(f64) -> f64>(f: F, low: f64, high: f64, samples: usize) -> Vec<f64> {
    let samples = samples.max(1);
    let mut roots = Vec::new();
    let mut prev_x = low;
    let mut prev_value = evaluate_safe(&f, prev_x);
    if !prev_value.is_nan() && prev_value.abs() < ROOT_AT_LOWER_BOUND_TOLERANCE {
        roots.push(prev_x);
    }

    for i in 1..=samples {
        let t = i as f64 / samples as f64;
        let x = low + (high - low) * t;
        let value = evaluate_safe(&f, x);
        if !value.is_nan() && !prev_value.is_nan() && sign(value) != sign(prev_value) {
            let root = find_root(&f, prev_x, x);
            if !root.is_nan() {
                roots.push(root);
            }
        }
        prev_x = x;
        prev_value = value;
    }

    roots.sort_by(f64::total_cmp);
    let mut unique: Vec<f64> = Vec::with_capacity(roots.len());
    for root in roots {
        match unique.last() {
            Some(last) if (last - root).abs() <= DUPLICATE_ROOT_DISTANCE => {}
            _ => unique.push(safe(root)),
        }
    }
    unique
}

struct BracketScan {
    best: Option<f64>,
    bracket: Option<(f64, f64)>,
}

fn scan_for_bracket<F: Fn(f64) -> f64>(f: &F, low: f64, high: f64, samples: usize) -> BracketScan {
    let samples = samples.max(1);
    let mut best_value = f64::INFINITY;
    let mut best = None;
    let mut prev_x = low;
    let mut prev_value = evaluate_safe(f, prev_x);

    for i in 1..=samples {
        let t = i as f64 / samples as f64;
        let x = low + (high - low) * t;
        let value = evaluate_safe(f, x);
        if !value.is_nan() && value.abs() < best_value {
            best_value = value.abs();
            best = Some(x);
        }

        if !value.is_nan() && !prev_value.is_nan() && sign(value) != sign(prev_value) {
            return BracketScan {
                best,
                bracket: Some((prev_x, x)),
            };
        }

        prev_x = x;
        prev_value = value;
    }

    BracketScan {
        best,
        bracket: None,
    }
}

fn sign(value: f64) -> i8 {
    if value > 0.0 {
        1
    } else if value < 0.0 {
        -1
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn safe_clamps_and_replaces_nan() {
        assert_eq!(safe(f64::NAN), 0.0);
        assert_eq!(safe(f64::INFINITY), CLAMP_LIMIT);
        assert_eq!(safe(f64::NEG_INFINITY), -CLAMP_LIMIT);
        assert_eq!(safe(2.0e6), CLAMP_LIMIT);
        assert_eq!(safe(-2.0e6), -CLAMP_LIMIT);
        assert_eq!(safe(42.5), 42.5);
    }

    #[test]
    fn evaluate_safe_turns_panics_into_nan() {
        let panicking = |_: f64| -> f64 { panic!("boom") };
        assert!(evaluate_safe(&panicking, 1.0).is_nan());
        assert_eq!(evaluate_safe(&|x: f64| x / 0.0, 1.0), CLAMP_LIMIT);
        assert_eq!(evaluate_safe(&|x: f64| x * 2.0, 3.0), 6.0);
    }

    #[test]
    fn derivative_approximates_slope() {
        let d = derivative(|q| q * q, 5.0);
        assert!((9.9..=10.1).contains(&d), "derivative was {d}");
    }

    #[test]
    fn derivative_is_nan_when_a_sample_fails() {
        let f = |q: f64| -> f64 {
            if q > 1.0 {
                panic!("outside domain")
            }
            q
        };
        assert!(derivative(f, 1.0).is_nan());
    }

    #[test]
    fn integrate_approximates_area() {
        let area = integrate(|q| q, 0.0, 1.0);
        assert!((0.49..=0.51).contains(&area), "integral was {area}");
        let area = integrate(|q| q * q, 0.0, 3.0);
        assert!((area - 9.0).abs() < 1e-3);
    }

    #[test]
    fn integrate_handles_degenerate_and_reversed_ranges() {
        assert_eq!(integrate(|q| q, 1.0, 1.0 + 1e-7), 0.0);
        let reversed = integrate(|_| 2.0, 1.0, 0.0);
        assert!((reversed + 2.0).abs() < 1e-9);
    }

    #[test]
    fn integrate_skips_failed_subintervals() {
        let f = |q: f64| -> f64 {
            if (0.5..0.6).contains(&q) {
                panic!("hole")
            }
            1.0
        };
        let area = integrate_with_steps(f, 0.0, 1.0, 100);
        assert!(area > 0.85 && area < 0.95, "area was {area}");
    }

    #[test]
    fn find_root_on_bracketed_interval() {
        let root = find_root(|q| q - 10.0, 0.0, 20.0);
        assert!((9.9..=10.1).contains(&root), "root was {root}");
    }

    #[test]
    fn find_root_scans_for_bracket_when_endpoints_share_sign() {
        // (q - 2)(q - 8) is positive at both 0 and 10.
        let root = find_root(|q| (q - 2.0) * (q - 8.0), 0.0, 10.0);
        assert!((root - 2.0).abs() < 1e-3, "root was {root}");
    }

    #[test]
    fn find_root_returns_best_sample_without_sign_change() {
        let root = find_root(|q| (q - 5.0) * (q - 5.0) + 1.0, 0.0, 10.0);
        assert!((root - 5.0).abs() < 0.03, "root was {root}");
    }

    #[test]
    fn find_root_is_nan_when_every_sample_fails() {
        let f = |_: f64| -> f64 { panic!("never defined") };
        assert!(find_root(f, 0.0, 10.0).is_nan());
    }

    #[test]
    fn find_root_returns_last_midpoint_after_iteration_budget() {
        let settings = RootSettings {
            tolerance: 0.0,
            max_iterations: 3,
            scan_samples: 400,
        };
        let root = find_root_with(|q| q - 1.0, 0.0, 8.0, &settings);
        // Midpoints 4, 2, 1 -> the third one hits f = 0 but tolerance 0 rejects it.
        assert_eq!(root, 1.0);
    }

    #[test]
    fn find_root_stops_at_last_valid_midpoint_on_failure() {
        let f = |q: f64| -> f64 {
            if q > 2.4 && q < 2.6 {
                panic!("hole around 2.5")
            }
            q - 2.0
        };
        // Midpoints 5 (valid, positive) then 2.5 (panics).
        let root = find_root(f, 0.0, 10.0);
        assert_eq!(root, 5.0);
    }

    #[test]
    fn find_all_roots_collects_every_crossing() {
        let roots = find_all_roots(|q| (q - 1.0) * (q - 4.0) * (q - 7.0), 0.0, 10.0, 400);
        assert_eq!(roots.len(), 3, "roots were {roots:?}");
        for (root, expected) in roots.iter().zip([1.0, 4.0, 7.0]) {
            assert!((root - expected).abs() < 1e-3);
        }
    }

    #[test]
    fn find_all_roots_includes_lower_bound_and_merges_duplicates() {
        let roots = find_all_roots(|q| q * (q - 5.0), 0.0, 10.0, 400);
        assert_eq!(roots.len(), 2, "roots were {roots:?}");
        assert_eq!(roots[0], 0.0);
        assert!((roots[1] - 5.0).abs() < 1e-3);
    }

    proptest! {
        #[test]
        fn safe_output_is_always_bounded(x in proptest::num::f64::ANY) {
            let y = safe(x);
            prop_assert!(!y.is_nan());
            prop_assert!(y.abs() <= CLAMP_LIMIT);
        }

        #[test]
        fn safe_is_identity_within_bounds(x in -CLAMP_LIMIT..CLAMP_LIMIT) {
            prop_assert_eq!(safe(x), x);
        }
    }
}
