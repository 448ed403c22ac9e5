//! Curve sampling, area sampling and the shared root/integral helpers the
//! calculators are built from.

use crate::numerics::{find_root, integrate, safe};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Intervals narrower than this carry no deadweight area.
pub const COINCIDENT_QUANTITY_TOLERANCE: f64 = 1e-3;

pub const DEFAULT_AREA_STEPS: usize = 80;

const MIN_AREA_RANGE: f64 = 1e-6;

/// One sample of a curve. Sequences of points are plotted in order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub x: f64,
    pub y: f64,
}

impl ChartPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// One sample of a filled region: a base curve plus a stacked offset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AreaSamplePoint {
    pub x: f64,
    pub base_value: f64,
    pub offset_value: f64,
}

/// A uniform sampling grid `start, start + step, …` with `count` points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleGrid {
    pub start: f64,
    pub step: f64,
    pub count: usize,
}

impl SampleGrid {
    pub const fn new(start: f64, step: f64, count: usize) -> Self {
        Self { start, step, count }
    }

    /// `count` points spread evenly over `[start, end]`.
    pub fn spanning(start: f64, end: f64, count: usize) -> Self {
        let step = if count > 1 {
            (end - start) / (count - 1) as f64
        } else {
            0.0
        };
        Self { start, step, count }
    }

    pub fn points(&self) -> impl Iterator<Item = f64> + '_ {
        (0..self.count).map(move |i| self.start + i as f64 * self.step)
    }
}

pub fn sample_curve<F: Fn(f64) -> f64>(f: F, grid: SampleGrid) -> Vec<ChartPoint> {
    grid.points().map(|q| ChartPoint::new(q, safe(f(q)))).collect()
}

/// Inclusive stepping from `start` to `end`. A non-positive step yields nothing.
pub fn sample_range(start: f64, end: f64, step: f64) -> impl Iterator<Item = f64> {
    let count = if step > 0.0 && end >= start {
        ((end - start) / step + 1e-9).floor() as usize + 1
    } else {
        0
    };
    (0..count).map(move |i| start + i as f64 * step)
}

/// Samples the region between `base` and `top` over `[start, end]`.
pub fn area_samples<B, T>(start: f64, end: f64, base: B, top: T) -> Vec<AreaSamplePoint>
where
    B: Fn(f64) -> f64,
    T: Fn(f64) -> f64,
{
    area_samples_with_steps(start, end, base, top, DEFAULT_AREA_STEPS)
}

pub fn area_samples_with_steps<B, T>(
    start: f64,
    end: f64,
    base: B,
    top: T,
    steps: usize,
) -> Vec<AreaSamplePoint>
where
    B: Fn(f64) -> f64,
    T: Fn(f64) -> f64,
{
    if start.is_nan() || end.is_nan() || (end - start).abs() < MIN_AREA_RANGE || steps == 0 {
        return Vec::new();
    }

    let (start, end) = if end < start { (end, start) } else { (start, end) };
    (0..steps)
        .map(|i| {
            let t = if steps == 1 {
                0.0
            } else {
                i as f64 / (steps - 1) as f64
            };
            let x = start + (end - start) * t;
            let base_value = safe(base(x));
            let top_value = safe(top(x));
            AreaSamplePoint {
                x,
                base_value,
                offset_value: (top_value - base_value).max(0.0),
            }
        })
        .collect()
}

/// [`find_root`] with the NaN sentinel turned into `None`.
pub fn locate_root<F: Fn(f64) -> f64>(f: F, low: f64, high: f64) -> Option<f64> {
    let root = find_root(f, low, high);
    (!root.is_nan()).then_some(root)
}

/// Area where `upper` lies above `lower` between `from` and `to`, as a
/// non-negative number. Zero when the bounds coincide.
pub fn gap_area<U, L>(upper: U, lower: L, from: f64, to: f64) -> f64
where
    U: Fn(f64) -> f64,
    L: Fn(f64) -> f64,
{
    if (from - to).abs() <= COINCIDENT_QUANTITY_TOLERANCE {
        return 0.0;
    }
    integrate(|q| (upper(q) - lower(q)).max(0.0), from, to).abs()
}

/// Ordered list of human-readable problems found during a calculation.
#[derive(Debug, Default)]
pub struct Diagnostics {
    target: &'static str,
    messages: Vec<String>,
}

impl Diagnostics {
    pub fn new(target: &'static str) -> Self {
        Self {
            target,
            messages: Vec::new(),
        }
    }

    pub fn push(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!(target: "econ.calculators", calculator = self.target, "{message}");
        self.messages.push(message);
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn into_vec(self) -> Vec<String> {
        self.messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_curve_clamps_values() {
        let points = sample_curve(|q| if q > 1.0 { f64::INFINITY } else { q }, SampleGrid::new(0.0, 1.0, 3));
        assert_eq!(
            points,
            vec![
                ChartPoint::new(0.0, 0.0),
                ChartPoint::new(1.0, 1.0),
                ChartPoint::new(2.0, 1_000_000.0),
            ]
        );
    }

    #[test]
    fn spanning_grid_hits_both_ends() {
        let grid = SampleGrid::spanning(0.0, 100.0, 120);
        let points: Vec<f64> = grid.points().collect();
        assert_eq!(points.len(), 120);
        assert_eq!(points[0], 0.0);
        assert!((points[119] - 100.0).abs() < 1e-9);
    }

    #[test]
    fn sample_range_is_inclusive() {
        let values: Vec<f64> = sample_range(1.0, 150.0, 1.0).collect();
        assert_eq!(values.len(), 150);
        assert_eq!(values[0], 1.0);
        assert_eq!(values[149], 150.0);
        assert_eq!(sample_range(0.0, 1.0, 0.0).count(), 0);
        assert_eq!(sample_range(2.0, 1.0, 1.0).count(), 0);
    }

    #[test]
    fn area_samples_swap_reversed_bounds() {
        let samples = area_samples_with_steps(4.0, 0.0, |_| 1.0, |q| q, 5);
        assert_eq!(samples.len(), 5);
        assert_eq!(samples[0].x, 0.0);
        assert_eq!(samples[4].x, 4.0);
        // Offset never goes negative where the top dips below the base.
        assert_eq!(samples[0].offset_value, 0.0);
        assert_eq!(samples[4].offset_value, 3.0);
    }

    #[test]
    fn area_samples_empty_for_degenerate_interval() {
        assert!(area_samples(1.0, 1.0, |q| q, |q| q).is_empty());
        assert!(area_samples(f64::NAN, 1.0, |q| q, |q| q).is_empty());
    }

    #[test]
    fn gap_area_is_zero_for_coincident_bounds() {
        assert_eq!(gap_area(|_| 10.0, |_| 0.0, 5.0, 5.0005), 0.0);
        let area = gap_area(|_| 10.0, |_| 4.0, 3.0, 1.0);
        assert!((area - 12.0).abs() < 1e-9);
    }

    #[test]
    fn locate_root_maps_nan_to_none() {
        assert!(locate_root(|q| q - 3.0, 0.0, 10.0).is_some());
        let f = |_: f64| -> f64 { panic!("undefined") };
        assert!(locate_root(f, 0.0, 10.0).is_none());
    }

    #[test]
    fn diagnostics_keep_insertion_order() {
        let mut diagnostics = Diagnostics::new("test");
        assert!(diagnostics.is_empty());
        diagnostics.push("first");
        diagnostics.push(String::from("second"));
        assert_eq!(diagnostics.into_vec(), vec!["first", "second"]);
    }
}
