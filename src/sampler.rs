//! Trajectory sampler: iterates the de Jong map for one jittered parameter
//! pair and accumulates hits into its worker's plane.

use std::time::{Duration, Instant};

use crate::controls::ControlParameters;
use crate::coordinator::GenerationState;
use crate::field::DensityField;

const SPREAD: f64 = 0.2;  // Fraction of the viewport covered by one unit of sin - cos

/// Why a sampler left its loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SamplerExit {
    Saturated,
    Preempted,
    OutOfBounds { x: f64, y: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerReport {
    pub worker: usize,
    pub iterations: u64,
    pub elapsed: Duration,
    pub peak: u16,
    pub exit: SamplerExit,
}

/// One step of the map on a `width` x `height` viewport.
pub fn next_point(params: ControlParameters, x: f64, y: f64, width: f64, height: f64) -> (f64, f64) {
    let (a, b) = (params.a, params.b);
    let new_x = ((a * y).sin() - (b * x).cos()) * SPREAD * width + width / 2.0;
    let new_y = ((-a * x).sin() - (-b * y).cos()) * SPREAD * height + height / 2.0;
    (new_x, new_y)
}

/// Termination check run between batches.
pub fn stop_reason(
    peak: u16,
    saturation_cap: u16,
    elapsed: Duration,
    min_runtime: Duration,
    invalidated: bool,
) -> Option<SamplerExit> {
    if peak >= saturation_cap {
        Some(SamplerExit::Saturated)
    } else if elapsed > min_runtime && invalidated {
        Some(SamplerExit::Preempted)
    } else {
        None
    }
}

pub struct TrajectorySampler<'a> {
    pub worker: usize,
    pub params: ControlParameters,
    pub field: &'a DensityField,
    pub generation: &'a GenerationState,
    pub min_runtime: Duration,
    pub batch_size: usize,
}

impl TrajectorySampler<'_> {
    /// Samples until saturated or preempted, starting from the viewport centre.
    /// The minimum runtime counts from entry, not from generation setup.
    pub fn run(self) -> SamplerReport {
        let started = Instant::now();
        let width = self.field.width() as f64;
        let height = self.field.height() as f64;
        let cap = self.field.saturation_cap();
        let plane = self.field.plane(self.worker);

        let mut x = width / 2.0;
        let mut y = height / 2.0;
        let mut peak = self.field.peak(self.worker);
        let mut iterations = 0u64;

        let exit = 'sampling: loop {
            if let Some(exit) = stop_reason(
                peak,
                cap,
                started.elapsed(),
                self.min_runtime,
                self.generation.is_invalidated(),
            ) {
                break exit;
            }

            for _ in 0..self.batch_size {
                (x, y) = next_point(self.params, x, y, width, height);
                let Some(idx) = self.cell_index(x, y) else {
                    debug_assert!(false, "de Jong map left the grid at ({}, {})", x, y);
                    tracing::error!(worker = self.worker, x, y, "trajectory left the density grid");
                    break 'sampling SamplerExit::OutOfBounds { x, y };
                };
                let count = plane.increment(idx, cap);
                iterations += 1;
                if count > peak {
                    peak = count;
                    self.field.publish_peak(self.worker, peak);
                    if peak >= cap {
                        break;
                    }
                }
            }
        };

        SamplerReport {
            worker: self.worker,
            iterations,
            elapsed: started.elapsed(),
            peak,
            exit,
        }
    }

    fn cell_index(&self, x: f64, y: f64) -> Option<usize> {
        if !(x >= 0.0 && y >= 0.0 && x.is_finite() && y.is_finite()) {
            return None;
        }
        self.field.index(x.floor() as usize, y.floor() as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHAOTIC: ControlParameters = ControlParameters { a: 0.0113, b: -0.0087 };

    fn sampler<'a>(
        field: &'a DensityField,
        generation: &'a GenerationState,
        params: ControlParameters,
        min_runtime: Duration,
    ) -> TrajectorySampler<'a> {
        TrajectorySampler {
            worker: 0,
            params,
            field,
            generation,
            min_runtime,
            batch_size: 1024,
        }
    }

    #[test]
    fn map_stays_inside_viewport() {
        let (mut x, mut y) = (320.0, 180.0);
        for _ in 0..100_000 {
            (x, y) = next_point(CHAOTIC, x, y, 640.0, 360.0);
            assert!((64.0..=576.0).contains(&x), "x escaped: {}", x);
            assert!((36.0..=324.0).contains(&y), "y escaped: {}", y);
        }
    }

    #[test]
    fn stop_reason_gates_on_minimum_runtime() {
        let min = Duration::from_millis(33);
        assert_eq!(stop_reason(10, 100, Duration::from_millis(5), min, true), None);
        assert_eq!(stop_reason(10, 100, Duration::from_millis(40), min, false), None);
        assert_eq!(
            stop_reason(10, 100, Duration::from_millis(40), min, true),
            Some(SamplerExit::Preempted)
        );
        assert_eq!(
            stop_reason(100, 100, Duration::from_millis(1), min, false),
            Some(SamplerExit::Saturated)
        );
    }

    #[test]
    fn counters_never_exceed_cap() {
        let field = DensityField::new(160, 90, 1, 60);
        field.reset();
        let generation = GenerationState::new();
        let report = sampler(&field, &generation, CHAOTIC, Duration::from_secs(60)).run();

        assert_eq!(report.exit, SamplerExit::Saturated);
        assert_eq!(report.peak, 60);
        assert_eq!(field.peak(0), 60);
        let mut max = 0;
        for idx in 0..160 * 90 {
            let count = field.plane(0).get(idx);
            assert!(count <= 60);
            max = max.max(count);
        }
        assert_eq!(max, 60);
    }

    #[test]
    fn published_peak_never_decreases() {
        let field = DensityField::new(320, 180, 1, 2000);
        field.reset();
        let generation = GenerationState::new();

        let report = std::thread::scope(|scope| {
            let worker = scope.spawn(|| sampler(&field, &generation, CHAOTIC, Duration::from_secs(60)).run());
            let mut last = field.peak(0);
            while !worker.is_finished() {
                let current = field.peak(0);
                assert!(current >= last, "peak went from {} to {}", last, current);
                last = current;
            }
            worker.join().unwrap()
        });

        assert_eq!(report.exit, SamplerExit::Saturated);
        assert_eq!(field.peak(0), 2000);
    }

    #[test]
    fn fixed_point_saturates_one_cell() {
        // With a = b = 0 every step lands on (0.3 W, 0.3 H)
        let field = DensityField::new(100, 50, 1, 500);
        field.reset();
        let generation = GenerationState::new();
        let report = sampler(&field, &generation, ControlParameters { a: 0.0, b: 0.0 }, Duration::from_secs(60)).run();

        assert_eq!(report.exit, SamplerExit::Saturated);
        assert_eq!(report.iterations, 500);
        let idx = field.index(30, 15).unwrap();
        assert_eq!(field.plane(0).get(idx), 500);
        assert_eq!(field.density_at(field.index(0, 0).unwrap()), 0);
    }

    #[test]
    fn early_invalidation_does_not_cut_generation_short() {
        let field = DensityField::new(1280, 720, 1, u16::MAX);
        field.reset();
        let generation = GenerationState::new();
        generation.invalidate();
        let min_runtime = Duration::from_millis(30);
        let report = sampler(&field, &generation, CHAOTIC, min_runtime).run();

        match report.exit {
            SamplerExit::Preempted => assert!(report.elapsed > min_runtime),
            SamplerExit::Saturated => assert_eq!(report.peak, u16::MAX),
            SamplerExit::OutOfBounds { .. } => panic!("unexpected exit {:?}", report.exit),
        }
        assert!(report.iterations > 0);
    }

    #[test]
    fn late_invalidation_stops_at_next_batch_boundary() {
        let field = DensityField::new(640, 360, 1, u16::MAX);
        field.reset();
        let generation = GenerationState::new();
        generation.invalidate();
        let report = sampler(&field, &generation, CHAOTIC, Duration::ZERO).run();

        // The check runs before each batch, so at most one batch slips through
        assert!(report.iterations <= 1024, "ran {} iterations", report.iterations);
        assert_eq!(report.exit, SamplerExit::Preempted);
    }

    #[test]
    fn setup_time_does_not_count_towards_minimum_runtime() {
        let field = DensityField::new(1280, 720, 1, u16::MAX);
        field.reset();
        let generation = GenerationState::new();
        let min_runtime = Duration::from_millis(30);
        let worker = sampler(&field, &generation, CHAOTIC, min_runtime);

        // A slow reset between setup and launch, with input arriving meanwhile
        std::thread::sleep(Duration::from_millis(50));
        generation.invalidate();
        let report = worker.run();

        assert_eq!(report.exit, SamplerExit::Preempted);
        assert!(report.elapsed > min_runtime, "stopped after {:?}", report.elapsed);
        assert!(report.iterations > 0);
    }

    #[test]
    fn invalidation_during_minimum_runtime_waits_it_out() {
        let field = DensityField::new(1280, 720, 1, u16::MAX);
        field.reset();
        let generation = GenerationState::new();
        let min_runtime = Duration::from_millis(40);

        let report = std::thread::scope(|scope| {
            let worker = scope.spawn(|| sampler(&field, &generation, CHAOTIC, min_runtime).run());
            std::thread::sleep(Duration::from_millis(10));
            generation.invalidate();
            worker.join().unwrap()
        });

        assert_eq!(report.exit, SamplerExit::Preempted);
        assert!(report.elapsed > min_runtime, "stopped after {:?}", report.elapsed);
        assert!(report.iterations > 0);
    }

    #[test]
    fn invalidation_after_minimum_runtime_stops_promptly() {
        let field = DensityField::new(1280, 720, 1, u16::MAX);
        field.reset();
        let generation = GenerationState::new();
        let min_runtime = Duration::from_millis(5);

        let (report, stop_requested) = std::thread::scope(|scope| {
            let worker = scope.spawn(|| sampler(&field, &generation, CHAOTIC, min_runtime).run());
            std::thread::sleep(Duration::from_millis(30));
            let stop_requested = Instant::now();
            generation.invalidate();
            (worker.join().unwrap(), stop_requested)
        });

        assert_eq!(report.exit, SamplerExit::Preempted);
        assert!(report.iterations > 0);
        // Far less than it would take to saturate a full-size plane
        assert!(stop_requested.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn shutdown_before_generation_start_still_preempts() {
        let field = DensityField::new(1280, 720, 1, u16::MAX);
        field.reset();
        let generation = GenerationState::new();
        generation.shutdown();
        generation.begin();
        let report = sampler(&field, &generation, CHAOTIC, Duration::from_millis(5)).run();

        assert_eq!(report.exit, SamplerExit::Preempted);
    }
}
