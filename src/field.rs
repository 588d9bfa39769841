//! Per-worker density planes and peaks.
//!
//! Each plane has exactly one writer (its sampler) and any number of readers.
//! Cells are relaxed atomics: a reader may see a stale count, but never a
//! value that was not a valid count for the current generation.

use std::sync::atomic::{AtomicU16, Ordering};

/// Fixed-size grid of saturating hit counters owned by one worker.
#[derive(Debug)]
pub struct WorkerPlane {
    cells: Box<[AtomicU16]>,
}

impl WorkerPlane {
    fn new(len: usize) -> Self {
        Self { cells: (0..len).map(|_| AtomicU16::new(0)).collect() }
    }

    /// Adds one hit to `idx` and returns the new count, never exceeding `cap`.
    /// Only the owning worker may call this.
    pub fn increment(&self, idx: usize, cap: u16) -> u16 {
        let cell = &self.cells[idx];
        let current = cell.load(Ordering::Relaxed);
        if current >= cap {
            return current;
        }
        let next = current + 1;
        cell.store(next, Ordering::Relaxed);
        next
    }

    pub fn get(&self, idx: usize) -> u16 {
        self.cells[idx].load(Ordering::Relaxed)
    }

    fn clear(&self) {
        for cell in self.cells.iter() {
            cell.store(0, Ordering::Relaxed);
        }
    }
}

/// All worker planes plus one peak per worker.
#[derive(Debug)]
pub struct DensityField {
    width: usize,
    height: usize,
    saturation_cap: u16,
    planes: Vec<WorkerPlane>,
    peaks: Vec<AtomicU16>,
}

impl DensityField {
    /// Allocates zeroed planes. Peaks start at 0 so nothing renders before
    /// the first generation.
    pub fn new(width: usize, height: usize, workers: usize, saturation_cap: u16) -> Self {
        Self {
            width,
            height,
            saturation_cap,
            planes: (0..workers).map(|_| WorkerPlane::new(width * height)).collect(),
            peaks: (0..workers).map(|_| AtomicU16::new(0)).collect(),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn workers(&self) -> usize {
        self.planes.len()
    }

    pub fn saturation_cap(&self) -> u16 {
        self.saturation_cap
    }

    /// Row-major cell index, or `None` when the pixel lies outside the grid.
    pub fn index(&self, col: usize, row: usize) -> Option<usize> {
        (col < self.width && row < self.height).then(|| row * self.width + col)
    }

    pub fn plane(&self, worker: usize) -> &WorkerPlane {
        &self.planes[worker]
    }

    pub fn peak(&self, worker: usize) -> u16 {
        self.peaks[worker].load(Ordering::Relaxed)
    }

    /// Publishes a worker's running maximum. Only the owning worker calls this.
    pub fn publish_peak(&self, worker: usize, peak: u16) {
        self.peaks[worker].store(peak, Ordering::Relaxed);
    }

    /// Sum of every worker's peak; the global normalization basis.
    pub fn total_peak(&self) -> u32 {
        self.peaks.iter().map(|p| p.load(Ordering::Relaxed) as u32).sum()
    }

    pub fn density_at(&self, idx: usize) -> u32 {
        self.planes.iter().map(|plane| plane.get(idx) as u32).sum()
    }

    /// Clears every plane and resets each peak to 1. Callers must hold the
    /// reset gate and no sampler may be running.
    pub fn reset(&self) {
        for plane in &self.planes {
            plane.clear();
        }
        for peak in &self.peaks {
            peak.store(1, Ordering::Relaxed);
        }
    }
}
