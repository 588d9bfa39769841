/// Natural logarithms for every integer density the renderer can observe.
///
/// Looking these up keeps a transcendental call out of the per-pixel loop.
#[derive(Debug, Clone)]
pub struct LogTable {
    values: Vec<f64>,
}

impl LogTable {
    pub fn new(max_density: usize) -> Self {
        let values = (1..=max_density).map(|n| (n as f64).ln()).collect();
        Self { values }
    }

    /// Returns `ln(density)`; densities above the table are clamped to its top.
    pub fn ln(&self, density: u32) -> f64 {
        debug_assert!(density >= 1, "log of zero density requested");
        let idx = (density as usize).clamp(1, self.values.len()) - 1;
        self.values[idx]
    }

    pub fn max_density(&self) -> usize {
        self.values.len()
    }
}
