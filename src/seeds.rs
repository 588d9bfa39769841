//! Low-discrepancy offsets used to jitter each worker's parameters.

// Poisson-disc points in [0, 1)², one pair per worker
const POISSON_POINTS: [(f64, f64); 7] = [
    (0.797296, 0.0357677),
    (0.764946, 0.92288),
    (0.242775, 0.884426),
    (0.119999, 0.227851),
    (0.998596, 0.558428),
    (0.447035, 0.520157),
    (0.0036317, 0.594317),
];

// R2 sequence constants, 1/g and 1/g² for the plastic number g
const R2_ALPHA: (f64, f64) = (0.754_877_666_246_692_7, 0.569_840_290_998_053_3);

#[derive(Debug, Clone, PartialEq)]
pub struct JitterSeed {
    offsets: Vec<(f64, f64)>,
}

impl JitterSeed {
    /// Builds offsets for `workers` indices. The precomputed Poisson points come
    /// first; larger pools continue with the R2 sequence.
    pub fn new(workers: usize) -> Self {
        let mut offsets: Vec<(f64, f64)> = POISSON_POINTS.iter().copied().take(workers).collect();
        for n in POISSON_POINTS.len()..workers {
            let n = n as f64;
            offsets.push(((0.5 + R2_ALPHA.0 * n).fract(), (0.5 + R2_ALPHA.1 * n).fract()));
        }
        Self { offsets }
    }

    pub fn get(&self, worker: usize) -> (f64, f64) {
        self.offsets[worker]
    }

    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.offsets.iter().copied()
    }
}
