//! Tone mapping: summed integer densities to log-scaled grayscale points.

use crate::field::DensityField;
use crate::log_table::LogTable;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DensityPoint {
    pub x: u32,
    pub y: u32,
    pub intensity: f32,
}

#[derive(Debug)]
pub struct ToneMapper {
    log_table: LogTable,
}

impl ToneMapper {
    pub fn new(log_table: LogTable) -> Self {
        Self { log_table }
    }

    /// Single normalization factor for the whole frame, `1 / ln(total peak)`.
    /// A total peak of 1 or less means nothing has accumulated yet.
    pub fn scale(&self, total_peak: u32) -> f64 {
        if total_peak > 1 {
            1.0 / self.log_table.ln(total_peak)
        } else {
            0.0
        }
    }

    /// Replaces `out` with one point per non-empty pixel.
    pub fn render(&self, field: &DensityField, out: &mut Vec<DensityPoint>) {
        out.clear();
        let total_peak = field.total_peak();
        if total_peak == 0 {
            return;
        }
        let scale = self.scale(total_peak);

        for row in 0..field.height() {
            let row_start = row * field.width();
            for col in 0..field.width() {
                let density = field.density_at(row_start + col);
                if density == 0 {
                    continue;
                }
                // Peaks may lag the counts they were read alongside
                let intensity = (self.log_table.ln(density) * scale).clamp(0.0, 1.0);
                out.push(DensityPoint {
                    x: col as u32,
                    y: row as u32,
                    intensity: intensity as f32,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::controls::ControlParameters;
    use crate::coordinator::GenerationState;
    use crate::sampler::TrajectorySampler;

    fn mapper(field: &DensityField) -> ToneMapper {
        ToneMapper::new(LogTable::new(field.saturation_cap() as usize * field.workers()))
    }

    fn hit(field: &DensityField, worker: usize, col: usize, row: usize, times: u16) {
        let idx = field.index(col, row).unwrap();
        let mut peak = field.peak(worker);
        for _ in 0..times {
            peak = peak.max(field.plane(worker).increment(idx, field.saturation_cap()));
        }
        field.publish_peak(worker, peak);
    }

    #[test]
    fn empty_field_emits_nothing() {
        let field = DensityField::new(8, 8, 2, 100);
        let mut out = vec![DensityPoint { x: 9, y: 9, intensity: 1.0 }];
        mapper(&field).render(&field, &mut out);
        assert!(out.is_empty());

        field.reset();
        mapper(&field).render(&field, &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn intensities_use_global_log_scale() {
        let field = DensityField::new(8, 4, 2, 100);
        field.reset();
        hit(&field, 0, 1, 1, 100);
        hit(&field, 1, 1, 1, 100);
        hit(&field, 1, 5, 2, 10);

        let mut out = Vec::new();
        mapper(&field).render(&field, &mut out);
        assert_eq!(out.len(), 2);

        let brightest = out.iter().find(|p| (p.x, p.y) == (1, 1)).unwrap();
        assert!((brightest.intensity - 1.0).abs() < 1e-6);

        let dim = out.iter().find(|p| (p.x, p.y) == (5, 2)).unwrap();
        let expected = (10f64.ln() / 200f64.ln()) as f32;
        assert!((dim.intensity - expected).abs() < 1e-6);
    }

    #[test]
    fn intensity_is_clamped_when_peaks_lag() {
        let field = DensityField::new(4, 4, 1, 100);
        field.reset();
        let idx = field.index(2, 2).unwrap();
        for _ in 0..50 {
            field.plane(0).increment(idx, 100);
        }
        field.publish_peak(0, 10);

        let mut out = Vec::new();
        mapper(&field).render(&field, &mut out);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].intensity, 1.0);
    }

    #[test]
    fn saturated_fixed_point_is_not_clamped() {
        let field = DensityField::new(100, 50, 2, 200);
        field.reset();
        let generation = GenerationState::new();
        for worker in 0..2 {
            TrajectorySampler {
                worker,
                params: ControlParameters { a: 0.0, b: 0.0 },
                field: &field,
                generation: &generation,
                min_runtime: Duration::from_secs(60),
                batch_size: 64,
            }
            .run();
        }

        let mut out = Vec::new();
        mapper(&field).render(&field, &mut out);
        assert_eq!(out.len(), 1);
        let point = out[0];
        assert_eq!((point.x, point.y), (30, 15));

        let density = field.density_at(field.index(30, 15).unwrap());
        let raw = (density as f64).ln() / (field.total_peak() as f64).ln();
        assert!(raw > 0.0 && raw <= 1.0, "raw intensity {}", raw);
        assert!((point.intensity as f64 - raw).abs() < 1e-6);
        assert!(!out.iter().any(|p| (p.x, p.y) == (0, 0)));
    }

    #[test]
    fn rendering_static_field_is_idempotent() {
        let field = DensityField::new(16, 16, 3, 50);
        field.reset();
        for (worker, col) in [(0, 3), (1, 7), (2, 3)] {
            hit(&field, worker, col, worker * 4, 17 + worker as u16);
        }
        let tone = mapper(&field);
        let (mut first, mut second) = (Vec::new(), Vec::new());
        tone.render(&field, &mut first);
        tone.render(&field, &mut second);
        assert_eq!(first, second);
        assert!(!first.is_empty());
    }
}
