//! Gaussian blur of single-channel coverage masks, used for the text drop shadow.

use crate::error::{MediaError, MediaResult};

/// Integer gaussian taps. Each tap is scaled by 4096 and results are divided by the tap sum, so
/// a constant mask stays constant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GaussianKernel {
    taps: Vec<u32>,
    total: u32,
}

impl GaussianKernel {
    pub fn new(radius: u32, sigma: f32) -> MediaResult<Self> {
        if radius == 0 {
            return Ok(Self {
                taps: vec![1],
                total: 1,
            });
        }
        if !sigma.is_finite() || sigma <= 0.0 {
            return Err(MediaError::validation("blur sigma must be finite and > 0"));
        }

        let two_sigma_sq = 2.0 * f64::from(sigma).powi(2);
        let r = i64::from(radius);
        let taps: Vec<u32> = (-r..=r)
            .map(|d| {
                let d = d as f64;
                ((-d * d / two_sigma_sq).exp() * 4096.0).round().max(1.0) as u32
            })
            .collect();
        let total = taps.iter().sum();
        Ok(Self { taps, total })
    }

    pub fn radius(&self) -> usize {
        self.taps.len() / 2
    }

    /// Weighted average of the `len` samples around `center`, clamping at both ends.
    fn sample(&self, len: usize, center: usize, at: impl Fn(usize) -> u8) -> u8 {
        let r = self.radius();
        let last = len - 1;
        let acc: u64 = self
            .taps
            .iter()
            .enumerate()
            .map(|(i, &w)| {
                let pos = (center + i).saturating_sub(r).min(last);
                u64::from(w) * u64::from(at(pos))
            })
            .sum();
        let total = u64::from(self.total);
        ((acc + total / 2) / total).min(255) as u8
    }
}

/// Blur a `width`-wide coverage `mask` in place. `scratch` is reused between calls.
///
/// Edges clamp, so callers pad the mask with at least `kernel.radius()` empty rows and columns
/// when coverage must fade out instead of smearing into the border.
pub fn blur_mask(
    mask: &mut [u8],
    width: usize,
    kernel: &GaussianKernel,
    scratch: &mut Vec<u8>,
) -> MediaResult<()> {
    if width == 0 || !mask.len().is_multiple_of(width) {
        return Err(MediaError::validation(format!(
            "mask of {} bytes is not a whole number of {width}-wide rows",
            mask.len()
        )));
    }
    if mask.is_empty() || kernel.radius() == 0 {
        return Ok(());
    }
    let height = mask.len() / width;

    scratch.clear();
    scratch.resize(mask.len(), 0);
    for (y, row) in scratch.chunks_exact_mut(width).enumerate() {
        let src = &mask[y * width..(y + 1) * width];
        for (x, out) in row.iter_mut().enumerate() {
            *out = kernel.sample(width, x, |sx| src[sx]);
        }
    }
    for y in 0..height {
        for x in 0..width {
            mask[y * width + x] = kernel.sample(height, y, |sy| scratch[sy * width + x]);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kernel() -> GaussianKernel {
        GaussianKernel::new(2, 1.2).unwrap()
    }

    #[test]
    fn kernel_is_symmetric_and_peaks_in_the_middle() {
        let k = GaussianKernel::new(8, 4.0).unwrap();
        assert_eq!(k.radius(), 8);
        let taps = &k.taps;
        assert!(taps.iter().eq(taps.iter().rev()));
        assert_eq!(taps.iter().max(), Some(&taps[8]));
    }

    #[test]
    fn uniform_mask_is_unchanged() {
        let mut mask = vec![77u8; 6 * 5];
        blur_mask(&mut mask, 6, &kernel(), &mut Vec::new()).unwrap();
        assert!(mask.iter().all(|&a| a == 77));
    }

    #[test]
    fn single_dot_spreads_without_gaining_coverage() {
        let mut mask = vec![0u8; 9 * 9];
        mask[4 * 9 + 4] = 255;
        blur_mask(&mut mask, 9, &kernel(), &mut Vec::new()).unwrap();

        assert!(mask[4 * 9 + 4] < 255);
        assert!(mask[4 * 9 + 5] > 0 && mask[5 * 9 + 4] > 0);
        assert_eq!(mask[0], 0);
        let total: i32 = mask.iter().map(|&a| i32::from(a)).sum();
        assert!((total - 255).abs() <= 6, "coverage drifted to {total}");
    }

    #[test]
    fn zero_radius_is_a_no_op() {
        let identity = GaussianKernel::new(0, 0.0).unwrap();
        let mut mask = vec![0, 255, 0, 40];
        blur_mask(&mut mask, 2, &identity, &mut Vec::new()).unwrap();
        assert_eq!(mask, vec![0, 255, 0, 40]);
    }

    #[test]
    fn ragged_masks_and_bad_sigma_are_rejected() {
        assert!(blur_mask(&mut [0u8; 7], 2, &kernel(), &mut Vec::new()).is_err());
        assert!(GaussianKernel::new(3, f32::NAN).is_err());
        assert!(GaussianKernel::new(3, 0.0).is_err());
    }
}
