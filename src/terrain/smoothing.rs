/// Number of cells the blur reaches on each side for a given sigma
pub fn kernel_radius(sigma: f64) -> usize {
    if sigma <= 0.0 {
        0
    } else {
        (sigma * 3.0).ceil() as usize
    }
}

/// Apply a separable Gaussian blur to a row-major grid in place.
///
/// Edges are clamped. Callers that need seam-consistent results sample a grid
/// padded by [`kernel_radius`] and crop afterwards.
pub fn gaussian_blur(values: &mut [f64], cols: usize, rows: usize, sigma: f64) {
    let radius = kernel_radius(sigma);
    if radius == 0 || cols == 0 || rows == 0 {
        return;
    }

    // Build 1D Gaussian kernel
    let kernel_size = radius * 2 + 1;
    let mut kernel = vec![0.0f64; kernel_size];
    let mut sum = 0.0;
    for (i, k) in kernel.iter_mut().enumerate() {
        let x = i as f64 - radius as f64;
        *k = (-x * x / (2.0 * sigma * sigma)).exp();
        sum += *k;
    }
    for k in &mut kernel {
        *k /= sum;
    }

    // Horizontal pass
    let mut temp = vec![0.0f64; values.len()];
    for y in 0..rows {
        let row = y * cols;
        for x in 0..cols {
            let mut acc = 0.0;
            for (k, weight) in kernel.iter().enumerate() {
                let sx = (x as isize + k as isize - radius as isize).clamp(0, cols as isize - 1)
                    as usize;
                acc += values[row + sx] * weight;
            }
            temp[row + x] = acc;
        }
    }

    // Vertical pass
    for y in 0..rows {
        for x in 0..cols {
            let mut acc = 0.0;
            for (k, weight) in kernel.iter().enumerate() {
                let sy = (y as isize + k as isize - radius as isize).clamp(0, rows as isize - 1)
                    as usize;
                acc += temp[sy * cols + x] * weight;
            }
            values[y * cols + x] = acc;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_field_unchanged() {
        let mut values = vec![3.5; 20 * 15];
        gaussian_blur(&mut values, 20, 15, 1.2);
        assert!(values.iter().all(|v| (v - 3.5).abs() < 1e-12));
    }

    #[test]
    fn test_spike_is_spread_and_mass_kept() {
        let (cols, rows) = (21, 21);
        let mut values = vec![0.0; cols * rows];
        values[10 * cols + 10] = 1.0;
        gaussian_blur(&mut values, cols, rows, 1.0);
        let total: f64 = values.iter().sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert!(values[10 * cols + 10] < 0.2);
        assert!(values[10 * cols + 11] > 0.0);
    }

    #[test]
    fn test_zero_sigma_noop() {
        let mut values = vec![1.0, 2.0, 3.0, 4.0];
        gaussian_blur(&mut values, 2, 2, 0.0);
        assert_eq!(values, vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(kernel_radius(0.0), 0);
        assert_eq!(kernel_radius(1.0), 3);
    }
}
