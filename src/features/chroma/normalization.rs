//! Chroma normalization strategies

const EPSILON: f32 = 1e-10;

/// Scale a vector in place so its entries sum to 1
///
/// All-zero vectors are left untouched.
pub fn normalize_l1(vector: &mut [f32]) {
    let sum: f32 = vector.iter().map(|x| x.abs()).sum();
    if sum > EPSILON {
        for x in vector.iter_mut() {
            *x /= sum;
        }
    }
}

/// Sharpen chroma vector to emphasize prominent pitch classes
///
/// # Arguments
///
/// * `chroma` - Chroma vector
/// * `power` - Sharpening power (1.0 = unchanged, 1.5-2.0 typical)
///
/// # Returns
///
/// Sharpened chroma vector (L1 normalized)
pub fn sharpen_chroma(chroma: &[f32], power: f32) -> Vec<f32> {
    let mut out: Vec<f32> = chroma.iter().map(|&x| x.max(0.0).powf(power)).collect();
    normalize_l1(&mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_l1() {
        let mut v = vec![1.0, 3.0];
        normalize_l1(&mut v);
        assert_eq!(v, vec![0.25, 0.75]);

        let mut zero = vec![0.0; 3];
        normalize_l1(&mut zero);
        assert_eq!(zero, vec![0.0; 3]);
    }

    #[test]
    fn test_sharpen_emphasizes_peak() {
        let chroma = vec![0.5, 0.3, 0.2];
        let sharp = sharpen_chroma(&chroma, 2.0);
        assert!(sharp[0] > chroma[0]);
        assert!(sharp[2] < chroma[2]);
        assert!((sharp.iter().sum::<f32>() - 1.0).abs() < 1e-6);
    }
}
