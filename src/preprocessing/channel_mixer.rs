//! Channel mixing utilities (stereo to mono and back)

/// Convert stereo to mono by averaging: (L + R) / 2
///
/// If the channels differ in length the output has the shorter length.
pub fn stereo_to_mono(left: &[f32], right: &[f32]) -> Vec<f32> {
    left.iter()
        .zip(right.iter())
        .map(|(&l, &r)| (l + r) * 0.5)
        .collect()
}

/// Duplicate a mono signal into a centred stereo pair
pub fn mono_to_stereo(mono: &[f32]) -> (Vec<f32>, Vec<f32>) {
    (mono.to_vec(), mono.to_vec())
}
