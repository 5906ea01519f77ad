/// Linear resampling by `to / from`; used to bring device rates to the
/// Live API rates and back.
pub fn resample(samples: &[f32], from: u32, to: u32) -> Vec<f32> {
    if from == to || from == 0 || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = to as f64 / from as f64;
    let output_len = (samples.len() as f64 * ratio).round() as usize;
    let mut output = Vec::with_capacity(output_len);

    for i in 0..output_len {
        let src_idx = i as f64 / ratio;
        let idx_floor = src_idx.floor() as usize;
        let idx_ceil = (idx_floor + 1).min(samples.len() - 1);
        let frac = (src_idx - idx_floor as f64) as f32;

        let sample = match samples.get(idx_floor) {
            Some(&s1) => s1 + (samples[idx_ceil] - s1) * frac,
            None => samples[samples.len() - 1],
        };
        output.push(sample);
    }

    output
}
