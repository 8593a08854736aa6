/// Averages interleaved multi-channel frames down to one channel.
/// A trailing partial frame is dropped.
pub fn downmix_to_mono(data: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return data.to_vec();
    }
    data.chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Converts a slice of f32 samples to a vector of i16 samples.
pub fn convert_f32_to_i16(pcm32: &[f32]) -> Vec<i16> {
    pcm32
        .iter()
        .map(|&sample| (sample * i16::MAX as f32).clamp(i16::MIN as f32, i16::MAX as f32) as i16)
        .collect()
}

/// Peak absolute amplitude, used to warn about silent recordings.
pub fn peak(pcm32: &[f32]) -> f32 {
    pcm32.iter().fold(0.0_f32, |acc, s| acc.max(s.abs()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downmix_averages_frames() {
        let stereo = [0.5, -0.5, 1.0, 0.0, 0.25];
        assert_eq!(downmix_to_mono(&stereo, 2), vec![0.0, 0.5]);
        assert_eq!(downmix_to_mono(&stereo, 1), stereo.to_vec());
    }

    #[test]
    fn f32_to_i16_clamps() {
        let out = convert_f32_to_i16(&[0.0, 1.0, -1.0, 2.0, -2.0]);
        assert_eq!(out, vec![0, i16::MAX, -i16::MAX, i16::MAX, i16::MIN]);
    }

    #[test]
    fn peak_of_silence_is_zero() {
        assert_eq!(peak(&[]), 0.0);
        assert_eq!(peak(&[0.1, -0.4, 0.2]), 0.4);
    }
}
