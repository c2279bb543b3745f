use crate::wavetable::{TABLE_SIZE, WaveTableBank, WaveformFamily};

/// Pure waveforms sit exactly on a table boundary, where a tiny change in
/// distortion would jump to a different pair of tables.
pub const MIN_DISTORTION: f32 = 0.01;
pub const MAX_DISTORTION: f32 = 0.99;

/// Where a distortion value lands between two adjacent waveform families.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlendWeights {
    pub low: WaveformFamily,
    pub high: WaveformFamily,
    pub weight_low: f32,
    pub weight_high: f32,
}

impl BlendWeights {
    pub fn for_distortion(distortion: f32) -> Self {
        let distortion = if distortion.is_nan() {
            MIN_DISTORTION
        } else {
            distortion.clamp(MIN_DISTORTION, MAX_DISTORTION)
        };
        let position = distortion * (WaveformFamily::COUNT - 1) as f32;
        let low_idx = position.floor();
        let high_idx = position.ceil();
        let weight_low = high_idx - position;

        Self {
            low: WaveformFamily::ALL[low_idx as usize],
            high: WaveformFamily::ALL[high_idx as usize],
            weight_low,
            weight_high: 1.0 - weight_low,
        }
    }
}

/// Table entries skipped per output sample to sound `pitch_hz`. Never zero.
pub fn step_size(pitch_hz: f32, sample_rate: u32) -> usize {
    let pitch_hz = if pitch_hz.is_finite() {
        pitch_hz.max(0.0)
    } else {
        0.0
    };
    let step = (pitch_hz as f64 * TABLE_SIZE as f64 / sample_rate.max(1) as f64).round();
    (step as usize).max(1)
}

/// Samples emitted for one traversal of the table at `step`.
pub fn samples_per_cycle(step: usize) -> usize {
    (TABLE_SIZE / step.max(1)).max(1)
}

/// Renders one wavelength at a time by striding through the shared tables.
///
/// Higher pitches take bigger strides and so produce shorter buffers; each
/// call always covers exactly one cycle of the waveform.
#[derive(Debug, Clone, Copy)]
pub struct SampleGenerator<'a> {
    tables: &'a WaveTableBank,
    sample_rate: u32,
}

impl<'a> SampleGenerator<'a> {
    pub fn new(tables: &'a WaveTableBank, sample_rate: u32) -> Self {
        Self {
            tables,
            sample_rate,
        }
    }

    /// Fills `buffer` with one cycle and returns the number of samples written.
    /// The buffer is resized to exactly that length.
    pub fn generate_into(
        &self,
        buffer: &mut Vec<i16>,
        pitch_hz: f32,
        distortion: f32,
        gain: f32,
    ) -> usize {
        let weights = BlendWeights::for_distortion(distortion);
        let gain = if gain.is_nan() { 0.0 } else { gain.clamp(0.0, 1.0) };
        let low = self.tables.table(weights.low);
        let high = self.tables.table(weights.high);

        let step = step_size(pitch_hz, self.sample_rate);
        let count = samples_per_cycle(step);

        buffer.clear();
        buffer.extend((0..count).map(|k| {
            let idx = k * step;
            let blended = low[idx] * weights.weight_low + high[idx] * weights.weight_high;
            (blended * gain) as i16
        }));
        count
    }

    pub fn generate(&self, pitch_hz: f32, distortion: f32, gain: f32) -> (Vec<i16>, usize) {
        let mut buffer = Vec::with_capacity(TABLE_SIZE);
        let count = self.generate_into(&mut buffer, pitch_hz, distortion, gain);
        (buffer, count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wavetable::{MAX_AMPLITUDE, SAW_VOL_ADJ};

    const SAMPLE_RATE: u32 = 44100;

    fn generator() -> SampleGenerator<'static> {
        SampleGenerator::new(WaveTableBank::shared(), SAMPLE_RATE)
    }

    #[test]
    fn four_hundred_hz_reference_case() {
        assert_eq!(step_size(400.0, SAMPLE_RATE), 19);
        let (buffer, count) = generator().generate(400.0, 0.5, 1.0);
        assert_eq!(count, 107);
        assert_eq!(buffer.len(), 107);
    }

    #[test]
    fn doubling_pitch_halves_sample_count() {
        let g = generator();
        for pitch in [220.0, 300.0, 440.0, 660.0] {
            let (_, low) = g.generate(pitch, 0.3, 1.0);
            let (_, high) = g.generate(pitch * 2.0, 0.3, 1.0);
            let expected = low as f32 / 2.0;
            assert!(
                (high as f32 - expected).abs() <= expected * 0.05 + 1.0,
                "{pitch} Hz: {low} vs {high}"
            );
        }
    }

    #[test]
    fn step_size_never_zero() {
        assert_eq!(step_size(0.0, SAMPLE_RATE), 1);
        assert_eq!(step_size(-40.0, SAMPLE_RATE), 1);
        assert_eq!(step_size(f32::NAN, SAMPLE_RATE), 1);
        assert_eq!(samples_per_cycle(1), TABLE_SIZE);
        assert_eq!(samples_per_cycle(TABLE_SIZE * 4), 1);
    }

    #[test]
    fn weights_sum_to_one() {
        for i in 0..=100 {
            let distortion = i as f32 / 100.0;
            let w = BlendWeights::for_distortion(distortion);
            assert!((w.weight_low + w.weight_high - 1.0).abs() < 1e-6);
            assert!(w.weight_low >= 0.0 && w.weight_high >= 0.0);
            assert!(w.high.index() - w.low.index() <= 1);
        }
    }

    #[test]
    fn distortion_is_clamped_at_both_ends() {
        let w = BlendWeights::for_distortion(0.0);
        assert_eq!(w.low, WaveformFamily::Sine);
        assert_eq!(w.high, WaveformFamily::Triangle);
        assert!((w.weight_low - 0.97).abs() < 1e-5);

        let w = BlendWeights::for_distortion(1.0);
        assert_eq!(w.low, WaveformFamily::Square);
        assert_eq!(w.high, WaveformFamily::Sawtooth);
        assert!((w.weight_high - 0.97).abs() < 1e-5);

        assert_eq!(BlendWeights::for_distortion(-5.0), BlendWeights::for_distortion(0.0));
        assert_eq!(BlendWeights::for_distortion(f32::NAN), BlendWeights::for_distortion(0.0));
    }

    #[test]
    fn zero_distortion_is_nearly_sine() {
        let bank = WaveTableBank::shared();
        let sine = bank.table(WaveformFamily::Sine);
        let gain = 0.5;
        let (buffer, _) = generator().generate(440.0, 0.0, gain);
        let step = step_size(440.0, SAMPLE_RATE);

        // 3% of the triangle is mixed in
        let tolerance = 0.03 * 2.0 * MAX_AMPLITUDE * gain + 1.0;
        for (k, &sample) in buffer.iter().enumerate() {
            let expected = sine[k * step] * gain;
            assert!((sample as f32 - expected).abs() <= tolerance);
        }
    }

    #[test]
    fn full_distortion_is_nearly_sawtooth() {
        let bank = WaveTableBank::shared();
        let saw = bank.table(WaveformFamily::Sawtooth);
        let (buffer, _) = generator().generate(440.0, 1.0, 1.0);
        let step = step_size(440.0, SAMPLE_RATE);

        let first_expected = -0.97 * SAW_VOL_ADJ * MAX_AMPLITUDE;
        assert!((buffer[0] as f32 - first_expected).abs() < 0.03 * MAX_AMPLITUDE + 1.0);
        let tolerance = 0.03 * 2.0 * MAX_AMPLITUDE + 1.0;
        for (k, &sample) in buffer.iter().enumerate() {
            assert!((sample as f32 - saw[k * step]).abs() <= tolerance);
        }
    }

    #[test]
    fn gain_scales_output_and_is_clamped() {
        let g = generator();
        let (full, _) = g.generate(500.0, 0.4, 1.0);
        let (half, _) = g.generate(500.0, 0.4, 0.5);
        let (over, _) = g.generate(500.0, 0.4, 3.0);
        let (silent, _) = g.generate(500.0, 0.4, 0.0);

        assert_eq!(full, over);
        assert!(silent.iter().all(|&s| s == 0));
        for (f, h) in full.iter().zip(half.iter()) {
            assert!((*f as f32 / 2.0 - *h as f32).abs() <= 1.0);
        }
    }

    #[test]
    fn generate_into_reuses_buffer() {
        let g = generator();
        let mut buffer = Vec::new();
        let long = g.generate_into(&mut buffer, 220.0, 0.5, 1.0);
        let short = g.generate_into(&mut buffer, 1760.0, 0.5, 1.0);
        assert!(short < long);
        assert_eq!(buffer.len(), short);
    }
}
