//! Pitch Detector
//!
//! Orchestrates the detection cycle: two consecutive capture-and-transform
//! passes, a harmonic product spectrum search inside the configured scan
//! window, and a steady-state filter that discards transient disagreement
//! before a note is resolved.

use crate::note_resolver::{NoteError, NoteResolver, TuningDirection};
use crate::sample_buffer::{CancellationToken, SampleBuffer};
use crate::transform::{self, SpectralTransform, TransformError};
use thiserror::Error;

/// Errors returned by the pitch detector.
#[derive(Debug, Error)]
pub enum DetectorError {
    /// An error occurred during the configuration of the detector.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An error surfaced by the spectral transform engine.
    #[error(transparent)]
    Transform(#[from] TransformError),

    /// An error surfaced by the note resolver.
    #[error(transparent)]
    Note(#[from] NoteError),
}

/// One accepted detection cycle.
#[derive(Debug, Clone)]
pub struct DetectionResult {
    /// Name of the nearest note, e.g. `"A4"`.
    pub note_name: &'static str,
    /// Detected fundamental frequency in Hz, averaged over the cycle pair.
    pub frequency_hz: f32,
    /// Magnitude spectrum of the second block, for visualization.
    pub spectrum: Vec<f32>,
    /// Whether the detection is flat, in tune, or sharp.
    pub tuning: TuningDirection,
}

/// Builder for a [`PitchDetector`].
pub struct PitchDetectorBuilder {
    power: u32,
    sample_rate: u32,
    min_hz: f32,
    max_hz: f32,
    steady_threshold: f32,
    note_epsilon: f32,
}

impl PitchDetectorBuilder {
    /// Start with default parameters:
    /// power = 12 (4096-sample blocks), sample_rate = 8000 Hz,
    /// scan range 50.0..990.0 Hz, steady-state threshold = 10.0 Hz,
    /// note-match epsilon = 1.0 Hz.
    pub fn new() -> Self {
        PitchDetectorBuilder {
            power: 12,
            sample_rate: 8000,
            min_hz: 50.0,
            max_hz: 990.0,
            steady_threshold: 10.0,
            note_epsilon: 1.0,
        }
    }

    /// Set the FFT size exponent; blocks hold `2^power` samples.
    pub fn power(mut self, power: u32) -> Self {
        self.power = power;
        self
    }

    /// Set the sample rate of the incoming blocks in Hz.
    pub fn sample_rate(mut self, rate: u32) -> Self {
        self.sample_rate = rate;
        self
    }

    /// Set the detectable frequency range in Hz.
    pub fn scan_range(mut self, min_hz: f32, max_hz: f32) -> Self {
        self.min_hz = min_hz;
        self.max_hz = max_hz;
        self
    }

    /// Set the steady-state agreement threshold in Hz.
    pub fn steady_threshold(mut self, hz: f32) -> Self {
        self.steady_threshold = hz;
        self
    }

    /// Set the note-match epsilon in Hz.
    pub fn note_epsilon(mut self, hz: f32) -> Self {
        self.note_epsilon = hz;
        self
    }

    /// Finalize and create the detector.
    ///
    /// Fails with [`DetectorError::Configuration`] when the power is out of
    /// range, the sample rate is zero, or the scan range does not map to a
    /// non-empty window of spectrum bins for the configured block length.
    pub fn build(self) -> Result<PitchDetector, DetectorError> {
        let transform = SpectralTransform::new(self.power)?;
        let block_len = transform.size();

        if self.sample_rate == 0 {
            return Err(DetectorError::Configuration(
                "sample_rate cannot be zero".into(),
            ));
        }
        if self.min_hz.is_nan() || self.min_hz < 0.0 || self.min_hz >= self.max_hz {
            return Err(DetectorError::Configuration(format!(
                "invalid scan range {}..{} Hz",
                self.min_hz, self.max_hz
            )));
        }

        // Convert the frequency range into spectrum indices to scan.
        let resolution = self.sample_rate as f32 / block_len as f32;
        let min_idx = (self.min_hz / resolution) as usize;
        let max_idx = (self.max_hz / resolution) as usize;

        if max_idx > block_len / 2 {
            return Err(DetectorError::Configuration(format!(
                "scan range {}..{} Hz exceeds the Nyquist bin for {block_len}-sample blocks at {} Hz",
                self.min_hz, self.max_hz, self.sample_rate
            )));
        }
        if min_idx >= max_idx {
            return Err(DetectorError::Configuration(format!(
                "scan range {}..{} Hz is empty at a resolution of {resolution} Hz per bin",
                self.min_hz, self.max_hz
            )));
        }

        Ok(PitchDetector {
            real: vec![0.0; block_len],
            imag: vec![0.0; block_len],
            transform,
            resolver: NoteResolver::with_epsilon(self.note_epsilon),
            sample_rate: self.sample_rate,
            min_idx,
            max_idx,
            steady_threshold: self.steady_threshold,
        })
    }
}

impl Default for PitchDetectorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Monophonic pitch detector using the harmonic product spectrum.
pub struct PitchDetector {
    transform: SpectralTransform,
    resolver: NoteResolver,
    sample_rate: u32,
    min_idx: usize,
    max_idx: usize,
    steady_threshold: f32,
    real: Vec<f32>,
    imag: Vec<f32>,
}

impl PitchDetector {
    /// Return a builder to customize the detector.
    pub fn builder() -> PitchDetectorBuilder {
        PitchDetectorBuilder::new()
    }

    /// The block length this detector expects, `2^power` samples.
    pub fn block_len(&self) -> usize {
        self.transform.size()
    }

    /// One capture-and-transform pass over a single block.
    ///
    /// Computes the magnitude spectrum, its 2x and 3x downsampled copies, and
    /// the harmonic product maximum inside the scan window. Returns the
    /// estimated fundamental in Hz together with the block's magnitude
    /// spectrum.
    pub fn analyze_block(&mut self, samples: &[f32]) -> Result<(f32, Vec<f32>), DetectorError> {
        self.transform
            .populate(&mut self.real, &mut self.imag, samples)?;
        self.transform.transform(&mut self.real, &mut self.imag, false)?;
        let spectrum = self.transform.magnitude_spectrum(&self.real, &self.imag)?;

        let times2 = transform::downsample(&spectrum, 2)?;
        let times3 = transform::downsample(&spectrum, 3)?;
        let fundamental = self.hps_fundamental(&spectrum, &times2, &times3);

        let frequency =
            transform::bin_to_frequency(self.sample_rate, self.transform.size(), fundamental);
        Ok((frequency, spectrum))
    }

    /// Run one full detection cycle over two consecutively captured blocks.
    ///
    /// Returns `Ok(None)` when the two estimates disagree by at least the
    /// steady-state threshold; the unsteady cycle is discarded without
    /// output.
    pub fn process_pair(
        &mut self,
        first: &[f32],
        second: &[f32],
    ) -> Result<Option<DetectionResult>, DetectorError> {
        let (freq_a, _) = self.analyze_block(first)?;
        let (freq_b, spectrum) = self.analyze_block(second)?;

        let Some(frequency) = self.steady_average(freq_a, freq_b) else {
            return Ok(None);
        };

        let note_name = self.resolver.find_note(frequency)?;
        let tuning = self.resolver.tuning_direction(note_name, frequency)?;
        Ok(Some(DetectionResult {
            note_name,
            frequency_hz: frequency,
            spectrum,
            tuning,
        }))
    }

    /// Repeating detection loop.
    ///
    /// Polls `token` between cycles, retrieves block pairs from `buffer`, and
    /// hands every accepted [`DetectionResult`] to `on_detection`. A block
    /// whose length does not match the detector aborts only the current
    /// cycle. Returns once the token is cancelled, including while blocked
    /// inside a buffer wait.
    pub fn run<F>(
        &mut self,
        buffer: &SampleBuffer,
        token: &CancellationToken,
        mut on_detection: F,
    ) -> Result<(), DetectorError>
    where
        F: FnMut(DetectionResult),
    {
        while !token.is_cancelled() {
            let Ok(first) = buffer.remove() else { break };
            let Ok(second) = buffer.remove() else { break };

            match self.process_pair(&first, &second) {
                Ok(Some(result)) => on_detection(result),
                Ok(None) => log::debug!("discarded unsteady detection cycle"),
                Err(DetectorError::Transform(TransformError::InvalidLength {
                    expected,
                    got,
                })) => {
                    log::warn!("skipping malformed block: expected {expected} samples, got {got}");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    /// Index of the harmonic product maximum inside `[min_idx, max_idx)`.
    fn hps_fundamental(&self, spectrum: &[f32], times2: &[f32], times3: &[f32]) -> usize {
        let mut best_idx = self.min_idx;
        let mut best = f32::NEG_INFINITY;
        for i in self.min_idx..self.max_idx {
            let product = spectrum[i] * times2[i] * times3[i];
            if product > best {
                best = product;
                best_idx = i;
            }
        }
        best_idx
    }

    /// Steady-state filter: the averaged frequency when the two estimates
    /// agree within the threshold, `None` otherwise.
    fn steady_average(&self, first: f32, second: f32) -> Option<f32> {
        if (second - first).abs() < self.steady_threshold {
            Some((first + second) / 2.0)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::TAU;

    /// A block whose fundamental sits exactly on `bin`, with energy at the
    /// second and third harmonics so the harmonic product reinforces it.
    fn harmonic_block(len: usize, bin: usize) -> Vec<f32> {
        (0..len)
            .map(|i| {
                let phase = TAU * bin as f32 * i as f32 / len as f32;
                phase.sin() + 0.6 * (2.0 * phase).sin() + 0.4 * (3.0 * phase).sin()
            })
            .collect()
    }

    #[test]
    fn steady_pair_is_averaged() {
        let detector = PitchDetector::builder().build().unwrap();
        assert_eq!(detector.steady_average(440.0, 445.0), Some(442.5));
    }

    #[test]
    fn unsteady_pair_is_discarded() {
        let detector = PitchDetector::builder().build().unwrap();
        assert_eq!(detector.steady_average(440.0, 465.0), None);
    }

    #[test]
    fn analyze_block_finds_an_exact_bin_fundamental() {
        let mut detector = PitchDetector::builder().build().unwrap();
        // Bin 128 of a 4096-sample block at 8000 Hz is exactly 250 Hz.
        let block = harmonic_block(detector.block_len(), 128);

        let (frequency, spectrum) = detector.analyze_block(&block).unwrap();
        assert!((frequency - 250.0).abs() < 1e-3, "got {frequency}");
        assert_eq!(spectrum.len(), detector.block_len() / 2);
    }

    #[test]
    fn process_pair_resolves_note_and_direction() {
        let mut detector = PitchDetector::builder().build().unwrap();
        let block = harmonic_block(detector.block_len(), 128);

        let result = detector.process_pair(&block, &block).unwrap().unwrap();
        // 250 Hz sits nearest B3 (246.94 Hz), more than 1 Hz above it.
        assert_eq!(result.note_name, "B3");
        assert!((result.frequency_hz - 250.0).abs() < 1e-3);
        assert_eq!(result.tuning, TuningDirection::Sharp);
        assert_eq!(result.spectrum.len(), detector.block_len() / 2);
    }

    #[test]
    fn process_pair_discards_disagreeing_blocks() {
        let mut detector = PitchDetector::builder().build().unwrap();
        let low = harmonic_block(detector.block_len(), 128);
        let high = harmonic_block(detector.block_len(), 200);

        assert!(detector.process_pair(&low, &high).unwrap().is_none());
    }

    #[test]
    fn analyze_block_rejects_wrong_length() {
        let mut detector = PitchDetector::builder().build().unwrap();
        let short = vec![0.0; detector.block_len() - 1];
        assert!(matches!(
            detector.analyze_block(&short),
            Err(DetectorError::Transform(TransformError::InvalidLength { .. }))
        ));
    }

    #[test]
    fn build_rejects_oversized_power() {
        assert!(matches!(
            PitchDetector::builder().power(16).build(),
            Err(DetectorError::Transform(TransformError::Configuration(_)))
        ));
    }

    #[test]
    fn build_rejects_zero_sample_rate() {
        assert!(matches!(
            PitchDetector::builder().sample_rate(0).build(),
            Err(DetectorError::Configuration(_))
        ));
    }

    #[test]
    fn build_rejects_scan_range_above_nyquist() {
        assert!(matches!(
            PitchDetector::builder().scan_range(50.0, 5000.0).build(),
            Err(DetectorError::Configuration(_))
        ));
    }

    #[test]
    fn build_rejects_window_too_coarse_for_block() {
        // At 2^2 = 4 samples and 8000 Hz the bins are 2000 Hz wide, so the
        // default 50..990 Hz range maps to an empty index window.
        assert!(matches!(
            PitchDetector::builder().power(2).build(),
            Err(DetectorError::Configuration(_))
        ));
    }

    #[test]
    fn build_rejects_inverted_scan_range() {
        assert!(matches!(
            PitchDetector::builder().scan_range(990.0, 50.0).build(),
            Err(DetectorError::Configuration(_))
        ));
    }
}
