//! Spectral Transform
//!
//! Iterative power-of-two FFT engine with bit-reversal precomputation,
//! magnitude-spectrum extraction and the spectrum helpers used by the
//! harmonic product spectrum pipeline.

use std::f32::consts::PI;
use thiserror::Error;

const TWO_PI: f32 = 2.0 * PI;

/// Largest supported FFT size exponent (2^15 = 32768 samples).
pub const MAX_POWER: u32 = 15;

/// Errors returned by the spectral transform engine.
#[derive(Debug, Error)]
pub enum TransformError {
    /// An error occurred during the configuration of the engine.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A slice passed to the engine was not of the expected size.
    #[error("expected arrays of length {expected}, got {got}")]
    InvalidLength {
        /// The length the engine was configured for.
        expected: usize,
        /// The actual length of the received slice.
        got: usize,
    },
}

/// Fixed-size iterative FFT engine.
///
/// An instance is bound to a single transform size `2^power` for its whole
/// lifetime; the bit-reversal permutation is computed once at construction.
pub struct SpectralTransform {
    power: u32,
    size: usize,
    bitreverse: Vec<usize>,
}

impl SpectralTransform {
    /// Create an engine for transforms of `2^power` samples.
    ///
    /// Returns `TransformError::Configuration` when `power` exceeds
    /// [`MAX_POWER`].
    pub fn new(power: u32) -> Result<Self, TransformError> {
        if power > MAX_POWER {
            return Err(TransformError::Configuration(format!(
                "power {power} is too big, maximum is {MAX_POWER}"
            )));
        }

        let size = 1usize << power;
        let mut bitreverse = vec![0usize; size];
        for (i, slot) in bitreverse.iter_mut().enumerate() {
            let mut rev = 0usize;
            for bit in 0..power {
                rev <<= 1;
                rev |= (i >> bit) & 1;
            }
            *slot = rev;
        }

        Ok(SpectralTransform {
            power,
            size,
            bitreverse,
        })
    }

    /// The transform size `2^power`.
    pub fn size(&self) -> usize {
        self.size
    }

    /// The configured size exponent.
    pub fn power(&self) -> u32 {
        self.power
    }

    /// In-place decimation-in-time FFT over `real`/`imag`.
    ///
    /// Runs `power` butterfly stages followed by the bit-reversal swap that
    /// restores natural ordering. The forward transform (`inverse == false`)
    /// scales every output by `1/N`; the inverse transform applies no scale,
    /// so a forward-then-inverse pass reproduces the input.
    pub fn transform(
        &self,
        real: &mut [f32],
        imag: &mut [f32],
        inverse: bool,
    ) -> Result<(), TransformError> {
        self.check_len(real.len())?;
        self.check_len(imag.len())?;

        let n = self.size;
        let mut half = n / 2;

        for _ in 0..self.power {
            let mut k = 0;
            while k < n {
                for _ in 0..half {
                    let angle = TWO_PI * self.bitreverse[k / half] as f32 / n as f32;
                    let c = angle.cos();
                    let mut s = angle.sin();
                    if inverse {
                        s = -s;
                    }

                    let upper = k + half;
                    let tr = real[upper] * c + imag[upper] * s;
                    let ti = imag[upper] * c - real[upper] * s;
                    real[upper] = real[k] - tr;
                    imag[upper] = imag[k] - ti;
                    real[k] += tr;
                    imag[k] += ti;
                    k += 1;
                }
                k += half;
            }
            half /= 2;
        }

        for (k, &j) in self.bitreverse.iter().enumerate() {
            if j > k {
                real.swap(k, j);
                imag.swap(k, j);
            }
        }

        if !inverse {
            let scale = 1.0 / n as f32;
            for v in real.iter_mut() {
                *v *= scale;
            }
            for v in imag.iter_mut() {
                *v *= scale;
            }
        }

        Ok(())
    }

    /// Magnitude spectrum `sqrt(re^2 + im^2)` of the first `N/2` bins.
    ///
    /// Bins above the Nyquist limit mirror the lower half and carry no extra
    /// information, so the result length is always half the transform size.
    pub fn magnitude_spectrum(
        &self,
        real: &[f32],
        imag: &[f32],
    ) -> Result<Vec<f32>, TransformError> {
        self.check_len(real.len())?;
        self.check_len(imag.len())?;

        Ok(real
            .iter()
            .zip(imag)
            .take(self.size / 2)
            .map(|(re, im)| (re * re + im * im).sqrt())
            .collect())
    }

    /// Load `samples` into `real` and zero `imag`.
    pub fn populate(
        &self,
        real: &mut [f32],
        imag: &mut [f32],
        samples: &[f32],
    ) -> Result<(), TransformError> {
        self.check_len(real.len())?;
        self.check_len(imag.len())?;
        self.check_len(samples.len())?;

        real.copy_from_slice(samples);
        imag.fill(0.0);
        Ok(())
    }

    fn check_len(&self, len: usize) -> Result<(), TransformError> {
        if len == self.size {
            Ok(())
        } else {
            Err(TransformError::InvalidLength {
                expected: self.size,
                got: len,
            })
        }
    }
}

/// Convert an FFT bin index to its center frequency in Hz.
pub fn bin_to_frequency(sample_rate: u32, num_bins: usize, index: usize) -> f32 {
    index as f32 * sample_rate as f32 / num_bins as f32
}

/// Downsample a magnitude spectrum by an integer factor.
///
/// The first `len / factor` bins hold the average of `factor` consecutive
/// original bins; every remaining bin is set to the neutral value `1.0` so a
/// later elementwise product is unaffected outside the populated region.
///
/// Returns `TransformError::Configuration` when `factor` is zero.
pub fn downsample(spectrum: &[f32], factor: usize) -> Result<Vec<f32>, TransformError> {
    if factor == 0 {
        return Err(TransformError::Configuration(
            "downsample factor must be > 0".into(),
        ));
    }

    let kept = spectrum.len() / factor;
    let mut out = vec![1.0f32; spectrum.len()];
    for (i, bin) in out[..kept].iter_mut().enumerate() {
        let start = i * factor;
        let sum: f32 = spectrum[start..start + factor].iter().sum();
        *bin = sum / factor as f32;
    }
    Ok(out)
}
