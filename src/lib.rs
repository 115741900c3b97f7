//! # hps_tuner
//!
//! Real-time monophonic pitch detection: fixed-size FFT analysis, a harmonic
//! product spectrum (HPS) fundamental search, a steady-state agreement
//! filter, and resolution to the nearest musical note in C3-B5.
//!
//! The crate is the computational core of a tuner. An external capture
//! collaborator feeds fixed-length PCM blocks into a [`SampleBuffer`]; the
//! [`PitchDetector`] consumes block pairs, and every accepted cycle yields a
//! [`DetectionResult`] for an external renderer.
//!
//! ## Example
//! ```rust
//! use hps_tuner::{CancellationToken, PitchDetector, SampleBuffer};
//! use std::sync::Arc;
//!
//! fn run() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut detector = PitchDetector::builder()
//!         .power(12)
//!         .sample_rate(8_000)
//!         .build()?;
//!
//!     let token = CancellationToken::new();
//!     let buffer = Arc::new(SampleBuffer::new(detector.block_len(), token.clone()));
//!
//!     // Producer side, normally driven by an audio capture callback:
//!     let capture = Arc::clone(&buffer);
//!     let producer = std::thread::spawn(move || {
//!         let block = vec![0.0f32; capture.block_len()];
//!         while capture.insert(&block).is_ok() {}
//!     });
//!
//!     token.cancel(); // normally issued on shutdown
//!     detector.run(&buffer, &token, |detection| {
//!         println!(
//!             "{} at {:.1} Hz ({:?})",
//!             detection.note_name, detection.frequency_hz, detection.tuning
//!         );
//!     })?;
//!
//!     producer.join().unwrap();
//!     Ok(())
//! }
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rust_2018_idioms)]
#![deny(clippy::all)]

/// Note lookup and flat/in-tune/sharp classification.
pub use note_resolver::{NoteError, NoteResolver, TuningDirection};

/// HPS detection pipeline.
pub use pitch_detector::{DetectionResult, DetectorError, PitchDetector, PitchDetectorBuilder};

/// Producer/consumer handoff and cooperative shutdown.
pub use sample_buffer::{BufferError, CancellationToken, SampleBuffer};

/// Fixed-size FFT engine and spectrum helpers.
pub use transform::{bin_to_frequency, downsample, SpectralTransform, TransformError, MAX_POWER};

/// Musical note resolution module.
pub mod note_resolver;

/// Pitch detection module.
pub mod pitch_detector;

/// Sample handoff module.
pub mod sample_buffer;

/// Spectral transform module.
pub mod transform;
