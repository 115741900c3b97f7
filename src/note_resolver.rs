//! Note Resolver
//!
//! Maps detected frequencies to the nearest musical note in the C3-B5 range
//! and classifies the result as flat, in tune, or sharp.

use thiserror::Error;

/// Equal-tempered note table spanning C3-B5, strictly ascending by frequency.
const NOTE_TABLE: [(&str, f32); 36] = [
    ("C3", 130.81),
    ("C#3", 138.59),
    ("D3", 146.83),
    ("D#3", 155.56),
    ("E3", 164.81),
    ("F3", 174.61),
    ("F#3", 185.0),
    ("G3", 196.0),
    ("G#3", 207.65),
    ("A3", 220.0),
    ("A#3", 233.08),
    ("B3", 246.94),
    ("C4", 261.63),
    ("C#4", 277.18),
    ("D4", 293.66),
    ("D#4", 311.13),
    ("E4", 329.63),
    ("F4", 349.23),
    ("F#4", 369.99),
    ("G4", 392.0),
    ("G#4", 415.3),
    ("A4", 440.0),
    ("A#4", 466.16),
    ("B4", 493.88),
    ("C5", 523.25),
    ("C#5", 554.37),
    ("D5", 587.33),
    ("D#5", 622.25),
    ("E5", 659.26),
    ("F5", 698.46),
    ("F#5", 739.99),
    ("G5", 783.99),
    ("G#5", 830.61),
    ("A5", 880.0),
    ("A#5", 932.33),
    ("B5", 987.77),
];

/// How a detected frequency relates to its nearest note.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TuningDirection {
    /// Below the note's reference frequency.
    Flat,
    /// Within the match epsilon of the reference frequency.
    InTune,
    /// Above the note's reference frequency.
    Sharp,
}

/// Errors returned by the note resolver.
#[derive(Debug, Error)]
pub enum NoteError {
    /// An invalid argument was provided to a resolver function.
    #[error("invalid argument `{arg}`: {msg}")]
    InvalidArgument {
        /// The name of the invalid argument.
        arg: &'static str,
        /// A description of the invalid argument.
        msg: String,
    },
}

/// Resolves frequencies against the static C3-B5 note table.
///
/// The table is immutable for the process lifetime and safe for concurrent
/// reads; the resolver itself only carries the note-match epsilon.
pub struct NoteResolver {
    epsilon: f32,
}

impl NoteResolver {
    /// Create a resolver with the default 1.0 Hz match epsilon.
    pub fn new() -> Self {
        Self::with_epsilon(1.0)
    }

    /// Create a resolver with a custom match epsilon in Hz.
    pub fn with_epsilon(epsilon: f32) -> Self {
        NoteResolver { epsilon }
    }

    /// Find the name of the note nearest to `frequency`.
    ///
    /// Frequencies outside the table clamp to the bottom or top entry.
    /// Returns [`NoteError::InvalidArgument`] for negative or NaN input.
    pub fn find_note(&self, frequency: f32) -> Result<&'static str, NoteError> {
        check_frequency(frequency)?;

        let idx = NOTE_TABLE.partition_point(|&(_, f)| f < frequency);
        if idx == 0 {
            return Ok(NOTE_TABLE[0].0);
        }
        if idx == NOTE_TABLE.len() {
            return Ok(NOTE_TABLE[NOTE_TABLE.len() - 1].0);
        }

        let (below_name, below_freq) = NOTE_TABLE[idx - 1];
        let (above_name, above_freq) = NOTE_TABLE[idx];
        if (above_freq - frequency).abs() < (frequency - below_freq).abs() {
            Ok(above_name)
        } else {
            Ok(below_name)
        }
    }

    /// Classify `frequency` against the reference pitch of `note_name`.
    ///
    /// The lookup is case-insensitive. Returns
    /// [`NoteError::InvalidArgument`] for a name outside C3-B5 or a negative
    /// or NaN frequency.
    pub fn tuning_direction(
        &self,
        note_name: &str,
        frequency: f32,
    ) -> Result<TuningDirection, NoteError> {
        check_frequency(frequency)?;

        let (_, reference) = NOTE_TABLE
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(note_name))
            .ok_or_else(|| NoteError::InvalidArgument {
                arg: "note_name",
                msg: format!("`{note_name}` is not in the range C3-B5"),
            })?;

        let delta = frequency - reference;
        if delta.abs() < self.epsilon {
            Ok(TuningDirection::InTune)
        } else if delta < 0.0 {
            Ok(TuningDirection::Flat)
        } else {
            Ok(TuningDirection::Sharp)
        }
    }
}

impl Default for NoteResolver {
    fn default() -> Self {
        Self::new()
    }
}

fn check_frequency(frequency: f32) -> Result<(), NoteError> {
    if frequency.is_nan() || frequency < 0.0 {
        return Err(NoteError::InvalidArgument {
            arg: "frequency",
            msg: format!("must be >= 0, got {frequency}"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn note_table_is_strictly_ascending() {
        for pair in NOTE_TABLE.windows(2) {
            assert!(pair[0].1 < pair[1].1);
        }
    }

    #[test]
    fn finds_nearest_note() {
        let resolver = NoteResolver::new();
        assert_eq!(resolver.find_note(441.0).unwrap(), "A4");
        assert_eq!(resolver.find_note(523.25).unwrap(), "C5");
    }

    #[test]
    fn out_of_range_frequencies_clamp_to_the_extremes() {
        let resolver = NoteResolver::new();
        assert_eq!(resolver.find_note(10_000.0).unwrap(), "B5");
        assert_eq!(resolver.find_note(0.0).unwrap(), "C3");
    }

    #[test]
    fn find_note_rejects_negative_frequency() {
        let resolver = NoteResolver::new();
        assert!(matches!(
            resolver.find_note(-1.0),
            Err(NoteError::InvalidArgument { arg: "frequency", .. })
        ));
    }

    #[test]
    fn classifies_flat_in_tune_and_sharp() {
        let resolver = NoteResolver::new();
        assert_eq!(
            resolver.tuning_direction("A4", 440.0).unwrap(),
            TuningDirection::InTune
        );
        assert_eq!(
            resolver.tuning_direction("A4", 430.0).unwrap(),
            TuningDirection::Flat
        );
        assert_eq!(
            resolver.tuning_direction("A4", 450.0).unwrap(),
            TuningDirection::Sharp
        );
    }

    #[test]
    fn note_name_lookup_is_case_insensitive() {
        let resolver = NoteResolver::new();
        assert_eq!(
            resolver.tuning_direction("f#4", 369.99).unwrap(),
            TuningDirection::InTune
        );
    }

    #[test]
    fn unknown_note_name_is_rejected() {
        let resolver = NoteResolver::new();
        assert!(matches!(
            resolver.tuning_direction("H2", 100.0),
            Err(NoteError::InvalidArgument { arg: "note_name", .. })
        ));
    }

    #[test]
    fn custom_epsilon_widens_the_in_tune_band() {
        let resolver = NoteResolver::with_epsilon(5.0);
        assert_eq!(
            resolver.tuning_direction("A4", 443.0).unwrap(),
            TuningDirection::InTune
        );
    }
}
