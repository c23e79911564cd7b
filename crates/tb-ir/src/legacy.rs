//! Load-time migration of older instrument records.
//!
//! Importers hand over a [`LegacyInstrument`] tagged with the format
//! version it came from. [`migrate`] turns it into a canonical
//! [`Instrument`] and reports every value it had to correct.

use alloc::string::String;
use alloc::vec::Vec;

use crate::automation::AutomationTarget;
use crate::envelope::{EnvelopeSettings, EnvelopeShape, LfoWaveform};
use crate::filter::FilterSettings;
use crate::instrument::{Instrument, InstrumentKind, InstrumentType, Operator};

/// Format generation a record was written by.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FormatVersion {
    /// Cutoff/resonance low-pass filter with a single filter envelope.
    BeepBox2,
    /// Control-point note filters, preset envelopes with baked-in speeds.
    BeepBox3,
    /// Fractional legacy filter values driven by mod channels.
    JummBox,
    /// Current layout.
    #[default]
    UltraBox,
}

/// An envelope as stored by older formats: a preset name such as `"twang 2"`.
#[derive(Clone, Debug, PartialEq)]
pub struct LegacyEnvelope {
    pub target: AutomationTarget,
    pub index: u8,
    pub preset: String,
}

/// Cutoff/resonance filter of the oldest formats.
#[derive(Clone, Debug, PartialEq)]
pub struct LegacyFilter {
    pub cutoff: f64,
    pub resonance: f64,
    /// Preset name of the filter envelope.
    pub envelope: String,
}

/// A loosely typed instrument record.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LegacyInstrument {
    pub version: FormatVersion,
    pub type_name: String,
    pub volume: i32,
    pub legacy_filter: Option<LegacyFilter>,
    pub note_filter: Option<FilterSettings>,
    pub legacy_envelopes: Vec<LegacyEnvelope>,
    /// Envelopes already in the current layout.
    pub envelopes: Vec<EnvelopeSettings>,
    /// FM operators. Short lists are padded with defaults.
    pub operators: Vec<Operator>,
}

/// A value the migration had to change.
#[derive(Clone, Debug, PartialEq)]
pub enum Correction {
    UnknownInstrumentType(String),
    UnknownEnvelopePreset(String),
    CrossedBounds { slot: usize },
    CrossedPitchRange { slot: usize },
    PaddedOperators { found: usize },
    DroppedEnvelope { slot: usize },
}

/// Result of [`migrate`].
#[derive(Clone, Debug, PartialEq)]
pub struct Migration {
    pub instrument: Instrument,
    pub corrections: Vec<Correction>,
}

/// Instrument type for a stored type name. Matching ignores ASCII case.
pub fn instrument_type_from_name(name: &str) -> Option<InstrumentType> {
    InstrumentType::ALL.into_iter().find(|t| t.name().eq_ignore_ascii_case(name))
}

/// Shape and per-envelope speed of a legacy envelope preset.
pub fn envelope_preset(name: &str) -> Option<(EnvelopeShape, f64)> {
    let numbered = |base: &str| -> Option<usize> {
        let rest = name.strip_prefix(base)?.trim_start();
        match rest {
            "1" => Some(0),
            "2" => Some(1),
            "3" => Some(2),
            "4" => Some(3),
            "5" => Some(4),
            "6" => Some(5),
            _ => None,
        }
    };
    let pick = |speeds: [f64; 3], i: usize| speeds.get(i).copied();

    let preset = match name {
        "steady" | "none" => (EnvelopeShape::None, 1.0),
        "punch" => (EnvelopeShape::Punch, 1.0),
        "note size" | "custom" => (EnvelopeShape::NoteSize, 1.0),
        "pitch" => (EnvelopeShape::Pitch, 1.0),
        _ => {
            const FAST_MEDIUM_SLOW: [f64; 3] = [32.0, 8.0, 2.0];
            if let Some(i) = numbered("tremolo") {
                // Tremolos 4 to 6 were the half-depth variants.
                return if i < 3 {
                    Some((EnvelopeShape::Lfo(LfoWaveform::Sine), pick([4.0, 2.0, 1.0], i)?))
                } else {
                    Some((EnvelopeShape::Tremolo2, pick([4.0, 2.0, 1.0], i - 3)?))
                };
            }
            let table: [(&str, EnvelopeShape, [f64; 3]); 8] = [
                ("flare", EnvelopeShape::Flare, FAST_MEDIUM_SLOW),
                ("twang", EnvelopeShape::Twang, FAST_MEDIUM_SLOW),
                ("swell", EnvelopeShape::Swell, FAST_MEDIUM_SLOW),
                ("decay", EnvelopeShape::Decay, [10.0, 7.0, 4.0]),
                ("wibble", EnvelopeShape::Wibble, [96.0, 24.0, 12.0]),
                ("linear", EnvelopeShape::Linear, FAST_MEDIUM_SLOW),
                ("rise", EnvelopeShape::Rise, FAST_MEDIUM_SLOW),
                ("blip", EnvelopeShape::Blip, [6.0, 16.0, 32.0]),
            ];
            return table
                .iter()
                .find_map(|(base, shape, speeds)| Some((*shape, pick(*speeds, numbered(*base)?)?)));
        }
    };
    Some(preset)
}

/// Turn a legacy record into a canonical instrument.
pub fn migrate(record: &LegacyInstrument, noise_channel: bool) -> Migration {
    let mut corrections = Vec::new();
    let ty = instrument_type_from_name(&record.type_name).unwrap_or_else(|| {
        corrections.push(Correction::UnknownInstrumentType(record.type_name.clone()));
        if noise_channel { InstrumentType::Noise } else { InstrumentType::Chip }
    });
    let mut instrument = Instrument::of_type(ty, noise_channel);
    instrument.volume = record.volume;

    migrate_operators(&mut instrument.kind, &record.operators, &mut corrections);

    if let Some(filter) = &record.note_filter {
        instrument.note_filter = filter.clone();
    } else if let Some(legacy) = &record.legacy_filter {
        let preset = envelope_preset(&legacy.envelope).unwrap_or_else(|| {
            corrections.push(Correction::UnknownEnvelopePreset(legacy.envelope.clone()));
            (EnvelopeShape::None, 1.0)
        });
        if record.version == FormatVersion::JummBox {
            instrument.note_filter.convert_legacy_settings_for_synth(legacy.cutoff, legacy.resonance, true);
        } else {
            let cutoff = libm::round(legacy.cutoff).clamp(0.0, u8::MAX as f64) as u8;
            let resonance = libm::round(legacy.resonance).clamp(0.0, u8::MAX as f64) as u8;
            instrument.note_filter.convert_legacy_settings(cutoff, resonance, preset.0);
        }
        if preset.0 != EnvelopeShape::None {
            push_envelope(
                &mut instrument,
                EnvelopeSettings::new(AutomationTarget::NoteFilterAllFreqs, 0, preset.0).with_speed(preset.1),
                &mut corrections,
            );
        }
    }

    for legacy in &record.legacy_envelopes {
        match envelope_preset(&legacy.preset) {
            Some((shape, speed)) => push_envelope(
                &mut instrument,
                EnvelopeSettings::new(legacy.target, legacy.index, shape).with_speed(speed),
                &mut corrections,
            ),
            None => corrections.push(Correction::UnknownEnvelopePreset(legacy.preset.clone())),
        }
    }

    let (low, high) = instrument.warmest_freq_pitch_range();
    for (slot, envelope) in record.envelopes.iter().enumerate() {
        let mut envelope = *envelope;
        if envelope.lower_bound > envelope.upper_bound {
            corrections.push(Correction::CrossedBounds { slot });
        }
        if envelope.pitch_start > envelope.pitch_end {
            corrections.push(Correction::CrossedPitchRange { slot });
            envelope.pitch_start = low;
            envelope.pitch_end = high;
        }
        push_envelope(&mut instrument, envelope, &mut corrections);
    }

    Migration { instrument, corrections }
}

fn push_envelope(instrument: &mut Instrument, envelope: EnvelopeSettings, corrections: &mut Vec<Correction>) {
    let slot = instrument.envelope_count();
    if !instrument.add_envelope(envelope) {
        corrections.push(Correction::DroppedEnvelope { slot });
    }
}

fn migrate_operators(kind: &mut InstrumentKind, stored: &[Operator], corrections: &mut Vec<Correction>) {
    let operators: &mut [Operator] = match kind {
        InstrumentKind::Fm { operators, .. } => operators,
        InstrumentKind::Fm6Op { operators, .. } => operators,
        _ => return,
    };
    if stored.is_empty() {
        return;
    }
    if stored.len() < operators.len() {
        corrections.push(Correction::PaddedOperators { found: stored.len() });
    }
    for (i, op) in operators.iter_mut().enumerate() {
        *op = stored.get(i).copied().unwrap_or(Operator::reset(i));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;
    use alloc::vec;

    #[test]
    fn numbered_presets_carry_their_speeds() {
        assert_eq!(envelope_preset("twang 1"), Some((EnvelopeShape::Twang, 32.0)));
        assert_eq!(envelope_preset("decay 3"), Some((EnvelopeShape::Decay, 4.0)));
        assert_eq!(envelope_preset("blip 2"), Some((EnvelopeShape::Blip, 16.0)));
        assert_eq!(envelope_preset("wibble 1"), Some((EnvelopeShape::Wibble, 96.0)));
        assert_eq!(envelope_preset("tremolo2"), Some((EnvelopeShape::Lfo(LfoWaveform::Sine), 2.0)));
        assert_eq!(envelope_preset("tremolo5"), Some((EnvelopeShape::Tremolo2, 2.0)));
        assert_eq!(envelope_preset("steady"), Some((EnvelopeShape::None, 1.0)));
        assert_eq!(envelope_preset("punch"), Some((EnvelopeShape::Punch, 1.0)));
        assert_eq!(envelope_preset("flare 4"), None);
        assert_eq!(envelope_preset("mystery"), None);
    }

    #[test]
    fn type_names_ignore_case() {
        assert_eq!(instrument_type_from_name("fm"), Some(InstrumentType::Fm));
        assert_eq!(instrument_type_from_name("picked string"), Some(InstrumentType::PickedString));
        assert_eq!(instrument_type_from_name("theremin"), None);
    }

    #[test]
    fn unknown_type_falls_back_by_channel() {
        let record = LegacyInstrument { type_name: "theremin".to_string(), ..Default::default() };
        let pitched = migrate(&record, false);
        assert_eq!(pitched.instrument.instrument_type(), InstrumentType::Chip);
        assert_eq!(pitched.corrections, vec![Correction::UnknownInstrumentType("theremin".to_string())]);
        let noisy = migrate(&record, true);
        assert_eq!(noisy.instrument.instrument_type(), InstrumentType::Noise);
    }

    #[test]
    fn legacy_filter_envelope_becomes_a_slot() {
        let record = LegacyInstrument {
            version: FormatVersion::BeepBox2,
            type_name: "chip".to_string(),
            legacy_filter: Some(LegacyFilter { cutoff: 5.0, resonance: 3.0, envelope: "decay 2".to_string() }),
            ..Default::default()
        };
        let m = migrate(&record, false);
        assert_eq!(m.instrument.note_filter.len(), 1);
        let slot = m.instrument.envelopes[0];
        assert_eq!(slot.target, AutomationTarget::NoteFilterAllFreqs);
        assert_eq!(slot.shape, EnvelopeShape::Decay);
        assert_eq!(slot.speed, 7.0);
    }

    #[test]
    fn steady_filter_adds_no_slot() {
        let record = LegacyInstrument {
            version: FormatVersion::BeepBox3,
            type_name: "chip".to_string(),
            legacy_filter: Some(LegacyFilter { cutoff: 6.0, resonance: 0.0, envelope: "steady".to_string() }),
            ..Default::default()
        };
        let m = migrate(&record, false);
        assert_eq!(m.instrument.envelope_count(), 0);
        assert!(m.corrections.is_empty());
    }

    #[test]
    fn crossed_ranges_are_reset() {
        let mut envelope = EnvelopeSettings::new(AutomationTarget::NoteVolume, 0, EnvelopeShape::Pitch);
        envelope.lower_bound = 0.9;
        envelope.upper_bound = 0.1;
        envelope.pitch_start = 80;
        envelope.pitch_end = 20;
        let record =
            LegacyInstrument { type_name: "chip".to_string(), envelopes: vec![envelope], ..Default::default() };
        let m = migrate(&record, false);
        let slot = m.instrument.envelopes[0];
        assert_eq!((slot.lower_bound, slot.upper_bound), (0.0, 1.0));
        assert_eq!((slot.pitch_start, slot.pitch_end), m.instrument.warmest_freq_pitch_range());
        assert_eq!(
            m.corrections,
            vec![Correction::CrossedBounds { slot: 0 }, Correction::CrossedPitchRange { slot: 0 }]
        );
    }

    #[test]
    fn short_operator_lists_are_padded() {
        let stored = vec![Operator { frequency: 6, amplitude: 9 }; 2];
        let record = LegacyInstrument { type_name: "FM6op".to_string(), operators: stored, ..Default::default() };
        let m = migrate(&record, false);
        match m.instrument.kind {
            InstrumentKind::Fm6Op { operators, .. } => {
                assert_eq!(operators[1].amplitude, 9);
                assert_eq!(operators[5], Operator::reset(5));
            }
            ref other => panic!("expected FM6op, got {:?}", other),
        }
        assert_eq!(m.corrections, vec![Correction::PaddedOperators { found: 2 }]);
    }
}
