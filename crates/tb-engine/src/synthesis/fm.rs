//! FM operator network.
//!
//! Operators are numbered so modulators always sit after the operators they
//! feed, so evaluating from the last operator to the first gives every
//! carrier its modulators' output for the same sample. Feedback reads the
//! previous sample's outputs.

use tb_ir::config::{Algorithm, Feedback};

use crate::tone::Tone;
use crate::wave_tables::WaveTables;

/// Scale from a modulator's amplitude curve to phase offset in cycles.
pub(crate) const MODULATOR_DEPTH: f64 = 1.5;
/// Scale from the feedback amplitude curve to phase offset in cycles.
pub(crate) const FEEDBACK_DEPTH: f64 = 0.3;

pub(crate) fn render_fm(
    tone: &mut Tone,
    algorithm: &Algorithm,
    feedback: &Feedback,
    operator_count: usize,
    tables: &WaveTables,
    out: &mut [f32],
) {
    let count = operator_count.min(algorithm.modulated_by.len());
    let carriers = algorithm.carrier_count.min(count);
    for sample in out.iter_mut() {
        for op in (0..count).rev() {
            let mut modulation = 0.0;
            for &source in algorithm.modulated_by[op] {
                modulation += tone.operator_outputs[source as usize - 1];
            }
            if let Some(sources) = feedback.indices.get(op) {
                for &source in sources.iter() {
                    modulation += tone.operator_outputs[source as usize - 1] * tone.feedback_mult;
                }
            }
            tone.operator_outputs[op] = tables.sine(tone.phases[op] + modulation) * tone.operator_expressions[op];
        }

        let value: f64 = tone.operator_outputs[..carriers].iter().sum();
        for op in 0..count {
            tone.phases[op] += tone.phase_deltas[op];
            tone.operator_expressions[op] += tone.operator_expression_deltas[op];
        }
        tone.feedback_mult += tone.feedback_delta;
        tone.scale_phase_deltas(count);
        *sample += tone.finish_sample(value);
    }
}
