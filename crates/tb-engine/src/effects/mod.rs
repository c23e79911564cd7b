//! Instrument effect chain.
//!
//! Each enabled effect of an instrument gets one [`Effect`] instance. The
//! chain runs them in a fixed order over the instrument's buffer once the
//! tones have been rendered. Effects before panning see a mono signal in
//! the left buffer; panning spreads it to both sides.

mod bitcrusher;
mod chorus;
mod distortion;
mod echo;
mod eq;
mod granular;
mod panning;
mod reverb;
mod ring_mod;

pub use bitcrusher::Bitcrusher;
pub use chorus::Chorus;
pub use distortion::Distortion;
pub use echo::Echo;
pub use eq::Eq;
pub use granular::Granular;
pub use panning::Panning;
pub use reverb::Reverb;
pub use ring_mod::RingModulator;

use alloc::boxed::Box;
use alloc::vec::Vec;

use tb_ir::{EffectParams, EffectType, FilterSettings};

/// A value moving linearly across one tick.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Ramp {
    pub start: f64,
    pub end: f64,
}

impl Ramp {
    pub const fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub const fn flat(value: f64) -> Self {
        Self { start: value, end: value }
    }

    /// Per-sample step to get from `start` to `end` in `samples`.
    pub fn delta(&self, samples: usize) -> f64 {
        if samples == 0 {
            0.0
        } else {
            (self.end - self.start) / samples as f64
        }
    }

    pub fn scaled(self, start_mult: f64, end_mult: f64) -> Self {
        Self { start: self.start * start_mult, end: self.end * end_mult }
    }
}

/// Automatable effect amounts for one tick, each normalized to `0..=1`
/// after mod overrides and instrument-level envelopes.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct EffectLevels {
    pub distortion: Ramp,
    pub bitcrusher_freq: Ramp,
    pub bitcrusher_quantization: Ramp,
    pub ring_mod: Ramp,
    pub ring_mod_hz: Ramp,
    pub granular: Ramp,
    /// 0 is hard left, 0.5 center, 1 hard right.
    pub pan: Ramp,
    pub chorus: Ramp,
    pub echo_sustain: Ramp,
    pub reverb: Ramp,
}

/// Everything an effect may read when a tick starts.
#[derive(Clone, Copy, Debug)]
pub struct EffectTick<'a> {
    pub params: &'a EffectParams,
    pub eq_filter: &'a FilterSettings,
    pub levels: EffectLevels,
    pub sample_rate: f64,
    pub samples_per_tick: f64,
    /// Samples the tick's ramps span.
    pub run_length: usize,
}

/// Post-synthesis processor. `tick` loads the parameters for the next
/// `run_length` samples; `process` may then be called several times over
/// consecutive pieces of the tick.
pub trait Effect: Send {
    /// Drop all delay-line and filter history.
    fn clear(&mut self);
    fn tick(&mut self, tick: &EffectTick<'_>);
    fn process(&mut self, left: &mut [f32], right: &mut [f32]);
}

/// Processing order of the chain. EQ is always present.
const CHAIN_ORDER: [EffectType; 8] = [
    EffectType::Distortion,
    EffectType::Bitcrusher,
    EffectType::RingModulation,
    EffectType::Granular,
    EffectType::Panning,
    EffectType::Chorus,
    EffectType::Echo,
    EffectType::Reverb,
];

/// Create the processor for `effect`, or `None` for effects that act on
/// tones rather than the instrument buffer.
pub fn create_effect(effect: EffectType, sample_rate: f64) -> Option<Box<dyn Effect>> {
    Some(match effect {
        EffectType::Distortion => Box::new(Distortion::new()),
        EffectType::Bitcrusher => Box::new(Bitcrusher::new()),
        EffectType::RingModulation => Box::new(RingModulator::new()),
        EffectType::Granular => Box::new(Granular::new()),
        EffectType::Panning => Box::new(Panning::new(sample_rate)),
        EffectType::Chorus => Box::new(Chorus::new(sample_rate)),
        EffectType::Echo => Box::new(Echo::new(sample_rate)),
        EffectType::Reverb => Box::new(Reverb::new()),
        _ => return None,
    })
}

pub struct EffectChain {
    /// Effects before panning; mono.
    pre_pan: Vec<Box<dyn Effect>>,
    eq: Eq,
    panning: Option<Box<dyn Effect>>,
    /// Effects after panning; stereo.
    post_pan: Vec<Box<dyn Effect>>,
}

impl EffectChain {
    pub fn new(effects: tb_ir::EffectSet, sample_rate: f64) -> Self {
        let mut pre_pan = Vec::new();
        let mut panning = None;
        let mut post_pan = Vec::new();
        let mut seen_pan = false;
        for effect in CHAIN_ORDER {
            if !effects.contains(effect) {
                if effect == EffectType::Panning {
                    seen_pan = true;
                }
                continue;
            }
            let Some(processor) = create_effect(effect, sample_rate) else {
                continue;
            };
            if effect == EffectType::Panning {
                seen_pan = true;
                panning = Some(processor);
            } else if seen_pan {
                post_pan.push(processor);
            } else {
                pre_pan.push(processor);
            }
        }
        Self { pre_pan, eq: Eq::new(), panning, post_pan }
    }

    /// Number of effect processors, EQ excluded.
    pub fn len(&self) -> usize {
        self.pre_pan.len() + self.post_pan.len() + usize::from(self.panning.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        for effect in self.effects_mut() {
            effect.clear();
        }
        self.eq.clear();
    }

    pub fn tick(&mut self, tick: &EffectTick<'_>) {
        for effect in self.effects_mut() {
            effect.tick(tick);
        }
        self.eq.tick(tick);
    }

    /// Run the chain over the mono signal in `left`, leaving stereo output
    /// in `left` and `right`.
    pub fn process(&mut self, left: &mut [f32], right: &mut [f32]) {
        for effect in self.pre_pan.iter_mut() {
            effect.process(left, right);
        }
        self.eq.process(left, right);
        match self.panning.as_mut() {
            Some(panning) => panning.process(left, right),
            None => right.copy_from_slice(left),
        }
        for effect in self.post_pan.iter_mut() {
            effect.process(left, right);
        }
    }

    fn effects_mut(&mut self) -> impl Iterator<Item = &mut Box<dyn Effect>> {
        self.pre_pan.iter_mut().chain(self.panning.iter_mut()).chain(self.post_pan.iter_mut())
    }
}

/// Reverb rings for this long at full level.
const REVERB_TAIL_SECONDS: f64 = 4.0;
/// Chorus, granular and pan delay lines empty within this.
const SHORT_TAIL_SECONDS: f64 = 0.1;
/// Echo repeats are dropped once they fall below this gain.
const ECHO_TAIL_FLOOR: f64 = 0.001;

/// Samples the chain keeps sounding after its input goes silent.
pub fn tail_samples(effects: tb_ir::EffectSet, tick: &EffectTick<'_>) -> usize {
    let sr = tick.sample_rate;
    let mut seconds: f64 = 0.0;
    if effects.contains(EffectType::Chorus)
        || effects.contains(EffectType::Granular)
        || effects.contains(EffectType::Panning)
    {
        seconds = SHORT_TAIL_SECONDS;
    }
    if effects.contains(EffectType::Reverb) {
        let level = tick.levels.reverb.start.max(tick.levels.reverb.end);
        if level > 0.0 {
            seconds = seconds.max(REVERB_TAIL_SECONDS * level.min(1.0).max(0.25));
        }
    }
    let mut samples = libm::ceil(seconds * sr) as usize;
    if effects.contains(EffectType::Echo) {
        let level = tick.levels.echo_sustain.start.max(tick.levels.echo_sustain.end);
        let feedback = echo::echo_feedback(level);
        let delay = echo::delay_ticks(tick.params.echo_delay) * tick.samples_per_tick;
        let repeats = if feedback > 0.0 { libm::ceil(libm::log(ECHO_TAIL_FLOOR) / libm::log(feedback)) } else { 1.0 };
        samples = samples.max(libm::ceil(delay * repeats) as usize);
    }
    samples
}

/// A 100-sample tick at 44.1 kHz.
#[cfg(test)]
pub(crate) fn test_tick<'a>(params: &'a EffectParams, eq: &'a FilterSettings, levels: EffectLevels) -> EffectTick<'a> {
    EffectTick { params, eq_filter: eq, levels, sample_rate: 44100.0, samples_per_tick: 100.0, run_length: 100 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tb_ir::EffectSet;

    #[test]
    fn chain_orders_effects_around_panning() {
        let effects = EffectSet::empty()
            .with(EffectType::Reverb)
            .with(EffectType::Distortion)
            .with(EffectType::Panning)
            .with(EffectType::Chorus);
        let chain = EffectChain::new(effects, 44100.0);
        assert_eq!(chain.pre_pan.len(), 1);
        assert!(chain.panning.is_some());
        assert_eq!(chain.post_pan.len(), 2);
    }

    #[test]
    fn tone_effects_have_no_processor() {
        let effects = EffectSet::empty().with(EffectType::NoteFilter).with(EffectType::Vibrato);
        assert!(EffectChain::new(effects, 44100.0).is_empty());
    }

    #[test]
    fn empty_chain_copies_mono_to_both_sides() {
        let mut chain = EffectChain::new(EffectSet::empty(), 44100.0);
        let params = EffectParams::default();
        let eq = FilterSettings::new();
        chain.tick(&test_tick(&params, &eq, EffectLevels::default()));
        let mut left = [0.25f32, -0.5, 0.125];
        let mut right = [0.0f32; 3];
        chain.process(&mut left, &mut right);
        assert_eq!(left, right);
        assert_eq!(left, [0.25, -0.5, 0.125]);
    }

    #[test]
    fn tails_follow_the_slowest_effect() {
        let params = EffectParams::default();
        let eq = FilterSettings::new();
        let dry = test_tick(&params, &eq, EffectLevels::default());
        assert_eq!(tail_samples(EffectSet::empty(), &dry), 0);
        let chorus = tail_samples(EffectSet::empty().with(EffectType::Chorus), &dry);
        assert!((4410..=4411).contains(&chorus));

        let wet = test_tick(&params, &eq, EffectLevels { reverb: Ramp::flat(1.0), ..Default::default() });
        let reverb = tail_samples(EffectSet::empty().with(EffectType::Reverb).with(EffectType::Chorus), &wet);
        assert_eq!(reverb, 4 * 44100);

        let echoing = test_tick(&params, &eq, EffectLevels { echo_sustain: Ramp::flat(1.0), ..Default::default() });
        let echo = tail_samples(EffectSet::empty().with(EffectType::Echo), &echoing);
        assert!(echo > 100);
    }

    #[test]
    fn ramp_delta_spans_the_run() {
        let ramp = Ramp::new(0.0, 1.0);
        assert_eq!(ramp.delta(4), 0.25);
        assert_eq!(ramp.delta(0), 0.0);
    }
}
