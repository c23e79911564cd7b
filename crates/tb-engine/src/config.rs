//! Engine configuration.

/// Runtime settings fixed for the lifetime of a [`Synth`](crate::Synth).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EngineConfig {
    /// Output sample rate in Hz.
    pub sample_rate: u32,
    /// Largest block the host will ask for in one call. Scratch buffers are
    /// sized to this.
    pub block_size: usize,
    /// Tones an instrument may hold at once, counting released tones.
    pub max_tones_per_instrument: usize,
    /// Peak level above which the master limiter starts pulling down.
    pub master_limit: f64,
    /// Linearly interpolate built-in chip waves instead of sample-and-hold.
    pub interpolate_chip_waves: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            block_size: 1024,
            max_tones_per_instrument: 8,
            master_limit: 1.0,
            interpolate_chip_waves: true,
        }
    }
}

impl EngineConfig {
    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn sample_rate_f64(&self) -> f64 {
        self.sample_rate as f64
    }
}
