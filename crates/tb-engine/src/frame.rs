//! Audio frame type.

/// A stereo audio frame (16-bit integer).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Frame {
    pub left: i16,
    pub right: i16,
}

impl Frame {
    /// Create a silent frame.
    pub const fn silence() -> Self {
        Self { left: 0, right: 0 }
    }

    /// Create a mono frame (same value for both channels).
    pub const fn mono(value: i16) -> Self {
        Self { left: value, right: value }
    }

    /// Convert floating point samples in `[-1, 1]`, clamping overs.
    pub fn from_f32(left: f32, right: f32) -> Self {
        Self { left: to_i16(left), right: to_i16(right) }
    }

    /// Mix another frame into this one.
    pub fn mix(&mut self, other: Frame) {
        // Use i32 to avoid overflow, then clamp
        let left = (self.left as i32 + other.left as i32).clamp(-32768, 32767);
        let right = (self.right as i32 + other.right as i32).clamp(-32768, 32767);
        self.left = left as i16;
        self.right = right as i16;
    }
}

fn to_i16(sample: f32) -> i16 {
    if sample.is_nan() {
        return 0;
    }
    (sample.clamp(-1.0, 1.0) * 32767.0) as i16
}

/// Interleave planar float buffers into 16-bit frames.
pub fn frames_from_planar(left: &[f32], right: &[f32], out: &mut [Frame]) {
    for ((frame, &l), &r) in out.iter_mut().zip(left).zip(right) {
        *frame = Frame::from_f32(l, r);
    }
}
