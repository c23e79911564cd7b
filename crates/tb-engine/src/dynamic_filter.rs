//! Biquad section whose coefficients sweep across a tick.
//!
//! A tone's filter settings are evaluated at the start and end of every
//! tick; the section then walks its coefficients from one to the other
//! sample by sample so envelope-driven cutoffs don't zipper.

use tb_ir::FilterCoefficients;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DynamicBiquadFilter {
    a1: f64,
    a2: f64,
    b0: f64,
    b1: f64,
    b2: f64,
    a1_delta: f64,
    a2_delta: f64,
    b0_delta: f64,
    b1_delta: f64,
    b2_delta: f64,
    /// Input coefficients are scaled by their delta instead of offset.
    multiplicative_input: bool,
    x1: f64,
    x2: f64,
    y1: f64,
    y2: f64,
}

fn ratio_step(start: f64, end: f64, delta_rate: f64) -> Option<f64> {
    if start == 0.0 || end == 0.0 || (start < 0.0) != (end < 0.0) {
        return None;
    }
    Some(libm::pow(end / start, delta_rate))
}

impl DynamicBiquadFilter {
    pub fn new() -> Self {
        let mut filter = Self::default();
        filter.load(&FilterCoefficients::identity());
        filter
    }

    /// Fixed coefficients with no sweep.
    pub fn load(&mut self, coefficients: &FilterCoefficients) {
        self.load_coefficients_with_gradient(coefficients, coefficients, 0.0, false);
    }

    /// Start at `start` and reach `end` after `1 / delta_rate` samples.
    ///
    /// With `multiplicative_input`, the `b` coefficients move geometrically;
    /// this keeps gain-scaled pass filters from dipping mid-sweep. It falls
    /// back to linear steps when a coefficient changes sign.
    pub fn load_coefficients_with_gradient(
        &mut self,
        start: &FilterCoefficients,
        end: &FilterCoefficients,
        delta_rate: f64,
        multiplicative_input: bool,
    ) {
        self.a1 = start.a[1];
        self.a2 = start.a[2];
        self.b0 = start.b[0];
        self.b1 = start.b[1];
        self.b2 = start.b[2];
        self.a1_delta = (end.a[1] - start.a[1]) * delta_rate;
        self.a2_delta = (end.a[2] - start.a[2]) * delta_rate;

        let steps = if multiplicative_input {
            ratio_step(start.b[0], end.b[0], delta_rate).and_then(|b0| {
                let b1 = if start.b[1] == 0.0 && end.b[1] == 0.0 {
                    1.0
                } else {
                    ratio_step(start.b[1], end.b[1], delta_rate)?
                };
                let b2 = if start.b[2] == 0.0 && end.b[2] == 0.0 {
                    1.0
                } else {
                    ratio_step(start.b[2], end.b[2], delta_rate)?
                };
                Some((b0, b1, b2))
            })
        } else {
            None
        };

        match steps {
            Some((b0, b1, b2)) => {
                self.multiplicative_input = true;
                self.b0_delta = b0;
                self.b1_delta = b1;
                self.b2_delta = b2;
            }
            None => {
                self.multiplicative_input = false;
                self.b0_delta = (end.b[0] - start.b[0]) * delta_rate;
                self.b1_delta = (end.b[1] - start.b[1]) * delta_rate;
                self.b2_delta = (end.b[2] - start.b[2]) * delta_rate;
            }
        }
    }

    /// Filter one sample and step the coefficients.
    #[inline]
    pub fn process(&mut self, x0: f64) -> f64 {
        let y0 = self.b0 * x0 + self.b1 * self.x1 + self.b2 * self.x2 - self.a1 * self.y1 - self.a2 * self.y2;
        self.x2 = self.x1;
        self.x1 = x0;
        self.y2 = self.y1;
        self.y1 = y0;

        self.a1 += self.a1_delta;
        self.a2 += self.a2_delta;
        if self.multiplicative_input {
            self.b0 *= self.b0_delta;
            self.b1 *= self.b1_delta;
            self.b2 *= self.b2_delta;
        } else {
            self.b0 += self.b0_delta;
            self.b1 += self.b1_delta;
            self.b2 += self.b2_delta;
        }
        y0
    }

    /// Clear the signal history, keeping the coefficients.
    pub fn reset_output(&mut self) {
        self.x1 = 0.0;
        self.x2 = 0.0;
        self.y1 = 0.0;
        self.y2 = 0.0;
    }

    /// Flush denormal or non-finite state after a block.
    pub fn sanitize(&mut self) {
        for v in [&mut self.x1, &mut self.x2, &mut self.y1, &mut self.y2] {
            if !v.is_finite() || libm::fabs(*v) < 1e-24 {
                *v = 0.0;
            }
        }
    }
}
