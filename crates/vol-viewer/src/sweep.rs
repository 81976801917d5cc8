//! Ping-pong depth sweep for layered volume textures.

/// Oscillating fractional slice index.
///
/// Advanced by a fixed signed step once per rendered frame; when the next
/// value would leave `[0, layer_count]`, the overshoot is reflected back
/// into range and the step direction reverses, so the sweep bounces
/// between the two ends indefinitely.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthSweep {
    current: f32,
    step: f32,
    layer_count: f32,
}

impl DepthSweep {
    /// Creates a sweep starting at `start`, clamped into `[0, layer_count]`.
    ///
    /// The step magnitude must not exceed `layer_count`; reflection of a
    /// single overshoot cannot restore the range otherwise.
    pub fn new(start: f32, step: f32, layer_count: f32) -> Self {
        debug_assert!(layer_count > 0.0);
        debug_assert!(step.abs() <= layer_count);

        Self {
            current: start.clamp(0.0, layer_count),
            step,
            layer_count,
        }
    }

    #[inline]
    pub fn current(&self) -> f32 {
        self.current
    }

    #[inline]
    pub fn step(&self) -> f32 {
        self.step
    }

    #[inline]
    pub fn layer_count(&self) -> f32 {
        self.layer_count
    }

    /// Advances one frame: `current += step`, bouncing at both ends.
    pub fn advance(&mut self) {
        let mut next = self.current + self.step;

        if next > self.layer_count || next < 0.0 {
            if next > self.layer_count {
                next = 2.0 * self.layer_count - next;
            }
            if next < 0.0 {
                next = -next;
            }
            self.step = -self.step;
        }

        self.current = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-4;

    #[test]
    fn in_range_step_is_a_plain_addition() {
        let mut sweep = DepthSweep::new(55.0, 0.4, 109.0);
        sweep.advance();

        assert!((sweep.current() - 55.4).abs() < EPS);
        assert!((sweep.step() - 0.4).abs() < EPS);
    }

    #[test]
    fn upper_overshoot_reflects_and_reverses() {
        let mut sweep = DepthSweep::new(108.9, 0.4, 109.0);
        sweep.advance();

        // 109.3 exceeds the bound; reflected to 2*109 - 109.3 = 108.7.
        assert!((sweep.current() - 108.7).abs() < EPS);
        assert!((sweep.step() + 0.4).abs() < EPS);
    }

    #[test]
    fn upper_boundary_tie_break() {
        let mut sweep = DepthSweep::new(109.0, 0.4, 109.0);
        sweep.advance();

        assert!((sweep.current() - 108.6).abs() < EPS);
        assert!((sweep.step() + 0.4).abs() < EPS);
    }

    #[test]
    fn lower_boundary_tie_break() {
        let mut sweep = DepthSweep::new(0.0, -0.4, 109.0);
        sweep.advance();

        assert!((sweep.current() - 0.4).abs() < EPS);
        assert!((sweep.step() - 0.4).abs() < EPS);
    }

    #[test]
    fn forward_then_backward_returns_to_start() {
        let mut forward = DepthSweep::new(42.5, 0.7, 109.0);
        forward.advance();

        let mut backward = DepthSweep::new(forward.current(), -0.7, 109.0);
        backward.advance();

        assert!((backward.current() - 42.5).abs() < EPS);
    }

    #[test]
    fn long_runs_stay_in_range() {
        for &(start, step) in &[(0.0, 0.4), (55.0, 0.4), (108.9, 3.7), (12.0, -9.3)] {
            let mut sweep = DepthSweep::new(start, step, 109.0);

            for _ in 0..10_000 {
                sweep.advance();
                assert!(
                    (0.0..=109.0).contains(&sweep.current()),
                    "escaped range: start={start} step={step} current={}",
                    sweep.current()
                );
            }
        }
    }

    #[test]
    fn bounce_cycle_restores_direction() {
        // Two reflections (top then bottom) restore the original sign.
        let mut sweep = DepthSweep::new(50.0, 20.0, 109.0);
        let mut flips = 0;
        let mut last_sign = sweep.step().signum();

        for _ in 0..100 {
            sweep.advance();
            let sign = sweep.step().signum();
            if sign != last_sign {
                flips += 1;
                last_sign = sign;
            }
        }

        assert!(flips >= 2);
        assert!((sweep.step().abs() - 20.0).abs() < EPS);
    }
}
