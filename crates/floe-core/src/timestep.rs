// SPDX-License-Identifier: CEPL-1.0
use std::time::Duration;

/// Time elapsed between two updates.
#[derive(Clone, Copy, Debug, Default, PartialEq, PartialOrd)]
pub struct Timestep(f32);

impl Timestep {
    pub fn from_seconds(seconds: f32) -> Self {
        Self(seconds)
    }

    #[inline]
    pub fn seconds(self) -> f32 {
        self.0
    }

    #[inline]
    pub fn milliseconds(self) -> f32 {
        self.0 * 1000.0
    }
}

impl From<Duration> for Timestep {
    fn from(d: Duration) -> Self {
        Self(d.as_secs_f32())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_from_duration() {
        let ts = Timestep::from(Duration::from_millis(16));
        assert!((ts.seconds() - 0.016).abs() < 1e-6);
        assert!((ts.milliseconds() - 16.0).abs() < 1e-3);
    }
}
