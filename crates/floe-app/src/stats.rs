// SPDX-License-Identifier: CEPL-1.0
use floe_core::{Event, Layer, Timestep};
use tracing::{debug, info};

/// Logs frames per second once per second of accumulated frame time.
#[derive(Debug, Default)]
pub struct FrameStats {
    frames: u32,
    accumulated: f32,
    last_fps: Option<u32>,
}

impl FrameStats {
    pub fn last_fps(&self) -> Option<u32> {
        self.last_fps
    }
}

impl Layer for FrameStats {
    fn name(&self) -> &str {
        "frame-stats"
    }

    fn on_attach(&mut self) {
        debug!("frame stats attached");
    }

    fn on_update(&mut self, ts: Timestep) {
        self.frames += 1;
        self.accumulated += ts.seconds();
        if self.accumulated >= 1.0 {
            let fps = (self.frames as f32 / self.accumulated).round() as u32;
            info!("fps ~ {fps} ({:.2} ms/frame)", 1000.0 / fps.max(1) as f32);
            self.last_fps = Some(fps);
            self.frames = 0;
            self.accumulated = 0.0;
        }
    }

    fn on_event(&mut self, event: &Event) -> bool {
        if let Event::WindowResize { width, height } = event {
            debug!("resize to {width}x{height}, restarting fps window");
            self.frames = 0;
            self.accumulated = 0.0;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_after_one_second() {
        let mut stats = FrameStats::default();
        for _ in 0..59 {
            stats.on_update(Timestep::from_seconds(1.0 / 60.0));
        }
        assert_eq!(stats.last_fps(), None);
        stats.on_update(Timestep::from_seconds(1.0 / 60.0 + 0.001));
        assert_eq!(stats.last_fps(), Some(60));
    }

    #[test]
    fn resize_restarts_window_and_is_not_consumed() {
        let mut stats = FrameStats::default();
        stats.on_update(Timestep::from_seconds(0.9));
        let consumed = stats.on_event(&Event::WindowResize {
            width: 10,
            height: 10,
        });
        assert!(!consumed);
        stats.on_update(Timestep::from_seconds(0.2));
        assert_eq!(stats.last_fps(), None);
    }
}
