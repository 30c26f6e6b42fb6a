use std::time::{Duration, Instant};

/// Keeps a loop from running faster than a target frame rate.
pub struct FpsLimiter {
    fps_control: Instant,
    fps_wait: Duration,
}

impl FpsLimiter {
    pub fn new(fps: u32) -> Self {
        Self {
            fps_control: Instant::now(),
            fps_wait: Duration::from_millis(1000 / fps.max(1) as u64),
        }
    }

    /// Sleeps for whatever is left of the current frame slot, then opens the next one.
    pub fn wait(&mut self) {
        let elapsed = self.fps_control.elapsed();

        if self.fps_wait > elapsed {
            spin_sleep::sleep(self.fps_wait - elapsed);
        }

        self.fps_control = Instant::now();
    }
}

/// Frame rate measured over one second windows.
///
/// The last measured value is kept until the next window closes so the
/// overlay does not flicker between frames.
pub struct FpsCounter {
    window_start: Instant,
    frames: u32,
    current: Option<f64>,
}

impl Default for FpsCounter {
    fn default() -> Self {
        Self {
            window_start: Instant::now(),
            frames: 0,
            current: None,
        }
    }
}

impl FpsCounter {
    pub fn tick(&mut self) -> Option<f64> {
        self.tick_at(Instant::now())
    }

    fn tick_at(&mut self, now: Instant) -> Option<f64> {
        self.frames += 1;
        let elapsed = now.duration_since(self.window_start);
        if elapsed >= Duration::from_secs(1) {
            self.current = Some(self.frames as f64 / elapsed.as_secs_f64());
            self.frames = 0;
            self.window_start = now;
        }
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fps_counter_reports_after_one_second() {
        let start = Instant::now();
        let mut counter = FpsCounter {
            window_start: start,
            frames: 0,
            current: None,
        };

        for i in 1..10 {
            assert_eq!(counter.tick_at(start + Duration::from_millis(i * 100)), None);
        }
        let fps = counter.tick_at(start + Duration::from_secs(1)).unwrap();
        assert!((fps - 10.0).abs() < 1e-6);

        // Value is held until the next window closes.
        assert_eq!(
            counter.tick_at(start + Duration::from_millis(1100)),
            Some(fps)
        );
    }

    #[test]
    fn fps_limiter_paces_the_loop() {
        let mut limiter = FpsLimiter::new(50);
        let start = Instant::now();
        limiter.wait();
        limiter.wait();
        assert!(start.elapsed() >= Duration::from_millis(35));
    }
}
