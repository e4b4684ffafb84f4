//! Frame transport for time-resolved 3D results.

use std::ops::ControlFlow;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tracing::debug;

use crate::task::IntervalTask;

pub const FRAME_PERIOD: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Transport {
    pub frame: usize,
    pub total: usize,
    pub playing: bool,
    pub looping: bool,
}

impl Transport {
    /// One timer tick. Past the last frame it wraps when looping, otherwise
    /// it parks on the last frame and stops playing.
    fn advance(&mut self) -> ControlFlow<()> {
        if !self.playing || self.total == 0 {
            self.playing = false;
            return ControlFlow::Break(());
        }
        let next = self.frame + 1;
        if next < self.total {
            self.frame = next;
            ControlFlow::Continue(())
        } else if self.looping {
            self.frame = 0;
            ControlFlow::Continue(())
        } else {
            self.frame = self.total - 1;
            self.playing = false;
            ControlFlow::Break(())
        }
    }
}

#[derive(Debug)]
pub struct AnimationPlayer {
    state: Arc<Mutex<Transport>>,
    timer: IntervalTask,
    period: Duration,
}

impl AnimationPlayer {
    pub fn new(total: usize) -> Self {
        AnimationPlayer {
            state: Arc::new(Mutex::new(Transport {
                total,
                ..Transport::default()
            })),
            timer: IntervalTask::new(),
            period: FRAME_PERIOD,
        }
    }

    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    fn lock(&self) -> MutexGuard<'_, Transport> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn transport(&self) -> Transport {
        *self.lock()
    }

    pub fn frame(&self) -> usize {
        self.lock().frame
    }

    pub fn is_playing(&self) -> bool {
        self.lock().playing
    }

    /// Resumes from the current frame. At the final frame with looping off
    /// playback rewinds to the start first.
    pub fn play(&mut self) {
        {
            let mut t = self.lock();
            if t.playing || t.total < 2 {
                return;
            }
            if !t.looping && t.frame + 1 >= t.total {
                t.frame = 0;
            }
            t.playing = true;
        }
        let state = Arc::clone(&self.state);
        self.timer.start(self.period, move || {
            let flow = state
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .advance();
            std::future::ready(flow)
        });
        debug!(frame = self.frame(), "animation playing");
    }

    /// Stops the timer; the frame and the frame data are kept.
    pub fn pause(&mut self) {
        self.timer.stop();
        self.lock().playing = false;
    }

    pub fn toggle(&mut self) {
        if self.is_playing() {
            self.pause();
        } else {
            self.play();
        }
    }

    /// Moves one frame forward or back while paused.
    pub fn step(&mut self, forward: bool) -> usize {
        self.pause();
        let mut t = self.lock();
        if t.total == 0 {
            return 0;
        }
        t.frame = match (forward, t.looping) {
            (true, _) if t.frame + 1 < t.total => t.frame + 1,
            (true, true) => 0,
            (true, false) => t.total - 1,
            (false, _) if t.frame > 0 => t.frame - 1,
            (false, true) => t.total - 1,
            (false, false) => 0,
        };
        t.frame
    }

    pub fn reset(&mut self) {
        self.pause();
        self.lock().frame = 0;
    }

    pub fn toggle_loop(&mut self) -> bool {
        let mut t = self.lock();
        t.looping = !t.looping;
        t.looping
    }

    /// Swaps in a new frame count, rewinding and stopping playback.
    pub fn load(&mut self, total: usize) {
        self.pause();
        let mut t = self.lock();
        t.total = total;
        t.frame = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn wait(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_plays_to_end_and_parks() {
        let mut player = AnimationPlayer::new(3);
        player.play();
        wait(450).await;
        assert_eq!(player.frame(), 2);
        wait(400).await;
        assert_eq!(player.frame(), 2);
        assert!(!player.is_playing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_then_play_resumes() {
        let mut player = AnimationPlayer::new(10);
        player.play();
        wait(450).await;
        player.pause();
        assert_eq!(player.frame(), 2);
        wait(1000).await;
        assert_eq!(player.frame(), 2);
        player.play();
        wait(250).await;
        assert_eq!(player.frame(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_play_at_end_rewinds_without_loop() {
        let mut player = AnimationPlayer::new(4);
        player.step(false);
        assert_eq!(player.frame(), 0);
        for _ in 0..5 {
            player.step(true);
        }
        assert_eq!(player.frame(), 3);
        player.play();
        assert_eq!(player.frame(), 0);
        assert!(player.is_playing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_wraps() {
        let mut player = AnimationPlayer::new(2).with_period(Duration::from_millis(100));
        assert!(player.toggle_loop());
        player.play();
        wait(250).await;
        assert_eq!(player.frame(), 0);
        assert!(player.is_playing());
        assert_eq!(player.step(false), 1);
        assert!(!player.is_playing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_and_load() {
        let mut player = AnimationPlayer::new(5);
        player.toggle();
        wait(650).await;
        assert_eq!(player.frame(), 3);
        player.reset();
        assert_eq!(player.frame(), 0);
        assert!(!player.is_playing());
        player.load(1);
        player.play();
        assert!(!player.is_playing());
    }
}
