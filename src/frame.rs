use std::time::Duration;

use cgmath::Matrix4;
use log::info;

use crate::camera::OrbitCamera;

/// Reports a press once per physical press: true only on the frame where the
/// key goes from up to down.
#[derive(Debug, Default, Clone, Copy)]
pub struct EdgeTrigger {
    previous: bool,
}

impl EdgeTrigger {
    pub fn update(&mut self, down: bool) -> bool {
        let rising = down && !self.previous;
        self.previous = down;
        rising
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    Paused,
}

/// Per-frame camera bookkeeping. Decides whether the view matrix changes this
/// frame; the caller still draws every frame regardless of the state.
#[derive(Debug)]
pub struct FrameDriver {
    state: RunState,
    toggle: EdgeTrigger,
    camera: Option<OrbitCamera>,
}

impl FrameDriver {
    /// `camera` is `None` for programs with a fixed view; those never produce a
    /// new view matrix.
    pub fn new(camera: Option<OrbitCamera>) -> Self {
        Self {
            state: RunState::Running,
            toggle: EdgeTrigger::default(),
            camera,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Advances one frame. `key_down` is the current state of the pause key,
    /// `elapsed` the wall-clock time since start. Returns the view matrix to
    /// upload, or `None` when the previous one stays.
    pub fn advance(&mut self, key_down: bool, elapsed: Duration) -> Option<Matrix4<f32>> {
        if self.toggle.update(key_down) {
            self.state = match self.state {
                RunState::Running => RunState::Paused,
                RunState::Paused => RunState::Running,
            };
            info!("Camera {:?}", self.state);
        }
        match (self.state, &self.camera) {
            // one radian per second
            (RunState::Running, Some(camera)) => Some(camera.view(elapsed.as_secs_f32())),
            _ => None,
        }
    }
}
