use std::time::{Duration, Instant};

use compositor_protocol::VectorF;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AnimationTarget {
    Opacity { from: f32, to: f32 },
    /// Animates the layer's translation.
    Translation { from: VectorF, to: VectorF },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Committed to a pending tree; starts once the tree is activated.
    WaitingForActivation,
    WaitingForStart,
    Running,
    Finished,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayerAnimation {
    id: u32,
    target: AnimationTarget,
    duration: Duration,
    start_time: Option<Instant>,
    run_state: RunState,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AnimatedValue {
    Opacity(f32),
    Translation(VectorF),
}

impl LayerAnimation {
    pub fn new(id: u32, target: AnimationTarget, duration: Duration) -> Self {
        Self {
            id,
            target,
            duration,
            start_time: None,
            run_state: RunState::WaitingForActivation,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn run_state(&self) -> RunState {
        self.run_state
    }

    pub fn is_transform(&self) -> bool {
        matches!(self.target, AnimationTarget::Translation { .. })
    }

    pub fn is_running(&self) -> bool {
        matches!(self.run_state, RunState::WaitingForStart | RunState::Running)
    }

    pub fn activate(&mut self) {
        if self.run_state == RunState::WaitingForActivation {
            self.run_state = RunState::WaitingForStart;
        }
    }

    /// Advances to `now` and returns the value to apply, if any.
    pub fn tick(&mut self, now: Instant) -> Option<AnimatedValue> {
        match self.run_state {
            RunState::WaitingForActivation | RunState::Finished => return None,
            RunState::WaitingForStart => {
                self.start_time = Some(now);
                self.run_state = RunState::Running;
            }
            RunState::Running => {}
        }
        let start_time = self.start_time.unwrap_or(now);
        let elapsed = now.saturating_duration_since(start_time);
        let progress = if self.duration.is_zero() {
            1.0
        } else {
            (elapsed.as_secs_f32() / self.duration.as_secs_f32()).clamp(0.0, 1.0)
        };
        if progress >= 1.0 {
            self.run_state = RunState::Finished;
        }
        Some(match self.target {
            AnimationTarget::Opacity { from, to } => {
                AnimatedValue::Opacity(from + (to - from) * progress)
            }
            AnimationTarget::Translation { from, to } => {
                AnimatedValue::Translation(from.lerp(to, progress))
            }
        })
    }
}
