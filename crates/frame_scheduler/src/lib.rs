//! Decides what the impl thread does next.
//!
//! The compositor core only raises hints ("needs redraw", "ready to activate").
//! `SchedulerStateMachine` folds those hints together with the begin frame
//! cadence and answers with a single `SchedulerAction` at a time.

mod state_machine;

pub use state_machine::SchedulerStateMachine;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerSettings {
    /// Commits land directly on the active tree; there is no pending tree.
    pub commit_to_active_tree: bool,
    /// Allow the next main frame to start while the last commit waits for activation.
    pub main_frame_before_activation_enabled: bool,
    pub timeout_and_draw_when_animation_checkerboards: bool,
    pub maximum_number_of_failed_draws_before_draw_is_forced: u32,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            commit_to_active_tree: false,
            main_frame_before_activation_enabled: false,
            timeout_and_draw_when_animation_checkerboards: true,
            maximum_number_of_failed_draws_before_draw_is_forced: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerAction {
    None,
    BeginOutputSurfaceCreation,
    SendBeginMainFrame,
    Commit,
    ActivateSyncTree,
    DrawAndSwapIfPossible,
    DrawAndSwapForced,
    PrepareTiles,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputSurfaceState {
    None,
    Creating,
    WaitingForFirstCommit,
    WaitingForFirstActivation,
    Active,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeginImplFrameState {
    Idle,
    InsideBeginFrame,
    InsideDeadline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeginMainFrameState {
    Idle,
    Sent,
    Started,
    ReadyToCommit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForcedRedrawState {
    Idle,
    WaitingForCommit,
    WaitingForActivation,
    WaitingForDraw,
}
