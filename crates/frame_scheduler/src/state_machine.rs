use compositor_protocol::DrawResult;

use crate::{
    BeginImplFrameState, BeginMainFrameState, ForcedRedrawState, OutputSurfaceState,
    SchedulerAction, SchedulerSettings,
};

#[derive(Debug, Clone)]
pub struct SchedulerStateMachine {
    settings: SchedulerSettings,

    output_surface_state: OutputSurfaceState,
    begin_impl_frame_state: BeginImplFrameState,
    begin_main_frame_state: BeginMainFrameState,
    forced_redraw_state: ForcedRedrawState,

    visible: bool,
    can_draw: bool,
    needs_redraw: bool,
    needs_begin_main_frame: bool,
    needs_prepare_tiles: bool,
    needs_one_begin_impl_frame: bool,
    has_pending_tree: bool,
    pending_tree_is_ready_for_activation: bool,
    active_tree_needs_first_draw: bool,
    wait_for_ready_to_draw: bool,
    did_create_first_output_surface: bool,
    consecutive_checkerboard_animations: u32,

    // Reset at the start of every impl frame.
    did_draw_in_current_frame: bool,
    did_send_begin_main_frame_for_current_frame: bool,
    did_prepare_tiles_for_current_frame: bool,
}

impl SchedulerStateMachine {
    pub fn new(settings: SchedulerSettings) -> Self {
        debug_assert!(
            settings.maximum_number_of_failed_draws_before_draw_is_forced > 0,
            "forced draw threshold must be at least one"
        );
        Self {
            settings,
            output_surface_state: OutputSurfaceState::None,
            begin_impl_frame_state: BeginImplFrameState::Idle,
            begin_main_frame_state: BeginMainFrameState::Idle,
            forced_redraw_state: ForcedRedrawState::Idle,
            visible: false,
            can_draw: false,
            needs_redraw: false,
            needs_begin_main_frame: false,
            needs_prepare_tiles: false,
            needs_one_begin_impl_frame: false,
            has_pending_tree: false,
            pending_tree_is_ready_for_activation: false,
            active_tree_needs_first_draw: false,
            wait_for_ready_to_draw: false,
            did_create_first_output_surface: false,
            consecutive_checkerboard_animations: 0,
            did_draw_in_current_frame: false,
            did_send_begin_main_frame_for_current_frame: false,
            did_prepare_tiles_for_current_frame: false,
        }
    }

    pub fn settings(&self) -> SchedulerSettings {
        self.settings
    }

    pub fn output_surface_state(&self) -> OutputSurfaceState {
        self.output_surface_state
    }

    pub fn begin_impl_frame_state(&self) -> BeginImplFrameState {
        self.begin_impl_frame_state
    }

    pub fn begin_main_frame_state(&self) -> BeginMainFrameState {
        self.begin_main_frame_state
    }

    pub fn forced_redraw_state(&self) -> ForcedRedrawState {
        self.forced_redraw_state
    }

    pub fn visible(&self) -> bool {
        self.visible
    }

    pub fn can_draw(&self) -> bool {
        self.can_draw
    }

    pub fn has_pending_tree(&self) -> bool {
        self.has_pending_tree
    }

    pub fn redraw_pending(&self) -> bool {
        self.needs_redraw
    }

    pub fn commit_pending(&self) -> bool {
        self.needs_begin_main_frame || self.begin_main_frame_state != BeginMainFrameState::Idle
    }

    pub fn prepare_tiles_pending(&self) -> bool {
        self.needs_prepare_tiles
    }

    fn has_initialized_output_surface(&self) -> bool {
        !matches!(
            self.output_surface_state,
            OutputSurfaceState::None | OutputSurfaceState::Creating
        )
    }

    /// Whether the embedder should keep delivering begin frames.
    pub fn begin_frame_needed(&self) -> bool {
        if !self.has_initialized_output_surface() {
            return false;
        }
        if self.needs_one_begin_impl_frame {
            return true;
        }
        if !self.visible {
            return false;
        }
        self.needs_redraw
            || self.needs_begin_main_frame
            || self.needs_prepare_tiles
            || self.has_pending_tree
    }

    // Not visible or no surface to draw into: activation must not wait on raster.
    fn pending_activations_should_be_forced(&self) -> bool {
        !self.visible || !self.has_initialized_output_surface()
    }

    fn should_begin_output_surface_creation(&self) -> bool {
        self.visible
            && self.output_surface_state == OutputSurfaceState::None
            && self.begin_impl_frame_state == BeginImplFrameState::Idle
            && self.begin_main_frame_state == BeginMainFrameState::Idle
            && !self.has_pending_tree
    }

    fn should_activate_sync_tree(&self) -> bool {
        if !self.has_pending_tree {
            return false;
        }
        self.pending_tree_is_ready_for_activation || self.pending_activations_should_be_forced()
    }

    fn should_commit(&self) -> bool {
        if self.begin_main_frame_state != BeginMainFrameState::ReadyToCommit {
            return false;
        }
        // The pending tree slot has to be free before the next commit lands.
        if self.has_pending_tree {
            return false;
        }
        // Draw the previous commit before replacing it.
        !self.active_tree_needs_first_draw || !self.visible
    }

    fn should_draw(&self) -> bool {
        if self.output_surface_state != OutputSurfaceState::Active {
            return false;
        }
        if self.begin_impl_frame_state != BeginImplFrameState::InsideDeadline {
            return false;
        }
        if self.did_draw_in_current_frame {
            return false;
        }
        if self.forced_redraw_state == ForcedRedrawState::WaitingForDraw {
            return true;
        }
        if !self.visible || !self.can_draw || self.wait_for_ready_to_draw {
            return false;
        }
        self.needs_redraw
    }

    fn should_prepare_tiles(&self) -> bool {
        self.needs_prepare_tiles
            && !self.did_prepare_tiles_for_current_frame
            && self.begin_impl_frame_state == BeginImplFrameState::InsideDeadline
    }

    fn should_send_begin_main_frame(&self) -> bool {
        if !self.needs_begin_main_frame || !self.visible {
            return false;
        }
        if self.begin_impl_frame_state == BeginImplFrameState::Idle {
            return false;
        }
        if self.did_send_begin_main_frame_for_current_frame {
            return false;
        }
        if self.begin_main_frame_state != BeginMainFrameState::Idle {
            return false;
        }
        if !self.has_initialized_output_surface() {
            return false;
        }
        !self.has_pending_tree || self.settings.main_frame_before_activation_enabled
    }

    pub fn next_action(&self) -> SchedulerAction {
        if self.should_activate_sync_tree() {
            return SchedulerAction::ActivateSyncTree;
        }
        if self.should_commit() {
            return SchedulerAction::Commit;
        }
        if self.should_draw() {
            if self.forced_redraw_state == ForcedRedrawState::WaitingForDraw {
                return SchedulerAction::DrawAndSwapForced;
            }
            return SchedulerAction::DrawAndSwapIfPossible;
        }
        if self.should_prepare_tiles() {
            return SchedulerAction::PrepareTiles;
        }
        if self.should_send_begin_main_frame() {
            return SchedulerAction::SendBeginMainFrame;
        }
        if self.should_begin_output_surface_creation() {
            return SchedulerAction::BeginOutputSurfaceCreation;
        }
        SchedulerAction::None
    }

    /// Records that `action` ran. Draw actions report the core's `DrawResult`.
    pub fn did_perform(&mut self, action: SchedulerAction, draw_result: Option<DrawResult>) {
        match action {
            SchedulerAction::None => {}
            SchedulerAction::BeginOutputSurfaceCreation => {
                debug_assert_eq!(self.output_surface_state, OutputSurfaceState::None);
                self.output_surface_state = OutputSurfaceState::Creating;
            }
            SchedulerAction::SendBeginMainFrame => {
                self.begin_main_frame_state = BeginMainFrameState::Sent;
                self.needs_begin_main_frame = false;
                self.did_send_begin_main_frame_for_current_frame = true;
            }
            SchedulerAction::Commit => self.did_commit(),
            SchedulerAction::ActivateSyncTree => self.did_activate(),
            SchedulerAction::DrawAndSwapIfPossible | SchedulerAction::DrawAndSwapForced => {
                let forced = action == SchedulerAction::DrawAndSwapForced;
                let result = draw_result.unwrap_or_else(|| {
                    debug_assert!(false, "draw actions must report a draw result");
                    DrawResult::Success
                });
                self.did_draw(forced, result);
            }
            SchedulerAction::PrepareTiles => {
                self.needs_prepare_tiles = false;
                self.did_prepare_tiles_for_current_frame = true;
            }
        }
    }

    fn did_commit(&mut self) {
        self.begin_main_frame_state = BeginMainFrameState::Idle;
        if self.output_surface_state == OutputSurfaceState::WaitingForFirstCommit {
            self.output_surface_state = OutputSurfaceState::WaitingForFirstActivation;
        }
        if self.forced_redraw_state == ForcedRedrawState::WaitingForCommit {
            self.forced_redraw_state = ForcedRedrawState::WaitingForActivation;
        }
        if self.settings.commit_to_active_tree {
            // The commit was the activation.
            self.wait_for_ready_to_draw = true;
            self.did_activate();
        } else {
            self.has_pending_tree = true;
            self.pending_tree_is_ready_for_activation = false;
        }
    }

    fn did_activate(&mut self) {
        self.has_pending_tree = false;
        self.pending_tree_is_ready_for_activation = false;
        self.active_tree_needs_first_draw = true;
        self.needs_redraw = true;
        if self.output_surface_state == OutputSurfaceState::WaitingForFirstActivation {
            self.output_surface_state = OutputSurfaceState::Active;
        }
        if self.forced_redraw_state == ForcedRedrawState::WaitingForActivation {
            self.forced_redraw_state = ForcedRedrawState::WaitingForDraw;
        }
    }

    fn did_draw(&mut self, forced: bool, result: DrawResult) {
        self.did_draw_in_current_frame = true;
        self.needs_redraw = false;
        self.active_tree_needs_first_draw = false;
        if forced {
            self.forced_redraw_state = ForcedRedrawState::Idle;
        }

        match result {
            DrawResult::Success => {
                self.consecutive_checkerboard_animations = 0;
                self.forced_redraw_state = ForcedRedrawState::Idle;
            }
            DrawResult::AbortedCheckerboardAnimations => {
                self.needs_begin_main_frame = true;
                self.needs_redraw = true;
                self.consecutive_checkerboard_animations += 1;
                if self.settings.timeout_and_draw_when_animation_checkerboards
                    && self.forced_redraw_state == ForcedRedrawState::Idle
                    && self.consecutive_checkerboard_animations
                        >= self.settings.maximum_number_of_failed_draws_before_draw_is_forced
                {
                    // Forcing only makes sense once a commit brings new content.
                    log::debug!(
                        "[scheduler] {} checkerboarded draws, forcing the next one",
                        self.consecutive_checkerboard_animations
                    );
                    self.forced_redraw_state = ForcedRedrawState::WaitingForCommit;
                }
            }
            DrawResult::AbortedMissingHighResContent => {
                // Either pictures or memory are missing; a new tree fixes both.
                self.needs_begin_main_frame = true;
            }
            DrawResult::AbortedCantDraw | DrawResult::AbortedContextLost => {
                log::warn!("[scheduler] draw reported {result:?}");
            }
        }
    }

    pub fn set_visible(&mut self, visible: bool) {
        if self.visible == visible {
            return;
        }
        log::info!("[scheduler] visible: {visible}");
        self.visible = visible;
    }

    pub fn set_can_draw(&mut self, can_draw: bool) {
        self.can_draw = can_draw;
    }

    pub fn set_needs_redraw(&mut self) {
        self.needs_redraw = true;
    }

    pub fn set_needs_commit(&mut self) {
        self.needs_begin_main_frame = true;
    }

    pub fn set_needs_prepare_tiles(&mut self) {
        self.needs_prepare_tiles = true;
    }

    pub fn set_needs_one_begin_impl_frame(&mut self) {
        self.needs_one_begin_impl_frame = true;
    }

    pub fn begin_impl_frame(&mut self) {
        self.begin_impl_frame_state = BeginImplFrameState::InsideBeginFrame;
        self.needs_one_begin_impl_frame = false;
        self.did_draw_in_current_frame = false;
        self.did_send_begin_main_frame_for_current_frame = false;
        self.did_prepare_tiles_for_current_frame = false;
    }

    pub fn on_begin_impl_frame_deadline(&mut self) {
        self.begin_impl_frame_state = BeginImplFrameState::InsideDeadline;
    }

    pub fn on_begin_impl_frame_idle(&mut self) {
        self.begin_impl_frame_state = BeginImplFrameState::Idle;
    }

    pub fn notify_begin_main_frame_started(&mut self) {
        debug_assert_eq!(self.begin_main_frame_state, BeginMainFrameState::Sent);
        self.begin_main_frame_state = BeginMainFrameState::Started;
    }

    pub fn notify_ready_to_commit(&mut self) {
        debug_assert_eq!(self.begin_main_frame_state, BeginMainFrameState::Started);
        self.begin_main_frame_state = BeginMainFrameState::ReadyToCommit;
    }

    /// The main thread gave up on the frame. A handled frame had nothing to
    /// commit; otherwise the request is retried.
    pub fn begin_main_frame_aborted(&mut self, main_frame_handled: bool) {
        debug_assert!(matches!(
            self.begin_main_frame_state,
            BeginMainFrameState::Sent | BeginMainFrameState::Started
        ));
        self.begin_main_frame_state = BeginMainFrameState::Idle;
        if !main_frame_handled {
            self.needs_begin_main_frame = true;
        }
    }

    pub fn did_create_pending_tree(&mut self) {
        self.has_pending_tree = true;
        self.pending_tree_is_ready_for_activation = false;
    }

    pub fn notify_ready_to_activate(&mut self) {
        if self.has_pending_tree {
            self.pending_tree_is_ready_for_activation = true;
        }
    }

    pub fn notify_ready_to_draw(&mut self) {
        self.wait_for_ready_to_draw = false;
    }

    pub fn did_lose_output_surface(&mut self) {
        if matches!(
            self.output_surface_state,
            OutputSurfaceState::None | OutputSurfaceState::Creating
        ) {
            return;
        }
        log::warn!("[scheduler] output surface lost");
        self.output_surface_state = OutputSurfaceState::None;
        self.needs_redraw = false;
        self.wait_for_ready_to_draw = false;
    }

    pub fn did_create_output_surface(&mut self) {
        debug_assert_eq!(self.output_surface_state, OutputSurfaceState::Creating);
        self.output_surface_state = OutputSurfaceState::WaitingForFirstCommit;
        if self.did_create_first_output_surface {
            // A replacement surface has nothing drawn into it yet.
            self.needs_redraw = true;
            self.needs_begin_main_frame = true;
        }
        self.did_create_first_output_surface = true;
    }
}
