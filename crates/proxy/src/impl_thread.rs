use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;

use compositor_protocol::{
    DrawResult, HostImplClient, InputHandlerClient, RectF, ScrollState, SwapPromise, VectorF,
};
use crossbeam_channel::{Receiver, Sender, bounded, select, unbounded};
use frame_scheduler::{
    BeginMainFrameState, OutputSurfaceState, SchedulerAction, SchedulerSettings,
    SchedulerStateMachine,
};
use host_impl::{FrameData, LayerTreeHostImpl, LayerTreeSettings};
use rtrb::{Consumer, RingBuffer};
use tiles::Rasterizer;

use crate::{
    BeginMainFrameArgs, CommitPayload, ImplThreadMessage, InputGesture, MainThreadHandle,
    MainThreadMessage, OutputSurfaceFactory, ProxyConfig, ProxyError,
};

/// Scheduler actions run back to back before the inbox is looked at again.
const MAX_ACTIONS_PER_PASS: usize = 16;

/// Hints raised by the core while it runs. They are folded into the
/// scheduler once control is back in the loop, never from inside the core.
#[derive(Debug, Default)]
struct ClientHints {
    needs_commit: bool,
    needs_redraw: bool,
    needs_one_begin_impl_frame: bool,
    needs_prepare_tiles: bool,
    can_draw: Option<bool>,
    ready_to_activate: bool,
    ready_to_draw: bool,
    did_activate: bool,
    lost_output_surface: bool,
}

struct SchedulerClient {
    hints: Rc<RefCell<ClientHints>>,
}

impl HostImplClient for SchedulerClient {
    fn set_needs_commit_on_impl_thread(&mut self) {
        self.hints.borrow_mut().needs_commit = true;
    }

    fn set_needs_redraw_on_impl_thread(&mut self) {
        self.hints.borrow_mut().needs_redraw = true;
    }

    fn set_needs_redraw_rect_on_impl_thread(&mut self, _damage_rect: RectF) {
        self.hints.borrow_mut().needs_redraw = true;
    }

    fn set_needs_one_begin_impl_frame_on_impl_thread(&mut self) {
        self.hints.borrow_mut().needs_one_begin_impl_frame = true;
    }

    fn set_needs_prepare_tiles_on_impl_thread(&mut self) {
        self.hints.borrow_mut().needs_prepare_tiles = true;
    }

    fn on_can_draw_state_changed(&mut self, can_draw: bool) {
        self.hints.borrow_mut().can_draw = Some(can_draw);
    }

    fn notify_ready_to_activate(&mut self) {
        self.hints.borrow_mut().ready_to_activate = true;
    }

    fn notify_ready_to_draw(&mut self) {
        self.hints.borrow_mut().ready_to_draw = true;
    }

    fn did_activate_sync_tree(&mut self) {
        self.hints.borrow_mut().did_activate = true;
    }

    fn renew_tree_priority(&mut self) {
        log::trace!("[proxy] tree priority renewed");
    }

    fn did_lose_output_surface_on_impl_thread(&mut self) {
        self.hints.borrow_mut().lost_output_surface = true;
    }

    fn did_complete_page_scale_animation_on_impl_thread(&mut self) {
        log::debug!("[proxy] page scale animation complete");
    }
}

struct OverscrollForwarder {
    outbox: Sender<MainThreadMessage>,
}

impl InputHandlerClient for OverscrollForwarder {
    fn animate(&mut self, _monotonic_time: Instant) {}

    fn did_overscroll(&mut self, accumulated_overscroll: VectorF, latest_overscroll_delta: VectorF) {
        let message = MainThreadMessage::DidOverscroll {
            accumulated_overscroll,
            latest_overscroll_delta,
        };
        if self.outbox.send(message).is_err() {
            log::debug!("[proxy] overscroll dropped, main thread gone");
        }
    }

    fn will_shutdown(&mut self) {}
}

/// The impl thread's side of the proxy: the core, the scheduler that drives
/// it and the queues to the main thread.
pub struct ImplThread {
    host: LayerTreeHostImpl,
    scheduler: SchedulerStateMachine,
    hints: Rc<RefCell<ClientHints>>,
    output_surface_factory: Box<dyn OutputSurfaceFactory>,
    output_surface_creation_failed: bool,
    outbox: Sender<MainThreadMessage>,
    pending_commit: Option<Box<CommitPayload>>,
    /// Promises handed out with the last main frame, resolved by its commit.
    main_frame_swap_promises: Vec<Box<dyn SwapPromise>>,
    begin_frames_needed: bool,
}

impl ImplThread {
    pub fn spawn(
        config: ProxyConfig,
        settings: LayerTreeSettings,
        rasterizer: Arc<dyn Rasterizer>,
        output_surface_factory: impl OutputSurfaceFactory,
    ) -> Result<MainThreadHandle, ProxyError> {
        if config.inbox_capacity == 0 || config.input_ring_capacity == 0 {
            return Err(ProxyError::ZeroCapacity);
        }
        let (inbox_sender, inbox_receiver) = bounded(config.inbox_capacity);
        let (outbox_sender, outbox_receiver) = unbounded();
        let (input_producer, input_consumer) = RingBuffer::new(config.input_ring_capacity);
        let (notify_sender, notify_receiver) = bounded(1);
        let factory: Box<dyn OutputSurfaceFactory> = Box::new(output_surface_factory);

        let join_handle = std::thread::Builder::new()
            .name("compositor_impl".to_owned())
            .spawn(move || {
                let mut impl_thread = ImplThread::new(settings, rasterizer, factory, outbox_sender);
                if let Err(error) =
                    impl_thread.run(&inbox_receiver, input_consumer, &notify_receiver)
                {
                    log::warn!("[proxy] impl thread stopped: {error}");
                }
            })
            .map_err(|error| {
                log::error!("[proxy] spawn impl thread: {error}");
                ProxyError::SpawnFailed
            })?;

        Ok(MainThreadHandle {
            inbox: inbox_sender,
            outbox: outbox_receiver,
            input_producer,
            input_notify: notify_sender,
            join_handle: Some(join_handle),
        })
    }

    fn new(
        settings: LayerTreeSettings,
        rasterizer: Arc<dyn Rasterizer>,
        output_surface_factory: Box<dyn OutputSurfaceFactory>,
        outbox: Sender<MainThreadMessage>,
    ) -> Self {
        let scheduler = SchedulerStateMachine::new(SchedulerSettings {
            commit_to_active_tree: settings.commit_to_active_tree,
            ..SchedulerSettings::default()
        });
        let hints = Rc::new(RefCell::new(ClientHints::default()));
        let client = SchedulerClient {
            hints: hints.clone(),
        };
        let mut host = LayerTreeHostImpl::new(settings, Box::new(client), rasterizer);
        host.set_input_handler_client(Some(Box::new(OverscrollForwarder {
            outbox: outbox.clone(),
        })));

        Self {
            host,
            scheduler,
            hints,
            output_surface_factory,
            output_surface_creation_failed: false,
            outbox,
            pending_commit: None,
            main_frame_swap_promises: Vec::new(),
            begin_frames_needed: false,
        }
    }

    fn run(
        &mut self,
        inbox: &Receiver<ImplThreadMessage>,
        mut input: Consumer<InputGesture>,
        input_notify: &Receiver<()>,
    ) -> Result<(), ProxyError> {
        log::info!("[proxy] impl thread started");
        loop {
            let step: Result<bool, ProxyError> = select! {
                recv(inbox) -> message => match message {
                    Ok(message) => self.handle_message(message),
                    Err(_) => Err(ProxyError::MainThreadGone),
                },
                recv(input_notify) -> notified => notified
                    .map(|()| true)
                    .map_err(|_| ProxyError::MainThreadGone),
            };
            let keep_running = step?;

            while let Ok(gesture) = input.pop() {
                self.handle_gesture(gesture)?;
            }
            if !keep_running {
                break;
            }
            self.run_scheduled_actions()?;
            self.update_begin_frames_needed()?;
        }
        self.host.release_output_surface();
        log::info!("[proxy] impl thread stopped");
        Ok(())
    }

    /// Returns false on shutdown.
    fn handle_message(&mut self, message: ImplThreadMessage) -> Result<bool, ProxyError> {
        match message {
            ImplThreadMessage::Commit(payload) => self.receive_commit(payload),
            ImplThreadMessage::SetVisible(visible) => {
                self.host.set_visible(visible);
                self.scheduler.set_visible(visible);
                if visible {
                    self.retry_output_surface_creation()?;
                }
            }
            ImplThreadMessage::SetViewportSize(size) => self.host.set_viewport_size(size),
            ImplThreadMessage::SetMemoryPolicy(policy) => self.host.set_memory_policy(policy),
            ImplThreadMessage::SetNeedsCommit => self.scheduler.set_needs_commit(),
            ImplThreadMessage::SetNeedsRedraw => {
                self.host.set_full_root_layer_damage();
                self.host.set_needs_redraw();
            }
            ImplThreadMessage::BeginFrame(frame_time) => self.begin_impl_frame(frame_time)?,
            ImplThreadMessage::BeginMainFrameAborted { main_frame_handled } => {
                self.begin_main_frame_aborted(main_frame_handled);
            }
            ImplThreadMessage::Shutdown => {
                log::debug!("[proxy] shutdown requested");
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn handle_gesture(&mut self, gesture: InputGesture) -> Result<(), ProxyError> {
        match gesture {
            InputGesture::ScrollBegin {
                position,
                input_type,
            } => {
                let mut scroll_state = ScrollState::new(VectorF::zero(), position);
                let status = self.host.scroll_begin(&mut scroll_state, input_type);
                self.send_to_main(MainThreadMessage::DidScrollBegin(status))?;
            }
            InputGesture::ScrollUpdate { position, delta } => {
                let mut scroll_state = ScrollState::new(delta, position);
                let result = self.host.scroll_by(&mut scroll_state);
                log::trace!(
                    "[proxy] scroll update delta={delta:?} did_scroll={} unused={:?}",
                    result.did_scroll,
                    result.unused_scroll_delta
                );
            }
            InputGesture::ScrollEnd { position } => {
                let mut scroll_state = ScrollState::new(VectorF::zero(), position);
                self.host.scroll_end(&mut scroll_state);
            }
            InputGesture::FlingStart => {
                let status = self.host.fling_scroll_begin();
                self.send_to_main(MainThreadMessage::DidScrollBegin(status))?;
            }
            InputGesture::PinchBegin => self.host.pinch_gesture_begin(),
            InputGesture::PinchUpdate {
                magnify_delta,
                anchor,
            } => self.host.pinch_gesture_update(magnify_delta, anchor),
            InputGesture::PinchEnd => self.host.pinch_gesture_end(),
        }
        Ok(())
    }

    fn receive_commit(&mut self, payload: Box<CommitPayload>) {
        match self.scheduler.begin_main_frame_state() {
            BeginMainFrameState::Idle => {
                log::warn!("[proxy] commit without a main frame, asking for a new one");
                self.scheduler.set_needs_commit();
                return;
            }
            BeginMainFrameState::Sent => {
                self.scheduler.notify_begin_main_frame_started();
                self.scheduler.notify_ready_to_commit();
            }
            BeginMainFrameState::Started => self.scheduler.notify_ready_to_commit(),
            BeginMainFrameState::ReadyToCommit => {
                log::warn!("[proxy] second commit for one main frame replaces the first");
            }
        }
        self.pending_commit = Some(payload);
    }

    fn begin_main_frame_aborted(&mut self, main_frame_handled: bool) {
        if !matches!(
            self.scheduler.begin_main_frame_state(),
            BeginMainFrameState::Sent | BeginMainFrameState::Started
        ) {
            log::warn!("[proxy] abort for a main frame that is not running");
            return;
        }
        self.scheduler.begin_main_frame_aborted(main_frame_handled);
        self.host.begin_main_frame_aborted(main_frame_handled);
        if main_frame_handled {
            let tree = self.host.active_tree_mut();
            for promise in self.main_frame_swap_promises.drain(..) {
                tree.queue_swap_promise(promise);
            }
        }
    }

    fn begin_impl_frame(&mut self, frame_time: Instant) -> Result<(), ProxyError> {
        self.retry_output_surface_creation()?;
        self.scheduler.begin_impl_frame();
        self.host.will_begin_impl_frame(frame_time);
        self.host.check_for_completed_tile_tasks();
        self.run_scheduled_actions()?;

        self.scheduler.on_begin_impl_frame_deadline();
        self.run_scheduled_actions()?;

        self.host.did_finish_impl_frame();
        self.scheduler.on_begin_impl_frame_idle();
        Ok(())
    }

    fn run_scheduled_actions(&mut self) -> Result<(), ProxyError> {
        for _ in 0..MAX_ACTIONS_PER_PASS {
            self.apply_client_hints()?;
            let action = self.scheduler.next_action();
            if action == SchedulerAction::None {
                return Ok(());
            }
            log::trace!("[proxy] scheduled action {action:?}");
            self.perform(action)?;
        }
        log::warn!("[proxy] scheduler still busy after {MAX_ACTIONS_PER_PASS} actions");
        self.apply_client_hints()
    }

    fn perform(&mut self, action: SchedulerAction) -> Result<(), ProxyError> {
        match action {
            SchedulerAction::None => {}
            SchedulerAction::BeginOutputSurfaceCreation => {
                self.scheduler.did_perform(action, None);
                self.create_output_surface()?;
            }
            SchedulerAction::SendBeginMainFrame => {
                self.send_begin_main_frame()?;
                self.scheduler.did_perform(action, None);
            }
            SchedulerAction::Commit => self.commit(),
            SchedulerAction::ActivateSyncTree => {
                self.host.activate_sync_tree();
                self.scheduler.did_perform(action, None);
            }
            SchedulerAction::DrawAndSwapIfPossible => {
                let result = self.draw_and_swap(false)?;
                self.scheduler.did_perform(action, Some(result));
            }
            SchedulerAction::DrawAndSwapForced => {
                let result = self.draw_and_swap(true)?;
                self.scheduler.did_perform(action, Some(result));
            }
            SchedulerAction::PrepareTiles => {
                self.host.prepare_tiles();
                self.scheduler.did_perform(action, None);
                self.host.check_for_completed_tile_tasks();
            }
        }
        Ok(())
    }

    fn apply_client_hints(&mut self) -> Result<(), ProxyError> {
        let hints = self.hints.take();
        if let Some(can_draw) = hints.can_draw {
            self.scheduler.set_can_draw(can_draw);
        }
        if hints.needs_commit {
            self.scheduler.set_needs_commit();
        }
        if hints.needs_redraw {
            self.scheduler.set_needs_redraw();
        }
        if hints.needs_one_begin_impl_frame {
            self.scheduler.set_needs_one_begin_impl_frame();
        }
        if hints.needs_prepare_tiles {
            self.scheduler.set_needs_prepare_tiles();
        }
        if hints.ready_to_activate {
            self.scheduler.notify_ready_to_activate();
        }
        if hints.ready_to_draw {
            self.scheduler.notify_ready_to_draw();
        }
        if hints.did_activate {
            let source_frame_number = self.host.active_tree().source_frame_number();
            self.send_to_main(MainThreadMessage::DidActivate {
                source_frame_number,
            })?;
        }
        if hints.lost_output_surface {
            self.scheduler.did_lose_output_surface();
            self.send_to_main(MainThreadMessage::DidLoseOutputSurface)?;
        }
        Ok(())
    }

    fn create_output_surface(&mut self) -> Result<(), ProxyError> {
        let output_surface = self.output_surface_factory.create_output_surface();
        match self.host.initialize_renderer(output_surface) {
            Ok(()) => {
                self.output_surface_creation_failed = false;
                self.scheduler.did_create_output_surface();
                Ok(())
            }
            Err(error) => {
                log::warn!("[proxy] output surface creation failed: {error}");
                self.output_surface_creation_failed = true;
                self.send_to_main(MainThreadMessage::DidFailToInitializeOutputSurface(error))
            }
        }
    }

    /// A failed creation leaves the scheduler waiting on a surface; the next
    /// frame or visibility change tries again.
    fn retry_output_surface_creation(&mut self) -> Result<(), ProxyError> {
        if self.output_surface_creation_failed
            && self.scheduler.output_surface_state() == OutputSurfaceState::Creating
        {
            self.create_output_surface()?;
        }
        Ok(())
    }

    fn send_begin_main_frame(&mut self) -> Result<(), ProxyError> {
        let deltas = self.host.process_scroll_deltas();
        self.main_frame_swap_promises.extend(deltas.swap_promises);
        let args = BeginMainFrameArgs {
            frame_time: self.host.current_begin_frame_time(),
            scrolls: deltas.scrolls,
            page_scale_delta: deltas.page_scale_delta,
            top_controls_delta: deltas.top_controls_delta,
        };
        log::debug!(
            "[proxy] begin main frame scrolls={} page_scale_delta={}",
            args.scrolls.len(),
            args.page_scale_delta
        );
        self.send_to_main(MainThreadMessage::BeginMainFrame(args))
    }

    fn commit(&mut self) {
        let Some(payload) = self.pending_commit.take() else {
            debug_assert!(false, "commit scheduled without a payload");
            log::warn!("[proxy] commit scheduled without a payload");
            return;
        };
        let CommitPayload {
            mut tree,
            max_memory_needed_bytes,
        } = *payload;

        self.host.begin_commit();
        let sync_tree = self.host.sync_tree_mut();
        layer_tree::synchronize_trees(&mut tree, sync_tree);
        tree.push_properties_to(sync_tree);
        for promise in self.main_frame_swap_promises.drain(..) {
            sync_tree.queue_swap_promise(promise);
        }
        if let Some(bytes) = max_memory_needed_bytes {
            self.host.set_max_memory_needed_bytes(bytes);
        }
        self.host.commit_complete();
        self.scheduler.did_perform(SchedulerAction::Commit, None);

        if self.host.commit_to_active_tree() {
            self.host.activate_sync_tree();
        }
        self.host.check_for_completed_tile_tasks();
    }

    /// A forced draw goes ahead even when the frame is incomplete.
    fn draw_and_swap(&mut self, forced: bool) -> Result<DrawResult, ProxyError> {
        if !self.host.can_draw() {
            log::debug!("[proxy] draw skipped, host cannot draw");
            return Ok(DrawResult::AbortedCantDraw);
        }
        let mut frame = FrameData::default();
        let mut result = self.host.prepare_to_draw(&mut frame);
        if forced && result != DrawResult::Success {
            log::debug!("[proxy] forcing draw despite {result:?}");
            result = DrawResult::Success;
        }
        if result == DrawResult::Success {
            self.host.draw_layers(&mut frame);
        }
        self.host.did_draw_all_layers(&mut frame);

        if result == DrawResult::Success && self.host.swap_buffers(&frame) {
            let source_frame_number = self.host.active_tree().source_frame_number();
            self.send_to_main(MainThreadMessage::DidSwap {
                source_frame_number,
            })?;
        }
        Ok(result)
    }

    fn update_begin_frames_needed(&mut self) -> Result<(), ProxyError> {
        let needed = self.scheduler.begin_frame_needed();
        if needed == self.begin_frames_needed {
            return Ok(());
        }
        self.begin_frames_needed = needed;
        self.send_to_main(MainThreadMessage::SetNeedsBeginFrames(needed))
    }

    fn send_to_main(&self, message: MainThreadMessage) -> Result<(), ProxyError> {
        self.outbox
            .send(message)
            .map_err(|_| ProxyError::MainThreadGone)
    }
}
