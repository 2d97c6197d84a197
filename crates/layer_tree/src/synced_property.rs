//! Values owned by the main thread but adjusted on the impl thread between commits.
//!
//! The main thread commits a `base`. Impl-side input accumulates a `delta` on top of it.
//! `pull_delta_for_main_thread` snapshots the delta into `sent_delta`; the next commit
//! (or an aborted frame the main thread handled) folds the sent part into the base.

use std::fmt::Debug;

use compositor_protocol::VectorF;

pub trait SyncGroup {
    type Value: Copy + PartialEq + Debug;

    fn identity() -> Self::Value;
    fn combine(base: Self::Value, delta: Self::Value) -> Self::Value;
    /// The delta that takes `from` to `to`.
    fn difference(to: Self::Value, from: Self::Value) -> Self::Value;
}

#[derive(Debug, Clone, Copy)]
pub struct ScaleGroup;

impl SyncGroup for ScaleGroup {
    type Value = f32;

    fn identity() -> f32 {
        1.0
    }

    fn combine(base: f32, delta: f32) -> f32 {
        base * delta
    }

    fn difference(to: f32, from: f32) -> f32 {
        if from == 0.0 { 1.0 } else { to / from }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AdditiveGroup;

impl SyncGroup for AdditiveGroup {
    type Value = f32;

    fn identity() -> f32 {
        0.0
    }

    fn combine(base: f32, delta: f32) -> f32 {
        base + delta
    }

    fn difference(to: f32, from: f32) -> f32 {
        to - from
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ScrollOffsetGroup;

impl SyncGroup for ScrollOffsetGroup {
    type Value = VectorF;

    fn identity() -> VectorF {
        VectorF::zero()
    }

    fn combine(base: VectorF, delta: VectorF) -> VectorF {
        base + delta
    }

    fn difference(to: VectorF, from: VectorF) -> VectorF {
        to - from
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncedProperty<G: SyncGroup> {
    base: G::Value,
    delta: G::Value,
    sent_delta: G::Value,
}

pub type SyncedScale = SyncedProperty<ScaleGroup>;
pub type SyncedTopControls = SyncedProperty<AdditiveGroup>;
pub type SyncedScrollOffset = SyncedProperty<ScrollOffsetGroup>;

impl<G: SyncGroup> Default for SyncedProperty<G> {
    fn default() -> Self {
        Self::new(G::identity())
    }
}

impl<G: SyncGroup> SyncedProperty<G> {
    pub fn new(base: G::Value) -> Self {
        Self {
            base,
            delta: G::identity(),
            sent_delta: G::identity(),
        }
    }

    pub fn current(&self) -> G::Value {
        G::combine(self.base, self.delta)
    }

    pub fn base(&self) -> G::Value {
        self.base
    }

    pub fn delta(&self) -> G::Value {
        self.delta
    }

    pub fn sent_delta(&self) -> G::Value {
        self.sent_delta
    }

    /// Returns true when the current value changed.
    pub fn set_current(&mut self, value: G::Value) -> bool {
        let previous = self.current();
        self.delta = G::difference(value, self.base);
        previous != self.current()
    }

    pub fn pull_delta_for_main_thread(&mut self) -> G::Value {
        self.sent_delta = self.delta;
        self.delta
    }

    /// Records that only `sent` (for example a rounded delta) went to the main thread.
    pub fn set_sent_delta(&mut self, sent: G::Value) {
        self.sent_delta = sent;
    }

    /// Commit path: the main thread has folded the sent delta into `base`.
    pub fn push_from_main_thread(&mut self, base: G::Value) {
        self.base = base;
        self.delta = G::difference(self.delta, self.sent_delta);
        self.sent_delta = G::identity();
    }

    /// Activation path: take the committed base from the pending tree and drop
    /// the part of the local delta the commit already accounted for.
    pub fn push_pending_to_active(&mut self, pending: &SyncedProperty<G>) {
        self.base = pending.base;
        self.delta = G::difference(self.delta, self.sent_delta);
        self.sent_delta = G::identity();
    }

    /// Main frame aborted after the main thread consumed the sent delta.
    pub fn abort_commit(&mut self, main_frame_handled: bool) {
        if main_frame_handled {
            self.base = G::combine(self.base, self.sent_delta);
            self.delta = G::difference(self.delta, self.sent_delta);
        }
        self.sent_delta = G::identity();
    }

    /// Keeps only the committed base. Used when a tree is rebuilt from scratch.
    pub fn reset_to_base(&mut self) {
        self.delta = G::identity();
        self.sent_delta = G::identity();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_delta_is_multiplicative() {
        let mut scale = SyncedScale::new(2.0);
        assert!(scale.set_current(3.0));
        assert!((scale.delta() - 1.5).abs() < 1e-6);
        assert!((scale.pull_delta_for_main_thread() - 1.5).abs() < 1e-6);

        scale.set_current(6.0);
        scale.push_from_main_thread(3.0);
        assert!((scale.current() - 6.0).abs() < 1e-5);
        assert!((scale.sent_delta() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn activation_drops_the_sent_scroll_delta() {
        let mut active = SyncedScrollOffset::new(VectorF::new(0.0, 10.0));
        active.set_current(VectorF::new(0.0, 30.0));
        active.pull_delta_for_main_thread();
        active.set_current(VectorF::new(0.0, 35.0));

        let pending = SyncedScrollOffset::new(VectorF::new(0.0, 30.0));
        active.push_pending_to_active(&pending);

        assert_eq!(active.base(), VectorF::new(0.0, 30.0));
        assert_eq!(active.current(), VectorF::new(0.0, 35.0));
    }

    #[test]
    fn handled_abort_folds_sent_delta_into_base() {
        let mut offset = SyncedScrollOffset::new(VectorF::zero());
        offset.set_current(VectorF::new(5.0, 0.0));
        offset.pull_delta_for_main_thread();
        offset.abort_commit(true);

        assert_eq!(offset.base(), VectorF::new(5.0, 0.0));
        assert_eq!(offset.delta(), VectorF::zero());
        assert_eq!(offset.current(), VectorF::new(5.0, 0.0));
    }
}
