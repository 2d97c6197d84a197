use std::collections::{BTreeMap, HashMap, HashSet};

use compositor_protocol::{IntPoint, IntRect, IntSize, LayerId, ResourceFormat, ResourceId};

use crate::memory_policy::{GlobalTileState, TileMemoryLimitPolicy, TreePriority};
use crate::raster::{NamespaceToken, RasterOutcome, RasterTask, TaskGraphError, TaskGraphRunner};
use crate::resource_pool::ResourcePool;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WhichTree {
    Active,
    Pending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PriorityBin {
    Now,
    Soon,
    Eventually,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileState {
    Missing,
    Scheduled,
    Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileManagerSettings {
    pub tile_size: IntSize,
    pub interest_margin: i32,
    pub scheduled_raster_task_limit: usize,
}

impl Default for TileManagerSettings {
    fn default() -> Self {
        Self {
            tile_size: IntSize::new(256, 256),
            interest_margin: 256,
            scheduled_raster_task_limit: 32,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileManagerNotification {
    ReadyToActivate,
    ReadyToDraw,
    AllTileTasksCompleted,
    TileStateChanged { layer: LayerId, required_for_draw: bool },
}

/// What the draw path needs to emit a quad for one tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileDrawInfo {
    pub rect: IntRect,
    pub resource_id: Option<ResourceId>,
    pub required_for_draw: bool,
}

impl TileDrawInfo {
    pub fn is_ready(&self) -> bool {
        self.resource_id.is_some()
    }
}

#[derive(Debug, Clone)]
struct Tile {
    layer: LayerId,
    tree: WhichTree,
    content_rect: IntRect,
    bin: PriorityBin,
    required_for_activation: bool,
    required_for_draw: bool,
    state: TileState,
    resource: Option<ResourceId>,
    denied_memory: bool,
}

impl Tile {
    fn is_required(&self) -> bool {
        self.required_for_activation || self.required_for_draw
    }

    /// Denied tiles count as satisfied so a tight budget cannot stall activation.
    fn satisfies_requirement(&self) -> bool {
        self.state == TileState::Ready || self.denied_memory
    }
}

#[derive(Debug, Clone)]
struct Tiling {
    visible_rect: IntRect,
    tiles: BTreeMap<(i32, i32), TileId>,
}

impl Tiling {
    fn empty() -> Self {
        Self {
            visible_rect: IntRect::zero(),
            tiles: BTreeMap::new(),
        }
    }
}

/// Owns the tiles of every picture layer and decides which get memory and raster.
pub struct TileManager {
    settings: TileManagerSettings,
    runner: Box<dyn TaskGraphRunner>,
    namespace: NamespaceToken,
    on_demand_namespace: NamespaceToken,
    resource_pool: Option<ResourcePool>,
    tiles: HashMap<TileId, Tile>,
    tilings: HashMap<(LayerId, WhichTree), Tiling>,
    next_tile_id: u64,
    global_state: GlobalTileState,
    orphaned_resources: HashSet<ResourceId>,
    notifications: Vec<TileManagerNotification>,
    signaled_ready_to_activate: bool,
    signaled_ready_to_draw: bool,
    signaled_all_tasks_completed: bool,
}

impl TileManager {
    pub fn new(settings: TileManagerSettings, mut runner: Box<dyn TaskGraphRunner>) -> Self {
        let namespace = runner.generate_namespace_token();
        let on_demand_namespace = runner.generate_namespace_token();
        Self {
            settings,
            runner,
            namespace,
            on_demand_namespace,
            resource_pool: None,
            tiles: HashMap::new(),
            tilings: HashMap::new(),
            next_tile_id: 1,
            global_state: GlobalTileState::default(),
            orphaned_resources: HashSet::new(),
            notifications: Vec::new(),
            signaled_ready_to_activate: false,
            signaled_ready_to_draw: false,
            signaled_all_tasks_completed: false,
        }
    }

    pub fn settings(&self) -> &TileManagerSettings {
        &self.settings
    }

    pub fn global_state(&self) -> &GlobalTileState {
        &self.global_state
    }

    pub fn set_resources(&mut self, resource_pool: ResourcePool) {
        self.resource_pool = Some(resource_pool);
    }

    pub fn has_resources(&self) -> bool {
        self.resource_pool.is_some()
    }

    pub fn resource_pool(&self) -> Option<&ResourcePool> {
        self.resource_pool.as_ref()
    }

    /// Caps what the pool may keep alive. Returns false without a pool.
    pub fn set_resource_usage_limits(&mut self, max_memory_usage_bytes: usize, max_resource_count: usize) -> bool {
        let Some(pool) = self.resource_pool.as_mut() else {
            return false;
        };
        pool.set_resource_usage_limits(max_memory_usage_bytes, max_resource_count);
        true
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    pub fn scheduled_task_count(&self) -> usize {
        self.tiles
            .values()
            .filter(|tile| tile.state == TileState::Scheduled)
            .count()
    }

    pub fn has_tiling(&self, layer: LayerId, tree: WhichTree) -> bool {
        self.tilings.contains_key(&(layer, tree))
    }

    /// Rebuilds the tile grid of one layer on one tree and recomputes tile priorities.
    ///
    /// `visible_rect` and `invalidation` are in layer space. Invalidated tiles lose
    /// their raster and return to `Missing`.
    pub fn update_layer_tiling(
        &mut self,
        layer: LayerId,
        tree: WhichTree,
        bounds: IntSize,
        visible_rect: IntRect,
        invalidation: &[IntRect],
    ) {
        let tile_size = self.settings.tile_size;
        if tile_size.width <= 0 || tile_size.height <= 0 {
            panic!("tile size must be positive: {tile_size:?}");
        }
        let columns = ceil_div(bounds.width.max(0), tile_size.width);
        let rows = ceil_div(bounds.height.max(0), tile_size.height);
        let layer_rect = IntRect::new(IntPoint::origin(), bounds);
        let interest_rect = visible_rect
            .inflate(self.settings.interest_margin, self.settings.interest_margin)
            .intersection(&layer_rect);

        let mut tiling = self.tilings.remove(&(layer, tree)).unwrap_or_else(Tiling::empty);
        let stale: Vec<(i32, i32)> = tiling
            .tiles
            .keys()
            .filter(|(i, j)| *i >= columns || *j >= rows)
            .copied()
            .collect();
        for index in stale {
            if let Some(id) = tiling.tiles.remove(&index) {
                self.drop_tile(id);
            }
        }

        for j in 0..rows {
            for i in 0..columns {
                let origin = IntPoint::new(i * tile_size.width, j * tile_size.height);
                let Some(content_rect) = IntRect::new(origin, tile_size).intersection(&layer_rect) else {
                    continue;
                };
                let bin = if content_rect.intersects(&visible_rect) {
                    PriorityBin::Now
                } else if interest_rect.is_some_and(|interest| content_rect.intersects(&interest)) {
                    PriorityBin::Soon
                } else {
                    PriorityBin::Eventually
                };

                let id = match tiling.tiles.get(&(i, j)) {
                    Some(&id) => id,
                    None if bin == PriorityBin::Eventually => continue,
                    None => {
                        let id = TileId(self.next_tile_id);
                        self.next_tile_id += 1;
                        self.tiles.insert(
                            id,
                            Tile {
                                layer,
                                tree,
                                content_rect,
                                bin,
                                required_for_activation: false,
                                required_for_draw: false,
                                state: TileState::Missing,
                                resource: None,
                                denied_memory: false,
                            },
                        );
                        tiling.tiles.insert((i, j), id);
                        id
                    }
                };

                let invalidated = invalidation
                    .iter()
                    .any(|rect| rect.intersects(&content_rect));
                let Some(tile) = self.tiles.get_mut(&id) else {
                    continue;
                };
                tile.content_rect = content_rect;
                tile.bin = bin;
                tile.required_for_activation = tree == WhichTree::Pending && bin == PriorityBin::Now;
                tile.required_for_draw = tree == WhichTree::Active && bin == PriorityBin::Now;
                if invalidated {
                    let resource = tile.resource.take();
                    let was_scheduled = tile.state == TileState::Scheduled;
                    tile.state = TileState::Missing;
                    self.discard_resource(resource, was_scheduled);
                }
            }
        }

        tiling.visible_rect = visible_rect;
        self.tilings.insert((layer, tree), tiling);
    }

    /// Drops the tilings of `tree` whose layer is not in `live_layers`.
    pub fn retain_layers(&mut self, tree: WhichTree, live_layers: &HashSet<LayerId>) {
        let dead: Vec<(LayerId, WhichTree)> = self
            .tilings
            .keys()
            .filter(|(layer, which)| *which == tree && !live_layers.contains(layer))
            .copied()
            .collect();
        for key in dead {
            self.remove_tiling(key);
        }
    }

    /// Pending tilings replace the active ones of the same layer.
    pub fn activate_pending_tilings(&mut self) {
        let pending: Vec<LayerId> = self
            .tilings
            .keys()
            .filter(|(_, tree)| *tree == WhichTree::Pending)
            .map(|(layer, _)| *layer)
            .collect();
        for layer in pending {
            self.remove_tiling((layer, WhichTree::Active));
            let Some(tiling) = self.tilings.remove(&(layer, WhichTree::Pending)) else {
                continue;
            };
            for id in tiling.tiles.values() {
                if let Some(tile) = self.tiles.get_mut(id) {
                    tile.tree = WhichTree::Active;
                    tile.required_for_draw = tile.bin == PriorityBin::Now;
                    tile.required_for_activation = false;
                }
            }
            self.tilings.insert((layer, WhichTree::Active), tiling);
        }
    }

    fn remove_tiling(&mut self, key: (LayerId, WhichTree)) {
        if let Some(tiling) = self.tilings.remove(&key) {
            for id in tiling.tiles.into_values() {
                self.drop_tile(id);
            }
        }
    }

    fn drop_tile(&mut self, id: TileId) {
        if let Some(tile) = self.tiles.remove(&id) {
            self.discard_resource(tile.resource, tile.state == TileState::Scheduled);
        }
    }

    /// A resource still being rastered is released when its task completes.
    fn discard_resource(&mut self, resource: Option<ResourceId>, in_flight: bool) {
        let Some(resource) = resource else {
            return;
        };
        if in_flight {
            self.orphaned_resources.insert(resource);
        } else if let Some(pool) = self.resource_pool.as_mut() {
            pool.release_resource(resource);
        }
    }

    fn tree_rank(&self, tree: WhichTree) -> u8 {
        match (self.global_state.tree_priority, tree) {
            (TreePriority::SamePriorityForBothTrees, _) => 0,
            (TreePriority::SmoothnessTakesPriority, WhichTree::Active) => 0,
            (TreePriority::SmoothnessTakesPriority, WhichTree::Pending) => 1,
            (TreePriority::NewContentTakesPriority, WhichTree::Pending) => 0,
            (TreePriority::NewContentTakesPriority, WhichTree::Active) => 1,
        }
    }

    fn tile_bytes(&self) -> usize {
        let size = self.settings.tile_size;
        size.width as usize * size.height as usize * ResourceFormat::Rgba8888.bytes_per_pixel()
    }

    /// Assigns memory to tiles in priority order and schedules raster for the
    /// ones that got memory. Returns false when there are no resources to work with.
    pub fn prepare_tiles(&mut self, state: &GlobalTileState) -> bool {
        if self.resource_pool.is_none() {
            return false;
        }
        self.global_state = *state;
        self.signaled_ready_to_activate = false;
        self.signaled_ready_to_draw = false;
        self.signaled_all_tasks_completed = false;
        self.flush_completed_tasks();
        if let Some(pool) = self.resource_pool.as_mut() {
            pool.check_busy_resources();
        }

        let mut ordered: Vec<(u8, u8, u8, TileId)> = self
            .tiles
            .iter()
            .map(|(id, tile)| {
                (
                    tile.bin as u8,
                    u8::from(!tile.is_required()),
                    self.tree_rank(tile.tree),
                    *id,
                )
            })
            .collect();
        ordered.sort_unstable();

        let tile_bytes = self.tile_bytes();
        let mut used_bytes = 0usize;
        let mut resource_count = 0usize;
        let mut out_of_memory = false;
        let mut scheduled = self.scheduled_task_count();
        let mut to_evict = Vec::new();
        let mut to_schedule = Vec::new();

        for &(_, _, _, id) in &ordered {
            let Some(tile) = self.tiles.get(&id) else {
                continue;
            };
            let allowed = match state.memory_limit_policy {
                TileMemoryLimitPolicy::AllowNothing => false,
                TileMemoryLimitPolicy::AllowAbsoluteMinimum => tile.is_required(),
                TileMemoryLimitPolicy::AllowPrepaintOnly => tile.bin != PriorityBin::Eventually,
                TileMemoryLimitPolicy::AllowAnything => true,
            };
            // Visible tiles may use the hard limit, prepaint stays under the soft one.
            let limit = if tile.bin == PriorityBin::Now {
                state.hard_memory_limit_in_bytes
            } else {
                state.soft_memory_limit_in_bytes
            };
            let fits = used_bytes + tile_bytes <= limit && resource_count < state.num_resources_limit;
            if !allowed || out_of_memory || !fits {
                if allowed {
                    out_of_memory = true;
                }
                to_evict.push((id, allowed));
                continue;
            }

            used_bytes += tile_bytes;
            resource_count += 1;
            if tile.state == TileState::Missing && scheduled < self.settings.scheduled_raster_task_limit {
                to_schedule.push(id);
                scheduled += 1;
            }
        }

        for (id, denied_by_budget) in to_evict {
            let Some(tile) = self.tiles.get_mut(&id) else {
                continue;
            };
            tile.denied_memory = denied_by_budget || tile.is_required();
            let resource = tile.resource.take();
            let was_scheduled = tile.state == TileState::Scheduled;
            tile.state = TileState::Missing;
            self.discard_resource(resource, was_scheduled);
        }

        let mut tasks = Vec::with_capacity(to_schedule.len());
        for id in to_schedule {
            let Some(pool) = self.resource_pool.as_mut() else {
                break;
            };
            let Some(tile) = self.tiles.get_mut(&id) else {
                continue;
            };
            let resource_id = pool.acquire_resource(self.settings.tile_size, ResourceFormat::Rgba8888);
            tile.denied_memory = false;
            tile.state = TileState::Scheduled;
            tile.resource = Some(resource_id);
            tasks.push(RasterTask {
                tile: id,
                content_rect: tile.content_rect,
                resource_id,
            });
        }

        if out_of_memory {
            log::info!(
                "[tiles] memory budget exhausted: hard={} soft={} resources={}",
                state.hard_memory_limit_in_bytes,
                state.soft_memory_limit_in_bytes,
                resource_count
            );
        }
        if !tasks.is_empty() {
            log::trace!("[tiles] scheduling {} raster tasks", tasks.len());
            if let Err(error) = self.runner.schedule(self.namespace, tasks.clone()) {
                log::warn!("[tiles] raster scheduling failed: {error}");
                for task in tasks {
                    self.fail_task(task);
                }
            }
        }
        self.check_readiness();
        true
    }

    /// Collects finished raster work and emits readiness notifications.
    pub fn flush(&mut self) {
        self.flush_completed_tasks();
        self.check_readiness();
    }

    fn flush_completed_tasks(&mut self) {
        for completed in self.runner.collect_completed(self.namespace) {
            match completed.outcome {
                RasterOutcome::Completed => self.complete_task(completed.task),
                RasterOutcome::Failed => self.fail_task(completed.task),
            }
        }
    }

    fn complete_task(&mut self, task: RasterTask) {
        if self.orphaned_resources.remove(&task.resource_id) {
            if let Some(pool) = self.resource_pool.as_mut() {
                pool.release_resource(task.resource_id);
            }
            return;
        }
        let Some(tile) = self.tiles.get_mut(&task.tile) else {
            return;
        };
        if tile.resource != Some(task.resource_id) {
            return;
        }
        tile.state = TileState::Ready;
        self.notifications.push(TileManagerNotification::TileStateChanged {
            layer: tile.layer,
            required_for_draw: tile.required_for_draw,
        });
    }

    fn fail_task(&mut self, task: RasterTask) {
        let orphaned = self.orphaned_resources.remove(&task.resource_id);
        let owned_by_tile = match self.tiles.get_mut(&task.tile) {
            Some(tile) if tile.resource == Some(task.resource_id) => {
                tile.resource = None;
                tile.state = TileState::Missing;
                true
            }
            _ => false,
        };
        if orphaned || owned_by_tile {
            if let Some(pool) = self.resource_pool.as_mut() {
                pool.release_resource(task.resource_id);
            }
        }
    }

    fn check_readiness(&mut self) {
        if !self.signaled_ready_to_activate
            && self
                .tiles
                .values()
                .filter(|tile| tile.required_for_activation)
                .all(Tile::satisfies_requirement)
        {
            self.signaled_ready_to_activate = true;
            self.notifications.push(TileManagerNotification::ReadyToActivate);
        }
        if !self.signaled_ready_to_draw
            && self
                .tiles
                .values()
                .filter(|tile| tile.required_for_draw)
                .all(Tile::satisfies_requirement)
        {
            self.signaled_ready_to_draw = true;
            self.notifications.push(TileManagerNotification::ReadyToDraw);
        }
        if !self.signaled_all_tasks_completed && self.scheduled_task_count() == 0 {
            self.signaled_all_tasks_completed = true;
            self.notifications
                .push(TileManagerNotification::AllTileTasksCompleted);
        }
    }

    pub fn take_notifications(&mut self) -> Vec<TileManagerNotification> {
        std::mem::take(&mut self.notifications)
    }

    /// Tiles of `layer` covering its visible rect, in row-major order.
    pub fn tile_draw_info(&self, layer: LayerId, tree: WhichTree) -> Vec<TileDrawInfo> {
        let Some(tiling) = self.tilings.get(&(layer, tree)) else {
            return Vec::new();
        };
        let mut ordered: Vec<(&(i32, i32), &TileId)> = tiling.tiles.iter().collect();
        ordered.sort_by_key(|((i, j), _)| (*j, *i));
        ordered
            .into_iter()
            .filter_map(|(_, id)| self.tiles.get(id))
            .filter(|tile| tile.content_rect.intersects(&tiling.visible_rect))
            .map(|tile| TileDrawInfo {
                rect: tile.content_rect,
                resource_id: match tile.state {
                    TileState::Ready => tile.resource,
                    TileState::Missing | TileState::Scheduled => None,
                },
                required_for_draw: tile.required_for_draw,
            })
            .collect()
    }

    /// Rasters the missing visible tiles of one layer right now, blocking on the
    /// dedicated namespace. Returns how many tiles became ready.
    pub fn run_on_demand_raster(&mut self, layer: LayerId, tree: WhichTree) -> Result<usize, TaskGraphError> {
        let Some(tiling) = self.tilings.get(&(layer, tree)) else {
            return Ok(0);
        };
        let visible_rect = tiling.visible_rect;
        let candidates: Vec<TileId> = tiling.tiles.values().copied().collect();
        let Some(pool) = self.resource_pool.as_mut() else {
            return Ok(0);
        };

        let mut tasks = Vec::new();
        for id in candidates {
            let Some(tile) = self.tiles.get_mut(&id) else {
                continue;
            };
            if tile.state != TileState::Missing || !tile.content_rect.intersects(&visible_rect) {
                continue;
            }
            let resource_id = pool.acquire_resource(self.settings.tile_size, ResourceFormat::Rgba8888);
            tile.state = TileState::Scheduled;
            tile.resource = Some(resource_id);
            tasks.push(RasterTask {
                tile: id,
                content_rect: tile.content_rect,
                resource_id,
            });
        }
        if tasks.is_empty() {
            return Ok(0);
        }

        self.runner.schedule(self.on_demand_namespace, tasks)?;
        self.runner
            .wait_for_tasks_to_finish_running(self.on_demand_namespace)?;
        let mut rastered = 0;
        for completed in self.runner.collect_completed(self.on_demand_namespace) {
            match completed.outcome {
                RasterOutcome::Completed => {
                    self.complete_task(completed.task);
                    rastered += 1;
                }
                RasterOutcome::Failed => self.fail_task(completed.task),
            }
        }
        Ok(rastered)
    }

    /// Gives every tile's raster back to the pool; tiles stay and return to `Missing`.
    pub fn release_tile_resources(&mut self) {
        let ids: Vec<TileId> = self.tiles.keys().copied().collect();
        for id in ids {
            let Some(tile) = self.tiles.get_mut(&id) else {
                continue;
            };
            let resource = tile.resource.take();
            let was_scheduled = tile.state == TileState::Scheduled;
            tile.state = TileState::Missing;
            self.discard_resource(resource, was_scheduled);
        }
    }

    /// Drops tile resources, least important first, until what tiles hold fits
    /// in `limit_bytes`. Returns whether anything was evicted.
    pub fn reduce_memory_usage_to(&mut self, limit_bytes: usize) -> bool {
        let tile_bytes = self.tile_bytes();
        let mut holding: Vec<(u8, u8, u8, TileId)> = self
            .tiles
            .iter()
            .filter(|(_, tile)| tile.resource.is_some())
            .map(|(id, tile)| {
                (
                    tile.bin as u8,
                    u8::from(!tile.is_required()),
                    self.tree_rank(tile.tree),
                    *id,
                )
            })
            .collect();
        holding.sort_unstable();

        let mut held_bytes = holding.len() * tile_bytes;
        let mut evicted = 0usize;
        while held_bytes > limit_bytes {
            let Some((_, _, _, id)) = holding.pop() else {
                break;
            };
            let Some(tile) = self.tiles.get_mut(&id) else {
                continue;
            };
            let resource = tile.resource.take();
            let was_scheduled = tile.state == TileState::Scheduled;
            tile.state = TileState::Missing;
            self.discard_resource(resource, was_scheduled);
            held_bytes -= tile_bytes;
            evicted += 1;
        }
        if evicted > 0 {
            log::info!("[tiles] evicted {evicted} tiles to fit {limit_bytes} bytes");
        }
        evicted > 0
    }

    /// Waits for outstanding raster, drops every tile and the resource pool.
    pub fn finish_tasks_and_clean_up(&mut self) {
        for token in [self.namespace, self.on_demand_namespace] {
            if let Err(error) = self.runner.wait_for_tasks_to_finish_running(token) {
                log::warn!("[tiles] waiting for raster during clean up failed: {error}");
            }
        }
        self.flush_completed_tasks();
        let _ = self.runner.collect_completed(self.on_demand_namespace);
        self.tilings.clear();
        self.tiles.clear();
        self.orphaned_resources.clear();
        self.notifications.clear();
        self.resource_pool = None;
        self.global_state = GlobalTileState::default();
    }
}

fn ceil_div(value: i32, divisor: i32) -> i32 {
    (value + divisor - 1) / divisor
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::raster::{Rasterizer, SynchronousTaskGraphRunner};
    use crate::resource_provider::ResourceProvider;

    struct AlwaysRasterizer;

    impl Rasterizer for AlwaysRasterizer {
        fn rasterize(&self, _task: &RasterTask) -> RasterOutcome {
            RasterOutcome::Completed
        }
    }

    fn settings() -> TileManagerSettings {
        TileManagerSettings {
            tile_size: IntSize::new(10, 10),
            interest_margin: 10,
            scheduled_raster_task_limit: 32,
        }
    }

    fn manager_with_resources() -> (TileManager, ResourceProvider) {
        let provider = ResourceProvider::new();
        let mut manager = TileManager::new(
            settings(),
            Box::new(SynchronousTaskGraphRunner::new(Arc::new(AlwaysRasterizer))),
        );
        let mut pool = ResourcePool::new(provider.clone());
        pool.set_resource_usage_limits(usize::MAX, usize::MAX);
        manager.set_resources(pool);
        (manager, provider)
    }

    fn generous_state() -> GlobalTileState {
        GlobalTileState {
            hard_memory_limit_in_bytes: 1 << 20,
            soft_memory_limit_in_bytes: 1 << 20,
            num_resources_limit: 1000,
            memory_limit_policy: TileMemoryLimitPolicy::AllowAnything,
            tree_priority: TreePriority::SamePriorityForBothTrees,
        }
    }

    fn rect(x: i32, y: i32, width: i32, height: i32) -> IntRect {
        IntRect::new(IntPoint::new(x, y), IntSize::new(width, height))
    }

    #[test]
    fn prepare_tiles_without_resources_reports_nothing_prepared() {
        let mut manager = TileManager::new(
            settings(),
            Box::new(SynchronousTaskGraphRunner::new(Arc::new(AlwaysRasterizer))),
        );
        assert!(!manager.prepare_tiles(&generous_state()));
        assert!(manager.take_notifications().is_empty());
    }

    #[test]
    fn visible_tiles_become_ready_after_flush() {
        let (mut manager, _provider) = manager_with_resources();
        manager.update_layer_tiling(
            LayerId(1),
            WhichTree::Pending,
            IntSize::new(40, 40),
            rect(0, 0, 20, 20),
            &[],
        );
        assert!(manager.prepare_tiles(&generous_state()));
        assert!(manager.scheduled_task_count() > 0);
        assert!(
            !manager
                .take_notifications()
                .contains(&TileManagerNotification::ReadyToActivate)
        );

        manager.flush();
        let notifications = manager.take_notifications();
        assert!(notifications.contains(&TileManagerNotification::ReadyToActivate));
        assert!(notifications.contains(&TileManagerNotification::AllTileTasksCompleted));
        assert_eq!(manager.scheduled_task_count(), 0);
    }

    fn ready_tiles(manager: &TileManager) -> usize {
        manager
            .tile_draw_info(LayerId(1), WhichTree::Active)
            .iter()
            .filter(|info| info.is_ready())
            .count()
    }

    fn rastered_layer() -> TileManager {
        let (mut manager, _provider) = manager_with_resources();
        manager.update_layer_tiling(
            LayerId(1),
            WhichTree::Active,
            IntSize::new(20, 20),
            rect(0, 0, 20, 20),
            &[],
        );
        manager.prepare_tiles(&generous_state());
        manager.flush();
        manager
    }

    #[test]
    fn reducing_memory_evicts_only_what_does_not_fit() {
        let mut manager = rastered_layer();
        assert_eq!(ready_tiles(&manager), 4);

        assert!(manager.reduce_memory_usage_to(2 * 10 * 10 * 4));
        assert_eq!(ready_tiles(&manager), 2);
        assert!(!manager.reduce_memory_usage_to(2 * 10 * 10 * 4));

        assert!(manager.reduce_memory_usage_to(0));
        assert_eq!(ready_tiles(&manager), 0);
    }

    #[test]
    fn releasing_tile_resources_keeps_the_tiles() {
        let mut manager = rastered_layer();
        manager.release_tile_resources();
        assert_eq!(ready_tiles(&manager), 0);
        assert_eq!(manager.tile_count(), 4);
        assert!(
            manager
                .resource_pool()
                .expect("pool")
                .in_use_ids()
                .is_empty()
        );
    }

    #[test]
    fn absolute_minimum_policy_skips_prepaint_tiles() {
        let (mut manager, _provider) = manager_with_resources();
        manager.update_layer_tiling(
            LayerId(1),
            WhichTree::Active,
            IntSize::new(40, 10),
            rect(0, 0, 10, 10),
            &[],
        );
        let state = GlobalTileState {
            memory_limit_policy: TileMemoryLimitPolicy::AllowAbsoluteMinimum,
            ..generous_state()
        };
        manager.prepare_tiles(&state);
        assert_eq!(manager.scheduled_task_count(), 1);
    }

    #[test]
    fn tight_budget_still_reports_ready_to_draw() {
        let (mut manager, _provider) = manager_with_resources();
        manager.update_layer_tiling(
            LayerId(1),
            WhichTree::Active,
            IntSize::new(20, 20),
            rect(0, 0, 20, 20),
            &[],
        );
        let state = GlobalTileState {
            hard_memory_limit_in_bytes: 10 * 10 * 4,
            soft_memory_limit_in_bytes: 10 * 10 * 4,
            ..generous_state()
        };
        manager.prepare_tiles(&state);
        assert_eq!(manager.scheduled_task_count(), 1);

        manager.flush();
        assert!(
            manager
                .take_notifications()
                .contains(&TileManagerNotification::ReadyToDraw)
        );
        let ready = manager
            .tile_draw_info(LayerId(1), WhichTree::Active)
            .iter()
            .filter(|info| info.is_ready())
            .count();
        assert_eq!(ready, 1);
    }

    #[test]
    fn invalidation_returns_ready_tiles_to_missing() {
        let (mut manager, _provider) = manager_with_resources();
        let visible = rect(0, 0, 20, 10);
        manager.update_layer_tiling(LayerId(1), WhichTree::Active, IntSize::new(20, 10), visible, &[]);
        manager.prepare_tiles(&generous_state());
        manager.flush();

        manager.update_layer_tiling(
            LayerId(1),
            WhichTree::Active,
            IntSize::new(20, 10),
            visible,
            &[rect(12, 2, 2, 2)],
        );
        let info = manager.tile_draw_info(LayerId(1), WhichTree::Active);
        assert_eq!(info.len(), 2);
        assert!(info[0].is_ready());
        assert!(!info[1].is_ready());
    }

    #[test]
    fn activation_moves_pending_tiles_to_the_active_tree() {
        let (mut manager, _provider) = manager_with_resources();
        manager.update_layer_tiling(
            LayerId(3),
            WhichTree::Pending,
            IntSize::new(10, 10),
            rect(0, 0, 10, 10),
            &[],
        );
        manager.prepare_tiles(&generous_state());
        manager.flush();
        manager.activate_pending_tilings();

        assert!(!manager.has_tiling(LayerId(3), WhichTree::Pending));
        let info = manager.tile_draw_info(LayerId(3), WhichTree::Active);
        assert_eq!(info.len(), 1);
        assert!(info[0].is_ready());
        assert!(info[0].required_for_draw);
    }

    #[test]
    fn on_demand_raster_fills_missing_visible_tiles() {
        let (mut manager, _provider) = manager_with_resources();
        manager.update_layer_tiling(
            LayerId(1),
            WhichTree::Active,
            IntSize::new(20, 20),
            rect(0, 0, 20, 20),
            &[],
        );
        let rastered = manager
            .run_on_demand_raster(LayerId(1), WhichTree::Active)
            .expect("on demand raster");
        assert_eq!(rastered, 4);
        assert!(
            manager
                .tile_draw_info(LayerId(1), WhichTree::Active)
                .iter()
                .all(TileDrawInfo::is_ready)
        );
    }

    #[test]
    fn clean_up_releases_every_resource() {
        let (mut manager, provider) = manager_with_resources();
        manager.update_layer_tiling(
            LayerId(1),
            WhichTree::Active,
            IntSize::new(20, 20),
            rect(0, 0, 20, 20),
            &[],
        );
        manager.prepare_tiles(&generous_state());
        manager.finish_tasks_and_clean_up();

        assert!(!manager.has_resources());
        assert_eq!(manager.tile_count(), 0);
        assert_eq!(provider.resource_count(), 0);
    }
}
