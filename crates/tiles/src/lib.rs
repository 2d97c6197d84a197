//! Tile memory management and raster scheduling for picture layers.
//!
//! `TileManager` splits picture layers into fixed-size tiles, ranks them by how
//! soon they will be visible and hands memory to them in that order under the
//! limits of a `GlobalTileState`. Raster work runs through a `TaskGraphRunner`.

mod memory_policy;
mod raster;
mod resource_pool;
mod resource_provider;
mod tile_manager;

pub use memory_policy::{
    DEFAULT_NUM_RESOURCES_LIMIT, GlobalTileState, ManagedMemoryPolicy, PriorityCutoff,
    TileMemoryLimitPolicy, TreePriority, priority_cutoff_to_tile_memory_limit_policy,
};
pub use raster::{
    CompletedRaster, NamespaceToken, RasterOutcome, RasterTask, Rasterizer,
    SynchronousTaskGraphRunner, TaskGraphError, TaskGraphRunner, WorkerPoolTaskGraphRunner,
};
pub use resource_pool::{ResourcePool, ResourcePoolUsage};
pub use resource_provider::{ResourceInfo, ResourceProvider};
pub use tile_manager::{
    PriorityBin, TileDrawInfo, TileId, TileManager, TileManagerNotification, TileManagerSettings,
    TileState, WhichTree,
};
