/// How much of the tile priority range the embedder lets us keep in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PriorityCutoff {
    AllowNothing,
    AllowRequiredOnly,
    AllowNiceToHave,
    AllowEverything,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TileMemoryLimitPolicy {
    AllowNothing,
    /// Only tiles needed to activate or draw the visible content.
    AllowAbsoluteMinimum,
    /// Visible tiles plus the soon-visible prepaint margin.
    AllowPrepaintOnly,
    AllowAnything,
}

pub fn priority_cutoff_to_tile_memory_limit_policy(cutoff: PriorityCutoff) -> TileMemoryLimitPolicy {
    match cutoff {
        PriorityCutoff::AllowNothing => TileMemoryLimitPolicy::AllowNothing,
        PriorityCutoff::AllowRequiredOnly => TileMemoryLimitPolicy::AllowAbsoluteMinimum,
        PriorityCutoff::AllowNiceToHave => TileMemoryLimitPolicy::AllowPrepaintOnly,
        PriorityCutoff::AllowEverything => TileMemoryLimitPolicy::AllowAnything,
    }
}

pub const DEFAULT_NUM_RESOURCES_LIMIT: usize = 10_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManagedMemoryPolicy {
    pub bytes_limit_when_visible: usize,
    pub priority_cutoff_when_visible: PriorityCutoff,
    pub num_resources_limit: usize,
}

impl ManagedMemoryPolicy {
    pub fn new(bytes_limit_when_visible: usize) -> Self {
        Self {
            bytes_limit_when_visible,
            priority_cutoff_when_visible: PriorityCutoff::AllowEverything,
            num_resources_limit: DEFAULT_NUM_RESOURCES_LIMIT,
        }
    }
}

impl Default for ManagedMemoryPolicy {
    fn default() -> Self {
        Self::new(64 * 1024 * 1024)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TreePriority {
    SamePriorityForBothTrees,
    SmoothnessTakesPriority,
    NewContentTakesPriority,
}

/// Everything outside the tiles themselves that influences tile scheduling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobalTileState {
    pub hard_memory_limit_in_bytes: usize,
    pub soft_memory_limit_in_bytes: usize,
    pub num_resources_limit: usize,
    pub memory_limit_policy: TileMemoryLimitPolicy,
    pub tree_priority: TreePriority,
}

impl Default for GlobalTileState {
    fn default() -> Self {
        Self {
            hard_memory_limit_in_bytes: 0,
            soft_memory_limit_in_bytes: 0,
            num_resources_limit: 0,
            memory_limit_policy: TileMemoryLimitPolicy::AllowNothing,
            tree_priority: TreePriority::SamePriorityForBothTrees,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cutoffs_map_to_increasingly_permissive_policies() {
        let policies = [
            PriorityCutoff::AllowNothing,
            PriorityCutoff::AllowRequiredOnly,
            PriorityCutoff::AllowNiceToHave,
            PriorityCutoff::AllowEverything,
        ]
        .map(priority_cutoff_to_tile_memory_limit_policy);
        assert!(policies.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(policies[0], TileMemoryLimitPolicy::AllowNothing);
        assert_eq!(policies[3], TileMemoryLimitPolicy::AllowAnything);
    }
}
