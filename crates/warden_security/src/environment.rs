//! # Environment Oracle
//!
//! The engine never owns the world. Detectors that need geometry (phase,
//! ground spoof) query it through [`EnvironmentOracle`], implemented by the
//! host server. [`VoxelGrid`] is a sparse in-memory world for replay and
//! tests.

use std::collections::HashMap;

use warden_shared::{BlockClass, BlockPos, SurfaceKind, Vec3};

/// Read-only world queries.
pub trait EnvironmentOracle: Send + Sync {
    /// Classifies the block at `pos`.
    fn classify_block_at(&self, pos: BlockPos) -> BlockClass;

    /// Whether `pos` holds liquid.
    fn is_liquid(&self, pos: BlockPos) -> bool {
        self.classify_block_at(pos) == BlockClass::Liquid
    }

    /// Whether `pos` can be climbed.
    fn is_climbable(&self, pos: BlockPos) -> bool {
        self.classify_block_at(pos) == BlockClass::Climbable
    }

    /// Special surface at `pos`, if any.
    fn special_surface(&self, pos: BlockPos) -> Option<SurfaceKind> {
        match self.classify_block_at(pos) {
            BlockClass::Special(kind) => Some(kind),
            _ => None,
        }
    }

    /// Whether `pos` is a special surface (ice, slime, soul sand, honey).
    fn is_special_surface(&self, pos: BlockPos) -> bool {
        self.special_surface(pos).is_some()
    }

    /// Whether a body point may occupy `point`. Points above a block's
    /// collision height are free.
    fn is_passable(&self, point: Vec3) -> bool {
        let block = BlockPos::containing(point);
        let class = self.classify_block_at(block);
        !class.is_impassable() || point.y - f64::from(block.y) >= class.collision_height()
    }
}

/// Empty world. Everything is air.
#[derive(Clone, Copy, Debug, Default)]
pub struct OpenAir;

impl EnvironmentOracle for OpenAir {
    fn classify_block_at(&self, _pos: BlockPos) -> BlockClass {
        BlockClass::Air
    }
}

/// Sparse voxel world with an optional solid floor.
#[derive(Clone, Debug, Default)]
pub struct VoxelGrid {
    /// Every block with `y` below this is solid.
    pub floor_y: Option<i32>,
    /// Explicit blocks, overriding the floor.
    blocks: HashMap<BlockPos, BlockClass>,
}

impl VoxelGrid {
    /// Creates an empty world.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// World whose ground surface is at `surface_y` (blocks below are solid).
    #[must_use]
    pub fn flat(surface_y: i32) -> Self {
        Self {
            floor_y: Some(surface_y),
            blocks: HashMap::new(),
        }
    }

    /// Sets one block.
    pub fn set(&mut self, pos: BlockPos, class: BlockClass) {
        self.blocks.insert(pos, class);
    }

    /// Fills the inclusive box `min..=max`.
    pub fn fill(&mut self, min: BlockPos, max: BlockPos, class: BlockClass) {
        for x in min.x..=max.x {
            for y in min.y..=max.y {
                for z in min.z..=max.z {
                    self.blocks.insert(BlockPos::new(x, y, z), class);
                }
            }
        }
    }

    /// Number of explicit blocks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Whether no explicit blocks are set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

impl EnvironmentOracle for VoxelGrid {
    fn classify_block_at(&self, pos: BlockPos) -> BlockClass {
        if let Some(class) = self.blocks.get(&pos) {
            return *class;
        }
        match self.floor_y {
            Some(floor) if pos.y < floor => BlockClass::Solid,
            _ => BlockClass::Air,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_world() {
        let world = VoxelGrid::flat(64);
        assert_eq!(world.classify_block_at(BlockPos::new(0, 63, 0)), BlockClass::Solid);
        assert_eq!(world.classify_block_at(BlockPos::new(0, 64, 0)), BlockClass::Air);
        assert!(world.is_passable(Vec3::new(0.5, 64.0, 0.5)));
        assert!(!world.is_passable(Vec3::new(0.5, 63.9, 0.5)));
    }

    #[test]
    fn test_explicit_blocks_override_floor() {
        let mut world = VoxelGrid::flat(64);
        world.set(BlockPos::new(0, 63, 0), BlockClass::Liquid);
        world.fill(
            BlockPos::new(2, 64, 0),
            BlockPos::new(2, 65, 0),
            BlockClass::Special(SurfaceKind::Ice),
        );
        assert!(world.is_liquid(BlockPos::new(0, 63, 0)));
        assert!(world.is_special_surface(BlockPos::new(2, 65, 0)));
        assert!(!world.is_passable(Vec3::new(2.5, 64.5, 0.5)));
        assert_eq!(world.len(), 3);
    }

    #[test]
    fn test_soul_sand_top_is_passable() {
        let mut world = VoxelGrid::flat(63);
        world.set(BlockPos::new(0, 63, 0), BlockClass::Special(SurfaceKind::SoulSand));
        assert!(world.is_passable(Vec3::new(0.5, 63.9, 0.5)));
        assert!(!world.is_passable(Vec3::new(0.5, 63.5, 0.5)));
    }

    #[test]
    fn test_open_air() {
        assert!(OpenAir.is_passable(Vec3::new(0.0, -100.0, 0.0)));
        assert!(!OpenAir.is_climbable(BlockPos::default()));
    }
}
