//! Scene layout and the population policy.
//!
//! A [`SceneLayout`] is a floor grid: an occupancy map (which cells are free
//! floor) and a room map (which room each cell belongs to).  Grid cell
//! `(ix, iy)` sits at world `(x_min + ix * cell_size, 0, z_min + iy *
//! cell_size)`.
//!
//! [`plan_population`] turns a layout into a [`PopulationPlan`]: one room
//! full of target objects and at most one container in each other room.
//! All randomness comes from the caller's RNG, so a seeded RNG reproduces
//! the same plan.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use transport_types::{TransportError, Vector3};

use crate::catalog::Catalog;
use crate::config::TransportConfig;

/// Occupancy value of a free floor cell.
pub const FREE_CELL: u8 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridBounds {
    pub x_min: f32,
    pub z_min: f32,
    pub cell_size: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneLayout {
    #[serde(default)]
    pub name: String,
    pub bounds: GridBounds,
    /// Room index per cell, `room_map[ix][iy]`.  Negative means "no room".
    pub room_map: Vec<Vec<i32>>,
    /// Occupancy per cell, `occupancy[ix][iy]`; only [`FREE_CELL`] is usable.
    pub occupancy: Vec<Vec<u8>>,
}

impl SceneLayout {
    pub fn from_json_str(raw: &str) -> Result<Self, TransportError> {
        let layout: Self = serde_json::from_str(raw)
            .map_err(|e| TransportError::Config(format!("Failed to parse scene layout: {e}")))?;
        layout.validate()?;
        Ok(layout)
    }

    pub fn load(path: &Path) -> Result<Self, TransportError> {
        let raw = fs::read_to_string(path).map_err(|e| {
            TransportError::Config(format!("Failed to read layout at {}: {e}", path.display()))
        })?;
        Self::from_json_str(&raw)
    }

    /// The two maps must have identical shape.
    pub fn validate(&self) -> Result<(), TransportError> {
        let same_shape = self.room_map.len() == self.occupancy.len()
            && self
                .room_map
                .iter()
                .zip(&self.occupancy)
                .all(|(a, b)| a.len() == b.len());
        if !same_shape {
            return Err(TransportError::Config(
                "room map and occupancy map differ in shape".into(),
            ));
        }
        if self.bounds.cell_size <= 0.0 {
            return Err(TransportError::Config("cell_size must be positive".into()));
        }
        Ok(())
    }

    pub fn cell_position(&self, ix: usize, iy: usize) -> Vector3 {
        Vector3::new(
            self.bounds.x_min + ix as f32 * self.bounds.cell_size,
            0.0,
            self.bounds.z_min + iy as f32 * self.bounds.cell_size,
        )
    }

    /// Free cells grouped by room, rooms in ascending order.
    pub fn free_cells_by_room(&self) -> BTreeMap<i32, Vec<(usize, usize)>> {
        let mut rooms: BTreeMap<i32, Vec<(usize, usize)>> = BTreeMap::new();
        for (ix, column) in self.occupancy.iter().enumerate() {
            for (iy, cell) in column.iter().enumerate() {
                let room = self.room_map[ix][iy];
                if *cell == FREE_CELL && room >= 0 {
                    rooms.entry(room).or_default().push((ix, iy));
                }
            }
        }
        rooms
    }

    /// Floor-plane bounding box of every cell of `room`.
    pub fn room_region(&self, room: i32) -> Option<FloorRegion> {
        let half = self.bounds.cell_size * 0.5;
        let mut region: Option<FloorRegion> = None;
        for (ix, column) in self.room_map.iter().enumerate() {
            for (iy, r) in column.iter().enumerate() {
                if *r != room {
                    continue;
                }
                let p = self.cell_position(ix, iy);
                let cell = FloorRegion::new(p.x - half, p.x + half, p.z - half, p.z + half);
                region = Some(match region {
                    Some(acc) => acc.union(cell),
                    None => cell,
                });
            }
        }
        region
    }
}

/// Axis-aligned rectangle on the floor plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FloorRegion {
    pub x_min: f32,
    pub x_max: f32,
    pub z_min: f32,
    pub z_max: f32,
}

impl FloorRegion {
    pub fn new(x_min: f32, x_max: f32, z_min: f32, z_max: f32) -> Self {
        Self {
            x_min,
            x_max,
            z_min,
            z_max,
        }
    }

    /// Whether `p` lies over the region.  Height is ignored.
    pub fn contains(&self, p: Vector3) -> bool {
        (self.x_min..=self.x_max).contains(&p.x) && (self.z_min..=self.z_max).contains(&p.z)
    }

    pub fn center(&self) -> Vector3 {
        Vector3::new(
            (self.x_min + self.x_max) * 0.5,
            0.0,
            (self.z_min + self.z_max) * 0.5,
        )
    }

    fn union(self, other: Self) -> Self {
        Self::new(
            self.x_min.min(other.x_min),
            self.x_max.max(other.x_max),
            self.z_min.min(other.z_min),
            self.z_max.max(other.z_max),
        )
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Population policy
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedTargetObject {
    pub model: String,
    pub position: Vector3,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedContainer {
    pub model: String,
    pub position: Vector3,
    pub yaw: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PopulationPlan {
    pub target_room: i32,
    pub target_objects: Vec<PlannedTargetObject>,
    pub containers: Vec<PlannedContainer>,
}

/// Decide where target objects and containers go.
///
/// The target room is drawn uniformly from the rooms with free floor.  It
/// receives between `min_target_objects` and `max_target_objects` objects
/// (capped by its free cells), each on a distinct cell.  Every other room
/// gets one container with probability `container_probability`, on a cell
/// no target object uses.
pub fn plan_population<R: Rng + ?Sized>(
    layout: &SceneLayout,
    catalog: &Catalog,
    config: &TransportConfig,
    rng: &mut R,
) -> Result<PopulationPlan, TransportError> {
    let rooms = layout.free_cells_by_room();
    let room_ids: Vec<i32> = rooms.keys().copied().collect();
    let target_room = *room_ids
        .choose(rng)
        .ok_or_else(|| TransportError::Config("layout has no free floor in any room".into()))?;
    let target_cells = &rooms[&target_room];

    let lo = config.min_target_objects.min(config.max_target_objects);
    let count = rng
        .gen_range(lo..=config.max_target_objects.max(lo))
        .min(target_cells.len());
    let chosen: Vec<(usize, usize)> = target_cells.choose_multiple(rng, count).copied().collect();
    let used: HashSet<(usize, usize)> = chosen.iter().copied().collect();

    let mut target_objects = Vec::with_capacity(chosen.len());
    for (ix, iy) in chosen {
        let model = catalog
            .target_objects
            .choose(rng)
            .ok_or_else(|| TransportError::Config("catalog has no target object models".into()))?;
        target_objects.push(PlannedTargetObject {
            model: model.name.clone(),
            position: layout.cell_position(ix, iy),
        });
    }

    let probability = config.container_probability.clamp(0.0, 1.0);
    let yaw_limit = config.max_spawn_yaw.abs();
    let mut containers = Vec::new();
    for (room, cells) in &rooms {
        if *room == target_room || !rng.gen_bool(probability) {
            continue;
        }
        let free: Vec<(usize, usize)> = cells.iter().filter(|c| !used.contains(*c)).copied().collect();
        let Some(&(ix, iy)) = free.choose(rng) else {
            continue;
        };
        let model = catalog
            .containers
            .choose(rng)
            .ok_or_else(|| TransportError::Config("catalog has no container models".into()))?;
        containers.push(PlannedContainer {
            model: model.clone(),
            position: layout.cell_position(ix, iy),
            yaw: rng.gen_range(-yaw_limit..=yaw_limit),
        });
    }

    Ok(PopulationPlan {
        target_room,
        target_objects,
        containers,
    })
}
