//! Containment query: which objects are inside a container.
//!
//! Asks the simulator for every object overlapping a box placed at the
//! container's live pose, with the container's static size as half extents.
//! The generous box tolerates contents that rest slightly proud of the rim.

use std::collections::HashMap;

use transport_hal::SceneState;
use transport_hal::scene_state::overlap_ids;
use transport_types::{Command, ObjectId, OutputFrame, Quaternion, TransportError, Vector3};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContainmentQuery {
    pub container: ObjectId,
    pub position: Vector3,
    pub rotation: Quaternion,
    pub half_extents: Vector3,
}

impl ContainmentQuery {
    /// Build the query from the latest state and the sizes cached at scene
    /// start.
    pub fn new(
        state: &SceneState,
        sizes: &HashMap<ObjectId, Vector3>,
        container: ObjectId,
    ) -> Result<Self, TransportError> {
        let half_extents = *sizes
            .get(&container)
            .ok_or(TransportError::UnknownObject(container))?;
        Ok(Self {
            container,
            position: state.position(container)?,
            rotation: state.rotation(container)?,
            half_extents,
        })
    }

    pub fn command(&self) -> Command {
        Command::SendOverlapBox {
            position: self.position,
            rotation: self.rotation,
            half_extents: self.half_extents,
        }
    }

    /// Overlapping IDs from the answering step, without the container.
    pub fn contained(&self, frames: &[OutputFrame]) -> Result<Vec<ObjectId>, TransportError> {
        let mut ids = overlap_ids(frames)?;
        ids.retain(|id| *id != self.container);
        Ok(ids)
    }
}
