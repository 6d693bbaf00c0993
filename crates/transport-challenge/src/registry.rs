//! [`EntityRegistry`] – which scene objects are containers and which are
//! target objects.
//!
//! IDs are handed out sequentially from 1, so a given population order
//! always produces the same IDs.  Adding an entity only queues its spawn
//! commands; the orchestrator sends them in one batch when the scene starts.

use transport_types::{Command, ObjectId, Vector3};

use crate::catalog::TargetObjectModel;
use crate::config::TransportConfig;

#[derive(Debug, Clone)]
pub struct EntityRegistry {
    containers: Vec<ObjectId>,
    target_objects: Vec<ObjectId>,
    next_id: u32,
    pending: Vec<Command>,
}

impl Default for EntityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self {
            containers: Vec::new(),
            target_objects: Vec::new(),
            next_id: 1,
            pending: Vec::new(),
        }
    }

    /// Forget every entity.  Called when a new scene starts.
    pub fn clear(&mut self) {
        *self = Self::new();
    }

    pub fn containers(&self) -> &[ObjectId] {
        &self.containers
    }

    pub fn target_objects(&self) -> &[ObjectId] {
        &self.target_objects
    }

    pub fn is_container(&self, id: ObjectId) -> bool {
        self.containers.contains(&id)
    }

    pub fn is_target_object(&self, id: ObjectId) -> bool {
        self.target_objects.contains(&id)
    }

    /// Spawn commands queued since the last [`take_commands`](Self::take_commands).
    pub fn pending_commands(&self) -> &[Command] {
        &self.pending
    }

    pub fn take_commands(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.pending)
    }

    fn allocate(&mut self) -> ObjectId {
        let id = ObjectId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Register a container of `model` at `position`, turned `yaw` degrees.
    pub fn add_container(
        &mut self,
        model: &str,
        position: Vector3,
        yaw: f32,
        config: &TransportConfig,
    ) -> ObjectId {
        let id = self.allocate();
        self.pending.extend([
            Command::AddObject {
                name: model.to_string(),
                id,
                position,
                rotation: Vector3::new(0.0, yaw, 0.0),
            },
            Command::SetMass {
                id,
                mass: config.container_mass,
            },
            Command::ScaleObject {
                id,
                scale_factor: config.container_scale,
            },
        ]);
        self.containers.push(id);
        id
    }

    /// Register a target object.  `material` is applied to every material
    /// slot of every sub-object of the model.
    pub fn add_target_object(
        &mut self,
        model: &TargetObjectModel,
        position: Vector3,
        yaw: f32,
        material: &str,
        config: &TransportConfig,
    ) -> ObjectId {
        let id = self.allocate();
        self.pending.extend([
            Command::AddObject {
                name: model.name.clone(),
                id,
                position,
                rotation: Vector3::new(0.0, yaw, 0.0),
            },
            Command::SetMass {
                id,
                mass: config.target_object_mass,
            },
            Command::ScaleObject {
                id,
                scale_factor: Vector3::new(model.scale, model.scale, model.scale),
            },
        ]);
        for part in &model.substructure {
            for slot in 0..part.materials {
                self.pending.push(Command::SetVisualMaterial {
                    id,
                    material_name: material.to_string(),
                    object_name: part.name.clone(),
                    material_index: slot,
                });
            }
        }
        self.target_objects.push(id);
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::SubObject;

    fn jug() -> TargetObjectModel {
        TargetObjectModel {
            name: "jug04".into(),
            scale: 0.6,
            substructure: vec![
                SubObject {
                    name: "jug04".into(),
                    materials: 2,
                },
                SubObject {
                    name: "jug04_lid".into(),
                    materials: 1,
                },
            ],
        }
    }

    #[test]
    fn ids_are_sequential_and_tagged() {
        let cfg = TransportConfig::default();
        let mut reg = EntityRegistry::new();
        let c = reg.add_container("basket", Vector3::ZERO, 10.0, &cfg);
        let t = reg.add_target_object(&jug(), Vector3::ZERO, 0.0, "wood", &cfg);
        assert_eq!((c, t), (ObjectId(1), ObjectId(2)));
        assert!(reg.is_container(c) && !reg.is_container(t));
        assert!(reg.is_target_object(t) && !reg.is_target_object(c));
    }

    #[test]
    fn container_gets_fixed_mass_and_scale() {
        let cfg = TransportConfig::default();
        let mut reg = EntityRegistry::new();
        let id = reg.add_container("basket", Vector3::ZERO, 0.0, &cfg);
        assert!(reg.pending_commands().contains(&Command::SetMass { id, mass: 1.0 }));
        assert!(reg.pending_commands().contains(&Command::ScaleObject {
            id,
            scale_factor: Vector3::new(0.6, 0.4, 0.6)
        }));
    }

    #[test]
    fn material_covers_every_slot_of_every_part() {
        let cfg = TransportConfig::default();
        let mut reg = EntityRegistry::new();
        reg.add_target_object(&jug(), Vector3::ZERO, 0.0, "leather_fine", &cfg);
        let materials: Vec<_> = reg
            .pending_commands()
            .iter()
            .filter_map(|c| match c {
                Command::SetVisualMaterial {
                    object_name,
                    material_index,
                    material_name,
                    ..
                } => Some((object_name.as_str(), *material_index, material_name.as_str())),
                _ => None,
            })
            .collect();
        assert_eq!(
            materials,
            vec![
                ("jug04", 0, "leather_fine"),
                ("jug04", 1, "leather_fine"),
                ("jug04_lid", 0, "leather_fine"),
            ]
        );
    }

    #[test]
    fn clear_restarts_ids_and_drops_pending() {
        let cfg = TransportConfig::default();
        let mut reg = EntityRegistry::new();
        reg.add_container("basket", Vector3::ZERO, 0.0, &cfg);
        reg.clear();
        assert!(reg.containers().is_empty());
        assert!(reg.take_commands().is_empty());
        assert_eq!(reg.add_container("basket", Vector3::ZERO, 0.0, &cfg), ObjectId(1));
    }
}
