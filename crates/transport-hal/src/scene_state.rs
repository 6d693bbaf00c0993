//! [`SceneState`] – decoded snapshot of one simulator step.
//!
//! Built from the `transforms` and `magnebot` frames every step carries.  The
//! orchestrator keeps the latest snapshot and refreshes it after each action,
//! so guards such as "is anything held?" cost no round trip.

use std::collections::HashMap;

use transport_types::{
    Arm, ArmJoint, ObjectId, ObjectStatic, ObjectTransform, OutputFrame, Quaternion,
    SimulatorFrames as _, TransportError, Vector3,
};

use crate::client::SimulatorClient;

#[derive(Debug, Clone, Default)]
pub struct SceneState {
    objects: HashMap<ObjectId, ObjectTransform>,
    pub magnebot_position: Vector3,
    pub magnebot_rotation: Quaternion,
    held_left: Vec<ObjectId>,
    held_right: Vec<ObjectId>,
    joints: HashMap<ArmJoint, Vector3>,
    pub arm_moving: bool,
}

impl SceneState {
    /// Decode a step's frames.  Fails with [`TransportError::MissingFrame`]
    /// when the step did not report the robot or the object transforms.
    pub fn from_frames(frames: &[OutputFrame]) -> Result<Self, TransportError> {
        let mut objects = None;
        let mut magnebot = None;
        for frame in frames {
            match frame {
                OutputFrame::Transforms { objects: list } => objects = Some(list),
                OutputFrame::Magnebot(m) => magnebot = Some(m),
                _ => {}
            }
        }
        let objects = objects.ok_or(TransportError::MissingFrame("transforms"))?;
        let magnebot = magnebot.ok_or(TransportError::MissingFrame("magnebot"))?;

        Ok(Self {
            objects: objects.iter().map(|t| (t.id, t.clone())).collect(),
            magnebot_position: magnebot.position,
            magnebot_rotation: magnebot.rotation,
            held_left: magnebot.held_left.clone(),
            held_right: magnebot.held_right.clone(),
            joints: magnebot.joints.iter().map(|j| (j.joint, j.angles)).collect(),
            arm_moving: magnebot.arm_moving,
        })
    }

    /// Advance one step with an empty batch and decode the result.
    pub fn sample(sim: &mut dyn SimulatorClient) -> Result<Self, TransportError> {
        let frames = sim.communicate(&[])?;
        Self::from_frames(&frames)
    }

    /// Objects currently attached to `arm`'s magnet.
    pub fn held(&self, arm: Arm) -> &[ObjectId] {
        match arm {
            Arm::Left => &self.held_left,
            Arm::Right => &self.held_right,
        }
    }

    /// The arm holding `id`, if any.
    pub fn holding_arm(&self, id: ObjectId) -> Option<Arm> {
        Arm::ALL.into_iter().find(|arm| self.held(*arm).contains(&id))
    }

    pub fn position(&self, id: ObjectId) -> Result<Vector3, TransportError> {
        self.objects
            .get(&id)
            .map(|t| t.position)
            .ok_or(TransportError::UnknownObject(id))
    }

    pub fn rotation(&self, id: ObjectId) -> Result<Quaternion, TransportError> {
        self.objects
            .get(&id)
            .map(|t| t.rotation)
            .ok_or(TransportError::UnknownObject(id))
    }

    /// Reported angles of `joint`; zero when the step did not include it.
    pub fn joint(&self, joint: ArmJoint) -> Vector3 {
        self.joints.get(&joint).copied().unwrap_or_default()
    }

    /// Current torso height in metres.
    pub fn torso_height(&self) -> f32 {
        self.joint(ArmJoint::Torso).x
    }

    /// Express a world-space point in the robot's body frame (x right, y up,
    /// z forward, origin on the floor under the robot).
    pub fn to_body_frame(&self, world: Vector3) -> Vector3 {
        self.magnebot_rotation
            .conjugate()
            .rotate(world - self.magnebot_position)
    }

    /// Inverse of [`to_body_frame`](Self::to_body_frame).
    pub fn to_world_frame(&self, local: Vector3) -> Vector3 {
        self.magnebot_rotation.rotate(local) + self.magnebot_position
    }
}

/// Object IDs reported by the `overlap` frame of a step.
pub fn overlap_ids(frames: &[OutputFrame]) -> Result<Vec<ObjectId>, TransportError> {
    frames
        .overlap()
        .map(<[ObjectId]>::to_vec)
        .ok_or(TransportError::MissingFrame("overlap"))
}

/// Static object records reported by the `static_objects` frame of a step.
pub fn static_objects(frames: &[OutputFrame]) -> Result<&[ObjectStatic], TransportError> {
    frames
        .static_objects()
        .ok_or(TransportError::MissingFrame("static_objects"))
}

#[cfg(test)]
mod tests {
    use transport_types::{JointState, MagnebotFrame};

    use super::*;

    fn frames(held_right: Vec<ObjectId>) -> Vec<OutputFrame> {
        vec![
            OutputFrame::Transforms {
                objects: vec![ObjectTransform {
                    id: ObjectId(3),
                    position: Vector3::new(1.0, 0.0, 2.0),
                    rotation: Quaternion::IDENTITY,
                }],
            },
            OutputFrame::Magnebot(MagnebotFrame {
                position: Vector3::new(1.0, 0.0, 1.0),
                rotation: Quaternion::from_yaw(90.0),
                held_left: vec![],
                held_right,
                joints: vec![JointState {
                    joint: ArmJoint::Torso,
                    angles: Vector3::new(1.2, 0.0, 0.0),
                }],
                arm_moving: false,
            }),
        ]
    }

    #[test]
    fn decodes_held_objects_per_arm() {
        let state = SceneState::from_frames(&frames(vec![ObjectId(3)])).unwrap();
        assert_eq!(state.held(Arm::Right), &[ObjectId(3)]);
        assert!(state.held(Arm::Left).is_empty());
        assert_eq!(state.holding_arm(ObjectId(3)), Some(Arm::Right));
        assert!((state.torso_height() - 1.2).abs() < 1e-6);
    }

    #[test]
    fn missing_magnebot_frame_is_an_error() {
        let mut f = frames(vec![]);
        f.pop();
        let err = SceneState::from_frames(&f).unwrap_err();
        assert!(matches!(err, TransportError::MissingFrame("magnebot")));
    }

    #[test]
    fn unknown_object_is_an_error() {
        let state = SceneState::from_frames(&frames(vec![])).unwrap();
        assert!(state.position(ObjectId(3)).is_ok());
        assert!(matches!(
            state.position(ObjectId(99)),
            Err(TransportError::UnknownObject(ObjectId(99)))
        ));
    }

    #[test]
    fn body_frame_round_trip() {
        let state = SceneState::from_frames(&frames(vec![])).unwrap();
        // Facing +x: the object one metre along +z is on the robot's left.
        let local = state.to_body_frame(Vector3::new(1.0, 0.0, 2.0));
        assert!((local.x + 1.0).abs() < 1e-5);
        assert!(local.z.abs() < 1e-5);
        let back = state.to_world_frame(local);
        assert!((back.z - 2.0).abs() < 1e-5);
    }

    #[test]
    fn overlap_frame_required() {
        assert!(overlap_ids(&[OutputFrame::Unknown]).is_err());
        let ids = overlap_ids(&[OutputFrame::Overlap {
            object_ids: vec![ObjectId(1)],
        }])
        .unwrap();
        assert_eq!(ids, vec![ObjectId(1)]);
    }
}
