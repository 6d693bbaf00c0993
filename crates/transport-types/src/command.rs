//! Outbound simulator commands.
//!
//! A step is driven by sending an ordered batch (`Vec<Command>`).  Each
//! command serializes as a JSON object discriminated by a `"$type"` field, e.g.
//! `{"$type": "set_mass", "id": 3, "mass": 0.25}`.  The simulator applies the
//! commands of one batch in order before it advances physics.

use serde::{Deserialize, Serialize};

use crate::geometry::{Quaternion, Vector3};
use crate::{Arm, ArmJoint, ObjectId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "$type", rename_all = "snake_case")]
pub enum Command {
    /// Spawn a model.  `rotation` is Euler angles in degrees.
    AddObject {
        name: String,
        id: ObjectId,
        position: Vector3,
        rotation: Vector3,
    },
    ScaleObject {
        id: ObjectId,
        scale_factor: Vector3,
    },
    SetMass {
        id: ObjectId,
        mass: f32,
    },
    SetVisualMaterial {
        id: ObjectId,
        material_name: String,
        object_name: String,
        material_index: u32,
    },
    /// Spawn the robot with its arms at the neutral pose.
    AddMagnebot {
        position: Vector3,
    },
    SetRevoluteTarget {
        joint: ArmJoint,
        target: f32,
    },
    SetSphericalTarget {
        joint: ArmJoint,
        target: Vector3,
    },
    SetPrismaticTarget {
        joint: ArmJoint,
        target: f32,
    },
    AttachToMagnet {
        arm: Arm,
        object_id: ObjectId,
    },
    DetachFromMagnet {
        arm: Arm,
        object_id: ObjectId,
    },
    /// Turn to face `target` and drive until within `arrived_at` metres of it.
    MoveTo {
        target: Vector3,
        arrived_at: f32,
    },
    MoveBy {
        distance: f32,
    },
    TurnBy {
        angle: f32,
    },
    /// Request an `overlap` frame listing every object whose volume
    /// intersects the given oriented box.
    SendOverlapBox {
        position: Vector3,
        rotation: Quaternion,
        half_extents: Vector3,
    },
    /// Request a `static_objects` frame with the size of every object.
    SendStaticObjects,
}

impl Command {
    /// Whether this command targets an arm joint.
    pub fn is_joint_target(&self) -> bool {
        matches!(
            self,
            Command::SetRevoluteTarget { .. }
                | Command::SetSphericalTarget { .. }
                | Command::SetPrismaticTarget { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_are_tagged_by_type() {
        let cmd = Command::SetMass {
            id: ObjectId(3),
            mass: 0.25,
        };
        let json = serde_json::to_value(&cmd).unwrap();
        assert_eq!(json["$type"], "set_mass");
        assert_eq!(json["id"], 3);
    }

    #[test]
    fn unit_command_serializes_with_tag_only() {
        let json = serde_json::to_string(&Command::SendStaticObjects).unwrap();
        assert_eq!(json, r#"{"$type":"send_static_objects"}"#);
    }

    #[test]
    fn spherical_target_names_joint_in_snake_case() {
        let cmd = Command::SetSphericalTarget {
            joint: ArmJoint::WristRight,
            target: Vector3::new(-20.0, 0.0, 0.0),
        };
        let json = serde_json::to_value(&cmd).unwrap();
        assert_eq!(json["$type"], "set_spherical_target");
        assert_eq!(json["joint"], "wrist_right");
        assert!(cmd.is_joint_target());
    }

    #[test]
    fn overlap_box_decodes_from_wire() {
        let raw = r#"{
            "$type": "send_overlap_box",
            "position": {"x": 1.0, "y": 0.5, "z": -2.0},
            "rotation": {"x": 0.0, "y": 0.0, "z": 0.0, "w": 1.0},
            "half_extents": {"x": 0.3, "y": 0.2, "z": 0.3}
        }"#;
        let cmd: Command = serde_json::from_str(raw).unwrap();
        assert!(matches!(cmd, Command::SendOverlapBox { .. }));
        assert!(!cmd.is_joint_target());
    }
}
