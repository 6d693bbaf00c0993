//! Inbound per-step output frames.
//!
//! The simulator answers every command batch with a JSON array of frames,
//! each tagged by `"$type"`.  Frame types this stack does not consume (image
//! buffers, audio, …) decode to [`OutputFrame::Unknown`] and are skipped.

use serde::{Deserialize, Serialize};

use crate::geometry::{Quaternion, Vector3};
use crate::{ArmJoint, ObjectId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "$type", rename_all = "snake_case")]
pub enum OutputFrame {
    /// Position and rotation of every object this step.
    Transforms { objects: Vec<ObjectTransform> },
    /// Robot body state this step.
    Magnebot(MagnebotFrame),
    /// Answer to a `send_overlap_box` command.
    Overlap { object_ids: Vec<ObjectId> },
    /// Answer to a `send_static_objects` command.
    StaticObjects { objects: Vec<ObjectStatic> },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectTransform {
    pub id: ObjectId,
    pub position: Vector3,
    pub rotation: Quaternion,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectStatic {
    pub id: ObjectId,
    pub name: String,
    /// Bounding-box extents after scaling.
    pub size: Vector3,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MagnebotFrame {
    pub position: Vector3,
    pub rotation: Quaternion,
    #[serde(default)]
    pub held_left: Vec<ObjectId>,
    #[serde(default)]
    pub held_right: Vec<ObjectId>,
    pub joints: Vec<JointState>,
    /// `true` while any joint is still travelling towards its target.
    pub arm_moving: bool,
}

/// Current angles of one joint in degrees.  Revolute joints use `x` only;
/// the prismatic torso reports its height in metres in `x`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JointState {
    pub joint: ArmJoint,
    pub angles: Vector3,
}

/// Lookup helpers over one step's frames.
pub trait SimulatorFrames {
    /// IDs listed by the step's `overlap` frame.
    fn overlap(&self) -> Option<&[ObjectId]>;
    /// Records listed by the step's `static_objects` frame.
    fn static_objects(&self) -> Option<&[ObjectStatic]>;
}

impl SimulatorFrames for [OutputFrame] {
    fn overlap(&self) -> Option<&[ObjectId]> {
        self.iter().find_map(|f| match f {
            OutputFrame::Overlap { object_ids } => Some(object_ids.as_slice()),
            _ => None,
        })
    }

    fn static_objects(&self) -> Option<&[ObjectStatic]> {
        self.iter().find_map(|f| match f {
            OutputFrame::StaticObjects { objects } => Some(objects.as_slice()),
            _ => None,
        })
    }
}
