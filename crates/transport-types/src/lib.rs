//! `transport-types` – shared vocabulary of the Transport Challenge stack.
//!
//! Every other crate speaks in these types: object identifiers, the two
//! magnet arms, the closed [`ActionStatus`] enumeration returned by every
//! action, the wire-level [`Command`] and [`OutputFrame`] enums exchanged with
//! the simulator, and the infrastructure error type [`TransportError`].
//!
//! # Modules
//!
//! - [`geometry`] – [`Vector3`] and [`Quaternion`] in the simulator's
//!   left-handed, y-up convention.
//! - [`command`] – outbound [`Command`] batch entries.
//! - [`output`] – inbound [`OutputFrame`] values.

pub mod command;
pub mod geometry;
pub mod output;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use command::Command;
pub use geometry::{Quaternion, Vector3};
pub use output::{
    JointState, MagnebotFrame, ObjectStatic, ObjectTransform, OutputFrame, SimulatorFrames,
};

/// Unique identifier of a simulated object, assigned when it is added to the
/// scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(pub u32);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One of the robot's two arms, each ending in a magnet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Arm {
    Left,
    Right,
}

impl Arm {
    /// Both arms, left first.
    pub const ALL: [Arm; 2] = [Arm::Left, Arm::Right];

    /// The other arm.
    pub fn opposite(self) -> Self {
        match self {
            Arm::Left => Arm::Right,
            Arm::Right => Arm::Left,
        }
    }

    /// `-1.0` for the left arm, `1.0` for the right arm (the robot's local
    /// x axis points to its right).
    pub fn side(self) -> f32 {
        match self {
            Arm::Left => -1.0,
            Arm::Right => 1.0,
        }
    }
}

impl fmt::Display for Arm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arm::Left => write!(f, "left"),
            Arm::Right => write!(f, "right"),
        }
    }
}

/// Addressable joints of the robot body.
///
/// The torso is a prismatic joint shared by both arms.  Shoulders and wrists
/// are spherical (x = pitch, y = yaw, z = roll, degrees); elbows are revolute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArmJoint {
    Torso,
    ShoulderLeft,
    ElbowLeft,
    WristLeft,
    ShoulderRight,
    ElbowRight,
    WristRight,
}

impl ArmJoint {
    pub fn shoulder(arm: Arm) -> Self {
        match arm {
            Arm::Left => ArmJoint::ShoulderLeft,
            Arm::Right => ArmJoint::ShoulderRight,
        }
    }

    pub fn elbow(arm: Arm) -> Self {
        match arm {
            Arm::Left => ArmJoint::ElbowLeft,
            Arm::Right => ArmJoint::ElbowRight,
        }
    }

    pub fn wrist(arm: Arm) -> Self {
        match arm {
            Arm::Left => ArmJoint::WristLeft,
            Arm::Right => ArmJoint::WristRight,
        }
    }
}

/// Outcome of a robot action.  Exactly one status is returned per action
/// invocation; none of them is fatal to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Success,
    /// The inverse-kinematics solver could not find a pose for the target.
    CannotReach,
    /// The magnet did not end up holding the target, or was already busy.
    FailedToGrasp,
    /// The arm could not bend to the requested joint targets.
    FailedToBend,
    /// The robot is not holding what the action requires.
    NotHolding,
    /// The released object did not land in the container.
    NotIn,
    /// Objects remained in the container after pouring.
    StillIn,
    /// A search for a required object found nothing.
    NotFound,
}

impl ActionStatus {
    pub fn is_success(self) -> bool {
        self == ActionStatus::Success
    }
}

impl fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ActionStatus::Success => "success",
            ActionStatus::CannotReach => "cannot_reach",
            ActionStatus::FailedToGrasp => "failed_to_grasp",
            ActionStatus::FailedToBend => "failed_to_bend",
            ActionStatus::NotHolding => "not_holding",
            ActionStatus::NotIn => "not_in",
            ActionStatus::StillIn => "still_in",
            ActionStatus::NotFound => "not_found",
        };
        f.write_str(s)
    }
}

/// Infrastructure failures: the simulator link, frame decoding, and
/// configuration.  Task-level outcomes are [`ActionStatus`] values instead.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Simulator connection error: {0}")]
    Connection(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Response is missing a `{0}` frame")]
    MissingFrame(&'static str),

    #[error("Unknown object: {0}")]
    UnknownObject(ObjectId),

    #[error("Configuration error: {0}")]
    Config(String),
}
