//! Two-link arm model.
//!
//! Each arm is a shoulder (pitch + yaw), an elbow (pitch) and a wrist
//! (pitch) on top of a prismatic torso shared by both arms.  Positions are in
//! the robot's body frame: x right, y up, z forward, origin on the floor
//! under the robot's centre.
//!
//! Pitch angles are measured from the horizontal, positive upwards, so the
//! neutral pose (`shoulder_pitch = -90`, `elbow = 90`) hangs the upper arm
//! straight down and points the forearm forward.  The wrist holds its pitch
//! relative to the torso: a held object's pitch is the wrist pitch plus
//! whatever tilt it was grasped with.

use transport_types::{Arm, ArmJoint, Command, Vector3};

use crate::scene_state::SceneState;

pub const UPPER_ARM_LENGTH: f32 = 0.55;
pub const FOREARM_LENGTH: f32 = 0.55;
/// Lateral distance from the body centre to each shoulder.
pub const SHOULDER_OFFSET: f32 = 0.22;

pub const TORSO_DEFAULT: f32 = 1.0;
pub const TORSO_MIN: f32 = 0.6;
pub const TORSO_MAX: f32 = 1.5;

pub const ELBOW_MIN: f32 = 0.0;
pub const ELBOW_MAX: f32 = 160.0;

/// Joint angles of one arm, in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArmPose {
    pub shoulder_pitch: f32,
    pub shoulder_yaw: f32,
    pub elbow: f32,
    pub wrist_pitch: f32,
}

impl ArmPose {
    pub const NEUTRAL: ArmPose = ArmPose {
        shoulder_pitch: -90.0,
        shoulder_yaw: 0.0,
        elbow: 90.0,
        wrist_pitch: 0.0,
    };

    /// Flatten to `[shoulder_pitch, shoulder_yaw, elbow, wrist_pitch]`.
    pub fn to_angles(self) -> Vec<f32> {
        vec![
            self.shoulder_pitch,
            self.shoulder_yaw,
            self.elbow,
            self.wrist_pitch,
        ]
    }

    /// Inverse of [`to_angles`](Self::to_angles).
    pub fn from_angles(angles: &[f32]) -> Option<Self> {
        match angles {
            [shoulder_pitch, shoulder_yaw, elbow, wrist_pitch] => Some(Self {
                shoulder_pitch: *shoulder_pitch,
                shoulder_yaw: *shoulder_yaw,
                elbow: *elbow,
                wrist_pitch: *wrist_pitch,
            }),
            _ => None,
        }
    }

    /// Current pose of `arm` as reported by a step.
    pub fn from_state(state: &SceneState, arm: Arm) -> Self {
        let shoulder = state.joint(ArmJoint::shoulder(arm));
        Self {
            shoulder_pitch: shoulder.x,
            shoulder_yaw: shoulder.y,
            elbow: state.joint(ArmJoint::elbow(arm)).x,
            wrist_pitch: state.joint(ArmJoint::wrist(arm)).x,
        }
    }

    /// Joint-target commands that drive `arm` to this pose.
    pub fn commands(self, arm: Arm) -> Vec<Command> {
        vec![
            Command::SetSphericalTarget {
                joint: ArmJoint::shoulder(arm),
                target: Vector3::new(self.shoulder_pitch, self.shoulder_yaw, 0.0),
            },
            Command::SetRevoluteTarget {
                joint: ArmJoint::elbow(arm),
                target: self.elbow,
            },
            Command::SetSphericalTarget {
                joint: ArmJoint::wrist(arm),
                target: Vector3::new(self.wrist_pitch, 0.0, 0.0),
            },
        ]
    }

    /// Pitch of the forearm from the horizontal.
    pub fn forearm_pitch(self) -> f32 {
        self.shoulder_pitch + self.elbow
    }
}

pub fn shoulder_position(arm: Arm, torso: f32) -> Vector3 {
    Vector3::new(arm.side() * SHOULDER_OFFSET, torso, 0.0)
}

/// Forward kinematics: magnet position in the body frame.
pub fn magnet_position(arm: Arm, torso: f32, pose: ArmPose) -> Vector3 {
    let a1 = pose.shoulder_pitch.to_radians();
    let a2 = pose.forearm_pitch().to_radians();
    let yaw = pose.shoulder_yaw.to_radians();
    let h = UPPER_ARM_LENGTH * a1.cos() + FOREARM_LENGTH * a2.cos();
    let v = UPPER_ARM_LENGTH * a1.sin() + FOREARM_LENGTH * a2.sin();
    shoulder_position(arm, torso) + Vector3::new(h * yaw.sin(), v, h * yaw.cos())
}

/// Inverse kinematics: a pose whose magnet lands on `target` (body frame).
///
/// Returns `None` when the target is out of reach of the two links.  The
/// wrist pitch of the result is zero.
pub fn solve(arm: Arm, torso: f32, target: Vector3) -> Option<ArmPose> {
    let d = target - shoulder_position(arm, torso);
    let h = (d.x * d.x + d.z * d.z).sqrt();
    let v = d.y;
    let r2 = h * h + v * v;
    let reach = UPPER_ARM_LENGTH + FOREARM_LENGTH;
    if r2 > reach * reach || r2.sqrt() < (UPPER_ARM_LENGTH - FOREARM_LENGTH).abs() {
        return None;
    }

    let cos_e = (r2 - UPPER_ARM_LENGTH.powi(2) - FOREARM_LENGTH.powi(2))
        / (2.0 * UPPER_ARM_LENGTH * FOREARM_LENGTH);
    let e = cos_e.clamp(-1.0, 1.0).acos();
    let a1 = v.atan2(h) - (FOREARM_LENGTH * e.sin()).atan2(UPPER_ARM_LENGTH + FOREARM_LENGTH * e.cos());
    let yaw = if h < 1e-6 { 0.0 } else { d.x.atan2(d.z) };

    let elbow = e.to_degrees();
    if !(ELBOW_MIN..=ELBOW_MAX).contains(&elbow) {
        return None;
    }
    Some(ArmPose {
        shoulder_pitch: a1.to_degrees(),
        shoulder_yaw: yaw.to_degrees(),
        elbow,
        wrist_pitch: 0.0,
    })
}

/// Torso height chosen when a reach does not fix it: high enough that the
/// shoulder sits one upper arm above the target.
pub fn auto_torso_height(target: Vector3) -> f32 {
    (target.y + UPPER_ARM_LENGTH).clamp(TORSO_MIN, TORSO_MAX)
}
