//! [`RobotBody`] – primitive body actions and arm-motion planning.
//!
//! The orchestrator never talks joint targets directly.  It asks the body for
//! command batches ("reach this point", "reset this arm", "replay these joint
//! angles"), optionally rewrites a few targets, and hands the batch back to
//! [`RobotBody::do_arm_motion`] to execute and verify.
//!
//! Every method that talks to the simulator takes `&mut dyn SimulatorClient`
//! so one body implementation serves the WebSocket link and the in-process
//! [`SimWorld`](crate::sim::SimWorld) alike.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use transport_types::{
    ActionStatus, Arm, ArmJoint, Command, ObjectId, TransportError, Vector3,
};

use crate::client::SimulatorClient;
use crate::kinematics::{self, ArmPose, TORSO_DEFAULT};
use crate::scene_state::SceneState;
use crate::settle::{self, SettleConfig};

/// How a reach target is expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetFrame {
    /// World coordinates.
    Absolute,
    /// The robot's body frame (x right, y up, z forward).
    Relative,
}

/// Arm-motion tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// Steps to wait for the arm to stop before declaring a bend failure.
    pub max_frames: u32,
    /// Allowed difference (degrees) between a joint target and its final angle.
    pub angle_tolerance: f32,
    /// Allowed difference (metres) between the torso target and its height.
    pub torso_tolerance: f32,
    /// Distance kept to the target when driving towards an object.
    pub arrived_at: f32,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            max_frames: 200,
            angle_tolerance: 1.0,
            torso_tolerance: 0.01,
            arrived_at: 0.5,
        }
    }
}

/// Primitive actions and arm-motion planning of the robot.
pub trait RobotBody {
    /// Reach for `target` with `arm` and attach it to the magnet.
    ///
    /// Returns `cannot_reach` when no arm pose reaches the object and
    /// `failed_to_grasp` when the magnet did not end up holding it.
    fn grasp(
        &mut self,
        sim: &mut dyn SimulatorClient,
        target: ObjectId,
        arm: Arm,
    ) -> Result<ActionStatus, TransportError>;

    /// Release `target` from `arm`.  With `wait_for_objects` the call blocks
    /// until the released object stops moving.
    fn drop_object(
        &mut self,
        sim: &mut dyn SimulatorClient,
        target: ObjectId,
        arm: Arm,
        wait_for_objects: bool,
    ) -> Result<ActionStatus, TransportError>;

    /// Turn towards `target` and drive until within `arrived_at` metres.
    fn move_to(
        &mut self,
        sim: &mut dyn SimulatorClient,
        target: Vector3,
        arrived_at: f32,
    ) -> Result<ActionStatus, TransportError>;

    fn move_by(
        &mut self,
        sim: &mut dyn SimulatorClient,
        distance: f32,
    ) -> Result<ActionStatus, TransportError>;

    fn turn_by(
        &mut self,
        sim: &mut dyn SimulatorClient,
        angle: f32,
    ) -> Result<ActionStatus, TransportError>;

    /// Commands that return `arm` to its neutral pose, optionally resetting
    /// the shared torso as well.
    fn reset_arm_commands(&self, arm: Arm, reset_torso: bool) -> Vec<Command>;

    /// Commands that replay a joint-angle vector produced by
    /// [`joint_angles`](Self::joint_angles).
    fn joint_angle_commands(&self, arm: Arm, angles: &[f32], reset_torso: bool) -> Vec<Command>;

    /// Commands that move `arm`'s magnet onto `target`.  `fixed_torso` pins
    /// the torso height; otherwise the body picks one.  `None` when the
    /// target is unreachable.
    fn reach_commands(
        &self,
        state: &SceneState,
        arm: Arm,
        target: Vector3,
        frame: TargetFrame,
        fixed_torso: Option<f32>,
    ) -> Option<Vec<Command>>;

    /// Commands that point the forward axis of the object held by `arm` along
    /// `orientation` (body frame).
    fn orientation_commands(
        &self,
        state: &SceneState,
        arm: Arm,
        held: ObjectId,
        orientation: Vector3,
        fixed_torso: Option<f32>,
    ) -> Result<Vec<Command>, TransportError>;

    /// Current joint-angle vector of `arm`.
    fn joint_angles(&self, state: &SceneState, arm: Arm) -> Vec<f32>;

    /// Execute a joint-target batch, wait for the arm to stop, and verify
    /// every joint reached its target.
    fn do_arm_motion(
        &mut self,
        sim: &mut dyn SimulatorClient,
        commands: Vec<Command>,
    ) -> Result<ActionStatus, TransportError>;
}

// ────────────────────────────────────────────────────────────────────────────
// MagnebotBody
// ────────────────────────────────────────────────────────────────────────────

/// [`RobotBody`] for the two-armed magnet robot.
#[derive(Debug, Clone, Default)]
pub struct MagnebotBody {
    motion: MotionConfig,
    settle: SettleConfig,
}

/// Height below the shoulder and distance in front of it at which the
/// magnet is held while orienting an object.
const PRESENT_DROP: f32 = 0.15;
const PRESENT_REACH: f32 = 0.6;

impl MagnebotBody {
    pub fn new(motion: MotionConfig, settle: SettleConfig) -> Self {
        Self { motion, settle }
    }

    fn torso_command(height: f32) -> Command {
        Command::SetPrismaticTarget {
            joint: ArmJoint::Torso,
            target: height,
        }
    }

    fn reached(&self, state: &SceneState, command: &Command) -> bool {
        let tol = self.motion.angle_tolerance;
        match command {
            Command::SetRevoluteTarget { joint, target } => {
                (state.joint(*joint).x - target).abs() <= tol
            }
            Command::SetSphericalTarget { joint, target } => {
                let actual = state.joint(*joint);
                (actual.x - target.x).abs() <= tol
                    && (actual.y - target.y).abs() <= tol
                    && (actual.z - target.z).abs() <= tol
            }
            Command::SetPrismaticTarget { joint, target } => {
                (state.joint(*joint).x - target).abs() <= self.motion.torso_tolerance
            }
            _ => true,
        }
    }
}

impl RobotBody for MagnebotBody {
    fn grasp(
        &mut self,
        sim: &mut dyn SimulatorClient,
        target: ObjectId,
        arm: Arm,
    ) -> Result<ActionStatus, TransportError> {
        let state = SceneState::sample(sim)?;
        let position = state.position(target)?;
        let Some(commands) = self.reach_commands(&state, arm, position, TargetFrame::Absolute, None)
        else {
            debug!(%target, %arm, "no arm pose reaches the object");
            return Ok(ActionStatus::CannotReach);
        };
        if !self.do_arm_motion(sim, commands)?.is_success() {
            return Ok(ActionStatus::FailedToGrasp);
        }

        let frames = sim.communicate(&[Command::AttachToMagnet {
            arm,
            object_id: target,
        }])?;
        let state = SceneState::from_frames(&frames)?;
        if state.held(arm).contains(&target) {
            Ok(ActionStatus::Success)
        } else {
            debug!(%target, %arm, "magnet did not pick up the object");
            Ok(ActionStatus::FailedToGrasp)
        }
    }

    fn drop_object(
        &mut self,
        sim: &mut dyn SimulatorClient,
        target: ObjectId,
        arm: Arm,
        wait_for_objects: bool,
    ) -> Result<ActionStatus, TransportError> {
        let state = SceneState::sample(sim)?;
        if !state.held(arm).contains(&target) {
            return Ok(ActionStatus::NotHolding);
        }
        sim.communicate(&[Command::DetachFromMagnet {
            arm,
            object_id: target,
        }])?;
        if wait_for_objects {
            settle::wait_until_objects_stop(sim, &[target], &self.settle)?;
        }
        Ok(ActionStatus::Success)
    }

    fn move_to(
        &mut self,
        sim: &mut dyn SimulatorClient,
        target: Vector3,
        arrived_at: f32,
    ) -> Result<ActionStatus, TransportError> {
        let frames = sim.communicate(&[Command::MoveTo { target, arrived_at }])?;
        let state = SceneState::from_frames(&frames)?;
        let remaining = state.magnebot_position.horizontal_distance(target);
        // Small slack for the simulator's stopping distance.
        if remaining <= arrived_at + 0.1 {
            Ok(ActionStatus::Success)
        } else {
            warn!(remaining, arrived_at, "robot stopped short of its target");
            Ok(ActionStatus::CannotReach)
        }
    }

    fn move_by(
        &mut self,
        sim: &mut dyn SimulatorClient,
        distance: f32,
    ) -> Result<ActionStatus, TransportError> {
        sim.communicate(&[Command::MoveBy { distance }])?;
        Ok(ActionStatus::Success)
    }

    fn turn_by(
        &mut self,
        sim: &mut dyn SimulatorClient,
        angle: f32,
    ) -> Result<ActionStatus, TransportError> {
        sim.communicate(&[Command::TurnBy { angle }])?;
        Ok(ActionStatus::Success)
    }

    fn reset_arm_commands(&self, arm: Arm, reset_torso: bool) -> Vec<Command> {
        let mut commands = Vec::with_capacity(4);
        if reset_torso {
            commands.push(Self::torso_command(TORSO_DEFAULT));
        }
        commands.extend(ArmPose::NEUTRAL.commands(arm));
        commands
    }

    fn joint_angle_commands(&self, arm: Arm, angles: &[f32], reset_torso: bool) -> Vec<Command> {
        let Some(pose) = ArmPose::from_angles(angles) else {
            warn!(len = angles.len(), "malformed joint-angle vector; using the neutral pose");
            return self.reset_arm_commands(arm, reset_torso);
        };
        let mut commands = Vec::with_capacity(4);
        if reset_torso {
            commands.push(Self::torso_command(TORSO_DEFAULT));
        }
        commands.extend(pose.commands(arm));
        commands
    }

    fn reach_commands(
        &self,
        state: &SceneState,
        arm: Arm,
        target: Vector3,
        frame: TargetFrame,
        fixed_torso: Option<f32>,
    ) -> Option<Vec<Command>> {
        let local = match frame {
            TargetFrame::Absolute => state.to_body_frame(target),
            TargetFrame::Relative => target,
        };
        let torso = fixed_torso.unwrap_or_else(|| kinematics::auto_torso_height(local));
        let pose = kinematics::solve(arm, torso, local)?;
        let mut commands = vec![Self::torso_command(torso)];
        commands.extend(pose.commands(arm));
        Some(commands)
    }

    fn orientation_commands(
        &self,
        state: &SceneState,
        arm: Arm,
        held: ObjectId,
        orientation: Vector3,
        fixed_torso: Option<f32>,
    ) -> Result<Vec<Command>, TransportError> {
        let torso = fixed_torso.unwrap_or_else(|| state.torso_height());
        let present = kinematics::shoulder_position(arm, torso)
            + Vector3::new(0.0, -PRESENT_DROP, PRESENT_REACH);
        let mut pose = kinematics::solve(arm, torso, present).unwrap_or(ArmPose::NEUTRAL);

        // The grasp offset is whatever the object's pitch adds on top of the
        // current wrist pitch.
        let current = ArmPose::from_state(state, arm);
        let offset = state.rotation(held)?.pitch() - current.wrist_pitch;
        let wanted = (-orientation.y).atan2(orientation.z).to_degrees();
        pose.wrist_pitch = wrap_degrees(wanted - offset);

        let mut commands = vec![Self::torso_command(torso)];
        commands.extend(pose.commands(arm));
        Ok(commands)
    }

    fn joint_angles(&self, state: &SceneState, arm: Arm) -> Vec<f32> {
        ArmPose::from_state(state, arm).to_angles()
    }

    fn do_arm_motion(
        &mut self,
        sim: &mut dyn SimulatorClient,
        commands: Vec<Command>,
    ) -> Result<ActionStatus, TransportError> {
        let frames = sim.communicate(&commands)?;
        let mut state = SceneState::from_frames(&frames)?;
        let mut waited = 0;
        while state.arm_moving && waited < self.motion.max_frames {
            state = SceneState::sample(sim)?;
            waited += 1;
        }
        if state.arm_moving {
            warn!(frames = waited, "arm still moving; giving up");
            return Ok(ActionStatus::FailedToBend);
        }

        if let Some(missed) = commands.iter().find(|c| !self.reached(&state, c)) {
            debug!(command = ?missed, "joint did not reach its target");
            return Ok(ActionStatus::FailedToBend);
        }
        Ok(ActionStatus::Success)
    }
}

/// Wrap an angle into `(-180, 180]`.
fn wrap_degrees(angle: f32) -> f32 {
    let a = angle.rem_euclid(360.0);
    if a > 180.0 { a - 360.0 } else { a }
}
