//! [`SimWorld`] – in-process simulator for headless runs and CI.
//!
//! Implements [`SimulatorClient`] with a small kinematic world so the whole
//! stack runs without the external simulator process.  It models just
//! enough physics for the composite actions to be meaningful:
//!
//! | Concern | Behaviour |
//! |---|---|
//! | Objects | Rigid boxes sized by model (see [`SimWorld::with_model_size`]), scaled by `scale_object`. |
//! | Arms | Joint targets are clamped to joint limits and reached over a few steps. |
//! | Magnets | `attach_to_magnet` succeeds when the magnet is within the grasp radius. |
//! | Held objects | Follow the magnet; pitch is the grasp tilt plus the wrist pitch. |
//! | Falling | Released objects drop at a fixed speed to the floor, or into a receptacle whose footprint they are over. |
//! | Receptacles | Carry their contents along; tipping one past [`SPILL_PITCH`] spills them. |
//! | Navigation | `move_to`, `move_by` and `turn_by` complete within one step. |
//!
//! # Example
//!
//! ```rust
//! use transport_hal::{SceneState, SimWorld, SimulatorClient};
//! use transport_types::{Command, ObjectId, Vector3};
//!
//! let mut sim = SimWorld::new();
//! let frames = sim
//!     .communicate(&[
//!         Command::AddObject {
//!             name: "jug05".into(),
//!             id: ObjectId(1),
//!             position: Vector3::new(0.0, 0.0, 1.0),
//!             rotation: Vector3::ZERO,
//!         },
//!         Command::AddMagnebot { position: Vector3::ZERO },
//!     ])
//!     .unwrap();
//! let state = SceneState::from_frames(&frames).unwrap();
//! assert!(state.held(transport_types::Arm::Left).is_empty());
//! ```

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, trace};
use transport_types::{
    Arm, ArmJoint, Command, JointState, MagnebotFrame, ObjectId, ObjectStatic, ObjectTransform,
    OutputFrame, Quaternion, TransportError, Vector3,
};

use crate::client::SimulatorClient;
use crate::kinematics::{self, ArmPose, ELBOW_MAX, ELBOW_MIN, TORSO_DEFAULT, TORSO_MAX, TORSO_MIN};

/// Size of models that were not registered with a size.
pub const DEFAULT_MODEL_SIZE: Vector3 = Vector3::new(0.1, 0.1, 0.1);
/// Pitch (degrees, either direction) past which a receptacle spills.
pub const SPILL_PITCH: f32 = 80.0;

const ARM_MOTION_STEPS: u32 = 4;
const SHOULDER_PITCH_LIMIT: f32 = 180.0;
const SHOULDER_YAW_LIMIT: f32 = 110.0;

#[derive(Debug, Clone)]
struct SimObject {
    name: String,
    position: Vector3,
    rotation: Quaternion,
    size: Vector3,
    mass: f32,
    material: Option<String>,
    /// Height at which a falling object comes to rest.
    falling_to: Option<f32>,
    /// Receptacle this object rests in, with its offset from it.
    inside: Option<(ObjectId, Vector3)>,
}

#[derive(Debug, Clone, Copy)]
struct Grip {
    object: ObjectId,
    tilt: f32,
}

#[derive(Debug, Clone)]
struct SimRobot {
    position: Vector3,
    yaw: f32,
    torso: f32,
    torso_target: f32,
    poses: [ArmPose; 2],
    targets: [ArmPose; 2],
    steps_left: u32,
    grips: [Option<Grip>; 2],
}

impl Default for SimRobot {
    fn default() -> Self {
        Self {
            position: Vector3::ZERO,
            yaw: 0.0,
            torso: TORSO_DEFAULT,
            torso_target: TORSO_DEFAULT,
            poses: [ArmPose::NEUTRAL; 2],
            targets: [ArmPose::NEUTRAL; 2],
            steps_left: 0,
            grips: [None; 2],
        }
    }
}

fn slot(arm: Arm) -> usize {
    match arm {
        Arm::Left => 0,
        Arm::Right => 1,
    }
}

/// In-process [`SimulatorClient`].
pub struct SimWorld {
    objects: BTreeMap<ObjectId, SimObject>,
    robot: SimRobot,
    model_sizes: HashMap<String, Vector3>,
    receptacles: Vec<String>,
    grasp_tilt: f32,
    grasp_radius: f32,
    wrist_limit: f32,
    fall_speed: f32,
    log: Vec<Vec<Command>>,
}

impl Default for SimWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl SimWorld {
    pub fn new() -> Self {
        Self {
            objects: BTreeMap::new(),
            robot: SimRobot::default(),
            model_sizes: HashMap::new(),
            receptacles: Vec::new(),
            grasp_tilt: 25.0,
            grasp_radius: 0.15,
            wrist_limit: 120.0,
            fall_speed: 0.05,
            log: Vec::new(),
        }
    }

    /// Unscaled size of `model`.
    pub fn with_model_size(mut self, model: &str, size: Vector3) -> Self {
        self.model_sizes.insert(model.to_string(), size);
        self
    }

    /// Register `model` as something objects can land inside.
    pub fn with_receptacle(mut self, model: &str, size: Vector3) -> Self {
        self.receptacles.push(model.to_string());
        self.with_model_size(model, size)
    }

    /// Pitch (degrees) an object picks up when the magnet attaches to it.
    pub fn with_grasp_tilt(mut self, degrees: f32) -> Self {
        self.grasp_tilt = degrees;
        self
    }

    /// Symmetric wrist pitch limit (degrees).
    pub fn with_wrist_limit(mut self, degrees: f32) -> Self {
        self.wrist_limit = degrees;
        self
    }

    /// Every batch received so far, in order.
    pub fn command_log(&self) -> &[Vec<Command>] {
        &self.log
    }

    /// Number of `communicate` calls so far.
    pub fn round_trips(&self) -> usize {
        self.log.len()
    }

    pub fn object_position(&self, id: ObjectId) -> Option<Vector3> {
        self.objects.get(&id).map(|o| o.position)
    }

    pub fn object_mass(&self, id: ObjectId) -> Option<f32> {
        self.objects.get(&id).map(|o| o.mass)
    }

    pub fn object_material(&self, id: ObjectId) -> Option<&str> {
        self.objects.get(&id).and_then(|o| o.material.as_deref())
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    // ── commands ────────────────────────────────────────────────────────────

    fn apply(&mut self, command: &Command, extra: &mut Vec<OutputFrame>) {
        match command {
            Command::AddObject {
                name,
                id,
                position,
                rotation,
            } => {
                let size = self
                    .model_sizes
                    .get(name)
                    .copied()
                    .unwrap_or(DEFAULT_MODEL_SIZE);
                self.objects.insert(
                    *id,
                    SimObject {
                        name: name.clone(),
                        position: *position,
                        rotation: Quaternion::from_yaw(rotation.y),
                        size,
                        mass: 1.0,
                        material: None,
                        falling_to: None,
                        inside: None,
                    },
                );
            }
            Command::ScaleObject { id, scale_factor } => {
                if let Some(o) = self.objects.get_mut(id) {
                    o.size = Vector3::new(
                        o.size.x * scale_factor.x,
                        o.size.y * scale_factor.y,
                        o.size.z * scale_factor.z,
                    );
                }
            }
            Command::SetMass { id, mass } => {
                if let Some(o) = self.objects.get_mut(id) {
                    o.mass = *mass;
                }
            }
            Command::SetVisualMaterial {
                id, material_name, ..
            } => {
                if let Some(o) = self.objects.get_mut(id) {
                    o.material = Some(material_name.clone());
                }
            }
            Command::AddMagnebot { position } => {
                self.robot = SimRobot {
                    position: *position,
                    ..SimRobot::default()
                };
            }
            Command::SetRevoluteTarget { joint, target } => {
                if let Some(arm) = elbow_arm(*joint) {
                    self.robot.targets[slot(arm)].elbow = target.clamp(ELBOW_MIN, ELBOW_MAX);
                    self.robot.steps_left = ARM_MOTION_STEPS;
                }
            }
            Command::SetSphericalTarget { joint, target } => {
                let (arm, is_wrist) = match joint {
                    ArmJoint::ShoulderLeft => (Arm::Left, false),
                    ArmJoint::ShoulderRight => (Arm::Right, false),
                    ArmJoint::WristLeft => (Arm::Left, true),
                    ArmJoint::WristRight => (Arm::Right, true),
                    _ => return,
                };
                let pose = &mut self.robot.targets[slot(arm)];
                if is_wrist {
                    pose.wrist_pitch = target.x.clamp(-self.wrist_limit, self.wrist_limit);
                } else {
                    pose.shoulder_pitch =
                        target.x.clamp(-SHOULDER_PITCH_LIMIT, SHOULDER_PITCH_LIMIT);
                    pose.shoulder_yaw = target.y.clamp(-SHOULDER_YAW_LIMIT, SHOULDER_YAW_LIMIT);
                }
                self.robot.steps_left = ARM_MOTION_STEPS;
            }
            Command::SetPrismaticTarget { joint, target } => {
                if *joint == ArmJoint::Torso {
                    self.robot.torso_target = target.clamp(TORSO_MIN, TORSO_MAX);
                    self.robot.steps_left = ARM_MOTION_STEPS;
                }
            }
            Command::AttachToMagnet { arm, object_id } => self.attach(*arm, *object_id),
            Command::DetachFromMagnet { arm, object_id } => self.detach(*arm, *object_id),
            Command::MoveTo { target, arrived_at } => {
                let dx = target.x - self.robot.position.x;
                let dz = target.z - self.robot.position.z;
                let distance = (dx * dx + dz * dz).sqrt();
                if distance > 1e-6 {
                    self.robot.yaw = dx.atan2(dz).to_degrees();
                    let travel = (distance - arrived_at).max(0.0);
                    self.robot.position = self.robot.position
                        + Vector3::new(dx / distance, 0.0, dz / distance) * travel;
                }
            }
            Command::MoveBy { distance } => {
                let forward = Quaternion::from_yaw(self.robot.yaw).rotate(Vector3::FORWARD);
                self.robot.position = self.robot.position + forward * *distance;
            }
            Command::TurnBy { angle } => self.robot.yaw += angle,
            Command::SendOverlapBox {
                position,
                rotation,
                half_extents,
            } => extra.push(OutputFrame::Overlap {
                object_ids: self.overlap(*position, *rotation, *half_extents),
            }),
            Command::SendStaticObjects => extra.push(OutputFrame::StaticObjects {
                objects: self
                    .objects
                    .iter()
                    .map(|(id, o)| ObjectStatic {
                        id: *id,
                        name: o.name.clone(),
                        size: o.size,
                    })
                    .collect(),
            }),
        }
    }

    fn magnet_world(&self, arm: Arm) -> Vector3 {
        let local = kinematics::magnet_position(arm, self.robot.torso, self.robot.poses[slot(arm)]);
        Quaternion::from_yaw(self.robot.yaw).rotate(local) + self.robot.position
    }

    fn holder(&self, id: ObjectId) -> Option<Arm> {
        Arm::ALL
            .into_iter()
            .find(|arm| self.robot.grips[slot(*arm)].is_some_and(|g| g.object == id))
    }

    fn attach(&mut self, arm: Arm, id: ObjectId) {
        if self.robot.grips[slot(arm)].is_some() || self.holder(id).is_some() {
            return;
        }
        let magnet = self.magnet_world(arm);
        let Some(object) = self.objects.get_mut(&id) else {
            return;
        };
        let gap = object.position.distance(magnet);
        if gap > self.grasp_radius {
            debug!(%id, gap, "magnet too far to attach");
            return;
        }
        object.falling_to = None;
        object.inside = None;
        self.robot.grips[slot(arm)] = Some(Grip {
            object: id,
            tilt: self.grasp_tilt,
        });
    }

    fn detach(&mut self, arm: Arm, id: ObjectId) {
        if !self.robot.grips[slot(arm)].is_some_and(|g| g.object == id) {
            return;
        }
        self.robot.grips[slot(arm)] = None;
        let Some(position) = self.object_position(id) else {
            return;
        };
        let landing = self.receptacle_below(id, position);
        if let Some(object) = self.objects.get_mut(&id) {
            object.rotation = Quaternion::from_yaw(object.rotation.yaw());
            match landing {
                Some((receptacle, floor)) => {
                    object.falling_to = Some(floor);
                    object.inside = Some((receptacle, Vector3::ZERO));
                }
                None => {
                    object.falling_to = Some(0.0);
                    object.inside = None;
                }
            }
        }
    }

    /// The receptacle whose footprint contains `position`, and the height at
    /// which an object released there comes to rest.
    fn receptacle_below(&self, id: ObjectId, position: Vector3) -> Option<(ObjectId, f32)> {
        self.objects
            .iter()
            .filter(|(other, o)| **other != id && self.receptacles.contains(&o.name))
            .find(|(_, o)| {
                let local = o.rotation.conjugate().rotate(position - o.position);
                local.x.abs() <= o.size.x * 0.5
                    && local.z.abs() <= o.size.z * 0.5
                    && position.y >= o.position.y
            })
            .map(|(other, o)| (*other, o.position.y - o.size.y * 0.25))
    }

    fn overlap(&self, center: Vector3, rotation: Quaternion, half: Vector3) -> Vec<ObjectId> {
        let inverse = rotation.conjugate();
        self.objects
            .iter()
            .filter(|(_, o)| {
                let local = inverse.rotate(o.position - center);
                local.x.abs() <= half.x && local.y.abs() <= half.y && local.z.abs() <= half.z
            })
            .map(|(id, _)| *id)
            .collect()
    }

    // ── physics step ────────────────────────────────────────────────────────

    fn step(&mut self) {
        self.step_arms();
        self.step_held();
        self.step_contents();
        self.step_falling();
    }

    fn step_arms(&mut self) {
        let robot = &mut self.robot;
        if robot.steps_left == 0 {
            return;
        }
        let n = robot.steps_left as f32;
        robot.torso += (robot.torso_target - robot.torso) / n;
        for i in 0..2 {
            let (cur, tgt) = (&mut robot.poses[i], robot.targets[i]);
            cur.shoulder_pitch += (tgt.shoulder_pitch - cur.shoulder_pitch) / n;
            cur.shoulder_yaw += (tgt.shoulder_yaw - cur.shoulder_yaw) / n;
            cur.elbow += (tgt.elbow - cur.elbow) / n;
            cur.wrist_pitch += (tgt.wrist_pitch - cur.wrist_pitch) / n;
        }
        robot.steps_left -= 1;
        if robot.steps_left == 0 {
            robot.torso = robot.torso_target;
            robot.poses = robot.targets;
        }
    }

    fn step_held(&mut self) {
        for arm in Arm::ALL {
            let Some(grip) = self.robot.grips[slot(arm)] else {
                continue;
            };
            let magnet = self.magnet_world(arm);
            let pose = self.robot.poses[slot(arm)];
            let pitch = grip.tilt + pose.wrist_pitch;
            let rotation = Quaternion::from_yaw(self.robot.yaw + pose.shoulder_yaw)
                .mul(Quaternion::from_pitch(pitch));
            if let Some(object) = self.objects.get_mut(&grip.object) {
                object.position = magnet;
                object.rotation = rotation;
            }
            if pitch.abs() >= SPILL_PITCH {
                self.spill(grip.object);
            }
        }
    }

    fn spill(&mut self, receptacle: ObjectId) {
        for (id, object) in self.objects.iter_mut() {
            if object.inside.is_some_and(|(r, _)| r == receptacle) {
                trace!(%id, %receptacle, "contents spilled");
                object.inside = None;
                object.falling_to = Some(0.0);
            }
        }
    }

    fn step_contents(&mut self) {
        let anchors: HashMap<ObjectId, Vector3> = self
            .objects
            .iter()
            .map(|(id, o)| (*id, o.position))
            .collect();
        for object in self.objects.values_mut() {
            if object.falling_to.is_some() {
                continue;
            }
            if let Some((receptacle, offset)) = object.inside {
                if let Some(anchor) = anchors.get(&receptacle) {
                    object.position = *anchor + offset;
                }
            }
        }
    }

    fn step_falling(&mut self) {
        let anchors: HashMap<ObjectId, Vector3> = self
            .objects
            .iter()
            .map(|(id, o)| (*id, o.position))
            .collect();
        for object in self.objects.values_mut() {
            let Some(floor) = object.falling_to else {
                continue;
            };
            object.position.y = (object.position.y - self.fall_speed).max(floor);
            if object.position.y <= floor {
                object.falling_to = None;
                if let Some((receptacle, _)) = object.inside {
                    if let Some(anchor) = anchors.get(&receptacle) {
                        object.inside = Some((receptacle, object.position - *anchor));
                    }
                }
            }
        }
    }

    // ── output ──────────────────────────────────────────────────────────────

    fn frames(&self, extra: Vec<OutputFrame>) -> Vec<OutputFrame> {
        let robot = &self.robot;
        let mut joints = vec![JointState {
            joint: ArmJoint::Torso,
            angles: Vector3::new(robot.torso, 0.0, 0.0),
        }];
        for arm in Arm::ALL {
            let pose = robot.poses[slot(arm)];
            joints.push(JointState {
                joint: ArmJoint::shoulder(arm),
                angles: Vector3::new(pose.shoulder_pitch, pose.shoulder_yaw, 0.0),
            });
            joints.push(JointState {
                joint: ArmJoint::elbow(arm),
                angles: Vector3::new(pose.elbow, 0.0, 0.0),
            });
            joints.push(JointState {
                joint: ArmJoint::wrist(arm),
                angles: Vector3::new(pose.wrist_pitch, 0.0, 0.0),
            });
        }
        let held = |arm: Arm| -> Vec<ObjectId> {
            robot.grips[slot(arm)].map(|g| g.object).into_iter().collect()
        };

        let mut frames = vec![
            OutputFrame::Transforms {
                objects: self
                    .objects
                    .iter()
                    .map(|(id, o)| ObjectTransform {
                        id: *id,
                        position: o.position,
                        rotation: o.rotation,
                    })
                    .collect(),
            },
            OutputFrame::Magnebot(MagnebotFrame {
                position: robot.position,
                rotation: Quaternion::from_yaw(robot.yaw),
                held_left: held(Arm::Left),
                held_right: held(Arm::Right),
                joints,
                arm_moving: robot.steps_left > 0,
            }),
        ];
        frames.extend(extra);
        frames
    }
}

fn elbow_arm(joint: ArmJoint) -> Option<Arm> {
    match joint {
        ArmJoint::ElbowLeft => Some(Arm::Left),
        ArmJoint::ElbowRight => Some(Arm::Right),
        _ => None,
    }
}

impl SimulatorClient for SimWorld {
    fn communicate(&mut self, commands: &[Command]) -> Result<Vec<OutputFrame>, TransportError> {
        self.log.push(commands.to_vec());
        let mut extra = Vec::new();
        for command in commands {
            self.apply(command, &mut extra);
        }
        self.step();
        Ok(self.frames(extra))
    }
}

#[cfg(test)]
mod tests {
    use transport_types::SimulatorFrames;

    use super::*;
    use crate::scene_state::SceneState;

    fn add(id: u32, name: &str, position: Vector3) -> Command {
        Command::AddObject {
            name: name.into(),
            id: ObjectId(id),
            position,
            rotation: Vector3::ZERO,
        }
    }

    #[test]
    fn scale_object_multiplies_model_size() {
        let mut sim = SimWorld::new().with_model_size("crate", Vector3::new(0.5, 0.5, 0.5));
        let frames = sim
            .communicate(&[
                add(1, "crate", Vector3::ZERO),
                Command::ScaleObject {
                    id: ObjectId(1),
                    scale_factor: Vector3::new(0.6, 0.4, 0.6),
                },
                Command::SendStaticObjects,
            ])
            .unwrap();
        let statics = frames.static_objects().unwrap();
        assert!((statics[0].size.y - 0.2).abs() < 1e-6);
    }

    #[test]
    fn arm_motion_takes_several_steps() {
        let mut sim = SimWorld::new();
        sim.communicate(&[Command::AddMagnebot {
            position: Vector3::ZERO,
        }])
        .unwrap();
        let frames = sim
            .communicate(&[Command::SetRevoluteTarget {
                joint: ArmJoint::ElbowLeft,
                target: 45.0,
            }])
            .unwrap();
        assert!(SceneState::from_frames(&frames).unwrap().arm_moving);
        let mut state = SceneState::sample(&mut sim).unwrap();
        while state.arm_moving {
            state = SceneState::sample(&mut sim).unwrap();
        }
        assert!((state.joint(ArmJoint::ElbowLeft).x - 45.0).abs() < 1e-4);
    }

    #[test]
    fn overlap_box_respects_rotation() {
        let mut sim = SimWorld::new();
        sim.communicate(&[
            add(1, "a", Vector3::new(0.0, 0.0, 0.4)),
            add(2, "b", Vector3::new(0.4, 0.0, 0.0)),
        ])
        .unwrap();
        // A box long along its local z, turned a quarter to lie along world x.
        let frames = sim
            .communicate(&[Command::SendOverlapBox {
                position: Vector3::ZERO,
                rotation: Quaternion::from_yaw(90.0),
                half_extents: Vector3::new(0.1, 0.1, 0.5),
            }])
            .unwrap();
        assert_eq!(frames.overlap(), Some(&[ObjectId(2)][..]));
    }

    #[test]
    fn released_object_lands_inside_receptacle_and_follows_it() {
        let mut sim = SimWorld::new().with_receptacle("bin", Vector3::new(0.4, 0.4, 0.4));
        sim.communicate(&[
            add(1, "bin", Vector3::new(0.0, 0.0, 2.0)),
            add(2, "ball", Vector3::new(0.0, 0.0, 0.55)),
            Command::AddMagnebot {
                position: Vector3::ZERO,
            },
        ])
        .unwrap();
        // Put the ball in by hand: hold it over the bin, then let go.
        sim.objects.get_mut(&ObjectId(2)).unwrap().position = Vector3::new(0.0, 0.3, 2.0);
        sim.robot.grips[0] = Some(Grip {
            object: ObjectId(2),
            tilt: 0.0,
        });
        sim.detach(Arm::Left, ObjectId(2));
        for _ in 0..20 {
            sim.communicate(&[]).unwrap();
        }
        let inside = sim.objects[&ObjectId(2)].inside.map(|(r, _)| r);
        assert_eq!(inside, Some(ObjectId(1)));

        sim.objects.get_mut(&ObjectId(1)).unwrap().position = Vector3::new(1.0, 0.0, 2.0);
        sim.communicate(&[]).unwrap();
        let ball = sim.object_position(ObjectId(2)).unwrap();
        assert!((ball.x - 1.0).abs() < 1e-5);
    }

    #[test]
    fn attach_needs_magnet_nearby() {
        let mut sim = SimWorld::new();
        let frames = sim
            .communicate(&[
                add(1, "far", Vector3::new(3.0, 0.0, 3.0)),
                Command::AddMagnebot {
                    position: Vector3::ZERO,
                },
                Command::AttachToMagnet {
                    arm: Arm::Right,
                    object_id: ObjectId(1),
                },
            ])
            .unwrap();
        let state = SceneState::from_frames(&frames).unwrap();
        assert!(state.held(Arm::Right).is_empty());
    }

    #[test]
    fn move_to_stops_at_arrival_distance() {
        let mut sim = SimWorld::new();
        sim.communicate(&[Command::AddMagnebot {
            position: Vector3::ZERO,
        }])
        .unwrap();
        let frames = sim
            .communicate(&[Command::MoveTo {
                target: Vector3::new(3.0, 0.0, 4.0),
                arrived_at: 1.0,
            }])
            .unwrap();
        let state = SceneState::from_frames(&frames).unwrap();
        let left = state
            .magnebot_position
            .horizontal_distance(Vector3::new(3.0, 0.0, 4.0));
        assert!((left - 1.0).abs() < 1e-4);
        assert_eq!(sim.round_trips(), 2);
    }
}
