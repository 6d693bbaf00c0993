//! [`Transport`] – the composite-action orchestrator.
//!
//! Sequences body primitives into the task-level actions of the challenge:
//!
//! ```text
//! pick_up ──► grasp ──► reset_arm (levels a held container, caches pose)
//! put_in  ──► stage container ──► reach over it ──► drop ──► settle
//!             ──► reset both arms ──► overlap query
//! pour_out ─► snapshot contents ──► tip container ──► settle
//!             ──► reset_arm ──► overlap query
//! ```
//!
//! Every action returns an [`ActionStatus`]; `Err` is reserved for
//! infrastructure failures (the simulator link, malformed frames).  The
//! latest [`SceneState`] is kept after every action so precondition checks
//! cost no simulator round trip.

use std::collections::HashMap;

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, warn};
use transport_hal::scene_state::static_objects;
use transport_hal::settle;
use transport_hal::{MagnebotBody, RobotBody, SceneState, SimulatorClient, TargetFrame};
use transport_types::{
    ActionStatus, Arm, ArmJoint, Command, ObjectId, TransportError, Vector3,
};

use crate::catalog::Catalog;
use crate::config::TransportConfig;
use crate::containment::ContainmentQuery;
use crate::registry::EntityRegistry;
use crate::reset_pose::{self, ArmResetPoseCache};
use crate::scene::{self, FloorRegion, SceneLayout};

pub struct Transport<C: SimulatorClient, B: RobotBody = MagnebotBody> {
    sim: C,
    body: B,
    config: TransportConfig,
    catalog: Catalog,
    registry: EntityRegistry,
    reset_poses: ArmResetPoseCache,
    state: SceneState,
    static_sizes: HashMap<ObjectId, Vector3>,
    rng: ChaCha8Rng,
    seed: u64,
    leveling_solves: u32,
}

impl<C: SimulatorClient> Transport<C, MagnebotBody> {
    /// Orchestrator over the standard robot body.
    pub fn new(sim: C, config: TransportConfig, catalog: Catalog) -> Result<Self, TransportError> {
        let body = MagnebotBody::new(config.motion, config.settle);
        Self::with_body(sim, body, config, catalog)
    }
}

impl<C: SimulatorClient, B: RobotBody> Transport<C, B> {
    /// Rejects an invalid `config` before any simulator traffic.
    pub fn with_body(
        sim: C,
        body: B,
        config: TransportConfig,
        catalog: Catalog,
    ) -> Result<Self, TransportError> {
        config.validate()?;
        let seed = config.random_seed.unwrap_or_else(rand::random);
        info!(seed, "transport orchestrator ready");
        Ok(Self {
            sim,
            body,
            config,
            catalog,
            registry: EntityRegistry::new(),
            reset_poses: ArmResetPoseCache::default(),
            state: SceneState::default(),
            static_sizes: HashMap::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed,
            leveling_solves: 0,
        })
    }

    // ── accessors ───────────────────────────────────────────────────────────

    pub fn containers(&self) -> &[ObjectId] {
        self.registry.containers()
    }

    pub fn target_objects(&self) -> &[ObjectId] {
        self.registry.target_objects()
    }

    /// The snapshot taken after the last action.
    pub fn state(&self) -> &SceneState {
        &self.state
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn simulator(&self) -> &C {
        &self.sim
    }

    /// Cached leveling pose of `arm`, if any.
    pub fn reset_pose(&self, arm: Arm) -> Option<&[f32]> {
        self.reset_poses.get(arm)
    }

    /// Number of times the container-leveling wrist angle was derived from a
    /// live rotation (as opposed to replayed from the cache).
    pub fn leveling_solves(&self) -> u32 {
        self.leveling_solves
    }

    /// Size reported for `id` when the scene started.
    pub fn static_size(&self, id: ObjectId) -> Option<Vector3> {
        self.static_sizes.get(&id).copied()
    }

    // ── scene setup ─────────────────────────────────────────────────────────

    /// Populate `layout` with target objects and containers, then spawn the
    /// robot at `magnebot_position`.
    pub fn init_scene(
        &mut self,
        layout: &SceneLayout,
        magnebot_position: Vector3,
    ) -> Result<ActionStatus, TransportError> {
        self.clear_scene();
        let plan = scene::plan_population(layout, &self.catalog, &self.config, &mut self.rng)?;
        info!(
            layout = %layout.name,
            target_room = plan.target_room,
            target_objects = plan.target_objects.len(),
            containers = plan.containers.len(),
            "populating scene"
        );
        for obj in &plan.target_objects {
            self.add_target_object(&obj.model, obj.position)?;
        }
        for c in &plan.containers {
            self.add_container(&c.model, c.position, c.yaw);
        }
        self.init_custom_scene(magnebot_position)
    }

    /// Forget every registered entity and cached pose.  Follow with
    /// [`add_container`](Self::add_container) /
    /// [`add_target_object`](Self::add_target_object) and
    /// [`init_custom_scene`](Self::init_custom_scene).
    pub fn clear_scene(&mut self) {
        self.registry.clear();
        self.reset_poses.clear();
        self.static_sizes.clear();
    }

    pub fn add_container(&mut self, model: &str, position: Vector3, yaw: f32) -> ObjectId {
        self.registry
            .add_container(model, position, yaw, &self.config)
    }

    /// Register a target object of catalog model `model` with a random yaw
    /// and a random material from the pool.
    pub fn add_target_object(
        &mut self,
        model: &str,
        position: Vector3,
    ) -> Result<ObjectId, TransportError> {
        let entry = self
            .catalog
            .target_object(model)
            .ok_or_else(|| TransportError::Config(format!("unknown target object model `{model}`")))?;
        let yaw_limit = self.config.max_spawn_yaw.abs();
        let yaw = self.rng.gen_range(-yaw_limit..=yaw_limit);
        let material = self
            .catalog
            .materials
            .choose(&mut self.rng)
            .ok_or_else(|| TransportError::Config("catalog has no materials".into()))?;
        Ok(self
            .registry
            .add_target_object(entry, position, yaw, material, &self.config))
    }

    /// Spawn every registered entity and the robot in one batch, record
    /// static sizes, and settle the arms at the neutral pose.
    pub fn init_custom_scene(
        &mut self,
        magnebot_position: Vector3,
    ) -> Result<ActionStatus, TransportError> {
        let mut commands = self.registry.take_commands();
        commands.push(Command::AddMagnebot {
            position: magnebot_position,
        });
        commands.push(Command::SendStaticObjects);
        let frames = self.sim.communicate(&commands)?;
        for s in static_objects(&frames)? {
            self.static_sizes.insert(s.id, s.size);
        }
        self.state = SceneState::from_frames(&frames)?;

        let mut reset = self.body.reset_arm_commands(Arm::Left, true);
        reset.extend(self.body.reset_arm_commands(Arm::Right, false));
        let status = self.body.do_arm_motion(&mut self.sim, reset)?;
        self.refresh_state()?;
        debug!(
            containers = self.registry.containers().len(),
            target_objects = self.registry.target_objects().len(),
            %status,
            "scene initialised"
        );
        Ok(status)
    }

    // ── composite actions ───────────────────────────────────────────────────

    /// Grasp `target` with `arm` and raise it to the reset pose.
    pub fn pick_up(&mut self, target: ObjectId, arm: Arm) -> Result<ActionStatus, TransportError> {
        if self.state.held(arm).contains(&target) {
            return Ok(ActionStatus::Success);
        }
        if !self.state.held(arm).is_empty() {
            debug!(%arm, %target, "arm is already holding something");
            return Ok(ActionStatus::FailedToGrasp);
        }
        let status = self.body.grasp(&mut self.sim, target, arm)?;
        self.refresh_state()?;
        if !status.is_success() {
            return Ok(status);
        }
        self.reset_arm(arm, true)
    }

    /// Reset `arm` to its neutral pose, leveling a held container.
    ///
    /// The first reset of an arm holding a container derives the wrist angle
    /// from the container's rotation and caches the resulting joint angles;
    /// later resets replay the cache.  Leveling is attempted even when the
    /// plain neutral reset falls short; its outcome is the returned status.
    pub fn reset_arm(&mut self, arm: Arm, reset_torso: bool) -> Result<ActionStatus, TransportError> {
        if let Some(angles) = self.reset_poses.get(arm) {
            let commands = self.body.joint_angle_commands(arm, angles, reset_torso);
            let status = self.body.do_arm_motion(&mut self.sim, commands)?;
            self.refresh_state()?;
            return Ok(status);
        }

        let commands = self.body.reset_arm_commands(arm, reset_torso);
        let status = self.body.do_arm_motion(&mut self.sim, commands)?;
        self.refresh_state()?;
        let Some(container) = self.held_container_on(arm) else {
            return Ok(status);
        };
        if !status.is_success() {
            debug!(%arm, %status, "neutral reset incomplete; leveling anyway");
        }

        let correction = reset_pose::level_correction(self.state.rotation(container)?);
        self.leveling_solves += 1;
        debug!(%arm, %container, correction, "leveling container");
        let mut commands = self.body.reset_arm_commands(arm, reset_torso);
        override_target(
            &mut commands,
            Command::SetSphericalTarget {
                joint: ArmJoint::wrist(arm),
                target: Vector3::new(correction, 0.0, 0.0),
            },
        );
        let status = self.body.do_arm_motion(&mut self.sim, commands)?;
        self.refresh_state()?;
        if status.is_success() {
            let angles = self.body.joint_angles(&self.state, arm);
            self.reset_poses.insert(arm, angles);
        } else {
            warn!(%arm, %container, %status, "could not level container");
        }
        Ok(status)
    }

    /// Put the target object held by one arm into the container held by the
    /// other.
    ///
    /// The object is released either way; `not_in` means it landed
    /// elsewhere.
    pub fn put_in(&mut self) -> Result<ActionStatus, TransportError> {
        let Some((container_arm, container)) = self.held_container() else {
            debug!("put_in: no container held");
            return Ok(ActionStatus::NotHolding);
        };
        let object_arm = container_arm.opposite();
        let Some(object) = self
            .state
            .held(object_arm)
            .iter()
            .copied()
            .find(|id| self.registry.is_target_object(*id))
        else {
            debug!(%object_arm, "put_in: no target object held");
            return Ok(ActionStatus::NotHolding);
        };
        info!(%object, %container, "putting object in container");

        let torso = Some(self.config.container_torso_height);
        let offset = self.config.staging_offset;
        let side = match container_arm {
            Arm::Right => -1.0,
            Arm::Left => 1.0,
        };
        let staging = Vector3::new(offset.x * side, offset.y, offset.z);
        self.reach(container_arm, staging, TargetFrame::Relative, torso)?;

        let above = self.state.position(container)? + Vector3::UP * self.config.drop_clearance;
        self.reach(object_arm, above, TargetFrame::Absolute, torso)?;

        self.drop(object, object_arm, false)?;
        settle::wait_until_objects_stop(&mut self.sim, &[object], &self.config.settle)?;
        self.refresh_state()?;

        self.reset_arm(object_arm, false)?;
        self.reset_arm(container_arm, false)?;

        let contents = self.objects_in_container(container)?;
        if contents.contains(&object) {
            Ok(ActionStatus::Success)
        } else {
            info!(%object, %container, "object missed the container");
            Ok(ActionStatus::NotIn)
        }
    }

    /// Tip the held container over and empty it.
    pub fn pour_out(&mut self) -> Result<ActionStatus, TransportError> {
        let Some((arm, container)) = self.held_container() else {
            debug!("pour_out: no container held");
            return Ok(ActionStatus::NotHolding);
        };
        let before = self.objects_in_container(container)?;
        info!(%container, objects = before.len(), "pouring out container");

        let mut commands = self.body.orientation_commands(
            &self.state,
            arm,
            container,
            -Vector3::FORWARD,
            Some(self.config.container_torso_height),
        )?;
        override_target(
            &mut commands,
            Command::SetRevoluteTarget {
                joint: ArmJoint::elbow(arm),
                target: self.config.pour_elbow_angle,
            },
        );
        let wrist = commands
            .iter()
            .find_map(|c| match c {
                Command::SetSphericalTarget { joint, target } if *joint == ArmJoint::wrist(arm) => {
                    Some(*target)
                }
                _ => None,
            })
            .unwrap_or_default();
        override_target(
            &mut commands,
            Command::SetSphericalTarget {
                joint: ArmJoint::wrist(arm),
                target: Vector3::new(self.config.pour_wrist_angle, wrist.y, wrist.z),
            },
        );
        let status = self.body.do_arm_motion(&mut self.sim, commands)?;
        if !status.is_success() {
            debug!(%status, "pour motion incomplete");
        }
        settle::wait_until_objects_stop(&mut self.sim, &before, &self.config.settle)?;
        self.refresh_state()?;

        self.reset_arm(arm, false)?;
        let after = self.objects_in_container(container)?;
        if after.is_empty() {
            Ok(ActionStatus::Success)
        } else {
            debug!(%container, remaining = after.len(), "container not empty after pour");
            Ok(ActionStatus::StillIn)
        }
    }

    /// Release `target` from `arm`.  A successful drop forgets the arm's
    /// cached reset pose.
    pub fn drop(
        &mut self,
        target: ObjectId,
        arm: Arm,
        wait_for_objects: bool,
    ) -> Result<ActionStatus, TransportError> {
        let status = self
            .body
            .drop_object(&mut self.sim, target, arm, wait_for_objects)?;
        self.refresh_state()?;
        if status.is_success() && self.reset_poses.remove(arm) {
            debug!(%arm, "cleared cached reset pose");
        }
        Ok(status)
    }

    // ── locomotion ──────────────────────────────────────────────────────────

    pub fn move_to(&mut self, position: Vector3, arrived_at: f32) -> Result<ActionStatus, TransportError> {
        let status = self.body.move_to(&mut self.sim, position, arrived_at)?;
        self.refresh_state()?;
        Ok(status)
    }

    /// Drive up to `target` using the configured arrival distance.
    pub fn move_to_object(&mut self, target: ObjectId) -> Result<ActionStatus, TransportError> {
        let position = self.state.position(target)?;
        self.move_to(position, self.config.motion.arrived_at)
    }

    pub fn move_by(&mut self, distance: f32) -> Result<ActionStatus, TransportError> {
        let status = self.body.move_by(&mut self.sim, distance)?;
        self.refresh_state()?;
        Ok(status)
    }

    pub fn turn_by(&mut self, angle: f32) -> Result<ActionStatus, TransportError> {
        let status = self.body.turn_by(&mut self.sim, angle)?;
        self.refresh_state()?;
        Ok(status)
    }

    // ── queries ─────────────────────────────────────────────────────────────

    /// IDs of objects currently inside `container`.
    pub fn objects_in_container(
        &mut self,
        container: ObjectId,
    ) -> Result<Vec<ObjectId>, TransportError> {
        let query = ContainmentQuery::new(&self.state, &self.static_sizes, container)?;
        let frames = self.sim.communicate(&[query.command()])?;
        self.state = SceneState::from_frames(&frames)?;
        query.contained(&frames)
    }

    /// The first arm (left, then right) holding a container.
    pub fn held_container(&self) -> Option<(Arm, ObjectId)> {
        Arm::ALL
            .into_iter()
            .find_map(|arm| self.held_container_on(arm).map(|id| (arm, id)))
    }

    /// Closest container not already held.
    pub fn nearest_container(&self) -> Option<ObjectId> {
        self.nearest(self.registry.containers(), &[])
    }

    /// Closest target object that is neither held nor in `exclude`.
    pub fn nearest_target_object(&self, exclude: &[ObjectId]) -> Option<ObjectId> {
        self.nearest(self.registry.target_objects(), exclude)
    }

    /// Target objects whose position is over `region`.
    pub fn target_objects_in_region(&self, region: &FloorRegion) -> Vec<ObjectId> {
        self.registry
            .target_objects()
            .iter()
            .copied()
            .filter(|id| {
                self.state
                    .position(*id)
                    .is_ok_and(|p| region.contains(p))
            })
            .collect()
    }

    // ── internals ───────────────────────────────────────────────────────────

    fn refresh_state(&mut self) -> Result<(), TransportError> {
        self.state = SceneState::sample(&mut self.sim)?;
        Ok(())
    }

    fn held_container_on(&self, arm: Arm) -> Option<ObjectId> {
        self.state
            .held(arm)
            .iter()
            .copied()
            .find(|id| self.registry.is_container(*id))
    }

    fn nearest(&self, candidates: &[ObjectId], exclude: &[ObjectId]) -> Option<ObjectId> {
        let origin = self.state.magnebot_position;
        candidates
            .iter()
            .copied()
            .filter(|id| !exclude.contains(id) && self.state.holding_arm(*id).is_none())
            .filter_map(|id| {
                self.state
                    .position(id)
                    .ok()
                    .map(|p| (id, p.horizontal_distance(origin)))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(id, _)| id)
    }

    /// Move `arm` to `target`.  An unreachable target is logged and the
    /// motion skipped; the caller's final check decides the outcome.
    fn reach(
        &mut self,
        arm: Arm,
        target: Vector3,
        frame: TargetFrame,
        fixed_torso: Option<f32>,
    ) -> Result<ActionStatus, TransportError> {
        let Some(commands) = self
            .body
            .reach_commands(&self.state, arm, target, frame, fixed_torso)
        else {
            warn!(%arm, ?target, "no arm pose reaches target");
            return Ok(ActionStatus::CannotReach);
        };
        let status = self.body.do_arm_motion(&mut self.sim, commands)?;
        self.refresh_state()?;
        if !status.is_success() {
            debug!(%arm, %status, "reach incomplete");
        }
        Ok(status)
    }
}

/// Replace the joint target in `commands` addressing the same joint as
/// `replacement`, or append it.
fn override_target(commands: &mut Vec<Command>, replacement: Command) {
    let joint = match replacement {
        Command::SetRevoluteTarget { joint, .. }
        | Command::SetSphericalTarget { joint, .. }
        | Command::SetPrismaticTarget { joint, .. } => joint,
        _ => {
            commands.push(replacement);
            return;
        }
    };
    let slot = commands.iter_mut().find(|c| match c {
        Command::SetRevoluteTarget { joint: j, .. }
        | Command::SetSphericalTarget { joint: j, .. }
        | Command::SetPrismaticTarget { joint: j, .. } => *j == joint,
        _ => false,
    });
    match slot {
        Some(c) => *c = replacement,
        None => commands.push(replacement),
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use transport_hal::SimWorld;
    use transport_types::OutputFrame;

    use super::*;
    use crate::scene::tests::three_rooms;

    const BASKET: &str = "basket_18inx18inx12iin";

    fn sim() -> SimWorld {
        let catalog = Catalog::builtin().unwrap();
        catalog
            .containers
            .iter()
            .fold(SimWorld::new(), |sim, model| {
                sim.with_receptacle(model, Vector3::new(0.5, 0.5, 0.5))
            })
    }

    fn seeded(seed: u64) -> TransportConfig {
        TransportConfig {
            random_seed: Some(seed),
            ..TransportConfig::default()
        }
    }

    /// Robot at the origin facing +z; one basket ahead, three objects off to
    /// the east.
    fn scene<C: SimulatorClient>(
        sim: C,
        config: TransportConfig,
    ) -> (Transport<C>, ObjectId, Vec<ObjectId>) {
        let mut t = Transport::new(sim, config, Catalog::builtin().unwrap()).unwrap();
        let container = t.add_container(BASKET, Vector3::new(0.0, 0.0, 1.2), 0.0);
        let objects = [
            Vector3::new(4.0, 0.0, 0.5),
            Vector3::new(4.5, 0.0, 1.0),
            Vector3::new(5.0, 0.0, 0.5),
        ]
        .into_iter()
        .map(|p| t.add_target_object("jug05", p).unwrap())
        .collect();
        assert!(t.init_custom_scene(Vector3::ZERO).unwrap().is_success());
        (t, container, objects)
    }

    fn fetch_container<C: SimulatorClient>(t: &mut Transport<C>, container: ObjectId) -> ActionStatus {
        assert!(t.move_to_object(container).unwrap().is_success());
        t.pick_up(container, Arm::Right).unwrap()
    }

    fn fetch_object<C: SimulatorClient>(t: &mut Transport<C>, object: ObjectId) -> ActionStatus {
        assert!(t.move_to_object(object).unwrap().is_success());
        t.pick_up(object, Arm::Left).unwrap()
    }

    #[test]
    fn pick_up_is_idempotent() {
        let (mut t, _, objects) = scene(sim(), seeded(1));
        assert_eq!(fetch_object(&mut t, objects[0]), ActionStatus::Success);
        let trips = t.simulator().round_trips();
        assert_eq!(t.pick_up(objects[0], Arm::Left).unwrap(), ActionStatus::Success);
        assert_eq!(t.simulator().round_trips(), trips);
        assert_eq!(t.state().held(Arm::Left), &[objects[0]]);
    }

    #[test]
    fn pick_up_with_busy_arm_fails_to_grasp() {
        let (mut t, _, objects) = scene(sim(), seeded(1));
        fetch_object(&mut t, objects[0]);
        assert_eq!(
            t.pick_up(objects[1], Arm::Left).unwrap(),
            ActionStatus::FailedToGrasp
        );
    }

    #[test]
    fn pick_up_surfaces_grasp_failure() {
        let (mut t, _, objects) = scene(sim(), seeded(1));
        // Still at the origin, metres away from the object.
        assert_eq!(
            t.pick_up(objects[2], Arm::Left).unwrap(),
            ActionStatus::CannotReach
        );
        assert!(t.state().held(Arm::Left).is_empty());
    }

    #[test]
    fn container_pick_up_levels_and_caches() {
        let (mut t, container, _) = scene(sim(), seeded(1));
        assert_eq!(fetch_container(&mut t, container), ActionStatus::Success);
        assert_eq!(t.leveling_solves(), 1);
        let pose = t.reset_pose(Arm::Right).unwrap();
        assert!((pose[3] + 25.0).abs() < 1e-3);
        let rotation = t.state().rotation(container).unwrap();
        assert!(rotation.pitch().abs() < 1e-2);
    }

    #[test]
    fn cached_reset_skips_leveling_solve() {
        let (mut t, container, _) = scene(sim(), seeded(1));
        fetch_container(&mut t, container);
        assert_eq!(t.reset_arm(Arm::Right, true).unwrap(), ActionStatus::Success);
        assert_eq!(t.reset_arm(Arm::Right, false).unwrap(), ActionStatus::Success);
        assert_eq!(t.leveling_solves(), 1);
    }

    #[test]
    fn drop_clears_reset_pose() {
        let (mut t, container, _) = scene(sim(), seeded(1));
        fetch_container(&mut t, container);
        assert!(t.reset_pose(Arm::Right).is_some());
        assert_eq!(
            t.drop(container, Arm::Right, true).unwrap(),
            ActionStatus::Success
        );
        assert!(t.reset_pose(Arm::Right).is_none());
        assert!(t.state().held(Arm::Right).is_empty());
    }

    #[test]
    fn leveling_beyond_wrist_limit_fails_to_bend() {
        let (mut t, container, _) = scene(sim().with_wrist_limit(20.0), seeded(1));
        assert_eq!(fetch_container(&mut t, container), ActionStatus::FailedToBend);
        assert!(t.reset_pose(Arm::Right).is_none());
        // Not transactional: the container stays held.
        assert_eq!(t.state().held(Arm::Right), &[container]);
    }

    #[test]
    fn not_holding_needs_no_simulator_traffic() {
        let (mut t, container, _) = scene(sim(), seeded(1));
        let trips = t.simulator().round_trips();
        assert_eq!(t.put_in().unwrap(), ActionStatus::NotHolding);
        assert_eq!(t.pour_out().unwrap(), ActionStatus::NotHolding);
        assert_eq!(t.simulator().round_trips(), trips);

        // A container alone is not enough for put_in.
        fetch_container(&mut t, container);
        let trips = t.simulator().round_trips();
        assert_eq!(t.put_in().unwrap(), ActionStatus::NotHolding);
        assert_eq!(t.simulator().round_trips(), trips);
    }

    #[test]
    fn put_in_lands_object_in_container() {
        let (mut t, container, objects) = scene(sim(), seeded(1));
        fetch_container(&mut t, container);
        fetch_object(&mut t, objects[0]);
        assert_eq!(t.put_in().unwrap(), ActionStatus::Success);
        assert!(t.state().held(Arm::Left).is_empty());
        assert_eq!(t.state().held(Arm::Right), &[container]);
        assert!(t.objects_in_container(container).unwrap().contains(&objects[0]));
    }

    #[test]
    fn put_in_reports_not_in_and_still_drops() {
        // Without receptacle behaviour the object falls through to the floor.
        let (mut t, container, objects) = scene(SimWorld::new(), seeded(1));
        fetch_container(&mut t, container);
        fetch_object(&mut t, objects[0]);
        assert_eq!(t.put_in().unwrap(), ActionStatus::NotIn);
        assert!(t.state().held(Arm::Left).is_empty());
        assert!(!t.objects_in_container(container).unwrap().contains(&objects[0]));
    }

    #[test]
    fn pour_out_empties_container() {
        let (mut t, container, objects) = scene(sim(), seeded(1));
        fetch_container(&mut t, container);
        fetch_object(&mut t, objects[0]);
        assert_eq!(t.put_in().unwrap(), ActionStatus::Success);
        assert_eq!(t.pour_out().unwrap(), ActionStatus::Success);
        let after = t.objects_in_container(container).unwrap();
        assert!(!after.contains(&objects[0]));
        assert!(t.state().position(objects[0]).unwrap().y.abs() < 1e-4);
    }

    #[test]
    fn shallow_pour_leaves_objects_still_in() {
        let config = TransportConfig {
            pour_wrist_angle: 0.0,
            ..seeded(1)
        };
        let (mut t, container, objects) = scene(sim(), config);
        fetch_container(&mut t, container);
        fetch_object(&mut t, objects[0]);
        t.put_in().unwrap();
        assert_eq!(t.pour_out().unwrap(), ActionStatus::StillIn);
    }

    /// Answers overlap queries truthfully until `clean_queries` runs out,
    /// then reports `stray` as inside as well.
    struct StrayInside {
        world: SimWorld,
        stray: ObjectId,
        clean_queries: Rc<Cell<Option<usize>>>,
    }

    impl SimulatorClient for StrayInside {
        fn communicate(&mut self, commands: &[Command]) -> Result<Vec<OutputFrame>, TransportError> {
            let mut frames = self.world.communicate(commands)?;
            let queried = commands
                .iter()
                .any(|c| matches!(c, Command::SendOverlapBox { .. }));
            if let (true, Some(clean)) = (queried, self.clean_queries.get()) {
                if clean == 0 {
                    for frame in &mut frames {
                        if let OutputFrame::Overlap { object_ids } = frame {
                            object_ids.push(self.stray);
                        }
                    }
                } else {
                    self.clean_queries.set(Some(clean - 1));
                }
            }
            Ok(frames)
        }
    }

    /// Silently discards the first neutral-pose batch for the right arm once
    /// armed, so that reset never reaches its targets.
    struct LoseNeutralReset {
        world: SimWorld,
        armed: bool,
    }

    impl SimulatorClient for LoseNeutralReset {
        fn communicate(&mut self, commands: &[Command]) -> Result<Vec<OutputFrame>, TransportError> {
            let neutral = commands.iter().any(|c| {
                matches!(c, Command::SetRevoluteTarget { joint, target }
                    if *joint == ArmJoint::elbow(Arm::Right) && *target == 90.0)
            }) && commands.iter().any(|c| {
                matches!(c, Command::SetSphericalTarget { joint, target }
                    if *joint == ArmJoint::wrist(Arm::Right) && *target == Vector3::ZERO)
            });
            if self.armed && neutral {
                self.armed = false;
                return self.world.communicate(&[]);
            }
            self.world.communicate(commands)
        }
    }

    #[test]
    fn leveling_runs_after_a_failed_neutral_reset() {
        let client = LoseNeutralReset {
            world: sim(),
            armed: false,
        };
        let (mut t, container, _) = scene(client, seeded(1));
        assert!(t.move_to_object(container).unwrap().is_success());
        t.sim.armed = true;

        assert_eq!(t.pick_up(container, Arm::Right).unwrap(), ActionStatus::Success);
        assert!(!t.simulator().armed, "neutral reset was issued");
        assert_eq!(t.leveling_solves(), 1);
        let pose = t.reset_pose(Arm::Right).unwrap();
        assert!((pose[3] + 25.0).abs() < 1e-3);
    }

    #[test]
    fn pour_out_requires_an_empty_container() {
        let clean_queries = Rc::new(Cell::new(None));
        let client = StrayInside {
            world: sim(),
            stray: ObjectId(3),
            clean_queries: clean_queries.clone(),
        };
        let (mut t, container, objects) = scene(client, seeded(1));
        assert_eq!(objects[1], ObjectId(3));
        fetch_container(&mut t, container);
        fetch_object(&mut t, objects[0]);
        assert_eq!(t.put_in().unwrap(), ActionStatus::Success);

        // The snapshot before pouring is clean; the one after holds a
        // newcomer that was never in the snapshot.
        clean_queries.set(Some(1));
        assert_eq!(t.pour_out().unwrap(), ActionStatus::StillIn);
        let after = t.objects_in_container(container).unwrap();
        assert_eq!(after, vec![objects[1]]);
    }

    #[test]
    fn nearest_helpers_skip_held_and_excluded() {
        let (mut t, container, objects) = scene(sim(), seeded(1));
        assert_eq!(t.nearest_container(), Some(container));
        assert_eq!(t.nearest_target_object(&[]), Some(objects[0]));
        assert_eq!(t.nearest_target_object(&[objects[0]]), Some(objects[1]));
        fetch_container(&mut t, container);
        assert_eq!(t.nearest_container(), None);
    }

    #[test]
    fn seeded_init_scene_is_reproducible() {
        let layout = three_rooms();
        let run = |seed| {
            let mut t = Transport::new(sim(), seeded(seed), Catalog::builtin().unwrap()).unwrap();
            t.init_scene(&layout, Vector3::ZERO).unwrap();
            (
                t.containers().to_vec(),
                t.target_objects().to_vec(),
                t.simulator().command_log().to_vec(),
            )
        };
        assert_eq!(run(7), run(7));
        let (_, targets, _) = run(7);
        assert!((8..=11).contains(&targets.len()));
    }

    #[test]
    fn target_objects_get_mass_and_material() {
        let (t, _, objects) = scene(sim(), seeded(3));
        let sim = t.simulator();
        assert_eq!(sim.object_mass(objects[0]), Some(0.25));
        let material = sim.object_material(objects[0]).unwrap();
        assert!(Catalog::builtin().unwrap().materials.iter().any(|m| m == material));
        assert!(t.static_size(objects[0]).is_some());
    }

    #[test]
    fn unknown_model_is_a_config_error() {
        let mut t = Transport::new(sim(), seeded(1), Catalog::builtin().unwrap()).unwrap();
        assert!(matches!(
            t.add_target_object("no_such_model", Vector3::ZERO),
            Err(TransportError::Config(_))
        ));
    }

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let config = TransportConfig {
            max_spawn_yaw: f32::NAN,
            ..seeded(3)
        };
        let err = Transport::new(sim(), config, Catalog::builtin().unwrap())
            .err()
            .expect("config rejected");
        assert!(matches!(err, TransportError::Config(_)));
    }

    #[test]
    fn override_target_replaces_matching_joint() {
        let mut commands = vec![
            Command::SetRevoluteTarget {
                joint: ArmJoint::ElbowRight,
                target: 90.0,
            },
            Command::SetSphericalTarget {
                joint: ArmJoint::WristRight,
                target: Vector3::ZERO,
            },
        ];
        override_target(
            &mut commands,
            Command::SetRevoluteTarget {
                joint: ArmJoint::ElbowRight,
                target: 145.0,
            },
        );
        assert_eq!(commands.len(), 2);
        assert_eq!(
            commands[0],
            Command::SetRevoluteTarget {
                joint: ArmJoint::ElbowRight,
                target: 145.0
            }
        );
    }

    /// Container fetched, three objects carried over one by one, poured out in
    /// the goal room.
    #[test]
    fn three_object_delivery_end_to_end() {
        let (mut t, container, objects) = scene(sim(), seeded(9420));
        let goal = FloorRegion::new(-6.0, -2.0, -2.0, 2.0);

        assert_eq!(fetch_container(&mut t, container), ActionStatus::Success);
        for object in &objects {
            assert_eq!(fetch_object(&mut t, *object), ActionStatus::Success);
            assert_eq!(t.put_in().unwrap(), ActionStatus::Success, "object {object}");
        }
        let inside = t.objects_in_container(container).unwrap();
        assert!(objects.iter().all(|o| inside.contains(o)));

        assert!(t.move_to(goal.center(), 0.1).unwrap().is_success());
        assert_eq!(t.pour_out().unwrap(), ActionStatus::Success);

        assert_eq!(t.state().held(Arm::Right), &[container]);
        assert!(t.state().held(Arm::Left).is_empty());
        let delivered = t.target_objects_in_region(&goal);
        assert_eq!(delivered.len(), objects.len());
    }
}
