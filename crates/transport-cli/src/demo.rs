//! Naive transport controller.
//!
//! Fetches the nearest container, fills it with the nearest target objects,
//! drives to the goal and pours everything out.  Every step is a composite
//! action of [`Transport`]; the controller only sequences them and keeps a
//! log of what happened.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{info, warn};
use transport_challenge::{Catalog, FloorRegion, Transport};
use transport_hal::{SimWorld, SimulatorClient};
use transport_types::{ActionStatus, Arm, ObjectId, TransportError, Vector3};

/// Distance backed up before retrying a failed container pick-up.
const BACK_UP_DISTANCE: f32 = -0.5;
/// Turn applied after backing up, degrees.
const RETRY_TURN: f32 = 15.0;
/// How close the robot needs to get to the goal centre.
const GOAL_ARRIVED_AT: f32 = 0.1;

// ─────────────────────────────────────────────────────────────────────────────
// Fixed demo scene
// ─────────────────────────────────────────────────────────────────────────────

pub const DEMO_CONTAINER_MODEL: &str = "basket_18inx18inx12iin";
pub const DEMO_TARGET_MODEL: &str = "jug05";

/// One basket ahead of the robot, three jugs to the east and a goal area to
/// the west.
#[derive(Debug, Clone)]
pub struct DemoScene {
    pub magnebot_position: Vector3,
    pub container: Vector3,
    pub target_objects: Vec<Vector3>,
    pub goal: FloorRegion,
}

impl Default for DemoScene {
    fn default() -> Self {
        Self {
            magnebot_position: Vector3::ZERO,
            container: Vector3::new(0.0, 0.0, 1.2),
            target_objects: vec![
                Vector3::new(4.0, 0.0, 0.5),
                Vector3::new(4.5, 0.0, 1.0),
                Vector3::new(5.0, 0.0, 0.5),
            ],
            goal: FloorRegion::new(-6.0, -2.0, -2.0, 2.0),
        }
    }
}

impl DemoScene {
    /// Register and spawn the scene.
    pub fn spawn<C: SimulatorClient>(
        &self,
        transport: &mut Transport<C>,
    ) -> Result<ActionStatus, TransportError> {
        transport.clear_scene();
        transport.add_container(DEMO_CONTAINER_MODEL, self.container, 0.0);
        for p in &self.target_objects {
            transport.add_target_object(DEMO_TARGET_MODEL, *p)?;
        }
        transport.init_custom_scene(self.magnebot_position)
    }
}

/// In-process world whose catalog containers behave as receptacles.
pub fn headless_world(catalog: &Catalog) -> SimWorld {
    catalog
        .containers
        .iter()
        .fold(SimWorld::new(), |sim, model| {
            sim.with_receptacle(model, Vector3::new(0.5, 0.5, 0.5))
        })
}

// ─────────────────────────────────────────────────────────────────────────────
// Report
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct DemoReport {
    /// `(action, status)` in the order they were performed.
    pub steps: Vec<(String, ActionStatus)>,
    pub container: Option<ObjectId>,
    pub loaded: Vec<ObjectId>,
    pub delivered: Vec<ObjectId>,
    pub interrupted: bool,
}

impl DemoReport {
    pub fn failures(&self) -> usize {
        self.steps.iter().filter(|(_, s)| !s.is_success()).count()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Controller
// ─────────────────────────────────────────────────────────────────────────────

pub struct DemoController<'a, C: SimulatorClient> {
    transport: &'a mut Transport<C>,
    shutdown: Arc<AtomicBool>,
    max_container_attempts: u32,
    report: DemoReport,
}

impl<'a, C: SimulatorClient> DemoController<'a, C> {
    pub fn new(
        transport: &'a mut Transport<C>,
        shutdown: Arc<AtomicBool>,
        max_container_attempts: u32,
    ) -> Self {
        Self {
            transport,
            shutdown,
            max_container_attempts: max_container_attempts.max(1),
            report: DemoReport::default(),
        }
    }

    fn stopping(&mut self) -> bool {
        if self.shutdown.load(Ordering::SeqCst) {
            self.report.interrupted = true;
        }
        self.report.interrupted
    }

    fn record(&mut self, action: String, status: ActionStatus) -> ActionStatus {
        if status.is_success() {
            info!(%action, %status, "step");
        } else {
            warn!(%action, %status, "step failed");
        }
        self.report.steps.push((action, status));
        status
    }

    /// Pick up the nearest container with the right arm.  A failed grasp
    /// backs up, turns a little and tries the then-nearest container again.
    pub fn fetch_container(&mut self) -> Result<ActionStatus, TransportError> {
        let mut status = ActionStatus::NotFound;
        for attempt in 1..=self.max_container_attempts {
            if self.stopping() {
                break;
            }
            let Some(container) = self.transport.nearest_container() else {
                return Ok(self.record("find container".into(), ActionStatus::NotFound));
            };
            let moved = self.transport.move_to_object(container)?;
            self.record(format!("move to container {container}"), moved);
            status = self.transport.pick_up(container, Arm::Right)?;
            self.record(format!("pick up container {container}"), status);
            if status.is_success() {
                self.report.container = Some(container);
                return Ok(status);
            }
            warn!(attempt, %container, "container pick-up failed; backing up");
            self.transport.move_by(BACK_UP_DISTANCE)?;
            self.transport.turn_by(RETRY_TURN)?;
        }
        Ok(status)
    }

    /// Load up to `count` target objects into the held container.  Objects
    /// that cannot be picked up or put in are skipped.
    pub fn collect(&mut self, count: usize) -> Result<(), TransportError> {
        let Some((container_arm, _)) = self.transport.held_container() else {
            self.record("collect".into(), ActionStatus::NotHolding);
            return Ok(());
        };
        let arm = container_arm.opposite();
        let mut exclude: Vec<ObjectId> = Vec::new();
        while self.report.loaded.len() < count && !self.stopping() {
            let Some(object) = self.transport.nearest_target_object(&exclude) else {
                break;
            };
            exclude.push(object);
            let moved = self.transport.move_to_object(object)?;
            self.record(format!("move to object {object}"), moved);
            let status = self.transport.pick_up(object, arm)?;
            if !self.record(format!("pick up object {object}"), status).is_success() {
                continue;
            }
            let status = self.transport.put_in()?;
            if self.record(format!("put in object {object}"), status).is_success() {
                self.report.loaded.push(object);
            }
        }
        Ok(())
    }

    /// Drive to the goal and pour the container out.
    pub fn deliver(&mut self, goal: &FloorRegion) -> Result<ActionStatus, TransportError> {
        if self.stopping() {
            return Ok(ActionStatus::Success);
        }
        let moved = self.transport.move_to(goal.center(), GOAL_ARRIVED_AT)?;
        self.record("move to goal".into(), moved);
        let status = self.transport.pour_out()?;
        Ok(self.record("pour out".into(), status))
    }

    pub fn run(mut self, goal: &FloorRegion, count: usize) -> Result<DemoReport, TransportError> {
        if self.fetch_container()?.is_success() {
            self.collect(count)?;
            if !self.report.loaded.is_empty() {
                self.deliver(goal)?;
            }
        }
        self.report.delivered = self.transport.target_objects_in_region(goal);
        Ok(self.report)
    }
}
