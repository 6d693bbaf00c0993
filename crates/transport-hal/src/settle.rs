//! Blocking wait until a set of objects stops moving.
//!
//! Steps the simulator with empty batches and compares each object's
//! position against the previous step.  Objects missing from a step's
//! transforms are ignored.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use transport_types::{ObjectId, TransportError, Vector3};

use crate::client::SimulatorClient;
use crate::scene_state::SceneState;

/// Convergence settings for [`wait_until_objects_stop`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettleConfig {
    /// Largest per-step displacement (metres) still counted as "stopped".
    pub tolerance: f32,
    /// Steps to wait before giving up.
    pub max_steps: u32,
}

impl Default for SettleConfig {
    fn default() -> Self {
        Self {
            tolerance: 0.001,
            max_steps: 200,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleOutcome {
    Settled { steps: u32 },
    TimedOut { steps: u32 },
}

impl SettleOutcome {
    pub fn is_settled(self) -> bool {
        matches!(self, SettleOutcome::Settled { .. })
    }
}

fn positions(state: &SceneState, ids: &[ObjectId]) -> HashMap<ObjectId, Vector3> {
    ids.iter()
        .filter_map(|id| state.position(*id).ok().map(|p| (*id, p)))
        .collect()
}

/// Step until no object in `ids` moves more than `config.tolerance` between
/// consecutive steps, or `config.max_steps` elapse.
///
/// An empty `ids` slice returns immediately without a round trip.
pub fn wait_until_objects_stop(
    sim: &mut dyn SimulatorClient,
    ids: &[ObjectId],
    config: &SettleConfig,
) -> Result<SettleOutcome, TransportError> {
    if ids.is_empty() {
        return Ok(SettleOutcome::Settled { steps: 0 });
    }

    let mut previous = positions(&SceneState::sample(sim)?, ids);
    for step in 1..=config.max_steps {
        let current = positions(&SceneState::sample(sim)?, ids);
        let max_delta = current
            .iter()
            .filter_map(|(id, p)| previous.get(id).map(|q| p.distance(*q)))
            .fold(0.0_f32, f32::max);
        if max_delta <= config.tolerance {
            debug!(steps = step, "objects settled");
            return Ok(SettleOutcome::Settled { steps: step });
        }
        previous = current;
    }

    warn!(
        max_steps = config.max_steps,
        objects = ids.len(),
        "objects still moving; continuing anyway"
    );
    Ok(SettleOutcome::TimedOut {
        steps: config.max_steps,
    })
}

#[cfg(test)]
mod tests {
    use transport_types::{Command, MagnebotFrame, ObjectTransform, OutputFrame, Quaternion};

    use super::*;

    /// Reports one object that falls `speed` per step until it reaches the
    /// floor.
    struct Falling {
        y: f32,
        speed: f32,
        steps: u32,
    }

    impl SimulatorClient for Falling {
        fn communicate(&mut self, _: &[Command]) -> Result<Vec<OutputFrame>, TransportError> {
            self.steps += 1;
            self.y = (self.y - self.speed).max(0.0);
            Ok(vec![
                OutputFrame::Transforms {
                    objects: vec![ObjectTransform {
                        id: ObjectId(1),
                        position: Vector3::new(0.0, self.y, 0.0),
                        rotation: Quaternion::IDENTITY,
                    }],
                },
                OutputFrame::Magnebot(MagnebotFrame {
                    position: Vector3::ZERO,
                    rotation: Quaternion::IDENTITY,
                    held_left: vec![],
                    held_right: vec![],
                    joints: vec![],
                    arm_moving: false,
                }),
            ])
        }
    }

    #[test]
    fn settles_once_object_lands() {
        let mut sim = Falling {
            y: 0.5,
            speed: 0.1,
            steps: 0,
        };
        let outcome =
            wait_until_objects_stop(&mut sim, &[ObjectId(1)], &SettleConfig::default()).unwrap();
        assert!(outcome.is_settled());
        assert_eq!(sim.y, 0.0);
    }

    #[test]
    fn times_out_when_object_keeps_moving() {
        let mut sim = Falling {
            y: 100.0,
            speed: 0.1,
            steps: 0,
        };
        let config = SettleConfig {
            tolerance: 0.001,
            max_steps: 5,
        };
        let outcome = wait_until_objects_stop(&mut sim, &[ObjectId(1)], &config).unwrap();
        assert_eq!(outcome, SettleOutcome::TimedOut { steps: 5 });
        assert_eq!(sim.steps, 6);
    }

    #[test]
    fn empty_set_needs_no_round_trip() {
        let mut sim = Falling {
            y: 0.0,
            speed: 0.0,
            steps: 0,
        };
        let outcome = wait_until_objects_stop(&mut sim, &[], &SettleConfig::default()).unwrap();
        assert!(outcome.is_settled());
        assert_eq!(sim.steps, 0);
    }
}
