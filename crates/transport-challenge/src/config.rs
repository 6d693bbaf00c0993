//! Orchestrator configuration.
//!
//! Every field carries a serde default, so a TOML table may name only the
//! values it changes:
//!
//! ```toml
//! random_seed = 9420
//! drop_clearance = 0.35
//!
//! [settle]
//! max_steps = 400
//! ```

use serde::{Deserialize, Serialize};
use transport_hal::{MotionConfig, SettleConfig};
use transport_types::{TransportError, Vector3};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Seed of the scene-population RNG.  `None` draws a fresh seed, which
    /// is logged so the run can be reproduced.
    #[serde(default)]
    pub random_seed: Option<u64>,

    /// Torso height (metres) held while manipulating a container.
    #[serde(default = "default_container_torso_height")]
    pub container_torso_height: f32,

    /// Height above the container at which an object is released.
    #[serde(default = "default_drop_clearance")]
    pub drop_clearance: f32,

    /// Body-frame point the container is brought to before an object is
    /// dropped in.  `x` is mirrored towards the body centre for the right
    /// arm.
    #[serde(default = "default_staging_offset")]
    pub staging_offset: Vector3,

    /// Elbow target (degrees) while pouring.
    #[serde(default = "default_pour_elbow_angle")]
    pub pour_elbow_angle: f32,

    /// Wrist pitch target (degrees) while pouring.
    #[serde(default = "default_pour_wrist_angle")]
    pub pour_wrist_angle: f32,

    #[serde(default = "default_target_object_mass")]
    pub target_object_mass: f32,

    #[serde(default = "default_container_mass")]
    pub container_mass: f32,

    #[serde(default = "default_container_scale")]
    pub container_scale: Vector3,

    /// Inclusive bounds on the number of target objects spawned.
    #[serde(default = "default_min_target_objects")]
    pub min_target_objects: usize,
    #[serde(default = "default_max_target_objects")]
    pub max_target_objects: usize,

    /// Chance that a non-target room gets a container.
    #[serde(default = "default_container_probability")]
    pub container_probability: f64,

    /// Spawn yaw is drawn from `[-max_spawn_yaw, max_spawn_yaw]` degrees.
    #[serde(default = "default_max_spawn_yaw")]
    pub max_spawn_yaw: f32,

    #[serde(default)]
    pub motion: MotionConfig,

    #[serde(default)]
    pub settle: SettleConfig,
}

fn default_container_torso_height() -> f32 {
    1.2
}
fn default_drop_clearance() -> f32 {
    0.3
}
fn default_staging_offset() -> Vector3 {
    Vector3::new(0.1, 0.4, 0.5)
}
fn default_pour_elbow_angle() -> f32 {
    145.0
}
fn default_pour_wrist_angle() -> f32 {
    90.0
}
fn default_target_object_mass() -> f32 {
    0.25
}
fn default_container_mass() -> f32 {
    1.0
}
fn default_container_scale() -> Vector3 {
    Vector3::new(0.6, 0.4, 0.6)
}
fn default_min_target_objects() -> usize {
    8
}
fn default_max_target_objects() -> usize {
    11
}
fn default_container_probability() -> f64 {
    0.75
}
fn default_max_spawn_yaw() -> f32 {
    179.0
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            random_seed: None,
            container_torso_height: default_container_torso_height(),
            drop_clearance: default_drop_clearance(),
            staging_offset: default_staging_offset(),
            pour_elbow_angle: default_pour_elbow_angle(),
            pour_wrist_angle: default_pour_wrist_angle(),
            target_object_mass: default_target_object_mass(),
            container_mass: default_container_mass(),
            container_scale: default_container_scale(),
            min_target_objects: default_min_target_objects(),
            max_target_objects: default_max_target_objects(),
            container_probability: default_container_probability(),
            max_spawn_yaw: default_max_spawn_yaw(),
            motion: MotionConfig::default(),
            settle: SettleConfig::default(),
        }
    }
}

impl TransportConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, TransportError> {
        let cfg: Self = toml::from_str(raw)
            .map_err(|e| TransportError::Config(format!("Failed to parse config: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), TransportError> {
        if self.min_target_objects > self.max_target_objects {
            return Err(TransportError::Config(format!(
                "min_target_objects ({}) exceeds max_target_objects ({})",
                self.min_target_objects, self.max_target_objects
            )));
        }
        if !(0.0..=1.0).contains(&self.container_probability) {
            return Err(TransportError::Config(format!(
                "container_probability must be within [0, 1], got {}",
                self.container_probability
            )));
        }
        if self.settle.max_steps == 0 {
            return Err(TransportError::Config("settle.max_steps must be positive".into()));
        }
        let scalars = [
            ("container_torso_height", self.container_torso_height),
            ("drop_clearance", self.drop_clearance),
            ("pour_elbow_angle", self.pour_elbow_angle),
            ("pour_wrist_angle", self.pour_wrist_angle),
            ("target_object_mass", self.target_object_mass),
            ("container_mass", self.container_mass),
            ("max_spawn_yaw", self.max_spawn_yaw),
        ];
        if let Some((name, v)) = scalars.iter().find(|(_, v)| !v.is_finite()) {
            return Err(TransportError::Config(format!("{name} must be finite, got {v}")));
        }
        let vectors = [
            ("staging_offset", self.staging_offset),
            ("container_scale", self.container_scale),
        ];
        if let Some((name, v)) = vectors
            .iter()
            .find(|(_, v)| !(v.x.is_finite() && v.y.is_finite() && v.z.is_finite()))
        {
            return Err(TransportError::Config(format!("{name} must be finite, got {v:?}")));
        }
        if self.target_object_mass <= 0.0 || self.container_mass <= 0.0 {
            return Err(TransportError::Config("object masses must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let cfg = TransportConfig::from_toml_str("").unwrap();
        assert_eq!(cfg, TransportConfig::default());
        assert_eq!(cfg.container_torso_height, 1.2);
        assert_eq!(cfg.pour_elbow_angle, 145.0);
    }

    #[test]
    fn partial_toml_overrides_named_fields_only() {
        let cfg = TransportConfig::from_toml_str(
            "random_seed = 9420\n[settle]\nmax_steps = 400\n",
        )
        .unwrap();
        assert_eq!(cfg.random_seed, Some(9420));
        assert_eq!(cfg.settle.max_steps, 400);
        assert_eq!(cfg.settle.tolerance, SettleConfig::default().tolerance);
        assert_eq!(cfg.drop_clearance, 0.3);
    }

    #[test]
    fn inverted_object_count_is_rejected() {
        let err = TransportConfig::from_toml_str("min_target_objects = 12\n").unwrap_err();
        assert!(matches!(err, TransportError::Config(_)));
    }

    #[test]
    fn non_finite_values_are_rejected() {
        for raw in [
            "max_spawn_yaw = nan\n",
            "max_spawn_yaw = inf\n",
            "container_mass = nan\n",
            "pour_wrist_angle = -inf\n",
            "staging_offset = { x = nan, y = 0.4, z = 0.5 }\n",
        ] {
            let err = TransportConfig::from_toml_str(raw).unwrap_err();
            assert!(matches!(err, TransportError::Config(_)), "{raw}");
        }
    }

    #[test]
    fn zero_mass_is_rejected() {
        assert!(TransportConfig::from_toml_str("target_object_mass = 0.0\n").is_err());
    }

    #[test]
    fn nested_vector_parses_from_inline_table() {
        let cfg = TransportConfig::from_toml_str(
            "staging_offset = { x = 0.2, y = 0.5, z = 0.4 }\n",
        )
        .unwrap();
        assert_eq!(cfg.staging_offset, Vector3::new(0.2, 0.5, 0.4));
    }
}
