//! [`Catalog`] – model names, scales and the material pool.
//!
//! Loaded once and handed to the orchestrator.  The built-in catalog is
//! compiled in from `data/catalog.toml`; [`Catalog::load`] reads a
//! replacement from disk.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use transport_types::TransportError;

const BUILTIN: &str = include_str!("../../../data/catalog.toml");

/// A named part of a model whose visual materials can be replaced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubObject {
    pub name: String,
    /// Number of material slots on this part.
    pub materials: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetObjectModel {
    pub name: String,
    /// Uniform scale factor applied on spawn.
    pub scale: f32,
    pub substructure: Vec<SubObject>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub materials: Vec<String>,
    pub containers: Vec<String>,
    pub target_objects: Vec<TargetObjectModel>,
}

impl Catalog {
    /// The catalog shipped with the crate.
    pub fn builtin() -> Result<Self, TransportError> {
        Self::from_toml_str(BUILTIN)
    }

    pub fn load(path: &Path) -> Result<Self, TransportError> {
        let raw = fs::read_to_string(path).map_err(|e| {
            TransportError::Config(format!("Failed to read catalog at {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, TransportError> {
        let catalog: Self = toml::from_str(raw)
            .map_err(|e| TransportError::Config(format!("Failed to parse catalog: {e}")))?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Every pool must be non-empty for scene population to draw from it.
    pub fn validate(&self) -> Result<(), TransportError> {
        if self.materials.is_empty() {
            return Err(TransportError::Config("catalog has no materials".into()));
        }
        if self.containers.is_empty() {
            return Err(TransportError::Config("catalog has no container models".into()));
        }
        if self.target_objects.is_empty() {
            return Err(TransportError::Config(
                "catalog has no target object models".into(),
            ));
        }
        Ok(())
    }

    pub fn target_object(&self, name: &str) -> Option<&TargetObjectModel> {
        self.target_objects.iter().find(|m| m.name == name)
    }
}
