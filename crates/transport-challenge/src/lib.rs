//! `transport-challenge` – composite actions for the Transport Challenge.
//!
//! A robot picks small target objects up, puts them into a container it
//! carries, and pours them out at a goal.  This crate owns the task layer on
//! top of [`transport_hal`]: scene population, the entity registry, and the
//! [`Transport`] orchestrator with its `pick_up` / `put_in` / `pour_out`
//! actions.
//!
//! # Modules
//!
//! - [`config`] – [`TransportConfig`], every tunable of the orchestrator.
//! - [`catalog`] – [`Catalog`] of model names, scales and materials.
//! - [`registry`] – [`EntityRegistry`]: container vs target object IDs.
//! - [`scene`] – [`SceneLayout`], [`FloorRegion`] and the population policy.
//! - [`reset_pose`] – container-leveling wrist angle and its per-arm cache.
//! - [`containment`] – overlap query for "what is inside this container".
//! - [`transport`] – the [`Transport`] orchestrator.

pub mod catalog;
pub mod config;
pub mod containment;
pub mod registry;
pub mod reset_pose;
pub mod scene;
pub mod transport;

pub use catalog::{Catalog, TargetObjectModel};
pub use config::TransportConfig;
pub use registry::EntityRegistry;
pub use scene::{FloorRegion, SceneLayout};
pub use transport::Transport;
