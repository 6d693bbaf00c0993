//! `transport-hal` – Robot body and simulator link for the Transport Challenge.
//!
//! This crate owns everything below the composite actions: the step-driven
//! simulator connection, decoding of per-step state, the arm kinematics used
//! to plan reaches, and the primitive body actions (grasp, drop, move, turn)
//! the orchestrator composes.
//!
//! # Modules
//!
//! - [`client`] – [`SimulatorClient`] trait: one ordered command batch in,
//!   one step of output frames out.
//! - [`ws_client`] – [`WsSimulatorClient`], the WebSocket transport to an
//!   external simulator process.
//! - [`sim`] – [`SimWorld`], an in-process simulator double for headless
//!   runs and CI.
//! - [`scene_state`] – [`SceneState`], the decoded snapshot of one step.
//! - [`kinematics`] – two-link arm model: forward and inverse solutions.
//! - [`body`] – [`RobotBody`] trait and its [`MagnebotBody`] implementation.
//! - [`settle`] – blocking wait until a set of objects stops moving.

pub mod body;
pub mod client;
pub mod kinematics;
pub mod scene_state;
pub mod settle;
pub mod sim;
pub mod ws_client;

pub use body::{MagnebotBody, MotionConfig, RobotBody, TargetFrame};
pub use client::SimulatorClient;
pub use scene_state::SceneState;
pub use settle::{SettleConfig, SettleOutcome};
pub use sim::SimWorld;
pub use ws_client::WsSimulatorClient;
