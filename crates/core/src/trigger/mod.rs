//! Downstream job trigger.
//!
//! This module provides a `ComputeClient` trait for backends that can start
//! a job, an Azure Container Instances implementation, and the
//! `TriggerDispatcher` that only accepts a [`Readiness`](crate::gate::Readiness)
//! proof from an open gate.

mod container_instance;
mod dispatcher;
mod types;

pub use container_instance::ContainerInstanceClient;
pub use dispatcher::TriggerDispatcher;
pub use types::*;
