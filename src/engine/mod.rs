// src/engine/mod.rs

//! The engine thread and everything that crosses into it.
//!
//! - [`queue`] is the FIFO of tasks; the only way to reach consumer state.
//! - [`runtime`] owns the consumer thread and its drain/idle loop.
//! - [`gate`] is the one-shot "first reload finished" signal.
//! - [`host`] is the consumer state for modhost: module table, engine
//!   factory and session registry.

pub mod gate;
pub mod host;
pub mod queue;
pub mod runtime;

pub use gate::ReadinessGate;
pub use host::{Host, HostRuntime, start, start_with_gate};
pub use queue::{DispatchQueue, DrainStats, Task};
pub use runtime::{EngineRuntime, RuntimeOptions, consumer_loop};
