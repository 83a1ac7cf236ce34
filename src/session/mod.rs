//! Session lifecycle management.
//!
//! This module is the core of the bridge: the registry is the single
//! authority on what sessions exist and whether they are usable, and the
//! supervisor drives each session's connection state machine.

mod registry;
mod state;
mod supervisor;

pub use registry::{Session, SessionRegistry, SessionView};
pub use state::LifecycleState;
pub use supervisor::{LoggedOutPolicy, ReconnectPolicy, Supervisor};
