//! Shared driver plumbing for the blobsim control surfaces.

use std::sync::{Arc, Mutex};

use blobsim_core::WorldState;

/// World handle shared between the driver loop and control surfaces.
pub type SharedWorld = Arc<Mutex<WorldState>>;

pub mod clock;
pub mod command;
pub mod control;

pub use clock::{MAX_STEPS_PER_PUMP, SimulationClock, TARGET_SIM_HZ};
pub use command::{CommandReceiver, CommandSender, create_command_bus, drain_pending_commands};
pub use control::{BlobView, ControlError, ControlHandle, FoodView, WorldSnapshot};
