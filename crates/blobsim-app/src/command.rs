use blobsim_core::{ControlCommand, WorldState, apply_control_command};
use crossfire::mpmc;
use crossfire::{MRx, MTx, TryRecvError, detect_backoff_cfg};
use tracing::debug;

pub type CommandSender = MTx<ControlCommand>;
pub type CommandReceiver = MRx<ControlCommand>;

/// Build the bounded bus carrying control commands into the driver loop.
pub fn create_command_bus(capacity: usize) -> (CommandSender, CommandReceiver) {
    detect_backoff_cfg();
    mpmc::bounded_blocking(capacity)
}

/// Apply every queued command to the world. Callers hold the world lock, so
/// commands always land between ticks.
pub fn drain_pending_commands(receiver: &CommandReceiver, world: &mut WorldState) {
    loop {
        match receiver.try_recv() {
            Ok(command) => {
                debug!(?command, "applying control command");
                apply_control_command(world, command);
            }
            Err(TryRecvError::Empty) => break,
            Err(TryRecvError::Disconnected) => break,
        }
    }
}
