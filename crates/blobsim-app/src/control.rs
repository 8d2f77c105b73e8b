use std::sync::{MutexGuard, PoisonError};

use crossfire::TrySendError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use blobsim_core::{
    Blob, ControlCommand, Direction, Food, MetricSample, Position, SECTOR_COUNT, SectorSample,
    TickSummary, WorldState,
};

use crate::SharedWorld;
use crate::command::CommandSender;

/// Read-only projection of one blob for external clients. Controller
/// weights stay inside the world; the vision buffer is exposed so clients
/// can draw what the blob saw.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobView {
    pub id: u64,
    pub position: Position,
    pub direction: Direction,
    pub speed: f32,
    pub hp: f32,
    pub attack: f32,
    pub defense: f32,
    pub vision_radius: f32,
    pub hunger: f32,
    pub age: u32,
    pub generation: u32,
    pub eating: bool,
    pub vision: [SectorSample; SECTOR_COUNT],
}

impl BlobView {
    fn from_blob(blob: &Blob) -> Self {
        Self {
            id: blob.id.0,
            position: blob.position,
            direction: blob.direction,
            speed: blob.speed,
            hp: blob.hp,
            attack: blob.attack,
            defense: blob.defense,
            vision_radius: blob.vision_radius,
            hunger: blob.hunger,
            age: blob.age,
            generation: blob.generation.0,
            eating: blob.eating,
            vision: blob.vision,
        }
    }
}

/// Read-only projection of one food pellet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoodView {
    pub id: u64,
    pub position: Position,
    pub size: f32,
}

impl FoodView {
    fn from_food(item: &Food) -> Self {
        Self {
            id: item.id.0,
            position: item.position,
            size: item.size,
        }
    }
}

/// Full world projection captured under a single lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub tick: u64,
    pub running: bool,
    pub hunger_rate: f32,
    pub mutation_rate: f32,
    pub statistics: TickSummary,
    pub blobs: Vec<BlobView>,
    pub food: Vec<FoodView>,
    pub metrics: Vec<MetricSample>,
}

impl WorldSnapshot {
    fn from_world(world: &WorldState) -> Self {
        Self {
            tick: world.tick().0,
            running: world.is_running(),
            hunger_rate: world.config().hunger_rate,
            mutation_rate: world.config().mutation_rate,
            statistics: world.statistics().clone(),
            blobs: world.blobs().iter().map(BlobView::from_blob).collect(),
            food: world.food().iter().map(FoodView::from_food).collect(),
            metrics: world.metrics().cloned().collect(),
        }
    }
}

/// Errors produced while reaching into the running world.
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("failed to lock world state")]
    Lock,
    #[error("command queue is full; retry later")]
    CommandQueueFull,
    #[error("command queue has been closed")]
    CommandQueueClosed,
}

impl From<PoisonError<MutexGuard<'_, WorldState>>> for ControlError {
    fn from(_: PoisonError<MutexGuard<'_, WorldState>>) -> Self {
        ControlError::Lock
    }
}

/// Shared handle used by the CLI and driver loop to reach the running world.
#[derive(Clone)]
pub struct ControlHandle {
    shared_world: SharedWorld,
    commands: CommandSender,
}

impl ControlHandle {
    pub fn new(shared_world: SharedWorld, commands: CommandSender) -> Self {
        Self {
            shared_world,
            commands,
        }
    }

    fn lock_world(&self) -> Result<MutexGuard<'_, WorldState>, ControlError> {
        self.shared_world.lock().map_err(|err| err.into())
    }

    /// Capture a consistent projection of the whole world.
    pub fn snapshot(&self) -> Result<WorldSnapshot, ControlError> {
        let world = self.lock_world()?;
        Ok(WorldSnapshot::from_world(&world))
    }

    /// Latest tick statistics from the running world.
    pub fn latest_summary(&self) -> Result<TickSummary, ControlError> {
        let world = self.lock_world()?;
        Ok(world.statistics().clone())
    }

    pub fn toggle_running(&self) -> Result<(), ControlError> {
        self.enqueue(ControlCommand::ToggleRunning)
    }

    pub fn reset(&self) -> Result<(), ControlError> {
        self.enqueue(ControlCommand::Reset)
    }

    pub fn increase_hunger_rate(&self) -> Result<(), ControlError> {
        self.enqueue(ControlCommand::IncreaseHungerRate)
    }

    pub fn decrease_hunger_rate(&self) -> Result<(), ControlError> {
        self.enqueue(ControlCommand::DecreaseHungerRate)
    }

    pub fn increase_mutation_rate(&self) -> Result<(), ControlError> {
        self.enqueue(ControlCommand::IncreaseMutationRate)
    }

    pub fn decrease_mutation_rate(&self) -> Result<(), ControlError> {
        self.enqueue(ControlCommand::DecreaseMutationRate)
    }

    fn enqueue(&self, command: ControlCommand) -> Result<(), ControlError> {
        match self.commands.try_send(command) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_msg)) => Err(ControlError::CommandQueueFull),
            Err(TrySendError::Disconnected(_msg)) => Err(ControlError::CommandQueueClosed),
        }
    }
}
