//! World engine for the blobsim closed-ecosystem simulation.
//!
//! A fixed population of neural foragers roams a bounded arena, eating
//! stationary food pellets and starving into mutated replacements.

use blobsim_brain::NeuralController;
use rand::{Rng, SeedableRng, rngs::SmallRng};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::f32::consts::{PI, TAU};
use std::fmt;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::warn;

/// Number of angular perception sectors surrounding each blob.
pub const SECTOR_COUNT: usize = 16;
/// Number of channels recorded per perception sector.
pub const SECTOR_CHANNELS: usize = 6;
/// Flattened sensor vector length fed to the neural controller.
pub const INPUT_SIZE: usize = SECTOR_COUNT * SECTOR_CHANNELS;
/// Number of movement outputs produced by the controller.
pub const OUTPUT_SIZE: usize = 2;
/// Hard cap on vision range, and the margin within which walls are sensed.
pub const MAX_VISION_DISTANCE: f32 = 200.0;

/// Bounding-box edge length of every blob.
pub const BLOB_EXTENT: f32 = 16.0;
/// Bounding-box edge length of every food pellet.
pub const FOOD_EXTENT: f32 = 10.0;
/// Hit points assigned at birth; nothing in the loop damages them.
pub const BLOB_BASE_HP: f32 = 100.0;
/// Hunger level at which a blob despawns.
pub const DEATH_THRESHOLD: f32 = 100.0;
/// Hunger satisfied by one food pellet.
pub const FOOD_VALUE: f32 = 100.0;
/// Lower bound on accumulated satiety.
pub const MIN_HUNGER: f32 = -250.0;
/// Center-to-center distance within which a blob consumes a pellet.
pub const FEEDING_RANGE: f32 = 16.0;
/// How long the cosmetic eating flash stays lit in wall-clock time.
pub const EATING_FLASH: Duration = Duration::from_millis(200);

/// Minimum speed a clone can inherit.
const MIN_SPEED: f32 = 0.1;
/// Kind channel value food presents to perception.
const FOOD_KIND: f32 = 1.0;
/// Size channel value food presents to perception.
const FOOD_SIZE: f32 = 1.0;
/// Kind channel value walls present to perception.
const WALL_KIND: f32 = 3.0;

// Fixed sectors that receive wall proximity readings.
const SECTOR_LEFT: usize = 15;
const SECTOR_RIGHT: usize = 7;
const SECTOR_TOP: usize = 3;
const SECTOR_BOTTOM: usize = 11;

/// Step applied by hunger-rate control commands.
const HUNGER_RATE_STEP: f32 = 1.0;
/// Step applied by mutation-rate control commands.
const MUTATION_RATE_STEP: f32 = 0.01;

/// Stable identifier for a blob. Allocated from a world-wide counter and
/// never reused.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct BlobId(pub u64);

/// Stable identifier for a food pellet, drawn from the same counter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct FoodId(pub u64);

/// Monotonic tick counter. One tick is one full pass of the update cycle.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct Tick(pub u64);

impl Tick {
    #[must_use]
    pub const fn zero() -> Self {
        Self(0)
    }

    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

/// Clone depth: seeded blobs are generation zero, clones inherit parent + 1.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct Generation(pub u32);

impl Generation {
    #[must_use]
    pub const fn child(self) -> Self {
        Self(self.0 + 1)
    }
}

/// Arena coordinates, anchored at an entity's top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Most recent movement vector applied to a blob.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Direction {
    pub x: f32,
    pub y: f32,
}

/// One sector's sensory sample.
///
/// The distance channel holds the raw `MAX_VISION_DISTANCE` sentinel while
/// the sector is empty; a detection replaces it with a normalized value.
/// Entities normalize over half the maximum vision distance, walls over the
/// full margin. Trait channels carry the observed entity's raw values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SectorSample {
    pub distance: f32,
    pub kind: f32,
    pub size: f32,
    pub hp: f32,
    pub attack: f32,
    pub defense: f32,
}

impl SectorSample {
    /// Sample representing an empty sector.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            distance: MAX_VISION_DISTANCE,
            kind: 0.0,
            size: 0.0,
            hp: 0.0,
            attack: 0.0,
            defense: 0.0,
        }
    }

    fn channels(&self) -> [f32; SECTOR_CHANNELS] {
        [
            self.distance,
            self.kind,
            self.size,
            self.hp,
            self.attack,
            self.defense,
        ]
    }
}

impl Default for SectorSample {
    fn default() -> Self {
        Self::empty()
    }
}

/// Trait channels an entity presents to a perceiving blob.
#[derive(Clone, Copy)]
struct SensedTraits {
    kind: f32,
    size: f32,
    hp: f32,
    attack: f32,
    defense: f32,
}

impl SensedTraits {
    fn of_food(item: &Food) -> Self {
        Self {
            kind: FOOD_KIND,
            size: item.size,
            hp: 0.0,
            attack: 0.0,
            defense: 0.0,
        }
    }

    fn of_blob(other: &Blob) -> Self {
        Self {
            kind: 0.0,
            size: 0.0,
            hp: other.hp,
            attack: other.attack,
            defense: other.defense,
        }
    }
}

/// Map a bearing onto a perception sector.
///
/// The divisor is intentionally one less than the sector count. The
/// resulting uneven angular coverage is part of the controller input
/// layout; inherited weight sets depend on this exact mapping.
fn sector_for(delta_x: f32, delta_y: f32) -> usize {
    let angle = delta_y.atan2(delta_x);
    let scaled = ((angle + PI) / TAU) * (SECTOR_COUNT as f32 - 1.0);
    (scaled.floor() as usize).min(SECTOR_COUNT - 1)
}

/// A mobile foraging agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Blob {
    pub id: BlobId,
    pub position: Position,
    pub width: f32,
    pub height: f32,
    /// Movement scale drawn once at birth, uniform in `[1, 6)`.
    pub speed: f32,
    pub hp: f32,
    /// Sensed by neighbors but never resolved into damage.
    pub attack: f32,
    pub defense: f32,
    /// Entity sensing range, uniform in `[50, 100)`.
    pub vision_radius: f32,
    pub direction: Direction,
    /// Rises by the hunger rate each tick, drops on feeding. Death at 100.
    pub hunger: f32,
    /// Ticks survived.
    pub age: u32,
    pub generation: Generation,
    pub vision: [SectorSample; SECTOR_COUNT],
    /// Marked when hunger crosses the death threshold; removal happens at
    /// the reconciliation stage of the same tick.
    pub despawn: bool,
    /// Cosmetic feeding flash, expired on wall-clock time by the driver.
    pub eating: bool,
    #[serde(skip)]
    pub eating_deadline: Option<Instant>,
    pub controller: NeuralController,
}

impl Blob {
    fn spawn<R: Rng>(id: BlobId, config: &WorldConfig, rng: &mut R) -> Self {
        let layer_sizes = config.layer_sizes();
        Self {
            id,
            position: Position::new(
                rng.random::<f32>() * config.arena_width,
                rng.random::<f32>() * config.arena_height,
            ),
            width: BLOB_EXTENT,
            height: BLOB_EXTENT,
            speed: rng.random::<f32>() * 5.0 + 1.0,
            hp: BLOB_BASE_HP,
            attack: rng.random::<f32>() * 10.0,
            defense: rng.random::<f32>() * 10.0,
            vision_radius: (rng.random::<f32>() * 50.0 + 50.0).min(MAX_VISION_DISTANCE),
            direction: Direction::default(),
            hunger: 0.0,
            age: 0,
            generation: Generation::default(),
            vision: [SectorSample::empty(); SECTOR_COUNT],
            despawn: false,
            eating: false,
            eating_deadline: None,
            controller: NeuralController::random(&layer_sizes, rng),
        }
    }

    /// Center of the bounding box, used for feeding proximity.
    #[must_use]
    pub fn center(&self) -> (f32, f32) {
        (
            self.position.x + self.width / 2.0,
            self.position.y + self.height / 2.0,
        )
    }

    /// Rebuild the vision buffer from the surrounding entities and walls.
    ///
    /// Food is scanned before other blobs, and earlier list entries win
    /// distance ties. Each sector keeps whichever detection is closest by
    /// raw distance.
    fn perceive(
        &mut self,
        food: &[Food],
        before: &[Blob],
        after: &[Blob],
        arena_width: f32,
        arena_height: f32,
    ) {
        self.vision = [SectorSample::empty(); SECTOR_COUNT];
        let mut best_raw = [MAX_VISION_DISTANCE; SECTOR_COUNT];

        for item in food {
            self.sense(item.position, SensedTraits::of_food(item), &mut best_raw);
        }
        for other in before.iter().chain(after) {
            self.sense(other.position, SensedTraits::of_blob(other), &mut best_raw);
        }
        self.sense_walls(arena_width, arena_height, &mut best_raw);
    }

    fn sense(
        &mut self,
        target: Position,
        traits: SensedTraits,
        best_raw: &mut [f32; SECTOR_COUNT],
    ) {
        let delta_x = target.x - self.position.x;
        let delta_y = target.y - self.position.y;
        let distance = delta_x.hypot(delta_y);
        if distance >= self.vision_radius {
            return;
        }
        let sector = sector_for(delta_x, delta_y);
        if distance >= best_raw[sector] {
            return;
        }
        best_raw[sector] = distance;
        self.vision[sector] = SectorSample {
            distance: distance / (MAX_VISION_DISTANCE / 2.0) - 1.0,
            kind: traits.kind,
            size: traits.size,
            hp: traits.hp,
            attack: traits.attack,
            defense: traits.defense,
        };
    }

    /// Walls are sensed within the full 200-unit margin regardless of the
    /// blob's own vision radius, each through a fixed sector.
    fn sense_walls(
        &mut self,
        arena_width: f32,
        arena_height: f32,
        best_raw: &mut [f32; SECTOR_COUNT],
    ) {
        let edges = [
            (self.position.x, SECTOR_LEFT),
            (arena_width - self.position.x, SECTOR_RIGHT),
            (self.position.y, SECTOR_TOP),
            (arena_height - self.position.y, SECTOR_BOTTOM),
        ];
        for (edge_distance, sector) in edges {
            if edge_distance < MAX_VISION_DISTANCE && edge_distance < best_raw[sector] {
                best_raw[sector] = edge_distance;
                self.vision[sector] = SectorSample {
                    distance: edge_distance / MAX_VISION_DISTANCE - 1.0,
                    kind: WALL_KIND,
                    size: 0.0,
                    hp: 0.0,
                    attack: 0.0,
                    defense: 0.0,
                };
            }
        }
    }

    /// Run the controller over the current vision buffer and store the
    /// resulting direction. Returns `false` when the controller emitted a
    /// non-finite component; the stored direction is then left untouched.
    fn decide(&mut self) -> bool {
        let mut inputs = [0.0_f32; INPUT_SIZE];
        for (chunk, sample) in inputs.chunks_exact_mut(SECTOR_CHANNELS).zip(&self.vision) {
            chunk.copy_from_slice(&sample.channels());
        }
        let outputs = self.controller.forward(&inputs);
        let (mut dx, mut dy) = match (outputs.first(), outputs.get(1)) {
            (Some(&dx), Some(&dy)) => (dx, dy),
            _ => return false,
        };
        let magnitude = (dx * dx + dy * dy).sqrt();
        if magnitude > 1.0 {
            dx /= magnitude;
            dy /= magnitude;
        }
        let candidate = Direction {
            x: dx * self.speed,
            y: dy * self.speed,
        };
        if !candidate.x.is_finite() || !candidate.y.is_finite() {
            return false;
        }
        self.direction = candidate;
        true
    }

    /// Apply the stored direction, clamping to the arena bounds.
    fn advance(&mut self, arena_width: f32, arena_height: f32) {
        self.position.x = (self.position.x + self.direction.x).clamp(0.0, arena_width);
        self.position.y = (self.position.y + self.direction.y).clamp(0.0, arena_height);
    }
}

/// A stationary, single-use food pellet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Food {
    pub id: FoodId,
    pub position: Position,
    pub width: f32,
    pub height: f32,
    pub size: f32,
    /// One-way flag; consumed pellets are dropped at reconciliation.
    pub consumed: bool,
}

impl Food {
    #[must_use]
    pub fn new(id: FoodId, position: Position) -> Self {
        Self {
            id,
            position,
            width: FOOD_EXTENT,
            height: FOOD_EXTENT,
            size: FOOD_SIZE,
            consumed: false,
        }
    }

    /// Center of the bounding box, used for feeding proximity.
    #[must_use]
    pub fn center(&self) -> (f32, f32) {
        (
            self.position.x + self.width / 2.0,
            self.position.y + self.height / 2.0,
        )
    }
}

/// Errors raised while building a world.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorldError {
    /// Indicates an invalid configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}

/// Static configuration for a blobsim world.
///
/// The hunger and mutation rates are the only values adjusted after
/// construction, through control commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldConfig {
    /// Width of the arena in world units.
    pub arena_width: f32,
    /// Height of the arena in world units.
    pub arena_height: f32,
    /// Number of blobs seeded at startup and maintained thereafter.
    pub blob_population: usize,
    /// Number of food pellets seeded at startup and on reset.
    pub food_seed_count: usize,
    /// Steady-state pellet count restored by reconciliation. A seeded
    /// surplus drains only through consumption.
    pub food_target_count: usize,
    /// Hunger added to every blob each tick.
    pub hunger_rate: f32,
    /// Scale applied to trait and weight perturbations when cloning.
    pub mutation_rate: f32,
    /// Hidden layer widths for each blob's controller.
    pub hidden_layers: Vec<usize>,
    /// Number of youngest survivors eligible as clone parents.
    pub parent_pool_size: usize,
    /// Maximum number of recent tick summaries retained in memory.
    pub history_capacity: usize,
    /// Frames between long-horizon metric samples.
    pub metrics_interval: u64,
    /// Maximum number of metric samples retained in memory.
    pub metrics_capacity: usize,
    /// Optional RNG seed for reproducible worlds.
    pub rng_seed: Option<u64>,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            arena_width: 1024.0,
            arena_height: 768.0,
            blob_population: 150,
            food_seed_count: 450,
            food_target_count: 100,
            hunger_rate: 0.75,
            mutation_rate: 0.1,
            hidden_layers: vec![10, 10],
            parent_pool_size: 10,
            history_capacity: 256,
            metrics_interval: 100,
            metrics_capacity: 1024,
            rng_seed: None,
        }
    }
}

impl WorldConfig {
    /// Full controller topology, input width first and output width last.
    #[must_use]
    pub fn layer_sizes(&self) -> Vec<usize> {
        let mut sizes = Vec::with_capacity(self.hidden_layers.len() + 2);
        sizes.push(INPUT_SIZE);
        sizes.extend_from_slice(&self.hidden_layers);
        sizes.push(OUTPUT_SIZE);
        sizes
    }

    fn validate(&self) -> Result<(), WorldError> {
        if !(self.arena_width > 0.0 && self.arena_width.is_finite())
            || !(self.arena_height > 0.0 && self.arena_height.is_finite())
        {
            return Err(WorldError::InvalidConfig(
                "arena dimensions must be positive and finite",
            ));
        }
        if !(self.hunger_rate >= 0.0 && self.hunger_rate.is_finite()) {
            return Err(WorldError::InvalidConfig(
                "hunger_rate must be non-negative and finite",
            ));
        }
        if !(0.0..=1.0).contains(&self.mutation_rate) {
            return Err(WorldError::InvalidConfig(
                "mutation_rate must lie in [0, 1]",
            ));
        }
        if self.hidden_layers.iter().any(|&width| width == 0) {
            return Err(WorldError::InvalidConfig(
                "hidden layer widths must be non-zero",
            ));
        }
        if self.parent_pool_size == 0 {
            return Err(WorldError::InvalidConfig(
                "parent_pool_size must be non-zero",
            ));
        }
        if self.history_capacity == 0 || self.metrics_capacity == 0 {
            return Err(WorldError::InvalidConfig(
                "history and metrics capacities must be non-zero",
            ));
        }
        if self.metrics_interval == 0 {
            return Err(WorldError::InvalidConfig(
                "metrics_interval must be non-zero",
            ));
        }
        Ok(())
    }

    /// Returns the configured RNG, seeding from entropy when unset.
    fn seeded_rng(&self) -> SmallRng {
        match self.rng_seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => {
                let seed: u64 = rand::random();
                SmallRng::seed_from_u64(seed)
            }
        }
    }
}

/// Aggregated statistics for one executed tick. Also serves as the world's
/// persistent statistics block, partially refreshed on seeding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TickSummary {
    /// Tick this summary describes, starting at 1; zero before any step.
    pub tick: Tick,
    /// Population size the world maintains. Refreshed on seed and reset.
    pub total_blobs: usize,
    /// Blobs with positive hit points after reconciliation.
    pub alive_blobs: usize,
    pub average_speed: f32,
    pub average_hp: f32,
    pub average_age: f32,
    /// Blobs removed by starvation this tick.
    pub deaths: usize,
    /// Replacements added this tick, clones and fallback spawns alike.
    pub births: usize,
    /// Pellets eaten this tick.
    pub food_consumed: usize,
    /// Pellets present after reconciliation.
    pub food_count: usize,
    /// Controller evaluations that produced a non-finite direction.
    pub movement_faults: usize,
}

/// Long-horizon chart sample recorded every `metrics_interval` frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    /// Wall-clock Unix time in milliseconds at capture.
    pub timestamp_ms: u64,
    /// Mean blob age at capture.
    pub average_age: f32,
}

/// Externally issued commands, drained and applied at tick boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlCommand {
    /// Flip the running flag gating the paced clock.
    ToggleRunning,
    /// Reseed blobs and food. Counters, history, and rates survive.
    Reset,
    IncreaseHungerRate,
    DecreaseHungerRate,
    IncreaseMutationRate,
    DecreaseMutationRate,
}

/// Apply a control command to the world.
pub fn apply_control_command(world: &mut WorldState, command: ControlCommand) {
    match command {
        ControlCommand::ToggleRunning => world.toggle_running(),
        ControlCommand::Reset => world.reset(),
        ControlCommand::IncreaseHungerRate => world.adjust_hunger_rate(HUNGER_RATE_STEP),
        ControlCommand::DecreaseHungerRate => world.adjust_hunger_rate(-HUNGER_RATE_STEP),
        ControlCommand::IncreaseMutationRate => world.adjust_mutation_rate(MUTATION_RATE_STEP),
        ControlCommand::DecreaseMutationRate => world.adjust_mutation_rate(-MUTATION_RATE_STEP),
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}

/// Owner of all mutable simulation state.
pub struct WorldState {
    config: WorldConfig,
    tick: Tick,
    running: bool,
    rng: SmallRng,
    blobs: Vec<Blob>,
    food: Vec<Food>,
    next_id: u64,
    statistics: TickSummary,
    history: VecDeque<TickSummary>,
    metrics: VecDeque<MetricSample>,
}

impl fmt::Debug for WorldState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorldState")
            .field("tick", &self.tick)
            .field("running", &self.running)
            .field("blob_count", &self.blobs.len())
            .field("food_count", &self.food.len())
            .finish()
    }
}

impl WorldState {
    /// Instantiate a world and seed its starting population and food.
    pub fn new(config: WorldConfig) -> Result<Self, WorldError> {
        config.validate()?;
        let rng = config.seeded_rng();
        let history_capacity = config.history_capacity;
        let metrics_capacity = config.metrics_capacity;
        let mut world = Self {
            config,
            tick: Tick::zero(),
            running: false,
            rng,
            blobs: Vec::new(),
            food: Vec::new(),
            next_id: 0,
            statistics: TickSummary::default(),
            history: VecDeque::with_capacity(history_capacity),
            metrics: VecDeque::with_capacity(metrics_capacity),
        };
        world.seed_entities();
        Ok(world)
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn spawn_blob(&mut self) -> Blob {
        let id = BlobId(self.allocate_id());
        Blob::spawn(id, &self.config, &mut self.rng)
    }

    fn spawn_food(&mut self) -> Food {
        let id = FoodId(self.allocate_id());
        let position = Position::new(
            self.rng.random::<f32>() * self.config.arena_width,
            self.rng.random::<f32>() * self.config.arena_height,
        );
        Food::new(id, position)
    }

    fn seed_entities(&mut self) {
        for _ in 0..self.config.blob_population {
            let blob = self.spawn_blob();
            self.blobs.push(blob);
        }
        for _ in 0..self.config.food_seed_count {
            let item = self.spawn_food();
            self.food.push(item);
        }
        self.statistics.total_blobs = self.blobs.len();
        self.statistics.alive_blobs = self.blobs.len();
    }

    /// Build a mutated clone: a fresh random blob that inherits the
    /// parent's movement traits and controller weights. Position, vision
    /// radius, and controller biases stay freshly drawn.
    fn spawn_child(&mut self, parent: &Blob) -> Blob {
        let rate = self.config.mutation_rate;
        let mut child = self.spawn_blob();
        child.speed = (parent.speed + self.trait_jitter(rate)).max(MIN_SPEED);
        child.attack = (parent.attack + self.trait_jitter(rate)).max(0.0);
        child.defense = (parent.defense + self.trait_jitter(rate)).max(0.0);
        child.generation = parent.generation.child();
        child
            .controller
            .inherit_weights(&parent.controller, rate, &mut self.rng);
        child
    }

    fn trait_jitter(&mut self, rate: f32) -> f32 {
        (self.rng.random::<f32>() - 0.5) * rate
    }

    /// Metabolize, perceive, decide, and move every blob in list order.
    ///
    /// Updates are in place: a blob sees earlier list entries at their
    /// already-moved positions for this tick and later entries where the
    /// previous tick left them. Returns the number of skipped moves.
    fn stage_update_blobs(&mut self) -> usize {
        let arena_width = self.config.arena_width;
        let arena_height = self.config.arena_height;
        let hunger_rate = self.config.hunger_rate;
        let mut movement_faults = 0_usize;

        for index in 0..self.blobs.len() {
            let (before, rest) = self.blobs.split_at_mut(index);
            let Some((blob, after)) = rest.split_first_mut() else {
                break;
            };
            blob.hunger += hunger_rate;
            blob.perceive(&self.food, before, after, arena_width, arena_height);
            if blob.decide() {
                blob.advance(arena_width, arena_height);
            } else {
                warn!(
                    blob = blob.id.0,
                    "controller produced a non-finite direction; move skipped"
                );
                movement_faults += 1;
            }
            blob.age += 1;
            if blob.hunger >= DEATH_THRESHOLD {
                blob.despawn = true;
            }
        }
        movement_faults
    }

    /// Drop starved blobs and restore the population count.
    ///
    /// Each replacement re-sorts the survivors by age and clones one of
    /// the youngest `parent_pool_size`, so clones born earlier in the same
    /// pass can themselves be chosen as parents. When the pool index lands
    /// past the end of a shrunken population, a fresh generation-zero blob
    /// is spawned instead.
    fn stage_reconcile_population(&mut self) -> (usize, usize) {
        let target = self.blobs.len();
        self.blobs.retain(|blob| !blob.despawn);
        let deaths = target - self.blobs.len();

        let mut births = 0_usize;
        while self.blobs.len() < target {
            self.blobs.sort_by_key(|blob| blob.age);
            let pool = self.config.parent_pool_size;
            let pick = self.rng.random_range(0..pool);
            let parent = self.blobs.get(pick).cloned();
            let child = match parent {
                Some(parent) => self.spawn_child(&parent),
                None => self.spawn_blob(),
            };
            self.blobs.push(child);
            births += 1;
        }
        (deaths, births)
    }

    /// Let every blob, replacements included, consume pellets within
    /// feeding range. A pellet feeds at most one blob; a blob may eat
    /// several pellets in one tick.
    fn stage_feeding(&mut self) -> usize {
        let mut consumed = 0_usize;
        for blob in &mut self.blobs {
            let (blob_cx, blob_cy) = blob.center();
            for item in &mut self.food {
                if item.consumed {
                    continue;
                }
                let (food_cx, food_cy) = item.center();
                let dx = food_cx - blob_cx;
                let dy = food_cy - blob_cy;
                if dx * dx + dy * dy < FEEDING_RANGE * FEEDING_RANGE {
                    item.consumed = true;
                    blob.hunger = (blob.hunger - FOOD_VALUE).max(MIN_HUNGER);
                    blob.eating = true;
                    consumed += 1;
                }
            }
        }
        consumed
    }

    /// Drop consumed pellets, then top the supply back up to the target.
    /// A surplus above the target is left to drain through consumption.
    fn stage_food_reconcile(&mut self) -> usize {
        self.food.retain(|item| !item.consumed);
        let mut spawned = 0_usize;
        while self.food.len() < self.config.food_target_count {
            let item = self.spawn_food();
            self.food.push(item);
            spawned += 1;
        }
        spawned
    }

    fn stage_statistics(
        &mut self,
        next_tick: Tick,
        deaths: usize,
        births: usize,
        food_consumed: usize,
        movement_faults: usize,
    ) -> TickSummary {
        let count = self.blobs.len();
        let alive = self.blobs.iter().filter(|blob| blob.hp > 0.0).count();
        let mut speed_total = 0.0_f32;
        let mut hp_total = 0.0_f32;
        let mut age_total = 0.0_f32;
        for blob in &self.blobs {
            speed_total += blob.speed;
            hp_total += blob.hp;
            age_total += blob.age as f32;
        }
        let average = |total: f32| {
            if count > 0 {
                total / count as f32
            } else {
                0.0
            }
        };

        let summary = TickSummary {
            tick: next_tick,
            total_blobs: self.statistics.total_blobs,
            alive_blobs: alive,
            average_speed: average(speed_total),
            average_hp: average(hp_total),
            average_age: average(age_total),
            deaths,
            births,
            food_consumed,
            food_count: self.food.len(),
            movement_faults,
        };
        self.statistics = summary.clone();
        if self.history.len() >= self.config.history_capacity {
            self.history.pop_front();
        }
        self.history.push_back(summary.clone());
        summary
    }

    /// Sample the long-horizon metrics when the pre-increment frame
    /// counter lands on the interval: frames 0, 100, 200, and so on.
    fn stage_metrics(&mut self, summary: &TickSummary) {
        if !self.tick.0.is_multiple_of(self.config.metrics_interval) {
            return;
        }
        if self.metrics.len() >= self.config.metrics_capacity {
            self.metrics.pop_front();
        }
        self.metrics.push_back(MetricSample {
            timestamp_ms: unix_millis(),
            average_age: summary.average_age,
        });
    }

    /// Execute one full simulation tick, returning the recorded summary.
    pub fn step(&mut self) -> TickSummary {
        let next_tick = self.tick.next();
        let movement_faults = self.stage_update_blobs();
        let (deaths, births) = self.stage_reconcile_population();
        let food_consumed = self.stage_feeding();
        self.stage_food_reconcile();
        let summary =
            self.stage_statistics(next_tick, deaths, births, food_consumed, movement_faults);
        self.stage_metrics(&summary);
        self.tick = next_tick;
        summary
    }

    /// Reseed the population and food supply. The tick counter, history,
    /// metrics, and tuned rates all survive a reset.
    pub fn reset(&mut self) {
        self.blobs.clear();
        self.food.clear();
        self.seed_entities();
    }

    fn adjust_hunger_rate(&mut self, delta: f32) {
        self.config.hunger_rate = (self.config.hunger_rate + delta).max(0.0);
    }

    fn adjust_mutation_rate(&mut self, delta: f32) {
        self.config.mutation_rate = (self.config.mutation_rate + delta).clamp(0.0, 1.0);
    }

    /// Drive the cosmetic eating flashes. Newly lit flags get a wall-clock
    /// deadline; elapsed ones are cleared. Never touches simulation state.
    pub fn tick_eating_flashes(&mut self, now: Instant) {
        for blob in &mut self.blobs {
            if !blob.eating {
                continue;
            }
            match blob.eating_deadline {
                None => blob.eating_deadline = Some(now + EATING_FLASH),
                Some(deadline) if now >= deadline => {
                    blob.eating = false;
                    blob.eating_deadline = None;
                }
                Some(_) => {}
            }
        }
    }

    /// Immutable access to the configuration.
    #[must_use]
    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Current tick counter, equal to the number of executed ticks.
    #[must_use]
    pub const fn tick(&self) -> Tick {
        self.tick
    }

    /// Whether the paced clock should execute ticks.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.running
    }

    pub fn toggle_running(&mut self) {
        self.running = !self.running;
    }

    /// Read-only view of the population, in update order.
    #[must_use]
    pub fn blobs(&self) -> &[Blob] {
        &self.blobs
    }

    /// Mutable access to the population, for scenario setup.
    pub fn blobs_mut(&mut self) -> &mut Vec<Blob> {
        &mut self.blobs
    }

    /// Read-only view of the food supply.
    #[must_use]
    pub fn food(&self) -> &[Food] {
        &self.food
    }

    /// Mutable access to the food supply, for scenario setup.
    pub fn food_mut(&mut self) -> &mut Vec<Food> {
        &mut self.food
    }

    #[must_use]
    pub fn blob_count(&self) -> usize {
        self.blobs.len()
    }

    #[must_use]
    pub fn food_count(&self) -> usize {
        self.food.len()
    }

    /// Latest statistics block. Stale averages persist across a reset
    /// until the next executed tick.
    #[must_use]
    pub fn statistics(&self) -> &TickSummary {
        &self.statistics
    }

    /// Iterate over retained tick summaries, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &TickSummary> {
        self.history.iter()
    }

    /// Iterate over retained metric samples, oldest first.
    pub fn metrics(&self) -> impl Iterator<Item = &MetricSample> {
        self.metrics.iter()
    }
}
