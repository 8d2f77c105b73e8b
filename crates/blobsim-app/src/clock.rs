//! Fixed-rate pacing for the simulation loop.

use std::time::{Duration, Instant};

use crate::SharedWorld;
use crate::command::{CommandReceiver, drain_pending_commands};

/// Simulation rate the paced driver aims for.
pub const TARGET_SIM_HZ: f32 = 140.0;
/// Upper bound on ticks executed by a single pump.
pub const MAX_STEPS_PER_PUMP: usize = 280;

/// Wall-clock accumulator translating elapsed time into whole ticks.
///
/// Commands are drained and applied at the pump boundary, so a pause or
/// reset lands between ticks, never inside one.
#[derive(Debug)]
pub struct SimulationClock {
    tick_interval: Duration,
    accumulator: f32,
    last_pump: Instant,
    max_steps_per_pump: usize,
}

impl SimulationClock {
    #[must_use]
    pub fn new(now: Instant) -> Self {
        Self::with_interval(now, Duration::from_secs_f32(1.0 / TARGET_SIM_HZ))
    }

    /// Clock with an explicit tick interval.
    #[must_use]
    pub fn with_interval(now: Instant, tick_interval: Duration) -> Self {
        Self {
            tick_interval,
            accumulator: 0.0,
            last_pump: now,
            max_steps_per_pump: MAX_STEPS_PER_PUMP,
        }
    }

    /// Drain queued commands, then execute every whole tick the elapsed
    /// wall-clock time covers. Returns the number of ticks executed.
    ///
    /// Elapsed time only accumulates while the world is running, so a
    /// paused stretch never turns into a burst of catch-up ticks.
    pub fn pump(&mut self, now: Instant, world: &SharedWorld, receiver: &CommandReceiver) -> usize {
        let delta = now.saturating_duration_since(self.last_pump);
        self.last_pump = now;

        let Ok(mut world) = world.lock() else {
            return 0;
        };
        drain_pending_commands(receiver, &mut world);

        let step_interval = self.tick_interval.as_secs_f32();
        let mut steps = 0_usize;
        if world.is_running() && step_interval > f32::EPSILON {
            self.accumulator += delta.as_secs_f32();
            let max_accumulator = step_interval * self.max_steps_per_pump as f32;
            if self.accumulator > max_accumulator {
                self.accumulator = max_accumulator;
            }
            steps = (self.accumulator / step_interval).floor() as usize;
            if steps > self.max_steps_per_pump {
                steps = self.max_steps_per_pump;
            }
            if steps > 0 {
                self.accumulator -= step_interval * steps as f32;
            }
        }

        for _ in 0..steps {
            world.step();
        }
        world.tick_eating_flashes(now);
        steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{CommandReceiver, CommandSender, create_command_bus};
    use blobsim_core::{ControlCommand, WorldConfig, WorldState};
    use std::sync::{Arc, Mutex};

    // 1/128 s is exact in binary, so step counts come out whole.
    const TEST_INTERVAL: Duration = Duration::from_nanos(7_812_500);

    fn paced_fixture() -> (SharedWorld, CommandSender, CommandReceiver) {
        let config = WorldConfig {
            blob_population: 3,
            food_seed_count: 0,
            food_target_count: 0,
            hunger_rate: 0.0,
            rng_seed: Some(99),
            ..WorldConfig::default()
        };
        let world = WorldState::new(config).expect("world");
        let (sender, receiver) = create_command_bus(8);
        (Arc::new(Mutex::new(world)), sender, receiver)
    }

    #[test]
    fn paused_clock_executes_nothing() {
        let (world, _sender, receiver) = paced_fixture();
        let start = Instant::now();
        let mut clock = SimulationClock::with_interval(start, TEST_INTERVAL);

        let steps = clock.pump(start + Duration::from_secs(1), &world, &receiver);

        assert_eq!(steps, 0);
        assert_eq!(world.lock().expect("world lock").tick().0, 0);
    }

    #[test]
    fn running_clock_converts_elapsed_time_into_ticks() {
        let (world, sender, receiver) = paced_fixture();
        sender
            .try_send(ControlCommand::ToggleRunning)
            .expect("toggle");
        let start = Instant::now();
        let mut clock = SimulationClock::with_interval(start, TEST_INTERVAL);

        let armed = clock.pump(start, &world, &receiver);
        assert_eq!(armed, 0, "toggling consumes no wall-clock time");

        // Ten intervals of elapsed time yield exactly ten ticks.
        let steps = clock.pump(start + TEST_INTERVAL * 10, &world, &receiver);

        assert_eq!(steps, 10);
        assert_eq!(world.lock().expect("world lock").tick().0, 10);
    }

    #[test]
    fn pump_caps_a_runaway_backlog() {
        let (world, sender, receiver) = paced_fixture();
        sender
            .try_send(ControlCommand::ToggleRunning)
            .expect("toggle");
        let start = Instant::now();
        let mut clock = SimulationClock::with_interval(start, TEST_INTERVAL);
        clock.pump(start, &world, &receiver);

        let steps = clock.pump(start + Duration::from_secs(30), &world, &receiver);

        assert_eq!(steps, MAX_STEPS_PER_PUMP);
        assert_eq!(
            world.lock().expect("world lock").tick().0,
            MAX_STEPS_PER_PUMP as u64
        );
    }

    #[test]
    fn pause_command_freezes_midstream() {
        let (world, sender, receiver) = paced_fixture();
        sender
            .try_send(ControlCommand::ToggleRunning)
            .expect("toggle");
        let start = Instant::now();
        let mut clock = SimulationClock::with_interval(start, TEST_INTERVAL);
        clock.pump(start, &world, &receiver);
        clock.pump(start + TEST_INTERVAL * 6, &world, &receiver);
        let tick_after_run = world.lock().expect("world lock").tick().0;
        assert_eq!(tick_after_run, 6);

        sender
            .try_send(ControlCommand::ToggleRunning)
            .expect("pause");
        let steps = clock.pump(start + Duration::from_secs(5), &world, &receiver);

        assert_eq!(steps, 0, "paused worlds ignore elapsed time");
        assert_eq!(world.lock().expect("world lock").tick().0, tick_after_run);
    }
}
