//! End-to-end behavior of a blobsim world across many ticks.

use blobsim_core::{Generation, TickSummary, WorldConfig, WorldState};
use std::collections::HashMap;

fn seeded_config(seed: u64) -> WorldConfig {
    WorldConfig {
        rng_seed: Some(seed),
        ..WorldConfig::default()
    }
}

fn run_summaries(config: WorldConfig, ticks: usize) -> Vec<TickSummary> {
    let mut world = WorldState::new(config).expect("world");
    (0..ticks).map(|_| world.step()).collect()
}

#[test]
fn same_seed_reproduces_the_same_run() {
    let mut left = WorldState::new(seeded_config(42)).expect("world");
    let mut right = WorldState::new(seeded_config(42)).expect("world");
    for tick in 0..30 {
        let a = left.step();
        let b = right.step();
        assert_eq!(a, b, "summaries diverged at tick {tick}");
    }
    for (a, b) in left.blobs().iter().zip(right.blobs()) {
        assert_eq!(a.id, b.id);
        assert_eq!(a.position, b.position);
        assert_eq!(a.hunger, b.hunger);
        assert_eq!(a.generation, b.generation);
    }
}

#[test]
fn different_seeds_diverge() {
    let left = run_summaries(seeded_config(1), 5);
    let right = run_summaries(seeded_config(2), 5);
    assert_ne!(left, right, "distinct seeds must produce distinct runs");
}

#[test]
fn first_tick_of_a_fresh_world_only_metabolizes() {
    let mut world = WorldState::new(seeded_config(7)).expect("world");

    let summary = world.step();

    assert_eq!(summary.deaths, 0, "nobody can starve on tick one");
    assert_eq!(summary.births, 0);
    assert_eq!(summary.alive_blobs, 150);
    assert_eq!(world.blob_count(), 150);
    assert!(
        (100..=450).contains(&summary.food_count),
        "the seeded surplus only shrinks, and never below the target"
    );
    for blob in world.blobs() {
        assert!(
            blob.hunger == 0.75 || blob.hunger <= -99.25,
            "hunger rose by the hunger rate, minus any food eaten: {}",
            blob.hunger
        );
        assert_eq!(blob.age, 1);
    }
}

#[test]
fn seeded_food_surplus_drains_toward_the_target() {
    let mut world = WorldState::new(seeded_config(11)).expect("world");
    let mut previous = world.food_count();
    assert_eq!(previous, 450);
    for _ in 0..60 {
        let summary = world.step();
        if previous > 100 {
            assert!(
                summary.food_count <= previous,
                "food never regrows while the surplus lasts"
            );
        }
        assert!(
            summary.food_count >= 100,
            "reconciliation refills up to the target"
        );
        previous = summary.food_count;
    }
}

#[test]
fn understocked_world_refills_to_the_target_in_one_tick() {
    let config = WorldConfig {
        food_seed_count: 0,
        ..seeded_config(3)
    };
    let mut world = WorldState::new(config).expect("world");
    assert_eq!(world.food_count(), 0);

    let summary = world.step();

    assert_eq!(summary.food_count, 100);
}

#[test]
fn starved_blob_is_replaced_by_a_young_clone() {
    let config = WorldConfig {
        blob_population: 12,
        food_seed_count: 0,
        food_target_count: 0,
        ..seeded_config(5)
    };
    let mut world = WorldState::new(config).expect("world");
    world.blobs_mut()[0].hunger = 99.5;

    let summary = world.step();

    assert_eq!(summary.deaths, 1, "99.5 plus the 0.75 rate crosses 100");
    assert_eq!(summary.births, 1);
    assert_eq!(world.blob_count(), 12);
    let newborns: Vec<_> = world.blobs().iter().filter(|blob| blob.age == 0).collect();
    assert_eq!(newborns.len(), 1);
    assert_eq!(
        newborns[0].generation,
        Generation(1),
        "the clone descends from a generation-zero survivor"
    );
}

#[test]
fn metrics_capture_every_hundredth_frame() {
    let config = WorldConfig {
        blob_population: 10,
        food_seed_count: 20,
        food_target_count: 20,
        ..seeded_config(13)
    };
    let mut world = WorldState::new(config).expect("world");
    for _ in 0..201 {
        world.step();
    }
    // Frames 0, 100, and 200 land on the default interval.
    assert_eq!(world.metrics().count(), 3);
}

#[test]
fn population_survives_generations_of_turnover() {
    let config = WorldConfig {
        blob_population: 40,
        food_seed_count: 0,
        food_target_count: 0,
        hunger_rate: 2.0,
        ..seeded_config(17)
    };
    let mut world = WorldState::new(config).expect("world");
    let mut total_deaths = 0;
    for _ in 0..200 {
        let summary = world.step();
        assert_eq!(
            summary.deaths, summary.births,
            "every death is matched by a birth"
        );
        assert_eq!(world.blob_count(), 40);
        total_deaths += summary.deaths;
    }
    assert!(
        total_deaths >= 40,
        "a foodless world turns over the whole population"
    );
}

#[test]
fn blobs_stay_inside_the_arena() {
    let config = WorldConfig {
        blob_population: 25,
        food_seed_count: 40,
        food_target_count: 40,
        ..seeded_config(19)
    };
    let mut world = WorldState::new(config).expect("world");
    for _ in 0..50 {
        world.step();
        for blob in world.blobs() {
            assert!((0.0..=1024.0).contains(&blob.position.x));
            assert!((0.0..=768.0).contains(&blob.position.y));
        }
    }
}

#[test]
fn per_tick_displacement_never_exceeds_speed() {
    let mut world = WorldState::new(seeded_config(23)).expect("world");
    for _ in 0..20 {
        let before: HashMap<_, _> = world
            .blobs()
            .iter()
            .map(|blob| (blob.id, blob.position))
            .collect();
        world.step();
        for blob in world.blobs() {
            if let Some(previous) = before.get(&blob.id) {
                let dx = blob.position.x - previous.x;
                let dy = blob.position.y - previous.y;
                let displacement = dx.hypot(dy);
                assert!(
                    displacement <= blob.speed + 1e-3,
                    "blob {:?} moved {displacement} with speed {}",
                    blob.id, blob.speed
                );
            }
        }
    }
}
