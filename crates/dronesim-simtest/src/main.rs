//! DroneSim Headless Episode Harness
//!
//! Runs the baseline allocators and decision sources over seeded episodes
//! and checks the fleet invariants after every tick.
//! Runs entirely in-process, no rendering, no external policy.
//!
//! Usage:
//!   cargo run -p dronesim-simtest
//!   cargo run -p dronesim-simtest -- --verbose --episodes 5
//!   cargo run -p dronesim-simtest -- --config my_config.json --report out.json
//!
//! Set `RUST_LOG=debug` to see blocked transitions and dropped commitments.

use std::collections::BTreeMap;

use dronesim_core::config::{ExecutionStrategy, LayoutConfig, MerchantSite, SimConfig};
use dronesim_core::policy::{
    run_tick, Allocator, AssignmentRequest, CargoFirstPolicy, DecisionSource, EdfAllocator,
    GreedyAllocator, NoAllocator, NoDecisions, RandomAllocator, RandomPolicy, TickInput,
};
use dronesim_core::prelude::{DeliveryEngine, EpisodeStats, WorldSnapshot};
use dronesim_logic::geometry::Vec2;
use dronesim_logic::lifecycle::OrderStatus;
use dronesim_logic::OrderId;
use clap::Parser;
use log::info;
use serde::Serialize;

// ── Baseline config (same JSON shipped with the repo) ───────────────────
const BASELINE_JSON: &str = include_str!("../../../data/baseline_config.json");

// ── Test harness ────────────────────────────────────────────────────────

struct TestResult {
    name: String,
    passed: bool,
    detail: String,
}

/// Command-line options.
#[derive(Parser, Debug)]
#[command(name = "dronesim-simtest", version)]
struct Options {
    /// Print per-episode metrics for every policy pair
    #[arg(long, default_value_t = false)]
    verbose: bool,

    /// Seeded episodes per policy pair
    #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u64).range(1..))]
    episodes: u64,

    /// JSON config overriding the shipped baseline
    #[arg(long = "config")]
    config_path: Option<String>,

    /// Write per-pair summaries as JSON to this path
    #[arg(long = "report")]
    report_path: Option<String>,
}

/// Per-pair summary written with `--report`.
#[derive(Debug, Serialize)]
struct PairReport {
    pair: String,
    strategy: ExecutionStrategy,
    episodes: u64,
    delivered: u64,
    cancelled: u64,
    on_time_rate: f64,
    completion_rate: f64,
    invalid_decisions: u64,
    fallbacks: u64,
    repairs: u64,
}

fn main() {
    env_logger::init();
    let opts = Options::parse();
    println!("=== DroneSim Episode Harness ===\n");

    let mut results = Vec::new();

    // 1. Configuration loading
    let Some(base) = load_config(&opts, &mut results) else {
        finish(&results, opts.verbose);
        return;
    };

    // 2. Reference scenarios on a fixed layout
    results.extend(validate_reference_scenarios(opts.verbose));

    // 3. Baseline policy sweeps
    let (sweep_results, reports) = validate_policy_sweeps(&base, &opts);
    results.extend(sweep_results);

    // 4. Determinism
    results.extend(validate_determinism(&base));

    if let Some(path) = &opts.report_path {
        results.push(write_report(path, &reports));
    }

    finish(&results, opts.verbose);
}

fn finish(results: &[TestResult], verbose: bool) {
    // ── Summary ──
    println!();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.iter().filter(|r| !r.passed).count();
    let total = results.len();

    for r in results {
        let icon = if r.passed { "✓" } else { "✗" };
        if !r.passed || verbose {
            println!("  {} {}: {}", icon, r.name, r.detail);
        }
    }

    println!(
        "\n=== RESULT: {}/{} passed, {} failed ===",
        passed, total, failed
    );

    if failed > 0 {
        std::process::exit(1);
    }
}

// ── 1. Configuration ────────────────────────────────────────────────────

fn load_config(opts: &Options, results: &mut Vec<TestResult>) -> Option<SimConfig> {
    println!("--- Configuration ---");

    let defaults_ok = SimConfig::default().validate();
    results.push(TestResult {
        name: "config_defaults_valid".into(),
        passed: defaults_ok.is_ok(),
        detail: match defaults_ok {
            Ok(()) => "default config validates".into(),
            Err(e) => format!("default config rejected: {}", e),
        },
    });

    let broken = SimConfig::from_json(r#"{ "num_drones": 0 }"#);
    results.push(TestResult {
        name: "config_rejects_empty_fleet".into(),
        passed: broken.is_err(),
        detail: "num_drones = 0 must not load".into(),
    });

    let loaded = match &opts.config_path {
        Some(path) => SimConfig::from_file(path).map_err(|e| format!("{}: {}", path, e)),
        None => SimConfig::from_json(BASELINE_JSON).map_err(|e| format!("baseline: {}", e)),
    };
    match loaded {
        Ok(config) => {
            results.push(TestResult {
                name: "config_load".into(),
                passed: true,
                detail: format!(
                    "{} drones, {} merchants, {:?} strategy, {} steps",
                    config.num_drones,
                    config.merchant_count(),
                    config.strategy,
                    config.episode_steps
                ),
            });
            Some(config)
        }
        Err(detail) => {
            results.push(TestResult {
                name: "config_load".into(),
                passed: false,
                detail,
            });
            None
        }
    }
}

// ── 2. Reference Scenarios ──────────────────────────────────────────────

/// One drone and one merchant nine units east of the base.
fn straight_line_config() -> SimConfig {
    SimConfig {
        order_rate: 0.0,
        num_drones: 1,
        layout: Some(LayoutConfig {
            merchants: vec![MerchantSite {
                location: Vec2::new(9.0, 0.0),
                efficiency: 1.0,
            }],
            bases: vec![Vec2::ZERO],
            drone_starts: vec![Vec2::ZERO],
        }),
        ..Default::default()
    }
}

fn validate_reference_scenarios(verbose: bool) -> Vec<TestResult> {
    println!("--- Reference Scenarios ---");
    let mut results = Vec::new();

    // On-time delivery: assigned at step 2, picked up at 10, delivered at 20.
    match run_delivery_scenario() {
        Ok((pickup, delivery, on_time)) => {
            if verbose {
                println!("  pickup at step {}, delivery at step {}", pickup, delivery);
            }
            results.push(TestResult {
                name: "scenario_on_time_delivery".into(),
                passed: pickup == 10 && delivery == 20 && on_time == 1,
                detail: format!(
                    "pickup {} delivery {} on_time {}",
                    pickup, delivery, on_time
                ),
            });
        }
        Err(detail) => results.push(TestResult {
            name: "scenario_on_time_delivery".into(),
            passed: false,
            detail,
        }),
    }

    // Unserved order is cancelled at the deadline with its drone released.
    match run_cancellation_scenario() {
        Ok((step, cleared)) => results.push(TestResult {
            name: "scenario_deadline_cancel".into(),
            passed: step == 48 && cleared,
            detail: format!("cancelled at step {}, assignee cleared = {}", step, cleared),
        }),
        Err(detail) => results.push(TestResult {
            name: "scenario_deadline_cancel".into(),
            passed: false,
            detail,
        }),
    }

    results
}

fn first_step_with(
    engine: &mut DeliveryEngine,
    order: OrderId,
    status: OrderStatus,
    limit: u64,
) -> Result<u64, String> {
    while engine.time() < limit {
        let outcome = engine
            .step(TickInput::default())
            .map_err(|e| e.to_string())?;
        if engine.order(order).map(|o| o.status) == Some(status) {
            return Ok(outcome.info.step);
        }
    }
    Err(format!("order {} never reached {}", order, status.as_str()))
}

fn run_delivery_scenario() -> Result<(u64, u64, u64), String> {
    let mut engine = DeliveryEngine::new(straight_line_config()).map_err(|e| e.to_string())?;
    let order = engine
        .spawn_order(0, Vec2::new(9.0, 10.0), 0)
        .ok_or("merchant 0 missing")?;
    for _ in 0..2 {
        engine.step(TickInput::default()).map_err(|e| e.to_string())?;
    }
    let outcome = engine
        .step(TickInput {
            assignments: vec![AssignmentRequest::single(0, order)],
            decisions: Vec::new(),
        })
        .map_err(|e| e.to_string())?;
    if let Some(Err(e)) = outcome.info.assignments.first().map(|a| a.result.clone()) {
        return Err(format!("assignment rejected: {}", e));
    }

    let pickup = first_step_with(&mut engine, order, OrderStatus::PickedUp, 40)?;
    let delivery = first_step_with(&mut engine, order, OrderStatus::Delivered, 40)?;
    Ok((pickup, delivery, engine.stats().on_time_deliveries))
}

fn run_cancellation_scenario() -> Result<(u64, bool), String> {
    let mut config = straight_line_config();
    if let Some(layout) = config.layout.as_mut() {
        layout.merchants[0].location = Vec2::new(60.0, 0.0);
    }
    let mut engine = DeliveryEngine::new(config).map_err(|e| e.to_string())?;
    let order = engine
        .spawn_order(0, Vec2::new(60.0, 10.0), 0)
        .ok_or("merchant 0 missing")?;
    engine.assign(0, order, false).map_err(|e| e.to_string())?;

    let step = first_step_with(&mut engine, order, OrderStatus::Cancelled, 60)?;
    let cleared = engine
        .order(order)
        .is_some_and(|o| o.assigned_drone.is_none());
    Ok((step, cleared))
}

// ── 3. Policy Sweeps ────────────────────────────────────────────────────

/// Problems seen in one snapshot; empty when every invariant holds.
fn snapshot_violations(snapshot: &WorldSnapshot) -> Vec<String> {
    let mut problems = Vec::new();
    let mut carriers: BTreeMap<OrderId, usize> = BTreeMap::new();
    for drone in &snapshot.drones {
        if drone.load() > drone.capacity {
            problems.push(format!("drone {} over capacity", drone.id));
        }
        for &id in &drone.cargo {
            *carriers.entry(id).or_default() += 1;
        }
    }
    for order in &snapshot.orders {
        let held = carriers.get(&order.id).copied().unwrap_or(0);
        let expected = usize::from(order.status == OrderStatus::PickedUp);
        if held != expected {
            problems.push(format!(
                "{} order {} held by {} drones",
                order.status.as_str(),
                order.id,
                held
            ));
        }
    }
    problems
}

struct EpisodeRun {
    stats: EpisodeStats,
    violations: Vec<String>,
    fatal: Option<String>,
}

fn run_episode(
    config: SimConfig,
    allocator: &mut impl Allocator,
    source: &mut impl DecisionSource,
) -> EpisodeRun {
    let mut engine = match DeliveryEngine::new(config) {
        Ok(engine) => engine,
        Err(e) => {
            return EpisodeRun {
                stats: EpisodeStats::default(),
                violations: Vec::new(),
                fatal: Some(e.to_string()),
            }
        }
    };
    let mut violations = Vec::new();
    while !engine.is_truncated() {
        let outcome = match run_tick(&mut engine, allocator, source) {
            Ok(outcome) => outcome,
            Err(e) => {
                return EpisodeRun {
                    stats: engine.stats().clone(),
                    violations,
                    fatal: Some(e.to_string()),
                }
            }
        };
        let step = outcome.info.step;
        violations.extend(
            snapshot_violations(&outcome.snapshot)
                .into_iter()
                .map(|p| format!("step {}: {}", step, p)),
        );
        violations.extend(
            engine
                .consistency_issues()
                .into_iter()
                .map(|issue| format!("step {}: {:?}", step, issue)),
        );
    }
    EpisodeRun {
        stats: engine.stats().clone(),
        violations,
        fatal: None,
    }
}

/// Which allocator / decision source pair drives an episode.
#[derive(Debug, Clone, Copy)]
enum Pair {
    GreedyCargo,
    EdfCargo,
    RandomRandom,
    RandomCargo,
    DecisionsOnly,
    EdfItinerary,
    GreedyLegacy,
}

impl Pair {
    const ALL: [Pair; 7] = [
        Pair::GreedyCargo,
        Pair::EdfCargo,
        Pair::RandomRandom,
        Pair::RandomCargo,
        Pair::DecisionsOnly,
        Pair::EdfItinerary,
        Pair::GreedyLegacy,
    ];

    fn name(&self) -> &'static str {
        match self {
            Pair::GreedyCargo => "greedy-cargo",
            Pair::EdfCargo => "edf-cargo",
            Pair::RandomRandom => "random-random",
            Pair::RandomCargo => "random-cargo",
            Pair::DecisionsOnly => "none-cargo",
            Pair::EdfItinerary => "edf-itinerary",
            Pair::GreedyLegacy => "greedy-legacy",
        }
    }

    fn strategy(&self, base: ExecutionStrategy) -> ExecutionStrategy {
        match self {
            Pair::DecisionsOnly => ExecutionStrategy::TaskSelection,
            Pair::EdfItinerary => ExecutionStrategy::Itinerary,
            Pair::GreedyLegacy => ExecutionStrategy::LegacyOnly,
            _ => base,
        }
    }

    /// Random pairs are not expected to deliver anything in particular.
    fn must_deliver(&self) -> bool {
        !matches!(self, Pair::RandomRandom)
    }

    fn run(&self, config: SimConfig, seed: u64) -> EpisodeRun {
        match self {
            Pair::GreedyCargo => run_episode(config, &mut GreedyAllocator, &mut CargoFirstPolicy),
            Pair::EdfCargo => run_episode(config, &mut EdfAllocator, &mut CargoFirstPolicy),
            Pair::RandomRandom => run_episode(
                config,
                &mut RandomAllocator::new(seed),
                &mut RandomPolicy::new(seed.wrapping_add(1)),
            ),
            Pair::RandomCargo => {
                run_episode(config, &mut RandomAllocator::new(seed), &mut CargoFirstPolicy)
            }
            Pair::DecisionsOnly => run_episode(config, &mut NoAllocator, &mut CargoFirstPolicy),
            Pair::EdfItinerary => run_episode(config, &mut EdfAllocator, &mut NoDecisions),
            Pair::GreedyLegacy => run_episode(config, &mut GreedyAllocator, &mut NoDecisions),
        }
    }
}

fn add_stats(total: &mut EpisodeStats, s: &EpisodeStats) {
    total.orders_generated += s.orders_generated;
    total.orders_delivered += s.orders_delivered;
    total.orders_cancelled += s.orders_cancelled;
    total.on_time_deliveries += s.on_time_deliveries;
    total.pickups += s.pickups;
    total.decisions_invalid += s.decisions_invalid;
    total.fallbacks_used += s.fallbacks_used;
    total.repairs.added_to_cargo += s.repairs.added_to_cargo;
    total.repairs.removed_from_cargo += s.repairs.removed_from_cargo;
    total.flight_distance += s.flight_distance;
}

fn validate_policy_sweeps(base: &SimConfig, opts: &Options) -> (Vec<TestResult>, Vec<PairReport>) {
    println!("--- Policy Sweeps ---");
    let mut results = Vec::new();
    let mut reports = Vec::new();

    for pair in Pair::ALL {
        let strategy = pair.strategy(base.strategy);
        let mut total = EpisodeStats::default();
        let mut violations = Vec::new();
        let mut fatal = Vec::new();

        for episode in 0..opts.episodes {
            let seed = base.seed.wrapping_add(episode);
            let config = SimConfig {
                seed,
                strategy,
                ..base.clone()
            };
            let run = pair.run(config, seed);
            add_stats(&mut total, &run.stats);
            violations.extend(run.violations);
            if let Some(e) = run.fatal {
                fatal.push(format!("seed {}: {}", seed, e));
            }
        }

        info!(
            "{}: {} delivered, {} cancelled over {} episodes",
            pair.name(),
            total.orders_delivered,
            total.orders_cancelled,
            opts.episodes
        );
        if opts.verbose {
            println!(
                "  {:14} delivered {:4}  cancelled {:4}  on-time {:5.1}%  distance {:8.1}",
                pair.name(),
                total.orders_delivered,
                total.orders_cancelled,
                total.on_time_rate() * 100.0,
                total.flight_distance
            );
        }

        results.push(TestResult {
            name: format!("{}_no_fatal", pair.name()),
            passed: fatal.is_empty(),
            detail: if fatal.is_empty() {
                format!("{} episodes completed", opts.episodes)
            } else {
                fatal.join("; ")
            },
        });
        results.push(TestResult {
            name: format!("{}_invariants", pair.name()),
            passed: violations.is_empty(),
            detail: match violations.first() {
                None => "every tick consistent".into(),
                Some(first) => format!("{} violations, first: {}", violations.len(), first),
            },
        });
        results.push(TestResult {
            name: format!("{}_no_repairs", pair.name()),
            passed: total.repairs.total() == 0,
            detail: format!("{} cargo repairs", total.repairs.total()),
        });
        if pair.must_deliver() {
            results.push(TestResult {
                name: format!("{}_delivers", pair.name()),
                passed: total.orders_delivered > 0,
                detail: format!(
                    "{} of {} orders delivered",
                    total.orders_delivered, total.orders_generated
                ),
            });
        }

        reports.push(PairReport {
            pair: pair.name().to_string(),
            strategy,
            episodes: opts.episodes,
            delivered: total.orders_delivered,
            cancelled: total.orders_cancelled,
            on_time_rate: total.on_time_rate(),
            completion_rate: total.completion_rate(),
            invalid_decisions: total.decisions_invalid,
            fallbacks: total.fallbacks_used,
            repairs: total.repairs.total(),
        });
    }

    (results, reports)
}

// ── 4. Determinism ──────────────────────────────────────────────────────

fn validate_determinism(base: &SimConfig) -> Vec<TestResult> {
    println!("--- Determinism ---");
    let mut results = Vec::new();

    let replay = |config: SimConfig| -> Option<WorldSnapshot> {
        let seed = config.seed;
        let mut engine = DeliveryEngine::new(config).ok()?;
        let mut allocator = RandomAllocator::new(seed);
        let mut source = RandomPolicy::new(seed);
        for _ in 0..100 {
            run_tick(&mut engine, &mut allocator, &mut source).ok()?;
        }
        Some(engine.snapshot())
    };

    let a = replay(base.clone());
    let b = replay(base.clone());
    results.push(TestResult {
        name: "determinism_same_seed".into(),
        passed: a.is_some() && a == b,
        detail: "two runs with one seed produce identical snapshots".into(),
    });

    let other = replay(SimConfig {
        seed: base.seed.wrapping_add(1000),
        ..base.clone()
    });
    results.push(TestResult {
        name: "determinism_seed_matters".into(),
        passed: other.is_some() && other != a,
        detail: "a different seed produces a different episode".into(),
    });

    results
}

fn write_report(path: &str, reports: &[PairReport]) -> TestResult {
    let written = serde_json::to_string_pretty(reports)
        .map_err(|e| e.to_string())
        .and_then(|json| std::fs::write(path, json).map_err(|e| e.to_string()));
    TestResult {
        name: "report_written".into(),
        passed: written.is_ok(),
        detail: match written {
            Ok(()) => format!("{} pairs written to {}", reports.len(), path),
            Err(e) => format!("{}: {}", path, e),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_defaults() {
        let opts = Options::try_parse_from(["dronesim-simtest"]).unwrap();
        assert!(!opts.verbose);
        assert_eq!(opts.episodes, 3);
        assert!(opts.config_path.is_none());
        assert!(opts.report_path.is_none());
    }

    #[test]
    fn test_options_parse_values() {
        let opts = Options::try_parse_from([
            "dronesim-simtest",
            "--verbose",
            "--episodes",
            "5",
            "--config",
            "fleet.json",
            "--report",
            "out.json",
        ])
        .unwrap();
        assert!(opts.verbose);
        assert_eq!(opts.episodes, 5);
        assert_eq!(opts.config_path.as_deref(), Some("fleet.json"));
        assert_eq!(opts.report_path.as_deref(), Some("out.json"));
    }

    #[test]
    fn test_options_reject_bad_values() {
        assert!(Options::try_parse_from(["dronesim-simtest", "--episodes", "abc"]).is_err());
        assert!(Options::try_parse_from(["dronesim-simtest", "--episodes", "0"]).is_err());
        assert!(Options::try_parse_from(["dronesim-simtest", "--seeds", "4"]).is_err());
    }
}
