//! Benchmark planner throughput and path quality across worker counts.
//!
//!   cargo run --release -p arbor-worlds --bin bench_rewire [millis_per_run]
//!
//! Runs the open square and the narrow corridor for a fixed wall-clock
//! budget per configuration and reports tree size, samples/s, and the best
//! path cost found.

use std::time::Duration;

use arbor_rrt::{LinearIndex, Planner};
use arbor_worlds::{EuclideanSpace, RectWorld};

fn print_header(label: &str) {
    println!("\n{label}");
    println!("{:-<64}", "");
    println!(
        "{:>8} {:>10} {:>12} {:>12} {:>10}",
        "workers", "nodes", "samples/s", "rewires", "cost"
    );
    println!("{:-<64}", "");
}

fn run(label: &str, make_world: impl Fn() -> RectWorld, millis: u64, worker_counts: &[usize]) {
    print_header(label);
    for &workers in worker_counts {
        let mut planner = Planner::new(make_world(), LinearIndex::new(EuclideanSpace));
        planner.set_workers(workers);
        planner.set_range(0.2);
        planner.set_goal_bias(0.05);
        planner
            .add_start([0.1, 0.5])
            .expect("start state must be valid");

        planner
            .solve_for(Duration::from_millis(millis))
            .expect("solve should run");

        let stats = planner.stats();
        let samples_per_sec = stats.iterations as f64 / (millis as f64 / 1000.0);
        let cost = planner
            .solution_cost()
            .map(|c| format!("{c:.4}"))
            .unwrap_or_else(|| "-".into());
        println!(
            "{:>8} {:>10} {:>12.0} {:>12} {:>10}",
            workers,
            planner.size(),
            samples_per_sec,
            stats.rewire_count,
            cost
        );
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .init();

    let args: Vec<String> = std::env::args().collect();
    let millis: u64 = args.get(1).and_then(|s| s.parse().ok()).unwrap_or(1000);

    let worker_counts = [1, 2, 4, 8];

    run(
        &format!("open square, {millis} ms per run"),
        || RectWorld::unit([0.9, 0.5], 0.05).with_goal_sampling(),
        millis,
        &worker_counts,
    );

    run(
        &format!("narrow corridor (0.02 gap), {millis} ms per run"),
        || RectWorld::corridor([0.9, 0.5], 0.05, 0.01).with_goal_sampling(),
        millis,
        &worker_counts,
    );
}
