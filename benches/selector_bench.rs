// Test selection benchmark
// Measures resolving a mixed query over a large test universe, compiling the
// query once versus once per resolution.
// Target: compiled p95 < 20ms for 10k test ids

use rustjudge::selector::{resolve, Matcher, TestQuery};
use std::collections::HashSet;
use std::time::{Duration, Instant};

/// Benchmark configuration
const ITERATIONS: usize = 200;
const WARMUP_ITERATIONS: usize = 20;
const GROUPS: usize = 100;
const TESTS_PER_GROUP: usize = 100;

/// Latency percentiles
struct LatencyStats {
    p50: Duration,
    p95: Duration,
    p99: Duration,
    min: Duration,
    max: Duration,
    mean: Duration,
}

impl LatencyStats {
    fn from_samples(mut samples: Vec<Duration>) -> Self {
        samples.sort();
        let len = samples.len();

        let p50_idx = (len as f64 * 0.50) as usize;
        let p95_idx = (len as f64 * 0.95) as usize;
        let p99_idx = (len as f64 * 0.99) as usize;

        let sum: Duration = samples.iter().sum();
        let mean = sum / len as u32;

        Self {
            p50: samples[p50_idx],
            p95: samples[p95_idx],
            p99: samples[p99_idx],
            min: samples[0],
            max: samples[len - 1],
            mean,
        }
    }

    fn print(&self, label: &str) {
        println!("\n{}", label);
        println!("  p50: {:?}", self.p50);
        println!("  p95: {:?}", self.p95);
        println!("  p99: {:?}", self.p99);
        println!("  min: {:?}", self.min);
        println!("  max: {:?}", self.max);
        println!("  mean: {:?}", self.mean);
    }
}

/// Test ids shaped like `g07/t0042` plus a few samples
fn universe() -> HashSet<String> {
    let mut ids = HashSet::with_capacity(GROUPS * TESTS_PER_GROUP + 3);
    for group in 0..GROUPS {
        for test in 0..TESTS_PER_GROUP {
            ids.insert(format!("g{:02}/t{:04}", group, test));
        }
    }
    for sample in ["sample1", "sample2", "Sample3"] {
        ids.insert(sample.to_string());
    }
    ids
}

fn query() -> TestQuery {
    TestQuery::AnyOf(vec![
        TestQuery::wildcard("SAMPLE*", true),
        TestQuery::regex(r"g(0[0-9])/t00[0-4][0-9]", false),
        TestQuery::id("g99/t0099"),
    ])
}

fn measure(mut run: impl FnMut() -> usize) -> (LatencyStats, usize) {
    for _ in 0..WARMUP_ITERATIONS {
        run();
    }

    let mut samples = Vec::with_capacity(ITERATIONS);
    let mut selected = 0;
    for _ in 0..ITERATIONS {
        let start = Instant::now();
        selected = run();
        samples.push(start.elapsed());
    }
    (LatencyStats::from_samples(samples), selected)
}

fn main() {
    println!("=== Test Selection Benchmark ===");
    println!("Iterations: {} (after {} warmup)", ITERATIONS, WARMUP_ITERATIONS);

    let universe = universe();
    let query = query();
    println!("Universe: {} test ids", universe.len());

    let (per_call, per_call_selected) = measure(|| match resolve(&query, &universe) {
        Ok(selected) => selected.len(),
        Err(e) => panic!("query failed to compile: {}", e),
    });
    per_call.print("Compile per resolution");

    let matcher = match Matcher::compile(&query) {
        Ok(matcher) => matcher,
        Err(e) => panic!("query failed to compile: {}", e),
    };
    let (compiled, compiled_selected) = measure(|| matcher.select(&universe).len());
    compiled.print("Compiled once");

    println!("\n=== Summary ===");
    println!("Selected {} tests", compiled_selected);
    if per_call_selected != compiled_selected {
        println!("❌ Selections differ: {} vs {}", per_call_selected, compiled_selected);
        std::process::exit(1);
    }

    if compiled.p95 < Duration::from_millis(20) {
        println!("✅ Selection budget met");
        std::process::exit(0);
    } else {
        println!("❌ p95={:?} (target <20ms)", compiled.p95);
        std::process::exit(1);
    }
}
