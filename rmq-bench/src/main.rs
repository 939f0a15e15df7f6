//! # Facade Benchmark Harness
//!
//! Purpose: Drive the store facade with a repeatable queue-shaped workload
//! (push, pop-push, remove, set bookkeeping) so throughput can be compared
//! across backends.
//!
//! Usage: `rmq-bench [config.json|memory] [ops] [keys]`
//!
//! Without a config file the in-process `MemoryBackend` is used.

use std::env;
use std::hint::black_box;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use rmq_client::ClientConfig;
use rmq_common::StoreBackend;
use rmq_engine::MemoryBackend;
use rmq_store::Facade;

const DEFAULT_OP_COUNT: usize = 100_000;
const DEFAULT_KEY_COUNT: usize = 64;
const MEMORY_TARGET: &str = "memory";

struct BenchConfig {
    target: String,
    op_count: usize,
    key_count: usize,
}

impl BenchConfig {
    fn from_args() -> Self {
        let mut args = env::args().skip(1);
        let target = args.next().unwrap_or_else(|| MEMORY_TARGET.to_string());
        let op_count = parse_usize(args.next(), DEFAULT_OP_COUNT);
        let key_count = parse_usize(args.next(), DEFAULT_KEY_COUNT).max(1);

        BenchConfig {
            target,
            op_count,
            key_count,
        }
    }
}

fn parse_usize(value: Option<String>, fallback: usize) -> usize {
    value.and_then(|raw| raw.parse().ok()).unwrap_or(fallback)
}

/// Tiny deterministic PRNG so runs are reproducible.
struct XorShift64 {
    state: u64,
}

impl XorShift64 {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    #[inline]
    fn next_index(&mut self, len: usize) -> usize {
        (self.next_u64() % len as u64) as usize
    }
}

/// Counts calls that came back not-ok.
#[derive(Default)]
struct Tally {
    ops: usize,
    not_ok: usize,
}

impl Tally {
    #[inline]
    fn record(&mut self, ok: bool) {
        self.ops += 1;
        if !ok {
            self.not_ok += 1;
        }
    }
}

fn report(label: &str, tally: &Tally, elapsed: Duration) {
    let secs = elapsed.as_secs_f64().max(f64::EPSILON);
    let ops = tally.ops.max(1) as f64;
    let ops_per_sec = ops / secs;
    let micros_per_op = (secs * 1e6) / ops;
    println!(
        "{label}: {} ops in {secs:.3}s ({ops_per_sec:.0} ops/s, {micros_per_op:.2} us/op, {} not ok)",
        tally.ops, tally.not_ok
    );
}

fn open_backend(target: &str) -> Result<Box<dyn StoreBackend>> {
    if target == MEMORY_TARGET {
        return Ok(Box::new(MemoryBackend::new()));
    }
    let config = ClientConfig::from_json_file(target)
        .with_context(|| format!("loading client config from {target}"))?;
    info!(topology = ?config.topology, nodes = ?config.nodes, "connecting");
    rmq_client::connect(&config).context("connecting to store")
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(err) = run() {
        eprintln!("rmq-bench failed: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let config = BenchConfig::from_args();
    let facade = Facade::new(open_backend(&config.target)?);

    let queues: Vec<String> = (0..config.key_count)
        .map(|idx| format!("{{bench:{idx}}}:ready"))
        .collect();
    let unacked: Vec<String> = (0..config.key_count)
        .map(|idx| format!("{{bench:{idx}}}:unacked"))
        .collect();
    let payloads: Vec<String> = (0..config.key_count)
        .map(|idx| format!("payload-{idx:08}"))
        .collect();

    facade.flush_database();
    println!(
        "target={}, ops={}, queues={}",
        config.target, config.op_count, config.key_count
    );

    let mut rng = XorShift64::new(0x1234_5678_9ABC_DEF0);
    let mut tally = Tally::default();
    let start = Instant::now();
    for _ in 0..config.op_count {
        let idx = rng.next_index(config.key_count);
        tally.record(facade.list_push(&queues[idx], &payloads[idx]));
    }
    report("LIST_PUSH", &tally, start.elapsed());

    let mut rng = XorShift64::new(0x0FED_CBA9_8765_4321);
    let mut tally = Tally::default();
    let start = Instant::now();
    for _ in 0..config.op_count {
        let idx = rng.next_index(config.key_count);
        let moved = facade.list_pop_push(&queues[idx], &unacked[idx]);
        tally.record(moved.is_some());
        black_box(moved);
    }
    report("LIST_POP_PUSH", &tally, start.elapsed());

    let mut tally = Tally::default();
    let start = Instant::now();
    for idx in 0..config.key_count {
        while let Some(removed) = facade.list_remove(&unacked[idx], 1, &payloads[idx]) {
            tally.record(true);
            if removed == 0 {
                break;
            }
        }
    }
    report("LIST_REMOVE", &tally, start.elapsed());

    let mut rng = XorShift64::new(0xA5A5_A5A5_A5A5_A5A5);
    let mut tally = Tally::default();
    let start = Instant::now();
    for _ in 0..config.op_count {
        let idx = rng.next_index(config.key_count);
        tally.record(facade.set_add("bench:consumers", &payloads[idx]));
    }
    let members = facade.set_members("bench:consumers");
    tally.record(!members.is_empty());
    report("SET_ADD", &tally, start.elapsed());

    let mut rng = XorShift64::new(0x5A5A_5A5A_5A5A_5A5A);
    let mut tally = Tally::default();
    let start = Instant::now();
    for _ in 0..config.op_count {
        let idx = rng.next_index(config.key_count);
        let key = &queues[idx];
        tally.record(facade.set_string(key, &payloads[idx], Duration::from_secs(60)));
        tally.record(facade.get_ttl(key).is_some());
        tally.record(facade.delete_key(key).is_some());
    }
    report("STRING_TTL_DELETE", &tally, start.elapsed());

    facade.flush_database();
    Ok(())
}
