use anyhow::{anyhow, Result};
use serde::Serialize;
use std::time::Instant;

use crate::handlers::state::{get, put, PlainState, State};
use crate::runtime::{self, handle_with, RuntimeStats};

pub struct BenchmarkParams {
    /// Number of `put(get() + 1)` rounds
    pub iterations: u64,
    /// Answer commands in place instead of through resumptions
    pub plain: bool,
}

#[derive(Debug, Serialize)]
pub struct BenchmarkReport {
    pub mode: &'static str,
    pub iterations: u64,
    pub commands: u64,
    pub final_state: u64,
    pub total_duration_ms: f64,
    pub ns_per_command: f64,
    pub stats: RuntimeStats,
}

/// Count up through the state handler and time it
pub fn run_benchmark(params: BenchmarkParams) -> Result<BenchmarkReport> {
    if params.iterations == 0 {
        return Err(anyhow!("iterations must be greater than 0"));
    }

    let iterations = params.iterations;
    let body = move || {
        for _ in 0..iterations {
            put(get::<u64>() + 1);
        }
    };

    let start = Instant::now();
    let final_state = if params.plain {
        let state = std::sync::Arc::new(PlainState::<u64, ()>::new(0));
        handle_with(state.clone(), body);
        state.current()
    } else {
        let state = std::sync::Arc::new(State::<u64, ()>::new(0));
        handle_with(state.clone(), body);
        state.current()
    };
    let elapsed = start.elapsed();

    if final_state != iterations {
        return Err(anyhow!(
            "state handler counted to {}, expected {}",
            final_state,
            iterations
        ));
    }

    let commands = iterations * 2;
    let report = BenchmarkReport {
        mode: if params.plain { "plain" } else { "tail-resume" },
        iterations,
        commands,
        final_state,
        total_duration_ms: elapsed.as_secs_f64() * 1000.0,
        ns_per_command: elapsed.as_nanos() as f64 / commands as f64,
        stats: runtime::stats(),
    };

    tracing::info!(
        mode = report.mode,
        iterations,
        ns_per_command = report.ns_per_command,
        "benchmark finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_benchmark_counts() {
        let report = run_benchmark(BenchmarkParams {
            iterations: 500,
            plain: true,
        })
        .unwrap();

        assert_eq!(report.final_state, 500);
        assert_eq!(report.commands, 1000);
        assert_eq!(report.stats.stack_depth, 0);
    }

    #[test]
    fn test_zero_iterations_rejected() {
        let result = run_benchmark(BenchmarkParams {
            iterations: 0,
            plain: false,
        });
        assert!(result.is_err());
    }
}
