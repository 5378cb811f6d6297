use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use circuits::api::{
    AugmentCfg, AugmentResult, AugmentationDriver, CircuitPolytope, LinearSystem, Method,
    PartitionPolytope, Polyhedron, Spindle,
};
use clap::{Args, Parser, Subcommand};
use nalgebra::DVector;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};
use tracing_subscriber::fmt::SubscriberBuilder;

mod output;
mod problem_io;
mod provenance;

use provenance::Payload;

#[derive(Parser)]
#[command(name = "circuits")]
#[command(about = "Steepest-descent circuit augmentation for linear programs")]
struct Cmd {
    /// Optional VK ticket UUID; propagated to outputs and logs
    #[arg(long, global = true)]
    vk: Option<String>,

    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand)]
enum Action {
    /// Solve an LP read from an MPS or JSON file
    Solve {
        #[arg(long)]
        input: PathBuf,
        #[command(flatten)]
        run: RunArgs,
    },
    /// Solve the built-in three-variable example
    Demo {
        #[command(flatten)]
        run: RunArgs,
    },
    /// Clustering LP relaxation over `items` with cluster size bounds
    Partition {
        #[arg(long)]
        items: usize,
        /// Comma-separated lower bounds, one per cluster
        #[arg(long, value_delimiter = ',')]
        lower: Vec<usize>,
        /// Comma-separated upper bounds, one per cluster
        #[arg(long, value_delimiter = ',')]
        upper: Vec<usize>,
        /// Seed for the random integer cost in [-10, 10]
        #[arg(long, default_value_t = 0)]
        seed: u64,
        #[command(flatten)]
        run: RunArgs,
    },
    /// Random spindle started at its degenerate apex
    Spindle {
        #[arg(long)]
        dim: usize,
        #[arg(long)]
        cone_facets: usize,
        #[arg(long, default_value_t = 0)]
        parallel_facets: usize,
        #[arg(long, default_value_t = 0)]
        seed: u64,
        #[command(flatten)]
        run: RunArgs,
    },
    /// Print a small provenance JSON block
    Report,
}

/// Options shared by every solving subcommand.
#[derive(Args, Clone, Debug)]
struct RunArgs {
    /// Result JSON path; a provenance sidecar is written next to it
    #[arg(long)]
    out: PathBuf,
    /// Optional per-iteration trace (.parquet or .csv)
    #[arg(long)]
    trace: Option<PathBuf>,
    /// Direction subproblem method: primal, dual or auto
    #[arg(long, default_value = "dual")]
    method: String,
    /// Wall-clock budget in seconds
    #[arg(long)]
    max_time: Option<f64>,
    /// Log progress every N iterations (0 disables)
    #[arg(long, default_value_t = 20)]
    log_every: usize,
    /// Log every direction solve at info level
    #[arg(long)]
    verbose: bool,
    /// Skip the one-shot LP solve used for comparison
    #[arg(long)]
    no_baseline: bool,
}

impl RunArgs {
    fn cfg(&self) -> Result<AugmentCfg> {
        let method: Method = self.method.parse()?;
        let mut cfg = AugmentCfg::default().with_method(method);
        cfg.log_every = self.log_every;
        cfg.verbose = self.verbose;
        if let Some(secs) = self.max_time {
            let limit = Duration::try_from_secs_f64(secs)
                .map_err(|e| anyhow!("invalid --max-time {secs}: {e}"))?;
            cfg = cfg.with_max_time(limit);
        }
        Ok(cfg)
    }

    fn params(&self) -> Value {
        json!({
            "method": self.method,
            "max_time": self.max_time,
            "log_every": self.log_every,
            "baseline": !self.no_baseline,
        })
    }
}

fn main() -> Result<()> {
    SubscriberBuilder::default().with_target(false).init();
    let cmd = Cmd::parse();
    let vk = cmd.vk.as_deref();
    match cmd.action {
        Action::Solve { input, run } => solve(&input, &run, vk).map(drop),
        Action::Demo { run } => demo(&run, vk).map(drop),
        Action::Partition {
            items,
            lower,
            upper,
            seed,
            run,
        } => partition(items, lower, upper, seed, &run, vk).map(drop),
        Action::Spindle {
            dim,
            cone_facets,
            parallel_facets,
            seed,
            run,
        } => spindle(dim, cone_facets, parallel_facets, seed, &run, vk).map(drop),
        Action::Report => report(vk),
    }
}

fn solve(input: &std::path::Path, run: &RunArgs, vk: Option<&str>) -> Result<AugmentResult> {
    tracing::info!(input = %input.display(), vk = ?vk, "solve");
    let problem = problem_io::read_problem(input)?;
    let poly = Polyhedron::new(problem.system);
    let params = json!({ "input": input.to_string_lossy(), "problem": problem.name });
    execute(&problem.name, &poly, problem.start, run, params, vk)
}

fn demo(run: &RunArgs, vk: Option<&str>) -> Result<AugmentResult> {
    tracing::info!(vk = ?vk, "demo");
    let poly = Polyhedron::new(demo_system()?);
    let start = DVector::zeros(3);
    execute("demo", &poly, Some(start), run, json!({}), vk)
}

fn partition(
    items: usize,
    lower: Vec<usize>,
    upper: Vec<usize>,
    seed: u64,
    run: &RunArgs,
    vk: Option<&str>,
) -> Result<AugmentResult> {
    tracing::info!(items, ?lower, ?upper, seed, vk = ?vk, "partition");
    let params = json!({ "items": items, "lower": lower, "upper": upper, "seed": seed });
    let poly = PartitionPolytope::new(items, lower, upper)?;
    let mut rng = StdRng::seed_from_u64(seed);
    let cost = DVector::from_iterator(
        poly.num_vars(),
        (0..poly.num_vars()).map(|_| f64::from(rng.gen_range(-10i32..=10))),
    );
    let poly = poly.with_cost(cost)?;
    execute("partition", &poly, None, run, params, vk)
}

fn spindle(
    dim: usize,
    cone_facets: usize,
    parallel_facets: usize,
    seed: u64,
    run: &RunArgs,
    vk: Option<&str>,
) -> Result<AugmentResult> {
    tracing::info!(dim, cone_facets, parallel_facets, seed, vk = ?vk, "spindle");
    let params = json!({
        "dim": dim,
        "cone_facets": cone_facets,
        "parallel_facets": parallel_facets,
        "seed": seed,
    });
    let poly = Spindle::new(dim, cone_facets, parallel_facets, seed)?;
    execute("spindle", &poly, None, run, params, vk)
}

/// Find a start if none is given, run the baseline and the augmentation,
/// then persist the result, the optional trace and the provenance sidecar.
fn execute<P: CircuitPolytope>(
    label: &str,
    poly: &P,
    start: Option<DVector<f64>>,
    run: &RunArgs,
    mut params: Value,
    vk: Option<&str>,
) -> Result<AugmentResult> {
    let cfg = run.cfg()?;
    let x0 = match start {
        Some(x) => x,
        None => poly
            .find_feasible_solution()
            .context("finding a feasible starting point")?,
    };

    let baseline = if run.no_baseline {
        None
    } else {
        let outcome = poly.solve_lp(cfg.method).context("baseline LP solve")?;
        tracing::info!(
            status = %outcome.status,
            objective = outcome.objective,
            secs = outcome.wall_time.as_secs_f64(),
            "baseline"
        );
        Some(outcome)
    };

    let res = AugmentationDriver::new(poly, cfg).run_recorded(&x0);
    println!("{res}");

    output::write_json(&run.out, &output::result_json(label, &res, baseline.as_ref()))?;
    if let Value::Object(map) = &mut params {
        map.insert("run".to_string(), run.params());
    }
    let mut payload = Payload::new(params).with_vk(vk);
    if let Some(trace) = &run.trace {
        output::write_trace(trace, &res, poly.system(), poly.eps())?;
        payload = payload.with_output(trace);
    }
    let sidecar = provenance::write_sidecar(&run.out, payload)?;
    tracing::info!(out = %run.out.display(), sidecar = %sidecar.display(), status = %res.status, "done");
    Ok(res)
}

/// `min -8x - y - 5z` over six facets; optimum -46 at (0, -4, 10).
fn demo_system() -> Result<LinearSystem> {
    let system = LinearSystem::from_rows(
        &[
            [-1.0, 0.0, 0.0],
            [0.0, 0.0, -1.0],
            [0.0, -1.0, -1.0],
            [0.0, -1.0, 0.0],
            [2.0, 1.0, 1.0],
            [3.0, 3.0, -1.0],
        ],
        &[0.0, 0.0, 2.0, 4.0, 6.0, 8.0],
    )?
    .with_cost(DVector::from_vec(vec![-8.0, -1.0, -5.0]))?;
    Ok(system)
}

fn report(vk: Option<&str>) -> Result<()> {
    let obj = json!({
        "code_rev": provenance::current_git_rev(),
        "circuits_version": circuits::VERSION,
        "vk": vk,
        "params": {},
        "outputs": []
    });
    println!("{}", serde_json::to_string_pretty(&obj)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use circuits::api::Status;
    use std::fs;
    use tempfile::tempdir;

    fn run_args(out: PathBuf) -> RunArgs {
        RunArgs {
            out,
            trace: None,
            method: "dual".into(),
            max_time: None,
            log_every: 0,
            verbose: false,
            no_baseline: false,
        }
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cmd::command().debug_assert();
    }

    #[test]
    fn parses_partition_bounds() {
        let cmd = Cmd::try_parse_from([
            "circuits", "--vk", "abc", "partition", "--items", "5", "--lower", "2,1",
            "--upper", "3,4", "--out", "r.json",
        ])
        .unwrap();
        assert_eq!(cmd.vk.as_deref(), Some("abc"));
        match cmd.action {
            Action::Partition { items, lower, upper, .. } => {
                assert_eq!(items, 5);
                assert_eq!(lower, vec![2, 1]);
                assert_eq!(upper, vec![3, 4]);
            }
            _ => panic!("expected partition"),
        }
    }

    #[test]
    fn demo_writes_result_trace_and_sidecar() {
        let dir = tempdir().unwrap();
        let mut run = run_args(dir.path().join("demo.json"));
        run.trace = Some(dir.path().join("demo_trace.csv"));
        let res = demo(&run, Some("ticket")).unwrap();
        assert_eq!(res.status, Status::Optimal);

        let doc: Value = serde_json::from_slice(&fs::read(&run.out).unwrap()).unwrap();
        assert_eq!(doc["status"], "optimal");
        assert!((doc["objective"].as_f64().unwrap() + 46.0).abs() < 1e-6);
        assert!((doc["baseline"]["objective"].as_f64().unwrap() + 46.0).abs() < 1e-6);

        let sidecar = dir.path().join("demo.provenance.json");
        let prov: Value = serde_json::from_slice(&fs::read(sidecar).unwrap()).unwrap();
        assert_eq!(prov["vk"], "ticket");
        assert_eq!(prov["params"]["run"]["method"], "dual");
        assert_eq!(prov["outputs"].as_array().unwrap().len(), 2);
        assert!(run.trace.as_ref().unwrap().exists());
    }

    #[test]
    fn solve_reads_json_problem_without_start() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("box.json");
        fs::write(
            &input,
            r#"{"objective": [1.0, -2.0],
                "ineq_lhs": [[1.0, 0.0], [-1.0, 0.0], [0.0, 1.0], [0.0, -1.0]],
                "ineq_rhs": [3.0, 1.0, 2.0, 0.0]}"#,
        )
        .unwrap();
        let run = run_args(dir.path().join("box_result.json"));
        let res = solve(&input, &run, None).unwrap();
        assert_eq!(res.status, Status::Optimal);
        assert!((res.objective + 5.0).abs() < 1e-6);
    }

    #[test]
    fn bad_method_and_budget_are_rejected() {
        let dir = tempdir().unwrap();
        let mut run = run_args(dir.path().join("x.json"));
        run.method = "barrier".into();
        assert!(demo(&run, None).is_err());
        run.method = "primal".into();
        run.max_time = Some(-1.0);
        assert!(demo(&run, None).is_err());
    }

    #[test]
    fn spindle_and_partition_runs_complete() {
        let dir = tempdir().unwrap();
        let run = run_args(dir.path().join("spindle.json"));
        let res = spindle(3, 5, 1, 2, &run, None).unwrap();
        assert!(matches!(res.status, Status::Optimal | Status::Unbounded));

        let run = run_args(dir.path().join("partition.json"));
        let res = partition(4, vec![1, 1], vec![3, 3], 7, &run, None).unwrap();
        assert_eq!(res.status, Status::Optimal);
    }
}
