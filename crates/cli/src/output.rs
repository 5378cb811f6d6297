//! Result documents and per-iteration trace tables.

use std::fs::File;
use std::path::Path;

use anyhow::{bail, Context, Result};
use circuits::api::{normalized_circuit, AugmentResult, LinearSystem, LpOutcome, Status};
use polars::prelude::*;
use serde_json::{json, Value};

use crate::provenance::ensure_parent;

/// Summary document for one run. Non-finite numbers serialize as `null`.
pub fn result_json(problem: &str, res: &AugmentResult, baseline: Option<&LpOutcome>) -> Value {
    let error = match &res.status {
        Status::Error(msg) => Some(msg.clone()),
        _ => None,
    };
    json!({
        "problem": problem,
        "status": res.status.as_str(),
        "error": error,
        "objective": res.objective,
        "point": res.point.as_slice(),
        "certificate": res.certificate.as_ref().map(|c| c.as_slice().to_vec()),
        "iterations": res.iterations(),
        "degenerate_steps": res.degenerate_steps(),
        "longest_degenerate_streak": res.longest_degenerate_streak(),
        "build_secs": res.build_time.as_secs_f64(),
        "lp_secs": res.lp_time().as_secs_f64(),
        "total_secs": res.total_time.as_secs_f64(),
        "baseline": baseline.map(|b| json!({
            "status": b.status.to_string(),
            "objective": b.objective,
            "secs": b.wall_time.as_secs_f64(),
        })),
    })
}

pub fn write_json(path: &Path, doc: &Value) -> Result<()> {
    ensure_parent(path)?;
    std::fs::write(path, serde_json::to_vec_pretty(doc)?)
        .with_context(|| format!("writing {}", path.display()))
}

/// One row per iteration. `circuit` is the integer-normalized direction.
pub fn trace_frame(res: &AugmentResult, system: &LinearSystem, eps: f64) -> PolarsResult<DataFrame> {
    let t = &res.trace;
    let circuit: Vec<String> = t
        .iter()
        .map(|r| {
            let g = normalized_circuit(system, &r.circuit, eps);
            let parts: Vec<String> = g.iter().map(|v| format!("{v}")).collect();
            format!("[{}]", parts.join(", "))
        })
        .collect();
    df!(
        "iter" => t.iter().map(|r| r.index as u64).collect::<Vec<_>>(),
        "steepness" => t.iter().map(|r| r.steepness).collect::<Vec<_>>(),
        "step" => t.iter().map(|r| r.step).collect::<Vec<_>>(),
        "objective" => t.iter().map(|r| r.objective).collect::<Vec<_>>(),
        "degenerate" => t.iter().map(|r| r.degenerate).collect::<Vec<_>>(),
        "active_count" => t.iter().map(|r| r.active_count as u64).collect::<Vec<_>>(),
        "lp_secs" => t.iter().map(|r| r.lp_time.as_secs_f64()).collect::<Vec<_>>(),
        "step_secs" => t.iter().map(|r| r.step_time.as_secs_f64()).collect::<Vec<_>>(),
        "lp_iterations" => t.iter().map(|r| r.lp_iterations.map(|k| k as u64)).collect::<Vec<_>>(),
        "bound_updates" => t.iter().map(|r| r.bound_updates as u64).collect::<Vec<_>>(),
        "circuit" => circuit,
    )
}

/// Write the trace as parquet or csv, chosen by extension.
pub fn write_trace(path: &Path, res: &AugmentResult, system: &LinearSystem, eps: f64) -> Result<()> {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    if ext != "parquet" && ext != "csv" {
        bail!("unsupported trace format {ext:?} (use .parquet or .csv)");
    }
    let mut df = trace_frame(res, system, eps)?;
    ensure_parent(path)?;
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    if ext == "parquet" {
        ParquetWriter::new(file).finish(&mut df)?;
    } else {
        CsvWriter::new(file).finish(&mut df)?;
    }
    tracing::info!(path = %path.display(), rows = df.height(), "trace written");
    Ok(())
}
