//! Problem sources: free-format MPS and a small JSON schema.
//!
//! Both produce a `LinearSystem` with objective (`min c·x`), plus an optional
//! starting point (JSON only).
//!
//! MPS conversion:
//! - `E` rows go to `A, b`; `L` rows to `B, d`; `G` rows are negated into `B, d`.
//! - `RANGES` turn a row into two inequalities `lo <= a·x <= hi`.
//! - Variable bounds (default `[0, +inf)`) become rows of `B`, lower before upper.
//! - `OBJSENSE MAX` negates `c`.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{anyhow, bail, ensure, Context, Result};
use circuits::api::LinearSystem;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

/// Parsed problem ready for augmentation.
#[derive(Debug, Clone)]
pub struct Problem {
    pub name: String,
    pub system: LinearSystem,
    pub start: Option<DVector<f64>>,
}

/// Read `.json` via `JsonProblem`, everything else as MPS.
pub fn read_problem<P: AsRef<Path>>(path: P) -> Result<Problem> {
    let path = path.as_ref();
    let text =
        fs::read_to_string(path).with_context(|| format!("reading problem {}", path.display()))?;
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "problem".to_string());
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        let doc: JsonProblem = serde_json::from_str(&text)
            .with_context(|| format!("parsing JSON problem {}", path.display()))?;
        doc.into_problem(stem)
    } else {
        let mps = parse_mps_str(&text)
            .with_context(|| format!("parsing MPS problem {}", path.display()))?;
        let name = if mps.name.is_empty() { stem } else { mps.name.clone() };
        Ok(Problem {
            name,
            system: mps.to_system()?,
            start: None,
        })
    }
}

/// JSON problem file. Matrices are row-major; equalities and start optional.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonProblem {
    #[serde(default)]
    pub name: Option<String>,
    pub objective: Vec<f64>,
    pub ineq_lhs: Vec<Vec<f64>>,
    pub ineq_rhs: Vec<f64>,
    #[serde(default)]
    pub eq_lhs: Vec<Vec<f64>>,
    #[serde(default)]
    pub eq_rhs: Vec<f64>,
    #[serde(default)]
    pub start: Option<Vec<f64>>,
}

impl JsonProblem {
    pub fn into_problem(self, fallback_name: String) -> Result<Problem> {
        let n = self.objective.len();
        ensure!(n > 0, "objective must have at least one entry");
        let b = dense(&self.ineq_lhs, n, "ineq_lhs")?;
        let mut system = LinearSystem::new(b, DVector::from_vec(self.ineq_rhs))?;
        if !self.eq_lhs.is_empty() || !self.eq_rhs.is_empty() {
            let a = dense(&self.eq_lhs, n, "eq_lhs")?;
            system = system.with_equalities(a, DVector::from_vec(self.eq_rhs))?;
        }
        let system = system.with_cost(DVector::from_vec(self.objective))?;
        let start = match self.start {
            Some(x) => {
                ensure!(
                    x.len() == n,
                    "start has length {} but the problem has {n} variables",
                    x.len()
                );
                Some(DVector::from_vec(x))
            }
            None => None,
        };
        Ok(Problem {
            name: self.name.unwrap_or(fallback_name),
            system,
            start,
        })
    }
}

fn dense(rows: &[Vec<f64>], n: usize, what: &str) -> Result<DMatrix<f64>> {
    let mut flat = Vec::with_capacity(rows.len() * n);
    for (i, row) in rows.iter().enumerate() {
        ensure!(
            row.len() == n,
            "{what} row {i} has {} entries, expected {n}",
            row.len()
        );
        flat.extend_from_slice(row);
    }
    Ok(DMatrix::from_row_slice(rows.len(), n, &flat))
}

/// Row kind of a constraint in the ROWS section (objective rows excluded).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKind {
    Eq,
    Le,
    Ge,
}

/// Parsed MPS data before conversion.
#[derive(Debug, Clone, Default)]
pub struct MpsProblem {
    pub name: String,
    /// 1 = minimize, -1 = maximize.
    pub obj_sense: f64,
    pub var_names: Vec<String>,
    pub cost: Vec<f64>,
    pub row_names: Vec<String>,
    pub row_kinds: Vec<RowKind>,
    /// `(row, col, value)`.
    pub coeffs: Vec<(usize, usize, f64)>,
    pub rhs: Vec<f64>,
    pub ranges: Vec<Option<f64>>,
    pub var_lower: Vec<f64>,
    pub var_upper: Vec<f64>,
}

impl MpsProblem {
    #[inline]
    pub fn num_vars(&self) -> usize {
        self.var_names.len()
    }

    /// Row `i` as `(lo, hi)` on `a_i·x`.
    fn row_interval(&self, i: usize) -> (f64, f64) {
        let rhs = self.rhs[i];
        match (self.row_kinds[i], self.ranges[i]) {
            (RowKind::Eq, None) => (rhs, rhs),
            (RowKind::Eq, Some(r)) if r >= 0.0 => (rhs, rhs + r),
            (RowKind::Eq, Some(r)) => (rhs + r, rhs),
            (RowKind::Le, None) => (f64::NEG_INFINITY, rhs),
            (RowKind::Le, Some(r)) => (rhs - r.abs(), rhs),
            (RowKind::Ge, None) => (rhs, f64::INFINITY),
            (RowKind::Ge, Some(r)) => (rhs, rhs + r.abs()),
        }
    }

    pub fn to_system(&self) -> Result<LinearSystem> {
        let n = self.num_vars();
        ensure!(n > 0, "MPS problem has no columns");
        let mut dense_rows = vec![vec![0.0; n]; self.row_names.len()];
        for &(r, c, v) in &self.coeffs {
            dense_rows[r][c] += v;
        }

        let mut ineq: Vec<f64> = Vec::new();
        let mut ineq_rhs: Vec<f64> = Vec::new();
        let mut eq: Vec<f64> = Vec::new();
        let mut eq_rhs: Vec<f64> = Vec::new();
        for (i, row) in dense_rows.iter().enumerate() {
            let (lo, hi) = self.row_interval(i);
            if lo == hi {
                eq.extend_from_slice(row);
                eq_rhs.push(lo);
                continue;
            }
            if hi.is_finite() {
                ineq.extend_from_slice(row);
                ineq_rhs.push(hi);
            }
            if lo.is_finite() {
                ineq.extend(row.iter().map(|v| -v));
                ineq_rhs.push(-lo);
            }
        }
        for j in 0..n {
            if self.var_lower[j].is_finite() {
                let mut row = vec![0.0; n];
                row[j] = -1.0;
                ineq.extend(row);
                ineq_rhs.push(-self.var_lower[j]);
            }
            if self.var_upper[j].is_finite() {
                let mut row = vec![0.0; n];
                row[j] = 1.0;
                ineq.extend(row);
                ineq_rhs.push(self.var_upper[j]);
            }
        }

        let m_b = ineq_rhs.len();
        let m_a = eq_rhs.len();
        let cost = DVector::from_iterator(n, self.cost.iter().map(|c| c * self.obj_sense));
        let system = LinearSystem::new(
            DMatrix::from_row_slice(m_b, n, &ineq),
            DVector::from_vec(ineq_rhs),
        )?
        .with_equalities(DMatrix::from_row_slice(m_a, n, &eq), DVector::from_vec(eq_rhs))?
        .with_cost(cost)?;
        tracing::debug!(name = %self.name, n, m_b, m_a, "mps converted");
        Ok(system)
    }
}

pub fn parse_mps<P: AsRef<Path>>(path: P) -> Result<MpsProblem> {
    let text = fs::read_to_string(path.as_ref())
        .with_context(|| format!("Failed to open MPS file: {:?}", path.as_ref()))?;
    parse_mps_str(&text)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    ObjSense,
    Rows,
    Columns,
    Rhs,
    Ranges,
    Bounds,
}

/// Parse free-format MPS text.
pub fn parse_mps_str(text: &str) -> Result<MpsProblem> {
    let mut p = MpsProblem {
        obj_sense: 1.0,
        ..MpsProblem::default()
    };
    let mut obj_row: Option<String> = None;
    let mut free_rows: Vec<String> = Vec::new();
    let mut row_map: HashMap<String, usize> = HashMap::new();
    let mut var_map: HashMap<String, usize> = HashMap::new();
    let mut section = Section::None;

    for (lineno, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('*') {
            continue;
        }
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let at = || format!("line {}", lineno + 1);

        // Section headers start in column 1.
        if !raw.starts_with(char::is_whitespace) {
            match tokens[0] {
                "NAME" => {
                    p.name = tokens.get(1).copied().unwrap_or_default().to_string();
                    section = Section::None;
                }
                "OBJSENSE" => {
                    section = Section::ObjSense;
                    if let Some(sense) = tokens.get(1) {
                        p.obj_sense = parse_sense(sense).with_context(at)?;
                    }
                }
                "ROWS" => section = Section::Rows,
                "COLUMNS" => section = Section::Columns,
                "RHS" => section = Section::Rhs,
                "RANGES" => section = Section::Ranges,
                "BOUNDS" => section = Section::Bounds,
                "ENDATA" => break,
                other => bail!("{}: unknown section {other}", at()),
            }
            continue;
        }

        match section {
            Section::ObjSense => p.obj_sense = parse_sense(tokens[0]).with_context(at)?,
            Section::Rows => {
                ensure!(tokens.len() >= 2, "{}: ROWS entry needs a type and a name", at());
                let name = tokens[1].to_string();
                let kind = match tokens[0] {
                    "N" => {
                        if obj_row.is_none() {
                            obj_row = Some(name);
                        } else {
                            free_rows.push(name);
                        }
                        continue;
                    }
                    "E" => RowKind::Eq,
                    "L" => RowKind::Le,
                    "G" => RowKind::Ge,
                    other => bail!("{}: unknown row type {other}", at()),
                };
                row_map.insert(name.clone(), p.row_names.len());
                p.row_names.push(name);
                p.row_kinds.push(kind);
                p.rhs.push(0.0);
                p.ranges.push(None);
            }
            Section::Columns => {
                if tokens.iter().any(|t| t.contains("MARKER")) {
                    continue;
                }
                ensure!(
                    tokens.len() >= 3 && tokens.len() % 2 == 1,
                    "{}: COLUMNS entry needs a column and (row, value) pairs",
                    at()
                );
                let col = match var_map.get(tokens[0]) {
                    Some(&c) => c,
                    None => {
                        let c = p.var_names.len();
                        var_map.insert(tokens[0].to_string(), c);
                        p.var_names.push(tokens[0].to_string());
                        p.cost.push(0.0);
                        p.var_lower.push(0.0);
                        p.var_upper.push(f64::INFINITY);
                        c
                    }
                };
                for pair in tokens[1..].chunks(2) {
                    let value = parse_num(pair[1]).with_context(at)?;
                    if obj_row.as_deref() == Some(pair[0]) {
                        p.cost[col] += value;
                    } else if let Some(&r) = row_map.get(pair[0]) {
                        p.coeffs.push((r, col, value));
                    } else if !free_rows.iter().any(|f| f == pair[0]) {
                        bail!("{}: unknown row {}", at(), pair[0]);
                    }
                }
            }
            Section::Rhs | Section::Ranges => {
                // Optional set name: odd token count means it is present.
                let pairs = if tokens.len() % 2 == 1 { &tokens[1..] } else { &tokens[..] };
                for pair in pairs.chunks(2) {
                    ensure!(pair.len() == 2, "{}: dangling entry {}", at(), pair[0]);
                    let value = parse_num(pair[1]).with_context(at)?;
                    if obj_row.as_deref() == Some(pair[0]) || free_rows.iter().any(|f| f == pair[0]) {
                        continue;
                    }
                    let r = *row_map
                        .get(pair[0])
                        .ok_or_else(|| anyhow!("{}: unknown row {}", at(), pair[0]))?;
                    if section == Section::Rhs {
                        p.rhs[r] = value;
                    } else {
                        p.ranges[r] = Some(value);
                    }
                }
            }
            Section::Bounds => {
                let kind = tokens[0];
                let needs_value = matches!(kind, "UP" | "LO" | "FX" | "UI" | "LI");
                let (col_name, value) = match (needs_value, tokens.len()) {
                    (true, 4) => (tokens[2], Some(parse_num(tokens[3]).with_context(at)?)),
                    (true, 3) => (tokens[1], Some(parse_num(tokens[2]).with_context(at)?)),
                    (false, 3) | (false, 4) => (tokens[2], None),
                    (false, 2) => (tokens[1], None),
                    _ => bail!("{}: malformed BOUNDS entry", at()),
                };
                let j = *var_map
                    .get(col_name)
                    .ok_or_else(|| anyhow!("{}: unknown column {col_name}", at()))?;
                let v = value.unwrap_or(0.0);
                match kind {
                    "UP" | "UI" => {
                        p.var_upper[j] = v;
                        if v < 0.0 && p.var_lower[j] == 0.0 {
                            p.var_lower[j] = f64::NEG_INFINITY;
                        }
                    }
                    "LO" | "LI" => p.var_lower[j] = v,
                    "FX" => {
                        p.var_lower[j] = v;
                        p.var_upper[j] = v;
                    }
                    "FR" => {
                        p.var_lower[j] = f64::NEG_INFINITY;
                        p.var_upper[j] = f64::INFINITY;
                    }
                    "MI" => p.var_lower[j] = f64::NEG_INFINITY,
                    "PL" => p.var_upper[j] = f64::INFINITY,
                    "BV" => {
                        p.var_lower[j] = 0.0;
                        p.var_upper[j] = 1.0;
                    }
                    other => bail!("{}: unknown bound type {other}", at()),
                }
            }
            Section::None => bail!("{}: data outside of a section", at()),
        }
    }

    ensure!(obj_row.is_some(), "MPS file has no objective (N) row");
    Ok(p)
}

fn parse_num(tok: &str) -> Result<f64> {
    tok.parse::<f64>()
        .with_context(|| format!("invalid number {tok:?}"))
}

fn parse_sense(tok: &str) -> Result<f64> {
    match tok.to_ascii_uppercase().as_str() {
        "MIN" | "MINIMIZE" => Ok(1.0),
        "MAX" | "MAXIMIZE" => Ok(-1.0),
        other => bail!("unknown objective sense {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const SMALL: &str = "\
NAME          SMALL
* max x + y  ->  min -x - y
OBJSENSE
    MAX
ROWS
 N  COST
 L  CAP
 G  FLOOR
 E  TIE
COLUMNS
    MARKER                 'MARKER'                 'INTORG'
    X         COST         1.0          CAP          1.0
    X         FLOOR        1.0
    Y         COST         1.0          CAP          2.0
    Y         TIE          1.0
    MARKER                 'MARKER'                 'INTEND'
RHS
    RHS       CAP          4.0          FLOOR        1.0
    RHS       TIE          1.5
RANGES
    RNG       CAP          3.0
BOUNDS
 UP BND       X            3.0
 FR BND       Y
ENDATA
";

    #[test]
    fn parses_sections() {
        let p = parse_mps_str(SMALL).unwrap();
        assert_eq!(p.name, "SMALL");
        assert_eq!(p.obj_sense, -1.0);
        assert_eq!(p.var_names, vec!["X", "Y"]);
        assert_eq!(p.row_kinds, vec![RowKind::Le, RowKind::Ge, RowKind::Eq]);
        assert_eq!(p.rhs, vec![4.0, 1.0, 1.5]);
        assert_eq!(p.ranges[0], Some(3.0));
        assert_eq!(p.var_upper[0], 3.0);
        assert_eq!(p.var_lower[1], f64::NEG_INFINITY);
    }

    #[test]
    fn converts_to_documented_matrices() {
        let sys = parse_mps_str(SMALL).unwrap().to_system().unwrap();
        // CAP with range 3 -> 1 <= x + 2y <= 4 (two rows), FLOOR -> -x <= -1,
        // then x >= 0 and x <= 3; y is free.
        let expected_b = DMatrix::from_row_slice(
            5,
            2,
            &[1.0, 2.0, -1.0, -2.0, -1.0, 0.0, -1.0, 0.0, 1.0, 0.0],
        );
        assert_eq!(sys.ineq_lhs(), &expected_b);
        assert_eq!(sys.ineq_rhs(), &DVector::from_vec(vec![4.0, -1.0, -1.0, 0.0, 3.0]));
        assert_eq!(sys.eq_lhs(), &DMatrix::from_row_slice(1, 2, &[0.0, 1.0]));
        assert_eq!(sys.eq_rhs(), &DVector::from_vec(vec![1.5]));
        assert_eq!(sys.cost(), Some(&DVector::from_vec(vec![-1.0, -1.0])));
    }

    #[test]
    fn rejects_unknown_rows_and_missing_objective() {
        let bad = "ROWS\n L  R1\nCOLUMNS\n    X  R2  1.0\nENDATA\n";
        assert!(parse_mps_str(bad).is_err());
        let no_obj = "ROWS\n L  R1\nCOLUMNS\n    X  R1  1.0\nENDATA\n";
        let err = parse_mps_str(no_obj).unwrap_err();
        assert!(err.to_string().contains("objective"));
    }

    #[test]
    fn reads_json_with_start() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("square.json");
        fs::write(
            &path,
            r#"{
                "objective": [-1.0, -1.0],
                "ineq_lhs": [[1.0, 0.0], [0.0, 1.0], [-1.0, 0.0], [0.0, -1.0]],
                "ineq_rhs": [1.0, 1.0, 0.0, 0.0],
                "start": [0.5, 0.5]
            }"#,
        )
        .unwrap();
        let p = read_problem(&path).unwrap();
        assert_eq!(p.name, "square");
        assert_eq!(p.system.num_ineq(), 4);
        assert_eq!(p.system.num_eq(), 0);
        assert_eq!(p.start, Some(DVector::from_vec(vec![0.5, 0.5])));
    }

    #[test]
    fn json_shape_errors_are_reported() {
        let doc = JsonProblem {
            name: None,
            objective: vec![1.0, 2.0],
            ineq_lhs: vec![vec![1.0]],
            ineq_rhs: vec![1.0],
            eq_lhs: Vec::new(),
            eq_rhs: Vec::new(),
            start: None,
        };
        let err = doc.into_problem("x".into()).unwrap_err();
        assert!(err.to_string().contains("ineq_lhs row 0"));
    }

    #[test]
    fn reads_mps_from_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("small.mps");
        fs::write(&path, SMALL).unwrap();
        let p = read_problem(&path).unwrap();
        assert_eq!(p.name, "SMALL");
        assert!(p.start.is_none());
        assert_eq!(parse_mps(&path).unwrap().num_vars(), 2);
    }
}
