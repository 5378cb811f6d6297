use std::time::Duration;

use nalgebra::{DMatrix, DVector};
use proptest::prelude::*;

use super::*;
use crate::lp::Method;
use crate::polyhedron::{LinearSystem, Polyhedron};

fn dv(v: &[f64]) -> DVector<f64> {
    DVector::from_column_slice(v)
}

fn scenario() -> Polyhedron {
    let sys = LinearSystem::from_rows(
        &[
            [-1.0, 0.0, 0.0],
            [0.0, 0.0, -1.0],
            [0.0, -1.0, -1.0],
            [0.0, -1.0, 0.0],
            [2.0, 1.0, 1.0],
            [3.0, 3.0, -1.0],
        ],
        &[0.0, 0.0, 2.0, 4.0, 6.0, 8.0],
    )
    .unwrap()
    .with_cost(dv(&[-8.0, -1.0, -5.0]))
    .unwrap();
    Polyhedron::new(sys)
}

fn assert_monotone(res: &AugmentResult, start: f64) {
    let mut prev = start;
    for r in &res.trace {
        assert!(
            r.objective <= prev + 1e-7,
            "objective rose at step {}: {} -> {}",
            r.index,
            prev,
            r.objective
        );
        if r.step.is_finite() && r.step * -r.steepness > 1e-9 {
            assert!(r.objective < prev, "positive step without descent");
        }
        prev = r.objective;
    }
}

#[test]
fn scenario_reaches_baseline() {
    let p = scenario();
    let x0 = dv(&[0.0, 0.0, 0.0]);
    let res = steepest_descent(&p, &x0, AugmentCfg::default()).unwrap();
    assert_eq!(res.status, Status::Optimal);
    assert!((res.objective + 46.0).abs() < 1e-6, "objective {}", res.objective);
    assert!((&res.point - dv(&[0.0, -4.0, 10.0])).norm() < 1e-6);
    assert!(res.certificate.is_none());
    assert!(!res.trace.is_empty());
    assert_monotone(&res, 0.0);

    let baseline = p.solve_lp(Method::Primal).unwrap();
    assert!((baseline.objective - res.objective).abs() < 1e-6);
}

#[test]
fn primal_and_dual_runs_agree() {
    let p = scenario();
    let x0 = dv(&[0.0, 0.0, 0.0]);
    let dual = steepest_descent(&p, &x0, AugmentCfg::default()).unwrap();
    let primal =
        steepest_descent(&p, &x0, AugmentCfg::default().with_method(Method::Primal)).unwrap();
    assert_eq!(primal.status, Status::Optimal);
    assert!((dual.objective - primal.objective).abs() < 1e-6);
    assert!(primal.trace.iter().all(|r| r.bound_updates == 0));
}

#[test]
fn unbounded_quadrant_returns_certificate() {
    let sys = LinearSystem::from_rows(&[[-1.0, 0.0], [0.0, -1.0]], &[0.0, 0.0])
        .unwrap()
        .with_cost(dv(&[-1.0, 0.0]))
        .unwrap();
    let p = Polyhedron::new(sys);
    let res = steepest_descent(&p, &dv(&[0.0, 0.0]), AugmentCfg::default()).unwrap();
    assert_eq!(res.status, Status::Unbounded);
    let ray = res.certificate.clone().unwrap();
    assert!((&ray - dv(&[1.0, 0.0])).norm() < 1e-7);
    assert!(p.system().objective_value(&ray) < 0.0);
    assert!(res.trace.last().unwrap().step.is_infinite());
    assert!(res.to_string().contains("unbounded circuit"));
}

#[test]
fn degenerate_apex_terminates() {
    // Square pyramid: |x| <= z, |y| <= z, z <= 1; four facets meet at 0.
    let sys = LinearSystem::from_rows(
        &[
            [1.0, 0.0, -1.0],
            [-1.0, 0.0, -1.0],
            [0.0, 1.0, -1.0],
            [0.0, -1.0, -1.0],
            [0.0, 0.0, 1.0],
        ],
        &[0.0, 0.0, 0.0, 0.0, 1.0],
    )
    .unwrap()
    .with_cost(dv(&[-1.0, -2.0, -3.0]))
    .unwrap();
    let p = Polyhedron::new(sys);
    let res = steepest_descent(&p, &dv(&[0.0, 0.0, 0.0]), AugmentCfg::default()).unwrap();
    assert_eq!(res.status, Status::Optimal);
    assert!((res.objective + 6.0).abs() < 1e-6);
    assert!(res.longest_degenerate_streak() <= 5);
    assert_monotone(&res, 0.0);
}

#[test]
fn zero_budget_times_out_at_start() {
    let p = scenario();
    let x0 = dv(&[0.0, 0.0, 0.0]);
    let cfg = AugmentCfg::default().with_max_time(Duration::ZERO);
    let res = steepest_descent(&p, &x0, cfg).unwrap();
    assert_eq!(res.status, Status::Timeout);
    assert_eq!(res.point, x0);
    assert!(res.trace.is_empty());
}

/// Cube `[-1, 1]^n` with cost `-(j + 1)`; from the centre the walk fixes one
/// coordinate per step, largest cost first.
fn cube(n: usize) -> Polyhedron {
    let mut rows: Vec<Vec<f64>> = Vec::with_capacity(2 * n);
    for j in 0..n {
        let mut e = vec![0.0; n];
        e[j] = 1.0;
        rows.push(e.clone());
        e[j] = -1.0;
        rows.push(e);
    }
    let sys = LinearSystem::from_rows(&rows, &vec![1.0; 2 * n])
        .unwrap()
        .with_cost(DVector::from_fn(n, |j, _| -((j + 1) as f64)))
        .unwrap();
    Polyhedron::new(sys)
}

#[test]
fn timeout_mid_run_returns_last_iterate() {
    let n = 24;
    let p = cube(n);
    let x0 = DVector::zeros(n);
    let full = steepest_descent(&p, &x0, AugmentCfg::default()).unwrap();
    assert_eq!(full.status, Status::Optimal);
    assert!(full.iterations() >= n, "only {} steps", full.iterations());

    let mut stopped_mid_run = false;
    for frac in [0.5, 0.3, 0.7, 0.2, 0.1, 0.85] {
        let cfg = AugmentCfg::default().with_max_time(full.total_time.mul_f64(frac));
        let res = steepest_descent(&p, &x0, cfg).unwrap();
        if res.status != Status::Timeout {
            continue;
        }
        p.check_feasible(&res.point).unwrap();
        match res.trace.last() {
            Some(last) => {
                stopped_mid_run = true;
                assert!(res.trace.len() <= full.iterations());
                assert_eq!(res.objective, last.objective);
                assert!(res.objective >= full.objective - 1e-9);
                assert_monotone(&res, 0.0);
            }
            None => assert_eq!(res.point, x0),
        }
    }
    assert!(stopped_mid_run, "no budget stopped the walk after a step");
}

#[test]
fn direction_lp_fails_without_inequality_rows() {
    // x + y = 1 has the lineality direction (1, -1) and no rows of B.
    let sys = LinearSystem::new(DMatrix::zeros(0, 2), DVector::zeros(0))
        .unwrap()
        .with_equalities(DMatrix::from_row_slice(1, 2, &[1.0, 1.0]), dv(&[1.0]))
        .unwrap()
        .with_cost(dv(&[1.0, 1.0]))
        .unwrap();
    let p = Polyhedron::new(sys);
    let err = steepest_descent(&p, &dv(&[0.5, 0.5]), AugmentCfg::default()).unwrap_err();
    assert!(matches!(err, AugmentError::SolverFailure { .. }), "{err}");
}

#[test]
fn rejects_missing_objective_and_infeasible_start() {
    let sys = LinearSystem::from_rows(&[[1.0, 0.0], [0.0, 1.0]], &[1.0, 1.0]).unwrap();
    let p = Polyhedron::new(sys);
    assert!(matches!(
        steepest_descent(&p, &dv(&[0.0, 0.0]), AugmentCfg::default()),
        Err(AugmentError::InvalidInput(_))
    ));

    let p = scenario();
    let bad = dv(&[0.0, 0.0, 20.0]);
    assert!(matches!(
        steepest_descent(&p, &bad, AugmentCfg::default()),
        Err(AugmentError::InfeasibleStart { .. })
    ));
    let rec = AugmentationDriver::new(&p, AugmentCfg::default()).run_recorded(&bad);
    assert!(matches!(rec.status, Status::Error(ref msg) if msg.contains("infeasible")));
    assert_eq!(rec.point, bad);
    assert!(rec.trace.is_empty());
}

#[test]
fn starts_from_found_feasible_point() {
    let p = scenario();
    let res = solve_with_defaults(&p).unwrap();
    assert_eq!(res.status, Status::Optimal);
    assert!((res.objective + 46.0).abs() < 1e-6);
}

#[test]
fn summary_mentions_status_and_objective() {
    let p = scenario();
    let res = steepest_descent(&p, &dv(&[0.0, 0.0, 0.0]), AugmentCfg::default()).unwrap();
    let text = res.to_string();
    assert!(text.starts_with("status: optimal"));
    assert!(text.contains("objective: -46.0"));
    assert!(text.contains("iterations:"));
}

/// Box `[-r, r]^n` plus cuts `a·x <= b` with `b >= 0` (so 0 stays feasible;
/// `b = 0` makes the origin degenerate).
fn random_polyhedron(
    n: usize,
    r: f64,
    cuts: &[(Vec<i32>, u8)],
    cost: &[i32],
) -> Polyhedron {
    let mut rows: Vec<Vec<f64>> = Vec::new();
    let mut rhs = Vec::new();
    for j in 0..n {
        let mut e = vec![0.0; n];
        e[j] = 1.0;
        rows.push(e.clone());
        rhs.push(r);
        e[j] = -1.0;
        rows.push(e);
        rhs.push(r);
    }
    for (a, b) in cuts {
        rows.push(a.iter().take(n).map(|&v| f64::from(v)).collect());
        rhs.push(f64::from(*b));
    }
    let c = DVector::from_iterator(n, cost.iter().take(n).map(|&v| f64::from(v)));
    let sys = LinearSystem::from_rows(&rows, &rhs)
        .unwrap()
        .with_cost(c)
        .unwrap();
    Polyhedron::new(sys)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn random_bounded_polytopes_match_baseline(
        n in 2usize..=4,
        r in 1u8..=8,
        cuts in prop::collection::vec((prop::collection::vec(-4i32..=4, 4), 0u8..=6), 0..5),
        cost in prop::collection::vec(-5i32..=5, 4),
    ) {
        let p = random_polyhedron(n, f64::from(r), &cuts, &cost);
        let x0 = DVector::zeros(n);
        let res = steepest_descent(&p, &x0, AugmentCfg::default()).unwrap();
        prop_assert_eq!(&res.status, &Status::Optimal);
        p.check_feasible(&res.point).map_err(|e| TestCaseError::fail(e.to_string()))?;
        assert_monotone(&res, 0.0);

        let baseline = p.solve_lp(Method::Primal).unwrap();
        prop_assert!(baseline.is_optimal());
        let tol = 1e-6 * (1.0 + baseline.objective.abs());
        prop_assert!(
            (baseline.objective - res.objective).abs() <= tol,
            "augmented {} vs baseline {}", res.objective, baseline.objective
        );
        prop_assert!(res.longest_degenerate_streak() <= p.system().num_ineq());
    }
}
