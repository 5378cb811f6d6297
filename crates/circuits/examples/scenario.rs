//! Augmentation walk on the 3-variable reference problem.
//!
//! Purpose
//! - Show every circuit, step length and objective value on a problem small
//!   enough to check by hand, next to the direct LP solve.
//!
//! Problem
//! - `B = [[-1,0,0],[0,0,-1],[0,-1,-1],[0,-1,0],[2,1,1],[3,3,-1]]`,
//!   `d = [0,0,2,4,6,8]`, `c = [-8,-1,-5]`, start at the origin.
//! - Optimum `-46` at `(0, -4, 10)`.

use std::time::Instant;

use circuits::api::{
    steepest_descent, AugmentCfg, CircuitPolytope, LinearSystem, Method, Polyhedron,
};
use nalgebra::DVector;

fn main() {
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
    .and_then(|s| s.with_cost(DVector::from_vec(vec![-8.0, -1.0, -5.0])))
    .expect("reference problem is well-formed");
    let poly = Polyhedron::new(sys);

    let start = Instant::now();
    let res = steepest_descent(&poly, &DVector::zeros(3), AugmentCfg::default())
        .expect("augmentation succeeds");
    let aug_ms = start.elapsed().as_secs_f64() * 1e3;

    for r in &res.trace {
        let g = poly.normalized_circuit(&r.circuit);
        println!(
            "iter={} circuit={:?} steepness={:.6} alpha={:.6} objective={:.6}",
            r.index,
            g.as_slice(),
            r.steepness,
            r.step,
            r.objective
        );
    }
    println!("{res}");

    let start = Instant::now();
    let baseline = poly.solve_lp(Method::Primal).expect("objective is set");
    let lp_ms = start.elapsed().as_secs_f64() * 1e3;
    println!(
        "baseline status={} objective={:.9}",
        baseline.status, baseline.objective
    );
    println!("augment_time_ms={aug_ms:.3} baseline_time_ms={lp_ms:.3}");
}
