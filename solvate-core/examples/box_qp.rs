//! Box-constrained QP example driven through the plugin registry.
//!
//! Solves:
//!   minimize    (1/2) x^T diag(2,2) x - 4 x1 - 4 x2
//!   subject to  -10 <= x <= 10
//!
//! Optimal solution: x = [2, 2], objective = -8, then re-solves with a
//! shifted gradient to show the warm restart.

use solvate_core::{sparse, Budget, Options, QpInputs, QpLayout, Sparsity};

fn main() {
    println!("Solvate - Box QP Example");
    println!("========================");
    for name in ["dense_lu", "dense_chol", "ipqp"] {
        println!("has_plugin({name}) = {}", solvate_core::has_plugin(name));
    }
    println!();

    let h = sparse::from_triplets_symmetric(2, vec![(0, 0, 2.0), (1, 1, 2.0)]);
    let a = sparse::from_triplets(0, 2, vec![]);
    let layout = QpLayout::new(Sparsity::of(&h), Sparsity::of(&a)).expect("valid layout");

    let mut solver =
        solvate_core::create_qp("ipqp", layout, &Options::new()).expect("ipqp is built in");

    let g = [-4.0, -4.0];
    let lbx = [-10.0, -10.0];
    let ubx = [10.0, 10.0];
    let inputs = QpInputs {
        h: &h,
        g: &g,
        a: &a,
        lbx: &lbx,
        ubx: &ubx,
        lba: &[],
        uba: &[],
    };
    let budget = Budget::iters(100);

    match solver.solve(&inputs, &budget) {
        Ok(sol) => {
            println!("=== Cold solve ===");
            println!("Status: {}", sol.status);
            println!("x = [{:.6}, {:.6}]", sol.x[0], sol.x[1]);
            println!("Objective value: {:.6}", sol.cost);
            println!("Iterations: {}", sol.iters);
        }
        Err(e) => {
            eprintln!("Solver failed: {}", e);
            std::process::exit(1);
        }
    }

    // Nudge the gradient and re-solve; the backend restarts from the
    // cached iterate instead of cold-initializing.
    let g = [-4.2, -3.8];
    let inputs = QpInputs { g: &g, ..inputs };
    match solver.solve(&inputs, &budget) {
        Ok(sol) => {
            println!("\n=== Warm re-solve (shifted gradient) ===");
            println!("Status: {}", sol.status);
            println!("x = [{:.6}, {:.6}]", sol.x[0], sol.x[1]);
            println!("Iterations: {}", sol.iters);
            println!(
                "cold starts = {}, warm starts = {}",
                solver.cold_starts(),
                solver.warm_starts()
            );
        }
        Err(e) => {
            eprintln!("Solver failed: {}", e);
            std::process::exit(1);
        }
    }
}
