//! End-to-end integration tests for the backend abstraction.
//!
//! These exercise the full path: registry lookup, option validation,
//! marshaling, the hot-start protocol and status mapping, against the
//! built-in backends plus instrumented fakes.

use std::sync::atomic::{AtomicU64, Ordering};

use solvate_core::{
    sparse, Budget, LinearLayout, OptionSchema, Options, QpBackend, QpInputs, QpLayout, QpOutputs,
    QpViews, RawStatus, Registry, ResolvedOptions, Result, SolveStatus, SolverError, Sparsity,
    StatusClass, StatusEntry, StatusTable,
};

fn box_qp_layout(n: usize, m: usize) -> QpLayout {
    let h = Sparsity::of(&sparse::from_triplets_symmetric(
        n,
        (0..n).map(|i| (i, i, 1.0)),
    ));
    QpLayout::new(h, Sparsity::dense(m, n)).unwrap()
}

#[test]
fn test_linear_solve_reuses_factorization() {
    let a = sparse::identity(2);
    let layout = LinearLayout::new(Sparsity::of(&a)).unwrap();
    let reg = Registry::with_builtins();
    let mut solver = reg
        .create_linear("dense_lu", layout, &Options::new())
        .unwrap();

    solver.factorize(&a).unwrap();
    let mut xb = vec![3.0, 5.0];
    solver.solve_in_place(&mut xb, 1, false).unwrap();
    assert!((xb[0] - 3.0).abs() < 1e-12);
    assert!((xb[1] - 5.0).abs() < 1e-12);

    // Second right-hand side against the same factorization.
    let mut xb = vec![1.0, 1.0];
    solver.solve_in_place(&mut xb, 1, false).unwrap();
    assert!((xb[0] - 1.0).abs() < 1e-12);
    assert!((xb[1] - 1.0).abs() < 1e-12);

    assert_eq!(solver.factorize_count(), 1);
    assert_eq!(solver.solve_count(), 2);
}

#[test]
fn test_solve_before_factorize_is_structural() {
    let reg = Registry::with_builtins();
    for name in ["dense_lu", "dense_chol"] {
        let layout = LinearLayout::new(Sparsity::dense(2, 2)).unwrap();
        let mut solver = reg.create_linear(name, layout, &Options::new()).unwrap();
        let mut xb = vec![1.0, 1.0];
        let err = solver.solve_in_place(&mut xb, 1, false).unwrap_err();
        assert!(
            matches!(err, SolverError::Structural(_)),
            "{}: expected Structural, got {:?}",
            name,
            err
        );
    }
}

#[test]
fn test_singular_factorization_leaves_instance_usable() {
    let reg = Registry::with_builtins();
    let singular = sparse::from_triplets(2, 2, vec![(0, 0, 1.0), (0, 1, 2.0), (1, 0, 2.0), (1, 1, 4.0)]);
    let layout = LinearLayout::new(Sparsity::of(&singular)).unwrap();
    let mut solver = reg
        .create_linear("dense_lu", layout, &Options::new())
        .unwrap();

    let err = solver.factorize(&singular).unwrap_err();
    assert!(matches!(err, SolverError::Numerical { .. }));

    // Same structure, better values: the instance recovers.
    let good = sparse::from_triplets(2, 2, vec![(0, 0, 1.0), (0, 1, 2.0), (1, 0, 2.0), (1, 1, 5.0)]);
    solver.factorize(&good).unwrap();
    let mut xb = vec![1.0, 2.0];
    solver.solve_in_place(&mut xb, 1, false).unwrap();
    // Check residual of [[1,2],[2,5]] x = [1,2].
    let r0 = 1.0 * xb[0] + 2.0 * xb[1] - 1.0;
    let r1 = 2.0 * xb[0] + 5.0 * xb[1] - 2.0;
    assert!(r0.abs() < 1e-10 && r1.abs() < 1e-10);
}

#[test]
fn test_cholesky_capability_gated() {
    let reg = Registry::with_builtins();
    let spd = sparse::from_triplets(
        2,
        2,
        vec![(0, 0, 4.0), (0, 1, 1.0), (1, 0, 1.0), (1, 1, 3.0)],
    );
    let layout = LinearLayout::new(Sparsity::of(&spd)).unwrap();

    // dense_chol exposes the factor.
    let mut chol = reg
        .create_linear("dense_chol", layout.clone(), &Options::new())
        .unwrap();
    chol.factorize(&spd).unwrap();
    let mut y = vec![1.0, 2.0];
    chol.solve_cholesky_in_place(&mut y, 1, false).unwrap();
    chol.solve_cholesky_in_place(&mut y, 1, true).unwrap();
    let mut x = vec![1.0, 2.0];
    chol.solve_in_place(&mut x, 1, false).unwrap();
    assert!((x[0] - y[0]).abs() < 1e-12);
    assert!((x[1] - y[1]).abs() < 1e-12);

    // dense_lu does not.
    let mut lu = reg.create_linear("dense_lu", layout, &Options::new()).unwrap();
    lu.factorize(&spd).unwrap();
    let mut xb = vec![1.0, 2.0];
    let err = lu.solve_cholesky_in_place(&mut xb, 1, false).unwrap_err();
    assert!(matches!(err, SolverError::Configuration(_)));
}

fn diag_box_inputs<'a>(
    h: &'a sparse::SparseCsc,
    a: &'a sparse::SparseCsc,
    g: &'a [f64],
    lbx: &'a [f64],
    ubx: &'a [f64],
) -> QpInputs<'a> {
    QpInputs {
        h,
        g,
        a,
        lbx,
        ubx,
        lba: &[],
        uba: &[],
    }
}

#[test]
fn test_qp_end_to_end() {
    // minimize (1/2) x^T diag(2,2) x + [-4,-4]^T x on [-10,10]^2.
    // Unconstrained minimum x = [2,2] lies inside the box.
    let reg = Registry::with_builtins();
    let layout = box_qp_layout(2, 0);
    let mut solver = reg.create_qp("ipqp", layout, &Options::new()).unwrap();

    let h = sparse::from_triplets_symmetric(2, vec![(0, 0, 2.0), (1, 1, 2.0)]);
    let a = sparse::from_triplets(0, 2, vec![]);
    let g = [-4.0, -4.0];
    let lbx = [-10.0, -10.0];
    let ubx = [10.0, 10.0];
    let inputs = diag_box_inputs(&h, &a, &g, &lbx, &ubx);

    let sol = solver.solve(&inputs, &Budget::iters(100)).unwrap();
    assert_eq!(sol.status, SolveStatus::Optimal);
    assert!((sol.x[0] - 2.0).abs() < 1e-5, "x = {:?}", sol.x);
    assert!((sol.x[1] - 2.0).abs() < 1e-5);
    assert!((sol.cost + 8.0).abs() < 1e-4, "cost = {}", sol.cost);
    // Interior optimum: bound multipliers vanish.
    assert!(sol.lam[0].abs() < 1e-5 && sol.lam[1].abs() < 1e-5);
}

#[test]
fn test_qp_dual_sign_convention() {
    // minimize (1/2) x^2 - 4x on [0,1]: pinned at the upper bound, where
    // the gradient is 1 - 4 = -3, so the engine-convention multiplier
    // satisfying H x + g + lam = 0 is +3.
    let reg = Registry::with_builtins();
    let layout = box_qp_layout(1, 0);
    let mut solver = reg.create_qp("ipqp", layout, &Options::new()).unwrap();

    let h = sparse::from_triplets_symmetric(1, vec![(0, 0, 1.0)]);
    let a = sparse::from_triplets(0, 1, vec![]);
    let inputs = diag_box_inputs(&h, &a, &[-4.0], &[0.0], &[1.0]);

    let sol = solver.solve(&inputs, &Budget::iters(100)).unwrap();
    assert!((sol.x[0] - 1.0).abs() < 1e-5);
    assert!((sol.lam[0] - 3.0).abs() < 1e-3, "lam = {:?}", sol.lam);
}

#[test]
fn test_hotstart_idempotence() {
    // Solving the same data warm must agree with a fresh cold solve.
    let reg = Registry::with_builtins();
    let h = sparse::from_triplets_symmetric(2, vec![(0, 0, 2.0), (0, 1, 0.5), (1, 1, 3.0)]);
    let a = sparse::from_triplets(1, 2, vec![(0, 0, 1.0), (0, 1, 1.0)]);
    let layout = QpLayout::new(Sparsity::of(&h), Sparsity::of(&a)).unwrap();

    let g = [-1.0, -2.0];
    let lbx = [-5.0, -5.0];
    let ubx = [5.0, 5.0];
    let lba = [-1.0];
    let uba = [1.5];
    let inputs = QpInputs {
        h: &h,
        g: &g,
        a: &a,
        lbx: &lbx,
        ubx: &ubx,
        lba: &lba,
        uba: &uba,
    };
    let budget = Budget::iters(200);

    let mut warm_solver = reg.create_qp("ipqp", layout.clone(), &Options::new()).unwrap();
    let first = warm_solver.solve(&inputs, &budget).unwrap();
    assert_eq!(warm_solver.cold_starts(), 1);
    assert_eq!(warm_solver.warm_starts(), 0);

    let second = warm_solver.solve(&inputs, &budget).unwrap();
    assert_eq!(warm_solver.warm_starts(), 1);

    let mut cold_solver = reg.create_qp("ipqp", layout, &Options::new()).unwrap();
    let reference = cold_solver.solve(&inputs, &budget).unwrap();

    for i in 0..2 {
        assert!(
            (second.x[i] - reference.x[i]).abs() < 1e-5,
            "warm {:?} vs cold {:?}",
            second.x,
            reference.x
        );
        assert!((first.x[i] - reference.x[i]).abs() < 1e-5);
    }
    assert!((second.cost - reference.cost).abs() < 1e-5);
}

#[test]
fn test_reset_forces_cold_start() {
    let reg = Registry::with_builtins();
    let layout = box_qp_layout(2, 0);
    let mut solver = reg.create_qp("ipqp", layout, &Options::new()).unwrap();

    let h = sparse::from_triplets_symmetric(2, vec![(0, 0, 2.0), (1, 1, 2.0)]);
    let a = sparse::from_triplets(0, 2, vec![]);
    let inputs = diag_box_inputs(&h, &a, &[-4.0, -4.0], &[-10.0, -10.0], &[10.0, 10.0]);
    let budget = Budget::iters(100);

    solver.solve(&inputs, &budget).unwrap();
    solver.solve(&inputs, &budget).unwrap();
    assert_eq!(solver.cold_starts(), 1);
    assert_eq!(solver.warm_starts(), 1);

    solver.reset();
    solver.solve(&inputs, &budget).unwrap();
    assert_eq!(solver.cold_starts(), 2);
}

#[test]
fn test_optional_outputs_skipped() {
    let reg = Registry::with_builtins();
    let layout = box_qp_layout(2, 0);
    let mut solver = reg.create_qp("ipqp", layout, &Options::new()).unwrap();

    let h = sparse::from_triplets_symmetric(2, vec![(0, 0, 2.0), (1, 1, 2.0)]);
    let a = sparse::from_triplets(0, 2, vec![]);
    let inputs = diag_box_inputs(&h, &a, &[-4.0, -4.0], &[-10.0, -10.0], &[10.0, 10.0]);

    let mut cost = 0.0;
    let status = solver
        .solve_into(
            &inputs,
            &Budget::iters(100),
            QpOutputs {
                x: None,
                lam: None,
                cost: Some(&mut cost),
            },
        )
        .unwrap();
    assert_eq!(status, SolveStatus::Optimal);
    assert!((cost + 8.0).abs() < 1e-4);
}

// An instrumented QP backend that records whether it was ever invoked.
// Used to verify that input validation happens before any backend call.
struct TripwireBackend {
    calls: &'static AtomicU64,
}

static TRIPWIRE_TABLE: StatusTable = StatusTable {
    backend: "tripwire",
    entries: &[StatusEntry {
        code: 0,
        class: StatusClass::Success,
        message: "ok",
    }],
};

impl QpBackend for TripwireBackend {
    fn options(&self) -> OptionSchema {
        OptionSchema::new()
    }

    fn status_table(&self) -> &StatusTable {
        &TRIPWIRE_TABLE
    }

    fn prepare(&mut self, _layout: &QpLayout, _opts: &ResolvedOptions) -> Result<()> {
        Ok(())
    }

    fn init_solve(&mut self, _data: &QpViews<'_>, _budget: &Budget) -> RawStatus {
        self.calls.fetch_add(1, Ordering::SeqCst);
        0
    }

    fn reset(&mut self) {}

    fn extract(&self, _out: QpOutputs<'_>) {}
}

static TRIPWIRE_CALLS: AtomicU64 = AtomicU64::new(0);

fn register_tripwire(desc: &mut solvate_core::PluginDescriptor) -> i32 {
    desc.name = "tripwire".to_string();
    desc.version = 1;
    desc.doc = "test fixture".to_string();
    desc.factory = Some(solvate_core::PluginFactory::Qp(Box::new(|| {
        Box::new(TripwireBackend {
            calls: &TRIPWIRE_CALLS,
        })
    })));
    0
}

#[test]
fn test_malformed_bounds_never_reach_backend() {
    let mut reg = Registry::new();
    reg.register(register_tripwire).unwrap();

    let layout = box_qp_layout(2, 0);
    let mut solver = reg.create_qp("tripwire", layout, &Options::new()).unwrap();

    let h = sparse::from_triplets_symmetric(2, vec![(0, 0, 1.0), (1, 1, 1.0)]);
    let a = sparse::from_triplets(0, 2, vec![]);
    // lbx[1] > ubx[1].
    let inputs = diag_box_inputs(&h, &a, &[0.0, 0.0], &[0.0, 2.0], &[1.0, 1.0]);

    let err = solver.solve(&inputs, &Budget::iters(10)).unwrap_err();
    assert!(matches!(err, SolverError::Configuration(_)), "{:?}", err);
    assert_eq!(
        TRIPWIRE_CALLS.load(Ordering::SeqCst),
        0,
        "backend was invoked despite malformed bounds"
    );
}

#[test]
fn test_status_tables_are_total() {
    // Every documented code classifies, and so does a code no backend
    // documents.
    use solvate_core::backends::{
        dense_chol::DenseCholBackend, dense_lu::DenseLuBackend, ipqp::IpqpBackend,
    };
    use solvate_core::LinearBackend;

    let lu = DenseLuBackend::new();
    let chol = DenseCholBackend::new();
    let qp = IpqpBackend::new();
    let tables = [
        LinearBackend::status_table(&lu),
        LinearBackend::status_table(&chol),
        QpBackend::status_table(&qp),
    ];

    for table in tables {
        assert!(!table.entries.is_empty(), "{} has an empty table", table.backend);
        for entry in table.entries {
            let c = table.classify(entry.code);
            assert_eq!(c.class, entry.class);
            assert_eq!(c.message, Some(entry.message));
        }
        let unknown = table.classify(0x7FFF_0001);
        assert_eq!(unknown.class, StatusClass::Fatal);
        assert_eq!(unknown.code, 0x7FFF_0001);
    }
}

#[test]
fn test_every_builtin_schema_accepts_its_defaults() {
    // Feeding a schema's own defaults back through validation must never
    // fail; a failure here is a fixture bug in the backend's table.
    use solvate_core::backends::{
        dense_chol::DenseCholBackend, dense_lu::DenseLuBackend, ipqp::IpqpBackend,
    };
    use solvate_core::LinearBackend;

    let schemas = [
        ("dense_lu", LinearBackend::options(&DenseLuBackend::new())),
        ("dense_chol", LinearBackend::options(&DenseCholBackend::new())),
        ("ipqp", QpBackend::options(&IpqpBackend::new())),
    ];
    for (name, schema) in schemas {
        let mut as_supplied = Options::new();
        for spec in schema.entries() {
            as_supplied.insert(spec.name.to_string(), spec.default.clone());
        }
        schema
            .resolve(&as_supplied)
            .unwrap_or_else(|e| panic!("{}: defaults rejected: {}", name, e));
    }
}

#[test]
fn test_option_validation_on_qp_create() {
    let reg = Registry::with_builtins();
    let layout = box_qp_layout(2, 0);

    let mut opts = Options::new();
    opts.insert("tol".to_string(), true.into());
    assert!(matches!(
        reg.create_qp("ipqp", layout.clone(), &opts),
        Err(SolverError::Configuration(_))
    ));

    let mut opts = Options::new();
    opts.insert("init".to_string(), "bounds_mid".into());
    let mut solver = reg.create_qp("ipqp", layout, &opts).unwrap();
    assert_eq!(solver.options().str("init"), "bounds_mid");

    let h = sparse::from_triplets_symmetric(2, vec![(0, 0, 2.0), (1, 1, 2.0)]);
    let a = sparse::from_triplets(0, 2, vec![]);
    let inputs = diag_box_inputs(&h, &a, &[-4.0, -4.0], &[-10.0, -10.0], &[10.0, 10.0]);
    let sol = solver.solve(&inputs, &Budget::iters(100)).unwrap();
    assert!((sol.x[0] - 2.0).abs() < 1e-5);
}

#[test]
fn test_time_budget_is_terminal_not_fatal() {
    let reg = Registry::with_builtins();
    let layout = box_qp_layout(2, 0);
    let mut solver = reg.create_qp("ipqp", layout, &Options::new()).unwrap();

    let h = sparse::from_triplets_symmetric(2, vec![(0, 0, 2.0), (1, 1, 2.0)]);
    let a = sparse::from_triplets(0, 2, vec![]);
    let inputs = diag_box_inputs(&h, &a, &[-4.0, -4.0], &[-10.0, -10.0], &[10.0, 10.0]);

    // An iteration budget of zero exhausts immediately but still returns
    // the (cold-start) iterate.
    let sol = solver.solve(&inputs, &Budget::iters(0)).unwrap();
    assert_eq!(sol.status, SolveStatus::MaxIters);
    assert!(sol.x.iter().all(|v| v.is_finite()));
}
