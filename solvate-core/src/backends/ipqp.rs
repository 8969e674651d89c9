//! Dense primal-dual interior-point QP backend.
//!
//! Solves
//!
//! ```text
//! minimize    (1/2) x^T H x + g^T x
//! subject to  lbx <= x <= ubx
//!             lba <= A x <= uba
//! ```
//!
//! by rewriting all bounds as one stacked inequality block C x >= d with a
//! slack vector s > 0 and running Newton steps on the perturbed KKT
//! conditions, eliminating (s, z) into a dense n-by-n normal system per
//! iteration. Infinite bounds are clamped to far bounds rather than
//! removed, so the constraint block keeps a fixed shape across solves.
//!
//! Warm restarts reuse the primal/dual iterate cached from the previous
//! solve on the same instance; only the numeric data is refreshed.

use std::time::Instant;

use nalgebra::linalg::Cholesky;
use nalgebra::{DMatrix, DVector};

use crate::backend::{Budget, QpBackend, QpOutputs, QpViews};
use crate::error::Result;
use crate::options::{OptionSchema, OptionType, ResolvedOptions};
use crate::problem::QpLayout;
use crate::registry::{PluginDescriptor, PluginFactory};
use crate::status::{RawStatus, StatusClass, StatusEntry, StatusTable};

/// Registry key.
pub const NAME: &str = "ipqp";

/// Substitute for infinite bounds; keeps the inequality block full-shape.
const FAR_BOUND: f64 = 1e19;

/// Fraction-to-boundary factor.
const TAU: f64 = 0.995;

/// Fixed centering parameter.
const SIGMA: f64 = 0.1;

/// Slack floor when re-interiorizing a warm iterate.
const WARM_SLACK_FLOOR: f64 = 1e-3;

mod codes {
    pub const OPTIMAL: i32 = 0;
    pub const MAX_ITERS: i32 = 1;
    pub const TIME_LIMIT: i32 = 2;
    pub const KKT_FAILURE: i32 = 3;
    pub const STALLED: i32 = 4;
    pub const SEQUENCE: i32 = 5;
}

static STATUS_TABLE: StatusTable = StatusTable {
    backend: NAME,
    entries: &[
        StatusEntry {
            code: codes::OPTIMAL,
            class: StatusClass::Success,
            message: "converged",
        },
        StatusEntry {
            code: codes::MAX_ITERS,
            class: StatusClass::IterationLimit,
            message: "iteration budget exhausted",
        },
        StatusEntry {
            code: codes::TIME_LIMIT,
            class: StatusClass::TimeLimit,
            message: "time budget exhausted",
        },
        StatusEntry {
            code: codes::KKT_FAILURE,
            class: StatusClass::NumericalFailure,
            message: "KKT system not positive definite; Hessian may be indefinite",
        },
        StatusEntry {
            code: codes::STALLED,
            class: StatusClass::NumericalFailure,
            message: "no progress; problem may be infeasible or unbounded",
        },
        StatusEntry {
            code: codes::SEQUENCE,
            class: StatusClass::Fatal,
            message: "backend called out of sequence",
        },
    ],
};

/// Iterate and scratch storage, allocated once per instance shape.
struct IpqpState {
    n: usize,
    k: usize,

    // Problem data in stacked inequality form, refreshed every solve.
    h: DMatrix<f64>,
    g: DVector<f64>,
    c: DMatrix<f64>,
    d: DVector<f64>,

    // Primal/dual iterate; survives between solves for warm restarts.
    x: DVector<f64>,
    s: DVector<f64>,
    z: DVector<f64>,

    // Newton system scratch.
    cx: DVector<f64>,
    rp: DVector<f64>,
    rd: DVector<f64>,
    v: DVector<f64>,
    wc: DMatrix<f64>,
    kkt: DMatrix<f64>,
    dx: DVector<f64>,
    ds: DVector<f64>,
    dz: DVector<f64>,

    iters: usize,
}

impl IpqpState {
    fn new(n: usize, m: usize) -> Self {
        let k = 2 * n + 2 * m;
        Self {
            n,
            k,
            h: DMatrix::zeros(n, n),
            g: DVector::zeros(n),
            c: DMatrix::zeros(k, n),
            d: DVector::zeros(k),
            x: DVector::zeros(n),
            s: DVector::zeros(k),
            z: DVector::zeros(k),
            cx: DVector::zeros(k),
            rp: DVector::zeros(k),
            rd: DVector::zeros(n),
            v: DVector::zeros(k),
            wc: DMatrix::zeros(k, n),
            kkt: DMatrix::zeros(n, n),
            dx: DVector::zeros(n),
            ds: DVector::zeros(k),
            dz: DVector::zeros(k),
            iters: 0,
        }
    }

    /// Refresh H, g, C and d from the marshaled views. Both cold and warm
    /// paths run this; only the iterate survives a warm restart.
    fn load_data(&mut self, data: &QpViews<'_>) {
        let (n, m) = (data.n, data.m);
        self.h.copy_from_slice(data.h);
        for j in 0..n {
            self.g[j] = data.g[j];
        }

        self.c.fill(0.0);
        for j in 0..n {
            // x_j >= lbx_j  and  -x_j >= -ubx_j.
            self.c[(j, j)] = 1.0;
            self.c[(n + j, j)] = -1.0;
            self.d[j] = data.lbx[j].clamp(-FAR_BOUND, FAR_BOUND);
            self.d[n + j] = -data.ubx[j].clamp(-FAR_BOUND, FAR_BOUND);
        }
        for r in 0..m {
            for j in 0..n {
                let a_rj = data.a[r * n + j];
                self.c[(2 * n + r, j)] = a_rj;
                self.c[(2 * n + m + r, j)] = -a_rj;
            }
            self.d[2 * n + r] = data.lba[r].clamp(-FAR_BOUND, FAR_BOUND);
            self.d[2 * n + m + r] = -data.uba[r].clamp(-FAR_BOUND, FAR_BOUND);
        }
    }

    /// Cold starting point.
    fn init_iterate(&mut self, data: &QpViews<'_>, mode: &str) {
        let n = self.n;
        for j in 0..n {
            let lb = data.lbx[j].clamp(-FAR_BOUND, FAR_BOUND);
            let ub = data.ubx[j].clamp(-FAR_BOUND, FAR_BOUND);
            self.x[j] = match mode {
                "bounds_mid" => 0.5 * (lb + ub),
                _ => 0.0f64.clamp(lb, ub),
            };
        }
        self.c.mul_to(&self.x, &mut self.cx);
        for i in 0..self.k {
            self.s[i] = (self.cx[i] - self.d[i]).max(1.0);
            self.z[i] = 1.0 / self.s[i];
        }
        self.iters = 0;
    }

    /// Re-interiorize the cached iterate against possibly shifted bounds.
    fn warm_iterate(&mut self) {
        self.c.mul_to(&self.x, &mut self.cx);
        for i in 0..self.k {
            self.s[i] = (self.cx[i] - self.d[i]).max(WARM_SLACK_FLOOR);
            self.z[i] = self.z[i].clamp(1e-8, 1e8);
        }
        self.iters = 0;
    }

    fn run(&mut self, budget: &Budget, tol: f64, static_reg: f64, verbose: bool) -> RawStatus {
        let start = Instant::now();
        let (n, k) = (self.n, self.k);
        let mut stalls = 0usize;

        while self.iters < budget.max_iter {
            if let Some(max_time) = budget.max_time {
                if start.elapsed() > max_time {
                    return codes::TIME_LIMIT;
                }
            }

            // Residuals: rp = Cx - d - s, rd = Hx + g - C^T z.
            self.c.mul_to(&self.x, &mut self.cx);
            for i in 0..k {
                self.rp[i] = self.cx[i] - self.d[i] - self.s[i];
            }
            self.h.mul_to(&self.x, &mut self.rd);
            self.rd += &self.g;
            self.rd.gemv_tr(-1.0, &self.c, &self.z, 1.0);

            let mu = self.s.dot(&self.z) / k as f64;
            let rd_norm = self.rd.amax();
            let rp_norm = self.rp.amax();
            if verbose {
                log::info!(
                    "ipqp iter {:3}: mu {:9.3e} rd {:9.3e} rp {:9.3e}",
                    self.iters,
                    mu,
                    rd_norm,
                    rp_norm
                );
            }
            if mu <= tol && rd_norm <= tol * (1.0 + self.g.amax()) && rp_norm <= tol.sqrt() {
                return codes::OPTIMAL;
            }

            // Normal system: (H + C^T W C + reg I) dx = -rd + C^T v,
            // W = diag(z/s), v = sigma*mu/s - z - W rp.
            let sigma_mu = SIGMA * mu;
            for i in 0..k {
                let w = self.z[i] / self.s[i];
                for j in 0..n {
                    self.wc[(i, j)] = w * self.c[(i, j)];
                }
                self.v[i] = sigma_mu / self.s[i] - self.z[i] - w * self.rp[i];
            }
            self.c.tr_mul_to(&self.wc, &mut self.kkt);
            self.kkt += &self.h;
            for j in 0..n {
                self.kkt[(j, j)] += static_reg;
            }

            self.dx.copy_from(&self.rd);
            self.dx.neg_mut();
            self.dx.gemv_tr(1.0, &self.c, &self.v, 1.0);
            let Some(chol) = Cholesky::new(self.kkt.clone()) else {
                return codes::KKT_FAILURE;
            };
            chol.solve_mut(&mut self.dx);

            // Recover ds, dz and take a fraction-to-boundary step.
            self.c.mul_to(&self.dx, &mut self.ds);
            self.ds += &self.rp;
            for i in 0..k {
                let w = self.z[i] / self.s[i];
                self.dz[i] = sigma_mu / self.s[i] - self.z[i] - w * self.ds[i];
            }

            let mut alpha = 1.0f64;
            for i in 0..k {
                if self.ds[i] < 0.0 {
                    alpha = alpha.min(-TAU * self.s[i] / self.ds[i]);
                }
                if self.dz[i] < 0.0 {
                    alpha = alpha.min(-TAU * self.z[i] / self.dz[i]);
                }
            }

            if alpha < 1e-10 {
                stalls += 1;
                if stalls >= 5 {
                    return codes::STALLED;
                }
            } else {
                stalls = 0;
            }

            self.x.axpy(alpha, &self.dx, 1.0);
            self.s.axpy(alpha, &self.ds, 1.0);
            self.z.axpy(alpha, &self.dz, 1.0);
            self.iters += 1;
        }
        codes::MAX_ITERS
    }
}

/// Interior-point QP backend.
pub struct IpqpBackend {
    n: usize,
    m: usize,
    tol: f64,
    static_reg: f64,
    verbose: bool,
    init_mode: String,
    state: Option<IpqpState>,
}

impl IpqpBackend {
    /// Fresh, unprepared backend.
    pub fn new() -> Self {
        Self {
            n: 0,
            m: 0,
            tol: 1e-8,
            static_reg: 1e-9,
            verbose: false,
            init_mode: "centered".to_string(),
            state: None,
        }
    }
}

impl Default for IpqpBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl QpBackend for IpqpBackend {
    fn options(&self) -> OptionSchema {
        OptionSchema::new()
            .add("tol", OptionType::Real, 1e-8, "convergence tolerance on the barrier parameter")
            .add(
                "static_reg",
                OptionType::Real,
                1e-9,
                "static regularization added to the normal system diagonal",
            )
            .add("verbose", OptionType::Bool, false, "log per-iteration progress")
            .add(
                "init",
                OptionType::Enum(&["centered", "bounds_mid"]),
                "centered",
                "cold-start primal point: zero clamped into the bounds, or the bound midpoint",
            )
    }

    fn status_table(&self) -> &StatusTable {
        &STATUS_TABLE
    }

    fn prepare(&mut self, layout: &QpLayout, opts: &ResolvedOptions) -> Result<()> {
        self.n = layout.n();
        self.m = layout.m();
        self.tol = opts.real("tol");
        self.static_reg = opts.real("static_reg");
        self.verbose = opts.bool("verbose");
        self.init_mode = opts.str("init").to_string();
        Ok(())
    }

    fn supports_warm_start(&self) -> bool {
        true
    }

    fn flips_dual_sign(&self) -> bool {
        // Multipliers come out in the C x >= d convention, which is the
        // negative of the engine's.
        true
    }

    fn init_solve(&mut self, data: &QpViews<'_>, budget: &Budget) -> RawStatus {
        if data.n != self.n || data.m != self.m {
            return codes::SEQUENCE;
        }
        let state = self
            .state
            .get_or_insert_with(|| IpqpState::new(data.n, data.m));
        state.load_data(data);
        let mode = self.init_mode.clone();
        state.init_iterate(data, &mode);
        state.run(budget, self.tol, self.static_reg, self.verbose)
    }

    fn warm_solve(&mut self, data: &QpViews<'_>, budget: &Budget) -> RawStatus {
        let Some(state) = self.state.as_mut() else {
            // Nothing cached; a cold start is the safe fallback.
            return self.init_solve(data, budget);
        };
        state.load_data(data);
        state.warm_iterate();
        state.run(budget, self.tol, self.static_reg, self.verbose)
    }

    fn reset(&mut self) {
        self.state = None;
    }

    fn iterations(&self) -> usize {
        self.state.as_ref().map(|s| s.iters).unwrap_or(0)
    }

    fn extract(&self, out: QpOutputs<'_>) {
        let Some(state) = self.state.as_ref() else {
            return;
        };
        let (n, m) = (self.n, self.m);

        if let Some(x_out) = out.x {
            x_out.copy_from_slice(state.x.as_slice());
        }
        if let Some(cost_out) = out.cost {
            let hx = &state.h * &state.x;
            *cost_out = 0.5 * state.x.dot(&hx) + state.g.dot(&state.x);
        }
        if let Some(lam_out) = out.lam {
            // Native convention: lam = z_lower - z_upper per bound pair.
            for j in 0..n {
                lam_out[j] = state.z[j] - state.z[n + j];
            }
            for r in 0..m {
                lam_out[n + r] = state.z[2 * n + r] - state.z[2 * n + m + r];
            }
        }
    }
}

/// Registration entry point.
pub fn register(desc: &mut PluginDescriptor) -> i32 {
    desc.name = NAME.to_string();
    desc.version = 1;
    desc.doc = "Dense primal-dual interior-point method for convex QPs with \
                variable and linear constraint bounds. Warm-restarts from \
                the previous iterate on repeated solves."
        .to_string();
    desc.factory = Some(PluginFactory::Qp(Box::new(|| Box::new(IpqpBackend::new()))));
    0
}
