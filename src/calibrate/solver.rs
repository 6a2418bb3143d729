//! Bound-constrained quasi-Newton minimization.
//!
//! A projected L-BFGS method for problems of the form `min f(x)` subject to `x ≥ lower`:
//! variables pinned at the bound with a gradient pushing outward are frozen, the search
//! direction comes from the two-loop recursion over the remaining (free) variables, and
//! trial points are projected back onto the feasible box during an Armijo backtracking
//! line search.

use std::fmt;

use ndarray::{Array1, ArrayView1, Zip};
use serde::Deserialize;

/// Smallest diagonal Hessian entry used for scaling.
const HESS_FLOOR: f64 = 1e-12;
/// Armijo sufficient-decrease constant.
const ARMIJO_C1: f64 = 1e-4;
/// Backtracking factor.
const BACKTRACK: f64 = 0.5;
/// Relative curvature threshold below which an update pair is skipped.
const MIN_CURVATURE: f64 = 1e-12;

/// Something that can be minimized by [`ProjectedLbfgs`].
pub trait Objective {
    /// Number of variables.
    fn dim(&self) -> usize;

    /// Objective value and gradient at `x`.
    fn value_and_gradient(&self, x: &ArrayView1<f64>) -> (f64, Array1<f64>);

    /// Diagonal of the Hessian, if cheaply available; used to scale the initial inverse Hessian.
    fn hessian_diagonal(&self) -> Option<Array1<f64>> { None }
}

/// Solver stopping parameters.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Stop when `(f_k − f_{k+1}) / max(|f_k|, |f_{k+1}|, 1) ≤ ftol`.
    pub ftol: f64,
    /// Stop when the largest projected-gradient component is at most `gtol`.
    pub gtol: f64,
    /// Maximum number of iterations.
    pub max_iter: usize,
    /// Number of correction pairs kept.
    pub history: usize,
    /// Maximum number of backtracking steps per iteration.
    pub max_line_search: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            ftol: 1e-9,
            gtol: 1e-9,
            max_iter: 5000,
            history: 10,
            max_line_search: 30,
        }
    }
}

/// Why the solver stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Relative reduction of the objective fell below `ftol`.
    RelativeReduction,
    /// Projected gradient fell below `gtol`.
    ProjectedGradient,
    /// Iteration limit reached.
    IterationLimit,
    /// No step satisfying the sufficient-decrease condition could be found.
    LineSearchFailure,
}

impl Termination {
    /// Whether this termination counts as convergence.
    pub fn converged(&self) -> bool {
        matches!(self, Termination::RelativeReduction | Termination::ProjectedGradient)
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::RelativeReduction => write!(f, "CONVERGENCE: REL_REDUCTION_OF_F_<=_FTOL"),
            Termination::ProjectedGradient => write!(f, "CONVERGENCE: NORM_OF_PROJECTED_GRADIENT_<=_GTOL"),
            Termination::IterationLimit => write!(f, "STOP: TOTAL NO. OF ITERATIONS REACHED LIMIT"),
            Termination::LineSearchFailure => write!(f, "ABNORMAL_TERMINATION_IN_LNSRCH"),
        }
    }
}

/// Outcome of a minimization.
#[derive(Debug, Clone)]
pub struct SolverResult {
    /// Best point found.
    pub x: Array1<f64>,
    /// Objective value at `x`.
    pub fun: f64,
    /// Iterations performed.
    pub nit: usize,
    /// Objective evaluations performed.
    pub nfev: usize,
    /// Whether the solver converged.
    pub success: bool,
    pub termination: Termination,
    /// Largest projected-gradient component at `x`.
    pub projected_gradient: f64,
}

impl SolverResult {
    /// Human-readable termination message. A run that stopped early but still reached
    /// a small projected gradient says so.
    pub fn message(&self) -> String {
        if self.success && !self.termination.converged() {
            format!("{} (ACCEPTED: PROJECTED GRADIENT {:e} WITHIN TOLERANCE)", self.termination, self.projected_gradient)
        } else {
            self.termination.to_string()
        }
    }
}

#[derive(Debug, Clone)]
struct CorrectionPair {
    s: Array1<f64>,
    y: Array1<f64>,
    rho: f64,
}

/// Limited memory of recent `(step, gradient change)` pairs.
#[derive(Debug, Default)]
struct History {
    pairs: Vec<CorrectionPair>,
    capacity: usize,
}

impl History {
    fn new(capacity: usize) -> Self { Self { pairs: Vec::with_capacity(capacity), capacity } }

    fn clear(&mut self) { self.pairs.clear() }

    #[inline] fn is_empty(&self) -> bool { self.pairs.is_empty() }

    fn update(&mut self, s: Array1<f64>, y: Array1<f64>) {
        if self.capacity == 0 { return }

        let sy = s.dot(&y);
        let floor = MIN_CURVATURE * s.dot(&s).sqrt() * y.dot(&y).sqrt();
        if !sy.is_finite() || sy <= floor || sy <= 0.0 { return }

        self.pairs.push(CorrectionPair { s, y, rho: 1.0 / sy });
        if self.pairs.len() > self.capacity {
            self.pairs.remove(0);
        }
    }
}

/// Projected limited-memory BFGS with simple lower bounds.
#[derive(Debug, Clone, Default)]
pub struct ProjectedLbfgs {
    config: SolverConfig,
}

impl ProjectedLbfgs {
    pub fn new(config: SolverConfig) -> Self { Self { config } }

    #[inline] pub fn config(&self) -> &SolverConfig { &self.config }

    /// Minimize `objective` subject to `x ≥ lower`, starting from `x0` (projected if needed).
    ///
    /// Never fails: if convergence is not reached, the last accepted iterate is returned
    /// with `success == false`.
    pub fn minimize<O: Objective>(&self, objective: &O, x0: Array1<f64>, lower: f64) -> SolverResult {
        debug_assert_eq!(x0.len(), objective.dim(), "x0 length must equal objective dimension");

        let mut x = x0.mapv(|xi| xi.max(lower));
        let (mut f, mut g) = objective.value_and_gradient(&x.view());
        let mut nfev = 1;
        let mut nit = 0;

        let hdiag = objective.hessian_diagonal()
            .unwrap_or_else(|| Array1::ones(x.len()))
            .mapv(|h| h.max(HESS_FLOOR));
        let mut history = History::new(self.config.history);

        let termination = loop {
            if projected_grad_norm(&x, &g, lower) <= self.config.gtol {
                break Termination::ProjectedGradient;
            }
            if nit >= self.config.max_iter {
                break Termination::IterationLimit;
            }

            let free = free_mask(&x, &g, lower);
            let mut direction = lbfgs_direction(&g, &hdiag, &free, &history);
            let slope = g.dot(&direction);
            if !slope.is_finite() || slope >= 0.0 || direction.iter().any(|d| !d.is_finite()) {
                history.clear();
                direction = scaled_steepest_descent(&g, &hdiag, &free);
            }

            let Some((x_new, f_new, g_new)) = self.line_search(objective, &x, f, &g, &direction, lower, &mut nfev)
            else {
                // Stale curvature can spoil the direction; retry once from scaled steepest descent.
                if history.is_empty() { break Termination::LineSearchFailure }
                history.clear();
                continue;
            };

            nit += 1;
            history.update(&x_new - &x, &g_new - &g);

            let reduction = (f - f_new) / f.abs().max(f_new.abs()).max(1.0);
            x = x_new;
            f = f_new;
            g = g_new;

            if reduction <= self.config.ftol {
                break Termination::RelativeReduction;
            }
        };

        let projected_gradient = projected_grad_norm(&x, &g, lower);
        let success = termination.converged() || projected_gradient <= 10.0 * self.config.gtol;

        SolverResult { x, fun: f, nit, nfev, success, termination, projected_gradient }
    }

    /// Backtracking along the projected path `P(x + α·d)`; returns the accepted point.
    fn line_search<O: Objective>(
        &self,
        objective: &O,
        x: &Array1<f64>,
        f: f64,
        g: &Array1<f64>,
        direction: &Array1<f64>,
        lower: f64,
        nfev: &mut usize,
    ) -> Option<(Array1<f64>, f64, Array1<f64>)> {
        let mut alpha = 1.0;
        for _ in 0..self.config.max_line_search {
            let mut trial = x.clone();
            Zip::from(&mut trial).and(direction)
                .for_each(|t, &d| *t = (*t + alpha * d).max(lower));

            let step = &trial - x;
            if step.iter().all(|s| s.abs() <= f64::EPSILON * 1e-2) { return None }

            let (f_trial, g_trial) = objective.value_and_gradient(&trial.view());
            *nfev += 1;

            if f_trial.is_finite() && f_trial <= f + ARMIJO_C1 * g.dot(&step) {
                return Some((trial, f_trial, g_trial));
            }
            alpha *= BACKTRACK;
        }
        None
    }
}

/// Gradient component with outward pushes at the bound removed.
#[inline]
fn projected_component(x: f64, g: f64, lower: f64) -> f64 {
    if x <= lower { g.min(0.0) } else { g }
}

fn projected_grad_norm(x: &Array1<f64>, g: &Array1<f64>, lower: f64) -> f64 {
    x.iter().zip(g)
        .map(|(&xi, &gi)| projected_component(xi, gi, lower).abs())
        .fold(0.0, f64::max)
}

/// Variables not pinned at the bound by the gradient.
fn free_mask(x: &Array1<f64>, g: &Array1<f64>, lower: f64) -> Vec<bool> {
    x.iter().zip(g)
        .map(|(&xi, &gi)| !(xi <= lower && gi > 0.0))
        .collect()
}

fn masked_dot(a: &Array1<f64>, b: &Array1<f64>, free: &[bool]) -> f64 {
    a.iter().zip(b).zip(free)
        .map(|((&ai, &bi), &is_free)| if is_free { ai * bi } else { 0.0 })
        .sum()
}

fn scaled_steepest_descent(g: &Array1<f64>, hdiag: &Array1<f64>, free: &[bool]) -> Array1<f64> {
    Zip::from(g).and(hdiag).and(free)
        .map_collect(|&gi, &hi, &is_free| if is_free { -gi / hi } else { 0.0 })
}

/// Two-loop recursion restricted to the free variables, with `diag(1/h)` as the
/// initial inverse Hessian.
fn lbfgs_direction(g: &Array1<f64>, hdiag: &Array1<f64>, free: &[bool], history: &History) -> Array1<f64> {
    let mut q = Zip::from(g).and(free).map_collect(|&gi, &is_free| if is_free { gi } else { 0.0 });

    let mut alphas = Vec::with_capacity(history.pairs.len());
    for pair in history.pairs.iter().rev() {
        let alpha = pair.rho * masked_dot(&pair.s, &q, free);
        alphas.push(alpha);
        Zip::from(&mut q).and(&pair.y).and(free)
            .for_each(|qi, &yi, &is_free| if is_free { *qi -= alpha * yi });
    }

    let mut r = Zip::from(&q).and(hdiag).and(free)
        .map_collect(|&qi, &hi, &is_free| if is_free { qi / hi } else { 0.0 });

    for (pair, alpha) in history.pairs.iter().zip(alphas.into_iter().rev()) {
        let beta = pair.rho * masked_dot(&pair.y, &r, free);
        Zip::from(&mut r).and(&pair.s).and(free)
            .for_each(|ri, &si, &is_free| if is_free { *ri += si * (alpha - beta) });
    }

    r.mapv_inplace(|ri| -ri);
    r
}
