use crate::*;
use anyhow::{ensure, Result};

/// Computation-graph builder.
///
/// Algorithms declare signals and steps against a `Graph`, then hand it to
/// [`Environment::attach`] for compilation. Stage state is explicit:
/// [`Graph::backward`] / [`Graph::forward`] select the pass and staticness
/// for subsequently declared steps, and [`Graph::color`] tags them so
/// subsets of the dynamic schedule can be run independently.
///
/// Declaration order is program order: within a pass, steps run in the
/// order they were declared, at every infoset the pass touches.
#[derive(Debug, Clone)]
pub struct Graph {
    widths: Vec<Width>,
    steps: Vec<Step>,
    pass: Pass,
    is_static: bool,
    color: usize,
}

/// One compiled unit of work: recompute `target` from `expr`.
#[derive(Debug, Clone)]
pub struct Step {
    pub(crate) target: Signal,
    pub(crate) expr: Expr,
    pub(crate) pass: Pass,
    pub(crate) is_static: bool,
    pub(crate) color: usize,
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Graph {
    pub fn new() -> Self {
        Self {
            widths: super::signal::BUILTIN_WIDTHS.to_vec(),
            steps: Vec::new(),
            pass: Pass::Backward,
            is_static: false,
            color: 0,
        }
    }

    // stage selection

    /// Declare subsequent steps in the backward (leaves to root) pass.
    pub fn backward(&mut self, is_static: bool) -> &mut Self {
        self.pass = Pass::Backward;
        self.is_static = is_static;
        self
    }
    /// Declare subsequent steps in the forward (root to leaves) pass.
    pub fn forward(&mut self, is_static: bool) -> &mut Self {
        self.pass = Pass::Forward;
        self.is_static = is_static;
        self
    }
    /// Tag subsequent steps with a color for selective execution.
    pub fn color(&mut self, color: usize) -> &mut Self {
        self.color = color;
        self
    }

    // builtin accessors

    pub fn utility(&self) -> Expr {
        Expr::from(UTILITY)
    }
    pub fn action_set_size(&self) -> Expr {
        Expr::from(ACTION_SET_SIZE)
    }
    pub fn reach_prob(&self) -> Expr {
        Expr::from(REACH_PROB)
    }
    pub fn opponent_reach_prob(&self) -> Expr {
        Expr::from(OPPONENT_REACH_PROB)
    }
    pub fn subtree_size(&self) -> Expr {
        Expr::from(SUBTREE_SIZE)
    }

    // declarations

    /// Declare a signal initialized to `value` once, at attach time.
    pub fn constant(&mut self, width: Width, value: Utility) -> Signal {
        let target = self.declare(width);
        self.steps.push(Step {
            target,
            expr: Expr::Const(value),
            pass: self.pass,
            is_static: true,
            color: self.color,
        });
        target
    }

    /// Declare a fresh signal recomputed from `expr` in the current stage.
    pub fn define(&mut self, expr: Expr) -> Result<Signal> {
        let width = expr.width(&self.widths)?;
        let target = self.declare(width);
        self.push(target, expr);
        Ok(target)
    }

    /// Recompute an existing signal inplace in the current stage. The
    /// expression may be narrower than the target (scalar broadcast) but
    /// never wider.
    pub fn update(&mut self, signal: Signal, expr: Expr) -> Result<()> {
        let width = expr.width(&self.widths)?;
        let declared = self.widths[signal.index()];
        ensure!(
            width.join(declared) == declared,
            "cannot write an action-wide expression into a scalar signal"
        );
        self.push(signal, expr);
        Ok(())
    }

    fn declare(&mut self, width: Width) -> Signal {
        self.widths.push(width);
        Signal(self.widths.len() - 1)
    }
    fn push(&mut self, target: Signal, expr: Expr) {
        self.steps.push(Step {
            target,
            expr,
            pass: self.pass,
            is_static: self.is_static,
            color: self.color,
        });
    }

    pub(crate) fn widths(&self) -> &[Width] {
        &self.widths
    }
    pub(crate) fn steps(&self) -> &[Step] {
        &self.steps
    }
}
