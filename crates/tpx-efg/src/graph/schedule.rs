use crate::*;
use anyhow::{bail, ensure, Result};

/// A [`Graph`] compiled into four stages: static-backward, static-forward,
/// dynamic-backward, dynamic-forward.
///
/// Static stages run exactly once at attach time, over every infoset.
/// Dynamic stages run per update over the visited infosets: backward
/// processes children before parents so children-aggregates observe
/// post-update child values, forward does the reverse for parents.
///
/// Color tags are remapped to a dense index at compile time; selecting
/// colors at update time is a per-step bitmask test, not a lookup.
#[derive(Debug)]
pub struct Schedule {
    widths: Vec<Width>,
    statics: [Vec<Step>; 2],
    dynamics: [Vec<Step>; 2],
    colors: Vec<usize>,
}

impl Schedule {
    pub fn compile(graph: Graph) -> Result<Self> {
        validate(&graph)?;
        let widths = graph.widths().to_vec();
        let mut colors = graph.steps().iter().map(|s| s.color).collect::<Vec<_>>();
        colors.sort_unstable();
        colors.dedup();
        let mut statics = [Vec::new(), Vec::new()];
        let mut dynamics = [Vec::new(), Vec::new()];
        for step in graph.steps() {
            let mut step = step.clone();
            step.color = colors.binary_search(&step.color).expect("collected above");
            let half = match step.pass {
                Pass::Backward => 0,
                Pass::Forward => 1,
            };
            if step.is_static {
                statics[half].push(step);
            } else {
                dynamics[half].push(step);
            }
        }
        Ok(Self {
            widths,
            statics,
            dynamics,
            colors,
        })
    }

    pub(crate) fn widths(&self) -> &[Width] {
        &self.widths
    }

    /// Resolve user color tags to the dense execution mask.
    pub(crate) fn mask(&self, colors: Option<&[usize]>) -> Result<Vec<bool>> {
        match colors {
            None => Ok(vec![true; self.colors.len()]),
            Some(tags) => {
                let mut mask = vec![false; self.colors.len()];
                for &tag in tags {
                    match self.colors.binary_search(&tag) {
                        Ok(dense) => mask[dense] = true,
                        Err(_) => bail!("unknown color {}", tag),
                    }
                }
                Ok(mask)
            }
        }
    }

    /// One-time initialization over every infoset, backward then forward.
    pub(crate) fn run_static(&self, tree: &GameTree, storage: &mut Storage) {
        for &at in tree.order().iter().rev() {
            for step in &self.statics[0] {
                self.exec(step, tree, storage, at);
            }
        }
        for &at in tree.order() {
            for step in &self.statics[1] {
                self.exec(step, tree, storage, at);
            }
        }
    }

    /// One dynamic update over the visited infosets (given in forward
    /// order), restricted to the masked colors.
    pub(crate) fn run_dynamic(
        &self,
        tree: &GameTree,
        storage: &mut Storage,
        visited: &[InfosetId],
        mask: &[bool],
    ) {
        for &at in visited.iter().rev() {
            for step in &self.dynamics[0] {
                if mask[step.color] {
                    self.exec(step, tree, storage, at);
                }
            }
        }
        for &at in visited {
            for step in &self.dynamics[1] {
                if mask[step.color] {
                    self.exec(step, tree, storage, at);
                }
            }
        }
    }

    fn exec(&self, step: &Step, tree: &GameTree, storage: &mut Storage, at: InfosetId) {
        let value = step.expr.eval(&Eval { tree, storage, at });
        let width = self.widths[step.target.index()].resolve(tree.infoset(at).actions);
        let value = if value.width() == 1 && width > 1 {
            Vector::fill(width, value.get(0))
        } else {
            value
        };
        debug_assert_eq!(value.width(), width, "step result width drifted");
        storage.put(at, step.target, value);
    }
}

/// Construction-time checks: a signal's dynamic writers must share one
/// pass, and static steps may read only structural builtins and signals
/// written by earlier static steps.
fn validate(graph: &Graph) -> Result<()> {
    let mut writer: Vec<Option<Pass>> = vec![None; graph.widths().len()];
    for step in graph.steps().iter().filter(|s| !s.is_static) {
        match writer[step.target.index()] {
            None => writer[step.target.index()] = Some(step.pass),
            Some(pass) => ensure!(
                pass == step.pass,
                "signal has dynamic writers in both the backward and forward pass"
            ),
        }
    }
    let mut written = vec![false; graph.widths().len()];
    written[ACTION_SET_SIZE.index()] = true;
    written[SUBTREE_SIZE.index()] = true;
    let backward = graph.steps().iter().filter(|s| s.is_static && s.pass == Pass::Backward);
    let forward = graph.steps().iter().filter(|s| s.is_static && s.pass == Pass::Forward);
    for step in backward.chain(forward) {
        let mut reads = Vec::new();
        step.expr.reads(&mut reads);
        for signal in reads {
            ensure!(
                written[signal.index()],
                "static step reads a signal with no prior static value"
            );
        }
        written[step.target.index()] = true;
    }
    Ok(())
}

/// Evaluation context for one step at one infoset.
pub(crate) struct Eval<'a> {
    pub tree: &'a GameTree,
    pub storage: &'a Storage,
    pub at: InfosetId,
}

impl Expr {
    /// Evaluate against current storage. Degenerate arithmetic (division
    /// by zero, log of a negative) propagates NaN/Inf; floors belong to
    /// the graphs that need them.
    pub(crate) fn eval(&self, ctx: &Eval) -> Vector {
        match self {
            Expr::Read(s) => ctx.storage.get(ctx.at, *s).clone(),
            Expr::Const(c) => Vector::scalar(*c),
            Expr::Unary(op, x) => {
                let x = x.eval(ctx);
                match op {
                    Unary::Neg => x.map(|v| -v),
                    Unary::Exp => x.map(f64::exp),
                    Unary::Log => x.ln(),
                    Unary::Sum => Vector::scalar(x.sum()),
                    Unary::Mean => Vector::scalar(x.mean()),
                    Unary::Max => Vector::scalar(x.max()),
                    Unary::Min => Vector::scalar(x.min()),
                    Unary::Argmax => x.argmax(),
                    Unary::Argmin => x.argmin(),
                }
            }
            Expr::Binary(op, a, b) => {
                let (a, b) = (a.eval(ctx), b.eval(ctx));
                match op {
                    Binary::Add => a.zip(&b, |x, y| x + y),
                    Binary::Sub => a.zip(&b, |x, y| x - y),
                    Binary::Mul => a.zip(&b, |x, y| x * y),
                    Binary::Div => a.zip(&b, |x, y| x / y),
                    Binary::Pow => a.zip(&b, f64::powf),
                    Binary::Maximum => a.zip(&b, f64::max),
                    Binary::Minimum => a.zip(&b, f64::min),
                    Binary::Gt => a.zip(&b, |x, y| (x > y) as u8 as f64),
                    Binary::Ge => a.zip(&b, |x, y| (x >= y) as u8 as f64),
                    Binary::Lt => a.zip(&b, |x, y| (x < y) as u8 as f64),
                    Binary::Le => a.zip(&b, |x, y| (x <= y) as u8 as f64),
                    Binary::Eq => a.zip(&b, |x, y| (x == y) as u8 as f64),
                }
            }
            Expr::Dot(a, b) => Vector::scalar(a.eval(ctx).dot(&b.eval(ctx))),
            Expr::Normalize {
                x,
                p_norm,
                ignore_negative,
            } => x.eval(ctx).normalize(*p_norm, *ignore_negative),
            Expr::Project {
                x,
                distance,
                gamma,
                mu,
            } => {
                let x = x.eval(ctx);
                let mu = mu.as_ref().map(|mu| mu.eval(ctx));
                kernel::project(&x, *distance, *gamma, mu.as_ref())
            }
            Expr::Aggregate {
                signal,
                reducer,
                relation,
                players,
                padding,
            } => aggregate(
                ctx.tree,
                ctx.storage,
                ctx.at,
                *signal,
                *reducer,
                *relation,
                *players,
                *padding,
            ),
        }
    }
}
