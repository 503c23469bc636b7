use crate::*;
use anyhow::{ensure, Result};

/// A first-class expression over signals, built once at graph-construction
/// time and evaluated per infoset per pass.
///
/// Arithmetic is elementwise with scalar broadcast; cross-infoset reads
/// happen only through [`Expr::aggregate`]. Operators are overloaded so
/// update rules read like the formulas they implement.
#[derive(Debug, Clone)]
pub enum Expr {
    Read(Signal),
    Const(Utility),
    Unary(Unary, Box<Expr>),
    Binary(Binary, Box<Expr>, Box<Expr>),
    Dot(Box<Expr>, Box<Expr>),
    Normalize {
        x: Box<Expr>,
        p_norm: Energy,
        ignore_negative: bool,
    },
    Project {
        x: Box<Expr>,
        distance: Distance,
        gamma: Probability,
        mu: Option<Box<Expr>>,
    },
    Aggregate {
        signal: Signal,
        reducer: Reducer,
        relation: Relation,
        players: PlayerFilter,
        padding: Utility,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unary {
    Neg,
    Exp,
    Log,
    Sum,
    Mean,
    Max,
    Min,
    Argmax,
    Argmin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binary {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Maximum,
    Minimum,
    Gt,
    Ge,
    Lt,
    Le,
    Eq,
}

impl Expr {
    fn unary(self, op: Unary) -> Self {
        Expr::Unary(op, Box::new(self))
    }
    fn binary(self, op: Binary, rhs: impl Into<Expr>) -> Self {
        Expr::Binary(op, Box::new(self), Box::new(rhs.into()))
    }

    pub fn exp(self) -> Self {
        self.unary(Unary::Exp)
    }
    pub fn log(self) -> Self {
        self.unary(Unary::Log)
    }
    pub fn sum(self) -> Self {
        self.unary(Unary::Sum)
    }
    pub fn mean(self) -> Self {
        self.unary(Unary::Mean)
    }
    pub fn max(self) -> Self {
        self.unary(Unary::Max)
    }
    pub fn min(self) -> Self {
        self.unary(Unary::Min)
    }
    pub fn argmax(self) -> Self {
        self.unary(Unary::Argmax)
    }
    pub fn argmin(self) -> Self {
        self.unary(Unary::Argmin)
    }
    pub fn pow(self, rhs: impl Into<Expr>) -> Self {
        self.binary(Binary::Pow, rhs)
    }
    pub fn maximum(self, rhs: impl Into<Expr>) -> Self {
        self.binary(Binary::Maximum, rhs)
    }
    pub fn minimum(self, rhs: impl Into<Expr>) -> Self {
        self.binary(Binary::Minimum, rhs)
    }
    pub fn gt(self, rhs: impl Into<Expr>) -> Self {
        self.binary(Binary::Gt, rhs)
    }
    pub fn ge(self, rhs: impl Into<Expr>) -> Self {
        self.binary(Binary::Ge, rhs)
    }
    pub fn lt(self, rhs: impl Into<Expr>) -> Self {
        self.binary(Binary::Lt, rhs)
    }
    pub fn le(self, rhs: impl Into<Expr>) -> Self {
        self.binary(Binary::Le, rhs)
    }
    pub fn eq(self, rhs: impl Into<Expr>) -> Self {
        self.binary(Binary::Eq, rhs)
    }
    pub fn dot(self, rhs: impl Into<Expr>) -> Self {
        Expr::Dot(Box::new(self), Box::new(rhs.into()))
    }
    pub fn normalize(self, p_norm: Energy, ignore_negative: bool) -> Self {
        Expr::Normalize {
            x: Box::new(self),
            p_norm,
            ignore_negative,
        }
    }
    pub fn project(self, distance: Distance, gamma: Probability, mu: Option<Expr>) -> Self {
        Expr::Project {
            x: Box::new(self),
            distance,
            gamma,
            mu: mu.map(Box::new),
        }
    }
    /// Cross-infoset reduction of a declared signal. See [`aggregate`].
    pub fn aggregate(
        signal: Signal,
        reducer: Reducer,
        relation: Relation,
        players: PlayerFilter,
        padding: Utility,
    ) -> Self {
        Expr::Aggregate {
            signal,
            reducer,
            relation,
            players,
            padding,
        }
    }

    /// Infer this expression's symbolic width against declared signals.
    /// The only hard mismatch is a dot product of a scalar with a vector.
    pub(crate) fn width(&self, declared: &[Width]) -> Result<Width> {
        match self {
            Expr::Read(s) => Ok(declared[s.index()]),
            Expr::Const(_) => Ok(Width::Scalar),
            Expr::Unary(op, x) => {
                let w = x.width(declared)?;
                Ok(match op {
                    Unary::Sum | Unary::Mean | Unary::Max | Unary::Min => Width::Scalar,
                    _ => w,
                })
            }
            Expr::Binary(_, a, b) => Ok(a.width(declared)?.join(b.width(declared)?)),
            Expr::Dot(a, b) => {
                let (wa, wb) = (a.width(declared)?, b.width(declared)?);
                ensure!(wa == wb, "dot product of mismatched widths");
                Ok(Width::Scalar)
            }
            Expr::Normalize { x, .. } => x.width(declared),
            Expr::Project { x, mu, .. } => {
                let w = x.width(declared)?;
                if let Some(mu) = mu {
                    ensure!(
                        mu.width(declared)? == w,
                        "projection floor width differs from its input"
                    );
                }
                Ok(w)
            }
            Expr::Aggregate { relation, .. } => Ok(match relation {
                Relation::Children => Width::Actions,
                Relation::Parent | Relation::Itself => Width::Scalar,
            }),
        }
    }

    /// Every signal this expression reads, aggregation sources included.
    pub(crate) fn reads(&self, out: &mut Vec<Signal>) {
        match self {
            Expr::Read(s) => out.push(*s),
            Expr::Const(_) => {}
            Expr::Unary(_, x) => x.reads(out),
            Expr::Binary(_, a, b) | Expr::Dot(a, b) => {
                a.reads(out);
                b.reads(out);
            }
            Expr::Normalize { x, .. } => x.reads(out),
            Expr::Project { x, mu, .. } => {
                x.reads(out);
                if let Some(mu) = mu {
                    mu.reads(out);
                }
            }
            Expr::Aggregate { signal, .. } => out.push(*signal),
        }
    }
}

impl From<Signal> for Expr {
    fn from(signal: Signal) -> Self {
        Expr::Read(signal)
    }
}
impl From<f64> for Expr {
    fn from(value: f64) -> Self {
        Expr::Const(value)
    }
}

impl<T: Into<Expr>> std::ops::Add<T> for Expr {
    type Output = Expr;
    fn add(self, rhs: T) -> Expr {
        self.binary(Binary::Add, rhs)
    }
}
impl<T: Into<Expr>> std::ops::Sub<T> for Expr {
    type Output = Expr;
    fn sub(self, rhs: T) -> Expr {
        self.binary(Binary::Sub, rhs)
    }
}
impl<T: Into<Expr>> std::ops::Mul<T> for Expr {
    type Output = Expr;
    fn mul(self, rhs: T) -> Expr {
        self.binary(Binary::Mul, rhs)
    }
}
impl<T: Into<Expr>> std::ops::Div<T> for Expr {
    type Output = Expr;
    fn div(self, rhs: T) -> Expr {
        self.binary(Binary::Div, rhs)
    }
}
impl std::ops::Neg for Expr {
    type Output = Expr;
    fn neg(self) -> Expr {
        self.unary(Unary::Neg)
    }
}
impl std::ops::Add<Expr> for f64 {
    type Output = Expr;
    fn add(self, rhs: Expr) -> Expr {
        Expr::from(self) + rhs
    }
}
impl std::ops::Sub<Expr> for f64 {
    type Output = Expr;
    fn sub(self, rhs: Expr) -> Expr {
        Expr::from(self) - rhs
    }
}
impl std::ops::Mul<Expr> for f64 {
    type Output = Expr;
    fn mul(self, rhs: Expr) -> Expr {
        Expr::from(self) * rhs
    }
}
impl std::ops::Div<Expr> for f64 {
    type Output = Expr;
    fn div(self, rhs: Expr) -> Expr {
        Expr::from(self) / rhs
    }
}
