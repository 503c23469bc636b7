use tpx_core::*;

/// A fixed-width vector of `f64` signal values.
///
/// All per-infoset signal storage bottoms out in this type. Widths are fixed
/// at declaration time: elementwise operations broadcast a width-1 operand
/// against a wider one, and never resize their inputs.
///
/// Degenerate arithmetic (division by zero, log of a negative) is not
/// trapped here; NaN/Inf propagate into storage and floors are the
/// algorithm layer's responsibility.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Vector {
    elems: Vec<Utility>,
}

impl Vector {
    /// A vector of `width` copies of `value`.
    pub fn fill(width: usize, value: Utility) -> Self {
        Self {
            elems: vec![value; width],
        }
    }
    /// A width-1 vector holding a single scalar.
    pub fn scalar(value: Utility) -> Self {
        Self::fill(1, value)
    }
    pub fn width(&self) -> usize {
        self.elems.len()
    }
    pub fn get(&self, i: usize) -> Utility {
        self.elems[i]
    }
    pub fn set(&mut self, i: usize, value: Utility) {
        self.elems[i] = value;
    }
    /// Overwrite every entry with `value`.
    pub fn reset(&mut self, value: Utility) {
        self.elems.iter_mut().for_each(|x| *x = value);
    }
    pub fn iter(&self) -> impl Iterator<Item = Utility> + '_ {
        self.elems.iter().copied()
    }
    pub fn as_slice(&self) -> &[Utility] {
        &self.elems
    }

    /// Broadcast read: width-1 vectors repeat their single entry.
    fn at(&self, i: usize) -> Utility {
        self.elems[if self.elems.len() == 1 { 0 } else { i }]
    }

    /// Elementwise combination with scalar broadcast.
    pub fn zip(&self, rhs: &Self, f: impl Fn(Utility, Utility) -> Utility) -> Self {
        debug_assert!(
            self.width() == rhs.width() || self.width() == 1 || rhs.width() == 1,
            "width mismatch: {} vs {}",
            self.width(),
            rhs.width()
        );
        let width = self.width().max(rhs.width());
        Self {
            elems: (0..width).map(|i| f(self.at(i), rhs.at(i))).collect(),
        }
    }
    /// Elementwise transformation.
    pub fn map(&self, f: impl Fn(Utility) -> Utility) -> Self {
        Self {
            elems: self.elems.iter().map(|&x| f(x)).collect(),
        }
    }

    // reductions (all produce width-1 results)

    pub fn sum(&self) -> Utility {
        self.elems.iter().sum()
    }
    pub fn mean(&self) -> Utility {
        if self.elems.is_empty() {
            0.0
        } else {
            self.sum() / self.elems.len() as Utility
        }
    }
    pub fn max(&self) -> Utility {
        self.elems.iter().copied().fold(-INF, Utility::max)
    }
    pub fn min(&self) -> Utility {
        self.elems.iter().copied().fold(INF, Utility::min)
    }
    /// One-hot indicator of the first maximal entry.
    pub fn argmax(&self) -> Self {
        let mut best = 0;
        for i in 1..self.elems.len() {
            if self.elems[i] > self.elems[best] {
                best = i;
            }
        }
        let mut out = Self::fill(self.width(), 0.0);
        out.set(best, 1.0);
        out
    }
    /// One-hot indicator of the first minimal entry.
    pub fn argmin(&self) -> Self {
        let mut best = 0;
        for i in 1..self.elems.len() {
            if self.elems[i] < self.elems[best] {
                best = i;
            }
        }
        let mut out = Self::fill(self.width(), 0.0);
        out.set(best, 1.0);
        out
    }
    /// Inner product. Requires matching widths.
    pub fn dot(&self, rhs: &Self) -> Utility {
        debug_assert!(self.width() == rhs.width(), "dot width mismatch");
        self.elems
            .iter()
            .zip(rhs.elems.iter())
            .map(|(a, b)| a * b)
            .sum()
    }

    /// Natural log with inputs floored at EPS: log is only meaningful on
    /// (near-)nonnegative signals and the floor keeps a zero entry from
    /// poisoning a log-domain update.
    pub fn ln(&self) -> Self {
        debug_assert!(
            self.elems.iter().all(|&x| x > -EPS),
            "log of a negative signal"
        );
        self.map(|x| if x < EPS { EPS.ln() } else { x.ln() })
    }

    /// Normalize by p-norm. `ignore_negative` clamps negatives to zero first;
    /// a vanishing norm falls back to the uniform vector; `p_norm == 0`
    /// divides by the width.
    pub fn normalize(&self, p_norm: Energy, ignore_negative: bool) -> Self {
        let clamped = if ignore_negative {
            self.map(|x| if x < 0.0 { 0.0 } else { x })
        } else {
            self.clone()
        };
        let n = clamped.width() as Utility;
        if p_norm < EPS {
            return clamped.map(|x| x / n);
        }
        let norm = clamped
            .elems
            .iter()
            .map(|x| x.abs().powf(p_norm))
            .sum::<Utility>();
        if norm < EPS {
            return Self::fill(clamped.width(), 1.0 / n);
        }
        let norm = norm.powf(1.0 / p_norm);
        clamped.map(|x| x / norm)
    }
}

impl From<Vec<Utility>> for Vector {
    fn from(elems: Vec<Utility>) -> Self {
        Self { elems }
    }
}
