//! Linear-system accumulator.
//!
//! Coefficients of the nodal head equations are gathered into flat arrays:
//! one diagonal and one right-hand side entry per junction row, one
//! off-diagonal slot per link, and a net inflow per node. Every writer adds
//! into its slot; nothing is ever overwritten during assembly, so partial
//! systems built on different threads can be summed with [`LinearSystem::merge`].
//!
//! Indices are validated once by [`crate::SparsePattern`]; the accessors
//! index directly and panic on a caller bug.

#[derive(Debug, Clone, PartialEq)]
pub struct LinearSystem {
    /// Diagonal coefficients, per row.
    aii: Vec<f64>,
    /// Off-diagonal coefficients, per link.
    aij: Vec<f64>,
    /// Right-hand side, per row.
    f: Vec<f64>,
    /// Net inflow, per node.
    x: Vec<f64>,
}

impl LinearSystem {
    pub fn new(rows: usize, links: usize, nodes: usize) -> Self {
        Self {
            aii: vec![0.0; rows],
            aij: vec![0.0; links],
            f: vec![0.0; rows],
            x: vec![0.0; nodes],
        }
    }

    /// Zero every coefficient; called at the start of each assembly pass.
    pub fn clear(&mut self) {
        self.aii.fill(0.0);
        self.aij.fill(0.0);
        self.f.fill(0.0);
        self.x.fill(0.0);
    }

    pub fn rows(&self) -> usize {
        self.aii.len()
    }

    #[inline]
    pub fn add_diag(&mut self, row: usize, delta: f64) {
        self.aii[row] += delta;
    }

    #[inline]
    pub fn add_offdiag(&mut self, link: usize, delta: f64) {
        self.aij[link] += delta;
    }

    #[inline]
    pub fn add_rhs(&mut self, row: usize, delta: f64) {
        self.f[row] += delta;
    }

    #[inline]
    pub fn add_inflow(&mut self, node: usize, delta: f64) {
        self.x[node] += delta;
    }

    #[inline]
    pub fn diag(&self, row: usize) -> f64 {
        self.aii[row]
    }

    #[inline]
    pub fn offdiag(&self, link: usize) -> f64 {
        self.aij[link]
    }

    #[inline]
    pub fn rhs(&self, row: usize) -> f64 {
        self.f[row]
    }

    #[inline]
    pub fn inflow(&self, node: usize) -> f64 {
        self.x[node]
    }

    /// Add every coefficient of `other` into `self`. Both systems must have
    /// the same shape.
    pub fn merge(mut self, other: &LinearSystem) -> Self {
        debug_assert_eq!(self.aii.len(), other.aii.len());
        debug_assert_eq!(self.aij.len(), other.aij.len());
        debug_assert_eq!(self.x.len(), other.x.len());
        add_into(&mut self.aii, &other.aii);
        add_into(&mut self.aij, &other.aij);
        add_into(&mut self.f, &other.f);
        add_into(&mut self.x, &other.x);
        self
    }
}

fn add_into(dst: &mut [f64], src: &[f64]) {
    for (d, s) in dst.iter_mut().zip(src) {
        *d += s;
    }
}
