//! Sparse pattern of the nodal head equations.
//!
//! Built once per network: each link is mapped to the rows of its two end
//! nodes. A link contributes an off-diagonal entry only when both ends are
//! junctions; links touching a tank or reservoir fold the fixed head into
//! the right-hand side instead.

use aq_network::{Network, RowMap};

use crate::error::{SolverError, SolverResult};

/// Rows touched by one link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkRows {
    pub from: Option<usize>,
    pub to: Option<usize>,
}

impl LinkRows {
    /// Both ends are junctions.
    pub fn offdiag(&self) -> Option<(usize, usize)> {
        self.from.zip(self.to)
    }
}

#[derive(Debug, Clone)]
pub struct SparsePattern {
    rows: RowMap,
    links: Vec<LinkRows>,
    /// Link slots contributing to each row, for diagnostics and ordering.
    row_links: Vec<Vec<usize>>,
}

impl SparsePattern {
    pub fn new(network: &Network) -> SolverResult<Self> {
        let rows = RowMap::from_network(network);
        if rows.row_count() == 0 {
            return Err(SolverError::ProblemSetup {
                what: "network has no junctions".into(),
            });
        }
        let mut row_links = vec![Vec::new(); rows.row_count()];
        let links = network
            .links()
            .iter()
            .enumerate()
            .map(|(k, link)| {
                let lr = LinkRows {
                    from: rows.row(link.from),
                    to: rows.row(link.to),
                };
                for r in [lr.from, lr.to].into_iter().flatten() {
                    row_links[r].push(k);
                }
                lr
            })
            .collect();
        Ok(Self {
            rows,
            links,
            row_links,
        })
    }

    pub fn row_map(&self) -> &RowMap {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.row_count()
    }

    #[inline]
    pub fn link(&self, slot: usize) -> LinkRows {
        self.links[slot]
    }

    pub fn links(&self) -> &[LinkRows] {
        &self.links
    }

    /// Links incident to a row.
    pub fn row_links(&self, row: usize) -> &[usize] {
        &self.row_links[row]
    }

    /// Number of distinct off-diagonal positions in the upper triangle.
    pub fn offdiag_count(&self) -> usize {
        let mut pairs: Vec<(usize, usize)> = self
            .links
            .iter()
            .filter_map(LinkRows::offdiag)
            .map(|(i, j)| (i.min(j), i.max(j)))
            .collect();
        pairs.sort_unstable();
        pairs.dedup();
        pairs.len()
    }
}
