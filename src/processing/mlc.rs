use crate::error::{CleanerError, CleanerResult};

/// Leaf pair boundaries along the axis across the leaves (z in the beam-eye
/// frame), in mm at the isocenter plane. Strictly increasing.
#[derive(Debug, Clone, PartialEq)]
pub struct MlcEdgeTable {
    edges: Vec<f64>,
}

impl MlcEdgeTable {
    /// The 60 pair high-definition MLC: 14 outer leaves of 5 mm, 32 central
    /// leaves of 2.5 mm and 14 outer leaves of 5 mm, spanning -110..110 mm.
    pub fn hd120() -> Self {
        let widths = std::iter::repeat(5.0)
            .take(14)
            .chain(std::iter::repeat(2.5).take(32))
            .chain(std::iter::repeat(5.0).take(14));

        let mut edges = Vec::with_capacity(61);
        let mut edge = -110.0;
        edges.push(edge);
        for width in widths {
            edge += width;
            edges.push(edge);
        }
        Self { edges }
    }

    /// Builds a table from explicit edges. Needs at least two edges, all
    /// finite and strictly increasing.
    pub fn from_edges(edges: Vec<f64>) -> CleanerResult<Self> {
        if edges.len() < 2 {
            return Err(CleanerError::MalformedInput(format!(
                "an MLC edge table needs at least 2 edges, got {}",
                edges.len()
            )));
        }
        if edges.iter().any(|e| !e.is_finite()) || edges.windows(2).any(|w| w[1] <= w[0]) {
            return Err(CleanerError::MalformedInput(
                "MLC edges must be finite and strictly increasing".into(),
            ));
        }
        Ok(Self { edges })
    }

    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    pub fn leaf_pairs(&self) -> usize {
        self.edges.len() - 1
    }

    /// Open interval (lower, upper) covered by leaf pair `leaf`.
    pub fn band(&self, leaf: usize) -> (f64, f64) {
        (self.edges[leaf], self.edges[leaf + 1])
    }
}

impl Default for MlcEdgeTable {
    fn default() -> Self {
        Self::hd120()
    }
}

/// Leaf positions of one control point. Bank A holds the leading edge of
/// every pair and bank B the trailing edge, both along x.
#[derive(Debug, Clone, PartialEq)]
pub struct LeafBank {
    pub bank_a: Vec<f64>,
    pub bank_b: Vec<f64>,
}

impl LeafBank {
    pub fn new(bank_a: Vec<f64>, bank_b: Vec<f64>) -> CleanerResult<Self> {
        if bank_a.len() != bank_b.len() {
            return Err(CleanerError::MalformedInput(format!(
                "leaf banks differ in length: A has {}, B has {}",
                bank_a.len(),
                bank_b.len()
            )));
        }
        Ok(Self { bank_a, bank_b })
    }

    /// Splits a record leaf/jaw position array: first half bank A, second
    /// half bank B.
    pub fn from_positions(positions: &[f64]) -> CleanerResult<Self> {
        if positions.is_empty() || positions.len() % 2 != 0 {
            return Err(CleanerError::MalformedInput(format!(
                "leaf position array must have an even, non-zero length, got {}",
                positions.len()
            )));
        }
        let (a, b) = positions.split_at(positions.len() / 2);
        Self::new(a.to_vec(), b.to_vec())
    }

    /// Inverse of [`LeafBank::from_positions`].
    pub fn to_positions(&self) -> Vec<f64> {
        self.bank_a.iter().chain(self.bank_b.iter()).copied().collect()
    }

    pub fn len(&self) -> usize {
        self.bank_a.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bank_a.is_empty()
    }

    /// Fails on the first pair whose bank A lies beyond bank B.
    pub fn validate(&self) -> CleanerResult<()> {
        for (leaf, (&a, &b)) in self.bank_a.iter().zip(self.bank_b.iter()).enumerate() {
            if !(a <= b) {
                return Err(CleanerError::InconsistentLeafBank {
                    leaf,
                    bank_a: a,
                    bank_b: b,
                });
            }
        }
        Ok(())
    }
}
