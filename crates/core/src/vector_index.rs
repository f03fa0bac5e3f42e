use crate::error::DocumentError;

/// Exhaustive nearest-neighbour index over chunk embeddings. Entries are
/// addressed by insertion position, which matches the chunk index.
#[derive(Debug, Clone)]
pub struct FlatVectorIndex {
    dimensions: usize,
    vectors: Vec<Vec<f32>>,
}

impl FlatVectorIndex {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            vectors: Vec::new(),
        }
    }

    pub fn build(dimensions: usize, vectors: Vec<Vec<f32>>) -> Result<Self, DocumentError> {
        let mut index = Self::new(dimensions);
        for vector in vectors {
            index.insert(vector)?;
        }
        Ok(index)
    }

    pub fn insert(&mut self, vector: Vec<f32>) -> Result<usize, DocumentError> {
        if vector.len() != self.dimensions {
            return Err(DocumentError::Index(format!(
                "embedding dimension {} != {}",
                vector.len(),
                self.dimensions
            )));
        }
        self.vectors.push(vector);
        Ok(self.vectors.len() - 1)
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Returns up to `k` `(position, squared distance)` pairs, closest first.
    /// Equal distances are ordered by position.
    pub fn nearest(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>, DocumentError> {
        if query.len() != self.dimensions {
            return Err(DocumentError::Index(format!(
                "query vector dim {} is not {}",
                query.len(),
                self.dimensions
            )));
        }

        let mut scored = self
            .vectors
            .iter()
            .enumerate()
            .map(|(position, vector)| (position, squared_euclidean(query, vector)))
            .collect::<Vec<_>>();

        scored.sort_by(|left, right| left.1.total_cmp(&right.1).then(left.0.cmp(&right.0)));
        scored.truncate(k);
        Ok(scored)
    }
}

pub fn squared_euclidean(left: &[f32], right: &[f32]) -> f32 {
    left.iter()
        .zip(right)
        .map(|(a, b)| {
            let delta = a - b;
            delta * delta
        })
        .sum()
}
