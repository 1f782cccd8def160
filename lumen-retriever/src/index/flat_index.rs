use crate::error::{Result, RetrieverError};
use serde::{Deserialize, Serialize};

/// Distance function used by an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// Squared Euclidean distance
    L2,
}

impl Metric {
    /// Tag written to the artifact header
    pub fn tag(self) -> u32 {
        match self {
            Metric::L2 => 1,
        }
    }

    pub fn from_tag(tag: u32) -> Option<Self> {
        match tag {
            1 => Some(Metric::L2),
            _ => None,
        }
    }
}

/// One search hit: the ordinal of a stored vector and its distance to the query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub ordinal: usize,
    pub distance: f32,
}

/// Exhaustive nearest-neighbor index over fixed-dimension vectors.
///
/// Vectors live in one contiguous row-major buffer; the *i*-th row is the vector that was
/// *i*-th in the input, so ordinals map directly onto the chunk sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatIndex {
    dimension: usize,
    data: Vec<f32>,
}

impl FlatIndex {
    /// Builds an index over `vectors`, preserving their order.
    ///
    /// # Errors
    /// - [`RetrieverError::EmptyIndex`] when `vectors` is empty or zero-dimensional
    /// - [`RetrieverError::DimensionMismatch`] when any vector differs in length from the first
    pub fn build(vectors: Vec<Vec<f32>>) -> Result<Self> {
        let dimension = match vectors.first() {
            Some(first) if !first.is_empty() => first.len(),
            _ => return Err(RetrieverError::EmptyIndex),
        };

        let mut data = Vec::with_capacity(vectors.len() * dimension);
        for vector in &vectors {
            if vector.len() != dimension {
                return Err(RetrieverError::DimensionMismatch {
                    expected: dimension,
                    actual: vector.len(),
                });
            }
            data.extend_from_slice(vector);
        }

        Ok(Self { dimension, data })
    }

    /// Reassembles an index from a row-major buffer, as read back from disk.
    pub fn from_raw(dimension: usize, data: Vec<f32>) -> Result<Self> {
        if dimension == 0 || data.is_empty() {
            return Err(RetrieverError::EmptyIndex);
        }
        if data.len() % dimension != 0 {
            return Err(RetrieverError::corrupt(format!(
                "{} values do not divide into rows of dimension {dimension}",
                data.len()
            )));
        }
        Ok(Self { dimension, data })
    }

    /// Returns up to `k` stored vectors closest to `query`.
    ///
    /// Results are ordered by ascending squared L2 distance; equal distances are ordered
    /// by ordinal. Asking for more neighbors than there are vectors returns all of them.
    pub fn query(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if query.len() != self.dimension {
            return Err(RetrieverError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        let mut neighbors: Vec<Neighbor> = self
            .rows()
            .enumerate()
            .map(|(ordinal, row)| Neighbor {
                ordinal,
                distance: squared_l2(query, row),
            })
            .collect();

        neighbors.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then(a.ordinal.cmp(&b.ordinal))
        });
        neighbors.truncate(k);

        Ok(neighbors)
    }

    /// Number of stored vectors
    pub fn len(&self) -> usize {
        self.data.len() / self.dimension
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn metric(&self) -> Metric {
        Metric::L2
    }

    /// The stored vector at `ordinal`, if any
    pub fn vector(&self, ordinal: usize) -> Option<&[f32]> {
        self.rows().nth(ordinal)
    }

    /// Row-major view of every stored value
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    fn rows(&self) -> std::slice::ChunksExact<'_, f32> {
        self.data.chunks_exact(self.dimension)
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_index() -> FlatIndex {
        FlatIndex::build(vec![
            vec![1.0, 0.0, 0.0],
            vec![0.9, 0.1, 0.0],
            vec![0.0, 1.0, 0.0],
        ])
        .unwrap()
    }

    #[test]
    fn test_build_and_query() {
        let index = sample_index();
        assert_eq!(index.len(), 3);
        assert_eq!(index.dimension(), 3);
        assert_eq!(index.metric(), Metric::L2);

        let results = index.query(&[1.0, 0.0, 0.0], 2).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].ordinal, 0);
        assert_eq!(results[0].distance, 0.0);
        assert_eq!(results[1].ordinal, 1);
        assert!((results[1].distance - 0.02).abs() < 1e-6);
    }

    #[test]
    fn test_k_larger_than_index_returns_all() {
        let index = sample_index();
        let results = index.query(&[0.0, 1.0, 0.0], 10).unwrap();

        let ordinals: Vec<usize> = results.iter().map(|n| n.ordinal).collect();
        assert_eq!(ordinals, vec![2, 1, 0]);
    }

    #[test]
    fn test_zero_k_returns_nothing() {
        assert!(sample_index().query(&[1.0, 0.0, 0.0], 0).unwrap().is_empty());
    }

    #[test]
    fn test_ties_break_by_ordinal() {
        let index = FlatIndex::build(vec![vec![0.0, 1.0], vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap();
        let results = index.query(&[1.0, 1.0], 3).unwrap();

        let ordinals: Vec<usize> = results.iter().map(|n| n.ordinal).collect();
        assert_eq!(ordinals, vec![0, 1, 2]);
        assert!(results.iter().all(|n| n.distance == 1.0));
    }

    #[test]
    fn test_dimension_mismatch() {
        let result = FlatIndex::build(vec![vec![1.0, 0.0, 0.0], vec![1.0, 0.0]]);
        assert!(matches!(
            result,
            Err(RetrieverError::DimensionMismatch {
                expected: 3,
                actual: 2
            })
        ));

        let result = sample_index().query(&[1.0, 0.0], 1);
        assert!(matches!(
            result,
            Err(RetrieverError::DimensionMismatch {
                expected: 3,
                actual: 2
            })
        ));
    }

    #[test]
    fn test_empty_build_is_rejected() {
        assert!(matches!(FlatIndex::build(vec![]), Err(RetrieverError::EmptyIndex)));
        assert!(matches!(
            FlatIndex::build(vec![vec![]]),
            Err(RetrieverError::EmptyIndex)
        ));
    }

    #[test]
    fn test_vectors_keep_insertion_order() {
        let index = sample_index();
        assert_eq!(index.vector(1), Some(&[0.9, 0.1, 0.0][..]));
        assert_eq!(index.vector(3), None);
    }

    #[test]
    fn test_from_raw_round_trips_buffer() {
        let index = sample_index();
        let rebuilt = FlatIndex::from_raw(3, index.as_slice().to_vec()).unwrap();
        assert_eq!(rebuilt, index);

        assert!(matches!(
            FlatIndex::from_raw(3, vec![1.0; 4]),
            Err(RetrieverError::CorruptArtifact { .. })
        ));
    }
}
