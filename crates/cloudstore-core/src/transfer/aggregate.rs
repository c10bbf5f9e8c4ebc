//! Aggregation of per-file failures.
//!
//! Batch layers report every failure of a batch as one `Multiple` value keyed
//! by file identifier. The merge policy is:
//!
//! - nested `Multiple` values are flattened into the outer map, so callers see
//!   one level of identifiers no matter how sub-batches were grouped;
//! - the key a nested aggregate was filed under is dropped in favour of the
//!   identifiers inside it;
//! - an empty nested aggregate stays a failure: it is filed under its own key
//!   as the catch-all kind;
//! - when an identifier appears twice, the later error replaces the earlier.

use std::collections::HashMap;

use super::types::RecordId;

/// Behaviour shared by the download and upload error taxonomies.
pub trait TransferFailure: Sized + Send + 'static {
    /// The cancellation kind.
    fn cancelled() -> Self;

    /// The catch-all kind.
    fn unknown() -> Self;

    /// Wrap a map of per-file errors without flattening it.
    fn from_map(errors: HashMap<RecordId, Self>) -> Self;

    /// Unwrap an aggregate, or hand back any other kind unchanged.
    fn into_map(self) -> Result<HashMap<RecordId, Self>, Self>;

    /// Check if this is a cancellation.
    fn is_cancelled(&self) -> bool;
}

/// Collects per-file failures and flattens nested aggregates as they arrive.
#[derive(Debug)]
pub struct Aggregator<E> {
    errors: HashMap<RecordId, E>,
}

impl<E: TransferFailure> Aggregator<E> {
    /// Create an empty aggregator.
    pub fn new() -> Self {
        Self {
            errors: HashMap::new(),
        }
    }

    /// Record the failure of one file.
    pub fn push(&mut self, id: RecordId, error: E) {
        match error.into_map() {
            Ok(nested) if nested.is_empty() => {
                tracing::debug!(id = %id, "Empty aggregate filed as unknown failure");
                self.errors.insert(id, E::unknown());
            }
            Ok(nested) => {
                for (nested_id, nested_error) in nested {
                    self.push(nested_id, nested_error);
                }
            }
            Err(single) => {
                self.errors.insert(id, single);
            }
        }
    }

    /// Number of distinct failed identifiers.
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// True if nothing failed.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Build the aggregate, or `None` if nothing failed.
    pub fn finish(self) -> Option<E> {
        if self.errors.is_empty() {
            None
        } else {
            Some(E::from_map(self.errors))
        }
    }
}

impl<E: TransferFailure> Default for Aggregator<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: TransferFailure> Extend<(RecordId, E)> for Aggregator<E> {
    fn extend<I: IntoIterator<Item = (RecordId, E)>>(&mut self, iter: I) {
        for (id, error) in iter {
            self.push(id, error);
        }
    }
}

/// Flatten per-file failures into one `Multiple`, or `None` if there are none.
pub fn aggregate<E, I>(failures: I) -> Option<E>
where
    E: TransferFailure,
    I: IntoIterator<Item = (RecordId, E)>,
{
    let mut aggregator = Aggregator::new();
    aggregator.extend(failures);
    aggregator.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::{DownloadError, UploadError};

    #[test]
    fn test_aggregate_round_trips_pairs() {
        let a = RecordId::new();
        let b = RecordId::new();
        let c = RecordId::new();
        let pairs = vec![
            (a, DownloadError::ItemNotFound),
            (b, DownloadError::NetworkUnavailable),
            (c, DownloadError::disk("NotFound", "missing")),
        ];

        let err = aggregate(pairs.clone()).unwrap();
        let map = err.into_map().unwrap();

        assert_eq!(map.len(), pairs.len());
        for (id, error) in pairs {
            assert_eq!(map.get(&id), Some(&error));
        }
    }

    #[test]
    fn test_empty_input_yields_none() {
        assert!(aggregate::<UploadError, _>(Vec::new()).is_none());
    }

    #[test]
    fn test_single_failure_stays_keyed() {
        let id = RecordId::new();
        let err = aggregate([(id, UploadError::NoData)]).unwrap();
        assert_eq!(
            err.errors().and_then(|m| m.get(&id)),
            Some(&UploadError::NoData)
        );
    }

    #[test]
    fn test_nested_aggregates_are_flattened() {
        let inner_a = RecordId::new();
        let inner_b = RecordId::new();
        let outer = RecordId::new();
        let batch_key = RecordId::new();

        let nested = UploadError::Multiple(HashMap::from([
            (inner_a, UploadError::Cancelled),
            (inner_b, UploadError::zone_not_found("docs")),
        ]));

        let err = aggregate([(outer, UploadError::Unauthorized), (batch_key, nested)]).unwrap();
        let map = err.errors().unwrap();

        assert_eq!(map.len(), 3);
        assert!(!map.contains_key(&batch_key));
        assert!(map.values().all(|e| e.errors().is_none()));
        assert_eq!(map.get(&inner_a), Some(&UploadError::Cancelled));
    }

    #[test]
    fn test_empty_nested_aggregate_keeps_identifier() {
        let id = RecordId::new();
        let err = aggregate([(id, DownloadError::Multiple(HashMap::new()))]).unwrap();
        let map = err.errors().unwrap();

        assert_eq!(map.len(), 1);
        assert_eq!(map.get(&id), Some(&DownloadError::Unknown));
    }

    #[test]
    fn test_empty_aggregate_inside_nested_one_is_kept() {
        let inner = RecordId::new();
        let batch_key = RecordId::new();
        let empty = UploadError::Multiple(HashMap::new());
        let nested = UploadError::Multiple(HashMap::from([(inner, empty)]));

        let map = aggregate([(batch_key, nested)]).unwrap().into_map().unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map.get(&inner), Some(&UploadError::Unknown));
    }

    #[test]
    fn test_later_duplicate_replaces_earlier() {
        let id = RecordId::new();
        let mut aggregator = Aggregator::new();
        aggregator.push(id, DownloadError::NetworkUnavailable);
        aggregator.push(id, DownloadError::ItemNotFound);

        assert_eq!(aggregator.len(), 1);
        let map = aggregator.finish().unwrap().into_map().unwrap();
        assert_eq!(map.get(&id), Some(&DownloadError::ItemNotFound));
    }
}
