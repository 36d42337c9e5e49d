//! Partition keys, partitions, mutations and the lazy read stream.
//!
//! Reads are modelled as a [`PartitionStream`]: a boxed iterator of
//! partitions produced lazily by the shard. Listeners may wrap the stream
//! with [`tap`], which observes each partition key as it flows past without
//! filtering, reordering or duplicating anything.
//!
//! ```
//! use toppartitions::partition::{tap, Partition, PartitionKey, PartitionStream};
//!
//! let parts = vec![Partition::new("p1"), Partition::new("p2")];
//! let mut seen = Vec::new();
//! let reader: PartitionStream<'_> = Box::new(parts.clone().into_iter());
//! let out: Vec<_> = tap(reader, |key: &PartitionKey| seen.push(key.clone())).collect();
//!
//! assert_eq!(out, parts);
//! assert_eq!(seen, vec![PartitionKey::from("p1"), PartitionKey::from("p2")]);
//! ```

use std::collections::BTreeMap;
use std::fmt;

/// Serialized partition key.
///
/// The canonical form, used as the estimator key, is the lowercase hex
/// encoding of the bytes; it is identical on every shard.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartitionKey(Vec<u8>);

impl PartitionKey {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Canonical, schema-independent string form of the key.
    pub fn canonical(&self) -> String {
        hex::encode(&self.0)
    }

    /// Parses a key back from its canonical form.
    ///
    /// ```
    /// use toppartitions::partition::PartitionKey;
    ///
    /// let key = PartitionKey::from("user:7");
    /// assert_eq!(PartitionKey::from_canonical(&key.canonical()).unwrap(), key);
    /// assert!(PartitionKey::from_canonical("zz").is_err());
    /// ```
    pub fn from_canonical(canonical: &str) -> Result<Self, hex::FromHexError> {
        hex::decode(canonical).map(Self)
    }
}

impl From<&str> for PartitionKey {
    fn from(value: &str) -> Self {
        Self(value.as_bytes().to_vec())
    }
}

impl From<&[u8]> for PartitionKey {
    fn from(value: &[u8]) -> Self {
        Self(value.to_vec())
    }
}

impl From<Vec<u8>> for PartitionKey {
    fn from(value: Vec<u8>) -> Self {
        Self(value)
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

/// Write to a single partition: a set of `(clustering, value)` upserts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mutation {
    key: PartitionKey,
    rows: Vec<(Vec<u8>, Vec<u8>)>,
}

impl Mutation {
    pub fn new(key: impl Into<PartitionKey>) -> Self {
        Self {
            key: key.into(),
            rows: Vec::new(),
        }
    }

    pub fn with_row(mut self, clustering: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        self.rows.push((clustering.into(), value.into()));
        self
    }

    pub fn key(&self) -> &PartitionKey {
        &self.key
    }

    pub fn rows(&self) -> &[(Vec<u8>, Vec<u8>)] {
        &self.rows
    }
}

/// Materialized partition: key plus rows ordered by clustering bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    key: PartitionKey,
    rows: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl Partition {
    pub fn new(key: impl Into<PartitionKey>) -> Self {
        Self {
            key: key.into(),
            rows: BTreeMap::new(),
        }
    }

    pub fn key(&self) -> &PartitionKey {
        &self.key
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn rows(&self) -> impl Iterator<Item = (&[u8], &[u8])> {
        self.rows.iter().map(|(k, v)| (k.as_slice(), v.as_slice()))
    }

    /// Applies `mutation`'s rows, last write wins per clustering key.
    pub fn apply(&mut self, mutation: &Mutation) {
        for (clustering, value) in mutation.rows() {
            self.rows.insert(clustering.clone(), value.clone());
        }
    }

    /// Keeps at most `limit` rows, lowest clustering keys first.
    pub fn truncate_rows(&mut self, limit: usize) {
        while self.rows.len() > limit {
            self.rows.pop_last();
        }
    }
}

/// Set of partitions a read covers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PartitionRange {
    /// Every partition of the table.
    #[default]
    Full,
    /// Exactly one partition.
    Single(PartitionKey),
    /// Keys in `[start, end)`; an open side is unbounded.
    Between {
        start: Option<PartitionKey>,
        end: Option<PartitionKey>,
    },
}

impl PartitionRange {
    pub fn contains(&self, key: &PartitionKey) -> bool {
        match self {
            Self::Full => true,
            Self::Single(only) => only == key,
            Self::Between { start, end } => {
                start.as_ref().map_or(true, |s| key >= s) && end.as_ref().map_or(true, |e| key < e)
            },
        }
    }
}

/// Projection applied to each partition of a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PartitionSlice {
    row_limit: Option<usize>,
}

impl PartitionSlice {
    /// Every row of every selected partition.
    pub fn full() -> Self {
        Self::default()
    }

    pub fn with_row_limit(limit: usize) -> Self {
        Self {
            row_limit: Some(limit),
        }
    }

    pub fn row_limit(&self) -> Option<usize> {
        self.row_limit
    }
}

/// Lazy sequence of partitions flowing from a shard to a reader.
pub type PartitionStream<'a> = Box<dyn Iterator<Item = Partition> + 'a>;

/// Pass-through decorator that reports each partition key to `observe`.
#[derive(Debug)]
pub struct Tap<I, F> {
    inner: I,
    observe: F,
}

impl<I, F> Iterator for Tap<I, F>
where
    I: Iterator<Item = Partition>,
    F: FnMut(&PartitionKey),
{
    type Item = Partition;

    fn next(&mut self) -> Option<Partition> {
        let partition = self.inner.next()?;
        (self.observe)(partition.key());
        Some(partition)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

/// Wraps `reader` so that `observe` sees every partition key it produces.
pub fn tap<'a, F>(reader: PartitionStream<'a>, observe: F) -> PartitionStream<'a>
where
    F: FnMut(&PartitionKey) + 'a,
{
    Box::new(Tap {
        inner: reader,
        observe,
    })
}
