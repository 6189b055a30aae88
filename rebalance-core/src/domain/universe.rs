//! Instrument universe: ordered identifiers with total lookups.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use super::InstrumentId;

#[derive(Debug, Error, PartialEq)]
pub enum UniverseError {
    #[error("instrument '{0}' appears more than once in the universe")]
    Duplicate(InstrumentId),

    #[error("instrument '{0}' is not part of the universe")]
    Unknown(InstrumentId),
}

/// Ordered set of instruments. Column `i` of every panel and holding row
/// refers to `ids()[i]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<InstrumentId>", into = "Vec<InstrumentId>")]
pub struct Universe {
    ids: Vec<InstrumentId>,
    index: HashMap<InstrumentId, usize>,
}

impl Universe {
    pub fn new(ids: Vec<InstrumentId>) -> Result<Self, UniverseError> {
        let mut index = HashMap::with_capacity(ids.len());
        for (i, id) in ids.iter().enumerate() {
            if index.insert(id.clone(), i).is_some() {
                return Err(UniverseError::Duplicate(id.clone()));
            }
        }
        Ok(Self { ids, index })
    }

    /// Build from any string-like identifiers, for tests and fixtures.
    pub fn from_ids<I, S>(ids: I) -> Result<Self, UniverseError>
    where
        I: IntoIterator<Item = S>,
        S: Into<InstrumentId>,
    {
        Self::new(ids.into_iter().map(Into::into).collect())
    }

    pub fn ids(&self) -> &[InstrumentId] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Column position of `id`; an unknown instrument is an error, never a NaN.
    pub fn index_of(&self, id: &str) -> Result<usize, UniverseError> {
        self.get(id)
            .ok_or_else(|| UniverseError::Unknown(id.to_string()))
    }
}

impl TryFrom<Vec<InstrumentId>> for Universe {
    type Error = UniverseError;

    fn try_from(ids: Vec<InstrumentId>) -> Result<Self, Self::Error> {
        Self::new(ids)
    }
}

impl From<Universe> for Vec<InstrumentId> {
    fn from(u: Universe) -> Self {
        u.ids
    }
}
