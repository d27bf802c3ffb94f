//! The persistence boundary.
//!
//! The engine never stores anything itself. A [`Repository`] fetches raw
//! records to hydrate a relation's set and persists a relation's tuples;
//! [`crate::Context`] drives both directions.

use crate::relation::Relation;
use crate::schema::IDENTITY;
use crate::tuple::PrimitiveTuple;
use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::RefCell;
use hashbrown::HashMap;
use tessel_core::{Error, Result, Value};

/// Raw attribute values keyed by attribute name.
pub type Record = BTreeMap<String, Value>;

/// A backing store for sets.
pub trait Repository {
    /// Returns the stored records of the relation's base set.
    fn fetch(&self, relation: &Relation) -> Result<Vec<Record>>;

    /// Persists the relation's current tuples.
    fn push(&self, relation: &Relation) -> Result<()>;
}

/// Returns the primitive tuples a relation yields, for persisting.
///
/// Join results and row-level projections have no set to persist into.
pub fn persistable(relation: &Relation) -> Result<Vec<PrimitiveTuple>> {
    if relation.base_set().is_none() {
        return Err(Error::invalid_operation(
            "relation has no base set to persist into",
        ));
    }
    Ok(relation
        .read()?
        .iter()
        .filter_map(|tuple| tuple.as_primitive().cloned())
        .collect())
}

/// A repository keeping records in memory, keyed by set name.
#[derive(Default)]
pub struct MemoryRepository {
    sets: RefCell<HashMap<String, Vec<Record>>>,
    failure: RefCell<Option<String>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a record for `set`, as if written by another process.
    pub fn insert_record(&self, set: &str, record: Record) {
        self.sets
            .borrow_mut()
            .entry(String::from(set))
            .or_default()
            .push(record);
    }

    /// Stores records for `set`.
    pub fn seed(&self, set: &str, records: impl IntoIterator<Item = Record>) {
        for record in records {
            self.insert_record(set, record);
        }
    }

    /// Returns the records stored for `set`.
    pub fn records(&self, set: &str) -> Vec<Record> {
        self.sets.borrow().get(set).cloned().unwrap_or_default()
    }

    /// Makes the next fetch or push fail with `message`.
    pub fn fail_next(&self, message: impl Into<String>) {
        *self.failure.borrow_mut() = Some(message.into());
    }

    fn check_failure(&self) -> Result<()> {
        match self.failure.borrow_mut().take() {
            Some(message) => Err(Error::repository(message)),
            None => Ok(()),
        }
    }

    fn set_name(relation: &Relation) -> Result<String> {
        relation
            .base_set()
            .map(|set| String::from(set.name()))
            .ok_or_else(|| Error::invalid_operation("relation has no base set to fetch"))
    }
}

impl Repository for MemoryRepository {
    fn fetch(&self, relation: &Relation) -> Result<Vec<Record>> {
        self.check_failure()?;
        let name = Self::set_name(relation)?;
        Ok(self.records(&name))
    }

    fn push(&self, relation: &Relation) -> Result<()> {
        self.check_failure()?;
        let name = Self::set_name(relation)?;
        let tuples = persistable(relation)?;

        let mut sets = self.sets.borrow_mut();
        let stored = sets.entry(name).or_default();
        for tuple in &tuples {
            let record = tuple.to_record();
            let identity = record.get(IDENTITY);
            match stored.iter_mut().find(|r| r.get(IDENTITY) == identity) {
                Some(existing) => *existing = record,
                None => stored.push(record),
            }
        }
        tracing::debug!(records = tuples.len(), "pushed records to memory repository");
        Ok(())
    }
}

/// Builds a record from name/value pairs.
pub fn record<'a, I, V>(values: I) -> Record
where
    I: IntoIterator<Item = (&'a str, V)>,
    V: Into<Value>,
{
    values
        .into_iter()
        .map(|(name, value)| (String::from(name), value.into()))
        .collect()
}
