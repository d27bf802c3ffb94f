//! Explicit runtime context: the repository and the identity policy.

use crate::relation::{Relation, Set};
use crate::repository::{persistable, Record, Repository};
use crate::schema::{SetBuilder, IDENTITY};
use crate::tuple::PrimitiveTuple;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::Cell;
use hashbrown::HashSet;
use tessel_core::{observe_identity, Error, Result, Value};

/// How sets built through a context draw identities.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum IdentityPolicy {
    /// The process-wide generator.
    #[default]
    Global,
    /// A counter owned by the context, starting at 1. Used by tests that
    /// need predictable identities.
    Local,
}

/// Carries the repository used by [`Context::pull`] and [`Context::push`].
pub struct Context {
    repository: Rc<dyn Repository>,
    policy: IdentityPolicy,
    counter: Rc<Cell<i64>>,
}

impl Context {
    pub fn new(repository: Rc<dyn Repository>) -> Self {
        Self::with_identity_policy(repository, IdentityPolicy::Global)
    }

    pub fn with_identity_policy(repository: Rc<dyn Repository>, policy: IdentityPolicy) -> Self {
        Self {
            repository,
            policy,
            counter: Rc::new(Cell::new(1)),
        }
    }

    pub fn repository(&self) -> &Rc<dyn Repository> {
        &self.repository
    }

    pub fn identity_policy(&self) -> IdentityPolicy {
        self.policy
    }

    /// Starts a set whose identities follow this context's policy.
    pub fn set_builder(&self, name: impl Into<String>) -> Result<SetBuilder> {
        let builder = SetBuilder::new(name)?;
        Ok(match self.policy {
            IdentityPolicy::Global => builder,
            IdentityPolicy::Local => {
                let counter = self.counter.clone();
                builder.identity_generator(move || {
                    let id = counter.get();
                    counter.set(id + 1);
                    Value::Integer(id)
                })
            }
        })
    }

    fn observe(&self, identity: &Value) {
        if let Some(id) = identity.as_i64() {
            match self.policy {
                IdentityPolicy::Global => observe_identity(id),
                IdentityPolicy::Local => {
                    self.counter.set(self.counter.get().max(id.saturating_add(1)))
                }
            }
        }
    }

    /// Hydrates the relation's base set from the repository.
    ///
    /// Every record is converted and checked before any tuple changes: known
    /// identities are updated in place, new ones inserted. Hydrated tuples
    /// are clean. Returns the number of records applied.
    pub fn pull(&self, relation: &Relation) -> Result<usize> {
        let set = relation
            .base_set()
            .ok_or_else(|| Error::invalid_operation("relation has no base set to pull into"))?;
        let records = self.repository.fetch(relation)?;

        let rows = convert_records(&set, records)?;
        let count = rows.len();
        let mut inserted = 0usize;
        for (identity, values) in rows {
            self.observe(&identity);
            let tuple = match set.find(identity) {
                Some(existing) => {
                    apply(&set, &existing, values)?;
                    existing
                }
                None => {
                    let tuple = set.assemble(values)?;
                    set.insert(&tuple)?;
                    inserted += 1;
                    tuple
                }
            };
            tuple.mark_pushed();
        }
        tracing::debug!(
            set = set.name(),
            records = count,
            inserted,
            "pulled records from repository"
        );
        Ok(count)
    }

    /// Persists the relation's tuples and marks them clean.
    pub fn push(&self, relation: &Relation) -> Result<()> {
        let tuples = persistable(relation)?;
        self.repository.push(relation)?;
        for tuple in &tuples {
            tuple.mark_pushed();
        }
        tracing::debug!(records = tuples.len(), "pushed relation to repository");
        Ok(())
    }
}

type Row = (Value, Vec<Option<Value>>);

fn convert_records(set: &Set, records: Vec<Record>) -> Result<Vec<Row>> {
    let schema = set.schema();
    let mut seen: HashSet<Value> = HashSet::new();
    let mut rows = Vec::with_capacity(records.len());
    for record in records {
        let mut values: Vec<Option<Value>> = Vec::new();
        values.resize(schema.len(), None);
        for (name, raw) in record {
            let pos = schema.locate(name.as_str().into())?;
            values[pos] = Some(schema.attributes()[pos].convert(raw)?);
        }
        let identity = match &values[0] {
            Some(identity) if !identity.is_null() => identity.clone(),
            _ => {
                return Err(Error::invalid_operation(
                    "repository record has no identity",
                ))
            }
        };
        if !seen.insert(identity.clone()) {
            return Err(Error::duplicate_identity(set.name(), identity));
        }
        rows.push((identity, values));
    }
    Ok(rows)
}

fn apply(set: &Set, tuple: &PrimitiveTuple, values: Vec<Option<Value>>) -> Result<()> {
    for (attribute, value) in set.schema().attributes().iter().zip(values) {
        if let Some(value) = value {
            if attribute.name() != IDENTITY {
                tuple.set(attribute, value)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{record, MemoryRepository};
    use tessel_core::{DataType, ErrorKind};

    fn context(policy: IdentityPolicy) -> (Rc<MemoryRepository>, Context) {
        let repo = Rc::new(MemoryRepository::new());
        let ctx = Context::with_identity_policy(repo.clone(), policy);
        (repo, ctx)
    }

    fn users(ctx: &Context) -> Set {
        ctx.set_builder("users")
            .unwrap()
            .attribute("name", DataType::String)
            .unwrap()
            .attribute("active", DataType::Boolean)
            .unwrap()
            .build()
    }

    #[test]
    fn test_local_identities_are_predictable() {
        let (_, ctx) = context(IdentityPolicy::Local);
        let set = users(&ctx);
        let a = set.create([("name", "a")]).unwrap();
        let b = set.create([("name", "b")]).unwrap();
        assert_eq!(a.identity(), Value::Integer(1));
        assert_eq!(b.identity(), Value::Integer(2));
    }

    #[test]
    fn test_pull_inserts_and_updates() {
        let (repo, ctx) = context(IdentityPolicy::Local);
        let set = users(&ctx);
        repo.seed(
            "users",
            [
                record([("id", Value::from(4)), ("name", "ann".into()), ("active", "true".into())]),
                record([("id", Value::from(9)), ("name", "bob".into())]),
            ],
        );
        assert_eq!(ctx.pull(&set.relation()).unwrap(), 2);
        assert_eq!(set.len(), 2);
        let ann = set.find(4).unwrap();
        assert_eq!(ann.get("active").unwrap(), Value::Boolean(true));
        assert!(!ann.is_dirty());

        // Hydrated identities are never reissued.
        let next = set.create([("name", "new")]).unwrap();
        assert_eq!(next.identity(), Value::Integer(10));

        let repo2 = MemoryRepository::new();
        repo2.insert_record("users", record([("id", Value::from(4)), ("name", "ann2".into())]));
        let ctx2 = Context::new(Rc::new(repo2));
        ctx2.pull(&set.relation()).unwrap();
        assert!(ann.ptr_eq(&set.find(4).unwrap()));
        assert_eq!(ann.get("name").unwrap(), Value::from("ann2"));
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_pull_is_all_or_nothing() {
        let (repo, ctx) = context(IdentityPolicy::Local);
        let set = users(&ctx);
        repo.seed(
            "users",
            [
                record([("id", Value::from(1)), ("name", "ok".into())]),
                record([("id", Value::from(2)), ("active", "maybe".into())]),
            ],
        );
        let err = ctx.pull(&set.relation()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conversion);
        assert!(set.is_empty());
    }

    #[test]
    fn test_pull_rejects_duplicate_identities() {
        let (repo, ctx) = context(IdentityPolicy::Local);
        let set = users(&ctx);
        repo.seed("users", [record([("id", 1)]), record([("id", 1)])]);
        assert!(ctx.pull(&set.relation()).is_err());
        assert!(set.is_empty());
    }

    #[test]
    fn test_push_marks_clean() {
        let (repo, ctx) = context(IdentityPolicy::Local);
        let set = users(&ctx);
        let a = set.create([("name", "a")]).unwrap();
        assert!(a.is_dirty());
        ctx.push(&set.relation()).unwrap();
        assert!(!a.is_dirty());
        assert_eq!(repo.records("users").len(), 1);

        a.set("name", "b").unwrap();
        repo.fail_next("offline");
        assert!(ctx.push(&set.relation()).is_err());
        assert!(a.is_dirty());
    }

    #[test]
    fn test_join_has_no_base_set() {
        let (_, ctx) = context(IdentityPolicy::Local);
        let set = users(&ctx);
        let id = set.identity_attribute();
        let join = set.join(&set).on(id.eq(&id)).unwrap();
        assert_eq!(ctx.pull(&join).unwrap_err().kind(), ErrorKind::Usage);
    }
}
