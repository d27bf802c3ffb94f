//! Tessel Incremental - Live relations over in-memory sets.
//!
//! Application code defines sets of typed tuples and composes relations over
//! them. A retained relation keeps its contents current as the underlying
//! tuples are inserted, deleted or changed, and reports each change through
//! insert/delete/update events before the mutating call returns.
//!
//! # Core Concepts
//!
//! - `Set`: the base relation, a named schema plus its member tuples
//! - `Relation`: a set or one of the operators selection, projection,
//!   set projection, inner join, ordering and singleton
//! - `Predicate`: comparisons over attributes, literals and signals
//! - `Signal`: one observable value, following an attribute, derived from
//!   another signal, or carrying a singleton relation
//! - `Context`: the repository boundary used to pull and push sets
//!
//! Relations, predicates and signals are dormant until retained; dormant
//! reads compute a fresh answer each time.
//!
//! # Example
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use tessel_core::{DataType, Value};
//! use tessel_incremental::{KeeperId, Retainable, Set};
//!
//! let answers = Set::builder("answers")?
//!     .attribute("question_id", DataType::Integer)?
//!     .build();
//! let question_id = answers.attribute("question_id")?;
//!
//! let first = answers.filter(question_id.eq(1))?;
//! first.retain(KeeperId::next())?;
//!
//! let seen = Rc::new(RefCell::new(Vec::new()));
//! let log = seen.clone();
//! first.on_insert(move |t| log.borrow_mut().push(t.get("question_id").unwrap()))?;
//!
//! let answer = answers.create([("question_id", 2)])?;
//! answer.set("question_id", 1)?;
//!
//! assert_eq!(*seen.borrow(), vec![Value::Integer(1)]);
//! assert_eq!(first.materialized()?.len(), 1);
//! # Ok::<(), tessel_core::Error>(())
//! ```

#![no_std]

extern crate alloc;

pub mod context;
pub mod delta;
pub mod field;
pub mod predicate;
pub mod relation;
pub mod repository;
pub mod schema;
pub mod signal;
pub mod tuple;

pub use context::{Context, IdentityPolicy};
pub use delta::{diff, Delta, DeltaBatch, DeltaBatchExt};
pub use field::{Field, FieldChange};
pub use predicate::{Comparison, Expression, Operand, Predicate};
pub use relation::{
    InnerJoin, JoinBuilder, Order, OrderBy, Projection, Relation, RelationEvents, Selection, Set,
    SetProjection, SingletonChange, SingletonRelation,
};
pub use repository::{record, MemoryRepository, Record, Repository};
pub use schema::{Attribute, AttributeDefault, AttributeRef, Schema, SetBuilder, Transform, IDENTITY};
pub use signal::{Signal, SignalChange};
pub use tuple::{CompoundTuple, PrimitiveTuple, ProjectedTuple, Tuple, TupleUpdate, WeakPrimitiveTuple};

pub use tessel_core::{DataType, Error, ErrorKind, Result, Value};
pub use tessel_reactive::{KeeperId, Retainable, SubscriptionHandle};
