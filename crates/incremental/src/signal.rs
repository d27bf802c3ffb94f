//! Signals: single observable values.
//!
//! - attribute signals follow one attribute of one primitive tuple;
//! - derived signals apply a transform to another signal;
//! - singleton signals carry a singleton relation and fire when it changes.
//!
//! A signal only watches its source while retained. Derived signals cache
//! their value while retained; dormant reads recompute it.

use crate::field::FieldChange;
use crate::relation::materialized::forward;
use crate::relation::{SingletonChange, SingletonRelation};
use crate::schema::Attribute;
use crate::tuple::PrimitiveTuple;
use alloc::rc::Rc;
use alloc::vec;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::fmt;
use tessel_core::{Error, OpaqueValue, Result, Value};
use tessel_reactive::{
    Channel, KeeperId, Keepers, Retainable, SubscriptionBundle, SubscriptionHandle,
};

/// A signal value moved from `old` to `new`.
#[derive(Clone, Debug, PartialEq)]
pub struct SignalChange {
    pub old: Value,
    pub new: Value,
}

enum SignalKind {
    Attribute {
        tuple: PrimitiveTuple,
        attribute: Attribute,
    },
    Derived {
        source: Signal,
        transform: Rc<dyn Fn(&Value) -> Value>,
        cache: RefCell<Option<Value>>,
    },
    Singleton {
        relation: SingletonRelation,
        object: OpaqueValue,
    },
}

pub(crate) struct SignalNode {
    id: KeeperId,
    keepers: Keepers,
    changed: Channel<SignalChange>,
    subscriptions: RefCell<SubscriptionBundle>,
    kind: SignalKind,
}

/// A single observable value.
#[derive(Clone)]
pub struct Signal(Rc<SignalNode>);

impl Signal {
    fn from_kind(kind: SignalKind) -> Self {
        Signal(Rc::new(SignalNode {
            id: KeeperId::next(),
            keepers: Keepers::new(),
            changed: Channel::new(),
            subscriptions: RefCell::new(SubscriptionBundle::new()),
            kind,
        }))
    }

    /// Follows `attribute` of `tuple`.
    pub fn attribute(tuple: &PrimitiveTuple, attribute: &Attribute) -> Result<Self> {
        let schema = tuple.schema();
        if !schema.contains(attribute) {
            return Err(Error::unknown_attribute(schema.name(), attribute.qualified_name()));
        }
        Ok(Self::from_kind(SignalKind::Attribute {
            tuple: tuple.clone(),
            attribute: attribute.clone(),
        }))
    }

    /// Carries `relation` as an opaque object value.
    pub fn singleton(relation: &SingletonRelation) -> Self {
        Self::from_kind(SignalKind::Singleton {
            relation: relation.clone(),
            object: OpaqueValue::new(relation.clone()),
        })
    }

    /// Returns a signal whose value is `transform` of this one.
    pub fn derive<F>(&self, transform: F) -> Signal
    where
        F: Fn(&Value) -> Value + 'static,
    {
        Self::from_kind(SignalKind::Derived {
            source: self.clone(),
            transform: Rc::new(transform),
            cache: RefCell::new(None),
        })
    }

    /// Returns the current value.
    pub fn value(&self) -> Value {
        match &self.0.kind {
            SignalKind::Attribute { tuple, attribute } => {
                tuple.get(attribute).unwrap_or(Value::Null)
            }
            SignalKind::Derived {
                source,
                transform,
                cache,
            } => {
                if !self.is_retained() {
                    return transform(&source.value());
                }
                if let Some(value) = cache.borrow().as_ref() {
                    return value.clone();
                }
                let value = transform(&source.value());
                *cache.borrow_mut() = Some(value.clone());
                value
            }
            SignalKind::Singleton { object, .. } => Value::Object(object.clone()),
        }
    }

    /// Subscribes to value changes.
    pub fn on_change<F>(&self, callback: F) -> Result<SubscriptionHandle>
    where
        F: Fn(&SignalChange) + 'static,
    {
        if !self.is_retained() {
            return Err(Error::dormant("subscribe"));
        }
        Ok(self.0.changed.subscribe(callback))
    }

    pub(crate) fn changed(&self) -> &Channel<SignalChange> {
        &self.0.changed
    }
}

impl SignalNode {
    fn on_field_change(&self, change: &FieldChange) {
        if let SignalKind::Attribute { attribute, .. } = &self.kind {
            if change.attribute == *attribute {
                self.changed.publish(&SignalChange {
                    old: attribute.read(&change.old),
                    new: attribute.read(&change.new),
                });
            }
        }
    }

    fn on_source_change(&self, change: &SignalChange) {
        if let SignalKind::Derived {
            transform, cache, ..
        } = &self.kind
        {
            let cached = cache.borrow_mut().take();
            let old = cached.unwrap_or_else(|| transform(&change.old));
            let new = transform(&change.new);
            *cache.borrow_mut() = Some(new.clone());
            self.changed.publish(&SignalChange { old, new });
        }
    }

    fn on_singleton_change(&self) {
        if let SignalKind::Singleton { object, .. } = &self.kind {
            let value = Value::Object(object.clone());
            self.changed.publish(&SignalChange {
                old: value.clone(),
                new: value,
            });
        }
    }
}

impl Retainable for Signal {
    fn keeper_id(&self) -> KeeperId {
        self.0.id
    }

    fn keepers(&self) -> &Keepers {
        &self.0.keepers
    }

    fn dependencies(&self) -> Vec<&dyn Retainable> {
        match &self.0.kind {
            SignalKind::Attribute { .. } => Vec::new(),
            SignalKind::Derived { source, .. } => vec![source as &dyn Retainable],
            SignalKind::Singleton { relation, .. } => vec![relation as &dyn Retainable],
        }
    }

    fn activate(&self) -> Result<()> {
        let node = &self.0;
        let handle = match &node.kind {
            SignalKind::Attribute { tuple, .. } => tuple.on_update(forward(
                node,
                |n: &SignalNode, change: &FieldChange| n.on_field_change(change),
            )),
            SignalKind::Derived { source, .. } => source.changed().subscribe(forward(
                node,
                |n: &SignalNode, change: &SignalChange| n.on_source_change(change),
            )),
            SignalKind::Singleton { relation, .. } => relation.changed().subscribe(forward(
                node,
                |n: &SignalNode, _: &SingletonChange| n.on_singleton_change(),
            )),
        };
        node.subscriptions.borrow_mut().add(handle);
        Ok(())
    }

    fn deactivate(&self) {
        self.0.subscriptions.borrow_mut().cancel_all();
        if let SignalKind::Derived { cache, .. } = &self.0.kind {
            cache.borrow_mut().take();
        }
    }
}

/// Signals are equal when they watch the same source the same way.
impl PartialEq for Signal {
    fn eq(&self, other: &Self) -> bool {
        if Rc::ptr_eq(&self.0, &other.0) {
            return true;
        }
        match (&self.0.kind, &other.0.kind) {
            (
                SignalKind::Attribute { tuple, attribute },
                SignalKind::Attribute {
                    tuple: other_tuple,
                    attribute: other_attribute,
                },
            ) => tuple.ptr_eq(other_tuple) && attribute == other_attribute,
            (
                SignalKind::Derived {
                    source, transform, ..
                },
                SignalKind::Derived {
                    source: other_source,
                    transform: other_transform,
                    ..
                },
            ) => Rc::ptr_eq(transform, other_transform) && source == other_source,
            (
                SignalKind::Singleton { relation, .. },
                SignalKind::Singleton {
                    relation: other_relation,
                    ..
                },
            ) => relation == other_relation,
            _ => false,
        }
    }
}

impl fmt::Debug for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.0.kind {
            SignalKind::Attribute { attribute, .. } => return write!(f, "Signal({})", attribute),
            SignalKind::Derived { .. } => "derived",
            SignalKind::Singleton { .. } => "singleton",
        };
        write!(f, "Signal({} {})", kind, self.0.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relation::Set;
    use alloc::string::ToString;
    use core::cell::Cell;
    use tessel_core::DataType;

    fn people() -> Set {
        Set::builder("people")
            .unwrap()
            .attribute("name", DataType::String)
            .unwrap()
            .build()
    }

    fn upper(value: &Value) -> Value {
        match value.as_str() {
            Some(s) => Value::String(s.to_uppercase()),
            None => value.clone(),
        }
    }

    #[test]
    fn test_attribute_signal_follows_field() {
        let set = people();
        let t = set.build([("name", "nathan")]).unwrap();
        let name = set.attribute("name").unwrap();
        let signal = Signal::attribute(&t, &name).unwrap();
        assert_eq!(signal.value(), Value::String("nathan".into()));
        assert!(signal.on_change(|_| {}).is_err());

        signal.retain(KeeperId::next()).unwrap();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = seen.clone();
        signal.on_change(move |c| s.borrow_mut().push(c.clone())).unwrap();

        t.set("id", 99).unwrap();
        t.set("name", "ari").unwrap();
        assert_eq!(
            *seen.borrow(),
            vec![SignalChange {
                old: "nathan".into(),
                new: "ari".into()
            }]
        );
    }

    #[test]
    fn test_derived_signal_reports_transformed_values() {
        let set = people();
        let t = set.build([("name", "nathan")]).unwrap();
        let derived = t.signal("name").unwrap().derive(upper);
        assert_eq!(derived.value(), Value::String("NATHAN".into()));

        derived.retain(KeeperId::next()).unwrap();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = seen.clone();
        derived.on_change(move |c| s.borrow_mut().push(c.clone())).unwrap();

        t.set("name", "ari").unwrap();
        assert_eq!(
            *seen.borrow(),
            vec![SignalChange {
                old: "NATHAN".into(),
                new: "ARI".into()
            }]
        );
        assert_eq!(derived.value(), Value::String("ARI".into()));
    }

    #[test]
    fn test_derived_signal_cache_follows_lifecycle() {
        let calls = Rc::new(Cell::new(0));
        let set = people();
        let t = set.build([("name", "x")]).unwrap();
        let counter = calls.clone();
        let derived = t.signal("name").unwrap().derive(move |v| {
            counter.set(counter.get() + 1);
            Value::String(v.to_string())
        });

        derived.value();
        derived.value();
        assert_eq!(calls.get(), 2);

        let keeper = KeeperId::next();
        derived.retain(keeper).unwrap();
        derived.value();
        derived.value();
        assert_eq!(calls.get(), 3);

        derived.release(keeper).unwrap();
        derived.value();
        assert_eq!(calls.get(), 4);
    }

    #[test]
    fn test_signals_compare_by_source() {
        let set = people();
        let t = set.build([("name", "nathan")]).unwrap();
        let other = set.build([("name", "nathan")]).unwrap();

        let a = t.signal("name").unwrap();
        let b = t.signal("name").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, t.signal("id").unwrap());
        assert_ne!(a, other.signal("name").unwrap());

        let name = set.attribute("name").unwrap();
        assert_eq!(name.eq(&a), name.eq(&b));

        let transform: fn(&Value) -> Value = upper;
        let shared = a.derive(transform);
        assert_ne!(shared, b.derive(transform));
        assert_ne!(shared, a);

        let singleton = set.singleton();
        assert_eq!(singleton.signal(), singleton.signal());
        assert_ne!(singleton.signal(), set.singleton().signal());
    }

    #[test]
    fn test_singleton_signal_carries_relation() {
        let set = people();
        let singleton = set.singleton();
        let signal = singleton.signal();
        let value = signal.value();
        let carried = value
            .as_object()
            .and_then(|o| o.downcast_ref::<SingletonRelation>())
            .unwrap();
        assert!(*carried == singleton);

        let name = set.attribute("name").unwrap();
        let first_name = singleton.attribute_signal(&name).unwrap();
        first_name.retain(KeeperId::next()).unwrap();
        let fired = Rc::new(Cell::new(0));
        let f = fired.clone();
        first_name.on_change(move |_| f.set(f.get() + 1)).unwrap();

        set.create([("name", "first")]).unwrap();
        set.create([("name", "second")]).unwrap();
        assert_eq!(first_name.value(), Value::String("first".into()));
        assert_eq!(fired.get(), 1);
    }
}
