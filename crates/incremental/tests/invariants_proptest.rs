//! Property-based tests for live relations.
//!
//! Each test drives random mutation sequences through retained relations and
//! compares the materialized contents with an answer recomputed from the
//! current set contents.

use proptest::prelude::*;
use std::collections::{BTreeSet, HashSet};
use tessel_incremental::{
    Comparison, DataType, KeeperId, Predicate, PrimitiveTuple, Retainable, Set, Value,
};

#[derive(Clone, Debug)]
enum Op {
    InsertLeft(i64),
    InsertRight(i64),
    DeleteLeft(usize),
    DeleteRight(usize),
    UpdateLeft(usize, i64),
    UpdateRight(usize, i64),
}

/// Keys are drawn from a small domain so that matches and collisions are common.
fn key_strategy() -> impl Strategy<Value = i64> {
    0i64..5
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        key_strategy().prop_map(Op::InsertLeft),
        key_strategy().prop_map(Op::InsertRight),
        any::<usize>().prop_map(Op::DeleteLeft),
        any::<usize>().prop_map(Op::DeleteRight),
        (any::<usize>(), key_strategy()).prop_map(|(i, k)| Op::UpdateLeft(i, k)),
        (any::<usize>(), key_strategy()).prop_map(|(i, k)| Op::UpdateRight(i, k)),
    ]
}

fn keyed(name: &str) -> Set {
    Set::builder(name)
        .unwrap()
        .attribute("key", DataType::Integer)
        .unwrap()
        .build()
}

fn pick(set: &Set, index: usize) -> Option<PrimitiveTuple> {
    let tuples = set.tuples();
    if tuples.is_empty() {
        None
    } else {
        Some(tuples[index % tuples.len()].clone())
    }
}

fn apply(op: &Op, left: &Set, right: &Set) {
    match op {
        Op::InsertLeft(k) => {
            left.create([("key", *k)]).unwrap();
        }
        Op::InsertRight(k) => {
            right.create([("key", *k)]).unwrap();
        }
        Op::DeleteLeft(i) => {
            if let Some(t) = pick(left, *i) {
                left.delete(&t).unwrap();
            }
        }
        Op::DeleteRight(i) => {
            if let Some(t) = pick(right, *i) {
                right.delete(&t).unwrap();
            }
        }
        Op::UpdateLeft(i, k) => {
            if let Some(t) = pick(left, *i) {
                t.set("key", *k).unwrap();
            }
        }
        Op::UpdateRight(i, k) => {
            if let Some(t) = pick(right, *i) {
                t.set("key", *k).unwrap();
            }
        }
    }
}

fn key(tuple: &PrimitiveTuple) -> Value {
    tuple.get("key").unwrap()
}

proptest! {
    /// Property: a retained join always equals the filtered Cartesian product.
    #[test]
    fn join_equals_filtered_product(ops in prop::collection::vec(op_strategy(), 0..40)) {
        let left = keyed("left");
        let right = keyed("right");
        let predicate = Predicate::compare(
            Comparison::Equal,
            left.attribute("key").unwrap(),
            right.attribute("key").unwrap(),
        );
        let join = left.join(&right).on(predicate).unwrap();
        join.retain(KeeperId::next()).unwrap();

        for op in &ops {
            apply(op, &left, &right);
        }

        let materialized = join.materialized().unwrap();
        let pairs: Vec<(Value, Value)> = materialized
            .iter()
            .map(|t| {
                let pair = t.as_compound().unwrap();
                (pair.left().get("id").unwrap(), pair.right().get("id").unwrap())
            })
            .collect();
        let distinct: HashSet<(Value, Value)> = pairs.iter().cloned().collect();
        prop_assert_eq!(distinct.len(), pairs.len());

        let mut expected = HashSet::new();
        for l in left.tuples() {
            for r in right.tuples() {
                if key(&l) == key(&r) {
                    expected.insert((l.identity(), r.identity()));
                }
            }
        }
        prop_assert_eq!(distinct, expected);
    }

    /// Property: a row projection holds exactly one tuple per distinct key.
    #[test]
    fn projection_holds_distinct_keys(ops in prop::collection::vec(op_strategy(), 0..40)) {
        let left = keyed("left");
        let right = keyed("right");
        let projection = left.project(&[left.attribute("key").unwrap()]).unwrap();
        projection.retain(KeeperId::next()).unwrap();

        for op in &ops {
            apply(op, &left, &right);
        }

        let keys: Vec<Value> = projection
            .materialized()
            .unwrap()
            .iter()
            .map(|t| t.get("key").unwrap())
            .collect();
        let distinct: BTreeSet<Value> = keys.iter().cloned().collect();
        prop_assert_eq!(distinct.len(), keys.len());

        let expected: BTreeSet<Value> = left.tuples().iter().map(key).collect();
        prop_assert_eq!(distinct, expected);
    }

    /// Property: a singleton wraps the first tuple of an ordered operand.
    #[test]
    fn singleton_wraps_first_tuple(ops in prop::collection::vec(op_strategy(), 0..40)) {
        let left = keyed("left");
        let right = keyed("right");
        let ordered = left.order_by(&left.attribute("key").unwrap()).unwrap();
        let singleton = ordered.singleton();
        singleton.retain(KeeperId::next()).unwrap();

        for op in &ops {
            apply(op, &left, &right);
            prop_assert!(singleton.relation().materialized().unwrap().len() <= 1);
        }

        let first = ordered.read().unwrap().into_iter().next();
        prop_assert_eq!(singleton.tuple(), first);
        match singleton.tuple() {
            Some(t) => {
                let min = left.tuples().iter().map(key).min().unwrap();
                prop_assert_eq!(t.get("key").unwrap(), min);
            }
            None => prop_assert!(left.is_empty()),
        }
    }

    /// Property: a selection holds exactly the matching operand tuples.
    #[test]
    fn selection_holds_matching_tuples(ops in prop::collection::vec(op_strategy(), 0..40)) {
        let left = keyed("left");
        let right = keyed("right");
        let selection = left.filter(left.attribute("key").unwrap().ge(3)).unwrap();
        selection.retain(KeeperId::next()).unwrap();

        for op in &ops {
            apply(op, &left, &right);
        }

        let members: HashSet<Value> = selection
            .materialized()
            .unwrap()
            .iter()
            .map(|t| t.get("id").unwrap())
            .collect();
        let expected: HashSet<Value> = left
            .tuples()
            .iter()
            .filter(|t| key(t) >= Value::Integer(3))
            .map(PrimitiveTuple::identity)
            .collect();
        prop_assert_eq!(members, expected);
    }

    /// Property: N retains by distinct keepers followed by N releases leave
    /// the relation and its operands dormant.
    #[test]
    fn retain_release_is_balanced(
        keepers in 1usize..6,
        order in prop::collection::vec(any::<usize>(), 6),
    ) {
        let left = keyed("left");
        let selection = left.filter(left.attribute("key").unwrap().eq(1)).unwrap();

        let mut ids: Vec<KeeperId> = (0..keepers).map(|_| KeeperId::next()).collect();
        for id in &ids {
            selection.retain(*id).unwrap();
            prop_assert!(selection.retain(*id).is_err());
        }
        prop_assert_eq!(selection.keepers().len(), keepers);

        let mut released = 0;
        while !ids.is_empty() {
            let id = ids.remove(order[released] % ids.len());
            prop_assert!(selection.is_retained());
            selection.release(id).unwrap();
            released += 1;
        }

        prop_assert!(!selection.is_retained());
        prop_assert!(!left.is_retained());
        prop_assert_eq!(selection.keepers().len(), 0);
        prop_assert!(selection.materialized().is_err());
        left.create([("key", 1)]).unwrap();
        prop_assert_eq!(selection.read().unwrap().len(), 1);
    }
}
