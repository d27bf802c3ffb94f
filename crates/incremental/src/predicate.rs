//! Predicates over tuples.
//!
//! A predicate is a tree of comparisons joined by `And`/`Or`. Comparison
//! operands are literals, attributes of the tested tuple, or signals. While
//! retained, a predicate watches its signals (and child predicates) and
//! announces through its `changed` channel that its answer may have moved
//! without any tuple changing.

use crate::relation::materialized::forward;
use crate::schema::{Attribute, Schema};
use crate::signal::{Signal, SignalChange};
use crate::tuple::Tuple;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::cmp::Ordering;
use core::fmt;
use tessel_core::{Error, Result, Value};
use tessel_reactive::{
    Channel, KeeperId, Keepers, Retainable, SubscriptionBundle, SubscriptionHandle,
};

/// Leaf comparison operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Comparison {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterOrEqual,
    LessThan,
    LessOrEqual,
}

impl Comparison {
    /// Applies the comparison.
    ///
    /// Values of different types are never equal. Ordered comparisons only
    /// hold between non-null values of the same ordered type.
    pub fn apply(self, left: &Value, right: &Value) -> bool {
        let ordering = || match (left.data_type(), right.data_type()) {
            (Some(l), Some(r)) if l == r && l.is_ordered() => Some(left.cmp(right)),
            _ => None,
        };
        match self {
            Comparison::Equal => left == right,
            Comparison::NotEqual => left != right,
            Comparison::GreaterThan => ordering() == Some(Ordering::Greater),
            Comparison::GreaterOrEqual => {
                matches!(ordering(), Some(Ordering::Greater | Ordering::Equal))
            }
            Comparison::LessThan => ordering() == Some(Ordering::Less),
            Comparison::LessOrEqual => matches!(ordering(), Some(Ordering::Less | Ordering::Equal)),
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            Comparison::Equal => "=",
            Comparison::NotEqual => "!=",
            Comparison::GreaterThan => ">",
            Comparison::GreaterOrEqual => ">=",
            Comparison::LessThan => "<",
            Comparison::LessOrEqual => "<=",
        }
    }
}

/// One side of a comparison.
#[derive(Clone, Debug, PartialEq)]
pub enum Operand {
    Literal(Value),
    Attribute(Attribute),
    Signal(Signal),
}

impl Operand {
    fn resolve(&self, tuple: &Tuple) -> Result<Value> {
        match self {
            Operand::Literal(value) => Ok(value.clone()),
            Operand::Attribute(attribute) => tuple.get(attribute),
            Operand::Signal(signal) => Ok(signal.value()),
        }
    }

    /// Converts a literal to the declared type of the attribute it is
    /// compared with. A literal that does not convert is kept as is.
    fn typed_against(self, other: &Operand) -> Operand {
        match (self, other) {
            (Operand::Literal(value), Operand::Attribute(attribute)) => {
                Operand::Literal(attribute.convert(value.clone()).unwrap_or(value))
            }
            (operand, _) => operand,
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Literal(value) => write!(f, "{}", value),
            Operand::Attribute(attribute) => write!(f, "{}", attribute),
            Operand::Signal(signal) => write!(f, "{:?}", signal),
        }
    }
}

impl From<Value> for Operand {
    fn from(value: Value) -> Self {
        Operand::Literal(value)
    }
}

impl From<i32> for Operand {
    fn from(value: i32) -> Self {
        Operand::Literal(value.into())
    }
}

impl From<i64> for Operand {
    fn from(value: i64) -> Self {
        Operand::Literal(value.into())
    }
}

impl From<bool> for Operand {
    fn from(value: bool) -> Self {
        Operand::Literal(value.into())
    }
}

impl From<&str> for Operand {
    fn from(value: &str) -> Self {
        Operand::Literal(value.into())
    }
}

impl From<String> for Operand {
    fn from(value: String) -> Self {
        Operand::Literal(value.into())
    }
}

impl From<Attribute> for Operand {
    fn from(attribute: Attribute) -> Self {
        Operand::Attribute(attribute)
    }
}

impl From<&Attribute> for Operand {
    fn from(attribute: &Attribute) -> Self {
        Operand::Attribute(attribute.clone())
    }
}

impl From<Signal> for Operand {
    fn from(signal: Signal) -> Self {
        Operand::Signal(signal)
    }
}

impl From<&Signal> for Operand {
    fn from(signal: &Signal) -> Self {
        Operand::Signal(signal.clone())
    }
}

/// The shape of a predicate.
#[derive(Clone, Debug, PartialEq)]
pub enum Expression {
    Compare {
        comparison: Comparison,
        left: Operand,
        right: Operand,
    },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
}

pub(crate) struct PredicateNode {
    id: KeeperId,
    keepers: Keepers,
    changed: Channel<()>,
    subscriptions: RefCell<SubscriptionBundle>,
    expression: Expression,
}

/// A boolean expression over tuples and signals.
#[derive(Clone)]
pub struct Predicate(Rc<PredicateNode>);

impl Predicate {
    fn from_expression(expression: Expression) -> Self {
        Predicate(Rc::new(PredicateNode {
            id: KeeperId::next(),
            keepers: Keepers::new(),
            changed: Channel::new(),
            subscriptions: RefCell::new(SubscriptionBundle::new()),
            expression,
        }))
    }

    /// A leaf comparison.
    ///
    /// A literal compared with an attribute is converted to the attribute's
    /// type, so `status.eq("open")` matches a symbol attribute.
    pub fn compare(
        comparison: Comparison,
        left: impl Into<Operand>,
        right: impl Into<Operand>,
    ) -> Self {
        let left = left.into();
        let right = right.into().typed_against(&left);
        let left = left.typed_against(&right);
        Self::from_expression(Expression::Compare {
            comparison,
            left,
            right,
        })
    }

    /// Holds when every child holds. Needs at least one child.
    pub fn and(children: impl IntoIterator<Item = Predicate>) -> Result<Self> {
        let children: Vec<Predicate> = children.into_iter().collect();
        if children.is_empty() {
            return Err(Error::EmptyComposite { operator: "And" });
        }
        Ok(Self::from_expression(Expression::And(children)))
    }

    /// Holds when any child holds. Needs at least one child.
    pub fn or(children: impl IntoIterator<Item = Predicate>) -> Result<Self> {
        let children: Vec<Predicate> = children.into_iter().collect();
        if children.is_empty() {
            return Err(Error::EmptyComposite { operator: "Or" });
        }
        Ok(Self::from_expression(Expression::Or(children)))
    }

    pub fn expression(&self) -> &Expression {
        &self.0.expression
    }

    /// Evaluates the predicate against `tuple`.
    pub fn evaluate(&self, tuple: &Tuple) -> Result<bool> {
        match &self.0.expression {
            Expression::Compare {
                comparison,
                left,
                right,
            } => Ok(comparison.apply(&left.resolve(tuple)?, &right.resolve(tuple)?)),
            Expression::And(children) => {
                for child in children {
                    if !child.evaluate(tuple)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Expression::Or(children) => {
                for child in children {
                    if child.evaluate(tuple)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        }
    }

    /// Checks that every attribute operand resolves against `schema`.
    pub fn validate(&self, schema: &Schema) -> Result<()> {
        match &self.0.expression {
            Expression::Compare { left, right, .. } => {
                for operand in [left, right] {
                    if let Operand::Attribute(attribute) = operand {
                        if !schema.contains(attribute) {
                            return Err(Error::unknown_attribute(
                                schema.name(),
                                attribute.qualified_name(),
                            ));
                        }
                    }
                }
                Ok(())
            }
            Expression::And(children) | Expression::Or(children) => {
                children.iter().try_for_each(|child| child.validate(schema))
            }
        }
    }

    /// Subscribes to changes of the predicate's answer that no tuple caused.
    pub fn on_change<F>(&self, callback: F) -> Result<SubscriptionHandle>
    where
        F: Fn(&()) + 'static,
    {
        if !self.is_retained() {
            return Err(Error::dormant("subscribe"));
        }
        Ok(self.0.changed.subscribe(callback))
    }

    pub(crate) fn changed(&self) -> &Channel<()> {
        &self.0.changed
    }
}

impl Retainable for Predicate {
    fn keeper_id(&self) -> KeeperId {
        self.0.id
    }

    fn keepers(&self) -> &Keepers {
        &self.0.keepers
    }

    fn dependencies(&self) -> Vec<&dyn Retainable> {
        match &self.0.expression {
            Expression::Compare { left, right, .. } => [left, right]
                .into_iter()
                .filter_map(|operand| match operand {
                    Operand::Signal(signal) => Some(signal as &dyn Retainable),
                    _ => None,
                })
                .collect(),
            Expression::And(children) | Expression::Or(children) => children
                .iter()
                .map(|child| child as &dyn Retainable)
                .collect(),
        }
    }

    fn activate(&self) -> Result<()> {
        let node = &self.0;
        let mut subscriptions = node.subscriptions.borrow_mut();
        match &node.expression {
            Expression::Compare { left, right, .. } => {
                for operand in [left, right] {
                    if let Operand::Signal(signal) = operand {
                        subscriptions.add(signal.changed().subscribe(forward(
                            node,
                            |n: &PredicateNode, _: &SignalChange| n.changed.publish(&()),
                        )));
                    }
                }
            }
            Expression::And(children) | Expression::Or(children) => {
                for child in children {
                    subscriptions.add(child.changed().subscribe(forward(
                        node,
                        |n: &PredicateNode, _: &()| n.changed.publish(&()),
                    )));
                }
            }
        }
        Ok(())
    }

    fn deactivate(&self) {
        self.0.subscriptions.borrow_mut().cancel_all();
    }
}

impl PartialEq for Predicate {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0) || self.0.expression == other.0.expression
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (children, joiner) = match &self.0.expression {
            Expression::Compare {
                comparison,
                left,
                right,
            } => return write!(f, "{} {} {}", left, comparison.symbol(), right),
            Expression::And(children) => (children, " AND "),
            Expression::Or(children) => (children, " OR "),
        };
        f.write_str("(")?;
        for (i, child) in children.iter().enumerate() {
            if i > 0 {
                f.write_str(joiner)?;
            }
            write!(f, "{}", child)?;
        }
        f.write_str(")")
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Predicate({})", self)
    }
}

#[allow(clippy::should_implement_trait)]
impl Attribute {
    pub fn eq(&self, other: impl Into<Operand>) -> Predicate {
        Predicate::compare(Comparison::Equal, self, other)
    }

    pub fn ne(&self, other: impl Into<Operand>) -> Predicate {
        Predicate::compare(Comparison::NotEqual, self, other)
    }

    pub fn gt(&self, other: impl Into<Operand>) -> Predicate {
        Predicate::compare(Comparison::GreaterThan, self, other)
    }

    pub fn ge(&self, other: impl Into<Operand>) -> Predicate {
        Predicate::compare(Comparison::GreaterOrEqual, self, other)
    }

    pub fn lt(&self, other: impl Into<Operand>) -> Predicate {
        Predicate::compare(Comparison::LessThan, self, other)
    }

    pub fn le(&self, other: impl Into<Operand>) -> Predicate {
        Predicate::compare(Comparison::LessOrEqual, self, other)
    }
}
