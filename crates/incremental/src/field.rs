//! Tuple fields and change records.

use crate::schema::Attribute;
use core::sync::atomic::{AtomicU64, Ordering};
use tessel_core::{Result, Value};

/// Global mutation counter.
static NEXT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_sequence() -> u64 {
    NEXT_SEQUENCE.fetch_add(1, Ordering::Relaxed)
}

/// One field mutation.
///
/// Every mutation gets a fresh `sequence`, so an operator reached by the same
/// change along several paths can recognise the repeat.
#[derive(Clone, Debug)]
pub struct FieldChange {
    pub attribute: Attribute,
    pub old: Value,
    pub new: Value,
    pub sequence: u64,
}

/// The value slot for one attribute of one tuple.
#[derive(Clone, Debug)]
pub struct Field {
    attribute: Attribute,
    value: Value,
    pushed: Option<Value>,
}

impl Field {
    /// Creates a field holding an already converted value.
    pub fn new(attribute: Attribute, value: Value) -> Self {
        Self {
            attribute,
            value,
            pushed: None,
        }
    }

    /// Returns the attribute.
    #[inline]
    pub fn attribute(&self) -> &Attribute {
        &self.attribute
    }

    /// Returns the stored value.
    #[inline]
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Returns the value as seen by readers, after the attribute transform.
    pub fn read(&self) -> Value {
        self.attribute.read(&self.value)
    }

    /// Converts and stores `raw`.
    ///
    /// Returns the converted value and, if it differs from the previous one,
    /// the change record. Nothing is stored when conversion fails.
    pub fn set(&mut self, raw: Value) -> Result<(Value, Option<FieldChange>)> {
        let value = self.attribute.convert(raw)?;
        let change = self.assign(value.clone());
        Ok((value, change))
    }

    /// Stores a value that is already converted.
    pub(crate) fn assign(&mut self, value: Value) -> Option<FieldChange> {
        if self.value == value {
            return None;
        }
        let old = core::mem::replace(&mut self.value, value.clone());
        Some(FieldChange {
            attribute: self.attribute.clone(),
            old,
            new: value,
            sequence: next_sequence(),
        })
    }

    /// Returns true if the value differs from the last persisted one.
    pub fn is_dirty(&self) -> bool {
        self.pushed.as_ref() != Some(&self.value)
    }

    /// Records the current value as persisted.
    pub fn mark_pushed(&mut self) {
        self.pushed = Some(self.value.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessel_core::{DataType, ErrorKind};
    use tessel_reactive::KeeperId;

    fn field(data_type: DataType) -> Field {
        let attr = Attribute::new(KeeperId::next(), "t", "f", data_type, 1, false, None, None);
        Field::new(attr, Value::Null)
    }

    #[test]
    fn test_set_reports_change() {
        let mut f = field(DataType::Integer);
        let (value, change) = f.set("5".into()).unwrap();
        assert_eq!(value, Value::Integer(5));
        let change = change.unwrap();
        assert_eq!(change.old, Value::Null);
        assert_eq!(change.new, Value::Integer(5));

        let (_, change) = f.set(Value::Integer(5)).unwrap();
        assert!(change.is_none());
    }

    #[test]
    fn test_failed_conversion_keeps_value() {
        let mut f = field(DataType::Boolean);
        f.set(Value::Boolean(true)).unwrap();
        let err = f.set("perhaps".into()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conversion);
        assert_eq!(f.value(), &Value::Boolean(true));
    }

    #[test]
    fn test_sequences_increase() {
        let mut f = field(DataType::Integer);
        let (_, a) = f.set(Value::Integer(1)).unwrap();
        let (_, b) = f.set(Value::Integer(2)).unwrap();
        assert!(b.unwrap().sequence > a.unwrap().sequence);
    }

    #[test]
    fn test_dirty_tracking() {
        let mut f = field(DataType::String);
        assert!(f.is_dirty());
        f.mark_pushed();
        assert!(!f.is_dirty());
        f.set("changed".into()).unwrap();
        assert!(f.is_dirty());
        f.set(Value::Null).unwrap();
        assert!(!f.is_dirty());
    }
}
