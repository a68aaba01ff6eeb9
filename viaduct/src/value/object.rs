use std::{iter::FromIterator, mem};

use crate::value::Value;

/// An ordered set of response fields.
///
/// Insertion order is preserved, matching the selection order of the
/// operation that produced the object.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Object {
    key_value_list: Vec<(String, Value)>,
}

impl Object {
    /// Creates a new [`Object`] with the provided capacity.
    pub fn with_capacity(size: usize) -> Self {
        Self {
            key_value_list: Vec::with_capacity(size),
        }
    }

    /// Adds a new field with a value.
    ///
    /// If there is already a field with the same name the old value is
    /// replaced and returned.
    pub fn add_field(&mut self, k: impl Into<String>, value: Value) -> Option<Value> {
        let key = k.into();

        if let Some(item) = self
            .key_value_list
            .iter_mut()
            .find(|(existing_key, _)| existing_key == &key)
        {
            return Some(mem::replace(&mut item.1, value));
        }

        self.key_value_list.push((key, value));
        None
    }

    /// Checks if this [`Object`] contains a field with the provided name.
    pub fn contains_field(&self, f: &str) -> bool {
        self.key_value_list.iter().any(|(key, _)| key == f)
    }

    /// Gets the current value of the provided field name.
    pub fn get_field_value(&self, key: &str) -> Option<&Value> {
        self.key_value_list
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, value)| value)
    }

    /// Returns an iterator over all field/value pairs, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.key_value_list.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns the number of fields in this [`Object`].
    pub fn field_count(&self) -> usize {
        self.key_value_list.len()
    }

    /// Consumes this [`Object`], returning its ordered field/value pairs.
    pub fn into_key_value_list(self) -> Vec<(String, Value)> {
        self.key_value_list
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Object {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        let iter = iter.into_iter();
        let mut ret = Self {
            key_value_list: Vec::with_capacity(iter.size_hint().0),
        };
        for (k, v) in iter {
            ret.add_field(k, v);
        }
        ret
    }
}
