//! The `{data, errors}` envelope an executed operation produces.

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::{executor::ExecutionError, value::Value};

/// The result of executing one operation: the response data plus every field
/// error captured along the way.
#[derive(Clone, Debug, PartialEq)]
pub struct ExecutionOutput {
    /// The response data; [`Value::Null`] when a non-null root field failed.
    pub data: Value,

    /// Captured field errors, ordered by response path.
    pub errors: Vec<ExecutionError>,
}

impl ExecutionOutput {
    /// Renders this output as a JSON value.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl Serialize for ExecutionOutput {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let fields = if self.errors.is_empty() { 1 } else { 2 };
        let mut map = serializer.serialize_map(Some(fields))?;
        map.serialize_entry("data", &self.data)?;
        if !self.errors.is_empty() {
            map.serialize_entry("errors", &self.errors)?;
        }
        map.end()
    }
}
