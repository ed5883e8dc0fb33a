//! Document filters and field-level patches.
//!
//! Filters and patches operate on the JSON form of a document, so one
//! implementation serves every collection. Field names are the serialized
//! names (`_id`, `eventIds`, ...).

use serde_json::{Map, Value};

use crate::error::{StateError, StateResult};

/// A single filter clause.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// The field equals the value.
    Eq(Value),
    /// The field is an array containing the value.
    Contains(Value),
}

/// A conjunction of field conditions. The empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    clauses: Vec<(String, Condition)>,
}

impl Filter {
    /// Match every document.
    pub fn all() -> Self {
        Self::default()
    }

    /// Require `field == value`.
    pub fn eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.clauses
            .push((field.to_string(), Condition::Eq(value.into())));
        self
    }

    /// Require the array `field` to contain `value`.
    pub fn contains(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.clauses
            .push((field.to_string(), Condition::Contains(value.into())));
        self
    }

    pub fn matches(&self, doc: &Value) -> bool {
        self.clauses.iter().all(|(field, cond)| {
            let Some(actual) = doc.get(field) else {
                return false;
            };
            match cond {
                Condition::Eq(expected) => actual == expected,
                Condition::Contains(expected) => actual
                    .as_array()
                    .is_some_and(|items| items.contains(expected)),
            }
        })
    }
}

/// An atomic field-level update.
#[derive(Debug, Clone, PartialEq)]
pub enum Patch {
    /// Replace a scalar (or any) field.
    Set { field: String, value: Value },
    /// Append to a set-valued field unless already present.
    AddToSet { field: String, value: Value },
    /// Remove every occurrence of a value from a set-valued field.
    Pull { field: String, value: Value },
    /// Add `by` to an integer field.
    Inc { field: String, by: i64 },
}

impl Patch {
    pub fn set(field: &str, value: impl Into<Value>) -> Self {
        Self::Set {
            field: field.to_string(),
            value: value.into(),
        }
    }

    pub fn add_to_set(field: &str, value: impl Into<Value>) -> Self {
        Self::AddToSet {
            field: field.to_string(),
            value: value.into(),
        }
    }

    pub fn pull(field: &str, value: impl Into<Value>) -> Self {
        Self::Pull {
            field: field.to_string(),
            value: value.into(),
        }
    }

    pub fn inc(field: &str, by: i64) -> Self {
        Self::Inc {
            field: field.to_string(),
            by,
        }
    }

    fn field(&self) -> &str {
        match self {
            Patch::Set { field, .. }
            | Patch::AddToSet { field, .. }
            | Patch::Pull { field, .. }
            | Patch::Inc { field, .. } => field,
        }
    }

    /// Apply the patch to a document object in place.
    pub(crate) fn apply(&self, doc: &mut Map<String, Value>) -> StateResult<()> {
        if self.field() == "_id" {
            return Err(StateError::Operation("`_id` is immutable".to_string()));
        }

        match self {
            Patch::Set { field, value } => {
                doc.insert(field.clone(), value.clone());
            }
            Patch::AddToSet { field, value } => {
                let items = array_field(doc, field)?;
                if !items.contains(value) {
                    items.push(value.clone());
                }
            }
            Patch::Pull { field, value } => {
                let items = array_field(doc, field)?;
                items.retain(|item| item != value);
            }
            Patch::Inc { field, by } => {
                let current = match doc.get(field) {
                    None | Some(Value::Null) => 0,
                    Some(v) => v.as_i64().ok_or_else(|| {
                        StateError::Operation(format!("field `{field}` is not an integer"))
                    })?,
                };
                doc.insert(field.clone(), Value::from(current + by));
            }
        }
        Ok(())
    }
}

fn array_field<'a>(doc: &'a mut Map<String, Value>, field: &str) -> StateResult<&'a mut Vec<Value>> {
    let slot = doc
        .entry(field.to_string())
        .or_insert_with(|| Value::Array(Vec::new()));
    if slot.is_null() {
        *slot = Value::Array(Vec::new());
    }
    slot.as_array_mut()
        .ok_or_else(|| StateError::Operation(format!("field `{field}` is not an array")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert!(Filter::all().matches(&json!({"_id": "a"})));
    }

    #[test]
    fn eq_and_contains_compose() {
        let node = json!({"_id": "n1", "ip": "10.0.0.1", "apps": ["a1", "a2"]});

        assert!(Filter::all().eq("ip", "10.0.0.1").matches(&node));
        assert!(Filter::all().contains("apps", "a2").matches(&node));
        assert!(
            !Filter::all()
                .eq("ip", "10.0.0.1")
                .contains("apps", "a3")
                .matches(&node)
        );
    }

    #[test]
    fn contains_on_missing_or_scalar_field_is_false() {
        let node = json!({"_id": "n1", "ip": "10.0.0.1"});
        assert!(!Filter::all().contains("apps", "a1").matches(&node));
        assert!(!Filter::all().contains("ip", "10.0.0.1").matches(&node));
    }

    #[test]
    fn add_to_set_is_idempotent() {
        let mut d = doc(json!({"members": ["n1"]}));
        Patch::add_to_set("members", "n2").apply(&mut d).unwrap();
        Patch::add_to_set("members", "n2").apply(&mut d).unwrap();
        assert_eq!(d["members"], json!(["n1", "n2"]));
    }

    #[test]
    fn add_to_set_creates_missing_array() {
        let mut d = doc(json!({}));
        Patch::add_to_set("apps", "a1").apply(&mut d).unwrap();
        assert_eq!(d["apps"], json!(["a1"]));
    }

    #[test]
    fn pull_removes_value() {
        let mut d = doc(json!({"apps": ["a1", "a2"]}));
        Patch::pull("apps", "a1").apply(&mut d).unwrap();
        assert_eq!(d["apps"], json!(["a2"]));
    }

    #[test]
    fn inc_adds_and_subtracts() {
        let mut d = doc(json!({"refcnt": 1}));
        Patch::inc("refcnt", 2).apply(&mut d).unwrap();
        Patch::inc("refcnt", -1).apply(&mut d).unwrap();
        assert_eq!(d["refcnt"], json!(2));
    }

    #[test]
    fn inc_on_string_fails() {
        let mut d = doc(json!({"refcnt": "one"}));
        assert!(Patch::inc("refcnt", 1).apply(&mut d).is_err());
    }

    #[test]
    fn id_cannot_be_patched() {
        let mut d = doc(json!({"_id": "x"}));
        assert!(Patch::set("_id", "y").apply(&mut d).is_err());
    }
}
