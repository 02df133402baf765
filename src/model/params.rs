use indexmap::IndexMap;
use log::warn;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::system::SystemDef;

/// Named, positionally indexed parameter values.
///
/// `Parameter(i)` nodes read the `i`-th entry in insertion order. Names exist for
/// display and overrides only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct Params {
    values: IndexMap<String, f32>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Anonymous parameters named `p0`, `p1`, ...
    pub fn from_values(values: &[f32]) -> Self {
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| (format!("p{i}"), v))
            .collect()
    }

    /// Collect every formula's parameter values in the same order
    /// [`SystemDef::to_source`] assigns indices.
    ///
    /// Each formula contributes exactly `param_count()` slots. Missing values
    /// (an unvalidated description) are filled with `0.0`, extra ones dropped.
    pub fn from_system(system: &SystemDef) -> Self {
        let mut params = Params::new();
        for (prefix, formula) in system.formulas_in_order() {
            let count = formula.param_count();
            if formula.params.len() < count {
                warn!(
                    "{prefix}: {} of {count} parameter values given, padding with 0",
                    formula.params.len()
                );
            }
            for k in 0..count {
                let value = formula.params.get(k).copied().unwrap_or(0.0);
                params.push(format!("{prefix}.{}", formula.param_name(k)), value);
            }
        }
        params
    }

    /// Append a parameter at the next index. A name already in use gets a
    /// `#n` suffix so the new value still takes its own slot.
    pub fn push(&mut self, name: impl Into<String>, value: f32) {
        let name = name.into();
        let mut key = name.clone();
        let mut n = 1;
        while self.values.contains_key(&key) {
            key = format!("{name}#{n}");
            n += 1;
        }
        self.values.insert(key, value);
    }

    pub fn get(&self, index: u32) -> Option<f32> {
        self.values
            .get_index(index as usize)
            .map(|(_, &value)| value)
    }

    pub fn by_name(&self, name: &str) -> Option<f32> {
        self.values.get(name).copied()
    }

    /// Overwrite an existing named value. Returns false when the name is unknown.
    pub fn set(&mut self, name: &str, value: f32) -> bool {
        match self.values.get_mut(name) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f32)> {
        self.values.iter().map(|(name, &value)| (name.as_str(), value))
    }

    /// Values in index order.
    pub fn values(&self) -> Vec<f32> {
        self.values.values().copied().collect()
    }
}

impl FromIterator<(String, f32)> for Params {
    fn from_iter<I: IntoIterator<Item = (String, f32)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (name, value) in iter {
            params.push(name, value);
        }
        params
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn index_follows_insertion_order() {
        let mut params = Params::new();
        params.push("b", 2.0);
        params.push("a", 1.0);
        assert_eq!(params.get(0), Some(2.0));
        assert_eq!(params.get(1), Some(1.0));
        assert_eq!(params.get(2), None);
    }

    #[test]
    fn repeated_names_take_new_slots() {
        let mut params = Params::new();
        params.push("a", 1.0);
        params.push("a", 2.0);
        params.push("a", 3.0);
        assert_eq!(params.len(), 3);
        assert_eq!(params.values(), vec![1.0, 2.0, 3.0]);
        assert_eq!(params.by_name("a"), Some(1.0));
        assert_eq!(params.by_name("a#1"), Some(2.0));
        assert_eq!(params.by_name("a#2"), Some(3.0));

        let collected: Params = [("x".to_string(), 4.0), ("x".to_string(), 5.0)]
            .into_iter()
            .collect();
        assert_eq!(collected.get(1), Some(5.0));
    }

    #[test]
    fn set_keeps_position() {
        let mut params = Params::from_values(&[1.0, 2.0, 3.0]);
        assert!(params.set("p1", 9.0));
        assert!(!params.set("missing", 0.0));
        assert_eq!(params.values(), vec![1.0, 9.0, 3.0]);
        assert_eq!(params.by_name("p1"), Some(9.0));
    }

    #[test]
    fn serializes_as_ordered_object() {
        let params = Params::from_values(&[0.5, -1.0]);
        let json = serde_json::to_string(&params).unwrap();
        assert_eq!(json, r#"{"p0":0.5,"p1":-1.0}"#);
        let back: Params = serde_json::from_str(&json).unwrap();
        assert_eq!(back, params);
    }
}
