//! Parameter storage and `%placeholder%` resolution.
//!
//! Values are stored raw and resolved at read time:
//! - `%name%` is replaced by the (recursively resolved) value of `name`
//! - a string made of exactly one placeholder keeps the referenced value's type
//! - `%%` is a literal percent sign
//! - `%env(NAME)%` reads the process environment, falling back to a parameter
//!   literally named `env(NAME)`

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use regex::{Captures, Regex};
use serde_json::Value;
use std::{
    collections::{BTreeMap, HashMap},
    env,
    sync::atomic::{AtomicBool, Ordering},
};
use tracing::trace;

use crate::errors::{ContainerError, ContainerResult};

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"%%|%([^%\s]+)%").expect("Invalid placeholder regex"));

static WHOLE_PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^%([^%\s]+)%$").expect("Invalid placeholder regex"));

#[derive(Debug, Default)]
pub struct ParameterBag {
    values: RwLock<HashMap<String, Value>>,
    frozen: AtomicBool,
}

impl ParameterBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, name: impl Into<String>, value: impl Into<Value>) -> ContainerResult<()> {
        if self.is_frozen() {
            return Err(ContainerError::frozen("set a parameter"));
        }
        let name = name.into();
        trace!(parameter = %name, "parameter set");
        self.values.write().insert(name, value.into());
        Ok(())
    }

    pub fn remove(&self, name: &str) -> ContainerResult<Option<Value>> {
        if self.is_frozen() {
            return Err(ContainerError::frozen("remove a parameter"));
        }
        Ok(self.values.write().remove(name))
    }

    pub fn has(&self, name: &str) -> bool {
        self.values.read().contains_key(name)
    }

    /// Raw value, placeholders untouched
    pub fn get_raw(&self, name: &str) -> ContainerResult<Value> {
        self.values
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| ContainerError::parameter_not_found(name, None))
    }

    /// Fully resolved value
    pub fn get(&self, name: &str) -> ContainerResult<Value> {
        let mut stack = Vec::new();
        self.resolve_named(name, &mut stack)
    }

    /// Raw values sorted by name
    pub fn all(&self) -> BTreeMap<String, Value> {
        self.values
            .read()
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }

    pub fn freeze(&self) {
        self.frozen.store(true, Ordering::Release);
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::Acquire)
    }

    /// Resolve every placeholder inside `value` (strings, arrays and object values)
    pub fn resolve_value(&self, value: &Value) -> ContainerResult<Value> {
        let mut stack = Vec::new();
        self.resolve_value_with(value, &mut stack)
    }

    /// Resolve placeholders inside a single string
    pub fn resolve_string(&self, input: &str) -> ContainerResult<Value> {
        let mut stack = Vec::new();
        self.resolve_string_with(input, &mut stack)
    }

    fn resolve_value_with(&self, value: &Value, stack: &mut Vec<String>) -> ContainerResult<Value> {
        match value {
            Value::String(s) => self.resolve_string_with(s, stack),
            Value::Array(items) => items
                .iter()
                .map(|item| self.resolve_value_with(item, stack))
                .collect::<ContainerResult<Vec<_>>>()
                .map(Value::Array),
            Value::Object(map) => {
                let mut resolved = serde_json::Map::with_capacity(map.len());
                for (key, item) in map {
                    let key = match self.resolve_string_with(key, stack)? {
                        Value::String(s) => s,
                        other => scalar_to_string(&other, key)?,
                    };
                    resolved.insert(key, self.resolve_value_with(item, stack)?);
                }
                Ok(Value::Object(resolved))
            }
            other => Ok(other.clone()),
        }
    }

    fn resolve_string_with(&self, input: &str, stack: &mut Vec<String>) -> ContainerResult<Value> {
        if let Some(captures) = WHOLE_PLACEHOLDER.captures(input) {
            return self.resolve_named(&captures[1], stack);
        }

        if !input.contains('%') {
            return Ok(Value::String(input.to_string()));
        }

        let mut output = String::with_capacity(input.len());
        let mut last = 0;
        for captures in PLACEHOLDER.captures_iter(input) {
            let Some(matched) = captures.get(0) else {
                continue;
            };
            output.push_str(&input[last..matched.start()]);
            output.push_str(&self.expand_embedded(&captures, input, stack)?);
            last = matched.end();
        }
        output.push_str(&input[last..]);

        Ok(Value::String(output))
    }

    fn expand_embedded(
        &self,
        captures: &Captures<'_>,
        input: &str,
        stack: &mut Vec<String>,
    ) -> ContainerResult<String> {
        match captures.get(1) {
            None => Ok("%".to_string()),
            Some(name) => {
                let value = self.resolve_named(name.as_str(), stack)?;
                scalar_to_string(&value, input)
            }
        }
    }

    fn resolve_named(&self, name: &str, stack: &mut Vec<String>) -> ContainerResult<Value> {
        if let Some(variable) = env_variable_name(name) {
            if let Ok(value) = env::var(variable) {
                return Ok(Value::String(value));
            }
            if !self.has(name) {
                return Err(ContainerError::parameter_not_found(
                    name,
                    stack.last().cloned(),
                ));
            }
        }

        if let Some(position) = stack.iter().position(|entry| entry == name) {
            let mut path = stack[position..].to_vec();
            path.push(name.to_string());
            return Err(ContainerError::ParameterCircularReference { path });
        }

        let raw = self
            .values
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| ContainerError::parameter_not_found(name, stack.last().cloned()))?;

        stack.push(name.to_string());
        let resolved = self.resolve_value_with(&raw, stack);
        stack.pop();
        resolved
    }
}

fn env_variable_name(name: &str) -> Option<&str> {
    name.strip_prefix("env(")
        .and_then(|rest| rest.strip_suffix(')'))
        .filter(|variable| !variable.is_empty())
}

fn scalar_to_string(value: &Value, context: &str) -> ContainerResult<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Ok(String::new()),
        Value::Array(_) | Value::Object(_) => Err(ContainerError::configuration(
            format!(
                "a string value must be composed of strings and/or numbers, but \"{}\" embeds a collection",
                context
            ),
            None::<String>,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_placeholder_chain_is_fully_substituted() -> ContainerResult<()> {
        let bag = ParameterBag::new();
        bag.set("a", "%b%")?;
        bag.set("b", "x")?;

        assert_eq!(bag.get("a")?, json!("x"));
        assert_eq!(bag.get_raw("a")?, json!("%b%"));
        Ok(())
    }

    #[test]
    fn test_embedded_placeholders_and_escapes() -> ContainerResult<()> {
        let bag = ParameterBag::new();
        bag.set("host", "localhost")?;
        bag.set("port", 5432)?;
        bag.set("dsn", "pg://%host%:%port%/app")?;
        bag.set("discount", "50%% off")?;
        bag.set("lonely", "100%")?;

        assert_eq!(bag.get("dsn")?, json!("pg://localhost:5432/app"));
        assert_eq!(bag.get("discount")?, json!("50% off"));
        assert_eq!(bag.get("lonely")?, json!("100%"));
        Ok(())
    }

    #[test]
    fn test_whole_placeholder_keeps_type() -> ContainerResult<()> {
        let bag = ParameterBag::new();
        bag.set("hosts", json!(["a", "b"]))?;
        bag.set("copy", "%hosts%")?;
        bag.set("retries", 3)?;

        assert_eq!(bag.get("copy")?, json!(["a", "b"]));
        assert_eq!(bag.resolve_string("%retries%")?, json!(3));
        Ok(())
    }

    #[test]
    fn test_arrays_resolve_element_wise() -> ContainerResult<()> {
        let bag = ParameterBag::new();
        bag.set("name", "app")?;
        bag.set("paths", json!(["/srv/%name%", {"log": "/var/log/%name%.log"}]))?;

        assert_eq!(
            bag.get("paths")?,
            json!(["/srv/app", {"log": "/var/log/app.log"}])
        );
        Ok(())
    }

    #[test]
    fn test_collection_cannot_be_embedded() -> ContainerResult<()> {
        let bag = ParameterBag::new();
        bag.set("list", json!([1, 2]))?;
        bag.set("broken", "items: %list%")?;

        let error = bag.get("broken").unwrap_err();
        assert_eq!(error.category(), "configuration");
        Ok(())
    }

    #[test]
    fn test_missing_parameter_names_source() -> ContainerResult<()> {
        let bag = ParameterBag::new();
        bag.set("a", "%missing%")?;

        match bag.get("a").unwrap_err() {
            ContainerError::ParameterNotFound { name, referenced_by } => {
                assert_eq!(name, "missing");
                assert_eq!(referenced_by.as_deref(), Some("a"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(matches!(
            bag.get("nope"),
            Err(ContainerError::ParameterNotFound { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_self_reference_is_reported() -> ContainerResult<()> {
        let bag = ParameterBag::new();
        bag.set("a", "%b%")?;
        bag.set("b", "prefix-%a%")?;

        match bag.get("a").unwrap_err() {
            ContainerError::ParameterCircularReference { path } => {
                assert_eq!(path, vec!["a", "b", "a"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn test_env_placeholder_with_fallback() -> ContainerResult<()> {
        let bag = ParameterBag::new();
        env::set_var("CONTAINER_TEST_DATABASE_HOST", "db.internal");
        bag.set("env(CONTAINER_TEST_UNSET_VARIABLE)", "fallback")?;

        assert_eq!(
            bag.resolve_string("%env(CONTAINER_TEST_DATABASE_HOST)%")?,
            json!("db.internal")
        );
        assert_eq!(
            bag.resolve_string("%env(CONTAINER_TEST_UNSET_VARIABLE)%")?,
            json!("fallback")
        );
        assert!(bag
            .resolve_string("%env(CONTAINER_TEST_ANOTHER_UNSET)%")
            .is_err());
        Ok(())
    }

    #[test]
    fn test_frozen_bag_rejects_writes() -> ContainerResult<()> {
        let bag = ParameterBag::new();
        bag.set("a", 1)?;
        bag.freeze();

        assert!(matches!(bag.set("b", 2), Err(ContainerError::Frozen { .. })));
        assert!(matches!(bag.remove("a"), Err(ContainerError::Frozen { .. })));
        assert_eq!(bag.get("a")?, json!(1));
        Ok(())
    }

    proptest! {
        #[test]
        fn prop_strings_without_percent_are_untouched(input in "[^%]{0,40}") {
            let bag = ParameterBag::new();
            prop_assert_eq!(bag.resolve_string(&input).unwrap(), Value::String(input.clone()));
        }

        #[test]
        fn prop_placeholder_resolves_to_stored_scalar(name in "[a-z][a-z0-9_.]{0,12}", value in "[^%]{0,20}") {
            let bag = ParameterBag::new();
            bag.set(name.clone(), value.clone()).unwrap();
            prop_assert_eq!(bag.resolve_string(&format!("%{}%", name)).unwrap(), Value::String(value.clone()));
            prop_assert_eq!(
                bag.resolve_string(&format!("[%{}%]", name)).unwrap(),
                Value::String(format!("[{}]", value))
            );
        }
    }
}
