use serde_json::Value;
use std::{
    any::{type_name, Any},
    collections::BTreeMap,
    fmt,
    sync::Arc,
};

use crate::{
    errors::{ContainerError, ContainerResult},
    lazy::LazyService,
    reference::Reference,
};

/// A constructed service as stored in the container
pub type Service = Arc<dyn Any + Send + Sync>;

/// A freshly constructed object, still mutable for setter injection
pub type Instance = Box<dyn Any + Send + Sync>;

/// Definition-time argument value
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    /// Literal value; strings go through parameter resolution
    Value(Value),
    Reference(Reference),
    List(Vec<Argument>),
    Map(BTreeMap<String, Argument>),
    /// Every service carrying the tag, highest priority first
    Tagged(String),
}

impl Argument {
    pub fn value(value: impl Into<Value>) -> Self {
        Argument::Value(value.into())
    }

    pub fn reference(id: impl Into<String>) -> Self {
        Argument::Reference(Reference::new(id))
    }

    /// `%name%` placeholder for a parameter
    pub fn parameter(name: &str) -> Self {
        Argument::Value(Value::String(format!("%{}%", name)))
    }

    pub fn tagged(tag: impl Into<String>) -> Self {
        Argument::Tagged(tag.into())
    }

    pub fn null() -> Self {
        Argument::Value(Value::Null)
    }

    /// References reachable from this argument, nested collections included
    pub fn references(&self) -> Vec<&Reference> {
        let mut found = Vec::new();
        self.collect_references(&mut found);
        found
    }

    fn collect_references<'a>(&'a self, found: &mut Vec<&'a Reference>) {
        match self {
            Argument::Reference(reference) => found.push(reference),
            Argument::List(items) => items.iter().for_each(|item| item.collect_references(found)),
            Argument::Map(map) => map.values().for_each(|item| item.collect_references(found)),
            Argument::Value(_) | Argument::Tagged(_) => {}
        }
    }
}

impl From<Reference> for Argument {
    fn from(reference: Reference) -> Self {
        Argument::Reference(reference)
    }
}

impl From<Value> for Argument {
    fn from(value: Value) -> Self {
        Argument::Value(value)
    }
}

impl From<&str> for Argument {
    fn from(value: &str) -> Self {
        Argument::Value(Value::String(value.to_string()))
    }
}

impl From<String> for Argument {
    fn from(value: String) -> Self {
        Argument::Value(Value::String(value))
    }
}

impl From<i64> for Argument {
    fn from(value: i64) -> Self {
        Argument::Value(value.into())
    }
}

impl From<bool> for Argument {
    fn from(value: bool) -> Self {
        Argument::Value(value.into())
    }
}

impl From<Vec<Argument>> for Argument {
    fn from(items: Vec<Argument>) -> Self {
        Argument::List(items)
    }
}

/// Resolution-time argument value
#[derive(Clone)]
pub enum Resolved {
    Value(Value),
    Service(Service),
    Lazy(LazyService),
    List(Vec<Resolved>),
    Map(BTreeMap<String, Resolved>),
}

impl Resolved {
    pub fn is_null(&self) -> bool {
        matches!(self, Resolved::Value(Value::Null))
    }

    /// Plain value view; `None` when services are involved
    pub fn to_value(&self) -> Option<Value> {
        match self {
            Resolved::Value(value) => Some(value.clone()),
            Resolved::List(items) => items
                .iter()
                .map(Resolved::to_value)
                .collect::<Option<Vec<_>>>()
                .map(Value::Array),
            Resolved::Map(map) => map
                .iter()
                .map(|(key, item)| item.to_value().map(|value| (key.clone(), value)))
                .collect::<Option<serde_json::Map<_, _>>>()
                .map(Value::Object),
            Resolved::Service(_) | Resolved::Lazy(_) => None,
        }
    }
}

impl fmt::Debug for Resolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolved::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Resolved::Service(_) => f.write_str("Service(..)"),
            Resolved::Lazy(lazy) => f.debug_tuple("Lazy").field(&lazy.id()).finish(),
            Resolved::List(items) => f.debug_tuple("List").field(items).finish(),
            Resolved::Map(map) => f.debug_tuple("Map").field(map).finish(),
        }
    }
}

pub(crate) fn downcast_service<T>(service: Service, id: &str) -> ContainerResult<Arc<T>>
where
    T: Any + Send + Sync,
{
    service
        .downcast::<T>()
        .map_err(|_| ContainerError::TypeMismatch {
            id: id.to_string(),
            expected: type_name::<T>().to_string(),
        })
}

/// Resolved arguments handed to constructors, factories and methods
#[derive(Debug, Clone)]
pub struct Arguments {
    consumer: String,
    values: Vec<Resolved>,
}

impl Arguments {
    pub fn new(consumer: impl Into<String>, values: Vec<Resolved>) -> Self {
        Self {
            consumer: consumer.into(),
            values,
        }
    }

    pub fn empty(consumer: impl Into<String>) -> Self {
        Self::new(consumer, Vec::new())
    }

    /// Id of the service being built
    pub fn consumer(&self) -> &str {
        &self.consumer
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Resolved> {
        self.values.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Resolved> {
        self.values.iter()
    }

    pub fn service<T>(&self, index: usize) -> ContainerResult<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        let expected = || format!("service of type {}", type_name::<T>());
        match self.required(index, &expected)? {
            Resolved::Service(service) => self.typed(service.clone(), index, &expected),
            Resolved::Lazy(lazy) => self.typed(lazy.get()?, index, &expected),
            _ => Err(self.invalid(index, expected())),
        }
    }

    /// Like [`Arguments::service`], but a missing argument or null yields `None`
    pub fn optional_service<T>(&self, index: usize) -> ContainerResult<Option<Arc<T>>>
    where
        T: Any + Send + Sync,
    {
        match self.values.get(index) {
            None => Ok(None),
            Some(resolved) if resolved.is_null() => Ok(None),
            Some(_) => self.service::<T>(index).map(Some),
        }
    }

    /// A list argument of services; null entries are skipped
    pub fn services<T>(&self, index: usize) -> ContainerResult<Vec<Arc<T>>>
    where
        T: Any + Send + Sync,
    {
        let expected = || format!("list of services of type {}", type_name::<T>());
        let items = match self.required(index, &expected)? {
            Resolved::List(items) => items,
            _ => return Err(self.invalid(index, expected())),
        };

        let mut services = Vec::with_capacity(items.len());
        for item in items {
            match item {
                Resolved::Service(service) => {
                    services.push(self.typed(service.clone(), index, &expected)?)
                }
                Resolved::Lazy(lazy) => services.push(self.typed(lazy.get()?, index, &expected)?),
                resolved if resolved.is_null() => {}
                _ => return Err(self.invalid(index, expected())),
            }
        }
        Ok(services)
    }

    /// Service argument without forcing instantiation
    pub fn lazy(&self, index: usize) -> ContainerResult<LazyService> {
        let expected = || "service".to_string();
        match self.required(index, &expected)? {
            Resolved::Lazy(lazy) => Ok(lazy.clone()),
            Resolved::Service(service) => Ok(LazyService::from_service(
                format!("{}#{}", self.consumer, index),
                service.clone(),
            )),
            _ => Err(self.invalid(index, expected())),
        }
    }

    pub fn value(&self, index: usize) -> ContainerResult<Value> {
        let expected = || "plain value".to_string();
        self.required(index, &expected)?
            .to_value()
            .ok_or_else(|| self.invalid(index, expected()))
    }

    pub fn string(&self, index: usize) -> ContainerResult<String> {
        match self.value(index)? {
            Value::String(s) => Ok(s),
            _ => Err(self.invalid(index, "string")),
        }
    }

    pub fn int(&self, index: usize) -> ContainerResult<i64> {
        match self.value(index)? {
            Value::Number(n) if n.is_i64() => n.as_i64().ok_or_else(|| self.invalid(index, "integer")),
            Value::String(s) => s.trim().parse().map_err(|_| self.invalid(index, "integer")),
            _ => Err(self.invalid(index, "integer")),
        }
    }

    pub fn float(&self, index: usize) -> ContainerResult<f64> {
        match self.value(index)? {
            Value::Number(n) => n.as_f64().ok_or_else(|| self.invalid(index, "float")),
            Value::String(s) => s.trim().parse().map_err(|_| self.invalid(index, "float")),
            _ => Err(self.invalid(index, "float")),
        }
    }

    pub fn bool(&self, index: usize) -> ContainerResult<bool> {
        match self.value(index)? {
            Value::Bool(b) => Ok(b),
            Value::String(s) if s == "true" => Ok(true),
            Value::String(s) if s == "false" => Ok(false),
            _ => Err(self.invalid(index, "boolean")),
        }
    }

    pub fn list(&self, index: usize) -> ContainerResult<&[Resolved]> {
        match self.required(index, &|| "list".to_string())? {
            Resolved::List(items) => Ok(items),
            _ => Err(self.invalid(index, "list")),
        }
    }

    fn required(
        &self,
        index: usize,
        expected: &dyn Fn() -> String,
    ) -> ContainerResult<&Resolved> {
        self.values
            .get(index)
            .ok_or_else(|| self.invalid(index, format!("{} (argument is missing)", expected())))
    }

    fn typed<T>(
        &self,
        service: Service,
        index: usize,
        expected: &dyn Fn() -> String,
    ) -> ContainerResult<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        service
            .downcast::<T>()
            .map_err(|_| self.invalid(index, expected()))
    }

    fn invalid(&self, index: usize, expected: impl Into<String>) -> ContainerError {
        ContainerError::InvalidArgument {
            consumer: self.consumer.clone(),
            index,
            expected: expected.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug)]
    struct Mailer;

    #[test]
    fn test_references_are_collected_recursively() {
        let argument = Argument::List(vec![
            Argument::reference("a"),
            Argument::value(1),
            Argument::Map(BTreeMap::from([(
                "inner".to_string(),
                Argument::Reference(Reference::optional("b")),
            )])),
        ]);

        let ids: Vec<_> = argument.references().iter().map(|r| r.id()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_typed_accessors() -> ContainerResult<()> {
        let mailer: Service = Arc::new(Mailer);
        let args = Arguments::new(
            "newsletter",
            vec![
                Resolved::Service(mailer),
                Resolved::Value(json!("weekly")),
                Resolved::Value(json!(7)),
                Resolved::Value(json!("2.5")),
                Resolved::Value(json!(true)),
                Resolved::Value(Value::Null),
                Resolved::List(vec![Resolved::Value(json!(1)), Resolved::Value(json!(2))]),
            ],
        );

        args.service::<Mailer>(0)?;
        assert_eq!(args.string(1)?, "weekly");
        assert_eq!(args.int(2)?, 7);
        assert_eq!(args.float(3)?, 2.5);
        assert!(args.bool(4)?);
        assert!(args.optional_service::<Mailer>(5)?.is_none());
        assert!(args.optional_service::<Mailer>(42)?.is_none());
        assert_eq!(args.value(6)?, json!([1, 2]));
        assert_eq!(args.list(6)?.len(), 2);
        Ok(())
    }

    #[test]
    fn test_invalid_argument_names_consumer_and_index() {
        let args = Arguments::new("newsletter", vec![Resolved::Value(json!("text"))]);

        match args.service::<Mailer>(0).unwrap_err() {
            ContainerError::InvalidArgument {
                consumer,
                index,
                expected,
            } => {
                assert_eq!(consumer, "newsletter");
                assert_eq!(index, 0);
                assert!(expected.contains("Mailer"));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        assert!(matches!(
            args.int(3),
            Err(ContainerError::InvalidArgument { index: 3, .. })
        ));
    }

    #[test]
    fn test_wrong_service_type_is_rejected() {
        let service: Service = Arc::new(String::from("not a mailer"));
        let args = Arguments::new("newsletter", vec![Resolved::Service(service)]);
        assert!(args.service::<Mailer>(0).is_err());
    }
}
