#![allow(dead_code)]

use container::{
    Arguments, ContainerBuilder, ContainerResult, Parameter, ServiceType,
};
use std::sync::Arc;

pub struct Logger {
    pub channel: String,
}

pub struct Transport {
    pub dsn: String,
}

pub struct Mailer {
    pub transport: Arc<Transport>,
    pub logger: Option<Arc<Logger>>,
    pub logger_calls: usize,
}

pub struct Listener {
    pub name: String,
}

#[derive(Default)]
pub struct Dispatcher {
    pub listeners: Vec<(String, i64)>,
}

pub struct ListenerChain {
    pub listeners: Vec<Arc<Listener>>,
}

/// Keeps whatever it was built with
pub struct Node {
    pub args: Arguments,
}

pub fn logger_type() -> ServiceType {
    ServiceType::new("Logger")
        .with_parameter(Parameter::string("channel").with_default("app"))
        .with_constructor(|args| {
            Ok(Logger {
                channel: args.string(0).unwrap_or_else(|_| "app".to_string()),
            })
        })
}

pub fn register_types(builder: &mut ContainerBuilder) -> ContainerResult<()> {
    builder.register_type(logger_type())?;

    builder.register_type(
        ServiceType::new("Transport")
            .implements("TransportInterface")
            .with_parameter(Parameter::string("dsn"))
            .with_constructor(|args| Ok(Transport { dsn: args.string(0)? }))
            .with_static_factory("from_env", |args| {
                Ok(Transport {
                    dsn: format!("env:{}", args.string(0)?),
                })
            }),
    )?;

    builder.register_type(
        ServiceType::new("Mailer")
            .with_parameter(Parameter::service_named("transport", "TransportInterface"))
            .with_constructor(|args| {
                Ok(Mailer {
                    transport: args.service::<Transport>(0)?,
                    logger: None,
                    logger_calls: 0,
                })
            })
            .with_method("set_logger", |mailer: &mut Mailer, args| {
                mailer.logger = args.optional_service::<Logger>(0)?;
                mailer.logger_calls += 1;
                Ok(())
            }),
    )?;

    builder.register_type(
        ServiceType::new("Listener")
            .with_constructor(|args| Ok(Listener { name: args.string(0)? })),
    )?;

    builder.register_type(
        ServiceType::new("Dispatcher")
            .with_constructor(|_| Ok(Dispatcher::default()))
            .with_method("add_listener", |dispatcher: &mut Dispatcher, args| {
                let listener = args.service::<Listener>(0)?;
                let priority = args
                    .get(1)
                    .and_then(|resolved| resolved.to_value())
                    .and_then(|value| value.as_i64())
                    .unwrap_or(0);
                dispatcher.listeners.push((listener.name.clone(), priority));
                Ok(())
            }),
    )?;

    builder.register_type(
        ServiceType::new("ListenerChain").with_constructor(|args| {
            Ok(ListenerChain {
                listeners: args.services::<Listener>(0)?,
            })
        }),
    )?;

    builder.register_type(
        ServiceType::new("Node")
            .with_constructor(|args| Ok(Node { args: args.clone() }))
            .with_method("attach", |node: &mut Node, args| {
                node.args = args.clone();
                Ok(())
            }),
    )?;

    Ok(())
}

pub fn builder() -> ContainerResult<ContainerBuilder> {
    let mut builder = ContainerBuilder::new();
    register_types(&mut builder)?;
    Ok(builder)
}
