//! Container (component C11): a typed service registry wired up in
//! dependency order.

use crate::error::{EngineError, Result};
use std::any::Any;
use std::collections::HashMap;

/// One registered service: its name, the names of services it depends on,
/// and a factory closure that builds it from the (partially built)
/// container.
pub struct Factory {
    pub name: String,
    pub dependencies: Vec<String>,
    pub create: Box<dyn FnOnce(&Container) -> Result<Box<dyn Any + Send + Sync>>>,
}

impl Factory {
    pub fn new(
        name: impl Into<String>,
        dependencies: Vec<String>,
        create: impl FnOnce(&Container) -> Result<Box<dyn Any + Send + Sync>> + 'static,
    ) -> Self {
        Self { name: name.into(), dependencies, create: Box::new(create) }
    }
}

/// Accepts factories and produces a `Container` with services created in
/// topological order.
#[derive(Default)]
pub struct Builder {
    factories: HashMap<String, Factory>,
}

impl Builder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, factory: Factory) -> Self {
        self.factories.insert(factory.name.clone(), factory);
        self
    }

    /// Topologically sort registered factories (DFS with a visiting set;
    /// a revisit of a node still `visiting` is a cycle, which is fatal),
    /// then create services in that order.
    pub fn build(mut self) -> Result<Container> {
        let order = topological_order(&self.factories)?;
        let mut container = Container { services: HashMap::new() };

        for name in order {
            let factory = self
                .factories
                .remove(&name)
                .ok_or_else(|| EngineError::InvariantViolation(format!("no factory registered for {name}")))?;
            let service = (factory.create)(&container)?;
            container.services.insert(name, service);
        }

        Ok(container)
    }
}

fn topological_order(factories: &HashMap<String, Factory>) -> Result<Vec<String>> {
    #[derive(PartialEq)]
    enum Mark {
        Visiting,
        Done,
    }

    let mut marks: HashMap<String, Mark> = HashMap::new();
    let mut order = Vec::new();

    fn visit(
        name: &str,
        factories: &HashMap<String, Factory>,
        marks: &mut HashMap<String, Mark>,
        order: &mut Vec<String>,
    ) -> Result<()> {
        match marks.get(name) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => {
                return Err(EngineError::InvariantViolation(format!("dependency cycle detected at {name}")));
            }
            None => {}
        }
        let Some(factory) = factories.get(name) else {
            return Err(EngineError::InvariantViolation(format!("no factory registered for {name}")));
        };
        marks.insert(name.to_string(), Mark::Visiting);
        for dep in &factory.dependencies {
            visit(dep, factories, marks, order)?;
        }
        marks.insert(name.to_string(), Mark::Done);
        order.push(name.to_string());
        Ok(())
    }

    let mut names: Vec<&String> = factories.keys().collect();
    names.sort();
    for name in names {
        visit(name, factories, &mut marks, &mut order)?;
    }
    Ok(order)
}

/// Holds constructed services by name; retrieval performs a type
/// assertion via `downcast_ref`.
pub struct Container {
    services: HashMap<String, Box<dyn Any + Send + Sync>>,
}

impl Container {
    pub fn get<T: 'static>(&self, name: &str) -> Result<&T> {
        let boxed = self
            .services
            .get(name)
            .ok_or_else(|| EngineError::InvariantViolation(format!("no service registered under {name}")))?;
        boxed
            .downcast_ref::<T>()
            .ok_or_else(|| EngineError::InvariantViolation(format!("service {name} is not of the requested type")))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.services.contains_key(name)
    }
}
