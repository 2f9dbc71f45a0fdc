use std::collections::HashMap;
use std::fmt;

use tracing::info;

use crate::action::{Action, ActionType, FieldDescriptor};
use crate::errors::ConfigurationError;

/// Names an action type and knows how to create a fresh instance of it.
#[derive(Clone, Copy)]
pub struct ActionTypeHandle {
    pub name: &'static str,
    pub description: &'static str,
    factory: fn() -> Box<dyn Action>,
}

impl ActionTypeHandle {
    pub fn of<A>() -> Self
    where
        A: ActionType,
    {
        Self { name: A::default().type_name(), description: A::DESCRIPTION, factory: instantiate::<A> }
    }

    pub fn instantiate(&self) -> Box<dyn Action> {
        (self.factory)()
    }
}

impl fmt::Debug for ActionTypeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionTypeHandle").field("name", &self.name).finish_non_exhaustive()
    }
}

fn instantiate<A>() -> Box<dyn Action>
where
    A: ActionType,
{
    Box::new(A::default())
}

#[derive(Clone, Debug)]
pub struct ActionDescriptor {
    pub intent_name: String,
    pub action_type: ActionTypeHandle,
    pub fields: Vec<FieldDescriptor>,
}

#[derive(Default)]
pub struct RegistryBuilder {
    descriptors: Vec<ActionDescriptor>,
    errors: Vec<ConfigurationError>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<A>(mut self) -> Self
    where
        A: ActionType,
    {
        let handle = ActionTypeHandle::of::<A>();
        if A::INTENTS.is_empty() {
            self.errors.push(ConfigurationError::EmptyIntentDeclaration { action_type: handle.name });
        }

        for intent in A::INTENTS {
            if intent.trim().is_empty() {
                self.errors
                    .push(ConfigurationError::EmptyIntentDeclaration { action_type: handle.name });
                continue;
            }
            if let Some(existing) =
                self.descriptors.iter().find(|descriptor| descriptor.intent_name == *intent)
            {
                self.errors.push(ConfigurationError::DuplicateIntent {
                    intent: (*intent).to_owned(),
                    existing: existing.action_type.name,
                    attempted: handle.name,
                });
                continue;
            }

            self.descriptors.push(ActionDescriptor {
                intent_name: (*intent).to_owned(),
                action_type: handle,
                fields: handle.instantiate().fields(),
            });
        }
        self
    }

    pub fn build(self) -> Result<ActionRegistry, ConfigurationError> {
        if let Some(error) = self.errors.into_iter().next() {
            return Err(error);
        }

        let index = self
            .descriptors
            .iter()
            .enumerate()
            .map(|(position, descriptor)| (descriptor.intent_name.clone(), position))
            .collect::<HashMap<_, _>>();

        info!(
            event_name = "engine.registry.built",
            correlation_id = "bootstrap",
            intent_count = self.descriptors.len(),
            "action registry built"
        );

        Ok(ActionRegistry { descriptors: self.descriptors, index })
    }
}

/// Intent name to action descriptor map. Immutable once built.
#[derive(Debug)]
pub struct ActionRegistry {
    descriptors: Vec<ActionDescriptor>,
    index: HashMap<String, usize>,
}

impl ActionRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    pub fn lookup(&self, intent_name: &str) -> Option<&ActionDescriptor> {
        self.index.get(intent_name).map(|position| &self.descriptors[*position])
    }

    /// First binding declared for the instance's action type.
    pub fn descriptor_for(&self, action: &dyn Action) -> Option<&ActionDescriptor> {
        let type_name = action.type_name();
        self.descriptors.iter().find(|descriptor| descriptor.action_type.name == type_name)
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &ActionDescriptor> {
        self.descriptors.iter()
    }

    pub fn intents(&self) -> Vec<&str> {
        self.descriptors.iter().map(|descriptor| descriptor.intent_name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}
