use crate::EngineError;
use serde_json::Value;
use std::any::{Any, TypeId};
use std::collections::HashMap;

/// Domain entity carried by a token (a vehicle, a robot, a charger).
///
/// Actors are stored in the token keyed by their concrete type, so a token
/// holds at most one actor of each type. `type_name` is the stable tag used
/// by configuration-level filters (e.g. `"user::Robot"`); it should not
/// change between runs. Actors bound to invokers are shared behind an
/// `Arc`, so the trait requires `Sync`.
pub trait Actor: Any + Send + Sync {
    /// Stable type tag, matched against arc token filters.
    fn type_name(&self) -> &str;

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

/// A record flowing through the net.
///
/// Tokens move between places as transitions fire. Each token owns zero or
/// more actors and an arbitrary JSON object usable for passing parameters.
/// Tokens move, they are never copied.
pub struct Token {
    actors: HashMap<TypeId, Box<dyn Actor>>,
    data: Value,
}

impl Token {
    pub fn new() -> Self {
        Self {
            actors: HashMap::new(),
            data: Value::Object(serde_json::Map::new()),
        }
    }

    /// Add an actor, replacing any existing actor of the same type.
    pub fn add_actor<A: Actor>(&mut self, actor: A) {
        self.actors.insert(TypeId::of::<A>(), Box::new(actor));
    }

    /// Get an actor of the given type.
    pub fn actor<A: Actor>(&self) -> Result<&A, EngineError> {
        self.actors
            .get(&TypeId::of::<A>())
            .and_then(|a| a.as_any().downcast_ref::<A>())
            .ok_or_else(|| EngineError::ActorNotFound(std::any::type_name::<A>().to_string()))
    }

    /// Get a mutable actor of the given type.
    pub fn actor_mut<A: Actor>(&mut self) -> Result<&mut A, EngineError> {
        self.actors
            .get_mut(&TypeId::of::<A>())
            .and_then(|a| a.as_any_mut().downcast_mut::<A>())
            .ok_or_else(|| EngineError::ActorNotFound(std::any::type_name::<A>().to_string()))
    }

    /// Remove and return an actor of the given type.
    pub fn remove_actor<A: Actor>(&mut self) -> Option<Box<A>> {
        self.actors
            .remove(&TypeId::of::<A>())
            .and_then(|a| a.into_any().downcast::<A>().ok())
    }

    pub fn has_actor<A: Actor>(&self) -> bool {
        self.actors.contains_key(&TypeId::of::<A>())
    }

    /// Whether any carried actor reports the given type tag.
    pub fn has_actor_named(&self, type_name: &str) -> bool {
        self.actors.values().any(|a| a.type_name() == type_name)
    }

    /// Type tags of all carried actors.
    pub fn actor_names(&self) -> Vec<&str> {
        self.actors.values().map(|a| a.type_name()).collect()
    }

    pub fn actor_count(&self) -> usize {
        self.actors.len()
    }

    /// The token's JSON data object.
    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut Value {
        &mut self.data
    }

    /// Set a data value under `key`.
    pub fn set_data(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        if let Value::Object(map) = &mut self.data {
            map.insert(key.into(), value.into());
        }
    }

    /// Get a data value by key.
    pub fn get_data(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Get a data value by key, or a default when absent.
    pub fn data_or(&self, key: &str, default: Value) -> Value {
        self.data.get(key).cloned().unwrap_or(default)
    }

    pub fn has_data(&self, key: &str) -> bool {
        self.data.get(key).is_some()
    }
}

impl Default for Token {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Token")
            .field("actors", &self.actor_names())
            .field("data", &self.data)
            .finish()
    }
}
