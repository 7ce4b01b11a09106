//! Typed side channel for sharing pass outputs

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;

/// Typed storage for data shared between passes.
///
/// Passes usually publish their output handles here so later passes can find
/// them without threading every handle through the caller. Holds at most one
/// value per type.
#[derive(Default)]
pub struct Blackboard {
    entries: HashMap<TypeId, Box<dyn Any>>,
}

impl Blackboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a value, replacing any previous value of the same type.
    pub fn add<T: 'static>(&mut self, value: T) -> &mut T {
        self.entries.insert(TypeId::of::<T>(), Box::new(value));
        self.get_mut::<T>()
    }

    /// # Panics
    ///
    /// Panics if no value of type `T` was added.
    pub fn get<T: 'static>(&self) -> &T {
        self.try_get::<T>()
            .unwrap_or_else(|| panic!("Blackboard has no `{}`", type_name::<T>()))
    }

    /// # Panics
    ///
    /// Panics if no value of type `T` was added.
    pub fn get_mut<T: 'static>(&mut self) -> &mut T {
        self.entries
            .get_mut(&TypeId::of::<T>())
            .and_then(|value| value.downcast_mut::<T>())
            .unwrap_or_else(|| panic!("Blackboard has no `{}`", type_name::<T>()))
    }

    pub fn try_get<T: 'static>(&self) -> Option<&T> {
        self.entries
            .get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref::<T>())
    }

    pub fn contains<T: 'static>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<T>())
    }

    /// Removes and returns the value of type `T`, if any.
    pub fn remove<T: 'static>(&mut self) -> Option<T> {
        self.entries
            .remove(&TypeId::of::<T>())
            .and_then(|value| value.downcast::<T>().ok())
            .map(|value| *value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl std::fmt::Debug for Blackboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Blackboard")
            .field("len", &self.entries.len())
            .finish()
    }
}
