use std::collections::BTreeMap;

use crate::Vec3;

/// Key of a flag/value/vector stored in [`State`].
///
/// Domains define the fixed set of keys they use as constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FactKey(pub &'static str);

/// Key of a consumable fact stored in [`Facts`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConsumableKey(pub &'static str);

/// Current (non-consumable) world facts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct State {
    pub flags: BTreeMap<FactKey, bool>,
    pub values: BTreeMap<FactKey, f32>,
    pub vectors: BTreeMap<FactKey, Vec3>,
}

/// A fact that can be used once.
///
/// Producing a fact makes it available; consuming it hands out the value and marks it stale until
/// it is produced again.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fact<T> {
    pub value: T,
    pub consumed: bool,
}

impl<T> Fact<T> {
    pub fn fresh(value: T) -> Self {
        Self {
            value,
            consumed: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Facts {
    pub flags: BTreeMap<ConsumableKey, Fact<bool>>,
    pub values: BTreeMap<ConsumableKey, Fact<f32>>,
    pub vectors: BTreeMap<ConsumableKey, Fact<Vec3>>,
}

fn available<T>(facts: &BTreeMap<ConsumableKey, Fact<T>>, key: ConsumableKey) -> bool {
    facts.get(&key).is_some_and(|f| !f.consumed)
}

fn consume<T: Copy>(facts: &mut BTreeMap<ConsumableKey, Fact<T>>, key: ConsumableKey) -> Option<T> {
    let fact = facts.get_mut(&key)?;
    if fact.consumed {
        return None;
    }
    fact.consumed = true;
    Some(fact.value)
}

impl Facts {
    /// `true` if the flag fact was produced and not consumed since. Never-produced facts count as
    /// consumed.
    pub fn flag_available(&self, key: ConsumableKey) -> bool {
        available(&self.flags, key)
    }

    pub fn value_available(&self, key: ConsumableKey) -> bool {
        available(&self.values, key)
    }

    pub fn vector_available(&self, key: ConsumableKey) -> bool {
        available(&self.vectors, key)
    }
}

/// Everything a single character knows about the world.
///
/// Owned by the character driving the planner; outlives any single plan.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorldState {
    pub current: State,
    pub facts: Facts,
}

impl WorldState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_flag(mut self, key: FactKey, flag: bool) -> Self {
        self.set_flag(key, flag);
        self
    }

    pub fn with_value(mut self, key: FactKey, value: f32) -> Self {
        self.set_value(key, value);
        self
    }

    pub fn with_vector(mut self, key: FactKey, vector: Vec3) -> Self {
        self.set_vector(key, vector);
        self
    }

    pub fn set_flag(&mut self, key: FactKey, flag: bool) {
        self.current.flags.insert(key, flag);
    }

    pub fn set_value(&mut self, key: FactKey, value: f32) {
        self.current.values.insert(key, value);
    }

    pub fn set_vector(&mut self, key: FactKey, vector: Vec3) {
        self.current.vectors.insert(key, vector);
    }

    pub fn flag(&self, key: FactKey) -> Option<bool> {
        self.current.flags.get(&key).copied()
    }

    pub fn value(&self, key: FactKey) -> Option<f32> {
        self.current.values.get(&key).copied()
    }

    pub fn vector(&self, key: FactKey) -> Option<Vec3> {
        self.current.vectors.get(&key).copied()
    }

    pub fn produce_flag(&mut self, key: ConsumableKey, flag: bool) {
        self.facts.flags.insert(key, Fact::fresh(flag));
    }

    pub fn produce_value(&mut self, key: ConsumableKey, value: f32) {
        self.facts.values.insert(key, Fact::fresh(value));
    }

    pub fn produce_vector(&mut self, key: ConsumableKey, vector: Vec3) {
        self.facts.vectors.insert(key, Fact::fresh(vector));
    }

    /// Take the flag fact, marking it consumed. `None` if it was never produced or is stale.
    pub fn consume_flag(&mut self, key: ConsumableKey) -> Option<bool> {
        consume(&mut self.facts.flags, key)
    }

    pub fn consume_value(&mut self, key: ConsumableKey) -> Option<f32> {
        consume(&mut self.facts.values, key)
    }

    pub fn consume_vector(&mut self, key: ConsumableKey) -> Option<Vec3> {
        consume(&mut self.facts.vectors, key)
    }
}
