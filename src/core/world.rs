//! World actor registry: actors with hierarchical identity tags, observed by
//! the flow's world observer nodes.

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use crate::schema::asset::TagMatch;
use crate::schema::ids::ActorId;

/// A change in the registry, delivered to active nodes on the next flow tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorldEvent {
    ActorRegistered(ActorId),
    ActorUnregistered(ActorId),
    TagsAdded(ActorId, Vec<String>),
    TagsRemoved(ActorId, Vec<String>),
}

impl WorldEvent {
    pub fn actor(&self) -> ActorId {
        match self {
            Self::ActorRegistered(id)
            | Self::ActorUnregistered(id)
            | Self::TagsAdded(id, _)
            | Self::TagsRemoved(id, _) => *id,
        }
    }
}

/// An actor known to the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredActor {
    pub name: String,
    pub tags: FxHashSet<String>,
}

/// Registry of world actors. Every mutation queues a `WorldEvent`.
#[derive(Debug, Clone, Default)]
pub struct ActorRegistry {
    actors: FxHashMap<ActorId, RegisteredActor>,
    events: Vec<WorldEvent>,
}

impl ActorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an actor. Returns false if the id is already registered.
    pub fn register(&mut self, id: ActorId, name: &str, tags: &[&str]) -> bool {
        if self.actors.contains_key(&id) {
            return false;
        }
        self.actors.insert(
            id,
            RegisteredActor {
                name: name.to_string(),
                tags: tags.iter().map(|t| t.to_string()).collect(),
            },
        );
        debug!(actor = %id, name, "actor registered");
        self.events.push(WorldEvent::ActorRegistered(id));
        true
    }

    /// Unregister an actor. Returns false if it was not registered.
    pub fn unregister(&mut self, id: ActorId) -> bool {
        if self.actors.remove(&id).is_none() {
            return false;
        }
        debug!(actor = %id, "actor unregistered");
        self.events.push(WorldEvent::ActorUnregistered(id));
        true
    }

    /// Add identity tags to a registered actor. Returns false for unknown actors.
    pub fn add_tags(&mut self, id: ActorId, tags: &[&str]) -> bool {
        let Some(actor) = self.actors.get_mut(&id) else {
            return false;
        };
        let added: Vec<String> = tags
            .iter()
            .filter(|t| actor.tags.insert(t.to_string()))
            .map(|t| t.to_string())
            .collect();
        if !added.is_empty() {
            self.events.push(WorldEvent::TagsAdded(id, added));
        }
        true
    }

    /// Remove identity tags from a registered actor. Returns false for unknown actors.
    pub fn remove_tags(&mut self, id: ActorId, tags: &[&str]) -> bool {
        let Some(actor) = self.actors.get_mut(&id) else {
            return false;
        };
        let removed: Vec<String> = tags
            .iter()
            .filter(|t| actor.tags.remove(**t))
            .map(|t| t.to_string())
            .collect();
        if !removed.is_empty() {
            self.events.push(WorldEvent::TagsRemoved(id, removed));
        }
        true
    }

    pub fn get(&self, id: ActorId) -> Option<&RegisteredActor> {
        self.actors.get(&id)
    }

    pub fn len(&self) -> usize {
        self.actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }

    /// Whether the actor is registered and its tags satisfy the query.
    pub fn actor_matches(&self, id: ActorId, query: &[String], match_type: TagMatch) -> bool {
        self.actors
            .get(&id)
            .is_some_and(|actor| matches_tags(&actor.tags, query, match_type))
    }

    /// Registered actors whose tags satisfy the query, in id order.
    pub fn actors_matching(&self, query: &[String], match_type: TagMatch) -> Vec<ActorId> {
        let mut ids: Vec<ActorId> = self
            .actors
            .iter()
            .filter(|(_, actor)| matches_tags(&actor.tags, query, match_type))
            .map(|(id, _)| *id)
            .collect();
        ids.sort();
        ids
    }

    /// Take every event queued since the last drain, oldest first.
    pub fn drain_events(&mut self) -> Vec<WorldEvent> {
        std::mem::take(&mut self.events)
    }
}

/// True if `tag` equals `query`, or (when not exact) `tag` is a dotted
/// child of `query`: `Enemy.Boss` matches `Enemy`.
fn tag_matches(tag: &str, query: &str, exact: bool) -> bool {
    if tag == query {
        return true;
    }
    !exact
        && tag
            .strip_prefix(query)
            .is_some_and(|rest| rest.starts_with('.'))
}

/// Compare an actor's tags with an identity query. An empty query never matches.
pub fn matches_tags(tags: &FxHashSet<String>, query: &[String], match_type: TagMatch) -> bool {
    if query.is_empty() {
        return false;
    }
    let exact = matches!(match_type, TagMatch::HasAnyExact | TagMatch::HasAllExact);
    let has = |q: &String| tags.iter().any(|t| tag_matches(t, q, exact));
    match match_type {
        TagMatch::HasAny | TagMatch::HasAnyExact => query.iter().any(has),
        TagMatch::HasAll | TagMatch::HasAllExact => query.iter().all(has),
    }
}
