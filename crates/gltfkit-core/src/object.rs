//! Members shared by every document entity.

use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::{Map, Value};

/// Extension name to opaque payload. Key order is preserved for round-trips.
pub type Extensions = Map<String, Value>;

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of an entity. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

impl ObjectId {
    pub fn next() -> Self {
        ObjectId(NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

/// Name, identity, unrecognized extensions and extras of an entity.
#[derive(Debug)]
pub struct Common {
    pub name: Option<String>,
    pub id: ObjectId,
    /// Extensions that were not interpreted, kept verbatim.
    pub extensions: Extensions,
    pub extras: Option<Value>,
}

impl Common {
    pub fn named(name: impl Into<String>) -> Self {
        Common {
            name: Some(name.into()),
            ..Common::default()
        }
    }
}

impl Default for Common {
    fn default() -> Self {
        Common {
            name: None,
            id: ObjectId::next(),
            extensions: Extensions::new(),
            extras: None,
        }
    }
}

// A copy is a distinct entity, so it gets a fresh identity.
impl Clone for Common {
    fn clone(&self) -> Self {
        Common {
            name: self.name.clone(),
            id: ObjectId::next(),
            extensions: self.extensions.clone(),
            extras: self.extras.clone(),
        }
    }
}
