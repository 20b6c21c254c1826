use super::store::StoreInner;
use crate::error::StoreError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, Weak};

/// A committed mutation, as handed to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mutation {
    #[serde(rename = "type")]
    pub mutation_type: String,
    pub payload: Value,
}

impl Mutation {
    pub fn new(mutation_type: impl Into<String>, payload: Value) -> Self {
        Self {
            mutation_type: mutation_type.into(),
            payload,
        }
    }

    /// Object-style mutation: `{ "type": "increment", "amount": 5 }`.
    ///
    /// The whole descriptor becomes the payload handlers receive.
    pub fn from_descriptor(descriptor: Value) -> Result<Self, StoreError> {
        let mutation_type = descriptor
            .get("type")
            .and_then(Value::as_str)
            .ok_or(StoreError::InvalidDescriptor)?
            .to_owned();
        Ok(Self {
            mutation_type,
            payload: descriptor,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitOptions {
    /// Skip subscriber notification.
    pub silent: bool,
}

impl CommitOptions {
    pub fn silent() -> Self {
        Self { silent: true }
    }
}

/// Mutation observer: `(mutation, root_state)`.
pub type Subscriber = Arc<dyn Fn(&Mutation, &Value) + Send + Sync>;

pub(crate) fn same_subscriber(a: &Subscriber, b: &Subscriber) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

/// Removes a subscriber when called.
pub struct Unsubscribe {
    pub(super) store: Weak<StoreInner>,
    pub(super) subscriber: Subscriber,
}

impl Unsubscribe {
    pub fn unsubscribe(self) {
        let Some(inner) = self.store.upgrade() else {
            return;
        };
        let mut subscribers = inner.subscribers.write();
        if let Some(index) = subscribers
            .iter()
            .position(|subscriber| same_subscriber(subscriber, &self.subscriber))
        {
            subscribers.remove(index);
        }
    }
}
