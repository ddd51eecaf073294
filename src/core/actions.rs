//! Requests and outbound actions
//!
//! A request records something a user asked for out of band (a password reset,
//! say). Each new request emits an action that is persisted first and then
//! published to the worker queue as JSON:
//!
//! ```json
//! {"guid": "...", "type": "email:password:reset", "params": {...}, "props": {...}}
//! ```
//!
//! The action moves from `Registered` to `Queued` only after the broker accepted
//! the message. A failed publish is returned to the caller and leaves the stored
//! action ready for [`ActionPipeline::republish`]; submitting again reuses the
//! open request and hands back its guid.
//! An open request of the same type on the same object is reused instead of
//! creating a second one, and reuse emits nothing.

use crate::core::orm::{Action, ActionState, Entity, Placement, Request};
use crate::core::params::Params;
use crate::core::registry::{requests, RequestEntry};
use crate::core::router::{Router, REGISTRY_GROUP, REGISTRY_SHARD};
use crate::error::{EntityKind, Result, VaultError};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

/// Delivers serialized actions to a named queue
pub trait Publisher: Send + Sync {
    fn publish(&self, queue: &str, payload: &[u8]) -> Result<()>;
}

/// Publisher that keeps messages in memory; can be told to fail
#[derive(Debug, Default)]
pub struct MemoryPublisher {
    messages: Mutex<Vec<(String, Vec<u8>)>>,
    failing: AtomicBool,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        MemoryPublisher::default()
    }

    /// Reject every publish until reset
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.lock().is_empty()
    }

    /// Decoded messages published so far, with their queue
    pub fn messages(&self) -> Vec<(String, ActionMessage)> {
        self.messages
            .lock()
            .iter()
            .filter_map(|(q, p)| serde_json::from_slice(p).ok().map(|m| (q.clone(), m)))
            .collect()
    }
}

impl Publisher for MemoryPublisher {
    fn publish(&self, queue: &str, payload: &[u8]) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(VaultError::Publish(format!("queue {} unavailable", queue)));
        }
        self.messages.lock().push((queue.to_string(), payload.to_vec()));
        Ok(())
    }
}

/// Wire form of an action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionMessage {
    pub guid: String,
    #[serde(rename = "type")]
    pub action_type: String,
    pub params: Value,
    pub props: Value,
}

impl ActionMessage {
    pub fn from_action(action: &Action) -> Self {
        ActionMessage {
            guid: action.guid().to_string(),
            action_type: action.action_type().to_string(),
            params: Value::Object(action.parameters().as_map().clone()),
            props: Value::Object(action.properties().as_map().clone()),
        }
    }
}

/// A request to open
#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub request_type: String,
    pub action_type: String,
    /// Object the request is about; its shard hosts the request and the action
    pub object: u64,
    pub creator: u64,
    pub ttl: Duration,
    pub params: Params,
    pub props: Params,
}

/// Result of [`ActionPipeline::submit`]
#[derive(Debug, Clone)]
pub enum RequestOutcome {
    Created { request: Request, action: Action },
    Reused(RequestEntry),
}

impl RequestOutcome {
    pub fn guid(&self) -> &str {
        match self {
            RequestOutcome::Created { request, .. } => request.guid(),
            RequestOutcome::Reused(entry) => &entry.guid,
        }
    }

    pub fn is_reused(&self) -> bool {
        matches!(self, RequestOutcome::Reused(_))
    }
}

pub struct ActionPipeline<'a> {
    router: &'a Router,
    publisher: &'a dyn Publisher,
    queue: &'a str,
}

impl<'a> ActionPipeline<'a> {
    pub fn new(router: &'a Router, publisher: &'a dyn Publisher, queue: &'a str) -> Self {
        ActionPipeline {
            router,
            publisher,
            queue,
        }
    }

    fn placement_for(object: u64) -> Placement {
        if object == 0 {
            Placement::new(REGISTRY_GROUP, REGISTRY_SHARD)
        } else {
            Placement::of(object)
        }
    }

    /// Persist `action` on `placement`'s shard and publish it
    pub fn emit(&self, placement: Placement, action: &mut Action) -> Result<()> {
        let conn = self.router.connect_to(placement.group, placement.shard)?;
        action.flush(&conn, false)?;
        debug!(guid = action.guid(), kind = action.action_type(), "action registered");
        self.publish(&conn, action)
    }

    fn publish(&self, conn: &rusqlite::Connection, action: &mut Action) -> Result<()> {
        let payload = serde_json::to_vec(&ActionMessage::from_action(action))?;
        if let Err(e) = self.publisher.publish(self.queue, &payload) {
            warn!(guid = action.guid(), error = %e, "action publish failed; left registered");
            return Err(e);
        }
        if action.state() == ActionState::Registered {
            action.set_state(ActionState::Queued);
            action.flush(conn, false)?;
        }
        info!(guid = action.guid(), kind = action.action_type(), queue = self.queue, "action queued");
        Ok(())
    }

    /// Shard holding the action with `guid`
    fn locate(&self, guid: &str) -> Result<Placement> {
        let registry = self.router.registry()?;
        Ok(match requests::get(&registry, guid)? {
            Some(entry) => Placement::of(entry.id),
            None => Placement::new(REGISTRY_GROUP, REGISTRY_SHARD),
        })
    }

    fn load(&self, guid: &str) -> Result<(Placement, Action)> {
        let placement = self.locate(guid)?;
        let conn = self.router.connect_to(placement.group, placement.shard)?;
        let mut action = Action::default();
        if !action.by_guid(&conn, guid)? {
            return Err(VaultError::not_found(EntityKind::Action, guid));
        }
        Ok((placement, action))
    }

    /// Stored action with `guid`
    pub fn action(&self, guid: &str) -> Result<Action> {
        self.load(guid).map(|(_, action)| action)
    }

    /// Publish a stored action again; processed actions are left alone
    pub fn republish(&self, guid: &str) -> Result<ActionState> {
        let (placement, mut action) = self.load(guid)?;
        if action.state() == ActionState::Processed {
            return Ok(ActionState::Processed);
        }
        let conn = self.router.connect_to(placement.group, placement.shard)?;
        self.publish(&conn, &mut action)?;
        Ok(action.state())
    }

    /// Worker acknowledgement
    pub fn mark_processed(&self, guid: &str) -> Result<()> {
        let (placement, mut action) = self.load(guid)?;
        if action.set_state(ActionState::Processed) != ActionState::Processed {
            let conn = self.router.connect_to(placement.group, placement.shard)?;
            action.flush(&conn, false)?;
        }
        Ok(())
    }

    /// Open a request unless an equivalent one is still open
    pub fn submit(&self, spec: RequestSpec, now: DateTime<Utc>) -> Result<RequestOutcome> {
        let registry = self.router.registry()?;
        let closed = requests::expire_stale(&registry, &spec.request_type, spec.object, now)?;
        if closed > 0 {
            debug!(closed, kind = %spec.request_type, "expired stale requests");
        }
        if let Some(entry) = requests::newest_active(&registry, &spec.request_type, spec.object, now)? {
            debug!(guid = %entry.guid, "reusing open request");
            return Ok(RequestOutcome::Reused(entry));
        }

        let placement = Self::placement_for(spec.object);
        let expiration = now + spec.ttl;
        let mut request = Request::new(placement, &spec.request_type);
        request.set_object(spec.object)?;
        request.set_creator(spec.creator)?;
        request.set_expiration(expiration)?;
        request.set_parameters(spec.params)?;
        request.set_properties(spec.props)?;
        request.flush(&*self.router.connect_to(placement.group, placement.shard)?, false)?;
        requests::insert(&registry, &request)?;
        drop(registry);

        let mut props = request.properties().clone();
        props.set_path(
            "expiration",
            expiration.to_rfc3339_opts(SecondsFormat::Secs, true),
        );
        let mut action = Action::new(request.guid(), &spec.action_type);
        action.set_creator(spec.creator)?;
        action.set_parameters(request.parameters().clone());
        action.set_properties(props);
        self.emit(placement, &mut action)?;
        Ok(RequestOutcome::Created { request, action })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_wire_shape() {
        let mut action = Action::new("g-1", "email:password:reset");
        let mut props = Params::new();
        props.set_path("to", "alice@example.com");
        action.set_properties(props);

        let json = serde_json::to_value(ActionMessage::from_action(&action)).unwrap();
        assert_eq!(json["guid"], "g-1");
        assert_eq!(json["type"], "email:password:reset");
        assert!(json["params"].as_object().unwrap().is_empty());
        assert_eq!(json["props"]["to"], "alice@example.com");
    }

    #[test]
    fn test_memory_publisher_failure_switch() {
        let publisher = MemoryPublisher::new();
        publisher.set_failing(true);
        assert!(matches!(publisher.publish("q", b"{}"), Err(VaultError::Publish(_))));
        assert!(publisher.is_empty());
        publisher.set_failing(false);
        let payload = serde_json::to_vec(&ActionMessage::from_action(&Action::new("g", "t"))).unwrap();
        publisher.publish("q", &payload).unwrap();
        let messages = publisher.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].0, "q");
        assert_eq!(messages[0].1.guid, "g");
    }
}
