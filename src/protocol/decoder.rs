use std::sync::{Arc, OnceLock};

use ahash::AHashMap;
use serde_json::Value;

use crate::codec::{Frame, FrameKind, Obfuscation, SchemaRegistry};
use crate::error::{Error, Result};
use crate::protocol::action::{decode_action, ActionEvent};
use crate::protocol::message::{DecodedMessage, Direction, RawFrame};
use crate::protocol::names;

/// Write-once holder for the controlled account id
#[derive(Debug, Default)]
pub struct AccountIdCell {
    value: OnceLock<u64>,
}

impl AccountIdCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<u64> {
        self.value.get().copied()
    }

    /// Store on first sight; later values must agree
    pub fn observe(&self, observed: u64) -> Result<()> {
        let cached = *self.value.get_or_init(|| observed);
        if cached != observed {
            return Err(Error::inconsistent(format!(
                "account id {observed} differs from the cached {cached}"
            )));
        }
        Ok(())
    }
}

struct PendingRequest {
    direction: Direction,
    name: String,
    request: Value,
}

/// Turns raw frames into decoded messages.
///
/// Correlated requests are held until their response arrives, so a request
/// frame on its own yields nothing.
pub struct FrameDecoder {
    registry: Arc<dyn SchemaRegistry>,
    pending: AHashMap<u16, PendingRequest>,
    account_id: AccountIdCell,
}

impl FrameDecoder {
    pub fn new(registry: Arc<dyn SchemaRegistry>) -> Self {
        Self {
            registry,
            pending: AHashMap::new(),
            account_id: AccountIdCell::new(),
        }
    }

    pub fn registry(&self) -> &dyn SchemaRegistry {
        self.registry.as_ref()
    }

    pub fn account_id(&self) -> Option<u64> {
        self.account_id.get()
    }

    /// Number of requests still waiting for a response
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn decode(&mut self, frame: RawFrame) -> Result<Option<DecodedMessage>> {
        let parsed = Frame::parse(&frame.payload)?;

        let (direction, name, request, response) = match parsed.kind() {
            FrameKind::Notify => {
                let request = self.registry.decode_request(&parsed.name, &parsed.data)?;
                (frame.direction, parsed.name, request, None)
            }
            FrameKind::Request => {
                let correlation = parsed.correlation().unwrap_or_default();
                let request = self.registry.decode_request(&parsed.name, &parsed.data)?;
                let pending = PendingRequest {
                    direction: frame.direction,
                    name: parsed.name,
                    request,
                };
                if let Some(prev) = self.pending.insert(correlation, pending) {
                    tracing::warn!(
                        correlation,
                        name = %prev.name,
                        direction = %prev.direction,
                        "request was never answered, replaced by a newer one"
                    );
                }
                return Ok(None);
            }
            FrameKind::Response => {
                let correlation = parsed.correlation().unwrap_or_default();
                let pending = self.pending.remove(&correlation).ok_or_else(|| {
                    Error::InvalidPacket(format!(
                        "{} response {correlation} matches no request",
                        frame.direction
                    ))
                })?;
                if pending.direction == frame.direction {
                    return Err(Error::InvalidPacket(format!(
                        "request and response of `{}` are both {}",
                        pending.name, frame.direction
                    )));
                }
                let response = self.registry.decode_response(&pending.name, &parsed.data)?;
                (pending.direction, pending.name, pending.request, Some(response))
            }
        };

        let action = if name == names::ACTION_PROTOTYPE {
            Some(self.decode_action(&request, Obfuscation::Masked)?)
        } else {
            None
        };
        let message = DecodedMessage {
            direction,
            name,
            request,
            response,
            timestamp: frame.timestamp,
            action,
        };

        match self.observe_account_id(&message.name, message.response.as_ref()) {
            Ok(()) => Ok(Some(message)),
            Err(e) => Err(e.with_message(message)),
        }
    }

    /// Decode an action prototype value against the registry
    pub fn decode_action(&self, prototype: &Value, obfuscation: Obfuscation) -> Result<ActionEvent> {
        decode_action(self.registry.as_ref(), prototype, obfuscation)
    }

    fn observe_account_id(&self, name: &str, response: Option<&Value>) -> Result<()> {
        let Some((_, path)) = names::ACCOUNT_ID_FIELDS.iter().find(|(n, _)| *n == name) else {
            return Ok(());
        };
        let response =
            response.ok_or_else(|| Error::InvalidPacket(format!("`{name}` without response")))?;
        let account_id = path
            .iter()
            .try_fold(response, |value, key| value.get(*key))
            .and_then(Value::as_u64)
            .ok_or_else(|| {
                Error::InvalidPacket(format!("`{name}` has no account id at {}", path.join(".")))
            })?;
        self.account_id.observe(account_id)
    }
}
