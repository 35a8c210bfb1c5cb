use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::codec::{unmask, Obfuscation, SchemaRegistry};
use crate::error::{Error, Result};

/// In-round action carried by `.lq.ActionPrototype`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    MJStart,
    NewRound,
    DealTile,
    DiscardTile,
    ChiPengGang,
    AnGangAddGang,
    Hule,
    NoTile,
    LiuJu,
}

impl ActionKind {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "ActionMJStart" => Self::MJStart,
            "ActionNewRound" => Self::NewRound,
            "ActionDealTile" => Self::DealTile,
            "ActionDiscardTile" => Self::DiscardTile,
            "ActionChiPengGang" => Self::ChiPengGang,
            "ActionAnGangAddGang" => Self::AnGangAddGang,
            "ActionHule" => Self::Hule,
            "ActionNoTile" => Self::NoTile,
            "ActionLiuJu" => Self::LiuJu,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::MJStart => "ActionMJStart",
            Self::NewRound => "ActionNewRound",
            Self::DealTile => "ActionDealTile",
            Self::DiscardTile => "ActionDiscardTile",
            Self::ChiPengGang => "ActionChiPengGang",
            Self::AnGangAddGang => "ActionAnGangAddGang",
            Self::Hule => "ActionHule",
            Self::NoTile => "ActionNoTile",
            Self::LiuJu => "ActionLiuJu",
        }
    }

    /// Actions that end the round
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Hule | Self::NoTile | Self::LiuJu)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActionEvent {
    pub step: u32,
    pub kind: ActionKind,
    pub data: Value,
}

impl ActionEvent {
    /// Deserialize the payload into a typed event
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.data.clone()).map_err(|e| {
            Error::inconsistent(format!("malformed {} (step {}): {e}", self.kind.name(), self.step))
        })
    }

    /// True when the payload offers a non-empty decision set
    pub fn has_operations(&self) -> bool {
        self.data
            .get("operation")
            .and_then(|op| op.get("operation_list"))
            .and_then(Value::as_array)
            .is_some_and(|list| !list.is_empty())
    }
}

/// Decode an action prototype value `{step, name, data}`.
///
/// `data` is base64 text of the inner message bytes. Live notifications
/// are masked, restored history is not.
pub fn decode_action(
    registry: &dyn SchemaRegistry,
    prototype: &Value,
    obfuscation: Obfuscation,
) -> Result<ActionEvent> {
    let step = prototype
        .get("step")
        .and_then(Value::as_u64)
        .and_then(|s| u32::try_from(s).ok())
        .ok_or_else(|| Error::InvalidPacket("action prototype without step".into()))?;
    let name = prototype
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::InvalidPacket("action prototype without name".into()))?;
    let encoded = prototype.get("data").and_then(Value::as_str).unwrap_or_default();

    let kind = ActionKind::from_name(name).ok_or_else(|| Error::UnknownAction(name.to_string()))?;
    let bytes = STANDARD
        .decode(encoded)
        .map_err(|e| Error::InvalidPacket(format!("{name}: bad base64 payload: {e}")))?;
    let plain = unmask(&bytes, obfuscation);
    let data = registry.decode_request(&format!(".lq.{name}"), &plain)?;

    Ok(ActionEvent { step, kind, data })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{action_prototype, JsonRegistry};
    use serde_json::json;

    #[test]
    fn test_decode_masked_action() {
        let prototype = action_prototype(4, "ActionDealTile", &json!({"seat": 1, "tile": ""}), true);
        let action = decode_action(&JsonRegistry, &prototype, Obfuscation::Masked).unwrap();
        assert_eq!(action.step, 4);
        assert_eq!(action.kind, ActionKind::DealTile);
        assert_eq!(action.data["seat"], 1);
    }

    #[test]
    fn test_plain_action_is_not_unmasked() {
        let prototype = action_prototype(0, "ActionNewRound", &json!({"ju": 2}), false);
        let action = decode_action(&JsonRegistry, &prototype, Obfuscation::Plain).unwrap();
        assert_eq!(action.data["ju"], 2);

        // unmasking a plain payload garbles it
        assert!(decode_action(&JsonRegistry, &prototype, Obfuscation::Masked).is_err());
    }

    #[test]
    fn test_unknown_action_name() {
        let prototype = json!({"step": 0, "name": "ActionBaBei", "data": ""});
        assert!(matches!(
            decode_action(&JsonRegistry, &prototype, Obfuscation::Masked),
            Err(Error::UnknownAction(name)) if name == "ActionBaBei"
        ));
    }

    #[test]
    fn test_has_operations() {
        let with = ActionEvent {
            step: 1,
            kind: ActionKind::DealTile,
            data: json!({"operation": {"operation_list": [{"type": 1}]}}),
        };
        let empty = ActionEvent {
            step: 1,
            kind: ActionKind::DealTile,
            data: json!({"operation": {"operation_list": []}}),
        };
        assert!(with.has_operations());
        assert!(!empty.has_operations());
        assert!(ActionKind::Hule.is_terminal());
        assert!(!ActionKind::DiscardTile.is_terminal());
    }
}
