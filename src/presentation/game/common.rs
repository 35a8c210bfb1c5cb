use serde_json::Value;

use crate::error::{Error, Result};
use crate::protocol::{names, DecodedMessage};

/// Absorb traffic that may show up at any point of a match.
///
/// Returns `false` for messages the caller has to handle itself. A
/// reconnecting login means the client lost its table and surfaces as
/// [`Error::RebootRequest`].
pub(crate) fn on_common_message(message: &DecodedMessage) -> Result<bool> {
    let name = message.name.as_str();
    match name {
        names::HEARTBEAT => tracing::trace!("heartbeat"),
        names::CHECK_NETWORK_DELAY => {}
        names::OAUTH2_LOGIN => {
            tracing::warn!(request = %message.request, "login during match");
            let reconnect = message.request.get("reconnect").and_then(Value::as_bool);
            if reconnect == Some(true) {
                return Err(Error::RebootRequest { detail: "client reconnected".into() });
            }
            return Err(Error::inconsistent_message("login during match", message.clone()));
        }
        names::FETCH_GAME_PLAYER_STATE | names::NOTIFY_PLAYER_CONNECTION_STATE | names::PLAYER_LEAVING => {
            tracing::info!(name, request = %message.request, "player state");
        }
        names::LOGIN_BEAT | names::AUTH_GAME | names::NOTIFY_GAME_BROADCAST => {
            tracing::info!(name, "ignored");
        }
        _ if names::INFORMATIONAL.contains(&name) => tracing::info!(name, "ignored"),
        _ => return Ok(false),
    }
    Ok(true)
}
