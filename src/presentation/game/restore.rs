use serde_json::Value;

use super::Match;
use crate::client::Session;
use crate::codec::Obfuscation;
use crate::error::{Error, Result};
use crate::protocol::{ActionKind, DecodedMessage, Direction};
use crate::state::event::NewRound;
use crate::state::{OperationSet, RoundState};

/// `step` of a restore request asking for the whole round
const WHOLE_ROUND: u64 = u32::MAX as u64;
/// `game_state` of a round still being played
const GAME_STATE_PLAYING: u64 = 1;

impl Match {
    /// Rebuild the round from a `syncGame` replay after a reconnect.
    ///
    /// The replay must start with the round's deal and list every action
    /// since. Nothing is committed unless the whole replay applies.
    pub(super) fn on_sync_game(&mut self, session: &mut Session, message: DecodedMessage) -> Result<()> {
        let broken = |detail: &str, message: &DecodedMessage| {
            Error::inconsistent_message(format!("syncGame: {detail}"), message.clone())
        };
        if message.direction != Direction::Outbound {
            return Err(broken("not requested by the client", &message));
        }
        let request = &message.request;
        if request.get("round_id").and_then(Value::as_str) != Some(self.round.round_id().as_str()) {
            return Err(broken("other round", &message));
        }
        if request.get("step").and_then(Value::as_u64) != Some(WHOLE_ROUND) {
            return Err(broken("partial replay", &message));
        }

        let response = message.require_response()?;
        if response.get("is_end").and_then(Value::as_bool) == Some(true) {
            return Err(broken("round already over", &message));
        }
        let restore = response.get("game_restore").unwrap_or(&Value::Null);
        if restore.get("game_state").and_then(Value::as_u64) != Some(GAME_STATE_PLAYING) {
            return Err(broken("round not in play", &message));
        }
        let actions = restore
            .get("actions")
            .and_then(Value::as_array)
            .filter(|a| !a.is_empty())
            .ok_or_else(|| broken("no actions", &message))?;
        if response.get("step").and_then(Value::as_u64) != Some(actions.len() as u64) {
            return Err(broken("action count differs from step", &message));
        }

        let channel = session.channel();
        let mut replay = actions.iter().map(|a| channel.decode_action(a, Obfuscation::Plain));
        let Some(deal) = replay.next().transpose()? else {
            return Err(broken("no actions", &message));
        };
        if deal.kind != ActionKind::NewRound {
            return Err(broken("replay does not start with the deal", &message));
        }
        let ev: NewRound = deal.parse()?;
        let mut round = RoundState::new(self.round.seat(), &ev)?;
        let mut operations = OperationSet::from_wire(ev.operation.as_ref())?;
        let mut step = deal.step + 1;
        let mut events = vec![deal];

        for action in replay {
            let action = action?;
            if action.step != step {
                return Err(broken("replay has a gap", &message));
            }
            if action.kind.is_terminal() {
                return Err(broken("replay ends the round", &message));
            }
            operations = round.apply(&action)?;
            events.push(action);
            step += 1;
        }

        tracing::info!(round = %round.round_id(), step, "round restored");
        self.round = round;
        self.step = step;
        self.operations = operations;
        self.events = events;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::*;
    use std::time::Duration;

    use serde_json::json;

    use crate::protocol::names;
    use crate::state::OperationKind;
    use crate::testing::{self, feed};

    const TIMEOUT: Duration = Duration::from_secs(10);

    fn sync_game(round_id: &str, actions: Vec<Value>) -> [crate::protocol::RawFrame; 2] {
        testing::exchange(
            Direction::Outbound,
            11,
            names::SYNC_GAME,
            json!({"round_id": round_id, "step": WHOLE_ROUND}),
            json!({
                "is_end": false,
                "step": actions.len(),
                "game_restore": {"game_state": 1, "actions": actions},
            }),
        )
    }

    fn replayed_deal() -> Value {
        testing::action_prototype(1, "ActionNewRound", &json!({
            "chang": 0, "ju": 0, "ben": 0, "liqibang": 0, "doras": ["1z"],
            "left_tile_count": 69, "scores": [25000, 25000, 25000, 25000],
            "tiles": HAND13,
        }), false)
    }

    #[tokio::test(start_paused = true)]
    async fn test_replay_rebuilds_round() {
        let mut t = start(&[&["match/marker0"]], 1, new_round(1, 0, &HAND13, Value::Null), None).await;
        let actions = vec![
            replayed_deal(),
            testing::action_prototype(2, "ActionDiscardTile", &json!({"seat": 0, "tile": "9s", "moqie": false}), false),
        ];
        feed(&t.tx, sync_game("0-0-0", actions)).await;
        feed(
            &t.tx,
            [testing::action(3, "ActionDealTile", json!({
                "seat": 1, "tile": "5s", "left_tile_count": 68,
                "operation": ops(json!([{"type": 1}])),
            }))],
        )
        .await;

        t.game.wait(&mut t.session, TIMEOUT).await.unwrap();
        assert_eq!(t.game.round().unwrap().he()[0].len(), 1);
        assert_eq!(t.game.events().unwrap().len(), 2);

        t.game.wait(&mut t.session, TIMEOUT).await.unwrap();
        assert!(t.game.operations().unwrap().unwrap().contains(OperationKind::Dapai));
    }

    #[tokio::test(start_paused = true)]
    async fn test_replay_of_other_round_is_rejected() {
        let mut t = start(&[&["match/marker0"]], 1, new_round(1, 0, &HAND13, Value::Null), None).await;
        feed(&t.tx, sync_game("1-0-0", vec![replayed_deal()])).await;
        let err = t.game.wait(&mut t.session, TIMEOUT).await.unwrap_err();
        assert!(matches!(err, Error::InconsistentMessage { .. }));
        assert_eq!(t.game.round().unwrap().round_id(), "0-0-0");
    }

    #[tokio::test(start_paused = true)]
    async fn test_replay_with_gap_commits_nothing() {
        let mut t = start(&[&["match/marker0"]], 1, new_round(1, 0, &HAND13, Value::Null), None).await;
        let actions = vec![
            replayed_deal(),
            testing::action_prototype(3, "ActionDiscardTile", &json!({"seat": 0, "tile": "9s", "moqie": false}), false),
        ];
        feed(&t.tx, sync_game("0-0-0", actions)).await;
        assert!(t.game.wait(&mut t.session, TIMEOUT).await.is_err());
        assert!(t.game.round().unwrap().he()[0].is_empty());
    }
}
