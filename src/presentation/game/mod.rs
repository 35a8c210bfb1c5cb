//! The match table.
//!
//! A [`Match`] covers one round. It keeps the round state in step with the
//! server's actions, answers decisions through the screen, and when the
//! round ends it clicks through the result screens and hands over to the
//! next round's `Match` or back to the room.

mod common;
mod end;
mod operate;
mod restore;

#[cfg(test)]
mod fixtures;

use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;

use crate::client::Session;
use crate::error::{Error, Result};
use crate::presentation::{Presentation, PresentationBase, RoomInfo};
use crate::protocol::{names, realign_steps, ActionEvent, ActionKind, DecodedMessage};
use crate::state::event::{Hule, NewRound, NoTile};
use crate::state::{MatchPlayer, MatchState, OperationSet, RoundState};

pub(crate) use common::on_common_message;

const MARKERS: [&str; 4] = ["match/marker0", "match/marker1", "match/marker2", "match/marker3"];

/// In-match presentation for the current round
#[derive(Debug)]
pub struct Match {
    pub(crate) base: PresentationBase,
    /// Room the match was started from
    origin: Option<RoomInfo>,
    state: MatchState,
    round: RoundState,
    /// Step the next action must carry
    step: u32,
    operations: Option<OperationSet>,
    events: Vec<ActionEvent>,
}

async fn next_message(session: &mut Session, deadline: Instant, context: &str) -> Result<DecodedMessage> {
    session
        .channel()
        .dequeue_until(deadline)
        .await?
        .ok_or_else(|| Error::timeout(context.to_string()))
}

fn into_action(mut message: DecodedMessage) -> Result<ActionEvent> {
    message
        .action
        .take()
        .ok_or_else(|| Error::inconsistent_message("action prototype without an action", message))
}

fn game_uuid(message: &DecodedMessage) -> Result<&str> {
    message
        .request
        .get("game_uuid")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::inconsistent_message("missing game_uuid", message.clone()))
}

/// Game uuid, plus seats and players from an `authGame` response
fn record_start(state: &mut MatchState, message: &DecodedMessage, account_id: Option<u64>) -> Result<()> {
    state.set_uuid(game_uuid(message)?)?;
    if message.is(names::AUTH_GAME) {
        state.apply_auth_game(message.require_response()?, account_id)?;
    }
    Ok(())
}

impl Match {
    /// Wait until any table marker is on screen
    pub async fn wait_for_markers(session: &mut Session, deadline: Instant) -> Result<()> {
        session.screen().wait_for_one_of(&MARKERS, deadline).await.map(|_| ())
    }

    /// Detect the table and consume the messages up to the round's deal.
    ///
    /// `state` carries what earlier rounds of the same match learned.
    pub async fn new(
        session: &mut Session,
        state: MatchState,
        origin: Option<RoomInfo>,
        deadline: Instant,
    ) -> Result<Self> {
        let shot = session.screen().detect_any("match", &MARKERS)?;
        Self::deal(session, state, origin, deadline)
            .await
            .map_err(|e| e.with_snapshot(shot))
    }

    async fn deal(
        session: &mut Session,
        mut state: MatchState,
        origin: Option<RoomInfo>,
        deadline: Instant,
    ) -> Result<Self> {
        let mut step = 0;
        loop {
            let message = next_message(session, deadline, "waiting for the deal").await?;
            match message.name.as_str() {
                names::MODIFY_ROOM
                | names::NOTIFY_ROOM_PLAYER_UPDATE
                | names::NOTIFY_ROOM_PLAYER_READY
                | names::START_ROOM
                | names::ENTER_GAME
                | names::NOTIFY_PLAYER_LOAD_GAME_READY
                | names::CONFIRM_NEW_ROUND => {
                    tracing::info!(name = %message.name, "match setup");
                }
                names::NOTIFY_ROOM_GAME_START | names::AUTH_GAME => {
                    if let Err(e) = record_start(&mut state, &message, session.account_id()) {
                        return Err(e.with_message(message));
                    }
                }
                names::ACTION_PROTOTYPE => {
                    let action = into_action(message)?;
                    if action.step != step {
                        return Err(Error::inconsistent(format!(
                            "{} at step {} before the deal, expected {step}",
                            action.kind.name(),
                            action.step
                        )));
                    }
                    step += 1;
                    match action.kind {
                        ActionKind::MJStart => tracing::info!(uuid = ?state.uuid(), "match started"),
                        ActionKind::NewRound => {
                            let seat = state
                                .seat()
                                .ok_or_else(|| Error::inconsistent("deal before the own seat is known"))?;
                            let ev: NewRound = action.parse()?;
                            let round = RoundState::new(seat, &ev)?;
                            let operations = OperationSet::from_wire(ev.operation.as_ref())?;
                            tracing::info!(round = %round.round_id(), seat, "round dealt");
                            return Ok(Self {
                                base: PresentationBase::new("match"),
                                origin,
                                state,
                                round,
                                step,
                                operations,
                                events: vec![action],
                            });
                        }
                        kind => {
                            return Err(Error::inconsistent(format!("{} before the deal", kind.name())));
                        }
                    }
                }
                _ => {
                    if !on_common_message(&message)? {
                        return Err(Error::inconsistent_message("unexpected message before the deal", message));
                    }
                }
            }
        }
    }

    pub fn take_successor(&mut self) -> Option<Presentation> {
        self.base.take_successor()
    }

    pub fn uuid(&self) -> Result<Option<&str>> {
        self.base.ensure_fresh()?;
        Ok(self.state.uuid())
    }

    pub fn seat(&self) -> Result<usize> {
        self.base.ensure_fresh()?;
        Ok(self.round.seat())
    }

    pub fn players(&self) -> Result<&[MatchPlayer]> {
        self.base.ensure_fresh()?;
        Ok(self.state.players())
    }

    pub fn origin(&self) -> Result<Option<&RoomInfo>> {
        self.base.ensure_fresh()?;
        Ok(self.origin.as_ref())
    }

    pub fn round(&self) -> Result<&RoundState> {
        self.base.ensure_fresh()?;
        Ok(&self.round)
    }

    /// Decision set awaiting an answer, if any
    pub fn operations(&self) -> Result<Option<&OperationSet>> {
        self.base.ensure_fresh()?;
        Ok(self.operations.as_ref())
    }

    /// Actions of this round in step order
    pub fn events(&self) -> Result<&[ActionEvent]> {
        self.base.ensure_fresh()?;
        Ok(&self.events)
    }

    /// Follow the round until the next decision or its end
    pub async fn wait(&mut self, session: &mut Session, timeout: Duration) -> Result<()> {
        self.base.ensure_fresh()?;
        if self.operations.is_some() {
            return Err(session.annotate(Error::invalid_operation("a decision is pending")));
        }
        let deadline = Instant::now() + timeout;
        let result = self.wait_impl(session, deadline).await;
        result.map_err(|e| session.annotate(e))
    }

    async fn wait_impl(&mut self, session: &mut Session, deadline: Instant) -> Result<()> {
        loop {
            let message = next_message(session, deadline, "waiting for the next action").await?;
            if on_common_message(&message)? {
                continue;
            }
            match message.name.as_str() {
                names::ACTION_PROTOTYPE => {
                    let action = self.accept_action(session, message, deadline).await?;
                    match action.kind {
                        ActionKind::MJStart | ActionKind::NewRound => {
                            return Err(Error::inconsistent(format!(
                                "{} at step {} within a round",
                                action.kind.name(),
                                action.step
                            )));
                        }
                        ActionKind::Hule => {
                            let wins = action.parse::<Hule>()?.hules.len();
                            self.record(action)?;
                            end::confirm_hule(session, wins, deadline).await?;
                            return self.end_of_round(session, deadline).await;
                        }
                        ActionKind::NoTile => {
                            let ev: NoTile = action.parse()?;
                            self.record(action)?;
                            end::confirm_no_tile(session, &ev, deadline).await?;
                            return self.end_of_round(session, deadline).await;
                        }
                        ActionKind::LiuJu => {
                            self.record(action)?;
                            return self.end_of_round(session, deadline).await;
                        }
                        _ => {
                            self.operations = self.record(action)?;
                            return Ok(());
                        }
                    }
                }
                names::INPUT_OPERATION | names::INPUT_CHI_PENG_GANG => {
                    tracing::debug!(name = %message.name, "own input acknowledged");
                }
                names::CONFIRM_NEW_ROUND => tracing::warn!("late round confirmation"),
                names::SYNC_GAME => return self.on_sync_game(session, message),
                _ => {
                    return Err(Error::inconsistent_message("unexpected message during the round", message));
                }
            }
        }
    }

    /// Take the action for the expected step, reordering buffered ones if
    /// `message` arrived ahead of it
    async fn accept_action(
        &mut self,
        session: &mut Session,
        message: DecodedMessage,
        deadline: Instant,
    ) -> Result<ActionEvent> {
        let message = if message.step() == Some(self.step) {
            message
        } else {
            tracing::warn!(expected = self.step, got = ?message.step(), "action out of order");
            realign_steps(session.channel(), message, self.step, deadline, on_common_message).await?
        };
        self.step += 1;
        into_action(message)
    }

    fn record(&mut self, action: ActionEvent) -> Result<Option<OperationSet>> {
        let operations = self.round.apply(&action)?;
        tracing::debug!(step = action.step, kind = action.kind.name(), offered = operations.is_some(), "action applied");
        self.events.push(action);
        Ok(operations)
    }
}
