//! Result screens between rounds and after the last one.

use tokio::time::Instant;

use super::{next_message, on_common_message, Match};
use crate::client::Session;
use crate::error::{Error, Result};
use crate::presentation::{Presentation, RoomHost};
use crate::protocol::{names, realign_steps, ActionKind, DecodedMessage};
use crate::state::event::NoTile;

const HULE_CONFIRM: &str = "match/hule_confirm";
const NO_TILE_CONFIRM: &str = "match/no_tile_confirm";
const ROUND_RESULT_CONFIRM: &str = "match/round_result_confirm";
const MATCH_RESULT_CONFIRM: &str = "match/match_result_confirm";

fn is_new_round(message: &DecodedMessage) -> bool {
    message.action().is_some_and(|a| a.kind == ActionKind::NewRound)
}

/// Click one win screen per winner.
///
/// The client may skip the screens, in which case the next round's deal
/// shows up instead and ends the loop.
pub(super) async fn confirm_hule(session: &mut Session, wins: usize, deadline: Instant) -> Result<()> {
    let poll = session.timeouts().message_poll;
    let mut clicks = 0;
    let mut end_result = None;
    while clicks < wins {
        let now = Instant::now();
        if now >= deadline {
            return Err(Error::timeout("confirming win screens"));
        }
        let shot = session.screenshot()?;
        if session.screen().matches(&shot, HULE_CONFIRM)? {
            session.screen().click_template(HULE_CONFIRM)?;
            clicks += 1;
            continue;
        }

        let Some(message) = session.channel().dequeue_until((now + poll).min(deadline)).await? else {
            continue;
        };
        if on_common_message(&message)? {
            continue;
        }
        match message.name.as_str() {
            names::INPUT_OPERATION | names::INPUT_CHI_PENG_GANG => {
                tracing::info!(name = %message.name, "input answered after the win");
            }
            // belongs after the win screens
            names::NOTIFY_GAME_END_RESULT => end_result = Some(message),
            names::ACTION_PROTOTYPE => {
                tracing::info!(clicks, wins, "win screens skipped");
                session.channel().put_back(message);
                break;
            }
            _ => return Err(Error::inconsistent_message("unexpected message on win screen", message)),
        }
    }
    if let Some(message) = end_result {
        session.channel().put_back(message);
    }
    Ok(())
}

/// Exhaustive draw screen, plus one screen per nagashi mangan settlement
pub(super) async fn confirm_no_tile(session: &mut Session, ev: &NoTile, deadline: Instant) -> Result<()> {
    session.screen().wait_for_then_click(NO_TILE_CONFIRM, deadline).await?;
    if ev.liujumanguan {
        for _ in &ev.scores {
            session.screen().wait_for_then_click(HULE_CONFIRM, deadline).await?;
        }
    }
    Ok(())
}

impl Match {
    /// Confirm the round result and move on to the next round or to the
    /// match result.
    ///
    /// The client sends `confirmNewRound` once the result is confirmed, but
    /// the next deal may overtake it, and after a skipped result screen it
    /// never comes.
    pub(super) async fn end_of_round(&mut self, session: &mut Session, deadline: Instant) -> Result<()> {
        let poll = session.timeouts().message_poll;
        let mut confirmed = false;
        loop {
            let now = Instant::now();
            if now >= deadline {
                return Err(Error::timeout("waiting for the next round"));
            }
            if !confirmed {
                let shot = session.screenshot()?;
                if session.screen().matches(&shot, ROUND_RESULT_CONFIRM)? {
                    session.screen().click_template(ROUND_RESULT_CONFIRM)?;
                    confirmed = true;
                }
            }

            let Some(message) = session.channel().dequeue_until((now + poll).min(deadline)).await? else {
                continue;
            };
            if on_common_message(&message)? {
                continue;
            }
            match message.name.as_str() {
                names::INPUT_OPERATION | names::INPUT_CHI_PENG_GANG => {}
                names::CONFIRM_NEW_ROUND => {
                    self.await_deal(session, deadline).await?;
                    return self.next_round(session, deadline).await;
                }
                names::ACTION_PROTOTYPE if is_new_round(&message) => {
                    return self.deal_before_confirmation(session, message, deadline).await;
                }
                // result screen skipped and the next round arrived out of order
                names::ACTION_PROTOTYPE => return self.skipped_confirmation(session, message, deadline).await,
                names::NOTIFY_GAME_END_RESULT => {
                    session.screen().wait_for_then_click(MATCH_RESULT_CONFIRM, deadline).await?;
                    return self.end_of_match(session, deadline).await;
                }
                _ => return Err(Error::inconsistent_message("unexpected message after the round", message)),
            }
        }
    }

    /// After `confirmNewRound`, wait for the deal and leave it queued
    async fn await_deal(&mut self, session: &mut Session, deadline: Instant) -> Result<()> {
        loop {
            let message = next_message(session, deadline, "waiting for the next deal").await?;
            if on_common_message(&message)? {
                continue;
            }
            if message.is(names::ACTION_PROTOTYPE) && is_new_round(&message) {
                session.channel().put_back(message);
                return Ok(());
            }
            return Err(Error::inconsistent_message("expected the next deal", message));
        }
    }

    async fn deal_before_confirmation(
        &mut self,
        session: &mut Session,
        deal: DecodedMessage,
        deadline: Instant,
    ) -> Result<()> {
        loop {
            let message = next_message(session, deadline, "waiting for round confirmation").await?;
            if on_common_message(&message)? {
                continue;
            }
            match message.name.as_str() {
                names::CONFIRM_NEW_ROUND => {
                    tracing::info!("deal overtook round confirmation");
                    session.channel().put_back(deal);
                    return self.next_round(session, deadline).await;
                }
                names::ACTION_PROTOTYPE => {
                    session.channel().put_back(message);
                    return self.skipped_confirmation(session, deal, deadline).await;
                }
                _ => return Err(Error::inconsistent_message("unexpected message after the deal", message)),
            }
        }
    }

    /// The result screen was skipped; the next round is already running.
    ///
    /// `first` is its earliest action seen, not necessarily the deal.
    async fn skipped_confirmation(
        &mut self,
        session: &mut Session,
        first: DecodedMessage,
        deadline: Instant,
    ) -> Result<()> {
        tracing::info!(step = ?first.step(), "round confirmation skipped");
        let deal = if first.step() == Some(0) {
            first
        } else {
            realign_steps(session.channel(), first, 0, deadline, on_common_message).await?
        };
        if !is_new_round(&deal) {
            return Err(Error::inconsistent_message("next round does not open with a deal", deal));
        }
        session.channel().put_back(deal);
        self.next_round(session, deadline).await
    }

    async fn next_round(&mut self, session: &mut Session, deadline: Instant) -> Result<()> {
        Match::wait_for_markers(session, deadline).await?;
        let next = Match::new(session, self.state.clone(), self.origin.clone(), deadline).await?;
        self.base.set_successor(Presentation::Match(Box::new(next)))
    }

    /// After the match result, wait for the lobby to fetch the room
    async fn end_of_match(&mut self, session: &mut Session, deadline: Instant) -> Result<()> {
        loop {
            let message = next_message(session, deadline, "waiting for the room").await?;
            if on_common_message(&message)? {
                continue;
            }
            match message.name.as_str() {
                names::FETCH_ACCOUNT_INFO
                | names::NOTIFY_ACCOUNT_UPDATE
                | names::NOTIFY_GAME_FINISH_REWARD
                | names::NOTIFY_ACTIVITY_REWARD
                | names::NOTIFY_ACTIVITY_POINT
                | names::NOTIFY_LEADERBOARD_POINT => {
                    tracing::info!(name = %message.name, "match settlement");
                }
                names::FETCH_ROOM => {
                    session.channel().put_back(message);
                    return self.return_to_room(session, deadline).await;
                }
                _ => return Err(Error::inconsistent_message("unexpected message after the match", message)),
            }
        }
    }

    async fn return_to_room(&mut self, session: &mut Session, deadline: Instant) -> Result<()> {
        let prompt = session.timeouts().result_prompt;
        loop {
            let now = Instant::now();
            if now > deadline {
                return Err(Error::timeout("clicking through match results"));
            }
            match session.screen().wait_for_then_click(MATCH_RESULT_CONFIRM, (now + prompt).min(deadline)).await {
                Ok(()) => {}
                Err(e) if e.is_timeout() => break,
                Err(e) => return Err(e),
            }
        }

        let origin = self
            .origin
            .clone()
            .ok_or_else(|| Error::inconsistent("match did not start from a room"))?;
        let room = RoomHost::return_from_match(session, origin, deadline).await?;
        self.base.set_successor(Presentation::RoomHost(room))
    }
}
