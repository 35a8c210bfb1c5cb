//! Answering decisions through the table's buttons.

use std::time::Duration;

use tokio::time::Instant;

use super::{next_message, on_common_message, Match};
use crate::client::Session;
use crate::error::{Error, Result};
use crate::protocol::{names, ActionKind};
use crate::screen::layout::{self, IDLE_FOR_CHI, IDLE_FOR_GANG, IDLE_FOR_LIQI, IDLE_FOR_ZIMOHU, NO_CALLS_TOGGLE, SKIP_BUTTON};
use crate::screen::Region;
use crate::state::{Decision, Operation, SeatFlags, Tile};

const CHI: [&str; 2] = ["match/chi0", "match/chi1"];
const PENG: [&str; 2] = ["match/peng0", "match/peng1"];
const GANG: [&str; 2] = ["match/gang0", "match/gang1"];
const LIQI: &str = "match/liqi";
const ZIMOHU: &str = "match/zimohu";
const RONG: &str = "match/rong";
const LIUJU: &str = "match/liuju";

/// Most alternatives the meld chooser lays out
const MAX_MELD_CHOICES: usize = 5;

/// A call button and what may have beaten the call to it
struct CallButton {
    buttons: &'static [&'static str],
    /// Spot to park the cursor on first, so hovering the hand shows no hints
    idle: Option<Region>,
    timeout: Duration,
    /// Other seats' actions that take precedence and remove the button
    preempted_by: &'static [ActionKind],
}

/// Validated meld alternative to pick after pressing the call button
fn meld_choice(combinations: &[Vec<Tile>], index: Option<usize>) -> Result<Option<Region>> {
    let count = combinations.len();
    if count < 2 {
        return Ok(None);
    }
    if count > MAX_MELD_CHOICES {
        return Err(Error::inconsistent(format!("{count} meld alternatives offered")));
    }
    let index = index.ok_or_else(|| Error::invalid_operation("several melds possible; an index is required"))?;
    if index >= count {
        return Err(Error::invalid_operation(format!("meld index {index} out of {count}")));
    }
    Ok(Some(layout::meld_choice(count, index)))
}

impl Match {
    /// Answer the pending decision set, then follow the round to the next
    /// decision or its end.
    pub async fn select_operation(
        &mut self,
        session: &mut Session,
        decision: Decision,
        timeout: Duration,
    ) -> Result<()> {
        self.base.ensure_fresh()?;
        let deadline = Instant::now() + timeout;
        let result = self.answer(session, decision, deadline).await;
        result.map_err(|e| session.annotate(e))
    }

    async fn answer(&mut self, session: &mut Session, decision: Decision, deadline: Instant) -> Result<()> {
        let Some(operations) = self.operations.as_ref() else {
            return Err(Error::invalid_operation("no decision pending"));
        };

        match decision {
            Decision::Skip => {
                let has_call = operations.has_call();
                self.skip(session, has_call, deadline).await?;
            }
            Decision::Select { kind, index } => {
                let operation = operations
                    .get(kind)
                    .cloned()
                    .ok_or_else(|| Error::invalid_operation(format!("{kind} is not offered")))?;
                tracing::info!(%kind, ?index, "answering decision");
                self.perform(session, operation, index, deadline).await?;
            }
        }

        self.operations = None;
        self.wait_impl(session, deadline).await
    }

    async fn perform(
        &mut self,
        session: &mut Session,
        operation: Operation,
        index: Option<usize>,
        deadline: Instant,
    ) -> Result<()> {
        let timeouts = session.timeouts().clone();
        match operation {
            Operation::Dapai { forbidden } => {
                let index = index.ok_or_else(|| Error::invalid_operation("a discard needs a tile index"))?;
                let seat = self.round.seat();
                if usize::from(self.round.ju()) == seat && self.round.flags(seat).contains(SeatFlags::FIRST_DRAW) {
                    // the deal animation is still moving the dealer's tiles
                    settle(timeouts.deal_settle, deadline).await;
                }
                self.dapai(session, index, &forbidden, deadline).await
            }
            Operation::Chi { combinations } => {
                let call = CallButton {
                    buttons: &CHI,
                    idle: Some(IDLE_FOR_CHI),
                    timeout: timeouts.call_button,
                    preempted_by: &[ActionKind::ChiPengGang, ActionKind::Hule],
                };
                self.call(session, &call, &combinations, index, deadline).await
            }
            Operation::Peng { combinations } => {
                let call = CallButton {
                    buttons: &PENG,
                    idle: None,
                    timeout: timeouts.call_button,
                    preempted_by: &[ActionKind::Hule],
                };
                self.call(session, &call, &combinations, index, deadline).await
            }
            Operation::Angang { combinations } => {
                let call = CallButton {
                    buttons: &GANG,
                    idle: Some(IDLE_FOR_GANG),
                    timeout: timeouts.self_button,
                    preempted_by: &[],
                };
                self.kan(session, &call, &combinations, deadline).await
            }
            Operation::Daminggang { combinations } => {
                let call = CallButton {
                    buttons: &GANG[..1],
                    idle: None,
                    timeout: timeouts.self_button,
                    preempted_by: &[],
                };
                self.kan(session, &call, &combinations, deadline).await
            }
            Operation::Jiagang { combinations } => {
                let call = CallButton {
                    buttons: &GANG[..1],
                    idle: Some(IDLE_FOR_GANG),
                    timeout: timeouts.self_button,
                    preempted_by: &[],
                };
                self.kan(session, &call, &combinations, deadline).await
            }
            Operation::Liqi { candidates } => {
                let index = index.ok_or_else(|| Error::invalid_operation("riichi needs a tile index"))?;
                let hand = self.round.shoupai();
                let tile = match index.cmp(&hand.len()) {
                    std::cmp::Ordering::Less => Some(hand[index]),
                    std::cmp::Ordering::Equal => self.round.zimopai(),
                    std::cmp::Ordering::Greater => None,
                };
                if !tile.is_some_and(|t| candidates.contains(&t)) {
                    return Err(Error::invalid_operation(format!("tile {index} does not keep the hand ready")));
                }
                session.screen().move_to_region(IDLE_FOR_LIQI)?;
                session.screen().wait_for_then_click(LIQI, Instant::now() + timeouts.self_button).await?;
                self.dapai(session, index, &[], deadline).await
            }
            Operation::Zimohu => {
                session.screen().move_to_region(IDLE_FOR_ZIMOHU)?;
                session.screen().wait_for_then_click(ZIMOHU, Instant::now() + timeouts.self_button).await
            }
            Operation::Rong => {
                session.screen().wait_for_then_click(RONG, Instant::now() + timeouts.self_button).await
            }
            Operation::Jiuzhongjiupai => {
                session.screen().wait_for_then_click(LIUJU, Instant::now() + timeouts.self_button).await
            }
        }
    }

    /// Pass on the decision.
    ///
    /// Calls on the left neighbour's discard are passed with the no-calls
    /// toggle, since the skip button there may also pass on the own draw's
    /// options that follow.
    async fn skip(&mut self, session: &mut Session, has_call: bool, deadline: Instant) -> Result<()> {
        let players = self.round.player_count();
        let seat = self.round.seat();
        let from_left = self
            .round
            .prev_dapai()
            .is_some_and(|(from, _)| (seat + players - from) % players == 1);

        if !(has_call && from_left) {
            let timeouts = session.timeouts();
            let (interval, timeout) = (timeouts.skip_click_interval, timeouts.skip_click_timeout);
            return self.robust_click(session, SKIP_BUTTON, interval, timeout, true, deadline).await;
        }

        session.screen().click_region(NO_CALLS_TOGGLE, true)?;
        let message = loop {
            let message = next_message(session, deadline, "waiting for the skip to register").await?;
            if on_common_message(&message)? {
                continue;
            }
            match message.name.as_str() {
                names::INPUT_CHI_PENG_GANG | names::ACTION_PROTOTYPE => break message,
                _ => return Err(Error::inconsistent_message("unexpected message after skipping", message)),
            }
        };
        session.channel().put_back(message);
        session.screen().click_region(NO_CALLS_TOGGLE, false)
    }

    /// Discard the tile at hand position `index`; the drawn tile comes last
    async fn dapai(&mut self, session: &mut Session, index: usize, forbidden: &[Tile], deadline: Instant) -> Result<()> {
        let hand = self.round.shoupai();
        let drawn = self.round.zimopai();
        let count = hand.len() + usize::from(drawn.is_some());
        if index >= count {
            return Err(Error::invalid_operation(format!("discard index {index} out of {count}")));
        }
        if drawn.is_none() && forbidden.contains(&hand[index]) {
            return Err(Error::invalid_operation(format!("{} may not be discarded right after the call", hand[index])));
        }

        let region = layout::hand_tile(index, drawn.is_some() && index == count - 1);
        let timeouts = session.timeouts();
        let (interval, timeout) = (timeouts.dapai_click_interval, timeouts.dapai_click_timeout);
        self.robust_click(session, region, interval, timeout, false, deadline).await
    }

    async fn call(
        &mut self,
        session: &mut Session,
        call: &CallButton,
        combinations: &[Vec<Tile>],
        index: Option<usize>,
        deadline: Instant,
    ) -> Result<()> {
        let choice = meld_choice(combinations, index)?;
        if let Some(idle) = call.idle {
            session.screen().move_to_region(idle)?;
        }
        let button_deadline = (Instant::now() + call.timeout).min(deadline);
        match session.screen().wait_for_one_of_then_click(call.buttons, button_deadline).await {
            Ok(_) => {}
            Err(e) if e.is_timeout() && !call.preempted_by.is_empty() => {
                return self.preempted(session, call.preempted_by, deadline).await;
            }
            Err(e) => return Err(e),
        }
        if let Some(region) = choice {
            session.screen().click_region(region, false)?;
        }
        // part of the hand slides after a meld
        settle(session.timeouts().meld_settle, deadline).await;
        Ok(())
    }

    async fn kan(
        &mut self,
        session: &mut Session,
        call: &CallButton,
        combinations: &[Vec<Tile>],
        deadline: Instant,
    ) -> Result<()> {
        if combinations.len() >= 2 {
            return Err(Error::invalid_operation("choosing among several kans is not supported"));
        }
        self.call(session, call, combinations, None, deadline).await
    }

    /// The call button never showed; find the action that took precedence
    /// and leave it queued for the round to apply
    async fn preempted(&mut self, session: &mut Session, kinds: &[ActionKind], deadline: Instant) -> Result<()> {
        loop {
            let message = next_message(session, deadline, "looking for what pre-empted the call").await?;
            if on_common_message(&message)? {
                continue;
            }
            let kind = message.action().map(|a| a.kind);
            if message.is(names::ACTION_PROTOTYPE) && kind.is_some_and(|k| kinds.contains(&k)) {
                tracing::info!(kind = ?kind, "call pre-empted");
                session.channel().put_back(message);
                return Ok(());
            }
            return Err(Error::inconsistent_message("call button did not show", message));
        }
    }

    /// Click `region` every `interval` until the server acknowledges the
    /// input, leaving the acknowledging message queued
    async fn robust_click(
        &mut self,
        session: &mut Session,
        region: Region,
        interval: Duration,
        timeout: Duration,
        warp: bool,
        deadline: Instant,
    ) -> Result<()> {
        let deadline = (Instant::now() + timeout).min(deadline);
        let message = loop {
            let now = Instant::now();
            if now >= deadline {
                return Err(Error::timeout(format!("click on {region:?} not acknowledged")));
            }
            session.screen().click_region(region, warp)?;
            let Some(message) = session.channel().dequeue_until((now + interval).min(deadline)).await? else {
                continue;
            };
            if on_common_message(&message)? {
                continue;
            }
            match message.name.as_str() {
                names::INPUT_OPERATION | names::INPUT_CHI_PENG_GANG | names::ACTION_PROTOTYPE => break message,
                _ => return Err(Error::inconsistent_message("unexpected message while clicking", message)),
            }
        };
        session.channel().put_back(message);
        Ok(())
    }
}

/// Let an animation finish, but never past `deadline`
async fn settle(duration: Duration, deadline: Instant) {
    tokio::time::sleep_until((Instant::now() + duration).min(deadline)).await;
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::*;

    use serde_json::{json, Value};

    use crate::protocol::Direction;
    use crate::state::{Discard, OperationKind};
    use crate::testing::{self, feed, Input};

    const TIMEOUT: Duration = Duration::from_secs(30);

    /// Seat 1 facing a chi on the dealer's discard
    async fn chi_offered(scenes: &[&[&str]]) -> Table {
        let mut t = start(scenes, 1, new_round(1, 0, &HAND13, Value::Null), None).await;
        feed(&t.tx, [discard(2, 0, "3p", false, ops(json!([{"type": 2, "combination": ["1p|2p"]}])))]).await;
        t.game.wait(&mut t.session, TIMEOUT).await.unwrap();
        assert!(t.game.operations().unwrap().unwrap().contains(OperationKind::Chi));
        t
    }

    #[tokio::test(start_paused = true)]
    async fn test_dealer_discards_drawn_tile() {
        let hand = dealer_hand();
        let mut t = start(&[&["match/marker0"]], 0, new_round(1, 0, &hand, ops(json!([{"type": 1}]))), None).await;
        let mut frames = testing::exchange(
            Direction::Outbound,
            5,
            names::INPUT_OPERATION,
            json!({"type": 1, "tile": "5s", "moqie": true}),
            json!({}),
        )
        .to_vec();
        frames.push(discard(2, 0, "5s", true, Value::Null));
        feed(&t.tx, frames).await;

        t.game.select_operation(&mut t.session, Decision::discard(13), TIMEOUT).await.unwrap();
        assert_eq!(t.browser.clicks(), vec![layout::hand_tile(13, true)]);
        let round = t.game.round().unwrap();
        assert_eq!(round.he()[0], vec![Discard { tile: "5s".parse().unwrap(), moqie: true }]);
        assert_eq!(round.zimopai(), None);
        assert!(t.game.operations().unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unacknowledged_discard_stays_within_the_timeout() {
        let hand = dealer_hand();
        for timeout in [Duration::from_millis(500), Duration::from_millis(1500)] {
            let mut t =
                start(&[&["match/marker0"]], 0, new_round(1, 0, &hand, ops(json!([{"type": 1}]))), None).await;
            let started = Instant::now();
            let err = t.game.select_operation(&mut t.session, Decision::discard(13), timeout).await.unwrap_err();
            assert!(err.is_timeout(), "{err:?}");
            assert!(started.elapsed() <= timeout, "{timeout:?} overrun: {:?}", started.elapsed());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejects_invalid_decisions_before_input() {
        let hand = dealer_hand();
        let offered = ops(json!([{"type": 1}, {"type": 7, "combination": ["4p"]}]));
        let mut t = start(&[&["match/marker0"]], 0, new_round(1, 0, &hand, offered), None).await;

        for decision in [
            Decision::discard(14),
            Decision::select(OperationKind::Dapai),
            Decision::select(OperationKind::Rong),
            Decision::select_at(OperationKind::Liqi, 0),
        ] {
            let err = t.game.select_operation(&mut t.session, decision, TIMEOUT).await.unwrap_err();
            assert!(matches!(err, Error::InvalidOperation { .. }), "{decision:?}");
        }
        assert!(t.browser.inputs().is_empty());
        assert!(t.game.operations().unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_skip_left_discard_with_toggle() {
        let mut t = chi_offered(&[&["match/marker0"]]).await;
        feed(
            &t.tx,
            [testing::action(3, "ActionDealTile", json!({"seat": 1, "tile": "5s", "left_tile_count": 68}))],
        )
        .await;
        t.game.select_operation(&mut t.session, Decision::Skip, TIMEOUT).await.unwrap();
        assert_eq!(t.browser.clicks(), vec![NO_CALLS_TOGGLE, NO_CALLS_TOGGLE]);
        assert_eq!(t.game.round().unwrap().zimopai(), Some("5s".parse().unwrap()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_chi_preempted_by_pon() {
        let mut t = chi_offered(&[&["match/marker0"]]).await;
        feed(
            &t.tx,
            [testing::action(3, "ActionChiPengGang", json!({
                "seat": 2, "type": 1, "tiles": ["3p", "3p", "3p"], "froms": [2, 2, 0],
            }))],
        )
        .await;
        t.game.select_operation(&mut t.session, Decision::select(OperationKind::Chi), TIMEOUT).await.unwrap();
        assert_eq!(t.browser.inputs(), vec![Input::Move(IDLE_FOR_CHI)]);
        assert_eq!(t.game.round().unwrap().fulu()[2].len(), 1);
        assert!(t.game.operations().unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_chi_clicks_button() {
        let mut t = chi_offered(&[&["match/marker0", "match/chi1"], &["match/marker0"]]).await;
        let mut frames = testing::exchange(
            Direction::Outbound,
            6,
            names::INPUT_CHI_PENG_GANG,
            json!({"type": 2, "index": 0}),
            json!({}),
        )
        .to_vec();
        frames.push(testing::action(3, "ActionChiPengGang", json!({
            "seat": 1, "type": 0, "tiles": ["1p", "2p", "3p"], "froms": [1, 1, 0],
            "operation": ops(json!([{"type": 1}])),
        })));
        feed(&t.tx, frames).await;

        t.game.select_operation(&mut t.session, Decision::select(OperationKind::Chi), TIMEOUT).await.unwrap();
        assert_eq!(t.browser.clicks(), vec![crate::testing::TEMPLATE_HIT]);
        assert_eq!(t.game.round().unwrap().fulu()[1].len(), 1);
        assert!(t.game.operations().unwrap().unwrap().contains(OperationKind::Dapai));
    }

    #[test]
    fn test_meld_choice_bounds() {
        let combo = vec!["1p".parse().unwrap(), "2p".parse().unwrap()];
        assert_eq!(meld_choice(&[combo.clone()], None).unwrap(), None);
        let two = vec![combo.clone(), combo.clone()];
        assert!(meld_choice(&two, None).is_err());
        assert!(meld_choice(&two, Some(2)).is_err());
        assert_eq!(meld_choice(&two, Some(1)).unwrap(), Some(layout::meld_choice(2, 1)));
        assert!(meld_choice(&vec![combo; 6], Some(0)).is_err());
    }
}
