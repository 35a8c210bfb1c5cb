//! Recovery for `.lq.ActionPrototype` notifications delivered out of step order.

use tokio::time::Instant;

use crate::error::{Error, Result};
use crate::protocol::channel::MessageChannel;
use crate::protocol::message::DecodedMessage;

/// Collect actions until every step from `expected` up to the highest one
/// seen has arrived, then return the `expected` one and put the rest back
/// so they dequeue in ascending step order.
///
/// `absorb` is offered every non-action message and returns whether it was
/// consumed; anything it refuses is an inconsistency. Steps below
/// `expected` and duplicated steps are fatal.
pub async fn realign_steps<F>(
    channel: &mut MessageChannel,
    first: DecodedMessage,
    expected: u32,
    deadline: Instant,
    mut absorb: F,
) -> Result<DecodedMessage>
where
    F: FnMut(&DecodedMessage) -> Result<bool>,
{
    let mut slots: Vec<Option<DecodedMessage>> = Vec::new();
    let mut message = first;

    loop {
        match message.step() {
            Some(step) => {
                if step < expected {
                    return Err(Error::inconsistent_message(
                        format!("step {step} regressed below expected {expected}"),
                        message,
                    ));
                }
                let index = (step - expected) as usize;
                if slots.len() <= index {
                    slots.resize_with(index + 1, || None);
                }
                if slots[index].is_some() {
                    return Err(Error::inconsistent_message(
                        format!("step {step} delivered twice"),
                        message,
                    ));
                }
                tracing::debug!(step, expected, "buffered out-of-order action");
                slots[index] = Some(message);

                if slots.iter().all(Option::is_some) {
                    let mut ready = slots.into_iter().flatten();
                    let Some(head) = ready.next() else {
                        return Err(Error::inconsistent("empty step table"));
                    };
                    let rest: Vec<_> = ready.collect();
                    for later in rest.into_iter().rev() {
                        channel.put_back(later);
                    }
                    return Ok(head);
                }
            }
            None => {
                if !absorb(&message)? {
                    let have: Vec<u32> = slots.iter().flatten().filter_map(|m| m.step()).collect();
                    return Err(Error::inconsistent_message(
                        format!("unexpected message while waiting for step {expected} (have {have:?})"),
                        message,
                    ));
                }
            }
        }

        match channel.dequeue_until(deadline).await? {
            Some(next) => message = next,
            None => {
                // keep what arrived so a retry sees the same steps
                for held in slots.into_iter().flatten().rev() {
                    channel.put_back(held);
                }
                return Err(Error::timeout(format!("waiting for action step {expected}")));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::names;
    use crate::protocol::FrameSender;
    use crate::testing::{self, JsonRegistry};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn channel() -> (FrameSender, MessageChannel) {
        MessageChannel::new(64, Arc::new(JsonRegistry))
    }

    fn heartbeat_only(m: &DecodedMessage) -> Result<bool> {
        Ok(m.is(names::HEARTBEAT))
    }

    async fn next(channel: &mut MessageChannel) -> DecodedMessage {
        channel.dequeue(Duration::from_secs(1)).await.unwrap().unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_step_is_released_first() {
        let (tx, mut channel) = channel();
        tx.send(testing::action(3, "ActionDealTile", json!({}))).await.unwrap();
        tx.send(testing::notify(names::HEARTBEAT, json!({}))).await.unwrap();
        tx.send(testing::action(2, "ActionDiscardTile", json!({}))).await.unwrap();

        let first = next(&mut channel).await;
        let deadline = Instant::now() + Duration::from_secs(5);
        let released = realign_steps(&mut channel, first, 2, deadline, heartbeat_only).await.unwrap();
        assert_eq!(released.step(), Some(2));
        assert_eq!(next(&mut channel).await.step(), Some(3));
        assert!(channel.dequeue(Duration::from_millis(10)).await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_gap_of_two() {
        let (tx, mut channel) = channel();
        for step in [7, 5, 6] {
            tx.send(testing::action(step, "ActionDealTile", json!({}))).await.unwrap();
        }
        let first = next(&mut channel).await;
        let deadline = Instant::now() + Duration::from_secs(5);
        let released = realign_steps(&mut channel, first, 5, deadline, heartbeat_only).await.unwrap();
        assert_eq!(released.step(), Some(5));
        assert_eq!(next(&mut channel).await.step(), Some(6));
        assert_eq!(next(&mut channel).await.step(), Some(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_regression_is_fatal() {
        let (tx, mut channel) = channel();
        tx.send(testing::action(1, "ActionDealTile", json!({}))).await.unwrap();
        let first = next(&mut channel).await;
        let deadline = Instant::now() + Duration::from_secs(5);
        let err = realign_steps(&mut channel, first, 4, deadline, heartbeat_only).await.unwrap_err();
        assert!(matches!(err, Error::InconsistentMessage { message: Some(_), .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_step_times_out() {
        let (tx, mut channel) = channel();
        tx.send(testing::action(4, "ActionDealTile", json!({}))).await.unwrap();
        let first = next(&mut channel).await;
        let deadline = Instant::now() + Duration::from_secs(2);
        let err = realign_steps(&mut channel, first, 3, deadline, heartbeat_only).await.unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_keeps_buffered_steps() {
        let (tx, mut channel) = channel();
        tx.send(testing::action(5, "ActionDealTile", json!({}))).await.unwrap();
        tx.send(testing::action(4, "ActionDealTile", json!({}))).await.unwrap();
        let first = next(&mut channel).await;
        let deadline = Instant::now() + Duration::from_secs(2);
        let err = realign_steps(&mut channel, first, 3, deadline, heartbeat_only).await.unwrap_err();
        assert!(err.is_timeout());

        tx.send(testing::action(3, "ActionDiscardTile", json!({}))).await.unwrap();
        let first = next(&mut channel).await;
        assert_eq!(first.step(), Some(4));
        let deadline = Instant::now() + Duration::from_secs(2);
        let released = realign_steps(&mut channel, first, 3, deadline, heartbeat_only).await.unwrap();
        assert_eq!(released.step(), Some(3));
        assert_eq!(next(&mut channel).await.step(), Some(4));
        assert_eq!(next(&mut channel).await.step(), Some(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unexpected_message_is_inconsistent() {
        let (tx, mut channel) = channel();
        tx.send(testing::action(4, "ActionDealTile", json!({}))).await.unwrap();
        tx.send(testing::notify(names::NOTIFY_GAME_END_RESULT, json!({}))).await.unwrap();
        let first = next(&mut channel).await;
        let deadline = Instant::now() + Duration::from_secs(2);
        let err = realign_steps(&mut channel, first, 3, deadline, heartbeat_only).await.unwrap_err();
        assert!(matches!(err, Error::InconsistentMessage { .. }));
    }
}
