use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::codec::{Obfuscation, SchemaRegistry};
use crate::error::{Error, Result};
use crate::protocol::action::ActionEvent;
use crate::protocol::decoder::FrameDecoder;
use crate::protocol::message::{DecodedMessage, RawFrame};

/// Capture-side handle feeding raw frames into a [`MessageChannel`]
#[derive(Clone)]
pub struct FrameSender {
    tx: mpsc::Sender<RawFrame>,
}

impl FrameSender {
    pub async fn send(&self, frame: RawFrame) -> Result<()> {
        self.tx.send(frame).await.map_err(|_| Error::ChannelClosed)
    }

    pub fn try_send(&self, frame: RawFrame) -> Result<()> {
        self.tx.try_send(frame).map_err(|_| Error::ChannelClosed)
    }
}

/// FIFO of decoded messages with one-message lookahead.
///
/// Messages handed back with [`put_back`](Self::put_back) are returned
/// before anything still queued, most recent first.
pub struct MessageChannel {
    rx: mpsc::Receiver<RawFrame>,
    decoder: FrameDecoder,
    put_back: VecDeque<DecodedMessage>,
}

impl MessageChannel {
    pub fn new(capacity: usize, registry: Arc<dyn SchemaRegistry>) -> (FrameSender, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let channel = Self {
            rx,
            decoder: FrameDecoder::new(registry),
            put_back: VecDeque::new(),
        };
        (FrameSender { tx }, channel)
    }

    /// Wait up to `timeout` for the next message.
    ///
    /// A zero timeout returns `None` at once, even with messages put back.
    pub async fn dequeue(&mut self, timeout: Duration) -> Result<Option<DecodedMessage>> {
        if timeout.is_zero() {
            return Ok(None);
        }
        if let Some(message) = self.put_back.pop_front() {
            return Ok(Some(message));
        }

        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            match tokio::time::timeout(remaining, self.rx.recv()).await {
                Err(_) => return Ok(None),
                Ok(None) => return Err(Error::ChannelClosed),
                Ok(Some(frame)) => {
                    if let Some(message) = self.decoder.decode(frame)? {
                        return Ok(Some(message));
                    }
                }
            }
        }
    }

    /// [`dequeue`](Self::dequeue) bounded by an absolute deadline
    pub async fn dequeue_until(&mut self, deadline: Instant) -> Result<Option<DecodedMessage>> {
        self.dequeue(deadline.saturating_duration_since(Instant::now())).await
    }

    /// Make `message` the next one returned
    pub fn put_back(&mut self, message: DecodedMessage) {
        self.put_back.push_front(message);
    }

    /// Next message already available, without waiting
    pub fn try_dequeue(&mut self) -> Result<Option<DecodedMessage>> {
        if let Some(message) = self.put_back.pop_front() {
            return Ok(Some(message));
        }
        loop {
            match self.rx.try_recv() {
                Ok(frame) => {
                    if let Some(message) = self.decoder.decode(frame)? {
                        return Ok(Some(message));
                    }
                }
                Err(mpsc::error::TryRecvError::Empty) => return Ok(None),
                Err(mpsc::error::TryRecvError::Disconnected) => return Err(Error::ChannelClosed),
            }
        }
    }

    /// Discard everything currently available, returning how many messages went
    pub fn drain(&mut self) -> Result<usize> {
        let mut count = 0;
        while let Some(message) = self.try_dequeue()? {
            tracing::debug!(name = %message.name, "drained");
            count += 1;
        }
        Ok(count)
    }

    pub fn account_id(&self) -> Option<u64> {
        self.decoder.account_id()
    }

    pub fn decode_action(
        &self,
        prototype: &serde_json::Value,
        obfuscation: Obfuscation,
    ) -> Result<ActionEvent> {
        self.decoder.decode_action(prototype, obfuscation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::message::Direction;
    use crate::protocol::names;
    use crate::testing::{self, JsonRegistry};
    use serde_json::json;
    use tokio_test::assert_ok;

    fn channel() -> (FrameSender, MessageChannel) {
        MessageChannel::new(64, Arc::new(JsonRegistry))
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_timeout_returns_immediately() {
        let (tx, mut channel) = channel();
        tx.send(testing::notify(names::HEARTBEAT, json!({}))).await.unwrap();
        assert!(channel.dequeue(Duration::ZERO).await.unwrap().is_none());
        assert!(channel.dequeue(Duration::from_secs(1)).await.unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_yields_none() {
        let (_tx, mut channel) = channel();
        let started = Instant::now();
        assert!(channel.dequeue(Duration::from_secs(3)).await.unwrap().is_none());
        assert!(started.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_put_back_is_next() {
        let (tx, mut channel) = channel();
        tx.send(testing::notify(".lq.NotifyShopUpdate", json!({}))).await.unwrap();
        tx.send(testing::notify(names::NOTIFY_ACTIVITY_CHANGE, json!({}))).await.unwrap();

        let first = channel.dequeue(Duration::from_secs(1)).await.unwrap().unwrap();
        let second = channel.dequeue(Duration::from_secs(1)).await.unwrap().unwrap();
        channel.put_back(second.clone());
        channel.put_back(first.clone());

        assert_eq!(channel.dequeue(Duration::from_secs(1)).await.unwrap(), Some(first));
        assert_eq!(channel.dequeue(Duration::from_secs(1)).await.unwrap(), Some(second));
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_waits_for_response() {
        let (tx, mut channel) = channel();
        let [request, response] =
            testing::exchange(Direction::Outbound, 2, names::FETCH_ROOM, json!({}), json!({"room": {}}));
        tx.send(request).await.unwrap();
        assert!(channel.dequeue(Duration::from_millis(100)).await.unwrap().is_none());

        tx.send(response).await.unwrap();
        let msg = channel.dequeue(Duration::from_millis(100)).await.unwrap().unwrap();
        assert_eq!(msg.name, names::FETCH_ROOM);
        assert!(msg.response.is_some());
    }

    #[tokio::test]
    async fn test_drain_and_close() {
        let (tx, mut channel) = channel();
        for _ in 0..3 {
            tx.send(testing::notify(names::HEARTBEAT, json!({}))).await.unwrap();
        }
        assert_eq!(assert_ok!(channel.drain()), 3);
        drop(tx);
        assert!(matches!(
            channel.dequeue(Duration::from_secs(1)).await,
            Err(Error::ChannelClosed)
        ));
    }
}
