use tokio::time::Instant;

use crate::client::Session;
use crate::error::{Error, Result};
use crate::presentation::{Presentation, PresentationBase, RoomHost};
use crate::screen::layout::NOTIFICATION_CLOSE_SIZE;
use crate::screen::Region;

const MARKERS: [&str; 4] = ["home/marker0", "home/marker1", "home/marker2", "home/marker3"];
const NOTIFICATION_CLOSE: &str = "home/notification_close";
/// The friendly-match entry doubles as a marker
const FRIENDLY_MATCH: &str = "home/marker3";
const ROOM_CREATION: &str = "home/room_creation";
const ROOM_CREATION_CONFIRM: &str = "home/room_creation/confirm";

/// Lobby screen
#[derive(Debug)]
pub struct Home {
    pub(crate) base: PresentationBase,
}

impl Home {
    /// Wait for the lobby, closing announcements that cover its markers
    pub async fn wait(session: &mut Session, deadline: Instant) -> Result<()> {
        session.screen().wait_for(MARKERS[0], deadline).await?;
        let shot = session.screenshot()?;
        if !session.screen().matches_all(&shot, &MARKERS[1..])? {
            Self::close_notifications(session, deadline).await?;
        }
        session.screen().wait_for_all(&MARKERS[1..], deadline).await
    }

    /// Click every visible announcement close button
    pub async fn close_notifications(session: &mut Session, deadline: Instant) -> Result<()> {
        loop {
            if Instant::now() > deadline {
                return Err(Error::timeout("closing home notifications"));
            }
            let screen = session.screen();
            let shot = screen.screenshot()?;
            let found = screen.best_match(&shot, NOTIFICATION_CLOSE)?;
            let threshold = screen.templates().get(NOTIFICATION_CLOSE)?.threshold;
            if found.score < threshold {
                return Ok(());
            }
            tracing::info!(left = found.region.left, top = found.region.top, "closing notification");
            let target = Region::new(
                found.region.left,
                found.region.top,
                NOTIFICATION_CLOSE_SIZE,
                NOTIFICATION_CLOSE_SIZE,
            );
            screen.click_region(target, false)?;
            session.idle().await;
        }
    }

    /// Detect the lobby and discard whatever was queued before reaching it
    pub fn detect(session: &mut Session) -> Result<Self> {
        session.screen().detect("home", &MARKERS)?;
        let dropped = session.channel().drain()?;
        tracing::debug!(dropped, "home reached");
        Ok(Self { base: PresentationBase::new("home") })
    }

    pub fn take_successor(&mut self) -> Option<Presentation> {
        self.base.take_successor()
    }

    /// Open a friendly room and become its host
    pub async fn create_room(&mut self, session: &mut Session) -> Result<()> {
        self.base.ensure_fresh()?;
        let deadline = Instant::now() + session.timeouts().room_creation;

        let screen = session.screen();
        screen.click_template(FRIENDLY_MATCH)?;
        screen.wait_for_then_click(ROOM_CREATION, deadline).await?;
        screen.wait_for_then_click(ROOM_CREATION_CONFIRM, deadline).await?;

        RoomHost::wait(session, deadline).await?;
        let room = RoomHost::create(session, deadline).await?;
        self.base.set_successor(Presentation::RoomHost(room))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use serde_json::json;

    use crate::protocol::{names, Direction};
    use crate::testing::{self, feed, TEMPLATE_HIT};

    const HOME: &[&str] = &["home/marker0", "home/marker1", "home/marker2", "home/marker3"];

    #[tokio::test(start_paused = true)]
    async fn test_wait_closes_notifications() {
        let (_tx, mut session, browser) = testing::session(&[
            &["home/marker0", "home/notification_close"],
            &["home/marker0", "home/notification_close"],
            HOME,
        ]);
        let deadline = Instant::now() + Duration::from_secs(5);
        Home::wait(&mut session, deadline).await.unwrap();
        let close = Region::new(1, 1, 30, 30);
        assert_eq!(browser.clicks(), vec![close, close]);
        assert!(Home::detect(&mut session).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_detect_drains_queue() {
        let (tx, mut session, _) = testing::session(&[HOME]);
        feed(&tx, [testing::notify(names::NOTIFY_ACCOUNT_UPDATE, json!({}))]).await;
        tokio::task::yield_now().await;
        Home::detect(&mut session).unwrap();
        let left = session.channel().dequeue(Duration::from_millis(10)).await.unwrap();
        assert!(left.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_room() {
        let (tx, mut session, browser) = testing::session(&[
            HOME,
            &["home/room_creation"],
            &["home/room_creation/confirm"],
            &["room/marker"],
        ]);
        let mut home = Home::detect(&mut session).unwrap();
        feed(
            &tx,
            testing::exchange(
                Direction::Outbound,
                3,
                names::CREATE_ROOM,
                json!({"player_count": 4}),
                json!({"room": {
                    "room_id": 12345,
                    "owner_id": 42,
                    "max_player_count": 4,
                    "persons": [{"account_id": 42, "nickname": "host"}],
                }}),
            ),
        )
        .await;

        home.create_room(&mut session).await.unwrap();
        assert_eq!(browser.clicks(), vec![TEMPLATE_HIT; 3]);
        let Some(Presentation::RoomHost(room)) = home.take_successor() else {
            panic!("expected a room");
        };
        assert_eq!(room.room_id().unwrap(), 12345);
        assert_eq!(room.players().unwrap()[0].name, "host");
        assert!(room.players().unwrap()[0].is_host);
        assert!(matches!(home.create_room(&mut session).await, Err(Error::StalePresentation { .. })));
    }
}
