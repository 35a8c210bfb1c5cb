use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;

use crate::client::Session;
use crate::error::{Error, Result};
use crate::presentation::{Home, Match, Presentation, PresentationBase};
use crate::protocol::{names, DecodedMessage, Direction};
use crate::state::MatchState;

const MARKER: &str = "room/marker";
const ADD_CPU: &str = "room/add_cpu";
const START: &str = "room/start";
const LEAVE: &str = "room/leave";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomPlayer {
    pub account_id: u64,
    pub name: String,
    pub is_host: bool,
    pub is_ready: bool,
}

/// Room membership as last reported by the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomInfo {
    pub room_id: u64,
    pub max_players: usize,
    /// Human members; CPUs are only counted
    pub players: Vec<RoomPlayer>,
    pub num_cpus: usize,
}

fn field<'a>(value: &'a Value, key: &str, context: &str) -> Result<&'a Value> {
    value
        .get(key)
        .ok_or_else(|| Error::inconsistent(format!("{context} without `{key}`")))
}

fn u64_field(value: &Value, key: &str, context: &str) -> Result<u64> {
    field(value, key, context)?
        .as_u64()
        .ok_or_else(|| Error::inconsistent(format!("{context}: `{key}` is not an integer")))
}

fn str_field<'a>(value: &'a Value, key: &str, context: &str) -> Result<&'a str> {
    field(value, key, context)?
        .as_str()
        .ok_or_else(|| Error::inconsistent(format!("{context}: `{key}` is not a string")))
}

fn require_notification(message: &DecodedMessage) -> Result<()> {
    if message.direction != Direction::Inbound || message.response.is_some() {
        return Err(Error::inconsistent_message("room update is not a notification", message.clone()));
    }
    Ok(())
}

impl RoomInfo {
    /// Room just created by the controlled account, who is its only member
    pub fn from_create_room(message: &DecodedMessage) -> Result<Self> {
        if message.direction != Direction::Outbound {
            return Err(Error::inconsistent_message("createRoom is not outbound", message.clone()));
        }
        let room = field(message.require_response()?, "room", "createRoom")?;
        let persons = field(room, "persons", "createRoom")?
            .as_array()
            .filter(|ps| ps.len() == 1)
            .ok_or_else(|| {
                Error::inconsistent_message("new room does not hold just its host", message.clone())
            })?;
        let host = &persons[0];
        Ok(Self {
            room_id: u64_field(room, "room_id", "createRoom")?,
            max_players: u64_field(room, "max_player_count", "createRoom")? as usize,
            players: vec![RoomPlayer {
                account_id: u64_field(host, "account_id", "createRoom")?,
                name: str_field(host, "nickname", "createRoom")?.to_string(),
                is_host: true,
                is_ready: true,
            }],
            num_cpus: 0,
        })
    }

    /// Apply a room notification; `false` when nothing changed
    pub fn update(&mut self, message: &DecodedMessage) -> Result<bool> {
        match message.name.as_str() {
            names::MODIFY_ROOM => Ok(false),
            names::NOTIFY_ROOM_PLAYER_UPDATE => {
                require_notification(message)?;
                let body = &message.request;
                let context = "NotifyRoomPlayerUpdate";
                let owner = u64_field(body, "owner_id", context)?;
                let list = field(body, "player_list", context)?
                    .as_array()
                    .ok_or_else(|| Error::inconsistent("player_list is not a list"))?;
                let mut players = Vec::with_capacity(list.len());
                for p in list {
                    let account_id = u64_field(p, "account_id", context)?;
                    // readiness is reported separately; keep what is known
                    let is_ready = self
                        .players
                        .iter()
                        .any(|old| old.account_id == account_id && old.is_ready);
                    players.push(RoomPlayer {
                        account_id,
                        name: str_field(p, "nickname", context)?.to_string(),
                        is_host: account_id == owner,
                        is_ready,
                    });
                }
                self.players = players;
                self.num_cpus = u64_field(body, "robot_count", context)? as usize;
                Ok(true)
            }
            names::NOTIFY_ROOM_PLAYER_READY => {
                require_notification(message)?;
                let body = &message.request;
                let account_id = u64_field(body, "account_id", "NotifyRoomPlayerReady")?;
                let ready = body.get("ready").and_then(Value::as_bool).unwrap_or(false);
                let player = self
                    .players
                    .iter_mut()
                    .find(|p| p.account_id == account_id)
                    .ok_or_else(|| {
                        Error::inconsistent_message("ready state of a stranger", message.clone())
                    })?;
                player.is_ready = ready;
                Ok(true)
            }
            _ => Err(Error::inconsistent_message("unexpected message in room", message.clone())),
        }
    }
}

/// Friendly room hosted by the controlled account
#[derive(Debug)]
pub struct RoomHost {
    pub(crate) base: PresentationBase,
    info: RoomInfo,
}

impl RoomHost {
    pub async fn wait(session: &mut Session, deadline: Instant) -> Result<()> {
        session.screen().wait_for(MARKER, deadline).await
    }

    /// Detect a freshly created room and read it from the `createRoom` exchange
    pub async fn create(session: &mut Session, deadline: Instant) -> Result<Self> {
        let shot = session.screen().detect("room", &[MARKER])?;
        let idle = session.timeouts().drain_idle;
        let message = loop {
            let now = Instant::now();
            if now >= deadline {
                return Err(Error::timeout("waiting for createRoom").with_snapshot(shot));
            }
            match session.channel().dequeue_until((now + idle).min(deadline)).await? {
                Some(m) if m.is(names::CREATE_ROOM) => break m,
                Some(m) => tracing::debug!(name = %m.name, "skipped before room creation"),
                None if Instant::now() >= deadline => {}
                None => {
                    return Err(Error::inconsistent("createRoom not found").with_snapshot(shot));
                }
            }
        };
        let info = RoomInfo::from_create_room(&message).map_err(|e| e.with_snapshot(shot))?;
        tracing::info!(room_id = info.room_id, max_players = info.max_players, "room created");
        Ok(Self { base: PresentationBase::new("room_host"), info })
    }

    /// Back in the room after a match started from `origin`.
    ///
    /// Lobby chatter queued on the way is consumed until the feed goes quiet.
    pub(crate) async fn return_from_match(
        session: &mut Session,
        origin: RoomInfo,
        deadline: Instant,
    ) -> Result<Self> {
        Self::wait(session, deadline).await?;
        let idle = session.timeouts().drain_idle;
        loop {
            let now = Instant::now();
            if now >= deadline {
                return Err(session.annotate(Error::timeout("settling back into the room")));
            }
            let Some(message) = session.channel().dequeue_until((now + idle).min(deadline)).await? else {
                break;
            };
            match message.name.as_str() {
                names::HEARTBEAT
                | names::CHECK_NETWORK_DELAY
                | names::FETCH_ACCOUNT_INFO
                | names::FETCH_ROOM => continue,
                _ => {
                    let err = Error::inconsistent_message("unexpected message on return", message);
                    return Err(session.annotate(err));
                }
            }
        }
        tracing::info!(room_id = origin.room_id, "returned to room");
        Ok(Self { base: PresentationBase::new("room_host"), info: origin })
    }

    pub fn take_successor(&mut self) -> Option<Presentation> {
        self.base.take_successor()
    }

    pub fn info(&self) -> Result<&RoomInfo> {
        self.base.ensure_fresh()?;
        Ok(&self.info)
    }

    pub fn room_id(&self) -> Result<u64> {
        self.info().map(|i| i.room_id)
    }

    pub fn max_players(&self) -> Result<usize> {
        self.info().map(|i| i.max_players)
    }

    pub fn players(&self) -> Result<&[RoomPlayer]> {
        self.info().map(|i| i.players.as_slice())
    }

    pub fn num_cpus(&self) -> Result<usize> {
        self.info().map(|i| i.num_cpus)
    }

    /// Apply at most one room notification arriving within `timeout`
    pub async fn update(&mut self, session: &mut Session, timeout: Duration) -> Result<bool> {
        self.base.ensure_fresh()?;
        match session.channel().dequeue(timeout).await? {
            Some(message) => self.info.update(&message),
            None => Ok(false),
        }
    }

    /// Add a CPU seat and wait until the server counts it
    pub async fn add_cpu(&mut self, session: &mut Session) -> Result<()> {
        self.base.ensure_fresh()?;
        let deadline = Instant::now() + session.timeouts().add_cpu;
        let shot = session.screenshot()?;
        if !session.screen().matches(&shot, ADD_CPU)? {
            return Err(Error::invalid_operation("cannot add a CPU").with_snapshot(shot));
        }

        let before = self.info.num_cpus;
        session.screen().click_template(ADD_CPU)?;
        // the click effect hides the button from template matching for a while
        tokio::time::sleep(session.timeouts().add_cpu_settle).await;

        while self.info.num_cpus <= before {
            let now = Instant::now();
            if now > deadline {
                return Err(session.annotate(Error::timeout("waiting for the CPU to join")));
            }
            self.update(session, deadline - now).await?;
        }
        tracing::info!(num_cpus = self.info.num_cpus, "CPU added");
        Ok(())
    }

    /// Start the match once the start button is enabled
    pub async fn start(&mut self, session: &mut Session) -> Result<()> {
        self.base.ensure_fresh()?;
        let deadline = Instant::now() + session.timeouts().match_start;
        session.screen().wait_for_then_click(START, deadline).await?;

        Match::wait_for_markers(session, deadline).await?;
        let game = Match::new(session, MatchState::new(), Some(self.info.clone()), deadline).await?;
        self.base.set_successor(Presentation::Match(Box::new(game)))
    }

    /// Leave the room for home
    pub async fn leave(&mut self, session: &mut Session) -> Result<()> {
        self.base.ensure_fresh()?;
        let deadline = Instant::now() + session.timeouts().leave_room;
        let shot = session.screenshot()?;
        if !session.screen().matches(&shot, LEAVE)? {
            return Err(Error::invalid_operation("cannot leave the room").with_snapshot(shot));
        }
        session.screen().click_template(LEAVE)?;

        Home::wait(session, deadline).await?;
        let home = Home::detect(session)?;
        self.base.set_successor(Presentation::Home(home))
    }
}
