//! Table setups for match tests.

use std::time::Duration;

use serde_json::{json, Value};
use tokio::time::Instant;

use crate::client::Session;
use crate::presentation::{Match, RoomInfo, RoomPlayer};
use crate::protocol::{names, Direction, FrameSender, RawFrame};
use crate::state::MatchState;
use crate::testing::{self, feed, FakeBrowser};

pub const ME: u64 = 42;
pub const UUID: &str = "240101-0000-test";
pub const HAND13: [&str; 13] =
    ["1m", "2m", "3m", "4m", "5m", "6m", "7m", "8m", "9m", "1p", "2p", "3p", "4p"];

pub fn dealer_hand() -> Vec<&'static str> {
    let mut hand = HAND13.to_vec();
    hand.push("5s");
    hand
}

pub fn ops(list: Value) -> Value {
    json!({"time_fixed": 5000, "time_add": 20000, "operation_list": list})
}

pub fn new_round(step: u32, ju: u8, tiles: &[&str], operation: Value) -> RawFrame {
    testing::action(step, "ActionNewRound", json!({
        "chang": 0,
        "ju": ju,
        "ben": 0,
        "liqibang": 0,
        "doras": ["1z"],
        "left_tile_count": 69,
        "scores": [25000, 25000, 25000, 25000],
        "tiles": tiles,
        "operation": operation,
    }))
}

pub fn discard(step: u32, seat: usize, tile: &str, moqie: bool, operation: Value) -> RawFrame {
    testing::action(step, "ActionDiscardTile", json!({
        "seat": seat,
        "tile": tile,
        "moqie": moqie,
        "operation": operation,
    }))
}

pub fn origin() -> RoomInfo {
    RoomInfo {
        room_id: 777,
        max_players: 4,
        players: vec![RoomPlayer {
            account_id: ME,
            name: "me".into(),
            is_host: true,
            is_ready: true,
        }],
        num_cpus: 3,
    }
}

/// Log in so the channel knows the own account id
pub async fn login(tx: &FrameSender, session: &mut Session) {
    feed(
        tx,
        testing::exchange(
            Direction::Outbound,
            1,
            names::OAUTH2_LOGIN,
            json!({"reconnect": false}),
            json!({"account_id": ME}),
        ),
    )
    .await;
    session.channel().dequeue(Duration::from_secs(1)).await.unwrap().unwrap();
    assert_eq!(session.account_id(), Some(ME));
}

/// Messages from the room start up to `ActionMJStart`, with the own
/// account at `seat` and CPUs elsewhere
pub fn opening(seat: usize) -> Vec<RawFrame> {
    let mut seat_list = vec![0u64; 4];
    seat_list[seat] = ME;
    let mut frames = vec![
        testing::notify(names::NOTIFY_ROOM_GAME_START, json!({"game_uuid": UUID})),
        testing::notify(names::NOTIFY_PLAYER_LOAD_GAME_READY, json!({})),
    ];
    frames.extend(testing::exchange(
        Direction::Outbound,
        2,
        names::AUTH_GAME,
        json!({"game_uuid": UUID}),
        json!({
            "seat_list": seat_list,
            "players": [{
                "account_id": ME,
                "nickname": "me",
                "level": {"id": 10301},
                "level3": {"id": 20101},
                "character": {"charid": 200001},
            }],
        }),
    ));
    frames.extend(testing::exchange(Direction::Outbound, 3, names::ENTER_GAME, json!({}), json!({})));
    frames.push(testing::notify(names::HEARTBEAT, json!({})));
    frames.push(testing::action(0, "ActionMJStart", json!({})));
    frames
}

pub struct Table {
    pub tx: FrameSender,
    pub session: Session,
    pub browser: FakeBrowser,
    pub game: Match,
}

/// A match dealt with `deal` as its first round
pub async fn start(
    scenes: &[&[&str]],
    seat: usize,
    deal: RawFrame,
    origin: Option<RoomInfo>,
) -> Table {
    let (tx, mut session, browser) = testing::session(scenes);
    login(&tx, &mut session).await;
    feed(&tx, opening(seat)).await;
    feed(&tx, [deal]).await;
    let deadline = Instant::now() + Duration::from_secs(10);
    let game = Match::new(&mut session, MatchState::new(), origin, deadline).await.unwrap();
    Table { tx, session, browser, game }
}
