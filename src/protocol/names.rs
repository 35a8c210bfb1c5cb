//! Well-known message names.

pub const ACTION_PROTOTYPE: &str = ".lq.ActionPrototype";

// Lobby
pub const HEARTBEAT: &str = ".lq.Lobby.heatbeat";
pub const LOGIN_BEAT: &str = ".lq.Lobby.loginBeat";
pub const OAUTH2_LOGIN: &str = ".lq.Lobby.oauth2Login";
pub const CREATE_ROOM: &str = ".lq.Lobby.createRoom";
pub const MODIFY_ROOM: &str = ".lq.Lobby.modifyRoom";
pub const START_ROOM: &str = ".lq.Lobby.startRoom";
pub const FETCH_ROOM: &str = ".lq.Lobby.fetchRoom";
pub const FETCH_ACCOUNT_INFO: &str = ".lq.Lobby.fetchAccountInfo";

// Game server
pub const AUTH_GAME: &str = ".lq.FastTest.authGame";
pub const ENTER_GAME: &str = ".lq.FastTest.enterGame";
pub const SYNC_GAME: &str = ".lq.FastTest.syncGame";
pub const CHECK_NETWORK_DELAY: &str = ".lq.FastTest.checkNetworkDelay";
pub const FETCH_GAME_PLAYER_STATE: &str = ".lq.FastTest.fetchGamePlayerState";
pub const INPUT_OPERATION: &str = ".lq.FastTest.inputOperation";
pub const INPUT_CHI_PENG_GANG: &str = ".lq.FastTest.inputChiPengGang";
pub const CONFIRM_NEW_ROUND: &str = ".lq.FastTest.confirmNewRound";

// Notifications
pub const NOTIFY_ROOM_PLAYER_UPDATE: &str = ".lq.NotifyRoomPlayerUpdate";
pub const NOTIFY_ROOM_PLAYER_READY: &str = ".lq.NotifyRoomPlayerReady";
pub const NOTIFY_ROOM_GAME_START: &str = ".lq.NotifyRoomGameStart";
pub const NOTIFY_PLAYER_LOAD_GAME_READY: &str = ".lq.NotifyPlayerLoadGameReady";
pub const NOTIFY_GAME_END_RESULT: &str = ".lq.NotifyGameEndResult";
pub const NOTIFY_GAME_FINISH_REWARD: &str = ".lq.NotifyGameFinishReward";
pub const NOTIFY_ACTIVITY_REWARD: &str = ".lq.NotifyActivityReward";
pub const NOTIFY_ACTIVITY_POINT: &str = ".lq.NotifyActivityPoint";
pub const NOTIFY_LEADERBOARD_POINT: &str = ".lq.NotifyLeaderboardPoint";
pub const NOTIFY_ACCOUNT_UPDATE: &str = ".lq.NotifyAccountUpdate";
pub const NOTIFY_ACTIVITY_CHANGE: &str = ".lq.NotifyActivityChange";
pub const NOTIFY_PLAYER_CONNECTION_STATE: &str = ".lq.NotifyPlayerConnectionState";
pub const NOTIFY_GAME_BROADCAST: &str = ".lq.NotifyGameBroadcast";
pub const PLAYER_LEAVING: &str = ".lq.PlayerLeaving";

/// Notifications sent when the daily reset passes or the shop rotates.
/// They carry nothing the automation acts on.
pub const INFORMATIONAL: &[&str] = &[
    ".lq.NotifyReviveCoinUpdate",
    ".lq.NotifyGiftSendRefresh",
    ".lq.NotifyDailyTaskUpdate",
    ".lq.NotifyShopUpdate",
    ".lq.NotifyAccountChallengeTaskUpdate",
    NOTIFY_ACCOUNT_UPDATE,
    NOTIFY_ACTIVITY_CHANGE,
    ".lq.NotifyAnnouncementUpdate",
];

/// Responses whose field path holds the controlled account id
pub const ACCOUNT_ID_FIELDS: &[(&str, &[&str])] = &[
    (OAUTH2_LOGIN, &["account_id"]),
    (CREATE_ROOM, &["room", "owner_id"]),
];
