use serde_json::Value;

use crate::error::{Error, Result};

/// Level id shown for CPU opponents
pub const CPU_LEVEL: u32 = 10101;
/// Character id shown for CPU opponents
pub const CPU_CHARACTER: u32 = 200001;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchPlayer {
    /// Zero for CPU seats
    pub account_id: u64,
    pub name: String,
    pub level4: u32,
    pub level3: u32,
    pub character: u32,
}

impl MatchPlayer {
    pub fn cpu() -> Self {
        Self {
            account_id: 0,
            name: "CPU".into(),
            level4: CPU_LEVEL,
            level3: CPU_LEVEL,
            character: CPU_CHARACTER,
        }
    }

    pub fn is_cpu(&self) -> bool {
        self.account_id == 0
    }

    fn from_value(player: &Value) -> Result<Self> {
        let id_at = |path: &[&str]| {
            path.iter()
                .try_fold(player, |v, k| v.get(*k))
                .and_then(Value::as_u64)
                .unwrap_or_default()
        };
        let account_id = player
            .get("account_id")
            .and_then(Value::as_u64)
            .ok_or_else(|| Error::inconsistent("player entry without account_id"))?;
        Ok(Self {
            account_id,
            name: player.get("nickname").and_then(Value::as_str).unwrap_or_default().to_string(),
            level4: id_at(&["level", "id"]) as u32,
            level3: id_at(&["level3", "id"]) as u32,
            character: id_at(&["character", "charid"]) as u32,
        })
    }
}

/// Facts fixed for a whole match. Every field is set at most once.
#[derive(Debug, Clone, Default)]
pub struct MatchState {
    uuid: Option<String>,
    seat: Option<usize>,
    players: Vec<MatchPlayer>,
}

impl MatchState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn uuid(&self) -> Option<&str> {
        self.uuid.as_deref()
    }

    pub fn seat(&self) -> Option<usize> {
        self.seat
    }

    pub fn players(&self) -> &[MatchPlayer] {
        &self.players
    }

    /// Set the game uuid; repeating the same value is allowed
    pub fn set_uuid(&mut self, uuid: &str) -> Result<()> {
        match &self.uuid {
            None => {
                self.uuid = Some(uuid.to_string());
                Ok(())
            }
            Some(old) if old == uuid => Ok(()),
            Some(old) => Err(Error::inconsistent(format!(
                "game uuid changed from {old} to {uuid}"
            ))),
        }
    }

    pub fn set_seat(&mut self, seat: usize) -> Result<()> {
        if let Some(old) = self.seat {
            return Err(Error::inconsistent(format!("seat already set to {old}")));
        }
        self.seat = Some(seat);
        Ok(())
    }

    pub fn set_players(&mut self, players: Vec<MatchPlayer>) -> Result<()> {
        if !self.players.is_empty() {
            return Err(Error::inconsistent("players already set"));
        }
        self.players = players;
        Ok(())
    }

    /// Fill seats and players from an `authGame` response.
    ///
    /// `seat_list` holds one account id per seat, 0 for CPUs.
    pub fn apply_auth_game(&mut self, response: &Value, account_id: Option<u64>) -> Result<()> {
        let seat_list = response
            .get("seat_list")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::inconsistent("authGame without seat_list"))?;
        let known = response
            .get("players")
            .and_then(Value::as_array)
            .map(|ps| ps.iter().map(MatchPlayer::from_value).collect::<Result<Vec<_>>>())
            .transpose()?
            .unwrap_or_default();

        let mut players = Vec::with_capacity(seat_list.len());
        for (seat, id) in seat_list.iter().enumerate() {
            let id = id.as_u64().ok_or_else(|| Error::inconsistent("bad seat_list entry"))?;
            if Some(id) == account_id && id != 0 {
                self.set_seat(seat)?;
            }
            if id == 0 {
                players.push(MatchPlayer::cpu());
                continue;
            }
            let player = known
                .iter()
                .find(|p| p.account_id == id)
                .cloned()
                .ok_or_else(|| Error::inconsistent(format!("seat {seat}: unknown account {id}")))?;
            players.push(player);
        }
        self.set_players(players)
    }
}
