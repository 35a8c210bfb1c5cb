//! Typed payloads of in-round actions.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::state::operation::OperationListWire;
use crate::state::tile::Tile;

/// Riichi stick payment attached to the action following a declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct LiqiSettlement {
    pub seat: usize,
    pub score: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewRound {
    pub chang: u8,
    pub ju: u8,
    pub ben: u32,
    pub liqibang: u32,
    pub doras: Vec<Tile>,
    pub left_tile_count: u32,
    pub scores: Vec<i32>,
    /// Own hand, 14 tiles for the dealer
    pub tiles: Vec<Tile>,
    #[serde(default)]
    pub operation: Option<OperationListWire>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DealTile {
    pub seat: usize,
    /// Empty for other seats
    #[serde(deserialize_with = "optional_tile")]
    pub tile: Option<Tile>,
    pub left_tile_count: u32,
    #[serde(default)]
    pub doras: Vec<Tile>,
    #[serde(default)]
    pub liqi: Option<LiqiSettlement>,
    #[serde(default)]
    pub operation: Option<OperationListWire>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscardTile {
    pub seat: usize,
    pub tile: Tile,
    pub moqie: bool,
    #[serde(default)]
    pub is_liqi: bool,
    #[serde(default)]
    pub is_wliqi: bool,
    #[serde(default)]
    pub doras: Vec<Tile>,
    #[serde(default)]
    pub operation: Option<OperationListWire>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChiPengGang {
    pub seat: usize,
    /// 0 chi, 1 pon, 2 open kan
    #[serde(rename = "type")]
    pub kind: u8,
    pub tiles: Vec<Tile>,
    /// Source seat of each entry in `tiles`
    pub froms: Vec<usize>,
    #[serde(default)]
    pub liqi: Option<LiqiSettlement>,
    #[serde(default)]
    pub operation: Option<OperationListWire>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnGangAddGang {
    pub seat: usize,
    /// 2 added kan, 3 concealed kan
    #[serde(rename = "type")]
    pub kind: u8,
    pub tiles: Tile,
    #[serde(default)]
    pub doras: Vec<Tile>,
    #[serde(default)]
    pub operation: Option<OperationListWire>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HuleInfo {
    pub seat: usize,
    #[serde(default)]
    pub zimo: bool,
    #[serde(default)]
    pub qinjia: bool,
    #[serde(default)]
    pub liqi: bool,
    #[serde(default)]
    pub count: u32,
    #[serde(default)]
    pub fu: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Hule {
    pub hules: Vec<HuleInfo>,
    #[serde(default)]
    pub old_scores: Vec<i32>,
    #[serde(default)]
    pub delta_scores: Vec<i32>,
    #[serde(default)]
    pub scores: Vec<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NoTile {
    /// Someone achieved nagashi mangan
    #[serde(default)]
    pub liujumanguan: bool,
    /// Per-seat settlement entries, one result screen each
    #[serde(default)]
    pub scores: Vec<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LiuJu {
    #[serde(rename = "type")]
    pub kind: u32,
    #[serde(default, deserialize_with = "optional_seat")]
    pub seat: Option<usize>,
}

fn optional_tile<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Tile>, D::Error> {
    let s = String::deserialize(d)?;
    if s.is_empty() {
        return Ok(None);
    }
    s.parse().map(Some).map_err(serde::de::Error::custom)
}

fn optional_seat<'de, D: Deserializer<'de>>(d: D) -> Result<Option<usize>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Number(n) => n.as_u64().map(|n| n as usize),
        _ => None,
    })
}
