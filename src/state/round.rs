use bitflags::bitflags;

use crate::error::{Error, Result};
use crate::protocol::{ActionEvent, ActionKind};
use crate::state::event::{
    AnGangAddGang, ChiPengGang, DealTile, DiscardTile, Hule, LiqiSettlement, LiuJu, NewRound,
    NoTile,
};
use crate::state::operation::OperationSet;
use crate::state::tile::{Suit, Tile};

bitflags! {
    /// Per-seat round flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SeatFlags: u8 {
        /// Riichi declared
        const LIQI = 0x01;
        /// Double riichi declared
        const WLIQI = 0x02;
        /// No discard made yet and no call interrupted the first turn
        const FIRST_DRAW = 0x04;
        /// Ippatsu still possible
        const YIFA = 0x08;
        /// Next draw is the replacement draw after a kan
        const LINGSHANG = 0x10;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Discard {
    pub tile: Tile,
    /// Discarded straight from the draw
    pub moqie: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeldKind {
    Chi,
    Peng,
    Daminggang,
    Angang,
    Jiagang,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Meld {
    pub kind: MeldKind,
    /// Seat the claimed tile came from, `None` for concealed kans
    pub from: Option<usize>,
    /// Index of the claimed tile in the source discard pile
    pub he_index: Option<usize>,
    pub tiles: Vec<Tile>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortiveDraw {
    /// Nine different terminals and honors, declared by `seat`
    NineTerminals { seat: usize },
    Other { code: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundOutcome {
    Hule {
        winners: Vec<usize>,
        old_scores: Vec<i32>,
        delta_scores: Vec<i32>,
        scores: Vec<i32>,
    },
    NoTile {
        liujumanguan: bool,
    },
    LiuJu(AbortiveDraw),
}

/// Live state of one round, rebuilt from the ordered action stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundState {
    seat: usize,
    chang: u8,
    ju: u8,
    ben: u32,
    liqibang: u32,
    dora_indicators: Vec<Tile>,
    left_tile_count: u32,
    scores: Vec<i32>,
    shoupai: Vec<Tile>,
    zimopai: Option<Tile>,
    he: Vec<Vec<Discard>>,
    fulu: Vec<Vec<Meld>>,
    flags: Vec<SeatFlags>,
    prev_dapai: Option<(usize, Tile)>,
    outcome: Option<RoundOutcome>,
}

fn broken(detail: impl Into<String>) -> Error {
    Error::inconsistent(detail)
}

impl RoundState {
    pub fn new(seat: usize, ev: &NewRound) -> Result<Self> {
        let players = ev.scores.len();
        if !(3..=4).contains(&players) {
            return Err(broken(format!("{players} scores in new round")));
        }
        if seat >= players {
            return Err(broken(format!("own seat {seat} outside {players} players")));
        }
        if !(13..=14).contains(&ev.tiles.len()) {
            return Err(broken(format!("{} tiles dealt", ev.tiles.len())));
        }

        let mut shoupai = ev.tiles.clone();
        let zimopai = if shoupai.len() == 14 { shoupai.pop() } else { None };

        Ok(Self {
            seat,
            chang: ev.chang,
            ju: ev.ju,
            ben: ev.ben,
            liqibang: ev.liqibang,
            dora_indicators: ev.doras.clone(),
            left_tile_count: ev.left_tile_count,
            scores: ev.scores.clone(),
            shoupai,
            zimopai,
            he: vec![Vec::new(); players],
            fulu: vec![Vec::new(); players],
            flags: vec![SeatFlags::FIRST_DRAW; players],
            prev_dapai: None,
            outcome: None,
        })
    }

    /// Apply one in-round action, returning the decision set it offers
    pub fn apply(&mut self, action: &ActionEvent) -> Result<Option<OperationSet>> {
        if self.outcome.is_some() {
            return Err(broken(format!("{} after the round ended", action.kind.name())));
        }
        match action.kind {
            ActionKind::DealTile => {
                let ev: DealTile = action.parse()?;
                self.on_zimo(&ev)?;
                OperationSet::from_wire(ev.operation.as_ref())
            }
            ActionKind::DiscardTile => {
                let ev: DiscardTile = action.parse()?;
                self.on_dapai(&ev)?;
                OperationSet::from_wire(ev.operation.as_ref())
            }
            ActionKind::ChiPengGang => {
                let ev: ChiPengGang = action.parse()?;
                self.on_chipenggang(&ev)?;
                OperationSet::from_wire(ev.operation.as_ref())
            }
            ActionKind::AnGangAddGang => {
                let ev: AnGangAddGang = action.parse()?;
                self.on_angang_jiagang(&ev)?;
                OperationSet::from_wire(ev.operation.as_ref())
            }
            ActionKind::Hule => {
                self.on_hule(&action.parse()?);
                Ok(None)
            }
            ActionKind::NoTile => {
                self.on_no_tile(&action.parse()?);
                Ok(None)
            }
            ActionKind::LiuJu => {
                self.on_liuju(&action.parse()?)?;
                Ok(None)
            }
            ActionKind::MJStart | ActionKind::NewRound => Err(broken(format!(
                "{} in the middle of a round (step {})",
                action.kind.name(),
                action.step
            ))),
        }
    }

    fn check_seat(&self, seat: usize) -> Result<()> {
        if seat >= self.he.len() {
            return Err(broken(format!("seat {seat} out of range")));
        }
        Ok(())
    }

    fn settle_liqi(&mut self, liqi: Option<&LiqiSettlement>) -> Result<()> {
        if let Some(liqi) = liqi {
            self.check_seat(liqi.seat)?;
            self.scores[liqi.seat] = liqi.score;
            self.liqibang += 1;
        }
        Ok(())
    }

    fn update_doras(&mut self, doras: &[Tile]) {
        if !doras.is_empty() {
            self.dora_indicators = doras.to_vec();
        }
    }

    /// Merge the drawn tile into the hand in canonical order
    fn hand_in(&mut self) {
        if let Some(tile) = self.zimopai.take() {
            self.shoupai.push(tile);
            self.shoupai.sort();
        }
    }

    fn clear_for_all(&mut self, flags: SeatFlags) {
        for f in &mut self.flags {
            f.remove(flags);
        }
    }

    pub fn on_zimo(&mut self, ev: &DealTile) -> Result<()> {
        self.check_seat(ev.seat)?;
        if ev.seat == self.seat {
            if self.zimopai.is_some() {
                return Err(broken("drew a tile while holding one"));
            }
            let tile = ev.tile.ok_or_else(|| broken("own draw without a tile"))?;
            self.zimopai = Some(tile);
        } else {
            if let Some(tile) = ev.tile {
                return Err(broken(format!("seat {} draw exposed tile {tile}", ev.seat)));
            }
            if ev.operation.as_ref().is_some_and(|op| !op.operation_list.is_empty()) {
                return Err(broken(format!("operations offered on seat {} draw", ev.seat)));
            }
        }

        self.update_doras(&ev.doras);
        self.left_tile_count = ev.left_tile_count;
        self.settle_liqi(ev.liqi.as_ref())?;
        self.prev_dapai = None;
        Ok(())
    }

    pub fn on_dapai(&mut self, ev: &DiscardTile) -> Result<()> {
        self.check_seat(ev.seat)?;
        if self.prev_dapai.is_some() {
            return Err(broken("discard while another discard is unresolved"));
        }

        if ev.seat == self.seat {
            if ev.moqie {
                if self.zimopai != Some(ev.tile) {
                    return Err(broken(format!(
                        "tsumogiri of {} but drawn tile is {:?}",
                        ev.tile, self.zimopai
                    )));
                }
                self.zimopai = None;
            } else {
                let index = self
                    .shoupai
                    .iter()
                    .position(|t| *t == ev.tile)
                    .ok_or_else(|| broken(format!("discarded {} not in hand", ev.tile)))?;
                self.shoupai.remove(index);
                self.hand_in();
            }
        }

        self.update_doras(&ev.doras);
        self.he[ev.seat].push(Discard { tile: ev.tile, moqie: ev.moqie });

        let flags = &mut self.flags[ev.seat];
        if ev.is_liqi {
            flags.insert(SeatFlags::LIQI | SeatFlags::YIFA);
        } else if ev.is_wliqi {
            flags.insert(SeatFlags::WLIQI | SeatFlags::YIFA);
        } else {
            flags.remove(SeatFlags::YIFA);
        }
        flags.remove(SeatFlags::FIRST_DRAW | SeatFlags::LINGSHANG);

        self.prev_dapai = Some((ev.seat, ev.tile));
        Ok(())
    }

    pub fn on_chipenggang(&mut self, ev: &ChiPengGang) -> Result<()> {
        self.check_seat(ev.seat)?;
        let (dapai_seat, _) = self.prev_dapai.ok_or_else(|| broken("call without a discard"))?;
        if dapai_seat == ev.seat {
            return Err(broken("seat called its own discard"));
        }
        if self.zimopai.is_some() {
            return Err(broken("call while holding a drawn tile"));
        }
        if ev.tiles.len() != ev.froms.len() {
            return Err(broken("call tiles and sources differ in length"));
        }
        let kind = match ev.kind {
            0 => MeldKind::Chi,
            1 => MeldKind::Peng,
            2 => MeldKind::Daminggang,
            other => return Err(broken(format!("unknown call type {other}"))),
        };

        if ev.seat == self.seat {
            for (tile, from) in ev.tiles.iter().zip(&ev.froms) {
                if *from != ev.seat {
                    continue;
                }
                let index = self
                    .shoupai
                    .iter()
                    .position(|t| t == tile)
                    .ok_or_else(|| broken(format!("called with {tile} not in hand")))?;
                self.shoupai.remove(index);
            }
        }

        let from = ev
            .froms
            .iter()
            .copied()
            .find(|f| *f != ev.seat)
            .ok_or_else(|| broken("call without a claimed tile"))?;
        self.check_seat(from)?;
        let he_index = self.he[from]
            .len()
            .checked_sub(1)
            .ok_or_else(|| broken(format!("claimed from empty pile of seat {from}")))?;
        self.fulu[ev.seat].push(Meld {
            kind,
            from: Some(from),
            he_index: Some(he_index),
            tiles: ev.tiles.clone(),
        });

        self.settle_liqi(ev.liqi.as_ref())?;
        self.clear_for_all(SeatFlags::FIRST_DRAW | SeatFlags::YIFA);
        if kind == MeldKind::Daminggang {
            self.flags[ev.seat].insert(SeatFlags::LINGSHANG);
        }
        self.prev_dapai = None;
        Ok(())
    }

    pub fn on_angang_jiagang(&mut self, ev: &AnGangAddGang) -> Result<()> {
        self.check_seat(ev.seat)?;
        if self.prev_dapai.is_some() {
            return Err(broken("kan while a discard is unresolved"));
        }
        let own = ev.seat == self.seat;
        if own != self.zimopai.is_some() {
            return Err(broken("kan does not follow the kan seat's draw"));
        }
        let (kind, needed) = match ev.kind {
            2 => (MeldKind::Jiagang, 1),
            3 => (MeldKind::Angang, 4),
            other => return Err(broken(format!("unknown kan type {other}"))),
        };

        let mut taken = Vec::new();
        if own {
            self.shoupai.retain(|t| {
                if t.same_kind(&ev.tiles) {
                    taken.push(*t);
                    false
                } else {
                    true
                }
            });
            if taken.len() + 1 == needed {
                match self.zimopai {
                    Some(t) if t.same_kind(&ev.tiles) => {
                        taken.push(t);
                        self.zimopai = None;
                    }
                    _ => return Err(broken("kan tile missing from hand and draw")),
                }
            }
            if taken.len() != needed {
                return Err(broken(format!("kan of {} found {} tiles", ev.tiles, taken.len())));
            }
            self.hand_in();
        }

        match kind {
            MeldKind::Jiagang => {
                let added = taken.first().copied().unwrap_or(ev.tiles);
                let meld = self.fulu[ev.seat]
                    .iter_mut()
                    .find(|m| m.kind == MeldKind::Peng && m.tiles.iter().all(|t| t.same_kind(&ev.tiles)))
                    .ok_or_else(|| broken(format!("added kan of {} without a pon", ev.tiles)))?;
                meld.kind = MeldKind::Jiagang;
                meld.tiles.push(added);
            }
            _ => {
                let mut tiles = if own { taken } else { concealed_kan_tiles(ev.tiles) };
                tiles.sort();
                self.fulu[ev.seat].push(Meld { kind, from: None, he_index: None, tiles });
            }
        }

        self.update_doras(&ev.doras);
        self.clear_for_all(SeatFlags::FIRST_DRAW | SeatFlags::YIFA);
        self.flags[ev.seat].insert(SeatFlags::LINGSHANG);
        // robbing the kan counts the kan tile as a discard
        self.prev_dapai = Some((ev.seat, ev.tiles));
        Ok(())
    }

    pub fn on_hule(&mut self, ev: &Hule) {
        if !ev.scores.is_empty() {
            self.scores = ev.scores.clone();
        }
        self.outcome = Some(RoundOutcome::Hule {
            winners: ev.hules.iter().map(|h| h.seat).collect(),
            old_scores: ev.old_scores.clone(),
            delta_scores: ev.delta_scores.clone(),
            scores: ev.scores.clone(),
        });
    }

    pub fn on_no_tile(&mut self, ev: &NoTile) {
        self.outcome = Some(RoundOutcome::NoTile { liujumanguan: ev.liujumanguan });
    }

    pub fn on_liuju(&mut self, ev: &LiuJu) -> Result<()> {
        let draw = match (ev.kind, ev.seat) {
            (1, Some(seat)) => {
                self.check_seat(seat)?;
                AbortiveDraw::NineTerminals { seat }
            }
            (1, None) => return Err(broken("nine terminals draw without a seat")),
            (code, _) => AbortiveDraw::Other { code },
        };
        self.outcome = Some(RoundOutcome::LiuJu(draw));
        Ok(())
    }

    pub fn seat(&self) -> usize {
        self.seat
    }

    pub fn player_count(&self) -> usize {
        self.he.len()
    }

    /// Prevailing wind, 0 east
    pub fn chang(&self) -> u8 {
        self.chang
    }

    /// Dealer seat index within the wind
    pub fn ju(&self) -> u8 {
        self.ju
    }

    pub fn ben(&self) -> u32 {
        self.ben
    }

    pub fn liqibang(&self) -> u32 {
        self.liqibang
    }

    pub fn dora_indicators(&self) -> &[Tile] {
        &self.dora_indicators
    }

    pub fn left_tile_count(&self) -> u32 {
        self.left_tile_count
    }

    pub fn scores(&self) -> &[i32] {
        &self.scores
    }

    pub fn shoupai(&self) -> &[Tile] {
        &self.shoupai
    }

    pub fn zimopai(&self) -> Option<Tile> {
        self.zimopai
    }

    pub fn he(&self) -> &[Vec<Discard>] {
        &self.he
    }

    pub fn fulu(&self) -> &[Vec<Meld>] {
        &self.fulu
    }

    pub fn flags(&self, seat: usize) -> SeatFlags {
        self.flags.get(seat).copied().unwrap_or_default()
    }

    pub fn prev_dapai(&self) -> Option<(usize, Tile)> {
        self.prev_dapai
    }

    pub fn outcome(&self) -> Option<&RoundOutcome> {
        self.outcome.as_ref()
    }

    /// `chang-ju-ben`, as used by the restore request
    pub fn round_id(&self) -> String {
        format!("{}-{}-{}", self.chang, self.ju, self.ben)
    }

    pub fn is_dealer(&self) -> bool {
        usize::from(self.ju) == self.seat
    }
}

/// Face-down tiles of another seat's concealed kan; fives include one red
fn concealed_kan_tiles(tile: Tile) -> Vec<Tile> {
    let plain = tile.plain();
    match Tile::red_five(plain.suit()) {
        Some(red) if plain.rank() == 5 && plain.suit() != Suit::Honor => vec![red, plain, plain, plain],
        _ => vec![plain; 4],
    }
}
