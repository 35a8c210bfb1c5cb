pub mod event;
pub mod match_state;
pub mod operation;
pub mod round;
pub mod tile;

pub use event::{
    AnGangAddGang, ChiPengGang, DealTile, DiscardTile, Hule, HuleInfo, LiqiSettlement, LiuJu,
    NewRound, NoTile,
};
pub use match_state::{MatchPlayer, MatchState};
pub use operation::{Decision, Operation, OperationKind, OperationListWire, OperationSet};
pub use round::{AbortiveDraw, Discard, Meld, MeldKind, RoundOutcome, RoundState, SeatFlags};
pub use tile::{parse_combination, Suit, Tile};
