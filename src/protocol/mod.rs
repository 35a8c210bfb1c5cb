pub mod action;
pub mod channel;
pub mod decoder;
pub mod message;
pub mod names;
pub mod reorder;

pub use action::{decode_action, ActionEvent, ActionKind};
pub use channel::{FrameSender, MessageChannel};
pub use decoder::{AccountIdCell, FrameDecoder};
pub use message::{CapturedExchange, DecodedMessage, Direction, RawFrame};
pub use reorder::realign_steps;
