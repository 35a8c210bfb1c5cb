//! Mahjong Soul RPA
//!
//! Drives the Mahjong Soul web client through a browser while decoding
//! its WebSocket traffic, so every screen action can be confirmed by the
//! messages it produces.

pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod presentation;
pub mod protocol;
pub mod screen;
pub mod state;

#[cfg(test)]
pub mod testing;

pub use client::{Session, SessionBuilder};
pub use config::{RpaConfig, Timeouts};
pub use error::{Error, Result};
pub use presentation::{Auth, Home, Login, Match, Presentation, RoomHost, RoomInfo, RoomPlayer};
pub use protocol::{ActionEvent, ActionKind, CapturedExchange, DecodedMessage, Direction, FrameSender, RawFrame};
pub use screen::{Browser, Region, Snapshot, VisualMatcher};
pub use state::{Decision, MatchState, Operation, OperationKind, OperationSet, RoundState, Tile};
