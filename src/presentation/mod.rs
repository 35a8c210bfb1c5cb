//! Screens of the client as a transition graph.
//!
//! Exactly one presentation is live at a time. An action that moves the
//! client elsewhere installs the next presentation as the successor of the
//! current one, which turns stale: from then on every call into it fails
//! with [`Error::StalePresentation`] and the only thing left to do with it
//! is [`take_successor`](PresentationBase::take_successor).

pub mod auth;
pub mod game;
pub mod home;
pub mod login;
pub mod room;

use crate::error::{Error, Result};

pub use auth::Auth;
pub use game::Match;
pub use home::Home;
pub use login::Login;
pub use room::{RoomHost, RoomInfo, RoomPlayer};

/// The live presentation
#[derive(Debug)]
pub enum Presentation {
    Login(Login),
    Auth(Auth),
    Home(Home),
    RoomHost(RoomHost),
    Match(Box<Match>),
}

impl Presentation {
    pub fn name(&self) -> &'static str {
        self.base().name()
    }

    pub fn is_stale(&self) -> bool {
        self.base().is_stale()
    }

    fn base(&self) -> &PresentationBase {
        match self {
            Self::Login(p) => &p.base,
            Self::Auth(p) => &p.base,
            Self::Home(p) => &p.base,
            Self::RoomHost(p) => &p.base,
            Self::Match(p) => &p.base,
        }
    }

    fn base_mut(&mut self) -> &mut PresentationBase {
        match self {
            Self::Login(p) => &mut p.base,
            Self::Auth(p) => &mut p.base,
            Self::Home(p) => &mut p.base,
            Self::RoomHost(p) => &mut p.base,
            Self::Match(p) => &mut p.base,
        }
    }

    /// Hand off the presentation that superseded this one
    pub fn take_successor(&mut self) -> Option<Presentation> {
        self.base_mut().take_successor()
    }
}

/// Staleness and successor bookkeeping shared by every presentation
#[derive(Debug)]
pub struct PresentationBase {
    name: &'static str,
    stale: bool,
    successor: Option<Box<Presentation>>,
}

impl PresentationBase {
    pub fn new(name: &'static str) -> Self {
        Self { name, stale: false, successor: None }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub fn ensure_fresh(&self) -> Result<()> {
        if self.stale {
            return Err(Error::StalePresentation { presentation: self.name });
        }
        Ok(())
    }

    /// Install the next presentation and go stale
    pub fn set_successor(&mut self, next: Presentation) -> Result<()> {
        self.ensure_fresh()?;
        tracing::info!(from = self.name, to = next.name(), "presentation changed");
        self.stale = true;
        self.successor = Some(Box::new(next));
        Ok(())
    }

    /// The successor, once; stays stale afterwards
    pub fn take_successor(&mut self) -> Option<Presentation> {
        self.successor.take().map(|p| *p)
    }
}

/// Outcome of a detection attempt: `None` when the presentation is not on screen
pub(crate) fn if_detected<T>(result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(p) => Ok(Some(p)),
        Err(e) if e.is_not_detected() => Ok(None),
        Err(e) => Err(e),
    }
}
