use tokio::time::Instant;

use crate::client::Session;
use crate::error::{Error, Result};
use crate::presentation::{Home, Presentation, PresentationBase};
use crate::screen::layout::{AUTH_CODE_FIELD, MAIL_ADDRESS_FIELD, SEND_CODE_BUTTON};

const MARKER: &str = "auth/marker";
const CONFIRM: &str = "auth/confirm";
const LOGIN: &str = "auth/login";

/// Mail address and one-time code form
#[derive(Debug)]
pub struct Auth {
    pub(crate) base: PresentationBase,
    mail_address: Option<String>,
}

impl Auth {
    pub fn detect(session: &mut Session) -> Result<Self> {
        session.screen().detect("auth", &[MARKER])?;
        Ok(Self::detected())
    }

    pub(crate) fn detected() -> Self {
        Self { base: PresentationBase::new("auth"), mail_address: None }
    }

    pub fn take_successor(&mut self) -> Option<Presentation> {
        self.base.take_successor()
    }

    /// Address entered so far
    pub fn mail_address(&self) -> Result<&str> {
        self.base.ensure_fresh()?;
        self.mail_address
            .as_deref()
            .ok_or_else(|| Error::invalid_operation("mail address not entered yet"))
    }

    /// Fill in the address and request a code. Allowed once.
    pub async fn enter_mail_address(&mut self, session: &mut Session, address: &str) -> Result<()> {
        self.base.ensure_fresh()?;
        if self.mail_address.is_some() {
            let err = Error::invalid_operation("mail address already entered");
            return Err(session.annotate(err));
        }
        let deadline = Instant::now() + session.timeouts().mail_address;

        let screen = session.screen();
        screen.click_region(MAIL_ADDRESS_FIELD, false)?;
        screen.press_hotkey(&["ctrl", "a"])?;
        screen.press_hotkey(&["backspace"])?;
        screen.write(address)?;
        self.mail_address = Some(address.to_string());

        screen.click_region(SEND_CODE_BUTTON, false)?;
        screen.wait_for_then_click(CONFIRM, deadline).await?;
        tracing::info!(address, "auth code requested");
        Ok(())
    }

    /// Submit the code from the mail and wait for home
    pub async fn enter_auth_code(&mut self, session: &mut Session, code: &str) -> Result<()> {
        self.base.ensure_fresh()?;
        if self.mail_address.is_none() {
            let err = Error::invalid_operation("mail address not entered yet");
            return Err(session.annotate(err));
        }
        let deadline = Instant::now() + session.timeouts().auth_code;

        let screen = session.screen();
        screen.click_region(AUTH_CODE_FIELD, false)?;
        screen.press_hotkey(&["ctrl", "a"])?;
        screen.press_hotkey(&["backspace"])?;
        screen.write(code)?;
        screen.wait_for_then_click(LOGIN, deadline).await?;

        let deadline = Instant::now() + session.timeouts().home;
        Home::wait(session, deadline).await?;
        let home = Home::detect(session)?;
        self.base.set_successor(Presentation::Home(home))
    }
}
