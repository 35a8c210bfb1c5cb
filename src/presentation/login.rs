use tokio::time::Instant;

use crate::client::Session;
use crate::error::{Error, Result};
use crate::presentation::{if_detected, Auth, Home, Presentation, PresentationBase};

const MARKER: &str = "login/marker";

/// Title screen with the login button
#[derive(Debug)]
pub struct Login {
    pub(crate) base: PresentationBase,
}

impl Login {
    pub fn detect(session: &mut Session) -> Result<Self> {
        session.screen().detect("login", &[MARKER])?;
        Ok(Self { base: PresentationBase::new("login") })
    }

    pub fn take_successor(&mut self) -> Option<Presentation> {
        self.base.take_successor()
    }

    /// Press login and follow to the mail authentication form, or straight
    /// to home when the browser still holds a session.
    pub async fn login(&mut self, session: &mut Session) -> Result<()> {
        self.base.ensure_fresh()?;
        session.screen().click_template(MARKER)?;

        let deadline = Instant::now() + session.timeouts().login;
        loop {
            if Instant::now() > deadline {
                let err = Error::timeout("neither auth nor home appeared after login");
                return Err(session.annotate(err));
            }
            if let Some(auth) = if_detected(Auth::detect(session))? {
                return self.base.set_successor(Presentation::Auth(auth));
            }
            if let Some(home) = if_detected(Home::detect(session))? {
                return self.base.set_successor(Presentation::Home(home));
            }
            session.idle().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, TEMPLATE_HIT};

    #[tokio::test(start_paused = true)]
    async fn test_login_leads_to_auth() {
        let (_tx, mut session, browser) = testing::session(&[&["login/marker"], &["auth/marker"]]);
        let mut login = Login::detect(&mut session).unwrap();
        login.login(&mut session).await.unwrap();
        assert_eq!(browser.clicks(), vec![TEMPLATE_HIT]);
        assert_eq!(login.take_successor().unwrap().name(), "auth");
    }

    #[tokio::test(start_paused = true)]
    async fn test_login_times_out_on_loading_screen() {
        let (_tx, mut session, _) = testing::session(&[&["login/marker"], &[]]);
        let mut login = Login::detect(&mut session).unwrap();
        let err = login.login(&mut session).await.unwrap_err();
        assert!(err.is_timeout());
        assert!(err.snapshot().is_some());
        assert!(!login.base.is_stale());
    }

    #[tokio::test(start_paused = true)]
    async fn test_login_skips_auth_with_saved_session() {
        let (_tx, mut session, _) = testing::session(&[
            &["login/marker"],
            &["home/marker0", "home/marker1", "home/marker2", "home/marker3"],
        ]);
        let mut login = Login::detect(&mut session).unwrap();
        login.login(&mut session).await.unwrap();
        assert!(login.base.is_stale());
        assert_eq!(login.take_successor().unwrap().name(), "home");
        assert!(matches!(login.login(&mut session).await, Err(Error::StalePresentation { .. })));
    }

    #[test]
    fn test_detect_fails_elsewhere() {
        let (_tx, mut session, _) = testing::session(&[&["auth/marker"]]);
        assert!(Login::detect(&mut session).unwrap_err().is_not_detected());
    }
}
