use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::codec::SchemaRegistry;
use crate::config::{RpaConfig, Timeouts};
use crate::error::{Error, Result};
use crate::presentation::{if_detected, Auth, Home, Login, Presentation};
use crate::protocol::{FrameSender, MessageChannel};
use crate::screen::{Browser, Screen, Snapshot, TemplateCatalog, VisualMatcher};

/// Builder for creating sessions
pub struct SessionBuilder {
    registry: Arc<dyn SchemaRegistry>,
    config: RpaConfig,
    browser: Option<Box<dyn Browser>>,
    matcher: Option<Box<dyn VisualMatcher>>,
    templates: Option<TemplateCatalog>,
}

impl SessionBuilder {
    pub fn new(registry: Arc<dyn SchemaRegistry>) -> Self {
        Self {
            registry,
            config: RpaConfig::default(),
            browser: None,
            matcher: None,
            templates: None,
        }
    }

    pub fn config(mut self, config: RpaConfig) -> Self {
        self.config = config;
        self
    }

    pub fn browser(mut self, browser: Box<dyn Browser>) -> Self {
        self.browser = Some(browser);
        self
    }

    pub fn matcher(mut self, matcher: Box<dyn VisualMatcher>) -> Self {
        self.matcher = Some(matcher);
        self
    }

    /// Use `templates` instead of the built-in catalog under the configured directory
    pub fn templates(mut self, templates: TemplateCatalog) -> Self {
        self.templates = Some(templates);
        self
    }

    /// Build the session and the handle the capture side feeds frames into
    pub fn build(self) -> Result<(FrameSender, Session)> {
        let browser = self.browser.ok_or_else(|| Error::Config("no browser given".into()))?;
        let matcher = self.matcher.ok_or_else(|| Error::Config("no matcher given".into()))?;
        let templates = self.templates.unwrap_or_else(|| {
            TemplateCatalog::builtin(&self.config.template_dir, self.config.template_threshold)
        });

        let (tx, channel) = MessageChannel::new(self.config.queue_capacity, self.registry);
        let screen = Screen::new(browser, matcher, templates, self.config.poll_interval);
        Ok((tx, Session { channel, screen, config: self.config }))
    }
}

/// Everything a presentation drives: the message feed, the screen and settings
pub struct Session {
    channel: MessageChannel,
    screen: Screen,
    config: RpaConfig,
}

impl Session {
    pub fn channel(&mut self) -> &mut MessageChannel {
        &mut self.channel
    }

    pub fn screen(&mut self) -> &mut Screen {
        &mut self.screen
    }

    pub fn config(&self) -> &RpaConfig {
        &self.config
    }

    pub fn timeouts(&self) -> &Timeouts {
        &self.config.timeouts
    }

    /// Account id of the controlled player, once a login or room creation was seen
    pub fn account_id(&self) -> Option<u64> {
        self.channel.account_id()
    }

    pub fn screenshot(&mut self) -> Result<Snapshot> {
        self.screen.screenshot()
    }

    /// Attach the current screen to an error raised without one
    pub fn annotate(&mut self, err: Error) -> Error {
        match self.screen.screenshot() {
            Ok(shot) => err.with_snapshot(shot),
            Err(e) => {
                tracing::warn!(error = %e, "no screenshot for error report");
                err
            }
        }
    }

    /// Sleep in the polling cadence
    pub async fn idle(&self) {
        tokio::time::sleep(self.config.poll_interval).await;
    }

    /// Find out which of the entry presentations is on screen.
    ///
    /// Login, auth and home are tried in that order until one is detected.
    pub async fn wait(&mut self, timeout: Duration) -> Result<Presentation> {
        let deadline = Instant::now() + timeout;
        loop {
            if Instant::now() > deadline {
                let err = Error::timeout("no entry presentation detected");
                return Err(self.annotate(err));
            }

            if let Some(p) = if_detected(Login::detect(self))? {
                return Ok(Presentation::Login(p));
            }
            if let Some(p) = if_detected(Auth::detect(self))? {
                return Ok(Presentation::Auth(p));
            }
            Home::close_notifications(self, deadline).await?;
            if let Some(p) = if_detected(Home::detect(self))? {
                return Ok(Presentation::Home(p));
            }

            self.idle().await;
        }
    }
}
