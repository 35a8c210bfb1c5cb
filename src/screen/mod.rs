//! Screen access: the browser and template matcher seams, plus the
//! polling helpers every presentation uses to wait on visual state.

pub mod layout;
pub mod template;

use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use tokio::time::Instant;

use crate::error::{Error, Result};

pub use template::{Template, TemplateCatalog};

/// One encoded screenshot
#[derive(Clone, PartialEq, Eq)]
pub struct Snapshot(Bytes);

impl Snapshot {
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        Self(data.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Snapshot({} bytes)", self.0.len())
    }
}

/// Screen rectangle in 1920x1080 client coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub const fn new(left: u32, top: u32, width: u32, height: u32) -> Self {
        Self { left, top, width, height }
    }

    /// Shrink towards the top-left by the given fractions of the size.
    pub fn inset(self, left: f64, top: f64, width: f64, height: f64) -> Self {
        let w = f64::from(self.width);
        let h = f64::from(self.height);
        Self {
            left: self.left + (w * left).round() as u32,
            top: self.top + (h * top).round() as u32,
            width: (w * width).round() as u32,
            height: (h * height).round() as u32,
        }
    }

    pub fn center(&self) -> (u32, u32) {
        (self.left + self.width / 2, self.top + self.height / 2)
    }
}

/// Browser driver: screenshots and input injection.
///
/// Input is fire-and-forget. Its effect is only ever confirmed through
/// the message channel.
pub trait Browser: Send {
    fn screenshot(&mut self) -> Result<Snapshot>;

    /// Click somewhere inside `region`; `warp` jumps the cursor instead of
    /// moving it along a path
    fn click_region(&mut self, region: Region, warp: bool) -> Result<()>;

    fn move_to_region(&mut self, region: Region) -> Result<()>;

    fn write(&mut self, text: &str) -> Result<()>;

    /// Press `keys` together, e.g. `["ctrl", "a"]`
    fn press_hotkey(&mut self, keys: &[&str]) -> Result<()>;
}

/// Best location of a template in a snapshot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemplateMatch {
    /// Matched area, sized like the template image
    pub region: Region,
    /// Similarity in `[0, 1]`
    pub score: f64,
}

pub trait VisualMatcher: Send {
    fn best_match(&self, snapshot: &Snapshot, template: &Template) -> Result<TemplateMatch>;
}

/// Browser, matcher and templates bundled with the polling cadence
pub struct Screen {
    browser: Box<dyn Browser>,
    matcher: Box<dyn VisualMatcher>,
    templates: TemplateCatalog,
    poll_interval: Duration,
}

impl Screen {
    pub fn new(
        browser: Box<dyn Browser>,
        matcher: Box<dyn VisualMatcher>,
        templates: TemplateCatalog,
        poll_interval: Duration,
    ) -> Self {
        Self { browser, matcher, templates, poll_interval }
    }

    pub fn templates(&self) -> &TemplateCatalog {
        &self.templates
    }

    pub fn screenshot(&mut self) -> Result<Snapshot> {
        self.browser.screenshot()
    }

    pub fn click_region(&mut self, region: Region, warp: bool) -> Result<()> {
        tracing::trace!(?region, warp, "click");
        self.browser.click_region(region, warp)
    }

    pub fn move_to_region(&mut self, region: Region) -> Result<()> {
        self.browser.move_to_region(region)
    }

    pub fn write(&mut self, text: &str) -> Result<()> {
        self.browser.write(text)
    }

    pub fn press_hotkey(&mut self, keys: &[&str]) -> Result<()> {
        self.browser.press_hotkey(keys)
    }

    pub fn best_match(&self, snapshot: &Snapshot, name: &str) -> Result<TemplateMatch> {
        let template = self.templates.get(name)?;
        self.matcher.best_match(snapshot, template)
    }

    /// Whether `name` is visible in `snapshot`
    pub fn matches(&self, snapshot: &Snapshot, name: &str) -> Result<bool> {
        let template = self.templates.get(name)?;
        let found = self.matcher.best_match(snapshot, template)?;
        Ok(found.score >= template.threshold)
    }

    /// Index of the first of `names` visible in `snapshot`
    pub fn match_one_of(&self, snapshot: &Snapshot, names: &[&str]) -> Result<Option<usize>> {
        for (i, name) in names.iter().enumerate() {
            if self.matches(snapshot, name)? {
                return Ok(Some(i));
            }
        }
        Ok(None)
    }

    pub fn matches_all(&self, snapshot: &Snapshot, names: &[&str]) -> Result<bool> {
        for name in names {
            if !self.matches(snapshot, name)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Take a screenshot and fail with `PresentationNotDetected` unless every
    /// one of `markers` is visible.
    pub fn detect(&mut self, presentation: &'static str, markers: &[&str]) -> Result<Snapshot> {
        let snapshot = self.screenshot()?;
        if self.matches_all(&snapshot, markers)? {
            Ok(snapshot)
        } else {
            Err(Error::PresentationNotDetected { presentation, snapshot })
        }
    }

    /// Like [`detect`](Self::detect), but any one marker suffices
    pub fn detect_any(&mut self, presentation: &'static str, markers: &[&str]) -> Result<Snapshot> {
        let snapshot = self.screenshot()?;
        if self.match_one_of(&snapshot, markers)?.is_some() {
            Ok(snapshot)
        } else {
            Err(Error::PresentationNotDetected { presentation, snapshot })
        }
    }

    /// Click the best match of `name` in a fresh screenshot
    pub fn click_template(&mut self, name: &str) -> Result<()> {
        let snapshot = self.screenshot()?;
        let found = self.best_match(&snapshot, name)?;
        self.click_region(found.region, false)
    }

    fn timed_out(&mut self, context: String) -> Error {
        match self.screenshot() {
            Ok(shot) => Error::timeout(context).with_snapshot(shot),
            Err(_) => Error::timeout(context),
        }
    }

    /// Poll until one of `names` is visible, returning its index
    pub async fn wait_for_one_of(&mut self, names: &[&str], deadline: Instant) -> Result<usize> {
        loop {
            if Instant::now() > deadline {
                return Err(self.timed_out(format!("waiting for {names:?}")));
            }
            let snapshot = self.screenshot()?;
            if let Some(index) = self.match_one_of(&snapshot, names)? {
                return Ok(index);
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    pub async fn wait_for(&mut self, name: &str, deadline: Instant) -> Result<()> {
        self.wait_for_one_of(&[name], deadline).await.map(|_| ())
    }

    pub async fn wait_for_all(&mut self, names: &[&str], deadline: Instant) -> Result<()> {
        loop {
            if Instant::now() > deadline {
                return Err(self.timed_out(format!("waiting for all of {names:?}")));
            }
            let snapshot = self.screenshot()?;
            if self.matches_all(&snapshot, names)? {
                return Ok(());
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Poll until one of `names` is visible and click it where it was seen
    pub async fn wait_for_one_of_then_click(
        &mut self,
        names: &[&str],
        deadline: Instant,
    ) -> Result<usize> {
        loop {
            if Instant::now() > deadline {
                return Err(self.timed_out(format!("waiting to click {names:?}")));
            }
            let snapshot = self.screenshot()?;
            for (i, name) in names.iter().enumerate() {
                let template = self.templates.get(name)?;
                let found = self.matcher.best_match(&snapshot, template)?;
                if found.score >= template.threshold {
                    self.click_region(found.region, false)?;
                    return Ok(i);
                }
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    pub async fn wait_for_then_click(&mut self, name: &str, deadline: Instant) -> Result<()> {
        self.wait_for_one_of_then_click(&[name], deadline).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeBrowser, SceneMatcher};

    fn screen(scenes: &[&[&str]]) -> (Screen, FakeBrowser) {
        let browser = FakeBrowser::new(scenes);
        let screen = Screen::new(
            Box::new(browser.clone()),
            Box::new(SceneMatcher),
            TemplateCatalog::builtin("template", 0.9),
            Duration::from_millis(50),
        );
        (screen, browser)
    }

    #[test]
    fn test_region_inset() {
        let r = Region::new(100, 922, 89, 149).inset(0.1, 0.1, 0.8, 0.7);
        assert_eq!(r, Region::new(109, 937, 71, 104));
    }

    #[test]
    fn test_detect() {
        let (mut screen, _) = screen(&[&["home/marker0", "home/marker1"]]);
        assert!(screen.detect("home", &["home/marker0", "home/marker1"]).is_ok());
        let err = screen.detect("home", &["home/marker0", "home/marker2"]).unwrap_err();
        assert!(err.is_not_detected());
        assert!(err.snapshot().is_some());
        assert!(screen.detect_any("match", &["match/marker3", "home/marker1"]).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_then_click_advances_scene() {
        let (mut screen, browser) = screen(&[&["room/start"], &["match/marker0"]]);
        let deadline = Instant::now() + Duration::from_secs(1);
        screen.wait_for_then_click("room/start", deadline).await.unwrap();
        assert_eq!(browser.clicks().len(), 1);
        screen.wait_for("match/marker0", deadline).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_times_out_with_snapshot() {
        let (mut screen, _) = screen(&[&["login/marker"]]);
        let deadline = Instant::now() + Duration::from_millis(200);
        let err = screen.wait_for("auth/marker", deadline).await.unwrap_err();
        assert!(err.is_timeout());
        assert!(err.snapshot().is_some());
    }

    #[test]
    fn test_unknown_template() {
        let (screen, _) = screen(&[&[]]);
        let shot = Snapshot::from_bytes(Vec::new());
        assert!(screen.matches(&shot, "nope").is_err());
    }
}
