//! Fakes and frame builders shared by unit tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{json, Value};

use crate::client::{Session, SessionBuilder};
use crate::codec::{apply_mask, encode_frame, FrameKind, SchemaRegistry};
use crate::config::RpaConfig;
use crate::error::{Error, Result};
use crate::protocol::{names, Direction, FrameSender, RawFrame};
use crate::screen::{Browser, Region, Snapshot, Template, TemplateMatch, VisualMatcher};

/// Registry treating every payload as JSON text
pub struct JsonRegistry;

impl SchemaRegistry for JsonRegistry {
    fn decode_request(&self, name: &str, data: &[u8]) -> Result<Value> {
        serde_json::from_slice(data).map_err(|e| Error::Json(format!("{name}: {e}")))
    }

    fn decode_response(&self, name: &str, data: &[u8]) -> Result<Value> {
        serde_json::from_slice(data).map_err(|e| Error::Json(format!("{name}: {e}")))
    }
}

fn bytes_of(value: &Value) -> Vec<u8> {
    serde_json::to_vec(value).unwrap()
}

/// `{step, name, data}` with `data` encoded the way the server sends it
pub fn action_prototype(step: u32, name: &str, data: &Value, masked: bool) -> Value {
    let mut payload = bytes_of(data);
    if masked {
        apply_mask(&mut payload);
    }
    json!({"step": step, "name": name, "data": STANDARD.encode(payload)})
}

pub fn notify(name: &str, body: Value) -> RawFrame {
    RawFrame::new(Direction::Inbound, encode_frame(FrameKind::Notify, 0, name, &bytes_of(&body)))
}

pub fn request(direction: Direction, correlation: u16, name: &str, body: Value) -> RawFrame {
    RawFrame::new(direction, encode_frame(FrameKind::Request, correlation, name, &bytes_of(&body)))
}

/// Response travelling in `direction`
pub fn response(direction: Direction, correlation: u16, body: Value) -> RawFrame {
    RawFrame::new(direction, encode_frame(FrameKind::Response, correlation, "", &bytes_of(&body)))
}

/// Request in `direction` and its answer coming back
pub fn exchange(
    direction: Direction,
    correlation: u16,
    name: &str,
    req: Value,
    resp: Value,
) -> [RawFrame; 2] {
    [
        request(direction, correlation, name, req),
        response(direction.opposite(), correlation, resp),
    ]
}

/// Masked `.lq.ActionPrototype` notification
pub fn action(step: u32, name: &str, data: Value) -> RawFrame {
    notify(names::ACTION_PROTOTYPE, action_prototype(step, name, &data, true))
}

/// Where [`SceneMatcher`] reports every visible template
pub const TEMPLATE_HIT: Region = Region::new(1, 1, 8, 8);

#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Click(Region),
    Move(Region),
    Write(String),
    Hotkey(Vec<String>),
}

#[derive(Default)]
struct BrowserState {
    current: Vec<String>,
    upcoming: VecDeque<Vec<String>>,
    inputs: Vec<Input>,
}

/// Browser showing a script of scenes, each a set of visible template
/// names. Clicking where a template was found moves on to the next scene.
#[derive(Clone, Default)]
pub struct FakeBrowser {
    state: Arc<Mutex<BrowserState>>,
}

impl FakeBrowser {
    pub fn new(scenes: &[&[&str]]) -> Self {
        let mut upcoming: VecDeque<Vec<String>> = scenes
            .iter()
            .map(|scene| scene.iter().map(|s| s.to_string()).collect())
            .collect();
        let current = upcoming.pop_front().unwrap_or_default();
        Self {
            state: Arc::new(Mutex::new(BrowserState { current, upcoming, inputs: Vec::new() })),
        }
    }

    pub fn inputs(&self) -> Vec<Input> {
        self.state.lock().unwrap().inputs.clone()
    }

    pub fn clicks(&self) -> Vec<Region> {
        self.inputs()
            .into_iter()
            .filter_map(|input| match input {
                Input::Click(region) => Some(region),
                _ => None,
            })
            .collect()
    }

    pub fn scene(&self) -> Vec<String> {
        self.state.lock().unwrap().current.clone()
    }
}

impl Browser for FakeBrowser {
    fn screenshot(&mut self) -> Result<Snapshot> {
        Ok(Snapshot::from_bytes(self.state.lock().unwrap().current.join("\n")))
    }

    fn click_region(&mut self, region: Region, _warp: bool) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.inputs.push(Input::Click(region));
        if (region.left, region.top) == (TEMPLATE_HIT.left, TEMPLATE_HIT.top) {
            if let Some(next) = state.upcoming.pop_front() {
                state.current = next;
            }
        }
        Ok(())
    }

    fn move_to_region(&mut self, region: Region) -> Result<()> {
        self.state.lock().unwrap().inputs.push(Input::Move(region));
        Ok(())
    }

    fn write(&mut self, text: &str) -> Result<()> {
        self.state.lock().unwrap().inputs.push(Input::Write(text.to_string()));
        Ok(())
    }

    fn press_hotkey(&mut self, keys: &[&str]) -> Result<()> {
        let keys = keys.iter().map(|k| k.to_string()).collect();
        self.state.lock().unwrap().inputs.push(Input::Hotkey(keys));
        Ok(())
    }
}

/// Matcher reading a [`FakeBrowser`] screenshot as the list of visible names
pub struct SceneMatcher;

impl VisualMatcher for SceneMatcher {
    fn best_match(&self, snapshot: &Snapshot, template: &Template) -> Result<TemplateMatch> {
        let text = std::str::from_utf8(snapshot.as_bytes()).unwrap_or_default();
        let visible = text.lines().any(|line| line == template.name);
        Ok(TemplateMatch { region: TEMPLATE_HIT, score: if visible { 1.0 } else { 0.0 } })
    }
}

/// Session wired to a [`FakeBrowser`] running `scenes`
pub fn session(scenes: &[&[&str]]) -> (FrameSender, Session, FakeBrowser) {
    let browser = FakeBrowser::new(scenes);
    let mut config = RpaConfig::default();
    config.poll_interval = Duration::from_millis(50);
    let (tx, session) = SessionBuilder::new(Arc::new(JsonRegistry))
        .config(config)
        .browser(Box::new(browser.clone()))
        .matcher(Box::new(SceneMatcher))
        .build()
        .unwrap();
    (tx, session, browser)
}

/// Send every frame in order
pub async fn feed(tx: &FrameSender, frames: impl IntoIterator<Item = RawFrame>) {
    for frame in frames {
        tx.send(frame).await.unwrap();
    }
}
