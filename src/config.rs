use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub fn default_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".majsoul-rpa")
        .join("config.json")
}

/// Runtime settings. Every duration is written in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RpaConfig {
    /// Raw frames buffered between the capture side and the decoder
    pub queue_capacity: usize,
    /// Directory holding `<name>.png` templates
    pub template_dir: PathBuf,
    pub template_threshold: f64,
    #[serde(with = "millis")]
    pub poll_interval: Duration,
    pub timeouts: Timeouts,
}

impl Default for RpaConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            template_dir: PathBuf::from("template"),
            template_threshold: 0.99,
            poll_interval: Duration::from_millis(100),
            timeouts: Timeouts::default(),
        }
    }
}

impl RpaConfig {
    pub fn default_path() -> PathBuf {
        default_path()
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        serde_json::from_str(&text).map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }

    /// [`load`](Self::load) from the default path, or defaults if it is absent
    pub fn load_or_default() -> Result<Self> {
        let path = default_path();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    #[serde(with = "millis")]
    pub login: Duration,
    #[serde(with = "millis")]
    pub mail_address: Duration,
    #[serde(with = "millis")]
    pub auth_code: Duration,
    /// Home screen after the auth code is accepted
    #[serde(with = "millis")]
    pub home: Duration,
    #[serde(with = "millis")]
    pub room_creation: Duration,
    #[serde(with = "millis")]
    pub add_cpu: Duration,
    #[serde(with = "millis")]
    pub leave_room: Duration,
    #[serde(with = "millis")]
    pub match_start: Duration,
    /// Suggested timeout for `Match::wait` across a round end, where the
    /// result screens and the next deal come before anything else
    #[serde(with = "millis")]
    pub match_wait: Duration,
    #[serde(with = "millis")]
    pub skip_click_interval: Duration,
    #[serde(with = "millis")]
    pub skip_click_timeout: Duration,
    #[serde(with = "millis")]
    pub dapai_click_interval: Duration,
    #[serde(with = "millis")]
    pub dapai_click_timeout: Duration,
    /// Call buttons; kept short so a pre-empting win is noticed in time
    #[serde(with = "millis")]
    pub call_button: Duration,
    #[serde(with = "millis")]
    pub self_button: Duration,
    /// Each further result prompt after a match
    #[serde(with = "millis")]
    pub result_prompt: Duration,
    /// Dequeue slice while watching the screen for result prompts
    #[serde(with = "millis")]
    pub message_poll: Duration,
    /// Hand animation after a meld
    #[serde(with = "millis")]
    pub meld_settle: Duration,
    /// Deal animation before the dealer's first discard
    #[serde(with = "millis")]
    pub deal_settle: Duration,
    #[serde(with = "millis")]
    pub add_cpu_settle: Duration,
    /// Quiet period that ends a drain of leftover messages
    #[serde(with = "millis")]
    pub drain_idle: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        let secs = Duration::from_secs;
        let ms = Duration::from_millis;
        Self {
            login: secs(60),
            mail_address: secs(10),
            auth_code: secs(120),
            home: secs(60),
            room_creation: secs(60),
            add_cpu: secs(10),
            leave_room: secs(10),
            match_start: secs(60),
            match_wait: secs(300),
            skip_click_interval: ms(200),
            skip_click_timeout: secs(5),
            dapai_click_interval: secs(1),
            dapai_click_timeout: secs(5),
            call_button: secs(5),
            self_button: secs(10),
            result_prompt: secs(5),
            message_poll: ms(100),
            meld_settle: secs(1),
            deal_settle: secs(1),
            add_cpu_settle: secs(2),
            drain_idle: ms(500),
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
