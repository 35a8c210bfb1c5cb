use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::error::{Error, Result};
use crate::screen::Region;

/// Every template the presentations look for, by name.
///
/// A name maps to `<dir>/<name>.png`.
pub const TEMPLATE_NAMES: &[&str] = &[
    "login/marker",
    "auth/marker",
    "auth/confirm",
    "auth/login",
    "home/marker0",
    "home/marker1",
    "home/marker2",
    "home/marker3",
    "home/notification_close",
    "home/room_creation",
    "home/room_creation/confirm",
    "room/marker",
    "room/add_cpu",
    "room/start",
    "room/leave",
    "match/marker0",
    "match/marker1",
    "match/marker2",
    "match/marker3",
    "match/hule_confirm",
    "match/no_tile_confirm",
    "match/round_result_confirm",
    "match/match_result_confirm",
    "match/chi0",
    "match/chi1",
    "match/peng0",
    "match/peng1",
    "match/gang0",
    "match/gang1",
    "match/liqi",
    "match/zimohu",
    "match/rong",
    "match/liuju",
];

/// Full client area searched when a template names no region
pub const FULL_SCREEN: Region = Region::new(0, 0, 1920, 1080);

#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub name: String,
    pub path: PathBuf,
    /// Area of the screenshot searched for the image
    pub search: Region,
    /// Minimum score counted as visible
    pub threshold: f64,
}

/// Name-indexed templates in registration order
#[derive(Debug, Clone, Default)]
pub struct TemplateCatalog {
    templates: IndexMap<String, Template>,
}

impl TemplateCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// All known templates under `dir`, searched over the whole screen
    pub fn builtin(dir: impl AsRef<Path>, threshold: f64) -> Self {
        let dir = dir.as_ref();
        let mut catalog = Self::new();
        for name in TEMPLATE_NAMES {
            catalog.insert(Template {
                name: (*name).to_string(),
                path: dir.join(format!("{name}.png")),
                search: FULL_SCREEN,
                threshold,
            });
        }
        catalog
    }

    /// Add or replace a template
    pub fn insert(&mut self, template: Template) {
        self.templates.insert(template.name.clone(), template);
    }

    pub fn get(&self, name: &str) -> Result<&Template> {
        self.templates
            .get(name)
            .ok_or_else(|| Error::Config(format!("unknown template `{name}`")))
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Template> {
        self.templates.get_mut(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Template> {
        self.templates.values()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}
