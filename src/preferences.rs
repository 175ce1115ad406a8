//! Cosmetic UI preferences stored next to the session: colour theme and sidebar state.
//! Unreadable stored values fall back to the defaults (light theme, expanded sidebar).

use std::fmt::{Display, Formatter};
use std::sync::Arc;

use crate::error::AppResult;
use crate::storage::{KeyValueBackend, KEY_SIDEBAR_COLLAPSED, KEY_THEME};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    pub fn parse(s: &str) -> Option<Theme> {
        match s {
            "light" => Some(Theme::Light),
            "dark" => Some(Theme::Dark),
            _ => None,
        }
    }

    pub fn toggled(&self) -> Theme {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

impl Display for Theme {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result { f.write_str(self.as_str()) }
}

pub struct Preferences {
    backend: Arc<dyn KeyValueBackend>,
}

impl Preferences {
    pub fn new(backend: Arc<dyn KeyValueBackend>) -> Self { Self { backend } }

    pub fn theme(&self) -> AppResult<Theme> {
        Ok(self.backend.load(KEY_THEME)?.as_deref().and_then(Theme::parse).unwrap_or_default())
    }

    pub fn set_theme(&self, theme: Theme) -> AppResult<()> { self.backend.save(KEY_THEME, theme.as_str()) }

    pub fn toggle_theme(&self) -> AppResult<Theme> {
        let next = self.theme()?.toggled();
        self.set_theme(next)?;
        Ok(next)
    }

    pub fn sidebar_collapsed(&self) -> AppResult<bool> {
        Ok(self.backend.load(KEY_SIDEBAR_COLLAPSED)?.as_deref() == Some("true"))
    }

    pub fn set_sidebar_collapsed(&self, collapsed: bool) -> AppResult<()> {
        self.backend.save(KEY_SIDEBAR_COLLAPSED, if collapsed { "true" } else { "false" })
    }

    pub fn toggle_sidebar(&self) -> AppResult<bool> {
        let next = !self.sidebar_collapsed()?;
        self.set_sidebar_collapsed(next)?;
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryBackend;

    #[test]
    fn last_choice_wins_and_garbage_falls_back() {
        let backend = Arc::new(MemoryBackend::with_entries([(KEY_THEME, "purple"), (KEY_SIDEBAR_COLLAPSED, "yes")]));
        let prefs = Preferences::new(backend.clone());
        assert_eq!(prefs.theme().unwrap(), Theme::Light);
        assert!(!prefs.sidebar_collapsed().unwrap());

        assert_eq!(prefs.toggle_theme().unwrap(), Theme::Dark);
        assert!(prefs.toggle_sidebar().unwrap());
        let snap = backend.snapshot();
        assert_eq!(snap.get(KEY_THEME).map(String::as_str), Some("dark"));
        assert_eq!(snap.get(KEY_SIDEBAR_COLLAPSED).map(String::as_str), Some("true"));

        prefs.set_theme(Theme::Light).unwrap();
        assert_eq!(prefs.theme().unwrap(), Theme::Light);
    }
}
