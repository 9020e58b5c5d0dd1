use serde::{Deserialize, Serialize};

/// Default trailing-edge delay for coalescing slider writes.
pub const DEFAULT_SETTINGS_DEBOUNCE_MS: u64 = 500;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Background {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub url: String,
    /// Overlay opacity in `[0, 1]`.
    #[serde(default = "default_opacity")]
    pub opacity: f64,
    /// Blur radius in pixels.
    #[serde(rename = "blur", default = "default_blur")]
    pub blur_radius_px: f64,
}

fn default_enabled() -> bool {
    true
}

fn default_opacity() -> f64 {
    0.2
}

fn default_blur() -> f64 {
    4.0
}

impl Default for Background {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            url: String::new(),
            opacity: default_opacity(),
            blur_radius_px: default_blur(),
        }
    }
}

impl Background {
    /// Whether the overlay should be drawn at all.
    pub fn is_visible(&self) -> bool {
        self.enabled && !self.url.trim().is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    #[serde(rename = "currentSearchEngine", default)]
    pub active_search_engine_id: String,
    #[serde(default)]
    pub background: Background,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            active_search_engine_id: "google".to_string(),
            background: Background::default(),
        }
    }
}

impl Settings {
    /// Returns a copy with background values forced into their valid ranges.
    pub fn clamped(mut self) -> Self {
        let bg = &mut self.background;
        bg.opacity = if bg.opacity.is_finite() {
            bg.opacity.clamp(0.0, 1.0)
        } else {
            default_opacity()
        };
        bg.blur_radius_px = if bg.blur_radius_px.is_finite() {
            bg.blur_radius_px.max(0.0)
        } else {
            default_blur()
        };
        self
    }
}

/// Coalesces rapid settings writes (slider drags) into one trailing write.
///
/// Time is supplied by the caller as event timestamps in milliseconds, so the
/// debouncer never owns a timer.
#[derive(Debug)]
pub struct SettingsDebouncer {
    delay_ms: u64,
    pending: Option<(Settings, u64)>,
}

impl Default for SettingsDebouncer {
    fn default() -> Self {
        Self::new(DEFAULT_SETTINGS_DEBOUNCE_MS)
    }
}

impl SettingsDebouncer {
    pub fn new(delay_ms: u64) -> Self {
        Self {
            delay_ms,
            pending: None,
        }
    }

    /// Replaces any pending value and pushes the deadline out to `now + delay`.
    pub fn schedule(&mut self, settings: Settings, now_ms: u64) {
        let due = now_ms.saturating_add(self.delay_ms);
        self.pending = Some((settings, due));
    }

    /// Releases the pending value once its deadline has passed.
    pub fn poll(&mut self, now_ms: u64) -> Option<Settings> {
        match self.pending {
            Some((_, due)) if now_ms >= due => self.pending.take().map(|(s, _)| s),
            _ => None,
        }
    }

    pub fn flush(&mut self) -> Option<Settings> {
        self.pending.take().map(|(s, _)| s)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// The value that will be written next, if any.
    pub fn peek(&self) -> Option<&Settings> {
        self.pending.as_ref().map(|(s, _)| s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_opacity(opacity: f64) -> Settings {
        let mut s = Settings::default();
        s.background.opacity = opacity;
        s
    }

    #[test]
    fn defaults_match_first_run_layout() {
        let s = Settings::default();
        assert_eq!(s.active_search_engine_id, "google");
        assert_eq!(s.background.opacity, 0.2);
        assert_eq!(s.background.blur_radius_px, 4.0);
        assert!(!s.background.is_visible());
    }

    #[test]
    fn clamped_keeps_values_in_range() {
        let mut s = with_opacity(1.7);
        s.background.blur_radius_px = -3.0;
        let s = s.clamped();
        assert_eq!(s.background.opacity, 1.0);
        assert_eq!(s.background.blur_radius_px, 0.0);

        let s = with_opacity(f64::NAN).clamped();
        assert_eq!(s.background.opacity, 0.2);
    }

    #[test]
    fn parses_legacy_settings_json() {
        let json = r#"{"currentSearchEngine":"bing","background":{"url":"https://img.test/a.jpg","opacity":0.5,"blur":5}}"#;
        let s: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(s.active_search_engine_id, "bing");
        assert_eq!(s.background.blur_radius_px, 5.0);
        assert!(s.background.enabled);
        assert!(s.background.is_visible());
    }

    #[test]
    fn debouncer_coalesces_to_trailing_value() {
        let mut d = SettingsDebouncer::new(500);
        d.schedule(with_opacity(0.1), 0);
        d.schedule(with_opacity(0.2), 100);
        d.schedule(with_opacity(0.3), 200);

        assert_eq!(d.poll(650), None);
        let written = d.poll(700).expect("deadline passed");
        assert_eq!(written.background.opacity, 0.3);
        assert!(!d.is_pending());
        assert_eq!(d.poll(5000), None);
    }

    #[test]
    fn debouncer_flush_releases_immediately() {
        let mut d = SettingsDebouncer::default();
        d.schedule(with_opacity(0.4), 10);
        assert_eq!(d.peek().map(|s| s.background.opacity), Some(0.4));
        assert_eq!(d.flush().map(|s| s.background.opacity), Some(0.4));
        assert!(d.flush().is_none());
    }
}
