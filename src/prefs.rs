use rusqlite::Connection;
use serde_json::{json, Value};

use crate::db;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorVisionMode {
    None,
    Protanopia,
    Deuteranopia,
    Tritanopia,
}

impl ColorVisionMode {
    /// Unrecognized values fall back to None rather than erroring; stored
    /// records from older builds must always hydrate.
    pub fn parse(s: &str) -> Self {
        match s {
            "protanopia" => Self::Protanopia,
            "deuteranopia" => Self::Deuteranopia,
            "tritanopia" => Self::Tritanopia,
            _ => Self::None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Protanopia => "protanopia",
            Self::Deuteranopia => "deuteranopia",
            Self::Tritanopia => "tritanopia",
        }
    }
}

/// One preference record per identity. Field defaults and ranges follow the
/// accessibility panel: sliders clamp rather than reject.
#[derive(Debug, Clone, PartialEq)]
pub struct PrefRecord {
    pub contrast: bool,
    pub dyslexia_font: bool,
    pub focus_highlight: bool,
    pub text_scale: i64,
    pub text_scale_login: i64,
    pub dark_mode: bool,
    pub color_vision: ColorVisionMode,
    pub concentration: bool,
    pub letter_spacing_em: f64,
    pub word_spacing_em: f64,
    pub line_spacing: f64,
    pub tts_enabled: bool,
    pub tts_rate: f64,
    pub tts_voice: String,
    pub hover_narration: bool,
}

impl Default for PrefRecord {
    fn default() -> Self {
        Self {
            contrast: false,
            dyslexia_font: false,
            focus_highlight: false,
            text_scale: 100,
            text_scale_login: 100,
            dark_mode: false,
            color_vision: ColorVisionMode::None,
            concentration: false,
            letter_spacing_em: 0.02,
            word_spacing_em: 0.0,
            line_spacing: 1.6,
            tts_enabled: false,
            tts_rate: 1.0,
            tts_voice: "es-ES".to_string(),
            hover_narration: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrefField {
    Contrast,
    DyslexiaFont,
    FocusHighlight,
    TextScale,
    TextScaleLogin,
    DarkMode,
    ColorVision,
    Concentration,
    LetterSpacing,
    WordSpacing,
    LineSpacing,
    TtsEnabled,
    TtsRate,
    TtsVoice,
    HoverNarration,
}

pub const ALL_FIELDS: [PrefField; 15] = [
    PrefField::Contrast,
    PrefField::DyslexiaFont,
    PrefField::FocusHighlight,
    PrefField::TextScale,
    PrefField::TextScaleLogin,
    PrefField::DarkMode,
    PrefField::ColorVision,
    PrefField::Concentration,
    PrefField::LetterSpacing,
    PrefField::WordSpacing,
    PrefField::LineSpacing,
    PrefField::TtsEnabled,
    PrefField::TtsRate,
    PrefField::TtsVoice,
    PrefField::HoverNarration,
];

impl PrefField {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "contrast" => Some(Self::Contrast),
            "dyslexiaFont" => Some(Self::DyslexiaFont),
            "focusHighlight" => Some(Self::FocusHighlight),
            "textScalePercent" => Some(Self::TextScale),
            "textScaleLoginPercent" => Some(Self::TextScaleLogin),
            "darkMode" => Some(Self::DarkMode),
            "colorVisionMode" => Some(Self::ColorVision),
            "concentrationMode" => Some(Self::Concentration),
            "letterSpacingEm" => Some(Self::LetterSpacing),
            "wordSpacingEm" => Some(Self::WordSpacing),
            "lineSpacingMultiplier" => Some(Self::LineSpacing),
            "ttsEnabled" => Some(Self::TtsEnabled),
            "ttsRate" => Some(Self::TtsRate),
            "ttsVoiceLocale" => Some(Self::TtsVoice),
            "hoverNarrationEnabled" => Some(Self::HoverNarration),
            _ => None,
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            Self::Contrast => "contrast",
            Self::DyslexiaFont => "dyslexiaFont",
            Self::FocusHighlight => "focusHighlight",
            Self::TextScale => "textScalePercent",
            Self::TextScaleLogin => "textScaleLoginPercent",
            Self::DarkMode => "darkMode",
            Self::ColorVision => "colorVisionMode",
            Self::Concentration => "concentrationMode",
            Self::LetterSpacing => "letterSpacingEm",
            Self::WordSpacing => "wordSpacingEm",
            Self::LineSpacing => "lineSpacingMultiplier",
            Self::TtsEnabled => "ttsEnabled",
            Self::TtsRate => "ttsRate",
            Self::TtsVoice => "ttsVoiceLocale",
            Self::HoverNarration => "hoverNarrationEnabled",
        }
    }

    /// Fields whose change must re-render the visual transform list.
    pub fn affects_visuals(self) -> bool {
        !matches!(
            self,
            Self::TtsEnabled | Self::TtsRate | Self::TtsVoice | Self::HoverNarration
        )
    }
}

fn clamp_i64(v: i64, min: i64, max: i64) -> i64 {
    v.clamp(min, max)
}

fn clamp_f64(v: f64, min: f64, max: f64) -> f64 {
    if !v.is_finite() {
        return min;
    }
    v.clamp(min, max)
}

fn as_bool(v: &Value) -> bool {
    v.as_bool().unwrap_or(false)
}

fn as_i64(v: &Value, fallback: i64) -> i64 {
    v.as_i64()
        .or_else(|| v.as_f64().map(|f| f.round() as i64))
        .unwrap_or(fallback)
}

fn as_f64(v: &Value, fallback: f64) -> f64 {
    v.as_f64().unwrap_or(fallback)
}

impl PrefRecord {
    pub fn get(&self, field: PrefField) -> Value {
        match field {
            PrefField::Contrast => json!(self.contrast),
            PrefField::DyslexiaFont => json!(self.dyslexia_font),
            PrefField::FocusHighlight => json!(self.focus_highlight),
            PrefField::TextScale => json!(self.text_scale),
            PrefField::TextScaleLogin => json!(self.text_scale_login),
            PrefField::DarkMode => json!(self.dark_mode),
            PrefField::ColorVision => json!(self.color_vision.as_str()),
            PrefField::Concentration => json!(self.concentration),
            PrefField::LetterSpacing => json!(self.letter_spacing_em),
            PrefField::WordSpacing => json!(self.word_spacing_em),
            PrefField::LineSpacing => json!(self.line_spacing),
            PrefField::TtsEnabled => json!(self.tts_enabled),
            PrefField::TtsRate => json!(self.tts_rate),
            PrefField::TtsVoice => json!(self.tts_voice),
            PrefField::HoverNarration => json!(self.hover_narration),
        }
    }

    /// Out-of-range numbers clamp to the documented bounds and unknown enum
    /// values normalize to their default; `set` never fails.
    pub fn set(&mut self, field: PrefField, value: &Value) {
        match field {
            PrefField::Contrast => self.contrast = as_bool(value),
            PrefField::DyslexiaFont => self.dyslexia_font = as_bool(value),
            PrefField::FocusHighlight => self.focus_highlight = as_bool(value),
            PrefField::TextScale => {
                self.text_scale = clamp_i64(as_i64(value, 100), 90, 150);
            }
            PrefField::TextScaleLogin => {
                self.text_scale_login = clamp_i64(as_i64(value, 100), 100, 150);
            }
            PrefField::DarkMode => self.dark_mode = as_bool(value),
            PrefField::ColorVision => {
                self.color_vision = ColorVisionMode::parse(value.as_str().unwrap_or("none"));
            }
            PrefField::Concentration => self.concentration = as_bool(value),
            PrefField::LetterSpacing => {
                self.letter_spacing_em = clamp_f64(as_f64(value, 0.02), 0.0, 0.1);
            }
            PrefField::WordSpacing => {
                self.word_spacing_em = clamp_f64(as_f64(value, 0.0), 0.0, 0.2);
            }
            PrefField::LineSpacing => {
                self.line_spacing = clamp_f64(as_f64(value, 1.6), 1.0, 2.5);
            }
            PrefField::TtsEnabled => self.tts_enabled = as_bool(value),
            PrefField::TtsRate => {
                self.tts_rate = clamp_f64(as_f64(value, 1.0), 0.5, 2.0);
            }
            PrefField::TtsVoice => {
                let v = value.as_str().unwrap_or("es-ES").trim();
                self.tts_voice = if v.is_empty() {
                    "es-ES".to_string()
                } else {
                    v.to_string()
                };
            }
            PrefField::HoverNarration => self.hover_narration = as_bool(value),
        }
    }

    pub fn to_json(&self) -> Value {
        let mut obj = serde_json::Map::new();
        for field in ALL_FIELDS {
            obj.insert(field.key().to_string(), self.get(field));
        }
        Value::Object(obj)
    }

    /// Best-effort merge of a stored payload over the current values. Missing
    /// fields keep their current value and malformed ones normalize to their
    /// default; everything goes through `set`, so clamping applies to
    /// historical records too.
    pub fn merge_json(&mut self, payload: &Value) {
        let Some(obj) = payload.as_object() else {
            return;
        };
        for field in ALL_FIELDS {
            if let Some(v) = obj.get(field.key()) {
                self.set(field, v);
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    AlreadyLoaded,
    Hydrated,
    Defaults,
    StoreUnavailable,
}

/// Session-scoped view of the active preference record. Injected through
/// `AppState` so a server process can host several sessions; never a global.
#[derive(Debug, Default)]
pub struct SessionPrefs {
    pub current: PrefRecord,
    shadow: PrefRecord,
    initialized: bool,
    pub loaded: bool,
    pub last_identity: Option<String>,
}

impl SessionPrefs {
    pub fn new() -> Self {
        let mut s = Self::default();
        s.init_defaults();
        s
    }

    /// Idempotent: populates defaults only the first time. Already-set values
    /// survive repeat calls, which keeps partial restarts harmless.
    pub fn init_defaults(&mut self) {
        if self.initialized {
            return;
        }
        self.current = PrefRecord::default();
        self.shadow = self.current.clone();
        self.initialized = true;
    }

    pub fn get(&self, field: PrefField) -> Value {
        self.current.get(field)
    }

    pub fn set(&mut self, field: PrefField, value: &Value) -> Value {
        self.current.set(field, value);
        self.current.get(field)
    }

    /// Restores defaults for every field not named in `preserve`. The caller
    /// passes the transient narration fields at logout so an in-flight
    /// utterance's bookkeeping is not wiped mid-session.
    pub fn reset_to_defaults(&mut self, preserve: &[PrefField]) {
        let defaults = PrefRecord::default();
        for field in ALL_FIELDS {
            if preserve.contains(&field) {
                continue;
            }
            let v = defaults.get(field);
            self.current.set(field, &v);
        }
        self.shadow = self.current.clone();
        self.loaded = false;
    }

    /// Identity-aware hydration. Switching identity resets to defaults before
    /// loading; load failures keep defaults but still mark the record loaded
    /// so a flaky store does not cause a retry storm on every render.
    pub fn load_for_identity(&mut self, identity: &str, conn: Option<&Connection>) -> LoadOutcome {
        self.init_defaults();

        if self.loaded && self.last_identity.as_deref() == Some(identity) {
            return LoadOutcome::AlreadyLoaded;
        }
        if self.last_identity.is_some() && self.last_identity.as_deref() != Some(identity) {
            self.reset_to_defaults(&[]);
        }

        let outcome = match conn {
            Some(conn) => match db::prefs_load(conn, identity) {
                Ok(Some(payload)) => {
                    self.current.merge_json(&payload);
                    LoadOutcome::Hydrated
                }
                Ok(None) => LoadOutcome::Defaults,
                Err(_) => LoadOutcome::StoreUnavailable,
            },
            None => LoadOutcome::Defaults,
        };

        self.shadow = self.current.clone();
        self.loaded = true;
        self.last_identity = Some(identity.to_string());
        outcome
    }

    /// Forces a reload on the next `load_for_identity`, e.g. after the
    /// backing store file was replaced by a bundle import.
    pub fn invalidate(&mut self) {
        self.loaded = false;
    }

    /// The autosave unit: writes the full record when `field` differs from
    /// its last-persisted value, updating the shadow only on success. With no
    /// identity the record stays session-only and this reports false.
    pub fn persist_if_changed(
        &mut self,
        field: PrefField,
        identity: Option<&str>,
        conn: Option<&Connection>,
    ) -> anyhow::Result<bool> {
        if self.current.get(field) == self.shadow.get(field) {
            return Ok(false);
        }
        let (Some(identity), Some(conn)) = (identity, conn) else {
            return Ok(false);
        };
        db::prefs_upsert(conn, identity, &self.current.to_json())?;
        self.shadow = self.current.clone();
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn mem_store() -> Connection {
        let conn = Connection::open_in_memory().expect("open in-memory db");
        db::init_schema(&conn).expect("init schema");
        conn
    }

    #[test]
    fn init_defaults_is_idempotent() {
        let mut session = SessionPrefs::new();
        session.set(PrefField::DarkMode, &json!(true));
        session.set(PrefField::TextScale, &json!(130));
        session.init_defaults();
        assert_eq!(session.get(PrefField::DarkMode), json!(true));
        assert_eq!(session.get(PrefField::TextScale), json!(130));
    }

    #[test]
    fn numeric_fields_clamp_to_documented_ranges() {
        let mut session = SessionPrefs::new();
        assert_eq!(session.set(PrefField::TextScale, &json!(500)), json!(150));
        assert_eq!(session.set(PrefField::TextScale, &json!(10)), json!(90));
        assert_eq!(
            session.set(PrefField::LetterSpacing, &json!(-1.0)),
            json!(0.0)
        );
        assert_eq!(
            session.set(PrefField::LineSpacing, &json!(99.0)),
            json!(2.5)
        );
        assert_eq!(session.set(PrefField::TtsRate, &json!(0.1)), json!(0.5));
    }

    #[test]
    fn unknown_color_vision_mode_is_treated_as_none() {
        let mut session = SessionPrefs::new();
        assert_eq!(
            session.set(PrefField::ColorVision, &json!("achromatopsia")),
            json!("none")
        );
        assert_eq!(
            session.set(PrefField::ColorVision, &json!("tritanopia")),
            json!("tritanopia")
        );
    }

    #[test]
    fn persist_if_changed_fires_exactly_once_per_change() {
        let conn = mem_store();
        let mut session = SessionPrefs::new();
        session.load_for_identity("u1", Some(&conn));

        session.set(PrefField::DarkMode, &json!(true));
        assert!(session
            .persist_if_changed(PrefField::DarkMode, Some("u1"), Some(&conn))
            .unwrap());
        assert!(!session
            .persist_if_changed(PrefField::DarkMode, Some("u1"), Some(&conn))
            .unwrap());

        session.set(PrefField::DarkMode, &json!(false));
        assert!(session
            .persist_if_changed(PrefField::DarkMode, Some("u1"), Some(&conn))
            .unwrap());
    }

    #[test]
    fn anonymous_sessions_never_write() {
        let conn = mem_store();
        let mut session = SessionPrefs::new();
        session.set(PrefField::DarkMode, &json!(true));
        assert!(!session
            .persist_if_changed(PrefField::DarkMode, None, Some(&conn))
            .unwrap());
        assert_eq!(db::prefs_load(&conn, "u1").unwrap(), None);
    }

    #[test]
    fn fresh_identity_against_empty_store_keeps_defaults_and_marks_loaded() {
        let conn = mem_store();
        let mut session = SessionPrefs::new();
        let outcome = session.load_for_identity("u1", Some(&conn));
        assert_eq!(outcome, LoadOutcome::Defaults);
        assert!(session.loaded);
        assert_eq!(session.get(PrefField::TtsEnabled), json!(false));
        assert_eq!(session.get(PrefField::TextScale), json!(100));
    }

    #[test]
    fn identity_switch_resets_before_hydrating() {
        let conn = mem_store();
        let mut session = SessionPrefs::new();
        session.load_for_identity("u1", Some(&conn));
        session.set(PrefField::DarkMode, &json!(true));
        session
            .persist_if_changed(PrefField::DarkMode, Some("u1"), Some(&conn))
            .unwrap();

        let outcome = session.load_for_identity("u2", Some(&conn));
        assert_eq!(outcome, LoadOutcome::Defaults);
        assert_eq!(session.get(PrefField::DarkMode), json!(false));
        assert_eq!(session.last_identity.as_deref(), Some("u2"));

        // Back to u1: the persisted record hydrates again.
        let outcome = session.load_for_identity("u1", Some(&conn));
        assert_eq!(outcome, LoadOutcome::Hydrated);
        assert_eq!(session.get(PrefField::DarkMode), json!(true));
    }

    #[test]
    fn reset_honors_the_preserve_set() {
        let mut session = SessionPrefs::new();
        session.set(PrefField::DarkMode, &json!(true));
        session.set(PrefField::TtsVoice, &json!("en-GB"));
        session.reset_to_defaults(&[PrefField::TtsVoice]);
        assert_eq!(session.get(PrefField::DarkMode), json!(false));
        assert_eq!(session.get(PrefField::TtsVoice), json!("en-GB"));
    }

    #[test]
    fn repeat_load_for_same_identity_is_a_no_op() {
        let conn = mem_store();
        let mut session = SessionPrefs::new();
        session.load_for_identity("u1", Some(&conn));
        session.set(PrefField::Contrast, &json!(true));
        let outcome = session.load_for_identity("u1", Some(&conn));
        assert_eq!(outcome, LoadOutcome::AlreadyLoaded);
        assert_eq!(session.get(PrefField::Contrast), json!(true));
    }

    #[test]
    fn malformed_stored_fields_keep_defaults() {
        let conn = mem_store();
        db::prefs_upsert(
            &conn,
            "u1",
            &json!({
                "darkMode": true,
                "textScalePercent": "huge",
                "colorVisionMode": 42
            }),
        )
        .unwrap();

        let mut session = SessionPrefs::new();
        let outcome = session.load_for_identity("u1", Some(&conn));
        assert_eq!(outcome, LoadOutcome::Hydrated);
        assert_eq!(session.get(PrefField::DarkMode), json!(true));
        assert_eq!(session.get(PrefField::TextScale), json!(100));
        assert_eq!(session.get(PrefField::ColorVision), json!("none"));
    }

    #[test]
    fn stored_record_round_trips_exactly() {
        let conn = mem_store();
        let mut session = SessionPrefs::new();
        session.load_for_identity("u1", Some(&conn));
        session.set(PrefField::TextScale, &json!(120));
        session.set(PrefField::ColorVision, &json!("protanopia"));
        session.set(PrefField::TtsRate, &json!(1.5));
        session
            .persist_if_changed(PrefField::TextScale, Some("u1"), Some(&conn))
            .unwrap();

        let mut other = SessionPrefs::new();
        other.load_for_identity("u1", Some(&conn));
        assert_eq!(other.current, session.current);
    }
}
