use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::narration;

// ===== element model =====

/// A describable UI node as the host sees it. The host resolves its widget
/// tree (DOM, native, terminal) into this shape per pointer-over event; the
/// daemon only applies policy on top of it.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiElement {
    /// Host-stable node id, used to skip re-resolving the same element.
    pub id: String,
    #[serde(default)]
    pub role: Option<String>,
    /// Direct text content of the node itself.
    #[serde(default)]
    pub text: String,
    /// Control label or accessible name, when the host knows one.
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub checked: Option<bool>,
    #[serde(default)]
    pub selected: Option<bool>,
    #[serde(default)]
    pub row_count: Option<u64>,
    #[serde(default)]
    pub column_count: Option<u64>,
    #[serde(default)]
    pub columns: Vec<String>,
    /// Title for charts and tables (nearest heading, caption, or alt text).
    #[serde(default)]
    pub title: Option<String>,
    /// Column header for a table cell.
    #[serde(default)]
    pub header: Option<String>,
    /// Texts of enclosing containers, nearest first.
    #[serde(default)]
    pub ancestor_texts: Vec<String>,
    /// Inside the collapsible navigation panel.
    #[serde(default)]
    pub in_nav_region: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ElementRole {
    Heading,
    Button,
    Link,
    Checkbox,
    Toggle,
    Slider,
    Radio,
    TextInput,
    Table,
    TableCell,
    TableHeader,
    ChartImage,
    ChartCanvas,
    Generic,
}

impl ElementRole {
    fn parse(s: Option<&str>) -> Self {
        match s.unwrap_or("") {
            "heading" => Self::Heading,
            "button" => Self::Button,
            "link" => Self::Link,
            "checkbox" => Self::Checkbox,
            "toggle" => Self::Toggle,
            "slider" => Self::Slider,
            "radio" => Self::Radio,
            "textInput" => Self::TextInput,
            "table" => Self::Table,
            "tableCell" => Self::TableCell,
            "tableHeader" => Self::TableHeader,
            "chartImage" => Self::ChartImage,
            "chartCanvas" => Self::ChartCanvas,
            _ => Self::Generic,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SourceCategory {
    Heading,
    Button,
    Link,
    FormControl,
    TableCell,
    TableSummary,
    Chart,
    GenericText,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HoverResolution {
    pub text: String,
    pub category: SourceCategory,
}

fn resolution(text: String, category: SourceCategory) -> Option<HoverResolution> {
    if text.trim().is_empty() {
        return None;
    }
    Some(HoverResolution { text, category })
}

/// Strips decoration (emoji, symbols) from a control label the way narration
/// normalization does, so "💾 Save" reads as "Save".
fn clean_label(raw: &str) -> String {
    let mut cleaned = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c.is_alphanumeric() || c.is_whitespace() {
            cleaned.push(c);
        } else {
            cleaned.push(' ');
        }
    }
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn has_alphanumeric(s: &str) -> bool {
    s.chars().any(|c| c.is_alphanumeric())
}

/// Ordered resolution policy: role-specific extraction first, then the
/// element's own text when it is a readable size, then a short ancestor text
/// when the target itself yields nothing. Computed fresh per event; nothing
/// here is cached across elements.
pub fn resolve_element(el: &UiElement) -> Option<HoverResolution> {
    if let Some(res) = resolve_by_role(el) {
        return Some(res);
    }

    let text = el.text.trim();
    if text.len() >= 3 && text.len() <= 500 && has_alphanumeric(text) {
        return resolution(text.to_string(), SourceCategory::GenericText);
    }

    // Ancestor fallback: only a short container text is acceptable; a long
    // one would read an entire page section.
    for ancestor in el.ancestor_texts.iter().take(3) {
        let text = ancestor.trim();
        if !text.is_empty() && text.len() < 100 && has_alphanumeric(text) {
            return resolution(text.to_string(), SourceCategory::GenericText);
        }
    }

    None
}

fn resolve_by_role(el: &UiElement) -> Option<HoverResolution> {
    let label = el
        .label
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(el.text.trim());

    match ElementRole::parse(el.role.as_deref()) {
        ElementRole::Heading => {
            let text = el.text.trim();
            if text.is_empty() {
                return None;
            }
            resolution(format!("Heading: {}", text), SourceCategory::Heading)
        }
        ElementRole::Button => {
            let cleaned = clean_label(label);
            let text = if cleaned.is_empty() {
                "button".to_string()
            } else {
                format!("Button {}", cleaned)
            };
            resolution(text, SourceCategory::Button)
        }
        ElementRole::Link => {
            let text = if label.is_empty() {
                "link".to_string()
            } else {
                label.to_string()
            };
            resolution(text, SourceCategory::Link)
        }
        ElementRole::Checkbox => {
            if label.is_empty() {
                return None;
            }
            let state = if el.checked.unwrap_or(false) {
                "checked"
            } else {
                "unchecked"
            };
            resolution(
                format!("Checkbox {}, {}", clean_label(label), state),
                SourceCategory::FormControl,
            )
        }
        ElementRole::Toggle => {
            if label.is_empty() {
                return None;
            }
            let state = if el.checked.unwrap_or(false) { "on" } else { "off" };
            resolution(
                format!("Switch {}, {}", clean_label(label), state),
                SourceCategory::FormControl,
            )
        }
        ElementRole::Slider => {
            if label.is_empty() {
                return None;
            }
            let value = el.value.as_deref().unwrap_or("");
            resolution(
                format!("{}, value {}", clean_label(label), value),
                SourceCategory::FormControl,
            )
        }
        ElementRole::Radio => {
            if label.is_empty() || label.len() >= 200 {
                return None;
            }
            let mut text = clean_label(label);
            if el.selected.unwrap_or(false) {
                text.push_str(", selected");
            }
            resolution(text, SourceCategory::FormControl)
        }
        ElementRole::TextInput => {
            if label.is_empty() {
                return None;
            }
            let text = match el.value.as_deref().filter(|v| !v.is_empty()) {
                Some(v) => format!("{}: {}", label, v),
                None => label.to_string(),
            };
            resolution(text, SourceCategory::FormControl)
        }
        ElementRole::Table => {
            let rows = el.row_count.unwrap_or(0);
            let cols = el.column_count.unwrap_or(el.columns.len() as u64);
            let mut text = "Data table".to_string();
            if let Some(title) = el.title.as_deref().filter(|t| !t.is_empty()) {
                text.push_str(&format!(": {}", title));
            }
            text.push_str(&format!(". Contains {} rows", rows));
            if cols > 0 {
                text.push_str(&format!(" and {} columns", cols));
                if !el.columns.is_empty() && el.columns.len() <= 6 {
                    text.push_str(&format!(": {}", el.columns.join(", ")));
                }
            }
            text.push_str(". Hover over a cell to read its contents.");
            resolution(text, SourceCategory::TableSummary)
        }
        ElementRole::TableCell => {
            let cell = el.text.trim();
            if cell.is_empty() {
                return None;
            }
            let text = match el.header.as_deref().filter(|h| !h.is_empty()) {
                Some(header) => format!("{}: {}", header, cell),
                None => cell.to_string(),
            };
            resolution(text, SourceCategory::TableCell)
        }
        ElementRole::TableHeader => {
            let text = el.text.trim();
            if text.is_empty() {
                return None;
            }
            resolution(
                format!("Column header: {}", text),
                SourceCategory::TableCell,
            )
        }
        ElementRole::ChartImage | ElementRole::ChartCanvas => {
            let title = el.title.as_deref().unwrap_or("");
            resolution(narration::chart_narrative(title), SourceCategory::Chart)
        }
        ElementRole::Generic => None,
    }
}

// ===== coordinator =====

/// Empirically tuned thresholds carried from the production dashboard; all of
/// them are plain configuration, not load-bearing constants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HoverConfig {
    pub debounce_ms: u64,
    pub nav_debounce_ms: u64,
    pub burst_window_ms: u64,
    pub burst_threshold: u32,
    pub cooldown_ms: u64,
    pub intro_delay_ms: u64,
}

impl Default for HoverConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 300,
            nav_debounce_ms: 800,
            burst_window_ms: 100,
            burst_threshold: 3,
            cooldown_ms: 2000,
            intro_delay_ms: 1000,
        }
    }
}

impl HoverConfig {
    pub fn merge_json(&mut self, patch: &Value) {
        let Some(obj) = patch.as_object() else {
            return;
        };
        if let Some(v) = obj.get("debounceMs").and_then(|v| v.as_u64()) {
            self.debounce_ms = v;
        }
        if let Some(v) = obj.get("navDebounceMs").and_then(|v| v.as_u64()) {
            self.nav_debounce_ms = v;
        }
        if let Some(v) = obj.get("burstWindowMs").and_then(|v| v.as_u64()) {
            self.burst_window_ms = v;
        }
        if let Some(v) = obj.get("burstThreshold").and_then(|v| v.as_u64()) {
            self.burst_threshold = v as u32;
        }
        if let Some(v) = obj.get("cooldownMs").and_then(|v| v.as_u64()) {
            self.cooldown_ms = v;
        }
        if let Some(v) = obj.get("introDelayMs").and_then(|v| v.as_u64()) {
            self.intro_delay_ms = v;
        }
    }
}

const NAV_INTRO_TEXT: &str = "The navigation menu has been expanded. Here you will find \
navigation options, data refresh controls, and display settings. Hover over an item to \
hear it.";

#[derive(Debug, Clone)]
enum HoverState {
    Idle,
    Debouncing { element: Box<UiElement>, deadline: u64 },
    Suppressed { until: u64 },
}

/// What the coordinator wants done after digesting an event or a tick. The
/// session layer forwards Speak actions to the narration engine.
#[derive(Debug, Clone, PartialEq)]
pub enum HoverAction {
    CancelSpeech,
    Speak {
        text: String,
        category: SourceCategory,
    },
}

/// Pointer-driven narration with noise suppression. Raw pointer-over streams
/// are unusable directly: crossing a nested layout fires many events per
/// second, and opening a panel fires synthetic storms that have nothing to do
/// with user intent. Debounce keeps only the last target of a quiet window;
/// burst detection mutes a transitioning region entirely, then introduces it
/// exactly once.
#[derive(Debug)]
pub struct HoverCoordinator {
    pub config: HoverConfig,
    state: HoverState,
    active: bool,
    last_element_id: Option<String>,
    last_text: Option<String>,
    last_event_at: u64,
    rapid_events: u32,
    /// Nav-region events are dropped until this instant, independently of the
    /// debounce state, so pointer work outside the panel keeps flowing while
    /// the panel itself stays muted for the whole cooldown.
    nav_muted_until: u64,
    nav_visible: bool,
    nav_introduced: bool,
    intro_due_at: Option<u64>,
}

impl Default for HoverCoordinator {
    fn default() -> Self {
        Self::new(HoverConfig::default())
    }
}

impl HoverCoordinator {
    pub fn new(config: HoverConfig) -> Self {
        Self {
            config,
            state: HoverState::Idle,
            active: false,
            last_element_id: None,
            last_text: None,
            last_event_at: 0,
            rapid_events: 0,
            nav_muted_until: 0,
            nav_visible: false,
            nav_introduced: false,
            intro_due_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn activate(&mut self) {
        self.active = true;
    }

    pub fn deactivate(&mut self) {
        self.active = false;
        self.state = HoverState::Idle;
        self.intro_due_at = None;
        self.last_element_id = None;
        self.last_text = None;
        self.rapid_events = 0;
        self.nav_muted_until = 0;
    }

    pub fn state_name(&self) -> &'static str {
        match self.state {
            HoverState::Idle => "idle",
            HoverState::Debouncing { .. } => "debouncing",
            HoverState::Suppressed { .. } => "suppressed",
        }
    }

    /// A pointer-over event from the host. Never narrates synchronously; at
    /// most it (re)arms the debounce timer, so rapid target changes collapse
    /// into a single resolution of the final target.
    pub fn on_pointer_over(
        &mut self,
        element: UiElement,
        nav_visible: bool,
        now: u64,
    ) -> Vec<HoverAction> {
        if !self.active {
            return Vec::new();
        }

        let mut actions = Vec::new();

        // Panel visibility transitions. Becoming visible schedules one
        // introduction after the panel settles; hiding re-arms it.
        if nav_visible && !self.nav_visible && !self.nav_introduced {
            actions.push(HoverAction::CancelSpeech);
            self.intro_due_at = Some(now + self.config.intro_delay_ms);
        }
        if !nav_visible && self.nav_visible {
            self.nav_introduced = false;
            self.intro_due_at = None;
        }
        self.nav_visible = nav_visible;

        if element.in_nav_region {
            if now.saturating_sub(self.last_event_at) < self.config.burst_window_ms {
                self.rapid_events += 1;
            } else {
                self.rapid_events = 0;
            }
            self.last_event_at = now;

            if self.rapid_events > self.config.burst_threshold {
                // The panel is sliding; everything from it is synthetic noise.
                self.nav_muted_until = now + self.config.cooldown_ms;
                self.state = HoverState::Suppressed {
                    until: self.nav_muted_until,
                };
                return actions;
            }

            if now < self.nav_muted_until {
                return actions;
            }
        } else {
            self.rapid_events = 0;
            self.last_event_at = now;
        }

        if let HoverState::Suppressed { until } = self.state {
            if now >= until {
                self.state = HoverState::Idle;
                self.rapid_events = 0;
            }
            // A non-nav event during the cooldown proceeds to debounce below;
            // the panel itself stays muted through nav_muted_until.
        }

        let delay = if element.in_nav_region {
            self.config.nav_debounce_ms
        } else {
            self.config.debounce_ms
        };
        self.state = HoverState::Debouncing {
            deadline: now + delay,
            element: Box::new(element),
        };
        actions
    }

    /// Clock tick from the host's render loop: fires due debounce timers,
    /// ends cooldowns, and emits the pending panel introduction.
    pub fn poll(&mut self, now: u64) -> Vec<HoverAction> {
        if !self.active {
            return Vec::new();
        }

        let mut actions = Vec::new();

        if let HoverState::Suppressed { until } = self.state {
            if now >= until {
                self.state = HoverState::Idle;
                self.rapid_events = 0;
            }
        }

        // The introduction waits out both its settle delay and any active
        // panel cooldown, then plays exactly once per visibility transition.
        if let Some(due) = self.intro_due_at {
            if now >= due && now >= self.nav_muted_until {
                self.intro_due_at = None;
                self.nav_introduced = true;
                actions.push(HoverAction::Speak {
                    text: NAV_INTRO_TEXT.to_string(),
                    category: SourceCategory::GenericText,
                });
            }
        }

        let timer_fired =
            matches!(&self.state, HoverState::Debouncing { deadline, .. } if now >= *deadline);
        if timer_fired {
            let HoverState::Debouncing { element, .. } =
                std::mem::replace(&mut self.state, HoverState::Idle)
            else {
                unreachable!();
            };
            if self.last_element_id.as_deref() != Some(element.id.as_str()) {
                self.last_element_id = Some(element.id.clone());
                if let Some(resolved) = resolve_element(&element) {
                    if self.last_text.as_deref() != Some(resolved.text.as_str()) {
                        self.last_text = Some(resolved.text.clone());
                        actions.push(HoverAction::Speak {
                            text: resolved.text,
                            category: resolved.category,
                        });
                    }
                }
            }
        }

        actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generic(id: &str, text: &str) -> UiElement {
        UiElement {
            id: id.to_string(),
            role: None,
            text: text.to_string(),
            label: None,
            value: None,
            checked: None,
            selected: None,
            row_count: None,
            column_count: None,
            columns: Vec::new(),
            title: None,
            header: None,
            ancestor_texts: Vec::new(),
            in_nav_region: false,
        }
    }

    fn nav(id: &str, text: &str) -> UiElement {
        let mut el = generic(id, text);
        el.in_nav_region = true;
        el
    }

    fn speaks(actions: &[HoverAction]) -> Vec<String> {
        actions
            .iter()
            .filter_map(|a| match a {
                HoverAction::Speak { text, .. } => Some(text.clone()),
                HoverAction::CancelSpeech => None,
            })
            .collect()
    }

    fn active_coordinator() -> HoverCoordinator {
        let mut c = HoverCoordinator::default();
        c.activate();
        c
    }

    #[test]
    fn button_resolution_names_the_label() {
        let mut el = generic("b1", "");
        el.role = Some("button".into());
        el.label = Some("💾 Save".into());
        let res = resolve_element(&el).expect("resolves");
        assert_eq!(res.category, SourceCategory::Button);
        assert!(res.text.contains("Button"));
        assert!(res.text.contains("Save"));
    }

    #[test]
    fn checkbox_reports_state() {
        let mut el = generic("c1", "");
        el.role = Some("checkbox".into());
        el.label = Some("Dark mode".into());
        el.checked = Some(true);
        let res = resolve_element(&el).unwrap();
        assert_eq!(res.text, "Checkbox Dark mode, checked");
        assert_eq!(res.category, SourceCategory::FormControl);
    }

    #[test]
    fn table_summary_includes_counts_and_hint() {
        let mut el = generic("t1", "");
        el.role = Some("table".into());
        el.title = Some("Students with final grade".into());
        el.row_count = Some(28);
        el.columns = vec!["Name".into(), "Score".into()];
        let res = resolve_element(&el).unwrap();
        assert_eq!(res.category, SourceCategory::TableSummary);
        assert!(res.text.contains("28 rows"));
        assert!(res.text.contains("Name, Score"));
        assert!(res.text.contains("Hover over a cell"));
    }

    #[test]
    fn table_cell_prefixes_its_column_header() {
        let mut el = generic("td1", "87.5");
        el.role = Some("tableCell".into());
        el.header = Some("Score".into());
        let res = resolve_element(&el).unwrap();
        assert_eq!(res.text, "Score: 87.5");
        assert_eq!(res.category, SourceCategory::TableCell);
    }

    #[test]
    fn chart_image_uses_title_narrative() {
        let mut el = generic("img1", "");
        el.role = Some("chartImage".into());
        el.title = Some("Grade distribution".into());
        let res = resolve_element(&el).unwrap();
        assert_eq!(res.category, SourceCategory::Chart);
        assert!(res.text.contains("histogram"));
        assert!(res.text.contains("70 points"));
    }

    #[test]
    fn ancestor_fallback_rejects_long_container_text() {
        let mut el = generic("g1", "");
        el.ancestor_texts = vec!["x".repeat(150), "Short summary".to_string()];
        let res = resolve_element(&el).unwrap();
        assert_eq!(res.text, "Short summary");

        let mut el = generic("g2", "");
        el.ancestor_texts = vec!["x".repeat(150)];
        assert!(resolve_element(&el).is_none());
    }

    #[test]
    fn direct_text_needs_readable_length_and_an_alphanumeric() {
        assert!(resolve_element(&generic("g1", "ok")).is_none());
        assert!(resolve_element(&generic("g2", "•••")).is_none());
        assert!(resolve_element(&generic("g3", &"x".repeat(501))).is_none());
        assert!(resolve_element(&generic("g4", "Average grade: 82")).is_some());
    }

    #[test]
    fn rapid_retargeting_resolves_only_the_last_target() {
        let mut c = active_coordinator();
        c.on_pointer_over(generic("a", "First block of text"), false, 0);
        c.on_pointer_over(generic("b", "Second block of text"), false, 50);
        c.on_pointer_over(generic("c", "Third block of text"), false, 100);

        // Before the (restarted) window elapses nothing fires.
        assert!(speaks(&c.poll(350)).is_empty());
        let spoken = speaks(&c.poll(450));
        assert_eq!(spoken, vec!["Third block of text".to_string()]);
        // And nothing further on later ticks.
        assert!(speaks(&c.poll(600)).is_empty());
    }

    #[test]
    fn nav_region_uses_the_longer_debounce() {
        let mut c = active_coordinator();
        c.on_pointer_over(nav("n1", "Quality analysis section"), true, 0);
        assert!(speaks(&c.poll(400)).is_empty());
        // 800ms nav debounce; the intro for the freshly visible panel fires
        // first at its own 1s delay.
        let at_800 = speaks(&c.poll(800));
        assert_eq!(at_800, vec!["Quality analysis section".to_string()]);
    }

    #[test]
    fn same_element_is_not_resolved_twice() {
        let mut c = active_coordinator();
        c.on_pointer_over(generic("a", "Read me once"), false, 0);
        assert_eq!(speaks(&c.poll(300)).len(), 1);
        c.on_pointer_over(generic("a", "Read me once"), false, 400);
        assert!(speaks(&c.poll(800)).is_empty());
    }

    #[test]
    fn burst_inside_nav_region_suppresses_and_introduces_once() {
        let mut c = active_coordinator();
        // 5 events within 50ms: a panel sliding open.
        for (i, at) in [0u64, 10, 20, 30, 40].iter().enumerate() {
            let el = nav(&format!("n{}", i), &format!("Menu entry {}", i));
            c.on_pointer_over(el, true, *at);
        }
        assert_eq!(c.state_name(), "suppressed");

        // Nothing speaks during the burst or the cooldown.
        assert!(speaks(&c.poll(100)).is_empty());
        assert!(speaks(&c.poll(1500)).is_empty());

        // After the cooldown the deferred introduction fires exactly once.
        let after = speaks(&c.poll(2100));
        assert_eq!(after.len(), 1);
        assert!(after[0].contains("navigation menu"));
        assert!(speaks(&c.poll(2500)).is_empty());
    }

    #[test]
    fn nav_intro_rearms_after_panel_hides() {
        let mut c = active_coordinator();
        c.on_pointer_over(nav("n1", "Menu entry"), true, 0);
        let intro = speaks(&c.poll(1000));
        assert!(intro.iter().any(|t| t.contains("navigation menu")));

        // Panel closes, then reopens: the introduction plays again.
        c.on_pointer_over(generic("g1", "Main content area"), false, 3000);
        c.on_pointer_over(nav("n2", "Menu entry"), true, 5000);
        let reintro = speaks(&c.poll(6000));
        assert!(reintro.iter().any(|t| t.contains("navigation menu")));
    }

    #[test]
    fn events_outside_nav_keep_flowing_while_nav_is_suppressed() {
        let mut c = active_coordinator();
        for (i, at) in [0u64, 10, 20, 30, 40].iter().enumerate() {
            c.on_pointer_over(nav(&format!("n{}", i), "Menu entry"), true, *at);
        }
        assert_eq!(c.state_name(), "suppressed");

        c.on_pointer_over(generic("g1", "Dashboard summary text"), true, 200);
        let spoken = speaks(&c.poll(500));
        assert_eq!(spoken, vec!["Dashboard summary text".to_string()]);
    }

    #[test]
    fn inactive_coordinator_ignores_everything() {
        let mut c = HoverCoordinator::default();
        assert!(c
            .on_pointer_over(generic("a", "Some readable text"), false, 0)
            .is_empty());
        assert!(c.poll(1000).is_empty());
    }

    #[test]
    fn same_text_on_different_elements_is_deduplicated() {
        let mut c = active_coordinator();
        c.on_pointer_over(generic("a", "Duplicate caption"), false, 0);
        assert_eq!(speaks(&c.poll(300)).len(), 1);
        c.on_pointer_over(generic("b", "Duplicate caption"), false, 400);
        assert!(speaks(&c.poll(800)).is_empty());
    }
}
