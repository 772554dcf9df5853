use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

// How long speak() waits for the host to register its voice inventory before
// dispatching with a bare locale. Mirrors the voice-load timeout browsers need.
pub const VOICE_WAIT_MS: u64 = 1000;

// ===== description templates =====

/// Deterministic chart description. Recognized stat keys are appended as
/// sentences in a fixed order; anything else is ignored.
pub fn describe_chart(kind: &str, title: &str, stats: Option<&Value>) -> String {
    let mut text = format!("Chart of type {}. ", kind);
    if !title.is_empty() {
        text.push_str(&format!("Title: {}. ", title));
    }
    if let Some(stats) = stats.and_then(|v| v.as_object()) {
        for (key, label) in [
            ("max", "Maximum value"),
            ("min", "Minimum value"),
            ("mean", "Average"),
            ("count", "Total items"),
        ] {
            if let Some(v) = stats.get(key) {
                text.push_str(&format!("{}: {}. ", label, stat_value(v)));
            }
        }
    }
    text
}

fn stat_value(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn describe_button(label: &str, action: &str) -> String {
    let mut text = format!("Button: {}. ", label);
    if !action.is_empty() {
        text.push_str(&format!("Action: {}. ", action));
    }
    text
}

/// Option lists truncate at five entries with a spoken "+N more" suffix so a
/// long dropdown never becomes a minute of narration.
pub fn describe_dropdown(label: &str, options: &[String], selected: &str) -> String {
    let mut text = format!("Dropdown menu: {}. ", label);
    let shown: Vec<&str> = options.iter().take(5).map(|s| s.as_str()).collect();
    text.push_str(&format!("Available options: {}. ", shown.join(", ")));
    if options.len() > 5 {
        text.push_str(&format!("And {} more options. ", options.len() - 5));
    }
    if !selected.is_empty() {
        text.push_str(&format!("Selected option: {}. ", selected));
    }
    text
}

pub fn describe_table(row_count: usize, columns: &[String], note: &str) -> String {
    let mut text = format!("Table with {} rows and {} columns. ", row_count, columns.len());
    if !note.is_empty() {
        text.push_str(&format!("{}. ", note));
    }
    text.push_str(&format!("Columns: {}. ", columns.join(", ")));
    text
}

/// Row-by-row rendering of tabular data handed over by the data provider,
/// capped at `limit` rows.
pub fn read_table_preview(rows: &[Value], columns: &[String], limit: usize) -> String {
    if rows.is_empty() {
        return "Empty table. ".to_string();
    }
    let mut text = describe_table(rows.len(), columns, "");
    let shown = rows.len().min(limit);
    text.push_str(&format!("Reading the first {} rows: ", shown));
    for (i, row) in rows.iter().take(shown).enumerate() {
        text.push_str(&format!("Row {}: ", i + 1));
        if let Some(obj) = row.as_object() {
            for col in columns {
                if let Some(v) = obj.get(col) {
                    text.push_str(&format!("{}: {}, ", col, stat_value(v)));
                }
            }
        } else if let Some(cells) = row.as_array() {
            for (col, v) in columns.iter().zip(cells) {
                text.push_str(&format!("{}: {}, ", col, stat_value(v)));
            }
        }
        text.push_str(". ");
    }
    text
}

/// Long-form narration for a dashboard figure, keyed on its title. These are
/// the canned walkthroughs the hover reader speaks for chart images.
pub fn chart_narrative(title: &str) -> String {
    if title.is_empty() {
        return "Chart or image".to_string();
    }
    let mut text = format!("Chart: {}.", title);
    let lower = title.to_lowercase();
    if lower.contains("distribution") || lower.contains("histogram") {
        text.push_str(
            " This histogram shows how final grades are distributed. Each vertical bar \
             counts the students falling in one grade range from 0 to 100 points, with \
             reference lines for the passing threshold at 70 points, the mean, and the \
             median. It lets you see at a glance whether most students pass and where \
             grades concentrate.",
        );
    } else if lower.contains("pareto") || lower.contains("risk factor") {
        text.push_str(
            " This Pareto diagram ranks risk factors from most to least frequent. Bars \
             show each factor's frequency and the line shows the cumulative percentage; \
             the factors on the left account for most of the problems and deserve \
             attention first.",
        );
    } else if lower.contains("control") {
        text.push_str(
            " This control chart tracks the stability of a process over time. The center \
             line is the mean and the dashed lines are the control limits; points outside \
             those limits signal out-of-control variation that needs attention.",
        );
    } else if lower.contains("scatter") || lower.contains("dispersion") {
        text.push_str(
            " This scatter plot relates two numeric variables. Each point is one \
             observation; points forming a line suggest a strong correlation, while a \
             diffuse cloud means no clear relationship.",
        );
    } else if lower.contains("trend") {
        text.push_str(
            " This bar chart shows the average grade per academic unit. Bars rising from \
             left to right mean performance improved over the term; falling bars mean it \
             declined. Each bar is labeled with its exact average.",
        );
    }
    text
}

// ===== text normalization =====

/// Collapses whitespace and strips everything outside a safe set of letters,
/// digits and sentence punctuation, so downstream speech synthesis never sees
/// control characters or markup fragments.
pub fn normalize_speech_text(raw: &str) -> String {
    let mut cleaned = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c.is_alphanumeric() || c == '_' || ".,;:!?-".contains(c) {
            cleaned.push(c);
        } else if c.is_whitespace() {
            cleaned.push(' ');
        }
        // Anything else is dropped.
    }
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ===== speech port =====

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceInfo {
    pub name: String,
    pub locale: String,
    #[serde(default)]
    pub default: bool,
}

/// Best-available voice for a requested locale: exact match, then same
/// language with a region, then bare language prefix, then any default voice.
/// A missing voice is never an error; the utterance ships with the locale only.
pub fn select_voice<'a>(voices: &'a [VoiceInfo], locale: &str) -> Option<&'a VoiceInfo> {
    let prefix = locale.split('-').next().unwrap_or(locale);
    let regional = format!("{}-", prefix);
    voices
        .iter()
        .find(|v| v.locale == locale)
        .or_else(|| voices.iter().find(|v| v.locale.starts_with(&regional)))
        .or_else(|| voices.iter().find(|v| v.locale == prefix))
        .or_else(|| voices.iter().find(|v| v.default))
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Utterance {
    pub id: String,
    pub text: String,
    pub rate: f64,
    pub locale: String,
    pub voice: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SpeechDirective {
    /// Stop whatever is playing before the next utterance starts.
    Cancel,
    Speak { utterance: Utterance },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechError {
    Unsupported,
    Playback(String),
}

impl SpeechError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unsupported => "speech_unsupported",
            Self::Playback(_) => "speech_playback_error",
        }
    }
}

/// Output channel the engine dispatches into. The default implementation
/// queues directives for the host to drain and execute; tests read the queue
/// directly.
pub trait SpeechSink {
    fn available(&self) -> bool;
    fn dispatch(&mut self, utterance: &Utterance) -> Result<(), SpeechError>;
    fn cancel(&mut self);
}

#[derive(Debug)]
pub struct HostSink {
    pub supported: bool,
    pub queue: Vec<SpeechDirective>,
}

impl HostSink {
    pub fn new() -> Self {
        Self {
            // Until the host says otherwise, assume it can play speech.
            supported: true,
            queue: Vec::new(),
        }
    }

    pub fn drain(&mut self) -> Vec<SpeechDirective> {
        std::mem::take(&mut self.queue)
    }
}

impl SpeechSink for HostSink {
    fn available(&self) -> bool {
        self.supported
    }

    fn dispatch(&mut self, utterance: &Utterance) -> Result<(), SpeechError> {
        if !self.supported {
            return Err(SpeechError::Unsupported);
        }
        self.queue.push(SpeechDirective::Speak {
            utterance: utterance.clone(),
        });
        Ok(())
    }

    fn cancel(&mut self) {
        self.queue.push(SpeechDirective::Cancel);
    }
}

/// Alternate output path when the host has no speech capability: narration
/// text accumulates as a transcript the host can render visually.
#[derive(Debug, Default)]
pub struct TranscriptSink {
    pub entries: Vec<String>,
}

impl TranscriptSink {
    pub fn drain(&mut self) -> Vec<String> {
        std::mem::take(&mut self.entries)
    }
}

// ===== engine =====

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeakOutcome {
    Disabled,
    Empty,
    Duplicate,
    Dispatched { utterance_id: String },
    /// Queued until the host registers voices or the wait times out.
    AwaitingVoices,
    /// Speech channel unavailable; the text went to the transcript fallback.
    FellBack,
    /// Both output paths failed; recoverable notice for the settings panel.
    Failed,
}

#[derive(Debug, Clone)]
struct PendingUtterance {
    text: String,
    rate: f64,
    locale: String,
    deadline_ms: u64,
}

#[derive(Debug)]
pub struct NarrationEngine {
    voices: Vec<VoiceInfo>,
    voices_known: bool,
    pub host: HostSink,
    pub transcript: TranscriptSink,
    pending: Option<PendingUtterance>,
    last_spoken: Option<String>,
    last_dispatched: Option<(String, String)>,
    pub speaking: bool,
    unsupported_notified: bool,
}

impl Default for NarrationEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl NarrationEngine {
    pub fn new() -> Self {
        Self {
            voices: Vec::new(),
            voices_known: false,
            host: HostSink::new(),
            transcript: TranscriptSink::default(),
            pending: None,
            last_spoken: None,
            last_dispatched: None,
            speaking: false,
            unsupported_notified: false,
        }
    }

    /// Host voice inventory arrived. Flushes any utterance held while waiting.
    pub fn register_voices(&mut self, voices: Vec<VoiceInfo>, supported: bool) {
        self.voices = voices;
        self.voices_known = true;
        self.host.supported = supported;
        if let Some(pending) = self.pending.take() {
            self.dispatch(pending.text, pending.rate, pending.locale);
        }
    }

    /// Fires the voice-wait timeout: a held utterance dispatches with no
    /// concrete voice once the deadline passes.
    pub fn poll(&mut self, now_ms: u64) -> Option<SpeakOutcome> {
        let due = matches!(&self.pending, Some(p) if now_ms >= p.deadline_ms);
        if !due {
            return None;
        }
        let pending = self.pending.take()?;
        Some(self.dispatch(pending.text, pending.rate, pending.locale))
    }

    /// The speak contract: no-op when narration is disabled, normalize, skip
    /// empty and repeated text, then cancel-and-dispatch. A new request always
    /// wins over whatever is in flight; nothing queues behind it.
    pub fn speak(
        &mut self,
        text: &str,
        rate: f64,
        locale: &str,
        enabled: bool,
        now_ms: u64,
    ) -> SpeakOutcome {
        if !enabled {
            return SpeakOutcome::Disabled;
        }
        let normalized = normalize_speech_text(text);
        if normalized.is_empty() {
            return SpeakOutcome::Empty;
        }
        if self.last_spoken.as_deref() == Some(normalized.as_str()) {
            return SpeakOutcome::Duplicate;
        }

        if !self.voices_known {
            // Hold until the inventory arrives; a newer request replaces an
            // older held one (last request wins even before dispatch).
            let deadline_ms = self
                .pending
                .as_ref()
                .map(|p| p.deadline_ms)
                .unwrap_or(now_ms + VOICE_WAIT_MS);
            self.pending = Some(PendingUtterance {
                text: normalized,
                rate,
                locale: locale.to_string(),
                deadline_ms,
            });
            return SpeakOutcome::AwaitingVoices;
        }

        self.dispatch(normalized, rate, locale.to_string())
    }

    fn dispatch(&mut self, normalized: String, rate: f64, locale: String) -> SpeakOutcome {
        let voice = select_voice(&self.voices, &locale).map(|v| v.name.clone());
        let utterance = Utterance {
            id: Uuid::new_v4().to_string(),
            text: normalized.clone(),
            rate,
            locale,
            voice,
        };

        if !self.host.available() {
            self.transcript.entries.push(utterance.text);
            self.last_spoken = Some(normalized);
            return SpeakOutcome::FellBack;
        }

        self.host.cancel();
        match self.host.dispatch(&utterance) {
            Ok(()) => {
                self.speaking = true;
                self.last_spoken = Some(normalized.clone());
                self.last_dispatched = Some((utterance.id.clone(), normalized));
                SpeakOutcome::Dispatched {
                    utterance_id: utterance.id,
                }
            }
            Err(SpeechError::Unsupported) => {
                self.transcript.entries.push(utterance.text.clone());
                self.last_spoken = Some(normalized);
                SpeakOutcome::FellBack
            }
            Err(SpeechError::Playback(_)) => SpeakOutcome::Failed,
        }
    }

    /// Interrupts playback without touching the dedup bookkeeping; used when
    /// a noisy UI transition should just silence the current utterance.
    pub fn cancel_current(&mut self) {
        if self.host.available() {
            self.host.cancel();
        }
        self.pending = None;
        self.speaking = false;
    }

    /// Single cancellation entry point; safe to call when nothing is playing.
    /// Clearing last-spoken lets the same text be requested again afterwards.
    pub fn stop(&mut self) {
        self.cancel_current();
        self.last_spoken = None;
        self.last_dispatched = None;
    }

    /// Playback callback from the host. A failed utterance clears its dedup
    /// entry so the identical text can be retried; later requests are
    /// unaffected either way.
    pub fn on_playback_result(&mut self, utterance_id: &str, result: Result<(), SpeechError>) {
        self.speaking = false;
        if result.is_ok() {
            return;
        }
        if let Some((id, text)) = &self.last_dispatched {
            if id == utterance_id && self.last_spoken.as_deref() == Some(text.as_str()) {
                self.last_spoken = None;
            }
        }
    }

    /// One-time environment notice when speech is unsupported.
    pub fn take_unsupported_notice(&mut self) -> bool {
        if self.host.supported || self.unsupported_notified {
            return false;
        }
        self.unsupported_notified = true;
        true
    }
}
