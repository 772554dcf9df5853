use serde::Serialize;

use crate::prefs::{ColorVisionMode, PrefRecord};

/// One visual transform the host must apply. The list order is part of the
/// contract: later directives supersede earlier ones, so high-contrast-dark
/// wins over plain dark mode.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum TransformDirective {
    BaseTextScale {
        percent: i64,
    },
    LoginTextScale {
        percent: i64,
    },
    DyslexiaSpacing {
        letter_em: f64,
        word_em: f64,
        line_multiplier: f64,
    },
    DarkMode,
    HighContrastLight,
    HighContrastDark,
    ColorVisionPalette {
        mode: String,
    },
    ConcentrationMode,
    FocusHighlight,
}

/// Deterministic: the same record always yields the same directives in the
/// same order. There is no failure path; odd values were already normalized
/// at `set`.
pub fn render_active_transforms(prefs: &PrefRecord) -> Vec<TransformDirective> {
    let mut out = vec![TransformDirective::BaseTextScale {
        percent: prefs.text_scale,
    }];

    if prefs.text_scale_login != 100 {
        out.push(TransformDirective::LoginTextScale {
            percent: prefs.text_scale_login,
        });
    }

    if prefs.dyslexia_font {
        out.push(TransformDirective::DyslexiaSpacing {
            letter_em: prefs.letter_spacing_em,
            word_em: prefs.word_spacing_em,
            line_multiplier: prefs.line_spacing,
        });
    }

    if prefs.dark_mode {
        out.push(TransformDirective::DarkMode);
    }

    if prefs.contrast {
        if prefs.dark_mode {
            out.push(TransformDirective::HighContrastDark);
        } else {
            out.push(TransformDirective::HighContrastLight);
        }
    }

    if prefs.color_vision != ColorVisionMode::None {
        out.push(TransformDirective::ColorVisionPalette {
            mode: prefs.color_vision.as_str().to_string(),
        });
    }

    if prefs.concentration {
        out.push(TransformDirective::ConcentrationMode);
    }

    if prefs.focus_highlight {
        out.push(TransformDirective::FocusHighlight);
    }

    out
}

// Substitution palettes chosen to stay distinguishable for each vision type:
// protanopia avoids reds, deuteranopia avoids greens, tritanopia avoids blues.
const PROTANOPIA_PALETTE: [&str; 8] = [
    "#FFB800", "#7B2D8E", "#0066CC", "#00CCCC", "#CC9900", "#003366", "#9966CC", "#FFCC00",
];
const DEUTERANOPIA_PALETTE: [&str; 8] = [
    "#FF6600", "#0055AA", "#CC0066", "#00AACC", "#996600", "#003355", "#FF9933", "#6699CC",
];
const TRITANOPIA_PALETTE: [&str; 8] = [
    "#CC3300", "#009933", "#990000", "#996600", "#006600", "#663300", "#FF6633", "#339966",
];

pub fn palette_for(mode: ColorVisionMode) -> Option<&'static [&'static str]> {
    match mode {
        ColorVisionMode::None => None,
        ColorVisionMode::Protanopia => Some(&PROTANOPIA_PALETTE),
        ColorVisionMode::Deuteranopia => Some(&DEUTERANOPIA_PALETTE),
        ColorVisionMode::Tritanopia => Some(&TRITANOPIA_PALETTE),
    }
}

/// Series colors for the report renderer, cycling the palette when a figure
/// has more series than the palette has entries. None means "use your own
/// defaults" — no mode is active.
pub fn chart_colors(mode: ColorVisionMode, count: usize) -> Option<Vec<String>> {
    let palette = palette_for(mode)?;
    Some(
        (0..count)
            .map(|i| palette[i % palette.len()].to_string())
            .collect(),
    )
}

/// Figure-level styling companion to the palette: which colors to use for
/// bars, lines, points and chrome so whole figures stay readable, not just
/// the series cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartStyle {
    pub bar_color: &'static str,
    pub line_color: &'static str,
    pub scatter_color: &'static str,
    pub background_color: &'static str,
    pub grid_color: &'static str,
    pub text_color: &'static str,
    pub edge_color: &'static str,
}

pub fn chart_style_for(mode: ColorVisionMode) -> Option<ChartStyle> {
    match mode {
        ColorVisionMode::None => None,
        ColorVisionMode::Protanopia => Some(ChartStyle {
            bar_color: "#FFB800",
            line_color: "#7B2D8E",
            scatter_color: "#0066CC",
            background_color: "#F5F8FF",
            grid_color: "#CCDDFF",
            text_color: "#003366",
            edge_color: "#003366",
        }),
        ColorVisionMode::Deuteranopia => Some(ChartStyle {
            bar_color: "#FF6600",
            line_color: "#0055AA",
            scatter_color: "#CC0066",
            background_color: "#F5F8FF",
            grid_color: "#CCE0FF",
            text_color: "#003355",
            edge_color: "#003355",
        }),
        ColorVisionMode::Tritanopia => Some(ChartStyle {
            bar_color: "#CC3300",
            line_color: "#009933",
            scatter_color: "#996600",
            background_color: "#FFFAF5",
            grid_color: "#FFE0CC",
            text_color: "#663300",
            edge_color: "#663300",
        }),
    }
}
