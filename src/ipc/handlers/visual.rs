use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::visual;
use serde_json::json;

fn handle_visual_transforms(state: &mut AppState, req: &Request) -> serde_json::Value {
    state.session.init_defaults();
    ok(
        &req.id,
        json!({
            "transforms": visual::render_active_transforms(&state.session.current),
        }),
    )
}

/// Series colors for the report renderer. A null list means no color-vision
/// mode is active and the renderer should keep its own defaults.
fn handle_visual_chart_colors(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(count) = req.params.get("count").and_then(|v| v.as_u64()) else {
        return err(&req.id, "bad_params", "missing count", None);
    };
    let mode = state.session.current.color_vision;
    ok(
        &req.id,
        json!({
            "mode": mode.as_str(),
            "colors": visual::chart_colors(mode, count as usize),
        }),
    )
}

fn handle_visual_chart_style(state: &mut AppState, req: &Request) -> serde_json::Value {
    let mode = state.session.current.color_vision;
    ok(
        &req.id,
        json!({
            "mode": mode.as_str(),
            "style": visual::chart_style_for(mode),
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "visual.transforms" => Some(handle_visual_transforms(state, req)),
        "visual.chartColors" => Some(handle_visual_chart_colors(state, req)),
        "visual.chartStyle" => Some(handle_visual_chart_style(state, req)),
        _ => None,
    }
}
