//! Browser entry point.

use crate::DefaultBackend;
use crate::config::{SimulationParameters, SurfaceSize};
use crate::desktop::FluidApp;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;

const WEB_DYE_RESOLUTION: u32 = 256;

/// Mounts the effect on the canvas with id `canvas_id`. Failure to create
/// a backend leaves the canvas empty; it never throws past this call.
#[wasm_bindgen]
pub async fn start(canvas_id: String) -> Result<(), JsValue> {
    console_error_panic_hook::set_once();
    // A second start on the same page keeps the first logger.
    let _ = console_log::init_with_level(log::Level::Info);

    let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
    let document = window
        .document()
        .ok_or_else(|| JsValue::from_str("no document"))?;
    let canvas = document
        .get_element_by_id(&canvas_id)
        .and_then(|element| element.dyn_into::<web_sys::HtmlCanvasElement>().ok())
        .ok_or_else(|| JsValue::from_str(&format!("no canvas with id `{canvas_id}`")))?;

    let surface = SurfaceSize::from_logical(
        canvas.client_width() as f32,
        canvas.client_height() as f32,
        window.device_pixel_ratio() as f32,
    );
    let mut params = SimulationParameters {
        dye_resolution: WEB_DYE_RESOLUTION,
        ..SimulationParameters::default()
    };
    // Canvases not laid out yet report a zero client size.
    if canvas.client_width() > 0 && canvas.client_height() > 0 {
        params = params.fitted_to(&surface);
    }
    log::info!(
        "mounting on #{canvas_id}: {}x{} device px, dye {}",
        surface.width,
        surface.height,
        params.dye_resolution
    );

    eframe::WebRunner::new()
        .start(
            &canvas_id,
            eframe::WebOptions::default(),
            Box::new(move |cc| Box::new(FluidApp::new(cc, params, || Ok(DefaultBackend::new())))),
        )
        .await
}
