use system::client::{FrameScheduler, RenderingSurface, SurfaceError, SyncClient};
use system::{decode_server_message, encode, Camera, Role, SessionKey};
use js_sys::Reflect;
use wasm_bindgen::prelude::*;

#[wasm_bindgen]
extern "C" {
    /// Map engine handed in by the page.
    pub type MapSurface;

    #[wasm_bindgen(method, catch, js_name = moveCamera)]
    fn move_camera(this: &MapSurface, latitude: f64, longitude: f64, zoom: f64)
        -> Result<(), JsValue>;

    #[wasm_bindgen(method, catch, js_name = setCenter)]
    fn set_center(this: &MapSurface, latitude: f64, longitude: f64) -> Result<(), JsValue>;

    #[wasm_bindgen(method, catch, js_name = setZoom)]
    fn set_zoom(this: &MapSurface, zoom: f64) -> Result<(), JsValue>;
}

/// Older map engines have no `moveCamera`; those get the two-step fallback.
fn has_method(target: &JsValue, name: &str) -> bool {
    Reflect::get(target, &JsValue::from_str(name)).map_or(false, |value| value.is_function())
}

struct JsSurface<'a>(&'a MapSurface);

impl RenderingSurface for JsSurface<'_> {
    fn move_camera(&mut self, camera: &Camera) -> Result<(), SurfaceError> {
        if !has_method(self.0.as_ref(), "moveCamera") {
            return Err(SurfaceError::AtomicUnsupported);
        }
        self.0
            .move_camera(camera.latitude, camera.longitude, camera.zoom)
            .map_err(|_| SurfaceError::Unavailable)
    }

    fn set_center(&mut self, latitude: f64, longitude: f64) -> Result<(), SurfaceError> {
        self.0
            .set_center(latitude, longitude)
            .map_err(|_| SurfaceError::Unavailable)
    }

    fn set_zoom(&mut self, zoom: f64) -> Result<(), SurfaceError> {
        self.0.set_zoom(zoom).map_err(|_| SurfaceError::Unavailable)
    }
}

/// The page owns `requestAnimationFrame`; it polls `takeFrameRequest()` and
/// runs `onFrame` from a single callback.
#[derive(Default)]
struct PolledFrames {
    generation: u32,
    requested: Option<u32>,
    taken: bool,
}

impl FrameScheduler for PolledFrames {
    type Handle = u32;

    fn request_frame(&mut self) -> u32 {
        self.generation = self.generation.wrapping_add(1);
        self.requested = Some(self.generation);
        self.taken = false;
        self.generation
    }

    fn cancel_frame(&mut self, handle: u32) {
        if self.requested == Some(handle) {
            self.requested = None;
        }
    }
}

fn to_js_error(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

#[wasm_bindgen]
pub struct GeoSyncClient {
    inner: SyncClient<PolledFrames>,
}

#[wasm_bindgen]
impl GeoSyncClient {
    #[wasm_bindgen(constructor)]
    pub fn new(session_id: &str, role: &str) -> Result<GeoSyncClient, JsValue> {
        let session_id: SessionKey = session_id.parse().map_err(to_js_error)?;
        let role = match role {
            "source" | "tracker" => Role::Source,
            "follower" | "tracked" => Role::Follower,
            other => return Err(JsValue::from_str(&format!("unknown role {:?}", other))),
        };
        Ok(GeoSyncClient {
            inner: SyncClient::new(session_id, role, PolledFrames::default()),
        })
    }

    /// Returns the join message to send, if any.
    #[wasm_bindgen(js_name = onConnected)]
    pub fn on_connected(&mut self) -> Result<Option<String>, JsValue> {
        self.inner
            .on_connected()
            .map(|message| encode(&message).map_err(to_js_error))
            .transpose()
    }

    #[wasm_bindgen(js_name = onDisconnected)]
    pub fn on_disconnected(&mut self) {
        self.inner.on_disconnected();
    }

    #[wasm_bindgen(js_name = handleMessage)]
    pub fn handle_message(&mut self, text: &str, wall_now: f64) -> Result<(), JsValue> {
        let message = decode_server_message(text).map_err(|e| {
            log::warn!("dropped server message: {}", e);
            to_js_error(e)
        })?;
        self.inner.handle_server_message(message, wall_now as i64);
        Ok(())
    }

    /// Returns the view update to send, if the throttle lets it through.
    #[wasm_bindgen(js_name = onCameraChanged)]
    pub fn on_camera_changed(
        &mut self,
        now: f64,
        latitude: f64,
        longitude: f64,
        zoom: f64,
    ) -> Result<Option<String>, JsValue> {
        self.inner
            .on_camera_changed(now as u64, Camera::new(latitude, longitude, zoom))
            .map(|message| encode(&message).map_err(to_js_error))
            .transpose()
    }

    #[wasm_bindgen(js_name = requestResync)]
    pub fn request_resync(&mut self) -> Result<String, JsValue> {
        encode(&self.inner.request_resync()).map_err(to_js_error)
    }

    /// True once per scheduled frame.
    #[wasm_bindgen(js_name = takeFrameRequest)]
    pub fn take_frame_request(&mut self) -> bool {
        let frames = self.inner.coalescer_mut().scheduler_mut();
        if frames.requested.is_some() && !frames.taken {
            frames.taken = true;
            true
        } else {
            false
        }
    }

    #[wasm_bindgen(js_name = onFrame)]
    pub fn on_frame(&mut self, now: f64, surface: Option<MapSurface>) -> bool {
        self.inner.coalescer_mut().scheduler_mut().requested = None;
        match surface {
            Some(surface) => self
                .inner
                .on_frame(now as u64, Some(&mut JsSurface(&surface)))
                .is_some(),
            None => self.inner.on_frame::<JsSurface>(now as u64, None).is_some(),
        }
    }

    pub fn teardown(&mut self) {
        self.inner.teardown();
    }

    /// `{status, message?}`
    #[wasm_bindgen(js_name = statusJson)]
    pub fn status_json(&self) -> Result<String, JsValue> {
        encode(self.inner.status()).map_err(to_js_error)
    }

    #[wasm_bindgen(getter, js_name = sourceConnected)]
    pub fn source_connected(&self) -> bool {
        self.inner.presence().source_connected
    }

    #[wasm_bindgen(getter, js_name = followerConnected)]
    pub fn follower_connected(&self) -> bool {
        self.inner.presence().follower_connected
    }

    #[wasm_bindgen(getter, js_name = sourceLost)]
    pub fn source_lost(&self) -> bool {
        self.inner.is_source_lost()
    }

    #[wasm_bindgen(getter)]
    pub fn synced(&self) -> bool {
        self.inner.is_synced()
    }

    #[wasm_bindgen(getter, js_name = latencyMs)]
    pub fn latency_ms(&self) -> Option<f64> {
        self.inner.latency().map(|latency| latency as f64)
    }

    #[wasm_bindgen(js_name = lastViewJson)]
    pub fn last_view_json(&self) -> Result<Option<String>, JsValue> {
        self.inner
            .last_view()
            .map(|view| encode(view).map_err(to_js_error))
            .transpose()
    }
}
