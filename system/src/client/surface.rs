use crate::message::Camera;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SurfaceError {
    #[error("rendering surface is not available")]
    Unavailable,
    #[error("rendering surface cannot move position and zoom in one call")]
    AtomicUnsupported,
}

/// The map engine, as seen by the synchronization client.
///
/// `move_camera` must apply position and zoom in a single render pass.
/// Engines that cannot do that return `SurfaceError::AtomicUnsupported`,
/// and callers fall back to `set_center` followed by `set_zoom`, which
/// shows a visible two-step jump.
pub trait RenderingSurface {
    fn move_camera(&mut self, camera: &Camera) -> Result<(), SurfaceError>;

    fn set_center(&mut self, latitude: f64, longitude: f64) -> Result<(), SurfaceError>;

    fn set_zoom(&mut self, zoom: f64) -> Result<(), SurfaceError>;
}
