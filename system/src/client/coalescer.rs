use super::guard::FeedbackGuard;
use super::surface::{RenderingSurface, SurfaceError};
use crate::message::ViewState;
use crate::types::Millis;

/// Schedules callbacks at the next display refresh.
pub trait FrameScheduler {
    type Handle;

    fn request_frame(&mut self) -> Self::Handle;

    fn cancel_frame(&mut self, handle: Self::Handle);
}

/// Collapses bursts of incoming views into at most one application per
/// refresh tick. Only the newest view is ever applied.
pub struct FrameCoalescer<S: FrameScheduler> {
    scheduler: S,
    pending: Option<ViewState>,
    scheduled: Option<S::Handle>,
    torn_down: bool,
    degraded_reported: bool,
}

impl<S: FrameScheduler> FrameCoalescer<S> {
    pub fn new(scheduler: S) -> Self {
        Self {
            scheduler,
            pending: None,
            scheduled: None,
            torn_down: false,
            degraded_reported: false,
        }
    }

    pub fn receive(&mut self, view: ViewState) {
        if self.torn_down {
            return;
        }
        if self.pending.replace(view).is_some() {
            log::trace!("Superseded pending view");
        }
        if self.scheduled.is_none() {
            self.scheduled = Some(self.scheduler.request_frame());
        }
    }

    /// Runs the scheduled frame. Returns the view that was applied, if any.
    pub fn on_frame<R: RenderingSurface + ?Sized>(
        &mut self,
        now: Millis,
        surface: Option<&mut R>,
        guard: &mut FeedbackGuard,
    ) -> Option<ViewState> {
        if self.torn_down {
            return None;
        }
        self.scheduled = None;
        let view = self.pending.take()?;
        let surface = surface?;

        guard.arm(now);
        match self.apply(surface, &view) {
            Ok(()) => Some(view),
            Err(e) => {
                log::debug!("Dropped view, surface failed: {}", e);
                None
            }
        }
    }

    fn apply<R: RenderingSurface + ?Sized>(
        &mut self,
        surface: &mut R,
        view: &ViewState,
    ) -> Result<(), SurfaceError> {
        match surface.move_camera(&view.camera()) {
            Err(SurfaceError::AtomicUnsupported) => {
                if !self.degraded_reported {
                    log::warn!("Surface lacks atomic camera moves, applying position then zoom");
                    self.degraded_reported = true;
                }
                surface.set_center(view.latitude, view.longitude)?;
                surface.set_zoom(view.zoom)
            }
            result => result,
        }
    }

    pub fn teardown(&mut self) {
        if let Some(handle) = self.scheduled.take() {
            self.scheduler.cancel_frame(handle);
        }
        self.pending = None;
        self.torn_down = true;
    }

    pub fn has_scheduled_frame(&self) -> bool {
        self.scheduled.is_some()
    }

    pub fn pending(&self) -> Option<&ViewState> {
        self.pending.as_ref()
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::message::Camera;

    #[derive(Default)]
    pub struct ManualScheduler {
        pub next: u32,
        pub requested: Vec<u32>,
        pub cancelled: Vec<u32>,
    }

    impl FrameScheduler for ManualScheduler {
        type Handle = u32;

        fn request_frame(&mut self) -> u32 {
            self.next += 1;
            self.requested.push(self.next);
            self.next
        }

        fn cancel_frame(&mut self, handle: u32) {
            self.cancelled.push(handle);
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum SurfaceCall {
        Move(Camera),
        Center(f64, f64),
        Zoom(f64),
    }

    #[derive(Default)]
    pub struct RecordingSurface {
        pub calls: Vec<SurfaceCall>,
        pub atomic_unsupported: bool,
    }

    impl RenderingSurface for RecordingSurface {
        fn move_camera(&mut self, camera: &Camera) -> Result<(), SurfaceError> {
            if self.atomic_unsupported {
                return Err(SurfaceError::AtomicUnsupported);
            }
            self.calls.push(SurfaceCall::Move(*camera));
            Ok(())
        }

        fn set_center(&mut self, latitude: f64, longitude: f64) -> Result<(), SurfaceError> {
            self.calls.push(SurfaceCall::Center(latitude, longitude));
            Ok(())
        }

        fn set_zoom(&mut self, zoom: f64) -> Result<(), SurfaceError> {
            self.calls.push(SurfaceCall::Zoom(zoom));
            Ok(())
        }
    }
}
