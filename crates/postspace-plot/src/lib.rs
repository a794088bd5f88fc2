//! # postspace-plot
//!
//! Headless engine behind the 3D post map. Root posts become spheres at
//! their embedding coordinates; an orbit camera, pointer interaction and
//! a frame limiter turn pointer events into [`PlotEvent`]s and a
//! [`Frame`] display list that any backend can paint.
//!
//! Nothing here touches the network or a GPU. The client drives the
//! engine from its render loop and forwards selection events to the
//! thread view.

pub mod camera;
pub mod engine;
pub mod interaction;
pub mod math;
pub mod points;
pub mod surface;
pub mod viewport;

pub use camera::OrbitCamera;
pub use engine::{PlotEngine, PlotEvent};
pub use interaction::{Interaction, PointerButton, PointerState};
pub use math::{Ray, Vec3};
pub use points::{PlotPoint, PointSet, Rgb};
pub use surface::{Frame, FrameLimiter, FramePoint, RenderSurface};
pub use viewport::{Ndc, Viewport};
