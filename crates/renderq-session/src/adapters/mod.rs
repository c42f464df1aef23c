//! One session adapter per job kind.

pub mod container;
pub mod motion;
pub mod proxy;
pub mod stabilize;
pub mod tracking;

pub use container::{ContainerRenderAdapter, ContainerSpec, ContainerTarget, ContainerVariant};
pub use motion::{MotionRenderAdapter, MotionSpec, MotionTarget};
pub use proxy::{ProxyRenderAdapter, ProxySpec, ProxyTarget};
pub use stabilize::{StabilizeAdapter, StabilizeSpec, StabilizeTarget};
pub use tracking::{TrackingAdapter, TrackingSpec, TrackingTarget};
