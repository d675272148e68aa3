/// Capability negotiation
///
/// Turns the driver's extension and version strings plus probed limits into
/// an immutable `FeatureSet`: feature flags, per-domain argument validators,
/// workaround flags and clamped limits.

pub mod feature_info;
pub mod validators;
pub mod workarounds;

pub use feature_info::{
    DisallowedFeatures, DriverLimits, FeatureFlags, FeatureSet, GlVersionInfo, Limits,
};
pub use validators::{FormatTypeValidator, ValueValidator, Validators};
pub use workarounds::Workarounds;
