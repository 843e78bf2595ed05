use crate::error::FieldError;

/// A scalar feature of the aligned field as a function of the alignment
/// weight λ. The calibration loop only talks to this interface.
pub trait FeatureProbe {
    /// Feature of the unaligned (smoothest) solve. Also the upper end of the
    /// λ search bracket.
    fn upper_bound(&mut self) -> Result<f64, FieldError>;

    /// Feature of the curvature-aligned solve at alignment weight `lambda`.
    /// Assumed non-decreasing in `lambda` over the search bracket.
    fn feature_at(&mut self, lambda: f64) -> Result<f64, FieldError>;
}
