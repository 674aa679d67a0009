//! Range mapping utilities
//!
//! Connections translate between engine-native ranges (e.g. a 0..8 ambient
//! intensity) and the logical range a setting exposes (e.g. 0..100).

/// Map `value` from the source range onto the destination range using three
/// control points per range.
///
/// The lower half (`src_low..=src_anchor`) and the upper half
/// (`src_anchor..=src_high`) are interpolated independently, so the anchor
/// always lands exactly on `dst_anchor` no matter how lopsided the two halves
/// are. With `clamp` the result stays within the destination range.
#[allow(clippy::too_many_arguments)]
pub fn map_with_anchor(
    value: f32,
    src_low: f32,
    src_anchor: f32,
    src_high: f32,
    dst_low: f32,
    dst_anchor: f32,
    dst_high: f32,
    clamp: bool,
) -> f32 {
    let mapped = if value <= src_anchor {
        lerp_segment(value, src_low, src_anchor, dst_low, dst_anchor)
    } else {
        lerp_segment(value, src_anchor, src_high, dst_anchor, dst_high)
    };

    if clamp {
        let (lo, hi) = if dst_low <= dst_high {
            (dst_low, dst_high)
        } else {
            (dst_high, dst_low)
        };
        mapped.clamp(lo, hi)
    } else {
        mapped
    }
}

/// Linear interpolation of `value` from `a0..a1` onto `b0..b1`.
///
/// A degenerate source segment maps to its destination end so that collapsed
/// halves (anchor == low) still produce a finite value.
fn lerp_segment(value: f32, a0: f32, a1: f32, b0: f32, b1: f32) -> f32 {
    let span = a1 - a0;
    if span.abs() <= f32::EPSILON {
        return b1;
    }
    b0 + (value - a0) / span * (b1 - b0)
}
