//! Mathematical constants

/// 0.5 ln(π)
pub const HALF_LN_PI: f64 = 0.572_364_942_924_700_1;

/// Below this expected count a χ² bin is pooled with its small neighbors
pub const MIN_EXPECTED_COUNT: f64 = 5.0;
