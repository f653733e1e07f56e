//! Navigation math shared by the session layer: longitude range
//! normalization, local meters-per-degree scaling, and circular heading
//! averaging.

use serde::{Deserialize, Serialize};

/// Longitude normalization mode applied to every fix a session produces.
///
/// Serializes as the integer the configuration files have always used:
/// −1, 0 or 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i8", into = "i8")]
pub enum LonMode {
    /// Map into (−360, 0].
    Negative,
    /// Map into [−180, 180]. The default.
    Centered,
    /// Map into [0, 360).
    Positive,
}

impl Default for LonMode {
    fn default() -> Self {
        LonMode::Centered
    }
}

impl From<LonMode> for i8 {
    fn from(m: LonMode) -> i8 {
        match m {
            LonMode::Negative => -1,
            LonMode::Centered => 0,
            LonMode::Positive => 1,
        }
    }
}

impl TryFrom<i8> for LonMode {
    type Error = String;

    fn try_from(v: i8) -> Result<Self, String> {
        match v {
            -1 => Ok(LonMode::Negative),
            0 => Ok(LonMode::Centered),
            1 => Ok(LonMode::Positive),
            other => Err(format!("longitude mode must be -1, 0 or 1, got {other}")),
        }
    }
}

/// Normalize a longitude into the range selected by `mode`.
///
/// Total over all finite inputs and idempotent:
/// `normalize_longitude(normalize_longitude(l, m), m)` equals
/// `normalize_longitude(l, m)` exactly.
pub fn normalize_longitude(lon: f64, mode: LonMode) -> f64 {
    // rem_euclid puts us in [0, 360); shift per mode from there.
    let wrapped = lon.rem_euclid(360.0);
    match mode {
        LonMode::Positive => wrapped,
        LonMode::Negative => {
            if wrapped == 0.0 {
                0.0
            } else {
                wrapped - 360.0
            }
        }
        LonMode::Centered => {
            if wrapped > 180.0 {
                wrapped - 360.0
            } else {
                wrapped
            }
        }
    }
}

/// Degrees-per-meter scale factors at a given latitude.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordScale {
    /// Degrees of longitude per meter of easting.
    pub mtodeglon: f64,
    /// Degrees of latitude per meter of northing.
    pub mtodeglat: f64,
}

/// Local meters-per-degree scale from the standard meridian/parallel arc
/// expansions, inverted to degrees-per-meter. Valid away from the poles;
/// the longitude factor diverges as |lat| → 90.
pub fn coord_scale(latitude: f64) -> CoordScale {
    const C1: f64 = 111412.84;
    const C2: f64 = -93.5;
    const C3: f64 = 0.118;
    const C4: f64 = 111132.92;
    const C5: f64 = -559.82;
    const C6: f64 = 1.175;
    const C7: f64 = 0.0023;

    let radlat = latitude.to_radians();
    let lon_m_per_deg = (C1 * radlat.cos() + C2 * (3.0 * radlat).cos() + C3 * (5.0 * radlat).cos()).abs();
    let lat_m_per_deg =
        (C4 + C5 * (2.0 * radlat).cos() + C6 * (4.0 * radlat).cos() + C7 * (6.0 * radlat).cos()).abs();

    CoordScale {
        mtodeglon: 1.0 / lon_m_per_deg,
        mtodeglat: 1.0 / lat_m_per_deg,
    }
}

/// Accumulates headings as a unit-vector sum so that values straddling the
/// 0°/360° wrap average correctly.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeadingMean {
    x: f64,
    y: f64,
    /// Plain arithmetic sum, kept as the degenerate-case fallback.
    arith_sum: f64,
    n: u32,
}

impl HeadingMean {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, heading_deg: f64) {
        let r = heading_deg.to_radians();
        self.x += r.sin();
        self.y += r.cos();
        self.arith_sum += heading_deg;
        self.n += 1;
    }

    pub fn count(&self) -> u32 {
        self.n
    }

    /// Mean heading in [0, 360) plus the unit vector it was derived from.
    ///
    /// When the summed vector cancels to zero (opposed headings) the mean
    /// falls back to the arithmetic average, re-projected onto the circle.
    pub fn mean(&self) -> Option<(f64, f64, f64)> {
        if self.n == 0 {
            return None;
        }
        let mut x = self.x / self.n as f64;
        let mut y = self.y / self.n as f64;
        let denom = (x * x + y * y).sqrt();
        let mut heading;
        if denom > 0.0 {
            x /= denom;
            y /= denom;
            heading = x.atan2(y).to_degrees();
        } else {
            heading = self.arith_sum / self.n as f64;
            x = heading.to_radians().sin();
            y = heading.to_radians().cos();
        }
        if heading < 0.0 {
            heading += 360.0;
        }
        if heading >= 360.0 {
            heading -= 360.0;
        }
        Some((heading, x, y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn wraparound_headings_average_near_north() {
        let mut m = HeadingMean::new();
        for h in [359.0, 1.0, 3.0] {
            m.add(h);
        }
        let (mean, _, _) = m.mean().unwrap();
        assert!((mean - 1.0).abs() < 0.2, "mean was {mean}");
    }

    #[test]
    fn opposed_headings_fall_back_to_arithmetic_mean() {
        let mut m = HeadingMean::new();
        m.add(0.0);
        m.add(180.0);
        let (mean, _, _) = m.mean().unwrap();
        assert!((mean - 90.0).abs() < 1e-9);
    }

    #[test]
    fn normalization_ranges() {
        assert_eq!(normalize_longitude(190.0, LonMode::Centered), -170.0);
        assert_eq!(normalize_longitude(-190.0, LonMode::Centered), 170.0);
        assert_eq!(normalize_longitude(-10.0, LonMode::Positive), 350.0);
        assert_eq!(normalize_longitude(10.0, LonMode::Negative), -350.0);
        assert_eq!(normalize_longitude(0.0, LonMode::Negative), 0.0);
        assert_eq!(normalize_longitude(720.0, LonMode::Positive), 0.0);
    }

    #[test]
    fn coord_scale_matches_equatorial_arc() {
        let s = coord_scale(0.0);
        // One degree of longitude at the equator is about 111.32 km.
        assert!((1.0 / s.mtodeglon - 111320.0).abs() < 50.0);
        // One degree of latitude near the equator is about 110.57 km.
        assert!((1.0 / s.mtodeglat - 110574.0).abs() < 50.0);
    }

    proptest! {
        #[test]
        fn normalization_is_idempotent(
            lon in -1000.0f64..1000.0,
            mode in prop::sample::select(vec![LonMode::Negative, LonMode::Centered, LonMode::Positive]),
        ) {
            let once = normalize_longitude(lon, mode);
            let twice = normalize_longitude(once, mode);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn normalization_lands_in_range(
            lon in -1000.0f64..1000.0,
        ) {
            let n = normalize_longitude(lon, LonMode::Negative);
            prop_assert!(n > -360.0 && n <= 0.0);
            let c = normalize_longitude(lon, LonMode::Centered);
            prop_assert!((-180.0..=180.0).contains(&c));
            let p = normalize_longitude(lon, LonMode::Positive);
            prop_assert!((0.0..360.0).contains(&p));
        }
    }
}
