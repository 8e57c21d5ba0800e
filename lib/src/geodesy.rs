//! Small pieces of spherical geometry and number parsing shared by the
//! orbit editor and the lander.

use thiserror::Error;

/// Metric prefixes accepted by [`parse_si`]. Order matters: `da` has to be
/// tried before `a` and `d`.
const SI_SUFFIXES: &[(&str, f64)] = &[
    ("Y", 1e24),
    ("Z", 1e21),
    ("E", 1e18),
    ("P", 1e15),
    ("T", 1e12),
    ("G", 1e9),
    ("M", 1e6),
    ("k", 1e3),
    ("h", 1e2),
    ("da", 1e1),
    ("d", 1e-1),
    ("c", 1e-2),
    ("m", 1e-3),
    ("u", 1e-6),
    ("\u{3bc}", 1e-6),
    ("\u{b5}", 1e-6),
    ("n", 1e-9),
    ("p", 1e-12),
    ("f", 1e-15),
    ("a", 1e-18),
    ("z", 1e-21),
    ("y", 1e-24),
];

#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("`{input}` is not a number")]
pub struct ParseSiError {
    pub input: String,
}

/// Parse a decimal number with an optional trailing metric prefix,
/// e.g. `"110k"` is `110000.0` and `"2.5M"` is `2500000.0`.
pub fn parse_si(text: &str) -> Result<f64, ParseSiError> {
    let trimmed = text.trim();
    let (number, multiplier) = SI_SUFFIXES
        .iter()
        .find_map(|&(suffix, factor)| trimmed.strip_suffix(suffix).map(|rest| (rest, factor)))
        .unwrap_or((trimmed, 1.0));
    number
        .trim()
        .parse::<f64>()
        .map(|value| value * multiplier)
        .map_err(|_| ParseSiError {
            input: text.to_owned(),
        })
}

/// Parse `d:m:s` into decimal degrees. The sign of the degrees applies
/// to the whole angle. Plain decimal numbers are accepted as well.
pub fn parse_dms(text: &str) -> Result<f64, ParseSiError> {
    let err = || ParseSiError {
        input: text.to_owned(),
    };
    let parts: Vec<&str> = text.trim().split(':').collect();
    match parts.as_slice() {
        [decimal] => decimal.trim().parse().map_err(|_| err()),
        [d, m, s] => {
            let degrees: f64 = d.trim().parse().map_err(|_| err())?;
            let minutes: f64 = m.trim().parse().map_err(|_| err())?;
            let seconds: f64 = s.trim().parse().map_err(|_| err())?;
            let magnitude = degrees.abs() + minutes / 60.0 + seconds / 3600.0;
            if degrees.is_sign_negative() {
                Ok(-magnitude)
            } else {
                Ok(magnitude)
            }
        }
        _ => Err(err()),
    }
}

/// Wrap an angle in degrees into `[range_start, range_start + 360)`.
pub fn normalize_angle(angle: f64, range_start: f64) -> f64 {
    (angle - range_start).rem_euclid(360.0) + range_start
}

/// Remainder with the sign of the divisor.
pub fn modulo(x: f64, y: f64) -> f64 {
    let result = x % y;
    if result < 0.0 {
        result + y
    } else {
        result
    }
}

/// Great-circle destination reached by travelling `distance` from
/// (`lat`, `lon`) along initial `bearing` on a sphere of `radius`.
/// All angles in degrees; returns `(lat, lon)`.
///
/// See <http://www.movable-type.co.uk/scripts/latlong.html>.
pub fn destination_point(lat: f64, lon: f64, bearing: f64, distance: f64, radius: f64) -> (f64, f64) {
    let lat1 = lat.to_radians();
    let lon1 = lon.to_radians();
    let brng = bearing.to_radians();
    let delta = distance / radius;

    let lat2 = libm::asin(
        (libm::sin(lat1) * libm::cos(delta) + libm::cos(lat1) * libm::sin(delta) * libm::cos(brng))
            .clamp(-1.0, 1.0),
    );
    let lon2 = lon1
        + libm::atan2(
            libm::sin(brng) * libm::sin(delta) * libm::cos(lat1),
            libm::cos(delta) - libm::sin(lat1) * libm::sin(lat2),
        );

    (lat2.to_degrees(), lon2.to_degrees())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn si_suffixes() {
        assert_eq!(parse_si("110k"), Ok(110_000.0));
        assert_eq!(parse_si(" 2.5M "), Ok(2_500_000.0));
        assert_eq!(parse_si("3"), Ok(3.0));
        assert_eq!(parse_si("10 k"), Ok(10_000.0));
        assert_eq!(parse_si("4da"), Ok(40.0));
        assert!((parse_si("7m").unwrap() - 0.007).abs() < 1e-15);
        assert!((parse_si("1.5u").unwrap() - 1.5e-6).abs() < 1e-18);
        assert!(parse_si("k").is_err());
        assert!(parse_si("twelve").is_err());
        assert!(parse_si("").is_err());
    }

    #[test]
    fn dms() {
        assert_eq!(parse_dms("12.5"), Ok(12.5));
        assert!((parse_dms("10:30:36").unwrap() - 10.51).abs() < 1e-12);
        assert!((parse_dms("-10:30:00").unwrap() + 10.5).abs() < 1e-12);
        assert!(parse_dms("1:2").is_err());
    }

    #[test]
    fn angle_normalization() {
        assert_eq!(normalize_angle(370.0, 0.0), 10.0);
        assert_eq!(normalize_angle(-10.0, 0.0), 350.0);
        assert_eq!(normalize_angle(190.0, -180.0), -170.0);
        assert_eq!(normalize_angle(180.0, -180.0), -180.0);
        assert_eq!(normalize_angle(-180.0, -180.0), -180.0);
        assert_eq!(modulo(-0.25, 1.0), 0.75);
    }

    #[test]
    fn destination_point_north_and_east() {
        let radius = 600_000.0;
        let (lat, lon) = destination_point(0.0, 0.0, 0.0, 1000.0, radius);
        assert!((lat - (1000.0f64 / radius).to_degrees()).abs() < 1e-12);
        assert!(lon.abs() < 1e-12);
        let (lat, lon) = destination_point(0.0, 10.0, 90.0, 1000.0, radius);
        assert!(lat.abs() < 1e-12);
        assert!((lon - 10.0 - (1000.0f64 / radius).to_degrees()).abs() < 1e-12);
    }

    #[test]
    fn destination_point_is_self_inverse() {
        let radius = 600_000.0;
        for &(lat, lon, bearing) in &[(12.0, 285.4, 37.0), (-45.0, 10.0, 200.0), (0.5, -3.0, 90.0)] {
            let (lat2, lon2) = destination_point(lat, lon, bearing, 20.0, radius);
            // back-bearing is the reverse of the final bearing; for 20 m
            // it matches the initial bearing to well below the tolerance
            let (lat3, lon3) = destination_point(lat2, lon2, bearing + 180.0, 20.0, radius);
            assert!((lat3 - lat).abs() < 1e-9, "{lat3} != {lat}");
            assert!((lon3 - lon).abs() < 1e-9, "{lon3} != {lon}");
        }
    }
}
