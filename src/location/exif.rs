use anyhow::{Context, Result};
use nom_exif::*;
use std::io::Cursor;

/// Extract GPS coordinates from a photo's embedded EXIF data.
///
/// Errors when the bytes carry no parseable EXIF block or no GPS tags.
pub(crate) fn gps_coordinates(bytes: &[u8]) -> Result<(f64, f64)> {
    let mut parser = MediaParser::new();
    let ms = MediaSource::seekable(Cursor::new(bytes)).context("unreadable photo data")?;

    let iter: ExifIter = parser.parse(ms).context("no EXIF data in photo")?;
    let gps = iter
        .parse_gps_info()
        .ok()
        .flatten()
        .context("no GPS tags in EXIF data")?;

    Ok((
        latlng_to_decimal(&gps.latitude, gps.latitude_ref),
        latlng_to_decimal(&gps.longitude, gps.longitude_ref),
    ))
}

/// Convert degrees/minutes/seconds plus a hemisphere reference to signed
/// decimal degrees. South and West are negative.
pub fn dms_to_decimal(degrees: f64, minutes: f64, seconds: f64, reference: char) -> f64 {
    let mut coord = degrees + minutes / 60.0 + seconds / 3600.0;
    if reference == 'S' || reference == 'W' {
        coord = -coord;
    }
    coord
}

/// Convert a nom-exif LatLng (3 URationals: deg, min, sec) to decimal degrees.
fn latlng_to_decimal(latlng: &LatLng, reference: char) -> f64 {
    let degrees = latlng.0.0 as f64 / latlng.0.1 as f64;
    let minutes = latlng.1.0 as f64 / latlng.1.1 as f64;
    let seconds = latlng.2.0 as f64 / latlng.2.1 as f64;
    dms_to_decimal(degrees, minutes, seconds, reference)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1e-9;

    #[test]
    fn dms_north_east_positive() {
        let lat = dms_to_decimal(52.0, 0.0, 41.76, 'N');
        let lon = dms_to_decimal(4.0, 21.0, 25.56, 'E');
        assert!((lat - 52.0116).abs() < 1e-4);
        assert!((lon - 4.3571).abs() < 1e-4);
        assert!(lat > 0.0);
        assert!(lon > 0.0);
    }

    #[test]
    fn dms_south_west_negative() {
        let lat = dms_to_decimal(33.0, 51.0, 54.0, 'S');
        let lon = dms_to_decimal(151.0, 12.0, 36.0, 'W');
        assert!(lat < 0.0);
        assert!(lon < 0.0);
        assert!((lat + (33.0 + 51.0 / 60.0 + 54.0 / 3600.0)).abs() < TOLERANCE);
        assert!((lon + (151.0 + 12.0 / 60.0 + 36.0 / 3600.0)).abs() < TOLERANCE);
    }

    #[test]
    fn dms_magnitude_is_deg_plus_min_plus_sec() {
        let value = dms_to_decimal(10.0, 30.0, 45.0, 'N');
        assert!((value - (10.0 + 30.0 / 60.0 + 45.0 / 3600.0)).abs() < TOLERANCE);
    }

    #[test]
    fn dms_zero_components() {
        assert!((dms_to_decimal(0.0, 0.0, 0.0, 'N')).abs() < TOLERANCE);
        assert!((dms_to_decimal(0.0, 0.0, 0.0, 'S')).abs() < TOLERANCE);
    }

    #[test]
    fn dms_equator_sign_flip_is_symmetric() {
        let north = dms_to_decimal(1.0, 2.0, 3.0, 'N');
        let south = dms_to_decimal(1.0, 2.0, 3.0, 'S');
        assert!((north + south).abs() < TOLERANCE);
    }

    #[test]
    fn gps_from_plain_bytes_fails() {
        assert!(gps_coordinates(b"definitely not an image").is_err());
    }

    #[test]
    fn gps_from_exifless_png_fails() {
        // Valid PNG magic but no EXIF block.
        assert!(gps_coordinates(b"\x89PNG\r\n\x1a\n00000000").is_err());
    }
}
