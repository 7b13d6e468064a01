//! crates/trip_planner_core/src/polyline.rs
//!
//! Encoded polyline codec (precision 5).
//!
//! Each coordinate is stored as a zig-zag signed delta from the previous
//! point, split into 5-bit groups low to high, each group offset by 63 and
//! flagged with 0x20 while more groups follow.

use crate::domain::Coordinate;

const PRECISION: f64 = 1e5;
const CHAR_OFFSET: i64 = 63;
const CONTINUATION: i64 = 0x20;
const CHUNK_MASK: i64 = 0x1f;

/// Decodes an encoded polyline into its ordered coordinates.
///
/// Decoding stops at the first incomplete or malformed value: a truncated
/// final group, a latitude with no longitude, a character outside the
/// encoding alphabet, or a running total that leaves the `i64` range. The
/// points completed before that are returned.
pub fn decode(encoded: &str) -> Vec<Coordinate> {
    let bytes = encoded.as_bytes();
    let mut points = Vec::new();
    let mut index = 0;
    let (mut lat, mut lng) = (0i64, 0i64);

    while index < bytes.len() {
        let Some(dlat) = next_delta(bytes, &mut index) else {
            break;
        };
        let Some(dlng) = next_delta(bytes, &mut index) else {
            break;
        };
        let (Some(next_lat), Some(next_lng)) = (lat.checked_add(dlat), lng.checked_add(dlng)) else {
            break;
        };
        lat = next_lat;
        lng = next_lng;
        points.push(Coordinate::new(lat as f64 / PRECISION, lng as f64 / PRECISION));
    }

    points
}

/// Encodes coordinates, rounding each to 1e-5 degrees.
///
/// Encoding stops at the first point that is not a valid coordinate
/// (non-finite, latitude beyond ±90 or longitude beyond ±180).
pub fn encode(points: &[Coordinate]) -> String {
    let mut out = String::new();
    let (mut prev_lat, mut prev_lng) = (0i64, 0i64);

    for point in points {
        let (Some(lat), Some(lng)) = (
            scaled(point.latitude, 90.0),
            scaled(point.longitude, 180.0),
        ) else {
            break;
        };
        encode_value(lat - prev_lat, &mut out);
        encode_value(lng - prev_lng, &mut out);
        prev_lat = lat;
        prev_lng = lng;
    }

    out
}

fn scaled(degrees: f64, limit: f64) -> Option<i64> {
    if !degrees.is_finite() || degrees.abs() > limit {
        return None;
    }
    Some((degrees * PRECISION).round() as i64)
}

fn next_delta(bytes: &[u8], index: &mut usize) -> Option<i64> {
    let mut result = 0i64;
    let mut shift = 0u32;

    loop {
        let byte = *bytes.get(*index)?;
        *index += 1;

        let chunk = byte as i64 - CHAR_OFFSET;
        if !(0..64).contains(&chunk) || shift > 58 {
            return None;
        }
        result |= (chunk & CHUNK_MASK) << shift;
        shift += 5;

        if chunk < CONTINUATION {
            break;
        }
    }

    Some(if result & 1 == 1 {
        !(result >> 1)
    } else {
        result >> 1
    })
}

fn encode_value(delta: i64, out: &mut String) {
    let mut value = if delta < 0 { !(delta << 1) } else { delta << 1 };
    while value >= CONTINUATION {
        out.push(char::from(((CONTINUATION | (value & CHUNK_MASK)) + CHAR_OFFSET) as u8));
        value >>= 5;
    }
    out.push(char::from((value + CHAR_OFFSET) as u8));
}
