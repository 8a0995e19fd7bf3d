use crate::coord::Coord;

/// Google polyline encoding with 5-digit precision, the format routing
/// back-ends return for route geometry.
pub fn encode(coords: &[Coord]) -> String {
    let mut output = String::with_capacity(coords.len() * 6);
    let mut prev_lat = 0_i64;
    let mut prev_lon = 0_i64;

    for coord in coords {
        let lat = (coord.lat * 1e5).round() as i64;
        let lon = (coord.lon * 1e5).round() as i64;

        encode_value(lat - prev_lat, &mut output);
        encode_value(lon - prev_lon, &mut output);

        prev_lat = lat;
        prev_lon = lon;
    }

    output
}

fn encode_value(value: i64, output: &mut String) {
    let mut v = value << 1;
    if value < 0 {
        v = !v;
    }

    while v >= 0x20 {
        output.push((((0x20 | (v & 0x1f)) + 63) as u8) as char);
        v >>= 5;
    }
    output.push(((v + 63) as u8) as char);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_encoding() {
        // Reference example from the polyline format documentation.
        let coords = vec![
            Coord::new(-120.2, 38.5),
            Coord::new(-120.95, 40.7),
            Coord::new(-126.453, 43.252),
        ];

        assert_eq!(encode(&coords), "_p~iF~ps|U_ulLnnqC_mqNvxq`@");
    }

    #[test]
    fn test_empty() {
        assert_eq!(encode(&[]), "");
    }
}
