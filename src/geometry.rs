//! Geometry kernel: distances, projections and route-time approximation.
//!
//! Locations are (lat, lng) in degrees; distances are in meters.

/// Average driving speed assumption for time estimation.
const DEFAULT_SPEED_KMH: f64 = 40.0;

/// Earth radius in meters.
const EARTH_RADIUS_M: f64 = 6_378_137.0;

/// Length of one degree of latitude (and of longitude at the equator) in meters.
const METERS_PER_DEGREE: f64 = 111_321.0;

/// Beardwood-Halton-Hammersley constant for euclidean tours.
const TOUR_LENGTH_CONSTANT: f64 = 0.7124;

/// Distance between two locations in meters.
///
/// Uses the flat approximation when the relative error stays around 2% at
/// most, the haversine formula otherwise.
pub fn flying_distance(from: (f64, f64), to: (f64, f64)) -> f64 {
    if (from.0 - to.0).abs() < 30.0 && from.0.abs().max(to.0.abs()) + (from.1 - to.1).abs() < 100.0 {
        return euclidean_distance(from, to);
    }

    haversine_meters(from, to)
}

/// Flat-earth distance in meters with the longitude corrected by the cosine
/// of the mean latitude.
pub fn euclidean_distance(from: (f64, f64), to: (f64, f64)) -> f64 {
    let delta_lat = from.0 - to.0;
    let delta_lng = (from.1 - to.1) * ((from.0 + to.0) * std::f64::consts::PI / 360.0).cos();

    METERS_PER_DEGREE * (delta_lat * delta_lat + delta_lng * delta_lng).sqrt()
}

fn haversine_meters(from: (f64, f64), to: (f64, f64)) -> f64 {
    let (lat1, lng1) = from;
    let (lat2, lng2) = to;

    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lng = (lng2 - lng1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);

    EARTH_RADIUS_M * 2.0 * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Whether the projection of `point` on the segment `[begin, end]` falls
/// inside it, once `margin / 2` of the segment is cut off at each end.
///
/// A negative margin widens the inside zone instead. A degenerate segment
/// has no inside.
pub fn projection_inside_segment(point: (f64, f64), begin: (f64, f64), end: (f64, f64), margin: f64) -> bool {
    let line = (end.0 - begin.0, end.1 - begin.1);
    let to_point = (point.0 - begin.0, point.1 - begin.1);

    let squared_length = line.0 * line.0 + line.1 * line.1;
    if squared_length <= f64::EPSILON {
        return false;
    }

    let scaler = (line.0 * to_point.0 + line.1 * to_point.1) / squared_length;
    scaler >= 0.5 * margin && scaler <= 1.0 - 0.5 * margin
}

/// Area in square meters of the convex hull of the given locations.
pub fn polygon_area(locations: &[(f64, f64)]) -> f64 {
    if locations.len() < 3 {
        return 0.0;
    }

    // Local equirectangular projection around the mean latitude.
    let mean_lat = locations.iter().map(|l| l.0).sum::<f64>() / locations.len() as f64;
    let lng_scale = mean_lat.to_radians().cos();
    let projected: Vec<(f64, f64)> = locations
        .iter()
        .map(|&(lat, lng)| (lng * lng_scale * METERS_PER_DEGREE, lat * METERS_PER_DEGREE))
        .collect();

    let hull = convex_hull(projected);
    if hull.len() < 3 {
        return 0.0;
    }

    let twice_area: f64 = hull
        .iter()
        .zip(hull.iter().cycle().skip(1))
        .map(|(a, b)| a.0 * b.1 - b.0 * a.1)
        .sum();

    twice_area.abs() / 2.0
}

/// Andrew's monotone chain, counter-clockwise, without collinear points.
fn convex_hull(mut points: Vec<(f64, f64)>) -> Vec<(f64, f64)> {
    points.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));
    points.dedup();
    if points.len() < 3 {
        return points;
    }

    let cross = |o: (f64, f64), a: (f64, f64), b: (f64, f64)| (a.0 - o.0) * (b.1 - o.1) - (a.1 - o.1) * (b.0 - o.0);

    let mut lower: Vec<(f64, f64)> = Vec::new();
    for &p in &points {
        while lower.len() >= 2 && cross(lower[lower.len() - 2], lower[lower.len() - 1], p) <= 0.0 {
            lower.pop();
        }
        lower.push(p);
    }

    let mut upper: Vec<(f64, f64)> = Vec::new();
    for &p in points.iter().rev() {
        while upper.len() >= 2 && cross(upper[upper.len() - 2], upper[upper.len() - 1], p) <= 0.0 {
            upper.pop();
        }
        upper.push(p);
    }

    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}

/// Approximate time in seconds to tour `visits` stops spread over the convex
/// hull of `locations`.
pub fn approximate_route_time(locations: &[(f64, f64)], visits: f64) -> f64 {
    let area = polygon_area(locations);
    if area <= 0.0 || visits <= 0.0 {
        return 0.0;
    }

    let tour_length = TOUR_LENGTH_CONSTANT * (visits * area).sqrt();
    tour_length / (DEFAULT_SPEED_KMH / 3.6)
}
