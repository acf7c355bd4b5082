use std::f64::consts::PI;


#[derive(PartialEq, Debug, Clone)]
pub struct Point2d {
    pub x_coord: f64,
    pub y_coord: f64,
}

impl Point2d {
    pub fn new(x_coord: f64, y_coord: f64) -> Point2d {
        Point2d{x_coord, y_coord}
    }

    pub fn minus(&self, other: &Point2d) -> Point2d {
        Point2d::new(self.x_coord - other.x_coord, self.y_coord - other.y_coord)
    }

    pub fn euclidean_distance(&self, other: &Point2d) -> f64 {
        let diff = self.minus(other);
        (diff.x_coord.powi(2) + diff.y_coord.powi(2)).sqrt()
    }

    /// The direction of travel from this point to `other`, in radians counter-clockwise from
    /// the positive x axis.
    pub fn heading_to(&self, other: &Point2d) -> f64 {
        let diff = other.minus(self);
        return diff.y_coord.atan2(diff.x_coord);
    }
}


/// Wraps an angle into (-pi, pi].
pub fn normalize_angle(angle: f64) -> f64 {
    let mut angle = angle % (2.0 * PI);
    if angle > PI {
        angle -= 2.0 * PI;
    } else if angle <= -PI {
        angle += 2.0 * PI;
    }
    return angle;
}

/// The change in heading when travelling start -> thru -> end.  Positive values are left
/// (counter-clockwise) turns, negative values are right turns.
pub fn turn_angle(start: &Point2d, thru: &Point2d, end: &Point2d) -> f64 {
    let heading_in = start.heading_to(thru);
    let heading_out = thru.heading_to(end);
    return normalize_angle(heading_out - heading_in);
}
