/// Positions and coarse grid cells used for proximity filtering.
/// 2D worlds keep `z` at 0; every operation below works the same in both cases.

#[derive(Debug, Clone, Copy, Default, serde::Serialize, serde::Deserialize, PartialEq)]
pub struct Vector {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector {
    pub const ZERO: Vector = Vector {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Point on the z = 0 plane
    pub fn planar(x: f64, y: f64) -> Self {
        Self::new(x, y, 0.0)
    }

    /// Squared Euclidean distance. Proximity checks compare against a squared
    /// radius so no square root is taken on the dispatch path.
    pub fn distance_squared(self, other: Vector) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        dx * dx + dy * dy + dz * dz
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    pub fn to_array(self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

/// True if `a` and `b` are at most `radius` apart (boundary inclusive).
pub fn within_radius(a: Vector, b: Vector, radius: f64) -> bool {
    a.distance_squared(b) <= radius * radius
}

/// Integer cell of a uniform grid.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct GridCoordinate {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl GridCoordinate {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Cell containing `position` for a grid of `cell_size` wide cubes.
    /// Coordinates are floored so negative positions land in negative cells.
    pub fn from_position(position: Vector, cell_size: f64) -> Self {
        Self {
            x: axis_cell(position.x, cell_size),
            y: axis_cell(position.y, cell_size),
            z: axis_cell(position.z, cell_size),
        }
    }

    /// Same cell or one of its direct neighbours (diagonals included).
    pub fn is_same_or_neighbour(self, other: GridCoordinate) -> bool {
        (self.x - other.x).abs() <= 1
            && (self.y - other.y).abs() <= 1
            && (self.z - other.z).abs() <= 1
    }
}

fn axis_cell(value: f64, cell_size: f64) -> i32 {
    // `as` saturates, so absurd coordinates clamp to the outermost cell
    (value / cell_size).floor() as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_squared_of_3_4_5_triangle() {
        let a = Vector::planar(0.0, 0.0);
        let b = Vector::planar(3.0, 4.0);
        assert_eq!(a.distance_squared(b), 25.0);
        assert_eq!(b.distance_squared(a), 25.0);
    }

    #[test]
    fn within_radius_is_inclusive() {
        let a = Vector::planar(0.0, 0.0);
        let b = Vector::planar(3.0, 4.0);
        assert!(within_radius(a, b, 5.0));
        assert!(!within_radius(a, b, 4.999));
    }

    #[test]
    fn distance_uses_z_axis() {
        let a = Vector::new(0.0, 0.0, 0.0);
        let b = Vector::new(0.0, 0.0, 2.0);
        assert_eq!(a.distance_squared(b), 4.0);
    }

    #[test]
    fn negative_positions_floor_into_negative_cells() {
        let cell = GridCoordinate::from_position(Vector::new(-0.5, 10.0, 0.0), 10.0);
        assert_eq!(cell, GridCoordinate::new(-1, 1, 0));
    }

    #[test]
    fn neighbour_includes_diagonals() {
        let origin = GridCoordinate::new(0, 0, 0);
        assert!(origin.is_same_or_neighbour(origin));
        assert!(origin.is_same_or_neighbour(GridCoordinate::new(1, 1, 0)));
        assert!(origin.is_same_or_neighbour(GridCoordinate::new(-1, 1, -1)));
        assert!(!origin.is_same_or_neighbour(GridCoordinate::new(2, 0, 0)));
        assert!(!origin.is_same_or_neighbour(GridCoordinate::new(0, 0, -2)));
    }

    #[test]
    fn neighbour_is_symmetric() {
        let a = GridCoordinate::new(3, -2, 0);
        let b = GridCoordinate::new(4, -3, 0);
        assert_eq!(a.is_same_or_neighbour(b), b.is_same_or_neighbour(a));
    }
}
