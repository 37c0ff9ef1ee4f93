use crate::Vec3;

/// Result of [`WorldQuerier::relative_rotation_to`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelativeRotation {
    /// Dot product of the direction with the owner's right vector (positive: target is to the right).
    pub right_dot: f32,
    /// `true` when the target lies behind the owner.
    pub behind: bool,
    /// Normalized direction from the owner to the target, in the owner's horizontal plane.
    pub direction: Vec3,
}

/// Read-only view of the character that owns a planner.
///
/// Passed into task `setup`/`loop` hooks. The planner never mutates it.
pub trait WorldQuerier {
    fn name(&self) -> &str;
    fn location(&self) -> Vec3;
    fn forward(&self) -> Vec3;
    fn right(&self) -> Vec3;
    fn up(&self) -> Vec3;

    fn relative_rotation_to(&self, x: f32, y: f32) -> RelativeRotation {
        let location = self.location();
        let direction = (Vec3::new(x, y, location.z) - location).normalized();
        RelativeRotation {
            right_dot: direction.dot(self.right()),
            behind: direction.dot(self.forward()) < 0.0,
            direction,
        }
    }
}

/// A querier with fixed orientation, for tests and headless simulation.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticQuerier {
    pub name: String,
    pub location: Vec3,
    pub forward: Vec3,
    pub right: Vec3,
    pub up: Vec3,
}

impl StaticQuerier {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            location: Vec3::ZERO,
            forward: Vec3::X,
            right: Vec3::Y,
            up: Vec3::Z,
        }
    }

    pub fn with_location(mut self, location: Vec3) -> Self {
        self.location = location;
        self
    }
}

impl WorldQuerier for StaticQuerier {
    fn name(&self) -> &str {
        &self.name
    }

    fn location(&self) -> Vec3 {
        self.location
    }

    fn forward(&self) -> Vec3 {
        self.forward
    }

    fn right(&self) -> Vec3 {
        self.right
    }

    fn up(&self) -> Vec3 {
        self.up
    }
}
