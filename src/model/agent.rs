use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Unit heading vector. `y` grows downward, so `(0, 1)` faces the next row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heading {
    pub dx: i64,
    pub dy: i64,
}

impl Heading {
    pub const UP: Heading = Heading { dx: 0, dy: -1 };
    pub const DOWN: Heading = Heading { dx: 0, dy: 1 };
    pub const LEFT: Heading = Heading { dx: -1, dy: 0 };
    pub const RIGHT: Heading = Heading { dx: 1, dy: 0 };

    /// Only the four axis-aligned unit vectors are valid headings.
    pub fn new(dx: i64, dy: i64) -> Option<Self> {
        matches!((dx, dy), (0, 1) | (0, -1) | (1, 0) | (-1, 0)).then_some(Self { dx, dy })
    }

    /// (dx, dy) → (dy, -dx)
    pub fn turned_left(self) -> Self {
        Self { dx: self.dy, dy: -self.dx }
    }

    /// (dx, dy) → (-dy, dx)
    pub fn turned_right(self) -> Self {
        Self { dx: -self.dy, dy: self.dx }
    }
}

/// One trace entry: where the agent stood and which way it faced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Position {
    #[ts(type = "number")]
    pub x: i64,
    #[ts(type = "number")]
    pub y: i64,
    #[ts(type = "number")]
    pub dir_x: i64,
    #[ts(type = "number")]
    pub dir_y: i64,
}

/// The agent's mutable pose during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Agent {
    pub x: i64,
    pub y: i64,
    pub heading: Heading,
}

impl Agent {
    pub fn new(x: i64, y: i64, heading: Heading) -> Self {
        Self { x, y, heading }
    }

    /// The cell one step along the heading.
    pub fn ahead(&self) -> (i64, i64) {
        (self.x + self.heading.dx, self.y + self.heading.dy)
    }

    pub fn position(&self) -> Position {
        Position {
            x: self.x,
            y: self.y,
            dir_x: self.heading.dx,
            dir_y: self.heading.dy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn four_left_turns_return_to_start() {
        let mut h = Heading::RIGHT;
        let mut seen = Vec::new();
        for _ in 0..4 {
            h = h.turned_left();
            seen.push(h);
        }
        assert_eq!(seen, vec![Heading::UP, Heading::LEFT, Heading::DOWN, Heading::RIGHT]);
    }

    #[test]
    fn right_undoes_left() {
        for h in [Heading::UP, Heading::DOWN, Heading::LEFT, Heading::RIGHT] {
            assert_eq!(h.turned_left().turned_right(), h);
        }
        assert_eq!(Heading::DOWN.turned_right(), Heading::LEFT);
    }

    #[test]
    fn only_unit_headings_are_valid() {
        assert_eq!(Heading::new(0, 1), Some(Heading::DOWN));
        assert_eq!(Heading::new(1, 1), None);
        assert_eq!(Heading::new(0, 0), None);
        assert_eq!(Heading::new(2, 0), None);
    }

    #[test]
    fn ahead_follows_heading() {
        let agent = Agent::new(3, 4, Heading::UP);
        assert_eq!(agent.ahead(), (3, 3));
        assert_eq!(
            agent.position(),
            Position { x: 3, y: 4, dir_x: 0, dir_y: -1 }
        );
    }
}
