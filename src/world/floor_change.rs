use crate::world::position::{Position, PositionDelta};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FloorChangeDirection {
    #[default]
    None,
    Down,
    North,
    South,
    SouthAlternative,
    West,
    East,
    EastAlternative,
}

impl FloorChangeDirection {
    /// Maps an item's `floor_change` token; unknown tokens read as `None`.
    pub fn parse(token: &str) -> Self {
        match token {
            "down" => FloorChangeDirection::Down,
            "north" => FloorChangeDirection::North,
            "south" => FloorChangeDirection::South,
            "southalt" => FloorChangeDirection::SouthAlternative,
            "west" => FloorChangeDirection::West,
            "east" => FloorChangeDirection::East,
            "eastalt" => FloorChangeDirection::EastAlternative,
            _ => FloorChangeDirection::None,
        }
    }

    pub fn is_none(self) -> bool {
        self == FloorChangeDirection::None
    }

    /// Where a creature stepping onto the tile ends up. Ramps lead one floor
    /// up (lower z) and one tile past the ramp; holes lead one floor down.
    pub fn destination(self, from: Position) -> Option<Position> {
        let delta = match self {
            FloorChangeDirection::None => return None,
            FloorChangeDirection::Down => PositionDelta { dx: 0, dy: 0, dz: 1 },
            FloorChangeDirection::North => PositionDelta { dx: 0, dy: -1, dz: -1 },
            FloorChangeDirection::South => PositionDelta { dx: 0, dy: 1, dz: -1 },
            FloorChangeDirection::West => PositionDelta { dx: -1, dy: 0, dz: -1 },
            FloorChangeDirection::East => PositionDelta { dx: 1, dy: 0, dz: -1 },
            FloorChangeDirection::SouthAlternative => PositionDelta { dx: 0, dy: 2, dz: -1 },
            FloorChangeDirection::EastAlternative => PositionDelta { dx: 2, dy: 0, dz: -1 },
        };
        from.offset(delta)
    }
}
