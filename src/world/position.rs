use std::fmt;

pub const SECTOR_TILE_SIZE: u16 = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Position {
    pub x: u16,
    pub y: u16,
    pub z: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionDelta {
    pub dx: i16,
    pub dy: i16,
    pub dz: i8,
}

impl Position {
    pub const fn new(x: u16, y: u16, z: u8) -> Self {
        Self { x, y, z }
    }

    pub fn offset(self, delta: PositionDelta) -> Option<Self> {
        let x = i32::from(self.x) + i32::from(delta.dx);
        let y = i32::from(self.y) + i32::from(delta.dy);
        let z = i16::from(self.z) + i16::from(delta.dz);

        if x < 0 || y < 0 || z < 0 {
            return None;
        }

        if x > i32::from(u16::MAX) || y > i32::from(u16::MAX) || z > i16::from(u8::MAX) {
            return None;
        }

        Some(Self {
            x: x as u16,
            y: y as u16,
            z: z as u8,
        })
    }

    /// Builds the absolute position of a tile inside a `.sec` sector file.
    pub fn from_sector(
        sector_x: u16,
        sector_y: u16,
        z: u8,
        local_x: u16,
        local_y: u16,
    ) -> Option<Self> {
        if local_x >= SECTOR_TILE_SIZE || local_y >= SECTOR_TILE_SIZE {
            return None;
        }
        let x = sector_x.checked_mul(SECTOR_TILE_SIZE)?.checked_add(local_x)?;
        let y = sector_y.checked_mul(SECTOR_TILE_SIZE)?.checked_add(local_y)?;
        Some(Self { x, y, z })
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{},{})", self.x, self.y, self.z)
    }
}
