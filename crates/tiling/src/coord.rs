use foundation::bounds::Aabb2;
use serde::{Deserialize, Serialize};

/// Tile coordinate in ZXY scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TileCoord {
    pub z: u8,
    pub x: u32,
    pub y: u32,
}

impl TileCoord {
    pub fn new(z: u8, x: u32, y: u32) -> Self {
        Self { z, x, y }
    }

    /// Number of tiles along one axis at this zoom level.
    pub fn tiles_per_axis(z: u8) -> u64 {
        1u64 << z.min(32)
    }

    pub fn is_valid(&self) -> bool {
        let n = Self::tiles_per_axis(self.z);
        self.z <= 32 && (self.x as u64) < n && (self.y as u64) < n
    }

    /// Bounds in normalized projected space (`[0, 1]` on both axes, y down),
    /// grown by `buffer` expressed as a fraction of the tile size.
    pub fn projected_bounds(&self, buffer: f64) -> Aabb2 {
        let n = Self::tiles_per_axis(self.z) as f64;
        Aabb2::new(
            [
                (self.x as f64 - buffer) / n,
                (self.y as f64 - buffer) / n,
            ],
            [
                (self.x as f64 + 1.0 + buffer) / n,
                (self.y as f64 + 1.0 + buffer) / n,
            ],
        )
    }
}

impl std::fmt::Display for TileCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

impl std::str::FromStr for TileCoord {
    type Err = String;

    /// Parses `z/x/y`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('/').collect();
        let [z, x, y] = parts.as_slice() else {
            return Err(format!("expected z/x/y, got {s:?}"));
        };
        let z = z.parse().map_err(|e| format!("invalid zoom {z:?}: {e}"))?;
        let x = x.parse().map_err(|e| format!("invalid x {x:?}: {e}"))?;
        let y = y.parse().map_err(|e| format!("invalid y {y:?}: {e}"))?;
        Ok(Self::new(z, x, y))
    }
}

/// Tile address carried by a tile request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TileInfo {
    pub z: u8,
    pub x: u32,
    pub y: u32,
    /// Tile-local coordinate extent; the worker's configured extent when absent.
    #[serde(default)]
    pub extent: Option<f64>,
}

impl TileInfo {
    pub fn coord(&self) -> TileCoord {
        TileCoord::new(self.z, self.x, self.y)
    }
}
