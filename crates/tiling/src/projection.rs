use std::f64::consts::PI;

/// Projection of lon/lat into normalized `[0, 1]` tile space (y down).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum Projection {
    #[default]
    WebMercator,
    /// Plate carrée stretched onto the square tile pyramid.
    Wgs84,
}

impl Projection {
    /// Resolves a projection code. `None` selects Web Mercator.
    pub fn from_code(code: Option<&str>) -> Option<Self> {
        let Some(code) = code else {
            return Some(Projection::WebMercator);
        };
        match code.to_ascii_uppercase().as_str() {
            "EPSG:3857" | "EPSG:900913" | "EPSG:102100" => Some(Projection::WebMercator),
            "EPSG:4326" => Some(Projection::Wgs84),
            _ => None,
        }
    }

    pub fn project(self, lon_deg: f64, lat_deg: f64) -> (f64, f64) {
        let x = lon_deg / 360.0 + 0.5;
        let y = match self {
            Projection::WebMercator => {
                let sin = lat_deg.to_radians().sin();
                let y = 0.5 - 0.25 * ((1.0 + sin) / (1.0 - sin)).ln() / PI;
                y.clamp(0.0, 1.0)
            }
            Projection::Wgs84 => (90.0 - lat_deg) / 180.0,
        };
        (x, y)
    }
}
