//! Coordinate reference systems: a fixed registry of projected CRS codes
//! with pure forward/inverse transforms between geographic lon/lat and
//! projected easting/northing.
//!
//! The transform is a transverse Mercator (Krüger series, third order in
//! the ellipsoid's third flattening), which covers the UTM-style codes the
//! pipeline accepts. Unregistered codes fail fast as configuration errors
//! instead of silently producing wrong coordinates.

use crate::error::{Error, Result};

/// Reference ellipsoid: semi-major axis and flattening.
#[derive(Debug, Clone, Copy)]
pub struct Ellipsoid {
    pub a: f64,
    pub f: f64,
}

pub const GRS80: Ellipsoid = Ellipsoid {
    a: 6_378_137.0,
    f: 1.0 / 298.257_222_101,
};

pub const WGS84: Ellipsoid = Ellipsoid {
    a: 6_378_137.0,
    f: 1.0 / 298.257_223_563,
};

/// An immutable projected CRS definition.
#[derive(Debug, Clone, Copy)]
pub struct Projection {
    pub srid: u32,
    pub name: &'static str,
    ellipsoid: Ellipsoid,
    central_meridian_deg: f64,
    scale: f64,
    false_easting: f64,
    false_northing: f64,
}

const fn utm_zone(
    srid: u32,
    name: &'static str,
    ellipsoid: Ellipsoid,
    central_meridian_deg: f64,
) -> Projection {
    Projection {
        srid,
        name,
        ellipsoid,
        central_meridian_deg,
        scale: 0.9996,
        false_easting: 500_000.0,
        false_northing: 0.0,
    }
}

/// Supported projected CRS codes. The registry is explicit and fixed.
const REGISTRY: &[Projection] = &[
    utm_zone(25832, "ETRS89 / UTM zone 32N", GRS80, 9.0),
    utm_zone(25833, "ETRS89 / UTM zone 33N", GRS80, 15.0),
    utm_zone(32632, "WGS 84 / UTM zone 32N", WGS84, 9.0),
    utm_zone(32633, "WGS 84 / UTM zone 33N", WGS84, 15.0),
];

/// Look up a projected CRS by its numeric code.
pub fn lookup(srid: u32) -> Result<&'static Projection> {
    REGISTRY
        .iter()
        .find(|p| p.srid == srid)
        .ok_or_else(|| Error::Config(format!("unregistered CRS code {srid}")))
}

/// Precomputed Krüger series terms for one ellipsoid.
struct Kruger {
    e: f64,
    big_a: f64,
    alpha: [f64; 3],
    beta: [f64; 3],
    delta: [f64; 3],
}

impl Kruger {
    fn new(ell: Ellipsoid) -> Self {
        let f = ell.f;
        let n = f / (2.0 - f);
        let n2 = n * n;
        let n3 = n2 * n;

        Kruger {
            e: (f * (2.0 - f)).sqrt(),
            big_a: ell.a / (1.0 + n) * (1.0 + n2 / 4.0 + n2 * n2 / 64.0),
            alpha: [
                n / 2.0 - 2.0 * n2 / 3.0 + 5.0 * n3 / 16.0,
                13.0 * n2 / 48.0 - 3.0 * n3 / 5.0,
                61.0 * n3 / 240.0,
            ],
            beta: [
                n / 2.0 - 2.0 * n2 / 3.0 + 37.0 * n3 / 96.0,
                n2 / 48.0 + n3 / 15.0,
                17.0 * n3 / 480.0,
            ],
            delta: [
                2.0 * n - 2.0 * n2 / 3.0 - 2.0 * n3,
                7.0 * n2 / 3.0 - 8.0 * n3 / 5.0,
                56.0 * n3 / 15.0,
            ],
        }
    }
}

impl Projection {
    /// Geographic `[lon, lat]` (degrees) to projected `[easting, northing]`.
    pub fn forward(&self, lonlat: [f64; 2]) -> [f64; 2] {
        let k = Kruger::new(self.ellipsoid);
        let lat = lonlat[1].to_radians();
        let dlon = (lonlat[0] - self.central_meridian_deg).to_radians();

        // Conformal latitude via its tangent.
        let sin_lat = lat.sin();
        let t = (sin_lat.atanh() - k.e * (k.e * sin_lat).atanh()).sinh();

        let xi0 = t.atan2(dlon.cos());
        let eta0 = (dlon.sin() / (t * t + dlon.cos() * dlon.cos()).sqrt()).asinh();

        let mut xi = xi0;
        let mut eta = eta0;
        for (j, a) in k.alpha.iter().enumerate() {
            let m = 2.0 * (j as f64 + 1.0);
            xi += a * (m * xi0).sin() * (m * eta0).cosh();
            eta += a * (m * xi0).cos() * (m * eta0).sinh();
        }

        [
            self.false_easting + self.scale * k.big_a * eta,
            self.false_northing + self.scale * k.big_a * xi,
        ]
    }

    /// Projected `[easting, northing]` to geographic `[lon, lat]` (degrees).
    pub fn inverse(&self, en: [f64; 2]) -> [f64; 2] {
        let k = Kruger::new(self.ellipsoid);
        let xi = (en[1] - self.false_northing) / (self.scale * k.big_a);
        let eta = (en[0] - self.false_easting) / (self.scale * k.big_a);

        let mut xi0 = xi;
        let mut eta0 = eta;
        for (j, b) in k.beta.iter().enumerate() {
            let m = 2.0 * (j as f64 + 1.0);
            xi0 -= b * (m * xi).sin() * (m * eta).cosh();
            eta0 -= b * (m * xi).cos() * (m * eta).sinh();
        }

        // Conformal latitude back to geodetic latitude.
        let chi = (xi0.sin() / eta0.cosh()).asin();
        let mut lat = chi;
        for (j, d) in k.delta.iter().enumerate() {
            let m = 2.0 * (j as f64 + 1.0);
            lat += d * (m * chi).sin();
        }

        let lon = self.central_meridian_deg.to_radians() + eta0.sinh().atan2(xi0.cos());
        [lon.to_degrees(), lat.to_degrees()]
    }
}
