//! CRS declaration parsing and normalization to the working CRS.
//!
//! Declarations come in three shapes: EPSG identifiers (`EPSG:3857`,
//! OGC URNs, bare codes), WKT (shapefile `.prj`, GeoPackage
//! `definition`), and well-known names. Each is reduced to an EPSG code,
//! and codes with a known inverse projection are mapped to WGS84.

use crate::raw::DeclaredCrs;
use cadastre_core::{Crs, Warning};
use geo::MapCoordsInPlace;
use geo_types::{Coord, Geometry};
use std::f64::consts::PI;

// ── Declaration parsing ─────────────────────────────────────────

/// EPSG code of an identifier string such as `EPSG:3857`,
/// `urn:ogc:def:crs:EPSG::3857`, `urn:ogc:def:crs:OGC:1.3:CRS84` or `4326`.
pub(crate) fn parse_identifier(name: &str) -> Option<u32> {
    let upper = name.trim().to_ascii_uppercase();
    if upper.ends_with("CRS84") || upper.ends_with("CRS:84") {
        return Some(4326);
    }
    if let Ok(code) = upper.parse() {
        return Some(code);
    }
    if upper.contains("EPSG") {
        let digits: String = upper
            .rsplit(|c: char| !c.is_ascii_digit())
            .find(|s| !s.is_empty())?
            .to_owned();
        return digits.parse().ok();
    }
    None
}

/// EPSG code of a WKT1 or WKT2 definition.
///
/// The authority of the outermost object wins: in WKT1 that is the last
/// `AUTHORITY[...]`, in WKT2 the last `ID[...]`. Without either, a few
/// common ESRI names are recognised.
pub(crate) fn parse_wkt(wkt: &str) -> Option<u32> {
    let upper = wkt.to_ascii_uppercase();
    for key in ["AUTHORITY[", "ID["] {
        if let Some(pos) = upper.rfind(key) {
            let rest = &upper[pos + key.len()..];
            let end = rest.find(']').unwrap_or(rest.len());
            let args: Vec<&str> = rest[..end]
                .split(',')
                .map(|s| s.trim().trim_matches('"'))
                .collect();
            if args.len() >= 2 && args[0] == "EPSG" {
                if let Ok(code) = args[1].parse() {
                    return Some(code);
                }
            }
        }
    }
    wkt_name_code(&upper)
}

fn wkt_name_code(upper: &str) -> Option<u32> {
    let root = upper.split('[').next()?.trim();
    let name = upper
        .split('"')
        .nth(1)
        .unwrap_or_default()
        .replace([' ', '-'], "_");
    if root == "PROJCS" || root == "PROJCRS" {
        if name.contains("WEB_MERCATOR") || name.contains("PSEUDO_MERCATOR") {
            return Some(3857);
        }
        let zone_at = name.find("UTM_ZONE_")?;
        let tail = &name[zone_at + "UTM_ZONE_".len()..];
        let digits: String = tail.chars().take_while(char::is_ascii_digit).collect();
        let zone: u32 = digits.parse().ok()?;
        let south = tail[digits.len()..].starts_with('S');
        if !(1..=60).contains(&zone) {
            return None;
        }
        if name.contains("ETRS") {
            return (!south).then_some(25800 + zone);
        }
        if name.contains("WGS_1984") || name.contains("WGS_84") || name.contains("WGS84") {
            return Some(if south { 32700 } else { 32600 } + zone);
        }
        None
    } else if root == "GEOGCS" || root == "GEOGCRS" {
        if name.contains("WGS_1984") || name.contains("WGS_84") || name.contains("WGS84") {
            return Some(4326);
        }
        if name.contains("ETRS") {
            return Some(4258);
        }
        None
    } else {
        None
    }
}

// ── Transforms ──────────────────────────────────────────────────

/// Web Mercator sphere radius (metres).
const MERCATOR_RADIUS: f64 = 6_378_137.0;
const WGS84_A: f64 = 6_378_137.0;
const WGS84_INV_F: f64 = 298.257_223_563;
const GRS80_INV_F: f64 = 298.257_222_101;
const UTM_K0: f64 = 0.9996;
const UTM_FALSE_EASTING: f64 = 500_000.0;
const UTM_FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;

/// Inverse projection onto WGS84 longitude/latitude degrees.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum Transform {
    /// Already geographic WGS84 (or a datum treated as equal to it).
    Identity,
    /// Spherical Web Mercator.
    WebMercator,
    /// Universal Transverse Mercator zone.
    Utm {
        zone: u32,
        south: bool,
        inv_flattening: f64,
    },
}

impl Transform {
    /// Inverse projection for an EPSG code, if supported.
    pub fn for_epsg(code: u32) -> Option<Self> {
        match code {
            4326 | 4258 => Some(Self::Identity),
            3857 | 900_913 | 3785 | 102_100 | 102_113 => Some(Self::WebMercator),
            32601..=32660 => Some(Self::utm(code - 32600, false, WGS84_INV_F)),
            32701..=32760 => Some(Self::utm(code - 32700, true, WGS84_INV_F)),
            25801..=25860 => Some(Self::utm(code - 25800, false, GRS80_INV_F)),
            _ => None,
        }
    }

    fn utm(zone: u32, south: bool, inv_flattening: f64) -> Self {
        Self::Utm {
            zone,
            south,
            inv_flattening,
        }
    }

    /// Map one coordinate.
    pub fn apply(&self, c: Coord<f64>) -> Coord<f64> {
        match *self {
            Self::Identity => c,
            Self::WebMercator => Coord {
                x: (c.x / MERCATOR_RADIUS).to_degrees(),
                y: (2.0 * (c.y / MERCATOR_RADIUS).exp().atan() - PI / 2.0).to_degrees(),
            },
            Self::Utm {
                zone,
                south,
                inv_flattening,
            } => inverse_utm(c, zone, south, inv_flattening),
        }
    }

    /// Map every coordinate of `geometry` in place.
    pub fn apply_to(&self, geometry: &mut Geometry<f64>) {
        if *self != Self::Identity {
            geometry.map_coords_in_place(|c| self.apply(c));
        }
    }
}

/// Snyder's inverse transverse Mercator series (USGS PP 1395, 8-18 to 8-25).
fn inverse_utm(c: Coord<f64>, zone: u32, south: bool, inv_flattening: f64) -> Coord<f64> {
    let a = WGS84_A;
    let f = 1.0 / inv_flattening;
    let e2 = f * (2.0 - f);
    let ep2 = e2 / (1.0 - e2);
    let lon0 = (f64::from(zone) * 6.0 - 183.0).to_radians();

    let x = c.x - UTM_FALSE_EASTING;
    let y = if south {
        c.y - UTM_FALSE_NORTHING_SOUTH
    } else {
        c.y
    };

    let m = y / UTM_K0;
    let mu = m / (a * (1.0 - e2 / 4.0 - 3.0 * e2 * e2 / 64.0 - 5.0 * e2.powi(3) / 256.0));
    let e1 = (1.0 - (1.0 - e2).sqrt()) / (1.0 + (1.0 - e2).sqrt());
    let phi1 = mu
        + (3.0 * e1 / 2.0 - 27.0 * e1.powi(3) / 32.0) * (2.0 * mu).sin()
        + (21.0 * e1 * e1 / 16.0 - 55.0 * e1.powi(4) / 32.0) * (4.0 * mu).sin()
        + (151.0 * e1.powi(3) / 96.0) * (6.0 * mu).sin()
        + (1097.0 * e1.powi(4) / 512.0) * (8.0 * mu).sin();

    let (sin1, cos1) = phi1.sin_cos();
    let tan1 = sin1 / cos1;
    let c1 = ep2 * cos1 * cos1;
    let t1 = tan1 * tan1;
    let n1 = a / (1.0 - e2 * sin1 * sin1).sqrt();
    let r1 = a * (1.0 - e2) / (1.0 - e2 * sin1 * sin1).powf(1.5);
    let d = x / (n1 * UTM_K0);

    let lat = phi1
        - (n1 * tan1 / r1)
            * (d * d / 2.0
                - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * ep2) * d.powi(4) / 24.0
                + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1 - 252.0 * ep2 - 3.0 * c1 * c1)
                    * d.powi(6)
                    / 720.0);
    let lon = lon0
        + (d - (1.0 + 2.0 * t1 + c1) * d.powi(3) / 6.0
            + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * ep2 + 24.0 * t1 * t1)
                * d.powi(5)
                / 120.0)
            / cos1;

    Coord {
        x: lon.to_degrees(),
        y: lat.to_degrees(),
    }
}

// ── Normalization plan ──────────────────────────────────────────

/// How a layer's coordinates will be treated.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Normalization {
    /// Projection to apply, `None` to keep coordinates as they are.
    pub transform: Option<Transform>,
    /// Tag for the resulting dataset.
    pub crs: Crs,
    /// Warning to surface, if the layer could not be normalized.
    pub warning: Option<Warning>,
}

/// Decide the normalization for a declared CRS.
pub(crate) fn plan(declared: &DeclaredCrs) -> Normalization {
    match declared {
        DeclaredCrs::Epsg(code) => match Transform::for_epsg(*code) {
            Some(transform) => Normalization {
                transform: Some(transform),
                crs: Crs::WORKING,
                warning: None,
            },
            None => Normalization {
                transform: None,
                crs: Crs::Epsg(*code),
                warning: Some(Warning::source(format!(
                    "EPSG:{code} is not supported for reprojection; coordinates kept in the source CRS"
                ))),
            },
        },
        DeclaredCrs::Unrecognized(decl) => Normalization {
            transform: None,
            crs: Crs::Unknown,
            warning: Some(Warning::source(format!(
                "could not interpret CRS declaration {:?}; coordinates kept as given",
                truncate(decl, 80)
            ))),
        },
        DeclaredCrs::Undeclared => Normalization {
            transform: None,
            crs: Crs::Unknown,
            warning: Some(Warning::source(
                "source declares no CRS; coordinates kept as given",
            )),
        },
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Coord<f64>, x: f64, y: f64, tol: f64) -> bool {
        (a.x - x).abs() < tol && (a.y - y).abs() < tol
    }

    #[test]
    fn identifiers() {
        assert_eq!(parse_identifier("EPSG:3857"), Some(3857));
        assert_eq!(parse_identifier("urn:ogc:def:crs:EPSG::25832"), Some(25832));
        assert_eq!(parse_identifier("urn:ogc:def:crs:OGC:1.3:CRS84"), Some(4326));
        assert_eq!(parse_identifier("4326"), Some(4326));
        assert_eq!(parse_identifier("local grid"), None);
    }

    #[test]
    fn wkt_authority_of_outermost_object() {
        let wkt = r#"PROJCS["WGS 84 / UTM zone 33N",GEOGCS["WGS 84",DATUM["WGS_1984",SPHEROID["WGS 84",6378137,298.257223563,AUTHORITY["EPSG","7030"]],AUTHORITY["EPSG","6326"]],AUTHORITY["EPSG","4326"]],PROJECTION["Transverse_Mercator"],AUTHORITY["EPSG","32633"]]"#;
        assert_eq!(parse_wkt(wkt), Some(32633));
    }

    #[test]
    fn esri_wkt_names() {
        let geo = r#"GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137.0,298.257223563]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]]"#;
        assert_eq!(parse_wkt(geo), Some(4326));
        let utm = r#"PROJCS["ETRS_1989_UTM_Zone_32N",GEOGCS["GCS_ETRS_1989"]]"#;
        assert_eq!(parse_wkt(utm), Some(25832));
        let south = r#"PROJCS["WGS_1984_UTM_Zone_21S",GEOGCS["GCS_WGS_1984"]]"#;
        assert_eq!(parse_wkt(south), Some(32721));
        let merc = r#"PROJCS["WGS_1984_Web_Mercator_Auxiliary_Sphere",GEOGCS["GCS_WGS_1984"]]"#;
        assert_eq!(parse_wkt(merc), Some(3857));
        assert_eq!(parse_wkt(r#"LOCAL_CS["site"]"#), None);
    }

    #[test]
    fn web_mercator_inverse() {
        let t = Transform::for_epsg(3857).unwrap();
        assert!(close(t.apply(Coord { x: 0.0, y: 0.0 }), 0.0, 0.0, 1e-12));
        let edge = t.apply(Coord {
            x: 20_037_508.342_789_244,
            y: 0.0,
        });
        assert!(close(edge, 180.0, 0.0, 1e-9));
        // 45 degrees north in Web Mercator metres.
        let north = t.apply(Coord {
            x: 0.0,
            y: 5_621_521.486_192_066,
        });
        assert!(close(north, 0.0, 45.0, 1e-9));
    }

    #[test]
    fn utm_central_meridian_on_equator() {
        let north = Transform::for_epsg(32633).unwrap();
        assert!(close(
            north.apply(Coord {
                x: 500_000.0,
                y: 0.0
            }),
            15.0,
            0.0,
            1e-9
        ));
        let south = Transform::for_epsg(32733).unwrap();
        assert!(close(
            south.apply(Coord {
                x: 500_000.0,
                y: 10_000_000.0
            }),
            15.0,
            0.0,
            1e-9
        ));
    }

    #[test]
    fn utm_known_point() {
        // EPSG:25832 easting/northing of 9 E, 48 N (zone 32 central meridian).
        let t = Transform::for_epsg(25832).unwrap();
        let p = t.apply(Coord {
            x: 500_000.0,
            y: 5_316_300.224_7,
        });
        assert!(close(p, 9.0, 48.0, 1e-3));
        // Off-meridian points stay in the zone and hemisphere.
        let east = t.apply(Coord {
            x: 600_000.0,
            y: 5_316_300.224_7,
        });
        assert!(east.x > 9.0 && east.x < 12.0);
        assert!(east.y > 47.0 && east.y < 48.0);
    }

    #[test]
    fn plans() {
        assert_eq!(plan(&DeclaredCrs::Epsg(4326)).crs, Crs::WORKING);
        assert!(plan(&DeclaredCrs::Epsg(4326)).warning.is_none());
        let unsupported = plan(&DeclaredCrs::Epsg(3003));
        assert_eq!(unsupported.crs, Crs::Epsg(3003));
        assert!(unsupported.transform.is_none());
        assert!(unsupported.warning.is_some());
        assert_eq!(plan(&DeclaredCrs::Undeclared).crs, Crs::Unknown);
        assert_eq!(plan(&DeclaredCrs::Unrecognized("x".into())).crs, Crs::Unknown);
    }
}
