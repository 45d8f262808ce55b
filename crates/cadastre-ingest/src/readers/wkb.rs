//! Well-known binary polygon decoding (ISO and EWKB flavours).

use cadastre_core::GeometryError;
use geo_types::{Coord, Geometry, LineString, MultiPolygon, Polygon};

const EWKB_Z: u32 = 0x8000_0000;
const EWKB_M: u32 = 0x4000_0000;
const EWKB_SRID: u32 = 0x2000_0000;

const WKB_POINT: u32 = 1;
const WKB_LINESTRING: u32 = 2;
const WKB_POLYGON: u32 = 3;
const WKB_MULTIPOINT: u32 = 4;
const WKB_MULTILINESTRING: u32 = 5;
const WKB_MULTIPOLYGON: u32 = 6;
const WKB_COLLECTION: u32 = 7;

/// Decode one WKB geometry. Only polygonal content is accepted; a
/// geometry collection is accepted when every member is polygonal.
pub(crate) fn decode(bytes: &[u8]) -> Result<Geometry<f64>, GeometryError> {
    let mut reader = Reader { buf: bytes, pos: 0 };
    let polys = reader.geometry(0)?;
    match polys {
        Decoded::Polygon(p) => Ok(Geometry::Polygon(p)),
        Decoded::Multi(ps) if ps.is_empty() => Err(GeometryError::Empty),
        Decoded::Multi(ps) => Ok(Geometry::MultiPolygon(MultiPolygon(ps))),
    }
}

enum Decoded {
    Polygon(Polygon<f64>),
    Multi(Vec<Polygon<f64>>),
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

/// Byte order plus coordinate layout of one geometry header.
#[derive(Clone, Copy)]
struct Header {
    little_endian: bool,
    base: u32,
    dims: usize,
}

const MAX_NESTING: usize = 8;

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], GeometryError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.buf.len())
            .ok_or_else(|| GeometryError::malformed("WKB truncated"))?;
        let out = &self.buf[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn u32(&mut self, le: bool) -> Result<u32, GeometryError> {
        let b: [u8; 4] = self
            .take(4)?
            .try_into()
            .map_err(|_| GeometryError::malformed("WKB truncated"))?;
        Ok(if le {
            u32::from_le_bytes(b)
        } else {
            u32::from_be_bytes(b)
        })
    }

    fn f64(&mut self, le: bool) -> Result<f64, GeometryError> {
        let b: [u8; 8] = self
            .take(8)?
            .try_into()
            .map_err(|_| GeometryError::malformed("WKB truncated"))?;
        Ok(if le {
            f64::from_le_bytes(b)
        } else {
            f64::from_be_bytes(b)
        })
    }

    fn header(&mut self) -> Result<Header, GeometryError> {
        let little_endian = match self.take(1)?[0] {
            0 => false,
            1 => true,
            other => {
                return Err(GeometryError::malformed(format!(
                    "invalid WKB byte order marker {other}"
                )))
            }
        };
        let raw = self.u32(little_endian)?;
        let mut z = raw & EWKB_Z != 0;
        let mut m = raw & EWKB_M != 0;
        if raw & EWKB_SRID != 0 {
            self.u32(little_endian)?;
        }
        let iso = raw & 0x0FFF_FFFF;
        match iso / 1000 {
            0 => {}
            1 => z = true,
            2 => m = true,
            3 => {
                z = true;
                m = true;
            }
            _ => {
                return Err(GeometryError::malformed(format!(
                    "invalid WKB geometry type {raw:#x}"
                )))
            }
        }
        Ok(Header {
            little_endian,
            base: iso % 1000,
            dims: 2 + usize::from(z) + usize::from(m),
        })
    }

    fn count(&mut self, le: bool) -> Result<usize, GeometryError> {
        let n = self.u32(le)? as usize;
        // Every counted element takes at least one byte; reject counts the
        // remaining input cannot hold before allocating for them.
        if n > self.buf.len() - self.pos {
            return Err(GeometryError::malformed("WKB element count exceeds input"));
        }
        Ok(n)
    }

    fn geometry(&mut self, depth: usize) -> Result<Decoded, GeometryError> {
        if depth > MAX_NESTING {
            return Err(GeometryError::malformed("WKB nesting too deep"));
        }
        let h = self.header()?;
        match h.base {
            WKB_POLYGON => self.polygon(h).map(Decoded::Polygon),
            WKB_MULTIPOLYGON | WKB_COLLECTION => {
                let n = self.count(h.little_endian)?;
                let mut out = Vec::with_capacity(n);
                for _ in 0..n {
                    match self.geometry(depth + 1)? {
                        Decoded::Polygon(p) => out.push(p),
                        Decoded::Multi(ps) => out.extend(ps),
                    }
                }
                Ok(Decoded::Multi(out))
            }
            other => Err(GeometryError::UnsupportedType {
                found: type_name(other).to_owned(),
            }),
        }
    }

    fn polygon(&mut self, h: Header) -> Result<Polygon<f64>, GeometryError> {
        let n_rings = self.count(h.little_endian)?;
        if n_rings == 0 {
            return Err(GeometryError::Empty);
        }
        let mut rings = Vec::with_capacity(n_rings);
        for ring_idx in 0..n_rings {
            let n_points = self.count(h.little_endian)?;
            let mut coords = Vec::with_capacity(n_points);
            for _ in 0..n_points {
                let x = self.f64(h.little_endian)?;
                let y = self.f64(h.little_endian)?;
                for _ in 2..h.dims {
                    self.f64(h.little_endian)?;
                }
                coords.push(Coord { x, y });
            }
            check_ring(&coords, ring_idx)?;
            rings.push(LineString(coords));
        }
        let mut rings = rings.into_iter();
        let exterior = rings.next().ok_or(GeometryError::Empty)?;
        Ok(Polygon::new(exterior, rings.collect()))
    }
}

/// Closure and size checks that `Polygon::new` would otherwise paper over.
pub(crate) fn check_ring(coords: &[Coord<f64>], ring: usize) -> Result<(), GeometryError> {
    if coords.len() < 4 {
        return Err(GeometryError::TooFewPoints {
            ring,
            points: coords.len(),
        });
    }
    if coords.first() != coords.last() {
        return Err(GeometryError::UnclosedRing { ring });
    }
    Ok(())
}

fn type_name(code: u32) -> &'static str {
    match code {
        WKB_POINT => "Point",
        WKB_LINESTRING => "LineString",
        WKB_MULTIPOINT => "MultiPoint",
        WKB_MULTILINESTRING => "MultiLineString",
        _ => "unknown WKB type",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadastre_test_utils::fixtures::{wkb_multipolygon, wkb_polygon};
    use cadastre_test_utils::unit_square;

    fn be_polygon_z() -> Vec<u8> {
        let mut out = vec![0u8];
        out.extend_from_slice(&(WKB_POLYGON | EWKB_Z | EWKB_SRID).to_be_bytes());
        out.extend_from_slice(&4326u32.to_be_bytes());
        out.extend_from_slice(&1u32.to_be_bytes());
        out.extend_from_slice(&4u32.to_be_bytes());
        for (x, y) in [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0), (0.0, 0.0)] {
            out.extend_from_slice(&f64::to_be_bytes(x));
            out.extend_from_slice(&f64::to_be_bytes(y));
            out.extend_from_slice(&f64::to_be_bytes(9.0));
        }
        out
    }

    #[test]
    fn decodes_little_endian_polygon() {
        let poly = unit_square(2.0, 3.0);
        assert_eq!(decode(&wkb_polygon(&poly)).unwrap(), Geometry::Polygon(poly));
    }

    #[test]
    fn decodes_multipolygon() {
        let polys = vec![unit_square(0.0, 0.0), unit_square(5.0, 5.0)];
        match decode(&wkb_multipolygon(&polys)).unwrap() {
            Geometry::MultiPolygon(m) => assert_eq!(m.0, polys),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn decodes_big_endian_ewkb_with_z_and_srid() {
        match decode(&be_polygon_z()).unwrap() {
            Geometry::Polygon(p) => assert_eq!(p.exterior().0.len(), 4),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn iso_z_type_codes_are_understood() {
        let mut wkb = vec![1u8];
        wkb.extend_from_slice(&1003u32.to_le_bytes());
        wkb.extend_from_slice(&1u32.to_le_bytes());
        wkb.extend_from_slice(&4u32.to_le_bytes());
        for (x, y) in [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 0.0)] {
            for v in [x, y, 2.5] {
                wkb.extend_from_slice(&f64::to_le_bytes(v));
            }
        }
        assert!(matches!(decode(&wkb).unwrap(), Geometry::Polygon(_)));
    }

    #[test]
    fn rejects_points_and_truncation() {
        let mut point = vec![1u8];
        point.extend_from_slice(&1u32.to_le_bytes());
        point.extend_from_slice(&[0u8; 16]);
        assert_eq!(
            decode(&point).unwrap_err(),
            GeometryError::UnsupportedType {
                found: "Point".into()
            }
        );
        let wkb = wkb_polygon(&unit_square(0.0, 0.0));
        assert!(matches!(
            decode(&wkb[..wkb.len() - 3]).unwrap_err(),
            GeometryError::Malformed { .. }
        ));
    }

    #[test]
    fn rejects_unclosed_ring() {
        let mut wkb = vec![1u8];
        wkb.extend_from_slice(&3u32.to_le_bytes());
        wkb.extend_from_slice(&1u32.to_le_bytes());
        wkb.extend_from_slice(&4u32.to_le_bytes());
        for (x, y) in [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)] {
            wkb.extend_from_slice(&f64::to_le_bytes(x));
            wkb.extend_from_slice(&f64::to_le_bytes(y));
        }
        assert_eq!(
            decode(&wkb).unwrap_err(),
            GeometryError::UnclosedRing { ring: 0 }
        );
    }
}
