// Planar geometry for geographic filtering and the observed-regions stream.
//
// Filters may carry either a parsed planar shape or a WKB blob; both
// normalize to `PlanarGeometry` before any matching. Matching itself is
// axis-aligned bounding-box intersection of the entity point against the
// filter shape.

use serde::{Deserialize, Serialize};
use thiserror::Error;


/// Geographic position of an entity.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
}

/// A single lon/lat vertex.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LonLat {
    pub longitude: f64,
    pub latitude: f64,
}

/// An open polyline.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LineString {
    pub points: Vec<LonLat>,
}

/// A polygon with an outer ring and optional holes.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    pub outer: LineString,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub holes: Vec<LineString>,
}

/// A planar shape: point, open polyline, or polygon with optional holes,
/// in lon/lat coordinates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PlanarGeometry {
    Point(LonLat),
    Line(LineString),
    Polygon(Polygon),
}

/// Axis-aligned lon/lat bounding box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bound {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl Bound {
    pub fn of(p: LonLat) -> Self {
        Self {
            min_lon: p.longitude,
            min_lat: p.latitude,
            max_lon: p.longitude,
            max_lat: p.latitude,
        }
    }

    pub fn extend(&mut self, p: LonLat) {
        self.min_lon = self.min_lon.min(p.longitude);
        self.min_lat = self.min_lat.min(p.latitude);
        self.max_lon = self.max_lon.max(p.longitude);
        self.max_lat = self.max_lat.max(p.latitude);
    }

    pub fn intersects(&self, other: &Bound) -> bool {
        self.min_lon <= other.max_lon
            && other.min_lon <= self.max_lon
            && self.min_lat <= other.max_lat
            && other.min_lat <= self.max_lat
    }

    pub fn contains(&self, p: LonLat) -> bool {
        self.intersects(&Bound::of(p))
    }
}

impl PlanarGeometry {
    /// Bounding box of the shape. `None` for degenerate shapes with no
    /// vertices, which filters treat as matching everything.
    pub fn bound(&self) -> Option<Bound> {
        let points: &[LonLat] = match self {
            PlanarGeometry::Point(p) => std::slice::from_ref(p),
            PlanarGeometry::Line(line) => &line.points,
            PlanarGeometry::Polygon(poly) => &poly.outer.points,
        };
        let mut iter = points.iter();
        let mut bound = Bound::of(*iter.next()?);
        for p in iter {
            bound.extend(*p);
        }
        Some(bound)
    }
}

impl Position {
    pub fn lon_lat(&self) -> LonLat {
        LonLat {
            longitude: self.longitude,
            latitude: self.latitude,
        }
    }
}

/// A geometry as carried on the wire: a parsed planar shape, a WKB blob, or
/// both. The planar form wins when both are present.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub planar: Option<PlanarGeometry>,
    #[serde(default, with = "wkb_base64", skip_serializing_if = "Option::is_none")]
    pub wkb: Option<Vec<u8>>,
}

impl Geometry {
    pub fn from_planar(planar: PlanarGeometry) -> Self {
        Self {
            planar: Some(planar),
            wkb: None,
        }
    }

    /// Normalize to the internal planar representation.
    pub fn resolve(&self) -> Result<Option<PlanarGeometry>, WkbError> {
        if let Some(planar) = &self.planar {
            return Ok(Some(planar.clone()));
        }
        match &self.wkb {
            Some(bytes) => wkb::decode(bytes).map(Some),
            None => Ok(None),
        }
    }
}

/// WKB decode failures. Undecodable geometry in a filter is logged and
/// treated as "no geometry", never as a stream error.
#[derive(Debug, Error)]
pub enum WkbError {
    #[error("wkb payload truncated")]
    Truncated,
    #[error("unsupported wkb byte order {0}")]
    ByteOrder(u8),
    #[error("unsupported wkb geometry type {0}")]
    GeometryType(u32),
    #[error("empty wkb geometry")]
    Empty,
}

/// Minimal well-known-binary codec covering the shapes this service
/// exchanges: points, line strings, polygons, and geometry collections.
/// Encoding is always little-endian; both byte orders decode.
pub mod wkb {
    use super::{LineString, LonLat, PlanarGeometry, Polygon, WkbError};

    const POINT: u32 = 1;
    const LINE_STRING: u32 = 2;
    const POLYGON: u32 = 3;
    const COLLECTION: u32 = 7;

    pub fn encode(geometry: &PlanarGeometry) -> Vec<u8> {
        let mut out = Vec::new();
        write_geometry(&mut out, geometry);
        out
    }

    /// Encode a set of shapes as a single GeometryCollection. Used by the
    /// observed-regions stream.
    pub fn encode_collection(geometries: &[PlanarGeometry]) -> Vec<u8> {
        let mut out = Vec::new();
        out.push(1);
        out.extend_from_slice(&COLLECTION.to_le_bytes());
        out.extend_from_slice(&(geometries.len() as u32).to_le_bytes());
        for g in geometries {
            write_geometry(&mut out, g);
        }
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<PlanarGeometry, WkbError> {
        let mut reader = Reader { bytes, pos: 0 };
        reader.geometry()
    }

    /// Decode a GeometryCollection (or a single shape) into its members.
    pub fn decode_collection(bytes: &[u8]) -> Result<Vec<PlanarGeometry>, WkbError> {
        let mut reader = Reader { bytes, pos: 0 };
        let little = reader.byte_order()?;
        let kind = reader.u32(little)?;
        if kind != COLLECTION {
            reader.pos = 0;
            return Ok(vec![reader.geometry()?]);
        }
        let count = reader.u32(little)? as usize;
        let mut members = Vec::with_capacity(count);
        for _ in 0..count {
            members.push(reader.geometry()?);
        }
        Ok(members)
    }

    fn write_geometry(out: &mut Vec<u8>, geometry: &PlanarGeometry) {
        out.push(1);
        match geometry {
            PlanarGeometry::Point(p) => {
                out.extend_from_slice(&POINT.to_le_bytes());
                write_point(out, *p);
            }
            PlanarGeometry::Line(line) => {
                out.extend_from_slice(&LINE_STRING.to_le_bytes());
                write_ring(out, &line.points);
            }
            PlanarGeometry::Polygon(poly) => {
                out.extend_from_slice(&POLYGON.to_le_bytes());
                out.extend_from_slice(&(1 + poly.holes.len() as u32).to_le_bytes());
                write_ring(out, &poly.outer.points);
                for hole in &poly.holes {
                    write_ring(out, &hole.points);
                }
            }
        }
    }

    fn write_point(out: &mut Vec<u8>, p: LonLat) {
        out.extend_from_slice(&p.longitude.to_le_bytes());
        out.extend_from_slice(&p.latitude.to_le_bytes());
    }

    fn write_ring(out: &mut Vec<u8>, points: &[LonLat]) {
        out.extend_from_slice(&(points.len() as u32).to_le_bytes());
        for p in points {
            write_point(out, *p);
        }
    }

    struct Reader<'a> {
        bytes: &'a [u8],
        pos: usize,
    }

    impl<'a> Reader<'a> {
        fn take(&mut self, n: usize) -> Result<&'a [u8], WkbError> {
            let bytes = self.bytes;
            let end = self.pos.checked_add(n).ok_or(WkbError::Truncated)?;
            if end > bytes.len() {
                return Err(WkbError::Truncated);
            }
            let slice = &bytes[self.pos..end];
            self.pos = end;
            Ok(slice)
        }

        fn byte_order(&mut self) -> Result<bool, WkbError> {
            match self.take(1)?[0] {
                0 => Ok(false),
                1 => Ok(true),
                other => Err(WkbError::ByteOrder(other)),
            }
        }

        fn u32(&mut self, little: bool) -> Result<u32, WkbError> {
            let raw: [u8; 4] = self.take(4)?.try_into().unwrap();
            Ok(if little {
                u32::from_le_bytes(raw)
            } else {
                u32::from_be_bytes(raw)
            })
        }

        fn f64(&mut self, little: bool) -> Result<f64, WkbError> {
            let raw: [u8; 8] = self.take(8)?.try_into().unwrap();
            Ok(if little {
                f64::from_le_bytes(raw)
            } else {
                f64::from_be_bytes(raw)
            })
        }

        fn point(&mut self, little: bool) -> Result<LonLat, WkbError> {
            let longitude = self.f64(little)?;
            let latitude = self.f64(little)?;
            Ok(LonLat {
                longitude,
                latitude,
            })
        }

        fn ring(&mut self, little: bool) -> Result<Vec<LonLat>, WkbError> {
            let count = self.u32(little)? as usize;
            let mut points = Vec::with_capacity(count.min(4096));
            for _ in 0..count {
                points.push(self.point(little)?);
            }
            Ok(points)
        }

        fn geometry(&mut self) -> Result<PlanarGeometry, WkbError> {
            let little = self.byte_order()?;
            match self.u32(little)? {
                POINT => Ok(PlanarGeometry::Point(self.point(little)?)),
                LINE_STRING => Ok(PlanarGeometry::Line(LineString {
                    points: self.ring(little)?,
                })),
                POLYGON => {
                    let rings = self.u32(little)? as usize;
                    if rings == 0 {
                        return Err(WkbError::Empty);
                    }
                    let outer = LineString {
                        points: self.ring(little)?,
                    };
                    let mut holes = Vec::with_capacity(rings - 1);
                    for _ in 1..rings {
                        holes.push(LineString {
                            points: self.ring(little)?,
                        });
                    }
                    Ok(PlanarGeometry::Polygon(Polygon { outer, holes }))
                }
                other => Err(WkbError::GeometryType(other)),
            }
        }
    }
}

/// Serde adapter carrying WKB bytes as base64 in JSON.
mod wkb_base64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        bytes: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(bytes) => serializer.serialize_str(&STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        let encoded: Option<String> = Option::deserialize(deserializer)?;
        match encoded {
            Some(encoded) => STANDARD
                .decode(encoded.as_bytes())
                .map(Some)
                .map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}
