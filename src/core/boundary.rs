//! Reference boundary geometry and point containment.
//!
//! The boundary is loaded once per run from a GeoJSON document or an ESRI
//! shapefile and answers "is this (longitude, latitude) inside?" queries.
//!
//! Containment follows `geo::Contains`: a point lying exactly on a polygon
//! edge or vertex is *not* contained, and neither is a point inside a hole.

use std::path::{Path, PathBuf};

use geo::{BoundingRect, Contains, Coord, Geometry, LineString, MultiPolygon, Point, Polygon, Rect};
use geojson::GeoJson;
use thiserror::Error;

/// Errors that can occur while loading a boundary.
#[derive(Error, Debug)]
pub enum BoundaryError {
    #[error("boundary file not found: {0}")]
    NotFound(PathBuf),

    #[error("IO error reading boundary '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid GeoJSON in '{path}': {source}")]
    GeoJson {
        path: PathBuf,
        #[source]
        source: Box<geojson::Error>,
    },

    #[error("invalid shapefile '{path}': {source}")]
    Shapefile {
        path: PathBuf,
        #[source]
        source: shapefile::Error,
    },

    #[error("unsupported boundary format: .{0} (expected .geojson, .json or .shp)")]
    UnsupportedFormat(String),

    #[error("boundary '{0}' contains no polygons")]
    Empty(PathBuf),
}

/// Result type for boundary operations.
pub type Result<T> = std::result::Result<T, BoundaryError>;

/// Accepted geographic region: one or more polygons in (longitude, latitude).
#[derive(Debug, Clone)]
pub struct GeoBoundary {
    polygons: MultiPolygon<f64>,
    extent: Option<Rect<f64>>,
}

impl GeoBoundary {
    /// Create a boundary from polygons whose coordinates are (lon, lat).
    pub fn from_polygons(polygons: Vec<Polygon<f64>>) -> Self {
        let polygons = MultiPolygon::new(polygons);
        let extent = polygons.bounding_rect();
        Self { polygons, extent }
    }

    /// Load a boundary file. Dispatch by extension.
    ///
    /// Supported formats:
    /// * `.geojson` / `.json` – any GeoJSON object; areal geometries are kept
    /// * `.shp`               – ESRI shapefile with polygon shapes
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(BoundaryError::NotFound(path.to_path_buf()));
        }

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();

        let polygons = match ext.as_str() {
            "geojson" | "json" => load_geojson(path)?,
            "shp" => load_shapefile(path)?,
            other => return Err(BoundaryError::UnsupportedFormat(other.to_string())),
        };

        if polygons.is_empty() {
            return Err(BoundaryError::Empty(path.to_path_buf()));
        }

        Ok(Self::from_polygons(polygons))
    }

    /// Number of polygons making up the boundary.
    #[inline]
    pub fn num_polygons(&self) -> usize {
        self.polygons.0.len()
    }

    /// Whether the point (`lon`, `lat`) lies inside any polygon.
    ///
    /// Non-finite coordinates are never inside.
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        if !lon.is_finite() || !lat.is_finite() {
            return false;
        }

        match self.extent {
            Some(rect) => {
                let (min, max) = (rect.min(), rect.max());
                if lon < min.x || lon > max.x || lat < min.y || lat > max.y {
                    return false;
                }
            }
            None => return false,
        }

        let point = Point::new(lon, lat);
        self.polygons.0.iter().any(|polygon| polygon.contains(&point))
    }
}

fn load_geojson(path: &Path) -> Result<Vec<Polygon<f64>>> {
    let text = std::fs::read_to_string(path).map_err(|e| BoundaryError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;

    let geojson_err = |e: geojson::Error| BoundaryError::GeoJson {
        path: path.to_path_buf(),
        source: Box::new(e),
    };

    let document: GeoJson = text.parse().map_err(geojson_err)?;
    let collection: geo::GeometryCollection<f64> =
        geojson::quick_collection(&document).map_err(geojson_err)?;

    let mut polygons = Vec::new();
    for geometry in collection.0 {
        collect_polygons(geometry, &mut polygons);
    }
    Ok(polygons)
}

fn collect_polygons(geometry: Geometry<f64>, out: &mut Vec<Polygon<f64>>) {
    match geometry {
        Geometry::Polygon(polygon) => out.push(polygon),
        Geometry::MultiPolygon(multi) => out.extend(multi.0),
        Geometry::Rect(rect) => out.push(rect.to_polygon()),
        Geometry::GeometryCollection(collection) => {
            for inner in collection.0 {
                collect_polygons(inner, out);
            }
        }
        // Points and lines have no area to contain anything
        _ => {}
    }
}

fn load_shapefile(path: &Path) -> Result<Vec<Polygon<f64>>> {
    let shapes = shapefile::read_shapes_as::<_, shapefile::Polygon>(path).map_err(|e| {
        BoundaryError::Shapefile {
            path: path.to_path_buf(),
            source: e,
        }
    })?;

    let mut polygons = Vec::new();
    for shape in &shapes {
        let mut exterior: Option<LineString<f64>> = None;
        let mut holes: Vec<LineString<f64>> = Vec::new();

        for ring in shape.rings() {
            let line: LineString<f64> = ring
                .points()
                .iter()
                .map(|p| Coord { x: p.x, y: p.y })
                .collect();

            match ring {
                shapefile::PolygonRing::Outer(_) => {
                    if let Some(outer) = exterior.take() {
                        polygons.push(Polygon::new(outer, std::mem::take(&mut holes)));
                    }
                    exterior = Some(line);
                }
                shapefile::PolygonRing::Inner(_) => holes.push(line),
            }
        }

        if let Some(outer) = exterior {
            polygons.push(Polygon::new(outer, holes));
        }
    }

    Ok(polygons)
}
