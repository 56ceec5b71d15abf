//! Geographic filtering of georeference tables.

use rayon::prelude::*;

use crate::core::boundary::GeoBoundary;
use crate::core::table::{Result, Table};

/// Parse a coordinate cell. Anything unparseable becomes NaN, which the
/// boundary never contains.
#[inline]
fn parse_degrees(cell: Option<&str>) -> f64 {
    cell.and_then(|s| s.trim().parse::<f64>().ok())
        .unwrap_or(f64::NAN)
}

/// Compute, per row, whether its (longitude, latitude) lies inside `boundary`.
///
/// Rows are independent, so the test runs in parallel across rows.
///
/// # Errors
///
/// Returns a schema error if either coordinate column is missing.
pub fn inside_mask(
    table: &Table,
    boundary: &GeoBoundary,
    latitude_column: &str,
    longitude_column: &str,
) -> Result<Vec<bool>> {
    let lat_idx = table.require_column(latitude_column)?;
    let lon_idx = table.require_column(longitude_column)?;

    let mask = table
        .rows
        .par_iter()
        .map(|row| {
            let lat = parse_degrees(row.get(lat_idx));
            let lon = parse_degrees(row.get(lon_idx));
            boundary.contains(lon, lat)
        })
        .collect();

    Ok(mask)
}

/// Keep only the rows whose coordinate is inside `boundary`, in original order.
pub fn filter_inside(
    table: &Table,
    boundary: &GeoBoundary,
    latitude_column: &str,
    longitude_column: &str,
) -> Result<Table> {
    let mask = inside_mask(table, boundary, latitude_column, longitude_column)?;
    Ok(table.select(&mask))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::table::TableError;
    use geo::{LineString, Polygon};

    fn unit_boundary() -> GeoBoundary {
        GeoBoundary::from_polygons(vec![Polygon::new(
            LineString::from(vec![(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)]),
            vec![],
        )])
    }

    fn ssns(table: &Table) -> Vec<&str> {
        table.rows.iter().map(|r| &r[0]).collect()
    }

    #[test]
    fn test_filter_inside() {
        let table = Table::from_rows(
            ["SSN", "Latitude", "Longitude"],
            [
                ["A", "5", "5"],
                ["B", "20", "20"],
                ["C", "5", "0"],
                ["D", "2.5", "7.5"],
            ],
        );

        let kept = filter_inside(&table, &unit_boundary(), "Latitude", "Longitude").unwrap();

        // C sits on the western edge and is rejected
        assert_eq!(ssns(&kept), vec!["A", "D"]);
        assert_eq!(kept.headers, table.headers);
    }

    #[test]
    fn test_point_is_lon_lat() {
        // Asymmetric box so swapped axes land outside
        let boundary = GeoBoundary::from_polygons(vec![Polygon::new(
            LineString::from(vec![(30.0, -5.0), (40.0, -5.0), (40.0, 5.0), (30.0, 5.0)]),
            vec![],
        )]);
        let table = Table::from_rows(
            ["SSN", "Latitude", "Longitude"],
            [["Nairobi", "-1.28", "36.82"], ["Swapped", "36.82", "-1.28"]],
        );

        let kept = filter_inside(&table, &boundary, "Latitude", "Longitude").unwrap();
        assert_eq!(ssns(&kept), vec!["Nairobi"]);
    }

    #[test]
    fn test_bad_coordinates_are_rejected() {
        let table = Table::from_rows(
            ["SSN", "Latitude", "Longitude"],
            [["A", "", "5"], ["B", "NaN", "5"], ["C", "five", "5"], ["D", "inf", "5"], ["E", " 5 ", "5"]],
        );

        let mask = inside_mask(&table, &unit_boundary(), "Latitude", "Longitude").unwrap();
        assert_eq!(mask, vec![false, false, false, false, true]);
    }

    #[test]
    fn test_missing_coordinate_column() {
        let table = Table::from_rows(["SSN", "Lat", "Longitude"], [["A", "5", "5"]]);
        let result = filter_inside(&table, &unit_boundary(), "Latitude", "Longitude");
        assert!(matches!(result, Err(TableError::MissingColumn { column, .. }) if column == "Latitude"));
    }

    #[test]
    fn test_filter_empty_table() {
        let table = Table::from_rows(["SSN", "Latitude", "Longitude"], Vec::<Vec<&str>>::new());
        let kept = filter_inside(&table, &unit_boundary(), "Latitude", "Longitude").unwrap();
        assert!(kept.is_empty());
    }
}
