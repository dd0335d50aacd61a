//! Extraction query construction.
//!
//! The query planner of the downloader: a projection clause adapted to the
//! output format, a spatial predicate built from the viewport, and the
//! `CREATE TABLE` statement that materializes the filtered rows into a
//! staging table for inspection before the final write.

use crate::extent::Extent;
use crate::formats::OutputFormat;
use crate::schema::SchemaColumn;

/// Name of the staging table every extraction materializes into.
pub const STAGING_TABLE: &str = "download_data";

/// Build the `SELECT` clause for an extraction.
///
/// Native columnar output copies everything verbatim with `SELECT *`;
/// nested and array types pass through untouched. Every other format gets a
/// per-column projection with type-driven coercions: structs and maps are
/// serialized to JSON text, arrays are flattened to a `", "`-joined string,
/// and the 8-bit unsigned integer type is widened to `INTEGER`. Column
/// names are always quoted.
///
/// Overture datasets with a nested `names` column additionally get a
/// top-level `name` convenience alias projected from `names.primary`.
#[must_use]
pub fn build_projection(
    schema: &[SchemaColumn],
    format: Option<OutputFormat>,
    dataset_url: &str,
) -> String {
    if format.is_some_and(|f| f.is_native_columnar()) {
        return "SELECT *".to_string();
    }

    let columns: Vec<String> = schema
        .iter()
        .map(|column| {
            let quoted = format!("\"{}\"", column.name);
            if column.is_struct_or_map() {
                format!("TO_JSON({quoted}) AS {quoted}")
            } else if column.is_array() {
                format!("array_to_string({quoted}, ', ') AS {quoted}")
            } else if column.is_narrow_integer() {
                format!("CAST({quoted} AS INTEGER) AS {quoted}")
            } else {
                quoted
            }
        })
        .collect();

    let has_names_column = schema.iter().any(|column| column.name.contains("names"));
    if dataset_url.contains("overture") && has_names_column {
        format!("SELECT \"names\".\"primary\" as name, {}", columns.join(", "))
    } else {
        format!("SELECT {}", columns.join(", "))
    }
}

/// Build the spatial `WHERE` clause.
///
/// With a bbox covering column, a cheap range test: the struct's xmin must
/// lie within the window's x range and its ymin within the y range. Only the
/// min fields are constrained (inherited behavior, kept as-is). Without a
/// covering, a geometric intersection against a polygon literal built from
/// the window's corners.
#[must_use]
pub fn build_predicate(extent: &Extent, bbox_column: Option<&str>) -> String {
    match bbox_column {
        Some(column) => format!(
            "WHERE \"{column}\".xmin BETWEEN {xmin} AND {xmax} \
             AND \"{column}\".ymin BETWEEN {ymin} AND {ymax}",
            xmin = extent.xmin,
            xmax = extent.xmax,
            ymin = extent.ymin,
            ymax = extent.ymax,
        ),
        None => format!(
            "WHERE ST_Intersects(geometry, ST_GeomFromText(\
             'POLYGON(({xmin} {ymin}, {xmax} {ymin}, {xmax} {ymax}, {xmin} {ymax}, {xmin} {ymin}))'))",
            xmin = extent.xmin,
            ymin = extent.ymin,
            xmax = extent.xmax,
            ymax = extent.ymax,
        ),
    }
}

/// Compose the statement that materializes the filtered, projected rows
/// into `staging_table`.
#[must_use]
pub fn build_extraction_query(
    dataset_url: &str,
    projection: &str,
    predicate: &str,
    staging_table: &str,
) -> String {
    format!(
        "CREATE TABLE {staging_table} AS ({projection} FROM read_parquet('{dataset_url}') {predicate})"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_schema() -> Vec<SchemaColumn> {
        vec![
            SchemaColumn::new("id", "INTEGER"),
            SchemaColumn::new("names", "STRUCT(primary VARCHAR, common VARCHAR)"),
            SchemaColumn::new("sources", "VARCHAR[]"),
            SchemaColumn::new("level", "UTINYINT"),
            SchemaColumn::new("geometry", "GEOMETRY"),
        ]
    }

    #[test]
    fn test_native_columnar_is_select_star() {
        let projection = build_projection(
            &sample_schema(),
            Some(OutputFormat::GeoParquet),
            "https://example.com/data.parquet",
        );
        assert_eq!(projection, "SELECT *");
    }

    #[test]
    fn test_struct_columns_are_json_wrapped() {
        let projection = build_projection(
            &sample_schema(),
            Some(OutputFormat::GeoPackage),
            "https://example.com/data.parquet",
        );
        assert!(projection.contains("TO_JSON(\"names\") AS \"names\""));
        // Never a bare reference once coerced.
        assert!(!projection.contains(", \"names\","));
    }

    #[test]
    fn test_array_columns_are_flattened() {
        let projection = build_projection(
            &sample_schema(),
            Some(OutputFormat::GeoJson),
            "https://example.com/data.parquet",
        );
        assert!(projection.contains("array_to_string(\"sources\", ', ') AS \"sources\""));
    }

    #[test]
    fn test_narrow_integers_are_widened() {
        let projection = build_projection(
            &sample_schema(),
            Some(OutputFormat::FlatGeobuf),
            "https://example.com/data.parquet",
        );
        assert!(projection.contains("CAST(\"level\" AS INTEGER) AS \"level\""));
    }

    #[test]
    fn test_plain_columns_stay_quoted() {
        let projection = build_projection(
            &sample_schema(),
            Some(OutputFormat::GeoJson),
            "https://example.com/data.parquet",
        );
        assert!(projection.contains("\"id\""));
        assert!(projection.contains("\"geometry\""));
    }

    #[test]
    fn test_overture_name_alias() {
        let url = "s3://overturemaps-us-west-2/release/latest/theme=places/type=place/*.parquet";
        let projection = build_projection(&sample_schema(), Some(OutputFormat::GeoJson), url);
        assert!(projection.starts_with("SELECT \"names\".\"primary\" as name, "));
    }

    #[test]
    fn test_no_alias_without_names_column() {
        let schema = vec![
            SchemaColumn::new("id", "INTEGER"),
            SchemaColumn::new("geometry", "GEOMETRY"),
        ];
        let url = "s3://overturemaps-us-west-2/release/latest/theme=base/type=water/*.parquet";
        let projection = build_projection(&schema, Some(OutputFormat::GeoJson), url);
        assert!(!projection.contains("as name"));
    }

    #[test]
    fn test_unknown_format_gets_coercions() {
        // An unrecognized destination still projects with coercions; the
        // materialization step rejects it later.
        let projection =
            build_projection(&sample_schema(), None, "https://example.com/data.parquet");
        assert!(projection.contains("TO_JSON"));
    }

    #[test]
    fn test_bbox_predicate_roundtrip() {
        let extent = Extent::new(-122.5, 37.2, -122.1, 37.9);
        let predicate = build_predicate(&extent, Some("bbox"));

        assert!(predicate.contains("\"bbox\".xmin BETWEEN -122.5 AND -122.1"));
        assert!(predicate.contains("\"bbox\".ymin BETWEEN 37.2 AND 37.9"));
        assert_eq!(predicate.matches("BETWEEN").count(), 2);
        // Only the min fields are constrained.
        assert!(!predicate.contains(".xmax BETWEEN"));
        assert!(!predicate.contains(".ymax BETWEEN"));
    }

    #[test]
    fn test_metadata_named_bbox_column_is_quoted() {
        let extent = Extent::new(0.0, 0.0, 1.0, 1.0);
        let predicate = build_predicate(&extent, Some("bounds"));
        assert!(predicate.contains("\"bounds\".xmin"));
        assert!(predicate.contains("\"bounds\".ymin"));
    }

    #[test]
    fn test_intersects_fallback_closes_ring() {
        let extent = Extent::new(-1.0, -2.0, 3.0, 4.0);
        let predicate = build_predicate(&extent, None);

        assert!(predicate.contains("ST_Intersects"));
        assert!(predicate.contains("ST_GeomFromText"));
        assert!(predicate.starts_with("WHERE"));
        // Ring closes on the first corner.
        assert!(predicate.contains("POLYGON((-1 -2, 3 -2, 3 4, -1 4, -1 -2))"));
    }

    #[test]
    fn test_extraction_query_shape() {
        let extent = Extent::new(-122.5, 37.2, -122.1, 37.9);
        let predicate = build_predicate(&extent, Some("bbox"));
        let sql = build_extraction_query(
            "https://example.com/data.parquet",
            "SELECT *",
            &predicate,
            STAGING_TABLE,
        );

        assert!(sql.starts_with("CREATE TABLE download_data AS (SELECT * FROM read_parquet("));
        assert!(sql.contains("'https://example.com/data.parquet'"));
        assert!(sql.contains(&predicate));
    }
}
