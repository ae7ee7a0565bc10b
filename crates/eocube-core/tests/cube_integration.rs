//! Integration tests for data cubes built from file names

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;

use eocube_core::data::{
    match_dimension, merge, unite, Comparator, CubeError, DataCube, DimValue, FilterExpr,
    FilterValue, Inventory, Predicate,
};
use eocube_core::testutil::{
    failing_translator, sample_filepaths, sample_path, smart_translator, FixedMetadata, NamedGrid,
    ShiftReprojector, StaticDirTree, TileFootprints,
};
use eocube_core::{Column, CubeConfig, Roi, SpatialRef};

fn day(y: i32, m: u32, d: u32) -> DimValue {
    NaiveDate::from_ymd_opt(y, m, d).unwrap().into()
}

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn cube_from(paths: &[String]) -> DataCube {
    init_logging();
    DataCube::builder()
        .translator(smart_translator)
        .build_from_filepaths(paths)
        .unwrap()
}

/// Four files dated 2016-01-01, 2016-01-15, 2016-02-10 and 2017-03-01
fn four_dates() -> DataCube {
    let paths: Vec<String> = ["20160101", "20160115", "20160210", "20170301"]
        .iter()
        .map(|d| sample_path("/s1", "SIG0", d, "VV", 117, "E000N000T1"))
        .collect();
    cube_from(&paths)
}

/// Three VV and two VH files
fn pol_cube() -> DataCube {
    let paths = vec![
        sample_path("/s1", "SIG0", "20160101", "VV", 117, "E000N000T1"),
        sample_path("/s1", "SIG0", "20160101", "VH", 117, "E000N000T1"),
        sample_path("/s1", "SIG0", "20160102", "VV", 117, "E000N000T1"),
        sample_path("/s1", "SIG0", "20160102", "VH", 117, "E000N000T1"),
        sample_path("/s1", "SIG0", "20160103", "VV", 117, "E000N000T1"),
    ];
    cube_from(&paths)
}

fn value_set(cube: &DataCube, name: &str) -> HashSet<DimValue> {
    cube.values(name).unwrap().into_iter().collect()
}

// ===== Construction =====

#[test]
fn test_build_from_filepaths() {
    let cube = cube_from(&sample_filepaths(3));
    assert_eq!(cube.len(), 6);
    // translator field order
    assert_eq!(cube.dimensions(), vec!["var", "time", "pol", "orbit", "tile"]);
    assert_eq!(cube.values("orbit").unwrap()[0], DimValue::Int(117));
}

#[test]
fn test_failing_translator_keeps_every_file() {
    let paths = sample_filepaths(3)[..5].to_vec();
    let cube = DataCube::builder()
        .translator(failing_translator)
        .dimensions(&["time"])
        .build_from_filepaths(&paths)
        .unwrap();

    assert_eq!(cube.len(), 5);
    assert!(cube.dimensions().is_empty());
    assert_eq!(cube.filepaths(), paths);
}

#[test]
fn test_untranslatable_file_gets_nulls() {
    let mut paths = sample_filepaths(1);
    paths.push("/data/s1/readme.txt".to_string());
    let cube = cube_from(&paths);

    assert_eq!(cube.len(), 3);
    assert_eq!(cube.values("pol").unwrap()[2], DimValue::Null);
    // null rows never match a predicate
    let filtered = cube
        .filter_by_dimension("pol", vec!["VV".into(), "VH".into()], None)
        .unwrap();
    assert_eq!(filtered.len(), 2);
}

#[test]
fn test_dimension_list_restricts_translation() {
    let cube = DataCube::builder()
        .translator(smart_translator)
        .dimensions(&["time", "pol"])
        .build_from_filepaths(&sample_filepaths(2))
        .unwrap();
    assert_eq!(cube.dimensions(), vec!["time", "pol"]);
}

#[test]
fn test_geometry_derived_without_grid() {
    let mut paths = sample_filepaths(2);
    paths.push("/data/s1/notes.txt".to_string());
    let cube = DataCube::builder()
        .translator(smart_translator)
        .boundary_extractor(TileFootprints)
        .build_from_filepaths(&paths)
        .unwrap();

    let geometry = cube.inventory().geometry().unwrap();
    assert_eq!(geometry.len(), 5);
    assert!(geometry[..4].iter().all(Option::is_some));
    assert!(geometry[4].is_none());
    assert!(!cube.dimensions().contains(&"geometry".to_string()));
}

#[test]
fn test_geometry_not_derived_with_grid_or_when_disabled() {
    let with_grid = DataCube::builder()
        .translator(smart_translator)
        .boundary_extractor(TileFootprints)
        .grid(NamedGrid {
            name: "Equi7".to_string(),
            sref: None,
        })
        .build_from_filepaths(&sample_filepaths(2))
        .unwrap();
    assert!(!with_grid.inventory().has_geometry());
    assert_eq!(with_grid.grid().map(|g| g.name()), Some("Equi7"));

    let config = CubeConfig::parse("derive_geometry = false").unwrap();
    let disabled = DataCube::builder()
        .config(config)
        .translator(smart_translator)
        .boundary_extractor(TileFootprints)
        .build_from_filepaths(&sample_filepaths(2))
        .unwrap();
    assert!(!disabled.inventory().has_geometry());
}

#[test]
fn test_build_from_dir_tree() {
    let tree = StaticDirTree(sample_filepaths(2));
    let cube = DataCube::builder()
        .translator(smart_translator)
        .build_from_dir_tree(tree)
        .unwrap();
    assert_eq!(cube.len(), 4);
    assert_eq!(cube.dir_tree().map(|t| t.file_register().len()), Some(4));
}

#[test]
fn test_from_precomputed_inventory() {
    let pol = Column::from_values("pol", &["VV".into(), "VH".into()]).unwrap();
    let inventory = Inventory::from_columns(&["a.tif", "b.tif"], vec![pol], None).unwrap();
    let cube = DataCube::from_inventory(inventory);
    assert_eq!(cube.dimensions(), vec!["pol"]);
    assert_eq!(cube.len(), 2);
}

// ===== Filtering =====

#[test]
fn test_filter_default_expression_is_equality() {
    let cube = pol_cube();
    let vv = cube.filter_by_dimension("pol", vec!["VV".into()], None).unwrap();
    assert_eq!(vv.len(), 3);
    assert!(vv.values("pol").unwrap().iter().all(|p| *p == DimValue::from("VV")));
}

#[test]
fn test_filter_matching_everything_is_identity() {
    let cube = cube_from(&sample_filepaths(4));
    let all = cube
        .filter_by_dimension(
            "time",
            vec![FilterValue::Pair(day(2000, 1, 1), day(2100, 1, 1))],
            Some(vec![FilterExpr::Pair(Comparator::Ge, Comparator::Le)]),
        )
        .unwrap();
    assert_eq!(all.inventory(), cube.inventory());
}

#[test]
fn test_split_then_concatenate_equals_filter() {
    let cube = cube_from(&sample_filepaths(6));
    let values = vec![
        FilterValue::Pair(day(2016, 1, 1), day(2016, 1, 3)),
        FilterValue::Pair(day(2016, 1, 2), day(2016, 1, 5)),
        FilterValue::Scalar(day(2016, 1, 6)),
    ];
    let exprs = vec![
        FilterExpr::parse(&[">=", "<="]).unwrap(),
        FilterExpr::parse(&[">", "<"]).unwrap(),
        FilterExpr::parse(&["=="]).unwrap(),
    ];

    let parts = cube
        .split_by_dimension("time", values.clone(), Some(exprs.clone()))
        .unwrap();
    assert_eq!(parts.len(), 3);
    let refs: Vec<&Inventory> = parts.iter().map(DataCube::inventory).collect();
    let concatenated = Inventory::concat(&refs).unwrap();

    let filtered = cube.filter_by_dimension("time", values, Some(exprs)).unwrap();
    assert_eq!(&concatenated, filtered.inventory());
    // 2016-01-03 matches two predicates and appears twice
    assert_eq!(filtered.len(), 6 + 4 + 2);
}

#[test]
fn test_split_keeps_empty_parts() {
    let cube = pol_cube();
    let parts = cube
        .split_by_dimension("pol", vec!["HH".into(), "VV".into()], None)
        .unwrap();
    assert_eq!(parts.len(), 2);
    assert!(parts[0].is_empty());
    assert_eq!(parts[0].dimensions(), cube.dimensions());
    assert_eq!(parts[1].len(), 3);
}

#[test]
fn test_filter_errors() {
    let cube = pol_cube();

    let err = cube
        .filter_by_dimension("pol", vec!["VV".into()], Some(vec![FilterExpr::Pair(Comparator::Ge, Comparator::Le)]))
        .unwrap_err();
    assert!(matches!(err, CubeError::PredicateShape { values: 1, expressions: 2 }));

    let err = cube
        .filter_by_dimension("pol", vec!["VV".into(), "VH".into()], Some(vec![Comparator::Eq.into()]))
        .unwrap_err();
    assert!(matches!(err, CubeError::PredicateCount { .. }));

    let err = cube.filter_by_dimension("band", vec!["B1".into()], None).unwrap_err();
    assert!(matches!(err, CubeError::UnknownDimension(_)));
}

#[test]
fn test_filter_files_with_pattern() {
    let mut paths = sample_filepaths(2);
    paths.push(sample_path("/data/s1", "GMR", "20160101", "VV", 117, "E000N000T1"));
    let cube = cube_from(&paths);

    assert_eq!(cube.filter_files_with_pattern("SIG0", false).unwrap().len(), 4);
    assert_eq!(cube.filter_files_with_pattern("GMR", false).unwrap().len(), 1);
    assert_eq!(cube.filter_files_with_pattern("/data/s1/GMR", true).unwrap().len(), 1);

    let mut in_place = cube.clone();
    in_place.filter_files_with_pattern_in_place(r".*_VH_", false).unwrap();
    assert_eq!(in_place.len(), 2);
    assert_eq!(cube.len(), 5);
}

#[test]
fn test_sort_by_dimension() {
    let cube = four_dates();
    let sorted = cube.sort_by_dimension("time", false).unwrap();
    assert_eq!(sorted.values("time").unwrap()[0], day(2017, 3, 1));

    let mut in_place = sorted.clone();
    in_place.sort_by_dimension_in_place("time", true).unwrap();
    assert_eq!(in_place.inventory(), cube.inventory());
}

// ===== Temporal splitting =====

#[test]
fn test_split_yearly_scenario() {
    let parts = four_dates().split_yearly(Some("time"), None).unwrap();
    assert_eq!(parts.len(), 2);

    assert_eq!(parts[0].len(), 3);
    let first = parts[0].values("time").unwrap();
    assert_eq!(first.iter().min(), Some(&day(2016, 1, 1)));
    assert_eq!(first.iter().max(), Some(&day(2016, 2, 10)));

    assert_eq!(parts[1].values("time").unwrap(), vec![day(2017, 3, 1)]);
}

#[test]
fn test_split_yearly_requested_years_are_sorted() {
    let parts = four_dates().split_yearly(None, Some(&[2017, 2016])).unwrap();
    assert_eq!(parts[0].len(), 3);
    assert_eq!(parts[1].len(), 1);

    let parts = four_dates().split_yearly(None, Some(&[2016])).unwrap();
    assert_eq!(parts.len(), 1);
}

#[test]
fn test_split_monthly() {
    let parts = four_dates().split_monthly(None, None, None).unwrap();
    let sizes: Vec<usize> = parts.iter().map(DataCube::len).collect();
    assert_eq!(sizes, vec![2, 1, 1]);

    let parts = four_dates().split_monthly(None, Some(&[2]), None).unwrap();
    assert_eq!(parts.len(), 1);
    assert_eq!(parts[0].values("time").unwrap(), vec![day(2016, 2, 10)]);
}

// ===== Spatial and metadata filtering =====

fn footprint_cube() -> DataCube {
    DataCube::builder()
        .translator(smart_translator)
        .boundary_extractor(TileFootprints)
        .spatial_ref(SpatialRef::epsg(27704))
        .reprojector(ShiftReprojector { dx: 1.0, dy: 0.0 })
        .build_from_filepaths(&sample_filepaths(4))
        .unwrap()
}

#[test]
fn test_filter_spatially_by_tilename() {
    let cube = footprint_cube();
    let tile = cube.filter_spatially(Some(&["E001N000T1"]), None, None).unwrap();
    assert_eq!(tile.len(), 4);
    assert!(tile
        .values("tile")
        .unwrap()
        .iter()
        .all(|t| *t == DimValue::from("E001N000T1")));
}

#[test]
fn test_filter_spatially_by_roi() {
    let cube = footprint_cube();
    let roi = Roi::Extent([0.2, 0.2, 0.5, 0.5]);

    let inside = cube.filter_spatially(None, Some(&roi), None).unwrap();
    assert_eq!(inside.len(), 4);
    assert!(inside
        .values("tile")
        .unwrap()
        .iter()
        .all(|t| *t == DimValue::from("E000N000T1")));

    // shifted by one unit into the neighbouring tile before intersecting
    let mut shifted = cube.clone();
    shifted
        .filter_spatially_in_place(None, Some(&roi), Some(&SpatialRef::epsg(4326)))
        .unwrap();
    assert!(shifted
        .values("tile")
        .unwrap()
        .iter()
        .all(|t| *t == DimValue::from("E001N000T1")));

    let nowhere = cube
        .filter_spatially(None, Some(&Roi::Extent([50.0, 50.0, 51.0, 51.0])), None)
        .unwrap();
    assert!(nowhere.is_empty());
}

#[test]
fn test_filter_spatially_without_reprojector() {
    let cube = DataCube::builder()
        .translator(smart_translator)
        .boundary_extractor(TileFootprints)
        .spatial_ref(SpatialRef::epsg(27704))
        .build_from_filepaths(&sample_filepaths(2))
        .unwrap();
    let roi = Roi::Extent([0.0, 0.0, 1.0, 1.0]);
    let err = cube
        .filter_spatially(None, Some(&roi), Some(&SpatialRef::epsg(4326)))
        .unwrap_err();
    assert!(matches!(err, CubeError::MissingCollaborator(_)));

    // same frame needs no reprojection
    let same = cube
        .filter_spatially(None, Some(&roi), Some(&SpatialRef::epsg(27704)))
        .unwrap();
    assert_eq!(same.len(), 4);
}

#[test]
fn test_filter_by_metadata() {
    let paths = vec![
        sample_path("/s1", "SIG0", "20160101", "VV", 117, "E000N000T1"),
        sample_path("/s1", "SIG0", "20160102", "VV", 117, "E000N000T1"),
        sample_path("/s1", "SIG0", "20160103", "VV", 117, "E000N000T1"),
        "/s1/notes.txt".to_string(),
    ];
    let header = |sensor: &str, level: i64| {
        HashMap::from([
            ("sensor".to_string(), DimValue::from(sensor)),
            ("level".to_string(), DimValue::Int(level)),
        ])
    };
    let reader = FixedMetadata(HashMap::from([
        ("SIG0_20160101_VV_117_E000N000T1.tif".to_string(), header("S1A", 1)),
        ("SIG0_20160102_VV_117_E000N000T1.tif".to_string(), header("S1B", 1)),
        ("notes.txt".to_string(), header("S1A", 1)),
    ]));
    let cube = DataCube::builder()
        .translator(smart_translator)
        .metadata_reader(reader)
        .build_from_filepaths(&paths)
        .unwrap();

    let wanted = HashMap::from([
        ("sensor".to_string(), DimValue::from("S1A")),
        ("level".to_string(), DimValue::Int(1)),
    ]);
    // the third file is unreadable and the text file has no raster type
    let selected = cube.filter_by_metadata(&wanted).unwrap();
    assert_eq!(selected.filepaths(), vec![paths[0].clone()]);

    let wrong_level = HashMap::from([("level".to_string(), DimValue::Int(2))]);
    assert!(cube.filter_by_metadata(&wrong_level).unwrap().is_empty());
}

// ===== Dimension management =====

#[test]
fn test_rename_dimensions() {
    let cube = pol_cube();
    let renamed = cube.rename_dimensions(&[("pol", "polarisation")]).unwrap();
    assert!(renamed.dimensions().contains(&"polarisation".to_string()));
    assert!(cube.dimensions().contains(&"pol".to_string()));

    let err = cube.rename_dimensions(&[("pol", "time")]).unwrap_err();
    assert!(matches!(err, CubeError::DimensionCollision(_)));

    let err = cube.rename_dimensions(&[("band", "b")]).unwrap_err();
    assert!(matches!(err, CubeError::UnknownDimension(_)));
}

#[test]
fn test_add_dimension() {
    let mut cube = pol_cube();
    let values: Vec<DimValue> = (0..5).map(|i| DimValue::Float(f64::from(i) * 0.5)).collect();
    cube.add_dimension_in_place("weight", &values).unwrap();
    assert!(cube.dimensions().contains(&"weight".to_string()));
    assert_eq!(cube.values("weight").unwrap()[4], DimValue::Float(2.0));

    let err = cube.add_dimension("short", &values[..2]).unwrap_err();
    assert!(matches!(err, CubeError::LengthMismatch { expected: 5, found: 2 }));
}

#[test]
fn test_clone_is_independent() {
    let original = pol_cube();
    let mut copy = original.clone();
    copy.filter_by_dimension_in_place("pol", vec!["VH".into()], None)
        .unwrap();
    copy.rename_dimensions_in_place(&[("pol", "polarisation")]).unwrap();

    assert_eq!(original.len(), 5);
    assert!(original.dimensions().contains(&"pol".to_string()));
    assert_eq!(copy.len(), 2);
}

// ===== Cross-cube operations =====

#[test]
fn test_match_dimension_symmetry() {
    let a = cube_from(&sample_filepaths(4));
    let b = cube_from(&sample_filepaths(6))
        .filter_by_predicates("time", &[Predicate::exact(Comparator::Ge, day(2016, 1, 3))])
        .unwrap();

    let matched = match_dimension(&[&a, &b], "time").unwrap();
    assert_eq!(matched.len(), 2);
    assert_eq!(value_set(&matched[0], "time"), value_set(&matched[1], "time"));
    assert_eq!(value_set(&matched[0], "time").len(), 2);
}

#[test]
fn test_align_dimension_shrink_and_grow() {
    let a = cube_from(&sample_filepaths(4));
    let b = a
        .filter_by_predicates(
            "time",
            &[Predicate::equals(day(2016, 1, 2)), Predicate::equals(day(2016, 1, 4))],
        )
        .unwrap();

    let shrunk = a.align_dimension(&b, "time").unwrap();
    assert_eq!(value_set(&shrunk, "time"), value_set(&b, "time"));
    assert_eq!(shrunk.len(), b.len());

    let grown = b.align_dimension(&a, "time").unwrap();
    assert_eq!(value_set(&grown, "time"), value_set(&a, "time"));
    assert_eq!(grown.len(), a.len());
}

#[test]
fn test_align_twice_equals_once() {
    let a = cube_from(&sample_filepaths(3));
    let b = cube_from(&sample_filepaths(5))
        .filter_by_predicates("pol", &[Predicate::equals("VV")])
        .unwrap();

    let mut aligned = a.align_dimension(&b, "time").unwrap();
    let once = aligned.clone();
    aligned.align_dimension_in_place(&b, "time").unwrap();
    assert_eq!(aligned.inventory(), once.inventory());
}

#[test]
fn test_intersect_and_align_agree() {
    // one file per timestamp
    let a = cube_from(&sample_filepaths(4))
        .filter_by_predicates("pol", &[Predicate::equals("VV")])
        .unwrap();
    let b = a
        .filter_by_predicates("time", &[Predicate::exact(Comparator::Ne, day(2016, 1, 1))])
        .unwrap()
        .filter_by_predicates("time", &[Predicate::exact(Comparator::Ne, day(2016, 1, 3))])
        .unwrap();

    let aligned = a.align_dimension(&b, "time").unwrap();
    let intersected = a.intersect(&b, Some("time")).unwrap();

    let mut aligned_times = aligned.values("time").unwrap();
    let mut intersected_times = intersected.values("time").unwrap();
    aligned_times.sort();
    intersected_times.sort();
    assert_eq!(aligned_times, intersected_times);
}

#[test]
fn test_intersect_on_time_across_products() {
    let sig0 = cube_from(&[
        sample_path("/s1", "SIG0", "20160101", "VV", 117, "E000N000T1"),
        sample_path("/s1", "SIG0", "20160102", "VV", 117, "E000N000T1"),
    ]);
    let gmr = cube_from(&[
        sample_path("/s1", "GMR", "20160101", "VV", 117, "E000N000T1"),
        sample_path("/s1", "GMR", "20160103", "VV", 117, "E000N000T1"),
    ]);

    let intersected = sig0.intersect(&gmr, Some("time")).unwrap();
    assert_eq!(intersected.len(), 1);
    assert_eq!(intersected.filepaths(), vec![sig0.filepaths()[0].clone()]);
    assert_eq!(intersected.values("time").unwrap(), vec![day(2016, 1, 1)]);

    // several files per timestamp still give at most one row per timestamp
    let both_pols = cube_from(&sample_filepaths(3));
    let on_time = both_pols.intersect(&gmr, Some("time")).unwrap();
    assert_eq!(on_time.values("time").unwrap(), vec![day(2016, 1, 1), day(2016, 1, 3)]);
    assert!(on_time.len() <= both_pols.len().min(gmr.len()));
}

#[test]
fn test_intersect_disjoint_is_empty() {
    let a = cube_from(&sample_filepaths(2));
    let first = a
        .filter_by_predicates("time", &[Predicate::equals(day(2016, 1, 1))])
        .unwrap();
    let second = a
        .filter_by_predicates("time", &[Predicate::equals(day(2016, 1, 2))])
        .unwrap();

    let mut intersected = first.clone();
    intersected.intersect_in_place(&second, Some("time")).unwrap();
    assert!(intersected.is_empty());
}

#[test]
fn test_intersect_keeps_shared_dimensions() {
    let paths = sample_filepaths(3);
    let a = DataCube::builder()
        .translator(smart_translator)
        .dimensions(&["time", "pol"])
        .build_from_filepaths(&paths)
        .unwrap();
    let b = DataCube::builder()
        .translator(smart_translator)
        .dimensions(&["time", "orbit"])
        .build_from_filepaths(&paths)
        .unwrap();

    let intersected = a.intersect(&b, None).unwrap();
    assert_eq!(intersected.len(), paths.len());
    assert_eq!(intersected.dimensions(), vec!["time"]);
    assert!(intersected.len() <= a.len().min(b.len()));
}

#[test]
fn test_unite_keeps_every_dimension() {
    let paths = sample_filepaths(2);
    let a = DataCube::builder()
        .translator(smart_translator)
        .dimensions(&["time", "pol"])
        .build_from_filepaths(&paths[..2])
        .unwrap();
    let b = DataCube::builder()
        .translator(smart_translator)
        .dimensions(&["time", "orbit"])
        .build_from_filepaths(&paths[2..])
        .unwrap();

    let united = unite(&[&a, &b], None).unwrap();
    let expected: HashSet<String> = a.dimensions().into_iter().chain(b.dimensions()).collect();
    let actual: HashSet<String> = united.dimensions().into_iter().collect();
    assert_eq!(actual, expected);
    assert_eq!(united.len(), 4);
    // rows from `a` have no orbit
    assert_eq!(united.values("orbit").unwrap()[0], DimValue::Null);
}

#[test]
fn test_merge_removes_duplicates() {
    let a = cube_from(&sample_filepaths(2));
    let b = cube_from(&sample_filepaths(3));

    let merged = merge(&[&a, &b], None).unwrap();
    assert_eq!(merged.len(), 6);
    assert_eq!(merged.dimensions(), a.dimensions());

    let on_time = merge(&[&a, &b], Some("time")).unwrap();
    assert_eq!(on_time.len(), 4);
}

#[test]
fn test_display_lists_files() {
    let text = pol_cube().to_string();
    assert!(text.contains("filepath"));
    assert!(text.contains("5 files"));
}
