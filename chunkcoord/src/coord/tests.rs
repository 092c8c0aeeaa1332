//! Tests for region coordinates

use super::*;

#[test]
fn test_parse_region_id() {
    let region: RegionId = "3,-7".parse().unwrap();
    assert_eq!(region, RegionId::new(3, -7));
}

#[test]
fn test_parse_region_id_trims_whitespace() {
    let region: RegionId = " -12 , 40 ".parse().unwrap();
    assert_eq!(region, RegionId::new(-12, 40));
}

#[test]
fn test_parse_region_id_missing_separator() {
    let result = "12".parse::<RegionId>();
    assert_eq!(
        result,
        Err(RegionIdParseError::MissingSeparator("12".to_string()))
    );
}

#[test]
fn test_parse_region_id_invalid_component() {
    let result = "1,abc".parse::<RegionId>();
    assert_eq!(
        result,
        Err(RegionIdParseError::InvalidComponent("abc".to_string()))
    );
}

#[test]
fn test_display_matches_parse_format() {
    let region = RegionId::new(-4, 9);
    assert_eq!(region.to_string(), "-4,9");
    assert_eq!(region.to_string().parse::<RegionId>().unwrap(), region);
}

#[test]
fn test_area_row_major_order() {
    let regions: Vec<RegionId> = RegionId::area(RegionId::new(0, 0), RegionId::new(1, 1)).collect();
    assert_eq!(
        regions,
        vec![
            RegionId::new(0, 0),
            RegionId::new(1, 0),
            RegionId::new(0, 1),
            RegionId::new(1, 1),
        ]
    );
}

#[test]
fn test_area_normalizes_corners() {
    let forward: Vec<RegionId> =
        RegionId::area(RegionId::new(-1, -1), RegionId::new(1, 0)).collect();
    let reversed: Vec<RegionId> =
        RegionId::area(RegionId::new(1, 0), RegionId::new(-1, -1)).collect();
    assert_eq!(forward, reversed);
    assert_eq!(forward.len(), 6);
}

#[test]
fn test_area_single_region() {
    let mut area = RegionId::area(RegionId::new(5, 5), RegionId::new(5, 5));
    assert_eq!(area.len(), 1);
    assert_eq!(area.next(), Some(RegionId::new(5, 5)));
    assert_eq!(area.next(), None);
    assert_eq!(area.len(), 0);
}

#[test]
fn test_area_size_hint_tracks_progress() {
    let mut area = RegionId::area(RegionId::new(0, 0), RegionId::new(3, 2));
    assert_eq!(area.len(), 12);
    area.next();
    area.next();
    assert_eq!(area.len(), 10);
    assert_eq!(area.by_ref().count(), 10);
}

#[test]
fn test_area_contains() {
    let area = RegionId::area(RegionId::new(-2, -2), RegionId::new(2, 2));
    assert!(area.contains(RegionId::new(0, 0)));
    assert!(area.contains(RegionId::new(-2, 2)));
    assert!(!area.contains(RegionId::new(3, 0)));
    assert_eq!(RegionArea::min(&area), RegionId::new(-2, -2));
    assert_eq!(RegionArea::max(&area), RegionId::new(2, 2));
}
