//! Growth measurement loading.
//!
//! All growth results live in one combined workbook named
//! `<N>개교_생육결과데이터.xlsx`, one sheet per group. Sheet names are
//! matched against the registry through the same canonical-key rule as
//! filenames, so a sheet written on a machine that decomposes hangul
//! still lands on the right group. Sheets that match no registered
//! group are ignored with a warning.

use crate::error::PipelineError;
use crate::loader::cache::SourceCache;
use crate::models::{
    GroupSeries, GrowthRecord, LoadOutcome, TreatmentGroup, TreatmentRegistry, Warning,
};
use crate::resolver::{self, canonical_key};
use calamine::{open_workbook, Data, Range, Reader, Xlsx};
use std::path::Path;
use tracing::{debug, warn};

const FRESH_WEIGHT_COLUMN: &str = "생중량(g)";
const LEAF_COUNT_COLUMN: &str = "잎 수(장)";
const SHOOT_LENGTH_COLUMN: &str = "지상부 길이(mm)";

/// Loader for the combined growth workbook.
pub struct GrowthLoader {
    workbook_suffix: String,
    cache: SourceCache<(Vec<GroupSeries<GrowthRecord>>, Vec<Warning>)>,
}

impl GrowthLoader {
    /// `workbook_suffix` is the fixed tail of the workbook filename,
    /// e.g. `개교_생육결과데이터.xlsx`; the school-count prefix varies.
    pub fn new(workbook_suffix: impl Into<String>) -> Self {
        Self {
            workbook_suffix: workbook_suffix.into(),
            cache: SourceCache::new(),
        }
    }

    /// The configured workbook name suffix.
    pub fn workbook_suffix(&self) -> &str {
        &self.workbook_suffix
    }

    /// Load growth records for every registered group with a matching
    /// sheet. A missing workbook yields an empty outcome; whether that
    /// is fatal is the pipeline's call.
    pub fn load(
        &mut self,
        dir: &Path,
        registry: &TreatmentRegistry,
    ) -> Result<LoadOutcome<GrowthRecord>, PipelineError> {
        let resolved = match resolver::resolve_by_suffix(dir, &self.workbook_suffix)? {
            Some(resolved) => resolved,
            None => {
                warn!("no growth workbook in {}", dir.display());
                return Ok(LoadOutcome {
                    groups: Vec::new(),
                    warnings: vec![Warning::WorkbookNotFound],
                });
            }
        };

        let mut warnings = Vec::new();
        for _ in &resolved.duplicates {
            warnings.push(Warning::AmbiguousSource {
                logical_name: format!("*{}", self.workbook_suffix),
                chosen: resolved.file_name.clone(),
            });
        }

        let (groups, parse_warnings) = self.cache.get_or_insert_with(&resolved.path, || {
            parse_workbook(&resolved.path, &resolved.file_name, registry)
        })?;
        warnings.extend(parse_warnings);

        Ok(LoadOutcome { groups, warnings })
    }
}

fn parse_workbook(
    path: &Path,
    file_name: &str,
    registry: &TreatmentRegistry,
) -> Result<(Vec<GroupSeries<GrowthRecord>>, Vec<Warning>), PipelineError> {
    let mut workbook: Xlsx<_> = open_workbook(path)
        .map_err(|e| PipelineError::Workbook(file_name.to_string(), e))?;

    let sheet_names = workbook.sheet_names().to_owned();

    // Slots in registry order keep summary and ranking order stable no
    // matter how the sheets are arranged in the workbook.
    let mut slots: Vec<Option<GroupSeries<GrowthRecord>>> = vec![None; registry.len()];
    let mut warnings = Vec::new();

    for sheet_name in sheet_names {
        let (slot, group) = match registry.get_full(&sheet_name) {
            Some((slot, group)) => (slot, group.clone()),
            None => {
                warn!("sheet '{}' matches no registered group", sheet_name);
                warnings.push(Warning::UnmatchedSheet { sheet: sheet_name });
                continue;
            }
        };

        if slots[slot].is_some() {
            warn!(
                "duplicate sheet for group '{}'; keeping the first",
                group.id
            );
            continue;
        }

        let range = workbook
            .worksheet_range(&sheet_name)
            .map_err(|e| PipelineError::Workbook(file_name.to_string(), e))?;

        match parse_sheet(&range, &group, file_name) {
            Ok(records) => {
                debug!("loaded {} growth rows for '{}'", records.len(), group.id);
                slots[slot] = Some(GroupSeries {
                    group_id: group.id.clone(),
                    records,
                });
            }
            Err(e) => {
                warn!("skipping growth sheet for '{}': {}", group.id, e);
                warnings.push(Warning::ParseFailure {
                    group_id: group.id.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    Ok((slots.into_iter().flatten().collect(), warnings))
}

/// Parse one group sheet. The first row is the header; the individual
/// identifier is taken from the first column, the three metrics are
/// bound by header name.
fn parse_sheet(
    range: &Range<Data>,
    group: &TreatmentGroup,
    file_name: &str,
) -> Result<Vec<GrowthRecord>, PipelineError> {
    let source_name = format!("{}#{}", file_name, group.id);
    let mut rows = range.rows();

    let header = rows.next().ok_or_else(|| PipelineError::Malformed {
        source_name: source_name.clone(),
        detail: "sheet is empty".to_string(),
    })?;

    let fresh = bind_column(header, FRESH_WEIGHT_COLUMN, &source_name)?;
    let leaf = bind_column(header, LEAF_COUNT_COLUMN, &source_name)?;
    let shoot = bind_column(header, SHOOT_LENGTH_COLUMN, &source_name)?;

    let mut records = Vec::new();

    for (row_index, row) in rows.enumerate() {
        if row.iter().all(|cell| matches!(cell, Data::Empty)) {
            continue;
        }

        let individual_id = match row.first() {
            Some(Data::String(s)) => canonical_key(s),
            Some(Data::Float(v)) => format!("{}", v),
            Some(Data::Int(v)) => format!("{}", v),
            _ => format!("{}", row_index + 1),
        };

        records.push(GrowthRecord {
            group_id: group.id.clone(),
            individual_id,
            fresh_weight_g: numeric_cell(row, fresh, row_index, &source_name)?,
            leaf_count: numeric_cell(row, leaf, row_index, &source_name)?,
            shoot_length_mm: numeric_cell(row, shoot, row_index, &source_name)?,
            target_ec: group.target_ec,
        });
    }

    Ok(records)
}

fn bind_column(
    header: &[Data],
    column: &str,
    source_name: &str,
) -> Result<usize, PipelineError> {
    let key = canonical_key(column);
    header
        .iter()
        .position(|cell| matches!(cell, Data::String(s) if canonical_key(s) == key))
        .ok_or_else(|| PipelineError::MissingColumn {
            source_name: source_name.to_string(),
            column: column.to_string(),
        })
}

fn numeric_cell(
    row: &[Data],
    position: usize,
    row_index: usize,
    source_name: &str,
) -> Result<f64, PipelineError> {
    let cell = row.get(position).unwrap_or(&Data::Empty);
    cell_to_f64(cell).ok_or_else(|| PipelineError::Malformed {
        source_name: source_name.to_string(),
        detail: format!("row {}: '{:?}' is not a number", row_index + 2, cell),
    })
}

fn cell_to_f64(cell: &Data) -> Option<f64> {
    match cell {
        Data::Float(v) => Some(*v),
        Data::Int(v) => Some(*v as f64),
        Data::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TreatmentGroup;
    use std::path::PathBuf;
    use unicode_normalization::UnicodeNormalization;

    fn group(id: &str, target_ec: f64) -> TreatmentGroup {
        TreatmentGroup {
            id: id.to_string(),
            target_ec,
            color: None,
        }
    }

    fn registry(ids: &[(&str, f64)]) -> TreatmentRegistry {
        TreatmentRegistry::new(ids.iter().map(|(id, ec)| group(id, *ec)).collect()).unwrap()
    }

    fn sheet(cells: &[&[Data]]) -> Range<Data> {
        let rows = cells.len() as u32;
        let cols = cells.iter().map(|r| r.len()).max().unwrap_or(0) as u32;
        let mut range = Range::new((0, 0), (rows - 1, cols - 1));
        for (r, row) in cells.iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                range.set_value((r as u32, c as u32), cell.clone());
            }
        }
        range
    }

    fn s(text: &str) -> Data {
        Data::String(text.to_string())
    }

    fn header() -> Vec<Data> {
        vec![
            s("개체번호"),
            s(FRESH_WEIGHT_COLUMN),
            s(LEAF_COUNT_COLUMN),
            s(SHOOT_LENGTH_COLUMN),
        ]
    }

    #[test]
    fn test_parse_sheet_stamps_group_and_target() {
        let range = sheet(&[
            &header(),
            &[s("1"), Data::Float(12.0), Data::Float(5.0), Data::Float(80.0)],
            &[s("2"), Data::Float(12.6), Data::Float(6.0), Data::Float(84.0)],
        ]);

        let records = parse_sheet(&range, &group("송도고", 1.0), "workbook.xlsx").unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].group_id, "송도고");
        assert_eq!(records[0].target_ec, 1.0);
        assert_eq!(records[1].fresh_weight_g, 12.6);
        assert_eq!(records[1].individual_id, "2");
    }

    #[test]
    fn test_parse_sheet_accepts_decomposed_headers() {
        let decomposed: String = FRESH_WEIGHT_COLUMN.nfd().collect();
        let range = sheet(&[
            &[
                s("개체번호"),
                s(&decomposed),
                s(LEAF_COUNT_COLUMN),
                s(SHOOT_LENGTH_COLUMN),
            ],
            &[s("1"), Data::Float(9.0), Data::Float(4.0), Data::Float(70.0)],
        ]);

        let records = parse_sheet(&range, &group("동산고", 8.0), "workbook.xlsx").unwrap();
        assert_eq!(records[0].fresh_weight_g, 9.0);
    }

    #[test]
    fn test_parse_sheet_skips_blank_rows() {
        let range = sheet(&[
            &header(),
            &[Data::Empty, Data::Empty, Data::Empty, Data::Empty],
            &[s("1"), Data::Float(9.0), Data::Float(4.0), Data::Float(70.0)],
        ]);

        let records = parse_sheet(&range, &group("동산고", 8.0), "workbook.xlsx").unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_parse_sheet_missing_column() {
        let range = sheet(&[
            &[s("개체번호"), s(FRESH_WEIGHT_COLUMN), s(LEAF_COUNT_COLUMN)],
            &[s("1"), Data::Float(9.0), Data::Float(4.0)],
        ]);

        let result = parse_sheet(&range, &group("동산고", 8.0), "workbook.xlsx");
        assert!(matches!(
            result,
            Err(PipelineError::MissingColumn { ref column, .. })
                if column == SHOOT_LENGTH_COLUMN
        ));
    }

    #[test]
    fn test_parse_sheet_non_numeric_cell() {
        let range = sheet(&[
            &header(),
            &[s("1"), s("heavy"), Data::Float(4.0), Data::Float(70.0)],
        ]);

        let result = parse_sheet(&range, &group("동산고", 8.0), "workbook.xlsx");
        assert!(matches!(result, Err(PipelineError::Malformed { .. })));
    }

    #[test]
    fn test_numeric_string_cells_are_accepted() {
        let range = sheet(&[
            &header(),
            &[s("1"), s("9.5"), Data::Int(4), Data::Float(70.0)],
        ]);

        let records = parse_sheet(&range, &group("동산고", 8.0), "workbook.xlsx").unwrap();
        assert_eq!(records[0].fresh_weight_g, 9.5);
        assert_eq!(records[0].leaf_count, 4.0);
    }

    fn fixture_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("fixtures")
            .join("data")
    }

    #[test]
    fn test_load_fixture_workbook() {
        let mut loader = GrowthLoader::new("개교_생육결과데이터.xlsx");
        let reg = registry(&[
            ("송도고", 1.0),
            ("하늘고", 2.0),
            ("아라고", 4.0),
            ("동산고", 8.0),
        ]);

        let outcome = loader.load(&fixture_dir(), &reg).unwrap();

        let ids: Vec<&str> = outcome.groups.iter().map(|g| g.group_id.as_str()).collect();
        assert_eq!(ids, vec!["송도고", "하늘고", "아라고", "동산고"]);
        assert!(outcome.groups.iter().all(|g| !g.records.is_empty()));
        assert!(outcome.warnings.is_empty());
    }

    #[test]
    fn test_load_fixture_matches_decomposed_sheet_name() {
        // The fixture stores one sheet name in decomposed form; it must
        // still land on the composed registry id.
        let mut loader = GrowthLoader::new("개교_생육결과데이터.xlsx");
        let reg = registry(&[("하늘고", 2.0)]);

        let outcome = loader.load(&fixture_dir(), &reg).unwrap();

        assert_eq!(outcome.groups.len(), 1);
        assert_eq!(outcome.groups[0].group_id, "하늘고");
        // The other three sheets match no registered group here.
        assert_eq!(
            outcome
                .warnings
                .iter()
                .filter(|w| matches!(w, Warning::UnmatchedSheet { .. }))
                .count(),
            3
        );
    }

    #[test]
    fn test_load_missing_workbook_is_empty_not_fatal() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut loader = GrowthLoader::new("개교_생육결과데이터.xlsx");
        let reg = registry(&[("송도고", 1.0)]);

        let outcome = loader.load(dir.path(), &reg).unwrap();

        assert!(outcome.groups.is_empty());
        assert_eq!(outcome.warnings, vec![Warning::WorkbookNotFound]);
    }
}
