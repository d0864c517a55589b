//! Tabular catalog readers.
//!
//! Catalogs are human-maintained CSV files with tolerant, header-mapped
//! columns: common header aliases are accepted and unknown columns are
//! ignored.

use std::path::Path;

use crate::models::Dimension;
use crate::{Error, Result};

/// One row of the habit inventory.
#[derive(Debug, Clone)]
pub struct HabitRow {
    /// Habit name as shown to the coach.
    pub name: String,
    /// Life-area tag.
    pub dimension: Dimension,
    /// Cross-dimension impact score; rows below the policy threshold drop.
    pub score: f64,
    /// Practice frequency annotation, e.g. "diária".
    pub frequency: String,
}

/// One row of the learning-path exemplar catalog.
#[derive(Debug, Clone)]
pub struct PathRow {
    /// Path (trail) name; rows with the same name form one progression.
    pub path: String,
    /// Life-area tag.
    pub dimension: Dimension,
    /// Progression level, 1–3.
    pub level: u8,
    /// Habit practiced at this level.
    pub habit: String,
    /// Frequency annotation.
    pub frequency: String,
}

struct HeaderMap {
    indices: Vec<Option<usize>>,
}

impl HeaderMap {
    /// Maps each alias group to a column index, by position in `groups`.
    fn new(headers: &csv::StringRecord, groups: &[&[&str]]) -> Self {
        let indices = groups
            .iter()
            .map(|aliases| {
                headers.iter().position(|h| {
                    let h = h.trim().to_lowercase();
                    aliases.iter().any(|a| *a == h)
                })
            })
            .collect();
        Self { indices }
    }

    fn get<'r>(&self, record: &'r csv::StringRecord, group: usize) -> Option<&'r str> {
        self.indices[group]
            .and_then(|i| record.get(i))
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

fn open_catalog(path: &Path) -> Result<csv::Reader<std::fs::File>> {
    if !path.is_file() {
        return Err(Error::ReferenceDataMissing(path.display().to_string()));
    }
    csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| Error::ReferenceDataMissing(format!("{}: {e}", path.display())))
}

/// Reads the habit inventory catalog.
///
/// Rows with an unknown dimension or unparsable score are skipped with a
/// warning rather than failing the whole catalog.
///
/// # Errors
///
/// Returns `ReferenceDataMissing` when the file is absent or unreadable.
pub fn read_habits(path: &Path) -> Result<Vec<HabitRow>> {
    let mut reader = open_catalog(path)?;
    let headers = reader
        .headers()
        .map_err(|e| Error::ReferenceDataMissing(format!("{}: {e}", path.display())))?
        .clone();
    let map = HeaderMap::new(
        &headers,
        &[
            &["name", "habit", "hábito", "habito"],
            &["dimension", "dimensão", "dimensao", "area"],
            &["score", "pontuação", "pontuacao"],
            &["frequency", "frequência", "frequencia"],
        ],
    );

    let mut rows = Vec::new();
    for record in reader.records() {
        let record =
            record.map_err(|e| Error::ReferenceDataMissing(format!("{}: {e}", path.display())))?;
        let Some(name) = map.get(&record, 0) else {
            continue;
        };
        let Some(dimension) = map.get(&record, 1).and_then(Dimension::parse) else {
            tracing::warn!(habit = name, "habit row with unknown dimension skipped");
            continue;
        };
        let Some(score) = map.get(&record, 2).and_then(|s| s.parse::<f64>().ok()) else {
            tracing::warn!(habit = name, "habit row with unparsable score skipped");
            continue;
        };
        rows.push(HabitRow {
            name: name.to_string(),
            dimension,
            score,
            frequency: map.get(&record, 3).unwrap_or("diária").to_string(),
        });
    }
    Ok(rows)
}

/// Reads the learning-path exemplar catalog.
///
/// # Errors
///
/// Returns `ReferenceDataMissing` when the file is absent or unreadable.
pub fn read_paths(path: &Path) -> Result<Vec<PathRow>> {
    let mut reader = open_catalog(path)?;
    let headers = reader
        .headers()
        .map_err(|e| Error::ReferenceDataMissing(format!("{}: {e}", path.display())))?
        .clone();
    let map = HeaderMap::new(
        &headers,
        &[
            &["path", "trail", "trilha"],
            &["dimension", "dimensão", "dimensao", "area"],
            &["level", "nível", "nivel"],
            &["habit", "hábito", "habito"],
            &["frequency", "frequência", "frequencia"],
        ],
    );

    let mut rows = Vec::new();
    for record in reader.records() {
        let record =
            record.map_err(|e| Error::ReferenceDataMissing(format!("{}: {e}", path.display())))?;
        let (Some(path_name), Some(habit)) = (map.get(&record, 0), map.get(&record, 3)) else {
            continue;
        };
        let Some(dimension) = map.get(&record, 1).and_then(Dimension::parse) else {
            continue;
        };
        let Some(level) = map.get(&record, 2).and_then(|s| s.parse::<u8>().ok()) else {
            continue;
        };
        rows.push(PathRow {
            path: path_name.to_string(),
            dimension,
            level,
            habit: habit.to_string(),
            frequency: map.get(&record, 4).unwrap_or("semanal").to_string(),
        });
    }
    Ok(rows)
}

/// Reads a whole-inclusion document (objective mapping, coach document).
///
/// # Errors
///
/// Returns `ReferenceDataMissing` when the file is absent.
pub fn read_whole(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .map_err(|e| Error::ReferenceDataMissing(format!("{}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_read_habits_with_aliased_headers() {
        let file = write_temp(
            "hábito,dimensão,pontuação,frequência\n\
             Caminhada matinal,physical-health,21.5,diária\n\
             Diário de gratidão,mental_health,18.0,diária\n",
        );
        let rows = read_habits(file.path()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].name, "Caminhada matinal");
        assert_eq!(rows[0].dimension, Dimension::PhysicalHealth);
        assert!((rows[0].score - 21.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_bad_rows_skipped_not_fatal() {
        let file = write_temp(
            "name,dimension,score\n\
             Valid,work,16\n\
             NoDimension,finances,20\n\
             NoScore,work,muito\n",
        );
        let rows = read_habits(file.path()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "Valid");
    }

    #[test]
    fn test_missing_file_is_reference_data_missing() {
        let err = read_habits(Path::new("/nonexistent/habits.csv")).unwrap_err();
        assert_eq!(err.kind(), "reference_data_missing");
    }

    #[test]
    fn test_read_paths_levels() {
        let file = write_temp(
            "trilha,dimensão,nível,hábito,frequência\n\
             Energia Essencial,physicalHealth,1,Beber água ao acordar,diária\n\
             Energia Essencial,physicalHealth,2,Caminhar 15 minutos,diária\n\
             Energia Essencial,physicalHealth,3,Treino de força,3x semana\n",
        );
        let rows = read_paths(file.path()).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2].level, 3);
        assert_eq!(rows[2].frequency, "3x semana");
    }
}
