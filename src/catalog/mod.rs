//! Reference-data filtering and the size-bounded context digest.
//!
//! Up to four tabular catalogs feed the coaching prompts: the habit
//! inventory and learning-path exemplars are filtered per the persona's
//! reference policy; the objective mapping and the coach document are
//! included whole. The filtered projection is rendered once into a digest
//! whose serialized size must land inside the policy band, and cached with
//! a 24-hour TTL behind a single-writer guard.

mod tables;

pub use tables::{HabitRow, PathRow, read_habits, read_paths, read_whole};

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::config::ReferencePolicy;
use crate::models::Dimension;
use crate::Result;

/// Digest rebuild interval.
pub const DIGEST_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Minimum habit entries per dimension the digest must keep.
pub const MIN_HABITS_PER_DIMENSION: usize = 3;
/// Maximum habit entries per dimension the digest may keep.
pub const MAX_HABITS_PER_DIMENSION: usize = 15;

/// Byte sub-budget for the objective mapping section.
const OBJECTIVES_MAX_BYTES: usize = 8 * 1024;
/// Byte sub-budget for the coach document section.
const COACH_MAX_BYTES: usize = 16 * 1024;

/// Complete progression exemplar: one path's levels 1→2→3.
#[derive(Debug, Clone)]
pub struct PathExemplar {
    /// Path (trail) name.
    pub path: String,
    /// Life-area tag.
    pub dimension: Dimension,
    /// The three level rows, ordered by level.
    pub levels: Vec<PathRow>,
}

/// Loader for the reference catalogs of one directory.
#[derive(Debug, Clone)]
pub struct ReferenceCatalogs {
    dir: PathBuf,
    policy: ReferencePolicy,
}

/// The filtered, rendered, size-bounded reference projection.
#[derive(Debug, Clone)]
pub struct ReferenceDigest {
    habits: Vec<HabitRow>,
    exemplars: Vec<PathExemplar>,
    objectives: String,
    coach: String,
    rendered: String,
    /// Short content hash identifying this digest build.
    pub version: String,
}

impl ReferenceCatalogs {
    /// Binds a catalog directory to a reference policy.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, policy: ReferencePolicy) -> Self {
        Self {
            dir: dir.into(),
            policy,
        }
    }

    /// Cache key: any change to the directory or policy forces a rebuild.
    fn fingerprint(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}",
            self.dir.display(),
            self.policy.habit_score_threshold,
            self.policy.habit_cap,
            self.policy.digest_min_bytes,
            self.policy.digest_max_bytes
        )
    }

    /// Reads, filters, and renders the digest.
    ///
    /// # Errors
    ///
    /// Returns `ReferenceDataMissing` when a required catalog is absent.
    pub fn build_digest(&self) -> Result<ReferenceDigest> {
        let all_habits = read_habits(&self.dir.join(&self.policy.habits_file))?;
        let path_rows = read_paths(&self.dir.join(&self.policy.paths_file))?;
        let objectives = read_whole(&self.dir.join(&self.policy.objectives_file))?;
        let coach = read_whole(&self.dir.join(&self.policy.coach_file))?;

        let habits = filter_habits(all_habits, &self.policy);
        let exemplars = select_exemplars(path_rows);

        let mut digest = ReferenceDigest {
            habits,
            exemplars,
            objectives: truncate_bytes(&objectives, OBJECTIVES_MAX_BYTES),
            coach: truncate_bytes(&coach, COACH_MAX_BYTES),
            rendered: String::new(),
            version: String::new(),
        };
        digest.render();
        digest.trim_to(self.policy.digest_max_bytes);

        if digest.size_bytes() < self.policy.digest_min_bytes {
            tracing::warn!(
                size = digest.size_bytes(),
                min = self.policy.digest_min_bytes,
                "reference digest under the target band; catalogs are thin"
            );
        }
        tracing::debug!(
            size = digest.size_bytes(),
            habits = digest.habits.len(),
            exemplars = digest.exemplars.len(),
            version = %digest.version,
            "reference digest built"
        );
        Ok(digest)
    }
}

impl ReferenceDigest {
    /// The full rendered digest text.
    #[must_use]
    pub fn rendered(&self) -> &str {
        &self.rendered
    }

    /// Serialized size in bytes.
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.rendered.len()
    }

    /// The filtered habit rows, ranking order.
    #[must_use]
    pub fn habits(&self) -> &[HabitRow] {
        &self.habits
    }

    /// The selected progression exemplars.
    #[must_use]
    pub fn exemplars(&self) -> &[PathExemplar] {
        &self.exemplars
    }

    /// Renders the sub-slice relevant to one dimension: that dimension's
    /// habits and exemplars plus the whole-inclusion sections.
    #[must_use]
    pub fn slice_for(&self, dimension: Dimension) -> String {
        let habits: Vec<&HabitRow> = self
            .habits
            .iter()
            .filter(|h| h.dimension == dimension)
            .collect();
        let exemplars: Vec<&PathExemplar> = self
            .exemplars
            .iter()
            .filter(|e| e.dimension == dimension)
            .collect();
        render_sections(&habits, &exemplars, &self.objectives, &self.coach)
    }

    /// First attributed quotation in the coach document, if any.
    ///
    /// Recognizes `"…" — Autor` lines; used by the structural splitter
    /// when the source material carries no quote of its own.
    #[must_use]
    pub fn coach_quote(&self) -> Option<(String, String)> {
        for line in self.coach.lines() {
            let line = line.trim().trim_start_matches('>').trim();
            let rest = line.strip_prefix('"')?;
            if let Some((quote, attribution)) = rest.split_once('"') {
                let author = attribution.trim().trim_start_matches(['—', '-']).trim();
                if !quote.trim().is_empty() && !author.is_empty() {
                    return Some((quote.trim().to_string(), author.to_string()));
                }
            }
        }
        None
    }

    fn render(&mut self) {
        let habits: Vec<&HabitRow> = self.habits.iter().collect();
        let exemplars: Vec<&PathExemplar> = self.exemplars.iter().collect();
        self.rendered = render_sections(&habits, &exemplars, &self.objectives, &self.coach);
        let mut hasher = Sha256::new();
        hasher.update(self.rendered.as_bytes());
        self.version = hex::encode(&hasher.finalize()[..8]);
    }

    /// Drops lower-ranked habit rows first, then trailing exemplars, until
    /// the rendered digest fits `max_bytes`. Never drops a dimension below
    /// [`MIN_HABITS_PER_DIMENSION`].
    fn trim_to(&mut self, max_bytes: usize) {
        while self.size_bytes() > max_bytes {
            if let Some(index) = self.lowest_ranked_droppable_habit() {
                self.habits.remove(index);
                self.render();
                continue;
            }
            if self.exemplars.pop().is_some() {
                self.render();
                continue;
            }
            tracing::warn!(
                size = self.size_bytes(),
                max = max_bytes,
                "digest still over band after dropping all filterable rows"
            );
            break;
        }
    }

    fn lowest_ranked_droppable_habit(&self) -> Option<usize> {
        let mut per_dimension: HashMap<Dimension, usize> = HashMap::new();
        for habit in &self.habits {
            *per_dimension.entry(habit.dimension).or_default() += 1;
        }
        // Habits are stored in ranking order; scan from the bottom.
        self.habits.iter().rposition(|h| {
            per_dimension.get(&h.dimension).copied().unwrap_or(0) > MIN_HABITS_PER_DIMENSION
        })
    }
}

fn render_sections(
    habits: &[&HabitRow],
    exemplars: &[&PathExemplar],
    objectives: &str,
    coach: &str,
) -> String {
    let mut out = String::new();
    out.push_str("# Dados de referência do treinador\n\n## Inventário de hábitos\n\n");
    for habit in habits {
        let _ = writeln!(
            out,
            "- [{}] {} — score {:.1}, frequência {}",
            habit.dimension, habit.name, habit.score, habit.frequency
        );
    }
    out.push_str("\n## Trilhas exemplares\n\n");
    for exemplar in exemplars {
        let _ = writeln!(out, "### {} ({})", exemplar.path, exemplar.dimension);
        for row in &exemplar.levels {
            let _ = writeln!(out, "{}. {} — {}", row.level, row.habit, row.frequency);
        }
        out.push('\n');
    }
    out.push_str("## Mapeamento de objetivos\n\n");
    out.push_str(objectives);
    out.push_str("\n\n## Documento do treinador\n\n");
    out.push_str(coach);
    out
}

/// Applies the habit inventory policy: threshold, ranking, near-duplicate
/// dedup, caps, and per-dimension minimums.
fn filter_habits(mut rows: Vec<HabitRow>, policy: &ReferencePolicy) -> Vec<HabitRow> {
    rows.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

    let mut kept: Vec<HabitRow> = Vec::new();
    let mut below: Vec<HabitRow> = Vec::new();
    let mut seen: Vec<String> = Vec::new();
    for row in rows {
        let key = normalize_name(&row.name);
        if seen.contains(&key) {
            continue;
        }
        seen.push(key);
        if row.score > policy.habit_score_threshold {
            kept.push(row);
        } else {
            below.push(row);
        }
    }

    // Global cap, dimension-aware: drop from the bottom, but never empty a
    // dimension that still has rows elsewhere.
    while kept.len() > policy.habit_cap {
        let mut counts: HashMap<Dimension, usize> = HashMap::new();
        for habit in &kept {
            *counts.entry(habit.dimension).or_default() += 1;
        }
        let Some(index) = kept
            .iter()
            .rposition(|h| counts.get(&h.dimension).copied().unwrap_or(0) > 1)
        else {
            break;
        };
        kept.remove(index);
    }

    // Per-dimension ceiling.
    let mut counts: HashMap<Dimension, usize> = HashMap::new();
    kept.retain(|habit| {
        let count = counts.entry(habit.dimension).or_default();
        *count += 1;
        *count <= MAX_HABITS_PER_DIMENSION
    });

    // Per-dimension floor: backfill from below-threshold rows when a
    // dimension is underrepresented.
    for dimension in Dimension::all() {
        loop {
            let have = kept.iter().filter(|h| h.dimension == *dimension).count();
            if have >= MIN_HABITS_PER_DIMENSION {
                break;
            }
            let Some(index) = below.iter().position(|h| h.dimension == *dimension) else {
                if have == 0 {
                    tracing::warn!(dimension = %dimension, "no habit rows for dimension");
                }
                break;
            };
            kept.push(below.remove(index));
        }
    }

    kept
}

/// Keeps two complete (levels 1→2→3) progression exemplars per dimension,
/// in source order.
fn select_exemplars(rows: Vec<PathRow>) -> Vec<PathExemplar> {
    let mut grouped: Vec<(String, Dimension, Vec<PathRow>)> = Vec::new();
    for row in rows {
        if let Some(entry) = grouped
            .iter_mut()
            .find(|(name, dim, _)| *name == row.path && *dim == row.dimension)
        {
            entry.2.push(row);
        } else {
            grouped.push((row.path.clone(), row.dimension, vec![row]));
        }
    }

    let mut per_dimension: HashMap<Dimension, usize> = HashMap::new();
    let mut exemplars = Vec::new();
    for (path, dimension, mut levels) in grouped {
        levels.sort_by_key(|r| r.level);
        levels.dedup_by_key(|r| r.level);
        let complete = [1u8, 2, 3]
            .iter()
            .all(|lvl| levels.iter().any(|r| r.level == *lvl));
        if !complete {
            continue;
        }
        let count = per_dimension.entry(dimension).or_default();
        if *count >= 2 {
            continue;
        }
        *count += 1;
        exemplars.push(PathExemplar {
            path,
            dimension,
            levels,
        });
    }
    exemplars
}

/// Collapses case, accents, and punctuation so near-identical habit names
/// compare equal.
fn normalize_name(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(fold_accent)
        .filter(|c| c.is_ascii_alphanumeric() || *c == ' ')
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

const fn fold_accent(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ã' => 'a',
        'é' | 'ê' => 'e',
        'í' => 'i',
        'ó' | 'ô' | 'õ' => 'o',
        'ú' | 'ü' => 'u',
        'ç' => 'c',
        _ => c,
    }
}

fn truncate_bytes(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    let mut out = text[..end].to_string();
    out.push_str("\n…(truncado)\n");
    out
}

/// TTL cache for the digest, shared by batch workers.
///
/// The lock is held for the whole rebuild so concurrent workers cannot
/// race: losers block and reuse the winner's result.
#[derive(Debug, Default)]
pub struct DigestCache {
    entry: Mutex<Option<CacheEntry>>,
}

#[derive(Debug)]
struct CacheEntry {
    built_at: Instant,
    fingerprint: String,
    digest: Arc<ReferenceDigest>,
}

impl DigestCache {
    /// Creates an empty cache.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entry: Mutex::new(None),
        }
    }

    /// Returns the cached digest, rebuilding on first use, TTL expiry, or
    /// policy change.
    ///
    /// # Errors
    ///
    /// Propagates `ReferenceDataMissing` from the rebuild.
    pub fn get_or_build(&self, catalogs: &ReferenceCatalogs) -> Result<Arc<ReferenceDigest>> {
        let mut entry = self
            .entry
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let fingerprint = catalogs.fingerprint();
        if let Some(cached) = entry.as_ref() {
            if cached.fingerprint == fingerprint && cached.built_at.elapsed() < DIGEST_TTL {
                return Ok(Arc::clone(&cached.digest));
            }
        }
        let digest = Arc::new(catalogs.build_digest()?);
        *entry = Some(CacheEntry {
            built_at: Instant::now(),
            fingerprint,
            digest: Arc::clone(&digest),
        });
        Ok(digest)
    }

    /// Drops the cached digest. Intended for tests.
    pub fn clear(&self) {
        let mut entry = self
            .entry
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *entry = None;
    }
}

/// Validates the digest invariant: every dimension is represented by at
/// least [`MIN_HABITS_PER_DIMENSION`] and at most
/// [`MAX_HABITS_PER_DIMENSION`] habit entries.
#[must_use]
pub fn dimension_coverage_ok(digest: &ReferenceDigest) -> bool {
    Dimension::all().iter().all(|dimension| {
        let count = digest
            .habits()
            .iter()
            .filter(|h| h.dimension == *dimension)
            .count();
        (MIN_HABITS_PER_DIMENSION..=MAX_HABITS_PER_DIMENSION).contains(&count)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PersonaConfig, persona_fixtures};

    fn policy() -> ReferencePolicy {
        PersonaConfig::from_yaml(persona_fixtures::MINIMAL_PERSONA)
            .unwrap()
            .reference_policy
    }

    fn habit(name: &str, dimension: Dimension, score: f64) -> HabitRow {
        HabitRow {
            name: name.to_string(),
            dimension,
            score,
            frequency: "diária".to_string(),
        }
    }

    #[test]
    fn test_filter_drops_below_threshold_and_ranks() {
        let rows = vec![
            habit("Fraco", Dimension::Work, 10.0),
            habit("Forte", Dimension::Work, 30.0),
            habit("Médio", Dimension::Work, 20.0),
        ];
        let kept = filter_habits(rows, &policy());
        let names: Vec<&str> = kept.iter().map(|h| h.name.as_str()).collect();
        // Below-threshold row is backfilled to satisfy the per-dimension floor,
        // after the ranked survivors.
        assert_eq!(names, vec!["Forte", "Médio", "Fraco"]);
    }

    #[test]
    fn test_near_identical_names_deduped() {
        let rows = vec![
            habit("Caminhada matinal", Dimension::PhysicalHealth, 25.0),
            habit("caminhada MATINAL", Dimension::PhysicalHealth, 24.0),
            habit("Caminhada, matinal!", Dimension::PhysicalHealth, 23.0),
        ];
        let kept = filter_habits(rows, &policy());
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].name, "Caminhada matinal");
    }

    #[test]
    fn test_per_dimension_ceiling() {
        let rows: Vec<HabitRow> = (0..30)
            .map(|i| {
                habit(&format!("Hábito {i}"), Dimension::MentalHealth, f64::from(16 + i))
            })
            .collect();
        let kept = filter_habits(rows, &policy());
        assert_eq!(kept.len(), MAX_HABITS_PER_DIMENSION);
    }

    #[test]
    fn test_exemplar_selection_requires_complete_progression() {
        let row = |path: &str, level: u8| PathRow {
            path: path.to_string(),
            dimension: Dimension::Work,
            level,
            habit: format!("{path} nível {level}"),
            frequency: "semanal".to_string(),
        };
        let rows = vec![
            row("Completa", 1),
            row("Completa", 2),
            row("Completa", 3),
            row("Incompleta", 1),
            row("Incompleta", 3),
        ];
        let exemplars = select_exemplars(rows);
        assert_eq!(exemplars.len(), 1);
        assert_eq!(exemplars[0].path, "Completa");
        assert_eq!(exemplars[0].levels.len(), 3);
    }

    #[test]
    fn test_two_exemplars_per_dimension_cap() {
        let mut rows = Vec::new();
        for name in ["A", "B", "C"] {
            for level in 1..=3u8 {
                rows.push(PathRow {
                    path: name.to_string(),
                    dimension: Dimension::Spirituality,
                    level,
                    habit: format!("{name}{level}"),
                    frequency: "diária".to_string(),
                });
            }
        }
        let exemplars = select_exemplars(rows);
        assert_eq!(exemplars.len(), 2);
    }

    #[test]
    fn test_digest_build_and_slice() {
        let dir = tempfile::tempdir().unwrap();
        let mut habits_csv = String::from("name,dimension,score,frequency\n");
        for dimension in Dimension::all() {
            for i in 0..4 {
                habits_csv.push_str(&format!("Hábito {dimension} {i},{dimension},{},diária\n", 16 + i));
            }
        }
        std::fs::write(dir.path().join("habits.csv"), habits_csv).unwrap();
        std::fs::write(
            dir.path().join("learning_paths.csv"),
            "path,dimension,level,habit,frequency\n\
             Trilha Um,work,1,Planejar o dia,diária\n\
             Trilha Um,work,2,Revisão semanal,semanal\n\
             Trilha Um,work,3,Retrospectiva mensal,mensal\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("objectives.csv"), "objective,path\nFoco,Trilha Um\n")
            .unwrap();
        std::fs::write(
            dir.path().join("coach.md"),
            "# Coach\n\n> \"A repetição é a mãe da maestria.\" — Provérbio\n",
        )
        .unwrap();

        let catalogs = ReferenceCatalogs::new(dir.path(), policy());
        let digest = catalogs.build_digest().unwrap();
        assert!(dimension_coverage_ok(&digest));
        assert!(digest.rendered().contains("Inventário de hábitos"));
        assert_eq!(
            digest.coach_quote(),
            Some((
                "A repetição é a mãe da maestria.".to_string(),
                "Provérbio".to_string()
            ))
        );

        let slice = digest.slice_for(Dimension::Work);
        assert!(slice.contains("Trilha Um"));
        assert!(!slice.contains("Hábito physicalHealth 0"));
    }

    #[test]
    fn test_missing_catalog_fails() {
        let dir = tempfile::tempdir().unwrap();
        let catalogs = ReferenceCatalogs::new(dir.path(), policy());
        let err = catalogs.build_digest().unwrap_err();
        assert_eq!(err.kind(), "reference_data_missing");
    }

    #[test]
    fn test_cache_reuses_within_ttl() {
        let dir = tempfile::tempdir().unwrap();
        let mut habits_csv = String::from("name,dimension,score\n");
        for dimension in Dimension::all() {
            for i in 0..3 {
                habits_csv.push_str(&format!("H {dimension} {i},{dimension},{}\n", 20 + i));
            }
        }
        std::fs::write(dir.path().join("habits.csv"), habits_csv).unwrap();
        std::fs::write(
            dir.path().join("learning_paths.csv"),
            "path,dimension,level,habit\nT,work,1,a\nT,work,2,b\nT,work,3,c\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("objectives.csv"), "objective\nFoco\n").unwrap();
        std::fs::write(dir.path().join("coach.md"), "# Coach\n").unwrap();

        let catalogs = ReferenceCatalogs::new(dir.path(), policy());
        let cache = DigestCache::new();
        let first = cache.get_or_build(&catalogs).unwrap();
        let second = cache.get_or_build(&catalogs).unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        cache.clear();
        let third = cache.get_or_build(&catalogs).unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
    }

    #[test]
    fn test_trim_to_drops_lowest_ranked_first() {
        let mut digest = ReferenceDigest {
            habits: (0..20)
                .map(|i| {
                    habit(
                        &format!("Hábito com nome razoavelmente longo número {i}"),
                        Dimension::Work,
                        f64::from(40 - i),
                    )
                })
                .collect(),
            exemplars: Vec::new(),
            objectives: String::new(),
            coach: String::new(),
            rendered: String::new(),
            version: String::new(),
        };
        digest.render();
        let full = digest.size_bytes();
        digest.trim_to(full - 200);
        assert!(digest.size_bytes() <= full - 200);
        // Highest-ranked rows survive.
        assert_eq!(digest.habits()[0].score, 40.0);
        assert!(digest.habits().len() >= MIN_HABITS_PER_DIMENSION);
    }
}
