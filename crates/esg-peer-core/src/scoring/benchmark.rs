//! Peer benchmark datasets and where they come from.
//!
//! Datasets are keyed by (metric, industry, size tier) and stored as CSV
//! files under `<root>/<industry>/<tier>/<metric>.csv`. A missing dataset is
//! a recoverable `BenchmarkNotFound`: the caller skips the metric.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::size::SizeTier;
use crate::error::EsgPeerError;
use crate::EsgPeerResult;

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BenchmarkKey {
    pub metric: String,
    pub industry: String,
    pub tier: SizeTier,
}

impl BenchmarkKey {
    pub fn new(metric: &str, industry: &str, tier: SizeTier) -> Self {
        BenchmarkKey {
            metric: metric.to_string(),
            industry: industry.to_string(),
            tier,
        }
    }

    pub fn industry_slug(&self) -> String {
        self.industry.trim().to_lowercase().replace(' ', "_")
    }

    pub fn metric_file_stem(&self) -> String {
        metric_file_stem(&self.metric)
    }

    /// `<industry>/<tier>/<metric>.csv`
    pub fn relative_path(&self) -> PathBuf {
        PathBuf::from(self.industry_slug())
            .join(self.tier.code())
            .join(format!("{}.csv", self.metric_file_stem()))
    }

    /// Stable lookup key, independent of the platform path separator.
    pub fn canonical(&self) -> String {
        format!(
            "{}/{}/{}",
            self.industry_slug(),
            self.tier.code(),
            self.metric_file_stem()
        )
    }
}

/// Lower-case, spaces to underscores, percent signs and apostrophes dropped.
pub fn metric_file_stem(metric: &str) -> String {
    metric
        .trim()
        .to_lowercase()
        .replace(' ', "_")
        .chars()
        .filter(|c| !matches!(c, '%' | '\'' | '\u{2019}'))
        .collect()
}

// ---------------------------------------------------------------------------
// Dataset
// ---------------------------------------------------------------------------

/// A read-only peer table. Cells are kept as text; typed views are extracted
/// per estimator so one file can serve several metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkDataset {
    pub key: BenchmarkKey,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl BenchmarkDataset {
    pub fn new(key: BenchmarkKey, columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        BenchmarkDataset { key, columns, rows }
    }

    pub fn from_csv_reader<R: Read>(
        key: BenchmarkKey,
        reader: R,
        location: &str,
    ) -> EsgPeerResult<Self> {
        let format_err = |e: csv::Error| EsgPeerError::BenchmarkFormat {
            location: location.to_string(),
            reason: e.to_string(),
        };
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);
        let columns: Vec<String> = rdr
            .headers()
            .map_err(format_err)?
            .iter()
            .map(str::to_string)
            .collect();
        let mut rows = Vec::new();
        for record in rdr.records() {
            let record = record.map_err(format_err)?;
            rows.push(record.iter().map(str::to_string).collect());
        }
        Ok(BenchmarkDataset::new(key, columns, rows))
    }

    /// Single numeric column.
    pub fn from_values(key: BenchmarkKey, column: &str, values: &[f64]) -> Self {
        let rows = values.iter().map(|v| vec![v.to_string()]).collect();
        BenchmarkDataset::new(key, vec![column.to_string()], rows)
    }

    /// Covariate/value pairs, e.g. employees vs emissions.
    pub fn from_pairs(
        key: BenchmarkKey,
        covariate_column: &str,
        value_column: &str,
        pairs: &[(f64, f64)],
    ) -> Self {
        let rows = pairs
            .iter()
            .map(|(x, y)| vec![x.to_string(), y.to_string()])
            .collect();
        BenchmarkDataset::new(
            key,
            vec![covariate_column.to_string(), value_column.to_string()],
            rows,
        )
    }

    /// Single categorical column.
    pub fn from_labels(key: BenchmarkKey, column: &str, labels: &[&str]) -> Self {
        let rows = labels.iter().map(|l| vec![l.to_string()]).collect();
        BenchmarkDataset::new(key, vec![column.to_string()], rows)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.column_index(column).is_some()
    }

    fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.trim() == column.trim())
    }

    fn require_column(&self, column: &str) -> EsgPeerResult<usize> {
        self.column_index(column).ok_or_else(|| {
            EsgPeerError::InsufficientData(format!(
                "benchmark {} has no '{}' column",
                self.key.canonical(),
                column
            ))
        })
    }

    fn cell(&self, row: &[String], idx: usize) -> Option<String> {
        row.get(idx)
            .map(|c| c.trim())
            .filter(|c| !c.is_empty() && !c.eq_ignore_ascii_case("nan"))
            .map(str::to_string)
    }

    /// Non-missing numeric values of a column.
    pub fn numeric_values(&self, column: &str) -> EsgPeerResult<Vec<f64>> {
        let idx = self.require_column(column)?;
        Ok(self
            .rows
            .iter()
            .filter_map(|row| self.cell(row, idx))
            .filter_map(|c| c.parse::<f64>().ok())
            .filter(|v| v.is_finite())
            .collect())
    }

    /// `(covariate, value)` pairs for rows where both are present.
    pub fn numeric_pairs(
        &self,
        covariate_column: &str,
        value_column: &str,
    ) -> EsgPeerResult<Vec<(f64, f64)>> {
        let x_idx = self.require_column(covariate_column)?;
        let y_idx = self.require_column(value_column)?;
        let parse = |c: Option<String>| {
            c.and_then(|s| s.parse::<f64>().ok())
                .filter(|v| v.is_finite())
        };
        Ok(self
            .rows
            .iter()
            .filter_map(|row| {
                let x = parse(self.cell(row, x_idx))?;
                let y = parse(self.cell(row, y_idx))?;
                Some((x, y))
            })
            .collect())
    }

    /// Non-missing trimmed text values of a column.
    pub fn text_values(&self, column: &str) -> EsgPeerResult<Vec<String>> {
        let idx = self.require_column(column)?;
        Ok(self
            .rows
            .iter()
            .filter_map(|row| self.cell(row, idx))
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Repositories
// ---------------------------------------------------------------------------

/// Source of peer benchmark datasets.
pub trait BenchmarkRepository {
    /// Load the dataset for `key`, or `BenchmarkNotFound`.
    fn load(&self, key: &BenchmarkKey) -> EsgPeerResult<Arc<BenchmarkDataset>>;
}

impl<T: BenchmarkRepository + ?Sized> BenchmarkRepository for &T {
    fn load(&self, key: &BenchmarkKey) -> EsgPeerResult<Arc<BenchmarkDataset>> {
        (**self).load(key)
    }
}

/// Resolve the dataset for a metric/industry/tier triple.
pub fn load_benchmark(
    repository: &dyn BenchmarkRepository,
    metric: &str,
    industry: &str,
    tier: SizeTier,
) -> EsgPeerResult<Arc<BenchmarkDataset>> {
    repository.load(&BenchmarkKey::new(metric, industry, tier))
}

/// CSV files on disk. Every load is a blocking read.
#[derive(Debug, Clone)]
pub struct FsBenchmarkRepository {
    root: PathBuf,
}

impl FsBenchmarkRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FsBenchmarkRepository { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, key: &BenchmarkKey) -> PathBuf {
        self.root.join(key.relative_path())
    }
}

impl BenchmarkRepository for FsBenchmarkRepository {
    fn load(&self, key: &BenchmarkKey) -> EsgPeerResult<Arc<BenchmarkDataset>> {
        let path = self.path_for(key);
        let location = path.display().to_string();
        if !path.is_file() {
            return Err(EsgPeerError::BenchmarkNotFound {
                metric: key.metric.clone(),
                location,
            });
        }
        let file = File::open(&path).map_err(|e| EsgPeerError::BenchmarkFormat {
            location: location.clone(),
            reason: e.to_string(),
        })?;
        tracing::debug!(path = %location, "loading benchmark");
        let dataset = BenchmarkDataset::from_csv_reader(key.clone(), file, &location)?;
        Ok(Arc::new(dataset))
    }
}

/// Datasets held in memory, keyed by [`BenchmarkKey::canonical`].
#[derive(Debug, Clone, Default)]
pub struct InMemoryBenchmarkRepository {
    datasets: HashMap<String, Arc<BenchmarkDataset>>,
}

impl InMemoryBenchmarkRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, dataset: BenchmarkDataset) {
        self.datasets
            .insert(dataset.key.canonical(), Arc::new(dataset));
    }

    pub fn with(mut self, dataset: BenchmarkDataset) -> Self {
        self.insert(dataset);
        self
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }
}

impl BenchmarkRepository for InMemoryBenchmarkRepository {
    fn load(&self, key: &BenchmarkKey) -> EsgPeerResult<Arc<BenchmarkDataset>> {
        self.datasets
            .get(&key.canonical())
            .cloned()
            .ok_or_else(|| EsgPeerError::BenchmarkNotFound {
                metric: key.metric.clone(),
                location: format!("memory:{}", key.canonical()),
            })
    }
}

/// Shares loaded datasets across requests. Misses are not cached, so a
/// dataset added later is picked up on the next load.
#[derive(Debug)]
pub struct CachedBenchmarkRepository<R> {
    inner: R,
    cache: Mutex<HashMap<String, Arc<BenchmarkDataset>>>,
}

impl<R: BenchmarkRepository> CachedBenchmarkRepository<R> {
    pub fn new(inner: R) -> Self {
        CachedBenchmarkRepository {
            inner,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn cached_len(&self) -> usize {
        self.cache.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn clear(&self) {
        self.cache.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

impl<R: BenchmarkRepository> BenchmarkRepository for CachedBenchmarkRepository<R> {
    fn load(&self, key: &BenchmarkKey) -> EsgPeerResult<Arc<BenchmarkDataset>> {
        let canonical = key.canonical();
        if let Some(hit) = self
            .cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&canonical)
        {
            return Ok(Arc::clone(hit));
        }
        let dataset = self.inner.load(key)?;
        self.cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(canonical, Arc::clone(&dataset));
        Ok(dataset)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_metric_file_stem() {
        assert_eq!(metric_file_stem("GHG Emissions"), "ghg_emissions");
        assert_eq!(metric_file_stem("Renewable Energy %"), "renewable_energy_");
        assert_eq!(metric_file_stem("ESG KPI's in Exec Pay"), "esg_kpis_in_exec_pay");
        assert_eq!(metric_file_stem("ESG KPI’s in Exec Pay"), "esg_kpis_in_exec_pay");
    }

    #[test]
    fn test_relative_path() {
        let key = BenchmarkKey::new("Water usage", "Real Estate", SizeTier::UpperMid);
        assert_eq!(
            key.relative_path(),
            PathBuf::from("real_estate").join("UM").join("water_usage.csv")
        );
        assert_eq!(key.canonical(), "real_estate/UM/water_usage");
    }

    #[test]
    fn test_numeric_views_drop_missing() {
        let csv = "Number of employees,GHG Emissions (tCO₂e)\n100,50\n200,\n,70\nabc,1\n300,90\n";
        let key = BenchmarkKey::new("GHG Emissions", "Technology", SizeTier::Large);
        let ds = BenchmarkDataset::from_csv_reader(key, csv.as_bytes(), "inline").unwrap();
        assert_eq!(ds.len(), 5);
        assert_eq!(
            ds.numeric_pairs("Number of employees", "GHG Emissions (tCO₂e)")
                .unwrap(),
            vec![(100.0, 50.0), (300.0, 90.0)]
        );
        assert_eq!(
            ds.numeric_values("GHG Emissions (tCO₂e)").unwrap(),
            vec![50.0, 70.0, 1.0, 90.0]
        );
    }

    #[test]
    fn test_missing_column_is_insufficient_data() {
        let key = BenchmarkKey::new("GHG Emissions", "Technology", SizeTier::Large);
        let ds = BenchmarkDataset::from_values(key, "GHG Emissions (tCO₂e)", &[1.0, 2.0]);
        let err = ds
            .numeric_pairs("Number of employees", "GHG Emissions (tCO₂e)")
            .unwrap_err();
        assert!(matches!(err, EsgPeerError::InsufficientData(_)));
    }

    #[test]
    fn test_text_values_trimmed() {
        let key = BenchmarkKey::new("Transition Plan", "Energy", SizeTier::Small);
        let ds = BenchmarkDataset::from_labels(key, "Transition Plan", &[" SBTi 2030 ", "", "nan", "None"]);
        assert_eq!(
            ds.text_values("Transition Plan").unwrap(),
            vec!["SBTi 2030".to_string(), "None".to_string()]
        );
    }

    #[test]
    fn test_in_memory_repository_hit_and_miss() {
        let key = BenchmarkKey::new("Board Diversity %", "Technology", SizeTier::Large);
        let repo = InMemoryBenchmarkRepository::new().with(BenchmarkDataset::from_values(
            key.clone(),
            "Board Diversity %",
            &[30.0, 40.0],
        ));
        assert_eq!(repo.load(&key).unwrap().len(), 2);

        let other = BenchmarkKey::new("Board Diversity %", "Technology", SizeTier::Small);
        assert!(matches!(
            repo.load(&other),
            Err(EsgPeerError::BenchmarkNotFound { .. })
        ));
    }

    #[test]
    fn test_fs_repository_reads_csv() {
        let root = std::env::temp_dir().join(format!("esg-peer-bench-{}", std::process::id()));
        let key = BenchmarkKey::new("Waste Recycled %", "Consumer Goods", SizeTier::LowerMid);
        let repo = FsBenchmarkRepository::new(&root);
        let path = repo.path_for(&key);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "Waste Recycled %\n40\n50\n60\n").unwrap();

        let ds = repo.load(&key).unwrap();
        assert_eq!(ds.numeric_values("Waste Recycled %").unwrap(), vec![40.0, 50.0, 60.0]);

        let missing = BenchmarkKey::new("Waste Recycled %", "Consumer Goods", SizeTier::Large);
        assert!(matches!(
            repo.load(&missing),
            Err(EsgPeerError::BenchmarkNotFound { .. })
        ));

        fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn test_cached_repository_shares_datasets() {
        let key = BenchmarkKey::new("Board Diversity %", "Technology", SizeTier::Large);
        let inner = InMemoryBenchmarkRepository::new().with(BenchmarkDataset::from_values(
            key.clone(),
            "Board Diversity %",
            &[30.0, 40.0],
        ));
        let cached = CachedBenchmarkRepository::new(inner);
        let a = cached.load(&key).unwrap();
        let b = cached.load(&key).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cached.cached_len(), 1);

        let miss = BenchmarkKey::new("Nope", "Technology", SizeTier::Large);
        assert!(cached.load(&miss).is_err());
        assert_eq!(cached.cached_len(), 1);

        cached.clear();
        assert_eq!(cached.cached_len(), 0);
    }

    #[test]
    fn test_load_benchmark_through_trait_object() {
        let key = BenchmarkKey::new("Gender Pay Gap %", "Technology", SizeTier::Large);
        let repo = InMemoryBenchmarkRepository::new().with(BenchmarkDataset::from_values(
            key,
            "Gender Pay Gap %",
            &[5.0],
        ));
        let ds = load_benchmark(&repo, "Gender Pay Gap %", "Technology", SizeTier::Large).unwrap();
        assert_eq!(ds.len(), 1);
    }
}
