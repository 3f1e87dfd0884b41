//! Company input records.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Read;
use std::str::FromStr;

use super::metric_spec::{MetricSpec, EMPLOYEES_COLUMN};
use super::size::SizeTier;
use crate::error::EsgPeerError;
use crate::types::Money;
use crate::EsgPeerResult;

pub const COMPANY_COLUMN: &str = "Company";
pub const INDUSTRY_COLUMN: &str = "Industry";
pub const REVENUE_COLUMN: &str = "Revenue";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A single reported metric value: numeric or categorical.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Number(f64),
    Text(String),
}

impl MetricValue {
    /// Parse a raw cell: numbers become `Number`, everything else `Text`.
    pub fn parse(raw: &str) -> MetricValue {
        let trimmed = raw.trim();
        match trimmed.parse::<f64>() {
            Ok(v) if v.is_finite() => MetricValue::Number(v),
            _ => MetricValue::Text(trimmed.to_string()),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetricValue::Number(v) if v.is_finite() => Some(*v),
            MetricValue::Number(_) => None,
            MetricValue::Text(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        }
    }

    /// Trimmed textual form, as compared by the disclosure scorer.
    pub fn as_text(&self) -> String {
        match self {
            MetricValue::Number(v) => v.to_string(),
            MetricValue::Text(s) => s.trim().to_string(),
        }
    }
}

/// One company row. Derived fields are only ever filled in by the pipeline,
/// which works on a copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyRecord {
    pub company: String,
    pub industry: String,
    pub revenue: Money,
    pub employees: u64,
    #[serde(default)]
    pub metrics: BTreeMap<String, MetricValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_tier: Option<SizeTier>,
    /// "<metric> Percentile" and disclosure scores attached by the pipeline.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub derived: BTreeMap<String, f64>,
}

impl CompanyRecord {
    pub fn metric(&self, name: &str) -> Option<&MetricValue> {
        self.metrics.get(name)
    }

    /// Required fields absent from this record, for the given metric table.
    pub fn missing_fields(&self, specs: &[MetricSpec]) -> Vec<String> {
        let mut missing = Vec::new();
        if self.company.trim().is_empty() {
            missing.push(COMPANY_COLUMN.to_string());
        }
        if self.industry.trim().is_empty() {
            missing.push(INDUSTRY_COLUMN.to_string());
        }
        for spec in specs {
            if !self.metrics.contains_key(&spec.name) {
                missing.push(spec.name.clone());
            }
        }
        missing
    }

    pub fn ensure_complete(&self, specs: &[MetricSpec]) -> EsgPeerResult<()> {
        let fields = self.missing_fields(specs);
        if fields.is_empty() {
            Ok(())
        } else {
            Err(EsgPeerError::Configuration { fields })
        }
    }
}

// ---------------------------------------------------------------------------
// CSV loading
// ---------------------------------------------------------------------------

/// Columns every company table must carry for the given metric table.
pub fn required_columns(specs: &[MetricSpec]) -> Vec<String> {
    let mut columns: Vec<String> = [
        COMPANY_COLUMN,
        INDUSTRY_COLUMN,
        EMPLOYEES_COLUMN,
        REVENUE_COLUMN,
    ]
    .iter()
    .map(|c| c.to_string())
    .collect();
    columns.extend(specs.iter().map(|s| s.name.clone()));
    columns
}

/// A company row that could not be turned into a record. The rest of the
/// table still loads.
#[derive(Debug, Clone)]
pub struct RejectedRow {
    /// Line in the file, header included.
    pub line: usize,
    pub company: String,
    pub error: EsgPeerError,
}

/// Result of reading a company table: usable records plus the rows that
/// failed on their own.
#[derive(Debug, Clone, Default)]
pub struct CompanyTable {
    pub records: Vec<CompanyRecord>,
    pub rejected: Vec<RejectedRow>,
}

/// Read a company table. A missing required column aborts the whole load.
/// A blank or unparseable size cell rejects only that row. An empty metric
/// cell is kept as empty text and skipped when scored.
pub fn read_company_records<R: Read>(
    reader: R,
    specs: &[MetricSpec],
) -> EsgPeerResult<CompanyTable> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let headers = rdr.headers()?.clone();
    let index_of = |name: &str| headers.iter().position(|h| h == name);

    let missing: Vec<String> = required_columns(specs)
        .into_iter()
        .filter(|c| index_of(c).is_none())
        .collect();
    if !missing.is_empty() {
        return Err(EsgPeerError::Configuration { fields: missing });
    }

    // Every position exists after the required-column check.
    let col = |name: &str| index_of(name).unwrap_or_default();
    let columns = ColumnIndex {
        company: col(COMPANY_COLUMN),
        industry: col(INDUSTRY_COLUMN),
        employees: col(EMPLOYEES_COLUMN),
        revenue: col(REVENUE_COLUMN),
        metrics: specs.iter().map(|s| (s.name.clone(), col(&s.name))).collect(),
    };

    let mut table = CompanyTable::default();
    for (row_no, row) in rdr.records().enumerate() {
        let row = row?;
        let line = row_no + 2;
        match parse_row(&row, &columns, line) {
            Ok(record) => table.records.push(record),
            Err(error) => table.rejected.push(RejectedRow {
                line,
                company: row.get(columns.company).unwrap_or("").trim().to_string(),
                error,
            }),
        }
    }

    Ok(table)
}

struct ColumnIndex {
    company: usize,
    industry: usize,
    employees: usize,
    revenue: usize,
    metrics: Vec<(String, usize)>,
}

fn is_blank(raw: &str) -> bool {
    raw.is_empty() || raw.eq_ignore_ascii_case("nan")
}

fn parse_row(
    row: &csv::StringRecord,
    columns: &ColumnIndex,
    line: usize,
) -> EsgPeerResult<CompanyRecord> {
    let cell = |idx: usize| row.get(idx).unwrap_or("").trim();

    let blank_size_fields: Vec<String> = [
        (EMPLOYEES_COLUMN, columns.employees),
        (REVENUE_COLUMN, columns.revenue),
    ]
    .iter()
    .filter(|(_, idx)| is_blank(cell(*idx)))
    .map(|(name, _)| name.to_string())
    .collect();
    if !blank_size_fields.is_empty() {
        return Err(EsgPeerError::Configuration {
            fields: blank_size_fields,
        });
    }

    let employees =
        parse_employees(cell(columns.employees)).ok_or_else(|| EsgPeerError::InvalidInput {
            field: EMPLOYEES_COLUMN.into(),
            reason: format!(
                "Row {line}: '{}' is not a headcount.",
                cell(columns.employees)
            ),
        })?;
    let revenue = parse_money(cell(columns.revenue)).ok_or_else(|| EsgPeerError::InvalidInput {
        field: REVENUE_COLUMN.into(),
        reason: format!(
            "Row {line}: '{}' is not a revenue figure.",
            cell(columns.revenue)
        ),
    })?;

    let metrics = columns
        .metrics
        .iter()
        .map(|(name, idx)| {
            let raw = cell(*idx);
            let value = if is_blank(raw) {
                MetricValue::Text(String::new())
            } else {
                MetricValue::parse(raw)
            };
            (name.clone(), value)
        })
        .collect();

    Ok(CompanyRecord {
        company: cell(columns.company).to_string(),
        industry: cell(columns.industry).to_string(),
        revenue,
        employees,
        metrics,
        size_tier: None,
        derived: BTreeMap::new(),
    })
}

fn parse_employees(raw: &str) -> Option<u64> {
    if let Ok(n) = raw.parse::<u64>() {
        return Some(n);
    }
    // Spreadsheet exports often write headcounts as "1200.0".
    let d = parse_money(raw)?;
    if d < Decimal::ZERO || d.fract() != Decimal::ZERO {
        return None;
    }
    d.to_u64()
}

fn parse_money(raw: &str) -> Option<Money> {
    let cleaned = raw.replace(',', "");
    Decimal::from_str(&cleaned)
        .or_else(|_| Decimal::from_scientific(&cleaned))
        .ok()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::metric_spec::default_metric_specs;
    use rust_decimal_macros::dec;

    const HEADER: &str = "Company,Industry,Number of employees,GHG Emissions (tCO₂e),Renewable Energy %,Water usage (m³),Waste Recycled %,Biodiversity Risk %,Gender Pay Gap %,Board Diversity %,ESG KPI's in Exec Pay,Transition Plan,Revenue";

    #[test]
    fn test_metric_value_parse() {
        assert_eq!(MetricValue::parse(" 42.5 "), MetricValue::Number(42.5));
        assert_eq!(MetricValue::parse("Yes"), MetricValue::Text("Yes".into()));
        assert_eq!(MetricValue::Text(" 7 ".into()).as_f64(), Some(7.0));
        assert_eq!(MetricValue::Text("SBTi 2030".into()).as_f64(), None);
        assert_eq!(MetricValue::Number(f64::NAN).as_f64(), None);
    }

    #[test]
    fn test_read_company_records() {
        let csv = format!(
            "{HEADER}\nAcme,Technology,5000,3600,40,12000,55,10,8,35,Yes,SBTi 2030,2000000000\n\
             Minnow,Retail,\"1,200.0\",500,20,,30,5,12,25,no,Carbon Neutral,1e8\n"
        );
        let table = read_company_records(csv.as_bytes(), &default_metric_specs()).unwrap();
        let records = &table.records;
        assert_eq!(records.len(), 2);
        assert!(table.rejected.is_empty());

        let acme = &records[0];
        assert_eq!(acme.company, "Acme");
        assert_eq!(acme.employees, 5000);
        assert_eq!(acme.revenue, dec!(2_000_000_000));
        assert_eq!(
            acme.metric("GHG Emissions (tCO₂e)"),
            Some(&MetricValue::Number(3600.0))
        );
        assert_eq!(
            acme.metric("Transition Plan"),
            Some(&MetricValue::Text("SBTi 2030".into()))
        );

        let minnow = &records[1];
        assert_eq!(minnow.employees, 1200);
        assert_eq!(minnow.revenue, dec!(100_000_000));
        assert_eq!(
            minnow.metric("Water usage (m³)"),
            Some(&MetricValue::Text(String::new()))
        );
    }

    #[test]
    fn test_missing_column_is_configuration_error() {
        let csv = "Company,Industry,Revenue\nAcme,Technology,10\n";
        let err = read_company_records(csv.as_bytes(), &default_metric_specs()).unwrap_err();
        match err {
            EsgPeerError::Configuration { fields } => {
                assert!(fields.contains(&EMPLOYEES_COLUMN.to_string()));
                assert!(fields.contains(&"Transition Plan".to_string()));
                assert!(!fields.contains(&"Revenue".to_string()));
            }
            other => panic!("expected configuration error, got {other:?}"),
        }
    }

    #[test]
    fn test_bad_headcount_rejects_only_that_row() {
        let csv = format!(
            "{HEADER}\nAcme,Technology,many,1,1,1,1,1,1,1,Yes,None,10\n\
             Minnow,Retail,12,1,1,1,1,1,1,1,Yes,None,10\n"
        );
        let table = read_company_records(csv.as_bytes(), &default_metric_specs()).unwrap();
        assert_eq!(table.records.len(), 1);
        assert_eq!(table.records[0].company, "Minnow");
        assert_eq!(table.rejected.len(), 1);
        assert_eq!(table.rejected[0].company, "Acme");
        assert!(matches!(
            table.rejected[0].error,
            EsgPeerError::InvalidInput { .. }
        ));
    }

    #[test]
    fn test_blank_size_cells_reject_row_as_configuration() {
        let csv = format!(
            "{HEADER}\nAcme,Technology,5000,3600,40,12000,55,10,8,35,Yes,SBTi 2030,\n\
             Minnow,Retail,nan,500,20,,30,5,12,25,no,Carbon Neutral,nan\n\
             Globex,Energy,200,500,20,1,30,5,12,25,no,None,1e6\n"
        );
        let table = read_company_records(csv.as_bytes(), &default_metric_specs()).unwrap();
        assert_eq!(table.records.len(), 1);
        assert_eq!(table.records[0].company, "Globex");

        let acme = &table.rejected[0];
        assert_eq!(acme.line, 2);
        match &acme.error {
            EsgPeerError::Configuration { fields } => {
                assert_eq!(fields, &vec![REVENUE_COLUMN.to_string()]);
            }
            other => panic!("expected configuration error, got {other:?}"),
        }

        let minnow = &table.rejected[1];
        assert_eq!(minnow.line, 3);
        match &minnow.error {
            EsgPeerError::Configuration { fields } => {
                assert_eq!(
                    fields,
                    &vec![EMPLOYEES_COLUMN.to_string(), REVENUE_COLUMN.to_string()]
                );
            }
            other => panic!("expected configuration error, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_fields_on_record() {
        let record = CompanyRecord {
            company: "Acme".into(),
            industry: String::new(),
            revenue: dec!(1),
            employees: 1,
            metrics: BTreeMap::new(),
            size_tier: None,
            derived: BTreeMap::new(),
        };
        let specs = default_metric_specs();
        let missing = record.missing_fields(&specs);
        assert_eq!(missing.len(), specs.len() + 1);
        assert!(record.ensure_complete(&specs).is_err());
    }
}
