//! Scrape result types and the spreadsheet cell model

use serde::Serialize;

/// A page to scrape, keyed by the operator's display name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorTarget {
    pub name: String,
    pub url: String,
}

impl OperatorTarget {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// Qualitative complaint bucket shown on an operator page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ComplaintLevel {
    #[default]
    Unknown,
    Low,
    Moderate,
    High,
}

impl ComplaintLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComplaintLevel::Unknown => "Unknown",
            ComplaintLevel::Low => "Low",
            ComplaintLevel::Moderate => "Moderate",
            ComplaintLevel::High => "High",
        }
    }
}

/// Region list for one operator, or the reason the page could not be read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegionBreakdown {
    Regions(Vec<String>),
    Failed(String),
}

impl RegionBreakdown {
    /// Text written to the sheet: one region per line, or `Error: ...`
    pub fn to_cell_text(&self) -> String {
        match self {
            RegionBreakdown::Regions(regions) => regions.join("\n"),
            RegionBreakdown::Failed(message) => format!("Error: {}", message),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, RegionBreakdown::Failed(_))
    }
}

/// Fields read from a single operator page
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PageStats {
    pub hourly_complaints: u32,
    pub daily_complaints: u32,
    pub complaint_level: ComplaintLevel,
    pub regions: Vec<String>,
}

/// Everything recorded for one operator in one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeResult {
    pub operator: String,
    pub hourly_complaints: u32,
    pub daily_complaints: u32,
    pub complaint_level: ComplaintLevel,
    pub regions: RegionBreakdown,
}

impl ScrapeResult {
    pub fn from_stats(operator: &str, stats: PageStats) -> Self {
        Self {
            operator: operator.to_string(),
            hourly_complaints: stats.hourly_complaints,
            daily_complaints: stats.daily_complaints,
            complaint_level: stats.complaint_level,
            regions: RegionBreakdown::Regions(stats.regions),
        }
    }

    /// Zero counts, unknown level, and the error message in place of regions
    pub fn failed(operator: &str, message: impl Into<String>) -> Self {
        Self {
            operator: operator.to_string(),
            hourly_complaints: 0,
            daily_complaints: 0,
            complaint_level: ComplaintLevel::Unknown,
            regions: RegionBreakdown::Failed(message.into()),
        }
    }

    /// The four sheet rows for this operator, in sheet order
    pub fn metrics(&self) -> Vec<(String, Cell)> {
        MetricKind::ALL
            .iter()
            .map(|kind| {
                let value = match kind {
                    MetricKind::DailyComplaints => Cell::Number(self.daily_complaints as i64),
                    MetricKind::HourlyComplaints => Cell::Number(self.hourly_complaints as i64),
                    MetricKind::Regions => Cell::Text(self.regions.to_cell_text()),
                    MetricKind::ComplaintLevel => {
                        Cell::Text(self.complaint_level.as_str().to_string())
                    }
                };
                (kind.row_label(&self.operator), value)
            })
            .collect()
    }
}

/// Row kinds written per operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    DailyComplaints,
    HourlyComplaints,
    Regions,
    ComplaintLevel,
}

impl MetricKind {
    pub const ALL: [MetricKind; 4] = [
        MetricKind::DailyComplaints,
        MetricKind::HourlyComplaints,
        MetricKind::Regions,
        MetricKind::ComplaintLevel,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::DailyComplaints => "Daily complaints",
            MetricKind::HourlyComplaints => "Hourly complaints",
            MetricKind::Regions => "Regions",
            MetricKind::ComplaintLevel => "Complaint level",
        }
    }

    /// Stable row key, e.g. "MTS - Daily complaints"
    pub fn row_label(&self, operator: &str) -> String {
        format!("{} - {}", operator, self.as_str())
    }
}

/// Flatten results into the ordered label/value list the merger consumes
pub fn collect_metrics(results: &[ScrapeResult]) -> Vec<(String, Cell)> {
    results.iter().flat_map(|r| r.metrics()).collect()
}

/// A spreadsheet cell value
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Number(i64),
    Text(String),
}

impl Cell {
    pub fn empty() -> Self {
        Cell::Text(String::new())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            Cell::Number(_) => None,
        }
    }

    /// Convert a value returned by the Sheets API
    pub fn from_json(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::String(s) => Cell::Text(s),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Cell::Number(i),
                None => Cell::Text(n.to_string()),
            },
            serde_json::Value::Null => Cell::empty(),
            other => Cell::Text(other.to_string()),
        }
    }
}

impl std::fmt::Display for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Cell::Number(n) => write!(f, "{}", n),
            Cell::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_order_and_labels() {
        let result = ScrapeResult::from_stats(
            "A",
            PageStats {
                hourly_complaints: 3,
                daily_complaints: 12,
                complaint_level: ComplaintLevel::Moderate,
                regions: vec!["X 10%".to_string()],
            },
        );
        let metrics = result.metrics();
        assert_eq!(
            metrics,
            vec![
                ("A - Daily complaints".to_string(), Cell::Number(12)),
                ("A - Hourly complaints".to_string(), Cell::Number(3)),
                ("A - Regions".to_string(), Cell::from("X 10%")),
                ("A - Complaint level".to_string(), Cell::from("Moderate")),
            ]
        );
    }

    #[test]
    fn test_failed_result_fields() {
        let result = ScrapeResult::failed("MTS", "navigation to https://x failed: dns");
        assert_eq!(result.hourly_complaints, 0);
        assert_eq!(result.daily_complaints, 0);
        assert_eq!(result.complaint_level, ComplaintLevel::Unknown);
        assert!(result.regions.is_failed());
        assert_eq!(
            result.regions.to_cell_text(),
            "Error: navigation to https://x failed: dns"
        );
    }

    #[test]
    fn test_regions_join_with_newlines() {
        let regions = RegionBreakdown::Regions(vec!["Moscow 40%".into(), "Kazan 5%".into()]);
        assert_eq!(regions.to_cell_text(), "Moscow 40%\nKazan 5%");
        assert_eq!(RegionBreakdown::Regions(vec![]).to_cell_text(), "");
    }

    #[test]
    fn test_cell_from_json() {
        assert_eq!(Cell::from_json(serde_json::json!("abc")), Cell::from("abc"));
        assert_eq!(Cell::from_json(serde_json::json!(7)), Cell::Number(7));
        assert_eq!(Cell::from_json(serde_json::json!(1.5)), Cell::from("1.5"));
        assert_eq!(Cell::from_json(serde_json::json!(true)), Cell::from("true"));
    }

    #[test]
    fn test_cell_serializes_untagged() {
        let row = vec![Cell::from("A - Daily complaints"), Cell::Number(12)];
        assert_eq!(
            serde_json::to_string(&row).unwrap(),
            r#"["A - Daily complaints",12]"#
        );
    }
}
