//! Real training tables read from CSV exports. Each loader returns `None`
//! when its files are absent or do not carry the serving layout, and the
//! caller falls back to the synthetic generator.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::Context;
use csv::{ReaderBuilder, StringRecord, Trim};
use tracing::{debug, info, warn};

use crate::ml::ModelKind;

use super::Dataset;

/// UCI exports mark missing readings with this value.
const MISSING_SENTINEL: f64 = -200.0;

const AIR_QUALITY_FILES: [&str; 1] = ["air_quality/AirQuality.csv"];
const TRAFFIC_FILES: [&str; 2] = ["traffic/Traffic.csv", "traffic/TrafficTwoMonth.csv"];
const ENERGY_FILES: [&str; 3] = [
    "energy/KwhConsumptionBlower78_1.csv",
    "energy/KwhConsumptionBlower78_2.csv",
    "energy/KwhConsumptionBlower78_3.csv",
];

/// CSV headers of the air-quality station, in serving order.
const AIR_SENSOR_COLUMNS: [&str; 12] = [
    "PT08.S1(CO)",
    "NMHC(GT)",
    "C6H6(GT)",
    "PT08.S2(NMHC)",
    "NOx(GT)",
    "PT08.S3(NOx)",
    "NO2(GT)",
    "PT08.S4(NO2)",
    "PT08.S5(O3)",
    "T",
    "RH",
    "AH",
];
const AIR_SENSOR_TARGET: &str = "CO(GT)";

const TRAFFIC_COLUMNS: [&str; 5] = ["CarCount", "BikeCount", "BusCount", "TruckCount", "Total"];

/// Rows and the files they came from.
#[derive(Debug)]
pub struct Loaded {
    pub data: Dataset,
    pub files: Vec<PathBuf>,
}

/// Files `kind` is trained from, relative to the datasets directory. Empty
/// for kinds that only have a synthetic source.
pub fn sources(kind: ModelKind) -> &'static [&'static str] {
    match kind {
        ModelKind::AirSensor => &AIR_QUALITY_FILES,
        ModelKind::TrafficFlow => &TRAFFIC_FILES,
        ModelKind::EnergyLoad => &ENERGY_FILES,
        ModelKind::Traffic | ModelKind::AirQuality | ModelKind::Energy => &[],
    }
}

pub fn load(kind: ModelKind, data_dir: &Path) -> anyhow::Result<Option<Loaded>> {
    let files: Vec<PathBuf> = sources(kind)
        .iter()
        .map(|f| data_dir.join(f))
        .filter(|p| p.exists())
        .collect();
    if files.is_empty() {
        debug!(model = %kind.as_str(), dir = %data_dir.display(), "no dataset files");
        return Ok(None);
    }

    let mut tables = Vec::with_capacity(files.len());
    for path in &files {
        tables.push(Table::read(path)?);
    }
    let data = match kind {
        ModelKind::AirSensor => air_sensor(&tables),
        ModelKind::TrafficFlow => traffic_flow(&tables),
        ModelKind::EnergyLoad => energy_load(&tables),
        _ => None,
    };
    let Some(data) = data else {
        warn!(model = %kind.as_str(), "dataset does not match the serving layout");
        return Ok(None);
    };
    info!(model = %kind.as_str(), rows = data.rows.len(), files = files.len(), "dataset loaded");
    Ok(Some(Loaded { data, files }))
}

/// Header plus raw records of one CSV file.
struct Table {
    headers: StringRecord,
    records: Vec<StringRecord>,
    decimal_comma: bool,
}

impl Table {
    fn read(path: &Path) -> anyhow::Result<Self> {
        let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
        let mut first_line = String::new();
        BufReader::new(&file)
            .read_line(&mut first_line)
            .with_context(|| format!("read {}", path.display()))?;
        // Semicolon exports use a decimal comma.
        let decimal_comma = first_line.contains(';');
        let delimiter = if decimal_comma { b';' } else { b',' };

        let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
        let mut rdr = ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(file);
        let headers = rdr.headers()?.clone();
        let mut records = Vec::new();
        for result in rdr.records() {
            records.push(result.with_context(|| format!("parse {}", path.display()))?);
        }
        Ok(Self {
            headers,
            records,
            decimal_comma,
        })
    }

    fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h.eq_ignore_ascii_case(name))
    }

    fn columns(&self, names: &[&str]) -> Option<Vec<usize>> {
        names.iter().map(|n| self.column(n)).collect()
    }

    fn parse(&self, raw: &str) -> Option<f64> {
        if self.decimal_comma {
            raw.replace(',', ".").parse().ok()
        } else {
            raw.parse().ok()
        }
    }

    fn value(&self, record: &StringRecord, idx: usize) -> Option<f64> {
        let v = self.parse(record.get(idx)?)?;
        (v.is_finite() && v != MISSING_SENTINEL).then_some(v)
    }

    /// Values at `idx` for every record where all of them parse; rows with
    /// a gap are dropped.
    fn complete_rows(&self, idx: &[usize]) -> impl Iterator<Item = Vec<f64>> + '_ {
        let idx = idx.to_vec();
        self.records
            .iter()
            .filter_map(move |r| idx.iter().map(|i| self.value(r, *i)).collect::<Option<Vec<f64>>>())
    }

    /// Columns where every non-empty cell parses as a number.
    fn numeric_columns(&self) -> Vec<usize> {
        (0..self.headers.len())
            .filter(|i| !self.headers[*i].is_empty())
            .filter(|i| {
                let mut cells = self
                    .records
                    .iter()
                    .filter_map(|r| r.get(*i))
                    .filter(|c| !c.is_empty())
                    .peekable();
                cells.peek().is_some() && cells.all(|c| self.parse(c).is_some())
            })
            .collect()
    }
}

fn names(kind: ModelKind) -> Vec<String> {
    kind.feature_names().iter().map(|s| s.to_string()).collect()
}

/// Twelve station readings; target CO(GT).
fn air_sensor(tables: &[Table]) -> Option<Dataset> {
    let mut rows = Vec::new();
    let mut targets = Vec::new();
    for table in tables {
        let mut idx = table.columns(&AIR_SENSOR_COLUMNS)?;
        idx.push(table.column(AIR_SENSOR_TARGET)?);
        for mut row in table.complete_rows(&idx) {
            targets.push(row.pop()?);
            rows.push(row);
        }
    }
    Some(Dataset::new(names(ModelKind::AirSensor), rows, targets))
}

/// Vehicle counts; target is the traffic level from four equal-width bins
/// over the total.
fn traffic_flow(tables: &[Table]) -> Option<Dataset> {
    let mut rows = Vec::new();
    for table in tables {
        let idx = table.columns(&TRAFFIC_COLUMNS)?;
        rows.extend(table.complete_rows(&idx));
    }
    let totals: Vec<f64> = rows.iter().map(|r| r[4]).collect();
    let targets = super::datasets::equal_width_bins(&totals, 4);
    Some(Dataset::new(names(ModelKind::TrafficFlow), rows, targets))
}

/// Numeric columns; the last one is the target, the rest must line up with
/// the serving features.
fn energy_load(tables: &[Table]) -> Option<Dataset> {
    let n_features = ModelKind::EnergyLoad.n_features();
    let mut rows = Vec::new();
    let mut targets = Vec::new();
    for table in tables {
        let idx = table.numeric_columns();
        if idx.len() != n_features + 1 {
            debug!(numeric = idx.len(), expected = n_features + 1, "energy table layout");
            return None;
        }
        for mut row in table.complete_rows(&idx) {
            targets.push(row.pop()?);
            rows.push(row);
        }
    }
    Some(Dataset::new(names(ModelKind::EnergyLoad), rows, targets))
}
