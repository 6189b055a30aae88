//! CSV loading of weight schedules, price panels and benchmarks.
//!
//! All three files are long format with a header row:
//! - weights: `date,instrument,weight`
//! - prices: `date,instrument,open,close[,tradable][,delisted]`
//! - benchmark: `date,close`
//!
//! Empty price cells are missing data. `tradable` defaults to true and
//! `delisted` to false when the column is absent.

use chrono::NaiveDate;
use rebalance_core::{
    DataError, HoldingError, HoldingKind, HoldingMatrix, MarketData, MarketDataBuilder,
    Observation,
};
use serde::Deserialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::config::DataConfig;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to open {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed CSV in {source_name}: {source}")]
    Csv {
        source_name: String,
        #[source]
        source: csv::Error,
    },

    #[error("{0} has no data rows")]
    Empty(String),

    #[error("weights error: {0}")]
    Holding(#[from] HoldingError),

    #[error("data error: {0}")]
    Data(#[from] DataError),
}

#[derive(Debug, Deserialize)]
struct WeightRow {
    date: NaiveDate,
    instrument: String,
    weight: f64,
}

fn listed() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct PriceRow {
    date: NaiveDate,
    instrument: String,
    open: Option<f64>,
    close: Option<f64>,
    #[serde(default = "listed")]
    tradable: bool,
    #[serde(default)]
    delisted: bool,
}

#[derive(Debug, Deserialize)]
struct BenchmarkRow {
    date: NaiveDate,
    close: Option<f64>,
}

/// Weight schedule and market panel of one run.
#[derive(Debug, Clone)]
pub struct LoadedData {
    pub weights: HoldingMatrix,
    pub market: Arc<MarketData>,
}

/// Load every file named in `config`.
pub fn load(config: &DataConfig) -> Result<LoadedData, LoadError> {
    let weights = read_weights(open(&config.weights)?, &display(&config.weights))?;

    let mut builder = MarketDataBuilder::new();
    read_prices_into(&mut builder, open(&config.prices)?, &display(&config.prices))?;
    if let Some(path) = &config.benchmark {
        read_benchmark_into(&mut builder, open(path)?, &display(path))?;
    }
    let market = builder.build()?;

    info!(
        rebalances = weights.len(),
        instruments = weights.universe().len(),
        sessions = market.len(),
        benchmark = market.benchmark().is_some(),
        "loaded data"
    );
    Ok(LoadedData {
        weights,
        market: Arc::new(market),
    })
}

/// Parse a `date,instrument,weight` table into a percentage schedule.
/// The leverage rule is enforced.
pub fn read_weights<R: Read>(reader: R, source_name: &str) -> Result<HoldingMatrix, LoadError> {
    let mut rdr = csv::Reader::from_reader(reader);
    let mut entries = Vec::new();
    for row in rdr.deserialize::<WeightRow>() {
        let row = row.map_err(|source| csv_error(source_name, source))?;
        entries.push((row.date, row.instrument, row.weight));
    }
    if entries.is_empty() {
        return Err(LoadError::Empty(source_name.to_string()));
    }
    Ok(HoldingMatrix::from_entries(HoldingKind::Percentage, entries)?)
}

/// Parse a price table into a market panel without benchmark.
pub fn read_prices<R: Read>(reader: R, source_name: &str) -> Result<MarketData, LoadError> {
    let mut builder = MarketDataBuilder::new();
    read_prices_into(&mut builder, reader, source_name)?;
    Ok(builder.build()?)
}

fn read_prices_into<R: Read>(
    builder: &mut MarketDataBuilder,
    reader: R,
    source_name: &str,
) -> Result<(), LoadError> {
    let mut rdr = csv::Reader::from_reader(reader);
    let mut rows = 0usize;
    for row in rdr.deserialize::<PriceRow>() {
        let row = row.map_err(|source| csv_error(source_name, source))?;
        builder.observe(
            row.date,
            row.instrument,
            Observation {
                open: row.open.unwrap_or(f64::NAN),
                close: row.close.unwrap_or(f64::NAN),
                tradable: row.tradable,
                delisted: row.delisted,
            },
        );
        rows += 1;
    }
    if rows == 0 {
        return Err(LoadError::Empty(source_name.to_string()));
    }
    Ok(())
}

fn read_benchmark_into<R: Read>(
    builder: &mut MarketDataBuilder,
    reader: R,
    source_name: &str,
) -> Result<(), LoadError> {
    let mut rdr = csv::Reader::from_reader(reader);
    for row in rdr.deserialize::<BenchmarkRow>() {
        let row = row.map_err(|source| csv_error(source_name, source))?;
        builder.benchmark_close(row.date, row.close.unwrap_or(f64::NAN));
    }
    Ok(())
}

fn open(path: &Path) -> Result<std::fs::File, LoadError> {
    std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn display(path: &Path) -> String {
    path.display().to_string()
}

fn csv_error(source_name: &str, source: csv::Error) -> LoadError {
    LoadError::Csv {
        source_name: source_name.to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRICES: &str = "\
date,instrument,open,close,tradable,delisted
2024-01-02,AAA,10.0,10.5,true,false
2024-01-02,BBB,20.0,19.5,true,false
2024-01-03,AAA,10.5,11.0,true,false
2024-01-03,BBB,,,false,true
";

    #[test]
    fn weights_parse_into_sorted_schedule() {
        let csv = "date,instrument,weight\n2024-01-03,BBB,1.0\n2024-01-02,AAA,0.6\n2024-01-02,BBB,0.4\n";
        let w = read_weights(csv.as_bytes(), "weights").unwrap();
        assert_eq!(w.len(), 2);
        assert_eq!(w.universe().ids(), &["AAA".to_string(), "BBB".to_string()]);
        assert_eq!(w.row(0), &[0.6, 0.4]);
        assert_eq!(w.row(1), &[0.0, 1.0]);
    }

    #[test]
    fn illegal_leverage_in_file_is_rejected() {
        let csv = "date,instrument,weight\n2024-01-02,AAA,-0.5\n";
        let err = read_weights(csv.as_bytes(), "weights").unwrap_err();
        assert!(matches!(err, LoadError::Holding(HoldingError::IllegalLeverage { .. })));
    }

    #[test]
    fn prices_parse_missing_cells_as_nan() {
        let m = read_prices(PRICES.as_bytes(), "prices").unwrap();
        assert_eq!(m.len(), 2);
        assert_eq!(m.open(0), &[10.0, 20.0]);
        assert!(m.open(1)[1].is_nan());
        assert_eq!(m.delisted(1), &[false, true]);
        assert_eq!(m.tradable(1), &[true, false]);
    }

    #[test]
    fn flag_columns_are_optional() {
        let csv = "date,instrument,open,close\n2024-01-02,AAA,1.0,1.0\n";
        let m = read_prices(csv.as_bytes(), "prices").unwrap();
        assert_eq!(m.tradable(0), &[true]);
        assert_eq!(m.delisted(0), &[false]);
    }

    #[test]
    fn malformed_rows_name_their_source() {
        let csv = "date,instrument,weight\nnot-a-date,AAA,1.0\n";
        let err = read_weights(csv.as_bytes(), "w.csv").unwrap_err();
        assert!(err.to_string().contains("w.csv"));
    }

    #[test]
    fn empty_files_are_errors() {
        let err = read_weights("date,instrument,weight\n".as_bytes(), "w.csv").unwrap_err();
        assert!(matches!(err, LoadError::Empty(_)));
    }
}
