// src/store/warehouse.rs
use anyhow::{bail, Context, Result};
use arrow::{
    array::{ArrayRef, Date32Array, Decimal128Array, StringArray},
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use chrono::{NaiveDate, Utc};
use glob::glob;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::{
    collections::BTreeMap,
    fs::{self, File},
    io::BufWriter,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};
use tracing::{debug, info};

use super::Warehouse;
use crate::config::StorageConfig;
use crate::extract::ExchangeRateRecord;

pub const RATE_PRECISION: u8 = 18;
pub const RATE_SCALE: i8 = 6;

/// Exclusive bound on the unscaled value a `Decimal128(18, _)` column holds.
const MAX_MANTISSA: i128 = 10i128.pow(RATE_PRECISION as u32);

static FILE_SEQ: AtomicU64 = AtomicU64::new(0);

/// Arrow schema of the rates table.
pub fn schema() -> Schema {
    Schema::new(vec![
        Field::new("start_date", DataType::Date32, false),
        Field::new("end_date", DataType::Date32, false),
        Field::new("iso_code", DataType::Utf8, false),
        Field::new("currency_name", DataType::Utf8, false),
        Field::new(
            "rate",
            DataType::Decimal128(RATE_PRECISION, RATE_SCALE),
            false,
        ),
        Field::new("source_file", DataType::Utf8, false),
    ])
}

fn days_since_epoch(date: NaiveDate) -> i32 {
    date.signed_duration_since(NaiveDate::default()).num_days() as i32
}

/// Unscaled value of `record.rate` at the column's scale. Rates the column
/// cannot hold are an error, never a truncated write.
fn rate_mantissa(record: &ExchangeRateRecord) -> Result<i128> {
    let mut v = record.rate;
    v.rescale(RATE_SCALE as u32);
    let mantissa = v.mantissa();
    if v.scale() != RATE_SCALE as u32 || mantissa.abs() >= MAX_MANTISSA {
        bail!(
            "rate {} from {} does not fit decimal({}, {})",
            record.rate,
            record.source_file,
            RATE_PRECISION,
            RATE_SCALE
        );
    }
    Ok(mantissa)
}

fn to_batch(schema: &Arc<Schema>, records: &[ExchangeRateRecord]) -> Result<RecordBatch> {
    let rates = records
        .iter()
        .map(rate_mantissa)
        .collect::<Result<Vec<_>>>()?;
    let columns: Vec<ArrayRef> = vec![
        Arc::new(Date32Array::from_iter_values(
            records.iter().map(|r| days_since_epoch(r.start_date)),
        )),
        Arc::new(Date32Array::from_iter_values(
            records.iter().map(|r| days_since_epoch(r.end_date)),
        )),
        Arc::new(StringArray::from_iter_values(
            records.iter().map(|r| r.iso_code.as_str()),
        )),
        Arc::new(StringArray::from_iter_values(
            records.iter().map(|r| r.currency_name.as_str()),
        )),
        Arc::new(
            Decimal128Array::from_iter_values(rates)
                .with_precision_and_scale(RATE_PRECISION, RATE_SCALE)
                .context("rate does not fit decimal column")?,
        ),
        Arc::new(StringArray::from_iter_values(
            records.iter().map(|r| r.source_file.as_str()),
        )),
    ];
    RecordBatch::try_new(schema.clone(), columns).context("building rates record batch")
}

/// Hive-partitioned Parquet table at `<root>/<dataset>/<table>/date=YYYYMMDD/`.
/// Each append lands in new files; nothing already written is touched.
pub struct ParquetWarehouse {
    table_dir: PathBuf,
    schema: Arc<Schema>,
}

impl ParquetWarehouse {
    pub fn new(root: impl AsRef<Path>, dataset: &str, table: &str) -> Result<Self> {
        let table_dir = root.as_ref().join(dataset).join(table);
        fs::create_dir_all(&table_dir)
            .with_context(|| format!("could not create `{}`", table_dir.display()))?;
        Ok(Self {
            table_dir,
            schema: Arc::new(schema()),
        })
    }

    pub fn from_config(cfg: &StorageConfig) -> Result<Self> {
        Self::new(&cfg.root, &cfg.dataset, &cfg.table)
    }

    pub fn table_dir(&self) -> &Path {
        &self.table_dir
    }

    fn write_partition(&self, date: NaiveDate, records: &[ExchangeRateRecord]) -> Result<PathBuf> {
        let dir = self
            .table_dir
            .join(format!("date={}", date.format("%Y%m%d")));
        fs::create_dir_all(&dir)?;

        let stem = records
            .first()
            .map(|r| r.source_file.trim_end_matches(".csv").to_string())
            .unwrap_or_default();
        let ts = Utc::now().timestamp_micros();
        let seq = FILE_SEQ.fetch_add(1, Ordering::Relaxed);
        let fname = format!("{}---{}-{}.parquet", stem, ts, seq);
        let tmp = dir.join(format!("{}.tmp", fname));
        let final_path = dir.join(&fname);

        let batch = to_batch(&self.schema, records)?;
        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build();
        let file = File::create(&tmp).with_context(|| format!("creating {:?}", &tmp))?;
        let mut writer =
            ArrowWriter::try_new(BufWriter::new(file), self.schema.clone(), Some(props))?;
        writer.write(&batch).context("writing rates batch")?;
        writer.close().context("closing rates writer")?;
        fs::rename(&tmp, &final_path)?;
        debug!(path = %final_path.display(), rows = records.len(), "wrote partition file");
        Ok(final_path)
    }

    /// Read back every row currently in the table.
    pub fn scan(&self) -> Result<Vec<RecordBatch>> {
        let mut batches = Vec::new();
        let pattern = format!("{}/*/*.parquet", self.table_dir.display());
        for entry in glob(&pattern)? {
            let path = entry?;
            let file =
                File::open(&path).with_context(|| format!("failed to open `{}`", path.display()))?;
            let reader = ParquetRecordBatchReaderBuilder::try_new(file)?
                .with_batch_size(1024)
                .build()?;
            for batch in reader {
                batches.push(batch?);
            }
        }
        Ok(batches)
    }
}

impl Warehouse for ParquetWarehouse {
    fn append(&self, records: &[ExchangeRateRecord]) -> Result<usize> {
        for r in records {
            rate_mantissa(r)?;
        }
        let mut by_date: BTreeMap<NaiveDate, Vec<ExchangeRateRecord>> = BTreeMap::new();
        for r in records {
            by_date.entry(r.start_date).or_default().push(r.clone());
        }
        for (date, rows) in &by_date {
            self.write_partition(*date, rows)?;
        }
        info!(table = %self.table_dir.display(), rows = records.len(), "appended rows");
        Ok(records.len())
    }
}
