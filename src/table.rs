//! CSV input and enriched CSV output.

use csv::{ReaderBuilder, WriterBuilder};
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use crate::models::AddressRecord;

pub const ADDRESS_COLUMN: &str = "address";
pub const IN_REGION_COLUMN: &str = "in_region";

#[derive(Debug, Error)]
pub enum TableError {
    #[error("failed to open {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("input table has no `address` column")]
    MissingAddressColumn,
}

/// The input table: its header row plus one record per data row.
#[derive(Debug, Clone, PartialEq)]
pub struct AddressTable {
    pub headers: Vec<String>,
    pub records: Vec<AddressRecord>,
}

impl AddressTable {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

pub fn read_addresses(path: &Path) -> Result<AddressTable, TableError> {
    info!("Reading addresses from {}", path.display());
    let file = File::open(path).map_err(|source| TableError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let table = read_addresses_from(file)?;
    info!("Read {} address rows", table.len());
    Ok(table)
}

pub fn read_addresses_from<R: Read>(reader: R) -> Result<AddressTable, TableError> {
    let mut csv_reader = ReaderBuilder::new().has_headers(true).from_reader(reader);

    let headers: Vec<String> = csv_reader.headers()?.iter().map(str::to_string).collect();
    let address_idx = headers
        .iter()
        .position(|h| h.trim() == ADDRESS_COLUMN)
        .ok_or(TableError::MissingAddressColumn)?;

    let mut records = Vec::new();
    for row in csv_reader.records() {
        let row = row?;
        let columns: Vec<String> = row.iter().map(str::to_string).collect();
        let address = columns.get(address_idx).cloned().unwrap_or_default();
        records.push(AddressRecord::new(address, columns));
    }

    Ok(AddressTable { headers, records })
}

/// `<dir>/<stem>_with_regions.csv` next to the input file.
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "addresses".to_string());
    input.with_file_name(format!("{}_with_regions.csv", stem))
}

/// Write original columns, then `region_columns`, then `in_region`.
///
/// Every row gets every region column; nulls are written as empty cells. A
/// derived column whose name already exists in the input overwrites that
/// input column in place, so no header is written twice.
pub fn write_enriched(
    path: &Path,
    headers: &[String],
    region_columns: &[String],
    records: &[AddressRecord],
) -> Result<(), TableError> {
    let file = File::create(path).map_err(|source| TableError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    write_enriched_to(file, headers, region_columns, records)?;
    info!("Wrote {} rows to {}", records.len(), path.display());
    Ok(())
}

pub fn write_enriched_to<W: Write>(
    writer: W,
    headers: &[String],
    region_columns: &[String],
    records: &[AddressRecord],
) -> Result<(), TableError> {
    let mut output_headers: Vec<&str> = headers.iter().map(String::as_str).collect();
    let mut slots = Vec::with_capacity(region_columns.len() + 1);
    for column in region_columns.iter().map(String::as_str).chain([IN_REGION_COLUMN]) {
        match output_headers.iter().position(|h| *h == column) {
            Some(idx) => {
                warn!("Input column {} is overwritten by the region output", column);
                slots.push(idx);
            }
            None => {
                slots.push(output_headers.len());
                output_headers.push(column);
            }
        }
    }

    let mut csv_writer = WriterBuilder::new().from_writer(writer);
    csv_writer.write_record(&output_headers)?;

    for record in records {
        let mut row: Vec<String> = record.columns.clone();
        row.resize(output_headers.len(), String::new());

        let derived = region_columns
            .iter()
            .map(|c| record.region_value(c).to_string())
            .chain([record.matched().to_string()]);
        for (slot, value) in slots.iter().zip(derived) {
            row[*slot] = value;
        }
        csv_writer.write_record(&row)?;
    }

    csv_writer.flush().map_err(csv::Error::from)?;
    Ok(())
}
