//! Serialization of one partition into a gzip-compressed CSV blob.

use std::io::Write;

use flate2::{Compression, GzBuilder};
use serde::Serialize;

use crate::error::Error;
use crate::store::StoredObject;

pub const CONTENT_TYPE: &str = "text/csv";
pub const CONTENT_ENCODING: &str = "gzip";

/// Header row plus one row per record, gzip-compressed with a fixed header
/// (no mtime, no filename) so equal input gives equal bytes.
pub fn encode_csv_gz<T: Serialize>(records: &[T]) -> Result<Vec<u8>, Error> {
    let mut csv = csv::Writer::from_writer(Vec::new());
    for record in records {
        csv.serialize(record)?;
    }
    let body = csv.into_inner().map_err(|e| Error::Io(e.into_error()))?;

    let mut gz = GzBuilder::new().mtime(0).write(Vec::new(), Compression::default());
    gz.write_all(&body)?;
    Ok(gz.finish()?)
}

/// The stored form of one blob.
pub fn archive_object<T: Serialize>(records: &[T]) -> Result<StoredObject, Error> {
    Ok(StoredObject::new(encode_csv_gz(records)?, CONTENT_TYPE).with_encoding(CONTENT_ENCODING))
}
