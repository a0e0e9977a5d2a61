//! Append-only table files.
//!
//! File layout: the 8-byte magic `COLSTBL1` followed by rows. Each row is
//! a varint key length, the key bytes, a varint value length and the value
//! bytes. A row's offset is the absolute file offset of its first byte.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, SeekFrom, Write};
use std::path::{Path, PathBuf};

use ahash::AHashMap;
use log::debug;
use memmap2::Mmap;

use crate::error::{ColstoreError, Result};
use crate::storage::{OpenMode, StorageConfig, Table, TableRow};
use crate::util::varint::{decode_u64, encode_u64_into};

const MAGIC: &[u8; 8] = b"COLSTBL1";

/// Offset of the first row in every table file.
pub const DATA_START: u64 = MAGIC.len() as u64;

/// Synced table contents visible to readers.
#[derive(Debug)]
enum TableData {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

impl TableData {
    fn as_slice(&self) -> &[u8] {
        match self {
            TableData::Mapped(mmap) => &mmap[..],
            TableData::Owned(bytes) => bytes.as_slice(),
        }
    }
}

/// A table stored in a single append-only file.
#[derive(Debug)]
pub struct WriteOnceTable {
    path: PathBuf,
    config: StorageConfig,
    data: TableData,
    writer: Option<BufWriter<File>>,
    write_position: u64,
    cursor: u64,
    /// Key to first-row offset, built on the first key seek.
    key_index: Option<AHashMap<String, u64>>,
    closed: bool,
}

impl WriteOnceTable {
    /// Open or create the table at `path`.
    pub fn open(path: &Path, mode: OpenMode, config: &StorageConfig) -> Result<Self> {
        let (data, writer) = match mode {
            OpenMode::ReadOnly => {
                let data = load_data(path, config)?;
                check_magic(path, data.as_slice())?;
                (data, None)
            }
            OpenMode::Truncate => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    fs::create_dir_all(parent)?;
                }
                let file = OpenOptions::new()
                    .write(true)
                    .create(true)
                    .truncate(true)
                    .open(path)?;
                let mut writer = BufWriter::with_capacity(config.buffer_size, file);
                writer.write_all(MAGIC)?;
                (TableData::Owned(MAGIC.to_vec()), Some(writer))
            }
        };

        debug!("Opened table {} ({mode:?})", path.display());

        Ok(WriteOnceTable {
            path: path.to_path_buf(),
            config: config.clone(),
            data,
            writer,
            write_position: DATA_START,
            cursor: DATA_START,
            key_index: None,
            closed: false,
        })
    }

    fn check_closed(&self) -> Result<()> {
        if self.closed {
            Err(ColstoreError::storage(format!(
                "Table {} is closed",
                self.path.display()
            )))
        } else {
            Ok(())
        }
    }

    /// Parse the row starting at `offset`, returning it and the offset of the
    /// next row.
    fn row_at(&self, offset: u64) -> Result<(TableRow, u64)> {
        let data = self.data.as_slice();
        let malformed = || {
            ColstoreError::storage(format!(
                "Malformed row at offset {offset} in {}",
                self.path.display()
            ))
        };

        let mut pos = usize::try_from(offset).map_err(|_| malformed())?;

        let (key_len, used) = decode_u64(data.get(pos..).ok_or_else(malformed)?)
            .map_err(|_| malformed())?;
        pos += used;
        let key_end = pos
            .checked_add(usize::try_from(key_len).map_err(|_| malformed())?)
            .ok_or_else(malformed)?;
        let key = std::str::from_utf8(data.get(pos..key_end).ok_or_else(malformed)?)
            .map_err(|_| malformed())?
            .to_string();
        pos = key_end;

        let (value_len, used) = decode_u64(data.get(pos..).ok_or_else(malformed)?)
            .map_err(|_| malformed())?;
        pos += used;
        let value_end = pos
            .checked_add(usize::try_from(value_len).map_err(|_| malformed())?)
            .ok_or_else(malformed)?;
        let value = data.get(pos..value_end).ok_or_else(malformed)?.to_vec();

        Ok((TableRow { offset, key, value }, value_end as u64))
    }

    fn build_key_index(&self) -> Result<AHashMap<String, u64>> {
        let end = self.data.as_slice().len() as u64;
        let mut index = AHashMap::new();
        let mut offset = DATA_START;

        while offset < end {
            let (row, next) = self.row_at(offset)?;
            index.entry(row.key).or_insert(offset);
            offset = next;
        }

        Ok(index)
    }
}

impl Table for WriteOnceTable {
    fn path(&self) -> &Path {
        &self.path
    }

    fn seek_to_key(&mut self, key: &str) -> Result<bool> {
        self.check_closed()?;

        if self.key_index.is_none() {
            self.key_index = Some(self.build_key_index()?);
        }

        match self.key_index.as_ref().and_then(|index| index.get(key)) {
            Some(&offset) => {
                self.cursor = offset;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn read_row(&mut self) -> Result<Option<TableRow>> {
        self.check_closed()?;

        if self.cursor >= self.data.as_slice().len() as u64 {
            return Ok(None);
        }

        let (row, next) = self.row_at(self.cursor)?;
        self.cursor = next;
        Ok(Some(row))
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        self.check_closed()?;

        let end = self.data.as_slice().len() as u64;
        let target = match pos {
            SeekFrom::Start(n) => Some(n),
            SeekFrom::Current(delta) => self.cursor.checked_add_signed(delta),
            SeekFrom::End(delta) => end.checked_add_signed(delta),
        };

        match target {
            Some(target) if (DATA_START..=end).contains(&target) => {
                self.cursor = target;
                Ok(target)
            }
            _ => Err(ColstoreError::storage(format!(
                "Seek to {pos:?} is outside the data of {}",
                self.path.display()
            ))),
        }
    }

    fn insert_row(&mut self, key: &str, columns: &[&[u8]]) -> Result<u64> {
        self.check_closed()?;

        let writer = self.writer.as_mut().ok_or_else(|| {
            ColstoreError::storage(format!(
                "Table {} is opened read-only",
                self.path.display()
            ))
        })?;

        let value_len: usize = columns.iter().map(|column| column.len()).sum();
        let mut header = Vec::with_capacity(key.len() + 20);
        encode_u64_into(key.len() as u64, &mut header);
        header.extend_from_slice(key.as_bytes());
        encode_u64_into(value_len as u64, &mut header);

        writer.write_all(&header)?;
        for column in columns {
            writer.write_all(column)?;
        }

        let offset = self.write_position;
        self.write_position += (header.len() + value_len) as u64;
        Ok(offset)
    }

    fn sync(&mut self) -> Result<()> {
        self.check_closed()?;

        if let Some(writer) = self.writer.as_mut() {
            writer.flush()?;
            writer.get_ref().sync_all()?;

            self.data = load_data(&self.path, &self.config)?;
            self.key_index = None;
        }

        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }

        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }

        self.closed = true;
        Ok(())
    }
}

fn load_data(path: &Path, config: &StorageConfig) -> Result<TableData> {
    if config.use_mmap {
        let file = File::open(path)?;
        // SAFETY: table files are append-only and the schema never truncates
        // a file while it holds a read handle on it.
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(TableData::Mapped(mmap))
    } else {
        Ok(TableData::Owned(fs::read(path)?))
    }
}

fn check_magic(path: &Path, data: &[u8]) -> Result<()> {
    if data.len() < MAGIC.len() || &data[..MAGIC.len()] != MAGIC {
        return Err(ColstoreError::storage(format!(
            "{} is not a write-once table",
            path.display()
        )));
    }
    Ok(())
}
