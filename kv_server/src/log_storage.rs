//! This module is for _persistent_ storage of key-value pairs.
//!
//! Every atomic batch is appended to the active log file as one record:
//!
//! ```text
//! [payload len: u64 LE][md5(payload): 16 bytes][payload]
//! payload = ([Key][Option<Value>])*     (bincode)
//! ```
//!
//! A `None` value is a tombstone. An in-memory index maps every live key to
//! the position of its value in the log, so reads cost one seek. On startup
//! the logs are replayed to rebuild the index; a record at the end of the
//! newest file that is incomplete or fails its digest was torn by a crash and
//! is cut off, which rolls the store back to the last complete batch. A bad
//! record with committed data behind it is never cut off, opening fails
//! instead.

use crate::storage::{Mutation, Storage};
use anyhow::{anyhow, bail, Context, Result};
use md5::{Digest, Md5};
use shared::key::{Key, KeyRange};
use shared::value::{KeyValue, Value};
use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::fs::File;
use std::io::{prelude::*, BufReader, Cursor, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::{debug, error, trace, warn};

#[derive(Debug, Clone, Copy)]
pub struct LogOptions {
    /// the active file is rotated once it grows beyond this many bytes
    pub max_file_size: u64,
    /// fsync after every batch
    pub sync_writes: bool,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            max_file_size: 64 << 20,
            sync_writes: false,
        }
    }
}

pub struct LogIndexStorage {
    data_dir: PathBuf,
    options: LogOptions,
    disk_log: DiskLog,
    mem_index: MemIndex,
}

impl LogIndexStorage {
    pub fn new<T: Into<PathBuf>>(data_dir: T) -> Result<Self> {
        Self::with_options(data_dir, LogOptions::default())
    }

    pub fn with_options<T: Into<PathBuf>>(data_dir: T, options: LogOptions) -> Result<Self> {
        let data_dir: PathBuf = data_dir.into();
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Creating data directory {}", data_dir.display()))?;
        let mut mem_index = MemIndex::new();
        let disk_log = DiskLog::from_disk(&data_dir, &mut mem_index)?;
        debug!(
            "Opened log storage in {} with {} keys in {} file(s)",
            data_dir.display(),
            mem_index.size(),
            disk_log.files.len()
        );
        Ok(Self {
            data_dir,
            options,
            disk_log,
            mem_index,
        })
    }

    fn read_entry(&self, key: &Key, entry: &MemIndexEntry) -> Result<Value> {
        self.disk_log.get(entry)?.ok_or_else(|| {
            anyhow!(
                "mem_index_entry {:?} for key {} points to a tombstone in disk log",
                entry,
                key
            )
        })
    }
}

impl Storage for LogIndexStorage {
    fn get(&self, key: &Key) -> Result<Option<Value>> {
        match self.mem_index.get(key) {
            Some(entry) => self.read_entry(key, entry).map(Some),
            None => Ok(None),
        }
    }

    fn range(&self, range: &KeyRange, limit: Option<usize>) -> Result<Vec<KeyValue>> {
        self.mem_index
            .range(range, limit)
            .into_iter()
            .map(|(key, entry)| {
                let value = self.read_entry(key, entry)?;
                Ok(KeyValue::new(key.clone(), value))
            })
            .collect()
    }

    fn apply(&mut self, batch: &[Mutation]) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let positions = self.disk_log.append(batch, self.options.sync_writes)?;
        // the record is on disk, only now the index may change
        for (mutation, position) in batch.iter().zip(positions) {
            match (mutation, position) {
                (Mutation::Put(key, _), Some(entry)) => {
                    self.mem_index.put(key.clone(), entry);
                }
                (Mutation::Delete(key), None) => {
                    self.mem_index.delete(key);
                }
                _ => unreachable!("append returns a position exactly for every put"),
            }
        }
        // the batch is committed at this point, a failed rotation must not undo that
        if self.disk_log.active_len() >= self.options.max_file_size {
            if let Err(e) = self.disk_log.rotate(&self.data_dir) {
                warn!("Could not rotate disk log, keeping the active file: {:#}", e);
            }
        }
        Ok(())
    }

    fn size(&self) -> usize {
        self.mem_index.size()
    }
}

// here is an article on the entire idea: https://arpitbhayani.me/blogs/bitcask

const LEN_SIZE: u64 = 8;
const DIGEST_SIZE: u64 = 16;
const HEADER_SIZE: u64 = LEN_SIZE + DIGEST_SIZE;

struct DiskLog {
    files: BTreeMap<FileId, DiskLogFile>,
    /// set when a failed write could not be rolled back, the active file then
    /// ends in a partial record and must not be appended to until a restart
    /// cuts it off
    failed: bool,
}

impl DiskLog {
    fn new<T: Into<PathBuf>>(data_dir: T) -> Result<Self> {
        let mut files = BTreeMap::new();
        files.insert(0, DiskLogFile::new(data_dir, 0)?);
        Ok(Self {
            files,
            failed: false,
        })
    }
    fn from_disk<T: Into<PathBuf>>(data_dir: T, mem_index: &mut MemIndex) -> Result<Self> {
        let data_dir: PathBuf = data_dir.into();
        let paths = std::fs::read_dir(&data_dir)?
            .filter_map(|path| {
                path.ok()
                    .map(|path| path.path())
                    .filter(|path| {
                        path.is_file() && path.extension() == Some(OsStr::new(DiskLogFile::EXT))
                    })
                    .and_then(|path| {
                        path.file_stem()
                            .and_then(|file_stem| file_stem.to_str())
                            .and_then(|file_stem| file_stem.parse::<FileId>().ok())
                            .map(|file_id| (file_id, path))
                    })
            })
            .collect::<BTreeMap<FileId, PathBuf>>();

        if paths.is_empty() {
            trace!("No disk log files found, starting from scratch");
            return Self::new(data_dir);
        }

        let newest = paths.keys().next_back().copied();
        let mut files = BTreeMap::new();
        for (file_id, path) in paths {
            let file = DiskLogFile::open(file_id, path, mem_index, Some(file_id) == newest)?;
            files.insert(file_id, file);
        }
        Ok(Self {
            files,
            failed: false,
        })
    }
    fn active_file(&mut self) -> Result<&mut DiskLogFile> {
        // the newest file is always the one open for appending
        self.files
            .values_mut()
            .next_back()
            .ok_or_else(|| anyhow!("disk log has no active file"))
    }
    fn active_len(&self) -> u64 {
        self.files.values().next_back().map_or(0, |file| file.len)
    }
    fn rotate(&mut self, data_dir: &Path) -> Result<()> {
        let next_id = self.files.keys().next_back().map_or(0, |id| id + 1);
        debug!("Rotating disk log, new active file {}", next_id);
        self.files
            .insert(next_id, DiskLogFile::new(data_dir, next_id)?);
        Ok(())
    }
    fn get(&self, entry: &MemIndexEntry) -> Result<Option<Value>> {
        let MemIndexEntry {
            file_id,
            value_offset,
            value_len,
        } = entry;
        let disk_log_file = self
            .files
            .get(file_id)
            .ok_or_else(|| anyhow!("disk log file {} does not exist", file_id))?;

        let mut file = &disk_log_file.file;
        let mut buf = vec![0u8; *value_len as usize];
        file.seek(SeekFrom::Start(*value_offset))?;
        file.read_exact(&mut buf)?;
        let value: Option<Value> = bincode::deserialize(&buf).with_context(|| {
            format!(
                "Deserializing value from file {} at position {}",
                disk_log_file.path.display(),
                value_offset
            )
        })?;
        Ok(value)
    }
    /// Appends the batch as one record and returns, for every mutation, where
    /// its value now lives (`None` for deletions).
    fn append(
        &mut self,
        batch: &[Mutation],
        sync: bool,
    ) -> Result<Vec<Option<MemIndexEntry>>> {
        if self.failed {
            bail!("Disk log refuses writes after a failed rollback, restart to recover");
        }
        let (payload, slots) = encode_payload(batch)?;
        let disk_log_file = self.active_file()?;
        let file_id = disk_log_file.file_id;
        let record_offset = disk_log_file.len;
        let payload_offset = record_offset + HEADER_SIZE;

        let mut record = Vec::with_capacity(HEADER_SIZE as usize + payload.len());
        record.extend_from_slice(&(payload.len() as u64).to_le_bytes());
        record.extend_from_slice(&Md5::digest(&payload));
        record.extend_from_slice(&payload);

        if let Err(e) = disk_log_file.write_record(&record, sync) {
            // never leave half a record behind for the next append to follow
            if let Err(rollback) = disk_log_file.file.set_len(record_offset) {
                error!(
                    "Could not roll back partial record at {} of {}: {}",
                    record_offset,
                    disk_log_file.path.display(),
                    rollback
                );
                self.failed = true;
            }
            return Err(e);
        }
        disk_log_file.len += record.len() as u64;

        Ok(slots
            .into_iter()
            .map(|slot| {
                slot.map(|(offset, len)| MemIndexEntry {
                    file_id,
                    value_offset: payload_offset + offset,
                    value_len: len,
                })
            })
            .collect())
    }
}

/// Serializes the batch and remembers `(offset, len)` of each put's value
/// relative to the start of the payload.
fn encode_payload(batch: &[Mutation]) -> Result<(Vec<u8>, Vec<Option<(u64, u64)>>)> {
    let mut payload = Vec::new();
    let mut slots = Vec::with_capacity(batch.len());
    for mutation in batch {
        let (key, value) = match mutation {
            Mutation::Put(key, value) => (key, Some(value)),
            Mutation::Delete(key) => (key, None),
        };
        bincode::serialize_into(&mut payload, key)?;
        let value_offset = payload.len() as u64;
        bincode::serialize_into(&mut payload, &value)?;
        let value_len = payload.len() as u64 - value_offset;
        slots.push(value.map(|_| (value_offset, value_len)));
    }
    Ok((payload, slots))
}

struct DiskLogFile {
    file_id: FileId,
    path: PathBuf,
    file: File,
    /// bytes of complete records
    len: u64,
}

impl DiskLogFile {
    const EXT: &'static str = "log";

    fn new<T: Into<PathBuf>>(data_dir: T, file_id: FileId) -> Result<Self> {
        let mut path: PathBuf = data_dir.into();
        path.push(file_id.to_string());
        path.set_extension(Self::EXT);
        let file = std::fs::OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)?;
        let len = file.metadata()?.len();
        Ok(Self {
            file_id,
            path,
            file,
            len,
        })
    }
    fn open(file_id: FileId, path: PathBuf, mem_index: &mut MemIndex, newest: bool) -> Result<Self> {
        trace!("opening disk log file: {:?}", path);
        let file = std::fs::OpenOptions::new()
            .read(true)
            .append(true)
            .open(&path)?;
        let mut file = Self {
            file_id,
            path,
            file,
            len: 0,
        };
        file.populate_mem_index(mem_index, newest)?;
        Ok(file)
    }
    fn write_record(&mut self, record: &[u8], sync: bool) -> Result<()> {
        self.file.write_all(record)?;
        self.file.flush()?;
        if sync {
            self.file.sync_data()?;
        }
        Ok(())
    }
    fn populate_mem_index(&mut self, mem_index: &mut MemIndex, newest: bool) -> Result<()> {
        let file_size = self.file.metadata()?.len();
        let mut reader = BufReader::new(&self.file);
        reader.seek(SeekFrom::Start(0))?;
        let mut offset = 0;
        while offset < file_size {
            match read_record(&mut reader, offset, file_size)? {
                Record::Complete(payload) => {
                    replay_payload(&payload, self.file_id, offset + HEADER_SIZE, mem_index)
                        .with_context(|| {
                            format!(
                                "Replaying record at {} of {}",
                                offset,
                                self.path.display()
                            )
                        })?;
                    offset += HEADER_SIZE + payload.len() as u64;
                }
                // only the last record of the newest file can have been torn by a crash
                Record::Torn | Record::Corrupt { end: _ } if !newest => bail!(
                    "Corrupt record at {} of {}, which is not the newest log file",
                    offset,
                    self.path.display()
                ),
                Record::Corrupt { end } if end < file_size => bail!(
                    "Corrupt record at {} of {} followed by {} more bytes",
                    offset,
                    self.path.display(),
                    file_size - end
                ),
                Record::Torn | Record::Corrupt { .. } => {
                    warn!(
                        "Discarding torn record at {} of {} ({} bytes)",
                        offset,
                        self.path.display(),
                        file_size - offset
                    );
                    drop(reader);
                    self.file.set_len(offset)?;
                    break;
                }
            }
        }
        self.len = offset;
        Ok(())
    }
}

enum Record {
    Complete(Vec<u8>),
    /// the file ends before the record does
    Torn,
    /// the record is all there but fails its digest, `end` is where it stops
    Corrupt { end: u64 },
}

/// Reads the record starting at `offset`.
fn read_record(reader: &mut BufReader<&File>, offset: u64, file_size: u64) -> Result<Record> {
    if offset + HEADER_SIZE > file_size {
        return Ok(Record::Torn);
    }
    let mut header = [0u8; HEADER_SIZE as usize];
    reader.read_exact(&mut header)?;
    let mut len = [0u8; LEN_SIZE as usize];
    len.copy_from_slice(&header[..LEN_SIZE as usize]);
    let payload_len = u64::from_le_bytes(len);
    if payload_len > file_size - offset - HEADER_SIZE {
        return Ok(Record::Torn);
    }
    let mut payload = vec![0u8; payload_len as usize];
    reader.read_exact(&mut payload)?;
    if Md5::digest(&payload).as_slice() != &header[LEN_SIZE as usize..] {
        return Ok(Record::Corrupt {
            end: offset + HEADER_SIZE + payload_len,
        });
    }
    Ok(Record::Complete(payload))
}

fn replay_payload(
    payload: &[u8],
    file_id: FileId,
    payload_offset: u64,
    mem_index: &mut MemIndex,
) -> Result<()> {
    let mut cursor = Cursor::new(payload);
    while cursor.position() < payload.len() as u64 {
        let key: Key = bincode::deserialize_from(&mut cursor)?;
        let value_offset = cursor.position();
        let value: Option<Value> = bincode::deserialize_from(&mut cursor)?;
        let value_len = cursor.position() - value_offset;
        match value {
            Some(_) => {
                mem_index.put(
                    key,
                    MemIndexEntry {
                        file_id,
                        value_offset: payload_offset + value_offset,
                        value_len,
                    },
                );
            }
            None => {
                mem_index.delete(&key);
            }
        }
    }
    Ok(())
}

type FileId = u64;
type ByteSize = u64;
type ByteOffset = u64;

#[derive(Debug, Clone, PartialEq, Eq)]
struct MemIndexEntry {
    file_id: FileId,
    value_offset: ByteOffset,
    value_len: ByteSize,
}

struct MemIndex {
    map: BTreeMap<Key, MemIndexEntry>,
}

impl MemIndex {
    fn new() -> Self {
        Self {
            map: BTreeMap::new(),
        }
    }
    fn get(&self, key: &Key) -> Option<&MemIndexEntry> {
        self.map.get(key)
    }
    fn put(&mut self, key: Key, entry: MemIndexEntry) -> Option<MemIndexEntry> {
        self.map.insert(key, entry)
    }
    fn delete(&mut self, key: &Key) -> Option<MemIndexEntry> {
        self.map.remove(key)
    }
    fn range(&self, range: &KeyRange, limit: Option<usize>) -> Vec<(&Key, &MemIndexEntry)> {
        if range.is_empty() {
            return Vec::new();
        }
        self.map
            .range::<Key, _>(range.bounds())
            .take(limit.unwrap_or(usize::MAX))
            .collect()
    }
    fn size(&self) -> usize {
        self.map.len()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serial_test::serial;

    fn fresh_dir(name: &str) -> Result<PathBuf> {
        let data_dir = PathBuf::from("./data/test").join(name);
        if data_dir.exists() {
            std::fs::remove_dir_all(&data_dir)?;
        }
        std::fs::create_dir_all(&data_dir)?;
        Ok(data_dir)
    }

    fn put(key: &str, value: &str) -> Mutation {
        Mutation::Put(Key::from(key), Value::from(value))
    }

    fn log_file(data_dir: &Path, file_id: FileId) -> PathBuf {
        data_dir.join(format!("{}.{}", file_id, DiskLogFile::EXT))
    }

    #[test]
    #[serial]
    fn simple_put_get_del() -> Result<()> {
        let data_dir = fresh_dir("simple_put_get_del")?;
        let mut storage = LogIndexStorage::new(&data_dir)?;

        let key = Key::from("key");
        assert_eq!(storage.size(), 0);

        storage.apply(&[put("key", "value")])?;
        assert_eq!(storage.size(), 1);
        assert_eq!(storage.get(&key)?, Some(Value::from("value")));

        storage.apply(&[Mutation::Delete(key.clone())])?;
        assert_eq!(
            storage.get(&key)?,
            None,
            "after deletion the value should be None"
        );
        assert_eq!(storage.size(), 0);

        // deleting an absent key is fine
        storage.apply(&[Mutation::Delete(key.clone())])?;
        assert_eq!(storage.size(), 0);

        std::fs::remove_dir_all(&data_dir)?;
        Ok(())
    }

    #[test]
    #[serial]
    fn bulk_insertion() -> Result<()> {
        let data_dir = fresh_dir("bulk_insertion")?;
        let mut storage = LogIndexStorage::new(&data_dir)?;

        const AMOUNT_ENTRIES: i32 = 1000;

        let batch = (0..AMOUNT_ENTRIES)
            .map(|i| put(&format!("key{:0>4}", i), &format!("value{}", i)))
            .collect::<Vec<_>>();
        storage.apply(&batch)?;

        assert_eq!(AMOUNT_ENTRIES as usize, storage.size());
        for mutation in batch.iter() {
            let Mutation::Put(key, value) = mutation else {
                unreachable!()
            };
            assert_eq!(storage.get(key)?.as_ref(), Some(value));
        }

        std::fs::remove_dir_all(&data_dir)?;
        Ok(())
    }

    #[test]
    #[serial]
    fn later_mutations_in_a_batch_win() -> Result<()> {
        let data_dir = fresh_dir("later_mutations_win")?;
        let mut storage = LogIndexStorage::new(&data_dir)?;

        storage.apply(&[
            put("a", "1"),
            put("a", "2"),
            put("b", "1"),
            Mutation::Delete(Key::from("b")),
        ])?;
        assert_eq!(storage.get(&Key::from("a"))?, Some(Value::from("2")));
        assert_eq!(storage.get(&Key::from("b"))?, None);

        drop(storage);
        let storage = LogIndexStorage::new(&data_dir)?;
        assert_eq!(storage.get(&Key::from("a"))?, Some(Value::from("2")));
        assert_eq!(storage.get(&Key::from("b"))?, None);

        std::fs::remove_dir_all(&data_dir)?;
        Ok(())
    }

    #[test]
    #[serial]
    fn range_scan() -> Result<()> {
        let data_dir = fresh_dir("range_scan")?;
        let mut storage = LogIndexStorage::new(&data_dir)?;
        storage.apply(&[put("a", "1"), put("b", "2"), put("c", "3")])?;

        assert_eq!(
            storage.range(&KeyRange::new("b", ""), None)?,
            vec![KeyValue::new("b", "2")]
        );
        assert_eq!(
            storage.range(&KeyRange::new("b", shared::key::UNBOUNDED_END.to_vec()), None)?,
            vec![KeyValue::new("b", "2"), KeyValue::new("c", "3")]
        );
        assert_eq!(storage.range(&KeyRange::all(), Some(1))?.len(), 1);

        std::fs::remove_dir_all(&data_dir)?;
        Ok(())
    }

    #[test]
    #[serial]
    fn recovers_state_after_reopen() -> Result<()> {
        let data_dir = fresh_dir("recovers_state")?;
        {
            let mut storage = LogIndexStorage::new(&data_dir)?;
            storage.apply(&[put("key1", "value1"), put("key2", "value2")])?;
            storage.apply(&[put("key1", "value1'"), Mutation::Delete(Key::from("key2"))])?;
        }
        let storage = LogIndexStorage::new(&data_dir)?;
        assert_eq!(storage.size(), 1);
        assert_eq!(storage.get(&Key::from("key1"))?, Some(Value::from("value1'")));
        assert_eq!(storage.get(&Key::from("key2"))?, None);

        std::fs::remove_dir_all(&data_dir)?;
        Ok(())
    }

    #[test]
    #[serial]
    fn torn_tail_is_discarded() -> Result<()> {
        let data_dir = fresh_dir("torn_tail")?;
        let committed_len = {
            let mut storage = LogIndexStorage::new(&data_dir)?;
            storage.apply(&[put("a", "1")])?;
            storage.apply(&[put("b", "2"), put("c", "3")])?;
            std::fs::metadata(log_file(&data_dir, 0))?.len()
        };

        // a crash in the middle of writing a batch leaves a truncated record
        let mut file = std::fs::OpenOptions::new()
            .append(true)
            .open(log_file(&data_dir, 0))?;
        file.write_all(&100u64.to_le_bytes())?;
        file.write_all(&[0xab; 20])?;
        drop(file);

        let mut storage = LogIndexStorage::new(&data_dir)?;
        assert_eq!(storage.size(), 3);
        assert_eq!(std::fs::metadata(log_file(&data_dir, 0))?.len(), committed_len);

        // appending after recovery must still produce a readable log
        storage.apply(&[put("d", "4")])?;
        drop(storage);
        let storage = LogIndexStorage::new(&data_dir)?;
        assert_eq!(storage.size(), 4);
        assert_eq!(storage.get(&Key::from("d"))?, Some(Value::from("4")));

        std::fs::remove_dir_all(&data_dir)?;
        Ok(())
    }

    #[test]
    #[serial]
    fn corrupt_last_record_rolls_back_whole_batch() -> Result<()> {
        let data_dir = fresh_dir("corrupt_last_record")?;
        {
            let mut storage = LogIndexStorage::new(&data_dir)?;
            storage.apply(&[put("a", "1")])?;
            storage.apply(&[put("a", "2"), put("b", "2")])?;
        }

        let path = log_file(&data_dir, 0);
        let mut bytes = std::fs::read(&path)?;
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        std::fs::write(&path, &bytes)?;

        let storage = LogIndexStorage::new(&data_dir)?;
        assert_eq!(storage.get(&Key::from("a"))?, Some(Value::from("1")));
        assert_eq!(storage.get(&Key::from("b"))?, None);

        std::fs::remove_dir_all(&data_dir)?;
        Ok(())
    }

    #[test]
    #[serial]
    fn corrupt_record_before_committed_ones_fails_to_open() -> Result<()> {
        let data_dir = fresh_dir("corrupt_middle_record")?;
        let path = log_file(&data_dir, 0);
        let first_len = {
            let mut storage = LogIndexStorage::new(&data_dir)?;
            storage.apply(&[put("a", "1")])?;
            let first_len = std::fs::metadata(&path)?.len();
            storage.apply(&[put("b", "2")])?;
            storage.apply(&[put("c", "3")])?;
            first_len
        };

        let mut bytes = std::fs::read(&path)?;
        bytes[first_len as usize - 1] ^= 0xff;
        std::fs::write(&path, &bytes)?;

        assert!(LogIndexStorage::new(&data_dir).is_err());
        // the committed batches behind the bad record are still on disk
        assert_eq!(std::fs::read(&path)?, bytes);

        std::fs::remove_dir_all(&data_dir)?;
        Ok(())
    }

    #[test]
    #[serial]
    fn failed_rollback_refuses_further_writes() -> Result<()> {
        let data_dir = fresh_dir("failed_rollback")?;
        let mut storage = LogIndexStorage::new(&data_dir)?;
        storage.apply(&[put("a", "1")])?;
        let committed_len = std::fs::metadata(log_file(&data_dir, 0))?.len();

        storage.disk_log.failed = true;
        assert!(storage.apply(&[put("b", "2")]).is_err());
        assert_eq!(storage.get(&Key::from("b"))?, None);
        assert_eq!(std::fs::metadata(log_file(&data_dir, 0))?.len(), committed_len);
        // reads keep working
        assert_eq!(storage.get(&Key::from("a"))?, Some(Value::from("1")));

        drop(storage);
        let mut storage = LogIndexStorage::new(&data_dir)?;
        storage.apply(&[put("b", "2")])?;
        assert_eq!(storage.size(), 2);

        std::fs::remove_dir_all(&data_dir)?;
        Ok(())
    }

    #[test]
    #[serial]
    fn rotates_active_file() -> Result<()> {
        let data_dir = fresh_dir("rotates_active_file")?;
        let options = LogOptions {
            max_file_size: 64,
            sync_writes: true,
        };
        {
            let mut storage = LogIndexStorage::with_options(&data_dir, options)?;
            for i in 0..10 {
                storage.apply(&[put(&format!("key{}", i), &"x".repeat(40))])?;
            }
            assert!(log_file(&data_dir, 9).exists());
            assert_eq!(storage.size(), 10);
        }
        let storage = LogIndexStorage::with_options(&data_dir, options)?;
        assert_eq!(storage.size(), 10);
        assert_eq!(storage.get(&Key::from("key0"))?, Some(Value::from("x".repeat(40))));
        assert_eq!(storage.get(&Key::from("key9"))?, Some(Value::from("x".repeat(40))));

        std::fs::remove_dir_all(&data_dir)?;
        Ok(())
    }
}
