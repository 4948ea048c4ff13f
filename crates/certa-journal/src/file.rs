use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use certa_types::Bucket;
use tracing::{debug, warn};

use crate::error::{JournalError, JournalResult};
use crate::intent::{IntentId, IntentJournal, IntentState, JournalRecord, UploadIntent};
use crate::memory::IntentIndex;

/// Header size: 4 bytes length + 4 bytes CRC.
const HEADER_SIZE: usize = 8;

struct Inner {
    writer: BufWriter<File>,
    index: IntentIndex,
    /// Records appended since the file was last compacted.
    appended: u64,
}

/// Intent journal persisted to a single append-only file.
///
/// On-disk format, one frame per [`JournalRecord`]:
/// ```text
/// [4 bytes: payload length (little-endian u32)]
/// [4 bytes: CRC32 of payload (little-endian u32)]
/// [N bytes: bincode-serialized JournalRecord]
/// ```
///
/// Opening the file replays every frame into an in-memory index. A frame
/// with a bad CRC is skipped; a short frame at the end (a torn write) stops
/// replay. Records that no longer apply, such as a transition for an intent
/// whose `Recorded` frame was lost, are logged and dropped.
pub struct FileJournal {
    path: PathBuf,
    inner: Mutex<Inner>,
}

impl FileJournal {
    /// Open (or create) the journal at `path` and replay it.
    pub fn open(path: impl AsRef<Path>) -> JournalResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut index = IntentIndex::default();
        let mut replayed = 0u64;
        if path.exists() {
            for record in read_frames(&path)? {
                match index.apply(&record) {
                    Ok(()) => replayed += 1,
                    Err(e) => warn!(error = %e, "dropping journal record during replay"),
                }
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        debug!(path = %path.display(), replayed, "intent journal opened");

        Ok(Self {
            path,
            inner: Mutex::new(Inner {
                writer: BufWriter::new(file),
                index,
                appended: replayed,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records in the file since it was opened or last compacted.
    pub fn record_count(&self) -> u64 {
        self.inner.lock().expect("lock poisoned").appended
    }

    /// Rewrite the file so that it only holds outstanding intents.
    ///
    /// The new contents are written to a sibling file and renamed over the
    /// old one, so a crash mid-compaction leaves one complete journal.
    pub fn compact(&self) -> JournalResult<usize> {
        let mut inner = self.inner.lock().expect("lock poisoned");
        inner.writer.flush()?;

        let outstanding = inner.index.outstanding();
        let tmp = self.path.with_extension("compact");
        {
            let mut w = BufWriter::new(File::create(&tmp)?);
            for intent in &outstanding {
                write_frame(&mut w, &JournalRecord::Recorded(intent.clone()))?;
            }
            w.flush()?;
            w.get_ref().sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;

        let file = OpenOptions::new().append(true).open(&self.path)?;
        let mut index = IntentIndex::default();
        for intent in &outstanding {
            index.apply(&JournalRecord::Recorded(intent.clone()))?;
        }
        inner.writer = BufWriter::new(file);
        inner.index = index;
        inner.appended = outstanding.len() as u64;

        debug!(kept = outstanding.len(), "intent journal compacted");
        Ok(outstanding.len())
    }

    fn append(&self, record: JournalRecord) -> JournalResult<()> {
        let mut inner = self.inner.lock().expect("lock poisoned");
        inner.index.check(&record)?;
        write_frame(&mut inner.writer, &record)?;
        inner.writer.flush()?;
        inner.index.apply(&record)?;
        inner.appended += 1;
        Ok(())
    }
}

impl std::fmt::Debug for FileJournal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileJournal").field("path", &self.path).finish()
    }
}

impl IntentJournal for FileJournal {
    fn record(&self, bucket: Bucket, path: &str) -> JournalResult<UploadIntent> {
        let intent = UploadIntent::new(bucket, path);
        self.append(JournalRecord::Recorded(intent.clone()))?;
        Ok(intent)
    }

    fn transition(&self, id: IntentId, state: IntentState) -> JournalResult<()> {
        self.append(JournalRecord::Transition { id, state })
    }

    fn get(&self, id: IntentId) -> JournalResult<Option<UploadIntent>> {
        Ok(self.inner.lock().expect("lock poisoned").index.get(&id))
    }

    fn outstanding(&self) -> JournalResult<Vec<UploadIntent>> {
        Ok(self.inner.lock().expect("lock poisoned").index.outstanding())
    }
}

fn write_frame<W: Write>(w: &mut W, record: &JournalRecord) -> JournalResult<()> {
    let payload =
        bincode::serialize(record).map_err(|e| JournalError::Serialization(e.to_string()))?;
    let length = payload.len() as u32;
    let crc = crc32fast::hash(&payload);
    w.write_all(&length.to_le_bytes())?;
    w.write_all(&crc.to_le_bytes())?;
    w.write_all(&payload)?;
    Ok(())
}

fn read_frames(path: &Path) -> JournalResult<Vec<JournalRecord>> {
    let file = File::open(path)?;
    let file_len = file.metadata()?.len();
    let mut reader = BufReader::new(file);
    let mut records = Vec::new();
    let mut offset: u64 = 0;

    loop {
        let mut header = [0u8; HEADER_SIZE];
        match reader.read_exact(&mut header) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into()),
        }
        let length = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
        let expected_crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
        if length == 0 || offset + HEADER_SIZE as u64 + length as u64 > file_len {
            warn!(offset, length, file_len, "invalid journal frame length; stopping replay");
            break;
        }

        let mut payload = vec![0u8; length as usize];
        match reader.read_exact(&mut payload) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                warn!(offset, "torn journal frame; stopping replay");
                break;
            }
            Err(e) => return Err(e.into()),
        }

        let actual_crc = crc32fast::hash(&payload);
        if actual_crc != expected_crc {
            warn!(offset, expected = expected_crc, actual = actual_crc, "journal CRC mismatch; skipping frame");
        } else {
            match bincode::deserialize::<JournalRecord>(&payload) {
                Ok(record) => records.push(record),
                Err(e) => warn!(offset, error = %e, "undecodable journal frame; skipping"),
            }
        }
        offset += HEADER_SIZE as u64 + length as u64;
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Seek, SeekFrom};

    // -----------------------------------------------------------------------
    // Replay
    // -----------------------------------------------------------------------

    #[test]
    fn state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("intents.log");

        let (pending, committed) = {
            let journal = FileJournal::open(&path).unwrap();
            let a = journal.record(Bucket::Proof, "o/1_bill.pdf").unwrap();
            let b = journal.record(Bucket::Id, "o/1_id.png").unwrap();
            journal.transition(b.id, IntentState::Committed).unwrap();
            (a, b)
        };

        let journal = FileJournal::open(&path).unwrap();
        assert_eq!(journal.record_count(), 3);
        let out = journal.outstanding().unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, pending.id);
        assert_eq!(out[0].path, "o/1_bill.pdf");
        assert_eq!(
            journal.get(committed.id).unwrap().unwrap().state,
            IntentState::Committed
        );
    }

    #[test]
    fn last_transition_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("intents.log");
        let id = {
            let journal = FileJournal::open(&path).unwrap();
            let a = journal.record(Bucket::Asset, "abc.png").unwrap();
            journal.transition(a.id, IntentState::Orphaned).unwrap();
            journal.transition(a.id, IntentState::Compensated).unwrap();
            a.id
        };
        let journal = FileJournal::open(&path).unwrap();
        assert_eq!(journal.get(id).unwrap().unwrap().state, IntentState::Compensated);
        assert!(journal.outstanding().unwrap().is_empty());
    }

    #[test]
    fn torn_tail_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("intents.log");
        {
            let journal = FileJournal::open(&path).unwrap();
            journal.record(Bucket::Proof, "kept").unwrap();
        }
        {
            let mut f = OpenOptions::new().append(true).open(&path).unwrap();
            f.write_all(&64u32.to_le_bytes()).unwrap();
            f.write_all(&0u32.to_le_bytes()).unwrap();
            f.write_all(b"short").unwrap();
        }
        let journal = FileJournal::open(&path).unwrap();
        let out = journal.outstanding().unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].path, "kept");
    }

    #[test]
    fn oversized_length_header_stops_replay() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("intents.log");
        {
            let journal = FileJournal::open(&path).unwrap();
            journal.record(Bucket::Proof, "kept").unwrap();
        }
        {
            let mut f = OpenOptions::new().append(true).open(&path).unwrap();
            f.write_all(&u32::MAX.to_le_bytes()).unwrap();
            f.write_all(&0u32.to_le_bytes()).unwrap();
            f.write_all(&[0u8; 32]).unwrap();
        }
        let records = read_frames(&path).unwrap();
        assert_eq!(records.len(), 1);
        let journal = FileJournal::open(&path).unwrap();
        assert_eq!(journal.outstanding().unwrap()[0].path, "kept");
    }

    #[test]
    fn corrupt_frame_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("intents.log");
        {
            let journal = FileJournal::open(&path).unwrap();
            journal.record(Bucket::Proof, "first").unwrap();
            journal.record(Bucket::Proof, "second").unwrap();
        }
        {
            // Flip a byte inside the first payload.
            let mut f = OpenOptions::new().read(true).write(true).open(&path).unwrap();
            f.seek(SeekFrom::Start(HEADER_SIZE as u64 + 2)).unwrap();
            let mut b = [0u8; 1];
            f.read_exact(&mut b).unwrap();
            f.seek(SeekFrom::Start(HEADER_SIZE as u64 + 2)).unwrap();
            f.write_all(&[b[0] ^ 0xff]).unwrap();
        }
        let journal = FileJournal::open(&path).unwrap();
        let paths: Vec<_> = journal.outstanding().unwrap().into_iter().map(|i| i.path).collect();
        assert_eq!(paths, vec!["second".to_string()]);
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    #[test]
    fn illegal_transition_is_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("intents.log");
        let journal = FileJournal::open(&path).unwrap();
        let a = journal.record(Bucket::Proof, "a").unwrap();
        journal.transition(a.id, IntentState::Committed).unwrap();
        assert!(journal.transition(a.id, IntentState::Orphaned).is_err());
        assert_eq!(journal.record_count(), 2);
    }

    #[test]
    fn compact_keeps_only_outstanding() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("intents.log");
        let journal = FileJournal::open(&path).unwrap();
        for i in 0..5 {
            let intent = journal.record(Bucket::Proof, &format!("k{i}")).unwrap();
            if i % 2 == 0 {
                journal.transition(intent.id, IntentState::Committed).unwrap();
            }
        }
        let before = fs::metadata(&path).unwrap().len();
        assert_eq!(journal.compact().unwrap(), 2);
        assert!(fs::metadata(&path).unwrap().len() < before);

        // Still writable after compaction, and the result replays.
        journal.record(Bucket::Id, "after").unwrap();
        drop(journal);
        let reopened = FileJournal::open(&path).unwrap();
        let mut paths: Vec<_> = reopened.outstanding().unwrap().into_iter().map(|i| i.path).collect();
        paths.sort();
        assert_eq!(paths, vec!["after", "k1", "k3"]);
    }
}
