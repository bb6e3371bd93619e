use {
    super::*,
    snafu::{ResultExt, ensure},
    std::{
        fs::File,
        io::{BufReader, BufWriter, Read},
    },
};

pub const CACHE_EXPIRATION: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum CacheError {
    #[snafu(display("I/O error on scratchpad cache `{}`: {source}", path.display()))]
    Io { path: PathBuf, source: io::Error },

    #[snafu(display(
        "scratchpad cache `{}` is {}s old and has expired",
        path.display(),
        age.as_secs()
    ))]
    Stale { path: PathBuf, age: Duration },

    #[snafu(display("scratchpad cache holds {size} words, capacity is {capacity}"))]
    Oversized { size: u64, capacity: usize },

    #[snafu(display("scratchpad cache holds {size} words, not a whole number of quads"))]
    Unaligned { size: u64 },
}

fn write_height(writer: &mut impl Write, height: ScratchpadHeight) -> io::Result<()> {
    writer.write_u64::<LittleEndian>(height.height)?;
    writer.write_all(height.prevhash.as_bytes())
}

fn read_height(reader: &mut impl Read) -> io::Result<ScratchpadHeight> {
    let height = reader.read_u64::<LittleEndian>()?;
    let mut prevhash = [0; 32];
    reader.read_exact(&mut prevhash)?;

    Ok(ScratchpadHeight {
        height,
        prevhash: prevhash.into(),
    })
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    tmp.into()
}

impl ScratchpadStore {
    /// Writes the journal, height and words to `<path>.tmp`, then renames it over `path`.
    pub fn save_to_disk(&self, path: &Path) -> Result<(), CacheError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context(IoSnafu { path: parent })?;
        }

        let tmp = tmp_path(path);

        let file = File::create(&tmp).context(IoSnafu { path: &tmp })?;

        let mut writer = BufWriter::new(file);

        self.write_snapshot(&mut writer)
            .and_then(|()| writer.flush())
            .and_then(|()| writer.get_ref().sync_all())
            .context(IoSnafu { path: &tmp })?;

        drop(writer);

        fs::rename(&tmp, path).context(IoSnafu { path })?;

        info!(
            "Saved scratchpad at height {} ({} words) to {}",
            self.height,
            self.words.len(),
            path.display()
        );

        Ok(())
    }

    fn write_snapshot(&self, writer: &mut impl Write) -> io::Result<()> {
        let slots = self.log.slots();

        writer.write_u32::<LittleEndian>(slots.len() as u32)?;

        for entry in slots {
            write_height(writer, entry.prev)?;
            writer.write_u64::<LittleEndian>(entry.patch_word_count as u64)?;
        }

        write_height(writer, self.height)?;

        writer.write_u64::<LittleEndian>(self.words.len() as u64)?;

        for word in &self.words {
            writer.write_u64::<LittleEndian>(*word)?;
        }

        Ok(())
    }

    /// Replaces the store with the snapshot at `path`. The store is untouched on error.
    pub fn load_from_disk(&mut self, path: &Path, max_age: Duration) -> Result<(), CacheError> {
        let metadata = fs::metadata(path).context(IoSnafu { path })?;

        let age = metadata
            .modified()
            .context(IoSnafu { path })?
            .elapsed()
            .unwrap_or_default();

        ensure!(age < max_age, StaleSnafu { path, age });

        let mut reader = BufReader::new(File::open(path).context(IoSnafu { path })?);

        let slot_count = reader
            .read_u32::<LittleEndian>()
            .context(IoSnafu { path })?;

        let mut slots = Vec::new();

        for _ in 0..slot_count {
            let prev = read_height(&mut reader).context(IoSnafu { path })?;
            let patch_word_count = reader
                .read_u64::<LittleEndian>()
                .context(IoSnafu { path })?;

            slots.push(AddendumEntry {
                prev,
                patch_word_count: patch_word_count as usize,
            });
        }

        let height = read_height(&mut reader).context(IoSnafu { path })?;

        let size = reader
            .read_u64::<LittleEndian>()
            .context(IoSnafu { path })?;

        ensure!(
            size <= self.capacity as u64,
            OversizedSnafu {
                size,
                capacity: self.capacity,
            }
        );

        ensure!(size % QUAD_WORDS as u64 == 0, UnalignedSnafu { size });

        let mut words = vec![0; size as usize];

        reader
            .read_u64_into::<LittleEndian>(&mut words)
            .context(IoSnafu { path })?;

        self.words = words;
        self.height = height;
        self.log = AddendumLog::from_slots(self.log.capacity(), slots);
        self.needs_resync = false;

        info!(
            "Loaded scratchpad at height {} ({} words) from {}",
            self.height,
            self.words.len(),
            path.display()
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use {super::*, pretty_assertions::assert_eq, tempfile::TempDir};

    fn populated() -> ScratchpadStore {
        let mut store = ScratchpadStore::new(1024, 3);

        store
            .replace(
                (0..40).map(|i| i * 0x0101_0101).collect(),
                HeightInfo {
                    height: 7,
                    block_id: Hash32::from([7; 32]),
                },
            )
            .unwrap();

        for height in 8..=9 {
            store
                .apply_addendum(&Addendum {
                    hi: HeightInfo {
                        height,
                        block_id: Hash32::from([height as u8; 32]),
                    },
                    prev_id: Hash32::from([height as u8 - 1; 32]),
                    addm: vec![height, height * 3, height * 5, height * 7].into(),
                })
                .unwrap();
        }

        store
    }

    #[test]
    fn snapshot_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache").join("scratchpad.bin");

        let store = populated();
        store.save_to_disk(&path).unwrap();

        assert!(!tmp_path(&path).exists());

        let mut loaded = ScratchpadStore::new(1024, 3);
        loaded.load_from_disk(&path, CACHE_EXPIRATION).unwrap();

        assert_eq!(loaded.words(), store.words());
        assert_eq!(loaded.height(), store.height());
        assert_eq!(loaded.log(), store.log());
        assert_eq!(loaded.height().height, 9);
    }

    #[test]
    fn loaded_journal_still_rewinds() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scratchpad.bin");

        populated().save_to_disk(&path).unwrap();

        let mut loaded = ScratchpadStore::new(1024, 3);
        loaded.load_from_disk(&path, CACHE_EXPIRATION).unwrap();

        assert_eq!(loaded.rollback_all().unwrap(), 2);
        assert_eq!(loaded.height().height, 7);
        assert_eq!(
            loaded.words(),
            (0..40).map(|i| i * 0x0101_0101).collect::<Vec<u64>>().as_slice()
        );
    }

    #[test]
    fn expired_cache_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scratchpad.bin");

        populated().save_to_disk(&path).unwrap();

        let mut loaded = ScratchpadStore::new(1024, 3);
        assert!(matches!(
            loaded.load_from_disk(&path, Duration::ZERO),
            Err(CacheError::Stale { .. })
        ));
        assert!(loaded.is_empty());
    }

    #[test]
    fn missing_cache_rejected() {
        let dir = TempDir::new().unwrap();

        assert!(matches!(
            ScratchpadStore::default()
                .load_from_disk(&dir.path().join("nope.bin"), CACHE_EXPIRATION),
            Err(CacheError::Io { .. })
        ));
    }

    #[test]
    fn oversized_cache_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scratchpad.bin");

        populated().save_to_disk(&path).unwrap();

        let mut small = ScratchpadStore::new(32, 3);
        let err = small.load_from_disk(&path, CACHE_EXPIRATION).unwrap_err();

        assert_eq!(
            err.to_string(),
            "scratchpad cache holds 48 words, capacity is 32"
        );
        assert!(small.is_empty());
    }

    #[test]
    fn unaligned_cache_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scratchpad.bin");

        let mut bytes = Vec::new();
        byteorder::WriteBytesExt::write_u32::<LittleEndian>(&mut bytes, 0).unwrap();
        write_height(&mut bytes, ScratchpadHeight::EMPTY).unwrap();
        byteorder::WriteBytesExt::write_u64::<LittleEndian>(&mut bytes, 3).unwrap();
        for word in [1u64, 2, 3] {
            byteorder::WriteBytesExt::write_u64::<LittleEndian>(&mut bytes, word).unwrap();
        }
        fs::write(&path, bytes).unwrap();

        assert!(matches!(
            ScratchpadStore::default().load_from_disk(&path, CACHE_EXPIRATION),
            Err(CacheError::Unaligned { size: 3 })
        ));
    }

    #[test]
    fn truncated_cache_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scratchpad.bin");

        populated().save_to_disk(&path).unwrap();

        let bytes = fs::read(&path).unwrap();
        fs::write(&path, &bytes[..bytes.len() - 8]).unwrap();

        let mut store = ScratchpadStore::new(1024, 3);
        assert!(matches!(
            store.load_from_disk(&path, CACHE_EXPIRATION),
            Err(CacheError::Io { .. })
        ));
        assert!(store.is_empty());
    }
}
