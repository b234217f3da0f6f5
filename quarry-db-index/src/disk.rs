//! On-disk persistence with copy-on-write generations
//!
//! Layout inside a store directory:
//! - `store.json` - header: schema version, committed generation, index
//!   order list, record/term counts, namespaces
//! - `dict.<gen>.qd` - the value dictionary: magic + version + count,
//!   then per entry: id, refcount, and a length-prefixed JSON term
//! - `<order>.<gen>.qx` - one file per permutation: magic + version +
//!   count, then fixed-width tuples (4 big-endian u64 ids in permutation
//!   order + 1 flag byte)
//!
//! ## Atomic commit
//!
//! A commit writes the *next* generation's data files, fsyncs them, then
//! renames a fresh header over the old one (the rename is the commit
//! point). Recovery trusts only files named by the header's generation;
//! data files of a half-written generation are ignored and cleaned up by
//! the next successful commit. Staged transaction writes never touch
//! disk, so readers of the committed generation are unaffected by an
//! in-progress commit.

use crate::snapshot::Snapshot;
use quarry_db_core::{Error, IndexOrder, Record, Result, Term, TermDict, TermId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const HEADER_FILE: &str = "store.json";
const SCHEMA_VERSION: u32 = 1;
const DICT_MAGIC: &[u8; 6] = b"QDICT\0";
const INDEX_MAGIC: &[u8; 6] = b"QIDX\0\0";

/// The header document, serialized as JSON (schema + commit marker).
#[derive(Debug, Serialize, Deserialize)]
struct StoreHeader {
    version: u32,
    generation: u64,
    orders: Vec<String>,
    records: u64,
    terms: u64,
    namespaces: BTreeMap<String, String>,
}

/// Everything recovered from a store directory.
pub struct LoadedStore {
    pub snapshot: Snapshot,
    pub dict: TermDict,
    pub namespaces: BTreeMap<String, String>,
    pub generation: u64,
}

fn dict_path(dir: &Path, generation: u64) -> PathBuf {
    dir.join(format!("dict.{}.qd", generation))
}

fn index_path(dir: &Path, order: IndexOrder, generation: u64) -> PathBuf {
    dir.join(format!("{}.{}.qx", order.name(), generation))
}

/// Persist a committed snapshot + dictionary as the next generation.
///
/// `sync` forces fsync on every file before the header rename; without
/// it a crash may lose the commit but never corrupts the prior one.
pub fn save(
    dir: &Path,
    snapshot: &Snapshot,
    dict: &TermDict,
    namespaces: &BTreeMap<String, String>,
    sync: bool,
) -> Result<()> {
    fs::create_dir_all(dir)?;
    let generation = snapshot.generation();

    write_dict(&dict_path(dir, generation), dict, sync)?;
    for order in IndexOrder::all() {
        write_index(
            &index_path(dir, *order, generation),
            snapshot.records(*order),
            sync,
        )?;
    }

    let header = StoreHeader {
        version: SCHEMA_VERSION,
        generation,
        orders: IndexOrder::all().iter().map(|o| o.name().to_owned()).collect(),
        records: snapshot.len() as u64,
        terms: dict.len() as u64,
        namespaces: namespaces.clone(),
    };
    let tmp = dir.join(format!("{}.tmp", HEADER_FILE));
    {
        let file = File::create(&tmp)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &header)
            .map_err(|e| Error::storage(format!("header write failed: {}", e)))?;
        writer.flush()?;
        if sync {
            writer.get_ref().sync_all()?;
        }
    }
    fs::rename(&tmp, dir.join(HEADER_FILE))?;
    if sync {
        sync_dir(dir)?;
    }

    clean_stale_generations(dir, generation);
    debug!(generation, records = snapshot.len(), "persisted store generation");
    Ok(())
}

/// Load the last committed generation. `Ok(None)` for a directory with
/// no header (a fresh store).
pub fn load(dir: &Path) -> Result<Option<LoadedStore>> {
    let header_path = dir.join(HEADER_FILE);
    if !header_path.exists() {
        return Ok(None);
    }

    let header: StoreHeader = serde_json::from_reader(BufReader::new(File::open(&header_path)?))
        .map_err(|e| Error::corrupt(format!("unreadable header: {}", e)))?;
    if header.version != SCHEMA_VERSION {
        return Err(Error::corrupt(format!(
            "unsupported schema version {}",
            header.version
        )));
    }
    for order in IndexOrder::all() {
        if !header.orders.iter().any(|o| o == order.name()) {
            return Err(Error::corrupt(format!(
                "header missing index order {}",
                order.name()
            )));
        }
    }

    let dict = read_dict(&dict_path(dir, header.generation))?;
    if dict.len() as u64 != header.terms {
        return Err(Error::corrupt(format!(
            "dictionary has {} terms, header expects {}",
            dict.len(),
            header.terms
        )));
    }

    // The SPOG file is authoritative for the record set; the other
    // permutation files are validated against it.
    let spog = read_index(&index_path(dir, IndexOrder::Spog, header.generation))?;
    if spog.len() as u64 != header.records {
        return Err(Error::corrupt(format!(
            "spog index has {} records, header expects {}",
            spog.len(),
            header.records
        )));
    }
    for order in &[IndexOrder::Posg, IndexOrder::Ospg, IndexOrder::Gspo] {
        let records = read_index(&index_path(dir, *order, header.generation))?;
        if records.len() != spog.len() {
            return Err(Error::corrupt(format!(
                "{} index has {} records, spog has {}",
                order.name(),
                records.len(),
                spog.len()
            )));
        }
    }

    let snapshot = Snapshot::from_records(spog, header.generation);
    info!(
        generation = header.generation,
        records = snapshot.len(),
        "recovered store"
    );
    Ok(Some(LoadedStore {
        snapshot,
        dict,
        namespaces: header.namespaces,
        generation: header.generation,
    }))
}

fn write_dict(path: &Path, dict: &TermDict, sync: bool) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    let entries = dict.entries();

    writer.write_all(DICT_MAGIC)?;
    writer.write_all(&SCHEMA_VERSION.to_be_bytes())?;
    writer.write_all(&(entries.len() as u64).to_be_bytes())?;
    for (id, term, refs) in entries {
        let bytes = serde_json::to_vec(&term)
            .map_err(|e| Error::storage(format!("term serialization failed: {}", e)))?;
        writer.write_all(&id.raw().to_be_bytes())?;
        writer.write_all(&refs.to_be_bytes())?;
        writer.write_all(&(bytes.len() as u32).to_be_bytes())?;
        writer.write_all(&bytes)?;
    }
    writer.flush()?;
    if sync {
        writer.get_ref().sync_all()?;
    }
    Ok(())
}

fn read_dict(path: &Path) -> Result<TermDict> {
    let mut reader = BufReader::new(
        File::open(path).map_err(|e| Error::storage(format!("{}: {}", path.display(), e)))?,
    );

    let mut magic = [0u8; 6];
    reader.read_exact(&mut magic).map_err(truncated(path))?;
    if &magic != DICT_MAGIC {
        return Err(Error::corrupt(format!("{}: bad magic", path.display())));
    }
    let version = read_u32(&mut reader, path)?;
    if version != SCHEMA_VERSION {
        return Err(Error::corrupt(format!(
            "{}: unsupported version {}",
            path.display(),
            version
        )));
    }

    let count = read_u64(&mut reader, path)?;
    let mut entries = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let id = TermId(read_u64(&mut reader, path)?);
        let refs = read_u64(&mut reader, path)?;
        let len = read_u32(&mut reader, path)? as usize;
        let mut bytes = vec![0u8; len];
        reader.read_exact(&mut bytes).map_err(truncated(path))?;
        let term: Term = serde_json::from_slice(&bytes)
            .map_err(|e| Error::corrupt(format!("{}: bad term entry: {}", path.display(), e)))?;
        entries.push((id, term, refs));
    }
    TermDict::from_entries(entries)
}

fn write_index(path: &Path, records: &[Record], sync: bool) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    writer.write_all(INDEX_MAGIC)?;
    writer.write_all(&SCHEMA_VERSION.to_be_bytes())?;
    writer.write_all(&(records.len() as u64).to_be_bytes())?;
    for r in records {
        writer.write_all(&r.s.raw().to_be_bytes())?;
        writer.write_all(&r.p.raw().to_be_bytes())?;
        writer.write_all(&r.o.raw().to_be_bytes())?;
        writer.write_all(&r.g.raw().to_be_bytes())?;
        writer.write_all(&[u8::from(r.inferred)])?;
    }
    writer.flush()?;
    if sync {
        writer.get_ref().sync_all()?;
    }
    Ok(())
}

fn read_index(path: &Path) -> Result<Vec<Record>> {
    let mut reader = BufReader::new(
        File::open(path).map_err(|e| Error::storage(format!("{}: {}", path.display(), e)))?,
    );

    let mut magic = [0u8; 6];
    reader.read_exact(&mut magic).map_err(truncated(path))?;
    if &magic != INDEX_MAGIC {
        return Err(Error::corrupt(format!("{}: bad magic", path.display())));
    }
    let version = read_u32(&mut reader, path)?;
    if version != SCHEMA_VERSION {
        return Err(Error::corrupt(format!(
            "{}: unsupported version {}",
            path.display(),
            version
        )));
    }

    let count = read_u64(&mut reader, path)? as usize;
    let mut records = Vec::with_capacity(count);
    for _ in 0..count {
        let s = TermId(read_u64(&mut reader, path)?);
        let p = TermId(read_u64(&mut reader, path)?);
        let o = TermId(read_u64(&mut reader, path)?);
        let g = TermId(read_u64(&mut reader, path)?);
        let mut flag = [0u8; 1];
        reader.read_exact(&mut flag).map_err(truncated(path))?;
        let inferred = match flag[0] {
            0 => false,
            1 => true,
            flag => {
                return Err(Error::corrupt(format!(
                    "{}: invalid record flag {}",
                    path.display(),
                    flag
                )))
            }
        };
        records.push(Record { s, p, o, g, inferred });
    }
    let mut rest = Vec::new();
    reader.read_to_end(&mut rest).map_err(truncated(path))?;
    if !rest.is_empty() {
        return Err(Error::corrupt(format!(
            "{}: {} trailing bytes",
            path.display(),
            rest.len()
        )));
    }
    Ok(records)
}

fn clean_stale_generations(dir: &Path, current: u64) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        let Some(generation) = parse_generation(name) else {
            continue;
        };
        if generation != current {
            let _ = fs::remove_file(entry.path());
        }
    }
}

fn parse_generation(name: &str) -> Option<u64> {
    let mut parts = name.split('.');
    let stem = parts.next()?;
    let generation = parts.next()?;
    let ext = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    let known_stem =
        stem == "dict" || IndexOrder::all().iter().any(|o| o.name() == stem);
    if !known_stem || (ext != "qd" && ext != "qx") {
        return None;
    }
    generation.parse().ok()
}

fn sync_dir(dir: &Path) -> Result<()> {
    File::open(dir)?.sync_all()?;
    Ok(())
}

fn read_u32(reader: &mut impl Read, path: &Path) -> Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf).map_err(truncated(path))?;
    Ok(u32::from_be_bytes(buf))
}

fn read_u64(reader: &mut impl Read, path: &Path) -> Result<u64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf).map_err(truncated(path))?;
    Ok(u64::from_be_bytes(buf))
}

fn truncated(path: &Path) -> impl Fn(std::io::Error) -> Error + '_ {
    move |e| Error::corrupt(format!("{}: truncated: {}", path.display(), e))
}
