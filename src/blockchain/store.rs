use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use log::{debug, warn};
use serde::Serialize;
use serde_json::Value;

use super::{Block, CHAIN_FILE_NAME};
use crate::error::{Error, Result};

/// A ledger line that does not decode as a block.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MalformedLine {
    /// Position in the chain (blank lines are not counted).
    pub position: u64,
    /// 1-based line number in the file.
    pub line: usize,
    /// `block_hash` recovered from the raw JSON, if it still has one.
    pub block_hash: Option<String>,
    pub reason: String,
}

/// Everything read back from a chain file.
#[derive(Debug, Default)]
pub struct LoadedChain {
    pub blocks: Vec<Block>,
    pub malformed: Vec<MalformedLine>,
}

/// Append-only NDJSON file: one block per line.
#[derive(Debug, Clone)]
pub struct ChainStore {
    path: PathBuf,
}

impl ChainStore {
    /// Use `dir/CHAIN_FILE_NAME`, creating `dir` if needed.
    pub fn in_dir(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)
            .map_err(|e| Error::persistence(format!("create ledger dir {}", dir.display()), e))?;
        Ok(Self {
            path: dir.join(CHAIN_FILE_NAME),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every record. A missing file is an empty chain and blank lines
    /// are skipped. Lines that do not decode as blocks are kept as
    /// [`MalformedLine`]s so verification can report them in place.
    pub fn load(&self) -> Result<LoadedChain> {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(LoadedChain::default()),
            Err(e) => return Err(Error::persistence(format!("open {}", self.path.display()), e)),
        };

        let mut loaded = LoadedChain::default();
        let mut position = 0u64;
        for (n, raw) in BufReader::new(file).split(b'\n').enumerate() {
            let raw = raw.map_err(|e| Error::persistence(format!("read {}", self.path.display()), e))?;
            let line = String::from_utf8_lossy(&raw);
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Block>(&line) {
                Ok(block) => loaded.blocks.push(block),
                Err(e) => {
                    warn!("{} line {} is not a block: {e}", self.path.display(), n + 1);
                    let block_hash = serde_json::from_str::<Value>(&line)
                        .ok()
                        .and_then(|v| v.get("block_hash")?.as_str().map(str::to_string));
                    loaded.malformed.push(MalformedLine {
                        position,
                        line: n + 1,
                        block_hash,
                        reason: e.to_string(),
                    });
                }
            }
            position += 1;
        }
        debug!(
            "loaded {} block(s) and {} malformed line(s) from {}",
            loaded.blocks.len(),
            loaded.malformed.len(),
            self.path.display()
        );
        Ok(loaded)
    }

    /// Write one block as a line and flush it to disk before returning.
    ///
    /// A failed write is cut back off the file so no torn line is left for
    /// the next append to run into.
    pub fn append(&self, block: &Block) -> Result<()> {
        let mut line = serde_json::to_string(block).expect("serialize block");
        line.push('\n');

        let context = || format!("append block #{} to {}", block.index, self.path.display());
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| Error::persistence(context(), e))?;
        let start_len = file
            .metadata()
            .map_err(|e| Error::persistence(context(), e))?
            .len();
        write_record(&mut file, start_len, line.as_bytes()).map_err(|e| Error::persistence(context(), e))
    }

    pub fn size_bytes(&self) -> Result<u64> {
        fs::metadata(&self.path)
            .map(|m| m.len())
            .map_err(|e| Error::persistence(format!("stat {}", self.path.display()), e))
    }
}

/// Durable sink that can be cut back to an earlier length.
trait Durable {
    fn sync(&mut self) -> io::Result<()>;
    fn truncate_to(&mut self, len: u64) -> io::Result<()>;
}

impl Durable for File {
    fn sync(&mut self) -> io::Result<()> {
        self.sync_data()
    }

    fn truncate_to(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)?;
        self.sync_data()
    }
}

fn write_record<W: Write + Durable>(out: &mut W, start_len: u64, line: &[u8]) -> io::Result<()> {
    if let Err(e) = out.write_all(line).and_then(|_| out.sync()) {
        if let Err(undo) = out.truncate_to(start_len) {
            warn!("could not roll back partial ledger line: {undo}");
        }
        return Err(e);
    }
    Ok(())
}
