//! Durable record of processed post ids.
//!
//! The file is an append-only log with one id per line. Loading rebuilds the
//! in-memory set; every newly recorded id is appended and synced before
//! [`ProcessedSet::record`] returns, so a crash loses at most the post that
//! was in flight.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use subgrab_core::{CoreError, StoreError};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};


#[derive(Debug)]
pub struct ProcessedSet {
    path: PathBuf,
    ids: HashSet<String>,
    log: Option<File>,
    // The last line on disk was cut short; the next append must start a new line
    torn_tail: bool,
}

impl ProcessedSet {
    /// `<state_dir>/<target>_processed_posts.txt`
    pub fn path_for(state_dir: &Path, target: &str) -> PathBuf {
        state_dir.join(format!("{}_processed_posts.txt", target))
    }

    /// Loads the set from `path`, or starts empty if the file doesn't exist yet.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self, CoreError> {
        let path = path.into();

        let contents = match fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(source) => {
                return Err(StoreError::ReadFailed {
                    path: path.display().to_string(),
                    source,
                }
                .into())
            }
        };

        let ids: HashSet<String> = contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        let torn_tail = !contents.is_empty() && !contents.ends_with('\n');

        info!(
            "Loaded {} processed post ids from {}",
            ids.len(),
            path.display()
        );

        Ok(Self {
            path,
            ids,
            log: None,
            torn_tail,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Copy of the ids as they are now.
    pub fn snapshot(&self) -> HashSet<String> {
        self.ids.clone()
    }

    /// Marks `id` as processed and makes it durable.
    ///
    /// Returns `false` without touching the file if the id was already known.
    pub async fn record(&mut self, id: &str) -> Result<bool, CoreError> {
        if self.ids.contains(id) {
            return Ok(false);
        }

        let mut line = String::with_capacity(id.len() + 2);
        if self.torn_tail {
            line.push('\n');
        }
        line.push_str(id);
        line.push('\n');

        self.append(line.as_bytes())
            .await
            .map_err(|source| StoreError::AppendFailed {
                path: self.path.display().to_string(),
                source,
            })?;

        self.torn_tail = false;
        self.ids.insert(id.to_string());
        debug!("Recorded processed post {}", id);
        Ok(true)
    }

    async fn append(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        if self.log.is_none() {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .await?;
            self.log = Some(file);
        }

        if let Some(log) = self.log.as_mut() {
            log.write_all(bytes).await?;
            log.flush().await?;
            log.sync_data().await?;
        }
        Ok(())
    }

    /// Rewrites the whole file from the in-memory set.
    ///
    /// Writes a sibling temp file and renames it into place, which also compacts
    /// any torn line left by an earlier crash.
    pub async fn save(&mut self) -> Result<(), CoreError> {
        let rewrite_failed = |source| StoreError::RewriteFailed {
            path: self.path.display().to_string(),
            source,
        };

        let mut ids: Vec<&String> = self.ids.iter().collect();
        ids.sort();
        let mut contents = String::new();
        for id in ids {
            contents.push_str(id);
            contents.push('\n');
        }

        let tmp_path = self.path.with_extension("txt.tmp");
        let write = async {
            let mut file = File::create(&tmp_path).await?;
            file.write_all(contents.as_bytes()).await?;
            file.sync_all().await?;
            fs::rename(&tmp_path, &self.path).await
        };
        write.await.map_err(rewrite_failed)?;

        // The old handle points at the replaced inode
        self.log = None;
        self.torn_tail = false;
        debug!("Saved {} processed post ids to {}", self.ids.len(), self.path.display());
        Ok(())
    }
}
