//! On-Disk Layout
//!
//! Every file the pipeline reads or writes hangs off three roots: the config
//! file, the cache folder, and the zone-files folder. `PathLayout` resolves the
//! three roots to absolute paths once at startup and is threaded through
//! construction as an immutable value; nothing mutates paths after that.
//!
//! Cache layout:
//!
//! ```text
//! db/                                   checkpoint store files
//! zone/<zone>/pre_crawl_output.txt      JSON-lines, one record per line
//! zone/<zone>/post_crawl_output.txt     JSON-lines
//! indexer/<indexer-type-dashes>/        opaque text index
//! ranking/output.txt                    JSON-lines, latest query
//! ```

use anyhow::Context;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct PathLayout {
    config_file: PathBuf,
    cache_dir: PathBuf,
    zone_files_dir: PathBuf,
}

impl PathLayout {
    pub fn new(config_file: &Path, cache_dir: &Path, zone_files_dir: &Path) -> anyhow::Result<Self> {
        Ok(Self {
            config_file: absolutize(config_file)?,
            cache_dir: absolutize(cache_dir)?,
            zone_files_dir: absolutize(zone_files_dir)?,
        })
    }

    pub fn config_file(&self) -> &Path {
        &self.config_file
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn zone_files_dir(&self) -> &Path {
        &self.zone_files_dir
    }

    pub fn checkpoint_db_dir(&self) -> PathBuf {
        self.cache_dir.join("db")
    }

    pub fn pre_crawl_output(&self, zone_name: &str) -> PathBuf {
        self.cache_dir
            .join("zone")
            .join(zone_name)
            .join("pre_crawl_output.txt")
    }

    pub fn post_crawl_output(&self, zone_name: &str) -> PathBuf {
        self.cache_dir
            .join("zone")
            .join(zone_name)
            .join("post_crawl_output.txt")
    }

    /// Indexer types are dotted registry tags; dots become dashes so the tag
    /// can serve as a folder name.
    pub fn indexer_dir(&self, indexer_type: &str) -> PathBuf {
        self.cache_dir
            .join("indexer")
            .join(indexer_type.replace('.', "-"))
    }

    pub fn ranking_output(&self) -> PathBuf {
        self.cache_dir.join("ranking").join("output.txt")
    }
}

fn absolutize(path: &Path) -> anyhow::Result<PathBuf> {
    std::path::absolute(path)
        .with_context(|| format!("unable to convert {} to an absolute path", path.display()))
}

#[cfg(test)]
mod tests {
    use super::PathLayout;
    use std::path::Path;

    #[test]
    fn test_layout_places_outputs_under_cache() {
        let layout = PathLayout::new(
            Path::new("/tmp/config.toml"),
            Path::new("/tmp/cache"),
            Path::new("/tmp/zone-files"),
        )
        .unwrap();

        assert_eq!(
            layout.pre_crawl_output("com"),
            Path::new("/tmp/cache/zone/com/pre_crawl_output.txt")
        );
        assert_eq!(
            layout.post_crawl_output("com"),
            Path::new("/tmp/cache/zone/com/post_crawl_output.txt")
        );
        assert_eq!(
            layout.indexer_dir("builtin.basic_indexer"),
            Path::new("/tmp/cache/indexer/builtin-basic_indexer")
        );
        assert_eq!(
            layout.ranking_output(),
            Path::new("/tmp/cache/ranking/output.txt")
        );
        assert_eq!(layout.checkpoint_db_dir(), Path::new("/tmp/cache/db"));
    }
}
