//! Output file naming

use std::path::{Path, PathBuf};

/// Name of the subdirectory holding raw record dumps
pub(crate) const METADATA_SUBDIR: &str = "json_original";

/// Paths of the three files written for a post
#[derive(Debug, Clone, Eq, PartialEq)]
pub(crate) struct OutputTriple {
    /// Image file
    pub image: PathBuf,
    /// Comma separated tags
    pub tags: PathBuf,
    /// Raw record dump
    pub metadata: PathBuf,
    /// Image extension, without dot, as found in the URL
    pub extension: String,
}

impl OutputTriple {
    /// Derive output paths for the post with sequence number `seq` and media URL `file_url`
    pub(crate) fn new(seq: usize, file_url: &str, output_dir: &Path, metadata_dir: &Path) -> Self {
        let url_filename = file_url.rsplit('/').next().unwrap_or(file_url);
        let name = format!("{seq:08}_{url_filename}");
        let (base, extension) = name.rsplit_once('.').unwrap_or((name.as_str(), ""));
        let txt_name = format!("{base}.txt");
        Self {
            image: output_dir.join(format!("{base}.{extension}")),
            tags: output_dir.join(&txt_name),
            metadata: metadata_dir.join(&txt_name),
            extension: extension.to_owned(),
        }
    }

    /// Return true if all three files exist.
    /// Content is not checked.
    pub(crate) fn is_complete(&self) -> bool {
        [&self.image, &self.tags, &self.metadata]
            .into_iter()
            .all(|p| p.is_file())
    }
}
