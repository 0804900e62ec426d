//! Internal API exposed for `booru_dl` binary

use std::{
    cmp::min,
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    process::ExitCode,
};

use crate::{cl::ScrapeConfig, output::OutputTriple};
pub use crate::{
    http::{BooruClient, Transfer},
    record::Record,
    source::{Danbooru, PAGE_SIZE, PostSource},
};

pub mod cl;
mod http;
pub mod log_sink;
mod output;
mod record;
mod source;

/// Write a line to the run log.
/// The run log is informational, so failing to write to it is not fatal.
macro_rules! report {
    ($log:expr, $($arg:tt)*) => {
        if let Err(err) = writeln!($log, $($arg)*) {
            log::warn!("Failed to write to run log: {err}");
        }
    };
}

/// Fatal error stopping a run
#[derive(thiserror::Error, Debug)]
pub enum ScrapeError {
    /// Post listing failed
    #[error("Failed to get post list for page {page}")]
    List {
        /// Page number
        page: usize,
        /// Listing error
        #[source]
        err: anyhow::Error,
    },
    /// Post listing returned nothing
    #[error("Empty post list for page {page}")]
    EmptyPage {
        /// Page number
        page: usize,
    },
    /// File download failed
    #[error("Failed to download {url:?} to {path:?}")]
    Transfer {
        /// File URL
        url: String,
        /// Destination path
        path: PathBuf,
        /// Transfer error
        #[source]
        err: anyhow::Error,
    },
    /// Local file or directory write failed
    #[error("Failed to write {path:?}")]
    Io {
        /// File or directory path
        path: PathBuf,
        /// IO error
        #[source]
        err: io::Error,
    },
    /// Record could not be serialized
    #[error("Failed to serialize record for {path:?}")]
    Serialize {
        /// Metadata file path
        path: PathBuf,
        /// Serialization error
        #[source]
        err: serde_json::Error,
    },
}

impl ScrapeError {
    /// Process exit code for this error
    #[must_use]
    pub fn exit_code(&self) -> ExitCode {
        match self {
            // -1 as an exit status byte
            ScrapeError::List { .. }
            | ScrapeError::EmptyPage { .. }
            | ScrapeError::Transfer { .. }
            | ScrapeError::Io { .. }
            | ScrapeError::Serialize { .. } => ExitCode::from(255),
        }
    }
}

/// Counters of a completed run
#[derive(Debug, Default, Clone, Eq, PartialEq)]
pub struct ScrapeSummary {
    /// Posts examined, including skipped ones
    pub examined: usize,
    /// Posts whose files were downloaded
    pub downloaded: usize,
    /// Total size of downloaded images
    pub downloaded_bytes: u64,
    /// Posts skipped because they have no file URL
    pub skipped_no_url: usize,
    /// Posts skipped because of their file extension
    pub skipped_extension: usize,
    /// Posts skipped because all their files are already present
    pub skipped_complete: usize,
}

/// What happened to a single post
enum PostOutcome {
    /// No file URL
    NoFileUrl,
    /// File extension not wanted
    UnwantedExtension,
    /// Files already present
    AlreadyComplete,
    /// Files written, with image size in bytes
    Downloaded(u64),
}

/// Write `data` to a new file at `path`
fn write_file(path: &Path, data: &[u8]) -> Result<(), ScrapeError> {
    fs::write(path, data).map_err(|err| ScrapeError::Io {
        path: path.to_owned(),
        err,
    })
}

/// Create directory and its parents if missing
fn create_dir(path: &Path) -> Result<(), ScrapeError> {
    fs::create_dir_all(path).map_err(|err| ScrapeError::Io {
        path: path.to_owned(),
        err,
    })
}

/// Write files for post number `seq`
async fn process_post<T, L>(
    seq: usize,
    post: &Record,
    config: &ScrapeConfig,
    transfer: &T,
    log: &mut L,
) -> Result<PostOutcome, ScrapeError>
where
    T: Transfer + ?Sized,
    L: Write,
{
    let Some(file_url) = post.file_url() else {
        report!(log, "no file_url, skipping");
        return Ok(PostOutcome::NoFileUrl);
    };
    report!(log, "done_num:{seq} file_url:{file_url}");

    let triple = OutputTriple::new(seq, file_url, &config.output_dir, &config.metadata_dir);
    if !config.extensions.accepts(&triple.extension) {
        report!(
            log,
            "unwanted extension {:?}, skipping {:?}",
            triple.extension,
            triple.image
        );
        return Ok(PostOutcome::UnwantedExtension);
    }
    if triple.is_complete() {
        report!(log, "already downloaded, skipping {:?}", triple.image);
        return Ok(PostOutcome::AlreadyComplete);
    }

    let json = post
        .to_indented_json()
        .map_err(|err| ScrapeError::Serialize {
            path: triple.metadata.clone(),
            err,
        })?;
    write_file(&triple.metadata, &json)?;
    write_file(&triple.tags, format!("{}\n", post.tag_line()).as_bytes())?;

    let size = transfer
        .fetch_to_file(file_url, &triple.image)
        .await
        .map_err(|err| ScrapeError::Transfer {
            url: file_url.to_owned(),
            path: triple.image.clone(),
            err,
        })?;
    #[expect(clippy::cast_precision_loss)]
    let human_size = human_bytes::human_bytes(size as f64);
    log::debug!("Downloaded {human_size} to {:?}", triple.image);
    Ok(PostOutcome::Downloaded(size))
}

/// Download images and sidecar files for the first `config.target_count` posts matching
/// `config.query`.
///
/// Posts are requested by pages of at most [`PAGE_SIZE`], and numbered from 1 in the order they
/// are received. For each post with a file URL and a wanted extension, three files are written:
/// the raw post record, the comma separated tags, and the image itself.
/// Posts whose three files already exist are skipped, so an interrupted run can be resumed by
/// running it again.
///
/// Output names are derived from the post position in the results, not from a post identifier,
/// so resuming only works if the query returns posts in the same order as in the previous run.
///
/// Listing, empty page, file write, or download errors stop the run immediately.
pub async fn scrape<S, T, L>(
    config: &ScrapeConfig,
    source: &S,
    transfer: &T,
    log: &mut L,
) -> Result<ScrapeSummary, ScrapeError>
where
    S: PostSource + ?Sized,
    T: Transfer + ?Sized,
    L: Write,
{
    report!(log, "output_dir:{:?}", config.output_dir);
    create_dir(&config.output_dir)?;
    create_dir(&config.metadata_dir)?;

    let mut summary = ScrapeSummary::default();
    let page_count = config.target_count.div_ceil(PAGE_SIZE);
    for page in 1..=page_count {
        let limit = min(PAGE_SIZE, config.target_count - summary.examined);
        #[expect(clippy::cast_precision_loss)]
        let progress = summary.examined as f64 / config.target_count as f64 * 100.0;
        report!(
            log,
            "done_num:{} get_num:{limit} progress:{progress:4.2}%",
            summary.examined
        );

        let posts = source
            .list_posts(&config.query, limit, page)
            .await
            .map_err(|err| ScrapeError::List { page, err })?;
        if posts.is_empty() {
            return Err(ScrapeError::EmptyPage { page });
        }
        report!(log, "data_list len:{}", posts.len());

        for post in &posts {
            summary.examined += 1;
            match process_post(summary.examined, post, config, transfer, log).await? {
                PostOutcome::NoFileUrl => summary.skipped_no_url += 1,
                PostOutcome::UnwantedExtension => summary.skipped_extension += 1,
                PostOutcome::AlreadyComplete => summary.skipped_complete += 1,
                PostOutcome::Downloaded(size) => {
                    summary.downloaded += 1;
                    summary.downloaded_bytes += size;
                }
            }
        }

        if posts.len() != limit {
            report!(
                log,
                "no more data, data_list len:{} get_num:{limit}",
                posts.len()
            );
            break;
        }
    }

    #[expect(clippy::cast_precision_loss)]
    let human_size = human_bytes::human_bytes(summary.downloaded_bytes as f64);
    report!(
        log,
        "all done. done_num:{} downloaded:{} ({human_size}) skipped:{}",
        summary.examined,
        summary.downloaded,
        summary.skipped_no_url + summary.skipped_extension + summary.skipped_complete
    );
    Ok(summary)
}
