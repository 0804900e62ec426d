//! Command line interface

use std::{collections::BTreeSet, fmt, path::PathBuf, time::Duration};

use clap::Parser;
use reqwest::Url;

use crate::output::METADATA_SUBDIR;

/// Command line arguments for `booru_dl` binary
#[derive(Parser, Debug)]
#[command(version, about, after_help = QUERY_HELP)]
pub struct BooruDlArgs {
    /// API credentials
    #[clap(flatten)]
    pub credentials: Credentials,
    /// Search query (ex. "hatsune_miku rating:g order:score")
    #[clap(long, alias = "search_query")]
    pub search_query: String,
    /// Number of posts to process
    #[clap(long, alias = "need_data_num", default_value_t = 100)]
    pub need_data_num: usize,
    /// Comma separated list of file extensions to download, or '*' for any
    #[clap(
        long,
        alias = "need_file_ext",
        default_value = "jpg,jpeg,png,webp",
        value_parser = ExtensionFilter::from_arg
    )]
    pub need_file_ext: ExtensionFilter,
    /// Output directory [default: output_dir_<timestamp>]
    #[clap(long, alias = "output_dir")]
    pub output_dir: Option<PathBuf>,
    /// Log file, appended to [default: output_log_<timestamp>.txt]
    #[clap(long, alias = "output_log_filename")]
    pub output_log_filename: Option<PathBuf>,
    /// Site to query
    #[clap(long, default_value_t = Site::Danbooru)]
    pub site: Site,
    /// Timeout in seconds for API requests
    #[clap(long, default_value_t = 30)]
    pub timeout: u64,
    /// Timeout in seconds for each image download
    #[clap(long, default_value_t = 300)]
    pub download_timeout: u64,
    /// Level of diagnostic logging output, on stderr
    #[clap(short, long, default_value_t = log::Level::Warn)]
    pub verbosity: log::Level,
}

/// Extra help about query syntax
const QUERY_HELP: &str =
    "Search query syntax: https://danbooru.donmai.us/wiki_pages/help:cheatsheet";

impl BooruDlArgs {
    /// Build run configuration, `started` being the run start timestamp used for default names
    #[must_use]
    pub fn scrape_config(&self, started: &str) -> ScrapeConfig {
        let output_dir = self
            .output_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("output_dir_{started}")));
        let metadata_dir = output_dir.join(METADATA_SUBDIR);
        ScrapeConfig {
            query: self.search_query.clone(),
            target_count: self.need_data_num,
            extensions: self.need_file_ext.clone(),
            output_dir,
            metadata_dir,
        }
    }

    /// Log file path
    #[must_use]
    pub fn log_path(&self, started: &str) -> PathBuf {
        self.output_log_filename
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("output_log_{started}.txt")))
    }

    /// API request timeout
    #[must_use]
    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// Image download timeout
    #[must_use]
    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout)
    }
}

/// API credentials
#[derive(Parser, Clone, Default)]
pub struct Credentials {
    /// Account name
    #[clap(
        long,
        alias = "danbooru_username",
        env = "DANBOORU_USERNAME",
        requires = "api_key"
    )]
    pub username: Option<String>,
    /// API key
    #[clap(
        long,
        alias = "danbooru_apikey",
        env = "DANBOORU_APIKEY",
        hide_env_values = true,
        requires = "username"
    )]
    pub api_key: Option<String>,
}

impl Credentials {
    /// Username and API key, if both are set
    #[must_use]
    pub fn basic_auth(&self) -> Option<(&str, &str)> {
        Some((self.username.as_deref()?, self.api_key.as_deref()?))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Which file extensions to download
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ExtensionFilter {
    /// Download files of any extension
    Any,
    /// Only download files with one of these lowercase extensions
    Only(BTreeSet<String>),
}

impl Default for ExtensionFilter {
    fn default() -> Self {
        Self::Only(
            ["jpg", "jpeg", "png", "webp"]
                .into_iter()
                .map(ToOwned::to_owned)
                .collect(),
        )
    }
}

impl ExtensionFilter {
    /// Parse comma separated extension list, a `*` entry meaning any extension
    pub fn from_arg(s: &str) -> anyhow::Result<Self> {
        let exts: BTreeSet<String> = s
            .split(',')
            .map(|e| e.trim().trim_start_matches('.').to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        if exts.contains("*") {
            return Ok(Self::Any);
        }
        anyhow::ensure!(!exts.is_empty(), "No file extension in {s:?}");
        Ok(Self::Only(exts))
    }

    /// Return true if files with extension `ext` (without dot) should be downloaded
    #[must_use]
    pub fn accepts(&self, ext: &str) -> bool {
        match self {
            ExtensionFilter::Any => true,
            ExtensionFilter::Only(exts) => exts.contains(&ext.to_lowercase()),
        }
    }
}

impl fmt::Display for ExtensionFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtensionFilter::Any => write!(f, "*"),
            ExtensionFilter::Only(exts) => {
                write!(f, "{}", itertools::join(exts, ","))
            }
        }
    }
}

/// Configuration of a download run
#[derive(Clone, Debug)]
pub struct ScrapeConfig {
    /// Search query
    pub query: String,
    /// Number of posts to process
    pub target_count: usize,
    /// Extensions to download
    pub extensions: ExtensionFilter,
    /// Directory for images and tag files
    pub output_dir: PathBuf,
    /// Directory for raw record dumps
    pub metadata_dir: PathBuf,
}

/// Danbooru compatible site
#[derive(
    Debug,
    Copy,
    Clone,
    Eq,
    PartialEq,
    strum::EnumString,
    strum::VariantArray,
    strum::Display,
)]
#[strum(serialize_all = "lowercase")]
#[expect(missing_docs)]
pub enum Site {
    Danbooru,
    Safebooru,
    Testbooru,
}

impl Site {
    /// Site root URL
    #[must_use]
    #[expect(clippy::unwrap_used)] // constant absolute URLs
    pub fn base_url(self) -> Url {
        let url = match self {
            Site::Danbooru => "https://danbooru.donmai.us/",
            Site::Safebooru => "https://safebooru.donmai.us/",
            Site::Testbooru => "https://testbooru.donmai.us/",
        };
        Url::parse(url).unwrap()
    }
}
