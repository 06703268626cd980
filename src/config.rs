//! Configuration for minimization.

use crate::error::{Error, Result};
use crate::parser_config::ParserOptions;

/// Which source pages to copy, in output order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PageSelection {
    /// Every page in document order.
    #[default]
    All,
    /// 0-based page indices. Order is kept; a repeated index yields a
    /// repeated page.
    Indices(Vec<usize>),
    /// Inclusive 0-based index ranges, expanded only once the page count is
    /// known.
    Ranges(Vec<(usize, usize)>),
}

impl PageSelection {
    /// Resolve against a document with `page_count` pages.
    ///
    /// Fails with [`Error::MalformedDocument`] naming the first index that
    /// does not exist.
    pub fn resolve(&self, page_count: usize) -> Result<Vec<usize>> {
        match self {
            PageSelection::All => Ok((0..page_count).collect()),
            PageSelection::Indices(indices) => {
                if let Some(bad) = indices.iter().find(|&&i| i >= page_count) {
                    return Err(Error::malformed(format!(
                        "page index {} out of range, document has {} pages",
                        bad, page_count
                    )));
                }
                Ok(indices.clone())
            },
            PageSelection::Ranges(ranges) => {
                if let Some(&(_, end)) = ranges.iter().find(|&&(_, end)| end >= page_count) {
                    return Err(Error::malformed(format!(
                        "page index {} out of range, document has {} pages",
                        end, page_count
                    )));
                }
                Ok(ranges.iter().flat_map(|&(start, end)| start..=end).collect())
            },
        }
    }

    /// Parse a 1-based range list such as `1,3-5`.
    ///
    /// Ranges stay unexpanded until [`resolve`](Self::resolve), so a huge
    /// range costs nothing before it is rejected.
    pub fn parse_ranges(text: &str) -> Option<Self> {
        let mut ranges = Vec::new();
        for part in text.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (start, end) = match part.split_once('-') {
                Some((a, b)) => (a.trim().parse::<usize>().ok()?, b.trim().parse::<usize>().ok()?),
                None => {
                    let n = part.parse::<usize>().ok()?;
                    (n, n)
                },
            };
            if start == 0 || end < start {
                return None;
            }
            ranges.push((start - 1, end - 1));
        }
        (!ranges.is_empty()).then_some(PageSelection::Ranges(ranges))
    }
}

/// Minimization configuration.
///
/// # Example
///
/// ```
/// use pdf_minimizer::config::{MinimizeOptions, PageSelection};
///
/// let options = MinimizeOptions::new()
///     .with_pages(PageSelection::Indices(vec![0, 2]))
///     .with_producer("my-tool 1.0");
/// assert!(!options.keep_info);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MinimizeOptions {
    /// Pages to copy.
    pub pages: PageSelection,

    /// Copy the source document information dictionary.
    pub keep_info: bool,

    /// `/Producer` written into the output information dictionary.
    pub producer: Option<String>,

    /// Header version. `None` uses the source version, at least 1.4.
    pub version: Option<(u8, u8)>,

    /// How the source is parsed.
    pub parser: ParserOptions,
}

impl MinimizeOptions {
    /// Create options with defaults: all pages, no metadata.
    pub fn new() -> Self {
        Self::default()
    }

    /// Select pages.
    pub fn with_pages(mut self, pages: PageSelection) -> Self {
        self.pages = pages;
        self
    }

    /// Keep or drop the source `/Info` dictionary.
    pub fn with_keep_info(mut self, keep: bool) -> Self {
        self.keep_info = keep;
        self
    }

    /// Set `/Producer`.
    pub fn with_producer(mut self, producer: impl Into<String>) -> Self {
        self.producer = Some(producer.into());
        self
    }

    /// Force the header version.
    pub fn with_version(mut self, major: u8, minor: u8) -> Self {
        self.version = Some((major, minor));
        self
    }

    /// Set parser options.
    pub fn with_parser_options(mut self, parser: ParserOptions) -> Self {
        self.parser = parser;
        self
    }
}
