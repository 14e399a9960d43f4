//! Post files on disk
//!
//! Every post becomes two files in the posts directory, named
//! `<date>-<id>-<title>.md` and `.html`. Writing the same post again
//! overwrites the same two files.

use crate::extract::Post;
use crate::output::traits::{OutputError, OutputResult, PostSink};
use std::fs;
use std::path::PathBuf;

/// Characters that cannot appear in a file name on common filesystems
const UNSAFE_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Writes each post as a Markdown file and an HTML file
#[derive(Debug, Clone)]
pub struct PostWriter {
    dir: PathBuf,
}

impl PostWriter {
    /// Creates the writer, creating the directory if needed
    pub fn new(dir: impl Into<PathBuf>) -> OutputResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| OutputError::Write {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    /// Paths of the Markdown and HTML files for `post`
    pub fn paths_for(&self, post: &Post) -> (PathBuf, PathBuf) {
        let stem = file_stem(post);
        (
            self.dir.join(format!("{}.md", stem)),
            self.dir.join(format!("{}.html", stem)),
        )
    }
}

impl PostSink for PostWriter {
    fn emit(&mut self, post: &Post) -> OutputResult<()> {
        let (md_path, html_path) = self.paths_for(post);

        let markdown = format!("# {}\n\n{}", post.title, post.content_markdown);
        let html = format!("<h1>{}</h1>\n\n{}", post.title, post.content_html);

        for (path, content) in [(&md_path, markdown), (&html_path, html)] {
            fs::write(path, content).map_err(|source| OutputError::Write {
                path: path.clone(),
                source,
            })?;
        }

        tracing::debug!(id = %post.id, path = %md_path.display(), "Wrote post");
        Ok(())
    }
}

/// Deterministic file name stem: `<YYYY-MM-DD>-<id>-<title>`
pub fn file_stem(post: &Post) -> String {
    let date: String = post.published.chars().take(10).collect();
    let date = if date.is_empty() {
        "undated".to_string()
    } else {
        sanitize(&date)
    };

    format!("{}-{}-{}", date, sanitize(&post.id), sanitize(&post.title))
}

/// Replaces spaces with `_` and path-unsafe characters with `-`
fn sanitize(value: &str) -> String {
    value
        .trim()
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| match c {
            ' ' => '_',
            c if UNSAFE_CHARS.contains(&c) => '-',
            c => c,
        })
        .collect()
}
