use std::{
    fs::File,
    io::{BufWriter, copy},
    path::{Path, PathBuf},
};

use anyhow::{Context as _, bail};

/// Materializes a clip source as a local file.
pub trait ClipFetcher: Send + Sync {
    /// Stage `source` at `dest_stem` (plus the source's extension) and return the final path.
    fn fetch(&self, source: &str, dest_stem: &Path) -> anyhow::Result<PathBuf>;
}

/// Downloads `http(s)://` sources and copies `file://` URLs or plain paths.
#[derive(Clone, Debug, Default)]
pub struct StagingFetcher {
    client: reqwest::blocking::Client,
}

impl StagingFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    fn download(&self, url: &str, dest: &Path) -> anyhow::Result<()> {
        let mut resp = self
            .client
            .get(url)
            .send()
            .with_context(|| format!("request to '{url}' failed"))?;
        if !resp.status().is_success() {
            bail!("'{url}' answered with status {}", resp.status());
        }
        let file =
            File::create(dest).with_context(|| format!("failed to create '{}'", dest.display()))?;
        let mut writer = BufWriter::new(file);
        resp.copy_to(&mut writer)
            .with_context(|| format!("failed to download '{url}'"))?;
        Ok(())
    }
}

impl ClipFetcher for StagingFetcher {
    fn fetch(&self, source: &str, dest_stem: &Path) -> anyhow::Result<PathBuf> {
        let dest = with_source_extension(dest_stem, source);

        let staged = if is_remote(source) {
            self.download(source, &dest)
        } else {
            copy_local(source, &dest)
        };
        if let Err(e) = staged {
            discard_partial(&dest);
            return Err(e);
        }

        tracing::debug!(source, dest = %dest.display(), "staged clip");
        Ok(dest)
    }
}

fn copy_local(source: &str, dest: &Path) -> anyhow::Result<()> {
    let local = Path::new(source.strip_prefix("file://").unwrap_or(source));
    let mut src =
        File::open(local).with_context(|| format!("failed to open '{}'", local.display()))?;
    let mut dst =
        File::create(dest).with_context(|| format!("failed to create '{}'", dest.display()))?;
    copy(&mut src, &mut dst).with_context(|| format!("failed to copy '{}'", local.display()))?;
    Ok(())
}

fn discard_partial(dest: &Path) {
    match std::fs::remove_file(dest) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(
            path = %dest.display(),
            error = %e,
            "failed to remove partial download"
        ),
    }
}

fn is_remote(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// Reuse the source's file extension so demuxers can sniff the container.
fn with_source_extension(stem: &Path, source: &str) -> PathBuf {
    let path_part = source
        .split(['?', '#'])
        .next()
        .unwrap_or(source)
        .rsplit('/')
        .next()
        .unwrap_or("");
    match Path::new(path_part).extension().and_then(|e| e.to_str()) {
        Some(ext) if !ext.is_empty() && ext.len() <= 5 => {
            let mut name = stem.as_os_str().to_owned();
            name.push(".");
            name.push(ext);
            PathBuf::from(name)
        }
        _ => stem.to_path_buf(),
    }
}
