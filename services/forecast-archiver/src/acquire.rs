//! Acquisition of one forecast cycle: listing, download, per-file indexing.
//!
//! A cycle that cannot be listed is fatal; an individual file that fails to
//! download or to index is logged and left out of the sequence handed to the
//! merge stage, which is exactly how the rest of the pipeline expects
//! partial cycles to look.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use futures::stream::{self, StreamExt};
use regex::Regex;
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use grib_index::FileIndex;

/// Keeps only the parameters the user asked for; keeps everything when no
/// list was given.
#[derive(Debug, Clone, Default)]
pub struct VariableFilter {
    variables: Option<HashSet<String>>,
}

impl VariableFilter {
    pub fn new(variables: Option<Vec<String>>) -> Self {
        Self {
            variables: variables.map(|v| v.into_iter().collect()),
        }
    }

    pub fn keeps(&self, param: &str) -> bool {
        match &self.variables {
            Some(set) => set.contains(param),
            None => true,
        }
    }
}

/// Fetch a cycle's file listing as (url, filename) pairs.
///
/// A listing that cannot be retrieved aborts the run for this cycle.
pub async fn list_grib_files(client: &Client, listing_url: &str) -> Result<Vec<(String, String)>> {
    let response = client
        .get(listing_url)
        .send()
        .await
        .with_context(|| format!("listing request to {listing_url} failed"))?;

    if !response.status().is_success() {
        bail!(
            "forecast not available at {listing_url} (status {})",
            response.status()
        );
    }
    let body = response.text().await.context("reading listing body")?;

    let link = Regex::new(r#"<a href="([^"]*)">([^<]*\.grib2)</a>"#)
        .expect("listing regex is valid");
    let mut files = Vec::new();
    for line in body.lines() {
        if let Some(caps) = link.captures(line) {
            files.push((caps[1].to_string(), caps[2].to_string()));
        }
    }

    info!(url = listing_url, files = files.len(), "listed forecast cycle");
    Ok(files)
}

/// Download one file into the cache, streaming through a partial file.
///
/// An already complete download is reused without touching the network.
pub async fn download_file(client: &Client, url: &str, dest: &Path) -> Result<()> {
    if dest.exists() {
        debug!(path = %dest.display(), "file already cached, skipping download");
        return Ok(());
    }

    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("request to {url} failed"))?
        .error_for_status()
        .with_context(|| format!("download of {url} failed"))?;

    let partial = dest.with_extension("grib2.partial");
    let mut out = tokio::fs::File::create(&partial)
        .await
        .with_context(|| format!("creating {}", partial.display()))?;

    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        let chunk = chunk.context("reading download stream")?;
        out.write_all(&chunk).await?;
    }
    out.flush().await?;
    drop(out);

    tokio::fs::rename(&partial, dest).await?;
    debug!(url, path = %dest.display(), "downloaded");
    Ok(())
}

/// Download and index every file of a cycle.
///
/// Returns the sidecar paths of the files that made it through both steps;
/// failures are logged and simply absent from the result.
pub async fn fetch_cycle(
    client: &Client,
    base_url: &str,
    listing_url: &str,
    cache_dir: &Path,
    filter: &VariableFilter,
    concurrency: usize,
) -> Result<Vec<PathBuf>> {
    let files = list_grib_files(client, listing_url).await?;

    let results = stream::iter(files)
        .map(|(relurl, filename)| {
            let url = format!("{}{relurl}", base_url.trim_end_matches('/'));
            let dest = cache_dir.join(&filename);
            async move {
                match fetch_one(client, &url, &dest, filter).await {
                    Ok(sidecar) => Some(sidecar),
                    Err(err) => {
                        warn!(url, error = %err, "skipping file");
                        None
                    }
                }
            }
        })
        .buffer_unordered(concurrency.max(1))
        .collect::<Vec<_>>()
        .await;

    let mut sidecars: Vec<PathBuf> = results.into_iter().flatten().collect();
    // Deterministic merge input order regardless of download completion order.
    sidecars.sort();

    info!(
        indexed = sidecars.len(),
        cache = %cache_dir.display(),
        "cycle acquisition finished"
    );
    Ok(sidecars)
}

async fn fetch_one(
    client: &Client,
    url: &str,
    dest: &Path,
    filter: &VariableFilter,
) -> Result<PathBuf> {
    download_file(client, url, dest).await?;

    // Indexing reads headers only; cheap enough next to the download, but
    // blocking, so keep it off the async runtime's core threads.
    let dest = dest.to_path_buf();
    let filter = filter.clone();
    let sidecar = tokio::task::spawn_blocking(move || -> Result<PathBuf> {
        let mut index = FileIndex::build(&dest)?;
        index.entries.retain(|entry| filter.keeps(&entry.param));
        Ok(index.write_sidecar()?)
    })
    .await
    .context("index task panicked")??;

    Ok(sidecar)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_defaults_to_keeping_everything() {
        let all = VariableFilter::new(None);
        assert!(all.keeps("t"));
        assert!(all.keeps("unknown_9_9_99"));

        let some = VariableFilter::new(Some(vec!["t".into(), "u".into()]));
        assert!(some.keeps("t"));
        assert!(!some.keeps("gh"));
    }

    #[test]
    fn listing_regex_extracts_grib_links() {
        let link = Regex::new(r#"<a href="([^"]*)">([^<]*\.grib2)</a>"#).unwrap();
        let line = r#"<tr><td><a href="/forecasts/20260807/00z/0p25/oper/x-0h-oper-fc.grib2">x-0h-oper-fc.grib2</a></td></tr>"#;
        let caps = link.captures(line).unwrap();
        assert_eq!(&caps[1], "/forecasts/20260807/00z/0p25/oper/x-0h-oper-fc.grib2");
        assert_eq!(&caps[2], "x-0h-oper-fc.grib2");

        assert!(link.captures(r#"<a href="/data/readme.html">readme</a>"#).is_none());
    }
}
