//! Shared test utilities for the ingestion crate.

use crate::artefact::download::{ArchiveDownloader, FetchError};
use std::io::{Cursor, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, mpsc};
use zip::write::SimpleFileOptions;

/// Manifest of the two-entry sample package built by [`PackageFixture::sample`].
pub const SAMPLE_META_XML: &str = r#"<meta>
    <info author="packsync" type="script" name="sample"/>
    <file src="foo.txt"/>
    <script src="bar.lua" type="client"/>
    <script src="server.lua" type="server"/>
    <export function="sampleClientExport" type="client"/>
    <export function="sampleServerExport" type="server"/>
</meta>"#;

/// Builds in-memory zip archives laid out like upstream package archives.
///
/// # Examples
///
/// ```
/// use packsync_ingest::test_utils::PackageFixture;
///
/// let bytes = PackageFixture::new("pkg")
///     .with_manifest("<meta/>")
///     .with_entry("a.txt", b"a")
///     .build();
/// assert!(!bytes.is_empty());
/// ```
#[derive(Debug, Clone, Default)]
pub struct PackageFixture {
    root: String,
    entries: Vec<(String, Vec<u8>)>,
}

impl PackageFixture {
    /// An empty package rooted at `root`.
    #[must_use]
    pub fn new(root: &str) -> Self {
        Self {
            root: root.trim_end_matches('/').to_owned(),
            entries: Vec::new(),
        }
    }

    /// The package from the reference scenario: asset `foo.txt` containing
    /// `abc`, client script `bar.lua` containing `return 1`, a server script,
    /// and one client plus one server export.
    #[must_use]
    pub fn sample(root: &str) -> Self {
        Self::new(root)
            .with_manifest(SAMPLE_META_XML)
            .with_entry("foo.txt", b"abc")
            .with_entry("bar.lua", b"return 1")
            .with_entry("server.lua", b"-- server only")
    }

    /// Add `meta.xml` under the package root.
    #[must_use]
    pub fn with_manifest(self, xml: &str) -> Self {
        self.with_entry("meta.xml", xml.as_bytes())
    }

    /// Add an entry under the package root.
    #[must_use]
    pub fn with_entry(self, path: &str, bytes: &[u8]) -> Self {
        let full = if self.root.is_empty() {
            path.to_owned()
        } else {
            format!("{}/{path}", self.root)
        };
        self.with_raw_entry(&full, bytes)
    }

    /// Add an entry at an absolute archive path, ignoring the package root.
    #[must_use]
    pub fn with_raw_entry(mut self, full_path: &str, bytes: &[u8]) -> Self {
        self.entries.push((full_path.to_owned(), bytes.to_vec()));
        self
    }

    /// Serialise the archive.
    ///
    /// # Panics
    ///
    /// Panics if the zip writer rejects an entry, which only happens for
    /// duplicate entry names.
    #[must_use]
    pub fn build(self) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        if !self.root.is_empty() {
            writer
                .add_directory(format!("{}/", self.root), SimpleFileOptions::default())
                .expect("add package root directory");
        }
        for (path, bytes) in self.entries {
            writer
                .start_file(path, SimpleFileOptions::default())
                .expect("start zip entry");
            writer.write_all(&bytes).expect("write zip entry");
        }
        writer.finish().expect("finish zip archive").into_inner()
    }
}

/// An [`ArchiveDownloader`] that serves a fixed response and counts calls.
///
/// A gated stub blocks every download until its [`DownloadGate`] is
/// released or dropped, which lets tests hold ingestion in flight.
#[derive(Debug)]
pub struct StubDownloader {
    response: Result<Vec<u8>, FetchError>,
    requests: AtomicUsize,
    urls: Mutex<Vec<String>>,
    gate: Option<Mutex<mpsc::Receiver<()>>>,
}

impl StubDownloader {
    /// Serve `bytes` for every request.
    #[must_use]
    pub fn serving(bytes: Vec<u8>) -> Self {
        Self::with_response(Ok(bytes))
    }

    /// Fail every request with `error`.
    #[must_use]
    pub fn failing(error: FetchError) -> Self {
        Self::with_response(Err(error))
    }

    fn with_response(response: Result<Vec<u8>, FetchError>) -> Self {
        Self {
            response,
            requests: AtomicUsize::new(0),
            urls: Mutex::new(Vec::new()),
            gate: None,
        }
    }

    /// Block downloads until the returned gate is released.
    #[must_use]
    pub fn gated(mut self) -> (Self, DownloadGate) {
        let (sender, receiver) = mpsc::channel();
        self.gate = Some(Mutex::new(receiver));
        (self, DownloadGate(sender))
    }

    /// Number of download calls received so far.
    #[must_use]
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// URLs requested so far, in order.
    #[must_use]
    pub fn urls(&self) -> Vec<String> {
        self.urls
            .lock()
            .map(|urls| urls.clone())
            .unwrap_or_default()
    }
}

impl ArchiveDownloader for StubDownloader {
    fn download(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut urls) = self.urls.lock() {
            urls.push(url.to_owned());
        }
        if let Some(gate) = &self.gate {
            if let Ok(receiver) = gate.lock() {
                // A dropped gate counts as released.
                receiver.recv().ok();
            }
        }
        self.response.clone()
    }
}

/// Releases a gated [`StubDownloader`].
#[derive(Debug)]
pub struct DownloadGate(mpsc::Sender<()>);

impl DownloadGate {
    /// Let the pending download complete.
    pub fn release(self) {
        self.0.send(()).ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn released_gate_lets_download_finish() {
        let (stub, gate) = StubDownloader::serving(b"body".to_vec()).gated();
        let stub = Arc::new(stub);
        let worker = {
            let stub = Arc::clone(&stub);
            thread::spawn(move || stub.download("http://mirror.test/p.zip"))
        };
        thread::sleep(Duration::from_millis(50));
        assert!(!worker.is_finished());

        gate.release();
        let body = worker.join().expect("download thread").expect("served");
        assert_eq!(body, b"body");
        assert_eq!(stub.requests(), 1);
    }

    #[test]
    fn dropped_gate_counts_as_released() {
        let (stub, gate) = StubDownloader::failing(FetchError::Transport {
            url: "http://mirror.test/p.zip".to_owned(),
            reason: "refused".to_owned(),
        })
        .gated();
        drop(gate);
        assert!(stub.download("http://mirror.test/p.zip").is_err());
        assert_eq!(stub.urls(), vec!["http://mirror.test/p.zip"]);
    }
}
