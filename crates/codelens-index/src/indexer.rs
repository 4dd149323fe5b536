//! Project indexing orchestrator: scan → chunk → embed → store → prune.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use codelens_llm::EmbedFn;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::chunker::{Chunker, ChunkerConfig, Fragment};
use crate::error::{IndexError, Result};
use crate::languages::LanguageStrategyMap;
use crate::scanner::{IgnoreRules, ScannerConfig, TreeScanner};
use crate::store::{VectorIndex, VectorIndexConfig};
use crate::vector_store::VectorStore;

/// Indexer configuration.
#[derive(Debug, Clone, Default)]
pub struct IndexerConfig {
    pub rules: IgnoreRules,
    pub strategies: LanguageStrategyMap,
    pub scanner: ScannerConfig,
    pub chunker: ChunkerConfig,
    pub index: VectorIndexConfig,
}

/// Summary of a finished indexing run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexReport {
    pub collection: String,
    pub files_scanned: usize,
    pub fragments_total: usize,
    pub fragments_indexed: usize,
    pub fragments_removed: usize,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "message", rename_all = "lowercase")]
pub enum JobState {
    /// Waiting for another run on the same collection to finish.
    Pending,
    Running,
    Succeeded,
    Failed(String),
}

/// Observable progress of one indexing job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobStatus {
    pub state: JobState,
    pub files_scanned: usize,
    pub fragments_total: usize,
    pub fragments_indexed: usize,
    pub fragments_removed: usize,
}

impl JobStatus {
    fn pending() -> Self {
        Self {
            state: JobState::Pending,
            files_scanned: 0,
            fragments_total: 0,
            fragments_indexed: 0,
            fragments_removed: 0,
        }
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        matches!(self.state, JobState::Succeeded | JobState::Failed(_))
    }

    /// `error` followed by the progress committed before it.
    fn failure_message(&self, error: &IndexError) -> String {
        format!(
            "{error} after {}/{} fragments ({} files)",
            self.fragments_indexed, self.fragments_total, self.files_scanned
        )
    }
}

/// A background indexing run.
#[derive(Debug)]
pub struct JobHandle {
    collection: String,
    status: watch::Receiver<JobStatus>,
    task: JoinHandle<Result<IndexReport>>,
}

impl JobHandle {
    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Latest status snapshot.
    #[must_use]
    pub fn status(&self) -> JobStatus {
        self.status.borrow().clone()
    }

    /// Receiver that observes every status update.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<JobStatus> {
        self.status.clone()
    }

    /// Wait for the run to finish.
    ///
    /// # Errors
    ///
    /// Returns the run's error, or [`IndexError::JobFailed`] if the task panicked
    /// or was cancelled.
    pub async fn wait(self) -> Result<IndexReport> {
        self.task
            .await
            .map_err(|e| IndexError::JobFailed(e.to_string()))?
    }
}

type Registry<T> = Arc<Mutex<HashMap<String, T>>>;

/// Runs indexing jobs; one writer per collection at a time.
#[derive(Clone)]
pub struct CodeIndexer {
    store: Arc<dyn VectorStore>,
    embed: EmbedFn,
    config: Arc<IndexerConfig>,
    locks: Registry<Arc<tokio::sync::Mutex<()>>>,
    jobs: Registry<watch::Receiver<JobStatus>>,
}

impl std::fmt::Debug for CodeIndexer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodeIndexer")
            .field("location", &self.store.location())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl CodeIndexer {
    #[must_use]
    pub fn new(store: Arc<dyn VectorStore>, embed: EmbedFn, config: IndexerConfig) -> Self {
        Self {
            store,
            embed,
            config: Arc::new(config),
            locks: Arc::default(),
            jobs: Arc::default(),
        }
    }

    #[must_use]
    pub fn index(&self, collection: &str) -> VectorIndex {
        VectorIndex::new(Arc::clone(&self.store), collection, self.config.index)
    }

    /// Index `root` into `collection` and wait for the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the root cannot be scanned, embedding fails, or the
    /// backend rejects a write.
    pub async fn index_project(&self, root: &Path, collection: &str) -> Result<IndexReport> {
        self.spawn(root, collection).wait().await
    }

    /// Start indexing in the background and return immediately.
    #[must_use]
    pub fn spawn(&self, root: &Path, collection: &str) -> JobHandle {
        let (tx, rx) = watch::channel(JobStatus::pending());
        self.jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(collection.to_owned(), rx.clone());

        let lock = self.collection_lock(collection);
        let this = self.clone();
        let root = root.to_path_buf();
        let name = collection.to_owned();
        let task = tokio::spawn(async move {
            let _guard = lock.lock().await;
            tx.send_modify(|s| s.state = JobState::Running);
            tracing::info!(collection = %name, root = %root.display(), "indexing started");

            let result = this.run(root, &name, &tx).await;
            match &result {
                Ok(report) => {
                    tx.send_modify(|s| s.state = JobState::Succeeded);
                    tracing::info!(
                        collection = %name,
                        files = report.files_scanned,
                        fragments = report.fragments_indexed,
                        removed = report.fragments_removed,
                        duration_ms = report.duration_ms,
                        "indexing finished"
                    );
                }
                Err(e) => {
                    tx.send_modify(|s| s.state = JobState::Failed(s.failure_message(e)));
                    let s = tx.borrow();
                    tracing::warn!(
                        collection = %name,
                        error = %e,
                        files = s.files_scanned,
                        progress = format_args!("{}/{}", s.fragments_indexed, s.fragments_total),
                        "indexing failed"
                    );
                }
            }
            result
        });

        JobHandle {
            collection: collection.to_owned(),
            status: rx,
            task,
        }
    }

    /// Status of the most recently spawned job for `collection`.
    #[must_use]
    pub fn job_status(&self, collection: &str) -> Option<JobStatus> {
        let jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        jobs.get(collection).map(|rx| rx.borrow().clone())
    }

    fn collection_lock(&self, collection: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(collection.to_owned()).or_default())
    }

    async fn run(
        &self,
        root: PathBuf,
        collection: &str,
        tx: &watch::Sender<JobStatus>,
    ) -> Result<IndexReport> {
        let start = Instant::now();
        let scanner = TreeScanner::new(
            root,
            self.config.rules.clone(),
            self.config.strategies.clone(),
            self.config.scanner.clone(),
        )?;
        let chunker = Chunker::new(self.config.chunker, self.config.strategies.clone());

        let (files_scanned, fragments) =
            tokio::task::spawn_blocking(move || scan_and_chunk(&scanner, &chunker)).await?;
        tx.send_modify(|s| {
            s.files_scanned = files_scanned;
            s.fragments_total = fragments.len();
        });
        tracing::info!(collection, files_scanned, fragments = fragments.len(), "tree chunked");

        let index = self.index(collection);
        let fragments_indexed = if fragments.is_empty() {
            0
        } else {
            index
                .upsert_batch(&fragments, &self.embed, |done| {
                    tx.send_modify(|s| s.fragments_indexed = done);
                    tracing::info!(
                        collection,
                        progress = format_args!("{done}/{}", fragments.len()),
                        "embedding"
                    );
                })
                .await?
        };

        let keep: HashSet<String> = fragments.iter().map(Fragment::id).collect();
        let fragments_removed = index.prune(&keep).await?;
        tx.send_modify(|s| s.fragments_removed = fragments_removed);

        Ok(IndexReport {
            collection: collection.to_owned(),
            files_scanned,
            fragments_total: fragments.len(),
            fragments_indexed,
            fragments_removed,
            duration_ms: start.elapsed().as_millis().try_into().unwrap_or(u64::MAX),
        })
    }
}

fn scan_and_chunk(scanner: &TreeScanner, chunker: &Chunker) -> (usize, Vec<Fragment>) {
    let mut files = 0usize;
    let mut fragments = Vec::new();
    for file in scanner.scan() {
        files += 1;
        let produced = chunker.chunk_file(&file);
        tracing::debug!(file = %file.relative_path, fragments = produced.len(), "chunked");
        fragments.extend(produced);
    }
    (files, fragments)
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::time::Duration;

    use codelens_llm::LlmError;
    use codelens_llm::provider::EmbedFuture;
    use codelens_llm::retry::RetryPolicy;

    use super::*;
    use crate::in_memory_store::InMemoryVectorStore;

    fn length_embed() -> EmbedFn {
        Arc::new(|text: &str| -> EmbedFuture {
            #[allow(clippy::cast_precision_loss)]
            let v = vec![text.len() as f32, 1.0, (text.len() % 7) as f32];
            Box::pin(async move { Ok::<_, LlmError>(v) })
        })
    }

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn indexer(embed: EmbedFn) -> CodeIndexer {
        CodeIndexer::new(
            Arc::new(InMemoryVectorStore::new()),
            embed,
            IndexerConfig {
                index: VectorIndexConfig {
                    retry: RetryPolicy::none(),
                    ..VectorIndexConfig::default()
                },
                ..IndexerConfig::default()
            },
        )
    }

    #[tokio::test]
    async fn index_project_reports_counts() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "src/main.py", "print('hello')\n");
        write(dir.path(), "README.md", "# App\nSome docs.\n");
        write(dir.path(), "node_modules/x/index.js", "var a = 1;");

        let idx = indexer(length_embed());
        let report = idx.index_project(dir.path(), "codelens-t").await.unwrap();
        assert_eq!(report.files_scanned, 2);
        assert_eq!(report.fragments_total, 2);
        assert_eq!(report.fragments_indexed, 2);
        assert_eq!(report.fragments_removed, 0);

        let status = idx.job_status("codelens-t").unwrap();
        assert_eq!(status.state, JobState::Succeeded);
        assert_eq!(status.fragments_indexed, 2);
    }

    #[tokio::test]
    async fn reindex_prunes_deleted_files() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.txt", "alpha");
        write(dir.path(), "b.txt", "beta");

        let idx = indexer(length_embed());
        idx.index_project(dir.path(), "c").await.unwrap();
        fs::remove_file(dir.path().join("b.txt")).unwrap();

        let report = idx.index_project(dir.path(), "c").await.unwrap();
        assert_eq!(report.fragments_removed, 1);
        assert_eq!(idx.index("c").stats().await.unwrap().total_records, 1);
    }

    #[tokio::test]
    async fn failing_provider_marks_job_failed() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.txt", "alpha");
        let failing: EmbedFn = Arc::new(|_text: &str| -> EmbedFuture {
            Box::pin(async { Err::<Vec<f32>, _>(LlmError::Other("no model".into())) })
        });

        let idx = indexer(failing);
        let handle = idx.spawn(dir.path(), "f");
        let mut rx = handle.subscribe();
        let err = handle.wait().await.unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Provider);

        rx.wait_for(JobStatus::is_finished).await.unwrap();
        let status = idx.job_status("f").unwrap();
        assert!(matches!(status.state, JobState::Failed(ref m) if m.contains("no model")));
        assert_eq!(status.files_scanned, 1);
        assert_eq!(status.fragments_indexed, 0);
    }

    #[tokio::test]
    async fn failure_message_reports_partial_progress() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let dir = tempfile::tempdir().unwrap();
        for name in ["a", "b", "c", "d", "e"] {
            write(dir.path(), &format!("{name}.txt"), &format!("notes for {name}"));
        }
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let flaky: EmbedFn = Arc::new(move |_text: &str| -> EmbedFuture {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                if n >= 2 {
                    Err(LlmError::Other("provider down".into()))
                } else {
                    Ok(vec![1.0, 0.0])
                }
            })
        });

        let idx = CodeIndexer::new(
            Arc::new(InMemoryVectorStore::new()),
            flaky,
            IndexerConfig {
                index: VectorIndexConfig {
                    batch_size: 2,
                    retry: RetryPolicy::none(),
                    ..VectorIndexConfig::default()
                },
                ..IndexerConfig::default()
            },
        );
        let handle = idx.spawn(dir.path(), "p");
        let mut rx = handle.subscribe();
        let err = handle.wait().await.unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Provider);

        rx.wait_for(JobStatus::is_finished).await.unwrap();
        let status = idx.job_status("p").unwrap();
        assert_eq!(status.fragments_indexed, 2);
        let JobState::Failed(message) = status.state else {
            panic!("expected failure, got {:?}", status.state);
        };
        assert!(message.contains("provider down"), "{message}");
        assert!(message.ends_with("after 2/5 fragments (5 files)"), "{message}");
        assert_eq!(idx.index("p").stats().await.unwrap().total_records, 2);
    }

    #[tokio::test]
    async fn missing_root_fails_job_with_scan_kind() {
        let idx = indexer(length_embed());
        let err = idx
            .index_project(Path::new("/no/such/project"), "m")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Scan);
    }

    #[tokio::test]
    async fn same_collection_runs_are_serialized() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.txt", "alpha");
        let slow: EmbedFn = Arc::new(|_text: &str| -> EmbedFuture {
            Box::pin(async {
                tokio::time::sleep(Duration::from_millis(100)).await;
                Ok::<_, LlmError>(vec![1.0, 0.0])
            })
        });

        let idx = indexer(slow);
        let first = idx.spawn(dir.path(), "s");
        let mut first_rx = first.subscribe();
        first_rx
            .wait_for(|s| s.state == JobState::Running)
            .await
            .unwrap();
        let second = idx.spawn(dir.path(), "s");
        assert_eq!(second.status().state, JobState::Pending);

        first.wait().await.unwrap();
        let report = second.wait().await.unwrap();
        assert_eq!(report.fragments_indexed, 1);
    }

    #[tokio::test]
    async fn empty_tree_succeeds_with_nothing_indexed() {
        let dir = tempfile::tempdir().unwrap();
        let idx = indexer(length_embed());
        let report = idx.index_project(dir.path(), "e").await.unwrap();
        assert_eq!(report.fragments_total, 0);
        assert_eq!(idx.index("e").stats().await.unwrap().total_records, 0);
    }

    #[test]
    fn job_state_serializes_tagged() {
        let json = serde_json::to_value(JobState::Failed("boom".into())).unwrap();
        assert_eq!(json, serde_json::json!({"state": "failed", "message": "boom"}));
        let json = serde_json::to_value(JobState::Running).unwrap();
        assert_eq!(json, serde_json::json!({"state": "running"}));
    }
}
