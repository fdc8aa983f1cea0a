//! Producers of "something changed" signals for the watch command.

use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use anyhow::{bail, Context as _, Result};
use flickrdown_logging::{flickrdown_debug, flickrdown_error, flickrdown_info};
use futures_util::stream::{self, BoxStream, Stream, StreamExt};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Prefix of the temp files `tempfile` stages atomic writes in.
const STAGING_PREFIX: &str = ".tmp";

/// One item per relevant change under a watched directory.
///
/// Owns the watcher; dropping the stream stops watching.
pub struct DirectoryChanges {
    _watcher: RecommendedWatcher,
    events: mpsc::UnboundedReceiver<()>,
}

impl Stream for DirectoryChanges {
    type Item = ();

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<()>> {
        self.events.poll_recv(cx)
    }
}

/// Paths the archiver writes itself; changes to them never trigger a pass.
#[derive(Debug, Clone)]
struct OwnWrites {
    archive_dir: PathBuf,
    statefile: PathBuf,
}

impl OwnWrites {
    fn new(archive_dir: &Path, statefile: &Path) -> Self {
        Self {
            archive_dir: archive_dir
                .canonicalize()
                .or_else(|_| std::path::absolute(archive_dir))
                .unwrap_or_else(|_| archive_dir.to_path_buf()),
            statefile: canonical_file(statefile),
        }
    }

    fn contains(&self, path: &Path) -> bool {
        if path == self.statefile || path.starts_with(&self.archive_dir) {
            return true;
        }
        // Staged writes land beside the state file before being renamed over it.
        path.parent() == self.statefile.parent()
            && path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with(STAGING_PREFIX))
    }
}

/// Watches `dir` recursively, ignoring everything written under `archive_dir`
/// and writes to `statefile`.
///
/// A `dir` inside `archive_dir` is rejected.
pub fn watch_directory(
    dir: &Path,
    archive_dir: &Path,
    statefile: &Path,
) -> Result<DirectoryChanges> {
    let dir = dir
        .canonicalize()
        .with_context(|| format!("cannot watch {}", dir.display()))?;
    let ignored = OwnWrites::new(archive_dir, statefile);
    if dir.starts_with(&ignored.archive_dir) {
        bail!(
            "watch directory {} lies inside the archive {}",
            dir.display(),
            ignored.archive_dir.display()
        );
    }
    let (tx, events) = mpsc::unbounded_channel();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if is_relevant(&event, &ignored) {
                    flickrdown_debug!("File watch event: {:?}", event);
                    let _ = tx.send(());
                }
            }
            Err(err) => flickrdown_error!("Watch error: {}", err),
        },
        Config::default(),
    )
    .context("failed to create file watcher")?;

    watcher
        .watch(&dir, RecursiveMode::Recursive)
        .with_context(|| format!("failed to watch {}", dir.display()))?;
    flickrdown_info!("Watching {} for changes", dir.display());

    Ok(DirectoryChanges {
        _watcher: watcher,
        events,
    })
}

/// Creates, modifications and removals count; access events and our own
/// writes do not.
fn is_relevant(event: &Event, ignored: &OwnWrites) -> bool {
    let interesting = matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    );
    interesting
        && (event.paths.is_empty() || !event.paths.iter().all(|path| ignored.contains(path)))
}

fn canonical_file(path: &Path) -> PathBuf {
    let parent = path.parent().filter(|dir| !dir.as_os_str().is_empty());
    match (parent.and_then(|dir| dir.canonicalize().ok()), path.file_name()) {
        (Some(dir), Some(name)) => dir.join(name),
        _ => path.to_path_buf(),
    }
}

/// Yields once every `period`, starting one period from now.
pub fn sweep(period: Duration) -> impl Stream<Item = ()> + Send + 'static {
    let mut ticks = interval_at(Instant::now() + period, period);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
    stream::unfold(ticks, |mut ticks| async move {
        ticks.tick().await;
        flickrdown_debug!("Sweep timer fired");
        Some(((), ticks))
    })
}

/// Interleaves every source into one stream.
pub fn merge(sources: Vec<BoxStream<'static, ()>>) -> BoxStream<'static, ()> {
    stream::select_all(sources).boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, ModifyKind, RemoveKind};
    use tempfile::TempDir;

    fn event(kind: EventKind, paths: &[&str]) -> Event {
        paths
            .iter()
            .fold(Event::new(kind), |event, path| event.add_path(PathBuf::from(path)))
    }

    fn own_writes() -> OwnWrites {
        OwnWrites::new(Path::new("/archive"), Path::new("/state/.flickrdown_state.ron"))
    }

    #[test]
    fn content_changes_are_relevant() {
        let state = &own_writes();
        for kind in [
            EventKind::Create(CreateKind::File),
            EventKind::Modify(ModifyKind::Any),
            EventKind::Remove(RemoveKind::File),
        ] {
            assert!(is_relevant(&event(kind, &["/photos/new.jpg"]), state));
        }
        assert!(!is_relevant(
            &event(EventKind::Access(AccessKind::Any), &["/photos/new.jpg"]),
            state
        ));
    }

    #[test]
    fn watermark_writes_are_ignored() {
        let state = &own_writes();
        let create = || EventKind::Create(CreateKind::File);

        assert!(!is_relevant(&event(create(), &["/state/.flickrdown_state.ron"]), state));
        assert!(!is_relevant(&event(create(), &["/state/.tmpA1b2C3"]), state));
        assert!(!is_relevant(
            &event(
                EventKind::Modify(ModifyKind::Any),
                &["/state/.tmpA1b2C3", "/state/.flickrdown_state.ron"]
            ),
            state
        ));
        // A rename that also touches real content still counts.
        assert!(is_relevant(
            &event(create(), &["/state/.flickrdown_state.ron", "/photos/a.jpg"]),
            state
        ));
    }

    #[test]
    fn archive_writes_are_ignored() {
        let state = &own_writes();
        let create = || EventKind::Create(CreateKind::File);

        assert!(!is_relevant(&event(create(), &["/archive/2016/03/photo.meta"]), state));
        assert!(!is_relevant(&event(create(), &["/archive/2016/03/.tmpX"]), state));
        assert!(!is_relevant(
            &event(EventKind::Modify(ModifyKind::Any), &["/archive/2016/03/photo.jpg"]),
            state
        ));
        assert!(is_relevant(&event(create(), &["/archive-old/photo.jpg"]), state));
    }

    #[test]
    fn statefile_is_resolved_against_its_directory() {
        let temp = TempDir::new().unwrap();
        let canonical = temp.path().canonicalize().unwrap();
        assert_eq!(
            canonical_file(&temp.path().join("state.ron")),
            canonical.join("state.ron")
        );
        assert_eq!(
            canonical_file(Path::new("/no/such/dir/state.ron")),
            PathBuf::from("/no/such/dir/state.ron")
        );
    }

    #[test]
    fn missing_watch_dir_is_an_error() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("missing");
        assert!(watch_directory(&missing, temp.path(), &missing.join("state.ron")).is_err());
    }

    #[test]
    fn watch_dir_inside_archive_is_rejected() {
        let temp = TempDir::new().unwrap();
        let state = temp.path().join(".flickrdown_state.ron");
        assert!(watch_directory(temp.path(), temp.path(), &state).is_err());

        let nested = temp.path().join("2016");
        std::fs::create_dir(&nested).unwrap();
        assert!(watch_directory(&nested, temp.path(), &state).is_err());
    }

    #[tokio::test]
    async fn sweep_ticks_after_each_period() {
        let period = Duration::from_millis(20);
        let started = Instant::now();
        let ticks: Vec<()> =
            tokio::time::timeout(Duration::from_secs(5), sweep(period).take(2).collect())
                .await
                .unwrap();
        assert_eq!(ticks.len(), 2);
        assert!(started.elapsed() >= period * 2);
    }

    #[tokio::test]
    async fn merged_sources_keep_every_signal() {
        let merged = merge(vec![
            stream::iter(vec![(); 2]).boxed(),
            stream::iter(vec![(); 3]).boxed(),
        ]);
        assert_eq!(merged.count().await, 5);
        assert_eq!(merge(Vec::new()).count().await, 0);
    }

    #[tokio::test]
    async fn file_creation_triggers_a_change() {
        let temp = TempDir::new().unwrap();
        let state = temp.path().join(".flickrdown_state.ron");
        let archive = temp.path().join("archive");
        let mut changes = watch_directory(temp.path(), &archive, &state).unwrap();

        std::fs::write(temp.path().join("photo.jpg"), b"jpeg").unwrap();

        let change = tokio::time::timeout(Duration::from_secs(10), changes.next()).await;
        assert_eq!(change.unwrap(), Some(()));
    }

    #[tokio::test]
    async fn archiver_output_does_not_trigger() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("archive");
        std::fs::create_dir(&archive).unwrap();
        let state = archive.join(".flickrdown_state.ron");
        let mut changes = watch_directory(temp.path(), &archive, &state).unwrap();

        flickrdown_engine::write_atomic(&archive.join("2016/03/photo.meta"), b"{}").unwrap();
        flickrdown_engine::write_atomic(&state, b"()").unwrap();

        let change = tokio::time::timeout(Duration::from_millis(500), changes.next()).await;
        assert!(change.is_err(), "archive writes produced {change:?}");
    }
}
