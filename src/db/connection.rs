use std::{
    path::{Path, PathBuf},
    sync::{mpsc, Arc, Mutex, PoisonError},
    thread::{self, JoinHandle},
    time::Duration,
};

use anyhow::{anyhow, Context, Result};
use log::{debug, error, info};
use rusqlite::Connection;
use tokio::sync::oneshot;

use super::migrations::run_migrations;

const WORKER_THREAD_NAME: &str = "linepace-db";
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

type StoreJob = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum StoreCommand {
    Run(StoreJob),
    Close,
}

/// Owns the worker thread. Dropping the last [`Database`] clone closes the
/// connection after every queued job has run.
struct StoreWorker {
    commands: mpsc::Sender<StoreCommand>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl StoreWorker {
    fn close(&self) {
        let Some(handle) = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        else {
            return;
        };

        if self.commands.send(StoreCommand::Close).is_err() {
            error!("Store worker exited before close was requested");
        }
        if let Err(panic) = handle.join() {
            error!("Store worker panicked: {panic:?}");
        }
    }
}

impl Drop for StoreWorker {
    fn drop(&mut self) {
        self.close();
    }
}

/// Handle to the SQLite store.
///
/// A single connection lives on a dedicated worker thread and runs jobs
/// strictly in the order they were sent, so writes issued by one caller
/// land in the order that caller issued them.
#[derive(Clone)]
pub struct Database {
    worker: Arc<StoreWorker>,
    db_path: Arc<PathBuf>,
}

impl Database {
    pub fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }

        let (command_tx, command_rx) = mpsc::channel::<StoreCommand>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<()>>();
        let path = db_path.clone();

        let handle = thread::Builder::new()
            .name(WORKER_THREAD_NAME.into())
            .spawn(move || {
                let mut conn = match open_connection(&path) {
                    Ok(conn) => conn,
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return;
                    }
                };
                if ready_tx.send(Ok(())).is_err() {
                    return;
                }
                serve(&mut conn, command_rx);
            })
            .context("failed to spawn store worker thread")?;

        ready_rx
            .recv()
            .context("store worker exited before signaling readiness")??;

        info!("Store ready at {}", db_path.display());

        Ok(Self {
            worker: Arc::new(StoreWorker {
                commands: command_tx,
                handle: Mutex::new(Some(handle)),
            }),
            db_path: Arc::new(db_path),
        })
    }

    pub fn path(&self) -> &Path {
        self.db_path.as_path()
    }

    /// Runs `job` on the worker's connection and awaits its result.
    pub async fn execute<F, T>(&self, job: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();

        let command = StoreCommand::Run(Box::new(move |conn| {
            // The caller may have given up; the job's effects still stand.
            let _ = reply_tx.send(job(conn));
        }));

        self.worker
            .commands
            .send(command)
            .map_err(|_| anyhow!("store worker is no longer accepting jobs"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("store worker dropped the job without replying"))?
    }
}

/// Opens the file, applies connection pragmas and brings the schema up to
/// date.
fn open_connection(path: &Path) -> Result<Connection> {
    let mut conn = Connection::open(path)
        .with_context(|| format!("failed to open SQLite database {}", path.display()))?;

    conn.busy_timeout(BUSY_TIMEOUT)
        .context("failed to set busy timeout")?;
    for (pragma, value) in [("journal_mode", "WAL"), ("foreign_keys", "ON")] {
        if let Err(err) = conn.pragma_update(None, pragma, value) {
            error!("Failed to set {pragma} = {value}: {err}");
        }
    }

    run_migrations(&mut conn).context("failed to run database migrations")?;
    Ok(conn)
}

fn serve(conn: &mut Connection, commands: mpsc::Receiver<StoreCommand>) {
    let mut jobs: u64 = 0;
    while let Ok(command) = commands.recv() {
        match command {
            StoreCommand::Run(job) => {
                job(conn);
                jobs += 1;
            }
            StoreCommand::Close => break,
        }
    }
    debug!("Store worker closing after {jobs} jobs");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_jobs_run_in_submission_order() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("nested/dir/store.sqlite3")).unwrap();

        db.execute(|conn| {
            conn.execute_batch("CREATE TABLE seq (n INTEGER NOT NULL)")?;
            Ok(())
        })
        .await
        .unwrap();

        let pending: Vec<_> = (0..20)
            .map(|n| {
                db.execute(move |conn| {
                    conn.execute("INSERT INTO seq (n) VALUES (?1)", [n])?;
                    Ok(())
                })
            })
            .collect();
        for job in pending {
            job.await.unwrap();
        }

        let stored: Vec<i64> = db
            .execute(|conn| {
                let mut stmt = conn.prepare("SELECT n FROM seq ORDER BY rowid")?;
                let rows = stmt.query_map([], |row| row.get(0))?;
                Ok(rows.collect::<rusqlite::Result<Vec<i64>>>()?)
            })
            .await
            .unwrap();
        assert_eq!(stored, (0..20).collect::<Vec<_>>());
    }
}
