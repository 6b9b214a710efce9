use std::sync::Arc;
use std::thread;

use anyhow::Result;
use chrono::Utc;
use crossbeam_channel::{Receiver, Sender, unbounded};
use tracing::warn;

use crate::listing::entries_from_objects;
use crate::model::{Event, JobRequest, JobStatus, JobUpdate, ListingUpdate, Work};
use crate::ops::execute;
use crate::store::ObjectStore;

/// Runs listings and mutations off the UI thread. Results come back on the
/// event channel; requests are independent and complete in any order.
pub struct WorkerPool {
    request_tx: Option<Sender<JobRequest>>,
    handles: Vec<thread::JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(worker_count: usize, store: Arc<dyn ObjectStore>, event_tx: Sender<Event>) -> Self {
        let (request_tx, request_rx) = unbounded::<JobRequest>();
        let mut handles = Vec::new();

        for _ in 0..worker_count.max(1) {
            let worker_rx = request_rx.clone();
            let worker_event_tx = event_tx.clone();
            let worker_store = Arc::clone(&store);
            let handle =
                thread::spawn(move || worker_loop(worker_rx, worker_store, worker_event_tx));
            handles.push(handle);
        }

        Self {
            request_tx: Some(request_tx),
            handles,
        }
    }

    pub fn submit(&self, request: JobRequest) -> Result<()> {
        let tx = self
            .request_tx
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("worker pool is shut down"))?;
        tx.send(request)?;
        Ok(())
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        drop(self.request_tx.take());
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                warn!("worker thread terminated with panic");
            }
        }
    }
}

fn worker_loop(request_rx: Receiver<JobRequest>, store: Arc<dyn ObjectStore>, event_tx: Sender<Event>) {
    for request in request_rx {
        let event = match &request.work {
            Work::List { prefix } => run_listing(store.as_ref(), request.id, prefix),
            Work::Mutate(_) => {
                if event_tx
                    .send(Event::Job(update_for(&request, JobStatus::Running, None)))
                    .is_err()
                {
                    break;
                }
                run_mutation(store.as_ref(), &request)
            }
        };

        if event_tx.send(event).is_err() {
            break;
        }
    }
}

fn run_listing(store: &dyn ObjectStore, job_id: u64, prefix: &str) -> Event {
    let result = store
        .list(prefix)
        .map(|objects| entries_from_objects(prefix, &objects, Utc::now()))
        .map_err(|err| {
            warn!(operation = err.operation(), prefix, "listing failed: {err}");
            err.user_message()
        });
    Event::Listing(ListingUpdate {
        job_id,
        prefix: prefix.to_string(),
        result,
    })
}

fn run_mutation(store: &dyn ObjectStore, request: &JobRequest) -> Event {
    let Work::Mutate(mutation) = &request.work else {
        return Event::Job(update_for(request, JobStatus::Failed, None));
    };

    match execute(store, mutation) {
        Ok(()) => Event::Job(update_for(
            request,
            JobStatus::Done,
            Some(mutation.success_message()),
        )),
        Err(err) => {
            warn!(
                operation = err.operation(),
                target = mutation.target(),
                "mutation failed: {err}"
            );
            Event::Job(update_for(
                request,
                JobStatus::Failed,
                Some(format!("{} failed: {}", mutation.kind().label(), err.user_message())),
            ))
        }
    }
}

fn update_for(request: &JobRequest, status: JobStatus, message: Option<String>) -> JobUpdate {
    JobUpdate {
        id: request.id,
        kind: request.kind(),
        status,
        target: request.target(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use crossbeam_channel::unbounded;

    use super::WorkerPool;
    use crate::model::{Event, JobRequest, JobStatus, Work};
    use crate::ops::Mutation;
    use crate::store::MemoryStore;

    #[test]
    fn listing_job_reports_mapped_entries() {
        let store = MemoryStore::new("test");
        store.put_bytes("docs/readme.pdf", b"pdf".to_vec());
        store.put_bytes("img.png", b"png".to_vec());
        let (event_tx, event_rx) = unbounded();
        let pool = WorkerPool::new(1, Arc::new(store), event_tx);

        pool.submit(JobRequest {
            id: 7,
            work: Work::List {
                prefix: String::new(),
            },
        })
        .expect("submit");

        match event_rx.recv_timeout(Duration::from_secs(5)).expect("event") {
            Event::Listing(update) => {
                assert_eq!(update.job_id, 7);
                let entries = update.result.expect("listing ok");
                let ids: Vec<_> = entries.iter().map(|entry| entry.id.as_str()).collect();
                assert_eq!(ids, vec!["docs/", "docs/readme.pdf", "img.png"]);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn failed_mutation_reports_message() {
        let (event_tx, event_rx) = unbounded();
        let pool = WorkerPool::new(1, Arc::new(MemoryStore::new("test")), event_tx);

        pool.submit(JobRequest {
            id: 1,
            work: Work::Mutate(Mutation::Delete {
                object_name: "ghost.txt".to_string(),
            }),
        })
        .expect("submit");

        let mut statuses = Vec::new();
        while let Ok(Event::Job(update)) = event_rx.recv_timeout(Duration::from_secs(5)) {
            statuses.push(update.status);
            if update.status == JobStatus::Failed {
                assert!(
                    update
                        .message
                        .as_deref()
                        .is_some_and(|message| message.starts_with("delete failed")),
                    "unexpected message: {:?}",
                    update.message
                );
                break;
            }
        }
        assert_eq!(statuses, vec![JobStatus::Running, JobStatus::Failed]);
    }
}
