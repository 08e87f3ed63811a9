use std::collections::{BTreeMap, HashMap};
use std::sync::mpsc::{Receiver, Sender};
use std::thread::{self, JoinHandle};

use bus::{PortId, StoreCommand, StoreReply, StoreRequest};
use core_types::{TimestampMs, VideoId};

#[derive(Clone, Debug, Default)]
pub struct StoreOptions {
    /// Ask every connecting page to hide the site's own resume bar.
    pub hide_progress_bar: bool,
    /// Videos that start out watched.
    pub preload: Vec<VideoId>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WatchRecord {
    pub title: String,
    pub first_watched: TimestampMs,
    pub last_watched: TimestampMs,
}

/// In-memory watched-state authority.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: HashMap<VideoId, WatchRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_watched(&self, video: &VideoId) -> bool {
        self.records.contains_key(video)
    }

    pub fn record(&self, video: &VideoId) -> Option<&WatchRecord> {
        self.records.get(video)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Unknown ids answer `false`.
    pub fn lookup(&self, videos: &[VideoId]) -> BTreeMap<VideoId, bool> {
        videos
            .iter()
            .map(|video| (video.clone(), self.is_watched(video)))
            .collect()
    }

    /// Idempotent; returns whether the video just became watched.
    pub fn mark_watched(&mut self, video: VideoId, title: String, at: TimestampMs) -> bool {
        match self.records.get_mut(&video) {
            Some(existing) => {
                existing.last_watched = existing.last_watched.max(at);
                if !title.is_empty() {
                    existing.title = title;
                }
                false
            }
            None => {
                self.records.insert(
                    video,
                    WatchRecord {
                        title,
                        first_watched: at,
                        last_watched: at,
                    },
                );
                true
            }
        }
    }
}

struct StoreRuntime {
    store: MemoryStore,
    ports: BTreeMap<PortId, Sender<StoreReply>>,
    options: StoreOptions,
}

impl StoreRuntime {
    fn handle(&mut self, cmd: StoreCommand) {
        match cmd {
            StoreCommand::Connect { port, reply_tx } => {
                if self.options.hide_progress_bar && reply_tx.send(StoreReply::HideProgressBar).is_err() {
                    log::debug!(target: "runtime_store", "port {port} closed before connecting");
                    return;
                }
                log::debug!(target: "runtime_store", "port {port} connected");
                self.ports.insert(port, reply_tx);
            }
            StoreCommand::Disconnect { port } => {
                log::debug!(target: "runtime_store", "port {port} disconnected");
                self.ports.remove(&port);
            }
            StoreCommand::Request {
                port,
                request: StoreRequest::Query { video_ids },
            } => {
                let result = self.store.lookup(&video_ids);
                self.send(port, StoreReply::QueryReply { result });
            }
            StoreCommand::Request {
                port,
                request:
                    StoreRequest::Watch {
                        video_id,
                        video_title,
                        timestamp,
                    },
            } => {
                log::info!(target: "runtime_store", "port {port} watched {video_id} ({video_title})");
                if self.store.mark_watched(video_id.clone(), video_title, timestamp) {
                    self.broadcast(StoreReply::UpdateWatched {
                        video_id,
                        watched: true,
                    });
                }
            }
        }
    }

    fn send(&mut self, port: PortId, reply: StoreReply) {
        let Some(tx) = self.ports.get(&port) else {
            log::debug!(target: "runtime_store", "reply for unknown port {port} dropped");
            return;
        };
        if tx.send(reply).is_err() {
            self.ports.remove(&port);
        }
    }

    fn broadcast(&mut self, reply: StoreReply) {
        self.ports.retain(|_, tx| tx.send(reply.clone()).is_ok());
    }
}

/// Serves store commands until every `Bus` handle is dropped.
pub fn start_store_runtime(cmd_rx: Receiver<StoreCommand>, options: StoreOptions) -> JoinHandle<MemoryStore> {
    thread::spawn(move || {
        let mut store = MemoryStore::new();
        for video in &options.preload {
            store.mark_watched(video.clone(), String::new(), TimestampMs::default());
        }
        let mut runtime = StoreRuntime {
            store,
            ports: BTreeMap::new(),
            options,
        };

        while let Ok(cmd) = cmd_rx.recv() {
            runtime.handle(cmd);
        }
        runtime.store
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bus::{Bus, StoreChannel};
    use std::time::Duration;

    const WAIT: Duration = Duration::from_secs(2);

    fn id(s: &str) -> VideoId {
        VideoId::from(s)
    }

    #[test]
    fn mark_watched_is_idempotent() {
        let mut store = MemoryStore::new();
        assert!(store.mark_watched(id("AAAAAAAAAAA"), "first".into(), TimestampMs(10)));
        assert!(!store.mark_watched(id("AAAAAAAAAAA"), "second".into(), TimestampMs(20)));
        let record = store.record(&id("AAAAAAAAAAA")).unwrap();
        assert_eq!(record.first_watched, TimestampMs(10));
        assert_eq!(record.last_watched, TimestampMs(20));
        assert_eq!(record.title, "second");
    }

    #[test]
    fn query_reply_covers_every_requested_id() {
        let (bus, cmd_rx) = Bus::new();
        let handle = start_store_runtime(
            cmd_rx,
            StoreOptions {
                preload: vec![id("AAAAAAAAAAA")],
                ..StoreOptions::default()
            },
        );
        let port = bus.connect();
        port.sender
            .post(StoreRequest::query(vec![id("AAAAAAAAAAA"), id("BBBBBBBBBBB")]));

        let reply = port.recv_timeout(WAIT).unwrap();
        let StoreReply::QueryReply { result } = reply else {
            panic!("expected query reply, got {reply:?}");
        };
        assert_eq!(result.get("AAAAAAAAAAA"), Some(&true));
        assert_eq!(result.get("BBBBBBBBBBB"), Some(&false));

        drop(port);
        drop(bus);
        handle.join().unwrap();
    }

    #[test]
    fn first_watch_is_broadcast_to_every_port() {
        let (bus, cmd_rx) = Bus::new();
        let handle = start_store_runtime(cmd_rx, StoreOptions::default());
        let watcher = bus.connect();
        let other_tab = bus.connect();

        let watch = StoreRequest::Watch {
            video_id: id("AAAAAAAAAAA"),
            video_title: "Title".into(),
            timestamp: TimestampMs(1),
        };
        watcher.sender.post(watch.clone());
        watcher.sender.post(watch);

        let expected = StoreReply::UpdateWatched {
            video_id: id("AAAAAAAAAAA"),
            watched: true,
        };
        assert_eq!(other_tab.recv_timeout(WAIT), Some(expected.clone()));
        assert_eq!(watcher.recv_timeout(WAIT), Some(expected));

        drop((watcher, other_tab, bus));
        let store = handle.join().unwrap();
        assert!(store.is_watched(&id("AAAAAAAAAAA")));
    }

    #[test]
    fn hide_progress_bar_is_sent_on_connect() {
        let (bus, cmd_rx) = Bus::new();
        let handle = start_store_runtime(
            cmd_rx,
            StoreOptions {
                hide_progress_bar: true,
                ..StoreOptions::default()
            },
        );
        let port = bus.connect();
        assert_eq!(port.recv_timeout(WAIT), Some(StoreReply::HideProgressBar));
        drop((port, bus));
        handle.join().unwrap();
    }

    fn runtime(options: StoreOptions) -> StoreRuntime {
        StoreRuntime {
            store: MemoryStore::new(),
            ports: BTreeMap::new(),
            options,
        }
    }

    #[test]
    fn closed_port_is_not_registered() {
        let mut runtime = runtime(StoreOptions {
            hide_progress_bar: true,
            ..StoreOptions::default()
        });
        let (reply_tx, reply_rx) = std::sync::mpsc::channel();
        drop(reply_rx);
        runtime.handle(StoreCommand::Connect { port: 7, reply_tx });
        assert!(runtime.ports.is_empty());

        let (reply_tx, _reply_rx) = std::sync::mpsc::channel();
        runtime.handle(StoreCommand::Connect { port: 8, reply_tx });
        assert!(runtime.ports.contains_key(&8));
    }

    #[test]
    fn disconnected_ports_miss_broadcasts() {
        let (bus, cmd_rx) = Bus::new();
        let handle = start_store_runtime(cmd_rx, StoreOptions::default());
        let watcher = bus.connect();
        let closed = bus.connect();
        closed.sender.disconnect();

        watcher.sender.post(StoreRequest::Watch {
            video_id: id("AAAAAAAAAAA"),
            video_title: "Title".into(),
            timestamp: TimestampMs(1),
        });
        assert!(matches!(
            watcher.recv_timeout(WAIT),
            Some(StoreReply::UpdateWatched { .. })
        ));
        assert_eq!(closed.try_recv(), None);

        drop((watcher, closed, bus));
        handle.join().unwrap();
    }
}
