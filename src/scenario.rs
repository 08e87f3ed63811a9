//! Scripted page sessions replayed against a live store runtime.

use bus::{BusError, Port, PortSender, StoreChannel, StoreReply, StoreRequest};
use core_types::{TimestampMs, VideoId};
use dom::{DomError, NodeKey};
use serde::Deserialize;
use std::cell::Cell;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use watch_sync::site::markup::{self, WatchPageNodes};
use watch_sync::{ConfigError, EngineConfig, Page, TimeUpdate, WatchSync, YoutubeSite};

#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    #[error("reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("parsing scenario: {0}")]
    Parse(#[from] toml::de::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("bad location: {0}")]
    Location(#[from] url::ParseError),
    #[error(transparent)]
    Dom(#[from] DomError),
    #[error(transparent)]
    Bus(#[from] BusError),
    #[error("step {step}: no watch page rendered")]
    NoWatchPage { step: usize },
    #[error("step {step}: no thumbnail #{index}")]
    NoThumbnail { step: usize, index: usize },
    #[error("store runtime panicked")]
    StoreThread,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    pub location: String,
    /// Videos the store already knows as watched.
    #[serde(default)]
    pub preload: Vec<String>,
    #[serde(default)]
    pub hide_progress_bar: bool,
    #[serde(default)]
    pub steps: Vec<Step>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case", deny_unknown_fields)]
pub enum Step {
    RenderWatchPage {
        title: String,
    },
    InsertThumbnails {
        ids: Vec<String>,
        #[serde(default)]
        end_card: bool,
    },
    Relabel {
        index: usize,
        id: String,
    },
    Remove {
        index: usize,
    },
    /// In-page navigation; `title` re-renders the title like the site does.
    Navigate {
        location: String,
        title: Option<String>,
    },
    Play {
        current_time: f64,
        duration: f64,
        #[serde(default)]
        ad: bool,
    },
    /// Another page reports the video as watched.
    MarkWatchedElsewhere {
        id: String,
        #[serde(default)]
        title: String,
    },
    RawReply {
        json: String,
    },
}

impl Scenario {
    pub fn from_toml_str(input: &str) -> Result<Self, ScenarioError> {
        Ok(toml::from_str(input)?)
    }

    pub fn load(path: &Path) -> Result<Self, ScenarioError> {
        let input = std::fs::read_to_string(path).map_err(|source| ScenarioError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&input)
    }

    pub fn preloaded(&self) -> Vec<VideoId> {
        self.preload.iter().map(|id| VideoId::from(id.as_str())).collect()
    }
}

/// Port sender that logs the wire form of every request.
pub struct TracedChannel {
    inner: PortSender,
    watches: Cell<usize>,
}

impl TracedChannel {
    pub fn new(inner: PortSender) -> Self {
        Self {
            inner,
            watches: Cell::new(0),
        }
    }

    pub fn watches(&self) -> usize {
        self.watches.get()
    }
}

impl StoreChannel for TracedChannel {
    fn post(&self, request: StoreRequest) {
        if matches!(request, StoreRequest::Watch { .. }) {
            self.watches.set(self.watches.get() + 1);
        }
        match request.to_json() {
            Ok(json) => log::info!(target: "watchmark.wire", "page {} -> {json}", self.inner.id()),
            Err(err) => log::warn!(target: "watchmark.wire", "unencodable request: {err}"),
        }
        self.inner.post(request);
    }
}

struct Thumbnail {
    link: NodeKey,
    removed: bool,
}

pub struct Runner {
    page: Page,
    engine: WatchSync<YoutubeSite, TracedChannel>,
    port: Port,
    elsewhere: Port,
    watch_page: Option<WatchPageNodes>,
    thumbnails: Vec<Thumbnail>,
    settle: Duration,
}

impl Runner {
    pub fn new(
        scenario: &Scenario,
        config: EngineConfig,
        port: Port,
        elsewhere: Port,
        settle: Duration,
    ) -> Result<Self, ScenarioError> {
        let mut page = Page::parse(&scenario.location)?;
        let mut engine = WatchSync::new(YoutubeSite, TracedChannel::new(port.sender.clone()), config);
        engine.start(&mut page)?;
        let mut runner = Self {
            page,
            engine,
            port,
            elsewhere,
            watch_page: None,
            thumbnails: Vec::new(),
            settle,
        };
        runner.settle();
        Ok(runner)
    }

    pub fn run(&mut self, steps: &[Step]) -> Result<(), ScenarioError> {
        for (index, step) in steps.iter().enumerate() {
            log::debug!(target: "watchmark", "step {index}: {step:?}");
            self.apply(index, step)?;
            self.settle();
        }
        Ok(())
    }

    fn apply(&mut self, step_index: usize, step: &Step) -> Result<(), ScenarioError> {
        let doc = &mut self.page.document;
        match step {
            Step::RenderWatchPage { title } => {
                self.watch_page = Some(markup::watch_page(doc, title)?);
            }
            Step::InsertThumbnails { ids, end_card } => {
                let parent = match (*end_card, self.watch_page) {
                    (true, Some(nodes)) => nodes.player,
                    (true, None) => return Err(ScenarioError::NoWatchPage { step: step_index }),
                    (false, _) => doc.body(),
                };
                for id in ids {
                    let href = format!("/watch?v={id}");
                    let (node, link) = if *end_card {
                        let card = markup::end_card(doc, &format!("https://www.youtube.com{href}"))?;
                        (card, card)
                    } else {
                        let nodes = markup::grid_thumbnail(doc, &href)?;
                        (nodes.container, nodes.link)
                    };
                    doc.append_child(parent, node)?;
                    self.thumbnails.push(Thumbnail { link, removed: false });
                }
            }
            Step::Relabel { index, id } => {
                let link = self
                    .thumbnails
                    .get(*index)
                    .ok_or(ScenarioError::NoThumbnail {
                        step: step_index,
                        index: *index,
                    })?
                    .link;
                doc.set_attribute(link, "href", &format!("/watch?v={id}"))?;
            }
            Step::Remove { index } => {
                let thumbnail = self
                    .thumbnails
                    .get_mut(*index)
                    .ok_or(ScenarioError::NoThumbnail {
                        step: step_index,
                        index: *index,
                    })?;
                let node = match doc.tag_name(thumbnail.link) {
                    Some("a") if doc.has_class(thumbnail.link, "ytd-thumbnail") => {
                        doc.parent(thumbnail.link).unwrap_or(thumbnail.link)
                    }
                    _ => thumbnail.link,
                };
                doc.remove(node)?;
                thumbnail.removed = true;
            }
            Step::Navigate { location, title } => {
                self.page.navigate(location)?;
                if let Some(title) = title {
                    let nodes = self
                        .watch_page
                        .ok_or(ScenarioError::NoWatchPage { step: step_index })?;
                    markup::retitle(&mut self.page.document, &nodes, title)?;
                }
            }
            Step::Play {
                current_time,
                duration,
                ad,
            } => {
                let nodes = self
                    .watch_page
                    .ok_or(ScenarioError::NoWatchPage { step: step_index })?;
                markup::set_ad_showing(doc, &nodes, *ad)?;
                self.engine.pump(&mut self.page);
                self.engine.on_time_update(
                    &self.page,
                    TimeUpdate {
                        target: nodes.video,
                        current_time: *current_time,
                        duration: *duration,
                    },
                );
            }
            Step::MarkWatchedElsewhere { id, title } => {
                self.elsewhere.sender.post(StoreRequest::Watch {
                    video_id: VideoId::from(id.as_str()),
                    video_title: title.clone(),
                    timestamp: TimestampMs::now(),
                });
            }
            Step::RawReply { json } => {
                let reply = StoreReply::from_json(json)?;
                self.deliver(reply);
            }
        }
        Ok(())
    }

    /// Pumps mutations and applies store replies until both sides are quiet.
    fn settle(&mut self) {
        self.engine.pump(&mut self.page);
        while let Some(reply) = self.port.recv_timeout(self.settle) {
            self.deliver(reply);
            self.engine.pump(&mut self.page);
        }
        // Broadcasts to the other page are not rendered anywhere.
        while self.elsewhere.try_recv().is_some() {}
    }

    fn deliver(&mut self, reply: StoreReply) {
        match reply.to_json() {
            Ok(json) => log::info!(target: "watchmark.wire", "page {} <- {json}", self.port.id()),
            Err(err) => log::warn!(target: "watchmark.wire", "unencodable reply: {err}"),
        }
        let painted = self.engine.on_message(&mut self.page, reply);
        if painted > 0 {
            log::debug!(target: "watchmark", "painted {painted} elements");
        }
    }

    pub fn report(&self) -> Report {
        let doc = &self.page.document;
        let config = self.engine.config();
        let markers = self.engine.markers();
        let thumbnails = self
            .thumbnails
            .iter()
            .map(|thumbnail| ElementState {
                video: markers.video(thumbnail.link).map(|v| v.to_string()),
                watched: doc.has_class(thumbnail.link, &config.watched_class),
                removed: thumbnail.removed,
            })
            .collect();
        let header = self.watch_page.map(|nodes| ElementState {
            video: markers.video(nodes.info).map(|v| v.to_string()),
            watched: doc.has_class(nodes.info, &config.watched_class),
            removed: false,
        });
        Report {
            location: self.page.location().to_string(),
            thumbnails,
            header,
            watch_requests: self.engine.channel().watches(),
            progress_hidden: doc.element_by_id(&config.progress_style_id).is_some(),
        }
    }
}

impl Drop for Runner {
    fn drop(&mut self) {
        self.port.sender.disconnect();
        self.elsewhere.sender.disconnect();
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct ElementState {
    pub video: Option<String>,
    pub watched: bool,
    pub removed: bool,
}

impl fmt::Display for ElementState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let video = self.video.as_deref().unwrap_or("-");
        let state = match (self.removed, self.watched) {
            (true, _) => "removed",
            (false, true) => "watched",
            (false, false) => "unwatched",
        };
        write!(f, "{video} {state}")
    }
}

#[derive(Debug)]
pub struct Report {
    pub location: String,
    pub thumbnails: Vec<ElementState>,
    pub header: Option<ElementState>,
    pub watch_requests: usize,
    pub progress_hidden: bool,
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "location: {}", self.location)?;
        if let Some(header) = &self.header {
            writeln!(f, "header: {header}")?;
        }
        for (index, thumbnail) in self.thumbnails.iter().enumerate() {
            writeln!(f, "thumbnail #{index}: {thumbnail}")?;
        }
        writeln!(f, "watch requests: {}", self.watch_requests)?;
        writeln!(f, "resume bar hidden: {}", self.progress_hidden)
    }
}
