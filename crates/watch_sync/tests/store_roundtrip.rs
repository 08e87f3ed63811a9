use bus::{Bus, Port, PortSender};
use core_types::VideoId;
use runtime_store::{StoreOptions, start_store_runtime};
use std::time::Duration;
use watch_sync::site::markup;
use watch_sync::{EngineConfig, Page, TimeUpdate, WatchSync, YoutubeSite};

const SETTLE: Duration = Duration::from_millis(200);

/// Feeds replies back into the engine until the store goes quiet.
fn settle(engine: &mut WatchSync<YoutubeSite, PortSender>, page: &mut Page, port: &Port) {
    engine.pump(page);
    while let Some(reply) = port.recv_timeout(SETTLE) {
        engine.on_message(page, reply);
        engine.pump(page);
    }
}

#[test]
fn watched_video_is_painted_in_every_open_page() {
    let (bus, cmd_rx) = Bus::new();
    let handle = start_store_runtime(
        cmd_rx,
        StoreOptions {
            preload: vec![VideoId::from("PPPPPPPPPPP")],
            ..StoreOptions::default()
        },
    );
    let config = EngineConfig::default();

    // A feed page listing the video, plus one already watched.
    let feed_port = bus.connect();
    let mut feed = Page::parse("https://www.youtube.com/").unwrap();
    let mut feed_engine = WatchSync::new(YoutubeSite, feed_port.sender.clone(), config.clone());
    feed_engine.start(&mut feed).unwrap();
    let mut links = Vec::new();
    for id in ["AAAAAAAAAAA", "PPPPPPPPPPP"] {
        let nodes = markup::grid_thumbnail(&mut feed.document, &format!("/watch?v={id}")).unwrap();
        let body = feed.document.body();
        feed.document.append_child(body, nodes.container).unwrap();
        links.push(nodes.link);
    }
    settle(&mut feed_engine, &mut feed, &feed_port);
    assert!(!feed.document.has_class(links[0], &config.watched_class));
    assert!(feed.document.has_class(links[1], &config.watched_class));

    // The video itself, playing in another page.
    let watch_port = bus.connect();
    let mut watch = Page::parse("https://www.youtube.com/watch?v=AAAAAAAAAAA").unwrap();
    let mut watch_engine = WatchSync::new(YoutubeSite, watch_port.sender.clone(), config.clone());
    watch_engine.start(&mut watch).unwrap();
    let nodes = markup::watch_page(&mut watch.document, "A video").unwrap();
    settle(&mut watch_engine, &mut watch, &watch_port);
    assert!(!watch.document.has_class(nodes.info, &config.watched_class));

    watch_engine.on_time_update(
        &watch,
        TimeUpdate {
            target: nodes.video,
            current_time: 10.5,
            duration: 300.0,
        },
    );
    settle(&mut watch_engine, &mut watch, &watch_port);
    settle(&mut feed_engine, &mut feed, &feed_port);

    assert!(watch.document.has_class(nodes.info, &config.watched_class));
    assert!(feed.document.has_class(links[0], &config.watched_class));

    drop(feed_engine);
    drop(watch_engine);
    drop((feed_port, watch_port, bus));
    let store = handle.join().unwrap();
    let record = store.record(&VideoId::from("AAAAAAAAAAA")).unwrap();
    assert_eq!(record.title, "A video");
}

#[test]
fn store_can_ask_pages_to_hide_the_resume_bar() {
    let (bus, cmd_rx) = Bus::new();
    let handle = start_store_runtime(
        cmd_rx,
        StoreOptions {
            hide_progress_bar: true,
            ..StoreOptions::default()
        },
    );
    let port = bus.connect();
    let mut page = Page::parse("https://www.youtube.com/").unwrap();
    let mut engine = WatchSync::new(YoutubeSite, port.sender.clone(), EngineConfig::default());
    engine.start(&mut page).unwrap();
    settle(&mut engine, &mut page, &port);

    let style_id = engine.config().progress_style_id.clone();
    assert!(page.document.element_by_id(&style_id).is_some());

    drop(engine);
    drop((port, bus));
    handle.join().unwrap();
}
