use anyhow::{Context, Result};
use jt_capture::{FrameSource, WindowBackend, XcapBackend};
use jt_client::{ClientSettings, LiveClient, Poller, SnapshotSource};
use jt_data::Team;
use jt_state::{Indicator, ScanOutcome, Tracker, TrackingSnapshot, ZoneLayout};
use jt_vision::TemplateMatcher;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::TrackerConfig;

/// Health of the tracking loop
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrackerStatus {
    pub running: bool,
    /// The initial bounded-retry poll identified the enemy jungler
    pub initialized: bool,
    pub ticks: u64,
    pub failed_ticks: u64,
    pub last_tick_ms: u64,
}

/// Capture + match half of a tick. Runs on the blocking pool.
pub struct VisionStage<B: WindowBackend> {
    frames: FrameSource<B>,
    matcher: TemplateMatcher,
}

impl<B: WindowBackend> VisionStage<B> {
    pub fn new(frames: FrameSource<B>, matcher: TemplateMatcher) -> Self {
        Self { frames, matcher }
    }

    pub fn matcher(&self) -> &TemplateMatcher {
        &self.matcher
    }

    pub fn frames(&self) -> &FrameSource<B> {
        &self.frames
    }

    /// One capture+match cycle for `champion`. The frame is dropped before returning.
    pub fn scan(&mut self, champion: &str, team: Team) -> ScanOutcome {
        if !self.matcher.set_template(champion, team) {
            debug!("No template for {} ({}), skipping scan", champion, team);
            return ScanOutcome::Skipped;
        }
        let Some(frame) = self.frames.capture_once() else {
            return ScanOutcome::Skipped;
        };
        match self.matcher.evaluate(&frame) {
            Some(m) if m.found => ScanOutcome::Found(m.location),
            Some(_) => ScanOutcome::NotFound,
            None => ScanOutcome::Skipped,
        }
    }
}

/// Owns the tracker and runs one fusion tick at a time
pub struct TrackerService<S, B: WindowBackend> {
    poller: Poller<S>,
    vision: Arc<Mutex<VisionStage<B>>>,
    tracker: Tracker,
    client: ClientSettings,
    snapshot_tx: watch::Sender<Option<TrackingSnapshot>>,
}

impl<S, B> TrackerService<S, B>
where
    S: SnapshotSource,
    B: WindowBackend + Send + 'static,
{
    pub fn new(
        config: &TrackerConfig,
        poller: Poller<S>,
        vision: VisionStage<B>,
        snapshot_tx: watch::Sender<Option<TrackingSnapshot>>,
    ) -> Self {
        Self {
            poller,
            vision: Arc::new(Mutex::new(vision)),
            tracker: Tracker::new(config.decay),
            client: config.client.clone(),
            snapshot_tx,
        }
    }

    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    /// Bounded-retry poll before the cadence starts. Returns whether the
    /// enemy jungler was identified.
    pub async fn initialize(&mut self) -> bool {
        let found = self.poller.initialize(&self.client).await;
        self.tracker.apply_poll(found.as_ref());
        if found.is_some() {
            self.snapshot_tx.send_replace(Some(self.tracker.snapshot()));
        }
        found.is_some()
    }

    /// poll -> (if alive) capture -> match -> fuse -> notify
    pub async fn tick(&mut self) -> Result<TrackingSnapshot> {
        let poll = self
            .poller
            .poll(self.client.tick_retries, Duration::ZERO)
            .await;
        self.tracker.apply_poll(poll.as_ref());

        if self.tracker.wants_scan() {
            if let Some(state) = self.tracker.state() {
                let champion = state.identity.clone();
                let team = state.team;
                let vision = self.vision.clone();
                let outcome = tokio::task::spawn_blocking(move || {
                    // A panic in an earlier scan only poisons the lock; the stage is still usable
                    let mut stage = vision.lock().unwrap_or_else(|e| e.into_inner());
                    stage.scan(&champion, team)
                })
                .await
                .context("Capture/match task failed")?;
                self.tracker.apply_scan(outcome, Instant::now());
            }
        }

        let snapshot = self.tracker.finish_tick();
        self.snapshot_tx.send_replace(Some(snapshot.clone()));
        Ok(snapshot)
    }
}

/// Handle to a running tracker: latest snapshot, status, and stop
pub struct Pipeline {
    stop: Arc<AtomicBool>,
    snapshot_rx: watch::Receiver<Option<TrackingSnapshot>>,
    status_rx: watch::Receiver<TrackerStatus>,
    layout: Arc<ZoneLayout>,
    capture_size: u32,
    task: JoinHandle<()>,
}

impl Pipeline {
    /// Start against the real game client and desktop
    pub fn start(config: &TrackerConfig) -> Result<Self> {
        let source = LiveClient::new(&config.client)?;
        info!("Polling {}", source.url());
        Self::start_with(config, source, XcapBackend)
    }

    /// Start with explicit data and window backends
    pub fn start_with<S, B>(config: &TrackerConfig, source: S, backend: B) -> Result<Self>
    where
        S: SnapshotSource + Send + Sync + 'static,
        B: WindowBackend + Send + 'static,
    {
        let layout = Arc::new(config.zone_layout()?);
        let aliases = Arc::new(config.aliases());
        let capture_size = config.capture.geometry().capture_size;

        let frames = FrameSource::with_backend(backend, &config.capture);
        let matcher = TemplateMatcher::new(&config.matcher, aliases.clone());
        let poller = Poller::new(source, aliases);

        let (snapshot_tx, snapshot_rx) = watch::channel::<Option<TrackingSnapshot>>(None);
        let (status_tx, status_rx) = watch::channel(TrackerStatus::default());
        let stop = Arc::new(AtomicBool::new(false));

        let service = TrackerService::new(config, poller, VisionStage::new(frames, matcher), snapshot_tx);
        let task = tokio::spawn(run_loop(
            service,
            status_tx,
            stop.clone(),
            config.tick_interval(),
        ));

        info!(
            "Pipeline started (tick {}ms, capture {}px)",
            config.tick_interval_ms, capture_size
        );

        Ok(Self {
            stop,
            snapshot_rx,
            status_rx,
            layout,
            capture_size,
            task,
        })
    }

    /// Ask the loop to stop; an in-flight tick finishes first
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
        info!("Pipeline stop requested");
    }

    /// Stop and wait for the loop to exit
    pub async fn shutdown(self) {
        self.stop();
        if let Err(e) = self.task.await {
            warn!("Pipeline task ended abnormally: {}", e);
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<TrackingSnapshot>> {
        self.snapshot_rx.clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<TrackerStatus> {
        self.status_rx.clone()
    }

    pub fn status(&self) -> TrackerStatus {
        self.status_rx.borrow().clone()
    }

    pub fn latest(&self) -> Option<TrackingSnapshot> {
        self.snapshot_rx.borrow().clone()
    }

    pub fn layout(&self) -> &ZoneLayout {
        &self.layout
    }

    pub fn capture_size(&self) -> u32 {
        self.capture_size
    }

    /// Indicator for the latest snapshot at `now`
    pub fn indicator(&self, now: Instant) -> Option<Indicator> {
        self.latest()?.indicator(&self.layout, self.capture_size, now)
    }
}

async fn wait_for_stop(stop: &AtomicBool) {
    while !stop.load(Ordering::Relaxed) {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

async fn run_loop<S, B>(
    mut service: TrackerService<S, B>,
    status_tx: watch::Sender<TrackerStatus>,
    stop: Arc<AtomicBool>,
    interval: Duration,
) where
    S: SnapshotSource,
    B: WindowBackend + Send + 'static,
{
    status_tx.send_modify(|s| s.running = true);

    let initialized = tokio::select! {
        ok = service.initialize() => ok,
        _ = wait_for_stop(&stop) => {
            status_tx.send_modify(|s| s.running = false);
            info!("Pipeline stopped during initialization");
            return;
        }
    };
    status_tx.send_modify(|s| s.initialized = initialized);

    let mut ticker = tokio::time::interval(interval);
    // A slow tick delays the next one instead of queueing a burst
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        if stop.load(Ordering::Relaxed) {
            break;
        }

        let started = Instant::now();
        let result = service.tick().await;
        let elapsed = started.elapsed().as_millis() as u64;

        if let Err(e) = &result {
            warn!("Tick failed: {:#}", e);
        }
        status_tx.send_modify(|s| {
            s.ticks += 1;
            s.last_tick_ms = elapsed;
            if result.is_err() {
                s.failed_ticks += 1;
            }
        });
    }

    status_tx.send_modify(|s| s.running = false);
    info!("Pipeline stopped after {} ticks", service.tracker().ticks());
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgb, RgbImage, Rgba, RgbaImage};
    use jt_capture::WindowInfo;
    use jt_data::live::AllGameData;
    use jt_data::Point;
    use jt_state::{LifeState, ZoneId};
    use jt_vision::TemplateStore;
    use std::future::Future;
    use std::path::Path;
    use std::sync::atomic::AtomicU32;

    const WINDOW: u32 = 200;
    const REGION: u32 = 120;
    const CAPTURE: u32 = 100;
    /// Top-left of the minimap square inside the window
    const CROP_ORIGIN: u32 = WINDOW - REGION + (REGION - CAPTURE) / 2;

    fn noise(x: u32, y: u32, c: u32, seed: u32) -> u8 {
        let mut h = x.wrapping_mul(73_856_093)
            ^ y.wrapping_mul(19_349_663)
            ^ c.wrapping_mul(83_492_791)
            ^ seed.wrapping_mul(2_654_435_761);
        h ^= h >> 13;
        h = h.wrapping_mul(0x5bd1_e995);
        h ^= h >> 15;
        (h % 251) as u8
    }

    fn icon() -> RgbImage {
        RgbImage::from_fn(10, 10, |x, y| Rgb([noise(x, y, 0, 7), noise(x, y, 1, 7), noise(x, y, 2, 7)]))
    }

    /// Full window image, with the icon at minimap-relative `at` if given
    fn window_image(at: Option<(u32, u32)>) -> RgbaImage {
        let art = icon();
        RgbaImage::from_fn(WINDOW, WINDOW, |x, y| {
            if let Some((ix, iy)) = at {
                let (ox, oy) = (CROP_ORIGIN + ix, CROP_ORIGIN + iy);
                if x >= ox && y >= oy && x < ox + 10 && y < oy + 10 {
                    let p = art.get_pixel(x - ox, y - oy);
                    return Rgba([p[0], p[1], p[2], 255]);
                }
            }
            Rgba([noise(x, y, 0, 1), noise(x, y, 1, 1), noise(x, y, 2, 1), 255])
        })
    }

    /// Focused game window whose captures follow a script (last entry repeats)
    struct FakeDesktop {
        frames: Mutex<Vec<Option<(u32, u32)>>>,
        captures: Arc<AtomicU32>,
        panic_first: AtomicBool,
    }

    impl FakeDesktop {
        fn new(frames: Vec<Option<(u32, u32)>>) -> (Self, Arc<AtomicU32>) {
            let captures = Arc::new(AtomicU32::new(0));
            let desktop = Self {
                frames: Mutex::new(frames),
                captures: captures.clone(),
                panic_first: AtomicBool::new(false),
            };
            (desktop, captures)
        }
    }

    impl WindowBackend for FakeDesktop {
        fn windows(&self) -> Result<Vec<WindowInfo>> {
            Ok(vec![WindowInfo {
                id: 7,
                pid: 4242,
                app_name: "League of Legends".to_string(),
                title: "League of Legends (TM) Client".to_string(),
                is_focused: true,
                is_minimized: false,
                width: WINDOW,
                height: WINDOW,
            }])
        }

        fn capture(&self, _window: &WindowInfo) -> Result<RgbaImage> {
            self.captures.fetch_add(1, Ordering::SeqCst);
            if self.panic_first.swap(false, Ordering::SeqCst) {
                panic!("simulated capture crash");
            }
            let mut frames = self.frames.lock().unwrap();
            let at = if frames.len() > 1 { frames.remove(0) } else { frames[0] };
            Ok(window_image(at))
        }
    }

    /// Live client that always reports the same jungler state
    struct FixedSource {
        dead: AtomicBool,
    }

    impl SnapshotSource for FixedSource {
        fn fetch(&self) -> impl Future<Output = Result<AllGameData>> + Send {
            let dead = self.dead.load(Ordering::SeqCst);
            async move {
                let json = format!(
                    r#"{{
                        "activePlayer": {{ "riotId": "Me#1" }},
                        "allPlayers": [
                            {{ "riotId": "Me#1", "team": "ORDER", "championName": "Ahri",
                               "summonerSpells": {{ "summonerSpellOne": {{ "displayName": "Flash" }} }} }},
                            {{ "riotId": "Them#2", "team": "CHAOS", "championName": "Vi",
                               "isDead": {}, "respawnTimer": {},
                               "summonerSpells": {{ "summonerSpellOne": {{ "displayName": "Smite" }} }} }}
                        ]
                    }}"#,
                    dead,
                    if dead { 25.0 } else { 0.0 }
                );
                Ok(serde_json::from_str(&json)?)
            }
        }
    }

    fn write_icon(root: &Path) {
        let dir = root.join(TemplateStore::variant_dir(Team::Chaos));
        std::fs::create_dir_all(&dir).unwrap();
        DynamicImage::ImageRgb8(icon()).save(dir.join("Vi.png")).unwrap();
    }

    fn config(assets: &Path) -> TrackerConfig {
        let mut config = TrackerConfig::default();
        config.tick_interval_ms = 10;
        config.client.init_retries = 1;
        config.client.init_retry_delay_ms = 0;
        config.capture.region_size = Some(REGION);
        config.capture.capture_size = Some(CAPTURE);
        config.capture.allow_fallback_window = false;
        config.matcher.assets_dir = assets.to_path_buf();
        config
    }

    async fn wait_until<F>(rx: &mut watch::Receiver<Option<TrackingSnapshot>>, mut pred: F) -> TrackingSnapshot
    where
        F: FnMut(&TrackingSnapshot) -> bool,
    {
        tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                if let Some(snap) = rx.borrow_and_update().clone() {
                    if pred(&snap) {
                        return snap;
                    }
                }
                rx.changed().await.unwrap();
            }
        })
        .await
        .expect("condition not reached in time")
    }

    #[tokio::test]
    async fn test_sighting_then_hidden_with_zone() {
        let assets = tempfile::tempdir().unwrap();
        write_icon(assets.path());
        // Seen at the center of the minimap on the first capture, then gone
        let (desktop, _) = FakeDesktop::new(vec![Some((45, 45)), None]);
        let source = FixedSource {
            dead: AtomicBool::new(false),
        };

        let pipeline = Pipeline::start_with(&config(assets.path()), source, desktop).unwrap();
        let mut rx = pipeline.subscribe();

        let seen = wait_until(&mut rx, |s| {
            s.state.as_ref().is_some_and(|st| st.visible_now)
        })
        .await;
        assert_eq!(seen.state.as_ref().unwrap().last_seen, Some(Point::new(50, 50)));

        let hidden = wait_until(&mut rx, |s| {
            s.state
                .as_ref()
                .is_some_and(|st| st.life_state() == LifeState::AliveHidden && st.last_seen.is_some())
        })
        .await;
        assert!(hidden.decay.is_active());

        match hidden.indicator(pipeline.layout(), pipeline.capture_size(), Instant::now()) {
            Some(Indicator::LastSeen { zone, location, .. }) => {
                assert_eq!(location, Point::new(50, 50));
                assert_eq!(zone, Some(ZoneId::Mid));
            }
            other => panic!("unexpected indicator {:?}", other),
        }

        let status = pipeline.status();
        assert!(status.running);
        assert!(status.initialized);
        pipeline.shutdown().await;
    }

    #[tokio::test]
    async fn test_dead_unit_is_not_scanned() {
        let assets = tempfile::tempdir().unwrap();
        write_icon(assets.path());
        let (desktop, captures) = FakeDesktop::new(vec![Some((45, 45))]);
        let source = FixedSource {
            dead: AtomicBool::new(true),
        };

        let pipeline = Pipeline::start_with(&config(assets.path()), source, desktop).unwrap();
        let mut rx = pipeline.subscribe();
        wait_until(&mut rx, |s| s.tick >= 3).await;

        assert_eq!(captures.load(Ordering::SeqCst), 0);
        assert_eq!(
            pipeline.indicator(Instant::now()),
            Some(Indicator::Dead {
                respawn_in: 25.0,
                base: ZoneId::RedBase
            })
        );
        pipeline.shutdown().await;
    }

    #[tokio::test]
    async fn test_failed_tick_does_not_stop_cadence() {
        let assets = tempfile::tempdir().unwrap();
        write_icon(assets.path());
        let (desktop, _) = FakeDesktop::new(vec![Some((45, 45))]);
        desktop.panic_first.store(true, Ordering::SeqCst);
        let source = FixedSource {
            dead: AtomicBool::new(false),
        };

        let pipeline = Pipeline::start_with(&config(assets.path()), source, desktop).unwrap();
        let mut rx = pipeline.subscribe();
        wait_until(&mut rx, |s| s.state.as_ref().is_some_and(|st| st.visible_now)).await;

        let mut status_rx = pipeline.subscribe_status();
        tokio::time::timeout(Duration::from_secs(10), status_rx.wait_for(|s| s.ticks >= 2))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(pipeline.status().failed_ticks, 1);
        pipeline.shutdown().await;
    }

    #[tokio::test]
    async fn test_uninitialized_keeps_running() {
        struct NeverReady;
        impl SnapshotSource for NeverReady {
            fn fetch(&self) -> impl Future<Output = Result<AllGameData>> + Send {
                async { anyhow::bail!("HTTP 404") }
            }
        }

        let assets = tempfile::tempdir().unwrap();
        let (desktop, captures) = FakeDesktop::new(vec![None]);
        let pipeline = Pipeline::start_with(&config(assets.path()), NeverReady, desktop).unwrap();
        let mut status = pipeline.subscribe_status();
        tokio::time::timeout(Duration::from_secs(10), status.wait_for(|s| s.ticks >= 3))
            .await
            .unwrap()
            .unwrap();

        let s = pipeline.status();
        assert!(!s.initialized);
        assert_eq!(s.failed_ticks, 0);
        assert!(pipeline.latest().unwrap().state.is_none());
        assert_eq!(captures.load(Ordering::SeqCst), 0);
        pipeline.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_reports_not_running() {
        let assets = tempfile::tempdir().unwrap();
        let (desktop, _) = FakeDesktop::new(vec![None]);
        let source = FixedSource {
            dead: AtomicBool::new(true),
        };
        let pipeline = Pipeline::start_with(&config(assets.path()), source, desktop).unwrap();
        let status = pipeline.subscribe_status();
        pipeline.shutdown().await;
        assert!(!status.borrow().running);
    }
}
