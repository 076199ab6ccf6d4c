//! The high-level pipeline: annotate a selected photo, then publish it.
//!
//! [`App`] is the single owning context — it builds the capability
//! provider, geocoder, location resolver, and weather chain from one
//! [`Settings`] value and injects them everywhere. Location and weather
//! are optional enrichment: their failure never blocks publishing.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::capability::{self, Capabilities, PhotoFile};
use crate::config::Settings;
use crate::geocode::{Geocoder, NominatimGeocoder};
use crate::location::{LocationResolver, LocationResult};
use crate::weather::{WeatherLookup, WeatherResult};
use crate::wordpress::{NewPost, Post, PublishError, WordPressClient, compose};

/// An in-memory draft of a post. Destroyed on submit or reset; the photo
/// is present by construction, so only the title needs validation at
/// submit time.
#[derive(Debug, Clone)]
pub struct PostDraft {
    pub photo: PhotoFile,
    pub title: String,
    pub body: String,
    pub category_ids: Vec<u64>,
    pub tag_names: Vec<String>,
    /// 0 disables the rating block; values above 5 are clamped.
    pub rating: u8,
    pub location: Option<LocationResult>,
    pub weather: Option<WeatherResult>,
}

impl PostDraft {
    pub fn new(photo: PhotoFile, title: impl Into<String>) -> Self {
        Self {
            photo,
            title: title.into(),
            body: String::new(),
            category_ids: Vec::new(),
            tag_names: Vec::new(),
            rating: 0,
            location: None,
            weather: None,
        }
    }
}

/// Enrichment produced for one photo selection.
#[derive(Debug, Clone)]
pub struct Annotation {
    pub location: Option<LocationResult>,
    pub weather: Option<WeatherResult>,
}

/// Generation counter guarding against stale in-flight annotations: a
/// resolution that finishes after a newer photo was selected is dropped
/// instead of overwriting the newer selection's state.
#[derive(Debug, Default)]
pub struct SelectionTracker {
    current: AtomicU64,
}

/// Token for one photo selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionToken(u64);

impl SelectionTracker {
    pub fn begin(&self) -> SelectionToken {
        SelectionToken(self.current.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn is_current(&self, token: SelectionToken) -> bool {
        self.current.load(Ordering::SeqCst) == token.0
    }
}

/// Application root owning the injected components.
pub struct App {
    settings: Settings,
    capabilities: Arc<dyn Capabilities>,
    resolver: LocationResolver,
    weather: WeatherLookup,
    selections: SelectionTracker,
}

impl App {
    /// Wire the production components from settings.
    pub fn new(settings: Settings) -> Self {
        let capabilities = capability::detect(&settings);
        let geocoder: Arc<dyn Geocoder> =
            Arc::new(NominatimGeocoder::new(capabilities.clone()));
        let resolver = LocationResolver::new(capabilities.clone(), geocoder);
        let weather = WeatherLookup::new(settings.weather_api_key.clone());
        Self {
            settings,
            capabilities,
            resolver,
            weather,
            selections: SelectionTracker::default(),
        }
    }

    /// Wire explicit components instead of detecting them.
    pub fn with_parts(
        settings: Settings,
        capabilities: Arc<dyn Capabilities>,
        geocoder: Arc<dyn Geocoder>,
        weather: WeatherLookup,
    ) -> Self {
        let resolver = LocationResolver::new(capabilities.clone(), geocoder);
        Self {
            settings,
            capabilities,
            resolver,
            weather,
            selections: SelectionTracker::default(),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn capabilities(&self) -> &Arc<dyn Capabilities> {
        &self.capabilities
    }

    pub fn resolver(&self) -> &LocationResolver {
        &self.resolver
    }

    /// WordPress client for the configured connection.
    pub fn wordpress(&self) -> Result<WordPressClient, PublishError> {
        if !self.settings.is_configured() {
            return Err(PublishError::NotConfigured);
        }
        Ok(WordPressClient::new(&self.settings))
    }

    /// Annotate a freshly selected photo: resolve location through the
    /// fallback chain, then fetch weather for the resolved coordinates —
    /// always in that order, since weather needs the fix. Both are
    /// best-effort. Returns `None` when a newer selection superseded this
    /// one while it was in flight.
    pub async fn annotate(&self, photo: &PhotoFile) -> Option<Annotation> {
        let token = self.selections.begin();

        let location = match self.resolver.resolve(photo).await {
            Ok(location) => Some(location),
            Err(err) => {
                log::warn!("photo will be published without location: {err}");
                None
            }
        };

        let weather = match &location {
            Some(location) => match self
                .weather
                .current(location.latitude, location.longitude)
                .await
            {
                Ok(weather) => Some(weather),
                Err(err) => {
                    log::warn!("photo will be published without weather: {err}");
                    None
                }
            },
            None => None,
        };

        if !self.selections.is_current(token) {
            log::info!("discarding stale annotation for a superseded photo selection");
            return None;
        }

        Some(Annotation { location, weather })
    }
}

/// Publish a draft: upload the photo, resolve tags, compose the body and
/// meta map, create the post. Runs strictly in that order. The draft is
/// borrowed so a failed attempt can be retried without re-picking the
/// photo or re-entering fields. A media upload that succeeds before a
/// later step fails is not rolled back.
pub async fn publish(client: &WordPressClient, draft: &PostDraft) -> Result<Post, PublishError> {
    if draft.title.trim().is_empty() {
        return Err(PublishError::EmptyTitle);
    }

    let media = client.upload_media(&draft.photo).await?;
    log::info!("media uploaded as id {}", media.id);

    let tags = dedupe_tags(&draft.tag_names);
    let tag_ids = if tags.is_empty() {
        Vec::new()
    } else {
        client.resolve_tags(&tags).await
    };

    let content = compose::compose_body(
        &draft.body,
        draft.rating,
        &tags,
        draft.location.as_ref(),
        draft.weather.as_ref(),
    );
    let meta = compose::build_meta(
        draft.rating,
        &tags,
        draft.location.as_ref(),
        draft.weather.as_ref(),
    );

    let new_post = NewPost {
        title: draft.title.clone(),
        content,
        status: "publish".to_string(),
        featured_media: media.id,
        categories: draft.category_ids.clone(),
        tags: tag_ids,
        meta,
    };

    let post = client.create_post(&new_post).await?;
    log::info!("post created: {}", post.link);
    Ok(post)
}

/// Case-sensitive dedup preserving first-seen order.
fn dedupe_tags(names: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    names
        .iter()
        .filter(|name| !name.trim().is_empty())
        .filter(|name| seen.insert(name.as_str()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{CapabilityError, PermissionGrants, Position, PositionOptions};
    use crate::geocode::{GeocodeError, ResolvedPlace};
    use crate::location::LocationSource;
    use crate::weather::{WeatherProvider, WeatherResult};
    use crate::wordpress::transport::{ApiRequest, Transport, TransportError};
    use chrono::Utc;
    use std::sync::Mutex;
    use std::time::Duration;

    fn configured_settings() -> Settings {
        Settings {
            site_url: "https://blog.example".into(),
            username: "editor".into(),
            app_password: "abcd".into(),
            ..Settings::default()
        }
    }

    fn photo() -> PhotoFile {
        PhotoFile {
            file_name: "plain.jpg".into(),
            mime_type: "image/jpeg".into(),
            bytes: b"no exif here".to_vec(),
        }
    }

    // ── scripted components ──────────────────────────────────────────

    struct ScriptedCapabilities {
        native: bool,
        strict_fix: Option<(f64, f64)>,
        relaxed_fix: Option<(f64, f64)>,
        position_delay: Mutex<Option<Duration>>,
    }

    impl ScriptedCapabilities {
        fn new(native: bool) -> Self {
            Self {
                native,
                strict_fix: None,
                relaxed_fix: None,
                position_delay: Mutex::new(None),
            }
        }
    }

    #[async_trait::async_trait]
    impl Capabilities for ScriptedCapabilities {
        fn is_native(&self) -> bool {
            self.native
        }

        async fn capture_from_camera(&self) -> Result<PhotoFile, CapabilityError> {
            Err(CapabilityError::Unsupported("camera"))
        }

        async fn pick_from_gallery(&self) -> Result<PhotoFile, CapabilityError> {
            Err(CapabilityError::Unsupported("gallery"))
        }

        async fn current_position(
            &self,
            opts: PositionOptions,
        ) -> Result<Position, CapabilityError> {
            let delay = self.position_delay.lock().unwrap().take();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            let fix = if opts.high_accuracy {
                self.strict_fix
            } else {
                self.relaxed_fix
            };
            match fix {
                Some((latitude, longitude)) => Ok(Position {
                    latitude,
                    longitude,
                    accuracy: Some(30.0),
                    altitude: None,
                    heading: None,
                    speed: None,
                    timestamp: Utc::now(),
                }),
                None => Err(CapabilityError::PermissionDenied("location")),
            }
        }

        async fn network_connected(&self) -> bool {
            true
        }

        async fn request_permissions(&self) -> PermissionGrants {
            PermissionGrants {
                camera: true,
                location: true,
            }
        }

        async fn share_post(
            &self,
            _url: &str,
            _title: &str,
        ) -> Result<Option<String>, CapabilityError> {
            Ok(None)
        }
    }

    struct OfflineGeocoder;

    #[async_trait::async_trait]
    impl Geocoder for OfflineGeocoder {
        async fn resolve(&self, _: f64, _: f64) -> Result<ResolvedPlace, GeocodeError> {
            Err(GeocodeError::Unavailable("offline".into()))
        }
    }

    struct RecordingWeather {
        calls: Arc<Mutex<Vec<(f64, f64)>>>,
    }

    #[async_trait::async_trait]
    impl WeatherProvider for RecordingWeather {
        fn name(&self) -> &str {
            "recording"
        }

        async fn fetch(&self, latitude: f64, longitude: f64) -> anyhow::Result<WeatherResult> {
            self.calls.lock().unwrap().push((latitude, longitude));
            Ok(WeatherResult {
                temperature_c: 12,
                feels_like_c: 10,
                condition: "halfbewolkt".into(),
                icon: "⛅".into(),
                humidity_pct: 65,
                wind_kph: 14,
                summary: "⛅ 12°C (voelt als 10°C)".into(),
            })
        }
    }

    fn app_with(
        caps: ScriptedCapabilities,
        weather_calls: Arc<Mutex<Vec<(f64, f64)>>>,
    ) -> App {
        App::with_parts(
            configured_settings(),
            Arc::new(caps),
            Arc::new(OfflineGeocoder),
            WeatherLookup::with_providers(vec![Box::new(RecordingWeather {
                calls: weather_calls,
            })]),
        )
    }

    // ── end-to-end annotation ────────────────────────────────────────

    #[tokio::test]
    async fn strict_denied_relaxed_succeeds_end_to_end() {
        // No EXIF GPS, strict fix denied, relaxed fix at (52.0, 4.3):
        // the annotation must carry the fallback source and trigger
        // exactly one weather lookup at those coordinates.
        let mut caps = ScriptedCapabilities::new(true);
        caps.strict_fix = None;
        caps.relaxed_fix = Some((52.0, 4.3));
        let weather_calls = Arc::new(Mutex::new(Vec::new()));

        let app = app_with(caps, weather_calls.clone());
        let annotation = app.annotate(&photo()).await.unwrap();

        let location = annotation.location.unwrap();
        assert_eq!(location.source, LocationSource::DeviceGpsFallback);
        assert!((location.latitude - 52.0).abs() < 1e-9);

        assert!(annotation.weather.is_some());
        assert_eq!(weather_calls.lock().unwrap().as_slice(), &[(52.0, 4.3)]);
    }

    #[tokio::test]
    async fn no_location_skips_weather_entirely() {
        let caps = ScriptedCapabilities::new(true); // every fix fails
        let weather_calls = Arc::new(Mutex::new(Vec::new()));

        let app = app_with(caps, weather_calls.clone());
        let annotation = app.annotate(&photo()).await.unwrap();

        assert!(annotation.location.is_none());
        assert!(annotation.weather.is_none());
        assert!(weather_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn stale_annotation_is_discarded() {
        let mut caps = ScriptedCapabilities::new(true);
        caps.strict_fix = Some((52.0, 4.3));
        *caps.position_delay.lock().unwrap() = Some(Duration::from_millis(50));
        let weather_calls = Arc::new(Mutex::new(Vec::new()));

        let app = app_with(caps, weather_calls.clone());
        let first_photo = photo();
        let second_photo = photo();
        let slow = app.annotate(&first_photo);
        let fast = app.annotate(&second_photo);

        // The second selection begins while the first is still waiting on
        // its position fix; the first result must be dropped.
        let (stale, fresh) = tokio::join!(slow, fast);
        assert!(stale.is_none());
        assert!(fresh.is_some());
    }

    #[test]
    fn selection_tracker_token_semantics() {
        let tracker = SelectionTracker::default();
        let first = tracker.begin();
        assert!(tracker.is_current(first));

        let second = tracker.begin();
        assert!(!tracker.is_current(first));
        assert!(tracker.is_current(second));
    }

    // ── publish gating ───────────────────────────────────────────────

    #[test]
    fn wordpress_client_requires_configuration() {
        let app = App::with_parts(
            Settings::default(),
            Arc::new(ScriptedCapabilities::new(false)),
            Arc::new(OfflineGeocoder),
            WeatherLookup::with_providers(Vec::new()),
        );
        assert!(matches!(
            app.wordpress().unwrap_err(),
            PublishError::NotConfigured
        ));
    }

    #[tokio::test]
    async fn publish_rejects_empty_title() {
        let transport = Arc::new(NoTrafficTransport);
        let client = WordPressClient::with_transport("https://blog.example", transport);
        let draft = PostDraft::new(photo(), "   ");

        let err = publish(&client, &draft).await.unwrap_err();
        assert!(matches!(err, PublishError::EmptyTitle));
    }

    /// Transport that fails the test if anything reaches it.
    struct NoTrafficTransport;

    #[async_trait::async_trait]
    impl Transport for NoTrafficTransport {
        async fn execute(
            &self,
            request: ApiRequest,
        ) -> Result<serde_json::Value, TransportError> {
            panic!("unexpected request to {}", request.url);
        }
    }

    /// Transport scripting the full publish sequence and recording it.
    struct PublishSequence {
        requests: Mutex<Vec<String>>,
        bodies: Mutex<Vec<serde_json::Value>>,
    }

    impl PublishSequence {
        fn new() -> Self {
            Self {
                requests: Mutex::new(Vec::new()),
                bodies: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl Transport for PublishSequence {
        async fn execute(
            &self,
            request: ApiRequest,
        ) -> Result<serde_json::Value, TransportError> {
            let path = request
                .url
                .rsplit("/wp/v2/")
                .next()
                .unwrap_or_default()
                .to_string();
            self.requests
                .lock()
                .unwrap()
                .push(format!("{} {path}", request.method));

            if path == "media" {
                return Ok(serde_json::json!({"id": 41, "source_url": null}));
            }
            if path == "tags" && request.method == reqwest::Method::GET {
                return Ok(serde_json::json!([]));
            }
            if path == "tags" {
                return Ok(serde_json::json!({"id": 100, "name": "zee"}));
            }
            if path == "posts" {
                if let crate::wordpress::transport::RequestBody::Json(body) = &request.body {
                    self.bodies.lock().unwrap().push(body.clone());
                }
                return Ok(serde_json::json!({
                    "id": 9,
                    "title": {"rendered": "Aan zee"},
                    "link": "https://blog.example/?p=9",
                    "content": {"rendered": ""}
                }));
            }
            Err(TransportError::Status {
                status: 404,
                body: path,
            })
        }
    }

    #[tokio::test]
    async fn publish_runs_upload_tags_post_in_order() {
        let transport = Arc::new(PublishSequence::new());
        let client =
            WordPressClient::with_transport("https://blog.example", transport.clone());

        let mut draft = PostDraft::new(photo(), "Aan zee");
        draft.rating = 3;
        // duplicate tag must not reach the server twice
        draft.tag_names = vec!["zee".into(), "zee".into()];

        let post = publish(&client, &draft).await.unwrap();
        assert_eq!(post.id, 9);

        let requests = transport.requests.lock().unwrap().clone();
        assert_eq!(
            requests,
            vec![
                "POST media".to_string(),
                "GET tags".to_string(),
                "POST tags".to_string(),
                "POST posts".to_string(),
            ]
        );

        let bodies = transport.bodies.lock().unwrap();
        let body = &bodies[0];
        assert_eq!(body["featured_media"], 41);
        assert_eq!(body["tags"], serde_json::json!([100]));
        assert_eq!(body["status"], "publish");
        assert_eq!(body["meta"]["rating"], 3);
        assert_eq!(body["meta"]["custom_tags"], "zee");
        assert!(
            body["content"]
                .as_str()
                .unwrap()
                .contains("⭐⭐⭐☆☆ (3/5 sterren)")
        );
    }

    #[tokio::test]
    async fn publish_aborts_when_upload_fails() {
        struct FailingUpload;

        #[async_trait::async_trait]
        impl Transport for FailingUpload {
            async fn execute(
                &self,
                request: ApiRequest,
            ) -> Result<serde_json::Value, TransportError> {
                if request.url.ends_with("/media") {
                    return Err(TransportError::Network("unplugged".into()));
                }
                panic!("no request may follow a failed upload, got {}", request.url);
            }
        }

        let client =
            WordPressClient::with_transport("https://blog.example", Arc::new(FailingUpload));
        let mut draft = PostDraft::new(photo(), "Aan zee");
        draft.tag_names = vec!["zee".into()];

        let err = publish(&client, &draft).await.unwrap_err();
        assert!(matches!(err, PublishError::MediaUpload(_)));
    }

    // ── tag dedup ────────────────────────────────────────────────────

    #[test]
    fn dedupe_is_case_sensitive_and_order_preserving() {
        let names = vec![
            "Zee".to_string(),
            "zee".to_string(),
            "Zee".to_string(),
            "strand".to_string(),
        ];
        assert_eq!(dedupe_tags(&names), vec!["Zee", "zee", "strand"]);
    }

    #[test]
    fn dedupe_drops_blank_tags() {
        let names = vec!["".to_string(), "  ".to_string(), "duin".to_string()];
        assert_eq!(dedupe_tags(&names), vec!["duin"]);
    }
}
