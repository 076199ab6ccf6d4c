//! # photopost
//!
//! Photo publishing pipeline for WordPress: pick or capture a photo,
//! auto-annotate it with geolocation, weather, rating, and tags, and
//! publish it as a post through the REST API.
//!
//! ## Quick Start
//!
//! The pipeline module wires everything together: capability detection,
//! the location fallback chain, the weather provider chain, and the
//! dual-transport WordPress client.
//!
//! ```rust,no_run
//! use photopost::capability::PhotoFile;
//! use photopost::config::Settings;
//! use photopost::pipeline::{self, App, PostDraft};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load(Some("settings.json".as_ref()))?;
//!     let app = App::new(settings);
//!
//!     // Load a photo and resolve location + weather for it
//!     let photo = PhotoFile::from_path("strand.jpg".as_ref())?;
//!     let annotation = app.annotate(&photo).await;
//!
//!     // Fill in the draft and publish
//!     let mut draft = PostDraft::new(photo, "Avond aan zee");
//!     draft.tag_names = vec!["strand".into(), "zonsondergang".into()];
//!     draft.rating = 4;
//!     if let Some(annotation) = annotation {
//!         draft.location = annotation.location;
//!         draft.weather = annotation.weather;
//!     }
//!
//!     let client = app.wordpress()?;
//!     let post = pipeline::publish(&client, &draft).await?;
//!     println!("Published: {}", post.link);
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`capability`] — host primitives (camera, gallery, position, share)
//!   behind one trait with native and desktop implementations
//! - [`config`] — connection settings, persistence, export/import
//! - [`geocode`] — reverse geocoding of coordinates to place names
//! - [`location`] — the strategy-chain location resolver and EXIF GPS
//! - [`weather`] — the provider-chain weather lookup
//! - [`wordpress`] — REST client, dual transport, post composition
//! - [`pipeline`] — the application root tying it all together

pub mod capability;
pub mod config;
pub mod geocode;
pub mod location;
pub mod pipeline;
pub mod weather;
pub mod wordpress;

/// User-Agent sent on every outbound request.
pub(crate) const USER_AGENT: &str = concat!("photopost/", env!("CARGO_PKG_VERSION"));
