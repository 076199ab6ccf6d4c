use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use photopost::capability::PhotoFile;
use photopost::config::Settings;
use photopost::pipeline::{self, Annotation, App, PostDraft};

#[derive(Parser, Debug)]
#[command(
    name = "photopost",
    version,
    about = "Publish photos to WordPress — auto-tagged with geolocation, weather, rating, and tags"
)]
struct Cli {
    /// Path to the settings file (default: settings.json next to binary)
    #[arg(short, long, value_name = "FILE")]
    settings: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a default settings file and exit
    Init,
    /// Validate the configured connection against the site
    Test,
    /// List the site's categories
    Categories,
    /// Annotate and publish a photo
    Publish {
        /// Photo file; omit to pick the newest gallery image
        photo: Option<PathBuf>,
        /// Capture a new photo with the device camera instead
        #[arg(long, conflicts_with = "photo")]
        camera: bool,
        /// Post title
        #[arg(short, long)]
        title: String,
        /// Base body text
        #[arg(short, long)]
        body: Option<String>,
        /// Tag names (repeatable)
        #[arg(long = "tag", value_name = "NAME")]
        tags: Vec<String>,
        /// Category ids (repeatable)
        #[arg(long = "category", value_name = "ID")]
        categories: Vec<u64>,
        /// Star rating 0-5 (0 omits the rating block)
        #[arg(short, long, default_value_t = 0)]
        rating: u8,
        /// Skip location resolution
        #[arg(long)]
        no_location: bool,
        /// Skip the weather lookup
        #[arg(long)]
        no_weather: bool,
        /// Share the post link after publishing
        #[arg(long)]
        share: bool,
    },
    /// Show the most recent posts
    History {
        /// How many posts to list
        #[arg(short, long, default_value_t = 10)]
        limit: u32,
    },
    /// Run the location fallback chain for a photo without publishing
    Locate {
        /// Photo file
        photo: PathBuf,
    },
    /// Export settings (without the credential) to a file
    Export { path: PathBuf },
    /// Import settings from an exported file
    Import { path: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Handle `init` before touching the settings file
    if matches!(cli.command, Command::Init) {
        let mut settings = Settings::default();
        settings.save(cli.settings.as_deref())?;
        let save_path = match cli.settings.as_deref() {
            Some(p) => p.to_path_buf(),
            None => Settings::settings_path()?,
        };
        println!("Default settings written to {}", save_path.display());
        println!("Fill in site_url, username, and app_password before publishing.");
        return Ok(());
    }

    let settings = Settings::load(cli.settings.as_deref())?;
    let app = App::new(settings);

    match cli.command {
        Command::Init => unreachable!("handled above"),

        Command::Test => {
            let client = app.wordpress()?;
            let user = client.test_connection().await?;
            println!("Connected as {} (id {})", user.name, user.id);
        }

        Command::Categories => {
            let client = app.wordpress()?;
            let categories = client.categories().await;
            if categories.is_empty() {
                println!("No categories available.");
            }
            for category in categories {
                println!("{:>6}  {}", category.id, category.name);
            }
        }

        Command::Publish {
            photo,
            camera,
            title,
            body,
            tags,
            categories,
            rating,
            no_location,
            no_weather,
            share,
        } => {
            let client = app.wordpress()?;

            let photo = if camera {
                app.capabilities().capture_from_camera().await?
            } else {
                match photo {
                    Some(path) => PhotoFile::from_path(&path)?,
                    None => app.capabilities().pick_from_gallery().await?,
                }
            };
            log::info!("selected {} ({})", photo.file_name, photo.mime_type);

            let mut draft = PostDraft::new(photo, title);
            draft.body = body.unwrap_or_default();
            draft.tag_names = tags;
            draft.category_ids = categories;
            draft.rating = rating;

            if !no_location {
                let annotation = if no_weather {
                    // Location only; the weather lookup is never attempted.
                    match app.resolver().resolve(&draft.photo).await {
                        Ok(location) => Some(Annotation {
                            location: Some(location),
                            weather: None,
                        }),
                        Err(err) => {
                            log::warn!("photo will be published without location: {err}");
                            None
                        }
                    }
                } else {
                    app.annotate(&draft.photo).await
                };

                if let Some(annotation) = annotation {
                    if let Some(location) = &annotation.location {
                        println!(
                            "Location: {} [{}]",
                            location
                                .place_name
                                .as_deref()
                                .unwrap_or(&location.map_url),
                            location.source.description()
                        );
                    }
                    if let Some(weather) = &annotation.weather {
                        println!("Weather:  {}", weather.summary);
                    }
                    draft.location = annotation.location;
                    draft.weather = annotation.weather;
                }
            }

            let post = pipeline::publish(&client, &draft).await?;
            println!("Published: {}", post.link);

            if share {
                match app
                    .capabilities()
                    .share_post(&post.link, &post.title.rendered)
                    .await?
                {
                    Some(confirmation) => println!("{confirmation}"),
                    None => log::debug!("shared via the host share sheet"),
                }
            }
        }

        Command::History { limit } => {
            let client = app.wordpress()?;
            let posts = client.recent_posts(limit).await?;
            for post in posts {
                println!("{:>6}  {}  {}", post.id, post.title.rendered, post.link);
            }
        }

        Command::Locate { photo } => {
            let photo = PhotoFile::from_path(&photo)?;
            let location = app.resolver().resolve(&photo).await?;
            println!("{}", location.source.description());
            println!(
                "  {:.6}, {:.6} (accuracy: {})",
                location.latitude,
                location.longitude,
                location
                    .accuracy
                    .map(|a| format!("{a:.0} m"))
                    .unwrap_or_else(|| "unknown".into())
            );
            if let Some(name) = &location.place_name {
                println!("  {name}");
            }
            if let Some(address) = &location.formatted_address {
                println!("  {address}");
            }
            println!("  {}", location.map_url);
        }

        Command::Export { path } => {
            app.settings().export_to(&path)?;
            println!("Settings exported to {} (credential omitted)", path.display());
        }

        Command::Import { path } => {
            let mut imported = Settings::import_from(&path)?;
            imported.save(cli.settings.as_deref())?;
            println!("Settings imported from {}", path.display());
            println!("Re-enter the application password before publishing.");
        }
    }

    Ok(())
}
