use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use inquire::{Confirm, CustomType, InquireError, Password, Select, Text};
use wxloc_core::{
    Config, Coordinate, DeviceLocator, FixedLocator, LocationResolver, Resolution,
    UnavailableLocator,
};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "wxloc", version, about = "Resolve the location used by the weather dashboard")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configure the geocoding API key and the default location.
    Configure,

    /// Detect the current location, falling back to the default location.
    Locate {
        /// Latitude of a known device fix.
        #[arg(long, requires = "lon", allow_negative_numbers = true)]
        lat: Option<f64>,

        /// Longitude of a known device fix.
        #[arg(long, requires = "lat", allow_negative_numbers = true)]
        lon: Option<f64>,

        /// Skip device detection and use the default location.
        #[arg(long, conflicts_with_all = ["lat", "lon"])]
        no_device: bool,
    },

    /// Look up a place by name.
    Search {
        /// Place name, e.g. "Atlanta, GA".
        #[arg(required = true, num_args = 1..)]
        place: Vec<String>,
    },

    /// Interactive session sharing one location cache across lookups.
    Session,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure => configure(),
            Command::Locate { lat, lon, no_device } => {
                let locator: Option<Arc<dyn DeviceLocator>> = match (lat, lon) {
                    (Some(lat), Some(lon)) => Some(Arc::new(FixedLocator::new(
                        Coordinate::new(lat, lon).context("Invalid --lat/--lon")?,
                    ))),
                    _ if no_device => Some(Arc::new(UnavailableLocator)),
                    _ => None,
                };

                let resolver = build_resolver(locator)?;
                let resolution = resolver.resolve().await;
                print_resolution(&resolver, &resolution).await;
                Ok(())
            }
            Command::Search { place } => {
                let place = place.join(" ");
                let resolver = build_resolver(None)?;
                let coordinate = resolver
                    .resolve_by_name(&place)
                    .await
                    .with_context(|| format!("Could not resolve '{place}'"))?;
                print_location(&resolver, coordinate).await;
                Ok(())
            }
            Command::Session => session().await,
        }
    }
}

fn build_resolver(locator: Option<Arc<dyn DeviceLocator>>) -> anyhow::Result<LocationResolver> {
    let config = Config::load()?;
    let cache = Arc::new(config.new_cache());
    config.resolver(cache, locator)
}

fn configure() -> anyhow::Result<()> {
    let mut config = Config::load()?;

    let api_key = Password::new("OpenCage API key:")
        .without_confirmation()
        .with_help_message("Leave empty to keep the current key")
        .prompt()?;
    if !api_key.trim().is_empty() {
        config.set_geocoder_api_key(api_key.trim().to_string());
    }

    let current = config.default_location();
    let change_default = Confirm::new(&format!("Change the default location ({current})?"))
        .with_default(false)
        .prompt()?;

    if change_default {
        let lat = CustomType::<f64>::new("Latitude:")
            .with_error_message("Please enter a number")
            .prompt()?;
        let lon = CustomType::<f64>::new("Longitude:")
            .with_error_message("Please enter a number")
            .prompt()?;
        config.default_location = Some(Coordinate::new(lat, lon)?);
    }

    config.save()?;
    println!(
        "Configuration saved to {}",
        Config::config_file_path()?.display()
    );
    Ok(())
}

const LOCATE: &str = "Locate me";
const SEARCH: &str = "Search for a place";
const SHOW: &str = "Show current location";
const REDETECT: &str = "Geolocate again";
const QUIT: &str = "Quit";

async fn session() -> anyhow::Result<()> {
    let resolver = build_resolver(None)?;

    loop {
        let choice = match Select::new("What next?", vec![LOCATE, SEARCH, SHOW, REDETECT, QUIT])
            .prompt()
        {
            Ok(choice) => choice,
            Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => break,
            Err(e) => return Err(e.into()),
        };

        match choice {
            LOCATE => {
                let resolution = resolver.resolve().await;
                print_resolution(&resolver, &resolution).await;
            }
            SEARCH => {
                let place = Text::new("Place:").prompt()?;
                match resolver.resolve_by_name(&place).await {
                    Ok(coordinate) => print_location(&resolver, coordinate).await,
                    Err(e) => {
                        tracing::debug!("search failed: {e}");
                        eprintln!("{}", e.user_message());
                    }
                }
            }
            SHOW => match resolver.cached() {
                Some(cached) => print_location(&resolver, cached.coordinate).await,
                None => println!("No location resolved yet."),
            },
            REDETECT => {
                resolver.invalidate();
                let resolution = resolver.resolve().await;
                print_resolution(&resolver, &resolution).await;
            }
            _ => break,
        }
    }

    Ok(())
}

async fn print_resolution(resolver: &LocationResolver, resolution: &Resolution) {
    if let Some(notice) = resolution.fallback_notice() {
        eprintln!("warning: {notice}");
    }
    print_location(resolver, resolution.coordinate).await;
}

async fn print_location(resolver: &LocationResolver, coordinate: Coordinate) {
    match resolver.display_name().await {
        Some(name) => println!("{name} ({coordinate})"),
        None => println!("{coordinate}"),
    }
}
