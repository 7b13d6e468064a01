//! services/planner/src/bin/planner.rs

use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use clap::Parser;
use planner_lib::{
    adapters::{FileStorage, FirebaseAuthAdapter, GoogleMapsAdapter, RealtimeDbAdapter},
    cli::{Cli, Commands, PlanArgs},
    commands,
    config::Config,
    error::AppError,
    planner::{MapRegion, TripPlanner, TripRequest},
    state::{CredentialStore, TravelStateManager},
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use trip_planner_core::{
    estimate_travel, polyline, AuthService, AuthSession, Coordinate, LatLng, LocalTripStore,
    PlaceRef, RemoteFavoritesSync, Travelers, Trip, TripStore,
};

const SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(10);
const REFRESH_MARGIN_MINUTES: i64 = 1;

/// Everything a command may need.
struct Context {
    config: Config,
    http: reqwest::Client,
    credentials: CredentialStore,
    session: Option<AuthSession>,
    manager: TravelStateManager,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let cli = Cli::parse();

    // --- 1. Load Configuration & Set Up Logging ---
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    info!("Configuration loaded from environment");

    // --- 2. Initialize Adapters and Restore the Session ---
    let http = reqwest::Client::new();
    let storage = Arc::new(FileStorage::new(config.storage_dir.clone()));
    let credentials = CredentialStore::new(storage.clone());
    let session = restore_session(&config, &http, &credentials).await;
    let local: Arc<dyn LocalTripStore> = Arc::new(TripStore::new(storage));
    let remote = config.remote_db_url.as_ref().map(|url| {
        let mut adapter = RealtimeDbAdapter::new(http.clone(), url);
        let token = session
            .as_ref()
            .map(|s| s.id_token.as_str())
            .or(config.remote_db_auth.as_deref());
        if let Some(token) = token {
            adapter = adapter.with_auth(token);
        }
        Arc::new(adapter) as Arc<dyn RemoteFavoritesSync>
    });

    // --- 3. Build the Travel State ---
    let manager = TravelStateManager::new(local, remote);
    manager.load_data().await;

    // --- 4. Run the Command ---
    let mut ctx = Context {
        config,
        http,
        credentials,
        session,
        manager,
    };
    let result = run(cli.command, &mut ctx).await;
    ctx.manager.sign_out().await;
    result
}

async fn run(command: Commands, ctx: &mut Context) -> Result<(), AppError> {
    match command {
        Commands::List => {
            for trip in ctx.manager.trips() {
                print_trip(&trip);
            }
        }
        Commands::Favorites => {
            connect(ctx).await;
            for trip in ctx.manager.favorites() {
                print_trip(&trip);
            }
        }
        Commands::Plan(args) => plan(args, ctx).await?,
        Commands::Toggle { trip_id } => {
            connect(ctx).await;
            if commands::toggle_favorite(&ctx.manager, &trip_id).await? {
                println!("{} is now a favorite", trip_id);
            } else {
                println!("{} is no longer a favorite", trip_id);
            }
        }
        Commands::Delete { trip_id } => {
            connect(ctx).await;
            commands::delete_trip(&ctx.manager, &trip_id).await?;
            println!("Deleted {}", trip_id);
        }
        Commands::Review {
            trip_id,
            rating,
            comment,
        } => {
            connect(ctx).await;
            commands::review_trip(&ctx.manager, &trip_id, rating, comment).await?;
            println!("Saved a {}-star review for {}", rating, trip_id);
        }
        Commands::Decode { polyline: encoded } => {
            for point in polyline::decode(&encoded) {
                println!("{:.5},{:.5}", point.latitude, point.longitude);
            }
        }
        Commands::SignUp { email, password } => {
            let session = auth(&ctx.config, &ctx.http)?.sign_up(&email, &password).await?;
            ctx.credentials.save(&session).await?;
            println!("{}", session.user_id);
        }
        Commands::SignIn { email, password } => {
            let session = auth(&ctx.config, &ctx.http)?.sign_in(&email, &password).await?;
            ctx.credentials.save(&session).await?;
            println!("{}", session.user_id);
        }
        Commands::SignOut => {
            let Some(session) = ctx.session.take() else {
                println!("Not signed in");
                return Ok(());
            };
            match auth(&ctx.config, &ctx.http) {
                Ok(provider) => provider.sign_out(&session).await?,
                Err(e) => warn!("Skipping provider sign-out: {}", e),
            }
            ctx.manager.sign_out().await;
            ctx.credentials.clear().await?;
            println!("Signed out {}", session.user_id);
        }
        Commands::ResetPassword { email } => {
            auth(&ctx.config, &ctx.http)?.reset_password(&email).await?;
            println!("Password reset email sent to {}", email);
        }
        Commands::Watch => {
            if ctx.session.is_none() {
                return Err(AppError::InvalidInput(
                    "sign in before watching favorites".to_string(),
                ));
            }
            watch(ctx).await
        }
    }
    Ok(())
}

/// Loads the stored session and renews its id token when it is about to
/// expire. A session that cannot be renewed is discarded.
async fn restore_session(
    config: &Config,
    http: &reqwest::Client,
    credentials: &CredentialStore,
) -> Option<AuthSession> {
    let session = credentials.load().await?;
    let margin = chrono::Duration::minutes(REFRESH_MARGIN_MINUTES);
    if !session.expires_within(Utc::now(), margin) {
        return Some(session);
    }

    let refreshed = match auth(config, http) {
        Ok(provider) => provider.refresh(&session).await.map_err(AppError::from),
        Err(e) => Err(e),
    };
    match refreshed {
        Ok(renewed) => {
            if let Err(e) = credentials.save(&renewed).await {
                warn!("Could not store the renewed session: {}", e);
            }
            Some(renewed)
        }
        Err(e) => {
            warn!("Session for {} expired and could not be renewed: {}", session.user_id, e);
            if let Err(e) = credentials.clear().await {
                warn!("Could not clear the stored session: {}", e);
            }
            None
        }
    }
}

async fn plan(args: PlanArgs, ctx: &Context) -> Result<(), AppError> {
    let config = &ctx.config;
    let maps = GoogleMapsAdapter::new(
        ctx.http.clone(),
        config.maps_base_url.clone(),
        config.require_maps_key()?,
        config.maps_language.clone(),
        config.places_limit,
    );
    let planner = TripPlanner::new(Arc::new(maps));

    let request = TripRequest {
        origin: place(args.from, args.from_at),
        destination: place(args.to, args.to_at),
        departure_date: args.depart.map(start_of_day),
        return_date: args.return_date.map(start_of_day),
        travelers: Travelers::new(args.adults, args.children_ages),
        has_pets: args.pets,
        transport_mode: args.mode,
    };
    let trip = planner.plan(request).await?;

    let origin = Coordinate::new(args.from_at.0, args.from_at.1);
    let destination = Coordinate::new(args.to_at.0, args.to_at.1);
    let region = MapRegion::framing(origin, destination);
    let estimate = estimate_travel(origin, destination, args.mode);
    println!("{}", trip.share_message());
    println!(
        "Straight line: {:.0} km, about {:.1} h by {:?}",
        estimate.distance_km, estimate.hours, args.mode
    );
    println!(
        "Map: center {:.4},{:.4} span {:.4}x{:.4}",
        region.latitude, region.longitude, region.latitude_delta, region.longitude_delta
    );
    if let Some(route) = &trip.route {
        for (i, step) in route.steps.iter().enumerate() {
            println!(
                "  {}. {} ({})",
                i + 1,
                step.plain_instructions(),
                step.distance_text().unwrap_or("-")
            );
        }
    }
    for (title, places) in [("Lodging", &trip.lodging), ("Attractions", &trip.attractions)] {
        println!("{}:", title);
        for p in places.iter() {
            match p.rating {
                Some(rating) => println!("  {} ({:.1})", p.name, rating),
                None => println!("  {}", p.name),
            }
        }
    }

    if args.save {
        connect(ctx).await;
        let id = ctx
            .manager
            .add_trip(trip)
            .await
            .ok_or_else(|| AppError::Internal("the trip could not be saved".to_string()))?;
        println!("Saved trip {}", id);
    }
    Ok(())
}

/// Attaches the stored session's user to the manager and waits for the first
/// remote snapshot, so a following mutation is not overwritten by it.
async fn connect(ctx: &Context) {
    let Some(session) = &ctx.session else {
        return;
    };
    let manager = &ctx.manager;
    manager.set_user(session.user_id.clone()).await;
    if !manager.has_subscription().await {
        return;
    }
    let mut rx = manager.watch();
    let synced = tokio::time::timeout(SNAPSHOT_TIMEOUT, async {
        rx.wait_for(|s| s.has_remote_snapshot()).await.map(|_| ())
    })
    .await;
    if !matches!(synced, Ok(Ok(()))) {
        warn!("No remote favorites received yet; continuing with local data");
    }
}

async fn watch(ctx: &Context) {
    connect(ctx).await;
    let mut rx = ctx.manager.watch();
    loop {
        let favorites: Vec<String> = rx
            .borrow_and_update()
            .favorites
            .iter()
            .map(|t| t.id.clone())
            .collect();
        println!("{} favorites: {}", favorites.len(), favorites.join(", "));

        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
}

fn auth(config: &Config, http: &reqwest::Client) -> Result<FirebaseAuthAdapter, AppError> {
    Ok(FirebaseAuthAdapter::new(
        http.clone(),
        config.auth_base_url.clone(),
        config.require_firebase_key()?,
    )
    .with_token_url(config.token_base_url.clone()))
}

fn place(name: String, (lat, lng): (f64, f64)) -> PlaceRef {
    PlaceRef {
        description: name,
        location: Some(LatLng { lat, lng }),
        ..Default::default()
    }
}

fn start_of_day(date: NaiveDate) -> chrono::DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::default()))
}

fn print_trip(trip: &Trip) {
    let name = |p: &Option<PlaceRef>| p.as_ref().map(|p| p.main_text().to_string());
    let distance = trip.route.as_ref().and_then(|r| r.distance.clone());
    println!(
        "{}{}  {} -> {}  {}",
        if trip.favorite { "* " } else { "  " },
        trip.id,
        name(&trip.origin).unwrap_or_else(|| "?".to_string()),
        name(&trip.destination).unwrap_or_else(|| "?".to_string()),
        distance.unwrap_or_default()
    );
}
