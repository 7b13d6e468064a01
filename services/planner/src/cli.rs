//! services/planner/src/cli.rs
//!
//! Command-line interface definition for the trip planner.

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use trip_planner_core::domain::TransportMode;

/// Plan road trips, keep them on this device and sync favorites to your account.
#[derive(Parser, Debug, Clone)]
#[command(name = "planner")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// List saved trips
    List,

    /// List favorite trips, synced with the signed-in account
    Favorites,

    /// Plan a trip and optionally save it
    Plan(PlanArgs),

    /// Flip a trip's favorite flag
    Toggle { trip_id: String },

    /// Delete a saved trip
    Delete { trip_id: String },

    /// Rate a saved trip from 1 to 5
    Review {
        trip_id: String,

        #[arg(value_parser = clap::value_parser!(u8).range(1..=5))]
        rating: u8,

        #[arg(long, default_value = "")]
        comment: String,
    },

    /// Decode an encoded polyline into coordinates
    Decode { polyline: String },

    /// Create an account
    SignUp { email: String, password: String },

    /// Sign in and keep the session for later commands
    SignIn { email: String, password: String },

    /// Forget the stored session
    SignOut,

    /// Send a password reset email
    ResetPassword { email: String },

    /// Follow the signed-in account's favorites until interrupted
    Watch,
}

#[derive(Args, Debug, Clone)]
pub struct PlanArgs {
    #[arg(long)]
    pub from: String,

    /// Origin as "lat,lng"
    #[arg(long, value_parser = parse_lat_lng, allow_hyphen_values = true)]
    pub from_at: (f64, f64),

    #[arg(long)]
    pub to: String,

    /// Destination as "lat,lng"
    #[arg(long, value_parser = parse_lat_lng, allow_hyphen_values = true)]
    pub to_at: (f64, f64),

    /// Departure date (YYYY-MM-DD)
    #[arg(long)]
    pub depart: Option<NaiveDate>,

    /// Return date (YYYY-MM-DD)
    #[arg(long = "return")]
    pub return_date: Option<NaiveDate>,

    #[arg(long, default_value_t = 1)]
    pub adults: u32,

    /// Ages of the children, comma separated
    #[arg(long, value_delimiter = ',')]
    pub children_ages: Vec<u32>,

    #[arg(long)]
    pub pets: bool,

    /// car, moto, airplane or motorhome
    #[arg(long, default_value = "car")]
    pub mode: TransportMode,

    /// Save the planned trip
    #[arg(long)]
    pub save: bool,
}

fn parse_lat_lng(value: &str) -> Result<(f64, f64), String> {
    let (lat, lng) = value
        .split_once(',')
        .ok_or_else(|| format!("expected \"lat,lng\", got {:?}", value))?;
    let lat: f64 = lat.trim().parse().map_err(|e| format!("bad latitude: {}", e))?;
    let lng: f64 = lng.trim().parse().map_err(|e| format!("bad longitude: {}", e))?;
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
        return Err(format!("coordinate out of range: {}", value));
    }
    Ok((lat, lng))
}
