//! Corridor search with stub providers, no network needed.
//!
//! Run with: RUST_LOG=debug cargo run --example corridor_search

use async_trait::async_trait;
use route_corridor::{
    Candidate, CandidateDirectory, CandidateIndex, Capability, GeoPoint, GeocodeError,
    GeocodeResult, Geocoder, InMemoryDirectory, PlannerState, RoutePlanner, SearchParams,
    SelectionPolicy, StraightLineOnly,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Looks up a handful of cities.
struct CityGeocoder;

#[async_trait]
impl Geocoder for CityGeocoder {
    async fn geocode(&self, query: &str) -> Result<GeocodeResult, GeocodeError> {
        let point = match query {
            "Hiroshima" => GeoPoint::new(34.3853, 132.4553),
            "Okayama" => GeoPoint::new(34.6551, 133.9195),
            "Kobe" => GeoPoint::new(34.6901, 135.1955),
            _ => return Err(GeocodeError::NotFound { query: query.to_string() }),
        };
        Ok(GeocodeResult { point, display_name: query.to_string() })
    }
}

fn lots() -> Vec<Candidate> {
    vec![
        Candidate::new("miyajima", "Miyajima SA", GeoPoint::new(34.33, 132.30)),
        Candidate::new("saijo", "Saijo Truck Stop", GeoPoint::new(34.43, 132.74))
            .with_capabilities([Capability::LargeVehicle, Capability::Shower]),
        Candidate::new("onomichi", "Onomichi PA", GeoPoint::new(34.45, 133.20))
            .with_capabilities([Capability::Toilet, Capability::Open24Hours]),
        Candidate::new("fukuyama", "Fukuyama SA", GeoPoint::new(34.52, 133.38))
            .with_capabilities([Capability::LargeVehicle, Capability::Shower, Capability::Restaurant]),
        Candidate::new("kurashiki", "Kurashiki Lot", GeoPoint::new(34.60, 133.77))
            .with_capabilities([Capability::LargeVehicle]),
        Candidate::new("himeji", "Himeji Campground", GeoPoint::new(34.82, 134.69))
            .with_capabilities([Capability::CamperVan, Capability::DogRun]),
        Candidate::new("matsue", "Matsue Camp", GeoPoint::new(35.47, 133.05)),
    ]
}

fn print_results(title: &str, state: &PlannerState) {
    println!("{}", title);
    if let Some(err) = state.error() {
        println!("   Error: {}\n", err);
        return;
    }
    let Some(outcome) = state.outcome() else {
        println!("   No results\n");
        return;
    };

    println!(
        "   {} -> {}: {:.1} km ({})",
        outcome.origin.display_name,
        outcome.destination.display_name,
        outcome.route.distance_km,
        if outcome.route.is_road_route { "road" } else { "straight line" }
    );
    for m in &outcome.matches {
        println!(
            "   {:>5.1}%  {:<20} {:.2} km off route",
            m.route_position * 100.0,
            m.candidate.name,
            m.distance_from_route_km
        );
    }
    for stop in &outcome.rest_stops {
        println!("   rest stop marker at ({:.4}, {:.4})", stop.latitude, stop.longitude);
    }
    println!();
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let directory = InMemoryDirectory::new(lots());
    let _subscription = directory.subscribe(Arc::new(|lots: &[Candidate]| {
        println!("Directory now holds {} lots", lots.len());
    }));

    let planner = RoutePlanner::new(
        Arc::new(CityGeocoder),
        Arc::new(StraightLineOnly),
        Duration::from_millis(200),
        Duration::from_secs(8),
    );
    let state = Mutex::new(PlannerState::new());

    println!("\nCorridor Search Examples\n");

    // 1. Every lot within 15 km, in route order
    let index = CandidateIndex::new(directory.snapshot());
    let params = SearchParams::new("Hiroshima", "Kobe")
        .with_corridor_km(15.0)
        .with_policy(SelectionPolicy::Unthinned);
    planner.search(&state, &params, &index).await;
    print_results("1. All lots within 15 km (Hiroshima -> Kobe):", &state.lock().unwrap());

    // 2. One lot per 50 km of driving
    let params = params.with_policy(SelectionPolicy::IntervalSampled { rest_interval_km: 50.0 });
    planner.search(&state, &params, &index).await;
    print_results("2. Rest stops every 50 km:", &state.lock().unwrap());

    // 3. Only lots with showers for large trucks
    directory.upsert(
        Candidate::new("bizen", "Bizen Truck Plaza", GeoPoint::new(34.72, 134.20))
            .with_capabilities([Capability::LargeVehicle, Capability::Shower]),
    );
    let index = CandidateIndex::new(directory.snapshot());
    let params = SearchParams::new("Hiroshima", "Kobe")
        .with_corridor_km(15.0)
        .with_policy(SelectionPolicy::Unthinned)
        .require(Capability::LargeVehicle)
        .require(Capability::Shower);
    planner.search(&state, &params, &index).await;
    print_results("3. Large vehicle + shower:", &state.lock().unwrap());

    // 4. Unknown address keeps the previous results
    let params = SearchParams::new("Atlantis", "Kobe");
    planner.search(&state, &params, &index).await;
    let state = state.lock().unwrap();
    print_results("4. Unknown origin:", &state);
    println!("   Previous results still held: {}", state.results().len());
}
