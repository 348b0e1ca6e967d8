//! Write a synthetic temperature dataset as raw and compressed .bitc files

use bitinfo::{to_compressed, to_uncompressed, CompressOptions, Dataset, Variable};
use std::path::Path;
use std::time::Instant;

fn main() -> bitinfo::Result<()> {
    let (nt, nlat, nlon) = (24, 90, 180);
    println!("Building a {nt} x {nlat} x {nlon} temperature field...");

    let start = Instant::now();
    let ds = build_demo_dataset(nt, nlat, nlon)?;
    println!("Built dataset in {:?}", start.elapsed());

    let start = Instant::now();
    let raw = to_uncompressed(&ds, Path::new("example_air.bitc"))?;
    println!("Raw file: {} bytes in {:?}", raw.file_bytes, start.elapsed());

    let start = Instant::now();
    let options = CompressOptions::default().with_for_cdo(true);
    let compressed = to_compressed(&ds, Path::new("example_air_compressed.bitc"), &options)?;
    println!(
        "Compressed file: {} bytes ({:.1}x) in {:?}",
        compressed.file_bytes,
        raw.file_bytes as f64 / compressed.file_bytes as f64,
        start.elapsed()
    );
    println!("\nRun 'cargo run --example analyze_dataset' to round it!");
    Ok(())
}

/// Smooth field with weather-like variability in the low bits
fn build_demo_dataset(nt: usize, nlat: usize, nlon: usize) -> bitinfo::Result<Dataset> {
    let values: Vec<f32> = (0..nt * nlat * nlon)
        .map(|i| {
            let t = (i / (nlat * nlon)) as f64;
            let lat = ((i / nlon) % nlat) as f64;
            let lon = (i % nlon) as f64;
            let wave = (lon / 13.0 + t / 5.0).sin() * (lat / 7.0).cos();
            let jitter = ((i as f64 * 12.9898).sin() * 43_758.545_3).fract() * 0.2;
            (300.0 - 60.0 * (lat / nlat as f64 - 0.5).abs() + 4.0 * wave + jitter) as f32
        })
        .collect();
    let lats: Vec<f32> = (0..nlat).map(|i| -89.0 + 2.0 * i as f32).collect();
    let lons: Vec<f32> = (0..nlon).map(|i| 2.0 * i as f32).collect();

    Dataset::new()
        .with_coord(Variable::from_vec("lat", &["lat"], &[nlat], lats)?)?
        .with_coord(Variable::from_vec("lon", &["lon"], &[nlon], lons)?)?
        .with_data_var(
            Variable::from_vec("air", &["time", "lat", "lon"], &[nt, nlat, nlon], values)?
                .with_attr("units", "degK")
                .with_attr("long_name", "air temperature"),
        )
}
