use bitinfo::{
    bitround_along_dim, bitround_dataset, get_bitinformation, get_keepbits, open_dataset,
    to_compressed, to_uncompressed, BitInformationOptions, CompressOptions, Dataset, DimSelection,
    KeepbitsSpec, Variable, DEFAULT_ALONG_DIM_INFLEVELS, KEEPBITS_ATTR,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs;

const NT: usize = 12;
const NLAT: usize = 25;
const NLON: usize = 53;

/// Smooth temperature-like field with small measurement noise
fn air_temperature() -> Dataset {
    let mut rng = StdRng::seed_from_u64(42);
    let values: Vec<f32> = (0..NT * NLAT * NLON)
        .map(|i| {
            let t = i / (NLAT * NLON);
            let lat = (i / NLON) % NLAT;
            let lon = i % NLON;
            let smooth = 250.0
                + 40.0 * (lat as f64 / NLAT as f64 * std::f64::consts::PI).sin()
                + 5.0 * (lon as f64 / 9.0 + t as f64 / 4.0).cos();
            (smooth + rng.gen_range(-0.05..0.05)) as f32
        })
        .collect();
    Dataset::new()
        .with_coord(
            Variable::from_vec("time", &["time"], &[NT], (0..NT as i64).collect::<Vec<_>>()).unwrap(),
        )
        .unwrap()
        .with_coord(
            Variable::from_vec("lon", &["lon"], &[NLON], (0..NLON).map(|i| i as f32 * 2.5).collect::<Vec<_>>())
                .unwrap(),
        )
        .unwrap()
        .with_data_var(
            Variable::from_vec("air", &["time", "lat", "lon"], &[NT, NLAT, NLON], values)
                .unwrap()
                .with_attr("units", "degK"),
        )
        .unwrap()
}

#[test]
fn test_bitrounding_shrinks_compressed_size() {
    let dir = tempfile::tempdir().unwrap();
    let ds = air_temperature();

    let info = get_bitinformation(&ds, &BitInformationOptions::default().with_dim("lon")).unwrap();
    let keepbits = get_keepbits(&info, &[0.99], None).unwrap();
    let keep = keepbits.at("air", 0).unwrap();
    assert!(keep > 0 && keep < 23, "keepbits {keep}");

    let rounded = bitround_dataset(&ds, &KeepbitsSpec::try_from(&keepbits).unwrap()).unwrap();
    assert_eq!(
        rounded.data_var("air").unwrap().attrs().get(KEEPBITS_ATTR),
        Some(&serde_json::Value::from(keep))
    );

    let raw = to_uncompressed(&ds, &dir.path().join("air.bitc")).unwrap();
    let compressed =
        to_compressed(&ds, &dir.path().join("air_compressed.bitc"), &CompressOptions::default()).unwrap();
    let bitrounded = to_compressed(
        &rounded,
        &dir.path().join("air_bitrounded_compressed.bitc"),
        &CompressOptions::default(),
    )
    .unwrap();

    let size = |p: &std::path::Path| fs::metadata(p).unwrap().len();
    assert_eq!(size(&raw.path), raw.file_bytes);
    assert!(size(&compressed.path) < size(&raw.path));
    assert!(size(&bitrounded.path) < size(&compressed.path));

    assert_eq!(open_dataset(&compressed.path).unwrap(), ds);
    assert_eq!(open_dataset(&bitrounded.path).unwrap(), rounded);
}

#[test]
fn test_cached_bitinformation_is_reused() {
    let dir = tempfile::tempdir().unwrap();
    let ds = air_temperature();
    let options = BitInformationOptions::default()
        .with_dim(DimSelection::Axis(-1))
        .with_label("air_temperature")
        .with_cache_dir(dir.path());

    let first = get_bitinformation(&ds, &options).unwrap();
    assert!(dir.path().join("air_temperature.json").exists());

    // a cached result is returned even for a different dataset
    let other = ds.isel("time", 0..2).unwrap();
    assert_eq!(get_bitinformation(&other, &options).unwrap(), first);
    let recomputed = get_bitinformation(&other, &options.clone().with_overwrite(true)).unwrap();
    assert_ne!(recomputed, first);
}

#[test]
fn test_bitround_along_time() {
    let ds = air_temperature();
    let info = get_bitinformation(&ds, &BitInformationOptions::default().with_dim("lon")).unwrap();
    let rounded = bitround_along_dim(&ds, &info, "time", &DEFAULT_ALONG_DIM_INFLEVELS).unwrap();
    assert_eq!(rounded.dims(), ds.dims());

    // the first slice is kept at full information
    let stride = NT / DEFAULT_ALONG_DIM_INFLEVELS.len();
    assert_eq!(
        rounded.isel("time", 0..stride).unwrap().data_var("air").unwrap().data(),
        ds.isel("time", 0..stride).unwrap().data_var("air").unwrap().data()
    );
    let last = rounded.isel("time", NT - 1..NT).unwrap();
    assert_ne!(
        last.data_var("air").unwrap().data(),
        ds.isel("time", NT - 1..NT).unwrap().data_var("air").unwrap().data()
    );
}
