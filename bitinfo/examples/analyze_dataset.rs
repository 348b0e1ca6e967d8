//! Analyse the dataset written by `write_dataset`, round it and compare sizes

use bitinfo::{
    bitround_dataset, get_bitinformation, get_keepbits, open_dataset, render_text, to_compressed,
    BitInformationOptions, BitInformationSummary, CompressOptions, KeepbitsSpec,
};
use std::path::Path;
use std::time::Instant;

fn main() -> bitinfo::Result<()> {
    let filename = "example_air.bitc";
    if !Path::new(filename).exists() {
        println!("File '{filename}' not found!");
        println!("   Run 'cargo run --example write_dataset' first");
        return Ok(());
    }

    let start = Instant::now();
    let ds = open_dataset(filename)?;
    println!("Loaded {} data variables in {:?}", ds.data_vars().len(), start.elapsed());

    let start = Instant::now();
    let options = BitInformationOptions::default()
        .with_dim("lon")
        .with_label("example_air");
    let info = get_bitinformation(&ds, &options)?;
    println!("Bitinformation in {:?}\n", start.elapsed());
    print!("{}", render_text(&BitInformationSummary::new(&info)?));

    let inflevels = [0.99, 0.999, 0.9999];
    let keepbits = get_keepbits(&info, &inflevels, None)?;
    for (name, var) in keepbits.iter() {
        println!("\n{name}:");
        for (level, keep) in inflevels.iter().zip(&var.keepbits) {
            println!("   {:>7.2}% -> {keep} mantissa bits", level * 100.0);
        }
    }

    let keepbits = get_keepbits(&info, &[0.99], None)?;
    let rounded = bitround_dataset(&ds, &KeepbitsSpec::try_from(&keepbits)?)?;
    let summary = to_compressed(
        &rounded,
        Path::new("example_air_bitrounded_compressed.bitc"),
        &CompressOptions::default(),
    )?;
    println!(
        "\nBitrounded and compressed: {} -> {} bytes ({:.1}x)",
        summary.raw_bytes,
        summary.file_bytes,
        summary.raw_bytes as f64 / summary.file_bytes as f64
    );
    Ok(())
}
