use bitinfo::{
    bitround_along_dim, bitround_dataset, get_bitinformation, get_keepbits, open_dataset,
    parse_range, render_text, to_compressed, ArrayData, BitInformationOptions,
    BitInformationSummary, BitcFile, CompressOptions, DataType, Dataset, DimSelection, Error,
    Executor, Flow, FlowParameters, InformationFilter, KeepbitsSpec, Mask, Variable,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(author, version, long_about = None)]
#[command(about = "bitinfo - bitwise real information content and bit rounding of gridded data")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum DType {
    F32,
    F64,
    I32,
    I64,
    U32,
    U64,
}

impl From<DType> for DataType {
    fn from(dtype: DType) -> Self {
        match dtype {
            DType::F32 => DataType::F32,
            DType::F64 => DataType::F64,
            DType::I32 => DataType::I32,
            DType::I64 => DataType::I64,
            DType::U32 => DataType::U32,
            DType::U64 => DataType::U64,
        }
    }
}

/// Dimension selection and analysis flags shared by the analysis commands
#[derive(Args)]
struct AnalysisArgs {
    /// Dimension to analyse along (all dimensions when neither --dim nor --axis is given)
    #[arg(long, conflicts_with = "axis")]
    dim: Option<String>,

    /// Axis to analyse along, negative counts from the last axis
    #[arg(long, allow_hyphen_values = true)]
    axis: Option<isize>,

    /// Cache label, stored as <label>.json in the working directory
    #[arg(long)]
    label: Option<String>,

    /// Recompute a cached result
    #[arg(long)]
    overwrite: bool,

    /// Keep information below the significance threshold
    #[arg(long)]
    keep_insignificant: bool,

    /// Confidence level of the significance test
    #[arg(long, default_value_t = bitinfo::information::DEFAULT_CONFIDENCE)]
    confidence: f64,

    /// Exclude elements equal to this value instead of NaN
    #[arg(long, allow_hyphen_values = true, conflicts_with = "no_mask")]
    mask_value: Option<f64>,

    /// Use every element, NaN included
    #[arg(long)]
    no_mask: bool,

    /// Restrict the analysis to an index range, e.g. time=0:10
    #[arg(long)]
    isel: Option<String>,
}

impl AnalysisArgs {
    fn options(&self) -> BitInformationOptions {
        let dim = match (&self.dim, self.axis) {
            (Some(name), _) => DimSelection::Name(name.clone()),
            (None, Some(axis)) => DimSelection::Axis(axis),
            (None, None) => DimSelection::All,
        };
        let mask = match (self.mask_value, self.no_mask) {
            (_, true) => Mask::None,
            (Some(value), false) => Mask::Value(value),
            (None, false) => Mask::Nan,
        };
        let mut options = BitInformationOptions::default()
            .with_dim(dim)
            .with_overwrite(self.overwrite)
            .with_set_zero_insignificant(!self.keep_insignificant)
            .with_confidence(self.confidence)
            .with_mask(mask);
        if let Some(label) = &self.label {
            options = options.with_label(label.clone());
        }
        options
    }

    fn load(&self, path: &Path) -> Result<Dataset, Box<dyn std::error::Error>> {
        let ds = open_dataset(path)?;
        match &self.isel {
            Some(selection) => Ok(select(&ds, selection)?),
            None => Ok(ds),
        }
    }
}

fn select(ds: &Dataset, selection: &str) -> Result<Dataset, Box<dyn std::error::Error>> {
    let (dim, range) = selection
        .split_once('=')
        .ok_or("selection must look like dim=start:end")?;
    Ok(ds.isel(dim, parse_range(range).map_err(Error::from)?)?)
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a raw little-endian array into a .bitc file
    Import {
        /// Raw input file
        input: PathBuf,

        /// Output .bitc file
        #[arg(short, long)]
        output: PathBuf,

        /// Variable name
        #[arg(long)]
        name: String,

        /// Element type
        #[arg(long, value_enum, default_value = "f32")]
        dtype: DType,

        /// Dimension names, comma separated
        #[arg(long, value_delimiter = ',', required = true)]
        dims: Vec<String>,

        /// Dimension lengths, comma separated
        #[arg(long, value_delimiter = ',', required = true)]
        shape: Vec<usize>,

        /// Attributes as key=value
        #[arg(long = "attr")]
        attrs: Vec<String>,
    },
    /// Show the contents of a .bitc file
    Info {
        /// Input .bitc file
        file: PathBuf,
    },
    /// Print the bitwise real information content
    Bitinformation {
        file: PathBuf,

        #[command(flatten)]
        analysis: AnalysisArgs,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Print keepbits for information levels
    Keepbits {
        file: PathBuf,

        #[command(flatten)]
        analysis: AnalysisArgs,

        /// Information levels to retain
        #[arg(long, value_delimiter = ',', default_value = "0.99")]
        inflevel: Vec<f64>,

        /// Drop artificial information with the gradient filter
        #[arg(long)]
        gradient: bool,
    },
    /// Bitround and write compressed
    Round {
        file: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        analysis: AnalysisArgs,

        /// Information level to retain
        #[arg(long, default_value_t = 0.99, conflicts_with = "keepbits")]
        inflevel: f64,

        /// Mantissa bits to keep in every variable
        #[arg(long)]
        keepbits: Option<u32>,

        /// Round slices along this dimension with decreasing information levels
        #[arg(long, conflicts_with = "keepbits")]
        along_dim: Option<String>,
    },
    /// Rewrite a file with compression
    Compress {
        file: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        #[arg(long, default_value_t = 9)]
        complevel: u8,

        #[arg(long)]
        no_shuffle: bool,

        /// Chunk the time dimension one step at a time
        #[arg(long)]
        for_cdo: bool,

        /// Chunk lengths as dim=len
        #[arg(long = "chunk")]
        chunks: Vec<String>,
    },
    /// Draw the bitinformation as a text heat map
    Plot {
        file: PathBuf,

        #[command(flatten)]
        analysis: AnalysisArgs,
    },
    /// Round and compress several files with the keepbits of the first
    Pipeline {
        files: Vec<PathBuf>,

        /// Axis to analyse along
        #[arg(long, default_value_t = -1, allow_hyphen_values = true)]
        axis: isize,

        #[arg(long, default_value_t = 0.99)]
        inflevel: f64,

        #[arg(long)]
        overwrite: bool,

        /// Worker threads, sequential when omitted
        #[arg(long)]
        threads: Option<usize>,
    },
}

fn parse_key_value(entry: &str) -> Result<(&str, &str), Box<dyn std::error::Error>> {
    entry
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got `{entry}`").into())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();
    let start_time = std::time::Instant::now();

    match &cli.command {
        Commands::Import {
            input,
            output,
            name,
            dtype,
            dims,
            shape,
            attrs,
        } => {
            let bytes = std::fs::read(input)?;
            let data = ArrayData::from_bytes((*dtype).into(), &bytes)?;
            let mut var = Variable::new(name.clone(), dims.clone(), shape.clone(), data)?;
            for entry in attrs {
                let (key, value) = parse_key_value(entry)?;
                var = var.with_attr(key, value);
            }
            let ds = Dataset::new().with_data_var(var)?;
            let summary = bitinfo::to_uncompressed(&ds, output)?;
            println!("Wrote {} ({} bytes)", summary.path.display(), summary.file_bytes);
        }
        Commands::Info { file } => {
            let bitc = BitcFile::open(file)?;
            let meta = bitc.metadata().metadata();
            println!("File: {}", file.display());
            println!("Size: {} bytes ({} bytes raw)", bitc.file_size(), bitc.raw_size()?);
            println!("Dimensions:");
            for (dim, len) in &meta.dims {
                println!("  {dim}: {len}");
            }
            println!("Variables:");
            for var in bitc.metadata().variables() {
                let stats = bitc.stats(&var.name)?;
                println!(
                    "  {} ({:?}) {} {:?} [{:?}] chunks {:?}: min {:.6} max {:.6} mean {:.6} nan {}",
                    var.name,
                    var.role,
                    var.data_type,
                    var.dims,
                    var.encoding.compression,
                    var.encoding.chunksizes,
                    stats.min,
                    stats.max,
                    stats.mean,
                    stats.nan_count
                );
            }
        }
        Commands::Bitinformation {
            file,
            analysis,
            json,
        } => {
            let info = get_bitinformation(&analysis.load(file)?, &analysis.options())?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                for (name, var) in info.iter() {
                    println!(
                        "{name} ({}) along {:?}: {:.3} bits per value",
                        var.data_type.bit_dim(),
                        var.dims,
                        var.total_information()
                    );
                    for (bit, value) in var.bits.iter().enumerate() {
                        println!("  bit {bit:2}: {value:.6}");
                    }
                }
            }
        }
        Commands::Keepbits {
            file,
            analysis,
            inflevel,
            gradient,
        } => {
            let info = get_bitinformation(&analysis.load(file)?, &analysis.options())?;
            let filter = gradient.then(InformationFilter::gradient);
            let keepbits = get_keepbits(&info, inflevel, filter)?;
            for (name, var) in keepbits.iter() {
                let levels: Vec<String> = keepbits
                    .inflevels()
                    .iter()
                    .zip(&var.keepbits)
                    .map(|(level, keep)| format!("{level}: {keep}"))
                    .collect();
                println!("{name} ({}): {}", var.data_type, levels.join(", "));
            }
        }
        Commands::Round {
            file,
            output,
            analysis,
            inflevel,
            keepbits,
            along_dim,
        } => {
            let ds = analysis.load(file)?;
            let rounded = match (keepbits, along_dim) {
                (Some(keep), _) => bitround_dataset(&ds, &KeepbitsSpec::Uniform(*keep))?,
                (None, Some(dim)) => {
                    let info = get_bitinformation(&ds, &analysis.options())?;
                    bitround_along_dim(&ds, &info, dim, &bitinfo::DEFAULT_ALONG_DIM_INFLEVELS)?
                }
                (None, None) => {
                    let info = get_bitinformation(&ds, &analysis.options())?;
                    let keepbits = get_keepbits(&info, &[*inflevel], None)?;
                    bitround_dataset(&ds, &KeepbitsSpec::try_from(&keepbits)?)?
                }
            };
            let summary = to_compressed(&rounded, output, &CompressOptions::default())?;
            println!(
                "Wrote {} ({} -> {} bytes)",
                summary.path.display(),
                summary.raw_bytes,
                summary.file_bytes
            );
        }
        Commands::Compress {
            file,
            output,
            complevel,
            no_shuffle,
            for_cdo,
            chunks,
        } => {
            let ds = open_dataset(file)?;
            let mut options = CompressOptions::default()
                .with_complevel(*complevel)
                .with_shuffle(!no_shuffle)
                .with_for_cdo(*for_cdo);
            for entry in chunks {
                let (dim, len) = parse_key_value(entry)?;
                options = options.with_chunksize(dim, len.parse()?);
            }
            let summary = to_compressed(&ds, output, &options)?;
            println!(
                "Wrote {} ({} -> {} bytes)",
                summary.path.display(),
                summary.raw_bytes,
                summary.file_bytes
            );
        }
        Commands::Plot { file, analysis } => {
            let info = get_bitinformation(&analysis.load(file)?, &analysis.options())?;
            print!("{}", render_text(&BitInformationSummary::new(&info)?));
        }
        Commands::Pipeline {
            files,
            axis,
            inflevel,
            overwrite,
            threads,
        } => {
            let executor = match threads {
                Some(threads) => Executor::Parallel { threads: *threads },
                None => Executor::Sequential,
            };
            let parameters = FlowParameters::default()
                .with_dim(DimSelection::Axis(*axis))
                .with_inflevel(*inflevel)
                .with_overwrite(*overwrite);
            let result = Flow::new(files).with_executor(executor).run(&parameters)?;
            for (name, var) in result.keepbits.iter() {
                println!("{name}: keepbits {:?}", var.keepbits);
            }
            for output in &result.outputs {
                println!("Wrote {}", output.display());
            }
        }
    }

    log::debug!("completed in {:.2?}", start_time.elapsed());
    Ok(())
}
