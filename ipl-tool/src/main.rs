use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{self, WrapErr};

use ipl_convert::{ConversionMode, ImageConverter, io};
use ipl_formats::PixelFormat;
use ipl_imops::{Histogram, Sharpness, SharpnessAlgorithm};
use ipl_tool::{Pipeline, PipelineConfig};

#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Convert an image file into another pixel format.
    Convert {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        /// Target pixel format, e.g. RGB8 or BayerRG12.
        #[arg(short, long)]
        format: PixelFormat,
        /// Interpret the input as this pixel format instead of RGB8/Mono8.
        #[arg(long)]
        input_format: Option<PixelFormat>,
        #[arg(long, env = "IPL_CONVERSION_MODE", default_value = "high-quality")]
        mode: ConversionMode,
    },

    /// Run the steps of a YAML or TOML pipeline file on an image.
    Pipeline {
        #[arg(short, long, value_name = "CONFIG")]
        config: PathBuf,
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        #[arg(long)]
        input_format: Option<PixelFormat>,
    },

    /// Print histogram statistics and a sharpness score.
    Info {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(long, default_value = "tenengrad")]
        algorithm: String,
    },

    /// Print an example pipeline configuration as YAML.
    PrintExampleConfig,
}

fn read_input(path: &PathBuf, input_format: Option<PixelFormat>) -> eyre::Result<ipl_image::Image<'static>> {
    let image = match input_format {
        Some(fmt) => io::read_image_as(path, fmt),
        None => io::read_image(path),
    }
    .with_context(|| format!("reading image \"{}\"", path.display()))?;
    tracing::info!(
        "read {}x{} {} image from \"{}\"",
        image.width(),
        image.height(),
        image.pixel_format(),
        path.display()
    );
    Ok(image)
}

fn parse_algorithm(name: &str) -> eyre::Result<SharpnessAlgorithm> {
    Ok(match name {
        "tenengrad" => SharpnessAlgorithm::Tenengrad,
        "mean-score" => SharpnessAlgorithm::MeanScore,
        "histogram-variance" => SharpnessAlgorithm::HistogramVariance,
        "sobel" => SharpnessAlgorithm::Sobel,
        other => eyre::bail!("unknown sharpness algorithm \"{other}\""),
    })
}

fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    let _tracing_guard = env_tracing_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Convert {
            input,
            output,
            format,
            input_format,
            mode,
        } => {
            let image = read_input(&input, input_format)?;
            let mut converter = ImageConverter::with_mode(mode);
            let converted = converter.convert(&image, format)?;
            io::write_image(&output, &converted)
                .with_context(|| format!("writing \"{}\"", output.display()))?;
            tracing::info!("wrote {format} image to \"{}\"", output.display());
        }
        Commands::Pipeline {
            config,
            input,
            output,
            input_format,
        } => {
            let cfg = PipelineConfig::from_path(&config)?;
            let mut pipeline = Pipeline::new(&cfg)?;
            let image = read_input(&input, input_format)?;
            let result = pipeline.run(&image)?;
            io::write_image(&output, &result)
                .with_context(|| format!("writing \"{}\"", output.display()))?;
            tracing::info!(
                "ran {} steps, wrote {}x{} {} image to \"{}\"",
                pipeline.len(),
                result.width(),
                result.height(),
                result.pixel_format(),
                output.display()
            );
        }
        Commands::Info { input, algorithm } => {
            let image = read_input(&input, None)?;
            let histogram = Histogram::new(&image)?;
            for (i, ch) in histogram.channels().iter().enumerate() {
                println!(
                    "channel {i}: mean {:.2} over {} pixels",
                    ch.mean().unwrap_or(0.0),
                    ch.pixel_count
                );
            }
            let mut sharpness = Sharpness::new();
            sharpness.set_algorithm(parse_algorithm(&algorithm)?);
            println!("sharpness ({algorithm}): {:.6}", sharpness.measure(&image)?);
        }
        Commands::PrintExampleConfig => {
            print!("{}", serde_yaml::to_string(&PipelineConfig::example())?);
        }
    }
    Ok(())
}
