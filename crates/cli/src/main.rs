use anyhow::{Context, bail};
use clap::Parser;
use fgbstream::io::SourceStats;
use fgbstream::{
    BoundingBox2D, Config, Feature, FgbReader, InstrumentedSource, RangeSource, ReaderBuilder,
    to_feature_collection,
};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(version, about = "Query a FlatGeobuf container by bounding box", long_about = None)]
struct Args {
    /// Container path, or an http(s) URL when built with the `http` feature
    input: String,

    /// Query window as min_x,min_y,max_x,max_y. Without it every feature is scanned.
    #[arg(long, value_delimiter = ',', num_args = 4, allow_hyphen_values = true)]
    bbox: Option<Vec<f64>>,

    /// Reader configuration file (JSON, or TOML with the `toml` feature)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Stop after this many features
    #[arg(short, long)]
    limit: Option<usize>,

    /// Print the decoded header instead of features
    #[arg(long)]
    header_only: bool,
}

fn load_config(path: &Path) -> anyhow::Result<Config> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let is_toml = path.extension().is_some_and(|ext| ext == "toml");
    if is_toml {
        #[cfg(feature = "toml")]
        return Ok(Config::from_toml_str(&text)?);
        #[cfg(not(feature = "toml"))]
        bail!("TOML configs need the `toml` feature");
    }
    Ok(Config::from_json_str(&text)?)
}

fn parse_bbox(values: &[f64]) -> anyhow::Result<BoundingBox2D> {
    match values {
        [min_x, min_y, max_x, max_y] if min_x <= max_x && min_y <= max_y => {
            Ok(BoundingBox2D::new(*min_x, *min_y, *max_x, *max_y))
        }
        _ => bail!("bbox must be min_x,min_y,max_x,max_y with min <= max"),
    }
}

async fn run<S: RangeSource>(
    mut reader: FgbReader<InstrumentedSource<S>>,
    args: &Args,
) -> anyhow::Result<()> {
    let header = reader.header();
    info!(
        "{} features, geometry {}, index node size {}",
        header.features_count, header.geometry_type, header.index_node_size
    );
    if args.header_only {
        println!("{}", serde_json::to_string_pretty(header)?);
        return Ok(());
    }

    let mut stream = match &args.bbox {
        Some(values) => reader.select_bbox(parse_bbox(values)?).await?,
        None => reader.scan_all()?,
    };

    let limit = args.limit.unwrap_or(usize::MAX);
    let mut features: Vec<Feature> = Vec::new();
    while features.len() < limit {
        match stream.next().await {
            Some(feature) => features.push(feature?),
            None => break,
        }
    }
    stream.close().await;

    println!(
        "{}",
        serde_json::to_string(&to_feature_collection(&features))?
    );

    let usage = reader.usage();
    info!(
        "header+index bytes used/requested: {} / {} = {:.2}%",
        usage.bytes_used,
        usage.bytes_fetched,
        usage.efficiency()
    );
    let SourceStats {
        requests,
        bytes_requested,
        bytes_received,
    } = reader.source().stats();
    info!(
        "{} features, {} requests, {} bytes requested, {} bytes received",
        features.len(),
        requests,
        bytes_requested,
        bytes_received
    );
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fgbstream=info,fgbstream_cli=info".into()),
        )
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => Config::default(),
    };
    let builder = ReaderBuilder::new().config(config);

    if args.input.starts_with("http://") || args.input.starts_with("https://") {
        #[cfg(feature = "http")]
        {
            info!("Opening {}", args.input);
            let source = fgbstream::HttpRangeSource::new(args.input.clone())?;
            let reader = builder
                .open_shared(Arc::new(InstrumentedSource::new(source)))
                .await?;
            return run(reader, &args).await;
        }
        #[cfg(not(feature = "http"))]
        bail!("URL inputs need the `http` feature");
    }

    info!("Opening {}", args.input);
    let source = fgbstream::FileSource::open(&args.input)
        .await
        .with_context(|| format!("opening {}", args.input))?;
    let reader = builder
        .open_shared(Arc::new(InstrumentedSource::new(source)))
        .await?;
    run(reader, &args).await
}
