use audex::config::ExtractOverrides;
use audex_common::{AudioFormat, Bitrate};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "audex")]
#[command(author, version, about = "Batch audio extraction from video files")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Extract audio from every video in the input directory
    Extract(ExtractArgs),

    /// Probe a video and show its audio bitrate and the resulting quality
    Probe {
        /// File to probe
        #[arg(required = true)]
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,

        /// Requested quality used for the adaptive decision
        #[arg(short, long)]
        quality: Option<Bitrate>,

        /// Output format used for the adaptive decision
        #[arg(short, long)]
        format: Option<AudioFormat>,
    },

    /// Check that required external tools are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}

#[derive(Args, Debug, Default)]
pub struct ExtractArgs {
    /// Directory containing the source videos
    #[arg(short = 'd', long = "directory", value_name = "DIR")]
    pub input_dir: Option<PathBuf>,

    /// Directory for the extracted audio
    #[arg(short, long = "output", value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Output format (mp3, aac, wav, flac)
    #[arg(short, long)]
    pub format: Option<AudioFormat>,

    /// Target bitrate for lossy formats, e.g. 192k
    #[arg(short, long)]
    pub quality: Option<Bitrate>,

    /// Lower the bitrate to match low-quality sources
    #[arg(long)]
    pub adaptive: bool,

    /// Number of parallel workers (0 = one per CPU)
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Process one file at a time
    #[arg(long, conflicts_with = "jobs")]
    pub sequential: bool,

    /// Ignore and do not update the extraction record
    #[arg(long)]
    pub no_resume: bool,

    /// Leave processed sources in place instead of moving them to done/
    #[arg(long)]
    pub no_archive: bool,

    /// Do not move loose videos from the root into the input directory
    #[arg(long)]
    pub no_stage: bool,

    /// Working root scanned for loose videos
    #[arg(long, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Directory holding the extraction record files
    #[arg(long, value_name = "DIR")]
    pub record_dir: Option<PathBuf>,
}

impl From<ExtractArgs> for ExtractOverrides {
    fn from(args: ExtractArgs) -> Self {
        Self {
            input_dir: args.input_dir,
            output_dir: args.output_dir,
            root: args.root,
            record_dir: args.record_dir,
            format: args.format,
            quality: args.quality,
            adaptive: args.adaptive,
            jobs: args.jobs,
            sequential: args.sequential,
            no_resume: args.no_resume,
            no_archive: args.no_archive,
            no_stage: args.no_stage,
        }
    }
}
