use clap::Parser;
use mmd_lib::{BackgroundColor, IconPack, OutputKind};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "mmd")]
#[command(
    version,
    about = "Render Mermaid diagram definitions to SVG, PNG or PDF",
    long_about = "mmd renders a Mermaid diagram definition through a headless Chrome.\n\nThe rendering library (mermaid.min.js) is read from --library or assets.library in the config file. CLI flags override config values."
)]
pub struct Cli {
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Input diagram definition; `-` reads stdin (stdin is also used, with a warning, when omitted)"
    )]
    pub input: Option<PathBuf>,

    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Output file ending in .svg, .png, .pdf, .md or .markdown; `-` writes stdout. Default: input + \".svg\""
    )]
    pub output: Option<PathBuf>,

    #[arg(
        short = 'e',
        long,
        value_name = "FORMAT",
        help = "Output format (svg, png, pdf). Default: from the output file extension"
    )]
    pub output_format: Option<OutputKind>,

    #[arg(short, long, help = "Theme of the chart (default, forest, dark, neutral)")]
    pub theme: Option<String>,

    #[arg(short, long, help = "Width of the page")]
    pub width: Option<u32>,

    #[arg(short = 'H', long, help = "Height of the page")]
    pub height: Option<u32>,

    #[arg(
        short,
        long,
        value_name = "COLOR",
        help = "Background color for pngs/svgs. Example: transparent, red, '#F0F0F0'"
    )]
    pub background_color: Option<BackgroundColor>,

    #[arg(short, long, help = "Device scale factor")]
    pub scale: Option<f64>,

    #[arg(short = 'f', long, help = "Size the PDF page to the chart")]
    pub pdf_fit: bool,

    #[arg(long, help = "Set SVG width/height to the diagram's viewBox (for standalone viewing)")]
    pub svg_fit: bool,

    #[arg(short = 'I', long, help = "The id attribute of the rendered SVG element")]
    pub svg_id: Option<String>,

    #[arg(
        long = "icon-pack",
        value_name = "NAME#URL",
        help = "Icon pack to register, as name#url (repeatable)"
    )]
    pub icon_packs: Vec<IconPack>,

    #[arg(long, value_name = "PATH", help = "Path to mermaid.min.js")]
    pub library: Option<PathBuf>,

    #[arg(
        long,
        value_name = "PATH",
        help = "Path to an extension script registering extra diagram types (e.g. ZenUML)"
    )]
    pub extension: Option<PathBuf>,

    #[arg(
        long,
        value_name = "PATH",
        help = "Config file (TOML); defaults to ~/.config/mmd/config.toml when present"
    )]
    pub config: Option<PathBuf>,

    #[arg(long, conflicts_with = "quiet", help = "Enable debug logging")]
    pub verbose: bool,

    #[arg(short, long, help = "Suppress log output")]
    pub quiet: bool,
}

pub fn parse() -> Cli {
    Cli::parse()
}
