//! Command-line front end over the four bundled codecs.

use clap::{Args, Parser, Subcommand};
use imaging_codecs::{ccitt, gif, jpeg2000, tga};
use std::error::Error;
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "imaging-codecs", about = "Encode/decode JPEG2000 (simplified), CCITT fax, GIF, and TGA")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Simplified JPEG 2000 Part 1 codestream
    J2k {
        #[command(subcommand)]
        action: J2kAction,
    },
    /// CCITT Group 3/4 fax
    Ccitt {
        #[command(subcommand)]
        action: CcittAction,
    },
    /// GIF87a/89a
    Gif {
        #[command(subcommand)]
        action: GifAction,
    },
    /// Truevision TGA
    Tga {
        #[command(subcommand)]
        action: TgaAction,
    },
}

#[derive(Subcommand)]
enum J2kAction {
    Encode(J2kEncodeArgs),
    Decode(IoArgs),
}

#[derive(Args)]
struct J2kEncodeArgs {
    input: PathBuf,
    output: PathBuf,
    #[arg(long, default_value_t = 800)]
    width: u32,
    #[arg(long, default_value_t = 600)]
    height: u32,
    #[arg(long, default_value_t = 1)]
    components: u8,
    #[arg(long, default_value_t = 80)]
    quality: u8,
    #[arg(long)]
    lossless: bool,
    #[arg(long, default_value_t = 5)]
    levels: u8,
    #[arg(long)]
    mct: bool,
}

#[derive(Subcommand)]
enum CcittAction {
    Encode(CcittEncodeArgs),
    Decode(CcittDecodeArgs),
}

#[derive(Args)]
struct CcittEncodeArgs {
    input: PathBuf,
    output: PathBuf,
    #[arg(long, default_value_t = 1728)]
    width: u32,
    #[arg(long)]
    height: u32,
    #[arg(long, allow_hyphen_values = true, default_value_t = -1)]
    k: i32,
    #[arg(long)]
    black_is_1: bool,
}

#[derive(Args)]
struct CcittDecodeArgs {
    input: PathBuf,
    output: PathBuf,
    #[arg(long, default_value_t = 1728)]
    width: u32,
    #[arg(long, default_value_t = 0)]
    height: u32,
    #[arg(long, allow_hyphen_values = true, default_value_t = -1)]
    k: i32,
    #[arg(long)]
    black_is_1: bool,
}

#[derive(Subcommand)]
enum GifAction {
    Encode(GifEncodeArgs),
    Decode(IoArgs),
}

#[derive(Args)]
struct GifEncodeArgs {
    /// Text file listing one frame per line as `path[:delay_ms]`; each path
    /// holds a raw BGRA buffer of exactly `width * height * 4` bytes.
    input: PathBuf,
    output: PathBuf,
    #[arg(long)]
    width: u32,
    #[arg(long)]
    height: u32,
    #[arg(long, default_value_t = 256)]
    max_colors: u16,
    #[arg(long, default_value_t = 0)]
    loop_count: u16,
}

#[derive(Subcommand)]
enum TgaAction {
    Encode(TgaEncodeArgs),
    Decode(IoArgs),
}

#[derive(Args)]
struct TgaEncodeArgs {
    /// Raw BGRA input buffer.
    input: PathBuf,
    output: PathBuf,
    #[arg(long)]
    width: u32,
    #[arg(long)]
    height: u32,
    #[arg(long, default_value_t = 32)]
    bpp: u8,
    #[arg(long)]
    rle: bool,
}

#[derive(Args)]
struct IoArgs {
    input: PathBuf,
    output: PathBuf,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Command::J2k { action } => run_j2k(action)?,
        Command::Ccitt { action } => run_ccitt(action)?,
        Command::Gif { action } => run_gif(action)?,
        Command::Tga { action } => run_tga(action)?,
    }
    Ok(())
}

fn run_j2k(action: J2kAction) -> Result<(), Box<dyn Error>> {
    match action {
        J2kAction::Encode(args) => {
            let bytes = fs::read(&args.input)?;
            let encoded = jpeg2000::encode(&bytes, args.width, args.height, args.components, args.quality, !args.lossless, args.levels, args.mct)?;
            fs::write(&args.output, encoded)?;
        }
        J2kAction::Decode(args) => {
            let bytes = fs::read(&args.input)?;
            let decoded = jpeg2000::decode(&bytes)?;
            log::info!("decoded {}x{}x{}", decoded.width, decoded.height, decoded.components);
            fs::write(&args.output, decoded.pixels)?;
        }
    }
    Ok(())
}

fn run_ccitt(action: CcittAction) -> Result<(), Box<dyn Error>> {
    match action {
        CcittAction::Encode(args) => {
            let bitmap = fs::read(&args.input)?;
            let mut options = ccitt::CcittOptions { width: args.width, black_is_1: args.black_is_1, ..Default::default() };
            options.group = ccitt::Group::from_k(args.k);
            let encoded = ccitt::encode(&bitmap, args.height, &options)?;
            fs::write(&args.output, encoded)?;
        }
        CcittAction::Decode(args) => {
            let bytes = fs::read(&args.input)?;
            let mut options = ccitt::CcittOptions { width: args.width, height: args.height, black_is_1: args.black_is_1, ..Default::default() };
            options.group = ccitt::Group::from_k(args.k);
            let bitmap = ccitt::decode(&bytes, &options)?;
            fs::write(&args.output, bitmap)?;
        }
    }
    Ok(())
}

fn run_gif(action: GifAction) -> Result<(), Box<dyn Error>> {
    match action {
        GifAction::Encode(args) => {
            let list = fs::read_to_string(&args.input)?;
            let expected_len = args.width as usize * args.height as usize * 4;
            let mut frames = Vec::new();
            for line in list.lines().filter(|l| !l.trim().is_empty()) {
                let (path, delay_ms) = match line.split_once(':') {
                    Some((path, delay)) => (path, delay.parse::<u32>()?),
                    None => (line, 0),
                };
                let pixels = fs::read(path.trim())?;
                if pixels.len() != expected_len {
                    return Err(format!("frame {path} has {} bytes, expected {expected_len}", pixels.len()).into());
                }
                frames.push(gif::GifImage { width: args.width, height: args.height, pixels, delay_ms });
            }
            let file = gif::GifFile { frames, loop_count: args.loop_count };
            let encoded = gif::encode(&file, args.max_colors)?;
            fs::write(&args.output, encoded)?;
        }
        GifAction::Decode(args) => {
            let bytes = fs::read(&args.input)?;
            let file = gif::decode(&bytes)?;
            log::info!("decoded {} frame(s), loop_count={}", file.frames.len(), file.loop_count);
            if let Some(first) = file.frames.first() {
                fs::write(&args.output, &first.pixels)?;
            }
        }
    }
    Ok(())
}

fn run_tga(action: TgaAction) -> Result<(), Box<dyn Error>> {
    match action {
        TgaAction::Encode(args) => {
            let pixels = fs::read(&args.input)?;
            let image = tga::TgaImage { width: args.width, height: args.height, pixels, bits_per_pixel: args.bpp };
            let encoded = tga::encode(&image, args.bpp, args.rle)?;
            fs::write(&args.output, encoded)?;
        }
        TgaAction::Decode(args) => {
            let bytes = fs::read(&args.input)?;
            let image = tga::decode(&bytes)?;
            log::info!("decoded {}x{} ({} bpp)", image.width, image.height, image.bits_per_pixel);
            fs::write(&args.output, image.pixels)?;
        }
    }
    Ok(())
}
