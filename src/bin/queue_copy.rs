use std::fs::File;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use flate2::read::MultiGzDecoder;
use log::info;

use queuefile::{
    ByteFile, QueueFileConfig, ReadAheadFile, StdFile, StreamFile, Transfer, WriteBehindFile,
};

#[derive(Parser, Debug)]
#[command(name = "queue-copy", version)]
#[command(about = "Copy a file through a read-ahead and a write-behind queue file")]
struct Args {
    /// Source file
    #[arg(short, long)]
    input: PathBuf,

    /// Destination file (created or truncated)
    #[arg(short, long)]
    output: PathBuf,

    /// Bytes each background thread may run ahead of the copy loop
    #[arg(long, default_value_t = 640 * 1024)]
    queue_bytes: usize,

    /// Block size moved through the queues (0 = default 64 KiB)
    #[arg(long, default_value_t = 0)]
    block_size: usize,

    /// Queue wait before a blocked side rechecks, in milliseconds (0 = default 150)
    #[arg(long, default_value_t = 0)]
    timeout_ms: u32,

    /// Offset in the source to start copying from
    #[arg(long, default_value_t = 0)]
    start: u64,

    /// Bytes requested per read by the copy loop
    #[arg(long, default_value_t = 256 * 1024)]
    chunk_size: usize,

    /// Decompress a gzip source while copying (serial access, requires --start 0)
    #[arg(long)]
    gunzip: bool,

    /// Copy without background threads, for comparison
    #[arg(long)]
    direct: bool,
}

fn open_source(args: &Args) -> Result<Box<dyn ByteFile>> {
    if args.gunzip {
        let file = File::open(&args.input)
            .with_context(|| format!("opening {}", args.input.display()))?;
        return Ok(Box::new(StreamFile::new(MultiGzDecoder::new(file))));
    }
    let file = StdFile::open(&args.input)
        .with_context(|| format!("opening {}", args.input.display()))?;
    Ok(Box::new(file))
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = QueueFileConfig::new(args.queue_bytes, args.block_size, args.timeout_ms);
    let transfer = Transfer::new()
        .chunk_size(args.chunk_size)
        .from_offset(args.start);

    let src = open_source(&args)?;
    let dst = StdFile::create(&args.output)
        .with_context(|| format!("creating {}", args.output.display()))?;

    let stats = if args.direct {
        let mut src = src;
        let mut dst = dst;
        let stats = transfer.run(&mut src, &mut dst).context("copying")?;
        dst.sync().context("syncing output")?;
        stats
    } else {
        info!(
            "Copying with {} queue slots of {} bytes",
            config.capacity(),
            config.normalized().block_size
        );
        let mut reader = ReadAheadFile::new(src, args.start, config)
            .context("starting read-ahead")?;
        let mut writer = WriteBehindFile::new(dst, config).context("starting write-behind")?;
        let stats = transfer.run(&mut reader, &mut writer).context("copying")?;
        reader.close().context("closing read-ahead")?;
        let dst = writer.into_inner().context("closing write-behind")?;
        dst.sync().context("syncing output")?;
        stats
    };

    info!(
        "Copied {} bytes in {:.3}s ({:.1} MiB/sec)",
        stats.bytes,
        stats.duration.as_secs_f64(),
        stats.throughput() / (1024.0 * 1024.0)
    );
    println!("{}\t{:08x}", stats.bytes, stats.crc32);
    Ok(())
}
