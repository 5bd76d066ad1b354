//! `ractool` command implementations (§6.2).

pub mod args;

use std::fs::File;
use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};

use self::args::{CodecArg, Command, IndexLocationArg, RangeArg};
use crate::chunk_reader::ChunkReader;
use crate::codec::CodecRegistry;
use crate::container::{Footer, FOOTER_LEN};
use crate::index::IndexReader;
use crate::reader::{Reader, ReaderOptions};
use crate::source::{open_file_source, RandomAccessSource};
use crate::writer::{TempStorageKind, Writer, WriterOptions};

pub fn run(command: Command) -> Result<()> {
    match command {
        Command::Encode {
            input,
            output,
            codec,
            d_chunk_size,
            c_chunk_size,
            page_size,
            index_location,
            resources,
        } => run_encode(input, output, codec, d_chunk_size, c_chunk_size, page_size, index_location, resources),
        Command::Decode { input, output, range, workers, singlethreaded } => {
            run_decode(input, output, range, workers, singlethreaded)
        }
        Command::Info { input } => run_info(input),
    }
}

#[allow(clippy::too_many_arguments)]
fn run_encode(
    input: std::path::PathBuf,
    output: std::path::PathBuf,
    codec: CodecArg,
    d_chunk_size: u64,
    c_chunk_size: u64,
    page_size: u64,
    index_location: IndexLocationArg,
    resource_paths: Vec<std::path::PathBuf>,
) -> Result<()> {
    let mut resources = Vec::with_capacity(resource_paths.len());
    for path in &resource_paths {
        let bytes = std::fs::read(path).with_context(|| format!("reading resource {}", path.display()))?;
        resources.push(bytes);
    }

    let options = WriterOptions {
        codec_tag: codec.tag(),
        resources,
        d_chunk_size,
        c_chunk_size,
        c_page_size: page_size,
        index_location: index_location.into(),
        temp_storage: TempStorageKind::InMemory,
        registry: Arc::new(CodecRegistry::with_builtins()),
    };

    let out_file = File::create(&output).with_context(|| format!("creating {}", output.display()))?;
    let mut writer = Writer::open(out_file, options)?;
    let mut in_file = File::open(&input).with_context(|| format!("opening {}", input.display()))?;
    writer.write(&mut in_file)?;
    writer.close()?;
    crate::display_level!(1, "encoded {} -> {}\n", input.display(), output.display());
    Ok(())
}

fn run_decode(
    input: std::path::PathBuf,
    output: Option<std::path::PathBuf>,
    range: RangeArg,
    workers: usize,
    singlethreaded: bool,
) -> Result<()> {
    let source: Arc<dyn RandomAccessSource> = Arc::new(open_file_source(&input)?);
    let workers = if singlethreaded { 1 } else { workers };
    let options = ReaderOptions {
        workers: if workers == 0 { crate::config::default_worker_count() } else { workers },
        registry: Arc::new(CodecRegistry::with_builtins()),
        resources: Vec::new(),
    };
    let reader = Reader::open(source, options)?;

    let d_lo = range.lo.unwrap_or(0);
    let d_hi = range.hi.unwrap_or_else(|| reader.d_file_size());

    let mut range_reader = reader.seek_range(d_lo, d_hi)?;
    let mut sink: Box<dyn Write> = match output {
        Some(path) => Box::new(File::create(&path).with_context(|| format!("creating {}", path.display()))?),
        None => Box::new(std::io::stdout()),
    };

    let mut buf = vec![0u8; 1 << 16];
    loop {
        let (n, status) = range_reader.read(&mut buf)?;
        if n > 0 {
            sink.write_all(&buf[..n])?;
        }
        if status == crate::engine::ReadStatus::Eof {
            break;
        }
    }
    reader.close();
    Ok(())
}

fn run_info(input: std::path::PathBuf) -> Result<()> {
    let source: Arc<dyn RandomAccessSource> = Arc::new(open_file_source(&input)?);
    let total_len = source.len();
    if total_len < FOOTER_LEN as u64 {
        anyhow::bail!("truncated RAC file: shorter than the footer");
    }
    let mut footer_bytes = vec![0u8; FOOTER_LEN];
    source.read_at_exact(total_len - FOOTER_LEN as u64, &mut footer_bytes)?;
    let footer = Footer::decode(&footer_bytes)?;
    let index = IndexReader::open(source, footer.d_file_size, footer.root_cptr);
    let reader = ChunkReader::new(&index);
    let summary = reader.summarize()?;

    println!("DFileSize:  {}", summary.d_file_size);
    println!("chunks:     {}", summary.chunk_count);
    println!("codec tags: {:?}", summary.codecs);
    Ok(())
}
