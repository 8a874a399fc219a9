//! esskit - Inspect and verify change-record regions of binary game saves
//!
//! This tool decodes the compressed change-record region of a save, checks
//! that it re-encodes to the same records, and can list or rewrite it.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser};
use esskit_core::{ByteCursor, ChangeRegion, CodecConfig, Element};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, trace, warn, Level};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

/// Inspect and verify change-record regions of binary game saves
#[derive(Parser, Debug)]
#[command(name = "esskit")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(flatten)]
    input: InputMode,

    /// Byte offset of the region inside each file
    #[arg(long, default_value = "0")]
    offset: usize,

    /// The region is a bare run of records without a compression envelope
    #[arg(long)]
    flat: bool,

    /// Treat flag bits without a modeled layout as errors
    #[arg(long)]
    strict: bool,

    /// Largest decompressed size an envelope or record may declare
    #[arg(long, default_value_t = CodecConfig::default().max_flat_len)]
    max_flat_len: usize,

    /// zlib level used when recompressing (0-9)
    #[arg(long, default_value = "6")]
    deflate_level: u32,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only list the records of each region
    #[arg(long)]
    list_only: bool,

    /// Write the re-encoded file here (single file mode only)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Overwrite existing files without prompting
    #[arg(long)]
    force: bool,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct InputMode {
    /// Path to a single save file
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Path to a directory of save files to process
    #[arg(short, long)]
    directory: Option<PathBuf>,
}

impl Cli {
    fn codec_config(&self) -> CodecConfig {
        CodecConfig::new()
            .max_flat_len(self.max_flat_len)
            .deflate_level(self.deflate_level)
            .strict_schema(self.strict)
    }
}

/// Totals across every processed file
#[derive(Default, Debug)]
struct VerifyStats {
    files: usize,
    records: usize,
    warnings: usize,
    mismatches: usize,
}

impl VerifyStats {
    fn print_summary(&self) {
        info!(
            "Summary: {} files, {} records, {} schema gaps, {} mismatches",
            self.files, self.records, self.warnings, self.mismatches
        );
    }
}

/// Result of checking one region
#[derive(Debug)]
struct Verification {
    records: usize,
    warnings: usize,
    original: blake3::Hash,
    reencoded: blake3::Hash,
}

impl Verification {
    fn matches(&self) -> bool {
        self.original == self.reencoded
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(false)
        .init();

    // Dispatch based on input mode
    if let Some(ref file) = cli.input.file {
        process_single_file(&cli, file)
    } else if let Some(ref directory) = cli.input.directory {
        if cli.output.is_some() {
            bail!("--output is only supported together with --file");
        }
        process_directory(&cli, directory)
    } else {
        bail!("Either --file or --directory must be specified")
    }
}

/// Process a single save file
fn process_single_file(cli: &Cli, file: &Path) -> Result<()> {
    if !file.exists() {
        bail!("Input file does not exist: {}", file.display());
    }
    if !file.is_file() {
        bail!("Input path is not a file: {}", file.display());
    }

    let mut stats = VerifyStats::default();
    process_save(cli, file, &mut stats)?;

    if !cli.list_only {
        stats.print_summary();
        if stats.mismatches > 0 {
            bail!("{} did not survive a round trip", file.display());
        }
    }

    Ok(())
}

/// Process a directory of saves recursively
fn process_directory(cli: &Cli, directory: &Path) -> Result<()> {
    if !directory.exists() {
        bail!("Directory does not exist: {}", directory.display());
    }
    if !directory.is_dir() {
        bail!("Path is not a directory: {}", directory.display());
    }

    info!("Scanning directory: {}", directory.display());

    let mut stats = VerifyStats::default();
    let mut failures = 0;

    for entry in WalkDir::new(directory)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();

        if !path.is_file() {
            continue;
        }

        // Skip hidden files
        if path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with('.'))
            .unwrap_or(false)
        {
            continue;
        }

        if !is_likely_save(path) {
            trace!("Skipping non-save: {}", path.display());
            continue;
        }

        debug!("Processing save: {}", path.display());
        if let Err(e) = process_save(cli, path, &mut stats) {
            // Log error but continue with other files
            warn!("Error processing {}: {:#}", path.display(), e);
            failures += 1;
        }
    }

    info!("Processed {} saves, {} failed", stats.files, failures);

    if !cli.list_only {
        stats.print_summary();
    }

    Ok(())
}

/// Heuristic to skip files that are obviously not saves
fn is_likely_save(path: &Path) -> bool {
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        let skip_extensions = [
            "txt", "md", "json", "yaml", "yml", "xml", "html", "ini", "cfg", "conf", "log",
            "csv", "png", "jpg", "jpeg", "bmp", "dds", "zip", "7z", "rar", "skse", "bak",
        ];
        if skip_extensions.contains(&ext.to_lowercase().as_str()) {
            return false;
        }
    }

    // Anything shorter than one envelope header cannot hold a region
    fs::metadata(path)
        .map(|metadata| metadata.len() >= 10)
        .unwrap_or(false)
}

/// Decoded region and the byte range it occupied in the file
struct Located {
    region: ChangeRegion,
    start: usize,
    end: usize,
}

/// Decodes the region at `cli.offset`
fn decode_region(cli: &Cli, data: &[u8]) -> Result<Located> {
    let config = cli.codec_config();
    let start = cli.offset;
    if start > data.len() {
        bail!(
            "Offset {} is past the end of the {} byte file",
            start,
            data.len()
        );
    }

    let slice = data[start..].to_vec();
    let (region, consumed) = if cli.flat {
        let consumed = slice.len();
        (ChangeRegion::decode_flat(slice, &config)?, consumed)
    } else {
        let mut cursor = ByteCursor::new(slice);
        let region = ChangeRegion::read(&mut cursor, &config)?;
        (region, cursor.position())
    };

    Ok(Located {
        region,
        start,
        end: start + consumed,
    })
}

/// Decodes, verifies, lists and optionally rewrites one save
fn process_save(cli: &Cli, path: &Path, stats: &mut VerifyStats) -> Result<()> {
    trace!("Reading {}", path.display());
    let data =
        fs::read(path).with_context(|| format!("Failed to read input file: {}", path.display()))?;

    trace!("Read {} bytes from {}", data.len(), path.display());

    let mut located = decode_region(cli, &data)
        .with_context(|| format!("Failed to decode region in {}", path.display()))?;
    stats.files += 1;

    if cli.list_only {
        list_records(path, &located.region);
        stats.records += located.region.records().len();
        return Ok(());
    }

    let verification = verify_region(cli, &mut located.region)
        .with_context(|| format!("Failed to verify {}", path.display()))?;
    stats.records += verification.records;
    stats.warnings += verification.warnings;

    if verification.matches() {
        println!(
            "{}: ok ({} records, {} schema gaps)",
            path.display(),
            verification.records,
            verification.warnings
        );
    } else {
        stats.mismatches += 1;
        error!(
            "{}: re-encoded records differ (blake3 {} vs {})",
            path.display(),
            verification.original.to_hex(),
            verification.reencoded.to_hex()
        );
    }

    if let Some(ref output) = cli.output {
        let reencoded = located.region.reencode()?;
        let mut out = Vec::with_capacity(data.len());
        out.extend_from_slice(&data[..located.start]);
        out.extend_from_slice(&reencoded);
        out.extend_from_slice(&data[located.end..]);
        write_output_file(output, &out, cli.force)?;
        println!("Wrote {}", output.display());
    }

    Ok(())
}

/// Prints one line per record
fn list_records(path: &Path, region: &ChangeRegion) {
    match region.kind() {
        Some(kind) => println!("{} ({} envelope)", path.display(), kind),
        None => println!("{} (flat)", path.display()),
    }
    for (index, record) in region.records().iter().enumerate() {
        let fields: Vec<&str> = record
            .present_fields()
            .into_iter()
            .map(|tag| tag.name())
            .collect();
        println!(
            "{:>6}  {}  {:<4}  v{:<3}  {}  {:>7} bytes  {}",
            index,
            record.ref_id(),
            record.record_type(),
            record.version(),
            record.flags(),
            record.size(),
            fields.join(",")
        );
    }
}

/// Materializes every record, re-encodes, decodes again and compares the
/// decoded flat buffers of both passes
fn verify_region(cli: &Cli, region: &mut ChangeRegion) -> Result<Verification> {
    let original = blake3::hash(region.decoded_flat());

    let warnings = region.materialize_all()?;
    for warning in &warnings {
        warn!("{}", warning);
    }

    let config = cli.codec_config();
    let reencoded = region.reencode()?;
    let reread = if cli.flat {
        ChangeRegion::decode_flat(reencoded, &config)?
    } else {
        ChangeRegion::decode(reencoded, &config)?
    };

    Ok(Verification {
        records: region.records().len(),
        warnings: warnings.len(),
        original,
        reencoded: blake3::hash(reread.decoded_flat()),
    })
}

/// Write the re-encoded save to disk
fn write_output_file(output_path: &Path, content: &[u8], force: bool) -> Result<()> {
    // Create parent directories
    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
    }

    // Check if file exists
    if output_path.exists() && !force {
        bail!(
            "File already exists: {} (use --force to overwrite)",
            output_path.display()
        );
    }

    // Write the file
    let mut file = fs::File::create(output_path)
        .with_context(|| format!("Failed to create file: {}", output_path.display()))?;

    file.write_all(content)
        .with_context(|| format!("Failed to write file: {}", output_path.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use esskit_core::{CompressionEnvelope, CompressionKind};
    use tempfile::TempDir;

    /// One quest record with formFlags and questFlags
    fn quest_record(ref_id: u8) -> Vec<u8> {
        vec![
            0, 0, ref_id, // ref id
            0x03, 0, 0, 0, // flags
            8, 74, 8, 0, // type, version, lengths
            0x01, 0x00, 0x00, 0x00, 0xAB, 0xCD, 0x22, 0x11,
        ]
    }

    fn save_file(dir: &TempDir, kind: CompressionKind) -> PathBuf {
        let mut flat = quest_record(1);
        flat.extend(quest_record(2));
        let region = CompressionEnvelope::new(kind, flat).reencode().unwrap();

        let mut data = b"HEADER".to_vec();
        data.extend_from_slice(&region);
        data.extend_from_slice(b"TRAILER");

        let path = dir.path().join(format!("{}.ess", kind));
        fs::write(&path, data).unwrap();
        path
    }

    fn cli(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("esskit").chain(args.iter().copied()))
    }

    #[test]
    fn test_verify_every_kind() {
        let temp_dir = TempDir::new().unwrap();
        for kind in CompressionKind::ALL {
            let path = save_file(&temp_dir, kind);
            let cli = cli(&["--file", path.to_str().unwrap(), "--offset", "6"]);

            let mut stats = VerifyStats::default();
            process_save(&cli, &path, &mut stats).unwrap();
            assert_eq!(stats.files, 1);
            assert_eq!(stats.records, 2);
            assert_eq!(stats.mismatches, 0);
        }
    }

    #[test]
    fn test_output_keeps_surrounding_bytes() {
        let temp_dir = TempDir::new().unwrap();
        let path = save_file(&temp_dir, CompressionKind::None);
        let output = temp_dir.path().join("out").join("copy.ess");
        let cli = cli(&[
            "--file",
            path.to_str().unwrap(),
            "--offset",
            "6",
            "--output",
            output.to_str().unwrap(),
        ]);

        process_single_file(&cli, &path).unwrap();
        assert_eq!(fs::read(&output).unwrap(), fs::read(&path).unwrap());

        // Second run refuses to overwrite
        assert!(process_single_file(&cli, &path).is_err());
    }

    #[test]
    fn test_verification_hashes_decoded_buffer() {
        let mut flat = quest_record(1);
        flat.extend(quest_record(2));
        let data = CompressionEnvelope::new(CompressionKind::Deflate, flat.clone())
            .reencode()
            .unwrap();
        let cli = cli(&["--file", "x.ess"]);

        let mut located = decode_region(&cli, &data).unwrap();
        assert_eq!(located.end, data.len());
        let verification = verify_region(&cli, &mut located.region).unwrap();
        assert_eq!(verification.original, blake3::hash(&flat));
        assert!(verification.matches());
        assert_eq!(verification.records, 2);
    }

    #[test]
    fn test_bad_offset_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        let path = save_file(&temp_dir, CompressionKind::Deflate);
        let cli = cli(&["--file", path.to_str().unwrap(), "--offset", "5"]);

        let mut stats = VerifyStats::default();
        assert!(process_save(&cli, &path, &mut stats).is_err());
        assert_eq!(stats.files, 0);
    }

    #[test]
    fn test_directory_continues_past_errors() {
        let temp_dir = TempDir::new().unwrap();
        save_file(&temp_dir, CompressionKind::Lz4);
        fs::write(temp_dir.path().join("broken.ess"), vec![0xFF; 32]).unwrap();
        fs::write(temp_dir.path().join(".hidden.ess"), vec![0xFF; 32]).unwrap();

        let cli = cli(&[
            "--directory",
            temp_dir.path().to_str().unwrap(),
            "--offset",
            "6",
        ]);
        process_directory(&cli, temp_dir.path()).unwrap();
    }

    #[test]
    fn test_is_likely_save() {
        assert!(!is_likely_save(Path::new("/tmp/test.txt")));
        assert!(!is_likely_save(Path::new("/tmp/test.json")));
        assert!(!is_likely_save(Path::new("/tmp/does-not-exist.ess")));
    }

    #[test]
    fn test_codec_config_from_flags() {
        let cli = cli(&["--file", "x.ess", "--strict", "--deflate-level", "9"]);
        let config = cli.codec_config();
        assert!(config.strict_schema);
        assert_eq!(config.deflate_level, 9);
        assert_eq!(config.max_flat_len, CodecConfig::default().max_flat_len);
    }

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
