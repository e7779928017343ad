//! btrfs-dump-csum：输出一个文件每个数据扇区保存的校验和
//!
//! ```text
//! btrfs-dump-csum [-v] [--verify] [--auth-key KEY] [--no-verify-metadata] <PATH> <DEVICE>
//! ```

use btrfs_csum::{
    inspect::{dump_file, verify_extent, VerifyReport},
    BtrfsFs, Diagnostics, ErrorKind, FileDevice, FsConfig, Result,
};
use clap::Parser;
use std::{
    fmt,
    io::{self, Write},
    process::ExitCode,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Dump the stored data checksums of one file on a btrfs filesystem")]
struct Args {
    /// Print trace lines and hex dumps of every checksum run
    #[arg(short, long)]
    verbose: bool,
    /// Re-read each data sector and compare against the stored checksum
    #[arg(long)]
    verify: bool,
    /// HMAC key for filesystems using hmac(sha256) checksums
    #[arg(long, env = "BTRFS_AUTH_KEY", hide_env_values = true)]
    auth_key: Option<String>,
    /// Skip superblock and tree node checksum verification
    #[arg(long)]
    no_verify_metadata: bool,
    /// File path inside the filesystem, relative to the default subvolume
    path: String,
    /// Block device or image file
    device: String,
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn format_error(_: fmt::Error) -> btrfs_csum::Error {
    log::error!("[CLI] cannot format report");
    btrfs_csum::Error::new(ErrorKind::Io, "unable to format output")
}

fn run(args: &Args) -> Result<bool> {
    let config = FsConfig {
        verify_metadata: !args.no_verify_metadata,
        auth_key: args.auth_key.as_ref().map(|k| k.as_bytes().to_vec()),
        verbose: args.verbose,
        ..FsConfig::default()
    };
    let diag = Diagnostics::new(config.verbose);

    let device = FileDevice::new(&args.device)?;
    let fs = BtrfsFs::open(device, config)?;
    let dump = dump_file(&fs, &args.path)?;

    let mut out = String::new();
    diag.target(&mut out, &args.path, dump.target())
        .map_err(format_error)?;
    for (index, extent) in dump.extents().iter().enumerate() {
        diag.extent(&mut out, index, &extent.record, &extent.digests)
            .map_err(format_error)?;
    }

    let mut report = VerifyReport::default();
    if args.verify {
        for extent in dump.extents() {
            report.merge(verify_extent(&fs, &extent.digests)?);
        }
        for m in &report.mismatches {
            diag.mismatch(&mut out, m.physical, &m.stored, &m.computed)
                .map_err(format_error)?;
        }
        diag.trace(
            &mut out,
            format_args!("verified {} sectors, {} mismatches", report.checked, report.mismatches.len()),
        )
        .map_err(format_error)?;
    }

    let mut stdout = io::stdout().lock();
    stdout
        .write_all(out.as_bytes())
        .and_then(|_| stdout.flush())
        .map_err(|e| {
            log::error!("[CLI] cannot write output: {}", e);
            btrfs_csum::Error::new(ErrorKind::Io, "unable to write output")
        })?;
    Ok(report.is_clean())
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => {
            eprintln!("btrfs-dump-csum: checksum mismatch in {}", args.path);
            ExitCode::from(ErrorKind::InvalidData.exit_code())
        }
        Err(e) => {
            eprintln!("btrfs-dump-csum: {}: {}", args.path, e);
            ExitCode::from(e.kind().exit_code())
        }
    }
}
