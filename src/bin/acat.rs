use std::env;
use std::io;
use std::path::PathBuf;
use std::process;

use clap::Parser;
use thiserror::Error;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Registry};

/// Copy standard input to the specified file through a temporary file.
///
/// In case of error, the original contents of the file, if any, are not modified; otherwise, the
/// file is replaced in one step by renaming the temporary file.
#[derive(Parser, Debug)]
#[command(name = "acat", version)]
struct Cli {
    /// File to replace
    output: PathBuf,

    /// Output file mode
    #[arg(long, default_value = "0600", value_parser = parse_mode)]
    mode: u32,
}

#[derive(Error, Debug)]
enum CliError {
    #[error("invalid mode {value:?}: {reason}")]
    InvalidMode { value: String, reason: String },

    #[error("writing {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        source: atomicfile::WriteAllError,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging();

    if let Err(e) = run(&cli) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), CliError> {
    let stdin = io::stdin();
    let copied = atomicfile::write_all(&cli.output, stdin.lock(), cli.mode).map_err(|source| {
        CliError::Write {
            path: cli.output.clone(),
            source,
        }
    })?;

    tracing::debug!(path = %cli.output.display(), bytes = copied, "replaced");
    Ok(())
}

fn init_logging() {
    let filter = match env::var("ACAT_LOG") {
        Ok(level) if !level.trim().is_empty() => EnvFilter::new(level),
        _ => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_target(true);

    Registry::default().with(filter).with(stderr_layer).init();
}

/// Parse a mode the way C literals are written: `0x` hex, `0o` or a bare leading `0` octal,
/// `0b` binary, otherwise decimal.
fn parse_mode(value: &str) -> Result<u32, CliError> {
    let invalid = |reason: String| CliError::InvalidMode {
        value: value.to_string(),
        reason,
    };

    let s = value.trim();
    let (digits, radix) = if let Some(rest) = strip_prefix_ci(s, "0x") {
        (rest, 16)
    } else if let Some(rest) = strip_prefix_ci(s, "0o") {
        (rest, 8)
    } else if let Some(rest) = strip_prefix_ci(s, "0b") {
        (rest, 2)
    } else if s.len() > 1 && s.starts_with('0') {
        (&s[1..], 8)
    } else {
        (s, 10)
    };

    if digits.starts_with(['+', '-']) {
        return Err(invalid("sign not allowed".to_string()));
    }

    let mode = u32::from_str_radix(digits, radix).map_err(|e| invalid(e.to_string()))?;
    if mode > 0o7777 {
        return Err(invalid("larger than 07777".to_string()));
    }

    Ok(mode)
}

fn strip_prefix_ci<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    match s.get(..prefix.len()) {
        Some(head) if head.eq_ignore_ascii_case(prefix) => Some(&s[prefix.len()..]),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::parse_mode;
    use super::Cli;

    #[test]
    fn modes() {
        assert_eq!(0o600, parse_mode("0600").unwrap());
        assert_eq!(0o644, parse_mode("0o644").unwrap());
        assert_eq!(0o644, parse_mode("0x1A4").unwrap());
        assert_eq!(0o644, parse_mode("420").unwrap());
        assert_eq!(0o5, parse_mode("0b101").unwrap());
        assert_eq!(0, parse_mode("0").unwrap());
    }

    #[test]
    fn bad_modes() {
        assert!(parse_mode("0x").is_err());
        assert!(parse_mode("0999").is_err());
        assert!(parse_mode("-1").is_err());
        assert!(parse_mode("010000").is_err());
        assert!(parse_mode("rw-r--r--").is_err());
    }

    #[test]
    fn mode_defaults_to_owner_only() {
        let cli = Cli::try_parse_from(["acat", "out.txt"]).unwrap();
        assert_eq!(0o600, cli.mode);
        assert_eq!(std::path::PathBuf::from("out.txt"), cli.output);
    }

    #[test]
    fn requires_output() {
        assert!(Cli::try_parse_from(["acat"]).is_err());
        assert!(Cli::try_parse_from(["acat", "--mode", "0644", "a", "b"]).is_err());
    }
}
