use std::{
    fs::OpenOptions,
    io::{self, Write},
    path::PathBuf,
    sync::{Arc, Mutex},
};
use tracing_subscriber::{fmt::writer::BoxMakeWriter, EnvFilter};

#[derive(Debug, Clone)]
pub struct LogOptions {
    pub level: String,
    pub log_dir: String,
    pub file_stem: String,
    pub stderr: bool,
}

/// Keeps the log file handle alive for the lifetime of the process.
pub struct LogGuard {
    file: Option<Arc<Mutex<std::fs::File>>>,
}

impl LogGuard {
    pub fn has_file(&self) -> bool {
        self.file.is_some()
    }
}

struct MultiWriter {
    stderr_enabled: bool,
    file: Option<Arc<Mutex<std::fs::File>>>,
}

impl Write for MultiWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.stderr_enabled {
            let _ = io::stderr().write_all(buf);
        }
        if let Some(file) = &self.file {
            if let Ok(mut file) = file.lock() {
                let _ = file.write_all(buf);
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.stderr_enabled {
            let _ = io::stderr().flush();
        }
        if let Some(file) = &self.file {
            if let Ok(mut file) = file.lock() {
                let _ = file.flush();
            }
        }
        Ok(())
    }
}

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
/// Returns `None` if a subscriber was already installed.
pub fn init_logging(options: &LogOptions) -> Option<LogGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(options.level.clone()));
    let guard = match open_log_file(&options.log_dir, &options.file_stem) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("log_file_error: {err}");
            LogGuard { file: None }
        }
    };
    let file = guard.file.clone();
    let stderr_enabled = options.stderr;
    let make_writer = BoxMakeWriter::new(move || MultiWriter {
        stderr_enabled,
        file: file.clone(),
    });
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(make_writer)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        return None;
    }
    Some(guard)
}

fn open_log_file(log_dir: &str, file_stem: &str) -> io::Result<LogGuard> {
    if log_dir.trim().is_empty() {
        return Ok(LogGuard { file: None });
    }
    let dir = PathBuf::from(log_dir);
    std::fs::create_dir_all(&dir)?;
    let path = dir.join(format!("{}.log", sanitize_component(file_stem)));
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(LogGuard {
        file: Some(Arc::new(Mutex::new(file))),
    })
}

fn sanitize_component(input: &str) -> String {
    input
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                ch
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_file_name_is_sanitized() {
        assert_eq!(sanitize_component("leadflow board/1"), "leadflow_board_1");
    }

    #[test]
    fn empty_log_dir_means_no_file() {
        let guard = open_log_file("  ", "leadflow").expect("open");
        assert!(!guard.has_file());
    }

    #[test]
    fn log_file_is_created_in_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let log_dir = dir.path().join("logs");
        let guard =
            open_log_file(log_dir.to_str().expect("utf8 path"), "leadflow-cli").expect("open");
        assert!(guard.has_file());
        assert!(log_dir.join("leadflow-cli.log").exists());
    }
}
