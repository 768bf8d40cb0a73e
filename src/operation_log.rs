use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::MakeWriter;

/// Sink for the per-run operation log. The tracing file layer is installed
/// before the run's identity (service, operation, timestamp) is known, so the
/// sink starts disabled and swallows writes until [ReportSink] points it at
/// the run's `logs/{service}/{operation}_{timestamp}.log` path.
///
/// [ReportSink]: crate::report::ReportSink
#[derive(Clone, Default)]
pub struct OperationLog {
    sink: Arc<Mutex<Option<File>>>,
}

impl OperationLog {
    pub fn new() -> Self {
        OperationLog::default()
    }

    /// Starts writing to `log_file_path`, creating parent directories as
    /// needed. Replaces any previously opened file.
    pub fn open(&self, log_file_path: &Path) -> io::Result<()> {
        if let Some(parent) = log_file_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(log_file_path)?;

        if let Ok(mut sink) = self.sink.lock() {
            *sink = Some(file);
        }
        Ok(())
    }

    /// Flushes and detaches the current file; subsequent writes are dropped.
    pub fn close(&self) {
        if let Ok(mut sink) = self.sink.lock() {
            if let Some(file) = sink.as_mut() {
                let _ = file.flush();
            }
            *sink = None;
        }
    }
}

/// One record per write call, flushed immediately: the operation log must
/// survive a run killed mid-teardown.
pub struct OperationLogWriter {
    sink: Arc<Mutex<Option<File>>>,
}

impl Write for OperationLogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Ok(mut sink) = self.sink.lock() {
            if let Some(file) = sink.as_mut() {
                file.write_all(buf)?;
                file.flush()?;
            }
        }
        // a disabled sink accepts and drops the record
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if let Ok(mut sink) = self.sink.lock() {
            if let Some(file) = sink.as_mut() {
                return file.flush();
            }
        }
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for OperationLog {
    type Writer = OperationLogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        OperationLogWriter {
            sink: self.sink.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_record(log: &OperationLog, record: &str) {
        let mut writer = log.make_writer();
        writer.write_all(record.as_bytes()).unwrap();
    }

    #[test]
    fn test_writes_before_open_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("eks").join("teardown_x.log");
        let log = OperationLog::new();

        write_record(&log, "too early\n");
        log.open(&path).unwrap();
        write_record(&log, "recorded\n");

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "recorded\n");
    }

    #[test]
    fn test_open_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("ec2").join("teardown_y.log");

        OperationLog::new().open(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_close_stops_recording() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.log");
        let log = OperationLog::new();

        log.open(&path).unwrap();
        write_record(&log, "first\n");
        log.close();
        write_record(&log, "after close\n");

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "first\n");
    }

    #[test]
    fn test_clones_share_the_sink() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.log");
        let log = OperationLog::new();
        let handle = log.clone();

        log.open(&path).unwrap();
        write_record(&handle, "via clone\n");

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "via clone\n");
    }
}
