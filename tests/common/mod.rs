use std::io;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use service_scaffold::{config::Config, logger::Logger};

/// In-memory log sink; every record is one JSON line
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

struct CaptureWriter(Arc<Mutex<Vec<u8>>>);

impl io::Write for CaptureWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl LogCapture {
    /// Logger for `config` whose output lands in this capture, always JSON
    pub fn logger(&self, config: &Config) -> Logger {
        let mut log = config.log.clone();
        log.output = "json".to_string();

        let sink = self.0.clone();
        Logger::with_writer(&log, &config.service_name, move || {
            CaptureWriter(sink.clone())
        })
        .unwrap()
    }

    pub fn records(&self) -> Vec<Value> {
        let raw = self.0.lock().unwrap().clone();
        String::from_utf8(raw)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    /// Records whose message starts with `prefix`
    pub fn with_message(&self, prefix: &str) -> Vec<Value> {
        self.records()
            .into_iter()
            .filter(|r| {
                r["message"]
                    .as_str()
                    .map(|m| m.starts_with(prefix))
                    .unwrap_or(false)
            })
            .collect()
    }
}

/// Default configuration logging everything
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.service_name = "scaffold-test".to_string();
    config.log.level = "trace".to_string();
    config
}
