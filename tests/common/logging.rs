use std::{
    io::{self, Write},
    sync::{Arc, Mutex, Once},
};

use log::LevelFilter;
use viewstamped_rs::logging::{self, LoggerConfig};

static LOGGER_INIT: Once = Once::new();

// Set up a logger that prints all log messages with level `level` and above to stdout.
pub(crate) fn setup_logger(level: LevelFilter) {
    LOGGER_INIT.call_once(|| {
        logging::setup_logger(LoggerConfig::builder().level(level).build(), io::stdout())
            .unwrap();
    })
}

/// A sink that keeps everything written to it, and can be inspected while a logger owns a clone.
#[derive(Clone, Default)]
pub(crate) struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub(crate) fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }

    pub(crate) fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
