// Audit Log Sinks
// Input/response/error records written by the pipe

use tracing::{error, info, warn};

use crate::models::{LogLevel, LogRecord};

pub trait AuditSink {
    fn append(&mut self, record: LogRecord);

    fn info(&mut self, message: impl Into<String>)
    where
        Self: Sized,
    {
        self.append(LogRecord::new(LogLevel::Info, message));
    }

    fn warning(&mut self, message: impl Into<String>)
    where
        Self: Sized,
    {
        self.append(LogRecord::new(LogLevel::Warning, message));
    }

    fn error(&mut self, message: impl Into<String>)
    where
        Self: Sized,
    {
        self.append(LogRecord::new(LogLevel::Error, message));
    }
}

/// Forwards records to the global `tracing` subscriber (the per-run log file).
#[derive(Debug, Default)]
pub struct TracingSink;

impl AuditSink for TracingSink {
    fn append(&mut self, record: LogRecord) {
        match record.level {
            LogLevel::Info => info!(target: "audit", "{}", record.message),
            LogLevel::Warning => warn!(target: "audit", "{}", record.message),
            LogLevel::Error => error!(target: "audit", "{}", record.message),
        }
    }
}

#[derive(Debug, Default)]
pub struct MemorySink {
    pub records: Vec<LogRecord>,
}

impl MemorySink {
    pub fn messages(&self) -> Vec<(LogLevel, &str)> {
        self.records
            .iter()
            .map(|r| (r.level, r.message.as_str()))
            .collect()
    }
}

impl AuditSink for MemorySink {
    fn append(&mut self, record: LogRecord) {
        self.records.push(record);
    }
}
