use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Configuration invalid: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage failed: {0}")]
    Storage(#[from] StorageError),

    #[error("Server failed: {0}")]
    Server(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Collection interval must be greater than zero")]
    InvalidInterval,
}

/// Failure reading a value from the host.
#[derive(Error, Debug)]
pub enum SampleError {
    #[error("System API error: {0}")]
    SystemApi(String),
}

/// Which step of a sampling attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionStage {
    CpuRead,
    MemRead,
    Persist,
}

impl CollectionStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CpuRead => "cpu-read",
            Self::MemRead => "mem-read",
            Self::Persist => "persist",
        }
    }
}

impl fmt::Display for CollectionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum CollectionError {
    #[error("Failed to read CPU usage: {0}")]
    CpuRead(#[source] SampleError),

    #[error("Failed to read memory usage: {0}")]
    MemRead(#[source] SampleError),

    #[error("Failed to persist sample: {0}")]
    Persist(#[source] StorageError),
}

impl CollectionError {
    pub fn stage(&self) -> CollectionStage {
        match self {
            Self::CpuRead(_) => CollectionStage::CpuRead,
            Self::MemRead(_) => CollectionStage::MemRead,
            Self::Persist(_) => CollectionStage::Persist,
        }
    }
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Write operation failed: {0}")]
    Write(String),

    #[error("Read operation failed: {0}")]
    Read(String),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_tags_match_variants() {
        let cpu = CollectionError::CpuRead(SampleError::SystemApi("no cpus".into()));
        let mem = CollectionError::MemRead(SampleError::SystemApi("no memory".into()));
        let persist = CollectionError::Persist(StorageError::Write("down".into()));

        assert_eq!(cpu.stage(), CollectionStage::CpuRead);
        assert_eq!(mem.stage(), CollectionStage::MemRead);
        assert_eq!(persist.stage(), CollectionStage::Persist);
        assert_eq!(persist.stage().to_string(), "persist");
    }

    #[test]
    fn collection_error_keeps_cause_in_message() {
        let err = CollectionError::Persist(StorageError::Write("connection reset".into()));
        assert!(err.to_string().contains("connection reset"));
    }
}
