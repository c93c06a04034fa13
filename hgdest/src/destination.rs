//! The Mercurial destination: a validated configuration that hands out writers.

use crate::console::Console;
use crate::core::types::HG_ORIGIN_REV_ID;
use crate::error::WriteError;
use crate::io::config::DestinationConfig;
use crate::writer::SyncWriter;

#[derive(Debug, Clone)]
pub struct HgDestination {
    config: DestinationConfig,
}

impl HgDestination {
    /// Validate `config` and build the destination.
    pub fn new(config: DestinationConfig) -> Result<Self, WriteError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &DestinationConfig {
        &self.config
    }

    /// Label under which revisions of this destination appear when it is used as an origin.
    pub fn label_name_when_origin(&self) -> &'static str {
        HG_ORIGIN_REV_ID
    }

    pub fn new_writer<C: Console>(&self, console: C) -> SyncWriter<C> {
        SyncWriter::new(self.config.clone(), console)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::TracingConsole;
    use crate::error::ErrorKind;

    #[test]
    fn rejects_invalid_config() {
        let err = HgDestination::new(DestinationConfig::for_url("")).expect_err("empty url");
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn writer_inherits_config() {
        let mut cfg = DestinationConfig::for_url("https://hg.example.com/r");
        cfg.push = "stable".to_string();
        let destination = HgDestination::new(cfg.clone()).expect("valid");
        assert_eq!(destination.label_name_when_origin(), "HgOrigin-RevId");
        assert_eq!(destination.new_writer(TracingConsole).config(), &cfg);
    }
}
