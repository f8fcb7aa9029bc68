/// Runtime configuration for a comet module.
#[derive(Debug, Clone)]
pub struct Config {
    /// How much reference-count traffic ends up in the log.
    pub refcount_logging: RefcountLogging,
    /// Extra `EnvFilter` directives appended after the comet directive,
    /// e.g. `"my_plugin=debug"`.
    pub extra_directives: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            refcount_logging: RefcountLogging::CrossModule,
            extra_directives: None,
        }
    }
}

impl Config {
    /// Builds the `EnvFilter` directive string for this configuration.
    pub fn log_filter(&self) -> String {
        let level = match self.refcount_logging {
            RefcountLogging::Off => "info",
            RefcountLogging::CrossModule => "debug",
            RefcountLogging::All => "trace",
        };

        let mut filter = format!("info,comet={level},comet_core={level}");
        if let Some(extra) = &self.extra_directives {
            filter.push(',');
            filter.push_str(extra);
        }
        filter
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefcountLogging {
    /// Only warnings and errors, such as a release without references
    Off,
    /// Also log releases that cross a module boundary
    CrossModule,
    /// Log every increment and decrement
    All,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter() {
        let config = Config::default();
        assert_eq!(config.log_filter(), "info,comet=debug,comet_core=debug");
    }

    #[test]
    fn test_filter_with_extra_directives() {
        let config = Config {
            refcount_logging: RefcountLogging::All,
            extra_directives: Some("my_plugin=warn".to_string()),
        };
        assert_eq!(
            config.log_filter(),
            "info,comet=trace,comet_core=trace,my_plugin=warn"
        );
    }
}
