//! Runtime configuration of the scheduler

/// Configuration for the cooperative scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Name used in log lines
    pub name: &'static str,
    /// Report events no state handled through `Hooks::on_error`
    pub report_unhandled: bool,
}

impl SchedulerConfig {
    pub const DEFAULT: SchedulerConfig = SchedulerConfig {
        name: "RKH",
        report_unhandled: false,
    };

    /// Creates a new scheduler configuration builder.
    pub const fn builder() -> SchedulerConfigBuilder {
        SchedulerConfigBuilder {
            config: Self::DEFAULT,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Builder for [`SchedulerConfig`]
#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfigBuilder {
    config: SchedulerConfig,
}

impl SchedulerConfigBuilder {
    /// Sets the scheduler name.
    pub const fn name(mut self, name: &'static str) -> Self {
        self.config.name = name;
        self
    }

    /// Also report `EventNotFound` outcomes.
    pub const fn report_unhandled(mut self, report: bool) -> Self {
        self.config.report_unhandled = report;
        self
    }

    /// Builds the scheduler configuration.
    pub const fn build(self) -> SchedulerConfig {
        self.config
    }
}

impl Default for SchedulerConfigBuilder {
    fn default() -> Self {
        SchedulerConfig::builder()
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for SchedulerConfig {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(
            fmt,
            "SchedulerConfig {{ name: {=str}, report_unhandled: {} }}",
            self.name,
            self.report_unhandled
        );
    }
}
