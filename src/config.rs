//! Configuration options for mapping execution.
//!
//! This module provides the [`MapperConfig`] struct which controls term
//! generation details, pipeline buffering, error handling, and the
//! collect-to-graph timeout.

use std::time::Duration;

use crate::encode::NormalizationForm;

/// Configuration for an [`RmlMapper`](crate::mapper::RmlMapper).
///
/// # Examples
///
/// ```ignore
/// use rmlx::config::MapperConfig;
/// use rmlx::encode::NormalizationForm;
///
/// // Default configuration (NFC, upper-case percent encoding, 30 s timeout)
/// let config = MapperConfig::default();
///
/// // Custom configuration
/// let config = MapperConfig::new()
///     .with_normalization_form(NormalizationForm::Nfkc)
///     .with_strict(true);
/// ```
#[derive(Debug, Clone)]
pub struct MapperConfig {
    /// Unicode normalization applied to template hole values before IRI
    /// percent-encoding.
    pub normalization_form: NormalizationForm,

    /// Upper-case hex digits in IRI percent-encoding.
    ///
    /// The default; the lower-case form exists for backward compatibility
    /// with output produced by older tool chains.
    pub iri_upper_case_percent_encoding: bool,

    /// Base IRI for resolving relative generated IRIs.
    pub base_iri: Option<String>,

    /// Overall timeout for [`map_to_graph`](crate::mapper::RmlMapper::map_to_graph).
    ///
    /// When the deadline passes, pipelines are cancelled and the call
    /// fails with a mapping timeout error.
    pub map_to_graph_timeout: Duration,

    /// Promote per-record term generation errors to fatal.
    ///
    /// When false (default), a failing term is treated as absent and a
    /// warning is recorded; the record's other terms are unaffected.
    pub strict: bool,

    /// Keep running sibling pipelines after one pipeline fails.
    ///
    /// When false (default), the first fatal pipeline error cancels all
    /// other pipelines.
    pub continue_on_error: bool,

    /// Capacity of the bounded channels between a pipeline's decoder and
    /// its triples mappers, in records. The slowest mapper throttles the
    /// decoder once its buffer fills.
    pub channel_capacity: usize,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            normalization_form: NormalizationForm::Nfc,
            iri_upper_case_percent_encoding: true,
            base_iri: None,
            map_to_graph_timeout: Duration::from_secs(30),
            strict: false,
            continue_on_error: false,
            channel_capacity: 1000,
        }
    }
}

impl MapperConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the Unicode normalization form.
    #[must_use]
    pub const fn with_normalization_form(mut self, form: NormalizationForm) -> Self {
        self.normalization_form = form;
        self
    }

    /// Selects upper- or lower-case percent-encoding hex digits.
    #[must_use]
    pub const fn with_iri_upper_case_percent_encoding(mut self, enabled: bool) -> Self {
        self.iri_upper_case_percent_encoding = enabled;
        self
    }

    /// Sets the base IRI for relative generated IRIs.
    #[must_use]
    pub fn with_base_iri(mut self, base: impl Into<String>) -> Self {
        self.base_iri = Some(base.into());
        self
    }

    /// Sets the collect-to-graph timeout.
    #[must_use]
    pub const fn with_map_to_graph_timeout(mut self, timeout: Duration) -> Self {
        self.map_to_graph_timeout = timeout;
        self
    }

    /// Enables strict mode.
    #[must_use]
    pub const fn with_strict(mut self, enabled: bool) -> Self {
        self.strict = enabled;
        self
    }

    /// Enables continue-on-pipeline-error.
    #[must_use]
    pub const fn with_continue_on_error(mut self, enabled: bool) -> Self {
        self.continue_on_error = enabled;
        self
    }

    /// Sets the pipeline channel capacity in records.
    #[must_use]
    pub const fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }
}
