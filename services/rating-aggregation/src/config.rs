//! Job configuration

/// Configuration for one aggregation job instance.
#[derive(Debug, Clone)]
pub struct JobConfig {
    /// Watermark key; distinct job names run independent windows.
    pub job_name: String,
    /// When true, a rating referencing a workshop with no owning provider
    /// aborts the whole cycle (the conservative behavior). When false, the
    /// orphaned workshop is logged and excluded from provider roll-up while
    /// the rest of the cycle proceeds.
    pub strict_integrity: bool,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            job_name: "average-rating-calculation".to_string(),
            strict_integrity: false,
        }
    }
}
