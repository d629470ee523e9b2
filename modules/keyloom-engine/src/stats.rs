use std::time::Duration;

use keyloom_common::Stage;

/// Counters from one pipeline run.
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    pub keywords_expanded: u32,
    pub keywords_deduplicated: u32,
    pub keywords_enriched: u32,
    pub keywords_flagged: u32,
    pub keywords_scored: u32,
    pub estimated_difficulty: u32,
    pub topics: u32,
    pub pages: u32,
    pub sibling_links: u32,
    /// Wall time per executed stage, in execution order.
    pub stage_times: Vec<(Stage, Duration)>,
}

impl RunStats {
    pub fn record_stage(&mut self, stage: Stage, elapsed: Duration) {
        self.stage_times.push((stage, elapsed));
    }

    pub fn total_time(&self) -> Duration {
        self.stage_times.iter().map(|(_, d)| *d).sum()
    }
}

impl std::fmt::Display for RunStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n=== Pipeline Run Complete ===")?;
        writeln!(f, "Keywords expanded:   {}", self.keywords_expanded)?;
        writeln!(f, "Deduplicated:        {}", self.keywords_deduplicated)?;
        writeln!(f, "Enriched:            {}", self.keywords_enriched)?;
        writeln!(f, "Flagged:             {}", self.keywords_flagged)?;
        writeln!(f, "Scored:              {}", self.keywords_scored)?;
        if self.estimated_difficulty > 0 {
            writeln!(f, "Estimated difficulty:{}", self.estimated_difficulty)?;
        }
        writeln!(f, "Topics:              {}", self.topics)?;
        writeln!(f, "Page groups:         {}", self.pages)?;
        writeln!(f, "Sibling links:       {}", self.sibling_links)?;
        if !self.stage_times.is_empty() {
            writeln!(f, "\nStage times:")?;
            for (stage, elapsed) in &self.stage_times {
                writeln!(f, "  {:<12} {:.2}s", stage.to_string(), elapsed.as_secs_f64())?;
            }
            writeln!(f, "  {:<12} {:.2}s", "total", self.total_time().as_secs_f64())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_time_sums_stages() {
        let mut stats = RunStats::default();
        stats.record_stage(Stage::Expansion, Duration::from_secs(2));
        stats.record_stage(Stage::Metrics, Duration::from_secs(3));
        assert_eq!(stats.total_time(), Duration::from_secs(5));
    }

    #[test]
    fn display_includes_the_counters() {
        let mut stats = RunStats::default();
        stats.keywords_expanded = 120;
        stats.topics = 7;
        let rendered = stats.to_string();
        assert!(rendered.contains("Keywords expanded:   120"));
        assert!(rendered.contains("Topics:              7"));
    }
}
