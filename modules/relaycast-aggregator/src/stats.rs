/// Counters from one pipeline run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunStats {
    pub sources_ok: u32,
    pub sources_failed: u32,
    pub sources_timed_out: u32,
    pub raw_records: u32,
    pub rejected: u32,
    pub deduplicated: u32,
    pub excluded: u32,
    pub author_capped: u32,
    pub ranked: u32,
    pub artifacts_written: u32,
    pub artifacts_fallback: u32,
    pub artifacts_lost: u32,
}

impl RunStats {
    pub fn merge(&mut self, other: &RunStats) {
        self.sources_ok += other.sources_ok;
        self.sources_failed += other.sources_failed;
        self.sources_timed_out += other.sources_timed_out;
        self.raw_records += other.raw_records;
        self.rejected += other.rejected;
        self.deduplicated += other.deduplicated;
        self.excluded += other.excluded;
        self.author_capped += other.author_capped;
        self.ranked += other.ranked;
        self.artifacts_written += other.artifacts_written;
        self.artifacts_fallback += other.artifacts_fallback;
        self.artifacts_lost += other.artifacts_lost;
    }
}

impl std::fmt::Display for RunStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n=== Relaycast Run Complete ===")?;
        writeln!(f, "Source queries ok:  {}", self.sources_ok)?;
        writeln!(f, "Source failures:    {}", self.sources_failed)?;
        writeln!(f, "Source timeouts:    {}", self.sources_timed_out)?;
        writeln!(f, "Raw records:        {}", self.raw_records)?;
        writeln!(f, "Rejected:           {}", self.rejected)?;
        writeln!(f, "Deduplicated:       {}", self.deduplicated)?;
        writeln!(f, "\nTrending:")?;
        writeln!(f, "  Excluded:  {}", self.excluded)?;
        writeln!(f, "  Capped:    {}", self.author_capped)?;
        writeln!(f, "  Ranked:    {}", self.ranked)?;
        if self.artifacts_written + self.artifacts_fallback + self.artifacts_lost > 0 {
            writeln!(f, "\nArtifacts:")?;
            writeln!(f, "  Written:   {}", self.artifacts_written)?;
            writeln!(f, "  Fallback:  {}", self.artifacts_fallback)?;
            writeln!(f, "  Lost:      {}", self.artifacts_lost)?;
        }
        Ok(())
    }
}
