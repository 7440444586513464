//! Prometheus metrics
//!
//! The hub maintains its own registry; binding it to an HTTP listener is
//! the operator's concern. Rejections are counted per error kind so a
//! misbehaving submitter shows up as a single climbing series.

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

pub struct HubMetrics {
    registry: Registry,
    pub merges_total: IntCounter,
    pub rejections_total: IntCounterVec,
    pub sync_cycles_total: IntCounter,
    pub sync_messages_merged: IntCounter,
    pub cascade_discards_total: IntCounter,
    pub trie_messages: IntGauge,
}

impl HubMetrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let merges_total = IntCounter::new("hub_merges_total", "Messages merged into the CRDTs")?;
        let rejections_total = IntCounterVec::new(
            Opts::new("hub_rejections_total", "Rejected submissions by error kind"),
            &["kind"],
        )?;
        let sync_cycles_total =
            IntCounter::new("hub_sync_cycles_total", "Completed diff-sync cycles")?;
        let sync_messages_merged = IntCounter::new(
            "hub_sync_messages_merged",
            "Messages merged through diff sync",
        )?;
        let cascade_discards_total = IntCounter::new(
            "hub_cascade_discards_total",
            "Messages discarded by revocation cascades",
        )?;
        let trie_messages = IntGauge::new("hub_trie_messages", "Sync ids resident in the trie")?;

        registry.register(Box::new(merges_total.clone()))?;
        registry.register(Box::new(rejections_total.clone()))?;
        registry.register(Box::new(sync_cycles_total.clone()))?;
        registry.register(Box::new(sync_messages_merged.clone()))?;
        registry.register(Box::new(cascade_discards_total.clone()))?;
        registry.register(Box::new(trie_messages.clone()))?;

        Ok(Self {
            registry,
            merges_total,
            rejections_total,
            sync_cycles_total,
            sync_messages_merged,
            cascade_discards_total,
            trie_messages,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Text exposition for the scrape endpoint
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        if encoder
            .encode(&self.registry.gather(), &mut buffer)
            .is_err()
        {
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_render() {
        let metrics = HubMetrics::new().unwrap();
        metrics.merges_total.inc();
        metrics.rejections_total.with_label_values(&["bad_signature"]).inc();
        metrics.trie_messages.set(7);

        let text = metrics.render();
        assert!(text.contains("hub_merges_total 1"));
        assert!(text.contains("bad_signature"));
        assert!(text.contains("hub_trie_messages 7"));
    }
}
