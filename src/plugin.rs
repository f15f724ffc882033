// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! External-plugin line protocol for the charting host
//!
//! A plugin announces its charts once (`CHART` followed by `DIMENSION`
//! lines), then writes one `BEGIN`/`SET`/`END` block per chart every cycle.
//! Every cycle also reports its own wall time on a shared execution-time
//! chart, one dimension per plugin.
//!
//! ```text
//! CHART lighthouse.peers '' 'Lighthouse Peer Count' 'peers' 'network' 'lighthouse.peers' line 70001 5
//! DIMENSION connected_peers 'connected peers' absolute 1 1
//! BEGIN lighthouse.peers
//! SET connected_peers = 64
//! END
//! ```

use std::future::Future;
use std::io::Write;
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;

use crate::chain::{Chart, Collector, Sample};
use crate::error::Result;

/// Chart every plugin reports its cycle time on
pub const EXECUTION_CHART: &str = "netdata.plugin_pythond";

const EXECUTION_CHART_PRIORITY: u32 = 145000;

/// Quote a free-text protocol field
fn quote(field: &str) -> String {
    format!("'{}'", field.replace('\'', "\""))
}

/// Writes protocol lines to the host (stdout in production)
pub struct PluginWriter<W: Write> {
    out: W,
}

impl<W: Write> PluginWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn define(&mut self, chart: &Chart, update_every: Duration) -> std::io::Result<()> {
        writeln!(
            self.out,
            "CHART {} '' {} {} {} {} {} {} {}",
            chart.id,
            quote(&chart.title),
            quote(&chart.units),
            quote(&chart.family),
            quote(&chart.context),
            chart.kind,
            chart.priority,
            update_every.as_secs().max(1)
        )?;
        for dim in &chart.dimensions {
            writeln!(
                self.out,
                "DIMENSION {} {} {} {} {}",
                dim.id,
                quote(&dim.name),
                dim.algorithm,
                dim.multiplier,
                dim.divisor
            )?;
        }
        Ok(())
    }

    pub fn define_execution_chart(
        &mut self,
        plugin: &str,
        update_every: Duration,
    ) -> std::io::Result<()> {
        writeln!(
            self.out,
            "CHART {} '' 'Execution time' 'milliseconds' 'plugins' 'netdata.plugin_python' line {} {}",
            EXECUTION_CHART,
            EXECUTION_CHART_PRIORITY,
            update_every.as_secs().max(1)
        )?;
        writeln!(self.out, "DIMENSION {} {} absolute 1 1", plugin, quote(plugin))
    }

    /// One data block; dimensions missing from the sample are sent as 0
    pub fn update(&mut self, chart: &Chart, sample: &Sample) -> std::io::Result<()> {
        writeln!(self.out, "BEGIN {}", chart.id)?;
        for dim in &chart.dimensions {
            let value = sample.get(&dim.id).copied().unwrap_or(0);
            writeln!(self.out, "SET {} = {}", dim.id, value)?;
        }
        writeln!(self.out, "END")
    }

    pub fn execution_time(&mut self, plugin: &str, elapsed: Duration) -> std::io::Result<()> {
        writeln!(self.out, "BEGIN {}", EXECUTION_CHART)?;
        writeln!(self.out, "SET {} = {}", plugin, elapsed.as_millis())?;
        writeln!(self.out, "END")
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        self.out.flush()
    }
}

/// Announce the execution-time chart and every collector chart
pub fn announce<W: Write>(
    writer: &mut PluginWriter<W>,
    collector: &dyn Collector,
    update_every: Duration,
) -> Result<()> {
    writer.define_execution_chart(collector.name(), update_every)?;
    for chart in collector.charts() {
        writer.define(&chart, update_every)?;
    }
    writer.flush()?;
    Ok(())
}

/// Collect once and write the data blocks plus the cycle time.
///
/// Returns whether a sample was produced; a skipped cycle still reports
/// its execution time.
pub async fn run_cycle<W: Write>(
    writer: &mut PluginWriter<W>,
    collector: &dyn Collector,
    charts: &[Chart],
) -> Result<bool> {
    let started = Instant::now();
    let sample = collector.collect().await;
    if let Some(sample) = &sample {
        for chart in charts {
            writer.update(chart, sample)?;
        }
    } else {
        log::debug!("{}: no data this cycle", collector.name());
    }
    writer.execution_time(collector.name(), started.elapsed())?;
    writer.flush()?;
    Ok(sample.is_some())
}

/// Announce, then collect every `update_every` until Ctrl-C
pub async fn run<W: Write>(
    collector: &dyn Collector,
    update_every: Option<Duration>,
    out: W,
) -> Result<()> {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::warn!("Cannot listen for SIGINT: {}", e);
            std::future::pending::<()>().await;
        }
        log::info!("Received SIGINT, exiting...");
    };
    run_until(collector, update_every, out, ctrl_c).await
}

/// Collection loop that stops as soon as `shutdown` completes, including
/// in the middle of a cycle
pub async fn run_until<W, F>(
    collector: &dyn Collector,
    update_every: Option<Duration>,
    out: W,
    shutdown: F,
) -> Result<()>
where
    W: Write,
    F: Future<Output = ()>,
{
    let update_every = update_every.unwrap_or_else(|| collector.update_every());
    let charts = collector.charts();
    let mut writer = PluginWriter::new(out);
    announce(&mut writer, collector, update_every)?;
    log::info!(
        "{} started, collecting every {}s",
        collector.name(),
        update_every.as_secs()
    );

    tokio::pin!(shutdown);
    let mut ticker = tokio::time::interval(update_every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = &mut shutdown => return Ok(()),
            _ = ticker.tick() => {}
        }
        tokio::select! {
            _ = &mut shutdown => return Ok(()),
            cycle = run_cycle(&mut writer, collector, &charts) => {
                cycle?;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::Dimension;
    use async_trait::async_trait;

    struct Fixed(Option<Sample>);

    #[async_trait]
    impl Collector for Fixed {
        fn name(&self) -> &str {
            "fixed_monitor"
        }

        fn update_every(&self) -> Duration {
            Duration::from_secs(5)
        }

        fn charts(&self) -> Vec<Chart> {
            vec![
                Chart::line("fixed.balance", "It's a balance", "gwei", "earnings", 100).dimension(
                    Dimension::new("daily", "per day").with_divisor(1_000_000_000),
                ),
                Chart::line("fixed.peers", "Peers", "peers", "network", 101)
                    .dimension(Dimension::new("peers", "peers"))
                    .dimension(Dimension::new("missing", "missing")),
            ]
        }

        async fn collect(&self) -> Option<Sample> {
            self.0.clone()
        }
    }

    /// Collector whose scrape never finishes within a test
    struct Stuck;

    #[async_trait]
    impl Collector for Stuck {
        fn name(&self) -> &str {
            "stuck_monitor"
        }

        fn update_every(&self) -> Duration {
            Duration::from_secs(1)
        }

        fn charts(&self) -> Vec<Chart> {
            vec![Chart::line("stuck.peers", "Peers", "peers", "network", 100)
                .dimension(Dimension::new("peers", "peers"))]
        }

        async fn collect(&self) -> Option<Sample> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            None
        }
    }

    fn output(writer: PluginWriter<Vec<u8>>) -> String {
        String::from_utf8(writer.into_inner()).unwrap()
    }

    #[test]
    fn test_announce() {
        let mut writer = PluginWriter::new(Vec::new());
        announce(&mut writer, &Fixed(None), Duration::from_secs(5)).unwrap();
        let text = output(writer);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "CHART netdata.plugin_pythond '' 'Execution time' 'milliseconds' 'plugins' 'netdata.plugin_python' line 145000 5"
        );
        assert_eq!(
            lines[1],
            "DIMENSION fixed_monitor 'fixed_monitor' absolute 1 1"
        );
        assert_eq!(
            lines[2],
            "CHART fixed.balance '' 'It\"s a balance' 'gwei' 'earnings' 'fixed.balance' line 100 5"
        );
        assert_eq!(lines[3], "DIMENSION daily 'per day' absolute 1 1000000000");
        assert_eq!(lines.len(), 7);
    }

    #[tokio::test]
    async fn test_cycle_writes_every_chart() {
        let sample = Sample::from([("daily".to_string(), 7), ("peers".to_string(), 12)]);
        let collector = Fixed(Some(sample));
        let charts = collector.charts();
        let mut writer = PluginWriter::new(Vec::new());
        assert!(run_cycle(&mut writer, &collector, &charts).await.unwrap());

        let text = output(writer);
        assert!(text.starts_with("BEGIN fixed.balance\nSET daily = 7\nEND\n"));
        assert!(text.contains("BEGIN fixed.peers\nSET peers = 12\nSET missing = 0\nEND\n"));
        assert!(text.contains("BEGIN netdata.plugin_pythond\nSET fixed_monitor = "));
    }

    #[tokio::test]
    async fn test_skipped_cycle_reports_execution_time_only() {
        let collector = Fixed(None);
        let charts = collector.charts();
        let mut writer = PluginWriter::new(Vec::new());
        assert!(!run_cycle(&mut writer, &collector, &charts).await.unwrap());

        let text = output(writer);
        assert!(text.starts_with("BEGIN netdata.plugin_pythond\n"));
        assert_eq!(text.lines().count(), 3);
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_running_cycle() {
        let shutdown = tokio::time::sleep(Duration::from_millis(50));
        let finished = tokio::time::timeout(
            Duration::from_secs(5),
            run_until(&Stuck, None, Vec::new(), shutdown),
        )
        .await;
        assert!(matches!(finished, Ok(Ok(()))));
    }

    #[tokio::test]
    async fn test_shutdown_before_first_tick() {
        let result = run_until(&Fixed(None), None, Vec::new(), std::future::ready(())).await;
        assert!(result.is_ok());
    }
}
