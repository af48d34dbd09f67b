use tracing::{debug, error, info, warn};

use crate::config::Settings;
use crate::dedup::{rank_batch, unique_titles, TrendRecord};
use crate::error::{PipelineError, StoreError};
use crate::ledger::CollectionStamp;
use crate::normalize::{normalize, NormalizedTrend};
use crate::parser::{default_strategies, ExtractContext, Locale, RawCandidate, Strategy, Vocabulary};
use crate::snapshot::PageSnapshot;
use crate::store::{LedgerStore, MergeResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Extracting(usize),
    Normalizing,
    Deduplicating,
    Merging(usize),
    Done,
    Failed,
}

#[derive(Debug)]
pub struct StrategyRun {
    pub name: &'static str,
    pub found: usize,
    pub error: Option<String>,
}

#[derive(Debug)]
pub struct StoreOutcome {
    pub store: &'static str,
    pub location: String,
    pub result: Result<MergeResult, StoreError>,
}

#[derive(Debug)]
pub struct RunReport {
    pub records: Vec<TrendRecord>,
    pub strategies: Vec<StrategyRun>,
    pub stores: Vec<StoreOutcome>,
    pub stages: Vec<Stage>,
}

impl RunReport {
    pub fn failed_stores(&self) -> usize {
        self.stores.iter().filter(|o| o.result.is_err()).count()
    }
}

/// Drives one capture: strategies in order until the target is met, then
/// normalize, rank and merge into every store.
pub struct Pipeline {
    strategies: Vec<Box<dyn Strategy>>,
    vocab: &'static Vocabulary,
    target: usize,
    default_growth: Option<String>,
}

impl Pipeline {
    pub fn new(locale: Locale, target: usize) -> Self {
        Pipeline {
            strategies: default_strategies(),
            vocab: locale.vocab(),
            target: target.max(1),
            default_growth: None,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Pipeline::new(settings.locale, settings.target_record_count)
            .with_default_growth(settings.default_growth.clone())
    }

    pub fn with_strategies(mut self, strategies: Vec<Box<dyn Strategy>>) -> Self {
        self.strategies = strategies;
        self
    }

    pub fn with_default_growth(mut self, growth: Option<String>) -> Self {
        self.default_growth = growth;
        self
    }

    fn run_strategy(&self, index: usize, page: &PageSnapshot, candidates: &mut Vec<RawCandidate>) -> StrategyRun {
        let strategy = &self.strategies[index];
        let ctx = ExtractContext {
            vocab: self.vocab,
            limit: self.target,
        };
        match strategy.extract(page, &ctx) {
            Ok(found) => {
                info!(strategy = strategy.name(), found = found.len(), "Strategy finished");
                let n = found.len();
                candidates.extend(found);
                StrategyRun {
                    name: strategy.name(),
                    found: n,
                    error: None,
                }
            }
            Err(e) => {
                warn!(strategy = strategy.name(), "Strategy failed: {}", e);
                StrategyRun {
                    name: strategy.name(),
                    found: 0,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// Run the state machine to completion. `Err` only when no usable record
    /// was extracted, in which case no store is touched.
    pub fn run(
        &self,
        page: &PageSnapshot,
        stores: &mut [Box<dyn LedgerStore>],
        stamp: &CollectionStamp,
    ) -> Result<RunReport, PipelineError> {
        let mut candidates: Vec<RawCandidate> = Vec::new();
        let mut normalized: Vec<NormalizedTrend> = Vec::new();
        let mut report = RunReport {
            records: Vec::new(),
            strategies: Vec::new(),
            stores: Vec::new(),
            stages: Vec::new(),
        };
        let mut stage = Stage::Idle;

        loop {
            debug!("Stage {:?}", stage);
            report.stages.push(stage);
            stage = match stage {
                Stage::Idle if self.strategies.is_empty() => Stage::Normalizing,
                Stage::Idle => Stage::Extracting(0),
                Stage::Extracting(i) => {
                    let run = self.run_strategy(i, page, &mut candidates);
                    report.strategies.push(run);
                    let unique = unique_titles(candidates.iter().map(|c| c.title.as_str()), self.vocab);
                    if unique < self.target && i + 1 < self.strategies.len() {
                        Stage::Extracting(i + 1)
                    } else {
                        Stage::Normalizing
                    }
                }
                Stage::Normalizing => {
                    normalized = candidates
                        .iter()
                        .map(|c| normalize(c, self.vocab, self.default_growth.as_deref()))
                        .collect();
                    Stage::Deduplicating
                }
                Stage::Deduplicating => {
                    report.records = rank_batch(std::mem::take(&mut normalized), self.vocab, self.target);
                    if report.records.is_empty() {
                        Stage::Failed
                    } else if stores.is_empty() {
                        Stage::Done
                    } else {
                        Stage::Merging(0)
                    }
                }
                Stage::Merging(i) => {
                    let store = &mut stores[i];
                    let result = store.merge(&report.records, stamp);
                    match &result {
                        Ok(m) => info!(store = %m.location, added = m.added, total = m.final_rows, "Merged"),
                        Err(e) => error!(store = store.label(), "Merge failed: {}", e),
                    }
                    report.stores.push(StoreOutcome {
                        store: store.label(),
                        location: store.location(),
                        result,
                    });
                    if i + 1 < stores.len() {
                        Stage::Merging(i + 1)
                    } else {
                        Stage::Done
                    }
                }
                Stage::Done => return Ok(report),
                Stage::Failed => {
                    return Err(PipelineError::NoRecords {
                        strategies: report.strategies.len(),
                    })
                }
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExtractError;
    use crate::parser::hinted::AttributeHinted;
    use std::cell::Cell;
    use std::fs;
    use std::rc::Rc;

    fn fixture(name: &str) -> PageSnapshot {
        let html = fs::read_to_string(format!("tests/fixtures/{}", name)).unwrap();
        PageSnapshot::from_html(&html)
    }

    struct Failing;

    impl Strategy for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn extract(&self, _: &PageSnapshot, _: &ExtractContext<'_>) -> Result<Vec<RawCandidate>, ExtractError> {
            Err(ExtractError::Selector {
                selector: "??".into(),
                reason: "bad".into(),
            })
        }
    }

    struct Fixed(Vec<&'static str>);

    impl Strategy for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn extract(&self, _: &PageSnapshot, ctx: &ExtractContext<'_>) -> Result<Vec<RawCandidate>, ExtractError> {
            Ok(self.0.iter().take(ctx.limit).map(|t| RawCandidate::new(*t)).collect())
        }
    }

    /// Records merges; optionally fails every one.
    struct CountingStore {
        label: &'static str,
        fail: bool,
        calls: Rc<Cell<usize>>,
    }

    impl LedgerStore for CountingStore {
        fn label(&self) -> &'static str {
            self.label
        }

        fn location(&self) -> String {
            format!("memory://{}", self.label)
        }

        fn merge(&mut self, batch: &[TrendRecord], _: &CollectionStamp) -> Result<MergeResult, StoreError> {
            self.calls.set(self.calls.get() + 1);
            if self.fail {
                return Err(StoreError::Remote("unavailable".into()));
            }
            Ok(MergeResult {
                added: batch.len(),
                final_rows: batch.len(),
                location: self.location(),
            })
        }
    }

    fn stamp() -> CollectionStamp {
        CollectionStamp::new("2024-01-01", "10:00:00")
    }

    #[test]
    fn falls_through_to_attribute_hints() {
        let page = fixture("hinted.html");
        let expected = AttributeHinted
            .extract(
                &page,
                &ExtractContext {
                    vocab: Locale::En.vocab(),
                    limit: 5,
                },
            )
            .unwrap();

        let report = Pipeline::new(Locale::En, 5).run(&page, &mut [], &stamp()).unwrap();
        let names: Vec<&str> = report.strategies.iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["structured-row", "marker-text", "attribute-hinted"]);
        assert_eq!(report.strategies[0].found, 0);
        assert_eq!(report.strategies[1].found, 0);

        let titles: Vec<&str> = report.records.iter().map(|r| r.title.as_str()).collect();
        let want: Vec<&str> = expected.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, want);
        assert_eq!(report.stages.last(), Some(&Stage::Done));
    }

    #[test]
    fn failing_strategy_counts_as_empty() {
        let page = PageSnapshot::from_html("<html><body></body></html>");
        let pipeline = Pipeline::new(Locale::En, 2)
            .with_strategies(vec![Box::new(Failing), Box::new(Fixed(vec!["A", "B", "C"]))]);
        let report = pipeline.run(&page, &mut [], &stamp()).unwrap();
        assert!(report.strategies[0].error.is_some());
        let ranks: Vec<(u32, &str)> = report.records.iter().map(|r| (r.rank, r.title.as_str())).collect();
        assert_eq!(ranks, vec![(1, "A"), (2, "B")]);
    }

    #[test]
    fn stops_once_target_reached() {
        let page = PageSnapshot::from_html("<html><body></body></html>");
        let pipeline = Pipeline::new(Locale::En, 2).with_strategies(vec![
            Box::new(Fixed(vec!["A"])),
            Box::new(Fixed(vec!["A", "B"])),
            Box::new(Failing),
        ]);
        let report = pipeline.run(&page, &mut [], &stamp()).unwrap();
        assert_eq!(report.strategies.len(), 2);
        assert_eq!(report.records.len(), 2);
        assert!(report.stages.contains(&Stage::Extracting(1)));
        assert!(!report.stages.contains(&Stage::Extracting(2)));
    }

    #[test]
    fn zero_records_fails_before_any_store() {
        let page = PageSnapshot::from_html("<html><body><p>nothing here</p></body></html>");
        let calls = Rc::new(Cell::new(0));
        let mut stores: Vec<Box<dyn LedgerStore>> = vec![Box::new(CountingStore {
            label: "json",
            fail: false,
            calls: calls.clone(),
        })];
        let err = Pipeline::new(Locale::En, 5)
            .run(&page, &mut stores, &stamp())
            .unwrap_err();
        assert!(matches!(err, PipelineError::NoRecords { strategies: 4 }));
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn store_failure_does_not_stop_others() {
        let page = PageSnapshot::from_html("");
        let calls = Rc::new(Cell::new(0));
        let mut stores: Vec<Box<dyn LedgerStore>> = vec![
            Box::new(CountingStore {
                label: "workbook",
                fail: true,
                calls: calls.clone(),
            }),
            Box::new(CountingStore {
                label: "sheet",
                fail: false,
                calls: calls.clone(),
            }),
        ];
        let pipeline = Pipeline::new(Locale::En, 5).with_strategies(vec![Box::new(Fixed(vec!["A"]))]);
        let report = pipeline.run(&page, &mut stores, &stamp()).unwrap();

        assert_eq!(calls.get(), 2);
        assert_eq!(report.failed_stores(), 1);
        assert_eq!(report.stores[1].result.as_ref().unwrap().added, 1);
        assert_eq!(report.stages.last(), Some(&Stage::Done));
    }
}
