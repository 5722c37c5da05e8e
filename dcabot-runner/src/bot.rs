//! Bot: the polling loop over every configured symbol.
//!
//! Symbols are evaluated one after another. After each symbol's cycle the
//! position book is written back before the fill is journaled, so a restart
//! resumes from the last committed state.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use tracing::{error, info, warn};

use dcabot_core::config::BotConfig;
use dcabot_core::data::PriceSource;
use dcabot_core::execution::OrderGateway;
use dcabot_core::persistence::PositionBook;

use crate::journal::{JournalEntry, TradeJournal};
use crate::pipeline::{CycleOutcome, Strategy, SymbolPipeline};
use crate::store::{PositionStore, StoreError};

#[derive(Debug, Error)]
pub enum BotError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Outcome of one symbol in one pass.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolReport {
    pub symbol: String,
    pub outcome: CycleOutcome,
}

pub struct Bot<S: PriceSource, G: OrderGateway> {
    strategy: Strategy,
    pipelines: Vec<SymbolPipeline>,
    source: S,
    gateway: G,
    store: PositionStore,
    journal: Option<TradeJournal>,
    poll_interval: Duration,
    book: PositionBook,
}

impl<S: PriceSource, G: OrderGateway> Bot<S, G> {
    /// Load persisted positions and build one pipeline per symbol.
    pub fn new(config: &BotConfig, source: S, gateway: G) -> Result<Self, BotError> {
        let strategy = Strategy::from_config(config);
        let store = PositionStore::new(config.state_file.clone());
        let mut book = store.load()?;
        let repaired = book.normalize(&strategy.ctx);
        if repaired > 0 {
            info!(repaired, path = %store.path().display(), "completed older position records");
        }

        let pipelines = config
            .symbols
            .iter()
            .map(|symbol| SymbolPipeline::new(symbol.as_str(), &strategy.suite, book.get(symbol)))
            .collect();

        info!(
            symbols = config.symbols.len(),
            open_positions = book.len(),
            source = source.name(),
            gateway = gateway.name(),
            window = strategy.suite.required_bars(),
            "bot initialized"
        );

        Ok(Self {
            strategy,
            pipelines,
            source,
            gateway,
            store,
            journal: config.journal_file.clone().map(TradeJournal::new),
            poll_interval: Duration::from_secs(config.poll_interval_secs),
            book,
        })
    }

    /// Override the configured sleep between passes.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn book(&self) -> &PositionBook {
        &self.book
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn state_path(&self) -> PathBuf {
        self.store.path().to_path_buf()
    }

    /// One pass over every symbol.
    pub fn run_once(&mut self) -> Result<Vec<SymbolReport>, BotError> {
        let mut reports = Vec::with_capacity(self.pipelines.len());

        for pipeline in &mut self.pipelines {
            let outcome = pipeline.run_cycle(&self.source, &mut self.gateway, &self.strategy);

            self.book.set(pipeline.symbol(), pipeline.position().clone());
            self.store.save(&self.book)?;

            // The fill is already persisted; a journal failure only loses the row.
            if let (CycleOutcome::Executed { action, fill }, Some(journal)) =
                (&outcome, &self.journal)
            {
                let entry = JournalEntry::new(
                    self.gateway.name(),
                    pipeline.symbol(),
                    action,
                    fill,
                    pipeline.position(),
                );
                if let Err(e) = journal.append(&entry) {
                    warn!(
                        symbol = pipeline.symbol(),
                        path = %journal.path().display(),
                        error = %e,
                        "journal append failed; fill kept in state file"
                    );
                }
            }

            reports.push(SymbolReport {
                symbol: pipeline.symbol().to_string(),
                outcome,
            });
        }

        Ok(reports)
    }

    /// Poll until `max_passes` passes have run (forever when `None`).
    pub fn run(&mut self, max_passes: Option<u64>) -> Result<(), BotError> {
        let mut passes = 0u64;
        loop {
            let reports = match self.run_once() {
                Ok(reports) => reports,
                Err(e) => {
                    error!(error = %e, "persisting state failed; stopping");
                    return Err(e);
                }
            };
            passes += 1;

            let executed = reports
                .iter()
                .filter(|r| matches!(r.outcome, CycleOutcome::Executed { .. }))
                .count();
            let skipped = reports
                .iter()
                .filter(|r| matches!(r.outcome, CycleOutcome::Skipped(_)))
                .count();
            info!(pass = passes, executed, skipped, open_positions = self.book.len(), "pass complete");

            if max_passes.is_some_and(|max| passes >= max) {
                return Ok(());
            }
            std::thread::sleep(self.poll_interval);
        }
    }
}
