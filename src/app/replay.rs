//! Offline replay of recorded server events.
//!
//! Feeds newline-delimited `ServerEvent` JSON through a fresh dispatcher and
//! handler as if it arrived on an active session, collecting what would have
//! been sent back. Blank lines and lines starting with `#` are skipped.

use std::io::BufRead;
use std::sync::Arc;
use tracing::warn;

use crate::core::dispatch::EventDispatcher;
use crate::core::handler::CommandHandler;
use crate::core::realtime::openai::{ClientEvent, ServerEvent};
use crate::core::tools::SessionOptions;
use crate::domain::DomainModule;

/// Outbound events produced by one input line.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayStep {
    /// 1-based line number in the input
    pub line: usize,
    pub outbound: Vec<ClientEvent>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReplayOutcome<S> {
    pub steps: Vec<ReplayStep>,
    /// Lines that were not valid server events
    pub skipped: usize,
    pub snapshot: S,
}

impl<S> ReplayOutcome<S> {
    pub fn outbound(&self) -> impl Iterator<Item = &ClientEvent> {
        self.steps.iter().flat_map(|step| step.outbound.iter())
    }
}

pub fn replay<D: DomainModule>(
    domain: D,
    options: SessionOptions,
    input: impl BufRead,
) -> std::io::Result<ReplayOutcome<D::Snapshot>> {
    let mut handler = CommandHandler::new(domain);
    let mut dispatcher = EventDispatcher::new(Arc::new(D::registry()), options);
    let mut steps = Vec::new();
    let mut skipped = 0;

    for (index, line) in input.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        match ServerEvent::parse(trimmed) {
            Ok(event) => {
                let outbound = dispatcher.handle(&event, &mut handler);
                if !outbound.is_empty() {
                    steps.push(ReplayStep {
                        line: index + 1,
                        outbound,
                    });
                }
            }
            Err(e) => {
                warn!(line = index + 1, "Skipping unparseable event: {}", e);
                skipped += 1;
            }
        }
    }

    Ok(ReplayOutcome {
        steps,
        skipped,
        snapshot: handler.snapshot(),
    })
}
