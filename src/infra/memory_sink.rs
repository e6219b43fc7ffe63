use std::cell::RefCell;

use crate::app::ports::{Dataset, DropReason, EventSink, PipelineEvent};

/// Collects events in memory so callers can inspect what a stage decided.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: RefCell<Vec<PipelineEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events.borrow().clone()
    }

    /// Total rows dropped for `dataset` for reasons matching `pred`.
    pub fn dropped(&self, dataset: Dataset, pred: impl Fn(&DropReason) -> bool) -> usize {
        self.events
            .borrow()
            .iter()
            .filter_map(|e| match e {
                PipelineEvent::RowsDropped { dataset: d, reason, count } if *d == dataset && pred(reason) => {
                    Some(*count)
                }
                _ => None,
            })
            .sum()
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: PipelineEvent) {
        self.events.borrow_mut().push(event);
    }
}
