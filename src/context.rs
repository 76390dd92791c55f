//! Conversation context assembly

use std::sync::Arc;

use tracing::debug;

use crate::Result;
use crate::history::{HistoryOrder, HistoryStore};
use crate::models::Exchange;

/// Builds the text sent to the reasoning layer from recent history
pub struct ContextAssembler {
    history: Arc<dyn HistoryStore>,
    limit: usize,
}

impl ContextAssembler {
    pub fn new(history: Arc<dyn HistoryStore>, limit: usize) -> Self {
        Self { history, limit }
    }

    /// Load the most recent exchanges and prepend them to `new_query`
    pub async fn assemble(&self, new_query: &str) -> Result<String> {
        let mut exchanges = self.history.recent(self.limit).await?;
        if self.history.order() == HistoryOrder::NewestFirst {
            exchanges.reverse();
        }
        let skip = exchanges.len().saturating_sub(self.limit);
        debug!("Assembling context from {} exchange(s)", exchanges.len() - skip);

        Ok(render(&exchanges[skip..], new_query))
    }
}

/// Render oldest-first exchanges followed by the new query
#[must_use]
pub fn render(exchanges: &[Exchange], new_query: &str) -> String {
    let mut blocks: Vec<String> = exchanges
        .iter()
        .map(|e| format!("User: {}\nAssistant: {}", e.query, e.response))
        .collect();
    blocks.push(format!("User: {new_query}\nAssistant:"));
    blocks.join("\n\n")
}
