//! Parallel evaluation of many subjects.
//!
//! Subjects share nothing but the history store. Inputs for the same subject
//! run one after another inside a single task, so the ledger's
//! read-modify-write never races with itself; distinct subjects run
//! concurrently, bounded by [`BatchConfig::max_concurrent`].

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{instrument, warn};

use tally_ledger::HistoryLedger;

use crate::domain::{Result, TallyError};
use crate::evaluation::{EvaluationInput, Evaluator, RecordedEvaluation};
use crate::metrics::METRICS;

/// Configuration for a batch run.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Maximum number of subjects evaluated at once.
    pub max_concurrent: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self { max_concurrent: 4 }
    }
}

/// Outcome for one input of the batch.
#[derive(Debug)]
pub struct BatchItemResult {
    pub subject_id: String,
    pub result: Result<RecordedEvaluation>,
}

impl BatchItemResult {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Evaluate and record every input; results come back in input order.
///
/// A failing subject (history write error, panicked task) is reported in its
/// own [`BatchItemResult`] and does not stop the others.
#[instrument(skip_all, fields(inputs = inputs.len()))]
pub async fn evaluate_batch(
    evaluator: Arc<Evaluator>,
    ledger: HistoryLedger,
    inputs: Vec<EvaluationInput>,
    config: BatchConfig,
) -> Vec<BatchItemResult> {
    let total = inputs.len();

    // Group by subject, keeping first-appearance order of subjects and
    // input order within a subject.
    let mut groups: Vec<(String, Vec<(usize, EvaluationInput)>)> = Vec::new();
    let mut group_of: HashMap<String, usize> = HashMap::new();
    for (idx, input) in inputs.into_iter().enumerate() {
        let slot = *group_of.entry(input.subject_id.clone()).or_insert_with(|| {
            groups.push((input.subject_id.clone(), Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push((idx, input));
    }

    let sem = Arc::new(tokio::sync::Semaphore::new(config.max_concurrent.max(1)));
    let mut tasks = Vec::with_capacity(groups.len());

    for (subject_id, items) in groups {
        let indices: Vec<usize> = items.iter().map(|(idx, _)| *idx).collect();
        let evaluator = Arc::clone(&evaluator);
        let ledger = ledger.clone();
        let sem = Arc::clone(&sem);

        let task = tokio::spawn(async move {
            let _permit = sem.acquire_owned().await.ok();
            let mut results = Vec::with_capacity(items.len());
            for (idx, input) in items {
                let result = evaluator.evaluate_and_record(&ledger, &input).await;
                if let Err(e) = &result {
                    warn!(subject_id = %input.subject_id, error = %e, "subject evaluation failed");
                }
                results.push((idx, result));
            }
            results
        });
        tasks.push((subject_id, indices, task));
    }

    let mut slots: Vec<Option<BatchItemResult>> = (0..total).map(|_| None).collect();
    let joined = futures::future::join_all(
        tasks
            .into_iter()
            .map(|(subject_id, indices, task)| async move { (subject_id, indices, task.await) }),
    )
    .await;

    for (subject_id, indices, joined) in joined {
        match joined {
            Ok(results) => {
                for (idx, result) in results {
                    slots[idx] = Some(BatchItemResult {
                        subject_id: subject_id.clone(),
                        result,
                    });
                }
            }
            Err(e) => {
                warn!(subject_id = %subject_id, error = %e, "batch task failed");
                for idx in indices {
                    slots[idx] = Some(BatchItemResult {
                        subject_id: subject_id.clone(),
                        result: Err(TallyError::BatchTask {
                            subject_id: subject_id.clone(),
                            detail: e.to_string(),
                        }),
                    });
                }
            }
        }
    }

    METRICS.flush();
    slots.into_iter().flatten().collect()
}
