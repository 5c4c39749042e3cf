use serde::Serialize;
use tracing::info;

use super::{Decision, Ledger, LedgerEntry};
use crate::matrix::PUBLIC_ROLE;

/// Strategy deciding allow (`true`) or deny (`false`) for an undecided entry
pub trait Classifier {
    fn decide(&self, entry: &LedgerEntry) -> bool;
}

impl<F> Classifier for F
where
    F: Fn(&LedgerEntry) -> bool,
{
    fn decide(&self, entry: &LedgerEntry) -> bool {
        self(entry)
    }
}

/// Default heuristic: deny `public`, allow every other role.
///
/// This is a starting point for review, not a verdict. It does not look at
/// policy predicates, so every allow it writes still needs a human check.
#[derive(Debug, Clone, Copy, Default)]
pub struct PublicDenyClassifier;

impl Classifier for PublicDenyClassifier {
    fn decide(&self, entry: &LedgerEntry) -> bool {
        entry.role != PUBLIC_ROLE
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ClassifyReport {
    pub changed: usize,
    pub allowed: usize,
    pub denied: usize,
}

/// Decide every undecided entry with `classifier`; decided entries are left alone
pub fn classify(ledger: &mut Ledger, classifier: &dyn Classifier) -> ClassifyReport {
    let mut report = ClassifyReport::default();

    for entry in ledger.entries.iter_mut().filter(|e| !e.allowed.is_decided()) {
        let allowed = classifier.decide(entry);
        entry.allowed = Decision::from(allowed);
        report.changed += 1;
        if allowed {
            report.allowed += 1;
        } else {
            report.denied += 1;
        }
    }

    info!(
        "Classified {} entries ({} allowed, {} denied)",
        report.changed, report.allowed, report.denied
    );
    report
}
