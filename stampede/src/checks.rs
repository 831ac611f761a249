use crate::metrics::Rate;
use stampede_core::CheckSummary;
use std::sync::{Arc, Mutex};
use tracing::{trace, warn};

/// Named pass/fail assertions. Every check also feeds the `checks` rate.
#[derive(Debug, Clone)]
pub(crate) struct Checks {
    rate: Rate,
    // NOTE: Scripts declare a handful of checks, so a linear scan keeps declaration order
    // without pulling in an ordered map.
    entries: Arc<Mutex<Vec<CheckSummary>>>,
}

impl Checks {
    pub fn new(rate: Rate) -> Self {
        Self {
            rate,
            entries: Arc::new(Mutex::new(vec![])),
        }
    }

    pub fn record(&self, name: &str, passed: bool) -> bool {
        trace!("Check `{name}`: {passed}");
        self.rate.add(passed);

        match self.entries.lock() {
            Ok(mut entries) => {
                if let Some(entry) = entries.iter_mut().find(|e| e.name == name) {
                    bump(entry, passed);
                } else {
                    let mut entry = CheckSummary {
                        name: name.to_string(),
                        passes: 0,
                        fails: 0,
                    };
                    bump(&mut entry, passed);
                    entries.push(entry);
                }
            }
            Err(_) => warn!("Check registry is poisoned; dropping result for `{name}`."),
        }

        passed
    }

    pub fn summaries(&self) -> Vec<CheckSummary> {
        match self.entries.lock() {
            Ok(entries) => entries.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

fn bump(entry: &mut CheckSummary, passed: bool) {
    if passed {
        entry.passes += 1;
    } else {
        entry.fails += 1;
    }
}
