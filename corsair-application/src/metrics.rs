use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct Metrics {
    messages: AtomicU64,
    intake_opened: AtomicU64,
    edit_opened: AtomicU64,
    oracle_accepted: AtomicU64,
    oracle_rejected: AtomicU64,
    hits_committed: AtomicU64,
    commit_failures: AtomicU64,
}

impl Metrics {
    pub fn record_message(&self) {
        self.messages.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_intake_opened(&self) {
        self.intake_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_edit_opened(&self) {
        self.edit_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_oracle_accepted(&self) {
        self.oracle_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_oracle_rejected(&self) {
        self.oracle_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_commit(&self) {
        self.hits_committed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_commit_failure(&self) {
        self.commit_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn render_prometheus(&self) -> String {
        let messages = self.messages.load(Ordering::Relaxed);
        let intake = self.intake_opened.load(Ordering::Relaxed);
        let edit = self.edit_opened.load(Ordering::Relaxed);
        let accepted = self.oracle_accepted.load(Ordering::Relaxed);
        let rejected = self.oracle_rejected.load(Ordering::Relaxed);
        let committed = self.hits_committed.load(Ordering::Relaxed);
        let failures = self.commit_failures.load(Ordering::Relaxed);

        format!(
            "# TYPE corsair_messages_total counter\n\
corsair_messages_total {}\n\
# TYPE corsair_intake_sessions_total counter\n\
corsair_intake_sessions_total {}\n\
# TYPE corsair_edit_sessions_total counter\n\
corsair_edit_sessions_total {}\n\
# TYPE corsair_oracle_accepted_total counter\n\
corsair_oracle_accepted_total {}\n\
# TYPE corsair_oracle_rejected_total counter\n\
corsair_oracle_rejected_total {}\n\
# TYPE corsair_hits_committed_total counter\n\
corsair_hits_committed_total {}\n\
# TYPE corsair_commit_failures_total counter\n\
corsair_commit_failures_total {}\n",
            messages, intake, edit, accepted, rejected, committed, failures
        )
    }
}
