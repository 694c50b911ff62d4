/// How row/byte counters are recomputed after a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MutationCounterMode {
    /// Store the recomputed row total in the byte counter and the byte total
    /// in the row counter, matching the legacy engine's observable behaviour.
    #[default]
    Swapped,
    /// Store each recomputed total in its own counter.
    Exact,
}

/// Per-table configuration.
#[derive(Debug, Clone)]
pub struct TableOptions {
    pub(crate) max_scan_parallelism: Option<usize>,
    pub(crate) require_all_columns: bool,
    pub(crate) mutation_counters: MutationCounterMode,
}

impl Default for TableOptions {
    fn default() -> Self {
        TableOptions {
            max_scan_parallelism: None,
            require_all_columns: true,
            mutation_counters: MutationCounterMode::default(),
        }
    }
}

impl TableOptions {
    /// Upper bound on scan sources. A cap of zero still yields one source
    /// over a non-empty table.
    pub fn max_scan_parallelism(self, max_scan_parallelism: usize) -> Self {
        TableOptions {
            max_scan_parallelism: Some(max_scan_parallelism),
            ..self
        }
    }

    /// Whether an appended batch must carry every declared column.
    pub fn require_all_columns(self, require_all_columns: bool) -> Self {
        TableOptions {
            require_all_columns,
            ..self
        }
    }

    /// Counter layout written after a mutation.
    pub fn mutation_counters(self, mutation_counters: MutationCounterMode) -> Self {
        TableOptions {
            mutation_counters,
            ..self
        }
    }
}

impl TableOptions {
    /// Number of scan sources for `requested` streams over `batches` batches.
    ///
    /// A non-empty table always gets at least one source, even when zero
    /// streams are requested or the cap is zero.
    pub(crate) fn scan_parallelism(&self, requested: usize, batches: usize) -> usize {
        let cap = self.max_scan_parallelism.unwrap_or(usize::MAX);
        requested.min(cap).max(1).min(batches)
    }
}

#[cfg(test)]
mod tests {
    use super::{MutationCounterMode, TableOptions};

    #[test]
    fn parallelism_clamps_to_batches_and_cap() {
        let option = TableOptions::default();
        assert_eq!(option.scan_parallelism(4, 2), 2);
        assert_eq!(option.scan_parallelism(4, 0), 0);
        assert_eq!(option.scan_parallelism(1, 9), 1);

        let option = option.max_scan_parallelism(3);
        assert_eq!(option.scan_parallelism(8, 10), 3);
        assert_eq!(option.scan_parallelism(2, 10), 2);
    }

    #[test]
    fn zero_never_hides_rows() {
        let option = TableOptions::default();
        assert_eq!(option.scan_parallelism(0, 5), 1);
        assert_eq!(option.scan_parallelism(0, 0), 0);

        let option = option.max_scan_parallelism(0);
        assert_eq!(option.scan_parallelism(8, 5), 1);
        assert_eq!(option.scan_parallelism(8, 0), 0);
    }

    #[test]
    fn defaults() {
        let option = TableOptions::default();
        assert!(option.require_all_columns);
        assert_eq!(option.mutation_counters, MutationCounterMode::Swapped);
    }
}
