use super::{MultiTableCheck, ReducerTable};

/// A named projection: what it reads, and what it writes.
#[derive(Debug)]
pub struct Projection {
    /// Checkpoint key.
    pub name: &'static str,
    pub check: MultiTableCheck,
    pub reducers: ReducerTable,
}

impl Projection {
    pub fn base_table(&self) -> &'static str {
        self.check.base_table
    }
}
