/// Hyperparameters for tree induction.
///
/// `max_depth` limits the number of decision levels; `Some(0)` collapses
/// the tree to a single majority leaf, `None` leaves recursion bounded by
/// the data alone.
#[derive(Clone, Debug)]
pub struct TreeParams {
    pub max_depth: Option<u16>,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeParams {
    pub fn new() -> Self {
        Self { max_depth: None }
    }

    pub fn max_depth(&self) -> Option<u16> {
        self.max_depth
    }

    pub fn set_max_depth(&mut self, max_depth: Option<u16>) {
        self.max_depth = max_depth;
    }
}
